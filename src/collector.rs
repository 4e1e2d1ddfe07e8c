use chrono::{DateTime, Duration, Local, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use log::{debug, info};

use crate::config::{Config, Units};
use crate::error::{CollectError, PollError};
use crate::flume::FlumeApi;
use crate::models::{Bucketing, Device, FetchDeviceRequest, Query, QueryRequest, QueryResult};

pub const METRIC_NAME: &str = "flume_water";
pub const REQUEST_ID: &str = "flume-water-telegraf-input";
pub const VALUE_FIELD: &str = "value";

// The API takes naive local times and only understands whole minutes.
const QUERY_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:00";
const BUCKET_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq)]
pub struct MetricPoint {
    pub name: &'static str,
    pub tags: Vec<(&'static str, String)>,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

pub trait Accumulator {
    fn add_metric(&mut self, point: MetricPoint);
    fn add_error(&mut self, error: CollectError);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryWindow {
    pub since: NaiveDateTime,
    pub until: NaiveDateTime,
}

impl QueryWindow {
    pub fn ending_at(now: NaiveDateTime, lookback: Duration) -> Self {
        QueryWindow {
            since: now - lookback,
            until: now,
        }
    }

    pub fn query(&self, units: Units) -> Query {
        Query {
            bucket: Bucketing::Minute,
            since_datetime: self.since.format(QUERY_DATETIME_FORMAT).to_string(),
            until_datetime: self.until.format(QUERY_DATETIME_FORMAT).to_string(),
            request_id: REQUEST_ID.to_string(),
            units,
        }
    }
}

#[derive(Debug)]
enum State {
    Uninitialized,
    Ready(Device),
    Stopped,
}

pub struct Collector<A> {
    config: Config,
    api: A,
    state: State,
}

impl<A: FlumeApi> Collector<A> {
    pub fn new(config: Config, api: A) -> Self {
        Collector {
            config,
            api,
            state: State::Uninitialized,
        }
    }

    pub fn device(&self) -> Option<&Device> {
        match &self.state {
            State::Ready(device) => Some(device),
            _ => None,
        }
    }

    pub async fn gather(&mut self, acc: &mut impl Accumulator) -> Result<(), PollError> {
        self.gather_at(Local::now().naive_local(), acc).await
    }

    /// Failures while talking to the API or converting buckets go to `acc`; only
    /// polling a stopped collector is an error.
    pub async fn gather_at(
        &mut self,
        now: NaiveDateTime,
        acc: &mut impl Accumulator,
    ) -> Result<(), PollError> {
        if matches!(self.state, State::Stopped) {
            return Err(PollError::Stopped);
        }
        if matches!(self.state, State::Uninitialized) {
            match self.resolve_device().await {
                Ok(device) => {
                    info!(
                        "using device {} ({}) at {:?}",
                        device.id, device.name, device.location.name
                    );
                    self.state = State::Ready(device);
                }
                Err(e) => {
                    acc.add_error(e);
                    return Ok(());
                }
            }
        }
        let State::Ready(device) = &self.state else {
            return Ok(());
        };

        let window = QueryWindow::ending_at(now, self.config.lookback());
        let request = QueryRequest {
            queries: vec![window.query(self.config.units)],
        };
        debug!("querying device {} from {} to {}", device.id, window.since, window.until);

        match self.api.query_device(&device.id, &request).await {
            Ok(results) => emit_points(results, device, self.config.units, acc),
            Err(source) => acc.add_error(CollectError::Query {
                device_id: device.id.clone(),
                source,
            }),
        }
        Ok(())
    }

    pub fn stop(&mut self) {
        self.api.close();
        self.state = State::Stopped;
    }

    async fn resolve_device(&mut self) -> Result<Device, CollectError> {
        let request = FetchDeviceRequest::detailed();
        match &self.config.device_id {
            Some(device_id) => self
                .api
                .fetch_device(device_id, request)
                .await
                .map_err(CollectError::Directory),
            None => {
                let devices = self
                    .api
                    .fetch_devices(request)
                    .await
                    .map_err(CollectError::Directory)?;
                debug!("account has {} devices, picking the first", devices.len());
                devices.into_iter().next().ok_or(CollectError::NoDevices)
            }
        }
    }
}

/// Buckets whose time cannot be placed in the device's timezone are reported
/// and skipped.
pub fn emit_points(
    results: Vec<QueryResult>,
    device: &Device,
    units: Units,
    acc: &mut impl Accumulator,
) {
    let timezone = device.location.tz.parse::<Tz>().ok();
    let tags = device_tags(device, units);

    for QueryResult(groups) in results {
        for (request_id, buckets) in groups {
            for bucket in buckets {
                let timestamp =
                    match bucket_timestamp(&bucket.datetime, timezone, &device.location.tz) {
                        Ok(timestamp) => timestamp,
                        Err(e) => {
                            acc.add_error(e);
                            continue;
                        }
                    };

                let mut point_tags = Vec::with_capacity(tags.len() + 1);
                point_tags.push(("request_id", request_id.clone()));
                point_tags.extend(tags.iter().cloned());

                acc.add_metric(MetricPoint {
                    name: METRIC_NAME,
                    tags: point_tags,
                    value: bucket.value,
                    timestamp,
                });
            }
        }
    }
}

fn device_tags(device: &Device, units: Units) -> Vec<(&'static str, String)> {
    let location = &device.location;
    vec![
        ("device_id", device.id.clone()),
        ("bridge_id", device.bridge_id.clone()),
        ("device_name", device.name.clone()),
        ("device_type", device.device_type.to_string()),
        ("user_email", device.user.email_address.clone()),
        ("location_name", location.name.clone()),
        ("location_city", location.city.clone()),
        ("location_state", location.state.clone()),
        ("location_postal_code", location.postal_code.clone()),
        ("location_building_type", location.building_type.clone()),
        ("units", units.tag()),
    ]
}

fn bucket_timestamp(
    datetime: &str,
    timezone: Option<Tz>,
    timezone_name: &str,
) -> Result<DateTime<Utc>, CollectError> {
    let timezone = timezone.ok_or_else(|| CollectError::Timezone(timezone_name.to_string()))?;
    let naive = NaiveDateTime::parse_from_str(datetime, BUCKET_DATETIME_FORMAT).map_err(
        |source| CollectError::Timestamp {
            value: datetime.to_string(),
            source,
        },
    )?;
    // Ambiguous times at the end of DST take the first occurrence.
    timezone
        .from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
        .ok_or_else(|| CollectError::NonexistentLocalTime {
            value: datetime.to_string(),
            timezone: timezone_name.to_string(),
        })
}
