use influxdb::{Timestamp, WriteQuery};
use log::{error, warn};

use crate::collector::{Accumulator, MetricPoint, VALUE_FIELD};
use crate::error::CollectError;

#[derive(Default)]
pub struct InfluxBatch {
    queries: Vec<WriteQuery>,
    errors: usize,
}

impl InfluxBatch {
    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    pub fn errors(&self) -> usize {
        self.errors
    }

    pub fn into_queries(self) -> Vec<WriteQuery> {
        self.queries
    }
}

impl Accumulator for InfluxBatch {
    fn add_metric(&mut self, point: MetricPoint) {
        match to_write_query(point) {
            Some(query) => self.queries.push(query),
            None => self.errors += 1,
        }
    }

    fn add_error(&mut self, e: CollectError) {
        error!("{e}");
        self.errors += 1;
    }
}

fn to_write_query(point: MetricPoint) -> Option<WriteQuery> {
    let Ok(seconds) = u128::try_from(point.timestamp.timestamp()) else {
        warn!("skipping reading at {} before the unix epoch", point.timestamp);
        return None;
    };
    let timestamp = Timestamp::Seconds(seconds);
    let mut query = WriteQuery::new(timestamp, point.name).add_field(VALUE_FIELD, point.value);
    // Line protocol has no empty tag values; an absent tag reads back the same.
    for (key, value) in point.tags.into_iter().filter(|(_, v)| !v.is_empty()) {
        query = query.add_tag(key, value);
    }
    Some(query)
}
