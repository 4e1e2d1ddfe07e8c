use std::fmt;
use std::time::Duration;

use clap::ValueEnum;
use serde::Serialize;

use crate::cli::Cli;

pub const DEFAULT_LOOKBACK_MINS: u32 = 5;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ValueEnum)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[value(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Units {
    #[default]
    Gallons,
    Liters,
    CubicFeet,
    CubicMeters,
}

impl Units {
    pub fn as_str(&self) -> &'static str {
        match self {
            Units::Gallons => "GALLONS",
            Units::Liters => "LITERS",
            Units::CubicFeet => "CUBIC_FEET",
            Units::CubicMeters => "CUBIC_METERS",
        }
    }

    /// Value used for the `units` tag on emitted points.
    pub fn tag(&self) -> String {
        self.as_str().to_lowercase()
    }
}

impl fmt::Display for Units {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
}

// Keep secrets out of debug logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub credentials: Credentials,
    pub device_id: Option<String>,
    pub lookback_mins: u32,
    pub units: Units,
    pub timeout: Duration,
}

impl Config {
    pub fn new(credentials: Credentials) -> Self {
        Config {
            credentials,
            device_id: None,
            lookback_mins: DEFAULT_LOOKBACK_MINS,
            units: Units::default(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Lookback in minutes, treating zero as unset.
    pub fn lookback(&self) -> chrono::Duration {
        let mins = if self.lookback_mins == 0 {
            DEFAULT_LOOKBACK_MINS
        } else {
            self.lookback_mins
        };
        chrono::Duration::minutes(i64::from(mins))
    }
}

impl From<&Cli> for Config {
    fn from(cli: &Cli) -> Self {
        let credentials = Credentials {
            client_id: cli.flume_client_id.clone(),
            client_secret: cli.flume_client_secret.clone(),
            username: cli.flume_username.clone(),
            password: cli.flume_password.clone(),
        };
        Config {
            credentials,
            device_id: cli.flume_device_id.clone().filter(|id| !id.is_empty()),
            lookback_mins: cli.flume_lookback_mins,
            units: cli.flume_units,
            timeout: match cli.flume_timeout_secs {
                0 => DEFAULT_TIMEOUT,
                secs => Duration::from_secs(secs),
            },
        }
    }
}
