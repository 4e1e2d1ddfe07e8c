use clap::Parser;

use crate::config::{Units, DEFAULT_LOOKBACK_MINS};
use crate::flume::FLUME_API_URI;

#[derive(Parser, Debug)]
#[command(about = "Gather water usage metrics from the Flume Water API into InfluxDB")]
pub struct Cli {
    #[clap(env)]
    pub flume_client_id: String,
    #[clap(env)]
    pub flume_client_secret: String,
    #[clap(env)]
    pub flume_username: String,
    #[clap(env)]
    pub flume_password: String,
    /// Device to query. If unset, the first device on the account is used
    #[clap(long, env)]
    pub flume_device_id: Option<String>,
    /// Minutes to look back on every poll, which catches late arriving data
    #[clap(long, env, default_value_t = DEFAULT_LOOKBACK_MINS)]
    pub flume_lookback_mins: u32,
    #[clap(long, env, value_enum, default_value_t = Units::Gallons)]
    pub flume_units: Units,
    #[clap(long, env, default_value_t = 5)]
    pub flume_timeout_secs: u64,
    #[clap(long, env, default_value = FLUME_API_URI)]
    pub flume_api_base_url: String,
    #[clap(long, env, default_value_t = 60)]
    pub poll_interval_secs: u64,
    /// Poll a single time and exit
    #[clap(long)]
    pub once: bool,
    #[clap(env)]
    pub influx_uri: String,
    #[clap(env)]
    pub influx_database: String,
    #[clap(env)]
    pub influx_token: String,
}
