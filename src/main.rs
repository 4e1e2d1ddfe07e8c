use std::time::Duration;

use clap::Parser;
use log::{debug, error, info, warn};
use tokio::time::MissedTickBehavior;

mod cli;
mod collector;
mod config;
mod error;
mod flume;
mod models;
mod sink;

use crate::cli::Cli;
use crate::collector::Collector;
use crate::config::Config;
use crate::flume::{FlumeApi, FlumeClient};
use crate::sink::InfluxBatch;

#[tokio::main]
async fn main() {
    env_logger::init();

    let cli = Cli::parse();
    let config = Config::from(&cli);
    debug!("{:?}", config);

    let client = match FlumeClient::new(
        &cli.flume_api_base_url,
        config.credentials.clone(),
        config.timeout,
    ) {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to build flume client: {e}");
            std::process::exit(1);
        }
    };
    let mut collector = Collector::new(config, client);

    let influx_client = influxdb::Client::new(&cli.influx_uri, &cli.influx_database)
        .with_token(&cli.influx_token);

    if cli.once {
        poll(&mut collector, &influx_client).await;
    } else {
        let mut interval = tokio::time::interval(Duration::from_secs(cli.poll_interval_secs.max(1)));
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!("polling every {}s", cli.poll_interval_secs.max(1));

        loop {
            tokio::select! {
                _ = interval.tick() => poll(&mut collector, &influx_client).await,
                _ = tokio::signal::ctrl_c() => {
                    info!("shutting down");
                    break;
                }
            }
        }
    }

    collector.stop();
}

async fn poll<A: FlumeApi>(collector: &mut Collector<A>, influx_client: &influxdb::Client) {
    let mut batch = InfluxBatch::default();
    if let Err(e) = collector.gather(&mut batch).await {
        error!("poll failed: {e}");
        return;
    }

    let device = collector.device().map(|d| d.id.as_str()).unwrap_or("<unresolved>");
    if batch.errors() > 0 {
        warn!("{} errors while polling device {device}", batch.errors());
    }
    if batch.is_empty() {
        debug!("no readings for device {device}");
        return;
    }

    let points = batch.len();
    match influx_client.query(batch.into_queries()).await {
        Ok(_) => info!("wrote {points} readings for device {device}"),
        Err(e) => error!("Failed to write readings to influx: {e}"),
    }
}
