//! # Air Beacon
//!
//! Samples temperature, humidity and particulate matter, and broadcasts
//! live and averaged readings as fixed-size advertisement frames.

use std::env;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::time::Duration;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use air_beacon::ambient::ThermalZoneSensor;
use air_beacon::broadcast::{
    BroadcastObserver, BroadcastSlots, PayloadEncoder, Rotator, TracingObserver, UdpBroadcaster,
    NUM_SLOTS,
};
use air_beacon::config::{ClimateConfig, Config, LoggingConfig};
use air_beacon::dht::decoder::TimedSignalDecoder;
use air_beacon::dht::line::SimulatedLine;
use air_beacon::dht::protocol::ClimateSample;
use air_beacon::indicator::LogIndicator;
use air_beacon::pms::sensor::ParticulateSensor;
use air_beacon::serial;
use air_beacon::station::{Schedule, Station};

/// Configuration file used when no path is given
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Main entry point
///
/// # Control Flow
///
/// 1. Load configuration and set up logging
/// 2. Open the particulate sensor port and the broadcast socket
/// 3. Spawn the slot rotation task
/// 4. Run sampling cycles until Ctrl+C
///
/// # Errors
///
/// Returns error if the configuration is invalid, a collaborator cannot be
/// set up, or the station hits a contract violation.
#[tokio::main]
async fn main() -> Result<()> {
    let config_path = env::args().nth(1).unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path))?;

    let _log_guard = init_logging(&config.logging);

    info!("Air Beacon v{} starting...", env!("CARGO_PKG_VERSION"));

    let port = serial::open(&config.serial.port, config.serial.baud_rate)?;
    let particulate = ParticulateSensor::with_response_delay(
        port,
        Duration::from_millis(config.serial.response_delay_ms),
    );

    let climate = simulated_climate(&config.climate);

    let slots = Arc::new(BroadcastSlots::new(NUM_SLOTS, config.broadcast.identifier));
    let observer = Arc::new(TracingObserver::new());
    let transport = UdpBroadcaster::bind(config.broadcast.target_addr()?).await?;
    let rotator = Rotator::new(
        slots.clone(),
        transport,
        observer.clone(),
        Duration::from_millis(config.broadcast.slot_interval_ms),
    );
    let rotation = tokio::spawn(rotator.run());

    let mut station = Station::new(
        climate,
        particulate,
        ThermalZoneSensor::new(&config.ambient.thermal_zone),
        LogIndicator::new(),
        PayloadEncoder::new(slots),
        Schedule::from(&config.sampling),
    );
    station.start().await?;

    info!("Press Ctrl+C to exit");

    tokio::select! {
        result = station.run() => {
            result.context("Sampling stopped")?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
        }
    }

    rotation.abort();
    observer.advertising_stopped();
    info!("Completed {} sampling cycles", station.cycles());

    Ok(())
}

/// Climate decoder on a replayed line; there is no GPIO driver for the host
fn simulated_climate(config: &ClimateConfig) -> TimedSignalDecoder<SimulatedLine> {
    warn!(
        "Climate sensor is simulated: broadcasting fixed humidity {} and temperature {} (tenths)",
        config.simulated_humidity, config.simulated_temperature
    );
    TimedSignalDecoder::new(SimulatedLine::with_sample(ClimateSample {
        temperature: config.simulated_temperature,
        humidity: config.simulated_humidity,
    }))
}

/// Log to stdout, or to a daily rolling file when a directory is configured
fn init_logging(config: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());

    match &config.directory {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, &config.file_prefix);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
            None
        }
    }
}
