//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use crate::error::{BeaconError, Result};
use crate::station::MAX_SAMPLES_PER_BURST;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub sampling: SamplingConfig,

    #[serde(default)]
    pub serial: SerialConfig,

    #[serde(default)]
    pub broadcast: BroadcastConfig,

    #[serde(default)]
    pub climate: ClimateConfig,

    #[serde(default)]
    pub ambient: AmbientConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Sampling cadence and retry policy
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct SamplingConfig {
    #[serde(default = "default_cycle_interval_ms")]
    pub cycle_interval_ms: u64,

    #[serde(default = "default_sensor_warmup_ms")]
    pub sensor_warmup_ms: u64,

    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_samples_per_burst")]
    pub samples_per_burst: usize,
}

/// Particulate sensor serial port
#[derive(Debug, Deserialize, Clone)]
pub struct SerialConfig {
    #[serde(default = "default_serial_port")]
    pub port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    #[serde(default = "default_response_delay_ms")]
    pub response_delay_ms: u64,
}

/// Advertisement output
#[derive(Debug, Deserialize, Clone)]
pub struct BroadcastConfig {
    #[serde(default = "default_broadcast_target")]
    pub target: String,

    #[serde(default = "default_slot_interval_ms")]
    pub slot_interval_ms: u64,

    #[serde(default = "default_identifier")]
    pub identifier: u16,
}

/// Reading reported by the simulated climate sensor
#[derive(Debug, Deserialize, Clone)]
pub struct ClimateConfig {
    /// Tenths of a percent
    #[serde(default = "default_simulated_humidity")]
    pub simulated_humidity: u16,

    /// Tenths of a degree Celsius
    #[serde(default = "default_simulated_temperature")]
    pub simulated_temperature: i16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AmbientConfig {
    #[serde(default = "default_thermal_zone")]
    pub thermal_zone: String,
}

/// Optional file logging
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default)]
    pub directory: Option<PathBuf>,

    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,
}

// Default value functions
fn default_cycle_interval_ms() -> u64 { 300_000 }
fn default_sensor_warmup_ms() -> u64 { 40_000 }
fn default_retry_delay_ms() -> u64 { 2_000 }
fn default_max_attempts() -> u32 { 60 }
fn default_samples_per_burst() -> usize { MAX_SAMPLES_PER_BURST }

fn default_serial_port() -> String { "/dev/ttyUSB0".to_string() }
fn default_baud_rate() -> u32 { crate::serial::SENSOR_BAUD_RATE }
fn default_response_delay_ms() -> u64 { 600 }

fn default_broadcast_target() -> String { "255.255.255.255:47808".to_string() }
fn default_slot_interval_ms() -> u64 { 100 }
fn default_identifier() -> u16 { crate::broadcast::payload::DEFAULT_IDENTIFIER }

fn default_simulated_humidity() -> u16 { 450 }
fn default_simulated_temperature() -> i16 { 215 }

fn default_thermal_zone() -> String { crate::ambient::DEFAULT_THERMAL_ZONE.to_string() }

fn default_file_prefix() -> String { "air-beacon.log".to_string() }

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            cycle_interval_ms: default_cycle_interval_ms(),
            sensor_warmup_ms: default_sensor_warmup_ms(),
            retry_delay_ms: default_retry_delay_ms(),
            max_attempts: default_max_attempts(),
            samples_per_burst: default_samples_per_burst(),
        }
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: default_serial_port(),
            baud_rate: default_baud_rate(),
            response_delay_ms: default_response_delay_ms(),
        }
    }
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            target: default_broadcast_target(),
            slot_interval_ms: default_slot_interval_ms(),
            identifier: default_identifier(),
        }
    }
}

impl Default for ClimateConfig {
    fn default() -> Self {
        Self {
            simulated_humidity: default_simulated_humidity(),
            simulated_temperature: default_simulated_temperature(),
        }
    }
}

impl Default for AmbientConfig {
    fn default() -> Self {
        Self {
            thermal_zone: default_thermal_zone(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: None,
            file_prefix: default_file_prefix(),
        }
    }
}

impl BroadcastConfig {
    /// Parsed destination address
    pub fn target_addr(&self) -> Result<SocketAddr> {
        self.target.parse().map_err(|_| {
            BeaconError::Config(toml::de::Error::custom(format!(
                "broadcast target '{}' is not a valid socket address",
                self.target
            )))
        })
    }
}

fn invalid(message: impl std::fmt::Display) -> BeaconError {
    BeaconError::Config(toml::de::Error::custom(message))
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use air_beacon::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        let sampling = &self.sampling;

        if sampling.cycle_interval_ms == 0 {
            return Err(invalid("cycle_interval_ms must be greater than 0"));
        }

        if sampling.retry_delay_ms > sampling.cycle_interval_ms {
            return Err(invalid("retry_delay_ms must not exceed cycle_interval_ms"));
        }

        if sampling.max_attempts == 0 {
            return Err(invalid("max_attempts must be greater than 0"));
        }

        if sampling.samples_per_burst == 0 || sampling.samples_per_burst > MAX_SAMPLES_PER_BURST {
            return Err(invalid(format!(
                "samples_per_burst must be between 1 and {}",
                MAX_SAMPLES_PER_BURST
            )));
        }

        if self.serial.port.is_empty() {
            return Err(invalid("serial port cannot be empty"));
        }

        if self.serial.baud_rate != crate::serial::SENSOR_BAUD_RATE {
            return Err(invalid(format!("baud_rate must be {}", crate::serial::SENSOR_BAUD_RATE)));
        }

        if self.serial.response_delay_ms == 0 || self.serial.response_delay_ms > 10_000 {
            return Err(invalid("response_delay_ms must be between 1 and 10000"));
        }

        self.broadcast.target_addr()?;

        if self.broadcast.slot_interval_ms == 0 || self.broadcast.slot_interval_ms > 60_000 {
            return Err(invalid("slot_interval_ms must be between 1 and 60000"));
        }

        if self.climate.simulated_humidity > 1000 {
            return Err(invalid("simulated_humidity must be between 0 and 1000"));
        }

        if self.ambient.thermal_zone.is_empty() {
            return Err(invalid("thermal_zone cannot be empty"));
        }

        if self.logging.file_prefix.is_empty() {
            return Err(invalid("logging file_prefix cannot be empty"));
        }

        Ok(())
    }
}
