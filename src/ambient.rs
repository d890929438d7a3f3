//! Auxiliary scalar source: controller temperature in whole degrees Celsius

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::error::{BeaconError, Result};

/// Default Linux thermal zone
pub const DEFAULT_THERMAL_ZONE: &str = "/sys/class/thermal/thermal_zone0/temp";

#[async_trait]
pub trait AmbientSensor: Send {
    /// Current temperature, saturated to `0..=255`
    async fn read_celsius(&mut self) -> Result<u8>;
}

/// Reads a sysfs thermal zone (millidegrees Celsius)
#[derive(Debug, Clone)]
pub struct ThermalZoneSensor {
    path: PathBuf,
}

impl ThermalZoneSensor {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl AmbientSensor for ThermalZoneSensor {
    async fn read_celsius(&mut self) -> Result<u8> {
        let contents = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            BeaconError::Transport(format!("Failed to read {}: {}", self.path.display(), e))
        })?;
        let millidegrees: i64 = contents.trim().parse().map_err(|_| {
            BeaconError::Transport(format!(
                "Unexpected thermal zone value in {}: {:?}",
                self.path.display(),
                contents.trim()
            ))
        })?;

        let celsius = millidegrees_to_celsius(millidegrees);
        debug!("Ambient temperature {}°C", celsius);
        Ok(celsius)
    }
}

/// Truncate to whole degrees and saturate to `u8`
pub fn millidegrees_to_celsius(millidegrees: i64) -> u8 {
    (millidegrees / 1000).clamp(0, i64::from(u8::MAX)) as u8
}

/// Fixed value, for hosts without a thermal zone
#[derive(Debug, Clone, Copy)]
pub struct FixedAmbient(pub u8);

#[async_trait]
impl AmbientSensor for FixedAmbient {
    async fn read_celsius(&mut self) -> Result<u8> {
        Ok(self.0)
    }
}
