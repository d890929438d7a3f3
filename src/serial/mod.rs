//! # Serial Communication Module
//!
//! Handles the UART link to the particulate sensor.
//!
//! This module handles:
//! - Opening the serial port at 9600 baud, 8N1
//! - Falling back through common device paths
//! - Exposing the port through the [`SensorPort`] trait

pub mod port_trait;

pub use port_trait::{SensorPort, TokioSerialPort};

use crate::error::{BeaconError, Result};
use tracing::{debug, info, warn};

/// Particulate sensor UART baud rate
pub const SENSOR_BAUD_RATE: u32 = 9600;

/// Device paths tried after the configured one (in order of preference)
pub const FALLBACK_DEVICE_PATHS: &[&str] = &[
    "/dev/ttyUSB0", // USB-to-serial adapters
    "/dev/serial0", // Raspberry Pi primary UART
];

/// Open the sensor port, trying `preferred` first and then the fallbacks
///
/// # Errors
///
/// Returns `CollaboratorUnavailable` if no path could be opened
pub fn open(preferred: &str, baud_rate: u32) -> Result<TokioSerialPort> {
    let mut paths = vec![preferred];
    paths.extend(FALLBACK_DEVICE_PATHS.iter().filter(|p| **p != preferred));
    open_with_paths(&paths, baud_rate)
}

/// Open the first path that succeeds
///
/// # Arguments
///
/// * `paths` - Device paths to try (e.g., &["/dev/ttyUSB0"])
/// * `baud_rate` - Line speed
///
/// # Returns
///
/// * `Result<TokioSerialPort>` - Connected serial port or error
pub fn open_with_paths(paths: &[&str], baud_rate: u32) -> Result<TokioSerialPort> {
    for path in paths {
        debug!("Trying to open serial port: {}", path);

        match open_port(path, baud_rate) {
            Ok(port) => {
                info!("Opened particulate sensor port at {}", path);
                return Ok(TokioSerialPort::new(port));
            }
            Err(e) => {
                warn!("Failed to open {}: {}", path, e);
                continue;
            }
        }
    }

    Err(BeaconError::CollaboratorUnavailable(format!(
        "no serial port available (tried: {})",
        paths.join(", ")
    )))
}

/// Open a specific serial port with sensor UART settings
fn open_port(path: &str, baud_rate: u32) -> Result<tokio_serial::SerialStream> {
    use tokio_serial::SerialPortBuilderExt;

    tokio_serial::new(path, baud_rate)
        .data_bits(tokio_serial::DataBits::Eight)
        .parity(tokio_serial::Parity::None)
        .stop_bits(tokio_serial::StopBits::One)
        .flow_control(tokio_serial::FlowControl::None)
        .open_native_async()
        .map_err(|e| BeaconError::Transport(format!("Failed to open {}: {}", path, e)))
}
