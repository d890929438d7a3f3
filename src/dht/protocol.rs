//! # Single-Wire Protocol Constants and Types
//!
//! Timing (in microseconds) and data layout of a climate sensor transaction.

/// Host start signal: time the line is held low
pub const START_LOW_US: u32 = 8600;

/// Host start signal: time the line is driven high before release
pub const START_HIGH_US: u32 = 26;

/// Longest a single level may last before the wait is abandoned
pub const EDGE_TIMEOUT_US: u32 = 260;

/// High pulses longer than this encode a `1` bit (`0` is ~26-28us, `1` is ~70us)
pub const BIT_ONE_THRESHOLD_US: u32 = 46;

/// Bytes per transaction: humidity(2) + temperature(2) + checksum(1)
pub const DATA_BYTES: usize = 5;

/// Bits per transaction
pub const DATA_BITS: usize = DATA_BYTES * 8;

/// Sign flag in the temperature high byte
pub const TEMPERATURE_SIGN_BIT: u8 = 0x80;

/// Logic level on the data line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Low,
    High,
}

/// A single temperature/humidity reading
///
/// Both fields are fixed-point with one decimal place:
/// `temperature = 215` is 21.5 °C, `humidity = 455` is 45.5 %RH.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClimateSample {
    /// Temperature in tenths of a degree Celsius
    pub temperature: i16,

    /// Relative humidity in tenths of a percent
    pub humidity: u16,
}

/// Truncated 8-bit sum used as the transaction checksum
pub fn checksum(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
}

/// Pack a reading into the five bytes the sensor would send
///
/// The inverse of [`crate::dht::decoder::decode_bytes`]; temperature
/// magnitude is limited to 15 bits by the wire format.
pub fn encode_bytes(sample: &ClimateSample) -> [u8; DATA_BYTES] {
    let magnitude = sample.temperature.unsigned_abs() & 0x7FFF;
    let mut temp_hi = (magnitude >> 8) as u8;
    if sample.temperature < 0 {
        temp_hi |= TEMPERATURE_SIGN_BIT;
    }

    let mut data = [
        (sample.humidity >> 8) as u8,
        sample.humidity as u8,
        temp_hi,
        magnitude as u8,
        0,
    ];
    data[4] = checksum(&data[..4]);
    data
}
