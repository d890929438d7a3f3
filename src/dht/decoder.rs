//! # Single-Wire Transaction Decoder
//!
//! Drives a full sensor transaction over a [`SingleWireLine`] and decodes
//! the 40 received bits into a [`ClimateSample`].

use tracing::{debug, warn};

use super::line::SingleWireLine;
use super::protocol::*;
use crate::error::{BeaconError, Result, TimeoutPhase};

/// Decoder for pulse-width encoded climate sensor transactions
///
/// A transaction blocks the calling thread for roughly 10-15 ms. Only one
/// transaction may be in flight; `read` takes `&mut self` to enforce that.
#[derive(Debug)]
pub struct TimedSignalDecoder<L: SingleWireLine> {
    line: L,
}

impl<L: SingleWireLine> TimedSignalDecoder<L> {
    /// Create a decoder that owns the data line
    pub fn new(line: L) -> Self {
        Self { line }
    }

    /// Access the underlying line
    pub fn line(&self) -> &L {
        &self.line
    }

    /// Mutable access to the underlying line
    pub fn line_mut(&mut self) -> &mut L {
        &mut self.line
    }

    /// Perform one transaction and decode the reading
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The sensor does not answer the start signal (`Timeout(StartTransaction)`)
    /// - A bit edge does not arrive in time (`Timeout(ReceiveData)`)
    /// - The checksum byte does not match (`Checksum`)
    pub fn read(&mut self) -> Result<ClimateSample> {
        let data = self.receive()?;
        let sample = decode_bytes(&data).inspect_err(|e| warn!("Climate sensor: {}", e))?;
        debug!(
            "Climate sample: temperature {} humidity {}",
            sample.temperature, sample.humidity
        );
        Ok(sample)
    }

    /// Run the start signal and collect the raw five bytes
    fn receive(&mut self) -> Result<[u8; DATA_BYTES]> {
        self.line.drive_low(START_LOW_US)?;
        self.line.drive_high(START_HIGH_US)?;
        self.line.release()?;

        // Presence: sensor pulls low ~80us, then high ~80us
        self.wait_while(Level::Low, TimeoutPhase::StartTransaction)?;
        self.wait_while(Level::High, TimeoutPhase::StartTransaction)?;

        let mut data = [0u8; DATA_BYTES];
        for byte in data.iter_mut() {
            for bit in (0..8).rev() {
                self.wait_while(Level::Low, TimeoutPhase::ReceiveData)?;
                let high_us = self.wait_while(Level::High, TimeoutPhase::ReceiveData)?;
                if high_us > BIT_ONE_THRESHOLD_US {
                    *byte |= 1 << bit;
                }
            }
        }

        Ok(data)
    }

    /// Measure how long the line stays at `level`, in microseconds
    fn wait_while(&mut self, level: Level, phase: TimeoutPhase) -> Result<u32> {
        let mut elapsed = 0u32;
        while self.line.read_level() == level {
            self.line.delay_us(1);
            elapsed += 1;
            if elapsed > EDGE_TIMEOUT_US {
                warn!("Climate sensor: line stuck {:?} during {}", level, phase);
                return Err(BeaconError::Timeout(phase));
            }
        }
        Ok(elapsed)
    }
}

/// Validate and unpack the five transaction bytes
///
/// Bytes 0-1 are humidity, bytes 2-3 temperature magnitude with the sign
/// in bit 7 of byte 2, byte 4 the truncated sum of bytes 0-3.
///
/// # Examples
///
/// ```
/// use air_beacon::dht::decoder::decode_bytes;
///
/// let sample = decode_bytes(&[0x01, 0xC7, 0x00, 0xD7, 0x9F]).unwrap();
/// assert_eq!(sample.humidity, 455);
/// assert_eq!(sample.temperature, 215);
/// ```
pub fn decode_bytes(data: &[u8; DATA_BYTES]) -> Result<ClimateSample> {
    let expected = checksum(&data[..4]);
    if expected != data[4] {
        return Err(BeaconError::Checksum {
            expected: u16::from(expected),
            actual: u16::from(data[4]),
        });
    }

    let humidity = u16::from_be_bytes([data[0], data[1]]);
    let magnitude = u16::from_be_bytes([data[2] & !TEMPERATURE_SIGN_BIT, data[3]]) as i16;
    let temperature = if data[2] & TEMPERATURE_SIGN_BIT != 0 {
        -magnitude
    } else {
        magnitude
    };

    Ok(ClimateSample { temperature, humidity })
}
