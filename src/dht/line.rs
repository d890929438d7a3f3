//! Trait abstraction for the single-wire data line, plus a pulse-train simulator

use super::protocol::*;
use crate::error::Result;

/// Host-side access to an open-drain data line with a pull-up
///
/// Implementations must provide microsecond-resolution delays; the decoder
/// measures pulse lengths by counting `delay_us(1)` calls.
pub trait SingleWireLine {
    /// Drive the line low and hold it for `duration_us`
    fn drive_low(&mut self, duration_us: u32) -> Result<()>;

    /// Drive the line high and hold it for `duration_us`
    fn drive_high(&mut self, duration_us: u32) -> Result<()>;

    /// Stop driving and switch the line to input
    fn release(&mut self) -> Result<()>;

    /// Sample the current line level
    fn read_level(&mut self) -> Level;

    /// Busy-wait for `duration_us`
    fn delay_us(&mut self, duration_us: u32);
}

/// Presence pulse lengths sent by the sensor after release
const PRESENCE_LOW_US: u32 = 80;
const PRESENCE_HIGH_US: u32 = 80;

/// Per-bit pulse lengths
const BIT_LOW_US: u32 = 50;
const BIT_ZERO_HIGH_US: u32 = 27;
const BIT_ONE_HIGH_US: u32 = 70;

/// A virtual sensor that answers every start signal with a fixed pulse train
///
/// Time only advances through the trait's drive and delay calls, so the
/// decoder can be exercised deterministically. After the scripted segments
/// run out the line rests at `tail`.
#[derive(Debug, Clone)]
pub struct SimulatedLine {
    response: Vec<(Level, u32)>,
    tail: Level,
    driven: Option<Level>,
    clock_us: u64,
    transactions: u32,
}

impl SimulatedLine {
    /// A sensor that reports `sample` with a valid checksum
    pub fn with_sample(sample: ClimateSample) -> Self {
        Self::with_bytes(encode_bytes(&sample))
    }

    /// A sensor that sends exactly these five bytes
    pub fn with_bytes(data: [u8; DATA_BYTES]) -> Self {
        Self::with_bits(&data, DATA_BITS, Level::High)
    }

    /// A sensor that stops after `bits` data bits and holds the line at `tail`
    pub fn truncated(data: [u8; DATA_BYTES], bits: usize, tail: Level) -> Self {
        Self::with_bits(&data, bits.min(DATA_BITS), tail)
    }

    /// No sensor attached: the pull-up keeps the line high
    pub fn absent() -> Self {
        Self {
            response: Vec::new(),
            tail: Level::High,
            driven: None,
            clock_us: 0,
            transactions: 0,
        }
    }

    fn with_bits(data: &[u8; DATA_BYTES], bits: usize, tail: Level) -> Self {
        let mut response = Vec::with_capacity(2 + bits * 2 + 1);
        response.push((Level::Low, PRESENCE_LOW_US));
        response.push((Level::High, PRESENCE_HIGH_US));

        for index in 0..bits {
            let bit = (data[index / 8] >> (7 - index % 8)) & 1;
            response.push((Level::Low, BIT_LOW_US));
            let high = if bit == 1 { BIT_ONE_HIGH_US } else { BIT_ZERO_HIGH_US };
            response.push((Level::High, high));
        }

        // End-of-frame low pulse terminates the last bit
        if bits == DATA_BITS {
            response.push((Level::Low, BIT_LOW_US));
        }

        Self {
            response,
            tail,
            driven: None,
            clock_us: 0,
            transactions: 0,
        }
    }

    /// Replace the reported reading
    pub fn set_sample(&mut self, sample: ClimateSample) {
        *self = Self {
            transactions: self.transactions,
            ..Self::with_sample(sample)
        };
    }

    /// Number of start signals seen
    pub fn transactions(&self) -> u32 {
        self.transactions
    }
}

impl SingleWireLine for SimulatedLine {
    fn drive_low(&mut self, duration_us: u32) -> Result<()> {
        self.driven = Some(Level::Low);
        self.clock_us += u64::from(duration_us);
        Ok(())
    }

    fn drive_high(&mut self, duration_us: u32) -> Result<()> {
        self.driven = Some(Level::High);
        self.clock_us += u64::from(duration_us);
        Ok(())
    }

    fn release(&mut self) -> Result<()> {
        self.driven = None;
        self.clock_us = 0;
        self.transactions += 1;
        Ok(())
    }

    fn read_level(&mut self) -> Level {
        if let Some(level) = self.driven {
            return level;
        }

        let mut start = 0u64;
        for &(level, duration) in &self.response {
            let end = start + u64::from(duration);
            if self.clock_us < end {
                return level;
            }
            start = end;
        }
        self.tail
    }

    fn delay_us(&mut self, duration_us: u32) {
        self.clock_us += u64::from(duration_us);
    }
}
