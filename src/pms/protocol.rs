//! # Particulate Sensor Protocol Constants and Types
//!
//! Frame layout and command set of the PMS-series particulate sensors.
//!
//! Response frame (32 bytes):
//!
//! ```text
//! 0x42 0x4D | len(2) | 12 x u16 data (24) | reserved(2) | checksum(2)
//! ```
//!
//! All multi-byte fields are big-endian; the checksum is the 16-bit sum of
//! bytes 0-29.

/// First sync byte ('B')
pub const SYNC_BYTE_1: u8 = 0x42;

/// Second sync byte ('M')
pub const SYNC_BYTE_2: u8 = 0x4D;

/// Size of a complete response frame
pub const FRAME_SIZE: usize = 32;

/// Bytes covered by the frame checksum
pub const CHECKSUM_SPAN: usize = 30;

/// Offset of the first data field within a frame
pub const DATA_OFFSET: usize = 4;

/// Number of 16-bit data fields
pub const NUM_FIELDS: usize = 12;

/// Size of a command frame
pub const COMMAND_SIZE: usize = 7;

/// Command: read a measurement (passive mode)
pub const CMD_READ: u8 = 0xE2;

/// Command: change work mode (argument 0 = passive, 1 = active)
pub const CMD_SET_MODE: u8 = 0xE1;

/// Command: sleep/wake (argument 0 = sleep, 1 = wake)
pub const CMD_SLEEP: u8 = 0xE4;

/// Mass concentrations in µg/m³
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Concentration {
    /// PM1.0
    pub pm1_0: u16,
    /// PM2.5
    pub pm2_5: u16,
    /// PM10
    pub pm10: u16,
}

/// Particles per 0.1 L of air with diameter beyond the given size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ParticleCounts {
    pub um0_3: u16,
    pub um0_5: u16,
    pub um1_0: u16,
    pub um2_5: u16,
    pub um5_0: u16,
    pub um10: u16,
}

impl ParticleCounts {
    /// Counts in wire order, smallest diameter first
    pub fn as_array(&self) -> [u16; 6] {
        [self.um0_3, self.um0_5, self.um1_0, self.um2_5, self.um5_0, self.um10]
    }

    /// Build from wire order
    pub fn from_array(values: [u16; 6]) -> Self {
        Self {
            um0_3: values[0],
            um0_5: values[1],
            um1_0: values[2],
            um2_5: values[3],
            um5_0: values[4],
            um10: values[5],
        }
    }
}

/// One complete particulate reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ParticulateSample {
    /// Factory-calibrated (CF=1) concentrations
    pub standard: Concentration,

    /// Concentrations under atmospheric environment
    pub atmospheric: Concentration,

    /// Particle counts by size
    pub counts: ParticleCounts,
}

impl ParticulateSample {
    /// All twelve fields in frame order
    pub fn fields(&self) -> [u16; NUM_FIELDS] {
        let c = self.counts.as_array();
        [
            self.standard.pm1_0,
            self.standard.pm2_5,
            self.standard.pm10,
            self.atmospheric.pm1_0,
            self.atmospheric.pm2_5,
            self.atmospheric.pm10,
            c[0], c[1], c[2], c[3], c[4], c[5],
        ]
    }

    /// Build from twelve fields in frame order
    pub fn from_fields(f: [u16; NUM_FIELDS]) -> Self {
        Self {
            standard: Concentration { pm1_0: f[0], pm2_5: f[1], pm10: f[2] },
            atmospheric: Concentration { pm1_0: f[3], pm2_5: f[4], pm10: f[5] },
            counts: ParticleCounts::from_array([f[6], f[7], f[8], f[9], f[10], f[11]]),
        }
    }
}

/// Sensor reporting mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkMode {
    /// Sensor answers read requests only
    Passive,
    /// Sensor streams frames continuously
    Active,
}

/// 16-bit wrapping sum of bytes
pub fn frame_checksum(data: &[u8]) -> u16 {
    data.iter().fold(0u16, |acc, &b| acc.wrapping_add(u16::from(b)))
}

/// Build a command frame
///
/// # Examples
///
/// ```
/// use air_beacon::pms::protocol::{encode_command, CMD_READ};
///
/// assert_eq!(encode_command(CMD_READ, 0), [0x42, 0x4D, 0xE2, 0x00, 0x00, 0x01, 0x71]);
/// ```
pub fn encode_command(command: u8, argument: u16) -> [u8; COMMAND_SIZE] {
    let [arg_hi, arg_lo] = argument.to_be_bytes();
    let mut frame = [SYNC_BYTE_1, SYNC_BYTE_2, command, arg_hi, arg_lo, 0, 0];
    let [sum_hi, sum_lo] = frame_checksum(&frame[..5]).to_be_bytes();
    frame[5] = sum_hi;
    frame[6] = sum_lo;
    frame
}

/// Build a complete, valid response frame carrying `sample`
pub fn encode_frame(sample: &ParticulateSample) -> [u8; FRAME_SIZE] {
    let mut frame = [0u8; FRAME_SIZE];
    frame[0] = SYNC_BYTE_1;
    frame[1] = SYNC_BYTE_2;
    frame[2..4].copy_from_slice(&((FRAME_SIZE - 4) as u16).to_be_bytes());
    for (i, value) in sample.fields().iter().enumerate() {
        let at = DATA_OFFSET + i * 2;
        frame[at..at + 2].copy_from_slice(&value.to_be_bytes());
    }
    let sum = frame_checksum(&frame[..CHECKSUM_SPAN]);
    frame[CHECKSUM_SPAN..].copy_from_slice(&sum.to_be_bytes());
    frame
}
