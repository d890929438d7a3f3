//! # Broadcast Payload Encoder
//!
//! Packs a reading into the 25-byte record carried by each advertisement.
//!
//! ## Wire format
//!
//! Frame = 6-byte header + 25-byte payload = 31 bytes.
//!
//! | Offset | Size | Content |
//! |--------|------|---------|
//! | 0 | 1 | `0x02` flags structure length |
//! | 1 | 1 | `0x01` flags structure type |
//! | 2 | 1 | `0x06` flags |
//! | 3 | 1 | `0x1B` length of identifier + payload (27) |
//! | 4 | 2 | identifier, little-endian |
//! | 6 | 3 | kind:2, temperature:12, humidity:10 (LSB first) |
//! | 9 | 9 | six 12-bit concentrations, two per 3 bytes |
//! | 18 | 12 | six 16-bit particle counts, little-endian |
//! | 30 | 1 | ambient temperature, °C |
//!
//! The first payload bits are packed LSB-first into a 24-bit little-endian
//! word:
//!
//! ```text
//! Byte 0: T[5:0] | K[1:0]
//! Byte 1: H[1:0] | T[11:6]
//! Byte 2: H[9:2]
//! ```
//!
//! Temperature is sign-magnitude: bits 0-10 hold the magnitude in tenths
//! of a degree, bit 11 the sign. Concentration pairs `(a, b)` are stored as
//! `a[11:4]`, `a[3:0] b[11:8]`, `b[7:0]`.

use std::sync::Arc;

use tracing::debug;

use super::slots::BroadcastSlots;
use crate::aggregate::CycleReading;
use crate::dht::protocol::ClimateSample;
use crate::error::Result;
use crate::pms::protocol::{Concentration, ParticleCounts, ParticulateSample};

/// Header bytes in front of every payload
pub const HEADER_SIZE: usize = 6;

/// Packed record size
pub const PAYLOAD_SIZE: usize = 25;

/// Complete advertisement size
pub const FRAME_SIZE: usize = HEADER_SIZE + PAYLOAD_SIZE;

/// Largest advertisement the transport accepts
pub const MAX_ADVERTISEMENT_SIZE: usize = 31;

/// Default manufacturer identifier
pub const DEFAULT_IDENTIFIER: u16 = 0x0606;

const _: () = assert!(FRAME_SIZE <= MAX_ADVERTISEMENT_SIZE);

const TEMPERATURE_MAGNITUDE_MASK: u16 = 0x07FF;
const TEMPERATURE_SIGN: u16 = 0x0800;
const HUMIDITY_MASK: u16 = 0x03FF;
const CONCENTRATION_MASK: u16 = 0x0FFF;

/// Payload kind tag, also the slot the record is published in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    /// Most recent single cycle
    Live,
    /// Rolling average over the history window
    Averaged,
}

impl RecordKind {
    pub fn tag(self) -> u8 {
        match self {
            RecordKind::Live => 0,
            RecordKind::Averaged => 1,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(RecordKind::Live),
            1 => Some(RecordKind::Averaged),
            _ => None,
        }
    }

    /// Broadcast slot holding this kind of record
    pub fn slot(self) -> usize {
        usize::from(self.tag())
    }
}

/// A reading as carried on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Record {
    pub kind: RecordKind,
    pub climate: ClimateSample,
    pub particulate: ParticulateSample,
    pub ambient: u8,
}

impl Record {
    pub fn new(kind: RecordKind, reading: &CycleReading) -> Self {
        Self {
            kind,
            climate: reading.climate,
            particulate: reading.particulate,
            ambient: reading.ambient,
        }
    }
}

/// Constant header for the given identifier
pub fn encode_header(identifier: u16) -> [u8; HEADER_SIZE] {
    let [id_lo, id_hi] = identifier.to_le_bytes();
    [0x02, 0x01, 0x06, (PAYLOAD_SIZE + 2) as u8, id_lo, id_hi]
}

/// 12-bit sign-magnitude temperature
pub fn encode_temperature(temperature: i16) -> u16 {
    let magnitude = temperature.unsigned_abs() & TEMPERATURE_MAGNITUDE_MASK;
    if temperature < 0 {
        magnitude | TEMPERATURE_SIGN
    } else {
        magnitude
    }
}

pub fn decode_temperature(raw: u16) -> i16 {
    let magnitude = (raw & TEMPERATURE_MAGNITUDE_MASK) as i16;
    if raw & TEMPERATURE_SIGN != 0 {
        -magnitude
    } else {
        magnitude
    }
}

/// Pack two 12-bit values into three bytes
pub fn pack_pair(first: u16, second: u16) -> [u8; 3] {
    let first = first & CONCENTRATION_MASK;
    let second = second & CONCENTRATION_MASK;
    [
        (first >> 4) as u8,
        ((first << 4) as u8) | ((second >> 8) as u8 & 0x0F),
        second as u8,
    ]
}

pub fn unpack_pair(bytes: [u8; 3]) -> (u16, u16) {
    let first = (u16::from(bytes[0]) << 4) | u16::from(bytes[1] >> 4);
    let second = (u16::from(bytes[1] & 0x0F) << 8) | u16::from(bytes[2]);
    (first, second)
}

/// Pack a record into its 25-byte wire form
///
/// # Examples
///
/// ```
/// use air_beacon::broadcast::payload::{encode_payload, Record, RecordKind};
/// use air_beacon::dht::protocol::ClimateSample;
/// use air_beacon::pms::protocol::ParticulateSample;
///
/// let record = Record {
///     kind: RecordKind::Averaged,
///     climate: ClimateSample { temperature: 0, humidity: 0 },
///     particulate: ParticulateSample::default(),
///     ambient: 40,
/// };
/// let payload = encode_payload(&record);
/// assert_eq!(payload[0], 0x01);
/// assert_eq!(payload[24], 40);
/// ```
pub fn encode_payload(record: &Record) -> [u8; PAYLOAD_SIZE] {
    let mut out = [0u8; PAYLOAD_SIZE];

    let bits = u32::from(record.kind.tag())
        | u32::from(encode_temperature(record.climate.temperature)) << 2
        | u32::from(record.climate.humidity & HUMIDITY_MASK) << 14;
    out[0..3].copy_from_slice(&bits.to_le_bytes()[..3]);

    let sm = record.particulate.standard;
    let ae = record.particulate.atmospheric;
    out[3..6].copy_from_slice(&pack_pair(sm.pm1_0, sm.pm2_5));
    out[6..9].copy_from_slice(&pack_pair(sm.pm10, ae.pm1_0));
    out[9..12].copy_from_slice(&pack_pair(ae.pm2_5, ae.pm10));

    for (i, count) in record.particulate.counts.as_array().iter().enumerate() {
        let at = 12 + i * 2;
        out[at..at + 2].copy_from_slice(&count.to_le_bytes());
    }

    out[24] = record.ambient;
    out
}

/// Unpack a 25-byte payload
///
/// Returns `None` for an unknown kind tag.
pub fn decode_payload(payload: &[u8; PAYLOAD_SIZE]) -> Option<Record> {
    let bits = u32::from_le_bytes([payload[0], payload[1], payload[2], 0]);
    let kind = RecordKind::from_tag((bits & 0x03) as u8)?;
    let temperature = decode_temperature(((bits >> 2) & 0x0FFF) as u16);
    let humidity = ((bits >> 14) & 0x03FF) as u16;

    let (sm_pm1_0, sm_pm2_5) = unpack_pair([payload[3], payload[4], payload[5]]);
    let (sm_pm10, ae_pm1_0) = unpack_pair([payload[6], payload[7], payload[8]]);
    let (ae_pm2_5, ae_pm10) = unpack_pair([payload[9], payload[10], payload[11]]);

    let mut counts = [0u16; 6];
    for (i, count) in counts.iter_mut().enumerate() {
        let at = 12 + i * 2;
        *count = u16::from_le_bytes([payload[at], payload[at + 1]]);
    }

    Some(Record {
        kind,
        climate: ClimateSample { temperature, humidity },
        particulate: ParticulateSample {
            standard: Concentration { pm1_0: sm_pm1_0, pm2_5: sm_pm2_5, pm10: sm_pm10 },
            atmospheric: Concentration { pm1_0: ae_pm1_0, pm2_5: ae_pm2_5, pm10: ae_pm10 },
            counts: ParticleCounts::from_array(counts),
        },
        ambient: payload[24],
    })
}

/// Writes encoded records into the shared broadcast slots
#[derive(Debug, Clone)]
pub struct PayloadEncoder {
    slots: Arc<BroadcastSlots>,
}

impl PayloadEncoder {
    pub fn new(slots: Arc<BroadcastSlots>) -> Self {
        Self { slots }
    }

    /// Encode a reading into the slot selected by `kind`
    ///
    /// Returns a copy of the complete frame as published.
    pub fn encode(&self, reading: &CycleReading, kind: RecordKind) -> Result<[u8; FRAME_SIZE]> {
        self.encode_into(kind.slot(), &Record::new(kind, reading))
    }

    /// Encode a record into an explicit slot
    ///
    /// # Errors
    ///
    /// `InvalidSlot` if `slot` is not below the slot count
    pub fn encode_into(&self, slot: usize, record: &Record) -> Result<[u8; FRAME_SIZE]> {
        let payload = encode_payload(record);
        let frame = self.slots.store(slot, &payload)?;
        debug!("Slot {} updated with {:?} record", slot, record.kind);
        Ok(frame)
    }
}
