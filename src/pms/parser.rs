//! # Particulate Frame Parser
//!
//! Locates and validates response frames in a raw byte stream.

use tracing::{debug, warn};

use super::protocol::*;
use crate::error::{BeaconError, Result};

/// Receive buffer size, enough for several back-to-back frames
pub const RX_BUFFER_SIZE: usize = 256;

/// Parse the first frame found in `data`
///
/// Scans left to right for the sync marker. Leading garbage is skipped and
/// anything after the first frame is ignored. Every index is bounds-checked
/// before access, so any input is safe.
///
/// # Errors
///
/// Returns error if:
/// - No sync marker is present (`FrameNotFound`)
/// - The marker is closer than 32 bytes to the end (`IncompleteFrame`)
/// - The frame checksum does not match (`Checksum`)
///
/// # Examples
///
/// ```
/// use air_beacon::pms::parser::parse_frame;
/// use air_beacon::pms::protocol::{encode_frame, ParticulateSample};
///
/// let sample = ParticulateSample::default();
/// let mut stream = vec![0x00, 0x13];
/// stream.extend_from_slice(&encode_frame(&sample));
/// assert_eq!(parse_frame(&stream).unwrap(), sample);
/// ```
pub fn parse_frame(data: &[u8]) -> Result<ParticulateSample> {
    let start = find_sync(data).ok_or(BeaconError::FrameNotFound)?;

    let available = data.len() - start;
    if available < FRAME_SIZE {
        return Err(BeaconError::IncompleteFrame { offset: start, available });
    }

    let frame = &data[start..start + FRAME_SIZE];
    let expected = frame_checksum(&frame[..CHECKSUM_SPAN]);
    let actual = u16::from_be_bytes([frame[CHECKSUM_SPAN], frame[CHECKSUM_SPAN + 1]]);
    if expected != actual {
        return Err(BeaconError::Checksum { expected, actual });
    }

    let mut fields = [0u16; NUM_FIELDS];
    for (i, field) in fields.iter_mut().enumerate() {
        let at = DATA_OFFSET + i * 2;
        *field = u16::from_be_bytes([frame[at], frame[at + 1]]);
    }

    if start > 0 {
        debug!("Skipped {} bytes before frame", start);
    }
    Ok(ParticulateSample::from_fields(fields))
}

/// Offset of the first sync marker, if any
fn find_sync(data: &[u8]) -> Option<usize> {
    data.windows(2)
        .position(|pair| pair[0] == SYNC_BYTE_1 && pair[1] == SYNC_BYTE_2)
}

/// Frame parser with a fixed, reused receive buffer
///
/// Bytes are read straight into [`FrameParser::spare_capacity`] and
/// committed, so no allocation happens per read cycle.
pub struct FrameParser {
    buffer: [u8; RX_BUFFER_SIZE],
    len: usize,
}

impl std::fmt::Debug for FrameParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameParser")
            .field("buffered", &self.len)
            .finish_non_exhaustive()
    }
}

impl Default for FrameParser {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameParser {
    pub fn new() -> Self {
        Self {
            buffer: [0u8; RX_BUFFER_SIZE],
            len: 0,
        }
    }

    /// Unfilled part of the buffer
    pub fn spare_capacity(&mut self) -> &mut [u8] {
        &mut self.buffer[self.len..]
    }

    /// Mark `count` bytes of spare capacity as filled
    pub fn commit(&mut self, count: usize) {
        self.len = (self.len + count).min(RX_BUFFER_SIZE);
    }

    /// Bytes received so far
    pub fn buffered(&self) -> &[u8] {
        &self.buffer[..self.len]
    }

    /// Drop all buffered bytes
    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// Parse the buffered bytes and empty the buffer
    ///
    /// # Errors
    ///
    /// `InsufficientData` if fewer than a frame's worth of bytes arrived,
    /// otherwise any error of [`parse_frame`].
    pub fn parse(&mut self) -> Result<ParticulateSample> {
        let len = self.len;
        self.clear();

        if len < FRAME_SIZE {
            warn!("Particulate sensor: only {} bytes buffered", len);
            return Err(BeaconError::InsufficientData(len));
        }

        parse_frame(&self.buffer[..len]).inspect_err(|e| warn!("Particulate sensor: {}", e))
    }
}
