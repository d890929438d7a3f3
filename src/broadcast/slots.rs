//! Shared advertisement buffers
//!
//! The station writes a slot once per cycle while the rotation task reads
//! every slot continuously. Each slot sits behind its own mutex and is only
//! ever copied in or out whole, so a reader never sees half of one record
//! and half of another.

use std::sync::{Mutex, MutexGuard, PoisonError};

use super::payload::{encode_header, FRAME_SIZE, HEADER_SIZE, PAYLOAD_SIZE};
use crate::error::{BeaconError, Result};

/// Fixed set of ready-to-send advertisement frames
#[derive(Debug)]
pub struct BroadcastSlots {
    identifier: u16,
    slots: Box<[Mutex<[u8; FRAME_SIZE]>]>,
}

impl BroadcastSlots {
    /// Allocate `num_slots` frames, each holding the header and a zero payload
    pub fn new(num_slots: usize, identifier: u16) -> Self {
        let mut frame = [0u8; FRAME_SIZE];
        frame[..HEADER_SIZE].copy_from_slice(&encode_header(identifier));

        Self {
            identifier,
            slots: (0..num_slots).map(|_| Mutex::new(frame)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn identifier(&self) -> u16 {
        self.identifier
    }

    /// Replace the payload of one slot, returning the resulting frame
    ///
    /// # Errors
    ///
    /// `InvalidSlot` if `slot` is out of range
    pub fn store(&self, slot: usize, payload: &[u8; PAYLOAD_SIZE]) -> Result<[u8; FRAME_SIZE]> {
        let mut frame = self.lock(slot)?;
        frame[HEADER_SIZE..].copy_from_slice(payload);
        Ok(*frame)
    }

    /// Copy of one slot's current frame
    pub fn snapshot(&self, slot: usize) -> Result<[u8; FRAME_SIZE]> {
        Ok(*self.lock(slot)?)
    }

    fn lock(&self, slot: usize) -> Result<MutexGuard<'_, [u8; FRAME_SIZE]>> {
        let cell = self.slots.get(slot).ok_or(BeaconError::InvalidSlot {
            slot,
            num_slots: self.slots.len(),
        })?;
        // Frames are plain bytes, a poisoned lock still holds a whole frame
        Ok(cell.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_new_slots_have_header() {
        let slots = BroadcastSlots::new(2, 0x0606);
        assert_eq!(slots.len(), 2);
        assert_eq!(slots.identifier(), 0x0606);
        for slot in 0..2 {
            let frame = slots.snapshot(slot).unwrap();
            assert_eq!(&frame[..HEADER_SIZE], &[0x02, 0x01, 0x06, 0x1B, 0x06, 0x06]);
            assert!(frame[HEADER_SIZE..].iter().all(|&b| b == 0));
        }
    }

    #[test]
    fn test_store_and_snapshot() {
        let slots = BroadcastSlots::new(2, 0x0606);
        let payload = [0xA5u8; PAYLOAD_SIZE];
        let frame = slots.store(1, &payload).unwrap();
        assert_eq!(&frame[HEADER_SIZE..], &payload);
        assert_eq!(slots.snapshot(1).unwrap(), frame);
    }

    #[test]
    fn test_out_of_range_slot() {
        let slots = BroadcastSlots::new(2, 0x0606);
        assert!(matches!(
            slots.snapshot(5),
            Err(BeaconError::InvalidSlot { slot: 5, num_slots: 2 })
        ));
        assert!(matches!(
            slots.store(2, &[0u8; PAYLOAD_SIZE]),
            Err(BeaconError::InvalidSlot { slot: 2, num_slots: 2 })
        ));
    }

    #[test]
    fn test_concurrent_reader_never_sees_torn_record() {
        let slots = Arc::new(BroadcastSlots::new(1, 0x0606));

        let writer = {
            let slots = slots.clone();
            thread::spawn(move || {
                for i in 0..2000u32 {
                    let fill = (i % 2) as u8 * 0xFF;
                    slots.store(0, &[fill; PAYLOAD_SIZE]).unwrap();
                }
            })
        };

        for _ in 0..2000 {
            let frame = slots.snapshot(0).unwrap();
            let payload = &frame[HEADER_SIZE..];
            assert!(payload.iter().all(|&b| b == payload[0]), "torn frame: {:02X?}", payload);
        }

        writer.join().unwrap();
    }
}
