//! # Broadcast Module
//!
//! Bit-packed telemetry records, the shared slot buffers holding them, and
//! the task that keeps re-advertising every slot.

pub mod payload;
pub mod rotation;
pub mod slots;

pub use payload::{PayloadEncoder, Record, RecordKind};
pub use rotation::{BroadcastObserver, BroadcastTransport, Rotator, TracingObserver, UdpBroadcaster};
pub use slots::BroadcastSlots;

/// Number of broadcast slots (live and averaged)
pub const NUM_SLOTS: usize = 2;
