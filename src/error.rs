//! # Error Types
//!
//! Custom error types for Air Beacon using `thiserror`.

use std::fmt;
use thiserror::Error;

/// Phase of a single-wire transaction in which a wait timed out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutPhase {
    /// Waiting for the sensor's presence response
    StartTransaction,
    /// Waiting for a data bit edge
    ReceiveData,
}

impl fmt::Display for TimeoutPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeoutPhase::StartTransaction => write!(f, "start of transaction"),
            TimeoutPhase::ReceiveData => write!(f, "data reception"),
        }
    }
}

/// Main error type for Air Beacon
#[derive(Debug, Error)]
pub enum BeaconError {
    /// A line transition did not arrive in time
    #[error("Timeout waiting for sensor during {0}")]
    Timeout(TimeoutPhase),

    /// Received checksum does not match the computed one
    #[error("Checksum mismatch: computed 0x{expected:04X}, received 0x{actual:04X}")]
    Checksum { expected: u16, actual: u16 },

    /// No sync marker in the received bytes
    #[error("Frame sync marker not found")]
    FrameNotFound,

    /// Sync marker found but the frame is cut short
    #[error("Incomplete frame at offset {offset}: only {available} bytes available")]
    IncompleteFrame { offset: usize, available: usize },

    /// Fewer bytes buffered than a minimal frame
    #[error("Not enough buffered data: {0} bytes")]
    InsufficientData(usize),

    /// Broadcast slot index out of range
    #[error("Invalid broadcast slot {slot} (have {num_slots})")]
    InvalidSlot { slot: usize, num_slots: usize },

    /// Average requested over an empty window
    #[error("Cannot average an empty window")]
    EmptyWindow,

    /// Advertisement does not fit in a single broadcast unit
    #[error("Broadcast frame of {size} bytes exceeds maximum {max}")]
    PayloadTooLarge { size: usize, max: usize },

    /// Host collaborator failed during operation
    #[error("Transport error: {0}")]
    Transport(String),

    /// Host collaborator could not be brought up
    #[error("Collaborator unavailable: {0}")]
    CollaboratorUnavailable(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BeaconError {
    /// Whether the error is a recoverable sensor read failure
    ///
    /// Recoverable errors are counted against the retry budget; anything
    /// else indicates a broken caller or a missing collaborator.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BeaconError::Timeout(_)
                | BeaconError::Checksum { .. }
                | BeaconError::FrameNotFound
                | BeaconError::IncompleteFrame { .. }
                | BeaconError::InsufficientData(_)
                | BeaconError::Transport(_)
        )
    }
}

/// Result type alias for Air Beacon
pub type Result<T> = std::result::Result<T, BeaconError>;
