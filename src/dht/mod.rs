//! # Single-Wire Climate Sensor Module
//!
//! Implementation of the pulse-width encoded single-wire protocol used by
//! DHT-class temperature/humidity sensors.
//!
//! This module handles:
//! - Start signal generation (host pulls the line low, then releases it)
//! - Presence pulse detection with bounded waits
//! - 40-bit data reception, classifying bits by high-pulse duration
//! - Checksum verification and fixed-point unpacking

pub mod protocol;
pub mod line;
pub mod decoder;
