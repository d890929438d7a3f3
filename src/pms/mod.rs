//! # Particulate Sensor Module
//!
//! Implementation of the framed UART protocol of PMS-series particulate
//! matter sensors.
//!
//! This module handles:
//! - Command frame encoding (read request, work mode, sleep/wake)
//! - Frame synchronization on the `0x42 0x4D` marker
//! - 16-bit checksum verification
//! - Extraction of concentration and particle-count fields

pub mod protocol;
pub mod parser;
pub mod sensor;
