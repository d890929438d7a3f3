//! # Air Beacon Library
//!
//! Samples a single-wire climate sensor and a serial particulate sensor,
//! keeps rolling averages of both, and republishes them as compact
//! bit-packed broadcast records.

pub mod aggregate;
pub mod ambient;
pub mod broadcast;
pub mod config;
pub mod dht;
pub mod error;
pub mod indicator;
pub mod pms;
pub mod serial;
pub mod station;
