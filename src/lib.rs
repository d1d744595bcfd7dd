//! EnvNode firmware library.
//!
//! Exposes the pure-logic modules for integration testing and fuzzing. All
//! ESP-IDF-specific code is guarded by `#[cfg(target_os = "espidf")]` within
//! each module.

#![deny(unused_must_use)]

pub mod app;
pub mod config;
pub mod error;
pub mod params;
pub mod payload;
pub mod rpc;
pub mod sampler;
pub mod scheduler;
pub mod store;
pub mod timestamp;
pub mod transmit;

pub mod adapters;
pub mod drivers;

// Host builds take the `std` critical-section impl for embassy-sync.
#[cfg(test)]
use critical_section as _;

/// Firmware version reported in payloads and `get_config`.
pub const FIRMWARE_VERSION: &str = env!("CARGO_PKG_VERSION");
