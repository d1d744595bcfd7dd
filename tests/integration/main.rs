//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises the node core against
//! mock adapters. All tests run on the host (x86_64) with no real hardware
//! required.

// embassy-sync needs a critical-section impl on the host.
use critical_section as _;

mod channel_tests;
mod service_tests;
