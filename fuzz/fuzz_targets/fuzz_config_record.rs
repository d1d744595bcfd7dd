//! Fuzz target: persisted config record decoding
//!
//! Whatever bytes sit in flash, decoding must not panic and the sanitized
//! result must always lie inside the parameter bounds.
//!
//! cargo fuzz run fuzz_config_record

#![no_main]

use envnode::config::{DISPLAY_INTERVAL_BOUNDS, SERVER_INTERVAL_BOUNDS};
use envnode::store::decode_record;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Some(cfg) = decode_record(data) {
        let cfg = cfg.sanitized();
        assert!(DISPLAY_INTERVAL_BOUNDS.contains(cfg.display_interval));
        assert!(SERVER_INTERVAL_BOUNDS.contains(cfg.server_interval));
    }
});
