//! Configuration store: the durable record behind both interval parameters.
//!
//! One fixed-size, versioned record lives under
//! [`STORE_NAMESPACE`]/[`STORE_KEY`] and is always written as a single blob:
//!
//! ```text
//! ┌──────────┬─────────────────┬─────────────────┬─────────────────┐
//! │ ver (1B) │ display f32 (4B)│ server f32 (4B) │ boots u32 (4B)  │
//! └──────────┴─────────────────┴─────────────────┴─────────────────┘
//! ```
//!
//! All multi-byte fields are little-endian.
//!
//! Later schema versions may only append fields, so any record with
//! `ver >= 1` still yields a usable version-1 prefix.

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::app::ports::{StorageError, StoragePort};
use crate::config::{PersistentConfig, STORE_KEY, STORE_NAMESPACE};
use crate::error::StoreError;

/// Schema version written by this firmware.
pub const RECORD_VERSION: u8 = 1;

/// Encoded size of a version-1 record.
pub const RECORD_LEN: usize = 13;

/// Read buffer size; leaves room for appended fields from newer firmware.
const READ_BUF_LEN: usize = 64;

/// Version-1 wire layout. `postcard` writes `u8` as one byte and `f32` as
/// four LE bytes; `fixint::le` keeps the counter fixed-width too.
#[derive(Debug, Serialize, Deserialize)]
struct RecordV1 {
    version: u8,
    display_interval: f32,
    server_interval: f32,
    #[serde(with = "postcard::fixint::le")]
    boot_count: u32,
}

/// Encode a config record into its fixed-width form.
pub fn encode_record(cfg: &PersistentConfig) -> Result<[u8; RECORD_LEN], StoreError> {
    let record = RecordV1 {
        version: RECORD_VERSION,
        display_interval: cfg.display_interval,
        server_interval: cfg.server_interval,
        boot_count: cfg.boot_count,
    };
    let mut buf = [0u8; RECORD_LEN];
    let used = postcard::to_slice(&record, &mut buf)
        .map_err(|_| StoreError::WriteFailure)?
        .len();
    if used != RECORD_LEN {
        return Err(StoreError::WriteFailure);
    }
    Ok(buf)
}

/// Decode a stored record without range-checking it.
///
/// Returns `None` for truncated blobs and version 0.
pub fn decode_record(bytes: &[u8]) -> Option<PersistentConfig> {
    if bytes.len() < RECORD_LEN {
        return None;
    }
    let (record, rest) = postcard::take_from_bytes::<RecordV1>(bytes).ok()?;
    if record.version == 0 {
        return None;
    }
    if record.version > RECORD_VERSION {
        info!(
            "ConfigStore: record v{} is newer than v{}, ignoring {} trailing bytes",
            record.version,
            RECORD_VERSION,
            rest.len()
        );
    }
    Some(PersistentConfig {
        display_interval: record.display_interval,
        server_interval: record.server_interval,
        boot_count: record.boot_count,
    })
}

/// Loads, sanitises and persists the [`PersistentConfig`] record.
pub struct ConfigStore<S: StoragePort> {
    storage: S,
}

impl<S: StoragePort> ConfigStore<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Read the record, replacing out-of-range fields with defaults.
    ///
    /// Never fails: a missing, unreadable or undecodable record yields
    /// [`PersistentConfig::default()`] (boot count 0).
    pub fn load(&self) -> PersistentConfig {
        let mut buf = [0u8; READ_BUF_LEN];
        let raw = match self.storage.read(STORE_NAMESPACE, STORE_KEY, &mut buf) {
            Ok(len) => decode_record(&buf[..len]).unwrap_or_else(|| {
                warn!("ConfigStore: stored record unreadable ({} bytes), using defaults", len);
                PersistentConfig::default()
            }),
            Err(StorageError::NotFound) => {
                info!("ConfigStore: no stored record, using defaults");
                PersistentConfig::default()
            }
            Err(e) => {
                warn!("ConfigStore: read failed ({}), using defaults", e);
                PersistentConfig::default()
            }
        };

        let cfg = raw.sanitized();
        if cfg.display_interval.to_bits() != raw.display_interval.to_bits() {
            warn!(
                "ConfigStore: display_interval {} out of range, reset to {}",
                raw.display_interval, cfg.display_interval
            );
        }
        if cfg.server_interval.to_bits() != raw.server_interval.to_bits() {
            warn!(
                "ConfigStore: server_interval {} out of range, reset to {}",
                raw.server_interval, cfg.server_interval
            );
        }
        cfg
    }

    /// Write the full record as one atomic blob.
    pub fn save(&mut self, cfg: &PersistentConfig) -> Result<(), StoreError> {
        let bytes = encode_record(cfg)?;
        self.storage.write(STORE_NAMESPACE, STORE_KEY, &bytes)?;
        info!(
            "ConfigStore: saved display={} server={} boots={}",
            cfg.display_interval, cfg.server_interval, cfg.boot_count
        );
        Ok(())
    }

    /// Borrow the underlying storage (diagnostics and tests).
    pub fn storage(&self) -> &S {
        &self.storage
    }
}
