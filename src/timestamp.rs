//! Wall-clock timestamps (unix seconds, UTC).

use core::fmt::Write;

use serde::{Deserialize, Serialize};

/// ISO-8601 string, always `YYYY-MM-DDTHH:MM:SSZ` (20 chars).
pub type IsoString = heapless::String<24>;

/// Seconds since the unix epoch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(u64);

impl Timestamp {
    /// The epoch itself; what an unsynced clock reports.
    pub const EPOCH: Self = Self(0);

    pub const fn from_unix_secs(secs: u64) -> Self {
        Self(secs)
    }

    pub const fn as_unix_secs(self) -> u64 {
        self.0
    }

    /// Render as ISO-8601 UTC.
    pub fn to_iso8601(self) -> IsoString {
        let mut out = IsoString::new();
        let secs = i64::try_from(self.0).unwrap_or(i64::MAX);
        match chrono::DateTime::from_timestamp(secs, 0) {
            Some(dt) => {
                let _ = write!(out, "{}", dt.format("%Y-%m-%dT%H:%M:%SZ"));
            }
            None => {
                let _ = out.push_str("1970-01-01T00:00:00Z");
            }
        }
        out
    }
}

impl core::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}
