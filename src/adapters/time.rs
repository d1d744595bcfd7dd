//! System clock adapter.
//!
//! Implements [`ClockPort`]:
//!
//! - **`target_os = "espidf"`**: uptime from `esp_timer_get_time()`
//!   (microsecond, monotonic), wall clock from `gettimeofday()` as kept by
//!   SNTP.
//! - **`not(target_os = "espidf")`**: `std::time::Instant` and
//!   `SystemTime` for host-side testing and simulation.

use crate::app::ports::ClockPort;
use crate::timestamp::Timestamp;

/// Wall-clock values before this (2020-01-01) mean SNTP has not synced yet.
pub const SYNCED_AFTER_UNIX: u64 = 1_577_836_800;

pub struct SystemClock {
    #[cfg(not(target_os = "espidf"))]
    start: std::time::Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            start: std::time::Instant::now(),
        }
    }

    /// `true` once the wall clock has been set from the network.
    pub fn is_synced(&self) -> bool {
        self.now().as_unix_secs() >= SYNCED_AFTER_UNIX
    }
}

impl ClockPort for SystemClock {
    #[cfg(target_os = "espidf")]
    fn uptime_ms(&self) -> u64 {
        (unsafe { esp_idf_svc::sys::esp_timer_get_time() }) as u64 / 1_000
    }

    #[cfg(not(target_os = "espidf"))]
    fn uptime_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    #[cfg(target_os = "espidf")]
    fn now(&self) -> Timestamp {
        let mut tv = esp_idf_svc::sys::timeval {
            tv_sec: 0,
            tv_usec: 0,
        };
        if unsafe { esp_idf_svc::sys::gettimeofday(&mut tv, core::ptr::null_mut()) } != 0 {
            return Timestamp::EPOCH;
        }
        Timestamp::from_unix_secs(u64::try_from(tv.tv_sec).unwrap_or(0))
    }

    #[cfg(not(target_os = "espidf"))]
    fn now(&self) -> Timestamp {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_or(Timestamp::EPOCH, |d| Timestamp::from_unix_secs(d.as_secs()))
    }
}
