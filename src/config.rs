//! Node configuration parameters
//!
//! Compile-time limits and defaults for the two tunable intervals, the
//! durable [`PersistentConfig`] record, and the runtime [`NodeSettings`]
//! (push endpoint, loop timing, sensor channel table).

use core::time::Duration;

use serde::{Deserialize, Serialize};

// --- Interval limits (minutes) ---

/// Lower bound for both the display and the server interval.
pub const INTERVAL_MIN_MINUTES: f32 = 0.1;
/// Upper bound for both the display and the server interval.
pub const INTERVAL_MAX_MINUTES: f32 = 60.0;
/// Display (local sample) interval used when the stored value is unusable.
pub const DEFAULT_DISPLAY_INTERVAL_MINUTES: f32 = 1.0;
/// Server (push) interval used when the stored value is unusable.
pub const DEFAULT_SERVER_INTERVAL_MINUTES: f32 = 5.0;
/// Two interval values closer than this are the same setting.
pub const CHANGE_EPSILON: f32 = 1e-4;

// --- Sampling ---

/// Value recorded for a channel whose register read failed.
pub const UNAVAILABLE_SENTINEL: f32 = -1.0;
/// Maximum number of sensor channels per snapshot (stack-allocated).
pub const MAX_CHANNELS: usize = 8;

// --- Timing ---

/// Scheduler tick period. Must stay at or below one second.
pub const DEFAULT_TICK_MS: u32 = 500;
/// Upper bound on a single push round-trip.
pub const DEFAULT_PUSH_TIMEOUT: Duration = Duration::from_secs(5);

// --- Persistence ---

/// Storage namespace holding the config record.
pub const STORE_NAMESPACE: &str = "envnode";
/// Storage key of the config record.
pub const STORE_KEY: &str = "nodecfg";

/// Wire-payload keys a channel name may not shadow.
pub const RESERVED_PAYLOAD_KEYS: [&str; 3] = ["device_id", "firmware_version", "unix_timestamp"];

/// Valid range and fallback value of one interval parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntervalBounds {
    pub min: f32,
    pub max: f32,
    pub default: f32,
}

impl IntervalBounds {
    /// Inclusive range check. NaN and infinities are never in range.
    pub fn contains(&self, value: f32) -> bool {
        value.is_finite() && (self.min..=self.max).contains(&value)
    }

    /// `value` if in range, otherwise the default.
    pub fn or_default(&self, value: f32) -> f32 {
        if self.contains(value) { value } else { self.default }
    }
}

pub const DISPLAY_INTERVAL_BOUNDS: IntervalBounds = IntervalBounds {
    min: INTERVAL_MIN_MINUTES,
    max: INTERVAL_MAX_MINUTES,
    default: DEFAULT_DISPLAY_INTERVAL_MINUTES,
};

pub const SERVER_INTERVAL_BOUNDS: IntervalBounds = IntervalBounds {
    min: INTERVAL_MIN_MINUTES,
    max: INTERVAL_MAX_MINUTES,
    default: DEFAULT_SERVER_INTERVAL_MINUTES,
};

/// Durable projection of both interval parameters plus the boot counter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PersistentConfig {
    /// Local sample/display interval (minutes).
    pub display_interval: f32,
    /// Server push interval (minutes).
    pub server_interval: f32,
    /// Process starts recorded so far.
    pub boot_count: u32,
}

impl Default for PersistentConfig {
    fn default() -> Self {
        Self {
            display_interval: DEFAULT_DISPLAY_INTERVAL_MINUTES,
            server_interval: DEFAULT_SERVER_INTERVAL_MINUTES,
            boot_count: 0,
        }
    }
}

impl PersistentConfig {
    /// Replace every out-of-range interval with its default.
    pub fn sanitized(self) -> Self {
        Self {
            display_interval: DISPLAY_INTERVAL_BOUNDS.or_default(self.display_interval),
            server_interval: SERVER_INTERVAL_BOUNDS.or_default(self.server_interval),
            boot_count: self.boot_count,
        }
    }
}

/// Channel name as it appears in snapshots and the wire payload.
pub type ChannelName = heapless::String<16>;

/// One sensor channel: where to read it on the bus and how to scale it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelSpec {
    pub name: ChannelName,
    /// Bus slave address.
    pub unit_id: u8,
    /// Holding register index.
    pub register: u16,
    /// Interpret the raw register as two's-complement.
    pub signed: bool,
    /// `value = raw * scale + offset`
    pub scale: f32,
    pub offset: f32,
}

impl ChannelSpec {
    /// Fails when `name` does not fit in a [`ChannelName`] (16 bytes).
    pub fn new(
        name: &str,
        unit_id: u8,
        register: u16,
        signed: bool,
        scale: f32,
    ) -> Result<Self, &'static str> {
        let name = ChannelName::try_from(name).map_err(|_| "channel name longer than 16 bytes")?;
        Ok(Self {
            name,
            unit_id,
            register,
            signed,
            scale,
            offset: 0.0,
        })
    }

    /// Convert a raw register word to engineering units.
    pub fn scale_raw(&self, raw: u16) -> f32 {
        let raw = if self.signed {
            f32::from(raw as i16)
        } else {
            f32::from(raw)
        };
        raw * self.scale + self.offset
    }
}

/// Runtime settings that are fixed for the life of the process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSettings {
    // --- Push endpoint ---
    /// Full URL the telemetry payload is POSTed to.
    pub endpoint_url: String,
    /// Header carrying the shared secret.
    pub auth_header: String,
    /// Shared secret sent with every push.
    pub shared_secret: String,
    /// Push round-trip bound (milliseconds).
    pub push_timeout_ms: u32,

    // --- Timing ---
    /// Scheduler tick period (milliseconds).
    pub tick_ms: u32,

    // --- Sensors ---
    pub channels: heapless::Vec<ChannelSpec, MAX_CHANNELS>,
}

impl Default for NodeSettings {
    fn default() -> Self {
        let mut channels = heapless::Vec::new();
        // RS-485 temperature/humidity probe at address 1:
        // reg 0 = RH x10, reg 1 = degC x10 (signed).
        let probe = [
            ChannelSpec::new("humidity", 1, 0x0000, false, 0.1),
            ChannelSpec::new("temperature", 1, 0x0001, true, 0.1),
        ];
        for spec in probe.into_iter().flatten() {
            let _ = channels.push(spec);
        }

        Self {
            endpoint_url: String::from("http://telemetry.local:8080/api/v1/readings"),
            auth_header: String::from("X-Api-Key"),
            shared_secret: String::from("change-me"),
            push_timeout_ms: DEFAULT_PUSH_TIMEOUT.as_millis() as u32,
            tick_ms: DEFAULT_TICK_MS,
            channels,
        }
    }
}

impl NodeSettings {
    pub fn push_timeout(&self) -> Duration {
        Duration::from_millis(u64::from(self.push_timeout_ms))
    }

    /// Range-check the settings before the node starts with them.
    pub fn validate(&self) -> Result<(), &'static str> {
        if !(self.endpoint_url.starts_with("http://") || self.endpoint_url.starts_with("https://")) {
            return Err("endpoint_url must be an http(s) URL");
        }
        if self.auth_header.is_empty() {
            return Err("auth_header must not be empty");
        }
        if !(100..=1000).contains(&self.tick_ms) {
            return Err("tick_ms must be 100-1000");
        }
        if !(500..=30_000).contains(&self.push_timeout_ms) {
            return Err("push_timeout_ms must be 500-30000");
        }
        if self.channels.is_empty() {
            return Err("at least one channel is required");
        }
        for (i, ch) in self.channels.iter().enumerate() {
            if ch.name.is_empty() {
                return Err("channel name must not be empty");
            }
            if RESERVED_PAYLOAD_KEYS.contains(&ch.name.as_str()) {
                return Err("channel name collides with a payload field");
            }
            if self.channels[..i].iter().any(|other| other.name == ch.name) {
                return Err("channel names must be unique");
            }
            if !ch.scale.is_finite() || !ch.offset.is_finite() {
                return Err("channel scale/offset must be finite");
            }
        }
        Ok(())
    }
}
