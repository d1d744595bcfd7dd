//! Telemetry wire payload.
//!
//! A flat JSON object: the three identity/time fields followed by one numeric
//! field per channel, in channel-table order.
//!
//! ```json
//! {"device_id":"EN-EFCAFE","firmware_version":"0.3.0",
//!  "unix_timestamp":1709296496,"humidity":48.2,"temperature":21.5}
//! ```
//!
//! Unavailable channels carry the `-1.0` sentinel so the receiver sees every
//! configured key on every push.

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::app::ports::DeviceIdentity;
use crate::error::TransmissionFailure;
use crate::sampler::ReadingSnapshot;

/// Borrowed view that serialises a snapshot for the push endpoint.
pub struct WirePayload<'a> {
    pub identity: &'a DeviceIdentity,
    pub snapshot: &'a ReadingSnapshot,
}

impl Serialize for WirePayload<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let channels = &self.snapshot.channels;
        let mut map = serializer.serialize_map(Some(3 + channels.len()))?;
        map.serialize_entry("device_id", self.identity.device_id.as_str())?;
        map.serialize_entry("firmware_version", self.identity.firmware_version)?;
        map.serialize_entry("unix_timestamp", &self.snapshot.taken_at.as_unix_secs())?;
        for ch in channels {
            map.serialize_entry(ch.name.as_str(), &ch.value)?;
        }
        map.end()
    }
}

/// Encode a snapshot as the POST body.
pub fn encode(identity: &DeviceIdentity, snapshot: &ReadingSnapshot) -> Result<Vec<u8>, TransmissionFailure> {
    serde_json::to_vec(&WirePayload { identity, snapshot }).map_err(|_| TransmissionFailure::Encoding)
}
