//! Reading sampler.
//!
//! Walks the configured channel table once per call, reading each register
//! through the [`RegisterReader`] port. A failed read never aborts the
//! sample: the channel is marked invalid and carries
//! [`UNAVAILABLE_SENTINEL`].

use std::sync::{Mutex, PoisonError};

use log::{debug, warn};
use serde::Serialize;

use crate::app::ports::RegisterReader;
use crate::config::{ChannelName, ChannelSpec, MAX_CHANNELS, UNAVAILABLE_SENTINEL};
use crate::timestamp::Timestamp;

/// One channel's reading.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelValue {
    pub name: ChannelName,
    pub value: f32,
    pub valid: bool,
}

/// All channel values taken in one pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadingSnapshot {
    /// Process-scoped, starts at 1, strictly increasing.
    pub sample_id: u64,
    pub taken_at: Timestamp,
    pub channels: heapless::Vec<ChannelValue, MAX_CHANNELS>,
}

impl ReadingSnapshot {
    /// `true` when no channel produced a reading. Still a valid snapshot.
    pub fn all_invalid(&self) -> bool {
        self.channels.iter().all(|c| !c.valid)
    }

    pub fn get(&self, name: &str) -> Option<&ChannelValue> {
        self.channels.iter().find(|c| c.name == name)
    }
}

struct BusState<R> {
    reader: R,
    last_id: u64,
}

/// Produces [`ReadingSnapshot`]s with monotonically increasing ids.
///
/// The reader and the id counter share one lock, so ids are handed out in
/// the same order the bus is walked even with concurrent callers.
pub struct ReadingSampler<R: RegisterReader> {
    bus: Mutex<BusState<R>>,
    channels: heapless::Vec<ChannelSpec, MAX_CHANNELS>,
}

impl<R: RegisterReader> ReadingSampler<R> {
    pub fn new(reader: R, channels: heapless::Vec<ChannelSpec, MAX_CHANNELS>) -> Self {
        Self {
            bus: Mutex::new(BusState { reader, last_id: 0 }),
            channels,
        }
    }

    pub fn channels(&self) -> &[ChannelSpec] {
        &self.channels
    }

    /// Read every channel and stamp the result with the next sample id.
    pub fn sample(&self, now: Timestamp) -> ReadingSnapshot {
        let mut bus = self.bus.lock().unwrap_or_else(PoisonError::into_inner);
        bus.last_id += 1;
        let sample_id = bus.last_id;

        let mut channels = heapless::Vec::new();
        for spec in &self.channels {
            let value = match bus.reader.read_register(spec.unit_id, spec.register) {
                Ok(raw) => ChannelValue {
                    name: spec.name.clone(),
                    value: spec.scale_raw(raw),
                    valid: true,
                },
                Err(e) => {
                    warn!(
                        "Sampler: {} (unit {} reg {}) unavailable: {}",
                        spec.name, spec.unit_id, spec.register, e
                    );
                    ChannelValue {
                        name: spec.name.clone(),
                        value: UNAVAILABLE_SENTINEL,
                        valid: false,
                    }
                }
            };
            // Capacity matches the channel table's.
            let _ = channels.push(value);
        }
        debug!("Sampler: sample #{} ({} channels)", sample_id, channels.len());

        ReadingSnapshot {
            sample_id,
            taken_at: now,
            channels,
        }
    }
}
