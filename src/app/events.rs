//! Outbound node events.
//!
//! The core emits these through the [`EventSink`](super::ports::EventSink)
//! port. Adapters on the other side decide what to do with them: render to
//! the serial console, drive a display, publish to a cloud event stream.

use crate::params::{ChangeSource, ParameterId};
use crate::sampler::ReadingSnapshot;

/// Structured events emitted by the core.
#[derive(Debug, Clone)]
pub enum NodeEvent {
    /// The node finished booting (carries the freshly incremented counter).
    Booted { boot_count: u32 },

    /// A scheduled sample was taken; the local display/log renders it.
    Sampled(ReadingSnapshot),

    /// The endpoint accepted a push.
    PushSucceeded { sample_id: u64, status: u16 },

    /// A push failed. `status` is 0 when no response was received.
    PushFailed {
        sample_id: u64,
        status: u16,
        reason: &'static str,
    },

    /// An interval parameter changed value.
    IntervalChanged {
        parameter: ParameterId,
        value: f32,
        source: ChangeSource,
    },

    /// The config record could not be written; the running value stands.
    PersistFailed,
}
