//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing each [`NodeEvent`] as one structured
//! line to the ESP-IDF logger (UART / USB-CDC in production). This is the
//! node's local display channel; a screen or cloud event publisher would
//! implement the same trait.

use core::fmt::Write;

use log::{info, warn};

use crate::app::events::NodeEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`NodeEvent`] to the serial console.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &NodeEvent) {
        match event {
            NodeEvent::Booted { boot_count } => {
                info!("BOOT  | boot_count={}", boot_count);
            }
            NodeEvent::Sampled(snap) => {
                let mut line = String::with_capacity(96);
                for ch in &snap.channels {
                    if ch.valid {
                        let _ = write!(line, " {}={:.1}", ch.name, ch.value);
                    } else {
                        let _ = write!(line, " {}=n/a", ch.name);
                    }
                }
                info!(
                    "READ  | id={} t={}{}",
                    snap.sample_id,
                    snap.taken_at.to_iso8601(),
                    line
                );
            }
            NodeEvent::PushSucceeded { sample_id, status } => {
                info!("PUSH  | ok id={} http={}", sample_id, status);
            }
            NodeEvent::PushFailed {
                sample_id,
                status,
                reason,
            } => {
                warn!(
                    "PUSH  | failed id={} http={} reason={}",
                    sample_id, status, reason
                );
            }
            NodeEvent::IntervalChanged {
                parameter,
                value,
                source,
            } => {
                info!(
                    "CONF  | {}={} min source={}",
                    parameter.name(),
                    value,
                    source.as_str()
                );
            }
            NodeEvent::PersistFailed => {
                warn!("CONF  | persist failed, running on in-memory values");
            }
        }
    }
}
