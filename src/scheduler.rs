//! Dual-interval scheduler.
//!
//! Tracks the uptime of the last sample and the last push and, once per
//! tick, tells a [`SchedulerDelegate`] which phases are due. Intervals are
//! passed in on every tick, so a changed parameter takes effect on the next
//! tick without any reset.
//!
//! ```text
//!   tick(now) ──▶ now - last_sample ≥ display? ──▶ on_phase_due(Sample)
//!             └─▶ now - last_push   ≥ server?  ──▶ on_phase_due(Push)
//! ```
//!
//! The scheduler never looks at what a phase did; a failed push still
//! advances `last_push`, and the sample phase is never gated by it.

use log::debug;

use crate::app::ports::{SchedulePhase, SchedulerDelegate};

/// Convert an interval in minutes to whole milliseconds.
pub fn minutes_to_ms(minutes: f32) -> u64 {
    if minutes.is_finite() && minutes > 0.0 {
        (f64::from(minutes) * 60_000.0).round() as u64
    } else {
        0
    }
}

/// Owner of the two "time of last action" values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Scheduler {
    last_sample_ms: u64,
    last_push_ms: u64,
}

impl Scheduler {
    /// Both phases count from uptime 0 (boot).
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_sample_ms(&self) -> u64 {
        self.last_sample_ms
    }

    pub fn last_push_ms(&self) -> u64 {
        self.last_push_ms
    }

    /// Evaluate both phases at `now_ms` (uptime). Returns how many fired.
    pub fn tick(
        &mut self,
        now_ms: u64,
        display_interval_min: f32,
        server_interval_min: f32,
        delegate: &mut dyn SchedulerDelegate,
    ) -> u8 {
        let mut fired = 0;

        if now_ms.saturating_sub(self.last_sample_ms) >= minutes_to_ms(display_interval_min) {
            debug!("Scheduler: sample due at {} ms", now_ms);
            delegate.on_phase_due(SchedulePhase::Sample);
            self.last_sample_ms = now_ms;
            fired += 1;
        }

        if now_ms.saturating_sub(self.last_push_ms) >= minutes_to_ms(server_interval_min) {
            debug!("Scheduler: push due at {} ms", now_ms);
            delegate.on_phase_due(SchedulePhase::Push);
            self.last_push_ms = now_ms;
            fired += 1;
        }

        fired
    }
}
