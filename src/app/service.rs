//! Node service: the hexagonal core.
//!
//! [`NodeService`] owns the parameter tracker, the sampler, the transmission
//! engine and the scheduler state. It is shared by `Arc` between the tick
//! loop, the push worker and the command thread; every method takes `&self`
//! and the components do their own locking.
//!
//! The tick loop never touches the network. A due scheduled push hands its
//! snapshot to the push worker through a [`Signal`]; the worker sends it with
//! [`NodeService::run_pending_push`]. A snapshot still waiting when the next
//! one is queued is replaced by the newer one.
//!
//! ```text
//!  RegisterReader ──▶ ┌──────────────────────────┐ ──▶ EventSink
//!                     │        NodeService        │
//!    StoragePort ◀──▶ │ Tracker · Sampler · Push  │ ──▶ PushTransport
//!                     └──────────────────────────┘
//!              ▲ run_tick   ▲ run_pending_push   ▲ handle_command
//! ```

use std::sync::{Mutex, PoisonError};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use log::{debug, info, warn};

use crate::config::NodeSettings;
use crate::params::{ChangeSource, ParameterId, ParameterTracker, SetOutcome};
use crate::sampler::{ReadingSampler, ReadingSnapshot};
use crate::scheduler::Scheduler;
use crate::store::ConfigStore;
use crate::timestamp::Timestamp;
use crate::transmit::{Endpoint, SendCounters, TransmissionEngine, TransmissionOutcome};

use super::commands::{
    ActionResult, CommandResponse, ConfigReport, Dispatch, NodeCommand, ReadingsReport,
    STATUS_OK, parse_minutes,
};
use super::events::NodeEvent;
use super::ports::{
    DeviceIdentity, EventSink, PushTransport, RegisterReader, SchedulePhase, SchedulerDelegate,
    StoragePort,
};

/// Reason reported when `push_now` does not get a 2xx.
pub const SEND_FAILED: &str = "send_failed";

// ───────────────────────────────────────────────────────────────
// NodeService
// ───────────────────────────────────────────────────────────────

/// The process context: all mutable node state lives here.
pub struct NodeService<R: RegisterReader, S: StoragePort, T: PushTransport> {
    tracker: ParameterTracker<S>,
    sampler: ReadingSampler<R>,
    engine: TransmissionEngine<T>,
    scheduler: Mutex<Scheduler>,
    latest: Mutex<Option<ReadingSnapshot>>,
    /// Scheduled push waiting for the push worker.
    pending_push: Signal<CriticalSectionRawMutex, ReadingSnapshot>,
}

impl<R: RegisterReader, S: StoragePort, T: PushTransport> NodeService<R, S, T> {
    /// Load the persisted record, count this boot and build the core.
    ///
    /// Never fails: a missing or unwritable store leaves the node running on
    /// defaults.
    pub fn boot(
        identity: DeviceIdentity,
        settings: &NodeSettings,
        reader: R,
        storage: S,
        transport: T,
        now: Timestamp,
        sink: &mut impl EventSink,
    ) -> Self {
        let mut store = ConfigStore::new(storage);
        let mut persisted = store.load();
        persisted.boot_count = persisted.boot_count.saturating_add(1);
        if let Err(e) = store.save(&persisted) {
            warn!("NodeService: boot counter not persisted: {}", e);
            sink.emit(&NodeEvent::PersistFailed);
        }

        let tracker = ParameterTracker::initialize(store, &persisted, now);
        let sampler = ReadingSampler::new(reader, settings.channels.clone());
        let engine = TransmissionEngine::new(transport, Endpoint::from(settings), identity);

        info!(
            "NodeService: boot #{} as {} fw {} (display={} min, server={} min)",
            persisted.boot_count,
            engine.identity().device_id,
            engine.identity().firmware_version,
            persisted.display_interval,
            persisted.server_interval
        );
        sink.emit(&NodeEvent::Booted {
            boot_count: persisted.boot_count,
        });

        Self {
            tracker,
            sampler,
            engine,
            scheduler: Mutex::new(Scheduler::new()),
            latest: Mutex::new(None),
            pending_push: Signal::new(),
        }
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one scheduler tick at uptime `uptime_ms`.
    ///
    /// Never blocks on the network: a due push is only queued.
    pub fn run_tick(&self, uptime_ms: u64, now: Timestamp, sink: &mut impl EventSink) {
        let display = self.tracker.value(ParameterId::DisplayInterval);
        let server = self.tracker.value(ParameterId::ServerInterval);

        let mut scheduler = self.scheduler.lock().unwrap_or_else(PoisonError::into_inner);
        let mut delegate = TickDelegate {
            service: self,
            now,
            sink,
            fresh: None,
        };
        scheduler.tick(uptime_ms, display, server, &mut delegate);
    }

    /// Send the queued scheduled push, if any.
    ///
    /// Called in a loop by the push worker. Returns `None` when nothing was
    /// queued.
    pub fn run_pending_push(&self, sink: &mut impl EventSink) -> Option<TransmissionOutcome> {
        let snapshot = self.pending_push.try_take()?;
        Some(self.engine.push(&snapshot, sink))
    }

    // ── Command handling ──────────────────────────────────────

    /// Execute one remote command.
    pub fn handle_command(
        &self,
        cmd: NodeCommand,
        now: Timestamp,
        sink: &mut impl EventSink,
    ) -> Dispatch {
        debug!("NodeService: command {:?}", cmd);
        let response = match cmd {
            NodeCommand::GetReadings => {
                let snapshot = self.take_sample(now);
                CommandResponse::Readings(self.readings_report(&snapshot))
            }
            NodeCommand::GetConfig => CommandResponse::Config(self.config_report()),
            NodeCommand::SetDisplayInterval(arg) => CommandResponse::Action(self.set_interval(
                ParameterId::DisplayInterval,
                &arg,
                now,
                sink,
            )),
            NodeCommand::SetServerInterval(arg) => CommandResponse::Action(self.set_interval(
                ParameterId::ServerInterval,
                &arg,
                now,
                sink,
            )),
            NodeCommand::PushNow => CommandResponse::Action(self.push_now(now, sink)),
            NodeCommand::SoftReset => {
                info!("NodeService: soft reset requested");
                return Dispatch::Restart;
            }
        };
        Dispatch::Respond(response)
    }

    /// Sample and push immediately, waiting for any push already in flight.
    pub fn push_now(&self, now: Timestamp, sink: &mut impl EventSink) -> ActionResult {
        let snapshot = self.take_sample(now);
        let outcome = self.engine.push(&snapshot, sink);
        let result = if outcome.success {
            ActionResult::ok()
        } else {
            ActionResult::error(SEND_FAILED)
        };
        result.with_http_status(outcome.status_code)
    }

    fn set_interval(
        &self,
        id: ParameterId,
        arg: &str,
        now: Timestamp,
        sink: &mut impl EventSink,
    ) -> ActionResult {
        let applied = parse_minutes(arg)
            .and_then(|value| self.tracker.set(id, value, ChangeSource::RemoteCommand, now));
        match applied {
            Ok(SetOutcome::Updated { persisted }) => {
                let p = self.tracker.get(id);
                sink.emit(&NodeEvent::IntervalChanged {
                    parameter: id,
                    value: p.current_value,
                    source: p.last_changed_source,
                });
                if !persisted {
                    sink.emit(&NodeEvent::PersistFailed);
                }
                ActionResult::ok()
            }
            Ok(SetOutcome::Unchanged) => ActionResult::ok(),
            Err(e) => {
                info!("NodeService: {} rejected {:?}: {}", id.name(), arg, e);
                ActionResult::error(e.reason())
            }
        }
    }

    // ── Queries ───────────────────────────────────────────────

    /// Identity, counters and both parameters with provenance.
    pub fn config_report(&self) -> ConfigReport {
        let identity = self.engine.identity();
        let counters = self.engine.counters();
        ConfigReport {
            status: STATUS_OK,
            device_id: identity.device_id.clone(),
            firmware_version: identity.firmware_version,
            boot_count: self.tracker.boot_count(),
            send_success_count: counters.success,
            send_fail_count: counters.failed,
            display_interval: self.tracker.get(ParameterId::DisplayInterval).into(),
            server_interval: self.tracker.get(ParameterId::ServerInterval).into(),
        }
    }

    /// Render a snapshot with the current identity and intervals.
    pub fn readings_report(&self, snapshot: &ReadingSnapshot) -> ReadingsReport {
        let identity = self.engine.identity();
        ReadingsReport {
            status: STATUS_OK,
            sample_id: snapshot.sample_id,
            device_id: identity.device_id.clone(),
            firmware_version: identity.firmware_version,
            server_interval: self.tracker.value(ParameterId::ServerInterval),
            display_interval: self.tracker.value(ParameterId::DisplayInterval),
            unix_ts: snapshot.taken_at.as_unix_secs(),
            iso_time: snapshot.taken_at.to_iso8601(),
            values: snapshot.channels.clone(),
        }
    }

    pub fn counters(&self) -> SendCounters {
        self.engine.counters()
    }

    pub fn tracker(&self) -> &ParameterTracker<S> {
        &self.tracker
    }

    /// Most recent snapshot from any path, if one was taken yet.
    pub fn latest_snapshot(&self) -> Option<ReadingSnapshot> {
        self.latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    // ── Internal ──────────────────────────────────────────────

    fn take_sample(&self, now: Timestamp) -> ReadingSnapshot {
        let snapshot = self.sampler.sample(now);
        *self.latest.lock().unwrap_or_else(PoisonError::into_inner) = Some(snapshot.clone());
        snapshot
    }
}

// ───────────────────────────────────────────────────────────────
// Scheduler delegate
// ───────────────────────────────────────────────────────────────

/// Bridges scheduler phases to the service for the duration of one tick.
struct TickDelegate<'a, R: RegisterReader, S: StoragePort, T: PushTransport, K: EventSink> {
    service: &'a NodeService<R, S, T>,
    now: Timestamp,
    sink: &'a mut K,
    /// Snapshot taken by this tick's sample phase.
    fresh: Option<ReadingSnapshot>,
}

impl<R, S, T, K> SchedulerDelegate for TickDelegate<'_, R, S, T, K>
where
    R: RegisterReader,
    S: StoragePort,
    T: PushTransport,
    K: EventSink,
{
    fn on_phase_due(&mut self, phase: SchedulePhase) {
        match phase {
            SchedulePhase::Sample => {
                let snapshot = self.service.take_sample(self.now);
                self.sink.emit(&NodeEvent::Sampled(snapshot.clone()));
                self.fresh = Some(snapshot);
            }
            SchedulePhase::Push => {
                let snapshot = match self.fresh.take() {
                    Some(s) => s,
                    None => self.service.take_sample(self.now),
                };
                if self.service.pending_push.signaled() {
                    warn!("NodeService: previous push still queued, replacing it");
                }
                self.service.pending_push.signal(snapshot);
            }
        }
    }
}
