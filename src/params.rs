//! Configuration parameter tracker.
//!
//! Each tunable interval is held as a [`ConfigParameter`]: its value plus who
//! changed it last and when. Readers copy the whole record under one critical
//! section, so a concurrent `set` is observed either completely or not at all.
//!
//! Writers are serialised by a second lock that also owns the
//! [`ConfigStore`]; the merged [`PersistentConfig`] is therefore always built
//! from a consistent pair of values.

use core::cell::Cell;
use std::sync::{Mutex, PoisonError};

use embassy_sync::blocking_mutex::Mutex as CsMutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use log::{info, warn};

use crate::app::ports::StoragePort;
use crate::config::{
    CHANGE_EPSILON, DISPLAY_INTERVAL_BOUNDS, IntervalBounds, PersistentConfig,
    SERVER_INTERVAL_BOUNDS,
};
use crate::error::ValidationError;
use crate::store::ConfigStore;
use crate::timestamp::Timestamp;

/// Which tunable a call refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterId {
    /// Local sample/display interval.
    DisplayInterval,
    /// Server push interval.
    ServerInterval,
}

impl ParameterId {
    pub const ALL: [Self; 2] = [Self::DisplayInterval, Self::ServerInterval];

    pub const fn bounds(self) -> IntervalBounds {
        match self {
            Self::DisplayInterval => DISPLAY_INTERVAL_BOUNDS,
            Self::ServerInterval => SERVER_INTERVAL_BOUNDS,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::DisplayInterval => "display_interval",
            Self::ServerInterval => "server_interval",
        }
    }
}

/// Where the current value of a parameter came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeSource {
    /// Set while booting from the loaded record.
    InitialLoad,
    /// Restored from the persistent store after boot.
    ///
    /// Part of the reported data model only; boot-time loads are tagged
    /// [`InitialLoad`](Self::InitialLoad) and nothing sets this today.
    PersistedStore,
    /// Changed through the remote command channel.
    RemoteCommand,
}

impl ChangeSource {
    /// Tag reported in `get_config` responses.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InitialLoad => "Boot",
            Self::PersistedStore => "NVS",
            Self::RemoteCommand => "Cloud/UI",
        }
    }
}

/// A tunable value together with its provenance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfigParameter {
    /// Minutes, always within the parameter's bounds.
    pub current_value: f32,
    pub last_changed_at: Timestamp,
    pub last_changed_source: ChangeSource,
}

/// Result of an accepted [`ParameterTracker::set`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOutcome {
    /// Value changed. `persisted` is `false` when the store write failed.
    Updated { persisted: bool },
    /// Within [`CHANGE_EPSILON`] of the current value; nothing touched.
    Unchanged,
}

type ParamCell = CsMutex<CriticalSectionRawMutex, Cell<ConfigParameter>>;

struct StoreState<S: StoragePort> {
    store: ConfigStore<S>,
    boot_count: u32,
}

/// Sole writer of both [`ConfigParameter`]s and of the persisted record.
pub struct ParameterTracker<S: StoragePort> {
    display: ParamCell,
    server: ParamCell,
    writer: Mutex<StoreState<S>>,
}

impl<S: StoragePort> ParameterTracker<S> {
    /// Seed both parameters from `persisted`, tagged as loaded at boot.
    ///
    /// `persisted` is expected to have been sanitised by
    /// [`ConfigStore::load`]; out-of-range fields are defaulted again anyway.
    pub fn initialize(store: ConfigStore<S>, persisted: &PersistentConfig, now: Timestamp) -> Self {
        let persisted = persisted.sanitized();
        let seed = |value: f32| {
            CsMutex::new(Cell::new(ConfigParameter {
                current_value: value,
                last_changed_at: now,
                last_changed_source: ChangeSource::InitialLoad,
            }))
        };
        Self {
            display: seed(persisted.display_interval),
            server: seed(persisted.server_interval),
            writer: Mutex::new(StoreState {
                store,
                boot_count: persisted.boot_count,
            }),
        }
    }

    fn cell(&self, id: ParameterId) -> &ParamCell {
        match id {
            ParameterId::DisplayInterval => &self.display,
            ParameterId::ServerInterval => &self.server,
        }
    }

    /// Snapshot of one parameter.
    pub fn get(&self, id: ParameterId) -> ConfigParameter {
        self.cell(id).lock(Cell::get)
    }

    /// Current value of one parameter, in minutes.
    pub fn value(&self, id: ParameterId) -> f32 {
        self.get(id).current_value
    }

    /// Boot counter as loaded (and incremented) at start-up.
    pub fn boot_count(&self) -> u32 {
        self.writer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .boot_count
    }

    /// The record that would be persisted right now.
    pub fn persisted_snapshot(&self) -> PersistentConfig {
        let state = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        self.merged(state.boot_count)
    }

    fn merged(&self, boot_count: u32) -> PersistentConfig {
        PersistentConfig {
            display_interval: self.value(ParameterId::DisplayInterval),
            server_interval: self.value(ParameterId::ServerInterval),
            boot_count,
        }
    }

    /// Validate and apply a new value, then persist the merged record.
    ///
    /// A failed store write leaves the new value in place; the next accepted
    /// change writes the full record again.
    pub fn set(
        &self,
        id: ParameterId,
        value: f32,
        source: ChangeSource,
        now: Timestamp,
    ) -> Result<SetOutcome, ValidationError> {
        if !id.bounds().contains(value) {
            return Err(ValidationError::OutOfRange);
        }

        let mut state = self.writer.lock().unwrap_or_else(PoisonError::into_inner);

        let previous = self.get(id);
        if (value - previous.current_value).abs() < CHANGE_EPSILON {
            return Ok(SetOutcome::Unchanged);
        }

        let updated = ConfigParameter {
            current_value: value,
            last_changed_at: previous.last_changed_at.max(now),
            last_changed_source: source,
        };
        self.cell(id).lock(|c| c.set(updated));
        info!(
            "Params: {} {} -> {} ({})",
            id.name(),
            previous.current_value,
            value,
            source.as_str()
        );

        let record = self.merged(state.boot_count);
        let persisted = match state.store.save(&record) {
            Ok(()) => true,
            Err(e) => {
                warn!("Params: {} kept in memory only: {}", id.name(), e);
                false
            }
        };
        Ok(SetOutcome::Updated { persisted })
    }
}
