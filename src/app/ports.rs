//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ NodeService (domain)
//! ```
//!
//! Driven adapters (sensor bus, flash storage, HTTP client, clocks, event
//! sinks) implement these traits. The core consumes them via generics, so it
//! never touches hardware or the network directly.
//!
//! ## Contract notes
//!
//! - **StoragePort** writes MUST be atomic; no partial record is ever
//!   observable after a power loss. ESP-IDF NVS commits guarantee this; the
//!   in-memory simulation achieves it trivially.
//! - **PushTransport** MUST honour `PushRequest::timeout` on every network
//!   stage. It runs on the push worker or the command thread, never on the
//!   scheduler tick, so a slow exchange only delays the next push.
//! - All port errors are typed; callers handle every variant explicitly.

use core::time::Duration;

use crate::timestamp::Timestamp;

// ───────────────────────────────────────────────────────────────
// Register reader (driven adapter: sensor bus → domain)
// ───────────────────────────────────────────────────────────────

/// Read-side port onto the wired sensor bus.
///
/// The physical framing (addressing, CRC, turnaround) lives entirely in the
/// adapter; the domain only asks for one register at a time.
pub trait RegisterReader {
    /// Read one 16-bit holding register from slave `unit_id`.
    fn read_register(&mut self, unit_id: u8, register: u16) -> Result<u16, BusError>;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / display)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`NodeEvent`](super::events::NodeEvent)s
/// through this port. Adapters decide where they go (serial log, display,
/// cloud event stream).
pub trait EventSink {
    fn emit(&mut self, event: &super::events::NodeEvent);
}

// ───────────────────────────────────────────────────────────────
// Storage port (driven adapter: domain ↔ NVS / flash)
// ───────────────────────────────────────────────────────────────

/// Persistent key-value blob storage.
pub trait StoragePort {
    /// Read a value. Returns the number of bytes written to `buf`.
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError>;

    /// Write a value atomically.
    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Delete a key. Returns `Ok(())` even if the key didn't exist.
    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError>;

    /// Check whether a key exists without reading it.
    fn exists(&self, namespace: &str, key: &str) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Push transport port (driven adapter: domain → HTTP endpoint)
// ───────────────────────────────────────────────────────────────

/// One outbound telemetry request.
#[derive(Debug, Clone, Copy)]
pub struct PushRequest<'a> {
    pub url: &'a str,
    /// Extra headers (auth, content type), in send order.
    pub headers: &'a [(&'a str, &'a str)],
    pub body: &'a [u8],
    /// Per-stage bound on connect, send and response status.
    pub timeout: Duration,
}

/// Sends a request body and reports the response status code.
///
/// The response body is never read by the domain.
pub trait PushTransport {
    fn post(&mut self, request: &PushRequest<'_>) -> Result<u16, TransportError>;
}

// ───────────────────────────────────────────────────────────────
// Clock port (driven adapter: system timers → domain)
// ───────────────────────────────────────────────────────────────

/// Monotonic and wall-clock time sources.
pub trait ClockPort {
    /// Milliseconds since boot (monotonic).
    fn uptime_ms(&self) -> u64;

    /// Current wall-clock time. Reports [`Timestamp::EPOCH`]-relative values
    /// before the clock is synced.
    fn now(&self) -> Timestamp;
}

// ───────────────────────────────────────────────────────────────
// Identity provider output
// ───────────────────────────────────────────────────────────────

/// Fixed-size device identifier string.
pub type DeviceIdString = heapless::String<32>;

/// Who this node is, as reported in payloads and command responses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub device_id: DeviceIdString,
    pub firmware_version: &'static str,
}

// ───────────────────────────────────────────────────────────────
// Scheduler delegate (decouples scheduler timing from the actions)
// ───────────────────────────────────────────────────────────────

/// Callback trait that the [`Scheduler`](crate::scheduler::Scheduler)
/// invokes when one of its phases comes due.
pub trait SchedulerDelegate {
    /// Called at most once per phase per tick; `Sample` before `Push`.
    fn on_phase_due(&mut self, phase: SchedulePhase);
}

/// Discriminant passed to [`SchedulerDelegate::on_phase_due`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulePhase {
    /// Display interval elapsed: sample and render locally.
    Sample,
    /// Server interval elapsed: sample fresh and push.
    Push,
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`RegisterReader`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusError {
    /// No reply within the bus turnaround window.
    Timeout,
    /// Reply failed its integrity check.
    Corrupted,
    /// Slave answered with an exception code.
    Exception(u8),
}

/// Errors from [`StoragePort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Requested key does not exist.
    NotFound,
    /// Storage partition is full.
    Full,
    /// Generic I/O error.
    IoError,
}

/// Errors from [`PushTransport`] operations. All of them mean no status
/// line was received.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// DNS, TCP or TLS connection could not be established.
    Connect,
    /// The timeout elapsed before a status was received.
    Timeout,
    /// The connection broke mid-exchange or the reply was not HTTP.
    Io,
}

impl core::fmt::Display for BusError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Timeout => write!(f, "bus timeout"),
            Self::Corrupted => write!(f, "corrupted reply"),
            Self::Exception(code) => write!(f, "slave exception 0x{:02X}", code),
        }
    }
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "key not found"),
            Self::Full => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl core::fmt::Display for TransportError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Connect => write!(f, "connect failed"),
            Self::Timeout => write!(f, "timed out"),
            Self::Io => write!(f, "I/O error"),
        }
    }
}
