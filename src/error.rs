//! Error types for the EnvNode core.
//!
//! Every variant is `Copy` so errors pass through the scheduler and command
//! paths without allocation. None of them is fatal: the core keeps running
//! after any of these, and the only way the process stops is an explicit
//! reset command.

use core::fmt;

use crate::app::ports::{StorageError, TransportError};

// ---------------------------------------------------------------------------
// Validation errors (user-supplied values)
// ---------------------------------------------------------------------------

/// A remotely supplied value was rejected before any state changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    /// Value lies outside the parameter's bounds (or is not finite).
    OutOfRange,
    /// Argument text is not a number.
    Unparseable,
}

impl ValidationError {
    /// Machine-readable reason carried in command responses.
    pub const fn reason(self) -> &'static str {
        match self {
            Self::OutOfRange => "out_of_range",
            Self::Unparseable => "invalid_argument",
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfRange => write!(f, "value out of range"),
            Self::Unparseable => write!(f, "argument is not a number"),
        }
    }
}

// ---------------------------------------------------------------------------
// Store errors (persistence)
// ---------------------------------------------------------------------------

/// The persistence layer rejected a write. Logged, never surfaced to the
/// command caller: the in-memory change has already taken effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreError {
    WriteFailure,
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WriteFailure => write!(f, "config record write failed"),
        }
    }
}

impl From<StorageError> for StoreError {
    fn from(_: StorageError) -> Self {
        Self::WriteFailure
    }
}

// ---------------------------------------------------------------------------
// Transmission failures
// ---------------------------------------------------------------------------

/// Why a push did not succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransmissionFailure {
    /// Connect failure or timeout; no status was received.
    Unreachable,
    /// The server answered with a non-2xx status.
    ServerRejected(u16),
    /// The snapshot could not be serialized.
    Encoding,
}

impl TransmissionFailure {
    /// Status code to report for this failure (0 when none was received).
    pub const fn status_code(self) -> u16 {
        match self {
            Self::ServerRejected(status) => status,
            Self::Unreachable | Self::Encoding => 0,
        }
    }

    pub const fn tag(self) -> &'static str {
        match self {
            Self::Unreachable => "unreachable",
            Self::ServerRejected(_) => "server_rejected",
            Self::Encoding => "encoding",
        }
    }
}

impl fmt::Display for TransmissionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unreachable => write!(f, "endpoint unreachable"),
            Self::ServerRejected(status) => write!(f, "server rejected push (HTTP {status})"),
            Self::Encoding => write!(f, "payload encoding failed"),
        }
    }
}

impl From<TransportError> for TransmissionFailure {
    fn from(_: TransportError) -> Self {
        Self::Unreachable
    }
}
