//! Transmission engine.
//!
//! Turns a [`ReadingSnapshot`] into an authenticated JSON POST, classifies
//! the answer by status code alone, and keeps the success/failure counters.
//!
//! Only one push is ever in flight: the transport sits behind a mutex that
//! both the scheduled and the on-demand path acquire for the whole exchange.
//! Late callers block until the current push finishes; nothing is dropped.

use core::sync::atomic::{AtomicU32, Ordering};
use core::time::Duration;
use std::sync::{Mutex, PoisonError};

use log::{info, warn};

use crate::app::events::NodeEvent;
use crate::app::ports::{DeviceIdentity, EventSink, PushRequest, PushTransport};
use crate::config::NodeSettings;
use crate::error::TransmissionFailure;
use crate::payload;
use crate::sampler::ReadingSnapshot;

/// Result of one push attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransmissionOutcome {
    pub success: bool,
    /// HTTP status, or 0 when no response was received.
    pub status_code: u16,
    pub failure: Option<TransmissionFailure>,
}

impl TransmissionOutcome {
    fn accepted(status_code: u16) -> Self {
        Self {
            success: true,
            status_code,
            failure: None,
        }
    }

    fn failed(failure: TransmissionFailure) -> Self {
        Self {
            success: false,
            status_code: failure.status_code(),
            failure: Some(failure),
        }
    }
}

/// Map a transport result onto an outcome. Any 2xx is success.
pub fn classify<E>(result: Result<u16, E>) -> TransmissionOutcome
where
    TransmissionFailure: From<E>,
{
    match result {
        Ok(status) if (200..300).contains(&status) => TransmissionOutcome::accepted(status),
        Ok(status) => TransmissionOutcome::failed(TransmissionFailure::ServerRejected(status)),
        Err(e) => TransmissionOutcome::failed(TransmissionFailure::from(e)),
    }
}

/// Process-lifetime push counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SendCounters {
    pub success: u32,
    pub failed: u32,
}

/// Where and how pushes are sent.
#[derive(Debug, Clone)]
pub struct Endpoint {
    pub url: String,
    pub auth_header: String,
    pub shared_secret: String,
    pub timeout: Duration,
}

impl From<&NodeSettings> for Endpoint {
    fn from(s: &NodeSettings) -> Self {
        Self {
            url: s.endpoint_url.clone(),
            auth_header: s.auth_header.clone(),
            shared_secret: s.shared_secret.clone(),
            timeout: s.push_timeout(),
        }
    }
}

/// Serialises, sends and accounts for telemetry pushes.
pub struct TransmissionEngine<T: PushTransport> {
    transport: Mutex<T>,
    endpoint: Endpoint,
    identity: DeviceIdentity,
    success: AtomicU32,
    failed: AtomicU32,
}

impl<T: PushTransport> TransmissionEngine<T> {
    pub fn new(transport: T, endpoint: Endpoint, identity: DeviceIdentity) -> Self {
        Self {
            transport: Mutex::new(transport),
            endpoint,
            identity,
            success: AtomicU32::new(0),
            failed: AtomicU32::new(0),
        }
    }

    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    pub fn counters(&self) -> SendCounters {
        SendCounters {
            success: self.success.load(Ordering::Acquire),
            failed: self.failed.load(Ordering::Acquire),
        }
    }

    /// Push one snapshot, blocking while another push is in flight.
    ///
    /// Never retries; the next scheduled push is the retry.
    pub fn push(&self, snapshot: &ReadingSnapshot, sink: &mut impl EventSink) -> TransmissionOutcome {
        let mut transport = self.transport.lock().unwrap_or_else(PoisonError::into_inner);

        let outcome = match payload::encode(&self.identity, snapshot) {
            Ok(body) => {
                let headers = [
                    (self.endpoint.auth_header.as_str(), self.endpoint.shared_secret.as_str()),
                    ("Content-Type", "application/json"),
                ];
                let request = PushRequest {
                    url: &self.endpoint.url,
                    headers: &headers,
                    body: &body,
                    timeout: self.endpoint.timeout,
                };
                classify(transport.post(&request))
            }
            Err(failure) => TransmissionOutcome::failed(failure),
        };

        match outcome.failure {
            None => {
                self.success.fetch_add(1, Ordering::AcqRel);
                info!(
                    "Push: sample #{} accepted (HTTP {})",
                    snapshot.sample_id, outcome.status_code
                );
                sink.emit(&NodeEvent::PushSucceeded {
                    sample_id: snapshot.sample_id,
                    status: outcome.status_code,
                });
            }
            Some(failure) => {
                self.failed.fetch_add(1, Ordering::AcqRel);
                warn!("Push: sample #{} failed: {}", snapshot.sample_id, failure);
                sink.emit(&NodeEvent::PushFailed {
                    sample_id: snapshot.sample_id,
                    status: outcome.status_code,
                    reason: failure.tag(),
                });
            }
        }

        drop(transport);
        outcome
    }
}
