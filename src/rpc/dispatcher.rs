//! Command dispatcher: frames in, JSON requests to [`NodeService`], frames out.
//!
//! Request payload:
//!
//! ```json
//! {"cmd": "set_display_interval", "arg": "2.5"}
//! ```
//!
//! `arg` is optional and may be a string or a number. Every request gets
//! exactly one reply frame except `soft_reset`, which is reported to the
//! caller as [`PollOutcome::Restart`] and never answered.

use log::{debug, warn};
use serde::Deserialize;

use crate::app::commands::{ActionResult, CommandResponse, Dispatch, NodeCommand};
use crate::app::ports::{ClockPort, EventSink, PushTransport, RegisterReader, StoragePort};
use crate::app::service::NodeService;

use super::codec::{FrameDecoder, encode_frame};
use super::transport::Transport;

const READ_BUF_SIZE: usize = 512;

/// Reason for a request naming no known command.
pub const UNKNOWN_COMMAND: &str = "unknown_command";
/// Reason for a frame that is not a valid request object.
pub const BAD_REQUEST: &str = "bad_request";

#[derive(Debug, Deserialize)]
struct Request {
    cmd: String,
    #[serde(default)]
    arg: Option<serde_json::Value>,
}

impl Request {
    fn arg_text(&self) -> Option<String> {
        match self.arg.as_ref()? {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}

/// Decode one request payload and run it against the service.
pub fn handle_request<R, S, T>(
    payload: &[u8],
    service: &NodeService<R, S, T>,
    now: crate::timestamp::Timestamp,
    sink: &mut impl EventSink,
) -> Dispatch
where
    R: RegisterReader,
    S: StoragePort,
    T: PushTransport,
{
    let request: Request = match serde_json::from_slice(payload) {
        Ok(r) => r,
        Err(e) => {
            warn!("Dispatcher: malformed request: {}", e);
            return Dispatch::Respond(CommandResponse::Action(ActionResult::error(BAD_REQUEST)));
        }
    };

    let arg = request.arg_text();
    match NodeCommand::parse(&request.cmd, arg.as_deref()) {
        Some(cmd) => service.handle_command(cmd, now, sink),
        None => {
            warn!("Dispatcher: unknown command '{}'", request.cmd);
            Dispatch::Respond(CommandResponse::Action(ActionResult::error(UNKNOWN_COMMAND)))
        }
    }
}

/// What one [`CommandDispatcher::poll`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Number of requests answered (0 when nothing was pending).
    Handled(usize),
    /// A reset was requested; the host must restart the device now.
    Restart,
}

/// Binds a [`Transport`] to the node service.
pub struct CommandDispatcher<X: Transport> {
    transport: X,
    decoder: FrameDecoder,
}

impl<X: Transport> CommandDispatcher<X> {
    pub fn new(transport: X) -> Self {
        Self {
            transport,
            decoder: FrameDecoder::new(),
        }
    }

    pub fn transport(&self) -> &X {
        &self.transport
    }

    /// Drain whatever the transport has and answer every complete request.
    pub fn poll<R, S, T>(
        &mut self,
        service: &NodeService<R, S, T>,
        clock: &impl ClockPort,
        sink: &mut impl EventSink,
    ) -> Result<PollOutcome, X::Error>
    where
        R: RegisterReader,
        S: StoragePort,
        T: PushTransport,
    {
        let mut buf = [0u8; READ_BUF_SIZE];
        let mut handled = 0;

        loop {
            let n = self.transport.read(&mut buf)?;
            if n == 0 {
                break;
            }

            let mut offset = 0;
            while offset < n {
                let (used, frame) = self.decoder.feed(&buf[offset..n]);
                offset += used;
                let Some(frame) = frame else { continue };

                match handle_request(frame, service, clock.now(), sink) {
                    Dispatch::Restart => return Ok(PollOutcome::Restart),
                    Dispatch::Respond(response) => {
                        self.reply(&response)?;
                        handled += 1;
                    }
                }
            }
        }

        if handled > 0 {
            debug!("Dispatcher: answered {} request(s)", handled);
        }
        Ok(PollOutcome::Handled(handled))
    }

    fn reply(&mut self, response: &CommandResponse) -> Result<(), X::Error> {
        let body = match serde_json::to_vec(response) {
            Ok(b) => b,
            Err(e) => {
                warn!("Dispatcher: response encoding failed: {}", e);
                return Ok(());
            }
        };
        let Some(frame) = encode_frame(&body) else {
            warn!("Dispatcher: response of {} bytes does not fit a frame", body.len());
            return Ok(());
        };
        let mut written = 0;
        while written < frame.len() {
            let n = self.transport.write(&frame[written..])?;
            if n == 0 {
                warn!("Dispatcher: transport stalled after {} bytes", written);
                break;
            }
            written += n;
        }
        self.transport.flush()
    }
}
