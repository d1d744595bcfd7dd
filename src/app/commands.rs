//! Inbound commands and their responses.
//!
//! Commands arrive from the remote command channel (see
//! [`rpc::dispatcher`](crate::rpc::dispatcher)) and are interpreted by
//! [`NodeService::handle_command`](super::service::NodeService::handle_command).
//! Every command except `soft_reset` produces a [`CommandResponse`];
//! `soft_reset` produces [`Dispatch::Restart`] and never answers.

use serde::Serialize;

use crate::config::MAX_CHANNELS;
use crate::error::ValidationError;
use crate::params::ConfigParameter;
use crate::sampler::ChannelValue;

/// Commands that the remote command channel can send into the core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeCommand {
    /// Take a fresh sample and report it.
    GetReadings,
    /// Report identity, counters and both interval parameters.
    GetConfig,
    /// Change the local sample/display interval (minutes, as text).
    SetDisplayInterval(String),
    /// Change the server push interval (minutes, as text).
    SetServerInterval(String),
    /// Sample and push immediately, outside the schedule.
    PushNow,
    /// Restart the device.
    SoftReset,
}

impl NodeCommand {
    /// Map a command name and optional argument onto a command.
    ///
    /// Returns `None` for unknown names. The argument is kept whole and only
    /// interpreted when the command runs.
    pub fn parse(name: &str, arg: Option<&str>) -> Option<Self> {
        let arg = || String::from(arg.unwrap_or("").trim());
        match name {
            "get_readings" => Some(Self::GetReadings),
            "get_config" => Some(Self::GetConfig),
            "set_display_interval" => Some(Self::SetDisplayInterval(arg())),
            "set_server_interval" => Some(Self::SetServerInterval(arg())),
            "push_now" => Some(Self::PushNow),
            "soft_reset" => Some(Self::SoftReset),
            _ => None,
        }
    }
}

/// Parse an interval argument in minutes.
pub fn parse_minutes(arg: &str) -> Result<f32, ValidationError> {
    arg.trim()
        .parse::<f32>()
        .map_err(|_| ValidationError::Unparseable)
}

/// What the command channel should do after a command was handled.
#[derive(Debug, Clone)]
pub enum Dispatch {
    /// Send this response back to the caller.
    Respond(CommandResponse),
    /// Restart the device; no response is sent.
    Restart,
}

/// Any response body the command surface can produce.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum CommandResponse {
    Action(ActionResult),
    Config(ConfigReport),
    Readings(ReadingsReport),
}

impl CommandResponse {
    /// `true` when the response status is `"ok"`.
    pub fn is_ok(&self) -> bool {
        match self {
            Self::Action(a) => a.status == STATUS_OK,
            Self::Config(c) => c.status == STATUS_OK,
            Self::Readings(r) => r.status == STATUS_OK,
        }
    }
}

pub const STATUS_OK: &str = "ok";
pub const STATUS_ERROR: &str = "error";

/// Result of an action command (setters, push, unknown/bad requests).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionResult {
    pub status: &'static str,
    pub error_reason: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
}

impl ActionResult {
    pub const fn ok() -> Self {
        Self {
            status: STATUS_OK,
            error_reason: "",
            http_status: None,
        }
    }

    pub const fn error(reason: &'static str) -> Self {
        Self {
            status: STATUS_ERROR,
            error_reason: reason,
            http_status: None,
        }
    }

    pub const fn with_http_status(mut self, status: u16) -> Self {
        self.http_status = Some(status);
        self
    }
}

/// One interval parameter with its provenance, as reported remotely.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParamReport {
    pub current_value: f32,
    pub last_changed_unix: u64,
    pub last_changed_iso: crate::timestamp::IsoString,
    pub last_changed_source: &'static str,
}

impl From<ConfigParameter> for ParamReport {
    fn from(p: ConfigParameter) -> Self {
        Self {
            current_value: p.current_value,
            last_changed_unix: p.last_changed_at.as_unix_secs(),
            last_changed_iso: p.last_changed_at.to_iso8601(),
            last_changed_source: p.last_changed_source.as_str(),
        }
    }
}

/// Response to `get_config`.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigReport {
    pub status: &'static str,
    pub device_id: crate::app::ports::DeviceIdString,
    pub firmware_version: &'static str,
    pub boot_count: u32,
    pub send_success_count: u32,
    pub send_fail_count: u32,
    pub display_interval: ParamReport,
    pub server_interval: ParamReport,
}

/// Response to `get_readings`.
#[derive(Debug, Clone, Serialize)]
pub struct ReadingsReport {
    pub status: &'static str,
    pub sample_id: u64,
    pub device_id: crate::app::ports::DeviceIdString,
    pub firmware_version: &'static str,
    pub server_interval: f32,
    pub display_interval: f32,
    pub unix_ts: u64,
    pub iso_time: crate::timestamp::IsoString,
    pub values: heapless::Vec<ChannelValue, MAX_CHANNELS>,
}
