//! Wire protocol between the task and its supervisor.
//!
//! Every message is one JSON object on one line, tagged by `"type"`:
//!
//! ```text
//! supervisor → task   {"type":"heartbeat"}
//!                     {"type":"suspend"}
//! task → supervisor   {"type":"status","cpu_time":12.0,"checkpoint_cpu_time":10.5,"fraction_done":0.25}
//! ```

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::channel::{ChannelError, ChannelResult};
use crate::config::ApplicationOptions;
use crate::types::{ControlRequest, Notice, TaskInstanceId};

/// Messages from the supervisor to the task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlMessage {
    /// Supervisor liveness ping.
    Heartbeat,
    /// Stop consuming resources.
    Suspend,
    /// Continue after a suspend.
    Resume,
    /// Exit so the task can be restarted later from its checkpoint.
    Quit,
    /// Exit for good.
    Abort,
    /// The init data file was rewritten.
    RereadInitData,
    /// The supervisor has network connectivity again.
    NetworkAvailable,
}

impl ControlMessage {
    /// Returns the process-control request carried by this message, if any.
    #[must_use]
    pub const fn as_request(&self) -> Option<ControlRequest> {
        match self {
            Self::Suspend => Some(ControlRequest::Suspend),
            Self::Resume => Some(ControlRequest::Resume),
            Self::Quit => Some(ControlRequest::Quit),
            Self::Abort => Some(ControlRequest::Abort),
            Self::Heartbeat | Self::RereadInitData | Self::NetworkAvailable => None,
        }
    }
}

impl From<ControlRequest> for ControlMessage {
    fn from(request: ControlRequest) -> Self {
        match request {
            ControlRequest::Suspend => Self::Suspend,
            ControlRequest::Resume => Self::Resume,
            ControlRequest::Quit => Self::Quit,
            ControlRequest::Abort => Self::Abort,
        }
    }
}

/// Messages from the task to the supervisor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UpstreamMessage {
    /// First message after startup.
    Register {
        /// This registration.
        instance: TaskInstanceId,
        /// OS process id.
        pid: u32,
        /// Options the task initialized with.
        options: ApplicationOptions,
    },
    /// CPU time and progress.
    Status {
        /// Total CPU seconds, including earlier runs.
        cpu_time: f64,
        /// CPU seconds covered by the last checkpoint.
        checkpoint_cpu_time: f64,
        /// Progress in [0, 1].
        fraction_done: f64,
    },
    /// Best-effort message for the project's servers.
    TrickleUp {
        /// Message kind, defined by the project.
        variety: String,
        /// Payload.
        text: String,
    },
    /// Ask the supervisor to pause competing tasks.
    SuspendOtherActivities,
    /// Let competing tasks run again.
    ResumeOtherActivities,
    /// The task finished.
    Finished {
        /// Exit status, nonzero on error.
        status: i32,
        /// Optional explanation for the user.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        notice: Option<Notice>,
    },
    /// The task exits and wants to be restarted after a delay.
    TemporaryExit {
        /// Minimum delay before restart.
        delay_secs: u64,
        /// Optional explanation for the user.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        notice: Option<Notice>,
    },
}

/// Encodes a message as one newline-terminated line.
///
/// # Errors
/// Returns a codec error if serialization fails.
pub fn encode_line<T: Serialize>(message: &T) -> ChannelResult<String> {
    let mut line = serde_json::to_string(message).map_err(|e| ChannelError::codec(e.to_string()))?;
    line.push('\n');
    Ok(line)
}

/// Decodes one line, ignoring surrounding whitespace.
///
/// # Errors
/// Returns a codec error if the line is not a valid message.
pub fn decode_line<T: DeserializeOwned>(line: &str) -> ChannelResult<T> {
    serde_json::from_str(line.trim()).map_err(|e| ChannelError::codec(e.to_string()))
}
