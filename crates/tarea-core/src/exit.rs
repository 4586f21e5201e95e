//! Process termination.
//!
//! The controller never calls `std::process::exit` directly; it goes
//! through an [`ExitHook`] so embedders and tests can observe the exit
//! instead of losing the process.

use parking_lot::Mutex;

use crate::types::ControlRequest;

/// Exit code after a supervisor quit request (the task will be restarted).
pub const EXIT_QUIT_REQUESTED: i32 = 0;

/// Exit code after a supervisor abort request.
pub const EXIT_ABORTED_BY_CLIENT: i32 = 194;

/// Why the controller is ending the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitKind {
    /// `finish` was called.
    Finished,
    /// `temporary_exit` was called.
    TemporaryExit,
    /// The supervisor asked the task to quit.
    Quit,
    /// The supervisor asked the task to abort.
    Abort,
    /// No heartbeat within the timeout.
    HeartbeatLost,
}

impl ExitKind {
    /// Exit kind when `request` ends the task.
    #[must_use]
    pub const fn for_request(request: ControlRequest) -> Self {
        match request {
            ControlRequest::Abort => Self::Abort,
            _ => Self::Quit,
        }
    }
}

/// Terminates the process (or records that it would have).
pub trait ExitHook: Send + Sync + 'static {
    /// Called once, outside the controller's state lock.
    fn exit(&self, code: i32, kind: ExitKind);
}

/// Exits the real process.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessExit;

impl ExitHook for ProcessExit {
    fn exit(&self, code: i32, kind: ExitKind) {
        tracing::info!(code, kind = ?kind, "exiting process");
        std::process::exit(code);
    }
}

/// Records exits instead of performing them.
#[derive(Debug, Default)]
pub struct RecordingExit {
    calls: Mutex<Vec<(i32, ExitKind)>>,
}

impl RecordingExit {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every exit seen so far, oldest first.
    #[must_use]
    pub fn calls(&self) -> Vec<(i32, ExitKind)> {
        self.calls.lock().clone()
    }

    /// The most recent exit, if any.
    #[must_use]
    pub fn last(&self) -> Option<(i32, ExitKind)> {
        self.calls.lock().last().copied()
    }

    /// Returns true if any exit was recorded.
    #[must_use]
    pub fn exited(&self) -> bool {
        !self.calls.lock().is_empty()
    }
}

impl ExitHook for RecordingExit {
    fn exit(&self, code: i32, kind: ExitKind) {
        tracing::debug!(code, kind = ?kind, "recorded exit");
        self.calls.lock().push((code, kind));
    }
}

impl<H: ExitHook> ExitHook for std::sync::Arc<H> {
    fn exit(&self, code: i32, kind: ExitKind) {
        (**self).exit(code, kind);
    }
}
