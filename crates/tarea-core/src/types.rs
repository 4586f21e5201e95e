//! Core types for the task lifecycle.
//!
//! State transitions follow an explicit state machine, no implicit
//! transitions:
//!
//! ```text
//! Uninitialized → Initialized → Running ⇄ Suspended
//!                                  │          │
//!                                  ├──────────┴──→ Finishing → Terminated
//!                                  └─────────────→ TemporaryExit
//! ```

use serde::{Deserialize, Serialize};

/// Identifier for one registration of this process with the supervisor.
///
/// A restarted task gets a fresh id, so the supervisor can tell a restart
/// from a duplicate registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskInstanceId(uuid::Uuid);

impl TaskInstanceId {
    /// Creates a new random instance ID.
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Returns the inner UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }
}

impl Default for TaskInstanceId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TaskInstanceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle phase of the supervised task.
///
/// Being inside a critical section is orthogonal to these states and is
/// tracked separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleState {
    /// `initialize` has not been called.
    Uninitialized,
    /// Registration done, run loop not yet entered.
    Initialized,
    /// Computing normally.
    Running,
    /// Supervisor asked the task to stop consuming resources.
    Suspended,
    /// `finish` in progress.
    Finishing,
    /// Task ended for good.
    Terminated,
    /// Task ended and asked to be restarted later.
    TemporaryExit,
}

impl LifecycleState {
    /// Returns true if the lifecycle has ended.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminated | Self::TemporaryExit)
    }

    /// Returns true if the task is running or suspended.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Running | Self::Suspended)
    }

    /// Returns true once `initialize` succeeded and before termination began.
    #[must_use]
    pub const fn is_initialized(&self) -> bool {
        matches!(self, Self::Initialized | Self::Running | Self::Suspended)
    }
}

/// A supervisor request that can be deferred by a critical section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlRequest {
    /// Stop consuming CPU/GPU until resumed.
    Suspend,
    /// Continue after a suspend.
    Resume,
    /// Exit now; the supervisor will restart the task from its checkpoint.
    Quit,
    /// Exit now; the task is abandoned.
    Abort,
}

impl ControlRequest {
    /// Returns true for requests that end the lifecycle.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Quit | Self::Abort)
    }
}

/// Snapshot of pending supervisor-driven conditions.
///
/// Hosts that run without direct action poll this and act cooperatively.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusFlags {
    /// The task is suspended.
    pub suspended: bool,
    /// The supervisor asked the task to quit.
    pub quit_request: bool,
    /// The supervisor asked the task to abort.
    pub abort_request: bool,
    /// No heartbeat arrived within the timeout.
    pub no_heartbeat: bool,
    /// The supervisor rewrote the init data file.
    pub reread_init_data: bool,
    /// Network connectivity became available to the supervisor.
    pub network_available: bool,
    /// Last fraction done reported through the controller.
    pub fraction_done: f64,
}

/// The action a cooperative host must take next, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingAction {
    /// Quit requested (explicitly or through heartbeat loss).
    Quit,
    /// Abort requested.
    Abort,
}

impl StatusFlags {
    /// Returns the termination the host should perform, abort first.
    #[must_use]
    pub const fn pending_action(&self) -> Option<PendingAction> {
        if self.abort_request {
            Some(PendingAction::Abort)
        } else if self.quit_request {
            Some(PendingAction::Quit)
        } else {
            None
        }
    }
}

/// A user-visible explanation attached to `finish` or `temporary_exit`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    /// Message shown by the supervisor.
    pub message: String,
    /// Show as a notice (the user can fix the condition) rather than a plain message.
    pub is_notice: bool,
}

impl Notice {
    /// Creates a plain message.
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            is_notice: false,
        }
    }

    /// Creates a notice.
    #[must_use]
    pub fn notice(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            is_notice: true,
        }
    }
}
