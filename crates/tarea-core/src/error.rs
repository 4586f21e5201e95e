//! Error types for tarea-core.
//!
//! Every fallible lifecycle operation returns [`Result`]; nothing in the
//! library panics or exits on its own except through the configured
//! [`ExitHook`](crate::exit::ExitHook).

use crate::types::LifecycleState;

/// Result type alias for lifecycle operations.
pub type Result<T> = std::result::Result<T, LifecycleError>;

/// Errors produced by the lifecycle controller.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    /// `initialize` was called more than once.
    #[error("lifecycle already initialized")]
    AlreadyInitialized,

    /// `finish` or `temporary_exit` was already called.
    #[error("lifecycle already terminated")]
    AlreadyTerminated,

    /// A required resource (the slot lock file) could not be acquired.
    #[error("resource unavailable: {0}")]
    ResourceUnavailable(String),

    /// The supervisor channel is down or refused a message.
    #[error("supervisor unreachable: {0}")]
    SupervisorUnreachable(String),

    /// The logical file name is not in the manifest.
    #[error("unknown logical file name: {0}")]
    UnknownLogicalName(String),

    /// The operation is not allowed in the current lifecycle state.
    #[error("invalid state for {operation}: {state:?}")]
    InvalidState {
        /// The operation that was attempted.
        operation: &'static str,
        /// The state the controller was in.
        state: LifecycleState,
    },

    /// Configuration or init data failed validation.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl LifecycleError {
    /// Creates a configuration error.
    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a resource-unavailable error.
    #[must_use]
    pub fn resource_unavailable(msg: impl Into<String>) -> Self {
        Self::ResourceUnavailable(msg.into())
    }

    /// Creates a supervisor-unreachable error.
    #[must_use]
    pub fn supervisor_unreachable(msg: impl Into<String>) -> Self {
        Self::SupervisorUnreachable(msg.into())
    }

    /// Creates an invalid-state error.
    #[must_use]
    pub const fn invalid_state(operation: &'static str, state: LifecycleState) -> Self {
        Self::InvalidState { operation, state }
    }

    /// Returns true if the caller can keep computing after this error.
    ///
    /// Advisory calls (trickle messages, status reports) fail with
    /// `SupervisorUnreachable` without affecting the task.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::SupervisorUnreachable(_) | Self::UnknownLogicalName(_)
        )
    }

    /// Returns true if the task cannot start or continue.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::ResourceUnavailable(_) | Self::Config(_))
    }
}
