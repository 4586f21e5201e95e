//! Supervisor channel abstraction.
//!
//! The controller talks to its supervisor only through [`SupervisorChannel`].
//! Transports live in [`crate::channels`].

use crate::error::LifecycleError;
use crate::protocol::{ControlMessage, UpstreamMessage};

/// Result type alias for channel operations.
pub type ChannelResult<T> = std::result::Result<T, ChannelError>;

/// Transport-level failures.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// The other side is gone.
    #[error("channel disconnected")]
    Disconnected,

    /// The transport refused the message but may recover.
    #[error("channel unavailable: {0}")]
    Unavailable(String),

    /// I/O error on the underlying stream.
    #[error("channel I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A message could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(String),
}

impl ChannelError {
    /// Creates a codec error.
    #[must_use]
    pub fn codec(msg: impl Into<String>) -> Self {
        Self::Codec(msg.into())
    }

    /// Returns true if the supervisor can no longer be reached at all.
    #[must_use]
    pub fn is_disconnected(&self) -> bool {
        match self {
            Self::Disconnected => true,
            Self::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::UnexpectedEof
            ),
            Self::Unavailable(_) | Self::Codec(_) => false,
        }
    }
}

impl From<ChannelError> for LifecycleError {
    fn from(err: ChannelError) -> Self {
        Self::SupervisorUnreachable(err.to_string())
    }
}

/// Bidirectional link to the supervisor.
///
/// `try_recv` must not block; the controller calls it from its timer pass.
pub trait SupervisorChannel: Send + Sync + 'static {
    /// Sends a message to the supervisor.
    ///
    /// # Errors
    /// Returns an error if the message could not be delivered.
    fn send(&self, message: &UpstreamMessage) -> ChannelResult<()>;

    /// Returns the next pending control message, if any.
    ///
    /// # Errors
    /// Returns `Disconnected` once the supervisor side is closed and the
    /// queue is drained.
    fn try_recv(&self) -> ChannelResult<Option<ControlMessage>>;
}
