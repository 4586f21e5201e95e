//! Test error types.

/// Result type alias for harness operations.
pub type Result<T> = std::result::Result<T, TestError>;

/// Testing errors.
#[derive(Debug, thiserror::Error)]
pub enum TestError {
    /// Harness setup or wiring failed.
    #[error("harness error: {0}")]
    Harness(String),

    /// An expectation about the controller did not hold.
    #[error("assertion failed: {0}")]
    Assertion(String),

    /// Error from the controller under test.
    #[error("lifecycle error: {0}")]
    Lifecycle(#[from] tarea_core::LifecycleError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TestError {
    /// Creates a harness error.
    #[must_use]
    pub fn harness(msg: impl Into<String>) -> Self {
        Self::Harness(msg.into())
    }

    /// Creates an assertion error.
    #[must_use]
    pub fn assertion(msg: impl Into<String>) -> Self {
        Self::Assertion(msg.into())
    }
}
