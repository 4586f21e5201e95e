//! Supervisor liveness tracking.
//!
//! The supervisor sends a heartbeat roughly once a second. If none arrives
//! within the timeout the task must assume its supervisor is gone and stop,
//! exactly as if it had been asked to quit.

use std::time::{Duration, Instant};

/// Heartbeat timeout tracker.
#[derive(Debug, Clone)]
pub struct HeartbeatMonitor {
    timeout: Duration,
    last_beat: Instant,
    tripped: bool,
}

impl HeartbeatMonitor {
    /// Starts monitoring at `now`.
    #[must_use]
    pub const fn new(timeout: Duration, now: Instant) -> Self {
        Self {
            timeout,
            last_beat: now,
            tripped: false,
        }
    }

    /// Records a heartbeat.
    pub fn beat(&mut self, now: Instant) {
        self.last_beat = now;
        self.tripped = false;
    }

    /// Returns true the first time the timeout is found exceeded.
    ///
    /// Later calls return false until the next heartbeat, so the loss is
    /// acted on once.
    pub fn check(&mut self, now: Instant) -> bool {
        if self.tripped || !self.is_expired(now) {
            return false;
        }
        self.tripped = true;
        true
    }

    /// Marks the supervisor as lost immediately (channel disconnected).
    ///
    /// Returns false if the loss was already reported.
    pub fn trip(&mut self) -> bool {
        !std::mem::replace(&mut self.tripped, true)
    }

    /// Returns true if the last heartbeat is older than the timeout.
    #[must_use]
    pub fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.last_beat) > self.timeout
    }

    /// Returns the configured timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }
}
