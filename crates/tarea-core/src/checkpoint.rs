//! Checkpoint timing policy.
//!
//! The controller only times checkpoints; writing them is the host
//! computation's job. After [`CheckpointTimer::completed`] the timer is not
//! due again until the minimum period has fully elapsed.

use std::time::{Duration, Instant};

/// Tracks when the next checkpoint is due.
#[derive(Debug, Clone)]
pub struct CheckpointTimer {
    min_period: Duration,
    last_checkpoint: Instant,
    last_checkpoint_cpu_time: f64,
    inhibited: bool,
}

impl CheckpointTimer {
    /// Creates a timer whose window starts at `now`.
    #[must_use]
    pub const fn new(min_period: Duration, now: Instant) -> Self {
        Self {
            min_period,
            last_checkpoint: now,
            last_checkpoint_cpu_time: 0.0,
            inhibited: false,
        }
    }

    /// Returns true if the minimum period has elapsed and nothing inhibits checkpointing.
    #[must_use]
    pub fn is_due(&self, now: Instant) -> bool {
        !self.inhibited && self.since_last(now) >= self.min_period
    }

    /// Restarts the window at `now` and records the CPU time covered by the checkpoint.
    pub fn completed(&mut self, now: Instant, cpu_time: f64) {
        self.last_checkpoint = now;
        self.last_checkpoint_cpu_time = cpu_time;
    }

    /// Changes the minimum period; the current window is kept.
    pub fn set_min_period(&mut self, period: Duration) {
        self.min_period = period;
    }

    /// Blocks or unblocks checkpointing (set while suspended).
    pub fn set_inhibited(&mut self, inhibited: bool) {
        self.inhibited = inhibited;
    }

    /// Returns the minimum period.
    #[must_use]
    pub const fn min_period(&self) -> Duration {
        self.min_period
    }

    /// Returns true if checkpointing is inhibited.
    #[must_use]
    pub const fn is_inhibited(&self) -> bool {
        self.inhibited
    }

    /// CPU seconds covered by the last completed checkpoint.
    #[must_use]
    pub const fn last_checkpoint_cpu_time(&self) -> f64 {
        self.last_checkpoint_cpu_time
    }

    /// Time since the last checkpoint (zero if the clock went backwards).
    #[must_use]
    pub fn since_last(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_checkpoint)
    }
}
