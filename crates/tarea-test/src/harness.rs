//! Scripted supervisor harness.
//!
//! [`SupervisorHarness`] plays the supervisor side of an in-memory channel
//! against a real [`LifecycleController`]. Time is a [`ManualClock`] and
//! exits are recorded, so whole lifecycles run deterministically inside a
//! test process.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tarea_core::{
    AppInitData, ApplicationOptions, ControlMessage, ControllerConfig, ExitKind, ExitMarker,
    LifecycleController, LifecycleState, ManualClock, MemoryChannel, RecordingExit, SlotDir,
    SupervisorEndpoint, UpstreamMessage,
};
use tempfile::TempDir;

use crate::error::{Result, TestError};

/// One step of a supervisor script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptStep {
    /// Deliver a control message (processed on the next tick).
    Send(ControlMessage),
    /// Move the clock forward without ticking.
    Advance(Duration),
    /// Run one timer pass.
    Tick,
    /// Advance `total` in `step` increments, sending a heartbeat and
    /// ticking after each increment.
    Run {
        /// Total simulated time.
        total: Duration,
        /// Heartbeat period.
        step: Duration,
    },
}

/// A controller under test plus the supervisor that drives it.
pub struct SupervisorHarness {
    controller: Arc<LifecycleController>,
    supervisor: SupervisorEndpoint,
    clock: Arc<ManualClock>,
    exit: Arc<RecordingExit>,
    options: ApplicationOptions,
    slot: TempDir,
}

impl SupervisorHarness {
    /// Creates a harness builder.
    #[must_use]
    pub fn builder() -> SupervisorHarnessBuilder {
        SupervisorHarnessBuilder::default()
    }

    /// Harness with default options, already initialized.
    ///
    /// # Errors
    /// Returns an error if the slot directory or the controller cannot be set up.
    pub fn running() -> Result<Self> {
        let harness = Self::builder().build()?;
        harness.initialize()?;
        Ok(harness)
    }

    /// Initializes the controller with the harness options and consumes
    /// the registration message.
    ///
    /// # Errors
    /// Returns the controller's error, or an assertion error if no
    /// registration reached the supervisor.
    pub fn initialize(&self) -> Result<()> {
        self.controller.initialize(self.options)?;
        match self.supervisor.try_recv() {
            Some(UpstreamMessage::Register { .. }) => Ok(()),
            other => Err(TestError::assertion(format!(
                "expected Register after initialize, got {other:?}"
            ))),
        }
    }

    /// The controller under test.
    #[must_use]
    pub const fn controller(&self) -> &Arc<LifecycleController> {
        &self.controller
    }

    /// The simulated clock.
    #[must_use]
    pub const fn clock(&self) -> &Arc<ManualClock> {
        &self.clock
    }

    /// The slot directory.
    #[must_use]
    pub fn slot_path(&self) -> &Path {
        self.slot.path()
    }

    /// Delivers a control message without ticking.
    ///
    /// # Errors
    /// Returns a harness error if the controller side is gone.
    pub fn send(&self, message: ControlMessage) -> Result<()> {
        if self.supervisor.send(message) {
            Ok(())
        } else {
            Err(TestError::harness("controller side of the channel is closed"))
        }
    }

    /// Delivers a control message and runs one timer pass.
    ///
    /// # Errors
    /// Returns a harness error if the controller side is gone.
    pub fn deliver(&self, message: ControlMessage) -> Result<()> {
        self.send(message)?;
        self.controller.tick();
        Ok(())
    }

    /// Runs one timer pass.
    pub fn tick(&self) {
        self.controller.tick();
    }

    /// Moves the clock forward without ticking.
    pub fn advance(&self, by: Duration) {
        self.clock.advance(by);
    }

    /// Simulates a healthy supervisor for `total`: heartbeat and tick
    /// every `step`.
    ///
    /// # Errors
    /// Returns a harness error if `step` is zero or the channel is closed.
    pub fn run_for(&self, total: Duration, step: Duration) -> Result<()> {
        if step.is_zero() {
            return Err(TestError::harness("heartbeat step must be positive"));
        }
        let mut elapsed = Duration::ZERO;
        while elapsed < total {
            let by = step.min(total - elapsed);
            self.clock.advance(by);
            elapsed += by;
            self.deliver(ControlMessage::Heartbeat)?;
            if self.controller.state().is_terminal() {
                break;
            }
        }
        Ok(())
    }

    /// Plays a script in order.
    ///
    /// # Errors
    /// Returns the first step's error.
    pub fn play(&self, script: &[ScriptStep]) -> Result<()> {
        for step in script {
            match step {
                ScriptStep::Send(message) => self.send(*message)?,
                ScriptStep::Advance(by) => self.advance(*by),
                ScriptStep::Tick => self.tick(),
                ScriptStep::Run { total, step } => self.run_for(*total, *step)?,
            }
        }
        Ok(())
    }

    /// Makes the controller's sends fail while set.
    pub fn refuse_upstream(&self, refuse: bool) {
        self.supervisor.refuse_upstream(refuse);
    }

    /// Drops the supervisor side of the channel.
    pub fn disconnect(&mut self) {
        let (_, detached) = MemoryChannel::pair();
        drop(std::mem::replace(&mut self.supervisor, detached));
    }

    /// Messages the controller sent since the last call.
    #[must_use]
    pub fn upstream(&self) -> Vec<UpstreamMessage> {
        self.supervisor.drain()
    }

    /// Every exit the controller performed.
    #[must_use]
    pub fn exits(&self) -> Vec<(i32, ExitKind)> {
        self.exit.calls()
    }

    /// Returns true while the slot lock file exists.
    #[must_use]
    pub fn lock_file_present(&self) -> bool {
        SlotDir::new(self.slot.path()).lock_path().exists()
    }

    /// Reads the finish marker, if written.
    ///
    /// # Errors
    /// Returns an error if the marker exists but is unreadable.
    pub fn finish_marker(&self) -> Result<Option<ExitMarker>> {
        Ok(SlotDir::new(self.slot.path()).read_finish_marker()?)
    }

    /// Reads the temporary exit marker, if written.
    ///
    /// # Errors
    /// Returns an error if the marker exists but is unreadable.
    pub fn temporary_exit_marker(&self) -> Result<Option<ExitMarker>> {
        Ok(SlotDir::new(self.slot.path()).read_temporary_exit_marker()?)
    }

    /// Checks the controller's state.
    ///
    /// # Errors
    /// Returns an assertion error on mismatch.
    pub fn expect_state(&self, expected: LifecycleState) -> Result<()> {
        let actual = self.controller.state();
        if actual == expected {
            Ok(())
        } else {
            Err(TestError::assertion(format!(
                "expected state {expected:?}, got {actual:?}"
            )))
        }
    }

    /// Checks that exactly one exit happened, with this code and kind.
    ///
    /// # Errors
    /// Returns an assertion error on mismatch.
    pub fn expect_single_exit(&self, code: i32, kind: ExitKind) -> Result<()> {
        match self.exit.calls().as_slice() {
            [(c, k)] if *c == code && *k == kind => Ok(()),
            other => Err(TestError::assertion(format!(
                "expected one exit ({code}, {kind:?}), got {other:?}"
            ))),
        }
    }

    /// Checks that the controller has not exited.
    ///
    /// # Errors
    /// Returns an assertion error if any exit was recorded.
    pub fn expect_no_exit(&self) -> Result<()> {
        let calls = self.exit.calls();
        if calls.is_empty() {
            Ok(())
        } else {
            Err(TestError::assertion(format!("unexpected exit: {calls:?}")))
        }
    }
}

impl std::fmt::Debug for SupervisorHarness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupervisorHarness")
            .field("controller", &self.controller)
            .field("slot", &self.slot.path())
            .finish_non_exhaustive()
    }
}

/// Builder for [`SupervisorHarness`].
#[derive(Debug, Default)]
pub struct SupervisorHarnessBuilder {
    options: ApplicationOptions,
    init_data: AppInitData,
    heartbeat_timeout: Option<Duration>,
    status_interval: Option<Duration>,
}

impl SupervisorHarnessBuilder {
    /// Sets the options passed to `initialize`.
    #[must_use]
    pub const fn with_options(mut self, options: ApplicationOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the init data.
    #[must_use]
    pub fn with_init_data(mut self, init_data: AppInitData) -> Self {
        self.init_data = init_data;
        self
    }

    /// Overrides the configured heartbeat timeout.
    #[must_use]
    pub const fn with_heartbeat_timeout(mut self, timeout: Duration) -> Self {
        self.heartbeat_timeout = Some(timeout);
        self
    }

    /// Overrides the automatic status interval.
    #[must_use]
    pub const fn with_status_interval(mut self, interval: Duration) -> Self {
        self.status_interval = Some(interval);
        self
    }

    /// Builds the harness in a fresh temporary slot directory.
    ///
    /// # Errors
    /// Returns an error if the directory cannot be created or the
    /// controller rejects its configuration.
    pub fn build(self) -> Result<SupervisorHarness> {
        let slot = tempfile::tempdir()?;
        let (channel, supervisor) = MemoryChannel::pair();
        let clock = Arc::new(ManualClock::new());
        let exit = Arc::new(RecordingExit::new());

        let mut config = ControllerConfig::new(slot.path());
        config.lock_retries = 1;
        config.lock_retry_interval = Duration::ZERO;
        if let Some(timeout) = self.heartbeat_timeout {
            config.heartbeat_timeout = timeout;
        }
        if let Some(interval) = self.status_interval {
            config.status_interval = interval;
        }

        let controller = LifecycleController::builder(channel)
            .config(config)
            .init_data(self.init_data)
            .clock(clock.clone())
            .exit_hook(exit.clone())
            .build()?;

        tracing::debug!(slot = %slot.path().display(), "supervisor harness ready");

        Ok(SupervisorHarness {
            controller: Arc::new(controller),
            supervisor,
            clock,
            exit,
            options: self.options,
            slot,
        })
    }
}
