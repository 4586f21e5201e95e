//! The lifecycle controller.
//!
//! One [`LifecycleController`] per process, shared by `Arc` between the
//! computation thread and the timer worker. All mutable state sits behind a
//! single mutex; channel sends, the timer callback and the exit hook always
//! run after that mutex is released.
//!
//! # Example
//!
//! ```rust,ignore
//! let (channel, _supervisor) = MemoryChannel::pair();
//! let controller = Arc::new(
//!     LifecycleController::builder(channel)
//!         .config(ControllerConfig::new("/var/lib/tarea/slot/3"))
//!         .build()?,
//! );
//! controller.initialize_default()?;
//! let _timer = TimerWorker::spawn(controller.clone());
//!
//! while !done {
//!     step();
//!     controller.report_progress(fraction)?;
//!     if controller.is_time_to_checkpoint() {
//!         let _guard = controller.critical_section();
//!         write_checkpoint()?;
//!         controller.checkpoint_completed()?;
//!     }
//!     controller.wait_while_suspended();
//! }
//! controller.finish(0)?;
//! ```

use parking_lot::{Condvar, Mutex};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::channel::SupervisorChannel;
use crate::checkpoint::CheckpointTimer;
use crate::clock::{Clock, SystemClock};
use crate::config::{ApplicationOptions, ControllerConfig};
use crate::critical::{CriticalSection, CriticalSectionGuard, DeferredRequest, EndOutcome};
use crate::error::{LifecycleError, Result};
use crate::exit::{EXIT_ABORTED_BY_CLIENT, EXIT_QUIT_REQUESTED, ExitHook, ExitKind, ProcessExit};
use crate::heartbeat::HeartbeatMonitor;
use crate::init_data::{AppInitData, FileManifest};
use crate::protocol::{ControlMessage, UpstreamMessage};
use crate::slot::{LockFile, SlotDir};
use crate::types::{
    ControlRequest, LifecycleState, Notice, PendingAction, StatusFlags, TaskInstanceId,
};
use crate::usage::{process_cpu_time, wu_cpu_time};

type CpuTimeSource = Box<dyn Fn() -> Duration + Send + Sync>;
type TimerCallback = Arc<dyn Fn() + Send + Sync>;

/// Mutable lifecycle state.
#[derive(Debug)]
struct Inner {
    state: LifecycleState,
    options: Option<ApplicationOptions>,
    checkpoint: CheckpointTimer,
    critical: CriticalSection,
    heartbeat: Option<HeartbeatMonitor>,
    flags: StatusFlags,
    lock: Option<LockFile>,
    last_status: Instant,
    channel_lost_reported: bool,
}

/// Work left to do after a direct-action termination, done without the lock.
#[derive(Debug)]
struct Termination {
    code: i32,
    kind: ExitKind,
    lock: Option<LockFile>,
    final_status: Option<UpstreamMessage>,
}

/// Drives one task through its supervised lifecycle.
pub struct LifecycleController {
    inner: Mutex<Inner>,
    resumed: Condvar,
    channel: Box<dyn SupervisorChannel>,
    exit: Box<dyn ExitHook>,
    clock: Box<dyn Clock>,
    cpu_time: CpuTimeSource,
    timer_callback: Mutex<Option<TimerCallback>>,
    config: ControllerConfig,
    init_data: AppInitData,
    manifest: FileManifest,
    slot: SlotDir,
    instance: TaskInstanceId,
}

/// Builder for [`LifecycleController`].
pub struct LifecycleControllerBuilder {
    channel: Box<dyn SupervisorChannel>,
    config: ControllerConfig,
    init_data: AppInitData,
    clock: Box<dyn Clock>,
    exit: Box<dyn ExitHook>,
    cpu_time: CpuTimeSource,
}

impl LifecycleControllerBuilder {
    /// Sets the controller configuration.
    #[must_use]
    pub fn config(mut self, config: ControllerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the init data handed over by the supervisor.
    #[must_use]
    pub fn init_data(mut self, init_data: AppInitData) -> Self {
        self.init_data = init_data;
        self
    }

    /// Replaces the system clock.
    #[must_use]
    pub fn clock(mut self, clock: impl Clock) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Replaces the process exit.
    #[must_use]
    pub fn exit_hook(mut self, hook: impl ExitHook) -> Self {
        self.exit = Box::new(hook);
        self
    }

    /// Replaces the CPU time source (defaults to `getrusage`).
    #[must_use]
    pub fn cpu_time_source(
        mut self,
        source: impl Fn() -> Duration + Send + Sync + 'static,
    ) -> Self {
        self.cpu_time = Box::new(source);
        self
    }

    /// Validates the configuration and init data and builds the controller.
    ///
    /// # Errors
    /// Returns a configuration error if either fails validation.
    pub fn build(self) -> Result<LifecycleController> {
        self.config.validate()?;
        self.init_data.validate()?;

        let slot = SlotDir::new(
            self.init_data
                .slot_dir
                .clone()
                .unwrap_or_else(|| self.config.slot_dir.clone()),
        );
        let period = self
            .init_data
            .checkpoint_period
            .unwrap_or(self.config.default_checkpoint_period);
        let now = self.clock.now();

        Ok(LifecycleController {
            inner: Mutex::new(Inner {
                state: LifecycleState::Uninitialized,
                options: None,
                checkpoint: CheckpointTimer::new(period, now),
                critical: CriticalSection::new(),
                heartbeat: None,
                flags: StatusFlags::default(),
                lock: None,
                last_status: now,
                channel_lost_reported: false,
            }),
            resumed: Condvar::new(),
            channel: self.channel,
            exit: self.exit,
            clock: self.clock,
            cpu_time: self.cpu_time,
            timer_callback: Mutex::new(None),
            manifest: self.init_data.manifest(),
            config: self.config,
            init_data: self.init_data,
            slot,
            instance: TaskInstanceId::new(),
        })
    }
}

impl LifecycleController {
    /// Starts building a controller around a supervisor channel.
    #[must_use]
    pub fn builder(channel: impl SupervisorChannel) -> LifecycleControllerBuilder {
        LifecycleControllerBuilder {
            channel: Box::new(channel),
            config: ControllerConfig::default(),
            init_data: AppInitData::default(),
            clock: Box::new(SystemClock),
            exit: Box::new(ProcessExit),
            cpu_time: Box::new(process_cpu_time),
        }
    }

    // ---------------------------------------------------------------------
    // Initialization
    // ---------------------------------------------------------------------

    /// Initializes with default options.
    ///
    /// # Errors
    /// See [`Self::initialize`].
    pub fn initialize_default(&self) -> Result<()> {
        self.initialize(ApplicationOptions::default())
    }

    /// Registers with the supervisor and enters `Running`.
    ///
    /// In main-program mode the slot lock is taken first and released
    /// again if registration fails.
    ///
    /// # Errors
    /// - `AlreadyInitialized` on a second call
    /// - `AlreadyTerminated` after `finish` or `temporary_exit`
    /// - `ResourceUnavailable` if the slot lock is held elsewhere
    /// - `SupervisorUnreachable` if the registration cannot be sent
    pub fn initialize(&self, options: ApplicationOptions) -> Result<()> {
        {
            let mut inner = self.inner.lock();
            match inner.state {
                LifecycleState::Uninitialized => {}
                LifecycleState::Finishing
                | LifecycleState::Terminated
                | LifecycleState::TemporaryExit => return Err(LifecycleError::AlreadyTerminated),
                _ => return Err(LifecycleError::AlreadyInitialized),
            }
            // claims the controller; a concurrent initialize sees AlreadyInitialized
            inner.state = LifecycleState::Initialized;
        }

        let lock = if options.main_program {
            match self
                .slot
                .acquire_lock(self.config.lock_retries, self.config.lock_retry_interval)
            {
                Ok(lock) => Some(lock),
                Err(e) => {
                    self.inner.lock().state = LifecycleState::Uninitialized;
                    return Err(e);
                }
            }
        } else {
            None
        };

        let register = UpstreamMessage::Register {
            instance: self.instance,
            pid: std::process::id(),
            options,
        };
        if let Err(e) = self.channel.send(&register) {
            release_lock(lock);
            self.inner.lock().state = LifecycleState::Uninitialized;
            return Err(e.into());
        }

        let now = self.clock.now();
        let mut inner = self.inner.lock();
        if inner.state != LifecycleState::Initialized {
            // finish or temporary_exit ran while we were registering
            drop(inner);
            release_lock(lock);
            return Err(LifecycleError::AlreadyTerminated);
        }

        let heartbeat_timeout = self
            .init_data
            .heartbeat_timeout
            .unwrap_or(self.config.heartbeat_timeout);
        inner.options = Some(options);
        inner.lock = lock;
        inner.heartbeat = options
            .heartbeat_timeout_check_enabled
            .then(|| HeartbeatMonitor::new(heartbeat_timeout, now));
        let period = inner.checkpoint.min_period();
        inner.checkpoint = CheckpointTimer::new(period, now);
        inner.last_status = now;
        inner.state = LifecycleState::Running;

        tracing::info!(
            instance = %self.instance,
            slot = %self.slot.path().display(),
            main_program = options.main_program,
            direct_action = options.direct_action(),
            "task initialized"
        );
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Progress and status
    // ---------------------------------------------------------------------

    /// Records progress in `[0, 1]` for the next status message.
    ///
    /// Out-of-range values are clamped and NaN is ignored. The value is
    /// mapped into the init data's fraction window.
    ///
    /// # Errors
    /// Currently infallible; returns `Result` for API stability.
    pub fn report_progress(&self, fraction: f64) -> Result<()> {
        if fraction.is_nan() {
            tracing::warn!("ignoring NaN progress report");
            return Ok(());
        }
        let scaled = self.init_data.scale_fraction(fraction.clamp(0.0, 1.0));
        self.inner.lock().flags.fraction_done = scaled;
        Ok(())
    }

    /// Sends a status message with caller-supplied values.
    ///
    /// `fraction_done` is mapped into the init data's fraction window, as
    /// in [`Self::report_progress`]. A no-op unless automatic status
    /// messages are enabled. Delivery failures are logged and swallowed.
    ///
    /// # Errors
    /// Returns `InvalidState` before initialization or after termination.
    pub fn report_status(
        &self,
        cpu_time: f64,
        checkpoint_cpu_time: f64,
        fraction_done: f64,
    ) -> Result<()> {
        let message = {
            let mut inner = self.inner.lock();
            let options = match inner.options {
                Some(options) if inner.state.is_initialized() => options,
                _ => return Err(LifecycleError::invalid_state("report_status", inner.state)),
            };
            if !options.auto_send_status_messages_enabled {
                return Ok(());
            }
            let fraction_done = if fraction_done.is_nan() {
                inner.flags.fraction_done
            } else {
                self.init_data.scale_fraction(fraction_done.clamp(0.0, 1.0))
            };
            inner.flags.fraction_done = fraction_done;
            inner.last_status = self.clock.now();
            UpstreamMessage::Status {
                cpu_time,
                checkpoint_cpu_time,
                fraction_done,
            }
        };
        self.send_best_effort(&message, "status");
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Checkpointing
    // ---------------------------------------------------------------------

    /// Returns true if the task should checkpoint now.
    ///
    /// False unless `Running` (suspended, uninitialized and terminated tasks
    /// never checkpoint).
    #[must_use]
    pub fn is_time_to_checkpoint(&self) -> bool {
        let now = self.clock.now();
        let inner = self.inner.lock();
        inner.state == LifecycleState::Running && inner.checkpoint.is_due(now)
    }

    /// Tells the controller a checkpoint was written.
    ///
    /// # Errors
    /// Returns `InvalidState` before initialization or after termination.
    pub fn checkpoint_completed(&self) -> Result<()> {
        let cpu = self.cpu_seconds();
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        if !inner.state.is_initialized() {
            return Err(LifecycleError::invalid_state("checkpoint_completed", inner.state));
        }
        inner.checkpoint.completed(now, cpu);
        tracing::debug!(cpu_time = cpu, "checkpoint completed");
        Ok(())
    }

    /// Changes the minimum time between checkpoints.
    ///
    /// # Errors
    /// Returns `InvalidState` before initialization or after termination.
    pub fn set_minimum_checkpoint_period(&self, period: Duration) -> Result<()> {
        let mut inner = self.inner.lock();
        if !inner.state.is_initialized() {
            return Err(LifecycleError::invalid_state(
                "set_minimum_checkpoint_period",
                inner.state,
            ));
        }
        inner.checkpoint.set_min_period(period);
        tracing::debug!(period = ?period, "checkpoint period changed");
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Critical sections
    // ---------------------------------------------------------------------

    /// Opens a critical section level.
    ///
    /// Prefer [`Self::critical_section`], which cannot be left open.
    pub fn begin_critical_section(&self) {
        let depth = self.inner.lock().critical.begin();
        tracing::trace!(depth, "critical section entered");
    }

    /// Closes a critical section level.
    ///
    /// Closing the outermost level replays the requests that arrived while
    /// it was open. Closing with no open level only logs a warning.
    pub fn end_critical_section(&self) {
        let termination = {
            let mut inner = self.inner.lock();
            match inner.critical.end() {
                EndOutcome::Unbalanced => {
                    tracing::warn!("end_critical_section without matching begin");
                    None
                }
                EndOutcome::Nested(depth) => {
                    tracing::trace!(depth, "critical section level closed");
                    None
                }
                EndOutcome::Released(deferred) => {
                    if !deferred.is_empty() {
                        tracing::debug!(count = deferred.len(), "replaying deferred requests");
                    }
                    let mut termination = None;
                    for DeferredRequest { request, kind } in deferred {
                        let outcome = self.apply_request(&mut inner, request, kind);
                        termination = termination.or(outcome);
                    }
                    termination
                }
            }
        };
        if let Some(termination) = termination {
            self.complete_termination(termination);
        }
    }

    /// Opens a critical section that closes when the guard is dropped.
    pub fn critical_section(&self) -> CriticalSectionGuard<'_> {
        self.begin_critical_section();
        CriticalSectionGuard::new(self)
    }

    /// Current critical section nesting depth.
    #[must_use]
    pub fn critical_depth(&self) -> u32 {
        self.inner.lock().critical.depth()
    }

    /// Returns true while a critical section is open.
    #[must_use]
    pub fn in_critical_section(&self) -> bool {
        self.inner.lock().critical.is_open()
    }

    /// Requests waiting for the critical section to close.
    #[must_use]
    pub fn deferred_requests(&self) -> Vec<ControlRequest> {
        self.inner.lock().critical.deferred()
    }

    // ---------------------------------------------------------------------
    // Timer pass
    // ---------------------------------------------------------------------

    /// Runs one timer pass.
    ///
    /// Drains the supervisor channel, applies or defers control requests,
    /// checks the heartbeat, sends a periodic status message and finally
    /// invokes the registered timer callback. Does nothing before
    /// initialization or once the lifecycle is ending.
    pub fn tick(&self) {
        {
            let inner = self.inner.lock();
            if inner.options.is_none() || !inner.state.is_initialized() {
                return;
            }
        }

        let (messages, disconnected) = self.drain_channel();
        let now = self.clock.now();

        let (termination, status) = {
            let mut inner = self.inner.lock();
            let Some(options) = inner.options else {
                return;
            };
            if !inner.state.is_initialized() {
                return;
            }

            let mut termination = None;
            for message in messages {
                let outcome = self.handle_message(&mut inner, options, message, now);
                termination = termination.or(outcome);
            }

            if disconnected && termination.is_none() {
                termination = self.supervisor_lost(&mut inner, options);
            }

            if termination.is_none() {
                let expired = inner.heartbeat.as_mut().is_some_and(|hb| hb.check(now));
                if expired {
                    tracing::warn!(
                        timeout = ?inner.heartbeat.as_ref().map(HeartbeatMonitor::timeout),
                        "no heartbeat from supervisor"
                    );
                    termination = self.heartbeat_lost(&mut inner);
                }
            }

            let status = (termination.is_none()
                && options.auto_send_status_messages_enabled
                && inner.state.is_active()
                && now.saturating_duration_since(inner.last_status) >= self.config.status_interval)
                .then(|| {
                    inner.last_status = now;
                    self.status_message(&inner)
                });

            (termination, status)
        };

        if let Some(termination) = termination {
            self.complete_termination(termination);
            return;
        }
        if let Some(status) = status {
            self.send_best_effort(&status, "status");
        }

        let callback = self.timer_callback.lock().clone();
        if let Some(callback) = callback {
            callback();
        }
    }

    /// Replaces the callback run at the end of every timer pass.
    pub fn register_timer_callback(&self, callback: impl Fn() + Send + Sync + 'static) {
        *self.timer_callback.lock() = Some(Arc::new(callback));
    }

    fn drain_channel(&self) -> (Vec<ControlMessage>, bool) {
        let mut messages = Vec::new();
        loop {
            match self.channel.try_recv() {
                Ok(Some(message)) => messages.push(message),
                Ok(None) => return (messages, false),
                Err(e) if e.is_disconnected() => return (messages, true),
                Err(e) => {
                    tracing::warn!(error = %e, "failed to read supervisor channel");
                    return (messages, false);
                }
            }
        }
    }

    fn handle_message(
        &self,
        inner: &mut Inner,
        options: ApplicationOptions,
        message: ControlMessage,
        now: Instant,
    ) -> Option<Termination> {
        match message {
            ControlMessage::Heartbeat => {
                if let Some(hb) = inner.heartbeat.as_mut() {
                    hb.beat(now);
                }
                None
            }
            ControlMessage::RereadInitData => {
                inner.flags.reread_init_data = true;
                None
            }
            ControlMessage::NetworkAvailable => {
                inner.flags.network_available = true;
                None
            }
            ControlMessage::Suspend
            | ControlMessage::Resume
            | ControlMessage::Quit
            | ControlMessage::Abort => {
                let request = message.as_request()?;
                if options.auto_handle_process_control_messages_enabled {
                    self.handle_request(inner, request)
                } else {
                    record_request(&mut inner.flags, request);
                    None
                }
            }
        }
    }

    fn handle_request(&self, inner: &mut Inner, request: ControlRequest) -> Option<Termination> {
        if inner.critical.is_open() {
            if inner.critical.defer(request) {
                tracing::debug!(request = ?request, depth = inner.critical.depth(), "request deferred");
            } else {
                tracing::debug!(request = ?request, "request superseded in critical section");
            }
            return None;
        }
        self.apply_request(inner, request, ExitKind::for_request(request))
    }

    fn apply_request(
        &self,
        inner: &mut Inner,
        request: ControlRequest,
        kind: ExitKind,
    ) -> Option<Termination> {
        match request {
            ControlRequest::Suspend => {
                if inner.state == LifecycleState::Running {
                    inner.state = LifecycleState::Suspended;
                    inner.flags.suspended = true;
                    inner.checkpoint.set_inhibited(true);
                    tracing::info!("task suspended");
                }
                None
            }
            ControlRequest::Resume => {
                if inner.state == LifecycleState::Suspended {
                    inner.state = LifecycleState::Running;
                    inner.flags.suspended = false;
                    inner.checkpoint.set_inhibited(false);
                    self.resumed.notify_all();
                    tracing::info!("task resumed");
                }
                None
            }
            ControlRequest::Quit | ControlRequest::Abort => {
                self.terminate_on_request(inner, request, kind)
            }
        }
    }

    fn terminate_on_request(
        &self,
        inner: &mut Inner,
        request: ControlRequest,
        kind: ExitKind,
    ) -> Option<Termination> {
        if !inner.state.is_initialized() {
            return None;
        }
        let options = inner.options?;
        if !options.direct_action() {
            record_request(&mut inner.flags, request);
            tracing::info!(request = ?request, "termination requested, host must act");
            return None;
        }

        let code = if request == ControlRequest::Abort {
            EXIT_ABORTED_BY_CLIENT
        } else {
            EXIT_QUIT_REQUESTED
        };
        let final_status = options
            .auto_send_status_messages_enabled
            .then(|| self.status_message(inner));

        inner.state = LifecycleState::Terminated;
        inner.flags.suspended = false;
        self.resumed.notify_all();
        tracing::info!(request = ?request, code, "terminating on supervisor request");

        Some(Termination {
            code,
            kind,
            lock: inner.lock.take(),
            final_status,
        })
    }

    fn heartbeat_lost(&self, inner: &mut Inner) -> Option<Termination> {
        inner.flags.no_heartbeat = true;
        if inner.critical.is_open() {
            inner.critical.defer_as(ControlRequest::Quit, ExitKind::HeartbeatLost);
            tracing::debug!("heartbeat loss deferred as quit");
            return None;
        }
        self.apply_request(inner, ControlRequest::Quit, ExitKind::HeartbeatLost)
    }

    fn supervisor_lost(
        &self,
        inner: &mut Inner,
        options: ApplicationOptions,
    ) -> Option<Termination> {
        if options.heartbeat_timeout_check_enabled {
            let first = inner.heartbeat.as_mut().is_some_and(HeartbeatMonitor::trip);
            if first {
                tracing::warn!("supervisor channel disconnected");
                return self.heartbeat_lost(inner);
            }
        } else if !inner.channel_lost_reported {
            inner.channel_lost_reported = true;
            tracing::warn!("supervisor channel disconnected, heartbeat checks disabled");
        }
        None
    }

    fn complete_termination(&self, termination: Termination) {
        release_lock(termination.lock);
        if let Some(status) = termination.final_status {
            self.send_best_effort(&status, "final status");
        }
        self.exit.exit(termination.code, termination.kind);
    }

    // ---------------------------------------------------------------------
    // Suspension
    // ---------------------------------------------------------------------

    /// Blocks while the task is suspended.
    ///
    /// Returns immediately if not suspended. Wakes on resume and on
    /// termination.
    pub fn wait_while_suspended(&self) {
        let mut inner = self.inner.lock();
        while inner.state == LifecycleState::Suspended {
            self.resumed.wait(&mut inner);
        }
    }

    /// Like [`Self::wait_while_suspended`] but gives up after `timeout`.
    ///
    /// Returns true if the task is no longer suspended.
    pub fn wait_while_suspended_for(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut inner = self.inner.lock();
        while inner.state == LifecycleState::Suspended {
            if self.resumed.wait_until(&mut inner, deadline).timed_out() {
                break;
            }
        }
        inner.state != LifecycleState::Suspended
    }

    // ---------------------------------------------------------------------
    // Advisory messages
    // ---------------------------------------------------------------------

    /// Asks the supervisor to pause other tasks competing for resources.
    ///
    /// # Errors
    /// Returns `SupervisorUnreachable` if the message cannot be sent.
    pub fn suspend_other_activities(&self) -> Result<()> {
        self.send_advisory(&UpstreamMessage::SuspendOtherActivities, "suspend_other_activities")
    }

    /// Lets paused tasks run again.
    ///
    /// # Errors
    /// Returns `SupervisorUnreachable` if the message cannot be sent.
    pub fn resume_other_activities(&self) -> Result<()> {
        self.send_advisory(&UpstreamMessage::ResumeOtherActivities, "resume_other_activities")
    }

    /// Hands a trickle message to the supervisor.
    ///
    /// # Errors
    /// Returns `SupervisorUnreachable` if the message cannot be sent; the
    /// lifecycle state is unaffected.
    pub fn send_trickle_up(&self, variety: &str, text: &str) -> Result<()> {
        self.send_advisory(
            &UpstreamMessage::TrickleUp {
                variety: variety.to_string(),
                text: text.to_string(),
            },
            "trickle_up",
        )
    }

    fn send_advisory(&self, message: &UpstreamMessage, what: &'static str) -> Result<()> {
        self.channel.send(message).map_err(|e| {
            tracing::warn!(message = what, error = %e, "advisory message not delivered");
            LifecycleError::from(e)
        })
    }

    fn send_best_effort(&self, message: &UpstreamMessage, what: &'static str) -> bool {
        match self.channel.send(message) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(message = what, error = %e, "failed to send to supervisor");
                false
            }
        }
    }

    // ---------------------------------------------------------------------
    // Termination
    // ---------------------------------------------------------------------

    /// Ends the task with `status`.
    ///
    /// # Errors
    /// See [`Self::finish_with_notice`].
    pub fn finish(&self, status: i32) -> Result<()> {
        self.finish_with_notice(status, None)
    }

    /// Ends the task with `status` and an optional message for the user.
    ///
    /// For an initialized main program this flushes a final status, writes
    /// the finish marker and releases the slot lock. The supervisor is told
    /// either way and the exit hook runs last. Returns only if the exit
    /// hook returns.
    ///
    /// # Errors
    /// - `AlreadyTerminated` if the lifecycle already ended
    /// - an I/O error if the finish marker could not be written
    pub fn finish_with_notice(&self, status: i32, notice: Option<Notice>) -> Result<()> {
        let (options, lock, final_status) = self.begin_ending("finish")?;

        if let Some(message) = final_status {
            self.send_best_effort(&message, "final status");
        }
        let mut result = Ok(());
        if options.is_some_and(|o| o.main_program) {
            if let Err(e) = self.slot.write_finish_marker(status, notice.as_ref()) {
                tracing::error!(error = %e, "failed to write finish marker");
                result = Err(e);
            }
        }
        release_lock(lock);
        self.send_best_effort(&UpstreamMessage::Finished { status, notice }, "finished");

        self.end_state(LifecycleState::Terminated);
        tracing::info!(status, "task finished");
        self.exit.exit(status, ExitKind::Finished);
        result
    }

    /// Ends the task and asks to be restarted after `delay`.
    ///
    /// # Errors
    /// - `AlreadyTerminated` if the lifecycle already ended
    /// - an I/O error if the temporary exit marker could not be written
    pub fn temporary_exit(&self, delay: Duration, notice: Option<Notice>) -> Result<()> {
        let (options, lock, final_status) = self.begin_ending("temporary_exit")?;

        if let Some(message) = final_status {
            self.send_best_effort(&message, "final status");
        }
        let mut result = Ok(());
        if options.is_some_and(|o| o.main_program) {
            if let Err(e) = self.slot.write_temporary_exit_marker(delay, notice.as_ref()) {
                tracing::error!(error = %e, "failed to write temporary exit marker");
                result = Err(e);
            }
        }
        release_lock(lock);
        self.send_best_effort(
            &UpstreamMessage::TemporaryExit {
                delay_secs: delay.as_secs(),
                notice,
            },
            "temporary_exit",
        );

        self.end_state(LifecycleState::TemporaryExit);
        tracing::info!(delay = ?delay, "task exiting temporarily");
        self.exit.exit(0, ExitKind::TemporaryExit);
        result
    }

    /// Moves to `Finishing` and takes what the ending needs out of the state.
    #[allow(clippy::type_complexity)]
    fn begin_ending(
        &self,
        operation: &'static str,
    ) -> Result<(Option<ApplicationOptions>, Option<LockFile>, Option<UpstreamMessage>)> {
        let mut inner = self.inner.lock();
        if matches!(
            inner.state,
            LifecycleState::Finishing | LifecycleState::Terminated | LifecycleState::TemporaryExit
        ) {
            return Err(LifecycleError::AlreadyTerminated);
        }

        let options = if inner.state.is_initialized() {
            inner.options
        } else {
            None
        };
        let final_status = options
            .filter(|o| o.auto_send_status_messages_enabled)
            .map(|_| self.status_message(&inner));

        tracing::debug!(operation, from = ?inner.state, "lifecycle ending");
        inner.state = LifecycleState::Finishing;
        Ok((options, inner.lock.take(), final_status))
    }

    fn end_state(&self, state: LifecycleState) {
        let mut inner = self.inner.lock();
        inner.state = state;
        inner.flags.suspended = false;
        self.resumed.notify_all();
    }

    // ---------------------------------------------------------------------
    // Accessors
    // ---------------------------------------------------------------------

    /// Returns the physical path for a logical file name.
    ///
    /// # Errors
    /// Returns `UnknownLogicalName` if the manifest has no such name.
    pub fn resolve_file_name(&self, logical: &str) -> Result<PathBuf> {
        self.manifest.resolve(logical)
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        self.inner.lock().state
    }

    /// Snapshot of the status flags.
    #[must_use]
    pub fn status(&self) -> StatusFlags {
        self.inner.lock().flags
    }

    /// Termination the host must perform, if running without direct action.
    #[must_use]
    pub fn pending_action(&self) -> Option<PendingAction> {
        self.inner.lock().flags.pending_action()
    }

    /// Returns and clears the reread-init-data flag.
    pub fn take_reread_init_data(&self) -> bool {
        std::mem::take(&mut self.inner.lock().flags.reread_init_data)
    }

    /// Options frozen at initialization.
    #[must_use]
    pub fn options(&self) -> Option<ApplicationOptions> {
        self.inner.lock().options
    }

    /// Init data the controller was built with.
    #[must_use]
    pub const fn init_data(&self) -> &AppInitData {
        &self.init_data
    }

    /// Controller configuration.
    #[must_use]
    pub const fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// The slot directory in use.
    #[must_use]
    pub const fn slot_dir(&self) -> &SlotDir {
        &self.slot
    }

    /// This process's registration id.
    #[must_use]
    pub const fn instance_id(&self) -> TaskInstanceId {
        self.instance
    }

    /// Current minimum checkpoint period.
    #[must_use]
    pub fn checkpoint_period(&self) -> Duration {
        self.inner.lock().checkpoint.min_period()
    }

    /// Total CPU seconds for the workunit, earlier runs included.
    #[must_use]
    pub fn cpu_seconds(&self) -> f64 {
        wu_cpu_time(self.init_data.wu_cpu_time, (self.cpu_time)())
    }

    fn status_message(&self, inner: &Inner) -> UpstreamMessage {
        UpstreamMessage::Status {
            cpu_time: self.cpu_seconds(),
            checkpoint_cpu_time: inner.checkpoint.last_checkpoint_cpu_time(),
            fraction_done: inner.flags.fraction_done,
        }
    }
}

impl std::fmt::Debug for LifecycleController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleController")
            .field("instance", &self.instance)
            .field("slot", &self.slot)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

fn record_request(flags: &mut StatusFlags, request: ControlRequest) {
    match request {
        ControlRequest::Suspend => flags.suspended = true,
        ControlRequest::Resume => flags.suspended = false,
        ControlRequest::Quit => flags.quit_request = true,
        ControlRequest::Abort => flags.abort_request = true,
    }
}

fn release_lock(lock: Option<LockFile>) {
    if let Some(lock) = lock {
        let path = lock.path().to_path_buf();
        if let Err(e) = lock.release() {
            tracing::warn!(path = %path.display(), error = %e, "failed to release slot lock");
        }
    }
}
