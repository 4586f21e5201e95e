//! Background timer driving [`LifecycleController::tick`].
//!
//! Hosts with a tokio runtime spawn a [`TimerWorker`]; hosts without one
//! call `tick()` from their own loop at `ControllerConfig::tick_interval`.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::controller::LifecycleController;

/// Handle to the timer task.
#[derive(Debug)]
pub struct TimerWorker {
    stop: Arc<Notify>,
    handle: JoinHandle<()>,
}

impl TimerWorker {
    /// Spawns the timer at the controller's configured tick interval.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn spawn(controller: Arc<LifecycleController>) -> Self {
        let period = controller.config().tick_interval;
        Self::spawn_with_period(controller, period)
    }

    /// Spawns the timer with an explicit period.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn spawn_with_period(controller: Arc<LifecycleController>, period: Duration) -> Self {
        let stop = Arc::new(Notify::new());
        let handle = tokio::spawn(run(controller, period, stop.clone()));
        tracing::debug!(period = ?period, "timer worker spawned");
        Self { stop, handle }
    }

    /// Stops the timer and waits for the task to end.
    pub async fn stop(self) {
        self.stop.notify_one();
        if let Err(e) = self.handle.await {
            tracing::warn!(error = %e, "timer worker ended abnormally");
        }
    }

    /// Returns true once the timer task has ended.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

async fn run(controller: Arc<LifecycleController>, period: Duration, stop: Arc<Notify>) {
    let mut interval = tokio::time::interval(period.max(Duration::from_millis(1)));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = stop.notified() => {
                tracing::debug!("timer worker stopped");
                break;
            }
            _ = interval.tick() => {
                controller.tick();
                if controller.state().is_terminal() {
                    tracing::debug!(state = ?controller.state(), "timer worker done, lifecycle ended");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::MemoryChannel;
    use crate::config::{ApplicationOptions, ControllerConfig};
    use crate::exit::{ExitKind, RecordingExit};
    use crate::types::LifecycleState;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn controller(
        dir: &std::path::Path,
    ) -> (
        Arc<LifecycleController>,
        crate::channels::SupervisorEndpoint,
        Arc<RecordingExit>,
    ) {
        let (channel, endpoint) = MemoryChannel::pair();
        let exit = Arc::new(RecordingExit::new());
        let controller = LifecycleController::builder(channel)
            .config(ControllerConfig::new(dir))
            .exit_hook(exit.clone())
            .build()
            .unwrap();
        (Arc::new(controller), endpoint, exit)
    }

    #[tokio::test]
    async fn test_timer_runs_callback_and_stops() {
        let dir = tempfile::tempdir().unwrap();
        let (controller, endpoint, _) = controller(dir.path());
        controller
            .initialize(ApplicationOptions::new().with_heartbeat_timeout_check(false))
            .unwrap();

        let ticks = Arc::new(AtomicU32::new(0));
        let counter = ticks.clone();
        controller.register_timer_callback(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let worker = TimerWorker::spawn_with_period(controller.clone(), Duration::from_millis(5));
        tokio::time::sleep(Duration::from_millis(100)).await;
        worker.stop().await;

        assert!(ticks.load(Ordering::SeqCst) >= 2);
        drop(endpoint);
    }

    #[tokio::test]
    async fn test_timer_ends_after_quit() {
        let dir = tempfile::tempdir().unwrap();
        let (controller, endpoint, exit) = controller(dir.path());
        controller.initialize_default().unwrap();

        let worker = TimerWorker::spawn_with_period(controller.clone(), Duration::from_millis(5));
        endpoint.quit();

        for _ in 0..200 {
            if worker.is_finished() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(worker.is_finished());
        assert_eq!(controller.state(), LifecycleState::Terminated);
        assert_eq!(exit.last(), Some((0, ExitKind::Quit)));
    }
}
