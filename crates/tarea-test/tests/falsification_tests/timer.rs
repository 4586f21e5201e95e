//! Falsification Tests: Category E - Timer Worker and Transports (F081-F100)

use std::io::{Cursor, Write};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tarea_core::protocol::decode_line;
use tarea_core::{
    ApplicationOptions, ControlMessage, ControllerConfig, EXIT_QUIT_REQUESTED, ExitKind,
    LifecycleController, LifecycleState, RecordingExit, StreamChannel, TimerWorker,
    UpstreamMessage,
};
use tarea_test::SupervisorHarness;

async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..400 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

/// F081: The timer worker applies a quit without any help from the host
#[tokio::test]
async fn f081_worker_applies_quit() {
    let harness = SupervisorHarness::running().unwrap();
    let worker =
        TimerWorker::spawn_with_period(harness.controller().clone(), Duration::from_millis(5));

    harness.send(ControlMessage::Quit).unwrap();

    assert!(wait_until(|| worker.is_finished()).await);
    harness
        .expect_single_exit(EXIT_QUIT_REQUESTED, ExitKind::Quit)
        .unwrap();
    harness.expect_state(LifecycleState::Terminated).unwrap();
}

/// F082: A stopped worker no longer ticks
#[tokio::test]
async fn f082_stopped_worker_is_quiet() {
    let harness = SupervisorHarness::running().unwrap();
    let ticks = Arc::new(AtomicU32::new(0));
    let counter = ticks.clone();
    harness.controller().register_timer_callback(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let worker =
        TimerWorker::spawn_with_period(harness.controller().clone(), Duration::from_millis(5));
    assert!(wait_until(|| ticks.load(Ordering::SeqCst) >= 3).await);
    worker.stop().await;

    let after_stop = ticks.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(ticks.load(Ordering::SeqCst), after_stop);
}

/// F083: The worker suspends and resumes the task between computation steps
#[tokio::test]
async fn f083_worker_suspend_resume() {
    let harness = SupervisorHarness::running().unwrap();
    let worker =
        TimerWorker::spawn_with_period(harness.controller().clone(), Duration::from_millis(5));
    let controller = harness.controller().clone();

    harness.send(ControlMessage::Suspend).unwrap();
    assert!(wait_until(|| controller.state() == LifecycleState::Suspended).await);

    harness.send(ControlMessage::Resume).unwrap();
    let waited = tokio::task::spawn_blocking(move || {
        controller.wait_while_suspended_for(Duration::from_secs(2))
    })
    .await
    .unwrap();
    assert!(waited);

    worker.stop().await;
    harness.expect_no_exit().unwrap();
}

#[derive(Clone, Default)]
struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// F084: A controller works end to end over line-delimited JSON
#[tokio::test]
async fn f084_stream_channel_end_to_end() {
    let slot = tempfile::tempdir().unwrap();
    let input = concat!(
        "{\"type\":\"heartbeat\"}\n",
        "garbage that is skipped\n",
        "{\"type\":\"suspend\"}\n",
    );
    let output = SharedBuf::default();
    let channel = StreamChannel::new(Cursor::new(input), output.clone()).unwrap();
    let exit = Arc::new(RecordingExit::new());

    let controller = Arc::new(
        LifecycleController::builder(channel)
            .config(ControllerConfig::new(slot.path()))
            .exit_hook(exit.clone())
            .build()
            .unwrap(),
    );
    // the input ends after two messages; a closed stream must not count as heartbeat loss here
    controller
        .initialize(ApplicationOptions::new().with_heartbeat_timeout_check(false))
        .unwrap();

    let worker = TimerWorker::spawn_with_period(controller.clone(), Duration::from_millis(5));
    assert!(wait_until(|| controller.state() == LifecycleState::Suspended).await);
    worker.stop().await;
    controller.finish(0).unwrap();

    let written = String::from_utf8(output.0.lock().unwrap().clone()).unwrap();
    let messages: Vec<UpstreamMessage> = written
        .lines()
        .map(|line| decode_line(line).unwrap())
        .collect();
    assert!(matches!(messages.first(), Some(UpstreamMessage::Register { .. })));
    assert!(matches!(
        messages.last(),
        Some(UpstreamMessage::Finished { status: 0, .. })
    ));
    assert_eq!(exit.last(), Some((0, ExitKind::Finished)));
}
