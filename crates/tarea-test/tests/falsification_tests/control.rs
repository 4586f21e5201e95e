//! Falsification Tests: Category D - Supervisor Control (F061-F080)

use std::time::Duration;

use tarea_core::{
    AppInitData, ApplicationOptions, ControlMessage, EXIT_ABORTED_BY_CLIENT, EXIT_QUIT_REQUESTED,
    ExitKind, LifecycleState, PendingAction,
};
use tarea_test::{ScriptStep, SupervisorHarness};

/// F061: Quit without direct action sets a flag and does not terminate
#[test]
fn f061_quit_without_direct_action() {
    let harness = SupervisorHarness::builder()
        .with_options(ApplicationOptions::wrapper())
        .build()
        .unwrap();
    harness.initialize().unwrap();

    harness.deliver(ControlMessage::Quit).unwrap();

    assert!(harness.controller().status().quit_request);
    harness.expect_state(LifecycleState::Running).unwrap();
    harness.expect_no_exit().unwrap();
    assert!(harness.lock_file_present());
}

/// F062: Quit with direct action exits with the quit code
#[test]
fn f062_quit_with_direct_action() {
    let harness = SupervisorHarness::running().unwrap();
    harness.deliver(ControlMessage::Quit).unwrap();
    harness
        .expect_single_exit(EXIT_QUIT_REQUESTED, ExitKind::Quit)
        .unwrap();
    harness.expect_state(LifecycleState::Terminated).unwrap();
    assert!(!harness.lock_file_present());
    assert!(harness.finish_marker().unwrap().is_none());
}

/// F063: Abort with direct action exits with the abort code
#[test]
fn f063_abort_with_direct_action() {
    let harness = SupervisorHarness::running().unwrap();
    harness.deliver(ControlMessage::Abort).unwrap();
    harness
        .expect_single_exit(EXIT_ABORTED_BY_CLIENT, ExitKind::Abort)
        .unwrap();
}

/// F064: Regular heartbeats keep the task alive indefinitely
#[test]
fn f064_heartbeats_keep_alive() {
    let harness = SupervisorHarness::running().unwrap();
    harness
        .run_for(Duration::from_secs(3600), Duration::from_secs(10))
        .unwrap();
    harness.expect_state(LifecycleState::Running).unwrap();
    assert!(!harness.controller().status().no_heartbeat);
}

/// F065: A silent supervisor ends the task after the timeout
#[test]
fn f065_silent_supervisor() {
    let harness = SupervisorHarness::builder()
        .with_heartbeat_timeout(Duration::from_secs(5))
        .build()
        .unwrap();
    harness.initialize().unwrap();

    harness.advance(Duration::from_secs(5));
    harness.tick();
    harness.expect_no_exit().unwrap();

    harness.advance(Duration::from_secs(1));
    harness.tick();
    harness
        .expect_single_exit(EXIT_QUIT_REQUESTED, ExitKind::HeartbeatLost)
        .unwrap();
}

/// F066: The init data heartbeat timeout overrides the configured one
#[test]
fn f066_init_data_heartbeat_timeout() {
    let harness = SupervisorHarness::builder()
        .with_init_data(AppInitData::new().with_heartbeat_timeout(Duration::from_secs(120)))
        .build()
        .unwrap();
    harness.initialize().unwrap();

    harness.advance(Duration::from_secs(100));
    harness.tick();
    harness.expect_no_exit().unwrap();

    harness.advance(Duration::from_secs(21));
    harness.tick();
    assert!(harness.controller().status().no_heartbeat);
}

/// F067: A closed channel is treated as a lost supervisor
#[test]
fn f067_disconnect() {
    let mut harness = SupervisorHarness::running().unwrap();
    harness.disconnect();
    harness.tick();
    harness
        .expect_single_exit(EXIT_QUIT_REQUESTED, ExitKind::HeartbeatLost)
        .unwrap();
    assert!(!harness.lock_file_present());
}

/// F068: A wrapper polls pending actions and finishes on its own terms
#[test]
fn f068_wrapper_cooperative_abort() {
    let harness = SupervisorHarness::builder()
        .with_options(ApplicationOptions::wrapper())
        .build()
        .unwrap();
    harness.initialize().unwrap();

    harness
        .play(&[
            ScriptStep::Run {
                total: Duration::from_secs(3),
                step: Duration::from_secs(1),
            },
            ScriptStep::Send(ControlMessage::Abort),
            ScriptStep::Tick,
        ])
        .unwrap();

    let controller = harness.controller();
    assert_eq!(controller.pending_action(), Some(PendingAction::Abort));
    controller.finish(EXIT_ABORTED_BY_CLIENT).unwrap();
    harness
        .expect_single_exit(EXIT_ABORTED_BY_CLIENT, ExitKind::Finished)
        .unwrap();
}

/// F069: Suspend and resume round trips leave no residue
#[test]
fn f069_repeated_suspend_resume() {
    let harness = SupervisorHarness::running().unwrap();
    for _ in 0..50 {
        harness.deliver(ControlMessage::Suspend).unwrap();
        harness.expect_state(LifecycleState::Suspended).unwrap();
        harness.deliver(ControlMessage::Resume).unwrap();
        harness.expect_state(LifecycleState::Running).unwrap();
    }
    let flags = harness.controller().status();
    assert!(!flags.suspended);
    assert_eq!(flags.pending_action(), None);
}

/// F070: Status stops once the supervisor refuses messages, but the task continues
#[test]
fn f070_refused_status_is_harmless() {
    let harness = SupervisorHarness::builder()
        .with_status_interval(Duration::from_secs(2))
        .build()
        .unwrap();
    harness.initialize().unwrap();

    harness.refuse_upstream(true);
    harness
        .run_for(Duration::from_secs(10), Duration::from_secs(1))
        .unwrap();
    harness.expect_state(LifecycleState::Running).unwrap();

    harness.refuse_upstream(false);
    harness
        .run_for(Duration::from_secs(2), Duration::from_secs(1))
        .unwrap();
    assert!(!harness.upstream().is_empty());
}
