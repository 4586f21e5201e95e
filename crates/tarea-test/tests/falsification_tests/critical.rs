//! Falsification Tests: Category C - Critical Sections (F041-F060)

use std::time::Duration;

use tarea_core::{
    ApplicationOptions, ControlMessage, EXIT_ABORTED_BY_CLIENT, EXIT_QUIT_REQUESTED, ExitKind,
    LifecycleState, PendingAction,
};
use tarea_test::SupervisorHarness;

/// F041: Suspend during nested sections is applied once, after the outermost end
#[test]
fn f041_nested_sections_defer_suspend() {
    let harness = SupervisorHarness::running().unwrap();
    let controller = harness.controller();

    {
        let _outer = controller.critical_section();
        {
            let _inner = controller.critical_section();
            harness.deliver(ControlMessage::Suspend).unwrap();
            harness.expect_state(LifecycleState::Running).unwrap();
        }
        harness.expect_state(LifecycleState::Running).unwrap();
        assert_eq!(controller.critical_depth(), 1);
    }

    harness.expect_state(LifecycleState::Suspended).unwrap();
    harness.deliver(ControlMessage::Resume).unwrap();
    harness.expect_state(LifecycleState::Running).unwrap();
}

/// F042: An abort while writing a checkpoint waits for the write to finish
#[test]
fn f042_abort_waits_for_checkpoint_write() {
    let harness = SupervisorHarness::running().unwrap();
    let controller = harness.controller();

    {
        let _guard = controller.critical_section();
        harness.deliver(ControlMessage::Abort).unwrap();
        harness.expect_no_exit().unwrap();
        controller.checkpoint_completed().unwrap();
    }

    harness
        .expect_single_exit(EXIT_ABORTED_BY_CLIENT, ExitKind::Abort)
        .unwrap();
    assert!(!harness.lock_file_present());
}

/// F043: Supervisor loss during a section ends the task after the section
#[test]
fn f043_heartbeat_loss_after_section() {
    let harness = SupervisorHarness::running().unwrap();
    let controller = harness.controller();

    controller.begin_critical_section();
    harness.advance(Duration::from_secs(45));
    harness.tick();
    harness.expect_no_exit().unwrap();
    assert!(controller.status().no_heartbeat);

    controller.end_critical_section();
    harness
        .expect_single_exit(EXIT_QUIT_REQUESTED, ExitKind::HeartbeatLost)
        .unwrap();
}

/// F044: Without direct action, deferred requests surface as flags
#[test]
fn f044_deferred_requests_without_direct_action() {
    let harness = SupervisorHarness::builder()
        .with_options(ApplicationOptions::wrapper())
        .build()
        .unwrap();
    harness.initialize().unwrap();
    let controller = harness.controller();

    {
        let _guard = controller.critical_section();
        harness.deliver(ControlMessage::Quit).unwrap();
        assert_eq!(controller.pending_action(), None);
    }

    assert_eq!(controller.pending_action(), Some(PendingAction::Quit));
    harness.expect_state(LifecycleState::Running).unwrap();
    harness.expect_no_exit().unwrap();
}

/// F045: Sections opened on several threads nest correctly
#[test]
fn f045_sections_across_threads() {
    let harness = SupervisorHarness::running().unwrap();
    let controller = harness.controller().clone();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let controller = controller.clone();
            std::thread::spawn(move || {
                for _ in 0..100 {
                    let _guard = controller.critical_section();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(controller.critical_depth(), 0);
    harness.expect_no_exit().unwrap();
}
