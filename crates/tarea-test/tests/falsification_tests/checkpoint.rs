//! Falsification Tests: Category B - Checkpointing (F021-F040)

use std::time::Duration;

use proptest::prelude::*;
use tarea_core::{AppInitData, ControlMessage, LifecycleState};
use tarea_test::{ScriptStep, SupervisorHarness};

fn harness_with_period(secs: u64) -> SupervisorHarness {
    let harness = SupervisorHarness::builder()
        .with_init_data(AppInitData::new().with_checkpoint_period(Duration::from_secs(secs)))
        .build()
        .unwrap();
    harness.initialize().unwrap();
    harness
}

/// F021: 10 s period: not due at 0 s or 9 s, due at 11 s
#[test]
fn f021_checkpoint_due_after_period() {
    let harness = harness_with_period(10);
    let controller = harness.controller();

    assert!(!controller.is_time_to_checkpoint());
    harness
        .run_for(Duration::from_secs(9), Duration::from_secs(1))
        .unwrap();
    assert!(!controller.is_time_to_checkpoint());
    harness
        .run_for(Duration::from_secs(2), Duration::from_secs(1))
        .unwrap();
    assert!(controller.is_time_to_checkpoint());
}

/// F022: A worker that checkpoints whenever told does so once per period
#[test]
fn f022_checkpoint_cadence() {
    let harness = harness_with_period(10);
    let controller = harness.controller();

    let mut checkpoints = 0;
    for _ in 0..100 {
        harness
            .run_for(Duration::from_secs(1), Duration::from_secs(1))
            .unwrap();
        if controller.is_time_to_checkpoint() {
            let _guard = controller.critical_section();
            controller.checkpoint_completed().unwrap();
            checkpoints += 1;
        }
    }
    assert_eq!(checkpoints, 10);
}

/// F023: No checkpoint is requested while suspended, however long
#[test]
fn f023_suspension_blocks_checkpoints() {
    let harness = harness_with_period(10);
    harness
        .play(&[
            ScriptStep::Send(ControlMessage::Suspend),
            ScriptStep::Tick,
            ScriptStep::Run {
                total: Duration::from_secs(600),
                step: Duration::from_secs(1),
            },
        ])
        .unwrap();

    harness.expect_state(LifecycleState::Suspended).unwrap();
    assert!(!harness.controller().is_time_to_checkpoint());

    harness.deliver(ControlMessage::Resume).unwrap();
    assert!(harness.controller().is_time_to_checkpoint());
}

proptest! {
    /// F024: After a checkpoint the timer stays quiet for the whole period
    #[test]
    fn f024_quiet_after_checkpoint(period in 1u64..120, probes in prop::collection::vec(0u64..1000, 1..20)) {
        let harness = harness_with_period(period);
        let controller = harness.controller();
        harness.advance(Duration::from_secs(period));
        prop_assert!(controller.is_time_to_checkpoint());
        controller.checkpoint_completed().unwrap();

        let mut elapsed_ms = 0u64;
        for probe in probes {
            harness.advance(Duration::from_millis(probe));
            elapsed_ms += probe;
            let due = controller.is_time_to_checkpoint();
            prop_assert_eq!(due, elapsed_ms >= period * 1000);
        }
    }
}
