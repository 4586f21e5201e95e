//! Falsification Tests: Category A - Lifecycle (F001-F020)

use std::time::Duration;

use tarea_core::{
    AppInitData, ApplicationOptions, ExitKind, LifecycleError, LifecycleState, Notice,
    UpstreamMessage,
};
use tarea_test::{SupervisorHarness, TestError};

/// F001: Initialize twice fails the second time
#[test]
fn f001_double_initialize() {
    let harness = SupervisorHarness::running().unwrap();
    let err = harness.controller().initialize_default().unwrap_err();
    assert!(matches!(err, LifecycleError::AlreadyInitialized));
    assert!(harness.upstream().is_empty());
}

/// F002: A full run ends with a finish marker and no lock
#[test]
fn f002_full_run_to_finish() {
    let harness = SupervisorHarness::running().unwrap();
    let controller = harness.controller();

    for step in 1..=10 {
        harness
            .run_for(Duration::from_secs(1), Duration::from_secs(1))
            .unwrap();
        controller.report_progress(f64::from(step) / 10.0).unwrap();
    }
    controller.finish(0).unwrap();

    harness.expect_state(LifecycleState::Terminated).unwrap();
    harness.expect_single_exit(0, ExitKind::Finished).unwrap();
    assert!(!harness.lock_file_present());
    let marker = harness.finish_marker().unwrap().unwrap();
    assert_eq!(marker.value, 0);

    let upstream = harness.upstream();
    assert!(upstream.iter().any(|m| matches!(m, UpstreamMessage::Status { .. })));
    assert!(matches!(
        upstream.last(),
        Some(UpstreamMessage::Finished { status: 0, .. })
    ));
}

/// F003: The second finish has no effect
#[test]
fn f003_second_finish() {
    let harness = SupervisorHarness::running().unwrap();
    harness.controller().finish(0).unwrap();
    let err = harness.controller().finish(1).unwrap_err();
    assert!(matches!(err, LifecycleError::AlreadyTerminated));
    assert_eq!(harness.finish_marker().unwrap().unwrap().value, 0);
    harness.expect_single_exit(0, ExitKind::Finished).unwrap();
}

/// F004: Finish before initialize leaves the slot untouched
#[test]
fn f004_finish_uninitialized() {
    let harness = SupervisorHarness::builder().build().unwrap();
    harness.controller().finish(0).unwrap();
    assert!(harness.finish_marker().unwrap().is_none());
    assert!(!harness.lock_file_present());
    harness.expect_state(LifecycleState::Terminated).unwrap();
}

/// F005: Temporary exit asks for a delayed restart
#[test]
fn f005_temporary_exit() {
    let harness = SupervisorHarness::running().unwrap();
    harness
        .controller()
        .temporary_exit(Duration::from_secs(90), Some(Notice::notice("license server down")))
        .unwrap();

    harness.expect_state(LifecycleState::TemporaryExit).unwrap();
    harness.expect_single_exit(0, ExitKind::TemporaryExit).unwrap();
    let marker = harness.temporary_exit_marker().unwrap().unwrap();
    assert_eq!(marker.value, 90);
    assert_eq!(marker.notice, Some(Notice::notice("license server down")));
    assert!(harness.finish_marker().unwrap().is_none());
}

/// F006: Progress reported in a sub-window lands in that window
#[test]
fn f006_fraction_window() {
    let harness = SupervisorHarness::builder()
        .with_init_data(AppInitData::new().with_fraction_window(0.5, 1.0))
        .build()
        .unwrap();
    harness.initialize().unwrap();

    harness.controller().report_progress(0.0).unwrap();
    harness
        .run_for(Duration::from_secs(1), Duration::from_secs(1))
        .unwrap();
    let fractions: Vec<f64> = harness
        .upstream()
        .into_iter()
        .filter_map(|m| match m {
            UpstreamMessage::Status { fraction_done, .. } => Some(fraction_done),
            _ => None,
        })
        .collect();
    assert_eq!(fractions.len(), 1);
    assert!((fractions[0] - 0.5).abs() < 1e-9);
}

/// F007: The manifest resolves every registered file and nothing else
#[test]
fn f007_manifest_resolution() {
    let harness = SupervisorHarness::builder()
        .with_init_data(
            AppInitData::new()
                .with_file("genome", "/data/slot/genome_v3.fa")
                .with_file("params", "/data/slot/params.xml"),
        )
        .build()
        .unwrap();

    let controller = harness.controller();
    assert_eq!(
        controller.resolve_file_name("genome").unwrap(),
        std::path::PathBuf::from("/data/slot/genome_v3.fa")
    );
    assert_eq!(
        controller.resolve_file_name("genome").unwrap(),
        controller.resolve_file_name("genome").unwrap()
    );
    assert!(matches!(
        controller.resolve_file_name("genome_v3.fa"),
        Err(LifecycleError::UnknownLogicalName(_))
    ));
}

/// F008: Two tasks cannot share one slot
#[test]
fn f008_slot_exclusive() {
    let harness = SupervisorHarness::running().unwrap();
    let (channel, _endpoint) = tarea_core::MemoryChannel::pair();
    let mut config = tarea_core::ControllerConfig::new(harness.slot_path());
    config.lock_retries = 1;
    let second = tarea_core::LifecycleController::builder(channel)
        .config(config)
        .exit_hook(tarea_core::RecordingExit::new())
        .build()
        .unwrap();

    let err = second.initialize_default().unwrap_err();
    assert!(err.is_fatal());
    assert!(matches!(err, LifecycleError::ResourceUnavailable(_)));
}

/// F009: A wrapper can share the slot with its main program
#[test]
fn f009_wrapper_does_not_lock() {
    let harness = SupervisorHarness::builder()
        .with_options(ApplicationOptions::wrapper().with_main_program(false))
        .build()
        .unwrap();
    harness.initialize().unwrap();
    assert!(!harness.lock_file_present());
}

/// F010: Harness expectations report mismatches as errors
#[test]
fn f010_expectation_errors() {
    let harness = SupervisorHarness::running().unwrap();
    assert!(matches!(
        harness.expect_single_exit(0, ExitKind::Finished),
        Err(TestError::Assertion(_))
    ));
    harness.expect_no_exit().unwrap();
}
