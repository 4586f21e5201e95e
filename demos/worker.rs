// Demos are allowed to use expect/unwrap for simplicity
#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::unnecessary_debug_formatting
)]

//! Tarea Worker Demo
//!
//! Runs a simulated computation under an in-process supervisor that sends
//! heartbeats, suspends the task for a while and then resumes it. The task
//! reports progress, writes checkpoints inside critical sections and
//! finishes with an exit marker in a temporary slot directory.
//!
//! # Usage
//!
//! ```bash
//! # Run to completion
//! cargo run --example worker
//!
//! # Have the supervisor abort the task halfway through
//! cargo run --example worker -- --abort
//!
//! # More log output
//! RUST_LOG=tarea_core=debug cargo run --example worker
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tarea::core::{ExitMarker, RecordingExit};
use tarea::prelude::*;

const STEPS: u32 = 60;
const STEP_TIME: Duration = Duration::from_millis(50);

fn print_help() {
    println!("Tarea worker demo");
    println!();
    println!("USAGE:");
    println!("    cargo run --example worker [-- OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    --abort    Supervisor aborts the task halfway through");
    println!("    -h, --help Print this help");
}

/// Plays the supervisor: heartbeats, one suspend/resume cycle, optional abort.
async fn supervise(endpoint: SupervisorEndpoint, abort: bool, done: Arc<AtomicBool>) {
    let mut beat = tokio::time::interval(Duration::from_millis(100));
    let mut elapsed = Duration::ZERO;

    while !done.load(Ordering::SeqCst) {
        beat.tick().await;
        elapsed += Duration::from_millis(100);
        endpoint.heartbeat();

        if elapsed == Duration::from_millis(800) {
            println!("[SUPERVISOR] Suspending task");
            endpoint.suspend();
        }
        if elapsed == Duration::from_millis(1500) {
            println!("[SUPERVISOR] Resuming task");
            endpoint.resume();
        }
        if abort && elapsed == Duration::from_millis(2000) {
            println!("[SUPERVISOR] Aborting task");
            endpoint.abort();
        }

        for message in endpoint.drain() {
            match message {
                UpstreamMessage::Status { fraction_done, .. } => {
                    println!("[SUPERVISOR] Status: {:.0}% done", fraction_done * 100.0);
                }
                other => println!("[SUPERVISOR] Received: {other:?}"),
            }
        }
    }
}

/// The computation itself. Runs on a blocking thread.
fn compute(controller: &LifecycleController) -> tarea::core::Result<u32> {
    let mut checkpoints = 0;

    for step in 1..=STEPS {
        controller.wait_while_suspended();
        if controller.state().is_terminal() {
            println!("[WORKER] Task ended by supervisor at step {step}");
            return Ok(checkpoints);
        }

        std::thread::sleep(STEP_TIME);
        controller.report_progress(f64::from(step) / f64::from(STEPS))?;

        if controller.is_time_to_checkpoint() {
            let _guard = controller.critical_section();
            std::thread::sleep(Duration::from_millis(20));
            controller.checkpoint_completed()?;
            checkpoints += 1;
            println!("[WORKER] Checkpoint {checkpoints} written at step {step}");
        }
    }

    controller.finish(0)?;
    Ok(checkpoints)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return Ok(());
    }
    let abort = args.iter().any(|a| a == "--abort");

    let slot = tempfile::tempdir()?;
    println!("[INIT] Slot directory: {:?}", slot.path());

    let mut config = ControllerConfig::new(slot.path());
    config.tick_interval = Duration::from_millis(25);
    config.status_interval = Duration::from_millis(500);

    let (channel, endpoint) = MemoryChannel::pair();
    let exit = Arc::new(RecordingExit::new());
    let controller = Arc::new(
        LifecycleController::builder(channel)
            .config(config)
            .init_data(AppInitData::new().with_checkpoint_period(Duration::from_millis(700)))
            .exit_hook(exit.clone())
            .build()?,
    );

    let done = Arc::new(AtomicBool::new(false));
    let supervisor = tokio::spawn(supervise(endpoint, abort, done.clone()));

    controller.initialize_default()?;
    println!("[INIT] Task {} registered", controller.instance_id());
    let timer = TimerWorker::spawn(controller.clone());

    let worker = controller.clone();
    let checkpoints = tokio::task::spawn_blocking(move || compute(&worker)).await??;

    timer.stop().await;
    done.store(true, Ordering::SeqCst);
    supervisor.await?;

    println!("[DONE] State: {:?}", controller.state());
    println!("[DONE] Checkpoints written: {checkpoints}");
    println!("[DONE] CPU seconds: {:.3}", controller.cpu_seconds());
    if let Some((code, kind)) = exit.last() {
        println!("[DONE] Exit requested: code {code} ({kind:?})");
    }
    let marker: Option<ExitMarker> = controller.slot_dir().read_finish_marker()?;
    println!("[DONE] Finish marker: {marker:?}");

    Ok(())
}
