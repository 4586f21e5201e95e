//! Tarea: Lifecycle Runtime for Supervised Long-Running Tasks
//!
//! A compute task links this crate to cooperate with the supervisor that
//! started it: register, report progress, checkpoint on schedule, honor
//! suspend/resume/quit/abort and finish with an exit marker in its slot.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tarea::prelude::*;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let controller = Arc::new(
//!     LifecycleController::builder(StreamChannel::stdio()?)
//!         .config(ControllerConfig::new("slots/0"))
//!         .build()?,
//! );
//! controller.initialize_default()?;
//! let timer = TimerWorker::spawn(controller.clone());
//!
//! for step in 0..100 {
//!     controller.wait_while_suspended();
//!     // ... one unit of work ...
//!     controller.report_progress(f64::from(step) / 100.0)?;
//!     if controller.is_time_to_checkpoint() {
//!         let _guard = controller.critical_section();
//!         // ... write the checkpoint ...
//!         controller.checkpoint_completed()?;
//!     }
//! }
//!
//! timer.stop().await;
//! controller.finish(0)?;
//! # Ok(())
//! # }
//! ```

pub use tarea_core as core;

/// Prelude module for common imports.
pub mod prelude {
    pub use tarea_core::{
        AppInitData, ApplicationOptions, ControlMessage, ControllerConfig, CriticalSectionGuard,
        ExitKind, LifecycleController, LifecycleError, LifecycleState, MemoryChannel, Notice,
        PendingAction, StatusFlags, StreamChannel, SupervisorChannel, SupervisorEndpoint,
        TimerWorker, UpstreamMessage,
    };
}
