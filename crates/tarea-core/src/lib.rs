// Allow unwrap/expect in tests for clear failure messages
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

//! # tarea-core
//!
//! Lifecycle runtime for long-running computational tasks supervised by an
//! external controller process.
//!
//! This crate provides:
//!
//! - [`LifecycleController`]: initialization, progress and status
//!   reporting, checkpoint timing, critical sections, supervisor-driven
//!   suspend/resume/quit/abort, heartbeat handling, finish and temporary exit
//! - [`SupervisorChannel`] with in-memory and line-delimited JSON transports
//! - [`SlotDir`] for the slot lock file and exit markers
//! - [`TimerWorker`] to run the controller's timer pass on tokio
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tarea_core::{ControllerConfig, LifecycleController, StreamChannel, TimerWorker};
//!
//! let controller = Arc::new(
//!     LifecycleController::builder(StreamChannel::stdio()?)
//!         .config(ControllerConfig::load("tarea.toml")?)
//!         .build()?,
//! );
//! controller.initialize_default()?;
//! let _timer = TimerWorker::spawn(controller.clone());
//! // ... compute, checkpoint, report progress ...
//! controller.finish(0)?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![allow(clippy::significant_drop_tightening)]

pub mod channel;
pub mod channels;
pub mod checkpoint;
pub mod clock;
pub mod config;
pub mod controller;
pub mod critical;
pub mod error;
pub mod exit;
pub mod heartbeat;
pub mod init_data;
pub mod protocol;
pub mod slot;
#[cfg(test)]
pub mod tests;
pub mod timer;
pub mod types;
pub mod usage;

pub use channel::{ChannelError, ChannelResult, SupervisorChannel};
pub use channels::{MemoryChannel, StreamChannel, SupervisorEndpoint};
pub use checkpoint::CheckpointTimer;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ApplicationOptions, ControllerConfig};
pub use controller::{LifecycleController, LifecycleControllerBuilder};
pub use critical::{CriticalSectionGuard, DeferredRequest};
pub use error::{LifecycleError, Result};
pub use exit::{
    EXIT_ABORTED_BY_CLIENT, EXIT_QUIT_REQUESTED, ExitHook, ExitKind, ProcessExit, RecordingExit,
};
pub use heartbeat::HeartbeatMonitor;
pub use init_data::{AppInitData, FileManifest, INIT_DATA_FILE};
pub use protocol::{ControlMessage, UpstreamMessage};
pub use slot::{ExitMarker, LockFile, SlotDir};
pub use timer::TimerWorker;
pub use types::{
    ControlRequest, LifecycleState, Notice, PendingAction, StatusFlags, TaskInstanceId,
};
pub use usage::process_cpu_time;
