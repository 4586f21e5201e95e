// Allow unwrap/expect in tests for clear failure messages
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

//! # tarea-test
//!
//! Testing infrastructure for the Tarea lifecycle runtime.
//!
//! This crate provides:
//! - **Supervisor harness**: a scripted fake supervisor driving a real
//!   controller over the in-memory channel, with simulated time and
//!   recorded exits
//! - **Falsification tests**: end-to-end lifecycle scenarios under `tests/`
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::time::Duration;
//! use tarea_core::{ControlMessage, ExitKind, EXIT_QUIT_REQUESTED};
//! use tarea_test::SupervisorHarness;
//!
//! let harness = SupervisorHarness::running()?;
//! harness.run_for(Duration::from_secs(30), Duration::from_secs(1))?;
//! harness.deliver(ControlMessage::Quit)?;
//! harness.expect_single_exit(EXIT_QUIT_REQUESTED, ExitKind::Quit)?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod harness;

pub use error::{Result, TestError};
pub use harness::{ScriptStep, SupervisorHarness, SupervisorHarnessBuilder};
