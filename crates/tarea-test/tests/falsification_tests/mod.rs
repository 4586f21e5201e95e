//! Falsification tests for Tarea
//!
//! | Category | ID Range | Description |
//! |----------|----------|-------------|
//! | A | F001-F020 | Lifecycle |
//! | B | F021-F040 | Checkpointing |
//! | C | F041-F060 | Critical sections |
//! | D | F061-F080 | Supervisor control |
//! | E | F081-F100 | Timer worker and transports |

// Allow test-specific patterns that are denied in production code
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

mod checkpoint;
mod control;
mod critical;
mod lifecycle;
mod timer;
