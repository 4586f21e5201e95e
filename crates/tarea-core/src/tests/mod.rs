//! Falsification test suites for the lifecycle controller.
//!
//! Each test tries to disprove one property of the lifecycle contract.
//!
//! | Category | ID Range | Description |
//! |----------|----------|-------------|
//! | A | F001-F020 | Initialization and lifecycle |
//! | B | F021-F040 | Checkpoint timing |
//! | C | F041-F060 | Critical sections |
//! | D | F061-F080 | Supervisor control and heartbeats |
//! | E | F081-F100 | Finish and temporary exit |


pub use mocks::{FailingChannel, TestRig};
