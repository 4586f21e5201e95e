//! Supervisor channel transports.
//!
//! | Transport | Use |
//! |-----------|-----|
//! | [`MemoryChannel`] | Same-process supervisor, tests, embedding |
//! | [`StreamChannel`] | Line-delimited JSON over stdin/stdout or a socket |

mod memory;
mod stream;

pub use memory::{MemoryChannel, SupervisorEndpoint};
pub use stream::StreamChannel;
