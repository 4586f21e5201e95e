//! Critical sections in the lifecycle sense.
//!
//! While a critical section is open, supervisor suspend/resume/quit/abort
//! requests are queued instead of applied. When the outermost section
//! closes the queue is handed back for replay in arrival order.
//!
//! Replay policy for several requests queued in one section:
//! - a request equal to the one queued just before it is coalesced;
//! - nothing is queued after a `Quit` or `Abort`, since termination
//!   supersedes it.

use std::collections::VecDeque;

use crate::controller::LifecycleController;
use crate::exit::ExitKind;
use crate::types::ControlRequest;

/// A request waiting for the critical section to close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeferredRequest {
    /// The supervisor request.
    pub request: ControlRequest,
    /// How the task exits if replaying the request ends it.
    pub kind: ExitKind,
}

/// Result of closing one level of a critical section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndOutcome {
    /// An enclosing section is still open.
    Nested(u32),
    /// The outermost section closed; replay these requests in order.
    Released(Vec<DeferredRequest>),
    /// `end` without a matching `begin`.
    Unbalanced,
}

/// Depth counter plus the FIFO queue of deferred requests.
#[derive(Debug, Clone, Default)]
pub struct CriticalSection {
    depth: u32,
    deferred: VecDeque<DeferredRequest>,
}

impl CriticalSection {
    /// Creates a closed section with an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens one level; returns the new depth.
    pub fn begin(&mut self) -> u32 {
        self.depth = self.depth.saturating_add(1);
        self.depth
    }

    /// Closes one level.
    pub fn end(&mut self) -> EndOutcome {
        match self.depth {
            0 => EndOutcome::Unbalanced,
            1 => {
                self.depth = 0;
                EndOutcome::Released(self.deferred.drain(..).collect())
            }
            _ => {
                self.depth -= 1;
                EndOutcome::Nested(self.depth)
            }
        }
    }

    /// Queues a request; returns false if the policy discarded it.
    pub fn defer(&mut self, request: ControlRequest) -> bool {
        self.defer_as(request, ExitKind::for_request(request))
    }

    /// Queues a request that exits with `kind` when replayed.
    pub fn defer_as(&mut self, request: ControlRequest, kind: ExitKind) -> bool {
        match self.deferred.back() {
            Some(last) if last.request.is_terminal() => false,
            Some(last) if last.request == request => false,
            _ => {
                self.deferred.push_back(DeferredRequest { request, kind });
                true
            }
        }
    }

    /// Returns true while any level is open.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.depth > 0
    }

    /// Current nesting depth.
    #[must_use]
    pub const fn depth(&self) -> u32 {
        self.depth
    }

    /// Requests waiting for the section to close.
    #[must_use]
    pub fn deferred(&self) -> Vec<ControlRequest> {
        self.deferred.iter().map(|d| d.request).collect()
    }
}

/// Scoped critical section: closes its level when dropped, including
/// during unwinding.
#[must_use = "the critical section closes as soon as the guard is dropped"]
pub struct CriticalSectionGuard<'a> {
    controller: &'a LifecycleController,
}

impl<'a> CriticalSectionGuard<'a> {
    pub(crate) const fn new(controller: &'a LifecycleController) -> Self {
        Self { controller }
    }
}

impl Drop for CriticalSectionGuard<'_> {
    fn drop(&mut self) {
        self.controller.end_critical_section();
    }
}

impl std::fmt::Debug for CriticalSectionGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CriticalSectionGuard")
            .field("depth", &self.controller.critical_depth())
            .finish()
    }
}
