//! In-process supervisor channel.
//!
//! [`MemoryChannel::pair`] returns the task side and a
//! [`SupervisorEndpoint`] that plays the supervisor: it injects control
//! messages and reads what the task sent. Dropping the endpoint
//! disconnects the channel.

use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::channel::{ChannelError, ChannelResult, SupervisorChannel};
use crate::protocol::{ControlMessage, UpstreamMessage};

/// Task side of an in-process channel.
#[derive(Debug)]
pub struct MemoryChannel {
    upstream_tx: UnboundedSender<UpstreamMessage>,
    control_rx: Mutex<UnboundedReceiver<ControlMessage>>,
    refuse: Arc<AtomicBool>,
}

/// Supervisor side of an in-process channel.
#[derive(Debug)]
pub struct SupervisorEndpoint {
    control_tx: UnboundedSender<ControlMessage>,
    upstream_rx: Mutex<UnboundedReceiver<UpstreamMessage>>,
    refuse: Arc<AtomicBool>,
}

impl MemoryChannel {
    /// Creates a connected pair.
    #[must_use]
    pub fn pair() -> (Self, SupervisorEndpoint) {
        let (upstream_tx, upstream_rx) = mpsc::unbounded_channel();
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let refuse = Arc::new(AtomicBool::new(false));

        let channel = Self {
            upstream_tx,
            control_rx: Mutex::new(control_rx),
            refuse: refuse.clone(),
        };
        let endpoint = SupervisorEndpoint {
            control_tx,
            upstream_rx: Mutex::new(upstream_rx),
            refuse,
        };
        (channel, endpoint)
    }
}

impl SupervisorChannel for MemoryChannel {
    fn send(&self, message: &UpstreamMessage) -> ChannelResult<()> {
        if self.refuse.load(Ordering::SeqCst) {
            return Err(ChannelError::Unavailable("supervisor refused message".into()));
        }
        self.upstream_tx
            .send(message.clone())
            .map_err(|_| ChannelError::Disconnected)
    }

    fn try_recv(&self) -> ChannelResult<Option<ControlMessage>> {
        match self.control_rx.lock().try_recv() {
            Ok(msg) => Ok(Some(msg)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(ChannelError::Disconnected),
        }
    }
}

impl SupervisorEndpoint {
    /// Delivers a control message; false if the task side is gone.
    pub fn send(&self, message: ControlMessage) -> bool {
        self.control_tx.send(message).is_ok()
    }

    /// Sends a heartbeat.
    pub fn heartbeat(&self) -> bool {
        self.send(ControlMessage::Heartbeat)
    }

    /// Sends a suspend request.
    pub fn suspend(&self) -> bool {
        self.send(ControlMessage::Suspend)
    }

    /// Sends a resume request.
    pub fn resume(&self) -> bool {
        self.send(ControlMessage::Resume)
    }

    /// Sends a quit request.
    pub fn quit(&self) -> bool {
        self.send(ControlMessage::Quit)
    }

    /// Sends an abort request.
    pub fn abort(&self) -> bool {
        self.send(ControlMessage::Abort)
    }

    /// Makes the task's sends fail with `Unavailable` while set.
    pub fn refuse_upstream(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }

    /// Returns the next message from the task, if any.
    pub fn try_recv(&self) -> Option<UpstreamMessage> {
        self.upstream_rx.lock().try_recv().ok()
    }

    /// Returns every message the task sent since the last call.
    pub fn drain(&self) -> Vec<UpstreamMessage> {
        let mut rx = self.upstream_rx.lock();
        let mut messages = Vec::new();
        while let Ok(message) = rx.try_recv() {
            messages.push(message);
        }
        messages
    }
}
