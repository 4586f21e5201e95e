//! Line-delimited JSON channel over a byte stream.
//!
//! Suits a supervisor that talks to the task over its stdin/stdout or a
//! Unix socket. A reader thread decodes incoming lines into a queue so
//! `try_recv` never blocks; malformed lines are logged and skipped.

use parking_lot::Mutex;
use std::io::{BufRead, BufReader, Read, Write};
use std::thread;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::mpsc::{self, UnboundedReceiver};

use crate::channel::{ChannelError, ChannelResult, SupervisorChannel};
use crate::protocol::{ControlMessage, UpstreamMessage, decode_line, encode_line};

/// Supervisor channel over a reader/writer pair.
pub struct StreamChannel {
    writer: Mutex<Box<dyn Write + Send>>,
    incoming: Mutex<UnboundedReceiver<ControlMessage>>,
}

impl StreamChannel {
    /// Creates a channel and starts its reader thread.
    ///
    /// # Errors
    /// Returns an error if the reader thread cannot be spawned.
    pub fn new<R, W>(reader: R, writer: W) -> ChannelResult<Self>
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();

        thread::Builder::new()
            .name("tarea-supervisor-reader".into())
            .spawn(move || {
                for line in BufReader::new(reader).lines() {
                    let line = match line {
                        Ok(line) => line,
                        Err(e) => {
                            tracing::warn!(error = %e, "supervisor stream read failed");
                            break;
                        }
                    };
                    if line.trim().is_empty() {
                        continue;
                    }
                    match decode_line::<ControlMessage>(&line) {
                        Ok(msg) => {
                            if tx.send(msg).is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, line = %line, "skipping malformed control line");
                        }
                    }
                }
                tracing::debug!("supervisor stream closed");
            })?;

        Ok(Self {
            writer: Mutex::new(Box::new(writer)),
            incoming: Mutex::new(rx),
        })
    }

    /// Channel over this process's stdin and stdout.
    ///
    /// # Errors
    /// Returns an error if the reader thread cannot be spawned.
    pub fn stdio() -> ChannelResult<Self> {
        Self::new(std::io::stdin(), std::io::stdout())
    }
}

impl SupervisorChannel for StreamChannel {
    fn send(&self, message: &UpstreamMessage) -> ChannelResult<()> {
        let line = encode_line(message)?;
        let mut writer = self.writer.lock();
        writer.write_all(line.as_bytes())?;
        writer.flush()?;
        Ok(())
    }

    fn try_recv(&self) -> ChannelResult<Option<ControlMessage>> {
        match self.incoming.lock().try_recv() {
            Ok(msg) => Ok(Some(msg)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(ChannelError::Disconnected),
        }
    }
}

impl std::fmt::Debug for StreamChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamChannel").finish_non_exhaustive()
    }
}
