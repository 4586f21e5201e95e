//! Slot directory files: the main-program lock and the exit markers.
//!
//! | File | Written by | Meaning |
//! |------|------------|---------|
//! | `lockfile` | main program, at init | this slot is owned by a running task |
//! | `finish_called` | `finish` | the task ended; line 1 is the status |
//! | `temporary_exit` | `temporary_exit` | restart after line 1 seconds |
//!
//! Markers are written to a temporary name and renamed into place, so the
//! supervisor never reads a partial file.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{LifecycleError, Result};
use crate::types::Notice;

/// Lock file name.
pub const LOCK_FILE: &str = "lockfile";
/// Finish marker name.
pub const FINISH_FILE: &str = "finish_called";
/// Temporary exit marker name.
pub const TEMPORARY_EXIT_FILE: &str = "temporary_exit";

const NOTICE_LINE: &str = "notice";

/// The task's working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotDir {
    root: PathBuf,
}

impl SlotDir {
    /// Wraps a directory path.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the directory path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Path of the lock file.
    #[must_use]
    pub fn lock_path(&self) -> PathBuf {
        self.root.join(LOCK_FILE)
    }

    /// Path of the finish marker.
    #[must_use]
    pub fn finish_path(&self) -> PathBuf {
        self.root.join(FINISH_FILE)
    }

    /// Path of the temporary exit marker.
    #[must_use]
    pub fn temporary_exit_path(&self) -> PathBuf {
        self.root.join(TEMPORARY_EXIT_FILE)
    }

    /// Takes the exclusive slot lock, retrying a bounded number of times.
    ///
    /// # Errors
    /// Returns `ResourceUnavailable` if another process holds the lock
    /// after every attempt or the lock file cannot be opened.
    pub fn acquire_lock(&self, attempts: u32, retry_interval: Duration) -> Result<LockFile> {
        let path = self.lock_path();
        let attempts = attempts.max(1);

        for attempt in 1..=attempts {
            let acquired = LockFile::try_acquire(&path).map_err(|e| {
                LifecycleError::resource_unavailable(format!("{}: {e}", path.display()))
            })?;
            match acquired {
                Some(lock) => {
                    tracing::debug!(path = %path.display(), attempt, "acquired slot lock");
                    return Ok(lock);
                }
                None if attempt < attempts => {
                    tracing::debug!(path = %path.display(), attempt, "slot lock busy, retrying");
                    std::thread::sleep(retry_interval);
                }
                None => {}
            }
        }

        Err(LifecycleError::resource_unavailable(format!(
            "{} is locked by another process ({attempts} attempts)",
            path.display()
        )))
    }

    /// Writes the finish marker.
    ///
    /// # Errors
    /// Returns an I/O error if the marker cannot be written.
    pub fn write_finish_marker(&self, status: i32, notice: Option<&Notice>) -> Result<()> {
        let marker = ExitMarker {
            value: i64::from(status),
            notice: notice.cloned(),
        };
        write_atomic(&self.finish_path(), &marker.render())
    }

    /// Writes the temporary exit marker.
    ///
    /// # Errors
    /// Returns an I/O error if the marker cannot be written.
    pub fn write_temporary_exit_marker(&self, delay: Duration, notice: Option<&Notice>) -> Result<()> {
        let marker = ExitMarker {
            value: i64::try_from(delay.as_secs()).unwrap_or(i64::MAX),
            notice: notice.cloned(),
        };
        write_atomic(&self.temporary_exit_path(), &marker.render())
    }

    /// Reads the finish marker, if present.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn read_finish_marker(&self) -> Result<Option<ExitMarker>> {
        read_marker(&self.finish_path())
    }

    /// Reads the temporary exit marker, if present.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn read_temporary_exit_marker(&self) -> Result<Option<ExitMarker>> {
        read_marker(&self.temporary_exit_path())
    }
}

/// Parsed content of an exit marker.
///
/// Line 1 is the status code (finish) or delay in seconds (temporary
/// exit), line 2 the optional message, line 3 `notice` if the message is a
/// notice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitMarker {
    /// Status code or delay.
    pub value: i64,
    /// Optional explanation.
    pub notice: Option<Notice>,
}

impl ExitMarker {
    fn render(&self) -> String {
        let mut out = format!("{}\n", self.value);
        if let Some(notice) = &self.notice {
            // one message line; the supervisor reads line by line
            out.push_str(&notice.message.replace('\n', " "));
            out.push('\n');
            if notice.is_notice {
                out.push_str(NOTICE_LINE);
                out.push('\n');
            }
        }
        out
    }

    fn parse(content: &str) -> Result<Self> {
        let mut lines = content.lines();
        let value = lines
            .next()
            .and_then(|l| l.trim().parse::<i64>().ok())
            .ok_or_else(|| LifecycleError::Serialization("exit marker has no value line".into()))?;
        let notice = lines.next().map(|message| Notice {
            message: message.to_string(),
            is_notice: lines.next().is_some_and(|l| l.trim() == NOTICE_LINE),
        });
        Ok(Self { value, notice })
    }
}

fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let tmp = path.with_extension("tmp");
    {
        let mut file = File::create(&tmp)?;
        file.write_all(content.as_bytes())?;
        file.sync_all()?;
    }
    std::fs::rename(&tmp, path)?;
    Ok(())
}

fn read_marker(path: &Path) -> Result<Option<ExitMarker>> {
    match std::fs::read_to_string(path) {
        Ok(content) => ExitMarker::parse(&content).map(Some),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Held slot lock. Released (and the file removed) by [`LockFile::release`].
pub struct LockFile {
    path: PathBuf,
    #[cfg(unix)]
    _lock: nix::fcntl::Flock<File>,
    #[cfg(not(unix))]
    _file: File,
}

impl LockFile {
    /// One non-blocking attempt; `Ok(None)` if someone else holds it.
    #[cfg(unix)]
    fn try_acquire(path: &Path) -> Result<Option<Self>> {
        use nix::errno::Errno;
        use nix::fcntl::{Flock, FlockArg};

        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)?;

        match Flock::lock(file, FlockArg::LockExclusiveNonblock) {
            Ok(lock) => {
                let mut handle: &File = &lock;
                handle.set_len(0)?;
                writeln!(handle, "{}", std::process::id())?;
                Ok(Some(Self {
                    path: path.to_path_buf(),
                    _lock: lock,
                }))
            }
            Err((_, Errno::EWOULDBLOCK)) => Ok(None),
            Err((_, errno)) => Err(std::io::Error::from(errno).into()),
        }
    }

    #[cfg(not(unix))]
    fn try_acquire(path: &Path) -> Result<Option<Self>> {
        match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(mut file) => {
                writeln!(file, "{}", std::process::id())?;
                Ok(Some(Self {
                    path: path.to_path_buf(),
                    _file: file,
                }))
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Path of the held lock file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Unlocks and deletes the lock file.
    ///
    /// # Errors
    /// Returns an I/O error if the file cannot be removed.
    pub fn release(self) -> Result<()> {
        let path = self.path.clone();
        // remove while still holding the lock so no one can grab a file we are about to delete
        let removed = std::fs::remove_file(&path);
        drop(self);
        match removed {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl std::fmt::Debug for LockFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockFile").field("path", &self.path).finish_non_exhaustive()
    }
}
