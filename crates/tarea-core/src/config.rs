//! Application options and controller configuration.
//!
//! [`ApplicationOptions`] describes what kind of application is running and
//! is frozen once handed to `initialize`. [`ControllerConfig`] holds the
//! timing and filesystem knobs of the controller itself; it is validated at
//! load time with clear error messages.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{LifecycleError, Result};

/// Tells the controller (and the supervisor) what kind of application is running.
///
/// The defaults match a regular single-threaded science application:
/// it owns the slot lock, checks heartbeats, handles control messages and
/// status reporting automatically, and lets the controller act directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationOptions {
    /// Run the worker thread at normal priority instead of idle priority.
    pub worker_thread_priority_normal: bool,

    /// This is the main program: lock the slot directory and write the
    /// finish marker on a successful `finish`.
    pub main_program: bool,

    /// Check for supervisor heartbeat timeouts.
    pub heartbeat_timeout_check_enabled: bool,

    /// Read suspend/resume/quit/abort messages from the supervisor.
    pub auto_handle_process_control_messages_enabled: bool,

    /// Send CPU time and fraction done to the supervisor.
    pub auto_send_status_messages_enabled: bool,

    /// On heartbeat loss or quit/abort, terminate directly instead of only
    /// raising a flag. True for regular applications, false for wrappers.
    pub auto_handle_communications_failure_enabled: bool,

    /// The application creates threads in the main process.
    pub application_multi_threaded: bool,

    /// The application creates subprocesses.
    pub application_multi_process: bool,
}

impl Default for ApplicationOptions {
    fn default() -> Self {
        Self {
            worker_thread_priority_normal: false,
            main_program: true,
            heartbeat_timeout_check_enabled: true,
            auto_handle_process_control_messages_enabled: true,
            auto_send_status_messages_enabled: true,
            auto_handle_communications_failure_enabled: true,
            application_multi_threaded: false,
            application_multi_process: false,
        }
    }
}

impl ApplicationOptions {
    /// Creates options with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Options for a wrapper: no direct action, the host polls flags instead.
    #[must_use]
    pub fn wrapper() -> Self {
        Self {
            auto_handle_communications_failure_enabled: false,
            ..Self::default()
        }
    }

    /// Sets worker thread priority.
    #[must_use]
    pub const fn with_worker_thread_priority_normal(mut self, value: bool) -> Self {
        self.worker_thread_priority_normal = value;
        self
    }

    /// Sets main-program mode.
    #[must_use]
    pub const fn with_main_program(mut self, value: bool) -> Self {
        self.main_program = value;
        self
    }

    /// Enables or disables heartbeat timeout checks.
    #[must_use]
    pub const fn with_heartbeat_timeout_check(mut self, value: bool) -> Self {
        self.heartbeat_timeout_check_enabled = value;
        self
    }

    /// Enables or disables automatic control message handling.
    #[must_use]
    pub const fn with_process_control_handling(mut self, value: bool) -> Self {
        self.auto_handle_process_control_messages_enabled = value;
        self
    }

    /// Enables or disables automatic status messages.
    #[must_use]
    pub const fn with_status_messages(mut self, value: bool) -> Self {
        self.auto_send_status_messages_enabled = value;
        self
    }

    /// Enables or disables direct action on quit/abort/heartbeat loss.
    #[must_use]
    pub const fn with_direct_action(mut self, value: bool) -> Self {
        self.auto_handle_communications_failure_enabled = value;
        self
    }

    /// Marks the application as multi-threaded.
    #[must_use]
    pub const fn with_multi_threaded(mut self, value: bool) -> Self {
        self.application_multi_threaded = value;
        self
    }

    /// Marks the application as creating subprocesses.
    #[must_use]
    pub const fn with_multi_process(mut self, value: bool) -> Self {
        self.application_multi_process = value;
        self
    }

    /// Returns true if the controller terminates the process itself.
    #[must_use]
    pub const fn direct_action(&self) -> bool {
        self.auto_handle_communications_failure_enabled
    }
}

/// Controller configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Slot (working) directory holding the lock file and markers.
    #[serde(default = "default_slot_dir")]
    pub slot_dir: PathBuf,

    /// Minimum checkpoint period used when the init data has none.
    #[serde(default = "default_checkpoint_period")]
    #[serde(with = "humantime_serde")]
    pub default_checkpoint_period: Duration,

    /// Heartbeat timeout used when the init data has none.
    #[serde(default = "default_heartbeat_timeout")]
    #[serde(with = "humantime_serde")]
    pub heartbeat_timeout: Duration,

    /// Period of the timer worker.
    #[serde(default = "default_tick_interval")]
    #[serde(with = "humantime_serde")]
    pub tick_interval: Duration,

    /// Minimum spacing of automatic status messages.
    #[serde(default = "default_status_interval")]
    #[serde(with = "humantime_serde")]
    pub status_interval: Duration,

    /// Attempts to take the slot lock before giving up.
    #[serde(default = "default_lock_retries")]
    pub lock_retries: u32,

    /// Delay between lock attempts.
    #[serde(default = "default_lock_retry_interval")]
    #[serde(with = "humantime_serde")]
    pub lock_retry_interval: Duration,
}

fn default_slot_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_checkpoint_period() -> Duration {
    Duration::from_secs(60)
}

fn default_heartbeat_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_tick_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_status_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_lock_retries() -> u32 {
    5
}

fn default_lock_retry_interval() -> Duration {
    Duration::from_millis(200)
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            slot_dir: default_slot_dir(),
            default_checkpoint_period: default_checkpoint_period(),
            heartbeat_timeout: default_heartbeat_timeout(),
            tick_interval: default_tick_interval(),
            status_interval: default_status_interval(),
            lock_retries: default_lock_retries(),
            lock_retry_interval: default_lock_retry_interval(),
        }
    }
}

impl ControllerConfig {
    /// Creates a configuration rooted at the given slot directory.
    #[must_use]
    pub fn new(slot_dir: impl Into<PathBuf>) -> Self {
        Self {
            slot_dir: slot_dir.into(),
            ..Self::default()
        }
    }

    /// Validates the configuration.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<()> {
        if self.slot_dir.as_os_str().is_empty() {
            return Err(LifecycleError::config("slot_dir cannot be empty"));
        }
        if self.heartbeat_timeout.is_zero() {
            return Err(LifecycleError::config(
                "heartbeat_timeout must be greater than 0",
            ));
        }
        if self.tick_interval.is_zero() {
            return Err(LifecycleError::config("tick_interval must be greater than 0"));
        }
        if self.lock_retries == 0 {
            return Err(LifecycleError::config("lock_retries must be at least 1"));
        }
        Ok(())
    }

    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| LifecycleError::config(format!("failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| LifecycleError::config(format!("failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }
}

/// Serde helper for humantime durations.
pub(crate) mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    /// Serializes a duration as a human-readable string.
    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    /// Deserializes a duration from a human-readable string.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }

    /// Same as the parent module for `Option<Duration>`.
    pub mod option {
        use serde::{Deserialize, Deserializer, Serializer};
        use std::time::Duration;

        /// Serializes an optional duration.
        pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match duration {
                Some(d) => super::serialize(d, serializer),
                None => serializer.serialize_none(),
            }
        }

        /// Deserializes an optional duration.
        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
        where
            D: Deserializer<'de>,
        {
            let s: Option<String> = Option::deserialize(deserializer)?;
            s.map(|s| humantime::parse_duration(&s).map_err(serde::de::Error::custom))
                .transpose()
        }
    }
}
