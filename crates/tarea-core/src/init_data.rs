//! Init data handed to the task by the supervisor at startup.
//!
//! The supervisor writes `init_data.toml` into the slot directory before
//! launching the task. The controller owns the parsed snapshot; the
//! computation only reads it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::humantime_serde;
use crate::error::{LifecycleError, Result};

/// File name of the init data inside the slot directory.
pub const INIT_DATA_FILE: &str = "init_data.toml";

/// Read-only snapshot of what the supervisor knows about this task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppInitData {
    /// Application name.
    #[serde(default)]
    pub app_name: String,

    /// Project the task belongs to.
    #[serde(default)]
    pub project_url: String,

    /// Volunteer user name.
    #[serde(default)]
    pub user_name: String,

    /// Volunteer team name.
    #[serde(default)]
    pub team_name: String,

    /// Host identifier assigned by the project.
    #[serde(default)]
    pub host_id: u64,

    /// Workunit name.
    #[serde(default)]
    pub wu_name: String,

    /// Result (task instance) name.
    #[serde(default)]
    pub result_name: String,

    /// Working directory of the task.
    #[serde(default)]
    pub slot_dir: Option<PathBuf>,

    /// Project-specific preferences, passed through unparsed.
    #[serde(default)]
    pub project_preferences: String,

    /// This project's share of the host's resources, in [0, 1].
    #[serde(default = "default_resource_share")]
    pub resource_share_fraction: f64,

    /// Number of CPUs the task may use.
    #[serde(default = "default_ncpus")]
    pub ncpus: f64,

    /// GPU vendor type, if the task was scheduled on a GPU.
    #[serde(default)]
    pub gpu_type: Option<String>,

    /// GPU device number, if the task was scheduled on a GPU.
    #[serde(default)]
    pub gpu_device_num: Option<u32>,

    /// Estimated floating point operations.
    #[serde(default)]
    pub rsc_fpops_est: f64,

    /// Disk usage bound in bytes.
    #[serde(default)]
    pub rsc_disk_bound: f64,

    /// CPU seconds accumulated by earlier runs of this task.
    #[serde(default)]
    pub wu_cpu_time: f64,

    /// Minimum checkpoint period from the user's preferences.
    #[serde(default, skip_serializing_if = "Option::is_none", with = "humantime_serde::option")]
    pub checkpoint_period: Option<Duration>,

    /// Heartbeat timeout the supervisor will honor.
    #[serde(default, skip_serializing_if = "Option::is_none", with = "humantime_serde::option")]
    pub heartbeat_timeout: Option<Duration>,

    /// Start of the fraction-done window (wrappers running sub-jobs).
    #[serde(default)]
    pub fraction_done_start: f64,

    /// End of the fraction-done window.
    #[serde(default = "default_fraction_end")]
    pub fraction_done_end: f64,

    /// Logical to physical file names.
    #[serde(default)]
    pub files: BTreeMap<String, PathBuf>,
}

fn default_resource_share() -> f64 {
    1.0
}

fn default_ncpus() -> f64 {
    1.0
}

fn default_fraction_end() -> f64 {
    1.0
}

impl Default for AppInitData {
    fn default() -> Self {
        Self {
            app_name: String::new(),
            project_url: String::new(),
            user_name: String::new(),
            team_name: String::new(),
            host_id: 0,
            wu_name: String::new(),
            result_name: String::new(),
            slot_dir: None,
            project_preferences: String::new(),
            resource_share_fraction: default_resource_share(),
            ncpus: default_ncpus(),
            gpu_type: None,
            gpu_device_num: None,
            rsc_fpops_est: 0.0,
            rsc_disk_bound: 0.0,
            wu_cpu_time: 0.0,
            checkpoint_period: None,
            heartbeat_timeout: None,
            fraction_done_start: 0.0,
            fraction_done_end: default_fraction_end(),
            files: BTreeMap::new(),
        }
    }
}

impl AppInitData {
    /// Creates init data with defaults and no registered files.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a logical file name.
    #[must_use]
    pub fn with_file(mut self, logical: impl Into<String>, physical: impl Into<PathBuf>) -> Self {
        self.files.insert(logical.into(), physical.into());
        self
    }

    /// Sets the checkpoint period.
    #[must_use]
    pub const fn with_checkpoint_period(mut self, period: Duration) -> Self {
        self.checkpoint_period = Some(period);
        self
    }

    /// Sets the heartbeat timeout.
    #[must_use]
    pub const fn with_heartbeat_timeout(mut self, timeout: Duration) -> Self {
        self.heartbeat_timeout = Some(timeout);
        self
    }

    /// Sets the fraction-done window.
    #[must_use]
    pub const fn with_fraction_window(mut self, start: f64, end: f64) -> Self {
        self.fraction_done_start = start;
        self.fraction_done_end = end;
        self
    }

    /// Validates the snapshot.
    ///
    /// # Errors
    /// Returns an error if a value is out of range.
    pub fn validate(&self) -> Result<()> {
        let in_unit = |v: f64| (0.0..=1.0).contains(&v);
        if !in_unit(self.fraction_done_start) || !in_unit(self.fraction_done_end) {
            return Err(LifecycleError::config(
                "fraction_done window must lie within [0, 1]",
            ));
        }
        if self.fraction_done_start > self.fraction_done_end {
            return Err(LifecycleError::config(
                "fraction_done_start must not exceed fraction_done_end",
            ));
        }
        if !in_unit(self.resource_share_fraction) {
            return Err(LifecycleError::config(
                "resource_share_fraction must lie within [0, 1]",
            ));
        }
        if self.checkpoint_period.is_some_and(|p| p.is_zero()) {
            return Err(LifecycleError::config("checkpoint_period must be positive"));
        }
        if self.wu_cpu_time < 0.0 {
            return Err(LifecycleError::config("wu_cpu_time cannot be negative"));
        }
        Ok(())
    }

    /// Loads init data from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| LifecycleError::config(format!("failed to read init data: {e}")))?;
        let data: Self = toml::from_str(&content)
            .map_err(|e| LifecycleError::config(format!("failed to parse init data: {e}")))?;
        data.validate()?;
        Ok(data)
    }

    /// Loads `init_data.toml` from a slot directory.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn load_from_slot(slot_dir: impl AsRef<Path>) -> Result<Self> {
        Self::load(slot_dir.as_ref().join(INIT_DATA_FILE))
    }

    /// Maps a task-local fraction into the supervisor's window.
    #[must_use]
    pub fn scale_fraction(&self, fraction: f64) -> f64 {
        self.fraction_done_start + fraction * (self.fraction_done_end - self.fraction_done_start)
    }

    /// Builds the file manifest from the registered files.
    #[must_use]
    pub fn manifest(&self) -> FileManifest {
        FileManifest {
            entries: self.files.clone(),
        }
    }
}

/// Immutable logical-to-physical file name map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileManifest {
    entries: BTreeMap<String, PathBuf>,
}

impl FileManifest {
    /// Returns the physical path for a logical name.
    ///
    /// # Errors
    /// Returns `UnknownLogicalName` if the name was never registered.
    pub fn resolve(&self, logical: &str) -> Result<PathBuf> {
        self.entries
            .get(logical)
            .cloned()
            .ok_or_else(|| LifecycleError::UnknownLogicalName(logical.to_string()))
    }

    /// Number of registered names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, PathBuf)> for FileManifest {
    fn from_iter<I: IntoIterator<Item = (String, PathBuf)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
