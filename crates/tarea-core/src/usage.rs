//! Process CPU accounting.

use std::time::Duration;

/// User plus system CPU time consumed by this process so far.
///
/// Returns zero where the platform offers no accounting or the call fails.
#[cfg(unix)]
#[must_use]
pub fn process_cpu_time() -> Duration {
    use nix::sys::resource::{UsageWho, getrusage};

    match getrusage(UsageWho::RUSAGE_SELF) {
        Ok(usage) => {
            let (user, system) = (usage.user_time(), usage.system_time());
            to_duration(i64::from(user.tv_sec()), i64::from(user.tv_usec()))
                + to_duration(i64::from(system.tv_sec()), i64::from(system.tv_usec()))
        }
        Err(e) => {
            tracing::warn!(error = %e, "getrusage failed");
            Duration::ZERO
        }
    }
}

/// User plus system CPU time consumed by this process so far.
#[cfg(not(unix))]
#[must_use]
pub fn process_cpu_time() -> Duration {
    Duration::ZERO
}

#[cfg(unix)]
fn to_duration(secs: i64, micros: i64) -> Duration {
    Duration::from_secs(u64::try_from(secs).unwrap_or(0))
        + Duration::from_micros(u64::try_from(micros).unwrap_or(0))
}

/// Total CPU seconds for the workunit: earlier runs plus this process.
#[must_use]
pub fn wu_cpu_time(previous_runs: f64, this_process: Duration) -> f64 {
    previous_runs.max(0.0) + this_process.as_secs_f64()
}
