//! Presence tracking and maintenance configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Thresholds and periods for the presence state machine and its
/// maintenance jobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceConfig {
    /// Seconds without speaking before an active participant goes idle.
    #[serde(default = "default_idle_threshold")]
    pub idle_threshold_seconds: u64,
    /// Period of the idle detector in seconds.
    #[serde(default = "default_idle_check_interval")]
    pub idle_check_interval_seconds: u64,
    /// Period of the long-session flusher and reaper in seconds.
    #[serde(default = "default_periodic_interval")]
    pub periodic_interval_seconds: u64,
    /// Open-interval age in seconds after which a session is flushed.
    #[serde(default = "default_long_session_threshold")]
    pub long_session_threshold_seconds: u64,
    /// Open-interval age in seconds after which a session is presumed abandoned.
    #[serde(default = "default_inactive_session_threshold")]
    pub inactive_session_threshold_seconds: u64,
    /// History length above which consecutive intervals are merged.
    #[serde(default = "default_max_history_entries")]
    pub max_history_entries: usize,
}

impl PresenceConfig {
    /// Idle threshold as a chrono duration.
    pub fn idle_threshold(&self) -> chrono::Duration {
        seconds(self.idle_threshold_seconds)
    }

    /// Flush/reap period as a chrono duration.
    pub fn periodic_interval(&self) -> chrono::Duration {
        seconds(self.periodic_interval_seconds)
    }

    /// Long-session threshold as a chrono duration.
    pub fn long_session_threshold(&self) -> chrono::Duration {
        seconds(self.long_session_threshold_seconds)
    }

    /// Reaper threshold as a chrono duration.
    pub fn inactive_session_threshold(&self) -> chrono::Duration {
        seconds(self.inactive_session_threshold_seconds)
    }

    /// Idle detector period for the scheduler.
    pub fn idle_check_period(&self) -> Duration {
        Duration::from_secs(self.idle_check_interval_seconds)
    }

    /// Flush/reap period for the scheduler.
    pub fn periodic_period(&self) -> Duration {
        Duration::from_secs(self.periodic_interval_seconds)
    }
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            idle_threshold_seconds: default_idle_threshold(),
            idle_check_interval_seconds: default_idle_check_interval(),
            periodic_interval_seconds: default_periodic_interval(),
            long_session_threshold_seconds: default_long_session_threshold(),
            inactive_session_threshold_seconds: default_inactive_session_threshold(),
            max_history_entries: default_max_history_entries(),
        }
    }
}

fn seconds(value: u64) -> chrono::Duration {
    chrono::Duration::seconds(i64::try_from(value).unwrap_or(i64::MAX / 1000))
}

fn default_idle_threshold() -> u64 {
    300
}

fn default_idle_check_interval() -> u64 {
    60
}

fn default_periodic_interval() -> u64 {
    900
}

fn default_long_session_threshold() -> u64 {
    1800
}

fn default_inactive_session_threshold() -> u64 {
    3 * 60 * 60
}

fn default_max_history_entries() -> usize {
    100
}
