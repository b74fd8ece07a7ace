//! Durable reward writer and store health configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Batching and retry settings of the durable reward writer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriterConfig {
    /// Maximum number of queued writes per batched upsert.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Debounce window of the batch flusher in milliseconds.
    #[serde(default = "default_debounce")]
    pub debounce_millis: u64,
    /// Pause before a failed batch is pushed back onto the queue.
    #[serde(default = "default_requeue_delay")]
    pub requeue_delay_millis: u64,
    /// Attempts of the generic retry wrapper before an operation is deferred.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base delay of the exponential backoff in milliseconds.
    #[serde(default = "default_retry_base_delay")]
    pub retry_base_delay_millis: u64,
    /// Upper bound for a single store call in seconds.
    #[serde(default = "default_store_timeout")]
    pub store_timeout_seconds: u64,
}

impl WriterConfig {
    /// Debounce window as a duration.
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_millis)
    }

    /// Requeue delay as a duration.
    pub fn requeue_delay(&self) -> Duration {
        Duration::from_millis(self.requeue_delay_millis)
    }

    /// Store call timeout as a duration.
    pub fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.store_timeout_seconds)
    }
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            debounce_millis: default_debounce(),
            requeue_delay_millis: default_requeue_delay(),
            max_retries: default_max_retries(),
            retry_base_delay_millis: default_retry_base_delay(),
            store_timeout_seconds: default_store_timeout(),
        }
    }
}

/// Store health monitor settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    /// Seconds between health checks.
    #[serde(default = "default_check_interval")]
    pub check_interval_seconds: u64,
    /// Timeout of a single health check in seconds.
    #[serde(default = "default_check_timeout")]
    pub check_timeout_seconds: u64,
    /// Failed checks in a row before the connection pool is rebuilt.
    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: u32,
}

impl HealthConfig {
    /// Check interval as a duration.
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_seconds)
    }

    /// Check timeout as a duration.
    pub fn check_timeout(&self) -> Duration {
        Duration::from_secs(self.check_timeout_seconds)
    }
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            check_interval_seconds: default_check_interval(),
            check_timeout_seconds: default_check_timeout(),
            max_consecutive_failures: default_max_consecutive_failures(),
        }
    }
}

fn default_batch_size() -> usize {
    100
}

fn default_debounce() -> u64 {
    500
}

fn default_requeue_delay() -> u64 {
    1000
}

fn default_max_retries() -> u32 {
    5
}

fn default_retry_base_delay() -> u64 {
    500
}

fn default_store_timeout() -> u64 {
    30
}

fn default_check_interval() -> u64 {
    60
}

fn default_check_timeout() -> u64 {
    5
}

fn default_max_consecutive_failures() -> u32 {
    3
}
