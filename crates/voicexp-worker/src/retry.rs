//! Retry wrapper for ad hoc store operations.
//!
//! Contention and connectivity errors are retried in place with
//! exponential backoff and jitter. Anything else, or running out of
//! attempts, defers the operation to the pending list and returns
//! [`OperationOutcome::Deferred`] without blocking the caller further.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use serde_json::Value;
use tracing;

use voicexp_core::config::WriterConfig;
use voicexp_core::error::AppError;
use voicexp_core::result::AppResult;

use crate::pending::{PendingOperation, PendingOperations};

/// Result of an operation run through the retry wrapper.
#[derive(Debug, Clone, PartialEq)]
pub enum OperationOutcome<T> {
    /// The operation succeeded
    Completed(T),
    /// The operation was queued for replay after recovery
    Deferred,
}

impl<T> OperationOutcome<T> {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    /// The value, if the operation completed
    pub fn completed(self) -> Option<T> {
        match self {
            Self::Completed(value) => Some(value),
            Self::Deferred => None,
        }
    }
}

/// Attempt budget and backoff curve.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts per call
    pub max_retries: u32,
    /// Backoff unit
    pub base_delay: Duration,
    /// Time budget per attempt
    pub attempt_timeout: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &WriterConfig) -> Self {
        Self {
            max_retries: config.max_retries.max(1),
            base_delay: Duration::from_millis(config.retry_base_delay_millis),
            attempt_timeout: config.store_timeout(),
        }
    }

    /// Delay before the next attempt: `base × 2^retry × jitter(0.8..1.2)`
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 2f64.powi(retry.min(16) as i32) * jitter();
        self.base_delay.mul_f64(factor)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&WriterConfig::default())
    }
}

fn jitter() -> f64 {
    rand::thread_rng().gen_range(0.8..1.2)
}

/// Runs store operations under a [`RetryPolicy`], deferring failures.
#[derive(Debug)]
pub struct RetryExecutor {
    policy: RetryPolicy,
    pending: Arc<PendingOperations>,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy, pending: Arc<PendingOperations>) -> Self {
        Self { policy, pending }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn pending(&self) -> &Arc<PendingOperations> {
        &self.pending
    }

    /// Run `op`, deferring it as `name(args)` if it cannot complete.
    pub async fn execute<T, F, Fut>(&self, name: &str, args: Value, op: F) -> OperationOutcome<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        match self.attempt(name, op).await {
            Ok(value) => OperationOutcome::Completed(value),
            Err(e) => {
                tracing::warn!("Operation '{}' deferred for later retry: {}", name, e);
                self.pending.push(PendingOperation::new(name, args)).await;
                OperationOutcome::Deferred
            }
        }
    }

    /// Run `op` with in-place retries and return the last error instead of
    /// deferring. Used when replaying pending operations.
    pub async fn attempt<T, F, Fut>(&self, name: &str, mut op: F) -> AppResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        let mut retries = 0u32;
        loop {
            let result = match tokio::time::timeout(self.policy.attempt_timeout, op()).await {
                Ok(result) => result,
                Err(_) => Err(AppError::timeout(format!(
                    "'{name}' exceeded {:?}",
                    self.policy.attempt_timeout
                ))),
            };

            let err = match result {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            if !err.is_retryable() {
                tracing::error!("Store error in '{}': {}", name, err);
                return Err(err);
            }

            retries += 1;
            if retries >= self.policy.max_retries {
                tracing::warn!(
                    "Max retries reached for '{}' ({}/{}): {}",
                    name,
                    retries,
                    self.policy.max_retries,
                    err
                );
                return Err(err);
            }

            let delay = self.policy.backoff(retries);
            tracing::warn!(
                "Transient error in '{}', retrying in {:?} (attempt {}/{}): {}",
                name,
                delay,
                retries + 1,
                self.policy.max_retries,
                err
            );
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn executor(max_retries: u32) -> RetryExecutor {
        let policy = RetryPolicy {
            max_retries,
            base_delay: Duration::from_millis(10),
            attempt_timeout: Duration::from_secs(1),
        };
        RetryExecutor::new(policy, Arc::new(PendingOperations::new()))
    }

    #[test]
    fn test_backoff_grows_with_jitter_bounds() {
        let policy = RetryPolicy {
            max_retries: 5,
            base_delay: Duration::from_millis(500),
            attempt_timeout: Duration::from_secs(1),
        };
        for _ in 0..50 {
            let first = policy.backoff(1);
            assert!(first >= Duration::from_millis(800) && first <= Duration::from_millis(1200));
            let third = policy.backoff(3);
            assert!(third >= Duration::from_millis(3200) && third <= Duration::from_millis(4800));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_contention_retried_in_place() {
        let executor = executor(5);
        let calls = AtomicU32::new(0);
        let outcome = executor
            .execute("lookup", Value::Null, || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(AppError::contention("deadlock detected"))
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;
        assert_eq!(outcome, OperationOutcome::Completed(2));
        assert_eq!(executor.pending().len().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_error_defers_immediately() {
        let executor = executor(5);
        let calls = AtomicU32::new(0);
        let outcome: OperationOutcome<()> = executor
            .execute("award_xp", serde_json::json!({"amount": 5}), || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(AppError::database("constraint violated")) }
            })
            .await;
        assert_eq!(outcome, OperationOutcome::Deferred);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let pending = executor.pending().snapshot().await;
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].operation_name, "award_xp");
        assert_eq!(pending[0].retry_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_defers() {
        let executor = executor(3);
        let calls = AtomicU32::new(0);
        let outcome: OperationOutcome<()> = executor
            .execute("lookup", Value::Null, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(AppError::connection_lost("connection reset")) }
            })
            .await;
        assert_eq!(outcome, OperationOutcome::Deferred);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(executor.pending().len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_attempt_times_out_and_retries() {
        let executor = executor(2);
        let calls = AtomicU32::new(0);
        let outcome = executor
            .execute("lookup", Value::Null, || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        tokio::time::sleep(Duration::from_secs(10)).await;
                    }
                    Ok::<_, AppError>(n)
                }
            })
            .await;
        assert_eq!(outcome, OperationOutcome::Completed(1));
    }
}
