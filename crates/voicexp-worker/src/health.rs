//! Store health monitor.
//!
//! Pings the store on a fixed interval. After `max_consecutive_failures`
//! failed checks it rebuilds the connection pool; every unhealthy to
//! healthy transition replays the pending operations.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, watch};
use tokio::time;
use tracing;

use voicexp_core::config::HealthConfig;
use voicexp_core::error::AppError;
use voicexp_core::result::AppResult;
use voicexp_core::types::clock::Clock;
use voicexp_database::Store;

use crate::executor::OperationExecutor;
use crate::writer::RewardWriter;

/// Snapshot of the writer's health.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthStats {
    pub is_healthy: bool,
    pub consecutive_failures: u32,
    pub last_check_time: Option<DateTime<Utc>>,
    pub last_failure_reason: Option<String>,
    pub last_recovery_time: Option<DateTime<Utc>>,
    pub pending_operations: usize,
    pub queued_writes: usize,
    pub cached_levels: u64,
}

#[derive(Debug)]
struct HealthState {
    is_healthy: bool,
    consecutive_failures: u32,
    last_check_time: Option<DateTime<Utc>>,
    last_failure_reason: Option<String>,
    last_recovery_time: Option<DateTime<Utc>>,
}

impl Default for HealthState {
    fn default() -> Self {
        Self {
            is_healthy: true,
            consecutive_failures: 0,
            last_check_time: None,
            last_failure_reason: None,
            last_recovery_time: None,
        }
    }
}

/// Periodic store health check with pool rebuild and pending replay.
#[derive(Debug)]
pub struct HealthMonitor {
    store: Arc<dyn Store>,
    executor: Arc<OperationExecutor>,
    writer: Arc<RewardWriter>,
    clock: Arc<dyn Clock>,
    config: HealthConfig,
    state: Mutex<HealthState>,
}

impl HealthMonitor {
    pub fn new(
        store: Arc<dyn Store>,
        executor: Arc<OperationExecutor>,
        writer: Arc<RewardWriter>,
        clock: Arc<dyn Clock>,
        config: HealthConfig,
    ) -> Self {
        Self {
            store,
            executor,
            writer,
            clock,
            config,
            state: Mutex::new(HealthState::default()),
        }
    }

    /// Run one health check. Returns whether the store is healthy afterwards.
    pub async fn check_once(&self) -> bool {
        let now = self.clock.now();
        match self.ping().await {
            Ok(()) => {
                let recovered = {
                    let mut state = self.state.lock().await;
                    state.last_check_time = Some(now);
                    let recovered = !state.is_healthy;
                    state.is_healthy = true;
                    state.consecutive_failures = 0;
                    if recovered {
                        state.last_recovery_time = Some(now);
                        state.last_failure_reason = None;
                    }
                    recovered
                };
                if recovered {
                    tracing::info!("Store connection recovered");
                    self.executor.replay_pending().await;
                }
                true
            }
            Err(e) => {
                let failures = {
                    let mut state = self.state.lock().await;
                    state.last_check_time = Some(now);
                    state.is_healthy = false;
                    state.consecutive_failures += 1;
                    state.last_failure_reason = Some(e.to_string());
                    state.consecutive_failures
                };
                tracing::warn!("Store health check failed ({} in a row): {}", failures, e);

                if failures >= self.config.max_consecutive_failures {
                    self.repair().await
                } else {
                    false
                }
            }
        }
    }

    async fn ping(&self) -> AppResult<()> {
        let timeout = self.config.check_timeout();
        match time::timeout(timeout, self.store.ping()).await {
            Ok(result) => result,
            Err(_) => Err(AppError::timeout(format!(
                "Health check exceeded {timeout:?}"
            ))),
        }
    }

    async fn repair(&self) -> bool {
        tracing::error!("Multiple consecutive store failures, rebuilding the connection pool");
        match self.store.rebuild().await {
            Ok(()) => {
                {
                    let mut state = self.state.lock().await;
                    state.is_healthy = true;
                    state.consecutive_failures = 0;
                    state.last_failure_reason = None;
                    state.last_recovery_time = Some(self.clock.now());
                }
                tracing::info!("Successfully rebuilt the connection pool");
                self.executor.replay_pending().await;
                true
            }
            Err(e) => {
                tracing::error!("Failed to rebuild the connection pool: {}", e);
                false
            }
        }
    }

    /// Current health snapshot.
    pub async fn stats(&self) -> HealthStats {
        let (is_healthy, consecutive_failures, last_check_time, last_failure_reason, last_recovery_time) = {
            let state = self.state.lock().await;
            (
                state.is_healthy,
                state.consecutive_failures,
                state.last_check_time,
                state.last_failure_reason.clone(),
                state.last_recovery_time,
            )
        };
        HealthStats {
            is_healthy,
            consecutive_failures,
            last_check_time,
            last_failure_reason,
            last_recovery_time,
            pending_operations: self.executor.pending_len().await,
            queued_writes: self.writer.queue().len().await,
            cached_levels: self.writer.caches().levels.entry_count(),
        }
    }

    /// Check every `check_interval` until shutdown is signalled.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(
            "Health monitor started with interval={:?}, timeout={:?}",
            self.config.check_interval(),
            self.config.check_timeout()
        );
        let mut ticker = time::interval(self.config.check_interval());
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    self.check_once().await;
                }
            }
        }
        tracing::info!("Health monitor stopped");
    }
}
