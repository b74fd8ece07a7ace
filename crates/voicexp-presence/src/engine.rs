//! Engine facade wiring presence tracking to the durable reward writer.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tracing;

use voicexp_cache::CacheManager;
use voicexp_core::config::AppConfig;
use voicexp_core::error::AppError;
use voicexp_core::types::clock::Clock;
use voicexp_database::Store;
use voicexp_reward::jobs::{REFRESH_CHANNEL_BOOSTS, RefreshChannelBoostsHandler};
use voicexp_reward::{BoostResolver, RewardCalculator};
use voicexp_worker::jobs::AwardXpHandler;
use voicexp_worker::{
    BatchFlusher, HealthMonitor, HealthStats, OperationExecutor, OperationOutcome,
    PendingOperations, RetryExecutor, RetryPolicy, RewardWriter, WriteQueue,
};

use crate::maintenance::Maintenance;
use crate::scheduler::MaintenanceScheduler;
use crate::tracker::PresenceTracker;

/// Grace period for background tasks after shutdown is signalled.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// Presence tracker, maintenance scheduler, reward writer and health
/// monitor bundled behind one start/shutdown lifecycle.
pub struct PresenceEngine {
    tracker: Arc<PresenceTracker>,
    maintenance: Arc<Maintenance>,
    writer: Arc<RewardWriter>,
    resolver: Arc<BoostResolver>,
    retry: Arc<RetryExecutor>,
    flusher: Arc<BatchFlusher>,
    monitor: Arc<HealthMonitor>,
    scheduler: MaintenanceScheduler,
    shutdown_tx: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl std::fmt::Debug for PresenceEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PresenceEngine")
            .field("sessions", &self.tracker.session_count())
            .finish()
    }
}

impl PresenceEngine {
    /// Build every component on top of `store`.
    pub async fn build(
        config: &AppConfig,
        store: Arc<dyn Store>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, AppError> {
        let pending = Arc::new(PendingOperations::new());
        let retry = Arc::new(RetryExecutor::new(
            RetryPolicy::from_config(&config.writer),
            Arc::clone(&pending),
        ));
        let caches = CacheManager::new(&config.cache);
        let queue = Arc::new(WriteQueue::new());

        let writer = Arc::new(RewardWriter::new(
            Arc::clone(&store),
            caches.clone(),
            Arc::clone(&queue),
            Arc::clone(&retry),
            Arc::clone(&clock),
        ));
        let resolver = Arc::new(BoostResolver::new(
            Arc::clone(&store),
            caches.boosts.clone(),
            Arc::clone(&retry),
            Arc::clone(&clock),
            chrono::Duration::seconds(
                i64::try_from(config.rewards.boost_lookback_seconds).unwrap_or(i64::MAX / 1000),
            ),
        ));
        let calculator = Arc::new(RewardCalculator::new(
            Arc::clone(&resolver),
            &config.rewards,
        ));
        let tracker = Arc::new(PresenceTracker::new(
            calculator,
            writer.clone(),
            Arc::clone(&clock),
        ));
        let maintenance = Arc::new(Maintenance::new(
            Arc::clone(&tracker),
            config.presence.clone(),
        ));

        let mut executor = OperationExecutor::new(Arc::clone(&retry));
        executor.register(Arc::new(AwardXpHandler::new(Arc::clone(&writer))));
        executor.register(Arc::new(RefreshChannelBoostsHandler::new(Arc::clone(
            &resolver,
        ))));
        let executor = Arc::new(executor);

        let monitor = Arc::new(HealthMonitor::new(
            Arc::clone(&store),
            executor,
            Arc::clone(&writer),
            clock,
            config.health.clone(),
        ));
        let flusher = Arc::new(BatchFlusher::new(store, queue, config.writer.clone()));
        let scheduler = MaintenanceScheduler::new(Arc::clone(&maintenance)).await?;
        let (shutdown_tx, _) = watch::channel(false);

        Ok(Self {
            tracker,
            maintenance,
            writer,
            resolver,
            retry,
            flusher,
            monitor,
            scheduler,
            shutdown_tx,
            tasks: Mutex::new(Vec::new()),
        })
    }

    pub fn tracker(&self) -> &Arc<PresenceTracker> {
        &self.tracker
    }

    pub fn maintenance(&self) -> &Arc<Maintenance> {
        &self.maintenance
    }

    pub fn writer(&self) -> &Arc<RewardWriter> {
        &self.writer
    }

    /// Current store health snapshot.
    pub async fn health(&self) -> HealthStats {
        self.monitor.stats().await
    }

    /// Load channel boosts, spawn the flusher and health monitor, and start
    /// the maintenance jobs.
    pub async fn start(&self) -> Result<(), AppError> {
        let resolver = Arc::clone(&self.resolver);
        let loaded = self
            .retry
            .execute(REFRESH_CHANNEL_BOOSTS, Value::Null, || {
                let resolver = Arc::clone(&resolver);
                async move { resolver.load_channel_boosts().await }
            })
            .await;
        if let OperationOutcome::Deferred = loaded {
            tracing::warn!("Channel boosts unavailable at startup, using 1.0 until recovery");
        }

        let mut tasks = self.tasks.lock().await;

        let flusher = Arc::clone(&self.flusher);
        let shutdown_rx = self.shutdown_tx.subscribe();
        tasks.push(tokio::spawn(async move {
            flusher.run(shutdown_rx).await;
        }));

        let monitor = Arc::clone(&self.monitor);
        let shutdown_rx = self.shutdown_tx.subscribe();
        tasks.push(tokio::spawn(async move {
            monitor.run(shutdown_rx).await;
        }));

        self.scheduler.register_default_tasks().await?;
        self.scheduler.start().await?;

        tracing::info!("Presence engine started");
        Ok(())
    }

    /// Stop the maintenance jobs, settle live sessions, then signal the
    /// background tasks and wait for the flusher to drain.
    pub async fn shutdown(&self) -> Result<(), AppError> {
        tracing::info!("Shutting down presence engine...");
        if let Err(e) = self.scheduler.shutdown().await {
            tracing::error!("Maintenance scheduler shutdown failed: {}", e);
        }
        let settled = self.tracker.settle_all().await;
        tracing::info!("Settled {} live sessions", settled);

        self.shutdown_tx.send_replace(true);
        let tasks: Vec<JoinHandle<()>> = self.tasks.lock().await.drain(..).collect();
        for handle in tasks {
            if tokio::time::timeout(SHUTDOWN_GRACE, handle).await.is_err() {
                tracing::warn!("Background task did not stop within {:?}", SHUTDOWN_GRACE);
            }
        }

        tracing::info!("Presence engine stopped");
        Ok(())
    }
}
