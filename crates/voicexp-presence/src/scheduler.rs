//! Scheduler for the periodic presence maintenance jobs.

use std::sync::Arc;
use std::time::Duration;

use tokio_cron_scheduler::{Job as CronJob, JobScheduler};
use tracing;

use voicexp_core::error::AppError;

use crate::maintenance::Maintenance;

/// Runs idle detection and the flush/reap cycle on fixed periods
pub struct MaintenanceScheduler {
    /// The underlying job scheduler
    scheduler: JobScheduler,
    maintenance: Arc<Maintenance>,
}

impl std::fmt::Debug for MaintenanceScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MaintenanceScheduler").finish()
    }
}

impl MaintenanceScheduler {
    /// Create a new scheduler
    pub async fn new(maintenance: Arc<Maintenance>) -> Result<Self, AppError> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| AppError::internal(format!("Failed to create scheduler: {}", e)))?;

        Ok(Self {
            scheduler,
            maintenance,
        })
    }

    /// Register the idle detector and the periodic flush/reap job
    pub async fn register_default_tasks(&self) -> Result<(), AppError> {
        let config = self.maintenance.config().clone();
        self.register_idle_detection(config.idle_check_period())
            .await?;
        self.register_periodic_maintenance(config.periodic_period())
            .await?;

        tracing::info!("All maintenance tasks registered");
        Ok(())
    }

    /// Start the scheduler
    pub async fn start(&self) -> Result<(), AppError> {
        self.scheduler
            .start()
            .await
            .map_err(|e| AppError::internal(format!("Failed to start scheduler: {}", e)))?;

        tracing::info!("Maintenance scheduler started");
        Ok(())
    }

    /// Shutdown the scheduler
    pub async fn shutdown(&self) -> Result<(), AppError> {
        let mut scheduler = self.scheduler.clone();
        scheduler
            .shutdown()
            .await
            .map_err(|e| AppError::internal(format!("Failed to shutdown scheduler: {}", e)))?;

        tracing::info!("Maintenance scheduler shut down");
        Ok(())
    }

    async fn register_idle_detection(&self, period: Duration) -> Result<(), AppError> {
        let maintenance = Arc::clone(&self.maintenance);
        let job = CronJob::new_repeated_async(period, move |_uuid, _lock| {
            let maintenance = Arc::clone(&maintenance);
            Box::pin(async move {
                tracing::trace!("Running idle detection");
                maintenance.run_idle_detection();
            })
        })
        .map_err(|e| {
            AppError::internal(format!("Failed to create idle_detection schedule: {}", e))
        })?;

        self.scheduler.add(job).await.map_err(|e| {
            AppError::internal(format!("Failed to add idle_detection schedule: {}", e))
        })?;

        tracing::info!("Registered: idle_detection (every {}s)", period.as_secs());
        Ok(())
    }

    async fn register_periodic_maintenance(&self, period: Duration) -> Result<(), AppError> {
        let maintenance = Arc::clone(&self.maintenance);
        let job = CronJob::new_repeated_async(period, move |_uuid, _lock| {
            let maintenance = Arc::clone(&maintenance);
            Box::pin(async move {
                tracing::debug!("Running session flush and reap");
                maintenance.run_periodic().await;
            })
        })
        .map_err(|e| {
            AppError::internal(format!(
                "Failed to create session_maintenance schedule: {}",
                e
            ))
        })?;

        self.scheduler.add(job).await.map_err(|e| {
            AppError::internal(format!("Failed to add session_maintenance schedule: {}", e))
        })?;

        tracing::info!(
            "Registered: session_maintenance (every {}s)",
            period.as_secs()
        );
        Ok(())
    }
}
