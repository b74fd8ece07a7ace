//! PostgreSQL connection pool management.

use std::str::FromStr;
use std::sync::RwLock;
use std::time::Duration;

use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use tracing::{info, warn};

use voicexp_core::config::DatabaseConfig;
use voicexp_core::error::{AppError, ErrorKind};

use crate::error::classify;

/// Wrapper around the sqlx PostgreSQL connection pool.
///
/// The inner pool can be swapped out by [`DatabasePool::rebuild`] when the
/// health monitor gives up on the current one; callers always fetch the
/// current pool through [`DatabasePool::pool`].
#[derive(Debug)]
pub struct DatabasePool {
    pool: RwLock<PgPool>,
    config: DatabaseConfig,
}

impl DatabasePool {
    /// Create a new database pool from configuration.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, AppError> {
        info!(
            url = %mask_password(&config.url),
            max_connections = config.max_connections,
            min_connections = config.min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = build_pool(config).await?;

        info!("Successfully connected to PostgreSQL");
        Ok(Self {
            pool: RwLock::new(pool),
            config: config.clone(),
        })
    }

    /// Return a handle to the current pool.
    pub fn pool(&self) -> PgPool {
        match self.pool.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Check database connectivity.
    pub async fn ping(&self) -> Result<(), AppError> {
        let value = sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool())
            .await
            .map_err(|e| classify(e, "Health check failed"))?;
        if value == 1 {
            Ok(())
        } else {
            Err(AppError::database("Health check returned unexpected value"))
        }
    }

    /// Replace the pool with a freshly connected one and close the old one.
    pub async fn rebuild(&self) -> Result<(), AppError> {
        warn!(url = %mask_password(&self.config.url), "Rebuilding PostgreSQL pool");
        let fresh = build_pool(&self.config).await?;
        let old = match self.pool.write() {
            Ok(mut guard) => std::mem::replace(&mut *guard, fresh),
            Err(poisoned) => std::mem::replace(&mut *poisoned.into_inner(), fresh),
        };
        old.close().await;
        info!("PostgreSQL pool rebuilt");
        Ok(())
    }

    /// Close all connections in the pool.
    pub async fn close(&self) {
        self.pool().close().await;
        info!("Database pool closed");
    }
}

async fn build_pool(config: &DatabaseConfig) -> Result<PgPool, AppError> {
    let options = PgConnectOptions::from_str(&config.url)
        .map_err(|e| {
            AppError::with_source(ErrorKind::Configuration, "Invalid database URL", e)
        })?
        .options([(
            "statement_timeout",
            (config.statement_timeout_seconds * 1000).to_string(),
        )]);

    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_seconds))
        .idle_timeout(Duration::from_secs(config.idle_timeout_seconds))
        .connect_with(options)
        .await
        .map_err(|e| classify(e, "Failed to connect to database"))
}

/// Mask the password portion of a database URL for safe logging.
fn mask_password(url: &str) -> String {
    if let Some(at_pos) = url.find('@') {
        if let Some(colon_pos) = url[..at_pos].rfind(':') {
            let scheme_end = url.find("://").map(|p| p + 3).unwrap_or(0);
            if colon_pos > scheme_end {
                return format!("{}:****@{}", &url[..colon_pos], &url[at_pos + 1..]);
            }
        }
    }
    url.to_string()
}
