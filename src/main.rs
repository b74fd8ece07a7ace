//! VoiceXP Server: voice presence accounting and XP rewards
//!
//! Main entry point that wires all crates together and runs until a
//! shutdown signal arrives.

use std::sync::Arc;

use tracing;
use tracing_subscriber::{EnvFilter, fmt};

use voicexp_core::config::AppConfig;
use voicexp_core::error::AppError;
use voicexp_core::types::clock::SystemClock;
use voicexp_database::{DatabasePool, MemoryStore, PgStore, Store};
use voicexp_presence::PresenceEngine;

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}

/// Load configuration from file and environment
fn load_configuration() -> Result<AppConfig, AppError> {
    let env = std::env::var("VOICEXP_ENV").unwrap_or_else(|_| "development".to_string());
    AppConfig::load(&env)
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Main server run function
async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting VoiceXP v{}", env!("CARGO_PKG_VERSION"));

    // ── Step 1: Store backend ────────────────────────────────────
    let (store, database): (Arc<dyn Store>, Option<Arc<DatabasePool>>) =
        match config.database.backend.as_str() {
            "memory" => {
                tracing::warn!("Using the in-memory store; rewards are not persisted");
                (Arc::new(MemoryStore::new()), None)
            }
            _ => {
                tracing::info!("Connecting to database...");
                let db = Arc::new(DatabasePool::connect(&config.database).await?);

                tracing::info!("Running database migrations...");
                voicexp_database::migration::run_migrations(&db.pool()).await?;
                tracing::info!("Database migrations complete");

                (Arc::new(PgStore::new(Arc::clone(&db))), Some(db))
            }
        };

    // ── Step 2: Presence engine ──────────────────────────────────
    let engine = PresenceEngine::build(&config, store, Arc::new(SystemClock)).await?;
    engine.start().await?;
    tracing::info!("VoiceXP ready, waiting for voice events");

    // ── Step 3: Wait for shutdown ────────────────────────────────
    shutdown_signal().await;
    tracing::info!("Shutdown signal received, starting graceful shutdown...");

    engine.shutdown().await?;
    if let Some(db) = database {
        db.close().await;
    }

    tracing::info!("VoiceXP server shut down gracefully");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
