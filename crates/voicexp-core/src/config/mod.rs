//! Application configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate. Each sub-module represents a logical configuration
//! section. Every field carries a serde default so an empty file yields a
//! working configuration apart from the database URL.

pub mod cache;
pub mod database;
pub mod logging;
pub mod presence;
pub mod reward;
pub mod writer;

use serde::{Deserialize, Serialize};

pub use self::cache::CacheConfig;
pub use self::database::DatabaseConfig;
pub use self::logging::LoggingConfig;
pub use self::presence::PresenceConfig;
pub use self::reward::{RateConfig, RewardConfig, TruncationPolicy};
pub use self::writer::{HealthConfig, WriterConfig};

use crate::error::AppError;

/// Root application configuration.
///
/// Top-level deserialization target for the merged TOML configuration
/// files (default.toml + environment overlay + `VOICEXP__*` variables).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Store connection settings.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// In-memory cache settings.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Presence tracking and maintenance settings.
    #[serde(default)]
    pub presence: PresenceConfig,
    /// Reward rates and multiplier policy.
    #[serde(default)]
    pub rewards: RewardConfig,
    /// Durable reward writer settings.
    #[serde(default)]
    pub writer: WriterConfig,
    /// Store health monitor settings.
    #[serde(default)]
    pub health: HealthConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from TOML files.
    ///
    /// Merges `config/default` with an environment-specific overlay and
    /// environment variables prefixed with `VOICEXP__`.
    pub fn load(env: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("VOICEXP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        let loaded: Self = config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))?;

        loaded.validate()?;
        Ok(loaded)
    }

    /// Reject configurations the engine cannot run with.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.writer.batch_size == 0 {
            return Err(AppError::configuration("writer.batch_size must be positive"));
        }
        if self.presence.idle_check_interval_seconds == 0
            || self.presence.periodic_interval_seconds == 0
        {
            return Err(AppError::configuration(
                "presence job intervals must be positive",
            ));
        }
        if self.presence.max_history_entries == 0 {
            return Err(AppError::configuration(
                "presence.max_history_entries must be positive",
            ));
        }
        if self.health.check_interval_seconds == 0 {
            return Err(AppError::configuration(
                "health.check_interval_seconds must be positive",
            ));
        }
        Ok(())
    }
}
