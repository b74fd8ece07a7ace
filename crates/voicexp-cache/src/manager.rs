//! Bundle of the caches shared by the reward pipeline.

use tracing::info;

use voicexp_core::config::CacheConfig;

use crate::boost::BoostCache;
use crate::level::LevelCache;
use crate::role::RoleCache;

/// Owns every cache; cheap to clone.
#[derive(Debug, Clone)]
pub struct CacheManager {
    pub levels: LevelCache,
    pub roles: RoleCache,
    pub boosts: BoostCache,
}

impl CacheManager {
    /// Create all caches from configuration.
    pub fn new(config: &CacheConfig) -> Self {
        info!(
            level_capacity = config.level_capacity,
            level_ttl_seconds = config.level_ttl_seconds,
            boost_ttl_seconds = config.boost_ttl_seconds,
            "Initializing in-memory caches"
        );
        Self {
            levels: LevelCache::new(config),
            roles: RoleCache::new(config),
            boosts: BoostCache::new(config),
        }
    }
}
