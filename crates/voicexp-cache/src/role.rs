//! Cache of level to role mappings.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;

use voicexp_core::config::CacheConfig;
use voicexp_core::types::id::{GuildId, RoleId};

/// Level role mapping per guild.
#[derive(Debug, Clone)]
pub struct RoleCache {
    cache: Cache<GuildId, Arc<BTreeMap<i32, RoleId>>>,
}

impl RoleCache {
    pub fn new(config: &CacheConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(10_000)
            .time_to_live(Duration::from_secs(config.role_ttl_seconds))
            .build();
        Self { cache }
    }

    pub async fn get(&self, guild_id: GuildId) -> Option<Arc<BTreeMap<i32, RoleId>>> {
        self.cache.get(&guild_id).await
    }

    pub async fn put(&self, guild_id: GuildId, mapping: BTreeMap<i32, RoleId>) -> Arc<BTreeMap<i32, RoleId>> {
        let mapping = Arc::new(mapping);
        self.cache.insert(guild_id, Arc::clone(&mapping)).await;
        mapping
    }

    pub async fn invalidate(&self, guild_id: GuildId) {
        self.cache.invalidate(&guild_id).await;
    }
}
