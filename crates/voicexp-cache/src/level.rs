//! Write-through cache of level records.

use std::time::Duration;

use moka::future::Cache;

use voicexp_core::config::CacheConfig;
use voicexp_entity::level::{LevelKey, LevelRecord};

/// Level records keyed by `(guild, user)`.
///
/// The durable reward writer overwrites an entry before the write lands in
/// the store, so reads observe pending values.
#[derive(Debug, Clone)]
pub struct LevelCache {
    cache: Cache<LevelKey, LevelRecord>,
}

impl LevelCache {
    /// Create a cache from configuration.
    pub fn new(config: &CacheConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.level_capacity)
            .time_to_live(Duration::from_secs(config.level_ttl_seconds))
            .build();
        Self { cache }
    }

    pub async fn get(&self, key: &LevelKey) -> Option<LevelRecord> {
        self.cache.get(key).await
    }

    pub async fn put(&self, key: LevelKey, record: LevelRecord) {
        self.cache.insert(key, record).await;
    }

    pub async fn invalidate(&self, key: &LevelKey) {
        self.cache.invalidate(key).await;
    }

    /// Approximate number of cached records.
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    /// Apply pending evictions and bookkeeping.
    pub async fn sync(&self) {
        self.cache.run_pending_tasks().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use voicexp_core::types::id::{GuildId, UserId};

    #[tokio::test]
    async fn test_put_overwrites() {
        let cache = LevelCache::new(&CacheConfig::default());
        let key = LevelKey::new(GuildId::new(1), UserId::new(1));
        let mut record = LevelRecord::starting(Utc::now(), None);
        cache.put(key, record.clone()).await;
        record.xp = 75;
        cache.put(key, record).await;
        assert_eq!(cache.get(&key).await.map(|r| r.xp), Some(75));
        cache.sync().await;
        assert_eq!(cache.entry_count(), 1);
    }
}
