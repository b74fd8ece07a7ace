//! PostgreSQL-backed store.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use voicexp_core::result::AppResult;
use voicexp_core::types::id::{ChannelId, GuildId, RoleId};
use voicexp_entity::boost::{BoostEvent, ChannelBoost};
use voicexp_entity::level::{LevelKey, LevelRecord, XpWriteRequest};

use crate::connection::DatabasePool;
use crate::repositories::{BoostRepository, LevelRepository, LevelRoleRepository};
use crate::store::{BoostStore, LevelStore, StoreHealth, dedupe_latest};

/// Store implementation over a rebuildable PostgreSQL pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    db: Arc<DatabasePool>,
    levels: LevelRepository,
    roles: LevelRoleRepository,
    boosts: BoostRepository,
}

impl PgStore {
    /// Create a store over a connected pool.
    pub fn new(db: Arc<DatabasePool>) -> Self {
        Self {
            levels: LevelRepository::new(Arc::clone(&db)),
            roles: LevelRoleRepository::new(Arc::clone(&db)),
            boosts: BoostRepository::new(Arc::clone(&db)),
            db,
        }
    }

    /// The underlying pool wrapper.
    pub fn database(&self) -> &Arc<DatabasePool> {
        &self.db
    }
}

#[async_trait]
impl LevelStore for PgStore {
    async fn find_level(&self, key: LevelKey) -> AppResult<Option<LevelRecord>> {
        self.levels.find(key).await
    }

    async fn upsert_levels(&self, batch: &[XpWriteRequest]) -> AppResult<()> {
        let deduped = dedupe_latest(batch);
        let affected = self.levels.upsert_batch(&deduped).await?;
        debug!(requested = batch.len(), affected, "Upserted level batch");
        Ok(())
    }

    async fn level_role_mapping(&self, guild_id: GuildId) -> AppResult<BTreeMap<i32, RoleId>> {
        self.roles.mapping(guild_id).await
    }
}

#[async_trait]
impl BoostStore for PgStore {
    async fn channel_boosts(&self) -> AppResult<Vec<ChannelBoost>> {
        self.boosts.channel_boosts().await
    }

    async fn channel_boost_multiplier(&self, channel_id: ChannelId) -> AppResult<Option<f64>> {
        self.boosts.channel_multiplier(channel_id).await
    }

    async fn active_boost_events(
        &self,
        guild_id: GuildId,
        at: DateTime<Utc>,
    ) -> AppResult<Vec<BoostEvent>> {
        self.boosts.find_active(guild_id, at).await
    }

    async fn upcoming_boost_events(
        &self,
        guild_id: GuildId,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<BoostEvent>> {
        self.boosts.find_upcoming(guild_id, now).await
    }

    async fn boost_events_ending_after(
        &self,
        guild_id: GuildId,
        since: DateTime<Utc>,
    ) -> AppResult<Vec<BoostEvent>> {
        self.boosts.find_ending_after(guild_id, since).await
    }

    async fn boost_events_overlapping(
        &self,
        guild_id: GuildId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppResult<Vec<BoostEvent>> {
        self.boosts.find_overlapping(guild_id, start, end).await
    }
}

#[async_trait]
impl StoreHealth for PgStore {
    async fn ping(&self) -> AppResult<()> {
        self.db.ping().await
    }

    async fn rebuild(&self) -> AppResult<()> {
        self.db.rebuild().await
    }
}
