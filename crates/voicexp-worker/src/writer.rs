//! Durable reward writer.
//!
//! Rewards are applied to the participant's level record, the write-through
//! cache is overwritten right away and the record is queued for the batch
//! flusher. Reads consult the queue and the cache before the store so a
//! pending write is never shadowed by a stale row.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing;

use voicexp_cache::CacheManager;
use voicexp_core::result::AppResult;
use voicexp_core::traits::RewardSink;
use voicexp_core::types::clock::Clock;
use voicexp_core::types::id::{GuildId, RoleId, UserId};
use voicexp_database::Store;
use voicexp_entity::level::{LevelKey, LevelRecord, XpWriteRequest};

use crate::progression::{LevelAward, apply_award};
use crate::queue::WriteQueue;
use crate::retry::{OperationOutcome, RetryExecutor};

/// Operation name of a deferred reward.
pub const AWARD_XP: &str = "award_xp";

/// Arguments recorded for a deferred reward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AwardArgs {
    pub guild_id: GuildId,
    pub user_id: UserId,
    pub amount: i64,
}

/// Applies rewards and queues the resulting writes.
#[derive(Debug)]
pub struct RewardWriter {
    store: Arc<dyn Store>,
    caches: CacheManager,
    queue: Arc<WriteQueue>,
    retry: Arc<RetryExecutor>,
    clock: Arc<dyn Clock>,
    /// Serializes read-modify-write cycles on level records
    award_lock: Mutex<()>,
}

impl RewardWriter {
    pub fn new(
        store: Arc<dyn Store>,
        caches: CacheManager,
        queue: Arc<WriteQueue>,
        retry: Arc<RetryExecutor>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            caches,
            queue,
            retry,
            clock,
            award_lock: Mutex::new(()),
        }
    }

    pub fn queue(&self) -> &Arc<WriteQueue> {
        &self.queue
    }

    pub fn caches(&self) -> &CacheManager {
        &self.caches
    }

    /// Overwrite the cached record and queue its write.
    pub async fn submit(&self, request: XpWriteRequest) {
        let key = request.key();
        self.caches.levels.put(key, request.record()).await;
        tracing::debug!(
            "Queued level write for {}: xp={}, level={}",
            key,
            request.xp,
            request.level
        );
        self.queue.push(request).await;
    }

    /// Current record of a participant: queued write, then cache, then store.
    pub async fn read_level(&self, key: LevelKey) -> AppResult<Option<LevelRecord>> {
        if let Some(queued) = self.queue.latest_for(key).await {
            return Ok(Some(queued.record()));
        }
        if let Some(cached) = self.caches.levels.get(&key).await {
            return Ok(Some(cached));
        }
        let found = self.store.find_level(key).await?;
        if let Some(record) = &found {
            self.caches.levels.put(key, record.clone()).await;
        }
        Ok(found)
    }

    async fn level_roles(&self, guild_id: GuildId) -> Arc<BTreeMap<i32, RoleId>> {
        if let Some(mapping) = self.caches.roles.get(guild_id).await {
            return mapping;
        }
        match self.store.level_role_mapping(guild_id).await {
            Ok(mapping) => self.caches.roles.put(guild_id, mapping).await,
            Err(e) => {
                tracing::warn!("Level roles of guild {} unavailable: {}", guild_id, e);
                Arc::new(BTreeMap::new())
            }
        }
    }

    /// Credit `amount` to a participant and queue the new record.
    pub async fn apply_award(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        amount: i64,
    ) -> AppResult<Option<LevelAward>> {
        if amount <= 0 {
            return Ok(None);
        }

        let _guard = self.award_lock.lock().await;
        let key = LevelKey::new(guild_id, user_id);
        let current = self
            .read_level(key)
            .await?
            .unwrap_or_else(|| LevelRecord::starting(self.clock.now(), None));
        let roles = self.level_roles(guild_id).await;
        let award = apply_award(&current, amount, &roles);

        self.submit(XpWriteRequest::from_record(key, &award.record))
            .await;

        if award.leveled_up() {
            tracing::info!(
                guild_id = %guild_id,
                user_id = %user_id,
                from = award.previous_level,
                to = award.record.level,
                "Level up"
            );
        }
        if let Some(role) = award.new_role {
            tracing::info!(guild_id = %guild_id, user_id = %user_id, role_id = %role, "Level role granted");
        }
        Ok(Some(award))
    }
}

#[async_trait]
impl RewardSink for RewardWriter {
    async fn submit_reward(&self, guild_id: GuildId, user_id: UserId, amount: i64) -> AppResult<()> {
        if amount <= 0 {
            return Ok(());
        }
        let args = serde_json::to_value(AwardArgs {
            guild_id,
            user_id,
            amount,
        })?;
        let outcome = self
            .retry
            .execute(AWARD_XP, args, || self.apply_award(guild_id, user_id, amount))
            .await;
        if let OperationOutcome::Deferred = outcome {
            tracing::warn!(
                "Reward of {} for {}/{} deferred until the store recovers",
                amount,
                guild_id,
                user_id
            );
        }
        Ok(())
    }
}
