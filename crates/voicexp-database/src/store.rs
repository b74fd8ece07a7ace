//! Store contracts consumed by the reward pipeline.
//!
//! The Postgres implementation lives in [`crate::pg`]; [`crate::memory`]
//! provides the same contract in process.

use std::collections::BTreeMap;
use std::fmt::Debug;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use voicexp_core::result::AppResult;
use voicexp_core::types::id::{ChannelId, GuildId, RoleId};
use voicexp_entity::boost::{BoostEvent, ChannelBoost};
use voicexp_entity::level::{LevelKey, LevelRecord, XpWriteRequest};

/// Level record reads and batched writes.
#[async_trait]
pub trait LevelStore: Send + Sync + Debug + 'static {
    /// Read the persisted record of a participant.
    async fn find_level(&self, key: LevelKey) -> AppResult<Option<LevelRecord>>;

    /// Idempotent keyed upsert of a batch. When a key appears more than
    /// once the last request wins.
    async fn upsert_levels(&self, batch: &[XpWriteRequest]) -> AppResult<()>;

    /// Roles granted per level in a guild.
    async fn level_role_mapping(&self, guild_id: GuildId) -> AppResult<BTreeMap<i32, RoleId>>;
}

/// Read-only boost lookups.
#[async_trait]
pub trait BoostStore: Send + Sync + Debug + 'static {
    /// All static channel multipliers.
    async fn channel_boosts(&self) -> AppResult<Vec<ChannelBoost>>;

    /// Static multiplier of one channel, if configured.
    async fn channel_boost_multiplier(&self, channel_id: ChannelId) -> AppResult<Option<f64>>;

    /// Events of a guild running at `at`.
    async fn active_boost_events(
        &self,
        guild_id: GuildId,
        at: DateTime<Utc>,
    ) -> AppResult<Vec<BoostEvent>>;

    /// Events of a guild starting after `now`, earliest first.
    async fn upcoming_boost_events(
        &self,
        guild_id: GuildId,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<BoostEvent>>;

    /// Events of a guild ending after `since`, including future ones.
    async fn boost_events_ending_after(
        &self,
        guild_id: GuildId,
        since: DateTime<Utc>,
    ) -> AppResult<Vec<BoostEvent>>;

    /// Events of a guild overlapping `[start, end)`.
    async fn boost_events_overlapping(
        &self,
        guild_id: GuildId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppResult<Vec<BoostEvent>>;
}

/// Liveness probing and recovery of the store connection.
#[async_trait]
pub trait StoreHealth: Send + Sync + Debug + 'static {
    /// Cheap round trip to the store.
    async fn ping(&self) -> AppResult<()>;

    /// Tear down and recreate the connection pool.
    async fn rebuild(&self) -> AppResult<()>;
}

/// Everything the pipeline needs from a store.
pub trait Store: LevelStore + BoostStore + StoreHealth {}

impl<T: LevelStore + BoostStore + StoreHealth> Store for T {}

/// Keep only the last request per key, preserving first-seen order.
pub fn dedupe_latest(batch: &[XpWriteRequest]) -> Vec<XpWriteRequest> {
    let mut position: std::collections::HashMap<LevelKey, usize> = Default::default();
    let mut out: Vec<XpWriteRequest> = Vec::with_capacity(batch.len());
    for request in batch {
        match position.get(&request.key()) {
            Some(&idx) => out[idx] = request.clone(),
            None => {
                position.insert(request.key(), out.len());
                out.push(request.clone());
            }
        }
    }
    out
}
