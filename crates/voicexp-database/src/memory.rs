//! In-process store used by tests and the `memory` backend.
//!
//! Failures can be scripted per operation so retry, requeue and recovery
//! paths can be exercised without a database.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use voicexp_core::error::{AppError, ErrorKind};
use voicexp_core::result::AppResult;
use voicexp_core::types::id::{ChannelId, GuildId, RoleId};
use voicexp_entity::boost::{BoostEvent, ChannelBoost};
use voicexp_entity::level::{LevelKey, LevelRecord, XpWriteRequest};

use crate::store::{BoostStore, LevelStore, StoreHealth, dedupe_latest};

/// Store operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    FindLevel,
    UpsertLevels,
    RoleMapping,
    BoostEvents,
    ChannelBoosts,
    Ping,
    Rebuild,
}

/// In-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    levels: DashMap<LevelKey, LevelRecord>,
    roles: DashMap<GuildId, BTreeMap<i32, RoleId>>,
    channel_boosts: DashMap<ChannelId, ChannelBoost>,
    events: DashMap<GuildId, Vec<BoostEvent>>,
    failures: Mutex<HashMap<FailPoint, (ErrorKind, usize)>>,
    upsert_calls: AtomicUsize,
    event_queries: AtomicUsize,
    rebuilds: AtomicUsize,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `times` calls of `point` fail with `kind`.
    pub fn fail_next(&self, point: FailPoint, kind: ErrorKind, times: usize) {
        let mut failures = self.failures.lock().unwrap_or_else(|e| e.into_inner());
        if times == 0 {
            failures.remove(&point);
        } else {
            failures.insert(point, (kind, times));
        }
    }

    /// Stop failing `point`.
    pub fn heal(&self, point: FailPoint) {
        self.fail_next(point, ErrorKind::Internal, 0);
    }

    fn check(&self, point: FailPoint) -> AppResult<()> {
        let mut failures = self.failures.lock().unwrap_or_else(|e| e.into_inner());
        let Some((kind, remaining)) = failures.get_mut(&point) else {
            return Ok(());
        };
        let kind = *kind;
        *remaining -= 1;
        if *remaining == 0 {
            failures.remove(&point);
        }
        Err(AppError::new(kind, format!("injected failure at {point:?}")))
    }

    /// Seed a level record.
    pub fn insert_level(&self, key: LevelKey, record: LevelRecord) {
        self.levels.insert(key, record);
    }

    /// Persisted record of a participant.
    pub fn level(&self, key: LevelKey) -> Option<LevelRecord> {
        self.levels.get(&key).map(|r| r.value().clone())
    }

    /// Number of persisted level records.
    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    /// Map `level` to `role` in a guild.
    pub fn insert_level_role(&self, guild_id: GuildId, level: i32, role: RoleId) {
        self.roles.entry(guild_id).or_default().insert(level, role);
    }

    /// Configure a static channel multiplier.
    pub fn insert_channel_boost(&self, boost: ChannelBoost) {
        self.channel_boosts.insert(boost.channel_id, boost);
    }

    /// Schedule a boost event.
    pub fn insert_boost_event(&self, event: BoostEvent) {
        self.events.entry(event.guild_id).or_default().push(event);
    }

    /// Number of successful or failed upsert calls.
    pub fn upsert_calls(&self) -> usize {
        self.upsert_calls.load(Ordering::SeqCst)
    }

    /// Number of boost event queries served.
    pub fn event_queries(&self) -> usize {
        self.event_queries.load(Ordering::SeqCst)
    }

    /// Number of completed rebuilds.
    pub fn rebuilds(&self) -> usize {
        self.rebuilds.load(Ordering::SeqCst)
    }

    fn events_where(&self, guild_id: GuildId, keep: impl Fn(&BoostEvent) -> bool) -> Vec<BoostEvent> {
        self.event_queries.fetch_add(1, Ordering::SeqCst);
        let mut found: Vec<BoostEvent> = self
            .events
            .get(&guild_id)
            .map(|events| events.iter().filter(|e| keep(e)).cloned().collect())
            .unwrap_or_default();
        found.sort_by_key(|e| e.start_time);
        found
    }
}

#[async_trait]
impl LevelStore for MemoryStore {
    async fn find_level(&self, key: LevelKey) -> AppResult<Option<LevelRecord>> {
        self.check(FailPoint::FindLevel)?;
        Ok(self.level(key))
    }

    async fn upsert_levels(&self, batch: &[XpWriteRequest]) -> AppResult<()> {
        self.upsert_calls.fetch_add(1, Ordering::SeqCst);
        self.check(FailPoint::UpsertLevels)?;
        for request in dedupe_latest(batch) {
            self.levels.insert(request.key(), request.record());
        }
        Ok(())
    }

    async fn level_role_mapping(&self, guild_id: GuildId) -> AppResult<BTreeMap<i32, RoleId>> {
        self.check(FailPoint::RoleMapping)?;
        Ok(self
            .roles
            .get(&guild_id)
            .map(|m| m.value().clone())
            .unwrap_or_default())
    }
}

#[async_trait]
impl BoostStore for MemoryStore {
    async fn channel_boosts(&self) -> AppResult<Vec<ChannelBoost>> {
        self.check(FailPoint::ChannelBoosts)?;
        Ok(self.channel_boosts.iter().map(|b| b.value().clone()).collect())
    }

    async fn channel_boost_multiplier(&self, channel_id: ChannelId) -> AppResult<Option<f64>> {
        self.check(FailPoint::ChannelBoosts)?;
        Ok(self.channel_boosts.get(&channel_id).map(|b| b.multiplier))
    }

    async fn active_boost_events(
        &self,
        guild_id: GuildId,
        at: DateTime<Utc>,
    ) -> AppResult<Vec<BoostEvent>> {
        self.check(FailPoint::BoostEvents)?;
        Ok(self.events_where(guild_id, |e| e.is_running_at(at)))
    }

    async fn upcoming_boost_events(
        &self,
        guild_id: GuildId,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<BoostEvent>> {
        self.check(FailPoint::BoostEvents)?;
        Ok(self.events_where(guild_id, |e| e.is_upcoming_at(now)))
    }

    async fn boost_events_ending_after(
        &self,
        guild_id: GuildId,
        since: DateTime<Utc>,
    ) -> AppResult<Vec<BoostEvent>> {
        self.check(FailPoint::BoostEvents)?;
        Ok(self.events_where(guild_id, |e| e.active && e.end_time > since))
    }

    async fn boost_events_overlapping(
        &self,
        guild_id: GuildId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppResult<Vec<BoostEvent>> {
        self.check(FailPoint::BoostEvents)?;
        Ok(self.events_where(guild_id, |e| e.overlaps(start, end)))
    }
}

#[async_trait]
impl StoreHealth for MemoryStore {
    async fn ping(&self) -> AppResult<()> {
        self.check(FailPoint::Ping)
    }

    async fn rebuild(&self) -> AppResult<()> {
        self.check(FailPoint::Rebuild)?;
        self.rebuilds.fetch_add(1, Ordering::SeqCst);
        // A fresh pool clears connectivity problems.
        self.heal(FailPoint::Ping);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voicexp_core::types::id::UserId;

    fn request(xp: i64) -> XpWriteRequest {
        XpWriteRequest {
            guild_id: GuildId::new(1),
            user_id: UserId::new(2),
            xp,
            level: 1,
            last_xp_time: Utc::now(),
            last_role: None,
        }
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let store = MemoryStore::new();
        let batch = vec![request(10), request(20)];
        store.upsert_levels(&batch).await.unwrap();
        store.upsert_levels(&batch).await.unwrap();
        assert_eq!(store.level_count(), 1);
        let record = store.find_level(batch[0].key()).await.unwrap().unwrap();
        assert_eq!(record.xp, 20);
    }

    #[tokio::test]
    async fn test_scripted_failures_run_out() {
        let store = MemoryStore::new();
        store.fail_next(FailPoint::UpsertLevels, ErrorKind::Contention, 2);
        let batch = vec![request(5)];
        let err = store.upsert_levels(&batch).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Contention);
        assert!(store.upsert_levels(&batch).await.is_err());
        assert!(store.upsert_levels(&batch).await.is_ok());
        assert_eq!(store.upsert_calls(), 3);
    }

    #[tokio::test]
    async fn test_rebuild_heals_ping() {
        let store = MemoryStore::new();
        store.fail_next(FailPoint::Ping, ErrorKind::ConnectionLost, usize::MAX);
        assert!(store.ping().await.is_err());
        store.rebuild().await.unwrap();
        assert!(store.ping().await.is_ok());
        assert_eq!(store.rebuilds(), 1);
    }
}
