//! Per-guild boost event caches.
//!
//! A [`BoostWindow`] holds every event of a guild that ends after `since`,
//! including events that have not started yet. Reward computations for
//! ranges starting at or after `since` are answered from memory; anything
//! older goes to the store. Scheduling or cancelling an event must call
//! [`BoostCache::invalidate_guild`].
//!
//! Channels found without a static multiplier are remembered for the same
//! TTL, so a boost configured later is picked up once the entry expires.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use moka::future::Cache;
use tracing::debug;

use voicexp_core::config::CacheConfig;
use voicexp_core::types::id::{ChannelId, GuildId};
use voicexp_entity::boost::BoostEvent;

/// Events of one guild loaded for a time window.
#[derive(Debug, Clone)]
pub struct BoostWindow {
    /// Earliest instant the window answers for.
    pub since: DateTime<Utc>,
    /// When the window was loaded.
    pub loaded_at: DateTime<Utc>,
    /// Active events ending after `since`.
    pub events: Vec<BoostEvent>,
}

impl BoostWindow {
    /// Whether ranges starting at `start` can be answered from the window.
    pub fn covers(&self, start: DateTime<Utc>) -> bool {
        start >= self.since
    }

    /// Events overlapping `[start, end)`.
    pub fn overlapping(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<BoostEvent> {
        self.events
            .iter()
            .filter(|e| e.overlaps(start, end))
            .cloned()
            .collect()
    }
}

/// Boost windows and upcoming event lists per guild, plus channels known
/// to have no static multiplier.
#[derive(Debug, Clone)]
pub struct BoostCache {
    windows: Cache<GuildId, Arc<BoostWindow>>,
    upcoming: Cache<GuildId, Arc<Vec<BoostEvent>>>,
    unboosted: Cache<ChannelId, ()>,
}

impl BoostCache {
    pub fn new(config: &CacheConfig) -> Self {
        let ttl = Duration::from_secs(config.boost_ttl_seconds);
        Self {
            windows: Cache::builder().max_capacity(10_000).time_to_live(ttl).build(),
            upcoming: Cache::builder().max_capacity(10_000).time_to_live(ttl).build(),
            unboosted: Cache::builder().max_capacity(10_000).time_to_live(ttl).build(),
        }
    }

    pub async fn window(&self, guild_id: GuildId) -> Option<Arc<BoostWindow>> {
        self.windows.get(&guild_id).await
    }

    pub async fn put_window(&self, guild_id: GuildId, window: BoostWindow) -> Arc<BoostWindow> {
        let window = Arc::new(window);
        self.windows.insert(guild_id, Arc::clone(&window)).await;
        window
    }

    /// Cached events running at `at`. Events that ended since loading are
    /// filtered out.
    pub async fn active_at(&self, guild_id: GuildId, at: DateTime<Utc>) -> Option<Vec<BoostEvent>> {
        let window = self.windows.get(&guild_id).await?;
        if !window.covers(at) {
            return None;
        }
        Some(
            window
                .events
                .iter()
                .filter(|e| e.is_running_at(at))
                .cloned()
                .collect(),
        )
    }

    /// Cached upcoming events. Events that have started since loading are
    /// filtered out.
    pub async fn upcoming_at(&self, guild_id: GuildId, now: DateTime<Utc>) -> Option<Vec<BoostEvent>> {
        let events = self.upcoming.get(&guild_id).await?;
        Some(events.iter().filter(|e| e.is_upcoming_at(now)).cloned().collect())
    }

    pub async fn put_upcoming(&self, guild_id: GuildId, events: Vec<BoostEvent>) {
        self.upcoming.insert(guild_id, Arc::new(events)).await;
    }

    /// Whether `channel_id` was recently found without a static multiplier.
    pub async fn is_unboosted(&self, channel_id: ChannelId) -> bool {
        self.unboosted.get(&channel_id).await.is_some()
    }

    pub async fn mark_unboosted(&self, channel_id: ChannelId) {
        self.unboosted.insert(channel_id, ()).await;
    }

    pub async fn forget_unboosted(&self, channel_id: ChannelId) {
        self.unboosted.invalidate(&channel_id).await;
    }

    pub fn clear_unboosted(&self) {
        self.unboosted.invalidate_all();
    }

    /// Drop everything cached for a guild.
    pub async fn invalidate_guild(&self, guild_id: GuildId) {
        self.windows.invalidate(&guild_id).await;
        self.upcoming.invalidate(&guild_id).await;
        debug!(guild_id = %guild_id, "Invalidated boost caches");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use voicexp_core::types::id::{BoostEventId, UserId};

    fn event(start: DateTime<Utc>, end: DateTime<Utc>) -> BoostEvent {
        BoostEvent {
            id: BoostEventId::new(1),
            guild_id: GuildId::new(1),
            name: "weekend".to_string(),
            multiplier: 2.0,
            start_time: start,
            end_time: end,
            created_by: UserId::new(1),
            active: true,
        }
    }

    #[tokio::test]
    async fn test_ended_events_are_filtered() {
        let cache = BoostCache::new(&CacheConfig::default());
        let now = Utc::now();
        let guild = GuildId::new(1);
        cache
            .put_window(
                guild,
                BoostWindow {
                    since: now - ChronoDuration::hours(6),
                    loaded_at: now,
                    events: vec![event(now - ChronoDuration::hours(1), now + ChronoDuration::minutes(10))],
                },
            )
            .await;

        let running = cache.active_at(guild, now).await.unwrap_or_default();
        assert_eq!(running.len(), 1);
        let later = cache
            .active_at(guild, now + ChronoDuration::minutes(11))
            .await
            .unwrap_or_default();
        assert!(later.is_empty());
    }

    #[tokio::test]
    async fn test_started_events_leave_upcoming() {
        let cache = BoostCache::new(&CacheConfig::default());
        let now = Utc::now();
        let guild = GuildId::new(1);
        cache
            .put_upcoming(
                guild,
                vec![event(now + ChronoDuration::minutes(5), now + ChronoDuration::hours(1))],
            )
            .await;
        assert_eq!(cache.upcoming_at(guild, now).await.map(|v| v.len()), Some(1));
        assert_eq!(
            cache
                .upcoming_at(guild, now + ChronoDuration::minutes(6))
                .await
                .map(|v| v.len()),
            Some(0)
        );
        cache.invalidate_guild(guild).await;
        assert!(cache.upcoming_at(guild, now).await.is_none());
    }

    #[test]
    fn test_window_covers() {
        let now = Utc::now();
        let window = BoostWindow {
            since: now - ChronoDuration::hours(1),
            loaded_at: now,
            events: Vec::new(),
        };
        assert!(window.covers(now - ChronoDuration::minutes(30)));
        assert!(window.covers(now + ChronoDuration::minutes(1)));
        assert!(!window.covers(now - ChronoDuration::hours(2)));
    }

    #[tokio::test]
    async fn test_unboosted_channel_expires() {
        let config = CacheConfig {
            boost_ttl_seconds: 1,
            ..CacheConfig::default()
        };
        let cache = BoostCache::new(&config);
        let channel = ChannelId::new(3);
        assert!(!cache.is_unboosted(channel).await);
        cache.mark_unboosted(channel).await;
        assert!(cache.is_unboosted(channel).await);

        tokio::time::sleep(std::time::Duration::from_millis(1100)).await;
        assert!(!cache.is_unboosted(channel).await);
    }
}
