//! Boost resolver with cached lookups of boost events and channel multipliers.
//!
//! Store reads go through the retry wrapper. When a lookup still fails the
//! resolver answers "no events" or a multiplier of 1.0 so rewards fall back
//! to the unmultiplied amount.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tracing::{debug, info, warn};

use voicexp_cache::{BoostCache, BoostWindow};
use voicexp_core::result::AppResult;
use voicexp_core::types::clock::Clock;
use voicexp_core::types::id::{ChannelId, GuildId};
use voicexp_database::Store;
use voicexp_entity::boost::BoostEvent;
use voicexp_worker::RetryExecutor;

/// Read-only view of active and upcoming boosts.
#[derive(Debug)]
pub struct BoostResolver {
    store: Arc<dyn Store>,
    cache: BoostCache,
    retry: Arc<RetryExecutor>,
    clock: Arc<dyn Clock>,
    /// How far back the per-guild event window reaches
    lookback: Duration,
    /// Static multipliers of boosted channels
    channel_multipliers: DashMap<ChannelId, f64>,
}

impl BoostResolver {
    pub fn new(
        store: Arc<dyn Store>,
        cache: BoostCache,
        retry: Arc<RetryExecutor>,
        clock: Arc<dyn Clock>,
        lookback: Duration,
    ) -> Self {
        Self {
            store,
            cache,
            retry,
            clock,
            lookback,
            channel_multipliers: DashMap::new(),
        }
    }

    /// Replace the in-memory channel multipliers with the store's.
    pub async fn load_channel_boosts(&self) -> AppResult<usize> {
        let boosts = self.store.channel_boosts().await?;
        self.channel_multipliers.clear();
        self.cache.clear_unboosted();
        for boost in &boosts {
            self.channel_multipliers.insert(boost.channel_id, boost.multiplier);
        }
        info!(count = boosts.len(), "Loaded channel boosts");
        Ok(boosts.len())
    }

    /// Static multiplier of a channel, 1.0 when none is configured.
    ///
    /// A miss goes to the store; a channel without a boost is remembered
    /// only for the boost cache TTL.
    pub async fn channel_multiplier(&self, channel_id: ChannelId) -> f64 {
        if let Some(multiplier) = self.channel_multipliers.get(&channel_id) {
            return *multiplier;
        }
        if self.cache.is_unboosted(channel_id).await {
            return 1.0;
        }
        let lookup = self
            .retry
            .attempt("channel_boost_multiplier", || {
                self.store.channel_boost_multiplier(channel_id)
            })
            .await;
        match lookup {
            Ok(Some(multiplier)) if multiplier.is_finite() && multiplier > 0.0 => {
                self.channel_multipliers.insert(channel_id, multiplier);
                multiplier
            }
            Ok(_) => {
                self.cache.mark_unboosted(channel_id).await;
                1.0
            }
            Err(e) => {
                warn!(channel_id = %channel_id, error = %e, "Channel boost lookup failed, using 1.0");
                1.0
            }
        }
    }

    /// Forget what is known about a channel's static multiplier after it
    /// changed.
    pub async fn invalidate_channel(&self, channel_id: ChannelId) {
        self.channel_multipliers.remove(&channel_id);
        self.cache.forget_unboosted(channel_id).await;
        debug!(channel_id = %channel_id, "Invalidated channel boost");
    }

    /// Events of a guild running at `at`.
    pub async fn active_events(&self, guild_id: GuildId, at: DateTime<Utc>) -> Vec<BoostEvent> {
        if let Some(events) = self.cache.active_at(guild_id, at).await {
            return events;
        }
        match self.window(guild_id).await {
            Some(window) if window.covers(at) => window
                .events
                .iter()
                .filter(|e| e.is_running_at(at))
                .cloned()
                .collect(),
            _ => self
                .fetch("active_boost_events", || self.store.active_boost_events(guild_id, at))
                .await,
        }
    }

    /// Events of a guild that have not started yet, earliest first.
    pub async fn upcoming_events(&self, guild_id: GuildId) -> Vec<BoostEvent> {
        let now = self.clock.now();
        if let Some(events) = self.cache.upcoming_at(guild_id, now).await {
            return events;
        }
        let lookup = self
            .retry
            .attempt("upcoming_boost_events", || {
                self.store.upcoming_boost_events(guild_id, now)
            })
            .await;
        match lookup {
            Ok(events) => {
                self.cache.put_upcoming(guild_id, events.clone()).await;
                events
            }
            Err(e) => {
                warn!(guild_id = %guild_id, error = %e, "Upcoming boost lookup failed");
                Vec::new()
            }
        }
    }

    /// Events of a guild overlapping `[start, end)`.
    pub async fn events_between(
        &self,
        guild_id: GuildId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Vec<BoostEvent> {
        match self.window(guild_id).await {
            Some(window) if window.covers(start) => window.overlapping(start, end),
            _ => {
                debug!(guild_id = %guild_id, %start, "Range older than boost window, querying store");
                self.fetch("boost_events_overlapping", || {
                    self.store.boost_events_overlapping(guild_id, start, end)
                })
                .await
            }
        }
    }

    /// Forget cached events of a guild after its events changed.
    pub async fn invalidate_guild(&self, guild_id: GuildId) {
        self.cache.invalidate_guild(guild_id).await;
    }

    async fn window(&self, guild_id: GuildId) -> Option<Arc<BoostWindow>> {
        if let Some(window) = self.cache.window(guild_id).await {
            return Some(window);
        }
        let now = self.clock.now();
        let since = now - self.lookback;
        let lookup = self
            .retry
            .attempt("boost_events_ending_after", || {
                self.store.boost_events_ending_after(guild_id, since)
            })
            .await;
        match lookup {
            Ok(events) => {
                debug!(guild_id = %guild_id, count = events.len(), "Loaded boost window");
                let window = BoostWindow {
                    since,
                    loaded_at: now,
                    events,
                };
                Some(self.cache.put_window(guild_id, window).await)
            }
            Err(e) => {
                warn!(guild_id = %guild_id, error = %e, "Boost window lookup failed");
                None
            }
        }
    }

    async fn fetch<F, Fut>(&self, name: &str, op: F) -> Vec<BoostEvent>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = AppResult<Vec<BoostEvent>>>,
    {
        match self.retry.attempt(name, op).await {
            Ok(events) => events,
            Err(e) => {
                warn!(operation = name, error = %e, "Boost lookup failed, assuming no events");
                Vec::new()
            }
        }
    }
}
