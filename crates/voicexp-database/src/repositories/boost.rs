//! Boost event and channel boost repository.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use voicexp_core::result::AppResult;
use voicexp_core::types::id::{ChannelId, GuildId};
use voicexp_entity::boost::{BoostEvent, ChannelBoost};

use crate::connection::DatabasePool;
use crate::error::classify;

/// Repository for `xp_boost_events` and `channel_boosts`.
#[derive(Debug, Clone)]
pub struct BoostRepository {
    db: Arc<DatabasePool>,
}

impl BoostRepository {
    /// Create a new boost repository.
    pub fn new(db: Arc<DatabasePool>) -> Self {
        Self { db }
    }

    /// Load every channel multiplier.
    pub async fn channel_boosts(&self) -> AppResult<Vec<ChannelBoost>> {
        sqlx::query_as::<_, ChannelBoost>(
            "SELECT guild_id, channel_id, multiplier FROM channel_boosts",
        )
        .fetch_all(&self.db.pool())
        .await
        .map_err(|e| classify(e, "Failed to load channel boosts"))
    }

    /// Multiplier of a single channel.
    pub async fn channel_multiplier(
        &self,
        channel_id: ChannelId,
    ) -> AppResult<Option<f64>> {
        sqlx::query_scalar::<_, f64>("SELECT multiplier FROM channel_boosts WHERE channel_id = $1")
            .bind(channel_id)
            .fetch_optional(&self.db.pool())
            .await
            .map_err(|e| classify(e, "Failed to load channel boost"))
    }

    /// Events running at `at`.
    pub async fn find_active(
        &self,
        guild_id: GuildId,
        at: DateTime<Utc>,
    ) -> AppResult<Vec<BoostEvent>> {
        sqlx::query_as::<_, BoostEvent>(
            "SELECT * FROM xp_boost_events \
             WHERE guild_id = $1 AND active AND start_time <= $2 AND end_time >= $2 \
             ORDER BY start_time",
        )
        .bind(guild_id)
        .bind(at)
        .fetch_all(&self.db.pool())
        .await
        .map_err(|e| classify(e, "Failed to load active boost events"))
    }

    /// Events starting after `now`.
    pub async fn find_upcoming(
        &self,
        guild_id: GuildId,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<BoostEvent>> {
        sqlx::query_as::<_, BoostEvent>(
            "SELECT * FROM xp_boost_events \
             WHERE guild_id = $1 AND active AND start_time > $2 \
             ORDER BY start_time",
        )
        .bind(guild_id)
        .bind(now)
        .fetch_all(&self.db.pool())
        .await
        .map_err(|e| classify(e, "Failed to load upcoming boost events"))
    }

    /// Events ending after `since`.
    pub async fn find_ending_after(
        &self,
        guild_id: GuildId,
        since: DateTime<Utc>,
    ) -> AppResult<Vec<BoostEvent>> {
        sqlx::query_as::<_, BoostEvent>(
            "SELECT * FROM xp_boost_events \
             WHERE guild_id = $1 AND active AND end_time > $2 \
             ORDER BY start_time",
        )
        .bind(guild_id)
        .bind(since)
        .fetch_all(&self.db.pool())
        .await
        .map_err(|e| classify(e, "Failed to load boost window"))
    }

    /// Events overlapping `[start, end)`.
    pub async fn find_overlapping(
        &self,
        guild_id: GuildId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppResult<Vec<BoostEvent>> {
        sqlx::query_as::<_, BoostEvent>(
            "SELECT * FROM xp_boost_events \
             WHERE guild_id = $1 AND active AND start_time < $3 AND end_time > $2 \
             ORDER BY start_time",
        )
        .bind(guild_id)
        .bind(start)
        .bind(end)
        .fetch_all(&self.db.pool())
        .await
        .map_err(|e| classify(e, "Failed to load boost events"))
    }
}
