//! Boost event and channel boost entity models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use voicexp_core::types::id::{BoostEventId, ChannelId, GuildId, UserId};

/// A time-bounded, guild-scoped reward multiplier (`xp_boost_events` table).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct BoostEvent {
    /// Event identifier.
    pub id: BoostEventId,
    /// Guild the event applies to.
    pub guild_id: GuildId,
    /// Display name.
    pub name: String,
    /// Multiplier applied while the event runs.
    pub multiplier: f64,
    /// Start of the event.
    pub start_time: DateTime<Utc>,
    /// End of the event.
    pub end_time: DateTime<Utc>,
    /// Who scheduled the event.
    pub created_by: UserId,
    /// Whether the event has not been cancelled.
    pub active: bool,
}

impl BoostEvent {
    /// Whether the event is running at `at`.
    pub fn is_running_at(&self, at: DateTime<Utc>) -> bool {
        self.active && self.start_time <= at && at <= self.end_time
    }

    /// Whether the event has yet to start at `at`.
    pub fn is_upcoming_at(&self, at: DateTime<Utc>) -> bool {
        self.active && self.start_time > at
    }

    /// Whether the event overlaps the half-open range `[start, end)`.
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.active && self.start_time < end && self.end_time > start
    }
}

/// A static, channel-scoped reward multiplier (`channel_boosts` table).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ChannelBoost {
    /// Guild of the channel.
    pub guild_id: GuildId,
    /// Boosted channel.
    pub channel_id: ChannelId,
    /// Multiplier applied to the base amount.
    pub multiplier: f64,
}
