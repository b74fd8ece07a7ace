//! Closed time-in-state intervals.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use voicexp_core::types::id::ChannelId;

use super::state::PresenceState;

/// An immutable record of time spent in one state in one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateInterval {
    pub state: PresenceState,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub channel_id: ChannelId,
}

impl StateInterval {
    pub fn new(
        state: PresenceState,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        channel_id: ChannelId,
    ) -> Self {
        Self {
            state,
            start,
            end,
            channel_id,
        }
    }

    /// Length of the interval.
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Whether `next` continues this interval without a gap in the same
    /// state and channel.
    pub fn can_merge(&self, next: &StateInterval) -> bool {
        self.state == next.state && self.channel_id == next.channel_id && self.end == next.start
    }
}
