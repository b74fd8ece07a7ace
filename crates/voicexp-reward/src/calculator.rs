//! Reward computation for closed presence intervals.

use std::sync::Arc;

use tracing::debug;

use voicexp_core::config::{RateConfig, RewardConfig, TruncationPolicy};
use voicexp_core::types::id::GuildId;
use voicexp_entity::presence::StateInterval;

use crate::multiplier::compute_reward;
use crate::rates::{base_amount, rate_for};
use crate::resolver::BoostResolver;

/// Prices intervals using per-state rates, channel boosts and boost events.
#[derive(Debug, Clone)]
pub struct RewardCalculator {
    resolver: Arc<BoostResolver>,
    rates: RateConfig,
    policy: TruncationPolicy,
}

impl RewardCalculator {
    pub fn new(resolver: Arc<BoostResolver>, config: &RewardConfig) -> Self {
        Self {
            resolver,
            rates: config.rates,
            policy: config.truncation,
        }
    }

    pub fn resolver(&self) -> &Arc<BoostResolver> {
        &self.resolver
    }

    /// Reward of a single interval. The channel boost is looked up with the
    /// interval's own channel.
    pub async fn interval_reward(&self, guild_id: GuildId, interval: &StateInterval) -> i64 {
        let rate = rate_for(&self.rates, interval.state);
        let channel_multiplier = self.resolver.channel_multiplier(interval.channel_id).await;
        let base = base_amount(interval.duration(), rate, channel_multiplier);
        if base <= 0.0 {
            return 0;
        }
        let events = self
            .resolver
            .events_between(guild_id, interval.start, interval.end)
            .await;
        let reward = compute_reward(base, interval.start, interval.end, &events, self.policy);
        debug!(
            guild_id = %guild_id,
            state = %interval.state,
            seconds = interval.duration().num_seconds(),
            base,
            events = events.len(),
            reward,
            "Priced interval"
        );
        reward
    }

    /// Total reward of a set of intervals.
    pub async fn session_reward(&self, guild_id: GuildId, intervals: &[StateInterval]) -> i64 {
        let mut total = 0;
        for interval in intervals {
            total += self.interval_reward(guild_id, interval).await;
        }
        total
    }
}
