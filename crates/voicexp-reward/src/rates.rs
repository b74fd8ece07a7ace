//! Per-state reward rates.

use chrono::Duration;

use voicexp_core::config::RateConfig;
use voicexp_entity::presence::PresenceState;

/// Points per minute earned in `state`.
pub fn rate_for(rates: &RateConfig, state: PresenceState) -> f64 {
    match state {
        PresenceState::Active => rates.active,
        PresenceState::Muted => rates.muted,
        PresenceState::Streaming => rates.streaming,
        PresenceState::Watching => rates.watching,
        PresenceState::Idle => rates.idle,
    }
}

/// `floor(minutes × rate) × channel_multiplier`, counting whole elapsed
/// minutes only.
pub fn base_amount(elapsed: Duration, rate: f64, channel_multiplier: f64) -> f64 {
    let minutes = elapsed.num_minutes().max(0) as f64;
    (minutes * rate).floor() * channel_multiplier
}
