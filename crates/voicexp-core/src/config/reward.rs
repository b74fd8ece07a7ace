//! Reward rate and multiplier configuration.

use serde::{Deserialize, Serialize};

/// Reward configuration: per-state rates, truncation policy, and the boost
/// lookback window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardConfig {
    /// Points per minute for each presence state.
    #[serde(default)]
    pub rates: RateConfig,
    /// Where the multiplier calculator truncates to an integer.
    #[serde(default)]
    pub truncation: TruncationPolicy,
    /// How far back (seconds) the cached boost window of a guild reaches.
    /// Older intervals bypass the cache and query the store directly.
    #[serde(default = "default_boost_lookback")]
    pub boost_lookback_seconds: u64,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            rates: RateConfig::default(),
            truncation: TruncationPolicy::default(),
            boost_lookback_seconds: default_boost_lookback(),
        }
    }
}

/// Points awarded per minute spent in each presence state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateConfig {
    /// Speaking or camera on.
    #[serde(default = "default_active")]
    pub active: f64,
    /// Muted or deafened.
    #[serde(default = "default_muted")]
    pub muted: f64,
    /// Connected but silent past the idle threshold.
    #[serde(default = "default_idle")]
    pub idle: f64,
    /// Sharing a screen or stream.
    #[serde(default = "default_streaming")]
    pub streaming: f64,
    /// Watching somebody else's stream.
    #[serde(default = "default_watching")]
    pub watching: f64,
}

impl Default for RateConfig {
    fn default() -> Self {
        Self {
            active: default_active(),
            muted: default_muted(),
            idle: default_idle(),
            streaming: default_streaming(),
            watching: default_watching(),
        }
    }
}

/// Integer truncation point of the interval multiplier calculator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TruncationPolicy {
    /// Sum the fractional slice rewards, truncate once at the end.
    #[default]
    PostSum,
    /// Truncate each slice's reward before summing.
    PerSlice,
}

fn default_boost_lookback() -> u64 {
    6 * 60 * 60
}

fn default_active() -> f64 {
    5.0
}

fn default_muted() -> f64 {
    2.0
}

fn default_idle() -> f64 {
    1.0
}

fn default_streaming() -> f64 {
    8.0
}

fn default_watching() -> f64 {
    6.0
}
