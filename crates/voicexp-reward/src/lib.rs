//! # voicexp-reward
//!
//! Turns time spent in a presence state into reward points:
//!
//! - [`rates`]: per-state rates and the channel-boosted base amount
//! - [`multiplier`]: interval partition over overlapping boost events
//! - [`resolver`]: cached boost event and channel multiplier lookups
//! - [`calculator`]: rewards for closed intervals and whole sessions

pub mod calculator;
pub mod jobs;
pub mod multiplier;
pub mod rates;
pub mod resolver;

pub use calculator::RewardCalculator;
pub use multiplier::{Slice, compute_reward, partition};
pub use resolver::BoostResolver;
