//! Reward sink trait.

use async_trait::async_trait;

use crate::result::AppResult;
use crate::types::id::{GuildId, UserId};

/// Receiver of computed rewards.
///
/// The presence state machine hands every computed reward to a sink; the
/// durable reward writer is the production implementation, and the one-shot
/// message reward path may call it directly.
#[async_trait]
pub trait RewardSink: Send + Sync + std::fmt::Debug + 'static {
    /// Credit `amount` points to a participant. Non-positive amounts are ignored.
    async fn submit_reward(&self, guild_id: GuildId, user_id: UserId, amount: i64)
    -> AppResult<()>;
}
