//! Replays rewards that were deferred while the store was unavailable.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use voicexp_core::result::AppResult;

use crate::executor::{OperationHandler, decode_args};
use crate::writer::{AWARD_XP, AwardArgs, RewardWriter};

/// Handles `award_xp` operations
#[derive(Debug)]
pub struct AwardXpHandler {
    writer: Arc<RewardWriter>,
}

impl AwardXpHandler {
    pub fn new(writer: Arc<RewardWriter>) -> Self {
        Self { writer }
    }
}

#[async_trait]
impl OperationHandler for AwardXpHandler {
    fn name(&self) -> &str {
        AWARD_XP
    }

    async fn execute(&self, args: &Value) -> AppResult<()> {
        let args: AwardArgs = decode_args(AWARD_XP, args)?;
        self.writer
            .apply_award(args.guild_id, args.user_id, args.amount)
            .await?;
        Ok(())
    }
}
