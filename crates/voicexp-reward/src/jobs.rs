//! Operation handlers owned by the reward crate.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use voicexp_core::result::AppResult;
use voicexp_worker::OperationHandler;

use crate::resolver::BoostResolver;

/// Operation name of a deferred channel boost reload.
pub const REFRESH_CHANNEL_BOOSTS: &str = "refresh_channel_boosts";

/// Reloads static channel multipliers into the resolver.
#[derive(Debug)]
pub struct RefreshChannelBoostsHandler {
    resolver: Arc<BoostResolver>,
}

impl RefreshChannelBoostsHandler {
    pub fn new(resolver: Arc<BoostResolver>) -> Self {
        Self { resolver }
    }
}

#[async_trait]
impl OperationHandler for RefreshChannelBoostsHandler {
    fn name(&self) -> &str {
        REFRESH_CHANNEL_BOOSTS
    }

    async fn execute(&self, _args: &Value) -> AppResult<()> {
        self.resolver.load_channel_boosts().await?;
        Ok(())
    }
}
