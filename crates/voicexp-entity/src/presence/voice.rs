//! Platform voice state updates.

use serde::{Deserialize, Serialize};

use voicexp_core::types::id::{ChannelId, GuildId, UserId};

use super::state::VoiceSignals;

/// A participant's voice presence at one side of an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceSnapshot {
    /// Channel the participant is connected to.
    pub channel_id: ChannelId,
    /// Flags reported for the participant.
    pub signals: VoiceSignals,
}

/// A before/after voice state change for one participant.
///
/// `before == None` means the participant just connected, `after == None`
/// that they disconnected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceStateUpdate {
    pub guild_id: GuildId,
    pub user_id: UserId,
    pub before: Option<VoiceSnapshot>,
    pub after: Option<VoiceSnapshot>,
}
