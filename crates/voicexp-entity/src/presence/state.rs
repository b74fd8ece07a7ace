//! Presence state derivation from raw voice signals.

use serde::{Deserialize, Serialize};

/// Engagement category a participant occupies in a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceState {
    /// Unmuted and participating.
    Active,
    /// Muted or deafened, by self or by the server.
    Muted,
    /// Sharing a screen or camera stream.
    Streaming,
    /// Watching another participant's stream.
    Watching,
    /// No speaking activity for longer than the idle threshold.
    Idle,
}

impl PresenceState {
    /// Return the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Muted => "muted",
            Self::Streaming => "streaming",
            Self::Watching => "watching",
            Self::Idle => "idle",
        }
    }

    /// Whether the idle detector may move a participant out of this state.
    pub fn is_idle_candidate(&self) -> bool {
        matches!(self, Self::Active)
    }
}

impl std::fmt::Display for PresenceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw per-participant voice flags as reported by the platform.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceSignals {
    pub self_mute: bool,
    pub server_mute: bool,
    pub self_deaf: bool,
    pub server_deaf: bool,
    pub self_stream: bool,
    pub self_video: bool,
}

impl VoiceSignals {
    /// Muted or deafened by any means.
    pub fn is_muted(&self) -> bool {
        self.self_mute || self.server_mute || self.self_deaf || self.server_deaf
    }

    /// Sharing a screen.
    pub fn is_streaming(&self) -> bool {
        self.self_stream
    }
}

/// Derive the state implied by the participant's own signals.
///
/// Precedence is streaming, then muted/deafened, then video (which counts as
/// active), then active. `Watching` and `Idle` depend on other participants
/// and on time, so they are never returned here.
pub fn derive_state(signals: &VoiceSignals) -> PresenceState {
    if signals.is_streaming() {
        PresenceState::Streaming
    } else if signals.is_muted() {
        PresenceState::Muted
    } else {
        PresenceState::Active
    }
}

/// Derive the state including the watcher override.
pub fn effective_state(signals: &VoiceSignals, other_streaming: bool) -> PresenceState {
    match derive_state(signals) {
        PresenceState::Active if other_streaming => PresenceState::Watching,
        state => state,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_streaming_wins_over_mute() {
        let signals = VoiceSignals {
            self_stream: true,
            self_mute: true,
            ..Default::default()
        };
        assert_eq!(derive_state(&signals), PresenceState::Streaming);
    }

    #[test]
    fn test_deafened_is_muted() {
        let signals = VoiceSignals {
            server_deaf: true,
            self_video: true,
            ..Default::default()
        };
        assert_eq!(derive_state(&signals), PresenceState::Muted);
    }

    #[test]
    fn test_video_counts_as_active() {
        let signals = VoiceSignals {
            self_video: true,
            ..Default::default()
        };
        assert_eq!(derive_state(&signals), PresenceState::Active);
        assert_eq!(derive_state(&VoiceSignals::default()), PresenceState::Active);
    }

    #[test]
    fn test_watching_override() {
        let quiet = VoiceSignals::default();
        let muted = VoiceSignals {
            self_mute: true,
            ..Default::default()
        };
        let streaming = VoiceSignals {
            self_stream: true,
            ..Default::default()
        };
        assert_eq!(effective_state(&quiet, true), PresenceState::Watching);
        assert_eq!(effective_state(&quiet, false), PresenceState::Active);
        assert_eq!(effective_state(&muted, true), PresenceState::Muted);
        assert_eq!(effective_state(&streaming, true), PresenceState::Streaming);
    }
}
