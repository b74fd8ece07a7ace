//! Presence state machine over the live session table.
//!
//! Every mutation of a session happens inside one `DashMap` entry guard and
//! no guard is held across an `.await`. Handlers look the session up right
//! before mutating it and treat a missing session as a no-op, so a session
//! removed by a concurrent leave or by the reaper is simply skipped.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, error, info, warn};

use voicexp_core::traits::RewardSink;
use voicexp_core::types::clock::Clock;
use voicexp_core::types::id::{ChannelId, GuildId, UserId};
use voicexp_entity::presence::{
    PresenceState, StateInterval, VoiceSignals, VoiceStateUpdate, derive_state, effective_state,
};
use voicexp_reward::RewardCalculator;

use crate::activity::ActivityTracker;
use crate::session::VoiceSession;

/// Tracks voice sessions and turns closed intervals into rewards.
#[derive(Debug)]
pub struct PresenceTracker {
    /// User ID → live session
    sessions: DashMap<UserId, VoiceSession>,
    /// Last speaking time per participant
    activity: ActivityTracker,
    calculator: Arc<RewardCalculator>,
    sink: Arc<dyn RewardSink>,
    clock: Arc<dyn Clock>,
}

impl PresenceTracker {
    pub fn new(
        calculator: Arc<RewardCalculator>,
        sink: Arc<dyn RewardSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            sessions: DashMap::new(),
            activity: ActivityTracker::new(),
            calculator,
            sink,
            clock,
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn calculator(&self) -> &Arc<RewardCalculator> {
        &self.calculator
    }

    pub fn activity(&self) -> &ActivityTracker {
        &self.activity
    }

    pub(crate) fn sessions(&self) -> &DashMap<UserId, VoiceSession> {
        &self.sessions
    }

    /// Snapshot of a participant's session.
    pub fn session(&self, user_id: UserId) -> Option<VoiceSession> {
        self.sessions.get(&user_id).map(|r| r.value().clone())
    }

    /// Number of live sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Participants currently connected to `channel_id`.
    pub fn members_of(&self, channel_id: ChannelId) -> Vec<UserId> {
        self.sessions
            .iter()
            .filter(|r| r.value().channel_id == channel_id)
            .map(|r| *r.key())
            .collect()
    }

    /// Whether anybody other than `except` is streaming in `channel_id`.
    fn streaming_in(&self, channel_id: ChannelId, except: UserId) -> bool {
        self.sessions.iter().any(|r| {
            *r.key() != except
                && r.value().channel_id == channel_id
                && r.value().signals.is_streaming()
        })
    }

    /// Start a session for a participant that connected to `channel_id`.
    ///
    /// A participant that is still tracked (a missed disconnect) has the
    /// previous session settled first.
    pub async fn on_join(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        channel_id: ChannelId,
        signals: VoiceSignals,
    ) {
        if self.sessions.contains_key(&user_id) {
            warn!(user_id = %user_id, "Join for a tracked participant, settling previous session");
            self.on_leave(user_id).await;
        }

        let now = self.clock.now();
        let other_streaming = self.streaming_in(channel_id, user_id);
        let state = effective_state(&signals, other_streaming);
        self.sessions.insert(
            user_id,
            VoiceSession::new(guild_id, channel_id, state, signals, now),
        );
        self.activity.record(user_id, now);
        info!(
            guild_id = %guild_id,
            user_id = %user_id,
            channel_id = %channel_id,
            state = %state,
            "Participant joined voice"
        );

        if signals.is_streaming() {
            self.reevaluate_watchers(channel_id);
        }
    }

    /// Settle and remove a participant's session. Returns the reward handed
    /// to the sink.
    pub async fn on_leave(&self, user_id: UserId) -> i64 {
        let Some((_, mut session)) = self.sessions.remove(&user_id) else {
            debug!(user_id = %user_id, "Leave for an untracked participant");
            return 0;
        };
        self.activity.remove(user_id);

        let now = self.clock.now();
        let intervals = session.finish(now);
        if session.signals.is_streaming() {
            self.reevaluate_watchers(session.channel_id);
        }

        let reward = self.settle(session.guild_id, user_id, &intervals).await;
        info!(
            guild_id = %session.guild_id,
            user_id = %user_id,
            intervals = intervals.len(),
            seconds = (now - session.joined_at).num_seconds(),
            reward,
            "Participant left voice"
        );
        reward
    }

    /// Settle every live session as if each participant left.
    pub async fn settle_all(&self) -> usize {
        let users: Vec<UserId> = self.sessions.iter().map(|r| *r.key()).collect();
        for user_id in &users {
            self.on_leave(*user_id).await;
        }
        users.len()
    }

    /// Apply new voice flags without a channel change.
    pub fn on_state_signal(&self, user_id: UserId, signals: VoiceSignals) {
        let Some(channel_id) = self.sessions.get(&user_id).map(|r| r.value().channel_id) else {
            return;
        };
        let other_streaming = self.streaming_in(channel_id, user_id);
        let now = self.clock.now();

        let stream_toggled = {
            let Some(mut session) = self.sessions.get_mut(&user_id) else {
                return;
            };
            session.touch(now);
            if session.signals == signals || session.channel_id != channel_id {
                return;
            }
            let was_streaming = session.signals.is_streaming();
            session.signals = signals;
            let next = effective_state(&signals, other_streaming);
            let previous = session.current_state;
            if session.transition(next, now) {
                debug!(user_id = %user_id, from = %previous, to = %next, "Presence state changed");
            }
            was_streaming != signals.is_streaming()
        };

        if stream_toggled {
            self.reevaluate_watchers(channel_id);
        }
    }

    /// Move a participant to another channel. The open interval is closed
    /// under the old channel; the state carries over unless the new channel
    /// changes the watcher override.
    pub fn on_channel_change(&self, user_id: UserId, channel_id: ChannelId, signals: VoiceSignals) {
        let other_streaming = self.streaming_in(channel_id, user_id);
        let now = self.clock.now();

        let (old_channel, streaming_involved) = {
            let Some(mut session) = self.sessions.get_mut(&user_id) else {
                return;
            };
            if session.channel_id == channel_id {
                drop(session);
                self.on_state_signal(user_id, signals);
                return;
            }
            session.touch(now);
            let old_channel = session.channel_id;
            let was_streaming = session.signals.is_streaming();
            session.move_to(channel_id, now);
            session.signals = signals;

            let derived = derive_state(&signals);
            let next = match session.current_state {
                PresenceState::Idle if derived == PresenceState::Active && !other_streaming => {
                    PresenceState::Idle
                }
                _ => effective_state(&signals, other_streaming),
            };
            session.transition(next, now);
            (old_channel, was_streaming || signals.is_streaming())
        };

        debug!(
            user_id = %user_id,
            from = %old_channel,
            to = %channel_id,
            "Participant moved channel"
        );
        if streaming_involved {
            self.reevaluate_watchers(old_channel);
            self.reevaluate_watchers(channel_id);
        }
    }

    /// Record speaking activity; an idle participant becomes active again.
    pub fn on_speaking(&self, user_id: UserId) {
        let now = self.clock.now();
        let Some(mut session) = self.sessions.get_mut(&user_id) else {
            return;
        };
        self.activity.record(user_id, now);
        session.touch(now);
        if session.current_state == PresenceState::Idle && !session.is_watcher {
            session.transition(PresenceState::Active, now);
            debug!(user_id = %user_id, "Idle participant spoke, now active");
        }
    }

    /// Recompute the watcher override for everybody in `channel_id`.
    ///
    /// While someone streams, every other occupant that is neither muted nor
    /// streaming watches. Once nobody streams, former watchers fall back to
    /// the state implied by their own flags.
    pub fn reevaluate_watchers(&self, channel_id: ChannelId) {
        let streamers: Vec<UserId> = self
            .sessions
            .iter()
            .filter(|r| r.value().channel_id == channel_id && r.value().signals.is_streaming())
            .map(|r| *r.key())
            .collect();
        let now = self.clock.now();

        for user_id in self.members_of(channel_id) {
            let Some(mut session) = self.sessions.get_mut(&user_id) else {
                continue;
            };
            if session.channel_id != channel_id {
                continue;
            }
            let other_streaming = streamers.iter().any(|s| *s != user_id);
            let derived = derive_state(&session.signals);
            let next = if other_streaming && derived == PresenceState::Active {
                PresenceState::Watching
            } else if !other_streaming && session.is_watcher {
                derived
            } else {
                continue;
            };
            if session.transition(next, now) {
                debug!(user_id = %user_id, channel_id = %channel_id, state = %next, "Watcher override updated");
            }
        }
    }

    /// Dispatch a platform voice update to the matching handler.
    pub async fn handle_voice_update(&self, update: VoiceStateUpdate) {
        match (update.before, update.after) {
            (None, Some(after)) => {
                self.on_join(update.guild_id, update.user_id, after.channel_id, after.signals)
                    .await;
            }
            (Some(_), None) => {
                self.on_leave(update.user_id).await;
            }
            (Some(before), Some(after)) if before.channel_id != after.channel_id => {
                self.on_channel_change(update.user_id, after.channel_id, after.signals);
            }
            (Some(before), Some(after)) if before.signals != after.signals => {
                self.on_state_signal(update.user_id, after.signals);
            }
            _ => {}
        }
    }

    /// Price `intervals` and hand the reward to the sink.
    pub(crate) async fn settle(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        intervals: &[StateInterval],
    ) -> i64 {
        let reward = self.calculator.session_reward(guild_id, intervals).await;
        if reward > 0 {
            if let Err(e) = self.sink.submit_reward(guild_id, user_id, reward).await {
                error!(
                    guild_id = %guild_id,
                    user_id = %user_id,
                    reward,
                    "Failed to submit reward: {}",
                    e
                );
            }
        }
        reward
    }
}
