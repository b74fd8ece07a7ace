//! Per-participant voice session.
//!
//! A session owns the open interval (`current_state` since `state_start`)
//! and the closed intervals in `history`. Time already rewarded by a
//! long-session flush is tracked in `flushed`, so at any instant
//! `open + history + flushed == now - joined_at`.
//!
//! `last_signal_at` only moves on participant signals (join, flags, channel
//! moves, speaking). Flushes and server-driven transitions leave it alone,
//! which is what the reaper measures inactivity against.

use chrono::{DateTime, Duration, Utc};

use voicexp_core::types::id::{ChannelId, GuildId};
use voicexp_entity::presence::{PresenceState, StateInterval, VoiceSignals};

/// Live presence of one participant in one voice channel.
#[derive(Debug, Clone)]
pub struct VoiceSession {
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
    pub current_state: PresenceState,
    pub state_start: DateTime<Utc>,
    pub joined_at: DateTime<Utc>,
    pub history: Vec<StateInterval>,
    pub signals: VoiceSignals,
    pub is_watcher: bool,
    pub last_flushed_at: Option<DateTime<Utc>>,
    /// Span already rewarded by long-session flushes.
    pub flushed: Duration,
    /// Last signal received from the participant.
    pub last_signal_at: DateTime<Utc>,
}

impl VoiceSession {
    pub fn new(
        guild_id: GuildId,
        channel_id: ChannelId,
        state: PresenceState,
        signals: VoiceSignals,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            guild_id,
            channel_id,
            current_state: state,
            state_start: now,
            joined_at: now,
            history: Vec::new(),
            signals,
            is_watcher: state == PresenceState::Watching,
            last_flushed_at: None,
            flushed: Duration::zero(),
            last_signal_at: now,
        }
    }

    /// Note a signal from the participant.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_signal_at = self.last_signal_at.max(now);
    }

    /// Time since the participant last sent a signal.
    pub fn silent_for(&self, now: DateTime<Utc>) -> Duration {
        now - self.last_signal_at
    }

    /// Age of the open interval.
    pub fn open_duration(&self, now: DateTime<Utc>) -> Duration {
        now - self.state_start
    }

    /// Close the open interval into history and restart it at `now`.
    /// Empty intervals are not recorded.
    pub fn close_current(&mut self, now: DateTime<Utc>) {
        if now > self.state_start {
            self.history.push(StateInterval::new(
                self.current_state,
                self.state_start,
                now,
                self.channel_id,
            ));
        }
        self.state_start = now;
    }

    /// Move to `state`, closing the open interval. Returns `false` when the
    /// session is already in that state.
    pub fn transition(&mut self, state: PresenceState, now: DateTime<Utc>) -> bool {
        self.is_watcher = state == PresenceState::Watching;
        if state == self.current_state {
            return false;
        }
        self.close_current(now);
        self.current_state = state;
        true
    }

    /// Close the open interval under the old channel and continue in `channel`.
    pub fn move_to(&mut self, channel_id: ChannelId, now: DateTime<Utc>) {
        self.close_current(now);
        self.channel_id = channel_id;
    }

    /// Cut the open interval at `now` for a long-session flush.
    ///
    /// The returned interval is not added to history; its span moves into
    /// `flushed` and the open interval restarts at `now`.
    pub fn take_open_interval(&mut self, now: DateTime<Utc>) -> StateInterval {
        let interval =
            StateInterval::new(self.current_state, self.state_start, now, self.channel_id);
        self.flushed += interval.duration();
        self.state_start = now;
        self.last_flushed_at = Some(now);
        interval
    }

    /// Close the open interval and hand out every unrewarded interval.
    pub fn finish(&mut self, now: DateTime<Utc>) -> Vec<StateInterval> {
        self.close_current(now);
        std::mem::take(&mut self.history)
    }

    /// Whether a long-session flush ran within `period` before `now`.
    pub fn flushed_within(&self, period: Duration, now: DateTime<Utc>) -> bool {
        self.last_flushed_at.is_some_and(|at| now - at < period)
    }

    /// Time covered by the open interval, history and flushed spans.
    pub fn accounted_duration(&self, now: DateTime<Utc>) -> Duration {
        self.history
            .iter()
            .fold(self.open_duration(now) + self.flushed, |acc, i| acc + i.duration())
    }

    /// Merge contiguous history entries. Returns how many entries were removed.
    pub fn compact_history(&mut self) -> usize {
        let before = self.history.len();
        self.history = compact_intervals(&self.history);
        before - self.history.len()
    }
}

/// Merge runs of contiguous intervals with the same state and channel.
///
/// Intervals separated by a gap (a flushed span) are kept apart so that the
/// gap is never rewarded twice.
pub fn compact_intervals(intervals: &[StateInterval]) -> Vec<StateInterval> {
    let mut merged: Vec<StateInterval> = Vec::with_capacity(intervals.len());
    for interval in intervals {
        match merged.last_mut() {
            Some(last) if last.can_merge(interval) => {
                *last = StateInterval::new(last.state, last.start, interval.end, last.channel_id);
            }
            _ => merged.push(*interval),
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const LOBBY: ChannelId = ChannelId::new(1);
    const STAGE: ChannelId = ChannelId::new(2);

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::seconds(secs)
    }

    fn session() -> VoiceSession {
        VoiceSession::new(
            GuildId::new(7),
            LOBBY,
            PresenceState::Active,
            VoiceSignals::default(),
            at(0),
        )
    }

    fn assert_invariant(s: &VoiceSession, now: DateTime<Utc>) {
        assert_eq!(s.accounted_duration(now), now - s.joined_at);
    }

    #[test]
    fn test_transition_closes_interval() {
        let mut s = session();
        assert!(s.transition(PresenceState::Muted, at(60)));
        assert!(!s.transition(PresenceState::Muted, at(90)));
        assert_eq!(s.history.len(), 1);
        assert_eq!(s.history[0].state, PresenceState::Active);
        assert_eq!(s.history[0].duration(), Duration::seconds(60));
        assert_eq!(s.state_start, at(60));
        assert_invariant(&s, at(100));
    }

    #[test]
    fn test_move_keeps_state_and_records_old_channel() {
        let mut s = session();
        s.move_to(STAGE, at(30));
        assert_eq!(s.current_state, PresenceState::Active);
        assert_eq!(s.channel_id, STAGE);
        assert_eq!(s.history[0].channel_id, LOBBY);
        assert_invariant(&s, at(45));
    }

    #[test]
    fn test_flush_keeps_invariant() {
        let mut s = session();
        s.transition(PresenceState::Muted, at(100));
        let flushed = s.take_open_interval(at(2000));
        assert_eq!(flushed.start, at(100));
        assert_eq!(flushed.state, PresenceState::Muted);
        assert_eq!(s.history.len(), 1);
        assert_eq!(s.flushed, Duration::seconds(1900));
        assert!(s.flushed_within(Duration::seconds(900), at(2500)));
        assert!(!s.flushed_within(Duration::seconds(900), at(2900)));
        assert_invariant(&s, at(2600));
        // Flushing is not a participant signal
        assert_eq!(s.last_signal_at, at(0));
        assert_eq!(s.silent_for(at(2600)), Duration::seconds(2600));

        let rest = s.finish(at(2600));
        let unrewarded: Duration = rest.iter().map(StateInterval::duration).sum();
        assert_eq!(unrewarded + s.flushed, at(2600) - s.joined_at);
    }

    #[test]
    fn test_zero_length_interval_not_recorded() {
        let mut s = session();
        s.transition(PresenceState::Muted, at(0));
        assert!(s.history.is_empty());
    }

    #[test]
    fn test_compaction_preserves_total_and_is_idempotent() {
        let mut s = session();
        s.transition(PresenceState::Muted, at(10));
        s.history.push(StateInterval::new(PresenceState::Muted, at(10), at(20), LOBBY));
        s.history.push(StateInterval::new(PresenceState::Muted, at(20), at(35), LOBBY));
        s.history.push(StateInterval::new(PresenceState::Muted, at(35), at(40), STAGE));
        s.history.push(StateInterval::new(PresenceState::Muted, at(50), at(60), STAGE));
        let total: Duration = s.history.iter().map(StateInterval::duration).sum();

        let removed = s.compact_history();
        assert_eq!(removed, 1);
        assert_eq!(s.history.len(), 4);
        assert_eq!(s.history[1].start, at(10));
        assert_eq!(s.history[1].end, at(35));
        let after: Duration = s.history.iter().map(StateInterval::duration).sum();
        assert_eq!(total, after);

        let once = s.history.clone();
        assert_eq!(s.compact_history(), 0);
        assert_eq!(s.history, once);
    }
}
