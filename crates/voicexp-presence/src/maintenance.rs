//! Periodic sweeps over the live session table.
//!
//! Each sweep snapshots the participant ids first and then processes one
//! session at a time; a session that disappeared in between is skipped.

use std::sync::Arc;

use tracing::{debug, info, warn};

use voicexp_core::config::PresenceConfig;
use voicexp_core::types::id::UserId;
use voicexp_entity::presence::{PresenceState, StateInterval};

use crate::tracker::PresenceTracker;

/// Result of a long-session flush sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub flushed: usize,
    pub reward: i64,
}

/// Result of a reap and compaction sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReapReport {
    pub reaped: usize,
    /// Unrewarded seconds discarded with the reaped sessions.
    pub dropped_seconds: i64,
    pub compacted: usize,
}

/// Idle detection, long-session flushing, reaping and history compaction.
#[derive(Debug, Clone)]
pub struct Maintenance {
    tracker: Arc<PresenceTracker>,
    config: PresenceConfig,
}

impl Maintenance {
    pub fn new(tracker: Arc<PresenceTracker>, config: PresenceConfig) -> Self {
        Self { tracker, config }
    }

    pub fn config(&self) -> &PresenceConfig {
        &self.config
    }

    fn user_ids(&self) -> Vec<UserId> {
        self.tracker.sessions().iter().map(|r| *r.key()).collect()
    }

    /// Move active participants that stayed silent past the idle threshold
    /// to `Idle`. Returns how many sessions went idle.
    pub fn run_idle_detection(&self) -> usize {
        let now = self.tracker.clock().now();
        let cutoff = now - self.config.idle_threshold();
        let mut idled = 0;

        for user_id in self.tracker.activity().silent_since(cutoff) {
            let Some(mut session) = self.tracker.sessions().get_mut(&user_id) else {
                continue;
            };
            if !session.current_state.is_idle_candidate() {
                continue;
            }
            // Spoke after the snapshot was taken
            if self
                .tracker
                .activity()
                .get(user_id)
                .is_some_and(|spoke| spoke >= cutoff)
            {
                continue;
            }
            session.transition(PresenceState::Idle, now);
            idled += 1;
            debug!(user_id = %user_id, "Participant went idle");
        }

        if idled > 0 {
            info!(count = idled, "Idle detection moved participants to idle");
        }
        idled
    }

    /// Reward the open interval of sessions that have been in one state for
    /// longer than the long-session threshold, then restart that interval.
    pub async fn flush_long_sessions(&self) -> FlushReport {
        let now = self.tracker.clock().now();
        let threshold = self.config.long_session_threshold();
        let period = self.config.periodic_interval();
        let mut report = FlushReport::default();

        for user_id in self.user_ids() {
            let taken = {
                let Some(mut session) = self.tracker.sessions().get_mut(&user_id) else {
                    continue;
                };
                if session.open_duration(now) <= threshold || session.flushed_within(period, now)
                {
                    continue;
                }
                (session.guild_id, session.take_open_interval(now))
            };

            let (guild_id, interval) = taken;
            let reward = self.tracker.settle(guild_id, user_id, &[interval]).await;
            report.flushed += 1;
            report.reward += reward;
            debug!(
                user_id = %user_id,
                state = %interval.state,
                seconds = interval.duration().num_seconds(),
                reward,
                "Flushed long session"
            );
        }

        if report.flushed > 0 {
            info!(
                sessions = report.flushed,
                reward = report.reward,
                "Long-session flush completed"
            );
        }
        report
    }

    /// Drop sessions that sent no signal for longer than the inactivity
    /// threshold and compact oversized histories.
    ///
    /// Long-session flushes restart the open interval, so inactivity is
    /// measured from the participant's last signal instead.
    pub fn reap_and_compact(&self) -> ReapReport {
        let now = self.tracker.clock().now();
        let inactive = self.config.inactive_session_threshold();
        let max_history = self.config.max_history_entries;
        let mut report = ReapReport::default();

        for user_id in self.user_ids() {
            let reaped = self
                .tracker
                .sessions()
                .remove_if(&user_id, |_, session| session.silent_for(now) > inactive);

            if let Some((_, session)) = reaped {
                self.tracker.activity().remove(user_id);
                let dropped = session
                    .history
                    .iter()
                    .map(StateInterval::duration)
                    .fold(session.open_duration(now), |acc, d| acc + d);
                report.reaped += 1;
                report.dropped_seconds += dropped.num_seconds();
                warn!(
                    guild_id = %session.guild_id,
                    user_id = %user_id,
                    silent_seconds = session.silent_for(now).num_seconds(),
                    dropped_seconds = dropped.num_seconds(),
                    "Reaped inactive session without reward"
                );
                if session.signals.is_streaming() {
                    self.tracker.reevaluate_watchers(session.channel_id);
                }
                continue;
            }

            let Some(mut session) = self.tracker.sessions().get_mut(&user_id) else {
                continue;
            };
            if session.history.len() > max_history {
                let removed = session.compact_history();
                if removed > 0 {
                    report.compacted += 1;
                    debug!(
                        user_id = %user_id,
                        removed,
                        remaining = session.history.len(),
                        "Compacted session history"
                    );
                }
            }
        }

        if report.reaped > 0 {
            warn!(
                sessions = report.reaped,
                dropped_seconds = report.dropped_seconds,
                "Reaper dropped inactive sessions"
            );
        }
        report
    }

    /// Reap, compact, then flush, as run on every periodic tick.
    ///
    /// Reaping first keeps an abandoned session from being flushed.
    pub async fn run_periodic(&self) -> (FlushReport, ReapReport) {
        let reap = self.reap_and_compact();
        let flush = self.flush_long_sessions().await;
        (flush, reap)
    }
}
