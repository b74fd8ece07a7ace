//! Presence state machine and maintenance tests over the in-memory store.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};

use voicexp_cache::CacheManager;
use voicexp_core::config::{CacheConfig, PresenceConfig, RewardConfig, WriterConfig};
use voicexp_core::types::clock::{Clock, ManualClock};
use voicexp_core::types::id::{BoostEventId, ChannelId, GuildId, UserId};
use voicexp_database::MemoryStore;
use voicexp_entity::boost::{BoostEvent, ChannelBoost};
use voicexp_entity::level::LevelKey;
use voicexp_entity::presence::{
    PresenceState, StateInterval, VoiceSignals, VoiceSnapshot, VoiceStateUpdate,
};
use voicexp_presence::{Maintenance, PresenceTracker};
use voicexp_reward::{BoostResolver, RewardCalculator};
use voicexp_worker::progression::xp_to_next_level;
use voicexp_worker::{PendingOperations, RetryExecutor, RetryPolicy, RewardWriter, WriteQueue};

const GUILD: GuildId = GuildId::new(100);
const LOBBY: ChannelId = ChannelId::new(1);
const STAGE: ChannelId = ChannelId::new(2);
const ALICE: UserId = UserId::new(11);
const BOB: UserId = UserId::new(12);
const CAROL: UserId = UserId::new(13);

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 20, 0, 0).unwrap()
}

fn at(secs: i64) -> DateTime<Utc> {
    t0() + Duration::seconds(secs)
}

fn quiet() -> VoiceSignals {
    VoiceSignals::default()
}

fn muted() -> VoiceSignals {
    VoiceSignals {
        self_mute: true,
        ..Default::default()
    }
}

fn streaming() -> VoiceSignals {
    VoiceSignals {
        self_stream: true,
        ..Default::default()
    }
}

struct Harness {
    store: Arc<MemoryStore>,
    clock: Arc<ManualClock>,
    tracker: Arc<PresenceTracker>,
    maintenance: Maintenance,
    writer: Arc<RewardWriter>,
}

impl Harness {
    fn new() -> Self {
        Self::with_config(PresenceConfig::default())
    }

    fn with_config(presence: PresenceConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(t0()));
        let writer_config = WriterConfig {
            max_retries: 2,
            retry_base_delay_millis: 1,
            ..WriterConfig::default()
        };
        let retry = Arc::new(RetryExecutor::new(
            RetryPolicy::from_config(&writer_config),
            Arc::new(PendingOperations::new()),
        ));
        let caches = CacheManager::new(&CacheConfig::default());
        let writer = Arc::new(RewardWriter::new(
            store.clone(),
            caches.clone(),
            Arc::new(WriteQueue::new()),
            Arc::clone(&retry),
            clock.clone(),
        ));
        let resolver = Arc::new(BoostResolver::new(
            store.clone(),
            caches.boosts.clone(),
            retry,
            clock.clone(),
            Duration::hours(6),
        ));
        let calculator = Arc::new(RewardCalculator::new(resolver, &RewardConfig::default()));
        let tracker = Arc::new(PresenceTracker::new(
            calculator,
            writer.clone(),
            clock.clone(),
        ));
        let maintenance = Maintenance::new(Arc::clone(&tracker), presence);
        Self {
            store,
            clock,
            tracker,
            maintenance,
            writer,
        }
    }

    fn set(&self, secs: i64) {
        self.clock.set(at(secs));
    }

    fn state(&self, user: UserId) -> PresenceState {
        self.tracker.session(user).unwrap().current_state
    }

    /// Total XP earned, including what was spent on level-ups.
    async fn xp(&self, user: UserId) -> i64 {
        let Some(record) = self
            .writer
            .read_level(LevelKey::new(GUILD, user))
            .await
            .unwrap()
        else {
            return 0;
        };
        (1..record.level).map(xp_to_next_level).sum::<i64>() + record.xp
    }
}

#[tokio::test(start_paused = true)]
async fn test_active_session_earns_fifty() {
    let h = Harness::new();
    h.tracker.on_join(GUILD, ALICE, LOBBY, quiet()).await;
    h.set(120);
    h.tracker.on_speaking(ALICE);
    h.set(600);

    let reward = h.tracker.on_leave(ALICE).await;
    assert_eq!(reward, 50);
    assert_eq!(h.xp(ALICE).await, 50);
    assert!(h.tracker.session(ALICE).is_none());
    assert_eq!(h.tracker.activity().get(ALICE), None);
}

#[tokio::test(start_paused = true)]
async fn test_muted_then_active_with_channel_boost_earns_seventy() {
    let h = Harness::new();
    h.store.insert_channel_boost(ChannelBoost {
        guild_id: GUILD,
        channel_id: STAGE,
        multiplier: 2.0,
    });
    h.tracker
        .calculator()
        .resolver()
        .load_channel_boosts()
        .await
        .unwrap();

    h.tracker.on_join(GUILD, ALICE, STAGE, muted()).await;
    assert_eq!(h.state(ALICE), PresenceState::Muted);
    h.set(300);
    h.tracker.on_state_signal(ALICE, quiet());
    assert_eq!(h.state(ALICE), PresenceState::Active);
    h.set(600);

    assert_eq!(h.tracker.on_leave(ALICE).await, 70);
}

#[tokio::test(start_paused = true)]
async fn test_boost_event_in_middle_third_earns_one_twenty_five() {
    let h = Harness::new();
    h.store.insert_boost_event(BoostEvent {
        id: BoostEventId::new(1),
        guild_id: GUILD,
        name: "happy hour".to_string(),
        multiplier: 3.0,
        start_time: at(300),
        end_time: at(600),
        created_by: BOB,
        active: true,
    });

    h.tracker.on_join(GUILD, ALICE, LOBBY, quiet()).await;
    h.set(900);
    assert_eq!(h.tracker.on_leave(ALICE).await, 125);
}

#[tokio::test(start_paused = true)]
async fn test_idle_detection_closes_exactly_one_interval() {
    let h = Harness::new();
    h.tracker.on_join(GUILD, ALICE, LOBBY, quiet()).await;
    h.tracker.on_join(GUILD, BOB, LOBBY, muted()).await;

    h.set(301);
    assert_eq!(h.maintenance.run_idle_detection(), 1);
    let session = h.tracker.session(ALICE).unwrap();
    assert_eq!(session.current_state, PresenceState::Idle);
    assert_eq!(session.history.len(), 1);
    assert_eq!(session.history[0].state, PresenceState::Active);
    assert_eq!(session.history[0].duration(), Duration::seconds(301));
    // Muted participants are never idled
    assert_eq!(h.state(BOB), PresenceState::Muted);

    h.set(400);
    assert_eq!(h.maintenance.run_idle_detection(), 0);
    assert_eq!(h.tracker.session(ALICE).unwrap().history.len(), 1);

    h.tracker.on_speaking(ALICE);
    assert_eq!(h.state(ALICE), PresenceState::Active);
    assert_eq!(h.tracker.session(ALICE).unwrap().history.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_recent_speaker_is_not_idled() {
    let h = Harness::new();
    h.tracker.on_join(GUILD, ALICE, LOBBY, quiet()).await;
    h.set(200);
    h.tracker.on_speaking(ALICE);
    h.set(450);
    assert_eq!(h.maintenance.run_idle_detection(), 0);
    assert_eq!(h.state(ALICE), PresenceState::Active);
}

#[tokio::test(start_paused = true)]
async fn test_long_session_flush_does_not_double_count() {
    let config = PresenceConfig {
        long_session_threshold_seconds: 1200,
        ..PresenceConfig::default()
    };
    let h = Harness::with_config(config);
    h.tracker.on_join(GUILD, ALICE, LOBBY, quiet()).await;

    h.set(1800);
    let report = h.maintenance.flush_long_sessions().await;
    assert_eq!(report.flushed, 1);
    assert_eq!(report.reward, 150);
    assert_eq!(h.xp(ALICE).await, 150);

    // Flushed within the last period, so a second sweep leaves it alone
    h.set(1900);
    assert_eq!(h.maintenance.flush_long_sessions().await.flushed, 0);

    let session = h.tracker.session(ALICE).unwrap();
    assert_eq!(session.state_start, at(1800));
    assert_eq!(session.accounted_duration(at(1900)), Duration::seconds(1900));

    h.set(3600);
    let rest = h.tracker.on_leave(ALICE).await;
    assert_eq!(rest, 150);
    assert_eq!(h.xp(ALICE).await, 300);

    // Same as a single unflushed interval
    let single = h
        .tracker
        .calculator()
        .session_reward(
            GUILD,
            &[StateInterval::new(PresenceState::Active, at(0), at(3600), LOBBY)],
        )
        .await;
    assert_eq!(single, 300);
}

#[tokio::test(start_paused = true)]
async fn test_duration_invariant_across_transitions() {
    let config = PresenceConfig {
        long_session_threshold_seconds: 60,
        ..PresenceConfig::default()
    };
    let h = Harness::with_config(config);
    h.tracker.on_join(GUILD, ALICE, LOBBY, quiet()).await;
    h.tracker.on_join(GUILD, BOB, LOBBY, quiet()).await;

    h.set(90);
    h.tracker.on_state_signal(ALICE, muted());
    assert_accounted(&h);
    h.set(200);
    h.tracker.on_state_signal(BOB, streaming());
    assert_accounted(&h);
    h.set(260);
    h.tracker.on_state_signal(ALICE, quiet());
    assert_eq!(h.state(ALICE), PresenceState::Watching);
    assert_accounted(&h);
    h.set(500);
    h.tracker.on_channel_change(ALICE, STAGE, quiet());
    assert_accounted(&h);
    h.set(800);
    h.maintenance.run_idle_detection();
    assert_eq!(h.state(ALICE), PresenceState::Idle);
    assert_accounted(&h);

    h.set(1000);
    assert_eq!(h.maintenance.flush_long_sessions().await.flushed, 2);
    assert_accounted(&h);
}

fn assert_accounted(h: &Harness) {
    let now = h.clock.now();
    for user in [ALICE, BOB] {
        let session = h.tracker.session(user).unwrap();
        assert_eq!(session.accounted_duration(now), now - session.joined_at);
        let ordered = session.history.windows(2).all(|w| w[0].end <= w[1].start);
        assert!(ordered, "history of {user} overlaps");
    }
}

#[tokio::test(start_paused = true)]
async fn test_stream_start_and_stop_toggle_watchers() {
    let h = Harness::new();
    h.tracker.on_join(GUILD, ALICE, LOBBY, quiet()).await;
    h.tracker.on_join(GUILD, BOB, LOBBY, quiet()).await;
    h.tracker.on_join(GUILD, CAROL, LOBBY, muted()).await;

    h.set(60);
    h.tracker.on_state_signal(BOB, streaming());
    assert_eq!(h.state(BOB), PresenceState::Streaming);
    assert_eq!(h.state(ALICE), PresenceState::Watching);
    assert_eq!(h.state(CAROL), PresenceState::Muted);
    let alice = h.tracker.session(ALICE).unwrap();
    assert!(alice.is_watcher);
    assert_eq!(alice.history.len(), 1);

    // Watchers toggling video stay watching
    h.set(90);
    h.tracker.on_state_signal(
        ALICE,
        VoiceSignals {
            self_video: true,
            ..Default::default()
        },
    );
    assert_eq!(h.state(ALICE), PresenceState::Watching);

    // Muting clears the watcher flag
    h.set(120);
    h.tracker.on_state_signal(ALICE, muted());
    assert!(!h.tracker.session(ALICE).unwrap().is_watcher);
    h.set(150);
    h.tracker.on_state_signal(ALICE, quiet());
    assert_eq!(h.state(ALICE), PresenceState::Watching);

    h.set(180);
    h.tracker.on_state_signal(BOB, quiet());
    assert_eq!(h.state(ALICE), PresenceState::Active);
    assert!(!h.tracker.session(ALICE).unwrap().is_watcher);
    assert_eq!(h.state(BOB), PresenceState::Active);
}

#[tokio::test(start_paused = true)]
async fn test_joining_a_streamed_channel_watches() {
    let h = Harness::new();
    h.tracker.on_join(GUILD, BOB, LOBBY, streaming()).await;
    h.tracker.on_join(GUILD, ALICE, LOBBY, quiet()).await;
    h.tracker.on_join(GUILD, CAROL, LOBBY, muted()).await;
    assert_eq!(h.state(ALICE), PresenceState::Watching);
    assert_eq!(h.state(CAROL), PresenceState::Muted);

    h.set(300);
    h.tracker.on_leave(BOB).await;
    assert_eq!(h.state(ALICE), PresenceState::Active);
    let history = h.tracker.session(ALICE).unwrap().history;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].state, PresenceState::Watching);

    h.set(600);
    // 300s watching at 6/min, 300s active at 5/min
    assert_eq!(h.tracker.on_leave(ALICE).await, 30 + 25);
}

#[tokio::test(start_paused = true)]
async fn test_idle_participant_is_pulled_into_watching() {
    let h = Harness::new();
    h.tracker.on_join(GUILD, ALICE, LOBBY, quiet()).await;
    h.tracker.on_join(GUILD, BOB, LOBBY, quiet()).await;
    h.set(301);
    h.maintenance.run_idle_detection();
    assert_eq!(h.state(ALICE), PresenceState::Idle);

    h.tracker.on_speaking(BOB);
    h.tracker.on_state_signal(BOB, streaming());
    assert_eq!(h.state(ALICE), PresenceState::Watching);

    // Speaking does not pull a watcher out of the override
    h.set(320);
    h.tracker.on_speaking(ALICE);
    assert_eq!(h.state(ALICE), PresenceState::Watching);
}

#[tokio::test(start_paused = true)]
async fn test_channel_change_closes_interval_in_old_channel() {
    let h = Harness::new();
    h.tracker.on_join(GUILD, BOB, LOBBY, streaming()).await;
    h.tracker.on_join(GUILD, ALICE, LOBBY, quiet()).await;
    assert_eq!(h.state(ALICE), PresenceState::Watching);

    h.set(240);
    h.tracker.on_channel_change(ALICE, STAGE, quiet());
    let session = h.tracker.session(ALICE).unwrap();
    assert_eq!(session.channel_id, STAGE);
    assert_eq!(session.current_state, PresenceState::Active);
    assert_eq!(session.state_start, at(240));
    assert_eq!(session.history.len(), 1);
    assert_eq!(session.history[0].channel_id, LOBBY);
    assert_eq!(session.history[0].state, PresenceState::Watching);

    // The streamer follows; Alice watches again in the new channel
    h.set(300);
    h.tracker.on_channel_change(BOB, STAGE, streaming());
    assert_eq!(h.state(ALICE), PresenceState::Watching);
}

#[tokio::test(start_paused = true)]
async fn test_idle_state_survives_a_channel_move() {
    let h = Harness::new();
    h.tracker.on_join(GUILD, ALICE, LOBBY, quiet()).await;
    h.set(400);
    h.maintenance.run_idle_detection();
    h.set(500);
    h.tracker.on_channel_change(ALICE, STAGE, quiet());
    assert_eq!(h.state(ALICE), PresenceState::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_voice_update_dispatch() {
    let h = Harness::new();
    let snapshot = |channel_id, signals| VoiceSnapshot {
        channel_id,
        signals,
    };
    let update = |before, after| VoiceStateUpdate {
        guild_id: GUILD,
        user_id: ALICE,
        before,
        after,
    };

    h.tracker
        .handle_voice_update(update(None, Some(snapshot(LOBBY, quiet()))))
        .await;
    assert_eq!(h.tracker.session_count(), 1);

    h.set(60);
    h.tracker
        .handle_voice_update(update(
            Some(snapshot(LOBBY, quiet())),
            Some(snapshot(LOBBY, muted())),
        ))
        .await;
    assert_eq!(h.state(ALICE), PresenceState::Muted);

    h.set(120);
    h.tracker
        .handle_voice_update(update(
            Some(snapshot(LOBBY, muted())),
            Some(snapshot(STAGE, muted())),
        ))
        .await;
    let session = h.tracker.session(ALICE).unwrap();
    assert_eq!(session.channel_id, STAGE);
    assert_eq!(session.current_state, PresenceState::Muted);

    h.set(180);
    h.tracker
        .handle_voice_update(update(Some(snapshot(STAGE, muted())), None))
        .await;
    assert_eq!(h.tracker.session_count(), 0);
    // 60s active, 120s muted
    assert_eq!(h.xp(ALICE).await, 5 + 4);
}

#[tokio::test(start_paused = true)]
async fn test_handlers_ignore_untracked_participants() {
    let h = Harness::new();
    h.tracker.on_state_signal(ALICE, muted());
    h.tracker.on_channel_change(ALICE, STAGE, quiet());
    h.tracker.on_speaking(ALICE);
    assert_eq!(h.tracker.on_leave(ALICE).await, 0);
    assert_eq!(h.tracker.session_count(), 0);
    assert!(h.tracker.activity().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_rejoin_settles_previous_session() {
    let h = Harness::new();
    h.tracker.on_join(GUILD, ALICE, LOBBY, quiet()).await;
    h.set(600);
    h.tracker.on_join(GUILD, ALICE, STAGE, quiet()).await;
    assert_eq!(h.xp(ALICE).await, 50);
    let session = h.tracker.session(ALICE).unwrap();
    assert_eq!(session.joined_at, at(600));
    assert_eq!(session.channel_id, STAGE);
}

#[tokio::test(start_paused = true)]
async fn test_reaper_drops_abandoned_sessions_without_reward() {
    let h = Harness::new();
    h.tracker.on_join(GUILD, ALICE, LOBBY, quiet()).await;
    h.set(3 * 60 * 60 - 100);
    h.tracker.on_join(GUILD, BOB, LOBBY, quiet()).await;

    h.set(3 * 60 * 60 + 1);
    let report = h.maintenance.reap_and_compact();
    assert_eq!(report.reaped, 1);
    assert_eq!(report.dropped_seconds, 3 * 60 * 60 + 1);
    assert!(h.tracker.session(ALICE).is_none());
    assert!(h.tracker.session(BOB).is_some());
    assert_eq!(h.tracker.activity().get(ALICE), None);
    assert_eq!(h.xp(ALICE).await, 0);
}

#[tokio::test(start_paused = true)]
async fn test_reaper_fires_on_schedule_despite_flushes() {
    let h = Harness::new();
    h.tracker.on_join(GUILD, ALICE, LOBBY, quiet()).await;
    h.tracker.on_join(GUILD, BOB, LOBBY, quiet()).await;

    let mut reaped_at = Vec::new();
    let mut dropped = 0;
    for secs in (60..=6 * 60 * 60).step_by(60) {
        h.set(secs);
        // Bob keeps talking every ten minutes
        if secs % 600 == 0 {
            h.tracker.on_speaking(BOB);
        }
        h.maintenance.run_idle_detection();
        if secs % 900 == 0 {
            let (_, reap) = h.maintenance.run_periodic().await;
            if reap.reaped > 0 {
                reaped_at.push(secs);
                dropped += reap.dropped_seconds;
            }
        }
    }

    // Silent since joining: reaped on the first tick past three hours
    assert_eq!(reaped_at, vec![11700]);
    assert!(h.tracker.session(ALICE).is_none());
    assert!(h.tracker.session(BOB).is_some());
    // 360s active history plus the 900s open since the last flush
    assert_eq!(dropped, 360 + 900);
    // Idle from 360s, flushed at 2700, 5400, 8100 and 10800
    assert_eq!(h.xp(ALICE).await, 39 + 45 + 45 + 45);
}

#[tokio::test(start_paused = true)]
async fn test_settle_all_rewards_every_session() {
    let h = Harness::new();
    h.tracker.on_join(GUILD, ALICE, LOBBY, quiet()).await;
    h.tracker.on_join(GUILD, BOB, STAGE, muted()).await;
    h.set(600);
    assert_eq!(h.tracker.settle_all().await, 2);
    assert_eq!(h.tracker.session_count(), 0);
    assert_eq!(h.xp(ALICE).await, 50);
    assert_eq!(h.xp(BOB).await, 20);
}
