//! # voicexp-presence
//!
//! Real-time presence accounting for voice channels.
//!
//! - [`session`]: per-participant session with its interval history
//! - [`activity`]: last speaking time per participant
//! - [`tracker`]: the state machine reacting to voice signals
//! - [`maintenance`]: idle detection, long-session flushing, reaping and compaction
//! - [`scheduler`]: periodic maintenance jobs
//! - [`engine`]: wires the tracker, the reward writer and the background tasks

pub mod activity;
pub mod engine;
pub mod maintenance;
pub mod scheduler;
pub mod session;
pub mod tracker;

pub use activity::ActivityTracker;
pub use engine::PresenceEngine;
pub use maintenance::{FlushReport, Maintenance, ReapReport};
pub use scheduler::MaintenanceScheduler;
pub use session::{VoiceSession, compact_intervals};
pub use tracker::PresenceTracker;
