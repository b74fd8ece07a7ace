//! Shared value types used across VoiceXP crates.

pub mod clock;
pub mod id;

pub use clock::{Clock, ManualClock, SystemClock};
pub use id::{BoostEventId, ChannelId, GuildId, RoleId, UserId};
