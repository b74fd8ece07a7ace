//! Presence domain entities.

pub mod interval;
pub mod state;
pub mod voice;

pub use interval::StateInterval;
pub use state::{PresenceState, VoiceSignals, derive_state, effective_state};
pub use voice::{VoiceSnapshot, VoiceStateUpdate};
