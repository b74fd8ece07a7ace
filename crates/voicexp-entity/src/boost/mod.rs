//! Boost domain entities.

pub mod model;

pub use model::{BoostEvent, ChannelBoost};
