//! Core traits defined in `voicexp-core` and implemented by other crates.

pub mod reward;

pub use reward::RewardSink;
