//! # voicexp-core
//!
//! Core crate for VoiceXP. Contains configuration schemas, typed
//! identifiers, the injectable clock, the reward sink trait, and the
//! unified error system.
//!
//! This crate has **no** internal dependencies on other VoiceXP crates.

pub mod config;
pub mod error;
pub mod result;
pub mod traits;
pub mod types;

pub use error::AppError;
pub use result::AppResult;
