//! # voicexp-cache
//!
//! In-process caches built on [moka](https://crates.io/crates/moka):
//!
//! - **levels**: write-through cache of level records, read before the store
//! - **roles**: level to role mapping per guild
//! - **boosts**: per-guild boost event windows and upcoming events

pub mod boost;
pub mod level;
pub mod manager;
pub mod role;

pub use boost::{BoostCache, BoostWindow};
pub use level::LevelCache;
pub use manager::CacheManager;
pub use role::RoleCache;
