//! # voicexp-database
//!
//! PostgreSQL connection management, migrations, and the store
//! implementations the reward pipeline reads from and writes to. An
//! in-memory store with the same contract backs tests and local runs.

pub mod connection;
pub mod error;
pub mod memory;
pub mod migration;
pub mod pg;
pub mod repositories;
pub mod store;

pub use connection::DatabasePool;
pub use memory::MemoryStore;
pub use pg::PgStore;
pub use store::{BoostStore, LevelStore, Store, StoreHealth};
