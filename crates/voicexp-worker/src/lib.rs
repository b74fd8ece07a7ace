//! Durable reward writer for VoiceXP.
//!
//! This crate provides:
//! - A write-through level cache in front of an in-memory write queue
//! - A debounced batch flusher that never drops a failed batch
//! - A retry wrapper with exponential backoff that defers what it cannot
//!   complete as pending operations
//! - An operation executor that replays pending operations by name
//! - A health monitor that pings the store, rebuilds the pool, and replays
//!   pending operations on recovery

pub mod executor;
pub mod health;
pub mod jobs;
pub mod pending;
pub mod progression;
pub mod queue;
pub mod retry;
pub mod runner;
pub mod writer;

pub use executor::{OperationExecutor, OperationHandler};
pub use health::{HealthMonitor, HealthStats};
pub use pending::{PendingOperation, PendingOperations};
pub use queue::WriteQueue;
pub use retry::{OperationOutcome, RetryExecutor, RetryPolicy};
pub use runner::BatchFlusher;
pub use writer::RewardWriter;
