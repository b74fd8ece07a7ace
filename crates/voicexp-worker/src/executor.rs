//! Operation executor that replays pending operations through named handlers.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing;

use voicexp_core::error::AppError;
use voicexp_core::result::AppResult;

use crate::pending::PendingOperation;
use crate::retry::RetryExecutor;

/// Trait for ad hoc store operations that can be deferred and replayed
#[async_trait]
pub trait OperationHandler: Send + Sync + std::fmt::Debug {
    /// Name under which deferred calls are recorded
    fn name(&self) -> &str;

    /// Run the operation with the recorded arguments
    async fn execute(&self, args: &Value) -> AppResult<()>;
}

/// Error from decoding handler arguments
#[derive(Debug, thiserror::Error)]
pub enum OperationError {
    /// No handler registered under the name
    #[error("No handler registered for operation '{0}'")]
    UnknownOperation(String),

    /// Arguments did not match what the handler expects
    #[error("Invalid arguments for '{name}': {source}")]
    InvalidArgs {
        name: String,
        #[source]
        source: serde_json::Error,
    },
}

impl From<OperationError> for AppError {
    fn from(err: OperationError) -> Self {
        AppError::validation(err.to_string())
    }
}

/// Decode handler arguments into a typed value
pub fn decode_args<T: serde::de::DeserializeOwned>(name: &str, args: &Value) -> AppResult<T> {
    serde_json::from_value(args.clone()).map_err(|source| {
        OperationError::InvalidArgs {
            name: name.to_string(),
            source,
        }
        .into()
    })
}

/// Outcome counts of one replay sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayReport {
    pub completed: usize,
    pub kept: usize,
    pub dropped: usize,
}

/// Dispatches pending operations to the handler registered for their name
#[derive(Debug)]
pub struct OperationExecutor {
    /// Registered handlers by name
    handlers: HashMap<String, Arc<dyn OperationHandler>>,
    /// Retry wrapper shared with the rest of the writer
    retry: Arc<RetryExecutor>,
}

impl OperationExecutor {
    /// Create an executor with no handlers
    pub fn new(retry: Arc<RetryExecutor>) -> Self {
        Self {
            handlers: HashMap::new(),
            retry,
        }
    }

    /// Register a handler
    pub fn register(&mut self, handler: Arc<dyn OperationHandler>) {
        let name = handler.name().to_string();
        tracing::info!("Registered operation handler '{}'", name);
        self.handlers.insert(name, handler);
    }

    /// Check if a handler is registered for a name
    pub fn has_handler(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Number of operations waiting for replay
    pub async fn pending_len(&self) -> usize {
        self.retry.pending().len().await
    }

    /// Run one pending operation through the retry wrapper
    pub async fn execute(&self, operation: &PendingOperation) -> AppResult<()> {
        let handler = self
            .handlers
            .get(&operation.operation_name)
            .ok_or_else(|| OperationError::UnknownOperation(operation.operation_name.clone()))?;

        tracing::info!(
            "Replaying operation '{}' (replay {}/{})",
            operation.operation_name,
            operation.retry_count + 1,
            self.retry.policy().max_retries
        );

        self.retry
            .attempt(&operation.operation_name, || handler.execute(&operation.args))
            .await
    }

    /// Drain the pending list and replay every operation. Failures keep
    /// their place with an incremented retry count until the budget runs
    /// out, then they are dropped.
    pub async fn replay_pending(&self) -> ReplayReport {
        let pending = self.retry.pending();
        let operations = pending.drain().await;
        let mut report = ReplayReport::default();
        if operations.is_empty() {
            return report;
        }

        let mut kept = Vec::new();
        for mut operation in operations {
            match self.execute(&operation).await {
                Ok(()) => {
                    report.completed += 1;
                    tracing::info!(
                        "Successfully processed pending '{}' operation",
                        operation.operation_name
                    );
                }
                Err(e) => {
                    operation.retry_count += 1;
                    if operation.retry_count >= self.retry.policy().max_retries
                        || !self.has_handler(&operation.operation_name)
                    {
                        report.dropped += 1;
                        tracing::error!(
                            "Operation '{}' failed after {} replays, dropping: {}",
                            operation.operation_name,
                            operation.retry_count,
                            e
                        );
                    } else {
                        report.kept += 1;
                        tracing::warn!(
                            "Pending operation '{}' failed again: {}",
                            operation.operation_name,
                            e
                        );
                        kept.push(operation);
                    }
                }
            }
        }

        pending.restore(kept).await;
        tracing::info!(
            "Pending replay finished: completed={}, kept={}, dropped={}",
            report.completed,
            report.kept,
            report.dropped
        );
        report
    }
}
