//! Operations deferred by the retry wrapper.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;

/// An ad hoc store operation that could not be completed, kept for replay
/// after the store recovers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingOperation {
    /// Name of the registered handler that replays it
    pub operation_name: String,
    /// Handler arguments
    pub args: Value,
    /// Replays attempted so far
    pub retry_count: u32,
}

impl PendingOperation {
    pub fn new(operation_name: impl Into<String>, args: Value) -> Self {
        Self {
            operation_name: operation_name.into(),
            args,
            retry_count: 0,
        }
    }
}

/// Shared list of pending operations.
#[derive(Debug, Default)]
pub struct PendingOperations {
    items: Mutex<Vec<PendingOperation>>,
}

impl PendingOperations {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn push(&self, operation: PendingOperation) {
        self.items.lock().await.push(operation);
    }

    /// Take every pending operation, leaving the list empty
    pub async fn drain(&self) -> Vec<PendingOperation> {
        std::mem::take(&mut *self.items.lock().await)
    }

    /// Put operations back, ahead of any deferred while they were out
    pub async fn restore(&self, mut operations: Vec<PendingOperation>) {
        if operations.is_empty() {
            return;
        }
        let mut items = self.items.lock().await;
        operations.append(&mut items);
        *items = operations;
    }

    pub async fn len(&self) -> usize {
        self.items.lock().await.len()
    }

    pub async fn snapshot(&self) -> Vec<PendingOperation> {
        self.items.lock().await.clone()
    }
}
