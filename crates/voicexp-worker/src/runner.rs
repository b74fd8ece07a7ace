//! Batch flusher: a debounced loop that drains the write queue into the store.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time;
use tracing;

use voicexp_core::config::WriterConfig;
use voicexp_core::error::AppError;
use voicexp_database::Store;

use crate::queue::WriteQueue;

/// Error from flushing one batch. The batch is back in the queue when this
/// is returned.
#[derive(Debug, thiserror::Error)]
pub enum FlushError {
    /// The store rejected the batch
    #[error("Batch upsert of {size} writes failed: {source}")]
    Upsert {
        size: usize,
        #[source]
        source: AppError,
    },

    /// The store did not answer in time
    #[error("Batch upsert of {size} writes timed out after {timeout:?}")]
    TimedOut { size: usize, timeout: Duration },
}

/// Single background task that turns queued writes into batched upserts
#[derive(Debug)]
pub struct BatchFlusher {
    store: Arc<dyn Store>,
    queue: Arc<WriteQueue>,
    config: WriterConfig,
    /// Writes persisted since start
    flushed: AtomicU64,
}

impl BatchFlusher {
    pub fn new(store: Arc<dyn Store>, queue: Arc<WriteQueue>, config: WriterConfig) -> Self {
        Self {
            store,
            queue,
            config,
            flushed: AtomicU64::new(0),
        }
    }

    /// Writes persisted since start
    pub fn flushed(&self) -> u64 {
        self.flushed.load(Ordering::Relaxed)
    }

    /// Upsert up to `batch_size` queued writes. On failure the whole batch
    /// goes back to the front of the queue after `requeue_delay`; until then
    /// it stays readable as the in-flight batch.
    pub async fn flush_once(&self) -> Result<usize, FlushError> {
        let batch = self.queue.take_batch(self.config.batch_size).await;
        if batch.is_empty() {
            return Ok(0);
        }
        let size = batch.len();
        let timeout = self.config.store_timeout();

        let error = match time::timeout(timeout, self.store.upsert_levels(&batch)).await {
            Ok(Ok(())) => {
                self.queue.complete_batch().await;
                self.flushed.fetch_add(size as u64, Ordering::Relaxed);
                tracing::debug!("Flushed {} level writes", size);
                return Ok(size);
            }
            Ok(Err(source)) => FlushError::Upsert { size, source },
            Err(_) => FlushError::TimedOut { size, timeout },
        };

        time::sleep(self.config.requeue_delay()).await;
        self.queue.requeue_front(batch).await;
        Err(error)
    }

    /// Run until shutdown is signalled, then drain what is left.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(
            "Batch flusher started with batch_size={}, debounce={:?}",
            self.config.batch_size,
            self.config.debounce()
        );

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::info!("Batch flusher received shutdown signal");
                        break;
                    }
                }
                _ = self.queue.notified() => {}
                _ = time::sleep(self.config.debounce()) => {}
            }

            if let Err(e) = self.flush_once().await {
                tracing::error!("{}; batch requeued", e);
            }
        }

        self.drain().await;
        tracing::info!("Batch flusher shut down complete");
    }

    /// Flush until the queue is empty or the store fails.
    pub async fn drain(&self) {
        loop {
            match self.flush_once().await {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) => {
                    tracing::error!(
                        "Final drain stopped with {} writes unflushed: {}",
                        self.queue.len().await,
                        e
                    );
                    break;
                }
            }
        }
    }
}
