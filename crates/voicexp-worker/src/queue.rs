//! In-memory write queue feeding the batch flusher.
//!
//! A batch taken by the flusher stays visible to [`WriteQueue::latest_for`]
//! until it is either confirmed or put back, so a read during a slow or
//! failing upsert never falls through to a stale store row.

use std::collections::VecDeque;

use tokio::sync::{Mutex, Notify};
use tracing;

use voicexp_entity::level::{LevelKey, XpWriteRequest};

#[derive(Debug, Default)]
struct Slots {
    /// Pending requests, oldest first
    queued: VecDeque<XpWriteRequest>,
    /// Batch handed to the flusher and not yet confirmed
    in_flight: Vec<XpWriteRequest>,
}

/// FIFO of pending level writes plus the signal that wakes the flusher.
#[derive(Debug, Default)]
pub struct WriteQueue {
    slots: Mutex<Slots>,
    /// Raised whenever new work is queued
    notify: Notify,
}

impl WriteQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a request and wake the flusher
    pub async fn push(&self, request: XpWriteRequest) {
        self.slots.lock().await.queued.push_back(request);
        self.notify.notify_one();
    }

    /// Remove up to `max` requests from the front and mark them in flight
    /// until [`complete_batch`](Self::complete_batch) or
    /// [`requeue_front`](Self::requeue_front).
    pub async fn take_batch(&self, max: usize) -> Vec<XpWriteRequest> {
        let mut slots = self.slots.lock().await;
        let count = max.min(slots.queued.len());
        let batch: Vec<XpWriteRequest> = slots.queued.drain(..count).collect();
        slots.in_flight.clone_from(&batch);
        batch
    }

    /// The in-flight batch reached the store
    pub async fn complete_batch(&self) {
        self.slots.lock().await.in_flight.clear();
    }

    /// Put a failed batch back in front of everything queued since, in its
    /// previous order, and wake the flusher
    pub async fn requeue_front(&self, batch: Vec<XpWriteRequest>) {
        let count = batch.len();
        {
            let mut slots = self.slots.lock().await;
            slots.in_flight.clear();
            for request in batch.into_iter().rev() {
                slots.queued.push_front(request);
            }
        }
        tracing::debug!("Requeued {} write requests at the front", count);
        self.notify.notify_one();
    }

    /// The most recent unconfirmed request for `key`, queued or in flight
    pub async fn latest_for(&self, key: LevelKey) -> Option<XpWriteRequest> {
        let slots = self.slots.lock().await;
        slots
            .queued
            .iter()
            .rev()
            .chain(slots.in_flight.iter().rev())
            .find(|r| r.key() == key)
            .cloned()
    }

    /// Number of queued requests, excluding the in-flight batch
    pub async fn len(&self) -> usize {
        self.slots.lock().await.queued.len()
    }

    /// Whether nothing is queued
    pub async fn is_empty(&self) -> bool {
        self.slots.lock().await.queued.is_empty()
    }

    /// Size of the batch currently being written
    pub async fn in_flight(&self) -> usize {
        self.slots.lock().await.in_flight.len()
    }

    /// Wait until new work is signalled
    pub async fn notified(&self) {
        self.notify.notified().await;
    }

    /// Wake the flusher without queueing anything
    pub fn wake(&self) {
        self.notify.notify_one();
    }
}
