//! Last speaking time per participant.

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use voicexp_core::types::id::UserId;

/// Tracks when each participant last spoke.
#[derive(Debug)]
pub struct ActivityTracker {
    /// User ID → last speaking time
    last_spoke: DashMap<UserId, DateTime<Utc>>,
}

impl ActivityTracker {
    /// Create a new activity tracker
    pub fn new() -> Self {
        Self {
            last_spoke: DashMap::new(),
        }
    }

    /// Record speaking activity at `at`
    pub fn record(&self, user_id: UserId, at: DateTime<Utc>) {
        self.last_spoke.insert(user_id, at);
    }

    /// Get the last speaking time of a participant
    pub fn get(&self, user_id: UserId) -> Option<DateTime<Utc>> {
        self.last_spoke.get(&user_id).map(|r| *r.value())
    }

    /// Remove a participant (on leave)
    pub fn remove(&self, user_id: UserId) {
        self.last_spoke.remove(&user_id);
    }

    /// Participants that have not spoken since `cutoff`
    pub fn silent_since(&self, cutoff: DateTime<Utc>) -> Vec<UserId> {
        self.last_spoke
            .iter()
            .filter(|r| *r.value() < cutoff)
            .map(|r| *r.key())
            .collect()
    }

    /// Number of tracked participants
    pub fn len(&self) -> usize {
        self.last_spoke.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_spoke.is_empty()
    }
}

impl Default for ActivityTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_silent_since() {
        let tracker = ActivityTracker::new();
        let now = Utc::now();
        tracker.record(UserId::new(1), now - Duration::seconds(400));
        tracker.record(UserId::new(2), now - Duration::seconds(10));
        let silent = tracker.silent_since(now - Duration::seconds(300));
        assert_eq!(silent, vec![UserId::new(1)]);

        tracker.remove(UserId::new(1));
        assert_eq!(tracker.get(UserId::new(1)), None);
        assert_eq!(tracker.len(), 1);
    }
}
