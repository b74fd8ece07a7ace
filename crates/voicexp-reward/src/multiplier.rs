//! Interval partition over boost events.
//!
//! A time range starts as one slice with multiplier 1.0. Every boost event
//! splits the slices it partially overlaps into at most three pieces and
//! raises the multiplier of the covered piece to the event's multiplier if
//! that is larger. Overlapping events therefore compose by `max`.

use chrono::{DateTime, Utc};
use tracing::warn;

use voicexp_core::config::TruncationPolicy;
use voicexp_entity::boost::BoostEvent;

/// A sub-range of the rewarded interval with its effective multiplier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Slice {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub multiplier: f64,
}

impl Slice {
    fn millis(&self) -> i64 {
        (self.end - self.start).num_milliseconds()
    }
}

/// Split `[start, end)` at boost event boundaries.
pub fn partition(start: DateTime<Utc>, end: DateTime<Utc>, events: &[BoostEvent]) -> Vec<Slice> {
    let mut slices = vec![Slice {
        start,
        end,
        multiplier: 1.0,
    }];

    for event in events {
        if !event.active {
            continue;
        }
        if !event.multiplier.is_finite() || event.multiplier <= 0.0 {
            warn!(event_id = %event.id, multiplier = event.multiplier, "Ignoring boost event with invalid multiplier");
            continue;
        }

        let mut next = Vec::with_capacity(slices.len() + 2);
        for slice in slices {
            if event.end_time <= slice.start || event.start_time >= slice.end {
                next.push(slice);
                continue;
            }
            let overlap_start = event.start_time.max(slice.start);
            let overlap_end = event.end_time.min(slice.end);
            if overlap_start > slice.start {
                next.push(Slice {
                    end: overlap_start,
                    ..slice
                });
            }
            next.push(Slice {
                start: overlap_start,
                end: overlap_end,
                multiplier: slice.multiplier.max(event.multiplier),
            });
            if overlap_end < slice.end {
                next.push(Slice {
                    start: overlap_end,
                    ..slice
                });
            }
        }
        slices = next;
    }

    slices
}

/// Multiplier-adjusted reward of `base` earned evenly over `[start, end)`.
///
/// An empty or inverted range yields the unmultiplied base.
pub fn compute_reward(
    base: f64,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    events: &[BoostEvent],
    policy: TruncationPolicy,
) -> i64 {
    let total = (end - start).num_milliseconds();
    if total <= 0 {
        if total < 0 {
            warn!(%start, %end, "Inverted reward interval, using unmultiplied base");
        }
        return truncate(base);
    }

    let shares = partition(start, end, events)
        .into_iter()
        .map(|slice| base * slice.millis() as f64 * slice.multiplier / total as f64);

    match policy {
        TruncationPolicy::PostSum => truncate(shares.sum()),
        TruncationPolicy::PerSlice => shares.map(truncate).sum(),
    }
}

/// Floor to an integer, absorbing floating point error just below a whole
/// number.
fn truncate(value: f64) -> i64 {
    (value + 1e-9).floor() as i64
}
