// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 hfed contributors

//! Coordinated freeze scheduling.
//!
//! Freeze boundaries are kept as an ordered set of HLA logical times. Any
//! federate may announce a freeze; every federate (including the announcer)
//! records the boundary locally and, at the end of each frame, enters FREEZE
//! once granted time reaches the earliest entry.

use crate::time::{Interval, LogicalTime};
use parking_lot::Mutex;
use std::collections::BTreeSet;

/// Ordered set of pending freeze boundaries on the HLA logical timeline.
#[derive(Default)]
pub struct FreezeSchedule {
    pending: Mutex<BTreeSet<LogicalTime>>,
}

impl FreezeSchedule {
    pub fn new() -> FreezeSchedule {
        FreezeSchedule::default()
    }

    /// Record a freeze boundary. Duplicates collapse.
    pub fn add(&self, time: LogicalTime) {
        self.pending.lock().insert(time);
    }

    /// Earliest pending boundary, if any.
    pub fn next(&self) -> Option<LogicalTime> {
        self.pending.lock().iter().next().copied()
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }

    /// If `now` has reached the earliest boundary, consume and return it.
    pub fn take_due(&self, now: LogicalTime) -> Option<LogicalTime> {
        let mut pending = self.pending.lock();
        let earliest = *pending.iter().next()?;
        if now >= earliest {
            pending.remove(&earliest);
            Some(earliest)
        } else {
            None
        }
    }

    pub fn clear(&self) {
        self.pending.lock().clear();
    }
}

/// Pick the freeze boundary for a request made at granted time `now`.
///
/// The freeze lands at `max(now + padding, now + lookahead)` rounded up to
/// the next least-common-time-step boundary, guaranteeing every federate
/// hears the announcement before it reaches the boundary.
pub fn freeze_boundary(
    now: LogicalTime,
    padding: Interval,
    lookahead: Interval,
    lcts: Interval,
) -> LogicalTime {
    let padded = now.add(padding).max(now.add(lookahead));
    padded.round_up_to(lcts)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seconds(s: i64) -> LogicalTime {
        LogicalTime::from_ticks(s * 1_000_000)
    }

    fn interval_seconds(s: i64) -> Interval {
        Interval::from_ticks(s * 1_000_000)
    }

    #[test]
    fn test_boundary_respects_padding_and_steps() {
        // now=3s, padding=2s, lookahead=1s, lcts=1s:
        // max(5, 4) = 5, rounded up to the next 1s boundary = 6.
        let t = freeze_boundary(
            seconds(3),
            interval_seconds(2),
            interval_seconds(1),
            interval_seconds(1),
        );
        assert_eq!(t, seconds(6));
    }

    #[test]
    fn test_boundary_uses_lookahead_when_larger() {
        // padding 1s below a 3s lookahead: lookahead wins.
        let t = freeze_boundary(
            seconds(2),
            interval_seconds(1),
            interval_seconds(3),
            interval_seconds(2),
        );
        // max(3, 5) = 5, next 2s boundary = 6.
        assert_eq!(t, seconds(6));
    }

    #[test]
    fn test_boundary_properties_hold_for_random_inputs() {
        let mut rng = fastrand::Rng::with_seed(0x1ced);
        for _ in 0..512 {
            let now = LogicalTime::from_ticks(rng.i64(0..30_000_000));
            let padding = Interval::from_ticks(rng.i64(0..5_000_000));
            let lookahead = Interval::from_ticks(rng.i64(0..5_000_000));
            let lcts = Interval::from_ticks(rng.i64(1..=8) * 250_000);
            let boundary = freeze_boundary(now, padding, lookahead, lcts);

            // Strictly past both horizons so the announcement always
            // arrives before any federate reaches the boundary.
            assert!(boundary > now.add(padding));
            assert!(boundary > now.add(lookahead));
            // On a common step boundary, and the earliest such one.
            assert_eq!(boundary.ticks() % lcts.ticks(), 0);
            let horizon = now.add(padding).max(now.add(lookahead));
            assert!(boundary.ticks() - horizon.ticks() <= lcts.ticks());
        }
    }

    #[test]
    fn test_schedule_orders_and_consumes() {
        let schedule = FreezeSchedule::new();
        schedule.add(seconds(9));
        schedule.add(seconds(6));
        schedule.add(seconds(6)); // duplicate collapses
        assert_eq!(schedule.len(), 2);
        assert_eq!(schedule.next(), Some(seconds(6)));

        assert_eq!(schedule.take_due(seconds(5)), None);
        assert_eq!(schedule.take_due(seconds(6)), Some(seconds(6)));
        assert_eq!(schedule.next(), Some(seconds(9)));
        assert_eq!(schedule.take_due(seconds(20)), Some(seconds(9)));
        assert!(schedule.is_empty());
    }
}
