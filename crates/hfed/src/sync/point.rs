// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 hfed contributors

//! A single named barrier and its state machine.

use crate::time::LogicalTime;
use crate::warn;

/// Lifecycle state of a synchronization point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SyncPointState {
    /// Never referenced. Points leave this state at construction.
    Unknown = 0,
    /// Known locally; not yet registered or announced.
    Exists = 1,
    /// Local registration requested (or confirmed) with the RTI.
    Registered = 2,
    /// The RTI announced the point to the federation.
    Announced = 3,
    /// This federate reported the point achieved.
    Achieved = 4,
    /// Every addressed federate achieved the point.
    Synchronized = 5,
    /// Registration failed for a non-recoverable reason.
    Error = 6,
}

/// A named barrier with an optional schedule time (used by time-stamped
/// variants that plan federation-wide freezes).
#[derive(Debug, Clone)]
pub struct SyncPoint {
    label: String,
    state: SyncPointState,
    time: Option<LogicalTime>,
}

impl SyncPoint {
    /// Create a point in `Exists`.
    pub fn new(label: &str, time: Option<LogicalTime>) -> SyncPoint {
        SyncPoint {
            label: label.to_string(),
            state: SyncPointState::Exists,
            time,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn state(&self) -> SyncPointState {
        self.state
    }

    pub fn time(&self) -> Option<LogicalTime> {
        self.time
    }

    /// Force a state (checkpoint restore only).
    pub(crate) fn set_state(&mut self, state: SyncPointState) {
        self.state = state;
    }

    /// Local registration requested. Idempotent: a confirmation callback
    /// after the local request keeps the point in `Registered`.
    pub fn mark_registered(&mut self) -> bool {
        match self.state {
            SyncPointState::Exists | SyncPointState::Registered => {
                self.state = SyncPointState::Registered;
                true
            }
            _ => self.rejected("register"),
        }
    }

    /// The RTI announced this point. Valid whether or not we registered it.
    pub fn mark_announced(&mut self) -> bool {
        match self.state {
            SyncPointState::Exists | SyncPointState::Registered => {
                self.state = SyncPointState::Announced;
                true
            }
            // A duplicate announce (multiple registrants racing) is harmless.
            SyncPointState::Announced => true,
            _ => self.rejected("announce"),
        }
    }

    /// Report the point achieved. Idempotent once achieved: the second call
    /// is a no-op and the state stays in {Achieved, Synchronized}.
    pub fn mark_achieved(&mut self) -> bool {
        match self.state {
            SyncPointState::Announced => {
                self.state = SyncPointState::Achieved;
                true
            }
            SyncPointState::Achieved | SyncPointState::Synchronized => true,
            _ => self.rejected("achieve"),
        }
    }

    /// The federation synchronized on this point.
    pub fn mark_synchronized(&mut self) -> bool {
        match self.state {
            SyncPointState::Achieved => {
                self.state = SyncPointState::Synchronized;
                true
            }
            _ => self.rejected("synchronize"),
        }
    }

    /// Consume the barrier, making the point recyclable.
    pub fn reset(&mut self) -> bool {
        match self.state {
            SyncPointState::Synchronized => {
                self.state = SyncPointState::Exists;
                true
            }
            _ => self.rejected("reset"),
        }
    }

    /// Registration failed for a reason other than label reuse.
    pub fn mark_error(&mut self) {
        self.state = SyncPointState::Error;
    }

    fn rejected(&self, transition: &str) -> bool {
        debug_assert!(
            false,
            "sync-point '{}': rejected transition '{}' from {:?}",
            self.label, transition, self.state
        );
        warn!(
            "sync-point '{}': rejected transition '{}' from {:?}",
            self.label, transition, self.state
        );
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn advance_to_synchronized(point: &mut SyncPoint) {
        assert!(point.mark_registered());
        assert!(point.mark_announced());
        assert!(point.mark_achieved());
        assert!(point.mark_synchronized());
    }

    #[test]
    fn test_full_lifecycle_and_recycle() {
        let mut point = SyncPoint::new("phase_1", None);
        assert_eq!(point.state(), SyncPointState::Exists);
        advance_to_synchronized(&mut point);
        assert!(point.reset());
        assert_eq!(point.state(), SyncPointState::Exists);
        // The recycled point can run the barrier again.
        advance_to_synchronized(&mut point);
    }

    #[test]
    fn test_announce_without_local_registration() {
        // Another federate registered first; the announce arrives while we
        // are still in Exists.
        let mut point = SyncPoint::new("peer_point", None);
        assert!(point.mark_announced());
        assert_eq!(point.state(), SyncPointState::Announced);
    }

    #[test]
    fn test_achieve_is_idempotent() {
        let mut point = SyncPoint::new("phase_1", None);
        point.mark_announced();
        assert!(point.mark_achieved());
        assert!(point.mark_achieved());
        assert_eq!(point.state(), SyncPointState::Achieved);
        point.mark_synchronized();
        assert!(point.mark_achieved());
        assert_eq!(point.state(), SyncPointState::Synchronized);
    }

    #[test]
    #[cfg_attr(debug_assertions, should_panic(expected = "rejected transition"))]
    fn test_rejected_transition_is_fatal_in_debug() {
        let mut point = SyncPoint::new("phase_1", None);
        // Achieving before announce is outside the graph.
        let changed = point.mark_achieved();
        // Release builds ignore the transition.
        assert!(!changed);
        assert_eq!(point.state(), SyncPointState::Exists);
    }

    #[test]
    fn test_duplicate_registration_confirmation() {
        let mut point = SyncPoint::new("phase_1", None);
        assert!(point.mark_registered());
        // registration_succeeded callback after the local request.
        assert!(point.mark_registered());
        assert_eq!(point.state(), SyncPointState::Registered);
    }
}
