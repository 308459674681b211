// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 hfed contributors

//! The three timelines a federate reads.
//!
//! - scenario time: epoch + HLA logical time, the timeline freeze points and
//!   mode transitions are expressed on,
//! - simulation time: wall-clock seconds since this federate started running,
//! - CTE time: an external central-time-equipment clock, when hardware
//!   provides one.

use crate::federate::TimeManager;
use crate::time::TimeBase;
use std::sync::Arc;
use std::time::Instant;

/// A monotonic clock read in seconds.
pub trait Timeline: Send + Sync {
    fn now(&self) -> f64;
}

/// Scenario time: the federation-wide epoch plus granted logical time.
pub struct ScenarioTimeline {
    epoch_seconds: f64,
    time: Arc<TimeManager>,
}

impl ScenarioTimeline {
    pub fn new(epoch_seconds: f64, time: Arc<TimeManager>) -> ScenarioTimeline {
        ScenarioTimeline {
            epoch_seconds,
            time,
        }
    }

    pub fn epoch_seconds(&self) -> f64 {
        self.epoch_seconds
    }
}

impl Timeline for ScenarioTimeline {
    fn now(&self) -> f64 {
        self.epoch_seconds + self.time.granted_time().to_seconds(TimeBase::get())
    }
}

/// Simulation time: wall-clock seconds since construction.
pub struct SimulationTimeline {
    start: Instant,
}

impl SimulationTimeline {
    pub fn new() -> SimulationTimeline {
        SimulationTimeline {
            start: Instant::now(),
        }
    }
}

impl Default for SimulationTimeline {
    fn default() -> Self {
        SimulationTimeline::new()
    }
}

impl Timeline for SimulationTimeline {
    fn now(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simulation_timeline_is_monotonic() {
        let timeline = SimulationTimeline::new();
        let a = timeline.now();
        let b = timeline.now();
        assert!(b >= a);
        assert!(a >= 0.0);
    }
}
