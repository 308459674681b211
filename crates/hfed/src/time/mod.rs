// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 hfed contributors

//! Fixed-point logical time for federation coordination.
//!
//! All logical time in hfed is a signed 64-bit count of a process-wide base
//! unit (microseconds by default). Arithmetic stays in integer base units;
//! floating-point seconds appear only at the reporting boundary and when
//! interfacing with external numeric code.
//!
//! # Saturation
//!
//! Values beyond the representable range saturate to [`LogicalTime::INFINITY`]
//! ("never"). Callers detect overflow by comparison, not by error returns.
//!
//! # Example
//!
//! ```
//! use hfed::time::{LogicalTime, Interval, TimeBase};
//!
//! let base = TimeBase::get();
//! let t = LogicalTime::from_seconds(base, 2.5);
//! let step = Interval::from_seconds(base, 1.0);
//! // Next LCTS boundary strictly above t.
//! assert_eq!(t.round_up_to(step).to_seconds(base), 3.0);
//! ```

use std::fmt;
use std::sync::OnceLock;

/// Base unit of the process-wide logical time representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseUnit {
    /// 1 second per tick.
    Seconds,
    /// 1 millisecond per tick.
    Milliseconds,
    /// 1 microsecond per tick (default).
    Microseconds,
    /// 1 nanosecond per tick.
    Nanoseconds,
}

impl BaseUnit {
    /// Number of ticks in one second for this unit.
    pub const fn ticks_per_second(self) -> i64 {
        match self {
            BaseUnit::Seconds => 1,
            BaseUnit::Milliseconds => 1_000,
            BaseUnit::Microseconds => 1_000_000,
            BaseUnit::Nanoseconds => 1_000_000_000,
        }
    }
}

static TIME_BASE: OnceLock<TimeBase> = OnceLock::new();

/// Process-wide immutable time base.
///
/// Multiple federates in one process share this base, so it can be set at
/// most once, before any federate is constructed. If nobody sets it, the
/// first reader pins it to microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeBase {
    unit: BaseUnit,
}

impl TimeBase {
    /// Install the process-wide base unit.
    ///
    /// Returns `false` if the base was already pinned (by a previous call or
    /// by a reader), in which case the existing base stays in effect.
    pub fn init(unit: BaseUnit) -> bool {
        TIME_BASE.set(TimeBase { unit }).is_ok()
    }

    /// The process-wide time base, pinning microseconds on first use.
    pub fn get() -> TimeBase {
        *TIME_BASE.get_or_init(|| TimeBase {
            unit: BaseUnit::Microseconds,
        })
    }

    /// The configured base unit.
    pub fn unit(self) -> BaseUnit {
        self.unit
    }

    /// Ticks per second for the configured unit.
    pub fn ticks_per_second(self) -> i64 {
        self.unit.ticks_per_second()
    }
}

/// A point on the federation's logical timeline, in base-unit ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct LogicalTime(i64);

/// A duration on the logical timeline, in base-unit ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Interval(i64);

/// Tolerance used for scenario-time equality checks that round-trip through
/// floating point. Only reporting comparisons use it; timeline arithmetic
/// stays in integer ticks.
pub const FLOAT_TOLERANCE_SECONDS: f64 = 1e-9;

impl LogicalTime {
    /// The distinguished "never / unbounded" value.
    pub const INFINITY: LogicalTime = LogicalTime(i64::MAX);
    /// Logical time zero (federation start).
    pub const ZERO: LogicalTime = LogicalTime(0);

    /// Construct from raw base-unit ticks.
    pub const fn from_ticks(ticks: i64) -> LogicalTime {
        LogicalTime(ticks)
    }

    /// Construct from floating-point seconds, truncating toward zero.
    /// Values beyond the representable range saturate to `INFINITY`.
    pub fn from_seconds(base: TimeBase, seconds: f64) -> LogicalTime {
        LogicalTime(seconds_to_ticks(base, seconds))
    }

    /// Raw tick count.
    pub const fn ticks(self) -> i64 {
        self.0
    }

    /// Floating-point seconds, for reporting only.
    pub fn to_seconds(self, base: TimeBase) -> f64 {
        self.0 as f64 / base.ticks_per_second() as f64
    }

    /// True if this value is the saturated "never" marker.
    pub const fn is_infinity(self) -> bool {
        self.0 == i64::MAX
    }

    /// Saturating add of an interval. Adding anything to `INFINITY` stays
    /// `INFINITY`.
    pub fn add(self, rhs: Interval) -> LogicalTime {
        if self.is_infinity() {
            return LogicalTime::INFINITY;
        }
        LogicalTime(self.0.saturating_add(rhs.0))
    }

    /// Saturating subtraction of an interval.
    pub fn sub(self, rhs: Interval) -> LogicalTime {
        if self.is_infinity() {
            return LogicalTime::INFINITY;
        }
        LogicalTime(self.0.saturating_sub(rhs.0))
    }

    /// Interval from `earlier` up to `self` (saturating).
    pub fn since(self, earlier: LogicalTime) -> Interval {
        Interval(self.0.saturating_sub(earlier.0))
    }

    /// Round up to the next multiple of `step` strictly above `self`:
    /// `((t / s) + 1) * s` with *floored* division, so the result stays the
    /// true round-up even for negative times (truncating division would
    /// overshoot them by one step). Used to pick a freeze or mode-change
    /// boundary every federate lands on. `step` must be positive; a
    /// non-positive step returns `self` unchanged.
    pub fn round_up_to(self, step: Interval) -> LogicalTime {
        if step.0 <= 0 || self.is_infinity() {
            return self;
        }
        let quotient = self.0.div_euclid(step.0);
        match quotient
            .checked_add(1)
            .and_then(|q| q.checked_mul(step.0))
        {
            Some(v) => LogicalTime(v),
            None => LogicalTime::INFINITY,
        }
    }

    /// Equality within [`FLOAT_TOLERANCE_SECONDS`] after conversion to
    /// seconds. Only for comparisons that crossed a float boundary.
    pub fn approx_eq_seconds(self, base: TimeBase, seconds: f64) -> bool {
        (self.to_seconds(base) - seconds).abs() < FLOAT_TOLERANCE_SECONDS
    }
}

impl Interval {
    /// Zero-length interval.
    pub const ZERO: Interval = Interval(0);
    /// Unbounded interval.
    pub const INFINITY: Interval = Interval(i64::MAX);

    /// Construct from raw base-unit ticks.
    pub const fn from_ticks(ticks: i64) -> Interval {
        Interval(ticks)
    }

    /// Construct from floating-point seconds, truncating toward zero.
    pub fn from_seconds(base: TimeBase, seconds: f64) -> Interval {
        Interval(seconds_to_ticks(base, seconds))
    }

    /// Raw tick count.
    pub const fn ticks(self) -> i64 {
        self.0
    }

    /// Floating-point seconds, for reporting only.
    pub fn to_seconds(self, base: TimeBase) -> f64 {
        self.0 as f64 / base.ticks_per_second() as f64
    }

    /// True if this value is the saturated "unbounded" marker.
    pub const fn is_infinity(self) -> bool {
        self.0 == i64::MAX
    }

    /// Saturating interval addition.
    pub fn add(self, rhs: Interval) -> Interval {
        Interval(self.0.saturating_add(rhs.0))
    }

    /// Saturating interval subtraction.
    pub fn sub(self, rhs: Interval) -> Interval {
        Interval(self.0.saturating_sub(rhs.0))
    }

    /// Saturating scalar multiply.
    pub fn scale(self, factor: i64) -> Interval {
        Interval(self.0.saturating_mul(factor))
    }

    /// Integer division by a scalar. Division by zero yields `INFINITY`.
    pub fn div(self, divisor: i64) -> Interval {
        if divisor == 0 {
            return Interval::INFINITY;
        }
        Interval(self.0 / divisor)
    }

    /// True if `self` is a whole-number multiple of `other`.
    pub fn is_multiple_of(self, other: Interval) -> bool {
        other.0 != 0 && self.0 % other.0 == 0
    }
}

fn seconds_to_ticks(base: TimeBase, seconds: f64) -> i64 {
    let scaled = seconds * base.ticks_per_second() as f64;
    if scaled >= i64::MAX as f64 {
        i64::MAX
    } else if scaled <= i64::MIN as f64 {
        i64::MIN
    } else {
        scaled.trunc() as i64
    }
}

impl fmt::Display for LogicalTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_infinity() {
            write!(f, "inf")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_infinity() {
            write!(f, "inf")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn micros() -> TimeBase {
        // Tests run with the default (microsecond) process base.
        TimeBase::get()
    }

    #[test]
    fn test_from_seconds_truncates_toward_zero() {
        let base = micros();
        assert_eq!(LogicalTime::from_seconds(base, 1.9999995).ticks(), 1_999_999);
        assert_eq!(LogicalTime::from_seconds(base, -1.9999995).ticks(), -1_999_999);
    }

    #[test]
    fn test_overflow_saturates_to_infinity() {
        let base = micros();
        let t = LogicalTime::from_seconds(base, 1e40);
        assert!(t.is_infinity());

        let near_max = LogicalTime::from_ticks(i64::MAX - 10);
        assert!(near_max.add(Interval::from_ticks(100)).is_infinity());
    }

    #[test]
    fn test_infinity_is_absorbing() {
        let inf = LogicalTime::INFINITY;
        assert!(inf.add(Interval::from_ticks(-5)).is_infinity());
        assert!(inf.sub(Interval::from_ticks(5)).is_infinity());
    }

    #[test]
    fn test_interval_addition_matches_seconds() {
        // Interval(a) + Interval(b) == Interval(a + b) whenever (a + b)
        // is representable.
        let base = micros();
        let cases = [(0.25, 0.5), (1.0, 2.0), (1234.5, 0.0625), (3.5, -1.25)];
        for (a, b) in cases {
            let lhs = Interval::from_seconds(base, a).add(Interval::from_seconds(base, b));
            let rhs = Interval::from_seconds(base, a + b);
            assert_eq!(lhs, rhs, "a={a} b={b}");
        }
    }

    #[test]
    fn test_round_up_to_boundary() {
        let step = Interval::from_ticks(1_000_000);
        assert_eq!(
            LogicalTime::from_ticks(0).round_up_to(step).ticks(),
            1_000_000
        );
        assert_eq!(
            LogicalTime::from_ticks(999_999).round_up_to(step).ticks(),
            1_000_000
        );
        // An exact boundary still moves to the *next* boundary.
        assert_eq!(
            LogicalTime::from_ticks(1_000_000).round_up_to(step).ticks(),
            2_000_000
        );
    }

    #[test]
    fn test_round_up_floors_negative_times() {
        // -3s with a 2s step: the next 2s multiple strictly above is -2s.
        // Truncating division would skip it and land on 0.
        let step = Interval::from_ticks(2_000_000);
        assert_eq!(
            LogicalTime::from_ticks(-3_000_000).round_up_to(step).ticks(),
            -2_000_000
        );
        assert_eq!(
            LogicalTime::from_ticks(-2_000_000).round_up_to(step).ticks(),
            0
        );
    }

    #[test]
    fn test_round_up_overflow_saturates() {
        let step = Interval::from_ticks(i64::MAX / 2);
        let t = LogicalTime::from_ticks(i64::MAX - 1);
        assert!(t.round_up_to(step).is_infinity());
    }

    #[test]
    fn test_approx_eq_seconds() {
        let base = micros();
        let t = LogicalTime::from_seconds(base, 6.0);
        assert!(t.approx_eq_seconds(base, 6.0));
        assert!(t.approx_eq_seconds(base, 6.0 + 1e-12));
        assert!(!t.approx_eq_seconds(base, 6.1));
    }

    #[test]
    fn test_is_multiple_of() {
        let lcts = Interval::from_ticks(1_000_000);
        assert!(Interval::from_ticks(4_000_000).is_multiple_of(lcts));
        assert!(!Interval::from_ticks(4_000_001).is_multiple_of(lcts));
        assert!(!lcts.is_multiple_of(Interval::ZERO));
    }
}
