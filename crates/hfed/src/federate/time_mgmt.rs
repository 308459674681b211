// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 hfed contributors

//! HLA time-advance bookkeeping: granted/requested time, the blocking wait
//! for grants, and regulation/constraint enablement.

use crate::config::{POLL_INTERVAL, WAIT_STATUS_PERIOD};
use crate::federate::RunFlags;
use crate::rti::RtiAmbassador;
use crate::time::{Interval, LogicalTime};
use crate::{debug, info, Result};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone, Copy)]
struct TimeStatus {
    granted: LogicalTime,
    requested: LogicalTime,
    advance_pending: bool,
    regulation_enabled: bool,
    constrained_enabled: bool,
}

/// One federate's view of HLA logical time.
///
/// The host thread issues advance requests and blocks for grants; the RTI
/// callback thread records grants and enablement confirmations. All state
/// lives behind one mutex; RTI calls are made with the mutex released.
pub struct TimeManager {
    status: Mutex<TimeStatus>,
    changed: Condvar,
    flags: Arc<RunFlags>,
    lookahead: Interval,
    /// Master switch; with time management off, advances are local only.
    enabled: bool,
}

impl TimeManager {
    pub fn new(flags: Arc<RunFlags>, lookahead: Interval, enabled: bool) -> TimeManager {
        TimeManager {
            status: Mutex::new(TimeStatus {
                granted: LogicalTime::ZERO,
                requested: LogicalTime::ZERO,
                advance_pending: false,
                regulation_enabled: false,
                constrained_enabled: false,
            }),
            changed: Condvar::new(),
            flags,
            lookahead,
            enabled,
        }
    }

    pub fn granted_time(&self) -> LogicalTime {
        self.status.lock().granted
    }

    pub fn requested_time(&self) -> LogicalTime {
        self.status.lock().requested
    }

    pub fn lookahead(&self) -> Interval {
        self.lookahead
    }

    pub fn is_regulating(&self) -> bool {
        self.status.lock().regulation_enabled
    }

    pub fn is_constrained(&self) -> bool {
        self.status.lock().constrained_enabled
    }

    /// Enable time regulation and block until the RTI confirms it.
    pub fn setup_time_regulation(&self, rti: &dyn RtiAmbassador) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        rti.enable_time_regulation(self.lookahead)?;
        self.wait_for(|s| s.regulation_enabled, "time regulation enablement")
    }

    /// Enable time constraint and block until the RTI confirms it.
    pub fn setup_time_constrained(&self, rti: &dyn RtiAmbassador) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        rti.enable_time_constrained()?;
        self.wait_for(|s| s.constrained_enabled, "time constraint enablement")
    }

    /// Request an advance to `target` and block until granted. A target at
    /// or behind granted time returns immediately.
    pub fn advance_to(&self, rti: &dyn RtiAmbassador, target: LogicalTime) -> Result<LogicalTime> {
        {
            let mut status = self.status.lock();
            if target <= status.granted {
                return Ok(status.granted);
            }
            if !self.enabled {
                // No federation-wide constraint to honor; advance locally.
                status.granted = target;
                status.requested = target;
                self.changed.notify_all();
                return Ok(target);
            }
            status.requested = target;
            status.advance_pending = true;
        }
        // Issued with the mutex released: the grant may arrive synchronously
        // on this very thread.
        rti.time_advance_request(target)?;
        self.wait_for(|s| !s.advance_pending, "time advance grant")?;
        Ok(self.granted_time())
    }

    /// Advance one frame: granted + lookahead.
    pub fn advance_frame(&self, rti: &dyn RtiAmbassador) -> Result<LogicalTime> {
        let target = self.granted_time().add(self.lookahead);
        self.advance_to(rti, target)
    }

    /// Advance to the least-common-time-step boundary at or above GALT
    /// (late join and post-restore realignment).
    pub fn advance_to_galt_boundary(
        &self,
        rti: &dyn RtiAmbassador,
        lcts: Interval,
    ) -> Result<LogicalTime> {
        let target = match rti.query_galt()? {
            Some(galt) => lcts_boundary_at_or_above(galt, lcts),
            // No regulating peer constrains us; step one frame.
            None => self.granted_time().add(self.lookahead),
        };
        debug!("advancing to GALT-aligned boundary {}", target);
        self.advance_to(rti, target)
    }

    // =====================================================================
    // RTI callbacks
    // =====================================================================

    pub fn on_time_regulation_enabled(&self, time: LogicalTime) {
        let mut status = self.status.lock();
        status.regulation_enabled = true;
        // The RTI may start a joiner at the federation's current LBTS.
        status.granted = status.granted.max(time);
        self.changed.notify_all();
    }

    pub fn on_time_constrained_enabled(&self, time: LogicalTime) {
        let mut status = self.status.lock();
        status.constrained_enabled = true;
        status.granted = status.granted.max(time);
        self.changed.notify_all();
    }

    pub fn on_time_advance_grant(&self, time: LogicalTime) {
        let mut status = self.status.lock();
        status.granted = time;
        status.advance_pending = false;
        self.changed.notify_all();
    }

    fn wait_for(&self, done: impl Fn(&TimeStatus) -> bool, what: &str) -> Result<()> {
        let mut status = self.status.lock();
        let mut last_status = Instant::now();
        loop {
            if done(&status) {
                return Ok(());
            }
            self.changed.wait_for(&mut status, POLL_INTERVAL);
            self.flags.check_wait_abort()?;
            if last_status.elapsed() >= WAIT_STATUS_PERIOD {
                info!(
                    "waiting for {} (granted {}, requested {})",
                    what, status.granted, status.requested
                );
                last_status = Instant::now();
            }
        }
    }
}

/// Smallest multiple of `lcts` at or above `time`.
pub fn lcts_boundary_at_or_above(time: LogicalTime, lcts: Interval) -> LogicalTime {
    if lcts <= Interval::ZERO || time.is_infinity() {
        return time;
    }
    if time.ticks() % lcts.ticks() == 0 {
        time
    } else {
        time.round_up_to(lcts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rti::{
        AttributeHandle, AttributeValueMap, FederateAmbassador, FederateHandle,
        InteractionClassHandle, ObjectClassHandle, ObjectInstanceHandle, ParameterHandle,
        ParameterValueMap, ResignAction, RtiResult,
    };
    use std::thread;
    use std::time::Duration;

    /// RtiAmbassador stub; optionally panics if an advance request reaches
    /// the RTI.
    struct StubRti {
        panic_on_advance: bool,
    }

    impl crate::rti::RtiAmbassador for StubRti {
        fn connect(&self, _a: Arc<dyn FederateAmbassador>, _s: &str) -> RtiResult<()> {
            Ok(())
        }
        fn disconnect(&self) -> RtiResult<()> {
            Ok(())
        }
        fn create_federation_execution(
            &self,
            _n: &str,
            _f: &[String],
            _m: Option<&str>,
        ) -> RtiResult<()> {
            Ok(())
        }
        fn destroy_federation_execution(&self, _n: &str) -> RtiResult<()> {
            Ok(())
        }
        fn join_federation_execution(
            &self,
            _fn_: &str,
            _ft: &str,
            _f: &str,
        ) -> RtiResult<FederateHandle> {
            Ok(1)
        }
        fn resign_federation_execution(&self, _a: ResignAction) -> RtiResult<()> {
            Ok(())
        }
        fn enable_asynchronous_delivery(&self) -> RtiResult<()> {
            Ok(())
        }
        fn object_class_handle(&self, _n: &str) -> RtiResult<ObjectClassHandle> {
            Ok(0)
        }
        fn attribute_handle(&self, _c: ObjectClassHandle, _n: &str) -> RtiResult<AttributeHandle> {
            Ok(0)
        }
        fn interaction_class_handle(&self, _n: &str) -> RtiResult<InteractionClassHandle> {
            Ok(0)
        }
        fn parameter_handle(
            &self,
            _c: InteractionClassHandle,
            _n: &str,
        ) -> RtiResult<ParameterHandle> {
            Ok(0)
        }
        fn publish_object_class_attributes(
            &self,
            _c: ObjectClassHandle,
            _a: &[AttributeHandle],
        ) -> RtiResult<()> {
            Ok(())
        }
        fn subscribe_object_class_attributes(
            &self,
            _c: ObjectClassHandle,
            _a: &[AttributeHandle],
        ) -> RtiResult<()> {
            Ok(())
        }
        fn unsubscribe_object_class(&self, _c: ObjectClassHandle) -> RtiResult<()> {
            Ok(())
        }
        fn register_object_instance(
            &self,
            _c: ObjectClassHandle,
            _n: &str,
        ) -> RtiResult<ObjectInstanceHandle> {
            Ok(0)
        }
        fn update_attribute_values(
            &self,
            _i: ObjectInstanceHandle,
            _a: &AttributeValueMap,
            _t: &[u8],
            _time: Option<LogicalTime>,
        ) -> RtiResult<()> {
            Ok(())
        }
        fn request_attribute_value_update(
            &self,
            _i: ObjectInstanceHandle,
            _a: &[AttributeHandle],
        ) -> RtiResult<()> {
            Ok(())
        }
        fn publish_interaction_class(&self, _c: InteractionClassHandle) -> RtiResult<()> {
            Ok(())
        }
        fn subscribe_interaction_class(&self, _c: InteractionClassHandle) -> RtiResult<()> {
            Ok(())
        }
        fn send_interaction(
            &self,
            _c: InteractionClassHandle,
            _p: &ParameterValueMap,
            _t: &[u8],
            _time: Option<LogicalTime>,
        ) -> RtiResult<()> {
            Ok(())
        }
        fn enable_time_regulation(&self, _l: Interval) -> RtiResult<()> {
            Ok(())
        }
        fn enable_time_constrained(&self) -> RtiResult<()> {
            Ok(())
        }
        fn disable_time_regulation(&self) -> RtiResult<()> {
            Ok(())
        }
        fn disable_time_constrained(&self) -> RtiResult<()> {
            Ok(())
        }
        fn time_advance_request(&self, _t: LogicalTime) -> RtiResult<()> {
            assert!(
                !self.panic_on_advance,
                "time advance must not reach the RTI"
            );
            Ok(())
        }
        fn query_galt(&self) -> RtiResult<Option<LogicalTime>> {
            Ok(None)
        }
        fn register_federation_synchronization_point(
            &self,
            _l: &str,
            _t: &[u8],
            _f: Option<&[FederateHandle]>,
        ) -> RtiResult<()> {
            Ok(())
        }
        fn synchronization_point_achieved(&self, _l: &str) -> RtiResult<()> {
            Ok(())
        }
        fn request_federation_save(&self, _l: &str) -> RtiResult<()> {
            Ok(())
        }
        fn federate_save_begun(&self) -> RtiResult<()> {
            Ok(())
        }
        fn federate_save_complete(&self, _s: bool) -> RtiResult<()> {
            Ok(())
        }
        fn request_federation_restore(&self, _l: &str) -> RtiResult<()> {
            Ok(())
        }
        fn federate_restore_complete(&self, _s: bool) -> RtiResult<()> {
            Ok(())
        }
        fn attribute_ownership_acquisition(
            &self,
            _i: ObjectInstanceHandle,
            _a: &[AttributeHandle],
            _t: &[u8],
        ) -> RtiResult<()> {
            Ok(())
        }
        fn unconditional_attribute_ownership_divestiture(
            &self,
            _i: ObjectInstanceHandle,
            _a: &[AttributeHandle],
        ) -> RtiResult<()> {
            Ok(())
        }
    }

    fn seconds(s: i64) -> LogicalTime {
        LogicalTime::from_ticks(s * 1_000_000)
    }

    fn joined_flags() -> Arc<RunFlags> {
        let flags = Arc::new(RunFlags::new());
        flags.set_joined(true);
        flags
    }

    #[test]
    fn test_boundary_at_or_above() {
        let lcts = Interval::from_ticks(1_000_000);
        assert_eq!(lcts_boundary_at_or_above(seconds(6), lcts), seconds(6));
        assert_eq!(
            lcts_boundary_at_or_above(LogicalTime::from_ticks(6_000_001), lcts),
            seconds(7)
        );
        assert_eq!(
            lcts_boundary_at_or_above(LogicalTime::ZERO, lcts),
            LogicalTime::ZERO
        );
    }

    #[test]
    fn test_unmanaged_advance_is_local() {
        let time = TimeManager::new(joined_flags(), Interval::from_ticks(1_000_000), false);
        let rti = StubRti {
            panic_on_advance: true,
        };
        let granted = time.advance_to(&rti, seconds(5)).unwrap();
        assert_eq!(granted, seconds(5));
        // Regressing target is a no-op.
        assert_eq!(time.advance_to(&rti, seconds(3)).unwrap(), seconds(5));
    }

    #[test]
    fn test_grant_wakes_waiter() {
        let time = Arc::new(TimeManager::new(
            joined_flags(),
            Interval::from_ticks(1_000_000),
            true,
        ));
        let time2 = time.clone();
        let granter = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            time2.on_time_advance_grant(seconds(1));
        });

        let rti = StubRti {
            panic_on_advance: false,
        };
        let granted = time.advance_to(&rti, seconds(1)).unwrap();
        assert_eq!(granted, seconds(1));
        granter.join().unwrap();
    }

    #[test]
    fn test_regulation_enablement_lifts_granted() {
        let time = TimeManager::new(joined_flags(), Interval::from_ticks(1_000_000), true);
        time.on_time_regulation_enabled(seconds(6));
        assert!(time.is_regulating());
        assert_eq!(time.granted_time(), seconds(6));
        // A confirmation behind current granted time never regresses it.
        time.on_time_constrained_enabled(seconds(2));
        assert_eq!(time.granted_time(), seconds(6));
    }

    #[test]
    fn test_advance_wait_aborts_on_shutdown() {
        let flags = joined_flags();
        let time = Arc::new(TimeManager::new(
            flags.clone(),
            Interval::from_ticks(1_000_000),
            true,
        ));
        let flags2 = flags.clone();
        let aborter = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            flags2.request_shutdown();
        });

        let rti = StubRti {
            panic_on_advance: false,
        };
        assert!(matches!(
            time.advance_to(&rti, seconds(1)),
            Err(crate::Error::ShutdownRequested)
        ));
        aborter.join().unwrap();
    }
}
