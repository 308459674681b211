// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 hfed contributors

//! The execution configuration object (ExCO).
//!
//! One ExCO instance exists per federation, owned by the master. Every other
//! federate subscribes and mirrors the latest reflected values. Updates are
//! time-stamp-ordered after initialization, so late or re-ordered reflections
//! are detected by comparing the embedded next-mode scenario time and
//! dropped as stale.

use crate::encoding::{
    decode_f64, decode_i64, decode_string_list, decode_unicode_string, encode_f64,
    encode_i64, encode_string_list, encode_u16, encode_unicode_string, EncodeError, EncodeResult,
};
use crate::exec::mode::ExecutionMode;
use crate::exec::policy::ExecutionPolicy;
use crate::rti::{AttributeValueMap, FomHandles, ObjectInstanceHandle};
use crate::{debug, warn};
use arc_swap::ArcSwapOption;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

// Indices into FomHandles::exco_attributes / EXCO_ATTR_NAMES.
const IDX_OWNER_NAME: usize = 0;
const IDX_ROOT_FRAME_NAME: usize = 1;
const IDX_SCENARIO_TIME_EPOCH: usize = 2;
const IDX_NEXT_MODE_SCENARIO_TIME: usize = 3;
const IDX_NEXT_MODE_CTE_TIME: usize = 4;
const IDX_CURRENT_EXECUTION_MODE: usize = 5;
const IDX_NEXT_EXECUTION_MODE: usize = 6;
const IDX_LEAST_COMMON_TIME_STEP: usize = 7;
const IDX_RUN_DURATION: usize = 8;
const IDX_REQUIRED_FEDERATES: usize = 9;

/// Federation-wide execution configuration, authored by the master.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionConfiguration {
    /// Name of the master federate.
    pub owner_name: String,
    /// Name of the root reference frame (richer policies only).
    pub root_frame_name: String,
    /// Scenario epoch in seconds (richer policies only).
    pub scenario_time_epoch: f64,
    /// Scenario time of the next mode transition, seconds.
    pub next_mode_scenario_time: f64,
    /// CTE time of the next mode transition, seconds (CTE policies only).
    pub next_mode_cte_time: f64,
    pub current_execution_mode: ExecutionMode,
    pub next_execution_mode: ExecutionMode,
    /// Least common time step in base-unit ticks.
    pub least_common_time_step: i64,
    /// Run duration in seconds; 0 means unbounded.
    pub run_duration: f64,
    /// Names of the federates required at startup.
    pub required_federates: Vec<String>,
}

impl Default for ExecutionConfiguration {
    fn default() -> Self {
        ExecutionConfiguration {
            owner_name: String::new(),
            root_frame_name: String::new(),
            scenario_time_epoch: 0.0,
            next_mode_scenario_time: 0.0,
            next_mode_cte_time: 0.0,
            current_execution_mode: ExecutionMode::Uninitialized,
            next_execution_mode: ExecutionMode::Uninitialized,
            least_common_time_step: 0,
            run_duration: 0.0,
            required_federates: Vec::new(),
        }
    }
}

impl ExecutionConfiguration {
    /// Pack into an attribute-value map. The policy decides which of the
    /// optional fields cross the wire.
    pub fn pack(&self, handles: &FomHandles, policy: &ExecutionPolicy) -> AttributeValueMap {
        let attr = |idx: usize| handles.exco_attributes[idx];
        let mut out: AttributeValueMap = vec![
            (attr(IDX_OWNER_NAME), encode_unicode_string(&self.owner_name)),
            (
                attr(IDX_NEXT_MODE_SCENARIO_TIME),
                encode_f64(self.next_mode_scenario_time),
            ),
            (
                attr(IDX_CURRENT_EXECUTION_MODE),
                encode_u16(self.current_execution_mode.as_u16()),
            ),
            (
                attr(IDX_NEXT_EXECUTION_MODE),
                encode_u16(self.next_execution_mode.as_u16()),
            ),
            (
                attr(IDX_LEAST_COMMON_TIME_STEP),
                encode_i64(self.least_common_time_step),
            ),
            (attr(IDX_RUN_DURATION), encode_f64(self.run_duration)),
            (
                attr(IDX_REQUIRED_FEDERATES),
                encode_string_list(&self.required_federates),
            ),
        ];
        if policy.exco_carries_epoch {
            out.push((
                attr(IDX_ROOT_FRAME_NAME),
                encode_unicode_string(&self.root_frame_name),
            ));
            out.push((
                attr(IDX_SCENARIO_TIME_EPOCH),
                encode_f64(self.scenario_time_epoch),
            ));
        }
        if policy.exco_carries_cte {
            out.push((
                attr(IDX_NEXT_MODE_CTE_TIME),
                encode_f64(self.next_mode_cte_time),
            ));
        }
        out
    }

    /// Apply a reflected attribute-value map onto `self`. Fields absent from
    /// the map keep their current values; unrecognized handles are skipped.
    pub fn unpack(&mut self, attributes: &AttributeValueMap, handles: &FomHandles) -> EncodeResult<()> {
        for (handle, bytes) in attributes {
            let Some(idx) = handles.exco_attributes.iter().position(|h| h == handle) else {
                continue;
            };
            match idx {
                IDX_OWNER_NAME => self.owner_name = decode_unicode_string(bytes)?,
                IDX_ROOT_FRAME_NAME => self.root_frame_name = decode_unicode_string(bytes)?,
                IDX_SCENARIO_TIME_EPOCH => self.scenario_time_epoch = decode_f64(bytes)?,
                IDX_NEXT_MODE_SCENARIO_TIME => {
                    self.next_mode_scenario_time = decode_f64(bytes)?
                }
                IDX_NEXT_MODE_CTE_TIME => self.next_mode_cte_time = decode_f64(bytes)?,
                IDX_CURRENT_EXECUTION_MODE => {
                    self.current_execution_mode = ExecutionMode::decode(bytes)?
                }
                IDX_NEXT_EXECUTION_MODE => {
                    self.next_execution_mode = ExecutionMode::decode(bytes)?
                }
                IDX_LEAST_COMMON_TIME_STEP => self.least_common_time_step = decode_i64(bytes)?,
                IDX_RUN_DURATION => self.run_duration = decode_f64(bytes)?,
                IDX_REQUIRED_FEDERATES => {
                    self.required_federates = decode_string_list(bytes)?
                }
                _ => {
                    return Err(EncodeError::InvalidData {
                        reason: format!("unmapped ExCO attribute index {idx}"),
                    })
                }
            }
        }
        Ok(())
    }

    /// Decode a reflected map against u16 wire mode fields, validating both
    /// mode values up front so a torn update is rejected whole.
    pub fn from_reflection(
        attributes: &AttributeValueMap,
        handles: &FomHandles,
    ) -> EncodeResult<ExecutionConfiguration> {
        let mut exco = ExecutionConfiguration::default();
        exco.unpack(attributes, handles)?;
        Ok(exco)
    }
}

/// Subscriber-side mirror of the most recent ExCO reflection.
#[derive(Default)]
pub struct ExcoMirror {
    instance: Mutex<Option<ObjectInstanceHandle>>,
    latest: ArcSwapOption<ExecutionConfiguration>,
    updates_applied: AtomicU64,
    stale_dropped: AtomicU64,
}

impl ExcoMirror {
    pub fn new() -> ExcoMirror {
        ExcoMirror::default()
    }

    /// Record the discovered ExCO instance handle.
    pub fn bind_instance(&self, instance: ObjectInstanceHandle) {
        *self.instance.lock() = Some(instance);
    }

    pub fn instance(&self) -> Option<ObjectInstanceHandle> {
        *self.instance.lock()
    }

    /// True if `instance` is the bound ExCO instance.
    pub fn is_bound_to(&self, instance: ObjectInstanceHandle) -> bool {
        *self.instance.lock() == Some(instance)
    }

    /// Latest mirrored configuration, if any reflection arrived yet.
    pub fn latest(&self) -> Option<Arc<ExecutionConfiguration>> {
        self.latest.load_full()
    }

    /// Number of reflections applied (staleness drops excluded).
    pub fn updates_applied(&self) -> u64 {
        self.updates_applied.load(Ordering::Relaxed)
    }

    /// Number of reflections dropped as stale.
    pub fn stale_dropped(&self) -> u64 {
        self.stale_dropped.load(Ordering::Relaxed)
    }

    /// Replace the mirror with a locally authored configuration (master).
    pub fn publish_local(&self, exco: ExecutionConfiguration) {
        self.latest.store(Some(Arc::new(exco)));
        self.updates_applied.fetch_add(1, Ordering::Relaxed);
    }

    /// Apply a reflected update. Returns the new mirrored configuration, or
    /// `None` when the reflection was stale or undecodable.
    pub fn apply_reflection(
        &self,
        attributes: &AttributeValueMap,
        handles: &FomHandles,
    ) -> Option<Arc<ExecutionConfiguration>> {
        let current = self.latest.load_full();
        let mut next = current
            .as_deref()
            .cloned()
            .unwrap_or_default();
        if let Err(err) = next.unpack(attributes, handles) {
            warn!("dropping undecodable ExCO reflection: {}", err);
            return None;
        }
        if let Some(current) = &current {
            // TSO delivery makes regressions impossible in a healthy
            // federation; a regressed next-mode time marks a stale update.
            if next.next_mode_scenario_time < current.next_mode_scenario_time {
                debug!(
                    "dropping stale ExCO reflection (next mode at {} < {})",
                    next.next_mode_scenario_time, current.next_mode_scenario_time
                );
                self.stale_dropped.fetch_add(1, Ordering::Relaxed);
                return None;
            }
        }
        let next = Arc::new(next);
        self.latest.store(Some(next.clone()));
        self.updates_applied.fetch_add(1, Ordering::Relaxed);
        Some(next)
    }
}

/// Latest-wins mailbox for mode transition requests, consumed by the master
/// once per frame.
#[derive(Default)]
pub struct MtrBox {
    pending: Mutex<Option<ExecutionMode>>,
}

impl MtrBox {
    pub fn new() -> MtrBox {
        MtrBox::default()
    }

    /// Post a requested mode. A newer request supersedes an unconsumed one.
    pub fn post(&self, mode: ExecutionMode) {
        let mut pending = self.pending.lock();
        if let Some(previous) = pending.replace(mode) {
            if previous != mode {
                debug!("mode transition request {} superseded by {}", previous, mode);
            }
        }
    }

    /// Consume the pending request, if any.
    pub fn take(&self) -> Option<ExecutionMode> {
        self.pending.lock().take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::policy::PolicyKind;

    fn handles() -> FomHandles {
        FomHandles {
            exco_class: 1,
            exco_attributes: (10u32..20).collect(),
            mtr_class: 2,
            mtr_mode_parameter: 21,
            freeze_class: 3,
            freeze_time_parameter: 22,
            mom_federate_class: 4,
            mom_federate_handle_attr: 23,
            mom_federate_name_attr: 24,
            mom_federate_type_attr: 25,
        }
    }

    fn sample() -> ExecutionConfiguration {
        ExecutionConfiguration {
            owner_name: "fed_a".to_string(),
            root_frame_name: "RootFrame".to_string(),
            scenario_time_epoch: 1_000.5,
            next_mode_scenario_time: 6.0,
            next_mode_cte_time: 12.0,
            current_execution_mode: ExecutionMode::Running,
            next_execution_mode: ExecutionMode::Freeze,
            least_common_time_step: 1_000_000,
            run_duration: 60.0,
            required_federates: vec!["fed_a".to_string(), "fed_b".to_string()],
        }
    }

    #[test]
    fn test_pack_unpack_round_trip_full_policy() {
        let handles = handles();
        let policy = ExecutionPolicy::for_kind(PolicyKind::CentralMaster);
        let exco = sample();
        let packed = exco.pack(&handles, &policy);
        let decoded = ExecutionConfiguration::from_reflection(&packed, &handles).unwrap();
        assert_eq!(decoded, exco);
    }

    #[test]
    fn test_lean_policy_omits_optional_fields() {
        let handles = handles();
        let policy = ExecutionPolicy::for_kind(PolicyKind::Basic);
        let packed = sample().pack(&handles, &policy);
        let decoded = ExecutionConfiguration::from_reflection(&packed, &handles).unwrap();
        // Optional fields never crossed the wire and stay at defaults.
        assert_eq!(decoded.root_frame_name, "");
        assert_eq!(decoded.scenario_time_epoch, 0.0);
        assert_eq!(decoded.next_mode_cte_time, 0.0);
        // Mandatory fields survive.
        assert_eq!(decoded.owner_name, "fed_a");
        assert_eq!(decoded.current_execution_mode, ExecutionMode::Running);
    }

    #[test]
    fn test_mirror_drops_stale_reflection() {
        let handles = handles();
        let policy = ExecutionPolicy::for_kind(PolicyKind::CentralMaster);
        let mirror = ExcoMirror::new();

        let mut fresh = sample();
        fresh.next_mode_scenario_time = 10.0;
        assert!(mirror
            .apply_reflection(&fresh.pack(&handles, &policy), &handles)
            .is_some());

        let mut stale = sample();
        stale.next_mode_scenario_time = 4.0;
        assert!(mirror
            .apply_reflection(&stale.pack(&handles, &policy), &handles)
            .is_none());
        assert_eq!(mirror.stale_dropped(), 1);
        assert_eq!(
            mirror.latest().unwrap().next_mode_scenario_time,
            10.0
        );
    }

    #[test]
    fn test_mirror_partial_update_keeps_other_fields() {
        let handles = handles();
        let policy = ExecutionPolicy::for_kind(PolicyKind::CentralMaster);
        let mirror = ExcoMirror::new();
        mirror.apply_reflection(&sample().pack(&handles, &policy), &handles);

        // Only the mode fields change; everything else must survive.
        let partial: AttributeValueMap = vec![
            (
                handles.exco_attributes[IDX_CURRENT_EXECUTION_MODE],
                encode_u16(ExecutionMode::Freeze.as_u16()),
            ),
            (
                handles.exco_attributes[IDX_NEXT_MODE_SCENARIO_TIME],
                encode_f64(6.0),
            ),
        ];
        let updated = mirror.apply_reflection(&partial, &handles).unwrap();
        assert_eq!(updated.current_execution_mode, ExecutionMode::Freeze);
        assert_eq!(updated.owner_name, "fed_a");
        assert_eq!(updated.least_common_time_step, 1_000_000);
    }

    #[test]
    fn test_mtr_box_latest_wins() {
        let mtr = MtrBox::new();
        assert_eq!(mtr.take(), None);
        mtr.post(ExecutionMode::Freeze);
        mtr.post(ExecutionMode::Shutdown);
        assert_eq!(mtr.take(), Some(ExecutionMode::Shutdown));
        assert_eq!(mtr.take(), None);
    }
}
