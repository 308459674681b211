// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 hfed contributors

//! Coordination policies.
//!
//! The three deployment styles differ only in configuration: which fixed
//! initialization barriers exist, which fields the execution configuration
//! object carries, how federation-wide freezes are announced, and whether a
//! master is elected or preset. Everything else is shared machinery.

/// Deployment style selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PolicyKind {
    /// Minimal coordination: start/complete barriers, lean configuration
    /// object, freeze announced through an interaction.
    #[default]
    Basic,
    /// Adds object-discovery and root-frame barriers, a scenario epoch and
    /// restart support.
    TimedInit,
    /// Full central-master coordination: freeze scheduled through the
    /// configuration object, CTE fields carried, master preset only.
    CentralMaster,
}

/// Fixed barrier labels, in announcement order.
pub const SYNC_INIT_STARTED: &str = "initialization_started";
pub const SYNC_INIT_COMPLETED: &str = "initialization_completed";
pub const SYNC_OBJECTS_DISCOVERED: &str = "objects_discovered";
pub const SYNC_ROOT_FRAME_DISCOVERED: &str = "root_frame_discovered";
pub const SYNC_FEDERATION_SYNCHRONIZED: &str = "federation_synchronized";
/// Freeze-exit rendezvous point, registered by the master on unfreeze.
pub const SYNC_MTR_GOTO_RUN: &str = "mtr_goto_run";

/// Resolved policy: every behavioral switch the execution control layer
/// consults, derived once from the [`PolicyKind`].
#[derive(Debug, Clone)]
pub struct ExecutionPolicy {
    pub kind: PolicyKind,
    /// Fixed barriers crossed before user-defined multiphase points.
    pub early_sync_points: Vec<&'static str>,
    /// Fixed barriers crossed after user-defined multiphase points.
    pub late_sync_points: Vec<&'static str>,
    /// Configuration object carries scenario epoch and root-frame name.
    pub exco_carries_epoch: bool,
    /// Configuration object carries the CTE transition time.
    pub exco_carries_cte: bool,
    /// Freezes are scheduled through the configuration object; otherwise a
    /// freeze interaction is broadcast.
    pub freeze_via_exco: bool,
    /// The federate that creates the federation becomes master when no
    /// master is preset.
    pub elect_master_by_creation: bool,
    /// Freeze -> Restart transitions are honored.
    pub allow_restart: bool,
}

impl ExecutionPolicy {
    pub fn for_kind(kind: PolicyKind) -> ExecutionPolicy {
        match kind {
            PolicyKind::Basic => ExecutionPolicy {
                kind,
                early_sync_points: vec![SYNC_INIT_STARTED],
                late_sync_points: vec![SYNC_INIT_COMPLETED, SYNC_FEDERATION_SYNCHRONIZED],
                exco_carries_epoch: false,
                exco_carries_cte: false,
                freeze_via_exco: false,
                elect_master_by_creation: true,
                allow_restart: false,
            },
            PolicyKind::TimedInit => ExecutionPolicy {
                kind,
                early_sync_points: vec![
                    SYNC_INIT_STARTED,
                    SYNC_OBJECTS_DISCOVERED,
                    SYNC_ROOT_FRAME_DISCOVERED,
                ],
                late_sync_points: vec![SYNC_INIT_COMPLETED, SYNC_FEDERATION_SYNCHRONIZED],
                exco_carries_epoch: true,
                exco_carries_cte: false,
                freeze_via_exco: false,
                elect_master_by_creation: true,
                allow_restart: true,
            },
            PolicyKind::CentralMaster => ExecutionPolicy {
                kind,
                early_sync_points: vec![
                    SYNC_INIT_STARTED,
                    SYNC_OBJECTS_DISCOVERED,
                    SYNC_ROOT_FRAME_DISCOVERED,
                ],
                late_sync_points: vec![SYNC_INIT_COMPLETED, SYNC_FEDERATION_SYNCHRONIZED],
                exco_carries_epoch: true,
                exco_carries_cte: true,
                freeze_via_exco: true,
                elect_master_by_creation: false,
                allow_restart: false,
            },
        }
    }

    /// All fixed barriers, in crossing order.
    pub fn fixed_sync_points(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.early_sync_points
            .iter()
            .chain(self.late_sync_points.iter())
            .copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_is_lean() {
        let policy = ExecutionPolicy::for_kind(PolicyKind::Basic);
        assert!(!policy.exco_carries_epoch);
        assert!(!policy.freeze_via_exco);
        assert!(policy.elect_master_by_creation);
        assert!(!policy
            .fixed_sync_points()
            .any(|l| l == SYNC_ROOT_FRAME_DISCOVERED));
    }

    #[test]
    fn test_central_master_requires_preset_master() {
        let policy = ExecutionPolicy::for_kind(PolicyKind::CentralMaster);
        assert!(!policy.elect_master_by_creation);
        assert!(policy.freeze_via_exco);
        assert!(policy.exco_carries_cte);
    }

    #[test]
    fn test_only_timed_init_supports_restart() {
        assert!(ExecutionPolicy::for_kind(PolicyKind::TimedInit).allow_restart);
        assert!(!ExecutionPolicy::for_kind(PolicyKind::Basic).allow_restart);
        assert!(!ExecutionPolicy::for_kind(PolicyKind::CentralMaster).allow_restart);
    }

    #[test]
    fn test_fixed_points_ordered() {
        let policy = ExecutionPolicy::for_kind(PolicyKind::TimedInit);
        let labels: Vec<&str> = policy.fixed_sync_points().collect();
        assert_eq!(labels.first(), Some(&SYNC_INIT_STARTED));
        assert_eq!(labels.last(), Some(&SYNC_FEDERATION_SYNCHRONIZED));
    }
}
