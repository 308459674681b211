// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 hfed contributors

//! The crate's [`FederateAmbassador`] implementation: routes every RTI
//! callback to the owning component.
//!
//! Handlers take the owning component's lock, perform bounded work, and
//! return. The two exceptions that must call back into the RTI (achieving
//! auto-achieved sync-points and re-publishing the execution configuration
//! on request) run with no component lock held.

use crate::encoding::{decode_i64, decode_unicode_string};
use crate::exec::{ExcoMirror, ExecutionMode, ExecutionPolicy, FreezeSchedule, MtrBox};
use crate::federate::{Membership, RunFlags, SaveRestoreState, SaveRestoreTracker, TimeManager};
use crate::ownership::OwnershipTracker;
use crate::rti::{
    AttributeHandle, AttributeValueMap, FederateAmbassador, FederateHandle, FomHandles,
    InteractionClassHandle, ObjectClassHandle, ObjectInstanceHandle, ParameterValueMap,
    RtiAmbassador, SyncRegistrationFailure,
};
use crate::sync::{AnnounceOutcome, SyncPointManager};
use crate::time::LogicalTime;
use crate::{debug, error, info, warn};
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, OnceLock};

/// What a discovered object instance is to us.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InstanceKind {
    Exco,
    MomFederate,
    Other,
}

/// Callback sink shared by all components of one federate.
pub struct CoreAmbassador {
    rti: Arc<dyn RtiAmbassador>,
    flags: Arc<RunFlags>,
    sync: Arc<SyncPointManager>,
    time: Arc<TimeManager>,
    membership: Arc<Membership>,
    save_restore: Arc<SaveRestoreTracker>,
    ownership: Arc<OwnershipTracker>,
    exco: Arc<ExcoMirror>,
    freeze: Arc<FreezeSchedule>,
    mtr: Arc<MtrBox>,
    fom: Arc<OnceLock<FomHandles>>,
    policy: ExecutionPolicy,
    instance_kinds: DashMap<ObjectInstanceHandle, InstanceKind>,
    /// Set once master election resolves; gates ExCO re-publication.
    master: AtomicBool,
    /// Scenario epoch in base-unit ticks, for freeze-time conversion.
    epoch_ticks: AtomicI64,
}

impl CoreAmbassador {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        rti: Arc<dyn RtiAmbassador>,
        flags: Arc<RunFlags>,
        sync: Arc<SyncPointManager>,
        time: Arc<TimeManager>,
        membership: Arc<Membership>,
        save_restore: Arc<SaveRestoreTracker>,
        ownership: Arc<OwnershipTracker>,
        exco: Arc<ExcoMirror>,
        freeze: Arc<FreezeSchedule>,
        mtr: Arc<MtrBox>,
        fom: Arc<OnceLock<FomHandles>>,
        policy: ExecutionPolicy,
    ) -> CoreAmbassador {
        CoreAmbassador {
            rti,
            flags,
            sync,
            time,
            membership,
            save_restore,
            ownership,
            exco,
            freeze,
            mtr,
            fom,
            policy,
            instance_kinds: DashMap::new(),
            master: AtomicBool::new(false),
            epoch_ticks: AtomicI64::new(0),
        }
    }

    /// Record the master election outcome.
    pub fn set_master(&self, master: bool) {
        self.master.store(master, Ordering::SeqCst);
    }

    /// Record the scenario epoch once known (master-authored or mirrored).
    pub fn set_epoch_ticks(&self, ticks: i64) {
        self.epoch_ticks.store(ticks, Ordering::SeqCst);
    }

    fn kind_of(&self, instance: ObjectInstanceHandle) -> InstanceKind {
        self.instance_kinds
            .get(&instance)
            .map(|k| *k)
            .unwrap_or(InstanceKind::Other)
    }

    fn handle_mom_reflection(&self, instance: ObjectInstanceHandle, attributes: &AttributeValueMap) {
        let Some(fom) = self.fom.get() else {
            return;
        };
        let mut handle = None;
        let mut name = None;
        let mut federate_type = None;
        for (attr, bytes) in attributes {
            if *attr == fom.mom_federate_handle_attr {
                match decode_i64(bytes) {
                    Ok(value) => handle = Some(value as FederateHandle),
                    Err(e) => warn!("bad MOM federate handle: {}", e),
                }
            } else if *attr == fom.mom_federate_name_attr {
                match decode_unicode_string(bytes) {
                    Ok(value) => name = Some(value),
                    Err(e) => warn!("bad MOM federate name: {}", e),
                }
            } else if *attr == fom.mom_federate_type_attr {
                match decode_unicode_string(bytes) {
                    Ok(value) => federate_type = Some(value),
                    Err(e) => warn!("bad MOM federate type: {}", e),
                }
            }
        }
        self.membership.update(instance, handle, name, federate_type);
    }
}

impl FederateAmbassador for CoreAmbassador {
    // ---- synchronization points ---------------------------------------

    fn sync_point_registration_succeeded(&self, label: &str) {
        if let Err(e) = self.sync.on_registration_succeeded(label) {
            warn!("registration_succeeded for '{}': {}", label, e);
        }
    }

    fn sync_point_registration_failed(&self, label: &str, reason: SyncRegistrationFailure) {
        let not_unique = matches!(reason, SyncRegistrationFailure::LabelNotUnique);
        self.sync.on_registration_failed(label, not_unique);
    }

    fn announce_synchronization_point(&self, label: &str, _tag: &[u8]) {
        if self.sync.on_announced(label) == AnnounceOutcome::AutoAchieve {
            // Achieve outside any manager lock; never block the federation
            // on a point we do not recognize.
            if let Err(e) = self.rti.synchronization_point_achieved(label) {
                warn!("auto-achieve of '{}' failed: {}", label, e);
            }
        }
    }

    fn federation_synchronized(&self, label: &str) {
        if let Err(e) = self.sync.on_federation_synchronized(label) {
            error!("federation_synchronized for '{}': {}", label, e);
        }
    }

    // ---- object management ----------------------------------------------

    fn discover_object_instance(
        &self,
        instance: ObjectInstanceHandle,
        class: ObjectClassHandle,
        name: &str,
    ) {
        let kind = match self.fom.get() {
            Some(fom) if class == fom.exco_class => InstanceKind::Exco,
            Some(fom) if class == fom.mom_federate_class => InstanceKind::MomFederate,
            _ => InstanceKind::Other,
        };
        self.instance_kinds.insert(instance, kind);
        match kind {
            InstanceKind::Exco => {
                debug!("discovered execution configuration instance '{}'", name);
                self.exco.bind_instance(instance);
            }
            InstanceKind::MomFederate => self.membership.discover(instance),
            InstanceKind::Other => {
                debug!("discovered unmanaged instance '{}' (class {})", name, class)
            }
        }
    }

    fn remove_object_instance(&self, instance: ObjectInstanceHandle) {
        if let Some((_, kind)) = self.instance_kinds.remove(&instance) {
            if kind == InstanceKind::MomFederate {
                self.membership.remove(instance);
            }
        }
    }

    fn reflect_attribute_values(
        &self,
        instance: ObjectInstanceHandle,
        attributes: &AttributeValueMap,
        _tag: &[u8],
        _time: Option<LogicalTime>,
    ) {
        #[cfg(feature = "trace")]
        debug!(
            "reflect: instance {} with {} value(s) at {:?}",
            instance,
            attributes.len(),
            _time
        );
        match self.kind_of(instance) {
            InstanceKind::Exco => {
                let Some(fom) = self.fom.get() else {
                    return;
                };
                self.exco.apply_reflection(attributes, fom);
            }
            InstanceKind::MomFederate => self.handle_mom_reflection(instance, attributes),
            InstanceKind::Other => {}
        }
    }

    fn provide_attribute_value_update(
        &self,
        instance: ObjectInstanceHandle,
        _attributes: &[AttributeHandle],
    ) {
        if !self.master.load(Ordering::SeqCst) || !self.exco.is_bound_to(instance) {
            return;
        }
        let (Some(fom), Some(exco)) = (self.fom.get(), self.exco.latest()) else {
            return;
        };
        // Receive-ordered: the requester wants current values, not a
        // time-stamped transition.
        let values = exco.pack(fom, &self.policy);
        if let Err(e) = self.rti.update_attribute_values(instance, &values, &[], None) {
            warn!("ExCO re-publication failed: {}", e);
        }
    }

    // ---- interactions ------------------------------------------------------

    fn receive_interaction(
        &self,
        class: InteractionClassHandle,
        parameters: &ParameterValueMap,
        _tag: &[u8],
        _time: Option<LogicalTime>,
        sender: FederateHandle,
    ) {
        #[cfg(feature = "trace")]
        debug!(
            "interaction: class {} from {} at {:?}",
            class, sender, _time
        );
        let Some(fom) = self.fom.get() else {
            return;
        };
        if class == fom.mtr_class {
            for (param, bytes) in parameters {
                if *param == fom.mtr_mode_parameter {
                    match ExecutionMode::decode(bytes) {
                        Ok(mode) => {
                            info!(
                                "mode transition request for {} from federate {}",
                                mode, sender
                            );
                            self.mtr.post(mode);
                        }
                        Err(e) => warn!("undecodable mode transition request: {}", e),
                    }
                }
            }
        } else if class == fom.freeze_class {
            for (param, bytes) in parameters {
                if *param == fom.freeze_time_parameter {
                    match decode_i64(bytes) {
                        Ok(scenario_ticks) => {
                            let epoch = self.epoch_ticks.load(Ordering::SeqCst);
                            let boundary =
                                LogicalTime::from_ticks(scenario_ticks.saturating_sub(epoch));
                            info!(
                                "freeze announced at scenario ticks {} (boundary {})",
                                scenario_ticks, boundary
                            );
                            self.freeze.add(boundary);
                        }
                        Err(e) => warn!("undecodable freeze announcement: {}", e),
                    }
                }
            }
        } else {
            debug!("ignoring interaction class {} from {}", class, sender);
        }
    }

    // ---- time management ------------------------------------------------

    fn time_regulation_enabled(&self, time: LogicalTime) {
        self.time.on_time_regulation_enabled(time);
    }

    fn time_constrained_enabled(&self, time: LogicalTime) {
        self.time.on_time_constrained_enabled(time);
    }

    fn time_advance_grant(&self, time: LogicalTime) {
        self.time.on_time_advance_grant(time);
        // Ownership transfers land on grant boundaries.
        match self.ownership.drain_due(self.rti.as_ref(), time) {
            Ok(0) => {}
            Ok(count) => debug!("drained {} ownership transfer(s) at {}", count, time),
            Err(e) => warn!("ownership drain at {} failed: {}", time, e),
        }
    }

    // ---- save / restore ----------------------------------------------------

    fn initiate_federate_save(&self, label: &str) {
        debug!("initiate save '{}'", label);
        self.save_restore.set(SaveRestoreState::Initiate);
    }

    fn federation_saved(&self, success: bool) {
        self.save_restore.set(if success {
            SaveRestoreState::Complete
        } else {
            SaveRestoreState::Failed
        });
    }

    fn confirm_restore_request(&self, label: &str, success: bool) {
        debug!("restore request '{}' confirmed: {}", label, success);
        self.save_restore.set(if success {
            SaveRestoreState::RequestSucceeded
        } else {
            SaveRestoreState::RequestFailed
        });
    }

    fn initiate_federate_restore(&self, label: &str, handle: FederateHandle) {
        debug!("initiate restore '{}' as federate {}", label, handle);
        self.save_restore.set(SaveRestoreState::Initiate);
    }

    fn federation_restored(&self, success: bool) {
        self.save_restore.set(if success {
            SaveRestoreState::Complete
        } else {
            SaveRestoreState::Failed
        });
    }

    // ---- ownership ----------------------------------------------------------

    fn attribute_ownership_acquisition_notification(
        &self,
        instance: ObjectInstanceHandle,
        attributes: &[AttributeHandle],
    ) {
        info!(
            "acquired ownership of {} attribute(s) on instance {}",
            attributes.len(),
            instance
        );
    }

    fn attribute_ownership_release_requested(
        &self,
        instance: ObjectInstanceHandle,
        attributes: &[AttributeHandle],
    ) {
        info!(
            "release requested for {} attribute(s) on instance {}",
            attributes.len(),
            instance
        );
        if self.flags.shutdown_requested() {
            return;
        }
        if let Err(e) = self
            .rti
            .unconditional_attribute_ownership_divestiture(instance, attributes)
        {
            warn!("divestiture on release request failed: {}", e);
        }
    }
}
