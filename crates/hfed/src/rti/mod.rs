// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 hfed contributors

//! The RTI boundary: the narrow trait the core consumes and the callback
//! sink it implements.
//!
//! The underlying run-time infrastructure (connection, serialization,
//! publish/subscribe routing) is an external collaborator. The core programs
//! against [`RtiAmbassador`] and hands the RTI an implementation of
//! [`FederateAmbassador`] at connect time.
//!
//! # Thread Safety
//!
//! The RTI dispatches [`FederateAmbassador`] callbacks on threads it owns,
//! possibly concurrent with host-thread calls into [`RtiAmbassador`].
//! Callback implementations must take their component's lock, perform
//! bounded work, and never call back into the RTI.

pub mod intraprocess;

use crate::time::{Interval, LogicalTime};
use std::fmt;
use std::sync::Arc;

/// Handle of a joined federate, assigned by the RTI.
pub type FederateHandle = u32;
/// Handle of an object class in the FOM.
pub type ObjectClassHandle = u32;
/// Handle of a class attribute in the FOM.
pub type AttributeHandle = u32;
/// Handle of an interaction class in the FOM.
pub type InteractionClassHandle = u32;
/// Handle of an interaction parameter in the FOM.
pub type ParameterHandle = u32;
/// Handle of a registered object instance.
pub type ObjectInstanceHandle = u64;

/// Ordered attribute-handle/value pairs crossing the boundary.
pub type AttributeValueMap = Vec<(AttributeHandle, Vec<u8>)>;
/// Ordered parameter-handle/value pairs crossing the boundary.
pub type ParameterValueMap = Vec<(ParameterHandle, Vec<u8>)>;

/// Action taken on owned object instances when resigning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResignAction {
    /// Delete all owned object instances (normal resign).
    DeleteObjects,
    /// Unconditionally divest ownership, keeping instances alive so the
    /// federate can rejoin later.
    UnconditionallyDivest,
}

/// Why a sync-point registration was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncRegistrationFailure {
    /// Another federate registered the label first. Recovered: the barrier
    /// exists, which is all the registrant needed.
    LabelNotUnique,
    /// Any other rejection; the sync-point is unusable.
    Other(String),
}

/// Errors raised by the RTI boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RtiError {
    /// No connection to the RTI.
    NotConnected,
    /// The connection attempt itself failed.
    ConnectionFailed(String),
    /// `create_federation_execution` on an existing federation.
    FederationExecutionAlreadyExists,
    /// The named federation execution does not exist.
    FederationExecutionDoesNotExist,
    /// This federate already joined the federation.
    FederateAlreadyExecutionMember,
    /// The calling federate is not a member of the federation.
    FederateNotExecutionMember,
    /// `destroy_federation_execution` while other federates remain joined.
    FederatesCurrentlyJoined,
    /// A FOM name could not be resolved to a handle.
    NameNotFound(String),
    /// The object instance handle is not known to the RTI.
    ObjectInstanceNotKnown(ObjectInstanceHandle),
    /// Attribute update or divestiture on an unowned attribute.
    AttributeNotOwned,
    /// A logical time violated the federate's time constraints.
    InvalidLogicalTime(String),
    /// A federation save is in progress.
    SaveInProgress,
    /// A federation restore is in progress.
    RestoreInProgress,
    /// Vendor-internal failure.
    Internal(String),
}

impl fmt::Display for RtiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RtiError::NotConnected => write!(f, "not connected to the RTI"),
            RtiError::ConnectionFailed(msg) => write!(f, "connection failed: {}", msg),
            RtiError::FederationExecutionAlreadyExists => {
                write!(f, "federation execution already exists")
            }
            RtiError::FederationExecutionDoesNotExist => {
                write!(f, "federation execution does not exist")
            }
            RtiError::FederateAlreadyExecutionMember => {
                write!(f, "federate is already an execution member")
            }
            RtiError::FederateNotExecutionMember => {
                write!(f, "federate is not an execution member")
            }
            RtiError::FederatesCurrentlyJoined => {
                write!(f, "federates are currently joined")
            }
            RtiError::NameNotFound(name) => write!(f, "FOM name not found: '{}'", name),
            RtiError::ObjectInstanceNotKnown(h) => {
                write!(f, "object instance {} not known", h)
            }
            RtiError::AttributeNotOwned => write!(f, "attribute not owned"),
            RtiError::InvalidLogicalTime(msg) => write!(f, "invalid logical time: {}", msg),
            RtiError::SaveInProgress => write!(f, "federation save in progress"),
            RtiError::RestoreInProgress => write!(f, "federation restore in progress"),
            RtiError::Internal(msg) => write!(f, "internal RTI error: {}", msg),
        }
    }
}

impl std::error::Error for RtiError {}

/// Result type for RTI boundary calls.
pub type RtiResult<T> = core::result::Result<T, RtiError>;

/// The run-time infrastructure surface consumed by the core.
///
/// One instance represents one federate's connection. Implementations must
/// be thread-safe across call sites; the core serializes its own calls but
/// assumes nothing about the RTI's internal threading.
pub trait RtiAmbassador: Send + Sync {
    // ---- connection -----------------------------------------------------

    fn connect(
        &self,
        ambassador: Arc<dyn FederateAmbassador>,
        local_settings: &str,
    ) -> RtiResult<()>;

    fn disconnect(&self) -> RtiResult<()>;

    // ---- federation management ------------------------------------------

    fn create_federation_execution(
        &self,
        name: &str,
        fom_modules: &[String],
        mim_module: Option<&str>,
    ) -> RtiResult<()>;

    fn destroy_federation_execution(&self, name: &str) -> RtiResult<()>;

    fn join_federation_execution(
        &self,
        federate_name: &str,
        federate_type: &str,
        federation_name: &str,
    ) -> RtiResult<FederateHandle>;

    fn resign_federation_execution(&self, action: ResignAction) -> RtiResult<()>;

    fn enable_asynchronous_delivery(&self) -> RtiResult<()>;

    // ---- handle resolution ----------------------------------------------

    fn object_class_handle(&self, name: &str) -> RtiResult<ObjectClassHandle>;

    fn attribute_handle(&self, class: ObjectClassHandle, name: &str) -> RtiResult<AttributeHandle>;

    fn interaction_class_handle(&self, name: &str) -> RtiResult<InteractionClassHandle>;

    fn parameter_handle(
        &self,
        class: InteractionClassHandle,
        name: &str,
    ) -> RtiResult<ParameterHandle>;

    // ---- object management ----------------------------------------------

    fn publish_object_class_attributes(
        &self,
        class: ObjectClassHandle,
        attributes: &[AttributeHandle],
    ) -> RtiResult<()>;

    fn subscribe_object_class_attributes(
        &self,
        class: ObjectClassHandle,
        attributes: &[AttributeHandle],
    ) -> RtiResult<()>;

    fn unsubscribe_object_class(&self, class: ObjectClassHandle) -> RtiResult<()>;

    fn register_object_instance(
        &self,
        class: ObjectClassHandle,
        name: &str,
    ) -> RtiResult<ObjectInstanceHandle>;

    /// Update attribute values. A `Some(time)` makes the update
    /// time-stamp-ordered; `None` is receive-ordered.
    fn update_attribute_values(
        &self,
        instance: ObjectInstanceHandle,
        attributes: &AttributeValueMap,
        tag: &[u8],
        time: Option<LogicalTime>,
    ) -> RtiResult<()>;

    fn request_attribute_value_update(
        &self,
        instance: ObjectInstanceHandle,
        attributes: &[AttributeHandle],
    ) -> RtiResult<()>;

    // ---- interactions ----------------------------------------------------

    fn publish_interaction_class(&self, class: InteractionClassHandle) -> RtiResult<()>;

    fn subscribe_interaction_class(&self, class: InteractionClassHandle) -> RtiResult<()>;

    fn send_interaction(
        &self,
        class: InteractionClassHandle,
        parameters: &ParameterValueMap,
        tag: &[u8],
        time: Option<LogicalTime>,
    ) -> RtiResult<()>;

    // ---- time management --------------------------------------------------

    fn enable_time_regulation(&self, lookahead: Interval) -> RtiResult<()>;

    fn enable_time_constrained(&self) -> RtiResult<()>;

    fn disable_time_regulation(&self) -> RtiResult<()>;

    fn disable_time_constrained(&self) -> RtiResult<()>;

    fn time_advance_request(&self, time: LogicalTime) -> RtiResult<()>;

    /// Greatest Available Logical Time. `None` when no regulating peer
    /// constrains this federate.
    fn query_galt(&self) -> RtiResult<Option<LogicalTime>>;

    // ---- synchronization points -------------------------------------------

    /// `federate_set = None` addresses the whole federation.
    fn register_federation_synchronization_point(
        &self,
        label: &str,
        tag: &[u8],
        federate_set: Option<&[FederateHandle]>,
    ) -> RtiResult<()>;

    fn synchronization_point_achieved(&self, label: &str) -> RtiResult<()>;

    // ---- save / restore ----------------------------------------------------

    fn request_federation_save(&self, label: &str) -> RtiResult<()>;

    fn federate_save_begun(&self) -> RtiResult<()>;

    fn federate_save_complete(&self, success: bool) -> RtiResult<()>;

    fn request_federation_restore(&self, label: &str) -> RtiResult<()>;

    fn federate_restore_complete(&self, success: bool) -> RtiResult<()>;

    // ---- ownership ----------------------------------------------------------

    fn attribute_ownership_acquisition(
        &self,
        instance: ObjectInstanceHandle,
        attributes: &[AttributeHandle],
        tag: &[u8],
    ) -> RtiResult<()>;

    fn unconditional_attribute_ownership_divestiture(
        &self,
        instance: ObjectInstanceHandle,
        attributes: &[AttributeHandle],
    ) -> RtiResult<()>;
}

/// Callback sink implemented by the core and invoked by the RTI.
///
/// Less-central callbacks default to no-ops so simple sinks (and tests)
/// implement only what they observe.
pub trait FederateAmbassador: Send + Sync {
    // ---- synchronization points ---------------------------------------

    fn sync_point_registration_succeeded(&self, label: &str);

    fn sync_point_registration_failed(&self, label: &str, reason: SyncRegistrationFailure);

    fn announce_synchronization_point(&self, label: &str, tag: &[u8]);

    fn federation_synchronized(&self, label: &str);

    // ---- object management ----------------------------------------------

    fn discover_object_instance(
        &self,
        instance: ObjectInstanceHandle,
        class: ObjectClassHandle,
        name: &str,
    );

    fn remove_object_instance(&self, _instance: ObjectInstanceHandle) {}

    fn reflect_attribute_values(
        &self,
        instance: ObjectInstanceHandle,
        attributes: &AttributeValueMap,
        tag: &[u8],
        time: Option<LogicalTime>,
    );

    /// The RTI asks the owner to re-publish current values.
    fn provide_attribute_value_update(
        &self,
        _instance: ObjectInstanceHandle,
        _attributes: &[AttributeHandle],
    ) {
    }

    // ---- interactions ------------------------------------------------------

    fn receive_interaction(
        &self,
        class: InteractionClassHandle,
        parameters: &ParameterValueMap,
        tag: &[u8],
        time: Option<LogicalTime>,
        sender: FederateHandle,
    );

    // ---- time management ------------------------------------------------

    fn time_regulation_enabled(&self, _time: LogicalTime) {}

    fn time_constrained_enabled(&self, _time: LogicalTime) {}

    fn time_advance_grant(&self, time: LogicalTime);

    // ---- save / restore ----------------------------------------------------

    fn initiate_federate_save(&self, _label: &str) {}

    fn federation_saved(&self, _success: bool) {}

    fn confirm_restore_request(&self, _label: &str, _success: bool) {}

    fn initiate_federate_restore(&self, _label: &str, _handle: FederateHandle) {}

    fn federation_restored(&self, _success: bool) {}

    // ---- ownership ----------------------------------------------------------

    fn attribute_ownership_acquisition_notification(
        &self,
        _instance: ObjectInstanceHandle,
        _attributes: &[AttributeHandle],
    ) {
    }

    fn attribute_ownership_release_requested(
        &self,
        _instance: ObjectInstanceHandle,
        _attributes: &[AttributeHandle],
    ) {
    }
}

// =======================================================================
// Well-known FOM / MOM names
// =======================================================================

/// Object class of the shared execution configuration.
pub const EXCO_CLASS_NAME: &str = "ExecutionConfiguration";
/// Interaction carrying a mode transition request to the master.
pub const MTR_CLASS_NAME: &str = "ModeTransitionRequest";
/// Parameter of [`MTR_CLASS_NAME`]: requested execution mode (u16 LE).
pub const MTR_MODE_PARAMETER: &str = "execution_mode";
/// Timed interaction announcing a federation-wide freeze boundary.
pub const FREEZE_CLASS_NAME: &str = "FreezeScenarioTime";
/// Parameter of [`FREEZE_CLASS_NAME`]: freeze scenario time (i64 LE ticks).
pub const FREEZE_TIME_PARAMETER: &str = "scenario_time";
/// MOM class reflecting one joined federate.
pub const MOM_FEDERATE_CLASS_NAME: &str = "HLAmanager.HLAfederate";
/// MOM attribute: federate handle (i64 LE).
pub const MOM_FEDERATE_HANDLE_ATTR: &str = "HLAfederateHandle";
/// MOM attribute: federate name (HLAunicodeString).
pub const MOM_FEDERATE_NAME_ATTR: &str = "HLAfederateName";
/// MOM attribute: federate type (HLAunicodeString).
pub const MOM_FEDERATE_TYPE_ATTR: &str = "HLAfederateType";

/// ExCO attribute names, in packing order.
pub const EXCO_ATTR_NAMES: [&str; 10] = [
    "owner_name",
    "root_frame_name",
    "scenario_time_epoch",
    "next_mode_scenario_time",
    "next_mode_cte_time",
    "current_execution_mode",
    "next_execution_mode",
    "least_common_time_step",
    "run_duration",
    "required_federates",
];

/// Resolved handles for the execution-control FOM and the MOM classes the
/// core introspects. Resolved once after joining.
#[derive(Debug, Clone)]
pub struct FomHandles {
    pub exco_class: ObjectClassHandle,
    /// ExCO attribute handles, index-aligned with [`EXCO_ATTR_NAMES`].
    pub exco_attributes: Vec<AttributeHandle>,
    pub mtr_class: InteractionClassHandle,
    pub mtr_mode_parameter: ParameterHandle,
    pub freeze_class: InteractionClassHandle,
    pub freeze_time_parameter: ParameterHandle,
    pub mom_federate_class: ObjectClassHandle,
    pub mom_federate_handle_attr: AttributeHandle,
    pub mom_federate_name_attr: AttributeHandle,
    pub mom_federate_type_attr: AttributeHandle,
}

impl FomHandles {
    /// Resolve every well-known name against the RTI.
    pub fn resolve(rti: &dyn RtiAmbassador) -> RtiResult<FomHandles> {
        let exco_class = rti.object_class_handle(EXCO_CLASS_NAME)?;
        let mut exco_attributes = Vec::with_capacity(EXCO_ATTR_NAMES.len());
        for name in EXCO_ATTR_NAMES {
            exco_attributes.push(rti.attribute_handle(exco_class, name)?);
        }
        let mtr_class = rti.interaction_class_handle(MTR_CLASS_NAME)?;
        let freeze_class = rti.interaction_class_handle(FREEZE_CLASS_NAME)?;
        let mom_federate_class = rti.object_class_handle(MOM_FEDERATE_CLASS_NAME)?;
        Ok(FomHandles {
            exco_class,
            exco_attributes,
            mtr_mode_parameter: rti.parameter_handle(mtr_class, MTR_MODE_PARAMETER)?,
            mtr_class,
            freeze_time_parameter: rti.parameter_handle(freeze_class, FREEZE_TIME_PARAMETER)?,
            freeze_class,
            mom_federate_handle_attr: rti
                .attribute_handle(mom_federate_class, MOM_FEDERATE_HANDLE_ATTR)?,
            mom_federate_name_attr: rti
                .attribute_handle(mom_federate_class, MOM_FEDERATE_NAME_ATTR)?,
            mom_federate_type_attr: rti
                .attribute_handle(mom_federate_class, MOM_FEDERATE_TYPE_ATTR)?,
            mom_federate_class,
        })
    }
}
