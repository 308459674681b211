// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 hfed contributors

//! An in-process RTI: every federate connects to one shared [`IntraProcessBus`]
//! and exchanges callbacks over plain function calls.
//!
//! The bus implements the conservative subset of RTI services the core
//! consumes: federation lifecycle, MOM federate introspection, sync-points,
//! publish/subscribe with receive-ordered and time-stamp-ordered delivery,
//! lookahead-based time advance grants, save/restore fan-out, and immediate
//! ownership transfer.
//!
//! # Delivery model
//!
//! Every service call mutates the shared state under one mutex, collects the
//! callbacks the mutation implies, releases the mutex, and invokes the
//! callbacks on the calling thread. Callbacks therefore arrive synchronously
//! and may re-enter the bus; no bus lock is ever held across a callback.
//!
//! # Time advance
//!
//! A constrained federate's request to `r` is granted once `r` is strictly
//! below its LBTS, the minimum over every other regulating federate of that
//! federate's time floor (`requested` if an advance is pending, else
//! `granted`, plus its lookahead). Queued time-stamp-ordered events at or
//! below `r` are delivered before the grant.

use crate::encoding::{encode_i64, encode_unicode_string};
use crate::rti::{
    AttributeHandle, AttributeValueMap, FederateAmbassador, FederateHandle,
    InteractionClassHandle, ObjectClassHandle, ObjectInstanceHandle, ParameterHandle,
    ParameterValueMap, ResignAction, RtiAmbassador, RtiError, RtiResult, SyncRegistrationFailure,
    MOM_FEDERATE_CLASS_NAME, MOM_FEDERATE_HANDLE_ATTR, MOM_FEDERATE_NAME_ATTR,
    MOM_FEDERATE_TYPE_ATTR,
};
use crate::time::{Interval, LogicalTime};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

type Callback = Box<dyn FnOnce() + Send>;

// =======================================================================
// Bus
// =======================================================================

/// The shared in-process RTI. Clone-cheap via internal `Arc`.
pub struct IntraProcessBus {
    core: Arc<BusCore>,
}

impl IntraProcessBus {
    pub fn new() -> IntraProcessBus {
        IntraProcessBus {
            core: Arc::new(BusCore {
                state: Mutex::new(BusState {
                    federations: HashMap::new(),
                    names: NameRegistry::default(),
                }),
            }),
        }
    }

    /// A fresh connection endpoint; one per federate.
    pub fn new_connection(&self) -> Arc<IntraProcessRti> {
        Arc::new(IntraProcessRti {
            core: self.core.clone(),
            conn: Mutex::new(Connection {
                ambassador: None,
                federation: None,
                handle: None,
            }),
        })
    }
}

impl Default for IntraProcessBus {
    fn default() -> Self {
        IntraProcessBus::new()
    }
}

struct BusCore {
    state: Mutex<BusState>,
}

struct BusState {
    federations: HashMap<String, Federation>,
    names: NameRegistry,
}

/// Lazy name interning: every FOM name resolves to a stable handle on first
/// lookup, so any object model the federates agree on "exists".
#[derive(Default)]
struct NameRegistry {
    next: u32,
    object_classes: HashMap<String, ObjectClassHandle>,
    attributes: HashMap<(ObjectClassHandle, String), AttributeHandle>,
    interactions: HashMap<String, InteractionClassHandle>,
    parameters: HashMap<(InteractionClassHandle, String), ParameterHandle>,
}

impl NameRegistry {
    fn fresh(&mut self) -> u32 {
        self.next += 1;
        self.next
    }

    fn object_class(&mut self, name: &str) -> ObjectClassHandle {
        if let Some(&h) = self.object_classes.get(name) {
            return h;
        }
        let h = self.fresh();
        self.object_classes.insert(name.to_string(), h);
        h
    }

    fn attribute(&mut self, class: ObjectClassHandle, name: &str) -> AttributeHandle {
        if let Some(&h) = self.attributes.get(&(class, name.to_string())) {
            return h;
        }
        let h = self.fresh();
        self.attributes.insert((class, name.to_string()), h);
        h
    }

    fn interaction(&mut self, name: &str) -> InteractionClassHandle {
        if let Some(&h) = self.interactions.get(name) {
            return h;
        }
        let h = self.fresh();
        self.interactions.insert(name.to_string(), h);
        h
    }

    fn parameter(&mut self, class: InteractionClassHandle, name: &str) -> ParameterHandle {
        if let Some(&h) = self.parameters.get(&(class, name.to_string())) {
            return h;
        }
        let h = self.fresh();
        self.parameters.insert((class, name.to_string()), h);
        h
    }
}

// =======================================================================
// Federation state
// =======================================================================

struct Federation {
    next_federate: FederateHandle,
    next_instance: ObjectInstanceHandle,
    /// Tie-breaker for time-stamp-ordered events with equal timestamps.
    seq: u64,
    federates: HashMap<FederateHandle, FedState>,
    sync_points: HashMap<String, SyncPoint>,
    objects: HashMap<ObjectInstanceHandle, ObjectState>,
    save: Option<CheckpointOp>,
    restore: Option<CheckpointOp>,
    mom_class: ObjectClassHandle,
    mom_handle_attr: AttributeHandle,
    mom_name_attr: AttributeHandle,
    mom_type_attr: AttributeHandle,
}

impl Federation {
    fn new(names: &mut NameRegistry) -> Federation {
        let mom_class = names.object_class(MOM_FEDERATE_CLASS_NAME);
        Federation {
            next_federate: 0,
            next_instance: 0,
            seq: 0,
            federates: HashMap::new(),
            sync_points: HashMap::new(),
            objects: HashMap::new(),
            save: None,
            restore: None,
            mom_handle_attr: names.attribute(mom_class, MOM_FEDERATE_HANDLE_ATTR),
            mom_name_attr: names.attribute(mom_class, MOM_FEDERATE_NAME_ATTR),
            mom_type_attr: names.attribute(mom_class, MOM_FEDERATE_TYPE_ATTR),
            mom_class,
        }
    }

    fn joined(&self) -> impl Iterator<Item = (&FederateHandle, &FedState)> {
        self.federates.iter().filter(|(_, f)| !f.resigned)
    }

    fn any_joined(&self) -> bool {
        self.joined().next().is_some()
    }

    /// Joined federates subscribed to `class`, excluding `except`.
    fn subscribers(
        &self,
        class: ObjectClassHandle,
        except: Option<FederateHandle>,
    ) -> Vec<FederateHandle> {
        self.joined()
            .filter(|(h, f)| Some(**h) != except && f.subscribed_classes.contains(&class))
            .map(|(h, _)| *h)
            .collect()
    }

    fn interaction_subscribers(
        &self,
        class: InteractionClassHandle,
        except: FederateHandle,
    ) -> Vec<FederateHandle> {
        self.joined()
            .filter(|(h, f)| **h != except && f.subscribed_interactions.contains(&class))
            .map(|(h, _)| *h)
            .collect()
    }
}

struct FedState {
    name: String,
    ambassador: Arc<dyn FederateAmbassador>,
    resigned: bool,
    subscribed_classes: HashSet<ObjectClassHandle>,
    subscribed_interactions: HashSet<InteractionClassHandle>,
    regulating: bool,
    constrained: bool,
    lookahead: Interval,
    granted: LogicalTime,
    requested: LogicalTime,
    advance_pending: bool,
    /// Time-stamp-ordered events awaiting this federate's next grant, keyed
    /// by (timestamp ticks, sender, sequence).
    tso: BTreeMap<(i64, FederateHandle, u64), TsoEvent>,
    mom_instance: ObjectInstanceHandle,
}

impl FedState {
    /// Earliest timestamp this federate may still send at.
    fn time_floor(&self) -> LogicalTime {
        let base = if self.advance_pending {
            self.requested
        } else {
            self.granted
        };
        base.add(self.lookahead)
    }
}

struct SyncPoint {
    /// Snapshot of the federates that must achieve the point, taken at
    /// registration so a later joiner cannot stall the barrier.
    participants: HashSet<FederateHandle>,
    achieved: HashSet<FederateHandle>,
}

struct ObjectState {
    class: ObjectClassHandle,
    name: String,
    owner: FederateHandle,
    /// Latest known value per attribute, replayed to new subscribers.
    values: HashMap<AttributeHandle, Vec<u8>>,
    /// Per-attribute ownership overrides; absent means the instance owner.
    attribute_owners: HashMap<AttributeHandle, Option<FederateHandle>>,
}

impl ObjectState {
    fn attribute_owner(&self, attribute: AttributeHandle) -> Option<FederateHandle> {
        match self.attribute_owners.get(&attribute) {
            Some(owner) => *owner,
            None => Some(self.owner),
        }
    }
}

enum TsoEvent {
    Reflection {
        instance: ObjectInstanceHandle,
        attributes: AttributeValueMap,
        tag: Vec<u8>,
        time: LogicalTime,
    },
    Interaction {
        class: InteractionClassHandle,
        parameters: ParameterValueMap,
        tag: Vec<u8>,
        time: LogicalTime,
        sender: FederateHandle,
    },
}

/// One in-flight federation save or restore.
struct CheckpointOp {
    outstanding: HashSet<FederateHandle>,
    success: bool,
}

// =======================================================================
// Connection
// =======================================================================

struct Connection {
    ambassador: Option<Arc<dyn FederateAmbassador>>,
    federation: Option<String>,
    handle: Option<FederateHandle>,
}

/// One federate's endpoint on an [`IntraProcessBus`].
pub struct IntraProcessRti {
    core: Arc<BusCore>,
    conn: Mutex<Connection>,
}

impl IntraProcessRti {
    fn ambassador(&self) -> RtiResult<Arc<dyn FederateAmbassador>> {
        self.conn
            .lock()
            .ambassador
            .clone()
            .ok_or(RtiError::NotConnected)
    }

    fn joined(&self) -> RtiResult<(String, FederateHandle)> {
        let conn = self.conn.lock();
        match (&conn.federation, conn.handle) {
            (Some(name), Some(handle)) => Ok((name.clone(), handle)),
            _ => Err(RtiError::FederateNotExecutionMember),
        }
    }

    /// Run `f` with this connection's federation and federate state locked,
    /// then invoke the callbacks it collected with no lock held.
    fn with_federation<T>(
        &self,
        f: impl FnOnce(&mut Federation, FederateHandle, &mut Vec<Callback>) -> RtiResult<T>,
    ) -> RtiResult<T> {
        let (federation_name, handle) = self.joined()?;
        let mut callbacks = Vec::new();
        let result = {
            let mut state = self.core.state.lock();
            let federation = state
                .federations
                .get_mut(&federation_name)
                .ok_or(RtiError::FederationExecutionDoesNotExist)?;
            f(federation, handle, &mut callbacks)
        };
        for callback in callbacks {
            callback();
        }
        result
    }
}

// =======================================================================
// Delivery helpers (called under the bus lock; emit callbacks only)
// =======================================================================

fn push_reflection(
    callbacks: &mut Vec<Callback>,
    ambassador: Arc<dyn FederateAmbassador>,
    instance: ObjectInstanceHandle,
    attributes: AttributeValueMap,
    tag: Vec<u8>,
    time: Option<LogicalTime>,
) {
    callbacks.push(Box::new(move || {
        ambassador.reflect_attribute_values(instance, &attributes, &tag, time);
    }));
}

fn push_discover(
    callbacks: &mut Vec<Callback>,
    ambassador: Arc<dyn FederateAmbassador>,
    instance: ObjectInstanceHandle,
    class: ObjectClassHandle,
    name: String,
) {
    callbacks.push(Box::new(move || {
        ambassador.discover_object_instance(instance, class, &name);
    }));
}

/// Replay an existing instance (discovery plus current values) to one
/// subscriber. Used when a federate subscribes after registration.
fn replay_instance(
    callbacks: &mut Vec<Callback>,
    ambassador: &Arc<dyn FederateAmbassador>,
    instance: ObjectInstanceHandle,
    object: &ObjectState,
) {
    push_discover(
        callbacks,
        ambassador.clone(),
        instance,
        object.class,
        object.name.clone(),
    );
    if !object.values.is_empty() {
        let mut values: AttributeValueMap = object
            .values
            .iter()
            .map(|(h, v)| (*h, v.clone()))
            .collect();
        values.sort_by_key(|(h, _)| *h);
        push_reflection(callbacks, ambassador.clone(), instance, values, Vec::new(), None);
    }
}

/// Complete a sync-point once every participant achieved it. The label is
/// removed so it can be reused for a later barrier.
fn check_sync_completion(federation: &mut Federation, callbacks: &mut Vec<Callback>) {
    let completed: Vec<String> = federation
        .sync_points
        .iter()
        .filter(|(_, p)| p.participants.iter().all(|h| p.achieved.contains(h)))
        .map(|(label, _)| label.clone())
        .collect();
    for label in completed {
        let point = match federation.sync_points.remove(&label) {
            Some(p) => p,
            None => continue,
        };
        for handle in &point.participants {
            if let Some(fed) = federation.federates.get(handle) {
                if fed.resigned {
                    continue;
                }
                let ambassador = fed.ambassador.clone();
                let label = label.clone();
                callbacks.push(Box::new(move || {
                    ambassador.federation_synchronized(&label);
                }));
            }
        }
    }
}

/// Grant every pending time advance the current floors allow, delivering
/// queued time-stamp-ordered events first.
fn recheck_time_advances(federation: &mut Federation, callbacks: &mut Vec<Callback>) {
    loop {
        let mut grantee = None;
        for (&handle, fed) in federation.joined() {
            if !fed.advance_pending {
                continue;
            }
            let grantable = if !fed.constrained {
                true
            } else {
                match lbts_of(federation, handle) {
                    None => true,
                    Some(lbts) => fed.requested < lbts,
                }
            };
            if grantable {
                grantee = Some(handle);
                break;
            }
        }
        let Some(handle) = grantee else {
            return;
        };
        let fed = match federation.federates.get_mut(&handle) {
            Some(f) => f,
            None => return,
        };
        let granted = fed.requested;
        fed.granted = granted;
        fed.advance_pending = false;
        let due: Vec<(i64, FederateHandle, u64)> = fed
            .tso
            .range(..=(granted.ticks(), FederateHandle::MAX, u64::MAX))
            .map(|(k, _)| *k)
            .collect();
        let ambassador = fed.ambassador.clone();
        for key in due {
            let Some(event) = fed.tso.remove(&key) else {
                continue;
            };
            let ambassador = ambassador.clone();
            callbacks.push(Box::new(move || match event {
                TsoEvent::Reflection {
                    instance,
                    attributes,
                    tag,
                    time,
                } => ambassador.reflect_attribute_values(instance, &attributes, &tag, Some(time)),
                TsoEvent::Interaction {
                    class,
                    parameters,
                    tag,
                    time,
                    sender,
                } => ambassador.receive_interaction(class, &parameters, &tag, Some(time), sender),
            }));
        }
        callbacks.push(Box::new(move || {
            ambassador.time_advance_grant(granted);
        }));
    }
}

/// LBTS of `handle`: the minimum time floor over every other regulating
/// federate, or `None` when nothing constrains it.
fn lbts_of(federation: &Federation, handle: FederateHandle) -> Option<LogicalTime> {
    federation
        .joined()
        .filter(|(h, f)| **h != handle && f.regulating)
        .map(|(_, f)| f.time_floor())
        .min()
}

// =======================================================================
// RtiAmbassador implementation
// =======================================================================

impl RtiAmbassador for IntraProcessRti {
    fn connect(
        &self,
        ambassador: Arc<dyn FederateAmbassador>,
        _local_settings: &str,
    ) -> RtiResult<()> {
        self.conn.lock().ambassador = Some(ambassador);
        Ok(())
    }

    fn disconnect(&self) -> RtiResult<()> {
        let mut conn = self.conn.lock();
        conn.ambassador = None;
        conn.federation = None;
        conn.handle = None;
        Ok(())
    }

    fn create_federation_execution(
        &self,
        name: &str,
        _fom_modules: &[String],
        _mim_module: Option<&str>,
    ) -> RtiResult<()> {
        self.ambassador()?;
        let mut state = self.core.state.lock();
        if state.federations.contains_key(name) {
            return Err(RtiError::FederationExecutionAlreadyExists);
        }
        let federation = Federation::new(&mut state.names);
        state.federations.insert(name.to_string(), federation);
        Ok(())
    }

    fn destroy_federation_execution(&self, name: &str) -> RtiResult<()> {
        let mut state = self.core.state.lock();
        let federation = state
            .federations
            .get(name)
            .ok_or(RtiError::FederationExecutionDoesNotExist)?;
        if federation.any_joined() {
            return Err(RtiError::FederatesCurrentlyJoined);
        }
        state.federations.remove(name);
        Ok(())
    }

    fn join_federation_execution(
        &self,
        federate_name: &str,
        federate_type: &str,
        federation_name: &str,
    ) -> RtiResult<FederateHandle> {
        let ambassador = self.ambassador()?;
        if self.conn.lock().handle.is_some() {
            return Err(RtiError::FederateAlreadyExecutionMember);
        }
        let mut callbacks = Vec::new();
        let handle = {
            let mut state = self.core.state.lock();
            let federation = state
                .federations
                .get_mut(federation_name)
                .ok_or(RtiError::FederationExecutionDoesNotExist)?;
            if federation.joined().any(|(_, f)| f.name == federate_name) {
                return Err(RtiError::Internal(format!(
                    "federate name '{}' already in use",
                    federate_name
                )));
            }
            federation.next_federate += 1;
            federation.next_instance += 1;
            let handle = federation.next_federate;
            let mom_instance = federation.next_instance;

            let mut values = HashMap::new();
            values.insert(federation.mom_handle_attr, encode_i64(handle as i64));
            values.insert(federation.mom_name_attr, encode_unicode_string(federate_name));
            values.insert(
                federation.mom_type_attr,
                encode_unicode_string(federate_type),
            );
            let object = ObjectState {
                class: federation.mom_class,
                name: format!("HLAfederate_{}", federate_name),
                owner: handle,
                values,
                attribute_owners: HashMap::new(),
            };
            // Existing MOM subscribers learn about the newcomer immediately.
            for subscriber in federation.subscribers(federation.mom_class, Some(handle)) {
                if let Some(peer) = federation.federates.get(&subscriber) {
                    replay_instance(&mut callbacks, &peer.ambassador, mom_instance, &object);
                }
            }
            federation.objects.insert(mom_instance, object);
            federation.federates.insert(
                handle,
                FedState {
                    name: federate_name.to_string(),
                    ambassador,
                    resigned: false,
                    subscribed_classes: HashSet::new(),
                    subscribed_interactions: HashSet::new(),
                    regulating: false,
                    constrained: false,
                    lookahead: Interval::ZERO,
                    granted: LogicalTime::ZERO,
                    requested: LogicalTime::ZERO,
                    advance_pending: false,
                    tso: BTreeMap::new(),
                    mom_instance,
                },
            );
            handle
        };
        {
            let mut conn = self.conn.lock();
            conn.federation = Some(federation_name.to_string());
            conn.handle = Some(handle);
        }
        for callback in callbacks {
            callback();
        }
        Ok(handle)
    }

    fn resign_federation_execution(&self, action: ResignAction) -> RtiResult<()> {
        self.with_federation(|federation, handle, callbacks| {
            let Some(fed) = federation.federates.get_mut(&handle) else {
                return Err(RtiError::FederateNotExecutionMember);
            };
            fed.resigned = true;
            let mom_instance = fed.mom_instance;

            let mut removed = vec![mom_instance];
            if action == ResignAction::DeleteObjects {
                removed.extend(
                    federation
                        .objects
                        .iter()
                        .filter(|(_, o)| o.owner == handle)
                        .map(|(i, _)| *i),
                );
            }
            for instance in removed {
                let Some(object) = federation.objects.remove(&instance) else {
                    continue;
                };
                for subscriber in federation.subscribers(object.class, Some(handle)) {
                    if let Some(peer) = federation.federates.get(&subscriber) {
                        let ambassador = peer.ambassador.clone();
                        callbacks.push(Box::new(move || {
                            ambassador.remove_object_instance(instance);
                        }));
                    }
                }
            }

            // A resigned federate neither blocks barriers nor time advances.
            for point in federation.sync_points.values_mut() {
                point.participants.remove(&handle);
                point.achieved.remove(&handle);
            }
            check_sync_completion(federation, callbacks);
            recheck_time_advances(federation, callbacks);
            Ok(())
        })?;
        let mut conn = self.conn.lock();
        conn.federation = None;
        conn.handle = None;
        Ok(())
    }

    fn enable_asynchronous_delivery(&self) -> RtiResult<()> {
        self.joined().map(|_| ())
    }

    // ---- handle resolution ----------------------------------------------

    fn object_class_handle(&self, name: &str) -> RtiResult<ObjectClassHandle> {
        Ok(self.core.state.lock().names.object_class(name))
    }

    fn attribute_handle(&self, class: ObjectClassHandle, name: &str) -> RtiResult<AttributeHandle> {
        Ok(self.core.state.lock().names.attribute(class, name))
    }

    fn interaction_class_handle(&self, name: &str) -> RtiResult<InteractionClassHandle> {
        Ok(self.core.state.lock().names.interaction(name))
    }

    fn parameter_handle(
        &self,
        class: InteractionClassHandle,
        name: &str,
    ) -> RtiResult<ParameterHandle> {
        Ok(self.core.state.lock().names.parameter(class, name))
    }

    // ---- object management ----------------------------------------------

    fn publish_object_class_attributes(
        &self,
        _class: ObjectClassHandle,
        _attributes: &[AttributeHandle],
    ) -> RtiResult<()> {
        self.joined().map(|_| ())
    }

    fn subscribe_object_class_attributes(
        &self,
        class: ObjectClassHandle,
        _attributes: &[AttributeHandle],
    ) -> RtiResult<()> {
        self.with_federation(|federation, handle, callbacks| {
            let Some(fed) = federation.federates.get_mut(&handle) else {
                return Err(RtiError::FederateNotExecutionMember);
            };
            if !fed.subscribed_classes.insert(class) {
                return Ok(());
            }
            // Replay instances registered before this subscription,
            // including this federate's own MOM entry.
            let ambassador = fed.ambassador.clone();
            for (&instance, object) in &federation.objects {
                if object.class == class {
                    replay_instance(callbacks, &ambassador, instance, object);
                }
            }
            Ok(())
        })
    }

    fn unsubscribe_object_class(&self, class: ObjectClassHandle) -> RtiResult<()> {
        self.with_federation(|federation, handle, _| {
            if let Some(fed) = federation.federates.get_mut(&handle) {
                fed.subscribed_classes.remove(&class);
            }
            Ok(())
        })
    }

    fn register_object_instance(
        &self,
        class: ObjectClassHandle,
        name: &str,
    ) -> RtiResult<ObjectInstanceHandle> {
        self.with_federation(|federation, handle, callbacks| {
            federation.next_instance += 1;
            let instance = federation.next_instance;
            let object = ObjectState {
                class,
                name: name.to_string(),
                owner: handle,
                values: HashMap::new(),
                attribute_owners: HashMap::new(),
            };
            for subscriber in federation.subscribers(class, Some(handle)) {
                if let Some(peer) = federation.federates.get(&subscriber) {
                    push_discover(
                        callbacks,
                        peer.ambassador.clone(),
                        instance,
                        class,
                        name.to_string(),
                    );
                }
            }
            federation.objects.insert(instance, object);
            Ok(instance)
        })
    }

    fn update_attribute_values(
        &self,
        instance: ObjectInstanceHandle,
        attributes: &AttributeValueMap,
        tag: &[u8],
        time: Option<LogicalTime>,
    ) -> RtiResult<()> {
        let attributes = attributes.clone();
        let tag = tag.to_vec();
        self.with_federation(move |federation, handle, callbacks| {
            let sender_floor = {
                let Some(sender) = federation.federates.get(&handle) else {
                    return Err(RtiError::FederateNotExecutionMember);
                };
                sender.regulating.then(|| sender.time_floor())
            };
            let Some(object) = federation.objects.get_mut(&instance) else {
                return Err(RtiError::ObjectInstanceNotKnown(instance));
            };
            for (attribute, value) in &attributes {
                object.values.insert(*attribute, value.clone());
            }
            let class = object.class;

            // Time-stamp order applies only when the sender regulates.
            let tso_time = match (time, sender_floor) {
                (Some(t), Some(floor)) => {
                    if t < floor {
                        return Err(RtiError::InvalidLogicalTime(format!(
                            "update at {} is below the sender's floor {}",
                            t, floor
                        )));
                    }
                    Some(t)
                }
                _ => None,
            };

            for subscriber in federation.subscribers(class, Some(handle)) {
                match tso_time {
                    Some(t)
                        if federation
                            .federates
                            .get(&subscriber)
                            .is_some_and(|f| f.constrained) =>
                    {
                        federation.seq += 1;
                        let key = (t.ticks(), handle, federation.seq);
                        if let Some(receiver) = federation.federates.get_mut(&subscriber) {
                            receiver.tso.insert(
                                key,
                                TsoEvent::Reflection {
                                    instance,
                                    attributes: attributes.clone(),
                                    tag: tag.clone(),
                                    time: t,
                                },
                            );
                        }
                    }
                    _ => {
                        if let Some(receiver) = federation.federates.get(&subscriber) {
                            push_reflection(
                                callbacks,
                                receiver.ambassador.clone(),
                                instance,
                                attributes.clone(),
                                tag.clone(),
                                time,
                            );
                        }
                    }
                }
            }
            Ok(())
        })
    }

    fn request_attribute_value_update(
        &self,
        instance: ObjectInstanceHandle,
        attributes: &[AttributeHandle],
    ) -> RtiResult<()> {
        let attributes = attributes.to_vec();
        self.with_federation(move |federation, _, callbacks| {
            let Some(object) = federation.objects.get(&instance) else {
                return Err(RtiError::ObjectInstanceNotKnown(instance));
            };
            if let Some(owner) = federation.federates.get(&object.owner) {
                if !owner.resigned {
                    let ambassador = owner.ambassador.clone();
                    callbacks.push(Box::new(move || {
                        ambassador.provide_attribute_value_update(instance, &attributes);
                    }));
                }
            }
            Ok(())
        })
    }

    // ---- interactions ----------------------------------------------------

    fn publish_interaction_class(&self, _class: InteractionClassHandle) -> RtiResult<()> {
        self.joined().map(|_| ())
    }

    fn subscribe_interaction_class(&self, class: InteractionClassHandle) -> RtiResult<()> {
        self.with_federation(|federation, handle, _| {
            if let Some(fed) = federation.federates.get_mut(&handle) {
                fed.subscribed_interactions.insert(class);
            }
            Ok(())
        })
    }

    fn send_interaction(
        &self,
        class: InteractionClassHandle,
        parameters: &ParameterValueMap,
        tag: &[u8],
        time: Option<LogicalTime>,
    ) -> RtiResult<()> {
        let parameters = parameters.clone();
        let tag = tag.to_vec();
        self.with_federation(move |federation, handle, callbacks| {
            let sender_floor = {
                let Some(sender) = federation.federates.get(&handle) else {
                    return Err(RtiError::FederateNotExecutionMember);
                };
                sender.regulating.then(|| sender.time_floor())
            };
            let tso_time = match (time, sender_floor) {
                (Some(t), Some(floor)) => {
                    if t < floor {
                        return Err(RtiError::InvalidLogicalTime(format!(
                            "interaction at {} is below the sender's floor {}",
                            t, floor
                        )));
                    }
                    Some(t)
                }
                _ => None,
            };
            for subscriber in federation.interaction_subscribers(class, handle) {
                match tso_time {
                    Some(t)
                        if federation
                            .federates
                            .get(&subscriber)
                            .is_some_and(|f| f.constrained) =>
                    {
                        federation.seq += 1;
                        let key = (t.ticks(), handle, federation.seq);
                        if let Some(receiver) = federation.federates.get_mut(&subscriber) {
                            receiver.tso.insert(
                                key,
                                TsoEvent::Interaction {
                                    class,
                                    parameters: parameters.clone(),
                                    tag: tag.clone(),
                                    time: t,
                                    sender: handle,
                                },
                            );
                        }
                    }
                    _ => {
                        if let Some(receiver) = federation.federates.get(&subscriber) {
                            let ambassador = receiver.ambassador.clone();
                            let parameters = parameters.clone();
                            let tag = tag.clone();
                            callbacks.push(Box::new(move || {
                                ambassador.receive_interaction(
                                    class,
                                    &parameters,
                                    &tag,
                                    time,
                                    handle,
                                );
                            }));
                        }
                    }
                }
            }
            Ok(())
        })
    }

    // ---- time management --------------------------------------------------

    fn enable_time_regulation(&self, lookahead: Interval) -> RtiResult<()> {
        self.with_federation(|federation, handle, callbacks| {
            // Start a late enabler at the federation's LBTS so it neither
            // regresses peers nor stalls behind them.
            let start = lbts_of(federation, handle);
            let Some(fed) = federation.federates.get_mut(&handle) else {
                return Err(RtiError::FederateNotExecutionMember);
            };
            fed.regulating = true;
            fed.lookahead = lookahead;
            if let Some(start) = start {
                if start > fed.granted {
                    fed.granted = start;
                }
            }
            let granted = fed.granted;
            let ambassador = fed.ambassador.clone();
            callbacks.push(Box::new(move || {
                ambassador.time_regulation_enabled(granted);
            }));
            recheck_time_advances(federation, callbacks);
            Ok(())
        })
    }

    fn enable_time_constrained(&self) -> RtiResult<()> {
        self.with_federation(|federation, handle, callbacks| {
            let Some(fed) = federation.federates.get_mut(&handle) else {
                return Err(RtiError::FederateNotExecutionMember);
            };
            fed.constrained = true;
            let granted = fed.granted;
            let ambassador = fed.ambassador.clone();
            callbacks.push(Box::new(move || {
                ambassador.time_constrained_enabled(granted);
            }));
            Ok(())
        })
    }

    fn disable_time_regulation(&self) -> RtiResult<()> {
        self.with_federation(|federation, handle, callbacks| {
            if let Some(fed) = federation.federates.get_mut(&handle) {
                fed.regulating = false;
            }
            recheck_time_advances(federation, callbacks);
            Ok(())
        })
    }

    fn disable_time_constrained(&self) -> RtiResult<()> {
        self.with_federation(|federation, handle, _| {
            if let Some(fed) = federation.federates.get_mut(&handle) {
                fed.constrained = false;
            }
            Ok(())
        })
    }

    fn time_advance_request(&self, time: LogicalTime) -> RtiResult<()> {
        self.with_federation(|federation, handle, callbacks| {
            {
                let Some(fed) = federation.federates.get_mut(&handle) else {
                    return Err(RtiError::FederateNotExecutionMember);
                };
                if time < fed.granted {
                    return Err(RtiError::InvalidLogicalTime(format!(
                        "advance to {} is behind the grant {}",
                        time, fed.granted
                    )));
                }
                fed.requested = time;
                fed.advance_pending = true;
            }
            recheck_time_advances(federation, callbacks);
            Ok(())
        })
    }

    fn query_galt(&self) -> RtiResult<Option<LogicalTime>> {
        self.with_federation(|federation, handle, _| Ok(lbts_of(federation, handle)))
    }

    // ---- synchronization points -------------------------------------------

    fn register_federation_synchronization_point(
        &self,
        label: &str,
        tag: &[u8],
        federate_set: Option<&[FederateHandle]>,
    ) -> RtiResult<()> {
        let label = label.to_string();
        let tag = tag.to_vec();
        let federate_set = federate_set.map(|s| s.to_vec());
        self.with_federation(move |federation, handle, callbacks| {
            let Some(registrar) = federation.federates.get(&handle) else {
                return Err(RtiError::FederateNotExecutionMember);
            };
            let registrar_ambassador = registrar.ambassador.clone();
            if federation.sync_points.contains_key(&label) {
                callbacks.push(Box::new(move || {
                    registrar_ambassador
                        .sync_point_registration_failed(&label, SyncRegistrationFailure::LabelNotUnique);
                }));
                return Ok(());
            }
            let participants: HashSet<FederateHandle> = match &federate_set {
                Some(set) => set.iter().copied().chain([handle]).collect(),
                None => federation.joined().map(|(h, _)| *h).collect(),
            };
            {
                let label = label.clone();
                callbacks.push(Box::new(move || {
                    registrar_ambassador.sync_point_registration_succeeded(&label);
                }));
            }
            for participant in &participants {
                if let Some(fed) = federation.federates.get(participant) {
                    let ambassador = fed.ambassador.clone();
                    let label = label.clone();
                    let tag = tag.clone();
                    callbacks.push(Box::new(move || {
                        ambassador.announce_synchronization_point(&label, &tag);
                    }));
                }
            }
            federation.sync_points.insert(
                label,
                SyncPoint {
                    participants,
                    achieved: HashSet::new(),
                },
            );
            Ok(())
        })
    }

    fn synchronization_point_achieved(&self, label: &str) -> RtiResult<()> {
        let label = label.to_string();
        self.with_federation(move |federation, handle, callbacks| {
            let Some(point) = federation.sync_points.get_mut(&label) else {
                return Err(RtiError::Internal(format!(
                    "achieved unknown sync-point '{}'",
                    label
                )));
            };
            point.achieved.insert(handle);
            check_sync_completion(federation, callbacks);
            Ok(())
        })
    }

    // ---- save / restore ----------------------------------------------------

    fn request_federation_save(&self, label: &str) -> RtiResult<()> {
        let label = label.to_string();
        self.with_federation(move |federation, _, callbacks| {
            if federation.save.is_some() {
                return Err(RtiError::SaveInProgress);
            }
            let outstanding: HashSet<FederateHandle> =
                federation.joined().map(|(h, _)| *h).collect();
            for handle in &outstanding {
                if let Some(fed) = federation.federates.get(handle) {
                    let ambassador = fed.ambassador.clone();
                    let label = label.clone();
                    callbacks.push(Box::new(move || {
                        ambassador.initiate_federate_save(&label);
                    }));
                }
            }
            federation.save = Some(CheckpointOp {
                outstanding,
                success: true,
            });
            Ok(())
        })
    }

    fn federate_save_begun(&self) -> RtiResult<()> {
        self.with_federation(|federation, _, _| {
            if federation.save.is_none() {
                return Err(RtiError::Internal("no federation save in progress".into()));
            }
            Ok(())
        })
    }

    fn federate_save_complete(&self, success: bool) -> RtiResult<()> {
        self.with_federation(move |federation, handle, callbacks| {
            let Some(op) = federation.save.as_mut() else {
                return Err(RtiError::Internal("no federation save in progress".into()));
            };
            op.outstanding.remove(&handle);
            op.success &= success;
            if op.outstanding.is_empty() {
                let success = op.success;
                federation.save = None;
                for (_, fed) in federation.joined() {
                    let ambassador = fed.ambassador.clone();
                    callbacks.push(Box::new(move || {
                        ambassador.federation_saved(success);
                    }));
                }
            }
            Ok(())
        })
    }

    fn request_federation_restore(&self, label: &str) -> RtiResult<()> {
        let label = label.to_string();
        self.with_federation(move |federation, handle, callbacks| {
            if federation.restore.is_some() {
                return Err(RtiError::RestoreInProgress);
            }
            let Some(requester) = federation.federates.get(&handle) else {
                return Err(RtiError::FederateNotExecutionMember);
            };
            let requester_ambassador = requester.ambassador.clone();
            {
                let label = label.clone();
                callbacks.push(Box::new(move || {
                    requester_ambassador.confirm_restore_request(&label, true);
                }));
            }
            let outstanding: HashSet<FederateHandle> =
                federation.joined().map(|(h, _)| *h).collect();
            for &participant in &outstanding {
                if let Some(fed) = federation.federates.get(&participant) {
                    let ambassador = fed.ambassador.clone();
                    let label = label.clone();
                    callbacks.push(Box::new(move || {
                        ambassador.initiate_federate_restore(&label, participant);
                    }));
                }
            }
            federation.restore = Some(CheckpointOp {
                outstanding,
                success: true,
            });
            Ok(())
        })
    }

    fn federate_restore_complete(&self, success: bool) -> RtiResult<()> {
        self.with_federation(move |federation, handle, callbacks| {
            let Some(op) = federation.restore.as_mut() else {
                return Err(RtiError::Internal(
                    "no federation restore in progress".into(),
                ));
            };
            op.outstanding.remove(&handle);
            op.success &= success;
            if op.outstanding.is_empty() {
                let success = op.success;
                federation.restore = None;
                for (_, fed) in federation.joined() {
                    let ambassador = fed.ambassador.clone();
                    callbacks.push(Box::new(move || {
                        ambassador.federation_restored(success);
                    }));
                }
            }
            Ok(())
        })
    }

    // ---- ownership ----------------------------------------------------------

    fn attribute_ownership_acquisition(
        &self,
        instance: ObjectInstanceHandle,
        attributes: &[AttributeHandle],
        _tag: &[u8],
    ) -> RtiResult<()> {
        let attributes = attributes.to_vec();
        self.with_federation(move |federation, handle, callbacks| {
            let Some(object) = federation.objects.get_mut(&instance) else {
                return Err(RtiError::ObjectInstanceNotKnown(instance));
            };
            for &attribute in &attributes {
                object.attribute_owners.insert(attribute, Some(handle));
            }
            if let Some(fed) = federation.federates.get(&handle) {
                let ambassador = fed.ambassador.clone();
                callbacks.push(Box::new(move || {
                    ambassador.attribute_ownership_acquisition_notification(instance, &attributes);
                }));
            }
            Ok(())
        })
    }

    fn unconditional_attribute_ownership_divestiture(
        &self,
        instance: ObjectInstanceHandle,
        attributes: &[AttributeHandle],
    ) -> RtiResult<()> {
        let attributes = attributes.to_vec();
        self.with_federation(move |federation, handle, _| {
            let Some(object) = federation.objects.get_mut(&instance) else {
                return Err(RtiError::ObjectInstanceNotKnown(instance));
            };
            for &attribute in &attributes {
                if object.attribute_owner(attribute) != Some(handle) {
                    return Err(RtiError::AttributeNotOwned);
                }
            }
            for &attribute in &attributes {
                object.attribute_owners.insert(attribute, None);
            }
            Ok(())
        })
    }
}
