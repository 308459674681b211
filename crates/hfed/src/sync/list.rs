// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 hfed contributors

//! An ordered, named group of related sync-points with batch operations.

use super::point::{SyncPoint, SyncPointState};
use crate::rti::RtiAmbassador;
use crate::time::LogicalTime;
use crate::{debug, Error, Result};

/// An ordered sequence of sync-points, each with a unique label within the
/// list. Label uniqueness *across* lists is the manager's concern.
#[derive(Debug, Clone)]
pub struct SyncPointList {
    name: String,
    points: Vec<SyncPoint>,
}

impl SyncPointList {
    pub fn new(name: &str) -> SyncPointList {
        SyncPointList {
            name: name.to_string(),
            points: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Add a point. Fails with [`Error::SyncPointDuplicate`] if the label
    /// already exists in *this* list.
    pub fn add(&mut self, label: &str, time: Option<LogicalTime>) -> Result<()> {
        if self.contains(label) {
            return Err(Error::SyncPointDuplicate(label.to_string()));
        }
        self.points.push(SyncPoint::new(label, time));
        Ok(())
    }

    pub fn contains(&self, label: &str) -> bool {
        self.points.iter().any(|p| p.label() == label)
    }

    pub fn get(&self, label: &str) -> Option<&SyncPoint> {
        self.points.iter().find(|p| p.label() == label)
    }

    pub fn get_mut(&mut self, label: &str) -> Option<&mut SyncPoint> {
        self.points.iter_mut().find(|p| p.label() == label)
    }

    /// Labels in barrier order.
    pub fn labels(&self) -> Vec<String> {
        self.points.iter().map(|p| p.label().to_string()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SyncPoint> {
        self.points.iter()
    }

    /// Invoke RTI registration for every point still in `Exists`.
    ///
    /// Registration is idempotent across federates: a later
    /// `registration_failed[label_not_unique]` callback still counts as
    /// registered. Returns true if at least one registration was issued.
    pub fn register_all(&mut self, rti: &dyn RtiAmbassador) -> Result<bool> {
        let mut any = false;
        for point in &mut self.points {
            if point.state() == SyncPointState::Exists {
                rti.register_federation_synchronization_point(point.label(), &[], None)?;
                point.mark_registered();
                any = true;
                debug!("list '{}': registered sync-point '{}'", self.name, point.label());
            }
        }
        Ok(any)
    }

    /// Report achieved for every announced point.
    pub fn achieve_all(&mut self, rti: &dyn RtiAmbassador) -> Result<()> {
        for point in &mut self.points {
            if point.state() == SyncPointState::Announced {
                rti.synchronization_point_achieved(point.label())?;
                point.mark_achieved();
            }
        }
        Ok(())
    }

    /// True when every point has at least been announced.
    pub fn all_announced(&self) -> bool {
        self.points
            .iter()
            .all(|p| p.state() >= SyncPointState::Announced && p.state() != SyncPointState::Error)
    }

    /// True when every point reached `Synchronized`.
    pub fn all_synchronized(&self) -> bool {
        self.points
            .iter()
            .all(|p| p.state() == SyncPointState::Synchronized)
    }

    /// Serialize labels and states to a flat array of pairs.
    pub fn checkpoint(&self) -> Vec<(String, SyncPointState)> {
        self.points
            .iter()
            .map(|p| (p.label().to_string(), p.state()))
            .collect()
    }

    /// Restore from [`SyncPointList::checkpoint`] output, replacing the
    /// current contents.
    pub fn restore(&mut self, entries: &[(String, SyncPointState)]) {
        self.points.clear();
        for (label, state) in entries {
            let mut point = SyncPoint::new(label, None);
            point.set_state(*state);
            self.points.push(point);
        }
    }

    /// Drop every point (federation shutdown).
    pub fn clear(&mut self) {
        self.points.clear();
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
    use crate::time::Interval;
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Records sync-point calls; every other operation succeeds silently.
    #[derive(Default)]
    struct RecordingRti {
        registered: Mutex<Vec<String>>,
        achieved: Mutex<Vec<String>>,
    }

    impl RtiAmbassador for RecordingRti {
        fn connect(
            &self,
            _ambassador: Arc<dyn FederateAmbassador>,
            _local_settings: &str,
        ) -> RtiResult<()> {
            Ok(())
        }
        fn disconnect(&self) -> RtiResult<()> {
            Ok(())
        }
        fn create_federation_execution(
            &self,
            _name: &str,
            _fom_modules: &[String],
            _mim_module: Option<&str>,
        ) -> RtiResult<()> {
            Ok(())
        }
        fn destroy_federation_execution(&self, _name: &str) -> RtiResult<()> {
            Ok(())
        }
        fn join_federation_execution(
            &self,
            _federate_name: &str,
            _federate_type: &str,
            _federation_name: &str,
        ) -> RtiResult<FederateHandle> {
            Ok(1)
        }
        fn resign_federation_execution(&self, _action: ResignAction) -> RtiResult<()> {
            Ok(())
        }
        fn enable_asynchronous_delivery(&self) -> RtiResult<()> {
            Ok(())
        }
        fn object_class_handle(&self, _name: &str) -> RtiResult<ObjectClassHandle> {
            Ok(1)
        }
        fn attribute_handle(
            &self,
            _class: ObjectClassHandle,
            _name: &str,
        ) -> RtiResult<AttributeHandle> {
            Ok(1)
        }
        fn interaction_class_handle(&self, _name: &str) -> RtiResult<InteractionClassHandle> {
            Ok(1)
        }
        fn parameter_handle(
            &self,
            _class: InteractionClassHandle,
            _name: &str,
        ) -> RtiResult<ParameterHandle> {
            Ok(1)
        }
        fn publish_object_class_attributes(
            &self,
            _class: ObjectClassHandle,
            _attributes: &[AttributeHandle],
        ) -> RtiResult<()> {
            Ok(())
        }
        fn subscribe_object_class_attributes(
            &self,
            _class: ObjectClassHandle,
            _attributes: &[AttributeHandle],
        ) -> RtiResult<()> {
            Ok(())
        }
        fn unsubscribe_object_class(&self, _class: ObjectClassHandle) -> RtiResult<()> {
            Ok(())
        }
        fn register_object_instance(
            &self,
            _class: ObjectClassHandle,
            _name: &str,
        ) -> RtiResult<ObjectInstanceHandle> {
            Ok(1)
        }
        fn update_attribute_values(
            &self,
            _instance: ObjectInstanceHandle,
            _attributes: &AttributeValueMap,
            _tag: &[u8],
            _time: Option<LogicalTime>,
        ) -> RtiResult<()> {
            Ok(())
        }
        fn request_attribute_value_update(
            &self,
            _instance: ObjectInstanceHandle,
            _attributes: &[AttributeHandle],
        ) -> RtiResult<()> {
            Ok(())
        }
        fn publish_interaction_class(&self, _class: InteractionClassHandle) -> RtiResult<()> {
            Ok(())
        }
        fn subscribe_interaction_class(&self, _class: InteractionClassHandle) -> RtiResult<()> {
            Ok(())
        }
        fn send_interaction(
            &self,
            _class: InteractionClassHandle,
            _parameters: &ParameterValueMap,
            _tag: &[u8],
            _time: Option<LogicalTime>,
        ) -> RtiResult<()> {
            Ok(())
        }
        fn enable_time_regulation(&self, _lookahead: Interval) -> RtiResult<()> {
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
        fn time_advance_request(&self, _time: LogicalTime) -> RtiResult<()> {
            Ok(())
        }
        fn query_galt(&self) -> RtiResult<Option<LogicalTime>> {
            Ok(None)
        }
        fn register_federation_synchronization_point(
            &self,
            label: &str,
            _tag: &[u8],
            _federate_set: Option<&[FederateHandle]>,
        ) -> RtiResult<()> {
            self.registered.lock().push(label.to_string());
            Ok(())
        }
        fn synchronization_point_achieved(&self, label: &str) -> RtiResult<()> {
            self.achieved.lock().push(label.to_string());
            Ok(())
        }
        fn request_federation_save(&self, _label: &str) -> RtiResult<()> {
            Ok(())
        }
        fn federate_save_begun(&self) -> RtiResult<()> {
            Ok(())
        }
        fn federate_save_complete(&self, _success: bool) -> RtiResult<()> {
            Ok(())
        }
        fn request_federation_restore(&self, _label: &str) -> RtiResult<()> {
            Ok(())
        }
        fn federate_restore_complete(&self, _success: bool) -> RtiResult<()> {
            Ok(())
        }
        fn attribute_ownership_acquisition(
            &self,
            _instance: ObjectInstanceHandle,
            _attributes: &[AttributeHandle],
            _tag: &[u8],
        ) -> RtiResult<()> {
            Ok(())
        }
        fn unconditional_attribute_ownership_divestiture(
            &self,
            _instance: ObjectInstanceHandle,
            _attributes: &[AttributeHandle],
        ) -> RtiResult<()> {
            Ok(())
        }
    }

    #[test]
    fn test_register_all_covers_only_unregistered_points() {
        let rti = RecordingRti::default();
        let mut list = SyncPointList::new("Init");
        list.add("a", None).unwrap();
        list.add("b", None).unwrap();
        list.get_mut("a").unwrap().mark_registered();

        assert!(list.register_all(&rti).unwrap());
        assert_eq!(*rti.registered.lock(), vec!["b"]);
        // Nothing left in Exists: second pass registers nothing.
        assert!(!list.register_all(&rti).unwrap());
    }

    #[test]
    fn test_achieve_all_covers_only_announced_points() {
        let rti = RecordingRti::default();
        let mut list = SyncPointList::new("Init");
        list.add("a", None).unwrap();
        list.add("b", None).unwrap();
        list.get_mut("a").unwrap().mark_announced();

        list.achieve_all(&rti).unwrap();
        assert_eq!(*rti.achieved.lock(), vec!["a"]);
        assert_eq!(list.get("a").unwrap().state(), SyncPointState::Achieved);
        assert_eq!(list.get("b").unwrap().state(), SyncPointState::Exists);
    }

    #[test]
    fn test_duplicate_label_in_same_list_rejected() {
        let mut list = SyncPointList::new("Init");
        list.add("phase_1", None).unwrap();
        let err = list.add("phase_1", None).unwrap_err();
        assert!(matches!(err, Error::SyncPointDuplicate(_)));
    }

    #[test]
    fn test_all_announced_and_synchronized_predicates() {
        let mut list = SyncPointList::new("Init");
        list.add("a", None).unwrap();
        list.add("b", None).unwrap();
        assert!(!list.all_announced());

        for label in ["a", "b"] {
            let p = list.get_mut(label).unwrap();
            p.mark_announced();
        }
        assert!(list.all_announced());
        assert!(!list.all_synchronized());

        for label in ["a", "b"] {
            let p = list.get_mut(label).unwrap();
            p.mark_achieved();
            p.mark_synchronized();
        }
        assert!(list.all_synchronized());
    }

    #[test]
    fn test_checkpoint_round_trip() {
        let mut list = SyncPointList::new("Init");
        list.add("a", None).unwrap();
        list.add("b", None).unwrap();
        list.get_mut("a").unwrap().mark_announced();

        let snapshot = list.checkpoint();
        let mut restored = SyncPointList::new("Init");
        restored.restore(&snapshot);

        assert_eq!(restored.len(), 2);
        assert_eq!(restored.get("a").unwrap().state(), SyncPointState::Announced);
        assert_eq!(restored.get("b").unwrap().state(), SyncPointState::Exists);
    }

    #[test]
    fn test_labels_preserve_barrier_order() {
        let mut list = SyncPointList::new("Init");
        for label in ["first", "second", "third"] {
            list.add(label, None).unwrap();
        }
        assert_eq!(list.labels(), vec!["first", "second", "third"]);
    }
}
