// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 hfed contributors

//! Registry of named sync-point lists: batch operations, RTI callback
//! dispatch, and the blocking waits.
//!
//! All state changes go through one manager-wide mutex; RTI callbacks may
//! arrive from an RTI dispatch thread concurrent with host-thread commands.
//! The blocking waits use a `Condvar` so the mutex is *not* held across the
//! sleep; every wakeup re-checks the shutdown flag and federation
//! membership and prints a progress summary on the status period.
//!
//! # Lock discipline
//!
//! The manager never calls into the RTI while holding its mutex: commands
//! mark the local state first, release the lock, then issue the RTI call.
//! This keeps the manager safe against RTIs that deliver callbacks
//! synchronously on the calling thread.

use super::list::SyncPointList;
use super::point::SyncPointState;
use crate::config::{POLL_INTERVAL, UNKNOWN_LIST_NAME, WAIT_STATUS_PERIOD};
use crate::federate::RunFlags;
use crate::rti::RtiAmbassador;
use crate::time::LogicalTime;
use crate::{debug, info, warn, Error, Result};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::Instant;

/// What the ambassador must do after handing the manager an announce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnnounceOutcome {
    /// The label was known locally; nothing further to do.
    Known,
    /// The label was filed under the `Unknown` list and locally achieved;
    /// the caller must report achievement to the RTI (outside any lock).
    /// Policy: never block the federation on points we do not recognize.
    AutoAchieve,
}

/// Registry of multiple named sync-point lists.
///
/// Labels are unique across *all* lists managed by one manager.
pub struct SyncPointManager {
    lists: Mutex<Vec<SyncPointList>>,
    changed: Condvar,
    flags: Arc<RunFlags>,
}

impl SyncPointManager {
    /// Create a manager holding only the well-known `Unknown` list.
    pub fn new(flags: Arc<RunFlags>) -> SyncPointManager {
        SyncPointManager {
            lists: Mutex::new(vec![SyncPointList::new(UNKNOWN_LIST_NAME)]),
            changed: Condvar::new(),
            flags,
        }
    }

    /// Add a sync-point to `list_name`, creating the list on first use.
    /// The label must be unique across every list in this manager.
    pub fn add_sync_point(
        &self,
        list_name: &str,
        label: &str,
        time: Option<LogicalTime>,
    ) -> Result<()> {
        let mut lists = self.lists.lock();
        if lists.iter().any(|l| l.contains(label)) {
            return Err(Error::SyncPointDuplicate(label.to_string()));
        }
        if let Some(list) = lists.iter_mut().find(|l| l.name() == list_name) {
            list.add(label, time)?;
        } else {
            let mut list = SyncPointList::new(list_name);
            list.add(label, time)?;
            lists.push(list);
        }
        Ok(())
    }

    /// Current state of a label, searching all lists.
    pub fn state_of(&self, label: &str) -> Option<SyncPointState> {
        let lists = self.lists.lock();
        lists
            .iter()
            .find_map(|l| l.get(label).map(|p| p.state()))
    }

    /// True once the label has been announced (non-blocking poll).
    pub fn is_announced(&self, label: &str) -> bool {
        matches!(
            self.state_of(label),
            Some(state) if state >= SyncPointState::Announced && state != SyncPointState::Error
        )
    }

    /// Labels of one list, in barrier order.
    pub fn labels_of(&self, list_name: &str) -> Vec<String> {
        let lists = self.lists.lock();
        lists
            .iter()
            .find(|l| l.name() == list_name)
            .map(|l| l.labels())
            .unwrap_or_default()
    }

    // ======================================================================
    // Commands (host thread)
    // ======================================================================

    /// Register one label with the RTI. Marks `Registered` locally before
    /// the RTI call so a racing `registration_failed[label_not_unique]`
    /// lands on a consistent state.
    pub fn register_sync_point(&self, label: &str, rti: &dyn RtiAmbassador) -> Result<()> {
        {
            let mut lists = self.lists.lock();
            let point = lists
                .iter_mut()
                .find_map(|l| l.get_mut(label))
                .ok_or_else(|| Error::SyncPointUnknown(label.to_string()))?;
            if point.state() != SyncPointState::Exists {
                // Already registered or further along; registration is
                // idempotent across federates.
                return Ok(());
            }
            point.mark_registered();
            self.changed.notify_all();
        }
        rti.register_federation_synchronization_point(label, &[], None)?;
        Ok(())
    }

    /// Register every point of `list_name` still in `Exists`. Returns true
    /// if at least one registration was issued.
    pub fn register_all(&self, list_name: &str, rti: &dyn RtiAmbassador) -> Result<bool> {
        let pending: Vec<String> = {
            let mut lists = self.lists.lock();
            let Some(list) = lists.iter_mut().find(|l| l.name() == list_name) else {
                return Ok(false);
            };
            let pending: Vec<String> = list
                .iter()
                .filter(|p| p.state() == SyncPointState::Exists)
                .map(|p| p.label().to_string())
                .collect();
            for label in &pending {
                if let Some(point) = list.get_mut(label) {
                    point.mark_registered();
                }
            }
            if !pending.is_empty() {
                self.changed.notify_all();
            }
            pending
        };
        for label in &pending {
            rti.register_federation_synchronization_point(label, &[], None)?;
            debug!("registered sync-point '{}' (list '{}')", label, list_name);
        }
        Ok(!pending.is_empty())
    }

    /// Report one announced label achieved. Idempotent: a second call on an
    /// achieved or synchronized point is a no-op.
    pub fn achieve(&self, label: &str, rti: &dyn RtiAmbassador) -> Result<()> {
        {
            let mut lists = self.lists.lock();
            let point = lists
                .iter_mut()
                .find_map(|l| l.get_mut(label))
                .ok_or_else(|| Error::SyncPointUnknown(label.to_string()))?;
            match point.state() {
                SyncPointState::Achieved | SyncPointState::Synchronized => return Ok(()),
                SyncPointState::Announced => {
                    point.mark_achieved();
                    self.changed.notify_all();
                }
                other => {
                    warn!(
                        "achieve('{}') before announce (state {:?}); ignored",
                        label, other
                    );
                    return Ok(());
                }
            }
        }
        rti.synchronization_point_achieved(label)?;
        Ok(())
    }

    /// Achieve every announced point of `list_name`.
    pub fn achieve_all(&self, list_name: &str, rti: &dyn RtiAmbassador) -> Result<()> {
        for label in self.labels_of(list_name) {
            self.achieve(&label, rti)?;
        }
        Ok(())
    }

    // ======================================================================
    // Blocking waits (host thread)
    // ======================================================================

    /// Block until `label` reaches at least `Announced`.
    pub fn wait_for_announced(&self, label: &str) -> Result<()> {
        let mut lists = self.lists.lock();
        let mut last_status = Instant::now();
        loop {
            let state = lists
                .iter()
                .find_map(|l| l.get(label).map(|p| p.state()))
                .ok_or_else(|| Error::SyncPointUnknown(label.to_string()))?;
            match state {
                SyncPointState::Error => {
                    return Err(Error::SyncPointError(label.to_string()));
                }
                s if s >= SyncPointState::Announced => return Ok(()),
                _ => {}
            }
            // The mutex is released for the duration of the timed wait.
            self.changed.wait_for(&mut lists, POLL_INTERVAL);
            self.flags.check_wait_abort()?;
            if last_status.elapsed() >= WAIT_STATUS_PERIOD {
                info!("waiting for announce of sync-point '{}'", label);
                last_status = Instant::now();
            }
        }
    }

    /// Block until `label` reaches `Synchronized`, then atomically reset it
    /// to `Exists` (the barrier is consumed).
    pub fn wait_for_synchronized(&self, label: &str) -> Result<()> {
        let mut lists = self.lists.lock();
        let mut last_status = Instant::now();
        loop {
            {
                let point = lists
                    .iter_mut()
                    .find_map(|l| l.get_mut(label))
                    .ok_or_else(|| Error::SyncPointUnknown(label.to_string()))?;
                match point.state() {
                    SyncPointState::Synchronized => {
                        point.reset();
                        self.changed.notify_all();
                        return Ok(());
                    }
                    SyncPointState::Error => {
                        return Err(Error::SyncPointError(label.to_string()));
                    }
                    _ => {}
                }
            }
            self.changed.wait_for(&mut lists, POLL_INTERVAL);
            self.flags.check_wait_abort()?;
            if last_status.elapsed() >= WAIT_STATUS_PERIOD {
                info!("waiting for synchronization of sync-point '{}'", label);
                last_status = Instant::now();
            }
        }
    }

    /// Wait for every point of the list to be announced. The manager mutex
    /// is only held briefly between the inner waits.
    pub fn wait_for_all_announced(&self, list_name: &str) -> Result<()> {
        for label in self.labels_of(list_name) {
            self.wait_for_announced(&label)?;
        }
        Ok(())
    }

    /// Wait for every point of the list to synchronize, consuming each
    /// barrier as it completes.
    pub fn wait_for_all_synchronized(&self, list_name: &str) -> Result<()> {
        for label in self.labels_of(list_name) {
            self.wait_for_synchronized(&label)?;
        }
        Ok(())
    }

    // ======================================================================
    // RTI callback dispatch (RTI thread)
    // ======================================================================

    /// `synchronizationPointRegistrationSucceeded`. Fatal if unknown.
    pub fn on_registration_succeeded(&self, label: &str) -> Result<()> {
        let mut lists = self.lists.lock();
        let point = lists
            .iter_mut()
            .find_map(|l| l.get_mut(label))
            .ok_or_else(|| Error::SyncPointUnknown(label.to_string()))?;
        point.mark_registered();
        self.changed.notify_all();
        Ok(())
    }

    /// `synchronizationPointRegistrationFailed`.
    ///
    /// `label_not_unique` means a peer registered the barrier first, which
    /// is success for our purposes. Any other reason poisons a known point;
    /// an unknown point is filed under `Unknown` (someone else owns it).
    pub fn on_registration_failed(&self, label: &str, not_unique: bool) {
        let mut lists = self.lists.lock();
        let known = lists.iter_mut().find_map(|l| l.get_mut(label));
        match known {
            Some(point) => {
                if not_unique {
                    point.mark_registered();
                } else {
                    warn!("sync-point '{}' registration failed", label);
                    point.mark_error();
                }
            }
            None => {
                debug!(
                    "registration_failed for unknown label '{}'; filing under '{}'",
                    label, UNKNOWN_LIST_NAME
                );
                Self::file_unknown(&mut lists, label);
            }
        }
        self.changed.notify_all();
    }

    /// `announceSynchronizationPoint`.
    pub fn on_announced(&self, label: &str) -> AnnounceOutcome {
        let mut lists = self.lists.lock();
        if let Some(point) = lists.iter_mut().find_map(|l| l.get_mut(label)) {
            point.mark_announced();
            self.changed.notify_all();
            return AnnounceOutcome::Known;
        }
        info!(
            "announced sync-point '{}' is not locally declared; auto-achieving",
            label
        );
        let point = Self::file_unknown(&mut lists, label);
        point.mark_announced();
        point.mark_achieved();
        self.changed.notify_all();
        AnnounceOutcome::AutoAchieve
    }

    /// `federationSynchronized`. Fatal if unknown.
    pub fn on_federation_synchronized(&self, label: &str) -> Result<()> {
        let mut lists = self.lists.lock();
        let point = lists
            .iter_mut()
            .find_map(|l| l.get_mut(label))
            .ok_or_else(|| Error::SyncPointUnknown(label.to_string()))?;
        point.mark_synchronized();
        self.changed.notify_all();
        Ok(())
    }

    // ======================================================================
    // Checkpoint
    // ======================================================================

    /// Serialize one list to a flat array of (label, state) pairs.
    pub fn checkpoint(&self, list_name: &str) -> Option<Vec<(String, SyncPointState)>> {
        let lists = self.lists.lock();
        lists
            .iter()
            .find(|l| l.name() == list_name)
            .map(|l| l.checkpoint())
    }

    /// Restore one list from checkpoint pairs, creating it if missing.
    pub fn restore(&self, list_name: &str, entries: &[(String, SyncPointState)]) {
        let mut lists = self.lists.lock();
        if let Some(list) = lists.iter_mut().find(|l| l.name() == list_name) {
            list.restore(entries);
        } else {
            let mut list = SyncPointList::new(list_name);
            list.restore(entries);
            lists.push(list);
        }
        self.changed.notify_all();
    }

    /// Drop every sync-point in every list (federation shutdown).
    pub fn clear_all(&self) {
        let mut lists = self.lists.lock();
        for list in lists.iter_mut() {
            list.clear();
        }
        self.changed.notify_all();
    }

    fn file_unknown<'a>(
        lists: &'a mut Vec<SyncPointList>,
        label: &str,
    ) -> &'a mut super::point::SyncPoint {
        let index = lists
            .iter()
            .position(|l| l.name() == UNKNOWN_LIST_NAME)
            .unwrap_or_else(|| {
                lists.push(SyncPointList::new(UNKNOWN_LIST_NAME));
                lists.len() - 1
            });
        // The label cannot already be present; callers checked all lists.
        let _ = lists[index].add(label, None);
        lists[index]
            .get_mut(label)
            .expect("just inserted into unknown list")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    fn manager() -> (Arc<SyncPointManager>, Arc<RunFlags>) {
        let flags = Arc::new(RunFlags::new());
        flags.set_joined(true);
        (Arc::new(SyncPointManager::new(flags.clone())), flags)
    }

    #[test]
    fn test_label_unique_across_lists() {
        let (mgr, _flags) = manager();
        mgr.add_sync_point("Init", "phase_1", None).unwrap();
        let err = mgr.add_sync_point("Runtime", "phase_1", None).unwrap_err();
        assert!(matches!(err, Error::SyncPointDuplicate(_)));
    }

    #[test]
    fn test_unknown_announce_is_auto_achieved() {
        let (mgr, _flags) = manager();
        let outcome = mgr.on_announced("custom_phase");
        assert_eq!(outcome, AnnounceOutcome::AutoAchieve);
        assert_eq!(mgr.state_of("custom_phase"), Some(SyncPointState::Achieved));
        // The point landed in the Unknown list.
        assert_eq!(mgr.labels_of(UNKNOWN_LIST_NAME), vec!["custom_phase"]);
    }

    #[test]
    fn test_registration_failed_not_unique_counts_as_registered() {
        let (mgr, _flags) = manager();
        mgr.add_sync_point("Init", "phase_1", None).unwrap();
        mgr.on_registration_failed("phase_1", true);
        assert_eq!(mgr.state_of("phase_1"), Some(SyncPointState::Registered));
    }

    #[test]
    fn test_registration_failed_other_poisons_point() {
        let (mgr, _flags) = manager();
        mgr.add_sync_point("Init", "phase_1", None).unwrap();
        mgr.on_registration_failed("phase_1", false);
        assert_eq!(mgr.state_of("phase_1"), Some(SyncPointState::Error));
        assert!(matches!(
            mgr.wait_for_announced("phase_1"),
            Err(Error::SyncPointError(_))
        ));
    }

    #[test]
    fn test_federation_synchronized_unknown_label_is_fatal() {
        let (mgr, _flags) = manager();
        assert!(matches!(
            mgr.on_federation_synchronized("nobody"),
            Err(Error::SyncPointUnknown(_))
        ));
    }

    #[test]
    fn test_wait_for_announced_wakes_on_callback() {
        let (mgr, _flags) = manager();
        mgr.add_sync_point("Init", "phase_1", None).unwrap();

        let mgr2 = mgr.clone();
        let announcer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            mgr2.on_registration_succeeded("phase_1").unwrap();
            assert_eq!(mgr2.on_announced("phase_1"), AnnounceOutcome::Known);
        });

        mgr.wait_for_announced("phase_1").unwrap();
        assert_eq!(mgr.state_of("phase_1"), Some(SyncPointState::Announced));
        announcer.join().unwrap();
    }

    #[test]
    fn test_wait_for_synchronized_consumes_barrier() {
        let (mgr, _flags) = manager();
        mgr.add_sync_point("Init", "phase_1", None).unwrap();
        mgr.on_announced("phase_1");
        {
            // Simulate the local achieve without an RTI.
            let mut lists = mgr.lists.lock();
            lists
                .iter_mut()
                .find_map(|l| l.get_mut("phase_1"))
                .unwrap()
                .mark_achieved();
        }
        let mgr2 = mgr.clone();
        let synchronizer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            mgr2.on_federation_synchronized("phase_1").unwrap();
        });

        mgr.wait_for_synchronized("phase_1").unwrap();
        // Barrier consumed: recycled to Exists for reuse.
        assert_eq!(mgr.state_of("phase_1"), Some(SyncPointState::Exists));
        synchronizer.join().unwrap();
    }

    #[test]
    fn test_wait_aborts_on_shutdown() {
        let (mgr, flags) = manager();
        mgr.add_sync_point("Init", "phase_1", None).unwrap();

        let flags2 = flags.clone();
        let aborter = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            flags2.request_shutdown();
        });

        assert!(matches!(
            mgr.wait_for_announced("phase_1"),
            Err(Error::ShutdownRequested)
        ));
        aborter.join().unwrap();
    }

    #[test]
    fn test_wait_aborts_on_membership_loss() {
        let (mgr, flags) = manager();
        mgr.add_sync_point("Init", "phase_1", None).unwrap();

        let flags2 = flags.clone();
        let aborter = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            flags2.set_joined(false);
        });

        assert!(matches!(
            mgr.wait_for_announced("phase_1"),
            Err(Error::NotExecutionMember)
        ));
        aborter.join().unwrap();
    }
}
