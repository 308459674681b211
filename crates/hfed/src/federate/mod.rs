// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 hfed contributors

//! Federate-level services: run/membership flags, the joined-federate
//! roster, connection and federation lifecycle, and the save/restore and
//! time-advance state machines.

mod ambassador;
mod save_restore;
mod time_mgmt;

pub use ambassador::CoreAmbassador;
pub use save_restore::{
    read_running_feds, write_running_feds, RosterEntry, SaveRestoreState, SaveRestoreTracker,
};
pub use time_mgmt::TimeManager;

use crate::config::{
    FederateConfig, CONNECT_RETRY_BACKOFF, CONNECT_RETRY_COUNT, POLL_INTERVAL,
    RUNNING_FEDS_EXTENSION, WAIT_STATUS_PERIOD,
};
use crate::rti::{
    FederateAmbassador, FederateHandle, FomHandles, ObjectInstanceHandle, ResignAction,
    RtiAmbassador, RtiError,
};
use crate::{debug, info, warn, Error, Result};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread;
use std::time::Instant;

/// Cross-thread run state: shutdown requests and federation membership.
///
/// Every blocking wait in the crate polls these flags so a shutdown request
/// or a membership loss unblocks the host thread promptly.
#[derive(Default)]
pub struct RunFlags {
    shutdown: AtomicBool,
    joined: AtomicBool,
}

impl RunFlags {
    pub fn new() -> RunFlags {
        RunFlags::default()
    }

    /// Request shutdown; every blocking wait aborts on its next poll.
    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    pub fn shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    pub fn set_joined(&self, joined: bool) {
        self.joined.store(joined, Ordering::SeqCst);
    }

    pub fn is_joined(&self) -> bool {
        self.joined.load(Ordering::SeqCst)
    }

    /// Abort check used inside blocking waits.
    pub fn check_wait_abort(&self) -> Result<()> {
        if self.shutdown_requested() {
            return Err(Error::ShutdownRequested);
        }
        if !self.is_joined() {
            return Err(Error::NotExecutionMember);
        }
        Ok(())
    }
}

/// One joined federate as seen through MOM introspection.
#[derive(Debug, Clone)]
pub struct DiscoveredFederate {
    pub instance: ObjectInstanceHandle,
    pub handle: Option<FederateHandle>,
    pub name: String,
    pub federate_type: String,
}

/// Live roster of joined federates, keyed by MOM object instance so repeat
/// discoveries and reflections collapse onto one entry.
#[derive(Default)]
pub struct Membership {
    federates: DashMap<ObjectInstanceHandle, DiscoveredFederate>,
}

impl Membership {
    pub fn new() -> Membership {
        Membership::default()
    }

    /// Record a discovered MOM federate instance. The name and type arrive
    /// with the first reflection; until then the entry is a placeholder.
    pub fn discover(&self, instance: ObjectInstanceHandle) {
        self.federates
            .entry(instance)
            .or_insert_with(|| DiscoveredFederate {
                instance,
                handle: None,
                name: String::new(),
                federate_type: String::new(),
            });
    }

    /// Apply reflected MOM attributes onto the entry for `instance`.
    pub fn update(
        &self,
        instance: ObjectInstanceHandle,
        handle: Option<FederateHandle>,
        name: Option<String>,
        federate_type: Option<String>,
    ) {
        let mut entry = self
            .federates
            .entry(instance)
            .or_insert_with(|| DiscoveredFederate {
                instance,
                handle: None,
                name: String::new(),
                federate_type: String::new(),
            });
        if let Some(handle) = handle {
            entry.handle = Some(handle);
        }
        if let Some(name) = name {
            entry.name = name;
        }
        if let Some(federate_type) = federate_type {
            entry.federate_type = federate_type;
        }
    }

    /// Remove the federate behind a deleted MOM instance.
    pub fn remove(&self, instance: ObjectInstanceHandle) {
        self.federates.remove(&instance);
    }

    pub fn len(&self) -> usize {
        self.federates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.federates.is_empty()
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.federates.iter().any(|e| e.name == name)
    }

    /// Names of all roster entries whose reflections have arrived.
    pub fn names(&self) -> Vec<String> {
        self.federates
            .iter()
            .filter(|e| !e.name.is_empty())
            .map(|e| e.name.clone())
            .collect()
    }

    /// Snapshot of the full roster.
    pub fn snapshot(&self) -> Vec<DiscoveredFederate> {
        self.federates.iter().map(|e| e.clone()).collect()
    }
}

/// Path of the membership sidecar for checkpoint `label` under `dir`.
pub fn running_feds_path(dir: &Path, label: &str) -> PathBuf {
    dir.join(format!("{label}.{RUNNING_FEDS_EXTENSION}"))
}

/// One federate's connection, membership, and lifecycle against the RTI.
pub struct Federate {
    config: FederateConfig,
    rti: Arc<dyn RtiAmbassador>,
    flags: Arc<RunFlags>,
    time: Arc<TimeManager>,
    membership: Arc<Membership>,
    save_restore: Arc<SaveRestoreTracker>,
    fom: Arc<OnceLock<FomHandles>>,
    handle: Mutex<Option<FederateHandle>>,
    created_federation: AtomicBool,
}

impl Federate {
    pub fn new(
        config: FederateConfig,
        rti: Arc<dyn RtiAmbassador>,
        flags: Arc<RunFlags>,
        time: Arc<TimeManager>,
        membership: Arc<Membership>,
        save_restore: Arc<SaveRestoreTracker>,
        fom: Arc<OnceLock<FomHandles>>,
    ) -> Federate {
        Federate {
            config,
            rti,
            flags,
            time,
            membership,
            save_restore,
            fom,
            handle: Mutex::new(None),
            created_federation: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.config.federate_name
    }

    pub fn handle(&self) -> Option<FederateHandle> {
        *self.handle.lock()
    }

    pub fn time(&self) -> &Arc<TimeManager> {
        &self.time
    }

    pub fn membership(&self) -> &Arc<Membership> {
        &self.membership
    }

    /// True if this federate created the federation execution (first-to-
    /// create master election reads this).
    pub fn created_federation(&self) -> bool {
        self.created_federation.load(Ordering::SeqCst)
    }

    /// Connect to the RTI, retrying on failure with a fixed backoff.
    pub fn connect(&self, ambassador: Arc<dyn FederateAmbassador>) -> Result<()> {
        let mut cause = String::new();
        for attempt in 1..=CONNECT_RETRY_COUNT {
            match self
                .rti
                .connect(ambassador.clone(), &self.config.local_settings)
            {
                Ok(()) => {
                    info!("federate '{}' connected to the RTI", self.name());
                    return Ok(());
                }
                Err(e) => {
                    warn!(
                        "RTI connection attempt {}/{} failed: {}",
                        attempt, CONNECT_RETRY_COUNT, e
                    );
                    cause = e.to_string();
                    if attempt < CONNECT_RETRY_COUNT {
                        thread::sleep(CONNECT_RETRY_BACKOFF);
                    }
                }
            }
        }
        Err(Error::ConnectionFailed {
            attempts: CONNECT_RETRY_COUNT,
            cause,
        })
    }

    /// Create the federation execution (tolerating a racing creator) and
    /// join it.
    pub fn create_and_join(&self) -> Result<FederateHandle> {
        match self
            .rti
            .create_federation_execution(&self.config.federation_name, &[], None)
        {
            Ok(()) => {
                self.created_federation.store(true, Ordering::SeqCst);
                info!(
                    "created federation execution '{}'",
                    self.config.federation_name
                );
            }
            Err(RtiError::FederationExecutionAlreadyExists) => {
                debug!(
                    "federation execution '{}' already exists",
                    self.config.federation_name
                );
            }
            Err(e) => return Err(e.into()),
        }
        let handle = self
            .rti
            .join_federation_execution(
                &self.config.federate_name,
                &self.config.federate_type,
                &self.config.federation_name,
            )
            .map_err(|e| Error::JoinFailed(e.to_string()))?;
        *self.handle.lock() = Some(handle);
        self.flags.set_joined(true);
        info!(
            "federate '{}' joined '{}' with handle {}",
            self.config.federate_name, self.config.federation_name, handle
        );
        Ok(handle)
    }

    /// Resolve FOM and MOM handles and subscribe to MOM federate
    /// introspection. Must follow a successful join.
    pub fn initialize_handles(&self) -> Result<()> {
        let handles = FomHandles::resolve(self.rti.as_ref())?;
        let mom_attrs = [
            handles.mom_federate_handle_attr,
            handles.mom_federate_name_attr,
            handles.mom_federate_type_attr,
        ];
        let mom_class = handles.mom_federate_class;
        // The ambassador decodes reflections only once the handles are
        // published, so set before subscribing.
        let _ = self.fom.set(handles);
        self.rti.enable_asynchronous_delivery()?;
        self.rti
            .subscribe_object_class_attributes(mom_class, &mom_attrs)?;
        Ok(())
    }

    pub fn fom(&self) -> Option<&FomHandles> {
        self.fom.get()
    }

    /// Enable HLA time regulation and constraint per configuration.
    pub fn setup_time_management(&self) -> Result<()> {
        if !self.config.time_management {
            debug!("time management disabled by configuration");
            return Ok(());
        }
        if self.config.time_regulating {
            self.time.setup_time_regulation(self.rti.as_ref())?;
        }
        if self.config.time_constrained {
            self.time.setup_time_constrained(self.rti.as_ref())?;
        }
        Ok(())
    }

    /// Block until every required federate appears in the MOM roster.
    pub fn wait_for_required_federates(&self) -> Result<()> {
        let required: Vec<&str> = self
            .config
            .known_federates
            .iter()
            .filter(|f| f.required)
            .map(|f| f.name.as_str())
            .collect();
        if required.is_empty() {
            return Ok(());
        }
        let mut last_status = Instant::now();
        loop {
            let missing: Vec<&str> = required
                .iter()
                .copied()
                .filter(|name| !self.membership.contains_name(name))
                .collect();
            if missing.is_empty() {
                info!("all {} required federates joined", required.len());
                return Ok(());
            }
            self.flags.check_wait_abort()?;
            if last_status.elapsed() >= WAIT_STATUS_PERIOD {
                info!(
                    "waiting for {} required federate(s): {}",
                    missing.len(),
                    missing.join(", ")
                );
                last_status = Instant::now();
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    /// Resign from the federation. Rejoin-capable federates divest their
    /// attributes; others delete their owned instances.
    pub fn resign(&self) -> Result<()> {
        if self.config.time_management {
            if self.config.time_regulating {
                if let Err(e) = self.rti.disable_time_regulation() {
                    debug!("disable_time_regulation on resign: {}", e);
                }
            }
            if self.config.time_constrained {
                if let Err(e) = self.rti.disable_time_constrained() {
                    debug!("disable_time_constrained on resign: {}", e);
                }
            }
        }
        let action = if self.config.can_rejoin_federation {
            ResignAction::UnconditionallyDivest
        } else {
            ResignAction::DeleteObjects
        };
        self.rti.resign_federation_execution(action)?;
        self.flags.set_joined(false);
        *self.handle.lock() = None;
        info!(
            "federate '{}' resigned from '{}'",
            self.config.federate_name, self.config.federation_name
        );
        Ok(())
    }

    /// Destroy the federation execution. Remaining members are expected
    /// when we are not the last one out; both outcomes are success.
    pub fn destroy(&self) -> Result<()> {
        match self
            .rti
            .destroy_federation_execution(&self.config.federation_name)
        {
            Ok(()) => info!(
                "destroyed federation execution '{}'",
                self.config.federation_name
            ),
            Err(RtiError::FederatesCurrentlyJoined) => debug!(
                "federation '{}' still has joined members; not destroyed",
                self.config.federation_name
            ),
            Err(RtiError::FederationExecutionDoesNotExist) => debug!(
                "federation '{}' already destroyed",
                self.config.federation_name
            ),
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }

    // =====================================================================
    // Save / restore
    // =====================================================================

    /// Roster entries recorded alongside a checkpoint: every joined
    /// federate, with its required flag from the startup configuration.
    fn roster_entries(&self) -> Vec<RosterEntry> {
        self.membership
            .snapshot()
            .into_iter()
            .filter(|f| !f.name.is_empty())
            .map(|f| RosterEntry {
                required: self
                    .config
                    .known_federates
                    .iter()
                    .any(|k| k.required && k.name == f.name),
                name: f.name,
                federate_type: f.federate_type,
            })
            .collect()
    }

    /// Run a federation-wide save labelled `label`, writing the membership
    /// sidecar under `dir` first.
    pub fn save_checkpoint(&self, label: &str, dir: &Path) -> Result<()> {
        let entries = self.roster_entries();
        write_running_feds(&running_feds_path(dir, label), &entries)?;
        self.save_restore.arm();
        match self.rti.request_federation_save(label) {
            Ok(()) => {}
            // A peer requested the same federation-wide save; join it.
            Err(RtiError::SaveInProgress) => {
                debug!("joining the federation save already in flight");
            }
            Err(e) => return Err(e.into()),
        }
        self.save_restore
            .wait_until(&[SaveRestoreState::Initiate])?;
        self.rti.federate_save_begun()?;
        // The core has no per-frame state to dump; the host's own checkpoint
        // rides on the same label.
        self.rti.federate_save_complete(true)?;
        let outcome = self
            .save_restore
            .wait_until(&[SaveRestoreState::Complete, SaveRestoreState::Failed])?;
        self.save_restore.reset();
        if outcome == SaveRestoreState::Failed {
            return Err(Error::SaveFailed(label.to_string()));
        }
        info!("federation save '{}' complete", label);
        Ok(())
    }

    /// Run a federation-wide restore of checkpoint `label`, refusing to
    /// proceed when the live roster disagrees with the recorded sidecar.
    pub fn restore_checkpoint(&self, label: &str, dir: &Path) -> Result<()> {
        let recorded = read_running_feds(&running_feds_path(dir, label))?;
        save_restore::verify_roster(&recorded, &self.roster_entries())?;
        self.save_restore.arm();
        let requested = match self.rti.request_federation_restore(label) {
            Ok(()) => true,
            // A peer requested the same federation-wide restore; join it.
            Err(RtiError::RestoreInProgress) => {
                debug!("joining the federation restore already in flight");
                false
            }
            Err(e) => return Err(e.into()),
        };
        if requested {
            // The confirmation and the initiation may arrive back-to-back.
            let confirmed = self.save_restore.wait_until(&[
                SaveRestoreState::RequestSucceeded,
                SaveRestoreState::RequestFailed,
                SaveRestoreState::Initiate,
            ])?;
            if confirmed == SaveRestoreState::RequestFailed {
                self.save_restore.reset();
                return Err(Error::RestoreFailed(label.to_string()));
            }
        }
        self.save_restore
            .wait_until(&[SaveRestoreState::Initiate])?;
        self.save_restore.set(SaveRestoreState::InProgress);
        self.rti.federate_restore_complete(true)?;
        let outcome = self
            .save_restore
            .wait_until(&[SaveRestoreState::Complete, SaveRestoreState::Failed])?;
        self.save_restore.reset();
        if outcome == SaveRestoreState::Failed {
            return Err(Error::RestoreFailed(label.to_string()));
        }
        info!("federation restore '{}' complete", label);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_flags_abort_reasons() {
        let flags = RunFlags::new();
        // Not joined yet: waits must abort with membership loss.
        assert!(matches!(
            flags.check_wait_abort(),
            Err(Error::NotExecutionMember)
        ));
        flags.set_joined(true);
        assert!(flags.check_wait_abort().is_ok());
        // Shutdown takes precedence over membership.
        flags.request_shutdown();
        assert!(matches!(
            flags.check_wait_abort(),
            Err(Error::ShutdownRequested)
        ));
    }

    #[test]
    fn test_membership_collapses_duplicates() {
        let membership = Membership::new();
        membership.discover(42);
        membership.discover(42);
        assert_eq!(membership.len(), 1);

        membership.update(42, Some(3), Some("fed_b".into()), Some("sim".into()));
        // A repeated partial reflection keeps earlier fields.
        membership.update(42, None, None, None);
        assert!(membership.contains_name("fed_b"));
        let entry = &membership.snapshot()[0];
        assert_eq!(entry.handle, Some(3));
        assert_eq!(entry.federate_type, "sim");

        membership.remove(42);
        assert!(membership.is_empty());
    }

    #[test]
    fn test_running_feds_path_layout() {
        let path = running_feds_path(Path::new("/tmp/ckpt"), "run_042");
        assert_eq!(path, Path::new("/tmp/ckpt/run_042.running_feds"));
    }
}
