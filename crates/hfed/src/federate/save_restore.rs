// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 hfed contributors

//! Federation save/restore state machine and the `.running_feds` sidecar.
//!
//! A checkpoint is only restorable into the federation composition it was
//! taken from, so every save writes a sidecar recording the joined
//! federates. Restore refuses to proceed when the live roster disagrees.

use crate::config::{POLL_INTERVAL, WAIT_STATUS_PERIOD};
use crate::federate::RunFlags;
use crate::{info, Error, Result};
use parking_lot::{Condvar, Mutex};
use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

/// Progress of a federation save or restore, driven by RTI callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveRestoreState {
    /// No save or restore in flight.
    NoRestore,
    /// The RTI rejected the restore request.
    RequestFailed,
    /// The RTI accepted the restore request.
    RequestSucceeded,
    /// The RTI told this federate to begin (save or restore).
    Initiate,
    /// This federate is applying the checkpoint.
    InProgress,
    /// The federation-wide operation completed successfully.
    Complete,
    /// The federation-wide operation failed.
    Failed,
}

/// Shared save/restore progress, written by RTI callbacks and awaited by
/// the host thread.
pub struct SaveRestoreTracker {
    state: Mutex<SaveRestoreState>,
    changed: Condvar,
    flags: Arc<RunFlags>,
}

impl SaveRestoreTracker {
    pub fn new(flags: Arc<RunFlags>) -> SaveRestoreTracker {
        SaveRestoreTracker {
            state: Mutex::new(SaveRestoreState::NoRestore),
            changed: Condvar::new(),
            flags,
        }
    }

    pub fn state(&self) -> SaveRestoreState {
        *self.state.lock()
    }

    /// Clear a finished or failed operation before issuing a request. An
    /// `Initiate` already delivered by a peer's request is preserved so the
    /// two requesters join the same federation-wide operation.
    pub fn arm(&self) {
        let mut state = self.state.lock();
        if matches!(
            *state,
            SaveRestoreState::Complete | SaveRestoreState::Failed | SaveRestoreState::RequestFailed
        ) {
            *state = SaveRestoreState::NoRestore;
        }
        self.changed.notify_all();
    }

    pub fn reset(&self) {
        *self.state.lock() = SaveRestoreState::NoRestore;
        self.changed.notify_all();
    }

    /// Record a state change (RTI callback thread).
    pub fn set(&self, state: SaveRestoreState) {
        *self.state.lock() = state;
        self.changed.notify_all();
    }

    /// Block until the state reaches one of `targets`.
    pub fn wait_until(&self, targets: &[SaveRestoreState]) -> Result<SaveRestoreState> {
        let mut state = self.state.lock();
        let mut last_status = Instant::now();
        loop {
            if targets.contains(&*state) {
                return Ok(*state);
            }
            self.changed.wait_for(&mut state, POLL_INTERVAL);
            self.flags.check_wait_abort()?;
            if last_status.elapsed() >= WAIT_STATUS_PERIOD {
                info!(
                    "waiting for save/restore progress (currently {:?})",
                    *state
                );
                last_status = Instant::now();
            }
        }
    }
}

/// One sidecar line: a federate that was joined when the checkpoint was
/// taken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    pub name: String,
    pub federate_type: String,
    pub required: bool,
}

/// Write the membership sidecar: one tab-separated line per federate.
pub fn write_running_feds(path: &Path, entries: &[RosterEntry]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = fs::File::create(path)?;
    for entry in entries {
        writeln!(
            file,
            "{}\t{}\t{}",
            entry.name,
            entry.federate_type,
            if entry.required { 1 } else { 0 }
        )?;
    }
    file.sync_all()?;
    Ok(())
}

/// Read a membership sidecar written by [`write_running_feds`].
pub fn read_running_feds(path: &Path) -> Result<Vec<RosterEntry>> {
    let text = fs::read_to_string(path)?;
    let mut entries = Vec::new();
    for (number, line) in text.lines().enumerate() {
        if line.is_empty() {
            continue;
        }
        let mut fields = line.split('\t');
        let (Some(name), Some(federate_type), Some(required)) =
            (fields.next(), fields.next(), fields.next())
        else {
            return Err(Error::RestoreMismatch(format!(
                "malformed sidecar line {} in {}",
                number + 1,
                path.display()
            )));
        };
        entries.push(RosterEntry {
            name: name.to_string(),
            federate_type: federate_type.to_string(),
            required: required == "1",
        });
    }
    Ok(entries)
}

/// Check a recorded sidecar roster against the live roster. Every recorded
/// federate must be joined with the same type, and no extra federate may
/// have appeared.
pub fn verify_roster(recorded: &[RosterEntry], live: &[RosterEntry]) -> Result<()> {
    for entry in recorded {
        match live.iter().find(|l| l.name == entry.name) {
            None => {
                return Err(Error::RestoreMismatch(format!(
                    "recorded federate '{}' is not joined",
                    entry.name
                )));
            }
            Some(l) if l.federate_type != entry.federate_type => {
                return Err(Error::RestoreMismatch(format!(
                    "federate '{}' type changed: '{}' recorded, '{}' joined",
                    entry.name, entry.federate_type, l.federate_type
                )));
            }
            Some(_) => {}
        }
    }
    for entry in live {
        if !recorded.iter().any(|r| r.name == entry.name) {
            return Err(Error::RestoreMismatch(format!(
                "federate '{}' joined after the checkpoint was taken",
                entry.name
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    fn roster() -> Vec<RosterEntry> {
        vec![
            RosterEntry {
                name: "fed_a".into(),
                federate_type: "sim".into(),
                required: true,
            },
            RosterEntry {
                name: "fed_b".into(),
                federate_type: "viewer".into(),
                required: false,
            },
        ]
    }

    #[test]
    fn test_sidecar_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ckpt_1.running_feds");
        let entries = roster();
        write_running_feds(&path, &entries).unwrap();
        assert_eq!(read_running_feds(&path).unwrap(), entries);
    }

    #[test]
    fn test_malformed_sidecar_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.running_feds");
        fs::write(&path, "fed_a\tsim\n").unwrap(); // missing required field
        assert!(matches!(
            read_running_feds(&path),
            Err(Error::RestoreMismatch(_))
        ));
    }

    #[test]
    fn test_verify_roster_detects_drift() {
        let recorded = roster();
        assert!(verify_roster(&recorded, &recorded).is_ok());

        // A recorded federate left.
        let mut live = roster();
        live.remove(1);
        assert!(matches!(
            verify_roster(&recorded, &live),
            Err(Error::RestoreMismatch(_))
        ));

        // An extra federate joined.
        let mut live = roster();
        live.push(RosterEntry {
            name: "fed_c".into(),
            federate_type: "sim".into(),
            required: false,
        });
        assert!(matches!(
            verify_roster(&recorded, &live),
            Err(Error::RestoreMismatch(_))
        ));

        // Same name, different type.
        let mut live = roster();
        live[0].federate_type = "viewer".into();
        assert!(matches!(
            verify_roster(&recorded, &live),
            Err(Error::RestoreMismatch(_))
        ));
    }

    #[test]
    fn test_tracker_wait_wakes_on_callback() {
        let flags = Arc::new(RunFlags::new());
        flags.set_joined(true);
        let tracker = Arc::new(SaveRestoreTracker::new(flags));

        let tracker2 = tracker.clone();
        let callback = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            tracker2.set(SaveRestoreState::Initiate);
        });

        let reached = tracker
            .wait_until(&[SaveRestoreState::Initiate, SaveRestoreState::Failed])
            .unwrap();
        assert_eq!(reached, SaveRestoreState::Initiate);
        callback.join().unwrap();
    }

    #[test]
    fn test_tracker_wait_aborts_on_shutdown() {
        let flags = Arc::new(RunFlags::new());
        flags.set_joined(true);
        let tracker = SaveRestoreTracker::new(flags.clone());
        flags.request_shutdown();
        assert!(matches!(
            tracker.wait_until(&[SaveRestoreState::Complete]),
            Err(Error::ShutdownRequested)
        ));
    }
}
