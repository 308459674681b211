// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 hfed contributors

//! # hfed - HLA Federate Execution Control
//!
//! A pure Rust implementation of the execution-control core for HLA (High
//! Level Architecture) style federations: the subsystem that coordinates
//! independent simulation processes ("federates") so they advance a shared
//! logical time in lock-step, agree on execution-mode transitions
//! (initializing, running, freeze, shutdown), and exchange the shared
//! execution configuration object.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hfed::{ExecutionControl, FederateConfig, Result};
//! use hfed::rti::intraprocess::IntraProcessBus;
//!
//! fn main() -> Result<()> {
//!     let bus = IntraProcessBus::new();
//!     let config = FederateConfig::builder("fed_exec", "fed_a", "sim")
//!         .preset_master(true)
//!         .lookahead_seconds(1.0)
//!         .build()?;
//!
//!     let mut control = ExecutionControl::new(config, bus.new_connection())?;
//!     control.join()?;
//!     control.pre_multiphase_init()?;
//!     control.multiphase_init()?;
//!     control.post_multiphase_init()?;
//!
//!     for _frame in 0..10 {
//!         control.end_of_frame()?;
//!     }
//!     control.request_shutdown()?;
//!     control.end_of_frame()?;
//!     control.shutdown()?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +--------------------------------------------------------------------+
//! |                        Host Simulation Executive                   |
//! |     join -> pre_init -> multiphase_init -> post_init -> frames     |
//! +--------------------------------------------------------------------+
//! |                        ExecutionControl (exec)                     |
//! |   mode state machine | init barriers | freeze schedule | ExCO      |
//! +--------------------------------------------------------------------+
//! |        Federate (federate)        |   SyncPointManager (sync)      |
//! |   membership | time advance | S/R |   lists | waits | callbacks    |
//! +--------------------------------------------------------------------+
//! |                  RtiAmbassador / FederateAmbassador (rti)          |
//! |        narrow trait boundary; vendor RTI or in-process bus         |
//! +--------------------------------------------------------------------+
//! ```
//!
//! Data flows upward (`time` feeds `sync` and `federate`; sync-points feed
//! lists, lists feed the manager; `exec` reads the manager and the federate).
//! Control flows downward: the host calls `ExecutionControl` entry points
//! once per frame, and the RTI invokes asynchronous callbacks that are
//! marshalled into component state changes.
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`ExecutionControl`] | Per-frame entry points and the mode state machine |
//! | [`Federate`] | Membership, time advance, save/restore bookkeeping |
//! | [`sync::SyncPointManager`] | Named barrier registry and blocking waits |
//! | [`exec::ExecutionConfiguration`] | The master-authored shared object (ExCO) |
//! | [`FederateConfig`] | Per-federate options, validated at startup |
//!
//! ## Threading
//!
//! The host executive thread makes all initialization, time-advance, and
//! end-of-frame calls. The RTI dispatches callbacks on threads it owns;
//! every callback handler takes the owning component's mutex and performs
//! bounded work. Blocking waits never hold a mutex across a sleep and poll
//! for shutdown every [`config::POLL_INTERVAL`].

/// Crate-wide constants and per-federate configuration.
pub mod config;
/// Opaque-buffer encoding for attribute and parameter values.
pub mod encoding;
/// Execution-control state machine, multi-phase init, freeze coordination.
pub mod exec;
/// Federate membership, time management, and save/restore bookkeeping.
pub mod federate;
/// Runtime-filtered logging (console and file outputs).
pub mod logging;
/// Attribute ownership transfer bookkeeping.
pub mod ownership;
/// RTI boundary traits, handles, and the in-process loopback RTI.
pub mod rti;
/// Synchronization-point barriers, lists, and the callback-driven manager.
pub mod sync;
/// Fixed-point logical time and interval arithmetic.
pub mod time;

pub use config::{FederateConfig, FederateConfigBuilder, KnownFederate};
pub use exec::{ExecutionConfiguration, ExecutionControl, ExecutionMode};
pub use federate::Federate;
pub use rti::{FederateAmbassador, RtiAmbassador, RtiError};

use crate::encoding::EncodeError;
use std::fmt;

/// hfed version string.
pub const VERSION: &str = "0.3.0";

/// Errors returned by hfed operations.
///
/// Covers the error kinds of the execution-control core. Recovered
/// conditions (federation already exists, duplicate sync-point
/// registration, stale attribute reflections) never surface here; they are
/// logged and absorbed where they occur.
#[derive(Debug)]
pub enum Error {
    // ========================================================================
    // Configuration
    // ========================================================================
    /// Missing or conflicting configuration options. Fatal at initialize().
    Config(String),

    // ========================================================================
    // Membership
    // ========================================================================
    /// RTI connection failed after the configured retry budget.
    ConnectionFailed { attempts: u32, cause: String },
    /// Joining the federation execution failed.
    JoinFailed(String),
    /// The federate lost federation membership during a blocking wait.
    NotExecutionMember,
    /// A blocking wait was abandoned because shutdown was requested.
    ShutdownRequested,

    // ========================================================================
    // Synchronization
    // ========================================================================
    /// A sync-point label already exists in the manager.
    SyncPointDuplicate(String),
    /// An operation referenced a sync-point label the manager never saw.
    SyncPointUnknown(String),
    /// The RTI rejected a sync-point registration for a reason other than
    /// label reuse.
    SyncPointError(String),

    // ========================================================================
    // Persistence
    // ========================================================================
    /// The `.running_feds` sidecar disagrees with live membership. Fatal.
    RestoreMismatch(String),
    /// A federation save did not complete successfully.
    SaveFailed(String),
    /// A federation restore did not complete successfully.
    RestoreFailed(String),

    // ========================================================================
    // Boundary
    // ========================================================================
    /// An unrecovered RTI exception.
    Rti(RtiError),
    /// Attribute or parameter buffer encoding failed.
    Encoding(EncodeError),
    /// Sidecar file I/O failed.
    Io(std::io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(msg) => write!(f, "configuration error: {}", msg),
            Error::ConnectionFailed { attempts, cause } => {
                write!(f, "RTI connection failed after {} attempts: {}", attempts, cause)
            }
            Error::JoinFailed(msg) => write!(f, "failed to join federation: {}", msg),
            Error::NotExecutionMember => {
                write!(f, "federate is no longer a federation execution member")
            }
            Error::ShutdownRequested => write!(f, "wait abandoned: shutdown requested"),
            Error::SyncPointDuplicate(label) => {
                write!(f, "sync-point label '{}' already exists", label)
            }
            Error::SyncPointUnknown(label) => write!(f, "unknown sync-point label '{}'", label),
            Error::SyncPointError(label) => {
                write!(f, "sync-point '{}' registration failed", label)
            }
            Error::RestoreMismatch(msg) => {
                write!(f, "restore membership mismatch: {}", msg)
            }
            Error::SaveFailed(label) => write!(f, "federation save '{}' failed", label),
            Error::RestoreFailed(label) => write!(f, "federation restore '{}' failed", label),
            Error::Rti(e) => write!(f, "RTI error: {}", e),
            Error::Encoding(e) => write!(f, "encoding error: {}", e),
            Error::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Encoding(e) => Some(e),
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<RtiError> for Error {
    fn from(e: RtiError) -> Self {
        Error::Rti(e)
    }
}

impl From<EncodeError> for Error {
    fn from(e: EncodeError) -> Self {
        Error::Encoding(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

/// Result type for hfed operations.
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_variants() {
        let e = Error::SyncPointDuplicate("phase_1".into());
        assert_eq!(format!("{}", e), "sync-point label 'phase_1' already exists");

        let e = Error::ConnectionFailed {
            attempts: 5,
            cause: "refused".into(),
        };
        assert_eq!(
            format!("{}", e),
            "RTI connection failed after 5 attempts: refused"
        );
    }
}
