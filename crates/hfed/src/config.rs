// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 hfed contributors

//! Crate-wide constants and per-federate configuration.
//!
//! This module centralizes the tunables recognized by an execution-control
//! instance. **Never hardcode poll intervals or retry counts elsewhere!**
//!
//! # Levels
//!
//! - **Static**: compile-time constants (poll interval, retry policy).
//! - **Per-federate**: [`FederateConfig`], built once, validated at
//!   `initialize()` time. Configuration errors are fatal.

use crate::exec::policy::PolicyKind;
use crate::time::{Interval, TimeBase};
use crate::{Error, Result};
use std::time::Duration;

// =======================================================================
// Static constants
// =======================================================================

/// How often blocking waits re-check shutdown, membership, and progress.
pub const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// How often a blocking wait prints a progress summary.
pub const WAIT_STATUS_PERIOD: Duration = Duration::from_secs(1);

/// Number of RTI connection attempts before giving up.
pub const CONNECT_RETRY_COUNT: u32 = 5;

/// Fixed backoff between RTI connection attempts.
pub const CONNECT_RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// Well-known list that collects sync-points announced by peers but not
/// declared locally.
pub const UNKNOWN_LIST_NAME: &str = "Unknown";

/// Sync-point list holding the fixed initialization barriers.
pub const INIT_LIST_NAME: &str = "InitializationPoints";

/// Sync-point list holding user multi-phase initialization barriers.
pub const MULTIPHASE_LIST_NAME: &str = "MultiphasePoints";

/// Sync-point list holding runtime coordination points (freeze exit).
pub const RUNTIME_LIST_NAME: &str = "RuntimePoints";

/// Extension appended to a checkpoint label for the membership sidecar.
pub const RUNNING_FEDS_EXTENSION: &str = "running_feds";

// =======================================================================
// Per-federate configuration
// =======================================================================

/// A federate expected in the federation, declared at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnownFederate {
    /// Federate name as it will appear in MOM introspection.
    pub name: String,
    /// Declared federate type.
    pub federate_type: String,
    /// If true, initialization blocks until this federate has joined.
    pub required: bool,
}

impl KnownFederate {
    /// A required federate entry.
    pub fn required(name: &str, federate_type: &str) -> Self {
        Self {
            name: name.to_string(),
            federate_type: federate_type.to_string(),
            required: true,
        }
    }

    /// An optional federate entry.
    pub fn optional(name: &str, federate_type: &str) -> Self {
        Self {
            name: name.to_string(),
            federate_type: federate_type.to_string(),
            required: false,
        }
    }
}

/// Configuration recognized per execution-control instance.
///
/// Build with [`FederateConfig::builder`], which validates on `build()`.
/// All durations are expressed in seconds and converted to integer base
/// units internally; see [`crate::time`].
#[derive(Debug, Clone)]
pub struct FederateConfig {
    /// Federation execution to create or join (required).
    pub federation_name: String,
    /// This federate's unique name (required).
    pub federate_name: String,
    /// This federate's declared type (required).
    pub federate_type: String,
    /// HLA lookahead in seconds, >= 0.
    pub lookahead_seconds: f64,
    /// Seconds to defer an announced freeze so every federate receives the
    /// announcement before the boundary. Must exceed `lookahead_seconds`.
    pub time_padding_seconds: f64,
    /// Least common time step in seconds. Consulted only on the master;
    /// must be an integer multiple of this federate's lookahead.
    pub least_common_time_step_seconds: f64,
    /// If true, the master role comes from `master` instead of election.
    pub use_preset_master: bool,
    /// Preset master flag, meaningful only with `use_preset_master`.
    pub master: bool,
    /// Enable HLA time regulation.
    pub time_regulating: bool,
    /// Enable HLA time constraint.
    pub time_constrained: bool,
    /// Master switch for HLA time management.
    pub time_management: bool,
    /// Resign with divest (rejoin-capable) instead of delete-objects.
    pub can_rejoin_federation: bool,
    /// This federate joins an already-running federation.
    pub designated_late_joiner: bool,
    /// This federate publishes the root reference frame.
    pub root_frame_publisher: bool,
    /// This federate paces execution against the wall clock.
    pub pacing: bool,
    /// User multi-phase initialization sync-point labels, in barrier order.
    pub multiphase_init_sync_points: Vec<String>,
    /// Federates expected at startup.
    pub known_federates: Vec<KnownFederate>,
    /// Scenario epoch in seconds (master-authored, e.g. a mission epoch).
    pub scenario_epoch_seconds: f64,
    /// Scenario run duration in seconds; 0 means unbounded.
    pub run_duration_seconds: f64,
    /// Execution-control variant policy.
    pub policy: PolicyKind,
    /// Vendor-specific key/value settings passed verbatim to the RTI.
    pub local_settings: String,
}

impl FederateConfig {
    /// Start building a configuration from the three required names.
    pub fn builder(
        federation_name: &str,
        federate_name: &str,
        federate_type: &str,
    ) -> FederateConfigBuilder {
        FederateConfigBuilder {
            config: FederateConfig {
                federation_name: federation_name.to_string(),
                federate_name: federate_name.to_string(),
                federate_type: federate_type.to_string(),
                lookahead_seconds: 1.0,
                time_padding_seconds: 2.0,
                least_common_time_step_seconds: 1.0,
                use_preset_master: false,
                master: false,
                time_regulating: true,
                time_constrained: true,
                time_management: true,
                can_rejoin_federation: false,
                designated_late_joiner: false,
                root_frame_publisher: false,
                pacing: false,
                multiphase_init_sync_points: Vec::new(),
                known_federates: Vec::new(),
                scenario_epoch_seconds: 0.0,
                run_duration_seconds: 0.0,
                policy: PolicyKind::Basic,
                local_settings: String::new(),
            },
        }
    }

    /// Lookahead as an integer interval in the process time base.
    pub fn lookahead(&self, base: TimeBase) -> Interval {
        Interval::from_seconds(base, self.lookahead_seconds)
    }

    /// Time padding as an integer interval in the process time base.
    pub fn time_padding(&self, base: TimeBase) -> Interval {
        Interval::from_seconds(base, self.time_padding_seconds)
    }

    /// LCTS as an integer interval in the process time base.
    pub fn least_common_time_step(&self, base: TimeBase) -> Interval {
        Interval::from_seconds(base, self.least_common_time_step_seconds)
    }

    /// Validate option consistency. Surfaced at `initialize()`; fatal.
    pub fn validate(&self) -> Result<()> {
        if self.federation_name.is_empty() {
            return Err(Error::Config("federation_name must not be empty".into()));
        }
        if self.federate_name.is_empty() {
            return Err(Error::Config("federate_name must not be empty".into()));
        }
        if self.federate_type.is_empty() {
            return Err(Error::Config("federate_type must not be empty".into()));
        }
        if !self.lookahead_seconds.is_finite() || self.lookahead_seconds < 0.0 {
            return Err(Error::Config(format!(
                "lookahead_seconds must be >= 0, got {}",
                self.lookahead_seconds
            )));
        }
        if self.time_management && self.time_padding_seconds <= self.lookahead_seconds {
            return Err(Error::Config(format!(
                "time_padding_seconds ({}) must exceed lookahead_seconds ({})",
                self.time_padding_seconds, self.lookahead_seconds
            )));
        }
        if self.master && !self.use_preset_master {
            return Err(Error::Config(
                "master=true requires use_preset_master=true".into(),
            ));
        }
        if self.master && self.designated_late_joiner {
            return Err(Error::Config(
                "a preset master cannot be a designated late joiner".into(),
            ));
        }
        if self.least_common_time_step_seconds <= 0.0 {
            return Err(Error::Config(format!(
                "least_common_time_step_seconds must be > 0, got {}",
                self.least_common_time_step_seconds
            )));
        }
        let base = TimeBase::get();
        let lcts = self.least_common_time_step(base);
        let lookahead = self.lookahead(base);
        if lookahead > Interval::ZERO && !lcts.is_multiple_of(lookahead) {
            return Err(Error::Config(format!(
                "least_common_time_step ({} ticks) must be an integer multiple of lookahead ({} ticks)",
                lcts.ticks(),
                lookahead.ticks()
            )));
        }
        let mut seen = std::collections::HashSet::new();
        for label in &self.multiphase_init_sync_points {
            if label.is_empty() {
                return Err(Error::Config(
                    "multiphase_init_sync_points must not contain empty labels".into(),
                ));
            }
            if !seen.insert(label.as_str()) {
                return Err(Error::Config(format!(
                    "duplicate multiphase sync-point label '{}'",
                    label
                )));
            }
        }
        Ok(())
    }
}

/// Builder for [`FederateConfig`]. `build()` validates.
pub struct FederateConfigBuilder {
    config: FederateConfig,
}

impl FederateConfigBuilder {
    pub fn lookahead_seconds(mut self, seconds: f64) -> Self {
        self.config.lookahead_seconds = seconds;
        self
    }

    pub fn time_padding_seconds(mut self, seconds: f64) -> Self {
        self.config.time_padding_seconds = seconds;
        self
    }

    pub fn least_common_time_step_seconds(mut self, seconds: f64) -> Self {
        self.config.least_common_time_step_seconds = seconds;
        self
    }

    /// Force the master role on (or off) instead of first-to-create election.
    pub fn preset_master(mut self, master: bool) -> Self {
        self.config.use_preset_master = true;
        self.config.master = master;
        self
    }

    pub fn time_regulating(mut self, enabled: bool) -> Self {
        self.config.time_regulating = enabled;
        self
    }

    pub fn time_constrained(mut self, enabled: bool) -> Self {
        self.config.time_constrained = enabled;
        self
    }

    pub fn time_management(mut self, enabled: bool) -> Self {
        self.config.time_management = enabled;
        self
    }

    pub fn can_rejoin_federation(mut self, enabled: bool) -> Self {
        self.config.can_rejoin_federation = enabled;
        self
    }

    pub fn designated_late_joiner(mut self, enabled: bool) -> Self {
        self.config.designated_late_joiner = enabled;
        self
    }

    pub fn root_frame_publisher(mut self, enabled: bool) -> Self {
        self.config.root_frame_publisher = enabled;
        self
    }

    pub fn pacing(mut self, enabled: bool) -> Self {
        self.config.pacing = enabled;
        self
    }

    /// Comma-separated user multi-phase barrier labels, in order.
    pub fn multiphase_init_sync_points(mut self, labels: &str) -> Self {
        self.config.multiphase_init_sync_points = labels
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        self
    }

    pub fn known_federate(mut self, federate: KnownFederate) -> Self {
        self.config.known_federates.push(federate);
        self
    }

    pub fn scenario_epoch_seconds(mut self, seconds: f64) -> Self {
        self.config.scenario_epoch_seconds = seconds;
        self
    }

    pub fn run_duration_seconds(mut self, seconds: f64) -> Self {
        self.config.run_duration_seconds = seconds;
        self
    }

    pub fn policy(mut self, policy: PolicyKind) -> Self {
        self.config.policy = policy;
        self
    }

    pub fn local_settings(mut self, settings: &str) -> Self {
        self.config.local_settings = settings.to_string();
        self
    }

    /// Validate and return the configuration.
    pub fn build(self) -> Result<FederateConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_builder() -> FederateConfigBuilder {
        FederateConfig::builder("fed_exec", "fed_a", "sim")
    }

    #[test]
    fn test_defaults_validate() {
        let config = base_builder().build().unwrap();
        assert!(config.time_regulating && config.time_constrained && config.time_management);
        assert!(!config.can_rejoin_federation);
    }

    #[test]
    fn test_negative_lookahead_rejected() {
        let err = base_builder().lookahead_seconds(-0.5).build().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_padding_must_exceed_lookahead() {
        let err = base_builder()
            .lookahead_seconds(2.0)
            .time_padding_seconds(2.0)
            .least_common_time_step_seconds(2.0)
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_preset_master_clash() {
        let mut config = base_builder().build().unwrap();
        config.master = true; // without use_preset_master
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_lcts_must_be_lookahead_multiple() {
        let err = base_builder()
            .lookahead_seconds(0.4)
            .time_padding_seconds(1.0)
            .least_common_time_step_seconds(1.0)
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        assert!(base_builder()
            .lookahead_seconds(0.5)
            .time_padding_seconds(1.0)
            .least_common_time_step_seconds(1.0)
            .build()
            .is_ok());
    }

    #[test]
    fn test_multiphase_labels_parsed_and_deduplicated() {
        let config = base_builder()
            .multiphase_init_sync_points("mpi_init_1, mpi_init_2 ,")
            .build()
            .unwrap();
        assert_eq!(config.multiphase_init_sync_points, vec!["mpi_init_1", "mpi_init_2"]);

        let err = base_builder()
            .multiphase_init_sync_points("phase,phase")
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
