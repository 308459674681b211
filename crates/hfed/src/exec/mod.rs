// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 hfed contributors

//! Execution control: the per-federate coordinator that drives membership,
//! multi-phase initialization barriers, the mode state machine, coordinated
//! freezes, and shutdown.
//!
//! The host simulation executive owns one [`ExecutionControl`] and calls its
//! entry points from a single thread:
//!
//! ```text
//! join -> pre_multiphase_init -> multiphase_init -> post_multiphase_init
//!      -> end_of_frame (per frame) ... -> request_shutdown -> shutdown
//! ```
//!
//! Everything asynchronous (sync-point callbacks, attribute reflections,
//! grants) arrives through [`crate::federate::CoreAmbassador`] and is read
//! here at well-defined points in the frame.

pub mod exco;
pub mod freeze;
pub mod mode;
pub mod policy;
pub mod timeline;

pub use exco::{ExcoMirror, ExecutionConfiguration, MtrBox};
pub use freeze::{freeze_boundary, FreezeSchedule};
pub use mode::ExecutionMode;
pub use policy::{ExecutionPolicy, PolicyKind};
pub use timeline::{ScenarioTimeline, SimulationTimeline, Timeline};

use crate::config::{
    FederateConfig, INIT_LIST_NAME, MULTIPHASE_LIST_NAME, POLL_INTERVAL, RUNTIME_LIST_NAME,
    WAIT_STATUS_PERIOD,
};
use crate::federate::{CoreAmbassador, Federate, Membership, RunFlags, SaveRestoreTracker, TimeManager};
use crate::ownership::OwnershipTracker;
use crate::rti::{
    AttributeHandle, FomHandles, ObjectInstanceHandle, ParameterValueMap, RtiAmbassador, RtiError,
};
use crate::sync::SyncPointManager;
use crate::time::{Interval, LogicalTime, TimeBase};
use crate::{debug, info, warn, Error, Result};
use policy::SYNC_MTR_GOTO_RUN;
use std::path::Path;
use std::sync::{Arc, OnceLock};
use std::thread;
use std::time::Instant;

/// The execution-control coordinator for one federate.
///
/// All methods are called from the host executive thread. See the crate
/// docs for the callback threading rules.
pub struct ExecutionControl {
    config: FederateConfig,
    policy: ExecutionPolicy,
    base: TimeBase,
    rti: Arc<dyn RtiAmbassador>,
    ambassador: Arc<CoreAmbassador>,
    federate: Arc<Federate>,
    sync: Arc<SyncPointManager>,
    flags: Arc<RunFlags>,
    time: Arc<TimeManager>,
    fom: Arc<OnceLock<FomHandles>>,
    exco_mirror: Arc<ExcoMirror>,
    freeze: Arc<FreezeSchedule>,
    mtr: Arc<MtrBox>,
    ownership: Arc<OwnershipTracker>,
    sim_timeline: SimulationTimeline,

    // Host-thread state.
    master: bool,
    current_mode: ExecutionMode,
    /// Transition armed by an ExCO update or a local request, applied at the
    /// next frame boundary.
    requested_mode: Option<ExecutionMode>,
    /// ExCO instance registered by this federate (master only).
    exco_instance: Option<ObjectInstanceHandle>,
    root_frame_name: String,
    lcts: Interval,
    epoch_ticks: i64,
    frame: u64,
}

impl std::fmt::Debug for ExecutionControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionControl").finish_non_exhaustive()
    }
}

impl ExecutionControl {
    /// Build the coordinator. Validates configuration; does not touch the
    /// RTI until [`join`](Self::join).
    pub fn new(config: FederateConfig, rti: Arc<dyn RtiAmbassador>) -> Result<ExecutionControl> {
        config.validate()?;
        if config.policy == PolicyKind::CentralMaster && !config.use_preset_master {
            return Err(Error::Config(
                "the central-master policy requires a preset master".into(),
            ));
        }
        let base = TimeBase::get();
        let policy = ExecutionPolicy::for_kind(config.policy);
        let flags = Arc::new(RunFlags::new());
        let sync = Arc::new(SyncPointManager::new(flags.clone()));
        let time = Arc::new(TimeManager::new(
            flags.clone(),
            config.lookahead(base),
            config.time_management,
        ));
        let membership = Arc::new(Membership::new());
        let save_restore = Arc::new(SaveRestoreTracker::new(flags.clone()));
        let fom: Arc<OnceLock<FomHandles>> = Arc::new(OnceLock::new());
        let exco_mirror = Arc::new(ExcoMirror::new());
        let freeze = Arc::new(FreezeSchedule::new());
        let mtr = Arc::new(MtrBox::new());
        let ownership = Arc::new(OwnershipTracker::new());

        let federate = Arc::new(Federate::new(
            config.clone(),
            rti.clone(),
            flags.clone(),
            time.clone(),
            membership.clone(),
            save_restore.clone(),
            fom.clone(),
        ));
        let ambassador = Arc::new(CoreAmbassador::new(
            rti.clone(),
            flags.clone(),
            sync.clone(),
            time.clone(),
            membership,
            save_restore,
            ownership.clone(),
            exco_mirror.clone(),
            freeze.clone(),
            mtr.clone(),
            fom.clone(),
            policy.clone(),
        ));

        let root_frame_name = if config.root_frame_publisher {
            format!("{}_root_frame", config.federate_name)
        } else {
            String::new()
        };
        let lcts = config.least_common_time_step(base);
        let epoch_ticks = LogicalTime::from_seconds(base, config.scenario_epoch_seconds).ticks();

        Ok(ExecutionControl {
            config,
            policy,
            base,
            rti,
            ambassador,
            federate,
            sync,
            flags,
            time,
            fom,
            exco_mirror,
            freeze,
            mtr,
            ownership,
            sim_timeline: SimulationTimeline::new(),
            master: false,
            current_mode: ExecutionMode::Uninitialized,
            requested_mode: None,
            exco_instance: None,
            root_frame_name,
            lcts,
            epoch_ticks,
            frame: 0,
        })
    }

    // =====================================================================
    // Accessors
    // =====================================================================

    pub fn is_master(&self) -> bool {
        self.master
    }

    pub fn current_mode(&self) -> ExecutionMode {
        self.current_mode
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn granted_time(&self) -> LogicalTime {
        self.time.granted_time()
    }

    /// Scenario time of the current granted time, in seconds.
    pub fn scenario_time_seconds(&self) -> f64 {
        LogicalTime::from_ticks(self.epoch_ticks).to_seconds(self.base)
            + self.time.granted_time().to_seconds(self.base)
    }

    /// Wall-clock seconds since this coordinator was built.
    pub fn simulation_time_seconds(&self) -> f64 {
        self.sim_timeline.now()
    }

    pub fn federate(&self) -> &Arc<Federate> {
        &self.federate
    }

    pub fn sync_points(&self) -> &Arc<SyncPointManager> {
        &self.sync
    }

    pub fn ownership(&self) -> &Arc<OwnershipTracker> {
        &self.ownership
    }

    /// Latest mirrored execution configuration.
    pub fn execution_configuration(&self) -> Option<Arc<ExecutionConfiguration>> {
        self.exco_mirror.latest()
    }

    fn fom_handles(&self) -> Result<&FomHandles> {
        self.fom
            .get()
            .ok_or_else(|| Error::Rti(RtiError::Internal("FOM handles not resolved".into())))
    }

    // =====================================================================
    // Lifecycle: join
    // =====================================================================

    /// Connect, create/join the federation, resolve the master role, set up
    /// publications and time management, and (master) author the initial
    /// execution configuration.
    pub fn join(&mut self) -> Result<()> {
        self.federate.connect(self.ambassador.clone())?;
        self.federate.create_and_join()?;

        self.master = if self.config.use_preset_master {
            self.config.master
        } else {
            self.policy.elect_master_by_creation
                && self.federate.created_federation()
                && !self.config.designated_late_joiner
        };
        self.ambassador.set_master(self.master);
        self.ambassador.set_epoch_ticks(self.epoch_ticks);
        info!(
            "federate '{}' role: {}",
            self.config.federate_name,
            if self.master { "master" } else { "member" }
        );

        self.federate.initialize_handles()?;
        self.setup_publications()?;
        self.federate.setup_time_management()?;
        self.current_mode = ExecutionMode::Initializing;

        if self.config.designated_late_joiner {
            return self.join_late();
        }

        self.declare_sync_points()?;
        if self.master {
            self.federate.wait_for_required_federates()?;
            self.author_initial_exco()?;
        } else {
            let exco = self.wait_for_exco()?;
            self.ingest_exco(&exco);
        }
        Ok(())
    }

    fn setup_publications(&mut self) -> Result<()> {
        let fom = self.fom_handles()?.clone();
        if self.master {
            self.rti
                .publish_object_class_attributes(fom.exco_class, &fom.exco_attributes)?;
            let instance = self.rti.register_object_instance(
                fom.exco_class,
                &format!("ExCO_{}", self.config.federation_name),
            )?;
            self.exco_instance = Some(instance);
            self.exco_mirror.bind_instance(instance);
            self.rti.subscribe_interaction_class(fom.mtr_class)?;
        } else {
            self.rti
                .subscribe_object_class_attributes(fom.exco_class, &fom.exco_attributes)?;
            self.rti.publish_interaction_class(fom.mtr_class)?;
        }
        if !self.policy.freeze_via_exco {
            self.rti.publish_interaction_class(fom.freeze_class)?;
            self.rti.subscribe_interaction_class(fom.freeze_class)?;
        }
        Ok(())
    }

    fn declare_sync_points(&self) -> Result<()> {
        for label in self.policy.fixed_sync_points() {
            self.sync.add_sync_point(INIT_LIST_NAME, label, None)?;
        }
        for label in &self.config.multiphase_init_sync_points {
            self.sync.add_sync_point(MULTIPHASE_LIST_NAME, label, None)?;
        }
        // Freeze-exit rendezvous, recycled across freezes.
        self.sync
            .add_sync_point(RUNTIME_LIST_NAME, SYNC_MTR_GOTO_RUN, None)?;
        Ok(())
    }

    /// Late-joiner path: skip every initialization barrier, adopt the
    /// mirrored configuration, and re-align logical time to the federation's
    /// step boundary.
    fn join_late(&mut self) -> Result<()> {
        info!("joining as a late joiner; skipping initialization barriers");
        self.sync
            .add_sync_point(RUNTIME_LIST_NAME, SYNC_MTR_GOTO_RUN, None)?;
        let exco = self.wait_for_exco()?;
        self.ingest_exco(&exco);
        self.time
            .advance_to_galt_boundary(self.rti.as_ref(), self.lcts)?;
        self.current_mode = exco.current_execution_mode;
        info!(
            "late joiner aligned at {} in mode {}",
            self.time.granted_time(),
            self.current_mode
        );
        Ok(())
    }

    // =====================================================================
    // Lifecycle: initialization barriers
    // =====================================================================

    /// Cross the fixed early barriers (start of initialization, object and
    /// root-frame discovery for the richer policies).
    pub fn pre_multiphase_init(&mut self) -> Result<()> {
        if self.config.designated_late_joiner {
            return Ok(());
        }
        for label in self.policy.early_sync_points.clone() {
            self.barrier(label)?;
        }
        Ok(())
    }

    /// Cross every user-declared multi-phase barrier, in declaration order.
    /// Call once; hosts that need per-phase work should instead call
    /// [`barrier`](Self::barrier) per label between their phases.
    pub fn multiphase_init(&mut self) -> Result<()> {
        if self.config.designated_late_joiner {
            return Ok(());
        }
        for label in self.config.multiphase_init_sync_points.clone() {
            self.barrier(&label)?;
        }
        Ok(())
    }

    /// Cross the fixed late barriers and enter RUNNING at logical time zero.
    pub fn post_multiphase_init(&mut self) -> Result<()> {
        if self.config.designated_late_joiner {
            self.current_mode = ExecutionMode::Running;
            return Ok(());
        }
        for label in self.policy.late_sync_points.clone() {
            self.barrier(label)?;
        }
        self.current_mode = ExecutionMode::Running;
        if self.master {
            self.publish_exco(ExecutionMode::Running, ExecutionMode::Running, 0.0)?;
        }
        info!(
            "federate '{}' entered RUNNING at {}",
            self.config.federate_name,
            self.time.granted_time()
        );
        Ok(())
    }

    /// Run one named barrier: register (first registrant wins, label reuse
    /// is success), wait for the announcement, achieve, and wait for
    /// federation-wide synchronization. The barrier is consumed on return.
    pub fn barrier(&self, label: &str) -> Result<()> {
        debug!("crossing barrier '{}'", label);
        self.sync.register_sync_point(label, self.rti.as_ref())?;
        self.sync.wait_for_announced(label)?;
        self.sync.achieve(label, self.rti.as_ref())?;
        self.sync.wait_for_synchronized(label)
    }

    // =====================================================================
    // Lifecycle: frames
    // =====================================================================

    /// End-of-frame processing: apply mirrored configuration changes, honor
    /// mode transition requests (master), enter due freezes, and advance
    /// logical time one lookahead step. Returns the mode the next frame
    /// starts in.
    pub fn end_of_frame(&mut self) -> Result<ExecutionMode> {
        self.process_execution_control_updates();
        if self.master {
            self.master_frame_duties()?;
        }
        match self.current_mode {
            ExecutionMode::Running => {
                if self.apply_armed_transition()? {
                    return Ok(self.current_mode);
                }
                if let Some(boundary) = self.freeze.take_due(self.time.granted_time()) {
                    self.enter_freeze(boundary)?;
                    return Ok(self.current_mode);
                }
                self.time.advance_frame(self.rti.as_ref())?;
                self.frame += 1;
            }
            ExecutionMode::Freeze => self.freeze_tick()?,
            _ => {}
        }
        Ok(self.current_mode)
    }

    /// Pull the latest mirrored ExCO and arm whatever it implies.
    fn process_execution_control_updates(&mut self) {
        let Some(exco) = self.exco_mirror.latest() else {
            return;
        };
        if self.master {
            return;
        }
        if exco.least_common_time_step > 0 {
            self.lcts = Interval::from_ticks(exco.least_common_time_step);
        }
        if self.policy.freeze_via_exco && exco.next_execution_mode == ExecutionMode::Freeze {
            let boundary = LogicalTime::from_ticks(
                LogicalTime::from_seconds(self.base, exco.next_mode_scenario_time)
                    .ticks()
                    .saturating_sub(self.epoch_ticks),
            );
            // Boundaries already reached were consumed on entry; only arm
            // future ones.
            if boundary > self.time.granted_time() {
                self.freeze.add(boundary);
            }
        }
        if exco.next_execution_mode == ExecutionMode::Shutdown {
            self.requested_mode = Some(ExecutionMode::Shutdown);
        }
        if self.policy.allow_restart && exco.next_execution_mode == ExecutionMode::Restart {
            self.requested_mode = Some(ExecutionMode::Restart);
        }
    }

    /// Master-only: consume the latest mode transition request and the run
    /// duration bound.
    fn master_frame_duties(&mut self) -> Result<()> {
        if let Some(requested) = self.mtr.take() {
            if self
                .current_mode
                .transition_valid(requested, self.policy.allow_restart)
            {
                info!("honoring mode transition request: {}", requested);
                match requested {
                    ExecutionMode::Freeze => self.announce_freeze(None)?,
                    ExecutionMode::Shutdown => self.announce_shutdown()?,
                    ExecutionMode::Running => self.request_unfreeze()?,
                    ExecutionMode::Restart => {
                        self.requested_mode = Some(ExecutionMode::Restart);
                        self.publish_exco(
                            self.current_mode,
                            ExecutionMode::Restart,
                            self.scenario_time_seconds(),
                        )?;
                    }
                    _ => {}
                }
            } else {
                warn!(
                    "dropping invalid mode transition request {} (current mode {})",
                    requested, self.current_mode
                );
            }
        }
        if self.config.run_duration_seconds > 0.0
            && self.current_mode == ExecutionMode::Running
            && self.requested_mode.is_none()
        {
            let end = LogicalTime::from_seconds(self.base, self.config.run_duration_seconds);
            if self.time.granted_time() >= end {
                info!(
                    "run duration of {}s reached; shutting down",
                    self.config.run_duration_seconds
                );
                self.announce_shutdown()?;
            }
        }
        Ok(())
    }

    /// Apply an armed transition at the frame boundary. Returns true when
    /// the mode changed.
    fn apply_armed_transition(&mut self) -> Result<bool> {
        let Some(requested) = self.requested_mode else {
            return Ok(false);
        };
        if requested == self.current_mode {
            self.requested_mode = None;
            return Ok(false);
        }
        if !self
            .current_mode
            .transition_valid(requested, self.policy.allow_restart)
        {
            warn!(
                "dropping invalid armed transition {} -> {}",
                self.current_mode, requested
            );
            self.requested_mode = None;
            return Ok(false);
        }
        self.requested_mode = None;
        self.current_mode = requested;
        info!("execution mode is now {}", self.current_mode);
        Ok(true)
    }

    // =====================================================================
    // Freeze
    // =====================================================================

    /// Request a coordinated federation-wide freeze. With no explicit
    /// scenario time the boundary is padded past every federate's horizon;
    /// an explicit time earlier than that horizon is lifted to it.
    pub fn request_freeze(&mut self, scenario_time_seconds: Option<f64>) -> Result<()> {
        if self.policy.freeze_via_exco && !self.master {
            // Freeze scheduling is master-authored; relay the request.
            return self.send_mode_transition_request(ExecutionMode::Freeze);
        }
        let computed = freeze_boundary(
            self.time.granted_time(),
            self.config.time_padding(self.base),
            self.time.lookahead(),
            self.lcts,
        );
        let boundary = match scenario_time_seconds {
            Some(seconds) => {
                let explicit = LogicalTime::from_ticks(
                    LogicalTime::from_seconds(self.base, seconds)
                        .ticks()
                        .saturating_sub(self.epoch_ticks),
                );
                if explicit < computed {
                    warn!(
                        "requested freeze boundary {} is inside the announcement horizon; using {}",
                        explicit, computed
                    );
                    computed
                } else {
                    explicit
                }
            }
            None => computed,
        };
        self.announce_freeze(Some(boundary))
    }

    fn announce_freeze(&mut self, boundary: Option<LogicalTime>) -> Result<()> {
        let boundary = boundary.unwrap_or_else(|| {
            freeze_boundary(
                self.time.granted_time(),
                self.config.time_padding(self.base),
                self.time.lookahead(),
                self.lcts,
            )
        });
        info!("announcing federation freeze at boundary {}", boundary);
        // The announcer never hears its own announcement; record locally.
        self.freeze.add(boundary);
        let scenario_ticks = self.epoch_ticks.saturating_add(boundary.ticks());
        if self.policy.freeze_via_exco {
            self.publish_exco(
                self.current_mode,
                ExecutionMode::Freeze,
                LogicalTime::from_ticks(scenario_ticks).to_seconds(self.base),
            )?;
        } else {
            let fom = self.fom_handles()?;
            let parameters: ParameterValueMap = vec![(
                fom.freeze_time_parameter,
                crate::encoding::encode_i64(scenario_ticks),
            )];
            let time = self.outbound_timestamp();
            self.rti
                .send_interaction(fom.freeze_class, &parameters, &[], time)?;
        }
        Ok(())
    }

    fn enter_freeze(&mut self, boundary: LogicalTime) -> Result<()> {
        self.current_mode = ExecutionMode::Freeze;
        info!(
            "entered FREEZE at {} (boundary {})",
            self.time.granted_time(),
            boundary
        );
        if self.master {
            self.publish_exco(
                ExecutionMode::Freeze,
                ExecutionMode::Freeze,
                self.scenario_time_seconds(),
            )?;
        }
        Ok(())
    }

    /// Master-only: begin the freeze-exit rendezvous. Every frozen federate
    /// achieves the exit point from its freeze tick and resumes together.
    pub fn request_unfreeze(&mut self) -> Result<()> {
        if !self.master {
            return self.send_mode_transition_request(ExecutionMode::Running);
        }
        info!("registering freeze-exit rendezvous");
        self.sync
            .register_sync_point(SYNC_MTR_GOTO_RUN, self.rti.as_ref())
    }

    /// One non-blocking pass of the frozen state: honor shutdown, and leave
    /// FREEZE once the exit rendezvous completes.
    fn freeze_tick(&mut self) -> Result<()> {
        if self.apply_armed_transition()? {
            return Ok(());
        }
        if self.sync.is_announced(SYNC_MTR_GOTO_RUN) {
            self.sync.achieve(SYNC_MTR_GOTO_RUN, self.rti.as_ref())?;
            self.sync.wait_for_synchronized(SYNC_MTR_GOTO_RUN)?;
            self.current_mode = ExecutionMode::Running;
            info!("resumed RUNNING at {}", self.time.granted_time());
            if self.master {
                self.publish_exco(
                    ExecutionMode::Running,
                    ExecutionMode::Running,
                    self.scenario_time_seconds(),
                )?;
            }
        } else {
            thread::sleep(POLL_INTERVAL);
        }
        Ok(())
    }

    // =====================================================================
    // Shutdown
    // =====================================================================

    /// Request a federation-wide shutdown: the master announces it through
    /// the execution configuration; members relay a mode transition request.
    pub fn request_shutdown(&mut self) -> Result<()> {
        if self.master {
            self.announce_shutdown()
        } else {
            self.send_mode_transition_request(ExecutionMode::Shutdown)
        }
    }

    fn announce_shutdown(&mut self) -> Result<()> {
        info!("announcing federation shutdown");
        self.requested_mode = Some(ExecutionMode::Shutdown);
        self.publish_exco(
            self.current_mode,
            ExecutionMode::Shutdown,
            self.scenario_time_seconds(),
        )
    }

    /// Resign and (last one out) destroy the federation execution.
    pub fn shutdown(&mut self) -> Result<()> {
        self.current_mode = ExecutionMode::Shutdown;
        self.flags.request_shutdown();
        self.federate.resign()?;
        self.federate.destroy()?;
        self.sync.clear_all();
        self.freeze.clear();
        if let Err(e) = self.rti.disconnect() {
            debug!("disconnect after shutdown: {}", e);
        }
        info!("federate '{}' shut down", self.config.federate_name);
        Ok(())
    }

    // =====================================================================
    // Save / restore
    // =====================================================================

    /// Run a federation-wide save labelled `label`, writing the membership
    /// sidecar under `dir`.
    pub fn save_checkpoint(&mut self, label: &str, dir: &Path) -> Result<()> {
        self.federate.save_checkpoint(label, dir)
    }

    /// Restore checkpoint `label`, verifying the membership sidecar, then
    /// re-align logical time to the federation's step boundary.
    pub fn restore_checkpoint(&mut self, label: &str, dir: &Path) -> Result<()> {
        let resume_mode = self.current_mode;
        if self.policy.allow_restart && self.current_mode == ExecutionMode::Freeze {
            self.current_mode = ExecutionMode::Restart;
        }
        self.federate.restore_checkpoint(label, dir)?;
        self.time
            .advance_to_galt_boundary(self.rti.as_ref(), self.lcts)?;
        self.current_mode = resume_mode;
        Ok(())
    }

    // =====================================================================
    // Ownership
    // =====================================================================

    /// Queue an ownership pull due at the next frame boundary.
    pub fn pull_ownership(
        &self,
        instance: ObjectInstanceHandle,
        attributes: Vec<AttributeHandle>,
    ) {
        let due = self.time.granted_time().add(self.time.lookahead());
        self.ownership.pull_ownership(instance, attributes, due);
    }

    /// Queue an ownership push due at the next frame boundary.
    pub fn push_ownership(
        &self,
        instance: ObjectInstanceHandle,
        attributes: Vec<AttributeHandle>,
    ) {
        let due = self.time.granted_time().add(self.time.lookahead());
        self.ownership.push_ownership(instance, attributes, due);
    }

    // =====================================================================
    // Internals
    // =====================================================================

    /// Relay a mode request to the master. Receive-ordered so a frozen
    /// master still hears it.
    fn send_mode_transition_request(&self, mode: ExecutionMode) -> Result<()> {
        let fom = self.fom_handles()?;
        let parameters: ParameterValueMap = vec![(fom.mtr_mode_parameter, mode.encode())];
        self.rti
            .send_interaction(fom.mtr_class, &parameters, &[], None)?;
        info!("sent mode transition request: {}", mode);
        Ok(())
    }

    /// Timestamp for outbound TSO traffic while running; receive-ordered
    /// outside RUNNING so frozen federates still hear it.
    fn outbound_timestamp(&self) -> Option<LogicalTime> {
        if self.config.time_management && self.current_mode == ExecutionMode::Running {
            Some(self.time.granted_time().add(self.time.lookahead()))
        } else {
            None
        }
    }

    fn author_initial_exco(&mut self) -> Result<()> {
        self.publish_exco(ExecutionMode::Initializing, ExecutionMode::Running, 0.0)
    }

    fn publish_exco(
        &mut self,
        current: ExecutionMode,
        next: ExecutionMode,
        next_mode_scenario_time: f64,
    ) -> Result<()> {
        let exco = ExecutionConfiguration {
            owner_name: self.config.federate_name.clone(),
            root_frame_name: self.root_frame_name.clone(),
            scenario_time_epoch: self.config.scenario_epoch_seconds,
            next_mode_scenario_time,
            next_mode_cte_time: 0.0,
            current_execution_mode: current,
            next_execution_mode: next,
            least_common_time_step: self.lcts.ticks(),
            run_duration: self.config.run_duration_seconds,
            required_federates: self
                .config
                .known_federates
                .iter()
                .filter(|f| f.required)
                .map(|f| f.name.clone())
                .collect(),
        };
        self.exco_mirror.publish_local(exco.clone());
        let (Some(instance), Ok(fom)) = (self.exco_instance, self.fom_handles()) else {
            return Ok(());
        };
        let time = self.outbound_timestamp();
        self.rti
            .update_attribute_values(instance, &exco.pack(fom, &self.policy), &[], time)?;
        debug!(
            "published ExCO: {} -> {} at scenario {}",
            current, next, next_mode_scenario_time
        );
        Ok(())
    }

    fn wait_for_exco(&self) -> Result<Arc<ExecutionConfiguration>> {
        let mut last_status = Instant::now();
        loop {
            if let Some(exco) = self.exco_mirror.latest() {
                return Ok(exco);
            }
            self.flags.check_wait_abort()?;
            if last_status.elapsed() >= WAIT_STATUS_PERIOD {
                info!("waiting for the execution configuration");
                last_status = Instant::now();
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    fn ingest_exco(&mut self, exco: &ExecutionConfiguration) {
        if exco.least_common_time_step > 0 {
            self.lcts = Interval::from_ticks(exco.least_common_time_step);
        }
        if self.policy.exco_carries_epoch {
            self.epoch_ticks =
                LogicalTime::from_seconds(self.base, exco.scenario_time_epoch).ticks();
            self.ambassador.set_epoch_ticks(self.epoch_ticks);
        }
        debug!(
            "adopted configuration from master '{}' (lcts {} ticks)",
            exco.owner_name, exco.least_common_time_step
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_central_master_requires_preset() {
        let config = FederateConfig::builder("fed_exec", "fed_a", "sim")
            .policy(PolicyKind::CentralMaster)
            .build()
            .unwrap();
        let bus = crate::rti::intraprocess::IntraProcessBus::new();
        let err = ExecutionControl::new(config, bus.new_connection()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_new_starts_uninitialized() {
        let config = FederateConfig::builder("fed_exec", "fed_a", "sim")
            .build()
            .unwrap();
        let bus = crate::rti::intraprocess::IntraProcessBus::new();
        let control = ExecutionControl::new(config, bus.new_connection()).unwrap();
        assert_eq!(control.current_mode(), ExecutionMode::Uninitialized);
        assert!(!control.is_master());
        assert_eq!(control.frame(), 0);
        assert_eq!(control.granted_time(), LogicalTime::ZERO);
    }
}
