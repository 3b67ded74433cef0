//! The canonical machine controller (cm).
//!
//! One instance owns the whole canonical layer: the G-code model
//! store, the automaton, the planner queue, the runtime model, the
//! cycle sub-machines, and the request latches. The parser drives it
//! through the command methods; the main loop drives it through
//! [`CanonicalMachine::dispatch_tick`].
//!
//! Command methods follow one contract: validate inputs, then update
//! the model or enqueue a planner buffer, then (for motion) advance
//! the model position to the commanded target. Every method returns a
//! [`Status`] from the shared taxonomy.

use tracing::{info, warn};

use arbor_common::axis::{Axis, AxisFlags};
use arbor_common::config::MachineConfig;
use arbor_common::consts::AXIS_COUNT;
use arbor_common::gcode::{
    CoordinateSystem, DistanceMode, PathControl, Plane, ProgramFlow, SpindleMode, Units,
};
use arbor_common::state::{CombinedState, CycleState, MachineState, MotionState};
use arbor_common::status::Status;

use crate::homing::HomingCycle;
use crate::model::{GCodeState, ModelStore, MODEL_MAGIC};
use crate::persist::OffsetStore;
use crate::planner::{MoveKind, PlannerQueue};
use crate::probe::{ProbeCycle, ProbeResult};
use crate::report::ModelRef;
use crate::runtime::RuntimeModel;
use crate::sequencer::RequestLatches;
use crate::state::{Automaton, MachineEvent};

/// The controller singleton.
///
/// Magic markers bracket the struct; a mismatch means something
/// scribbled over the controller and is treated as a fatal integrity
/// fault (alarm, motion refused).
pub struct CanonicalMachine {
    magic_start: u32,
    pub(crate) config: MachineConfig,
    pub(crate) store: ModelStore,
    pub(crate) automaton: Automaton,
    pub(crate) planner: PlannerQueue,
    pub(crate) runtime: RuntimeModel,
    /// Per-axis homed flags. Set only by a completed homing cycle (or
    /// G28.3); cleared by alarm.
    pub(crate) homed: AxisFlags,
    pub(crate) homing: HomingCycle,
    pub(crate) probe: ProbeCycle,
    pub(crate) probe_result: ProbeResult,
    pub(crate) latches: RequestLatches,
    pub(crate) g10_persist_flag: bool,
    /// Program-flow word waiting for the queue to drain.
    pending_flow: ProgramFlow,
    /// Operator's optional-stop switch (honors M1).
    optional_stop_switch: bool,
    active_model: ModelRef,
    offset_store: Option<Box<dyn OffsetStore>>,
    last_message: Option<String>,
    magic_end: u32,
}

impl CanonicalMachine {
    /// Build the controller from a validated configuration.
    pub fn new(config: MachineConfig) -> Self {
        let store = ModelStore::new(config.defaults);
        Self {
            magic_start: MODEL_MAGIC,
            config,
            store,
            automaton: Automaton::new(),
            planner: PlannerQueue::new(),
            runtime: RuntimeModel::new(),
            homed: AxisFlags::empty(),
            homing: HomingCycle::new(),
            probe: ProbeCycle::new(),
            probe_result: ProbeResult::default(),
            latches: RequestLatches::new(),
            g10_persist_flag: false,
            pending_flow: ProgramFlow::None,
            optional_stop_switch: false,
            active_model: ModelRef::Canonical,
            offset_store: None,
            last_message: None,
            magic_end: MODEL_MAGIC,
        }
    }

    /// Attach the persistent offset store. Offsets are loaded into the
    /// table immediately; G10 writes go back through it on idle.
    pub fn with_offset_store(mut self, store: Box<dyn OffsetStore>) -> Self {
        match store.load() {
            Ok(Some(table)) => self.store.offset_table = table,
            Ok(None) => {}
            Err(e) => warn!(error = %e, "offset table load failed; starting from zeros"),
        }
        self.offset_store = Some(store);
        self
    }

    /// Finish boot: Initializing → Ready.
    pub fn init(&mut self) {
        self.store.reset_to_defaults();
        self.automaton.handle_event(MachineEvent::InitComplete);
        info!(
            axes = AXIS_COUNT,
            units = ?self.store.gm.units,
            coord = ?self.store.gm.coord_system,
            "canonical machine ready"
        );
    }

    // ── Accessors ──

    #[inline]
    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    #[inline]
    pub fn gm(&self) -> &GCodeState {
        &self.store.gm
    }

    #[inline]
    pub fn store(&self) -> &ModelStore {
        &self.store
    }

    #[inline]
    pub fn store_mut(&mut self) -> &mut ModelStore {
        &mut self.store
    }

    #[inline]
    pub fn planner(&self) -> &PlannerQueue {
        &self.planner
    }

    #[inline]
    pub fn runtime(&self) -> &RuntimeModel {
        &self.runtime
    }

    #[inline]
    pub fn runtime_mut(&mut self) -> &mut RuntimeModel {
        &mut self.runtime
    }

    #[inline]
    pub fn combined_state(&self) -> CombinedState {
        self.automaton.combined()
    }

    #[inline]
    pub fn machine_state(&self) -> MachineState {
        self.automaton.machine_state()
    }

    #[inline]
    pub fn automaton_cycle(&self) -> CycleState {
        self.automaton.cycle_state()
    }

    #[inline]
    pub fn automaton_motion(&self) -> MotionState {
        self.automaton.motion_state()
    }

    #[inline]
    pub fn automaton_hold(&self) -> arbor_common::state::FeedholdState {
        self.automaton.hold_state()
    }

    /// Mutable access to one axis's configuration (reporter setters).
    #[inline]
    pub fn config_axis_mut(&mut self, axis: Axis) -> &mut arbor_common::config::AxisConfig {
        &mut self.config.axes[axis as usize]
    }

    /// Whether a G10 write is waiting for the idle persistence pass.
    #[inline]
    pub fn g10_persist_pending(&self) -> bool {
        self.g10_persist_flag
    }

    #[inline]
    pub fn homed(&self) -> AxisFlags {
        self.homed
    }

    #[inline]
    pub fn probe_result(&self) -> &ProbeResult {
        &self.probe_result
    }

    #[inline]
    pub fn last_message(&self) -> Option<&str> {
        self.last_message.as_deref()
    }

    /// Which model the reporter should read right now.
    #[inline]
    pub fn active_model(&self) -> ModelRef {
        self.active_model
    }

    /// Resolve a model reference to a read-only snapshot view.
    pub fn model(&self, model: ModelRef) -> &GCodeState {
        match model {
            ModelRef::Canonical => &self.store.gm,
            ModelRef::Planner(id) => self
                .planner
                .get(id)
                .map(|b| &b.gm)
                .unwrap_or(&self.store.gm),
            ModelRef::Runtime => &self.runtime.gm,
        }
    }

    // ── Integrity ──

    /// Magic markers on the controller and the extended model.
    #[inline]
    pub fn integrity_ok(&self) -> bool {
        self.magic_start == MODEL_MAGIC
            && self.magic_end == MODEL_MAGIC
            && self.store.gmx.integrity_ok()
    }

    /// Entry guard for every command: a failed integrity check is a
    /// fatal fault that latches the alarm.
    pub(crate) fn guard(&mut self) -> Status {
        if !self.integrity_ok() {
            self.raise_alarm(Status::MemoryFault);
            return Status::MemoryFault;
        }
        Status::Ok
    }

    /// Guard for commands that produce motion.
    pub(crate) fn motion_guard(&mut self) -> Status {
        let status = self.guard();
        if !status.is_ok() {
            return status;
        }
        if !self.automaton.accepts_motion() {
            return Status::MachineAlarmed;
        }
        Status::Ok
    }

    // ── Alarm ──

    /// Latch the alarm. Homed flags are invalidated: a homed claim is
    /// only valid while no alarm has occurred since the homing cycle.
    pub fn raise_alarm(&mut self, cause: Status) {
        warn!(cause = %cause, "machine alarm");
        self.automaton.force_alarm();
        self.homed = AxisFlags::empty();
        self.homing.reset();
        self.probe.reset();
        self.runtime.abort_held();
        self.planner.flush();
    }

    /// Operator alarm clear.
    pub fn clear_alarm(&mut self) -> Status {
        match self.automaton.handle_event(MachineEvent::AlarmCleared) {
            crate::state::TransitionResult::Ok(_) => {
                info!("alarm cleared");
                Status::Ok
            }
            crate::state::TransitionResult::Rejected(_) => Status::CommandRejected,
        }
    }

    // ── Modal setters (G-group commands without axis words) ──

    pub fn set_units_mode(&mut self, units: Units) -> Status {
        let status = self.guard();
        if !status.is_ok() {
            return status;
        }
        self.store.gm.units = units;
        Status::Ok
    }

    pub fn set_distance_mode(&mut self, mode: DistanceMode) -> Status {
        let status = self.guard();
        if !status.is_ok() {
            return status;
        }
        self.store.gm.distance_mode = mode;
        Status::Ok
    }

    pub fn select_plane(&mut self, plane: Plane) -> Status {
        let status = self.guard();
        if !status.is_ok() {
            return status;
        }
        self.store.gm.plane = plane;
        Status::Ok
    }

    pub fn set_path_control(&mut self, mode: PathControl) -> Status {
        let status = self.guard();
        if !status.is_ok() {
            return status;
        }
        self.store.gm.path_control = mode;
        Status::Ok
    }

    /// Set the feed rate [mm/min], G94 semantics.
    pub fn set_feed_rate(&mut self, rate: f64) -> Status {
        let status = self.guard();
        if !status.is_ok() {
            return status;
        }
        if rate < 0.0 {
            return Status::ValueOutOfRange;
        }
        self.store.gm.feed_rate = rate;
        Status::Ok
    }

    /// Set the inverse feed rate [1/min], G93 semantics (per block).
    pub fn set_inverse_feed_rate(&mut self, rate: f64) -> Status {
        let status = self.guard();
        if !status.is_ok() {
            return status;
        }
        if rate < 0.0 {
            return Status::ValueOutOfRange;
        }
        self.store.gmx.inverse_feed_rate = rate;
        Status::Ok
    }

    pub fn set_inverse_feed_rate_mode(&mut self, on: bool) -> Status {
        let status = self.guard();
        if !status.is_ok() {
            return status;
        }
        self.store.gm.inverse_feed_rate_mode = on;
        if !on {
            self.store.gmx.inverse_feed_rate = 0.0;
        }
        Status::Ok
    }

    pub fn set_spindle_speed(&mut self, rpm: f64) -> Status {
        let status = self.guard();
        if !status.is_ok() {
            return status;
        }
        if rpm < 0.0 {
            return Status::ValueOutOfRange;
        }
        self.store.gm.spindle_speed = rpm;
        Status::Ok
    }

    /// M3/M4/M5 — synchronized with motion through a command buffer.
    pub fn set_spindle_mode(&mut self, mode: SpindleMode) -> Status {
        let status = self.guard();
        if !status.is_ok() {
            return status;
        }
        self.store.gm.spindle_mode = mode;
        self.enqueue_command()
    }

    /// M7 on / M9 off.
    pub fn mist_coolant_control(&mut self, on: bool) -> Status {
        let status = self.guard();
        if !status.is_ok() {
            return status;
        }
        self.store.gm.mist_coolant = on;
        self.enqueue_command()
    }

    /// M8 on / M9 off.
    pub fn flood_coolant_control(&mut self, on: bool) -> Status {
        let status = self.guard();
        if !status.is_ok() {
            return status;
        }
        self.store.gm.flood_coolant = on;
        self.enqueue_command()
    }

    /// T word — stage a tool.
    pub fn select_tool(&mut self, tool: u8) -> Status {
        let status = self.guard();
        if !status.is_ok() {
            return status;
        }
        self.store.gm.tool_select = tool;
        Status::Ok
    }

    /// M6 — activate the staged tool, synchronized.
    pub fn change_tool(&mut self) -> Status {
        let status = self.guard();
        if !status.is_ok() {
            return status;
        }
        self.store.gm.tool = self.store.gm.tool_select;
        self.enqueue_command()
    }

    // ── Overrides (M48/M49/M50/M51) ──

    /// M48/M49 — enable or disable all override factors.
    pub fn set_override_enables(&mut self, on: bool) -> Status {
        let status = self.guard();
        if !status.is_ok() {
            return status;
        }
        self.store.gmx.feed_override_enable = on;
        self.store.gmx.traverse_override_enable = on;
        self.store.gmx.spindle_override_enable = on;
        Status::Ok
    }

    /// M50 P — feed override factor, clamped to the configured range.
    pub fn set_feed_override_factor(&mut self, factor: f64) -> Status {
        let status = self.guard();
        if !status.is_ok() {
            return status;
        }
        let clamped = clamp_factor(
            factor,
            self.config.system.feed_override_min,
            self.config.system.feed_override_max,
            "feed override",
        );
        self.store.gmx.feed_override_factor = clamped;
        Status::Ok
    }

    /// Traverse override factor, clamped like the feed factor.
    pub fn set_traverse_override_factor(&mut self, factor: f64) -> Status {
        let status = self.guard();
        if !status.is_ok() {
            return status;
        }
        let clamped = clamp_factor(
            factor,
            self.config.system.feed_override_min,
            self.config.system.feed_override_max,
            "traverse override",
        );
        self.store.gmx.traverse_override_factor = clamped;
        Status::Ok
    }

    /// M51 P — spindle override factor.
    pub fn set_spindle_override_factor(&mut self, factor: f64) -> Status {
        let status = self.guard();
        if !status.is_ok() {
            return status;
        }
        let clamped = clamp_factor(
            factor,
            self.config.system.spindle_override_min,
            self.config.system.spindle_override_max,
            "spindle override",
        );
        self.store.gmx.spindle_override_factor = clamped;
        Status::Ok
    }

    // ── Coordinate systems & offsets ──

    /// G54..G59 — select the work coordinate system.
    pub fn set_coord_system(&mut self, system: CoordinateSystem) -> Status {
        let status = self.guard();
        if !status.is_ok() {
            return status;
        }
        self.store.gm.coord_system = system;
        Status::Ok
    }

    /// G10 L2 — program one offset-table row [mm]. The machine row is
    /// not programmable. The table is written through to the config
    /// store on the next idle pass.
    pub fn set_coord_offsets(
        &mut self,
        system: CoordinateSystem,
        offsets: &[f64; AXIS_COUNT],
        flags: AxisFlags,
    ) -> Status {
        let status = self.guard();
        if !status.is_ok() {
            return status;
        }
        if system == CoordinateSystem::Machine {
            return Status::InvalidCoordinateSystem;
        }
        for axis in Axis::ALL {
            if flags.has(axis) {
                self.store.offset_table[system.index()][axis as usize] = offsets[axis as usize];
            }
        }
        self.g10_persist_flag = true;
        Status::Ok
    }

    /// G92 — set origin offsets so the flagged axes read the given
    /// work values at the current position.
    pub fn set_origin_offsets(
        &mut self,
        values: &[f64; AXIS_COUNT],
        flags: AxisFlags,
    ) -> Status {
        let status = self.guard();
        if !status.is_ok() {
            return status;
        }
        let coord = self.store.gm.coord_system.index();
        for axis in Axis::ALL {
            if flags.has(axis) {
                let i = axis as usize;
                self.store.gmx.origin_offset[i] =
                    self.store.gmx.position[i] - self.store.offset_table[coord][i] - values[i];
            }
        }
        self.store.gmx.origin_offset_enable = true;
        Status::Ok
    }

    /// G92.1 — zero the origin offsets and disable them.
    pub fn reset_origin_offsets(&mut self) -> Status {
        let status = self.guard();
        if !status.is_ok() {
            return status;
        }
        self.store.gmx.origin_offset = [0.0; AXIS_COUNT];
        self.store.gmx.origin_offset_enable = false;
        Status::Ok
    }

    /// G92.2 — suspend the origin offsets, keeping the values.
    pub fn suspend_origin_offsets(&mut self) -> Status {
        let status = self.guard();
        if !status.is_ok() {
            return status;
        }
        self.store.gmx.origin_offset_enable = false;
        Status::Ok
    }

    /// G92.3 — resume the suspended origin offsets.
    pub fn resume_origin_offsets(&mut self) -> Status {
        let status = self.guard();
        if !status.is_ok() {
            return status;
        }
        self.store.gmx.origin_offset_enable = true;
        Status::Ok
    }

    /// G28.1 — store the current machine position.
    pub fn set_g28_position(&mut self) -> Status {
        let status = self.guard();
        if !status.is_ok() {
            return status;
        }
        self.store.gmx.g28_position = self.store.gmx.position;
        Status::Ok
    }

    /// G30.1 — store the current machine position.
    pub fn set_g30_position(&mut self) -> Status {
        let status = self.guard();
        if !status.is_ok() {
            return status;
        }
        self.store.gmx.g30_position = self.store.gmx.position;
        Status::Ok
    }

    /// G28.3 — declare the flagged axes to be at the given machine
    /// coordinates without moving, and mark them homed.
    pub fn set_home_position(
        &mut self,
        values: &[f64; AXIS_COUNT],
        flags: AxisFlags,
    ) -> Status {
        let status = self.guard();
        if !status.is_ok() {
            return status;
        }
        for axis in Axis::ALL {
            if flags.has(axis) {
                let i = axis as usize;
                self.store.gmx.position[i] = values[i];
                self.store.gm.target[i] = values[i];
                self.runtime.set_position(axis, values[i]);
                self.homed.put(axis, true);
            }
        }
        Status::Ok
    }

    // ── Program flow ──

    /// M0 — stop when the queue drains.
    pub fn program_stop(&mut self) -> Status {
        let status = self.guard();
        if !status.is_ok() {
            return status;
        }
        self.pending_flow = ProgramFlow::Stop;
        Status::Ok
    }

    /// M1 — stop when the queue drains, if the operator switch is set.
    pub fn optional_stop(&mut self) -> Status {
        let status = self.guard();
        if !status.is_ok() {
            return status;
        }
        if self.optional_stop_switch {
            self.pending_flow = ProgramFlow::OptionalStop;
        }
        Status::Ok
    }

    /// M2/M30 — end the program when the queue drains.
    pub fn program_end(&mut self) -> Status {
        let status = self.guard();
        if !status.is_ok() {
            return status;
        }
        self.pending_flow = ProgramFlow::End;
        Status::Ok
    }

    pub fn set_optional_stop_switch(&mut self, on: bool) {
        self.optional_stop_switch = on;
    }

    // ── Queue flush & messages ──

    /// Drop every pending planner buffer and resync the model target
    /// to the current position.
    pub fn queue_flush(&mut self) -> Status {
        let status = self.guard();
        if !status.is_ok() {
            return status;
        }
        self.planner.flush();
        self.runtime.abort_held();
        self.store.gmx.position = self.runtime.positions();
        self.store.gm.target = self.store.gmx.position;
        Status::Ok
    }

    /// MSG comment — delivered to the reporter out-of-band.
    pub fn message(&mut self, text: &str) -> Status {
        info!(target: "arbor::report", message = text, "operator message");
        self.last_message = Some(text.to_string());
        Status::Ok
    }

    // ── Cycle entry & command buffers ──

    /// Enter (or stay in) the machining cycle and mark motion running.
    /// Called by every motion command before it enqueues.
    pub(crate) fn enter_cycle(&mut self) {
        if !self.automaton.in_cycle() {
            self.automaton
                .handle_event(MachineEvent::CycleStart(CycleState::Machining));
        }
        self.automaton.handle_event(MachineEvent::MotionStarted);
    }

    /// Enqueue a synchronized non-motion command carrying the current
    /// model snapshot. The target equals the current position so the
    /// runtime does not move.
    fn enqueue_command(&mut self) -> Status {
        let mut gm = self.store.snapshot();
        gm.target = self.store.gmx.position;
        gm.move_time = 0.0;
        match self.planner.commit(gm, MoveKind::Command) {
            Ok(_) => {
                if self.automaton.in_cycle() {
                    // Keep the cycle alive; commands do not start one.
                    self.automaton.handle_event(MachineEvent::MotionStarted);
                }
                Status::Ok
            }
            Err(status) => status,
        }
    }

    // ── Dispatch ──

    /// One cooperative dispatcher iteration: sequencing, cycle
    /// callbacks, runtime execution, cycle-end detection, idle
    /// persistence.
    pub fn dispatch_tick(&mut self) {
        if !self.integrity_ok() {
            if self.automaton.machine_state() != MachineState::Alarm {
                self.raise_alarm(Status::MemoryFault);
            }
            return;
        }

        self.feedhold_sequencing_callback();

        match self.automaton.cycle_state() {
            CycleState::Homing => {
                let status = self.homing_callback();
                if status.raises_alarm() {
                    self.raise_alarm(status);
                }
            }
            CycleState::Probe => {
                let status = self.probe_callback();
                if status.raises_alarm() {
                    self.raise_alarm(status);
                }
            }
            _ => {}
        }

        self.runtime.tick(&mut self.planner);

        self.detect_cycle_end();

        self.active_model = if self.runtime.busy() {
            ModelRef::Runtime
        } else {
            ModelRef::Canonical
        };

        self.persist_offsets_if_idle();
    }

    /// Queue drained, runtime idle, no hold: the cycle ends and the
    /// pending program-flow word decides where the machine lands.
    fn detect_cycle_end(&mut self) {
        if !self.automaton.in_cycle()
            || self.automaton.cycle_state() != CycleState::Machining
            || self.automaton.hold_state().is_active()
            || !self.planner.queue_empty()
            || self.runtime.busy()
        {
            return;
        }

        if self.automaton.motion_state() == MotionState::Run {
            // First idle pass: drop out of RUN, end the cycle next pass.
            self.automaton.handle_event(MachineEvent::MotionStopped);
            return;
        }

        let flow = std::mem::replace(&mut self.pending_flow, ProgramFlow::None);
        if flow == ProgramFlow::End {
            self.automaton.handle_event(MachineEvent::ProgramEndReached);
            self.apply_program_end_resets();
        } else {
            self.automaton.handle_event(MachineEvent::CycleEnd);
        }
    }

    /// M2/M30 model resets: modal defaults, origin offsets cancelled,
    /// spindle and coolant off.
    fn apply_program_end_resets(&mut self) {
        self.store.reset_to_defaults();
        self.store.gmx.origin_offset = [0.0; AXIS_COUNT];
        self.store.gmx.origin_offset_enable = false;
        self.store.gm.spindle_speed = 0.0;
        info!("program end: model reset to power-on defaults");
    }

    /// Write the offset table through to the config store when the
    /// G10 flag is set and nothing is moving.
    fn persist_offsets_if_idle(&mut self) {
        if !self.g10_persist_flag || self.runtime.busy() || !self.planner.queue_empty() {
            return;
        }
        if let Some(store) = self.offset_store.as_mut() {
            match store.save(&self.store.offset_table) {
                Ok(()) => {
                    self.g10_persist_flag = false;
                }
                Err(e) => {
                    warn!(error = %e, "offset persistence failed; will retry");
                }
            }
        } else {
            self.g10_persist_flag = false;
        }
    }
}

/// Clamp an override factor into its configured range, warning when
/// the request was out of range.
fn clamp_factor(factor: f64, min: f64, max: f64, what: &str) -> f64 {
    let clamped = factor.clamp(min, max);
    if clamped != factor {
        warn!(requested = factor, applied = clamped, "{what} factor clamped");
    }
    clamped
}

// ─── Tests ──────────────────────────────────────────────────────────
