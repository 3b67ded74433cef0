//! The three-tier G-code model.
//!
//! - [`GCodeState`] (gm) — the canonical model. Always millimeters,
//!   mm/min, RPM, machine frame. `Copy`, because every planner buffer
//!   receives a by-value snapshot of it at enqueue time.
//! - [`ExtendedState`] (gmx) — state only the canonical machine needs;
//!   never copied into planner buffers. Bracketed by magic markers.
//! - [`GCodeInput`] (gn + gf) — the raw values of the block being
//!   parsed, in the units it was written, with per-word presence flags
//!   and per-modal-group counters. Lives one block.
//!
//! [`ModelStore`] owns the canonical and extended tiers plus the
//! coordinate-offset table and the power-on defaults.

use bitflags::bitflags;
use static_assertions::{assert_impl_all, const_assert};

use arbor_common::axis::{Axis, AxisFlags};
use arbor_common::config::PowerOnDefaults;
use arbor_common::consts::{AXIS_COUNT, COORD_SYSTEM_COUNT};
use arbor_common::gcode::{
    CoordinateSystem, DistanceMode, ModalGroup, MotionMode, NextAction, PathControl, Plane,
    ProgramFlow, SpindleMode, Units, MODAL_GROUP_COUNT,
};

/// Magic value bracketing the extended model and the controller.
pub(crate) const MODEL_MAGIC: u32 = 0x2D4C_ABE3;

// ─── Canonical Model (gm) ───────────────────────────────────────────

/// The canonical G-code state.
///
/// Every field is normalized: lengths in mm, rates in mm/min, spindle
/// in RPM, targets in machine coordinates. Conversion happens on entry
/// from the input tier and on exit to reporting, never here.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GCodeState {
    /// Program line number of the block that produced this state.
    pub line_number: u32,
    /// Modal group 1 motion mode.
    pub motion_mode: MotionMode,
    /// Move endpoint [mm, machine frame].
    pub target: [f64; AXIS_COUNT],
    /// Work offset in effect when this state was captured (reporting
    /// snapshot only — the live composition happens in the offset kernel).
    pub work_offset: [f64; AXIS_COUNT],
    /// Planned move duration [min].
    pub move_time: f64,
    /// Shortest feasible duration given per-axis feed limits [min].
    pub minimum_time: f64,
    /// Active feed rate [mm/min].
    pub feed_rate: f64,
    /// Spindle speed [RPM].
    pub spindle_speed: f64,
    /// Generic P parameter (dwell seconds, etc.).
    pub parameter: f64,
    /// G93 inverse-time feed mode active.
    pub inverse_feed_rate_mode: bool,
    /// Modal group 2 plane.
    pub plane: Plane,
    /// Modal group 6 units.
    pub units: Units,
    /// Modal group 12 coordinate system.
    pub coord_system: CoordinateSystem,
    /// G53 — suppress all offsets for the current block only.
    pub absolute_override: bool,
    /// Modal group 13 path control.
    pub path_control: PathControl,
    /// Modal group 3 distance mode.
    pub distance_mode: DistanceMode,
    /// Active tool.
    pub tool: u8,
    /// Tool staged by T, activated by M6.
    pub tool_select: u8,
    /// M7 mist coolant.
    pub mist_coolant: bool,
    /// M8 flood coolant.
    pub flood_coolant: bool,
    /// Spindle rotation mode.
    pub spindle_mode: SpindleMode,
}

// The snapshot unit must stay a plain copyable value and small enough
// to treat as one.
assert_impl_all!(GCodeState: Copy, Send);
const_assert!(core::mem::size_of::<GCodeState>() <= 192);

impl Default for GCodeState {
    fn default() -> Self {
        Self {
            line_number: 0,
            motion_mode: MotionMode::Cancel,
            target: [0.0; AXIS_COUNT],
            work_offset: [0.0; AXIS_COUNT],
            move_time: 0.0,
            minimum_time: 0.0,
            feed_rate: 0.0,
            spindle_speed: 0.0,
            parameter: 0.0,
            inverse_feed_rate_mode: false,
            plane: Plane::default(),
            units: Units::default(),
            coord_system: CoordinateSystem::default(),
            absolute_override: false,
            path_control: PathControl::default(),
            distance_mode: DistanceMode::default(),
            tool: 0,
            tool_select: 0,
            mist_coolant: false,
            flood_coolant: false,
            spindle_mode: SpindleMode::Off,
        }
    }
}

// ─── Extended Model (gmx) ───────────────────────────────────────────

/// Model state owned only by the canonical machine.
///
/// Planner buffers never see this tier. The magic markers guard
/// against the stray-write corruption the snapshot path would
/// otherwise silently propagate.
#[derive(Debug, Clone)]
pub struct ExtendedState {
    magic_start: u32,
    /// Current model position [mm, machine frame].
    pub position: [f64; AXIS_COUNT],
    /// G92 origin offset [mm].
    pub origin_offset: [f64; AXIS_COUNT],
    /// G92 offset currently applied (G92.2 suspends, G92.3 resumes).
    pub origin_offset_enable: bool,
    /// Stored G28 position [mm, machine frame].
    pub g28_position: [f64; AXIS_COUNT],
    /// Stored G30 position [mm, machine frame].
    pub g30_position: [f64; AXIS_COUNT],
    /// G93 inverse feed rate [1/min] for the current block.
    pub inverse_feed_rate: f64,
    /// Feed override factor and enable.
    pub feed_override_factor: f64,
    pub feed_override_enable: bool,
    /// Traverse override factor and enable.
    pub traverse_override_factor: f64,
    pub traverse_override_enable: bool,
    /// Spindle override factor and enable.
    pub spindle_override_factor: f64,
    pub spindle_override_enable: bool,
    /// L word of the current block.
    pub l_word: u8,
    /// Block-delete switch (leading `/` lines are dropped when set).
    pub block_delete_switch: bool,
    /// Arc radius word [mm].
    pub arc_radius: f64,
    /// Arc center offsets I/J/K [mm].
    pub arc_offset: [f64; 3],
    magic_end: u32,
}

impl Default for ExtendedState {
    fn default() -> Self {
        Self {
            magic_start: MODEL_MAGIC,
            position: [0.0; AXIS_COUNT],
            origin_offset: [0.0; AXIS_COUNT],
            origin_offset_enable: false,
            g28_position: [0.0; AXIS_COUNT],
            g30_position: [0.0; AXIS_COUNT],
            inverse_feed_rate: 0.0,
            feed_override_factor: 1.0,
            feed_override_enable: false,
            traverse_override_factor: 1.0,
            traverse_override_enable: false,
            spindle_override_factor: 1.0,
            spindle_override_enable: false,
            l_word: 0,
            block_delete_switch: false,
            arc_radius: 0.0,
            arc_offset: [0.0; 3],
            magic_end: MODEL_MAGIC,
        }
    }
}

impl ExtendedState {
    /// Integrity check on the bracketing markers.
    #[inline]
    pub fn integrity_ok(&self) -> bool {
        self.magic_start == MODEL_MAGIC && self.magic_end == MODEL_MAGIC
    }

    #[cfg(test)]
    pub(crate) fn corrupt_for_test(&mut self) {
        self.magic_end = 0;
    }
}

// ─── Input Tier (gn / gf) ───────────────────────────────────────────

bitflags! {
    /// Word-presence flags for the current block (the gf tier).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct WordFlags: u32 {
        const LINE_NUMBER            = 1 << 0;
        const NEXT_ACTION            = 1 << 1;
        const MOTION_MODE            = 1 << 2;
        const PROGRAM_FLOW           = 1 << 3;
        const FEED_RATE              = 1 << 4;
        const SPINDLE_SPEED          = 1 << 5;
        const PARAMETER              = 1 << 6;
        const L_WORD                 = 1 << 7;
        const TOOL_SELECT            = 1 << 8;
        const TOOL_CHANGE            = 1 << 9;
        const ARC_RADIUS             = 1 << 10;
        const ARC_I                  = 1 << 11;
        const ARC_J                  = 1 << 12;
        const ARC_K                  = 1 << 13;
        const UNITS                  = 1 << 14;
        const DISTANCE_MODE          = 1 << 15;
        const PLANE                  = 1 << 16;
        const COORD_SYSTEM           = 1 << 17;
        const PATH_CONTROL           = 1 << 18;
        const INVERSE_FEED_RATE_MODE = 1 << 19;
        const MIST_COOLANT           = 1 << 20;
        const FLOOD_COOLANT          = 1 << 21;
        const SPINDLE_MODE           = 1 << 22;
        const OVERRIDE_ENABLES       = 1 << 23;
        const FEED_OVERRIDE_FACTOR   = 1 << 24;
        const SPINDLE_OVERRIDE_FACTOR = 1 << 25;
        const ABSOLUTE_OVERRIDE      = 1 << 26;
    }
}

/// One parsed block: raw word values in as-written units plus the
/// presence flags. The parser fills it through the setters, which
/// also count words per modal group so a double assignment inside one
/// block is detectable later without re-parsing.
#[derive(Debug, Clone)]
pub struct GCodeInput {
    pub line_number: u32,
    pub next_action: NextAction,
    pub motion_mode: MotionMode,
    pub program_flow: ProgramFlow,
    /// Axis words in as-written units.
    pub target: [f64; AXIS_COUNT],
    /// Which axis words are present.
    pub target_flags: AxisFlags,
    pub feed_rate: f64,
    pub spindle_speed: f64,
    pub parameter: f64,
    pub l_word: u8,
    pub tool: u8,
    pub arc_radius: f64,
    pub arc_offset: [f64; 3],
    pub units: Units,
    pub distance_mode: DistanceMode,
    pub plane: Plane,
    pub coord_system: CoordinateSystem,
    pub path_control: PathControl,
    pub inverse_feed_rate_mode: bool,
    pub mist_coolant: bool,
    pub flood_coolant: bool,
    pub spindle_mode: SpindleMode,
    pub override_enables: bool,
    pub feed_override_factor: f64,
    pub spindle_override_factor: f64,
    /// Word-presence flags.
    pub flags: WordFlags,
    group_seen: [u8; MODAL_GROUP_COUNT],
}

impl Default for GCodeInput {
    fn default() -> Self {
        Self {
            line_number: 0,
            next_action: NextAction::Default,
            motion_mode: MotionMode::Cancel,
            program_flow: ProgramFlow::None,
            target: [0.0; AXIS_COUNT],
            target_flags: AxisFlags::empty(),
            feed_rate: 0.0,
            spindle_speed: 0.0,
            parameter: 0.0,
            l_word: 0,
            tool: 0,
            arc_radius: 0.0,
            arc_offset: [0.0; 3],
            units: Units::default(),
            distance_mode: DistanceMode::default(),
            plane: Plane::default(),
            coord_system: CoordinateSystem::default(),
            path_control: PathControl::default(),
            inverse_feed_rate_mode: false,
            mist_coolant: false,
            flood_coolant: false,
            spindle_mode: SpindleMode::Off,
            override_enables: false,
            feed_override_factor: 1.0,
            spindle_override_factor: 1.0,
            flags: WordFlags::empty(),
            group_seen: [0; MODAL_GROUP_COUNT],
        }
    }
}

impl GCodeInput {
    /// Fresh input tier for the next block.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    #[inline]
    fn mark(&mut self, flag: WordFlags, group: Option<ModalGroup>) {
        self.flags.insert(flag);
        if let Some(group) = group {
            self.group_seen[group as usize] = self.group_seen[group as usize].saturating_add(1);
        }
    }

    /// First modal group with more than one word in this block.
    pub fn modal_group_conflict(&self) -> Option<ModalGroup> {
        const GROUPS: [ModalGroup; MODAL_GROUP_COUNT] = [
            ModalGroup::NonModal,
            ModalGroup::Motion,
            ModalGroup::Plane,
            ModalGroup::Distance,
            ModalGroup::FeedRateMode,
            ModalGroup::Units,
            ModalGroup::CoordSystem,
            ModalGroup::PathControl,
            ModalGroup::Stopping,
            ModalGroup::ToolChange,
            ModalGroup::Spindle,
            ModalGroup::Coolant,
            ModalGroup::Override,
        ];
        GROUPS
            .into_iter()
            .find(|g| self.group_seen[*g as usize] > 1)
    }

    // ── Parser-facing setters ──

    pub fn set_line_number(&mut self, n: u32) {
        self.line_number = n;
        self.mark(WordFlags::LINE_NUMBER, None);
    }

    pub fn set_motion_mode(&mut self, mode: MotionMode) {
        self.motion_mode = mode;
        self.mark(WordFlags::MOTION_MODE, Some(ModalGroup::Motion));
    }

    pub fn set_next_action(&mut self, action: NextAction) {
        self.next_action = action;
        self.mark(WordFlags::NEXT_ACTION, Some(ModalGroup::NonModal));
    }

    pub fn set_program_flow(&mut self, flow: ProgramFlow) {
        self.program_flow = flow;
        self.mark(WordFlags::PROGRAM_FLOW, Some(ModalGroup::Stopping));
    }

    pub fn set_axis_word(&mut self, axis: Axis, value: f64) {
        self.target[axis as usize] = value;
        self.target_flags.put(axis, true);
    }

    pub fn set_feed_rate(&mut self, rate: f64) {
        self.feed_rate = rate;
        self.mark(WordFlags::FEED_RATE, None);
    }

    pub fn set_spindle_speed(&mut self, speed: f64) {
        self.spindle_speed = speed;
        self.mark(WordFlags::SPINDLE_SPEED, None);
    }

    pub fn set_parameter(&mut self, p: f64) {
        self.parameter = p;
        self.mark(WordFlags::PARAMETER, None);
    }

    pub fn set_l_word(&mut self, l: u8) {
        self.l_word = l;
        self.mark(WordFlags::L_WORD, None);
    }

    pub fn set_tool_select(&mut self, tool: u8) {
        self.tool = tool;
        self.mark(WordFlags::TOOL_SELECT, None);
    }

    pub fn set_tool_change(&mut self) {
        self.mark(WordFlags::TOOL_CHANGE, Some(ModalGroup::ToolChange));
    }

    pub fn set_arc_radius(&mut self, radius: f64) {
        self.arc_radius = radius;
        self.mark(WordFlags::ARC_RADIUS, None);
    }

    /// I/J/K word, indexed 0/1/2.
    pub fn set_arc_offset(&mut self, index: usize, value: f64) {
        self.arc_offset[index] = value;
        let flag = match index {
            0 => WordFlags::ARC_I,
            1 => WordFlags::ARC_J,
            _ => WordFlags::ARC_K,
        };
        self.mark(flag, None);
    }

    pub fn set_units(&mut self, units: Units) {
        self.units = units;
        self.mark(WordFlags::UNITS, Some(ModalGroup::Units));
    }

    pub fn set_distance_mode(&mut self, mode: DistanceMode) {
        self.distance_mode = mode;
        self.mark(WordFlags::DISTANCE_MODE, Some(ModalGroup::Distance));
    }

    pub fn set_plane(&mut self, plane: Plane) {
        self.plane = plane;
        self.mark(WordFlags::PLANE, Some(ModalGroup::Plane));
    }

    pub fn set_coord_system(&mut self, system: CoordinateSystem) {
        self.coord_system = system;
        self.mark(WordFlags::COORD_SYSTEM, Some(ModalGroup::CoordSystem));
    }

    pub fn set_path_control(&mut self, mode: PathControl) {
        self.path_control = mode;
        self.mark(WordFlags::PATH_CONTROL, Some(ModalGroup::PathControl));
    }

    pub fn set_inverse_feed_rate_mode(&mut self, on: bool) {
        self.inverse_feed_rate_mode = on;
        self.mark(
            WordFlags::INVERSE_FEED_RATE_MODE,
            Some(ModalGroup::FeedRateMode),
        );
    }

    pub fn set_mist_coolant(&mut self, on: bool) {
        self.mist_coolant = on;
        self.mark(WordFlags::MIST_COOLANT, Some(ModalGroup::Coolant));
    }

    pub fn set_flood_coolant(&mut self, on: bool) {
        self.flood_coolant = on;
        self.mark(WordFlags::FLOOD_COOLANT, Some(ModalGroup::Coolant));
    }

    /// M9 — both coolants off; counts once against the coolant group.
    pub fn set_coolant_off(&mut self) {
        self.mist_coolant = false;
        self.flood_coolant = false;
        self.flags
            .insert(WordFlags::MIST_COOLANT | WordFlags::FLOOD_COOLANT);
        let group = ModalGroup::Coolant as usize;
        self.group_seen[group] = self.group_seen[group].saturating_add(1);
    }

    pub fn set_spindle_mode(&mut self, mode: SpindleMode) {
        self.spindle_mode = mode;
        self.mark(WordFlags::SPINDLE_MODE, Some(ModalGroup::Spindle));
    }

    pub fn set_override_enables(&mut self, on: bool) {
        self.override_enables = on;
        self.mark(WordFlags::OVERRIDE_ENABLES, Some(ModalGroup::Override));
    }

    pub fn set_feed_override_factor(&mut self, factor: f64) {
        self.feed_override_factor = factor;
        self.mark(WordFlags::FEED_OVERRIDE_FACTOR, None);
    }

    pub fn set_spindle_override_factor(&mut self, factor: f64) {
        self.spindle_override_factor = factor;
        self.mark(WordFlags::SPINDLE_OVERRIDE_FACTOR, None);
    }

    /// G53 — absolute override for this block.
    pub fn set_absolute_override(&mut self) {
        self.mark(WordFlags::ABSOLUTE_OVERRIDE, None);
    }
}

// ─── Model Store ────────────────────────────────────────────────────

/// Owner of the canonical and extended tiers, the coordinate-offset
/// table, and the power-on defaults.
#[derive(Debug, Clone)]
pub struct ModelStore {
    /// Canonical model (gm).
    pub gm: GCodeState,
    /// Extended model (gmx).
    pub gmx: ExtendedState,
    /// Work offsets: `[coord_system][axis]`, mm. Row 0 is the machine
    /// frame and stays zero.
    pub offset_table: [[f64; AXIS_COUNT]; COORD_SYSTEM_COUNT],
    /// Modal defaults applied at init and program end.
    pub defaults: PowerOnDefaults,
}

impl ModelStore {
    pub fn new(defaults: PowerOnDefaults) -> Self {
        let mut store = Self {
            gm: GCodeState::default(),
            gmx: ExtendedState::default(),
            offset_table: [[0.0; AXIS_COUNT]; COORD_SYSTEM_COUNT],
            defaults,
        };
        store.reset_to_defaults();
        store
    }

    /// By-value snapshot of the canonical model for a planner slot.
    ///
    /// The copy is made before the slot is published to the runtime,
    /// which is what makes the snapshot atomic with respect to it.
    #[inline]
    pub fn snapshot(&self) -> GCodeState {
        self.gm
    }

    /// Copy the configured defaults into gm. Called at init and at
    /// program end. Position and offsets are not touched.
    pub fn reset_to_defaults(&mut self) {
        self.gm.units = self.defaults.units;
        self.gm.coord_system = self.defaults.coord_system;
        self.gm.plane = self.defaults.plane;
        self.gm.distance_mode = self.defaults.distance_mode;
        self.gm.path_control = self.defaults.path_control;
        self.gm.motion_mode = MotionMode::Cancel;
        self.gm.absolute_override = false;
        self.gm.inverse_feed_rate_mode = false;
        self.gm.feed_rate = 0.0;
        self.gm.spindle_mode = SpindleMode::Off;
        self.gm.mist_coolant = false;
        self.gm.flood_coolant = false;
    }

    /// Write flagged axes into `gm.target`. Values are already in mm
    /// and machine frame — distance-mode resolution is the block
    /// normalizer's job.
    pub fn set_target(&mut self, target: &[f64; AXIS_COUNT], flags: AxisFlags) {
        for axis in Axis::ALL {
            if flags.has(axis) {
                self.gm.target[axis as usize] = target[axis as usize];
            }
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
