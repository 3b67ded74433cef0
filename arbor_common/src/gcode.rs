//! G-code modal vocabulary shared by the parser and the canonical machine.
//!
//! Every enum here is a normalized *meaning*, not a syntax token: the
//! parser maps `G17` to `Plane::Xy` once, and nothing downstream ever
//! looks at G-numbers again.

use serde::{Deserialize, Serialize};

use crate::axis::Axis;
use crate::consts::MM_PER_INCH;

// ─── Group 1: Motion ────────────────────────────────────────────────

/// Modal group 1 motion mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum MotionMode {
    /// G0 rapid traverse.
    Traverse = 0,
    /// G1 straight feed.
    Feed = 1,
    /// G2 clockwise arc feed.
    ClockwiseArc = 2,
    /// G3 counterclockwise arc feed.
    CounterclockwiseArc = 3,
    /// G38.2 straight probe.
    StraightProbe = 4,
    /// G80 cancel motion mode.
    Cancel = 5,
}

impl MotionMode {
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Traverse),
            1 => Some(Self::Feed),
            2 => Some(Self::ClockwiseArc),
            3 => Some(Self::CounterclockwiseArc),
            4 => Some(Self::StraightProbe),
            5 => Some(Self::Cancel),
            _ => None,
        }
    }

    /// True for the two arc modes.
    #[inline]
    pub const fn is_arc(&self) -> bool {
        matches!(self, Self::ClockwiseArc | Self::CounterclockwiseArc)
    }
}

impl Default for MotionMode {
    fn default() -> Self {
        Self::Cancel
    }
}

// ─── Group 2: Plane Selection ───────────────────────────────────────

/// Modal group 2 plane selection (G17/G18/G19).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Plane {
    /// G17 — XY plane, normal Z.
    Xy = 0,
    /// G18 — XZ plane, normal Y.
    Xz = 1,
    /// G19 — YZ plane, normal X.
    Yz = 2,
}

impl Plane {
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Xy),
            1 => Some(Self::Xz),
            2 => Some(Self::Yz),
            _ => None,
        }
    }

    /// The plane's first, second and normal axes, in arc-parameter order.
    ///
    /// For G18 the pair is (Z, X) per RS274 so that clockwise keeps its
    /// right-hand meaning when viewed along the positive normal.
    #[inline]
    pub const fn axes(&self) -> (Axis, Axis, Axis) {
        match self {
            Self::Xy => (Axis::X, Axis::Y, Axis::Z),
            Self::Xz => (Axis::Z, Axis::X, Axis::Y),
            Self::Yz => (Axis::Y, Axis::Z, Axis::X),
        }
    }
}

impl Default for Plane {
    fn default() -> Self {
        Self::Xy
    }
}

// ─── Group 3: Distance Mode ─────────────────────────────────────────

/// Modal group 3 distance mode (G90/G91).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum DistanceMode {
    /// G90 — targets are absolute coordinates.
    Absolute = 0,
    /// G91 — targets are offsets from the current position.
    Incremental = 1,
}

impl DistanceMode {
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Absolute),
            1 => Some(Self::Incremental),
            _ => None,
        }
    }
}

impl Default for DistanceMode {
    fn default() -> Self {
        Self::Absolute
    }
}

// ─── Group 6: Units ─────────────────────────────────────────────────

/// Modal group 6 units mode (G20/G21).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Units {
    /// G21 — lengths in millimeters.
    Millimeters = 0,
    /// G20 — lengths in inches.
    Inches = 1,
}

impl Units {
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Millimeters),
            1 => Some(Self::Inches),
            _ => None,
        }
    }

    /// Normalize a length written in these units to millimeters.
    #[inline]
    pub fn to_mm(&self, value: f64) -> f64 {
        match self {
            Self::Millimeters => value,
            Self::Inches => value * MM_PER_INCH,
        }
    }

    /// Convert a canonical millimeter value to these display units.
    #[inline]
    pub fn from_mm(&self, value: f64) -> f64 {
        match self {
            Self::Millimeters => value,
            Self::Inches => value / MM_PER_INCH,
        }
    }
}

impl Default for Units {
    fn default() -> Self {
        Self::Millimeters
    }
}

// ─── Group 12: Coordinate System ────────────────────────────────────

/// Modal group 12 work coordinate system selection.
///
/// Index 0 is the machine frame itself; G54..G59 are the nine-word
/// programmable offsets 1..=6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum CoordinateSystem {
    /// Machine coordinates (no work offset).
    Machine = 0,
    G54 = 1,
    G55 = 2,
    G56 = 3,
    G57 = 4,
    G58 = 5,
    G59 = 6,
}

impl CoordinateSystem {
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Machine),
            1 => Some(Self::G54),
            2 => Some(Self::G55),
            3 => Some(Self::G56),
            4 => Some(Self::G57),
            5 => Some(Self::G58),
            6 => Some(Self::G59),
            _ => None,
        }
    }

    /// Index into the offset table.
    #[inline]
    pub const fn index(&self) -> usize {
        *self as usize
    }
}

impl Default for CoordinateSystem {
    fn default() -> Self {
        Self::G54
    }
}

// ─── Group 13: Path Control ─────────────────────────────────────────

/// Modal group 13 path control mode (G61/G61.1/G64).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum PathControl {
    /// G61 — exact path.
    ExactPath = 0,
    /// G61.1 — exact stop between moves.
    ExactStop = 1,
    /// G64 — continuous with corner blending.
    Continuous = 2,
}

impl PathControl {
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::ExactPath),
            1 => Some(Self::ExactStop),
            2 => Some(Self::Continuous),
            _ => None,
        }
    }
}

impl Default for PathControl {
    fn default() -> Self {
        Self::Continuous
    }
}

// ─── Spindle ────────────────────────────────────────────────────────

/// Spindle rotation mode (M3/M4/M5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum SpindleMode {
    /// M5 — spindle off.
    Off = 0,
    /// M3 — clockwise.
    Clockwise = 1,
    /// M4 — counterclockwise.
    Counterclockwise = 2,
}

impl SpindleMode {
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Off),
            1 => Some(Self::Clockwise),
            2 => Some(Self::Counterclockwise),
            _ => None,
        }
    }
}

impl Default for SpindleMode {
    fn default() -> Self {
        Self::Off
    }
}

// ─── Non-Modal Actions & Program Flow ───────────────────────────────

/// Non-modal action carried by the current block (group 0, plus the
/// cycle-start G-codes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum NextAction {
    /// No non-modal action: motion per the motion mode, if axes present.
    Default = 0,
    /// G4 dwell for P seconds.
    Dwell = 1,
    /// G10 L2 — program a coordinate-system offset row.
    SetCoordOffsets = 2,
    /// G28 — go to the stored G28 position via an intermediate point.
    GotoG28 = 3,
    /// G28.1 — store the current machine position as G28.
    SetG28 = 4,
    /// G28.2 — start the homing cycle on the flagged axes.
    HomingCycle = 5,
    /// G28.3 — set the flagged axes' positions without motion, mark homed.
    SetHomePosition = 6,
    /// G30 — go to the stored G30 position via an intermediate point.
    GotoG30 = 7,
    /// G30.1 — store the current machine position as G30.
    SetG30 = 8,
    /// G92 — set origin offsets so the flagged axes read the given values.
    SetOriginOffsets = 9,
    /// G92.1 — reset origin offsets to zero and disable.
    ResetOriginOffsets = 10,
    /// G92.2 — suspend origin offsets, keep the values.
    SuspendOriginOffsets = 11,
    /// G92.3 — resume the suspended origin offsets.
    ResumeOriginOffsets = 12,
    /// G38.2 — straight probe toward the target.
    StraightProbe = 13,
}

impl NextAction {
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Default),
            1 => Some(Self::Dwell),
            2 => Some(Self::SetCoordOffsets),
            3 => Some(Self::GotoG28),
            4 => Some(Self::SetG28),
            5 => Some(Self::HomingCycle),
            6 => Some(Self::SetHomePosition),
            7 => Some(Self::GotoG30),
            8 => Some(Self::SetG30),
            9 => Some(Self::SetOriginOffsets),
            10 => Some(Self::ResetOriginOffsets),
            11 => Some(Self::SuspendOriginOffsets),
            12 => Some(Self::ResumeOriginOffsets),
            13 => Some(Self::StraightProbe),
            _ => None,
        }
    }
}

impl Default for NextAction {
    fn default() -> Self {
        Self::Default
    }
}

/// Program flow word (M0/M1/M2/M30), modal group 4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ProgramFlow {
    /// No flow word in this block.
    None = 0,
    /// M0 — unconditional program stop.
    Stop = 1,
    /// M1 — optional stop (honored when the stop switch is set).
    OptionalStop = 2,
    /// M2/M30 — program end.
    End = 3,
}

impl ProgramFlow {
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::None),
            1 => Some(Self::Stop),
            2 => Some(Self::OptionalStop),
            3 => Some(Self::End),
            _ => None,
        }
    }
}

impl Default for ProgramFlow {
    fn default() -> Self {
        Self::None
    }
}

// ─── Modal Groups ───────────────────────────────────────────────────

/// Modal group identity, used by the input tier to count words per
/// group so a double assignment inside one block is detectable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ModalGroup {
    /// G group 0 — non-modal (may coexist with group 1).
    NonModal = 0,
    /// G group 1 — motion.
    Motion = 1,
    /// G group 2 — plane selection.
    Plane = 2,
    /// G group 3 — distance mode.
    Distance = 3,
    /// G group 5 — feed rate mode.
    FeedRateMode = 4,
    /// G group 6 — units.
    Units = 5,
    /// G group 12 — coordinate system.
    CoordSystem = 6,
    /// G group 13 — path control.
    PathControl = 7,
    /// M group 4 — stopping.
    Stopping = 8,
    /// M group 6 — tool change.
    ToolChange = 9,
    /// M group 7 — spindle.
    Spindle = 10,
    /// M group 8 — coolant (M7 and M8 may both be active).
    Coolant = 11,
    /// M group 9 — override enables.
    Override = 12,
}

/// Number of tracked modal groups.
pub const MODAL_GROUP_COUNT: usize = 13;

// ─── Tests ──────────────────────────────────────────────────────────
