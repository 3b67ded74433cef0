//! Machine state enums and the combined-state projection.
//!
//! All enums use `#[repr(u8)]` for compact layout and cheap snapshot
//! copies. The live automaton is three orthogonal levels — machine,
//! cycle, motion — with a feedhold sub-state and per-axis homing
//! status. Transition logic lives in `arbor_machine::state`; this
//! module owns only the vocabulary and the pure projection used by
//! reporting.

use serde::{Deserialize, Serialize};

// ─── Machine Level ──────────────────────────────────────────────────

/// Top-level machine lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum MachineState {
    /// Boot-time initialization in progress.
    Initializing = 0,
    /// Initialized, no program activity yet.
    Ready = 1,
    /// Fault latched — motion rejected until explicitly cleared.
    Alarm = 2,
    /// Program stopped (M0/M1 or queue drained).
    ProgramStop = 3,
    /// Program ended (M2/M30) — model reset to power-on defaults.
    ProgramEnd = 4,
    /// A cycle is active (machining, homing, probe or jog).
    Cycle = 5,
}

impl MachineState {
    /// Convert from raw `u8`. Returns `None` for invalid values.
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Initializing),
            1 => Some(Self::Ready),
            2 => Some(Self::Alarm),
            3 => Some(Self::ProgramStop),
            4 => Some(Self::ProgramEnd),
            5 => Some(Self::Cycle),
            _ => None,
        }
    }

    /// States from which a new cycle may be started.
    #[inline]
    pub const fn can_start_cycle(&self) -> bool {
        matches!(self, Self::Ready | Self::ProgramStop | Self::ProgramEnd | Self::Cycle)
    }
}

impl Default for MachineState {
    fn default() -> Self {
        Self::Initializing
    }
}

// ─── Cycle Level ────────────────────────────────────────────────────

/// Kind of cycle in progress while `MachineState::Cycle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum CycleState {
    /// No cycle active.
    Off = 0,
    /// Normal program execution.
    Machining = 1,
    /// Probe cycle (G38.2) driving the probe callback.
    Probe = 2,
    /// Homing cycle driving the homing callback.
    Homing = 3,
    /// Jog input executing as a cycle.
    Jog = 4,
}

impl CycleState {
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Off),
            1 => Some(Self::Machining),
            2 => Some(Self::Probe),
            3 => Some(Self::Homing),
            4 => Some(Self::Jog),
            _ => None,
        }
    }
}

impl Default for CycleState {
    fn default() -> Self {
        Self::Off
    }
}

// ─── Motion Level ───────────────────────────────────────────────────

/// Motion runtime state within a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum MotionState {
    /// Runtime has no in-flight move.
    Stop = 0,
    /// Runtime is executing moves.
    Run = 1,
    /// Runtime stopped at a feedhold decel boundary.
    Hold = 2,
}

impl MotionState {
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Stop),
            1 => Some(Self::Run),
            2 => Some(Self::Hold),
            _ => None,
        }
    }
}

impl Default for MotionState {
    fn default() -> Self {
        Self::Stop
    }
}

// ─── Feedhold Sub-State ─────────────────────────────────────────────

/// Feedhold progression: Off → Sync → Plan → Decel → Hold, and
/// EndHold on resume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum FeedholdState {
    /// No hold requested.
    Off = 0,
    /// Hold latched, waiting for the planner to reach a sync point.
    Sync = 1,
    /// Planner replanning to a stop.
    Plan = 2,
    /// Runtime decelerating.
    Decel = 3,
    /// Stopped; motion may resume from the held point.
    Hold = 4,
    /// Resume requested; runtime restarting the held move.
    EndHold = 5,
}

impl FeedholdState {
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Off),
            1 => Some(Self::Sync),
            2 => Some(Self::Plan),
            3 => Some(Self::Decel),
            4 => Some(Self::Hold),
            5 => Some(Self::EndHold),
            _ => None,
        }
    }

    /// True while a hold is being entered, held, or exited.
    #[inline]
    pub const fn is_active(&self) -> bool {
        !matches!(self, Self::Off)
    }

    /// True in the states where a queue flush is permitted.
    #[inline]
    pub const fn allows_flush(&self) -> bool {
        matches!(self, Self::Hold | Self::EndHold)
    }
}

impl Default for FeedholdState {
    fn default() -> Self {
        Self::Off
    }
}

// ─── Homing Status ──────────────────────────────────────────────────

/// Overall homing status (the per-axis progression is private to the
/// homing cycle).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum HomingState {
    /// At least one enabled axis has not been homed since the last alarm.
    NotHomed = 0,
    /// All enabled axes homed.
    Homed = 1,
}

impl HomingState {
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::NotHomed),
            1 => Some(Self::Homed),
            _ => None,
        }
    }
}

impl Default for HomingState {
    fn default() -> Self {
        Self::NotHomed
    }
}

// ─── Combined Projection ────────────────────────────────────────────

/// External machine status — a pure projection of the three automaton
/// levels, used by the reporter's `stat` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum CombinedState {
    Initializing = 0,
    Ready = 1,
    Alarm = 2,
    ProgramStop = 3,
    ProgramEnd = 4,
    Run = 5,
    Hold = 6,
    Probe = 7,
    Cycle = 8,
    Homing = 9,
    Jog = 10,
}

impl CombinedState {
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Initializing),
            1 => Some(Self::Ready),
            2 => Some(Self::Alarm),
            3 => Some(Self::ProgramStop),
            4 => Some(Self::ProgramEnd),
            5 => Some(Self::Run),
            6 => Some(Self::Hold),
            7 => Some(Self::Probe),
            8 => Some(Self::Cycle),
            9 => Some(Self::Homing),
            10 => Some(Self::Jog),
            _ => None,
        }
    }

    /// Project the live automaton onto the external status word.
    ///
    /// Within a cycle, the cycle kind wins over the motion state for
    /// homing/probe/jog; otherwise the motion state decides between
    /// RUN, HOLD and CYCLE (between-moves).
    pub const fn project(
        machine: MachineState,
        cycle: CycleState,
        motion: MotionState,
    ) -> Self {
        match machine {
            MachineState::Initializing => Self::Initializing,
            MachineState::Alarm => Self::Alarm,
            MachineState::Ready => Self::Ready,
            MachineState::ProgramStop => Self::ProgramStop,
            MachineState::ProgramEnd => Self::ProgramEnd,
            MachineState::Cycle => match cycle {
                CycleState::Homing => Self::Homing,
                CycleState::Probe => Self::Probe,
                CycleState::Jog => Self::Jog,
                CycleState::Off | CycleState::Machining => match motion {
                    MotionState::Run => Self::Run,
                    MotionState::Hold => Self::Hold,
                    MotionState::Stop => Self::Cycle,
                },
            },
        }
    }
}

impl std::fmt::Display for CombinedState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Initializing => "INITIALIZING",
            Self::Ready => "READY",
            Self::Alarm => "ALARM",
            Self::ProgramStop => "PROGRAM_STOP",
            Self::ProgramEnd => "PROGRAM_END",
            Self::Run => "RUN",
            Self::Hold => "HOLD",
            Self::Probe => "PROBE",
            Self::Cycle => "CYCLE",
            Self::Homing => "HOMING",
            Self::Jog => "JOG",
        };
        write!(f, "{name}")
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
