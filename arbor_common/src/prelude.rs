//! Prelude module for common re-exports.
//!
//! Consumers can `use arbor_common::prelude::*;` and get the most
//! important types without listing individual paths.

// ─── Axes ───────────────────────────────────────────────────────────
pub use crate::axis::{Axis, AxisFlags, AxisMode};

// ─── System Constants ───────────────────────────────────────────────
pub use crate::consts::{AXIS_COUNT, COORD_SYSTEM_COUNT, MM_PER_INCH};

// ─── Machine State ──────────────────────────────────────────────────
pub use crate::state::{
    CombinedState, CycleState, FeedholdState, HomingState, MachineState, MotionState,
};

// ─── G-code Vocabulary ──────────────────────────────────────────────
pub use crate::gcode::{
    CoordinateSystem, DistanceMode, MotionMode, NextAction, PathControl, Plane, ProgramFlow,
    SpindleMode, Units,
};

// ─── Status & Config ────────────────────────────────────────────────
pub use crate::config::{AxisConfig, ConfigError, MachineConfig, SwitchMode, SystemConfig};
pub use crate::status::Status;
