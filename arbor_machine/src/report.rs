//! Reporting adapter.
//!
//! Token-keyed read-only projections of the model and runtime, plus
//! getter/setters for the per-axis configuration. The external
//! reporter composes status lines out of these fields; everything it
//! sees is a [`serde_json::Value`], lengths converted to the active
//! display units on the way out and back in.
//!
//! Reads resolve through [`ModelRef`]: the live canonical model, a
//! committed planner snapshot, or the runtime's own snapshot. During
//! motion the machine points the active model at the runtime so
//! reports describe the move actually executing, not the block most
//! recently parsed.

use serde_json::{json, Value};

use arbor_common::axis::{Axis, AxisMode};
use arbor_common::config::SwitchMode;
use arbor_common::gcode::CoordinateSystem;
use arbor_common::status::Status;

use crate::machine::CanonicalMachine;

/// Which G-code model a report field reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelRef {
    /// The live canonical model (gm).
    Canonical,
    /// The snapshot inside a committed planner buffer.
    Planner(u32),
    /// The runtime's snapshot of the executing move.
    Runtime,
}

/// Read one named field. Returns `None` for unknown tokens.
pub fn get(cm: &CanonicalMachine, token: &str) -> Option<Value> {
    // Whole-machine scalars first.
    match token {
        "stat" => return Some(json!(cm.combined_state() as u8)),
        "macs" => return Some(json!(cm.machine_state() as u8)),
        "cycs" => return Some(json!(cm.automaton_cycle() as u8)),
        "mots" => return Some(json!(cm.automaton_motion() as u8)),
        "hold" => return Some(json!(cm.automaton_hold() as u8)),
        "home" => return Some(json!(u8::from(all_homed(cm)))),
        "vel" => return Some(json!(display_length(cm, cm.runtime().velocity(), true))),
        "mline" => return Some(json!(cm.runtime().line_number())),
        "g92e" => return Some(json!(u8::from(cm.store().gmx.origin_offset_enable))),
        "prbe" => return Some(json!(u8::from(cm.probe_result().triggered))),
        "msg" => {
            return Some(match cm.last_message() {
                Some(text) => json!(text),
                None => Value::Null,
            });
        }
        _ => {}
    }

    // Modal fields read through the active model snapshot.
    let gm = cm.model(cm.active_model());
    match token {
        "unit" => return Some(json!(gm.units as u8)),
        "coor" => return Some(json!(gm.coord_system as u8)),
        "momo" => return Some(json!(gm.motion_mode as u8)),
        "plan" => return Some(json!(gm.plane as u8)),
        "path" => return Some(json!(gm.path_control as u8)),
        "dist" => return Some(json!(gm.distance_mode as u8)),
        "frmo" => return Some(json!(u8::from(gm.inverse_feed_rate_mode))),
        "tool" => return Some(json!(gm.tool)),
        "line" => return Some(json!(gm.line_number)),
        _ => {}
    }

    // Per-axis readers: pos/mpo/ofs/prb/cofs/cpos + axis letter.
    if let Some((prefix, axis)) = split_axis_suffix(token) {
        let i = axis as usize;
        let linear = !axis.is_rotary();
        let value = match prefix {
            "pos" => work_position(cm, axis),
            "mpo" => machine_position(cm, axis),
            "ofs" => active_offset(cm, axis),
            "prb" => cm.probe_result().position[i],
            "cofs" => cm.store().offset_table[cm.gm().coord_system.index()][i],
            "cpos" => {
                cm.store().gmx.position[i]
                    - cm.store().offset_table[cm.gm().coord_system.index()][i]
            }
            _ => return None,
        };
        return Some(json!(display_length(cm, value, linear)));
    }

    // Per-axis configuration: axis letter + field token.
    let (axis, field) = split_axis_prefix(token)?;
    let config = cm.config().axis(axis);
    let linear = !axis.is_rotary();
    let value = match field {
        "am" => return Some(json!(config.mode as u8)),
        "sn" => return Some(json!(config.switch_min as u8)),
        "sx" => return Some(json!(config.switch_max as u8)),
        "fr" => display_length(cm, config.feedrate_max, linear),
        "vm" => display_length(cm, config.velocity_max, linear),
        "tm" => display_length(cm, config.travel_max, linear),
        // Jerk is configured in mm terms regardless of display units.
        "jm" => config.jerk_max,
        "jh" => config.jerk_homing,
        "jd" => display_length(cm, config.junction_deviation, linear),
        "ra" => config.radius,
        "sv" => display_length(cm, config.search_velocity, linear),
        "lv" => display_length(cm, config.latch_velocity, linear),
        "lb" => display_length(cm, config.latch_backoff, linear),
        "zb" => display_length(cm, config.zero_backoff, linear),
        _ => return None,
    };
    Some(json!(value))
}

/// Write one named configuration field. Read-only and unknown tokens
/// return `CommandRejected`; values that fail validation return
/// `ValueOutOfRange` and leave the configuration untouched.
pub fn set(cm: &mut CanonicalMachine, token: &str, value: &Value) -> Status {
    // cofs<axis>: program the active coordinate system's offset row,
    // the configuration-side equivalent of G10 L2.
    if let Some(("cofs", axis)) = split_axis_suffix(token) {
        let Some(number) = value.as_f64() else {
            return Status::ValueOutOfRange;
        };
        let system = cm.gm().coord_system;
        if system == CoordinateSystem::Machine {
            return Status::InvalidCoordinateSystem;
        }
        let linear = !axis.is_rotary();
        let mm = input_length(cm, number, linear);
        let mut offsets = [0.0; arbor_common::consts::AXIS_COUNT];
        offsets[axis as usize] = mm;
        return cm.set_coord_offsets(system, &offsets, arbor_common::axis::AxisFlags::of(axis));
    }

    let Some((axis, field)) = split_axis_prefix(token) else {
        return Status::CommandRejected;
    };
    let Some(number) = value.as_f64() else {
        return Status::ValueOutOfRange;
    };
    let linear = !axis.is_rotary();
    let previous = *cm.config().axis(axis);
    {
        let config = cm.config_axis_mut(axis);
        match field {
            "am" => match AxisMode::from_u8(number as u8) {
                Some(mode) => config.mode = mode,
                None => return Status::ValueOutOfRange,
            },
            "sn" => match SwitchMode::from_u8(number as u8) {
                Some(mode) => config.switch_min = mode,
                None => return Status::ValueOutOfRange,
            },
            "sx" => match SwitchMode::from_u8(number as u8) {
                Some(mode) => config.switch_max = mode,
                None => return Status::ValueOutOfRange,
            },
            _ => {}
        }
    }
    let mm = input_length(cm, number, linear);
    {
        let config = cm.config_axis_mut(axis);
        match field {
            "am" | "sn" | "sx" => {}
            "fr" => config.feedrate_max = mm,
            "vm" => config.velocity_max = mm,
            "tm" => config.travel_max = mm,
            "jm" => config.jerk_max = number,
            "jh" => config.jerk_homing = number,
            "jd" => config.junction_deviation = mm,
            "ra" => config.radius = number,
            "sv" => config.search_velocity = mm,
            "lv" => config.latch_velocity = mm,
            "lb" => config.latch_backoff = mm,
            "zb" => config.zero_backoff = mm,
            _ => return Status::CommandRejected,
        }
    }
    if cm.config().axis(axis).validate(axis).is_err() {
        *cm.config_axis_mut(axis) = previous;
        return Status::ValueOutOfRange;
    }
    Status::Ok
}

// ─── Helpers ────────────────────────────────────────────────────────

fn all_homed(cm: &CanonicalMachine) -> bool {
    let mut any = false;
    for axis in Axis::ALL {
        if cm.config().axis(axis).homes() {
            any = true;
            if !cm.homed().has(axis) {
                return false;
            }
        }
    }
    any
}

/// Work position for reporting: the runtime's snapshot work offset
/// during motion, the live composition otherwise.
fn work_position(cm: &CanonicalMachine, axis: Axis) -> f64 {
    match cm.active_model() {
        ModelRef::Runtime => {
            cm.runtime().position(axis) - cm.runtime().gm.work_offset[axis as usize]
        }
        _ => cm.store().work_position(axis),
    }
}

fn machine_position(cm: &CanonicalMachine, axis: Axis) -> f64 {
    match cm.active_model() {
        ModelRef::Runtime => cm.runtime().position(axis),
        _ => cm.store().absolute_position(axis),
    }
}

fn active_offset(cm: &CanonicalMachine, axis: Axis) -> f64 {
    match cm.active_model() {
        ModelRef::Runtime => cm.runtime().gm.work_offset[axis as usize],
        _ => cm.store().active_coord_offset(axis),
    }
}

/// Canonical mm → display units (linear axes only).
fn display_length(cm: &CanonicalMachine, value: f64, linear: bool) -> f64 {
    if linear {
        cm.gm().units.from_mm(value)
    } else {
        value
    }
}

/// Display units → canonical mm (linear axes only).
fn input_length(cm: &CanonicalMachine, value: f64, linear: bool) -> f64 {
    if linear {
        cm.gm().units.to_mm(value)
    } else {
        value
    }
}

/// "posx" → ("pos", Axis::X).
fn split_axis_suffix(token: &str) -> Option<(&str, Axis)> {
    if token.len() < 2 {
        return None;
    }
    let (prefix, last) = token.split_at(token.len() - 1);
    let axis = axis_from_letter(last.chars().next()?)?;
    matches!(prefix, "pos" | "mpo" | "ofs" | "prb" | "cofs" | "cpos").then_some((prefix, axis))
}

/// "xvm" → (Axis::X, "vm").
fn split_axis_prefix(token: &str) -> Option<(Axis, &str)> {
    let mut chars = token.chars();
    let axis = axis_from_letter(chars.next()?)?;
    let field = &token[1..];
    (!field.is_empty()).then_some((axis, field))
}

fn axis_from_letter(letter: char) -> Option<Axis> {
    match letter.to_ascii_lowercase() {
        'x' => Some(Axis::X),
        'y' => Some(Axis::Y),
        'z' => Some(Axis::Z),
        'a' => Some(Axis::A),
        'b' => Some(Axis::B),
        'c' => Some(Axis::C),
        _ => None,
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
