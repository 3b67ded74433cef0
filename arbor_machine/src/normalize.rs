//! Block normalizer.
//!
//! Takes one parsed block (the gn/gf input tier) and applies it to
//! the canonical machine in RS274 execution order: feed rate mode,
//! feed rate, spindle, tool, coolant, overrides, then the modal
//! groups, then the non-modal action or motion, then program flow.
//!
//! Unit conversion happens here and only here on the way in: every
//! linear word is normalized to millimeters using the units mode in
//! effect for this block (a G20/G21 on the block applies to its own
//! words). Distance-mode resolution also happens here, so the
//! canonical commands below always receive machine-frame targets.
//!
//! A modal-group violation is detected before anything is written;
//! the block is rejected with the canonical state untouched.

use arbor_common::axis::{Axis, AxisFlags, AxisMode};
use arbor_common::consts::AXIS_COUNT;
use arbor_common::gcode::{
    CoordinateSystem, DistanceMode, MotionMode, NextAction, ProgramFlow, Units,
};
use arbor_common::status::Status;

use crate::machine::CanonicalMachine;
use crate::model::{GCodeInput, WordFlags};

/// Apply one block to the canonical machine.
pub fn execute_block(cm: &mut CanonicalMachine, block: &GCodeInput) -> Status {
    let status = execute_inner(cm, block);
    // G53 is block-scoped regardless of how the block ended.
    cm.store.gm.absolute_override = false;
    status
}

fn execute_inner(cm: &mut CanonicalMachine, block: &GCodeInput) -> Status {
    let status = cm.guard();
    if !status.is_ok() {
        return status;
    }

    if block.modal_group_conflict().is_some() {
        return Status::ModalGroupViolation;
    }

    // Reserve room for every synchronized buffer this block enqueues,
    // so a retry after BufferFull replays the block from the start.
    if cm.planner.room() < needed_buffers(block) {
        return Status::BufferFull;
    }

    // Units in effect for this block's own words.
    let units = if block.flags.contains(WordFlags::UNITS) {
        block.units
    } else {
        cm.store.gm.units
    };

    if block.flags.contains(WordFlags::LINE_NUMBER) {
        cm.store.gm.line_number = block.line_number;
    }
    if block.flags.contains(WordFlags::PARAMETER) {
        cm.store.gm.parameter = block.parameter;
    }
    if block.flags.contains(WordFlags::L_WORD) {
        cm.store.gmx.l_word = block.l_word;
    }

    // ── Feed rate mode, feed rate, spindle speed ──
    if block.flags.contains(WordFlags::INVERSE_FEED_RATE_MODE) {
        let status = cm.set_inverse_feed_rate_mode(block.inverse_feed_rate_mode);
        if !status.is_ok() {
            return status;
        }
    }
    if block.flags.contains(WordFlags::FEED_RATE) {
        let status = if cm.store.gm.inverse_feed_rate_mode {
            // G93: F is 1/minutes, not a length rate.
            cm.set_inverse_feed_rate(block.feed_rate)
        } else {
            cm.set_feed_rate(units.to_mm(block.feed_rate))
        };
        if !status.is_ok() {
            return status;
        }
    }
    if block.flags.contains(WordFlags::SPINDLE_SPEED) {
        let status = cm.set_spindle_speed(block.spindle_speed);
        if !status.is_ok() {
            return status;
        }
    }

    // ── Tool select / tool change ──
    if block.flags.contains(WordFlags::TOOL_SELECT) {
        let status = cm.select_tool(block.tool);
        if !status.is_ok() {
            return status;
        }
    }
    if block.flags.contains(WordFlags::TOOL_CHANGE) {
        let status = cm.change_tool();
        if !status.is_ok() {
            return status;
        }
    }

    // ── Spindle mode, coolant, overrides ──
    if block.flags.contains(WordFlags::SPINDLE_MODE) {
        let status = cm.set_spindle_mode(block.spindle_mode);
        if !status.is_ok() {
            return status;
        }
    }
    if block.flags.contains(WordFlags::MIST_COOLANT) {
        let status = cm.mist_coolant_control(block.mist_coolant);
        if !status.is_ok() {
            return status;
        }
    }
    if block.flags.contains(WordFlags::FLOOD_COOLANT) {
        let status = cm.flood_coolant_control(block.flood_coolant);
        if !status.is_ok() {
            return status;
        }
    }
    if block.flags.contains(WordFlags::OVERRIDE_ENABLES) {
        let status = cm.set_override_enables(block.override_enables);
        if !status.is_ok() {
            return status;
        }
    }
    if block.flags.contains(WordFlags::FEED_OVERRIDE_FACTOR) {
        let status = cm.set_feed_override_factor(block.feed_override_factor);
        if !status.is_ok() {
            return status;
        }
    }
    if block.flags.contains(WordFlags::SPINDLE_OVERRIDE_FACTOR) {
        let status = cm.set_spindle_override_factor(block.spindle_override_factor);
        if !status.is_ok() {
            return status;
        }
    }

    // ── Plane, units, coord system, path control, distance mode ──
    if block.flags.contains(WordFlags::PLANE) {
        let status = cm.select_plane(block.plane);
        if !status.is_ok() {
            return status;
        }
    }
    if block.flags.contains(WordFlags::UNITS) {
        let status = cm.set_units_mode(block.units);
        if !status.is_ok() {
            return status;
        }
    }
    if block.flags.contains(WordFlags::COORD_SYSTEM) {
        let status = cm.set_coord_system(block.coord_system);
        if !status.is_ok() {
            return status;
        }
    }
    if block.flags.contains(WordFlags::PATH_CONTROL) {
        let status = cm.set_path_control(block.path_control);
        if !status.is_ok() {
            return status;
        }
    }
    if block.flags.contains(WordFlags::DISTANCE_MODE) {
        let status = cm.set_distance_mode(block.distance_mode);
        if !status.is_ok() {
            return status;
        }
    }

    // G53 suppresses every offset for this block only.
    if block.flags.contains(WordFlags::ABSOLUTE_OVERRIDE) {
        cm.store.gm.absolute_override = true;
    }

    // Motion mode is modal even when the block carries no axis words.
    if block.flags.contains(WordFlags::MOTION_MODE) {
        cm.store.gm.motion_mode = block.motion_mode;
    }

    // ── Non-modal action / motion ──
    let status = dispatch_action(cm, block, units);
    if !status.is_ok() {
        return status;
    }

    // ── Program flow (end of block) ──
    match block.program_flow {
        ProgramFlow::None => Status::Ok,
        ProgramFlow::Stop => cm.program_stop(),
        ProgramFlow::OptionalStop => cm.optional_stop(),
        ProgramFlow::End => cm.program_end(),
    }
}

/// Dispatch the block's non-modal action, or its motion.
fn dispatch_action(cm: &mut CanonicalMachine, block: &GCodeInput, units: Units) -> Status {
    match block.next_action {
        NextAction::Default => dispatch_motion(cm, block, units),
        NextAction::Dwell => cm.dwell(block.parameter),
        NextAction::SetCoordOffsets => {
            if block.l_word != 2 {
                return Status::ValueOutOfRange;
            }
            let Some(system) = CoordinateSystem::from_u8(block.parameter as u8) else {
                return Status::InvalidCoordinateSystem;
            };
            let (values, flags) = raw_values_mm(cm, block, units);
            cm.set_coord_offsets(system, &values, flags)
        }
        NextAction::GotoG28 => {
            let (target, flags) = resolve_target(cm, block, units);
            cm.goto_g28_position(&target, flags)
        }
        NextAction::SetG28 => cm.set_g28_position(),
        NextAction::HomingCycle => cm.homing_cycle_start(block.target_flags),
        NextAction::SetHomePosition => {
            let (values, flags) = raw_values_mm(cm, block, units);
            cm.set_home_position(&values, flags)
        }
        NextAction::GotoG30 => {
            let (target, flags) = resolve_target(cm, block, units);
            cm.goto_g30_position(&target, flags)
        }
        NextAction::SetG30 => cm.set_g30_position(),
        NextAction::SetOriginOffsets => {
            let (values, flags) = raw_values_mm(cm, block, units);
            cm.set_origin_offsets(&values, flags)
        }
        NextAction::ResetOriginOffsets => cm.reset_origin_offsets(),
        NextAction::SuspendOriginOffsets => cm.suspend_origin_offsets(),
        NextAction::ResumeOriginOffsets => cm.resume_origin_offsets(),
        NextAction::StraightProbe => {
            let (target, flags) = resolve_target(cm, block, units);
            cm.probe_cycle_start(&target, flags)
        }
    }
}

/// Dispatch axis words through the modal motion mode.
fn dispatch_motion(cm: &mut CanonicalMachine, block: &GCodeInput, units: Units) -> Status {
    let (target, flags) = resolve_target(cm, block, units);
    if flags.is_empty() {
        return Status::Ok;
    }
    match cm.store.gm.motion_mode {
        MotionMode::Traverse => cm.straight_traverse(&target, flags),
        MotionMode::Feed => cm.straight_feed(&target, flags),
        MotionMode::ClockwiseArc | MotionMode::CounterclockwiseArc => {
            let clockwise = cm.store.gm.motion_mode == MotionMode::ClockwiseArc;
            let offset_flags = [
                block.flags.contains(WordFlags::ARC_I),
                block.flags.contains(WordFlags::ARC_J),
                block.flags.contains(WordFlags::ARC_K),
            ];
            let mut offsets = [0.0; 3];
            for (i, present) in offset_flags.iter().enumerate() {
                if *present {
                    offsets[i] = units.to_mm(block.arc_offset[i]);
                }
            }
            let radius_present = block.flags.contains(WordFlags::ARC_RADIUS);
            let radius = if radius_present {
                units.to_mm(block.arc_radius)
            } else {
                0.0
            };
            cm.store.gmx.arc_radius = radius;
            cm.store.gmx.arc_offset = offsets;
            cm.arc_feed(
                &target,
                flags,
                &offsets,
                offset_flags,
                radius,
                radius_present,
                clockwise,
            )
        }
        MotionMode::StraightProbe => cm.probe_cycle_start(&target, flags),
        // Axis words with motion canceled (G80): nothing moves.
        MotionMode::Cancel => Status::Ok,
    }
}

/// Resolve the block's axis words into a canonical machine-frame
/// target. Distance-mode and offset composition happen here; words
/// for disabled axes are dropped; radius-mode rotary axes convert
/// their linear word through the configured radius.
fn resolve_target(
    cm: &CanonicalMachine,
    block: &GCodeInput,
    units: Units,
) -> ([f64; AXIS_COUNT], AxisFlags) {
    let mut target = cm.store.gmx.position;
    let mut flags = AxisFlags::empty();
    for axis in Axis::ALL {
        if !block.target_flags.has(axis) {
            continue;
        }
        let config = cm.config.axis(axis);
        if !config.mode.is_active() {
            continue;
        }
        let raw = block.target[axis as usize];
        let value = canonical_axis_value(raw, axis, config.mode, config.radius, units);
        let i = axis as usize;
        target[i] = if cm.store.gm.distance_mode == DistanceMode::Incremental
            && !cm.store.gm.absolute_override
        {
            cm.store.gmx.position[i] + value
        } else {
            value + cm.store.active_coord_offset(axis)
        };
        flags.put(axis, true);
    }
    (target, flags)
}

/// Convert the block's axis words to millimeters without any offset
/// or distance-mode composition (G10, G92, G28.3 value semantics).
fn raw_values_mm(
    cm: &CanonicalMachine,
    block: &GCodeInput,
    units: Units,
) -> ([f64; AXIS_COUNT], AxisFlags) {
    let mut values = [0.0; AXIS_COUNT];
    let mut flags = AxisFlags::empty();
    for axis in Axis::ALL {
        if !block.target_flags.has(axis) {
            continue;
        }
        let config = cm.config.axis(axis);
        if !config.mode.is_active() {
            continue;
        }
        values[axis as usize] = canonical_axis_value(
            block.target[axis as usize],
            axis,
            config.mode,
            config.radius,
            units,
        );
        flags.put(axis, true);
    }
    (values, flags)
}

/// One axis word in canonical units: mm for linear axes, degrees for
/// rotaries, radius-mode words converted through the rotary radius.
fn canonical_axis_value(raw: f64, axis: Axis, mode: AxisMode, radius: f64, units: Units) -> f64 {
    if axis.is_rotary() {
        if mode == AxisMode::Radius && radius > 0.0 {
            let mm = units.to_mm(raw);
            mm * 360.0 / (2.0 * std::f64::consts::PI * radius)
        } else {
            raw
        }
    } else {
        units.to_mm(raw)
    }
}

/// Synchronized buffers this block will enqueue (arc segments manage
/// their own reservation).
fn needed_buffers(block: &GCodeInput) -> usize {
    let mut count = 0;
    if block.flags.contains(WordFlags::SPINDLE_MODE) {
        count += 1;
    }
    if block.flags.contains(WordFlags::MIST_COOLANT) {
        count += 1;
    }
    if block.flags.contains(WordFlags::FLOOD_COOLANT) {
        count += 1;
    }
    if block.flags.contains(WordFlags::TOOL_CHANGE) {
        count += 1;
    }
    match block.next_action {
        NextAction::Dwell | NextAction::StraightProbe => count += 1,
        NextAction::GotoG28 | NextAction::GotoG30 => count += 2,
        NextAction::Default if !block.target_flags.is_empty() => count += 1,
        _ => {}
    }
    count
}

// ─── Tests ──────────────────────────────────────────────────────────
