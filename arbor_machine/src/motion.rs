//! Motion commands: traverses, feeds, arcs, dwells, stored-position
//! moves.
//!
//! All targets arriving here are canonical — millimeters, machine
//! frame, full vectors resolved by the block normalizer. Each command
//! validates, computes move timing, snapshots the model into a
//! planner buffer, and advances the model position to the commanded
//! endpoint.

use tracing::warn;

use arbor_common::axis::{Axis, AxisFlags, AxisMode};
use arbor_common::consts::AXIS_COUNT;
use arbor_common::gcode::MotionMode;
use arbor_common::status::Status;

use crate::arc;
use crate::machine::CanonicalMachine;
use crate::planner::MoveKind;

impl CanonicalMachine {
    /// G0 — rapid traverse to the target.
    pub fn straight_traverse(
        &mut self,
        target: &[f64; AXIS_COUNT],
        flags: AxisFlags,
    ) -> Status {
        let status = self.motion_guard();
        if !status.is_ok() {
            return status;
        }
        if flags.is_empty() {
            return Status::Ok;
        }
        let status = self.validate_travel(target, flags);
        if !status.is_ok() {
            return status;
        }

        self.store.gm.motion_mode = MotionMode::Traverse;
        self.store.set_target(target, flags);

        let move_time = self.traverse_time(&self.store.gm.target);
        if move_time <= 0.0 {
            // Zero-length: nothing to enqueue.
            return Status::Ok;
        }
        self.store.gm.move_time = move_time;
        self.store.gm.minimum_time = move_time;
        self.commit_motion(MoveKind::Traverse)
    }

    /// G1 — straight feed to the target at the active feed rate.
    pub fn straight_feed(&mut self, target: &[f64; AXIS_COUNT], flags: AxisFlags) -> Status {
        let status = self.motion_guard();
        if !status.is_ok() {
            return status;
        }
        if flags.is_empty() {
            return Status::Ok;
        }
        let status = self.check_feed_rate();
        if !status.is_ok() {
            return status;
        }
        let status = self.validate_travel(target, flags);
        if !status.is_ok() {
            return status;
        }

        self.store.gm.motion_mode = MotionMode::Feed;
        self.store.set_target(target, flags);

        let (move_time, minimum_time) = self.feed_time(&self.store.gm.target);
        if move_time <= 0.0 {
            return Status::Ok;
        }
        self.store.gm.move_time = move_time;
        self.store.gm.minimum_time = minimum_time;
        self.commit_motion(MoveKind::Feed)
    }

    /// G2/G3 — arc feed. Either radius-form (R word) or center-form
    /// (I/J/K); giving both or neither is an error. The arc is split
    /// into straight feed segments within the chordal tolerance, each
    /// enqueued independently.
    #[allow(clippy::too_many_arguments)]
    pub fn arc_feed(
        &mut self,
        target: &[f64; AXIS_COUNT],
        flags: AxisFlags,
        offsets: &[f64; 3],
        offset_flags: [bool; 3],
        radius: f64,
        radius_present: bool,
        clockwise: bool,
    ) -> Status {
        let status = self.motion_guard();
        if !status.is_ok() {
            return status;
        }
        let status = self.check_feed_rate();
        if !status.is_ok() {
            return status;
        }
        let has_center = offset_flags.iter().any(|f| *f);
        if radius_present == has_center {
            // Both forms or neither: under/over-specified.
            return Status::ArcSpecificationError;
        }
        let status = self.validate_travel(target, flags);
        if !status.is_ok() {
            return status;
        }

        let mut full_target = self.store.gmx.position;
        for axis in Axis::ALL {
            if flags.has(axis) {
                full_target[axis as usize] = target[axis as usize];
            }
        }

        let segments = match arc::plan_arc(&arc::ArcSpec {
            start: self.store.gmx.position,
            target: full_target,
            plane: self.store.gm.plane,
            offsets: *offsets,
            radius: if radius_present { radius } else { 0.0 },
            clockwise,
            chordal_tolerance: self.config.system.chordal_tolerance,
            min_segment_len: self.config.system.min_segment_len,
        }) {
            Ok(segments) => segments,
            Err(status) => return status,
        };

        if self.planner.room() < segments.len() {
            return Status::BufferFull;
        }

        self.store.gm.motion_mode = if clockwise {
            MotionMode::ClockwiseArc
        } else {
            MotionMode::CounterclockwiseArc
        };
        self.store.gm.work_offset = self.store.active_offset_vector();
        self.enter_cycle();

        // In inverse-time mode the F word times the whole arc; split
        // it evenly across the segments.
        let inverse_segment_time = if self.store.gm.inverse_feed_rate_mode {
            let rate = self.store.gmx.inverse_feed_rate;
            Some(1.0 / rate / segments.len() as f64)
        } else {
            None
        };

        let mut position = self.store.gmx.position;
        for segment in &segments {
            self.store.gm.target = *segment;
            let (move_time, minimum_time) = match inverse_segment_time {
                Some(time) => (time.max(self.minimum_time_between(&position, segment)), 0.0),
                None => self.feed_time_between(&position, segment),
            };
            self.store.gm.move_time = move_time;
            self.store.gm.minimum_time = minimum_time;
            if let Err(status) = self.planner.commit(self.store.snapshot(), MoveKind::Feed) {
                // Room was checked; treat as transient anyway.
                return status;
            }
            position = *segment;
        }
        self.store.gm.target = full_target;
        self.store.gmx.position = full_target;
        Status::Ok
    }

    /// G4 — dwell for P seconds: a timed block with no motion.
    pub fn dwell(&mut self, seconds: f64) -> Status {
        let status = self.motion_guard();
        if !status.is_ok() {
            return status;
        }
        if seconds < 0.0 {
            return Status::ValueOutOfRange;
        }
        self.store.gm.parameter = seconds;
        self.store.gm.target = self.store.gmx.position;
        self.store.gm.move_time = seconds / 60.0;
        self.store.gm.minimum_time = 0.0;
        self.enter_cycle();
        match self.planner.commit(self.store.snapshot(), MoveKind::Dwell) {
            Ok(_) => Status::Ok,
            Err(status) => status,
        }
    }

    /// G28 — traverse to the flagged intermediate point, then move the
    /// flagged axes to the stored G28 position. Unflagged axes do not
    /// move in either phase.
    pub fn goto_g28_position(
        &mut self,
        intermediate: &[f64; AXIS_COUNT],
        flags: AxisFlags,
    ) -> Status {
        let stored = self.store.gmx.g28_position;
        self.goto_stored_position(intermediate, flags, stored)
    }

    /// G30 — like G28, against the G30 stored position.
    pub fn goto_g30_position(
        &mut self,
        intermediate: &[f64; AXIS_COUNT],
        flags: AxisFlags,
    ) -> Status {
        let stored = self.store.gmx.g30_position;
        self.goto_stored_position(intermediate, flags, stored)
    }

    fn goto_stored_position(
        &mut self,
        intermediate: &[f64; AXIS_COUNT],
        flags: AxisFlags,
        stored: [f64; AXIS_COUNT],
    ) -> Status {
        let saved_mode = self.store.gm.motion_mode;

        if !flags.is_empty() {
            let status = self.straight_traverse(intermediate, flags);
            if !status.is_ok() {
                return status;
            }
        }

        // Second phase: flagged axes to the stored machine position.
        // With no axis words, every axis returns.
        let phase_flags = if flags.is_empty() { AxisFlags::all() } else { flags };
        let status = self.straight_traverse(&stored, phase_flags);
        self.store.gm.motion_mode = saved_mode;
        status
    }

    // ── Helpers ──

    /// G1/G2/G3 precondition: a usable feed rate for the active mode.
    pub(crate) fn check_feed_rate(&self) -> Status {
        if self.store.gm.inverse_feed_rate_mode {
            if self.store.gmx.inverse_feed_rate <= 0.0 {
                return Status::FeedRateNotSet;
            }
        } else if self.store.gm.feed_rate <= 0.0 {
            return Status::FeedRateNotSet;
        }
        Status::Ok
    }

    /// Reject targets beyond the configured travel for any flagged
    /// active axis.
    pub(crate) fn validate_travel(
        &self,
        target: &[f64; AXIS_COUNT],
        flags: AxisFlags,
    ) -> Status {
        for axis in Axis::ALL {
            if !flags.has(axis) {
                continue;
            }
            let config = self.config.axis(axis);
            if !config.mode.is_active() {
                continue;
            }
            if target[axis as usize].abs() > config.travel_max {
                return Status::TravelExceeded;
            }
        }
        Status::Ok
    }

    /// Traverse duration [min]: the slowest axis at its maximum
    /// velocity. Inhibited axes contribute no time.
    fn traverse_time(&self, target: &[f64; AXIS_COUNT]) -> f64 {
        let factor = if self.store.gmx.traverse_override_enable {
            self.store.gmx.traverse_override_factor
        } else {
            1.0
        };
        let mut time: f64 = 0.0;
        for axis in Axis::ALL {
            let config = self.config.axis(axis);
            if config.mode != AxisMode::Standard && config.mode != AxisMode::Radius {
                continue;
            }
            let delta = (target[axis as usize] - self.store.gmx.position[axis as usize]).abs();
            if delta > 0.0 {
                time = time.max(delta / (config.velocity_max * factor));
            }
        }
        time
    }

    /// Feed duration [min] plus the minimum feasible duration from
    /// per-axis feed limits. Times shorter than the minimum are
    /// soft-clamped with a warning.
    fn feed_time(&self, target: &[f64; AXIS_COUNT]) -> (f64, f64) {
        let start = self.store.gmx.position;
        if self.store.gm.inverse_feed_rate_mode {
            let requested = 1.0 / self.store.gmx.inverse_feed_rate;
            let minimum = self.minimum_time_between(&start, target);
            if requested < minimum {
                warn!(requested, minimum, "inverse-time move clamped to axis feed limits");
                return (minimum, minimum);
            }
            return (requested, minimum);
        }
        self.feed_time_between(&start, target)
    }

    /// Units-per-minute feed time between two points.
    fn feed_time_between(&self, start: &[f64; AXIS_COUNT], end: &[f64; AXIS_COUNT]) -> (f64, f64) {
        let factor = if self.store.gmx.feed_override_enable {
            self.store.gmx.feed_override_factor
        } else {
            1.0
        };
        let mut linear_sq = 0.0;
        let mut rotary_sq = 0.0;
        for axis in Axis::ALL {
            if !self.config.axis(axis).mode.is_active() {
                continue;
            }
            let delta = end[axis as usize] - start[axis as usize];
            if axis.is_rotary() {
                rotary_sq += delta * delta;
            } else {
                linear_sq += delta * delta;
            }
        }
        // Feed applies along the linear path; pure-rotary moves feed
        // in degrees per minute.
        let distance = if linear_sq > 0.0 {
            linear_sq.sqrt()
        } else {
            rotary_sq.sqrt()
        };
        if distance == 0.0 {
            return (0.0, 0.0);
        }
        let requested = distance / (self.store.gm.feed_rate * factor);
        let minimum = self.minimum_time_between(start, end);
        if requested < minimum {
            warn!(
                feed_rate = self.store.gm.feed_rate,
                "feed rate exceeds axis limits; move time clamped"
            );
            return (minimum, minimum);
        }
        (requested, minimum)
    }

    /// Longest per-axis time at each axis's maximum feed rate.
    fn minimum_time_between(&self, start: &[f64; AXIS_COUNT], end: &[f64; AXIS_COUNT]) -> f64 {
        let mut minimum: f64 = 0.0;
        for axis in Axis::ALL {
            let config = self.config.axis(axis);
            if config.mode != AxisMode::Standard && config.mode != AxisMode::Radius {
                continue;
            }
            let delta = (end[axis as usize] - start[axis as usize]).abs();
            if delta > 0.0 {
                minimum = minimum.max(delta / config.feedrate_max);
            }
        }
        minimum
    }

    /// Snapshot gm into a planner buffer and advance the model
    /// position. `BufferFull` leaves the model consistent for a
    /// retry of the same block.
    fn commit_motion(&mut self, kind: MoveKind) -> Status {
        self.store.gm.work_offset = self.store.active_offset_vector();
        self.enter_cycle();
        match self.planner.commit(self.store.snapshot(), kind) {
            Ok(_) => {
                self.store.gmx.position = self.store.gm.target;
                Status::Ok
            }
            Err(status) => status,
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
