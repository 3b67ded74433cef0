//! Homing cycle.
//!
//! Cooperative per-axis progression driven from the dispatch loop:
//! each invocation of the callback advances at most one step —
//! enqueue a single move, or consume its completion — and returns
//! `Eagain` until the whole cycle is done. The feedhold sequencer and
//! the reporter keep running throughout.
//!
//! Per axis the progression is Search (fast approach until the switch
//! trips), Backoff (retreat off the switch), Latch (slow re-approach
//! for a precise trip), SetZero (retreat by the zero backoff; that
//! point becomes machine zero). A search or latch move that runs out
//! of travel without a trip fails the cycle.
//!
//! Axes home one at a time, Z first to clear the work, then X, Y and
//! the rotaries. Axes that are disabled, have no search velocity, or
//! no homing switch are skipped.

use tracing::{debug, info};

use arbor_common::axis::{Axis, AxisFlags};
use arbor_common::consts::AXIS_COUNT;
use arbor_common::state::CycleState;
use arbor_common::status::Status;

use crate::machine::CanonicalMachine;
use crate::planner::MoveKind;
use crate::state::MachineEvent;

/// Homing order: Z clears the work first.
pub const HOMING_ORDER: [Axis; AXIS_COUNT] =
    [Axis::Z, Axis::X, Axis::Y, Axis::A, Axis::B, Axis::C];

/// Search travel margin over the configured maximum.
const SEARCH_TRAVEL_FACTOR: f64 = 1.5;

/// Phase of the per-axis homing progression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HomingPhase {
    Idle,
    /// Fast approach toward the switch.
    Search,
    /// Retreat off the tripped switch.
    Backoff,
    /// Slow re-approach for the precise trip.
    Latch,
    /// Final retreat; the endpoint becomes zero.
    SetZero,
}

/// Cycle bookkeeping owned by the controller.
#[derive(Debug, Clone)]
pub struct HomingCycle {
    phase: HomingPhase,
    /// Axes still waiting to home.
    pending: AxisFlags,
    current: Option<Axis>,
    /// A move for the current phase is in flight.
    waiting: bool,
}

impl HomingCycle {
    pub fn new() -> Self {
        Self {
            phase: HomingPhase::Idle,
            pending: AxisFlags::empty(),
            current: None,
            waiting: false,
        }
    }

    #[inline]
    pub fn active(&self) -> bool {
        self.current.is_some() || !self.pending.is_empty()
    }

    #[inline]
    pub fn phase(&self) -> HomingPhase {
        self.phase
    }

    pub(crate) fn arm(&mut self, axes: AxisFlags) {
        self.pending = axes;
        self.current = None;
        self.phase = HomingPhase::Idle;
        self.waiting = false;
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for HomingCycle {
    fn default() -> Self {
        Self::new()
    }
}

impl CanonicalMachine {
    /// G28.2 — arm the homing cycle for the flagged axes (all
    /// homing-capable axes when none are flagged). The dispatch loop
    /// drives the cycle to completion.
    pub fn homing_cycle_start(&mut self, axes: AxisFlags) -> Status {
        let status = self.motion_guard();
        if !status.is_ok() {
            return status;
        }
        let requested = if axes.is_empty() { AxisFlags::all() } else { axes };
        let mut armed = AxisFlags::empty();
        for axis in Axis::ALL {
            if requested.has(axis) && self.config.axis(axis).homes() {
                armed.put(axis, true);
            }
        }
        if armed.is_empty() {
            return Status::Ok;
        }
        self.automaton
            .handle_event(MachineEvent::CycleStart(CycleState::Homing));
        // A fresh homing cycle invalidates the old claims.
        self.homed.remove(armed);
        self.homing.arm(armed);
        info!(axes = ?armed, "homing cycle armed");
        Status::Ok
    }

    /// One cooperative homing step. Returns `Eagain` while the cycle
    /// runs, `Ok` when it finishes, `HomingCycleFailed` when a search
    /// runs out of travel.
    pub(crate) fn homing_callback(&mut self) -> Status {
        if !self.homing.active() {
            return Status::Ok;
        }

        if self.homing.waiting {
            if self.runtime.busy() || !self.planner.queue_empty() {
                return Status::Eagain;
            }
            self.homing.waiting = false;
            self.store.gmx.position = self.runtime.positions();
            return self.finish_phase();
        }

        let Some(axis) = self.homing.current else {
            return self.advance_to_next_axis();
        };
        self.enqueue_phase_move(axis)
    }

    /// Consume a completed phase move and pick the next phase.
    fn finish_phase(&mut self) -> Status {
        let axis = match self.homing.current {
            Some(axis) => axis,
            None => return Status::Eagain,
        };
        match self.homing.phase {
            HomingPhase::Search => {
                if !self.runtime.last_move_tripped() {
                    self.homing.reset();
                    return Status::HomingCycleFailed;
                }
                self.homing.phase = HomingPhase::Backoff;
            }
            HomingPhase::Backoff => {
                self.homing.phase = HomingPhase::Latch;
            }
            HomingPhase::Latch => {
                if !self.runtime.last_move_tripped() {
                    self.homing.reset();
                    return Status::HomingCycleFailed;
                }
                self.homing.phase = HomingPhase::SetZero;
            }
            HomingPhase::SetZero => {
                // The backed-off point is machine zero for this axis.
                let i = axis as usize;
                self.store.gmx.position[i] = 0.0;
                self.store.gm.target[i] = 0.0;
                self.runtime.set_position(axis, 0.0);
                self.homed.put(axis, true);
                self.homing.pending.put(axis, false);
                self.homing.current = None;
                self.homing.phase = HomingPhase::Idle;
                debug!(axis = ?axis, "axis homed");
            }
            HomingPhase::Idle => {}
        }
        Status::Eagain
    }

    /// Select the next pending axis in homing order, or finish.
    fn advance_to_next_axis(&mut self) -> Status {
        for axis in HOMING_ORDER {
            if self.homing.pending.has(axis) {
                self.homing.current = Some(axis);
                self.homing.phase = HomingPhase::Search;
                return Status::Eagain;
            }
        }
        self.homing.reset();
        self.automaton.handle_event(MachineEvent::HomingDone);
        info!(homed = ?self.homed, "homing cycle complete");
        Status::Ok
    }

    /// Enqueue the single move for the current phase.
    fn enqueue_phase_move(&mut self, axis: Axis) -> Status {
        let config = *self.config.axis(axis);
        let position = self.store.gmx.position[axis as usize];
        let (target_value, velocity, kind) = match self.homing.phase {
            HomingPhase::Search => (
                position - config.travel_max * SEARCH_TRAVEL_FACTOR,
                config.search_velocity,
                MoveKind::Search,
            ),
            HomingPhase::Backoff => (
                position + config.latch_backoff,
                config.search_velocity,
                MoveKind::Traverse,
            ),
            HomingPhase::Latch => (
                position - 2.0 * config.latch_backoff,
                config.latch_velocity,
                MoveKind::Search,
            ),
            HomingPhase::SetZero => (
                position + config.zero_backoff,
                config.latch_velocity,
                MoveKind::Traverse,
            ),
            HomingPhase::Idle => return Status::Eagain,
        };

        let mut gm = self.store.snapshot();
        gm.target = self.store.gmx.position;
        gm.target[axis as usize] = target_value;
        gm.feed_rate = velocity;
        gm.move_time = (target_value - position).abs() / velocity;
        gm.minimum_time = gm.move_time;
        gm.line_number = 0;

        match self.planner.commit(gm, kind) {
            Ok(_) => {
                self.homing.waiting = true;
                Status::Eagain
            }
            // Queue full: retry the same phase on the next pass.
            Err(_) => Status::Eagain,
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
