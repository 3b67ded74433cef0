//! Straight-probe cycle (G38.2).
//!
//! A single feed move toward the target that the runtime ends early
//! when the probe input trips. Driven cooperatively like homing: the
//! callback returns `Eagain` until the move finishes, then captures
//! the trip point and hands the cycle back to machining. A probe that
//! runs its full travel without tripping fails the cycle.

use tracing::info;

use arbor_common::axis::{Axis, AxisFlags};
use arbor_common::consts::AXIS_COUNT;
use arbor_common::state::CycleState;
use arbor_common::status::Status;

use crate::machine::CanonicalMachine;
use crate::planner::MoveKind;
use crate::state::MachineEvent;

/// Probe cycle bookkeeping.
#[derive(Debug, Clone)]
pub struct ProbeCycle {
    active: bool,
}

impl ProbeCycle {
    pub fn new() -> Self {
        Self { active: false }
    }

    #[inline]
    pub fn active(&self) -> bool {
        self.active
    }

    pub(crate) fn arm(&mut self) {
        self.active = true;
    }

    pub(crate) fn reset(&mut self) {
        self.active = false;
    }
}

impl Default for ProbeCycle {
    fn default() -> Self {
        Self::new()
    }
}

/// Captured result of the last probe.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProbeResult {
    /// Machine position where the probe tripped (or stopped).
    pub position: [f64; AXIS_COUNT],
    /// Whether the probe input tripped.
    pub triggered: bool,
}

impl CanonicalMachine {
    /// G38.2 — probe toward the target at the active feed rate.
    ///
    /// The probed axes must be homed: the trip point is only
    /// meaningful in a trusted machine frame.
    pub fn probe_cycle_start(
        &mut self,
        target: &[f64; AXIS_COUNT],
        flags: AxisFlags,
    ) -> Status {
        let status = self.motion_guard();
        if !status.is_ok() {
            return status;
        }
        if flags.is_empty() {
            return Status::ValueOutOfRange;
        }
        let status = self.check_feed_rate();
        if !status.is_ok() {
            return status;
        }
        for axis in Axis::ALL {
            if flags.has(axis) && !self.homed.has(axis) {
                return Status::AxisNotHomed;
            }
        }
        let status = self.validate_travel(target, flags);
        if !status.is_ok() {
            return status;
        }

        let mut gm = self.store.snapshot();
        gm.target = self.store.gmx.position;
        for axis in Axis::ALL {
            if flags.has(axis) {
                gm.target[axis as usize] = target[axis as usize];
            }
        }
        gm.move_time = if gm.inverse_feed_rate_mode {
            1.0 / self.store.gmx.inverse_feed_rate
        } else {
            let mut distance_sq = 0.0;
            for i in 0..AXIS_COUNT {
                let delta = gm.target[i] - self.store.gmx.position[i];
                distance_sq += delta * delta;
            }
            distance_sq.sqrt() / gm.feed_rate
        };

        match self.planner.commit(gm, MoveKind::Probe) {
            Ok(_) => {
                self.automaton
                    .handle_event(MachineEvent::CycleStart(CycleState::Probe));
                self.probe.arm();
                Status::Ok
            }
            Err(status) => status,
        }
    }

    /// One cooperative probe step. `Eagain` while the move runs, `Ok`
    /// on a successful trip, `ProbeCycleFailed` when the move ran its
    /// full travel untripped.
    pub(crate) fn probe_callback(&mut self) -> Status {
        if !self.probe.active() {
            return Status::Ok;
        }
        if self.runtime.busy() || !self.planner.queue_empty() {
            return Status::Eagain;
        }

        self.probe.reset();
        let triggered = self.runtime.last_move_tripped();
        self.store.gmx.position = self.runtime.positions();
        self.store.gm.target = self.store.gmx.position;
        self.probe_result = ProbeResult {
            position: self.store.gmx.position,
            triggered,
        };
        if !triggered {
            return Status::ProbeCycleFailed;
        }
        self.automaton.handle_event(MachineEvent::ProbeDone);
        info!(position = ?self.probe_result.position, "probe tripped");
        Status::Ok
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
