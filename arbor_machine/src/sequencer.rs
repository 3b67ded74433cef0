//! Request latches and the feedhold sequencing callback.
//!
//! The serial input interrupt recognizes `!` (feedhold), `%` (queue
//! flush) and `~` (cycle start) out of band and sets one latch each.
//! A latch is a one-slot single-producer single-consumer cell: one
//! atomic word, set by the ISR context, taken by the dispatcher. No
//! other data crosses contexts.
//!
//! The sequencing callback runs on every dispatcher iteration and
//! consumes the latches in priority order — feedhold first, then
//! queue flush (only honored while held), then cycle start — and
//! advances the feedhold sub-machine one step per pass.

use std::sync::atomic::{AtomicBool, Ordering};

use arbor_common::state::{CycleState, FeedholdState, MotionState};

use crate::machine::CanonicalMachine;
use crate::state::MachineEvent;

/// One-slot lock-free request latch.
///
/// `request` is the producer side (ISR), `take` the consumer side
/// (dispatcher). A single machine word; relaxed ordering is enough
/// because no other data is published through it.
#[derive(Debug, Default)]
pub struct Latch {
    flag: AtomicBool,
}

impl Latch {
    pub const fn new() -> Self {
        Self {
            flag: AtomicBool::new(false),
        }
    }

    /// Producer side: set the request.
    #[inline]
    pub fn request(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// Consumer side: observe without clearing.
    #[inline]
    pub fn pending(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// Consumer side: clear and report whether it was set.
    #[inline]
    pub fn take(&self) -> bool {
        self.flag.swap(false, Ordering::Relaxed)
    }
}

/// The three cross-context request latches.
#[derive(Debug, Default)]
pub struct RequestLatches {
    pub feedhold: Latch,
    pub queue_flush: Latch,
    pub cycle_start: Latch,
}

impl RequestLatches {
    pub const fn new() -> Self {
        Self {
            feedhold: Latch::new(),
            queue_flush: Latch::new(),
            cycle_start: Latch::new(),
        }
    }
}

impl CanonicalMachine {
    /// ISR side: `!` received.
    pub fn request_feedhold(&self) {
        self.latches.feedhold.request();
    }

    /// ISR side: `%` received.
    pub fn request_queue_flush(&self) {
        self.latches.queue_flush.request();
    }

    /// ISR side: `~` received.
    pub fn request_cycle_start(&self) {
        self.latches.cycle_start.request();
    }

    /// Consume the request latches and advance the feedhold
    /// sub-machine. Runs once per dispatcher iteration.
    pub(crate) fn feedhold_sequencing_callback(&mut self) {
        // 1. Feedhold request — only meaningful while running; a
        //    request with no motion is dropped.
        if self.latches.feedhold.take()
            && self.automaton.motion_state() == MotionState::Run
            && self.automaton.hold_state() == FeedholdState::Off
        {
            self.automaton.handle_event(MachineEvent::FeedholdRequested);
            // Sync and plan complete immediately here — there is no
            // replanning to wait for — so the decel request reaches
            // the runtime before its next executor pass.
            self.automaton.handle_event(MachineEvent::HoldPlanned);
            self.runtime.request_decel();
            self.automaton.handle_event(MachineEvent::HoldDecel);
        }

        // Advance the hold progression one step per pass.
        match self.automaton.hold_state() {
            FeedholdState::Sync => {
                self.automaton.handle_event(MachineEvent::HoldPlanned);
            }
            FeedholdState::Plan => {
                self.runtime.request_decel();
                self.automaton.handle_event(MachineEvent::HoldDecel);
            }
            FeedholdState::Decel => {
                if self.runtime.holding() {
                    self.automaton.handle_event(MachineEvent::HoldComplete);
                }
            }
            FeedholdState::EndHold => {
                if !self.runtime.holding() {
                    self.automaton.handle_event(MachineEvent::ResumeComplete);
                }
            }
            FeedholdState::Off | FeedholdState::Hold => {}
        }

        // 2. Queue flush — honored only while held; otherwise the
        //    request stays latched until the hold lands.
        if self.latches.queue_flush.pending() && self.automaton.hold_state().allows_flush() {
            self.latches.queue_flush.take();
            self.planner.flush();
            self.runtime.abort_held();
            self.store.gmx.position = self.runtime.positions();
            self.store.gm.target = self.store.gmx.position;
            self.automaton.handle_event(MachineEvent::HoldAborted);
        }

        // 3. Cycle start — resumes a hold, or re-engages the cycle
        //    when there is queued work.
        if self.latches.cycle_start.take() {
            if self.automaton.hold_state() == FeedholdState::Hold {
                self.automaton.handle_event(MachineEvent::Resume);
                self.runtime.resume();
            } else if !self.automaton.in_cycle() && !self.planner.queue_empty() {
                self.automaton
                    .handle_event(MachineEvent::CycleStart(CycleState::Machining));
                self.automaton.handle_event(MachineEvent::MotionStarted);
            }
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_common::axis::AxisFlags;
    use arbor_common::config::MachineConfig;
    use arbor_common::consts::AXIS_COUNT;
    use arbor_common::state::CombinedState;
    use arbor_common::status::Status;

    fn machine() -> CanonicalMachine {
        let mut cm = CanonicalMachine::new(MachineConfig::default());
        cm.init();
        cm.set_feed_rate(600.0);
        cm
    }

    fn x_target(x: f64) -> [f64; AXIS_COUNT] {
        let mut t = [0.0; AXIS_COUNT];
        t[0] = x;
        t
    }

    #[test]
    fn latch_is_single_shot() {
        let latch = Latch::new();
        assert!(!latch.take());
        latch.request();
        assert!(latch.pending());
        assert!(latch.take());
        assert!(!latch.take());
    }

    #[test]
    fn feedhold_lands_within_a_few_passes() {
        let mut cm = machine();
        cm.straight_feed(&x_target(50.0), AxisFlags::X);
        cm.dispatch_tick(); // runtime starts the move
        assert_eq!(cm.combined_state(), CombinedState::Run);

        cm.request_feedhold();
        for _ in 0..4 {
            cm.dispatch_tick();
        }
        assert_eq!(cm.combined_state(), CombinedState::Hold);
        assert!(cm.runtime().holding());
        // Stopped partway, not at the target.
        assert!(cm.runtime().position(arbor_common::axis::Axis::X) < 50.0);
    }

    #[test]
    fn cycle_start_resumes_hold_to_completion() {
        let mut cm = machine();
        cm.straight_feed(&x_target(50.0), AxisFlags::X);
        cm.dispatch_tick();
        cm.request_feedhold();
        for _ in 0..4 {
            cm.dispatch_tick();
        }
        assert_eq!(cm.combined_state(), CombinedState::Hold);

        cm.request_cycle_start();
        for _ in 0..6 {
            cm.dispatch_tick();
        }
        assert_eq!(cm.runtime().position(arbor_common::axis::Axis::X), 50.0);
        assert_eq!(cm.combined_state(), CombinedState::ProgramStop);
    }

    #[test]
    fn feedhold_with_no_motion_is_dropped() {
        let mut cm = machine();
        cm.request_feedhold();
        cm.dispatch_tick();
        assert!(!cm.latches.feedhold.pending());
        assert_eq!(cm.combined_state(), CombinedState::Ready);
    }

    #[test]
    fn queue_flush_waits_for_hold() {
        let mut cm = machine();
        cm.straight_feed(&x_target(50.0), AxisFlags::X);
        cm.straight_feed(&x_target(80.0), AxisFlags::X);
        cm.dispatch_tick();

        // Flush request before any hold: stays latched.
        cm.request_queue_flush();
        cm.dispatch_tick();
        assert!(cm.latches.queue_flush.pending());

        cm.request_feedhold();
        for _ in 0..4 {
            cm.dispatch_tick();
        }
        // The hold landed, so the pending flush fired.
        assert!(!cm.latches.queue_flush.pending());
        assert!(cm.planner().queue_empty());
        assert_eq!(cm.gm().target, cm.store().gmx.position);
        assert!(!cm.runtime().busy());
    }

    #[test]
    fn flush_then_restart_with_new_work() {
        let mut cm = machine();
        cm.straight_feed(&x_target(50.0), AxisFlags::X);
        cm.dispatch_tick();
        cm.request_feedhold();
        for _ in 0..4 {
            cm.dispatch_tick();
        }
        cm.request_queue_flush();
        for _ in 0..3 {
            cm.dispatch_tick();
        }
        assert_eq!(cm.combined_state(), CombinedState::ProgramStop);

        // The model target tracks where the machine actually stopped.
        let held_x = cm.runtime().position(arbor_common::axis::Axis::X);
        assert_eq!(cm.store().gmx.position[0], held_x);

        // New work starts a fresh cycle.
        assert_eq!(cm.straight_feed(&x_target(60.0), AxisFlags::X), Status::Ok);
        for _ in 0..4 {
            cm.dispatch_tick();
        }
        assert_eq!(cm.runtime().position(arbor_common::axis::Axis::X), 60.0);
    }

    #[test]
    fn cycle_start_reengages_queued_work() {
        let mut cm = machine();
        // Commit work without entering a cycle by hand-feeding the
        // planner, then ask for a cycle start.
        let mut gm = *cm.gm();
        gm.target[0] = 10.0;
        gm.move_time = 0.01;
        cm.planner.commit(gm, crate::planner::MoveKind::Feed).unwrap();
        // Machine is READY with queued work.
        assert_eq!(cm.combined_state(), CombinedState::Ready);

        cm.request_cycle_start();
        cm.dispatch_tick();
        assert_eq!(cm.combined_state(), CombinedState::Run);
    }
}
