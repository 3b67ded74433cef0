//! The three-level machine automaton.
//!
//! Machine / cycle / motion plus the feedhold sub-state, driven by
//! explicit events with an accept-or-reject transition table. The
//! externally visible status is the pure [`CombinedState`] projection;
//! nothing outside this module mutates the automaton directly.

use arbor_common::state::{
    CombinedState, CycleState, FeedholdState, MachineState, MotionState,
};

/// Result of a transition attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionResult {
    /// Transition succeeded — projected combined state afterwards.
    Ok(CombinedState),
    /// Transition rejected — reason.
    Rejected(&'static str),
}

/// Events that drive the automaton.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MachineEvent {
    /// Boot initialization finished.
    InitComplete,
    /// Cycle start request with the cycle kind to enter.
    CycleStart(CycleState),
    /// Runtime began executing buffers.
    MotionStarted,
    /// Runtime went idle (between moves, queue may still hold work).
    MotionStopped,
    /// Queue drained with no hold active — program stops.
    CycleEnd,
    /// M2/M30 reached with the queue drained.
    ProgramEndReached,
    /// Feedhold requested while running.
    FeedholdRequested,
    /// Hold progression: planner reached its sync point.
    HoldPlanned,
    /// Hold progression: decel handed to the runtime.
    HoldDecel,
    /// Runtime reports the decel finished.
    HoldComplete,
    /// Cycle start while holding — begin resuming.
    Resume,
    /// Runtime restarted the held move.
    ResumeComplete,
    /// Queue flush while holding — hold is abandoned.
    HoldAborted,
    /// Homing cycle finished; the program cycle continues.
    HomingDone,
    /// Probe cycle finished; the program cycle continues.
    ProbeDone,
    /// Fault — latch the alarm.
    Alarm,
    /// Operator cleared the alarm.
    AlarmCleared,
}

/// The live automaton.
#[derive(Debug, Clone)]
pub struct Automaton {
    machine: MachineState,
    cycle: CycleState,
    motion: MotionState,
    hold: FeedholdState,
}

impl Automaton {
    pub const fn new() -> Self {
        Self {
            machine: MachineState::Initializing,
            cycle: CycleState::Off,
            motion: MotionState::Stop,
            hold: FeedholdState::Off,
        }
    }

    #[inline]
    pub const fn machine_state(&self) -> MachineState {
        self.machine
    }

    #[inline]
    pub const fn cycle_state(&self) -> CycleState {
        self.cycle
    }

    #[inline]
    pub const fn motion_state(&self) -> MotionState {
        self.motion
    }

    #[inline]
    pub const fn hold_state(&self) -> FeedholdState {
        self.hold
    }

    /// The external status projection.
    #[inline]
    pub const fn combined(&self) -> CombinedState {
        CombinedState::project(self.machine, self.cycle, self.motion)
    }

    /// Whether the machine accepts motion commands right now.
    #[inline]
    pub const fn accepts_motion(&self) -> bool {
        !matches!(
            self.machine,
            MachineState::Initializing | MachineState::Alarm
        )
    }

    /// A cycle is active.
    #[inline]
    pub const fn in_cycle(&self) -> bool {
        matches!(self.machine, MachineState::Cycle)
    }

    /// Attempt a transition.
    pub fn handle_event(&mut self, event: MachineEvent) -> TransitionResult {
        use MachineEvent as E;

        match event {
            E::InitComplete => {
                if self.machine != MachineState::Initializing {
                    return self.reject("InitComplete only valid while initializing");
                }
                self.machine = MachineState::Ready;
            }

            E::CycleStart(kind) => {
                if kind == CycleState::Off {
                    return self.reject("CycleStart requires a cycle kind");
                }
                match self.machine {
                    MachineState::Cycle => {
                        // Idempotent within a cycle; homing/probe nest
                        // inside a machining cycle.
                        self.cycle = kind;
                    }
                    m if m.can_start_cycle() => {
                        self.machine = MachineState::Cycle;
                        self.cycle = kind;
                        self.motion = MotionState::Stop;
                    }
                    _ => return self.reject("cycle start not allowed in this state"),
                }
            }

            E::MotionStarted => {
                if !self.in_cycle() {
                    return self.reject("motion outside a cycle");
                }
                if self.motion != MotionState::Hold {
                    self.motion = MotionState::Run;
                }
            }

            E::MotionStopped => {
                if self.motion == MotionState::Run {
                    self.motion = MotionState::Stop;
                }
            }

            E::CycleEnd | E::ProgramEndReached => {
                if !self.in_cycle() {
                    return self.reject("no cycle to end");
                }
                if self.hold.is_active() {
                    return self.reject("cycle cannot end while a hold is active");
                }
                self.cycle = CycleState::Off;
                self.motion = MotionState::Stop;
                self.machine = if event == E::ProgramEndReached {
                    MachineState::ProgramEnd
                } else {
                    MachineState::ProgramStop
                };
            }

            E::FeedholdRequested => {
                if !self.in_cycle() || self.motion != MotionState::Run {
                    return self.reject("feedhold requires a running cycle");
                }
                if self.hold != FeedholdState::Off {
                    return self.reject("hold already in progress");
                }
                self.hold = FeedholdState::Sync;
            }

            E::HoldPlanned => {
                if self.hold != FeedholdState::Sync {
                    return self.reject("hold is not at sync");
                }
                self.hold = FeedholdState::Plan;
            }

            E::HoldDecel => {
                if self.hold != FeedholdState::Plan {
                    return self.reject("hold is not planned");
                }
                self.hold = FeedholdState::Decel;
            }

            E::HoldComplete => {
                if self.hold != FeedholdState::Decel {
                    return self.reject("no decel in progress");
                }
                self.hold = FeedholdState::Hold;
                self.motion = MotionState::Hold;
            }

            E::Resume => {
                if self.hold != FeedholdState::Hold {
                    return self.reject("nothing held to resume");
                }
                self.hold = FeedholdState::EndHold;
            }

            E::ResumeComplete => {
                if self.hold != FeedholdState::EndHold {
                    return self.reject("no resume in progress");
                }
                self.hold = FeedholdState::Off;
                self.motion = MotionState::Run;
            }

            E::HoldAborted => {
                if !self.hold.allows_flush() {
                    return self.reject("queue flush only while held");
                }
                self.hold = FeedholdState::Off;
                self.motion = MotionState::Stop;
            }

            E::HomingDone => {
                if self.cycle != CycleState::Homing {
                    return self.reject("no homing cycle active");
                }
                self.cycle = CycleState::Machining;
                self.motion = MotionState::Stop;
            }

            E::ProbeDone => {
                if self.cycle != CycleState::Probe {
                    return self.reject("no probe cycle active");
                }
                self.cycle = CycleState::Machining;
                self.motion = MotionState::Stop;
            }

            E::Alarm => {
                self.machine = MachineState::Alarm;
                self.cycle = CycleState::Off;
                self.motion = MotionState::Stop;
                self.hold = FeedholdState::Off;
            }

            E::AlarmCleared => {
                if self.machine != MachineState::Alarm {
                    return self.reject("no alarm to clear");
                }
                self.machine = MachineState::Ready;
            }
        }

        TransitionResult::Ok(self.combined())
    }

    /// Force the alarm state (integrity faults, cycle failures).
    pub fn force_alarm(&mut self) {
        self.machine = MachineState::Alarm;
        self.cycle = CycleState::Off;
        self.motion = MotionState::Stop;
        self.hold = FeedholdState::Off;
    }

    fn reject(&self, reason: &'static str) -> TransitionResult {
        TransitionResult::Rejected(reason)
    }
}

impl Default for Automaton {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
