//! Runtime execution model (mr).
//!
//! A cooperative stand-in for the step-timer executor: it consumes
//! planner buffers in order, owns its own `gm` snapshot, and exposes
//! the read-only queries the canonical machine is allowed to make
//! (position, velocity, line number, busy).
//!
//! Execution is deliberately coarse — a move starts on one tick and
//! completes on the next — which is exactly the granularity the
//! feedhold and cycle sequencing logic needs: there is a window in
//! which a decel request can land mid-move, and a held move keeps its
//! unfinished remainder until resumed or flushed.
//!
//! Switch and probe trips are modeled as configurable machine
//! coordinates so the homing and probe cycles have real sensor
//! behavior to run against.

use arbor_common::axis::Axis;
use arbor_common::consts::AXIS_COUNT;

use crate::model::GCodeState;
use crate::planner::{MoveKind, PlannerBuffer, PlannerQueue};

#[derive(Debug, Clone, Copy)]
struct ActiveMove {
    buffer: PlannerBuffer,
    start: [f64; AXIS_COUNT],
}

/// The runtime execution model.
#[derive(Debug)]
pub struct RuntimeModel {
    /// Snapshot of the buffer being executed. In-flight reporting
    /// reads this, never the canonical gm.
    pub gm: GCodeState,
    position: [f64; AXIS_COUNT],
    velocity: f64,
    line_number: u32,
    active: Option<ActiveMove>,
    decel_requested: bool,
    holding: bool,
    tripped: bool,
    /// Machine coordinate of each axis's homing switch, if simulated.
    switch_position: [Option<f64>; AXIS_COUNT],
    /// Machine position at which the probe input trips, if simulated.
    probe_trip: Option<[f64; AXIS_COUNT]>,
}

impl Default for RuntimeModel {
    fn default() -> Self {
        Self {
            gm: GCodeState::default(),
            position: [0.0; AXIS_COUNT],
            velocity: 0.0,
            line_number: 0,
            active: None,
            decel_requested: false,
            holding: false,
            tripped: false,
            switch_position: [None; AXIS_COUNT],
            probe_trip: None,
        }
    }
}

impl RuntimeModel {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Read-only queries ──

    #[inline]
    pub fn position(&self, axis: Axis) -> f64 {
        self.position[axis as usize]
    }

    #[inline]
    pub fn positions(&self) -> [f64; AXIS_COUNT] {
        self.position
    }

    #[inline]
    pub fn velocity(&self) -> f64 {
        self.velocity
    }

    #[inline]
    pub fn line_number(&self) -> u32 {
        self.line_number
    }

    /// A move is in flight (started and not finished).
    #[inline]
    pub fn busy(&self) -> bool {
        self.active.is_some()
    }

    /// Stopped at a feedhold decel boundary.
    #[inline]
    pub fn holding(&self) -> bool {
        self.holding
    }

    /// Whether the last search/probe move ended on a trip.
    #[inline]
    pub fn last_move_tripped(&self) -> bool {
        self.tripped
    }

    // ── Feedhold interface ──

    /// Ask the runtime to decelerate to a stop at the next boundary.
    pub fn request_decel(&mut self) {
        self.decel_requested = true;
    }

    /// Resume a held move; it completes on a later tick.
    pub fn resume(&mut self) {
        self.holding = false;
    }

    /// Abandon the held remainder (queue flush during hold).
    pub fn abort_held(&mut self) {
        self.active = None;
        self.holding = false;
        self.decel_requested = false;
        self.velocity = 0.0;
    }

    // ── Position writes (homing zero set, G28.3) ──

    pub fn set_position(&mut self, axis: Axis, value: f64) {
        self.position[axis as usize] = value;
    }

    // ── Simulated sensor inputs ──

    pub fn set_switch_position(&mut self, axis: Axis, position: Option<f64>) {
        self.switch_position[axis as usize] = position;
    }

    pub fn set_probe_trip(&mut self, trip: Option<[f64; AXIS_COUNT]>) {
        self.probe_trip = trip;
    }

    // ── Execution ──

    /// One executor pass: finish the in-flight move, or start the next
    /// queued buffer. Held state freezes the queue entirely.
    pub fn tick(&mut self, planner: &mut PlannerQueue) {
        if self.holding {
            return;
        }

        if let Some(active) = self.active {
            if self.decel_requested {
                self.stop_at_decel_boundary(&active);
                return;
            }
            self.complete(&active);
            self.active = None;
            self.velocity = 0.0;
            return;
        }

        if self.decel_requested {
            // Nothing in flight: the stop boundary is right here.
            self.decel_requested = false;
            self.holding = true;
            return;
        }

        if let Some(buffer) = planner.pop() {
            self.start(buffer);
        }
    }

    fn start(&mut self, buffer: PlannerBuffer) {
        self.gm = buffer.gm;
        self.line_number = buffer.gm.line_number;
        self.velocity = match buffer.kind {
            MoveKind::Dwell | MoveKind::Command => 0.0,
            _ if buffer.gm.move_time > 0.0 => {
                path_length(&self.position, &buffer.gm.target) / buffer.gm.move_time
            }
            _ => 0.0,
        };
        self.active = Some(ActiveMove {
            buffer,
            start: self.position,
        });
    }

    fn stop_at_decel_boundary(&mut self, active: &ActiveMove) {
        match active.buffer.kind {
            MoveKind::Dwell | MoveKind::Command => {
                // No motion to decelerate; finish the block, then hold.
                self.complete(active);
                self.active = None;
            }
            _ => {
                // Stop halfway through the remaining travel. The move
                // stays active and resumes from here.
                for i in 0..AXIS_COUNT {
                    self.position[i] = (self.position[i] + active.buffer.gm.target[i]) / 2.0;
                }
            }
        }
        self.velocity = 0.0;
        self.decel_requested = false;
        self.holding = true;
    }

    fn complete(&mut self, active: &ActiveMove) {
        let target = active.buffer.gm.target;
        match active.buffer.kind {
            MoveKind::Traverse | MoveKind::Feed => {
                self.position = target;
            }
            MoveKind::Dwell | MoveKind::Command => {}
            MoveKind::Search => {
                let axis = single_moving_axis(&active.start, &target);
                self.tripped = false;
                if let Some(axis) = axis {
                    let i = axis as usize;
                    if let Some(switch) = self.switch_position[i] {
                        if between(active.start[i], target[i], switch) {
                            self.position[i] = switch;
                            self.tripped = true;
                            return;
                        }
                    }
                    self.position[i] = target[i];
                }
            }
            MoveKind::Probe => {
                if let Some(trip) = self.probe_trip {
                    self.position = trip;
                    self.tripped = true;
                } else {
                    self.position = target;
                    self.tripped = false;
                }
            }
        }
    }
}

/// Euclidean path length between two position vectors.
fn path_length(from: &[f64; AXIS_COUNT], to: &[f64; AXIS_COUNT]) -> f64 {
    from.iter()
        .zip(to.iter())
        .map(|(a, b)| (b - a) * (b - a))
        .sum::<f64>()
        .sqrt()
}

/// The one axis a single-axis move displaces, if exactly one.
fn single_moving_axis(from: &[f64; AXIS_COUNT], to: &[f64; AXIS_COUNT]) -> Option<Axis> {
    let mut found = None;
    for axis in Axis::ALL {
        if (to[axis as usize] - from[axis as usize]).abs() > f64::EPSILON {
            if found.is_some() {
                return None;
            }
            found = Some(axis);
        }
    }
    found
}

/// Whether `value` lies on the segment from `a` to `b`.
fn between(a: f64, b: f64, value: f64) -> bool {
    if a <= b {
        (a..=b).contains(&value)
    } else {
        (b..=a).contains(&value)
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::GCodeState;

    fn feed_to(x: f64, y: f64, line: u32) -> GCodeState {
        let mut gm = GCodeState::default();
        gm.target[0] = x;
        gm.target[1] = y;
        gm.move_time = 0.01;
        gm.line_number = line;
        gm
    }

    #[test]
    fn move_takes_two_ticks() {
        let mut planner = PlannerQueue::new();
        let mut runtime = RuntimeModel::new();
        planner.commit(feed_to(10.0, 0.0, 1), MoveKind::Feed).unwrap();

        runtime.tick(&mut planner); // start
        assert!(runtime.busy());
        assert!(runtime.velocity() > 0.0);
        assert_eq!(runtime.line_number(), 1);

        runtime.tick(&mut planner); // complete
        assert!(!runtime.busy());
        assert_eq!(runtime.position(Axis::X), 10.0);
        assert_eq!(runtime.velocity(), 0.0);
    }

    #[test]
    fn decel_stops_midway_and_resume_finishes() {
        let mut planner = PlannerQueue::new();
        let mut runtime = RuntimeModel::new();
        planner.commit(feed_to(50.0, 0.0, 1), MoveKind::Feed).unwrap();

        runtime.tick(&mut planner); // start
        runtime.request_decel();
        runtime.tick(&mut planner); // decel boundary
        assert!(runtime.holding());
        assert_eq!(runtime.position(Axis::X), 25.0);
        assert!(runtime.busy()); // remainder retained

        // Held: further ticks change nothing.
        runtime.tick(&mut planner);
        assert_eq!(runtime.position(Axis::X), 25.0);

        runtime.resume();
        runtime.tick(&mut planner); // complete
        assert!(!runtime.holding());
        assert_eq!(runtime.position(Axis::X), 50.0);
    }

    #[test]
    fn hold_freezes_pending_queue() {
        let mut planner = PlannerQueue::new();
        let mut runtime = RuntimeModel::new();
        planner.commit(feed_to(10.0, 0.0, 1), MoveKind::Feed).unwrap();
        planner.commit(feed_to(20.0, 0.0, 2), MoveKind::Feed).unwrap();

        runtime.tick(&mut planner); // start #1
        runtime.tick(&mut planner); // complete #1
        runtime.request_decel();
        runtime.tick(&mut planner); // boundary with nothing in flight
        assert!(runtime.holding());
        assert_eq!(planner.len(), 1); // #2 never started

        runtime.resume();
        runtime.tick(&mut planner);
        runtime.tick(&mut planner);
        assert_eq!(runtime.position(Axis::X), 20.0);
    }

    #[test]
    fn abort_held_drops_remainder() {
        let mut planner = PlannerQueue::new();
        let mut runtime = RuntimeModel::new();
        planner.commit(feed_to(50.0, 0.0, 1), MoveKind::Feed).unwrap();
        runtime.tick(&mut planner);
        runtime.request_decel();
        runtime.tick(&mut planner);
        assert!(runtime.holding());

        runtime.abort_held();
        assert!(!runtime.busy());
        runtime.tick(&mut planner);
        assert_eq!(runtime.position(Axis::X), 25.0); // stays at the hold point
    }

    #[test]
    fn search_move_trips_on_switch() {
        let mut planner = PlannerQueue::new();
        let mut runtime = RuntimeModel::new();
        runtime.set_switch_position(Axis::X, Some(-95.0));

        let mut gm = GCodeState::default();
        gm.target[0] = -200.0;
        gm.move_time = 0.1;
        planner.commit(gm, MoveKind::Search).unwrap();

        runtime.tick(&mut planner);
        runtime.tick(&mut planner);
        assert!(runtime.last_move_tripped());
        assert_eq!(runtime.position(Axis::X), -95.0);
    }

    #[test]
    fn search_move_without_switch_runs_out() {
        let mut planner = PlannerQueue::new();
        let mut runtime = RuntimeModel::new();

        let mut gm = GCodeState::default();
        gm.target[0] = -200.0;
        gm.move_time = 0.1;
        planner.commit(gm, MoveKind::Search).unwrap();

        runtime.tick(&mut planner);
        runtime.tick(&mut planner);
        assert!(!runtime.last_move_tripped());
        assert_eq!(runtime.position(Axis::X), -200.0);
    }

    #[test]
    fn probe_move_trips_at_configured_point() {
        let mut planner = PlannerQueue::new();
        let mut runtime = RuntimeModel::new();
        let mut trip = [0.0; AXIS_COUNT];
        trip[2] = -4.2;
        runtime.set_probe_trip(Some(trip));

        let mut gm = GCodeState::default();
        gm.target[2] = -10.0;
        gm.move_time = 0.1;
        planner.commit(gm, MoveKind::Probe).unwrap();

        runtime.tick(&mut planner);
        runtime.tick(&mut planner);
        assert!(runtime.last_move_tripped());
        assert_eq!(runtime.position(Axis::Z), -4.2);
    }

    #[test]
    fn dwell_does_not_move() {
        let mut planner = PlannerQueue::new();
        let mut runtime = RuntimeModel::new();
        let mut gm = GCodeState::default();
        gm.target[0] = 123.0; // stale target must be ignored
        gm.parameter = 0.5;
        planner.commit(gm, MoveKind::Dwell).unwrap();
        runtime.tick(&mut planner);
        assert_eq!(runtime.velocity(), 0.0);
        runtime.tick(&mut planner);
        assert_eq!(runtime.position(Axis::X), 0.0);
    }
}
