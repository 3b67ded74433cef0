//! Planner buffer queue.
//!
//! Fixed-capacity FIFO of committed moves, each carrying a by-value
//! snapshot of the canonical model captured at enqueue time. The
//! canonical machine writes a snapshot into an unpublished slot and
//! publishes it with `commit`; the runtime consumes from the head.
//! Nothing here ever hands out a mutable alias into a committed
//! snapshot.

use heapless::Deque;

use arbor_common::consts::PLANNER_QUEUE_DEPTH;
use arbor_common::status::Status;

use crate::model::GCodeState;

/// What a planner buffer asks the runtime to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MoveKind {
    /// G0 rapid traverse.
    Traverse = 0,
    /// G1/G2/G3 feed move (arc segments arrive as feeds).
    Feed = 1,
    /// G4 timed block, no motion.
    Dwell = 2,
    /// Synchronized non-motion command (tool, spindle, coolant).
    Command = 3,
    /// Homing search/latch move — stops when the axis switch trips.
    Search = 4,
    /// G38.2 probe move — stops when the probe trips.
    Probe = 5,
}

/// One committed planner buffer.
#[derive(Debug, Clone, Copy)]
pub struct PlannerBuffer {
    /// Monotonic buffer id, used by `ModelRef::Planner`.
    pub id: u32,
    pub kind: MoveKind,
    /// Snapshot of gm at enqueue time. In-flight moves read this even
    /// as later blocks advance the canonical model.
    pub gm: GCodeState,
}

/// Fixed-depth planner queue.
#[derive(Debug, Default)]
pub struct PlannerQueue {
    queue: Deque<PlannerBuffer, PLANNER_QUEUE_DEPTH>,
    next_id: u32,
}

impl PlannerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Free slots available for commit.
    #[inline]
    pub fn room(&self) -> usize {
        PLANNER_QUEUE_DEPTH - self.queue.len()
    }

    #[inline]
    pub fn queue_empty(&self) -> bool {
        self.queue.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Reserve a slot, write the snapshot, publish. Returns the buffer
    /// id, or `BufferFull` when the queue has no room — the caller
    /// retries the same block on a later dispatcher pass.
    pub fn commit(&mut self, gm: GCodeState, kind: MoveKind) -> Result<u32, Status> {
        if self.queue.is_full() {
            return Err(Status::BufferFull);
        }
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        // Cannot fail: fullness checked above, single-threaded access.
        let _ = self.queue.push_back(PlannerBuffer { id, kind, gm });
        Ok(id)
    }

    /// Runtime side: take the next buffer to execute.
    pub fn pop(&mut self) -> Option<PlannerBuffer> {
        self.queue.pop_front()
    }

    /// Look up a committed buffer by id (reporting through
    /// `ModelRef::Planner`).
    pub fn get(&self, id: u32) -> Option<&PlannerBuffer> {
        self.queue.iter().find(|b| b.id == id)
    }

    /// Drop every not-yet-started buffer.
    pub fn flush(&mut self) {
        self.queue.clear();
    }

    /// Ids of every committed buffer, head first.
    pub fn peek_ids(&self) -> Vec<u32> {
        self.queue.iter().map(|b| b.id).collect()
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
