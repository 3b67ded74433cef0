//! Unit & offset kernel.
//!
//! Pure coordinate math over the model store: composition of the
//! active work offset, work/machine position split, and the G92
//! origin-offset overlay. Nothing here touches the automaton or the
//! planner.
//!
//! The canonical frame is always millimeters and machine coordinates;
//! the offset kernel is the only place where the work frame and the
//! machine frame meet.

use arbor_common::axis::Axis;
use arbor_common::consts::AXIS_COUNT;

use crate::model::ModelStore;

impl ModelStore {
    /// Offset between the work frame and the machine frame for one
    /// axis: the selected coordinate-system offset plus the G92
    /// origin offset when enabled. Zero under G53 absolute override.
    pub fn active_coord_offset(&self, axis: Axis) -> f64 {
        if self.gm.absolute_override {
            return 0.0;
        }
        let mut offset = self.offset_table[self.gm.coord_system.index()][axis as usize];
        if self.gmx.origin_offset_enable {
            offset += self.gmx.origin_offset[axis as usize];
        }
        offset
    }

    /// Full active-offset vector, as captured into `gm.work_offset`
    /// for reporting snapshots.
    pub fn active_offset_vector(&self) -> [f64; AXIS_COUNT] {
        let mut offsets = [0.0; AXIS_COUNT];
        for axis in Axis::ALL {
            offsets[axis as usize] = self.active_coord_offset(axis);
        }
        offsets
    }

    /// Position in the work frame [mm]. Display-unit conversion is the
    /// reporter's job; the value is never stored converted.
    #[inline]
    pub fn work_position(&self, axis: Axis) -> f64 {
        self.gmx.position[axis as usize] - self.active_coord_offset(axis)
    }

    /// Position in the machine frame [mm].
    #[inline]
    pub fn absolute_position(&self, axis: Axis) -> f64 {
        self.gmx.position[axis as usize]
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
