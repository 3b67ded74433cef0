//! Axis identity and per-axis presence flags.
//!
//! The axis tuple is fixed at compile time: X, Y, Z (linear) then
//! A, B, C (rotary). Vector fields throughout the workspace are
//! `[f64; AXIS_COUNT]` indexed by `Axis as usize`.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::consts::AXIS_COUNT;

/// Axis identifier, also the index into all per-axis arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Axis {
    X = 0,
    Y = 1,
    Z = 2,
    A = 3,
    B = 4,
    C = 5,
}

impl Axis {
    /// All axes in canonical order.
    pub const ALL: [Axis; AXIS_COUNT] = [Axis::X, Axis::Y, Axis::Z, Axis::A, Axis::B, Axis::C];

    /// Convert from an array index. Returns `None` out of range.
    #[inline]
    pub const fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Self::X),
            1 => Some(Self::Y),
            2 => Some(Self::Z),
            3 => Some(Self::A),
            4 => Some(Self::B),
            5 => Some(Self::C),
            _ => None,
        }
    }

    /// G-code word letter for this axis.
    #[inline]
    pub const fn letter(&self) -> char {
        match self {
            Self::X => 'X',
            Self::Y => 'Y',
            Self::Z => 'Z',
            Self::A => 'A',
            Self::B => 'B',
            Self::C => 'C',
        }
    }

    /// True for the rotary axes A, B, C.
    #[inline]
    pub const fn is_rotary(&self) -> bool {
        matches!(self, Self::A | Self::B | Self::C)
    }
}

bitflags! {
    /// One presence bit per axis, in canonical order.
    ///
    /// Used for "which axes does this block mention" and for the
    /// per-axis homed flags on the controller.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AxisFlags: u8 {
        const X = 0x01;
        const Y = 0x02;
        const Z = 0x04;
        const A = 0x08;
        const B = 0x10;
        const C = 0x20;
    }
}

impl AxisFlags {
    /// Mask of the linear axes.
    pub const LINEAR: Self = Self::from_bits_truncate(0x07);

    /// Mask of the rotary axes.
    pub const ROTARY: Self = Self::from_bits_truncate(0x38);

    /// Flag bit for a single axis.
    #[inline]
    pub const fn of(axis: Axis) -> Self {
        Self::from_bits_truncate(1 << axis as u8)
    }

    /// Whether the given axis bit is set.
    #[inline]
    pub fn has(&self, axis: Axis) -> bool {
        self.contains(Self::of(axis))
    }

    /// Set or clear the bit for one axis.
    #[inline]
    pub fn put(&mut self, axis: Axis, present: bool) {
        self.set(Self::of(axis), present);
    }
}

impl Default for AxisFlags {
    fn default() -> Self {
        Self::empty()
    }
}

/// Per-axis operating mode from configuration.
///
/// Inhibited axes accept targets but contribute zero motion; radius
/// axes are rotary axes whose linear words are converted through the
/// configured rotary radius.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum AxisMode {
    /// Axis is not present on the machine.
    Disabled = 0,
    /// Normal coordinated axis.
    Standard = 1,
    /// Axis tracked in the model but produces no motion.
    Inhibited = 2,
    /// Rotary axis commanded in linear units via its radius.
    Radius = 3,
}

impl AxisMode {
    /// Convert from raw `u8`. Returns `None` for invalid values.
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Disabled),
            1 => Some(Self::Standard),
            2 => Some(Self::Inhibited),
            3 => Some(Self::Radius),
            _ => None,
        }
    }

    /// Whether the axis participates in motion at all.
    #[inline]
    pub const fn is_active(&self) -> bool {
        !matches!(self, Self::Disabled)
    }
}

impl Default for AxisMode {
    fn default() -> Self {
        Self::Standard
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn axis_index_roundtrip() {
        for (i, axis) in Axis::ALL.iter().enumerate() {
            assert_eq!(Axis::from_index(i), Some(*axis));
            assert_eq!(*axis as usize, i);
        }
        assert!(Axis::from_index(AXIS_COUNT).is_none());
    }

    #[test]
    fn axis_letters() {
        let letters: Vec<char> = Axis::ALL.iter().map(Axis::letter).collect();
        assert_eq!(letters, ['X', 'Y', 'Z', 'A', 'B', 'C']);
    }

    #[test]
    fn rotary_split() {
        assert!(!Axis::X.is_rotary());
        assert!(!Axis::Z.is_rotary());
        assert!(Axis::A.is_rotary());
        assert!(Axis::C.is_rotary());
    }

    #[test]
    fn flags_per_axis() {
        let mut flags = AxisFlags::empty();
        flags.put(Axis::X, true);
        flags.put(Axis::C, true);
        assert!(flags.has(Axis::X));
        assert!(!flags.has(Axis::Y));
        assert!(flags.has(Axis::C));
        flags.put(Axis::X, false);
        assert!(!flags.has(Axis::X));
    }

    #[test]
    fn linear_rotary_masks() {
        assert_eq!(AxisFlags::LINEAR | AxisFlags::ROTARY, AxisFlags::all());
        assert!(AxisFlags::LINEAR.has(Axis::Z));
        assert!(AxisFlags::ROTARY.has(Axis::A));
        assert!(!AxisFlags::ROTARY.has(Axis::X));
    }

    #[test]
    fn axis_mode_roundtrip() {
        for v in 0..=3u8 {
            let mode = AxisMode::from_u8(v).unwrap();
            assert_eq!(mode as u8, v);
        }
        assert!(AxisMode::from_u8(4).is_none());
    }

    #[test]
    fn axis_mode_active() {
        assert!(!AxisMode::Disabled.is_active());
        assert!(AxisMode::Standard.is_active());
        assert!(AxisMode::Inhibited.is_active());
        assert!(AxisMode::Radius.is_active());
    }
}
