//! System-wide constants for the Arbor workspace.
//!
//! Single source of truth for all numeric limits and default paths.
//! Imported by all crates — no duplication permitted.

/// Number of axes in the build (X, Y, Z, A, B, C).
pub const AXIS_COUNT: usize = 6;

/// Number of coordinate systems: machine frame + G54..G59.
pub const COORD_SYSTEM_COUNT: usize = 7;

/// Millimeters per inch (G20 conversion factor, exact).
pub const MM_PER_INCH: f64 = 25.4;

/// Planner buffer pool depth.
pub const PLANNER_QUEUE_DEPTH: usize = 28;

/// Jerk values are written in config as `mm/min³ × 10⁻⁶`; expanded on use.
pub const JERK_MULTIPLIER: f64 = 1_000_000.0;

/// Default minimum feed/traverse override factor.
pub const OVERRIDE_FACTOR_MIN: f64 = 0.05;

/// Default maximum feed/traverse override factor.
pub const OVERRIDE_FACTOR_MAX: f64 = 2.0;

/// Default minimum spindle override factor.
pub const SPINDLE_OVERRIDE_MIN: f64 = 0.05;

/// Default maximum spindle override factor.
pub const SPINDLE_OVERRIDE_MAX: f64 = 2.0;

/// Default chordal tolerance for arc segmentation [mm].
pub const CHORDAL_TOLERANCE_DEFAULT: f64 = 0.01;

/// Minimum arc segment length [mm].
pub const MIN_SEGMENT_LEN_DEFAULT: f64 = 0.05;

/// Default junction acceleration [mm/min²].
pub const JUNCTION_ACCELERATION_DEFAULT: f64 = 100_000.0;

/// Default offset-table persistence file name.
pub const DEFAULT_OFFSETS_FILE: &str = "offsets.toml";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constants_are_consistent() {
        assert!(AXIS_COUNT > 0);
        assert_eq!(COORD_SYSTEM_COUNT, 7);
        assert!(OVERRIDE_FACTOR_MIN < OVERRIDE_FACTOR_MAX);
        assert!(SPINDLE_OVERRIDE_MIN < SPINDLE_OVERRIDE_MAX);
        assert!(CHORDAL_TOLERANCE_DEFAULT > 0.0);
        assert!(MIN_SEGMENT_LEN_DEFAULT > CHORDAL_TOLERANCE_DEFAULT);
    }
}
