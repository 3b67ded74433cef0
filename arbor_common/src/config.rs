//! Configuration structures for the canonical machine.
//!
//! All config types use `serde` for TOML loading. Numeric parameters
//! are bounds-checked by `validate()`; optional fields carry serde
//! defaults so older files keep loading as the schema grows.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::axis::{Axis, AxisMode};
use crate::consts::{
    AXIS_COUNT, CHORDAL_TOLERANCE_DEFAULT, JERK_MULTIPLIER, JUNCTION_ACCELERATION_DEFAULT,
    MIN_SEGMENT_LEN_DEFAULT, OVERRIDE_FACTOR_MAX, OVERRIDE_FACTOR_MIN, SPINDLE_OVERRIDE_MAX,
    SPINDLE_OVERRIDE_MIN,
};
use crate::gcode::{CoordinateSystem, DistanceMode, PathControl, Plane, Units};

// ─── Error Type ─────────────────────────────────────────────────────

/// Configuration loading/validation error.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File I/O error.
    #[error("config I/O error: {0}")]
    Io(String),
    /// TOML parse error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Parameter validation error.
    #[error("config validation: {0}")]
    Validation(String),
}

// ─── Switch Modes ───────────────────────────────────────────────────

/// Function assigned to an axis's min or max switch input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum SwitchMode {
    /// No switch fitted.
    Disabled = 0,
    /// Homing switch.
    Homing = 1,
    /// Limit switch only.
    Limit = 2,
    /// Shared homing + limit switch.
    HomingAndLimit = 3,
}

impl SwitchMode {
    /// Convert from raw `u8`. Returns `None` for invalid values.
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Disabled),
            1 => Some(Self::Homing),
            2 => Some(Self::Limit),
            3 => Some(Self::HomingAndLimit),
            _ => None,
        }
    }

    /// Whether this switch can terminate a homing search.
    #[inline]
    pub const fn homes(&self) -> bool {
        matches!(self, Self::Homing | Self::HomingAndLimit)
    }
}

impl Default for SwitchMode {
    fn default() -> Self {
        Self::Disabled
    }
}

// ─── Per-Axis Configuration ─────────────────────────────────────────

/// Persistent per-axis configuration.
///
/// Velocities and feed rates are mm/min (deg/min for rotary axes),
/// travel is mm (deg), jerk is written as `mm/min³ × 10⁻⁶` and
/// expanded via [`AxisConfig::jerk_max_expanded`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AxisConfig {
    /// Axis operating mode.
    #[serde(default)]
    pub mode: AxisMode,
    /// Maximum feed rate [mm/min].
    #[serde(default = "default_velocity")]
    pub feedrate_max: f64,
    /// Maximum traverse velocity [mm/min].
    #[serde(default = "default_velocity")]
    pub velocity_max: f64,
    /// Maximum travel from home [mm].
    #[serde(default = "default_travel")]
    pub travel_max: f64,
    /// Maximum jerk [mm/min³ × 10⁻⁶].
    #[serde(default = "default_jerk")]
    pub jerk_max: f64,
    /// Homing jerk [mm/min³ × 10⁻⁶].
    #[serde(default = "default_jerk_homing")]
    pub jerk_homing: f64,
    /// Junction deviation (cornering tolerance) [mm].
    #[serde(default = "default_junction_deviation")]
    pub junction_deviation: f64,
    /// Rotary radius for radius-mode conversion [mm].
    #[serde(default)]
    pub radius: f64,
    /// Function of the minimum-end switch input.
    #[serde(default = "default_switch_min")]
    pub switch_min: SwitchMode,
    /// Function of the maximum-end switch input.
    #[serde(default)]
    pub switch_max: SwitchMode,
    /// Homing search velocity [mm/min]. Zero skips the axis.
    #[serde(default = "default_search_velocity")]
    pub search_velocity: f64,
    /// Homing latch velocity [mm/min].
    #[serde(default = "default_latch_velocity")]
    pub latch_velocity: f64,
    /// Backoff distance before the latch re-approach [mm].
    #[serde(default = "default_latch_backoff")]
    pub latch_backoff: f64,
    /// Final backoff from the switch that becomes zero [mm].
    #[serde(default = "default_zero_backoff")]
    pub zero_backoff: f64,
}

fn default_velocity() -> f64 {
    16_000.0
}
fn default_travel() -> f64 {
    420.0
}
fn default_jerk() -> f64 {
    50.0
}
fn default_jerk_homing() -> f64 {
    100.0
}
fn default_junction_deviation() -> f64 {
    0.05
}
fn default_switch_min() -> SwitchMode {
    SwitchMode::Homing
}
fn default_search_velocity() -> f64 {
    3_000.0
}
fn default_latch_velocity() -> f64 {
    100.0
}
fn default_latch_backoff() -> f64 {
    5.0
}
fn default_zero_backoff() -> f64 {
    1.0
}

impl Default for AxisConfig {
    fn default() -> Self {
        Self {
            mode: AxisMode::Standard,
            feedrate_max: default_velocity(),
            velocity_max: default_velocity(),
            travel_max: default_travel(),
            jerk_max: default_jerk(),
            jerk_homing: default_jerk_homing(),
            junction_deviation: default_junction_deviation(),
            radius: 0.0,
            switch_min: default_switch_min(),
            switch_max: SwitchMode::default(),
            search_velocity: default_search_velocity(),
            latch_velocity: default_latch_velocity(),
            latch_backoff: default_latch_backoff(),
            zero_backoff: default_zero_backoff(),
        }
    }
}

impl AxisConfig {
    /// Jerk in raw mm/min³.
    #[inline]
    pub fn jerk_max_expanded(&self) -> f64 {
        self.jerk_max * JERK_MULTIPLIER
    }

    /// Homing jerk in raw mm/min³.
    #[inline]
    pub fn jerk_homing_expanded(&self) -> f64 {
        self.jerk_homing * JERK_MULTIPLIER
    }

    /// Whether this axis takes part in the homing cycle.
    #[inline]
    pub fn homes(&self) -> bool {
        self.mode.is_active() && self.search_velocity > 0.0 && self.switch_min.homes()
    }

    /// Validate parameter bounds for one axis.
    pub fn validate(&self, axis: Axis) -> Result<(), String> {
        if !self.mode.is_active() {
            return Ok(());
        }
        let letter = axis.letter();
        if self.velocity_max <= 0.0 {
            return Err(format!("{letter}: velocity_max must be positive"));
        }
        if self.feedrate_max <= 0.0 {
            return Err(format!("{letter}: feedrate_max must be positive"));
        }
        if self.travel_max <= 0.0 {
            return Err(format!("{letter}: travel_max must be positive"));
        }
        if self.jerk_max <= 0.0 {
            return Err(format!("{letter}: jerk_max must be positive"));
        }
        if self.junction_deviation <= 0.0 || self.junction_deviation > 10.0 {
            return Err(format!(
                "{letter}: junction_deviation {} out of range (0, 10]",
                self.junction_deviation
            ));
        }
        if matches!(self.mode, AxisMode::Radius) && self.radius <= 0.0 {
            return Err(format!("{letter}: radius mode requires a positive radius"));
        }
        if self.search_velocity < 0.0 || self.latch_velocity < 0.0 {
            return Err(format!("{letter}: homing velocities must not be negative"));
        }
        if self.search_velocity > 0.0 && self.latch_velocity > self.search_velocity {
            return Err(format!(
                "{letter}: latch_velocity {} exceeds search_velocity {}",
                self.latch_velocity, self.search_velocity
            ));
        }
        Ok(())
    }
}

// ─── System Configuration ───────────────────────────────────────────

/// System-wide motion parameters and override clamps.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SystemConfig {
    /// Centripetal acceleration budget for cornering [mm/min²].
    #[serde(default = "default_junction_acceleration")]
    pub junction_acceleration: f64,
    /// Maximum chord-to-arc deviation for arc segmentation [mm].
    #[serde(default = "default_chordal_tolerance")]
    pub chordal_tolerance: f64,
    /// Minimum arc segment length [mm].
    #[serde(default = "default_min_segment_len")]
    pub min_segment_len: f64,
    /// Feed/traverse override clamp, low end.
    #[serde(default = "default_override_min")]
    pub feed_override_min: f64,
    /// Feed/traverse override clamp, high end.
    #[serde(default = "default_override_max")]
    pub feed_override_max: f64,
    /// Spindle override clamp, low end.
    #[serde(default = "default_spindle_override_min")]
    pub spindle_override_min: f64,
    /// Spindle override clamp, high end.
    #[serde(default = "default_spindle_override_max")]
    pub spindle_override_max: f64,
}

fn default_junction_acceleration() -> f64 {
    JUNCTION_ACCELERATION_DEFAULT
}
fn default_chordal_tolerance() -> f64 {
    CHORDAL_TOLERANCE_DEFAULT
}
fn default_min_segment_len() -> f64 {
    MIN_SEGMENT_LEN_DEFAULT
}
fn default_override_min() -> f64 {
    OVERRIDE_FACTOR_MIN
}
fn default_override_max() -> f64 {
    OVERRIDE_FACTOR_MAX
}
fn default_spindle_override_min() -> f64 {
    SPINDLE_OVERRIDE_MIN
}
fn default_spindle_override_max() -> f64 {
    SPINDLE_OVERRIDE_MAX
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            junction_acceleration: default_junction_acceleration(),
            chordal_tolerance: default_chordal_tolerance(),
            min_segment_len: default_min_segment_len(),
            feed_override_min: default_override_min(),
            feed_override_max: default_override_max(),
            spindle_override_min: default_spindle_override_min(),
            spindle_override_max: default_spindle_override_max(),
        }
    }
}

impl SystemConfig {
    /// Validate parameter bounds.
    pub fn validate(&self) -> Result<(), String> {
        if self.junction_acceleration <= 0.0 {
            return Err("junction_acceleration must be positive".into());
        }
        if self.chordal_tolerance <= 0.0 {
            return Err("chordal_tolerance must be positive".into());
        }
        if self.min_segment_len <= 0.0 {
            return Err("min_segment_len must be positive".into());
        }
        if self.feed_override_min <= 0.0 || self.feed_override_min >= self.feed_override_max {
            return Err(format!(
                "feed override clamp [{}, {}] is not an interval above zero",
                self.feed_override_min, self.feed_override_max
            ));
        }
        if self.spindle_override_min <= 0.0
            || self.spindle_override_min >= self.spindle_override_max
        {
            return Err(format!(
                "spindle override clamp [{}, {}] is not an interval above zero",
                self.spindle_override_min, self.spindle_override_max
            ));
        }
        Ok(())
    }
}

// ─── Power-On Defaults ──────────────────────────────────────────────

/// Modal defaults applied at init and at program end.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PowerOnDefaults {
    #[serde(default)]
    pub units: Units,
    #[serde(default)]
    pub coord_system: CoordinateSystem,
    #[serde(default)]
    pub plane: Plane,
    #[serde(default)]
    pub distance_mode: DistanceMode,
    #[serde(default)]
    pub path_control: PathControl,
}

// ─── Machine Configuration ──────────────────────────────────────────

/// Complete machine configuration: system parameters, power-on
/// defaults, and one entry per axis in canonical order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MachineConfig {
    #[serde(default)]
    pub system: SystemConfig,
    #[serde(default)]
    pub defaults: PowerOnDefaults,
    #[serde(default = "default_axes")]
    pub axes: [AxisConfig; AXIS_COUNT],
}

fn default_axes() -> [AxisConfig; AXIS_COUNT] {
    let mut axes = [AxisConfig::default(); AXIS_COUNT];
    // Z is the short, slow axis on the default profile.
    axes[Axis::Z as usize].velocity_max = 1_200.0;
    axes[Axis::Z as usize].feedrate_max = 1_200.0;
    axes[Axis::Z as usize].travel_max = 250.0;
    axes[Axis::Z as usize].search_velocity = 600.0;
    // One rotary axis enabled by default.
    axes[Axis::A as usize].travel_max = 400.0;
    axes[Axis::A as usize].jerk_max = 500.0;
    axes[Axis::A as usize].search_velocity = 600.0;
    axes[Axis::B as usize].mode = AxisMode::Disabled;
    axes[Axis::C as usize].mode = AxisMode::Disabled;
    axes
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            system: SystemConfig::default(),
            defaults: PowerOnDefaults::default(),
            axes: default_axes(),
        }
    }
}

impl MachineConfig {
    /// Parse from a TOML string and validate.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate().map_err(ConfigError::Validation)?;
        Ok(config)
    }

    /// Load from a TOML file and validate.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("failed to read {}: {e}", path.display())))?;
        Self::from_toml(&text)
    }

    /// Validate all parameter bounds.
    pub fn validate(&self) -> Result<(), String> {
        self.system.validate()?;
        for axis in Axis::ALL {
            self.axes[axis as usize].validate(axis)?;
        }
        Ok(())
    }

    /// Config row for one axis.
    #[inline]
    pub fn axis(&self, axis: Axis) -> &AxisConfig {
        &self.axes[axis as usize]
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let config = MachineConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn toml_roundtrip() {
        let config = MachineConfig::default();
        let text = toml::to_string(&config).unwrap();
        let reloaded = MachineConfig::from_toml(&text).unwrap();
        assert_eq!(
            reloaded.axes[Axis::Z as usize].travel_max,
            config.axes[Axis::Z as usize].travel_max
        );
        assert_eq!(reloaded.system.chordal_tolerance, config.system.chordal_tolerance);
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("machine.toml");
        std::fs::write(&path, toml::to_string(&MachineConfig::default()).unwrap()).unwrap();
        let config = MachineConfig::load(&path).unwrap();
        assert_eq!(config.axes[0].velocity_max, 16_000.0);

        let missing = MachineConfig::load(&dir.path().join("nope.toml"));
        assert!(matches!(missing, Err(ConfigError::Io(_))));
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config = MachineConfig::from_toml(
            r#"
[system]
chordal_tolerance = 0.02
"#,
        )
        .unwrap();
        assert_eq!(config.system.chordal_tolerance, 0.02);
        assert_eq!(config.system.min_segment_len, MIN_SEGMENT_LEN_DEFAULT);
        assert_eq!(config.axes[0].velocity_max, 16_000.0);
    }

    #[test]
    fn jerk_expansion() {
        let config = AxisConfig::default();
        assert_eq!(config.jerk_max_expanded(), 50.0 * JERK_MULTIPLIER);
        assert_eq!(config.jerk_homing_expanded(), 100.0 * JERK_MULTIPLIER);
    }

    #[test]
    fn rejects_zero_velocity() {
        let mut config = MachineConfig::default();
        config.axes[0].velocity_max = 0.0;
        let err = config.validate().unwrap_err();
        assert!(err.contains("velocity_max"));
    }

    #[test]
    fn rejects_radius_mode_without_radius() {
        let mut config = MachineConfig::default();
        config.axes[Axis::A as usize].mode = AxisMode::Radius;
        assert!(config.validate().is_err());
        config.axes[Axis::A as usize].radius = 30.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_inverted_override_clamp() {
        let mut config = MachineConfig::default();
        config.system.feed_override_min = 3.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn disabled_axis_skips_bounds() {
        let mut config = MachineConfig::default();
        config.axes[Axis::B as usize].velocity_max = 0.0; // already disabled
        assert!(config.validate().is_ok());
    }

    #[test]
    fn homing_participation() {
        let mut config = AxisConfig::default();
        assert!(config.homes());
        config.search_velocity = 0.0;
        assert!(!config.homes());
        config.search_velocity = 1_000.0;
        config.mode = AxisMode::Disabled;
        assert!(!config.homes());
        config.mode = AxisMode::Standard;
        config.switch_min = SwitchMode::Limit;
        assert!(!config.homes());
    }

    #[test]
    fn switch_mode_roundtrip() {
        for v in 0..=3u8 {
            let mode = SwitchMode::from_u8(v).unwrap();
            assert_eq!(mode as u8, v);
        }
        assert!(SwitchMode::from_u8(4).is_none());
        assert!(SwitchMode::Homing.homes());
        assert!(SwitchMode::HomingAndLimit.homes());
        assert!(!SwitchMode::Limit.homes());
    }
}
