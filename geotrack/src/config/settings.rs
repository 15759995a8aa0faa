//! Settings structs for all configuration sections.
//!
//! Each struct represents one `[section]` of the INI config file.
//! These are pure data types with no parsing or serialization logic.

use std::path::PathBuf;
use std::time::Duration;

/// Complete application configuration loaded from config.ini.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigFile {
    /// Cadences, axes and acquisition
    pub tracking: TrackingSettings,
    /// Acceptance gate thresholds
    pub gate: GateSettings,
    /// Motion smoothing
    pub smoothing: SmoothingSettings,
    /// Optional surface snapping
    pub snapper: SnapperSettings,
    /// Synthetic source used by `geotrack run`
    pub simulator: SimulatorSettings,
    /// Log file location
    pub logging: LoggingSettings,
}

/// Tracker cadence and placement configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackingSettings {
    /// Slow-tick interval
    pub poll_interval: Duration,
    /// Fast raw refresh rate in Hz
    pub raw_refresh_hz: f64,
    /// Map north onto world X and east onto world Z
    pub swap_axes: bool,
    /// Turn the agent towards each accepted target
    pub face_direction: bool,
    /// Bound on source initialization plus first fix
    pub acquire_timeout: Duration,
}

/// Acceptance gate configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct GateSettings {
    pub trust_accuracy_meters: f64,
    pub min_movement_meters: f64,
    pub accuracy_multiplier: f64,
}

/// Motion smoothing configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct SmoothingSettings {
    pub enabled: bool,
    pub duration: Duration,
}

/// Surface snapping configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapperSettings {
    pub enabled: bool,
    /// Fixes more precise than this are not snapped
    pub min_accuracy_meters: f64,
    /// Fixes less precise than this are not snapped
    pub max_accuracy_meters: f64,
    /// Farthest a target may be moved by snapping
    pub max_snap_distance_meters: f32,
}

/// Simulated walker configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatorSettings {
    pub start_latitude: f64,
    pub start_longitude: f64,
    pub north_meters_per_sec: f64,
    pub east_meters_per_sec: f64,
    pub accuracy_meters: f64,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingSettings {
    /// Directory the log file is written to
    pub directory: PathBuf,
    /// Log file name inside `directory`
    pub file: String,
}
