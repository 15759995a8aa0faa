//! Default values and constants for all configuration settings.
//!
//! Contains the `ConfigFile::default()` implementation and the clamp
//! helpers applied to values read from disk.

use std::path::PathBuf;

use super::settings::*;
use crate::logging::{default_log_dir, default_log_file};
use crate::tracking::gate::{
    DEFAULT_ACCURACY_MULTIPLIER, DEFAULT_MIN_MOVEMENT_METERS, DEFAULT_TRUST_ACCURACY_METERS,
};
use crate::tracking::simulator::{
    DEFAULT_NORTH_METERS_PER_SEC, DEFAULT_SIMULATED_ACCURACY_METERS, DEFAULT_START_LATITUDE,
    DEFAULT_START_LONGITUDE,
};
use crate::tracking::snapper::{
    DEFAULT_MAX_SNAP_ACCURACY_METERS, DEFAULT_MAX_SNAP_DISTANCE_METERS,
    DEFAULT_MIN_SNAP_ACCURACY_METERS,
};
use crate::tracking::tracker::{
    DEFAULT_ACQUIRE_TIMEOUT, DEFAULT_POLL_INTERVAL, DEFAULT_RAW_REFRESH_HZ,
    DEFAULT_SMOOTHING_DURATION,
};

/// Default for `[tracking] swap_axes`.
pub const DEFAULT_SWAP_AXES: bool = false;

/// Default for `[tracking] face_direction`.
pub const DEFAULT_FACE_DIRECTION: bool = true;

/// Default for `[smoothing] enabled`.
pub const DEFAULT_SMOOTHING_ENABLED: bool = true;

/// Default for `[snapper] enabled`.
pub const DEFAULT_SNAPPER_ENABLED: bool = false;

/// Orders the snapping band so that `min <= max`, logging a warning if swapped.
pub fn clamp_snap_band(min: f64, max: f64) -> (f64, f64) {
    if min > max {
        tracing::warn!(
            min_accuracy = min,
            max_accuracy = max,
            "snapper accuracy band inverted, swapping bounds"
        );
        (max, min)
    } else {
        (min, max)
    }
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            tracking: TrackingSettings {
                poll_interval: DEFAULT_POLL_INTERVAL,
                raw_refresh_hz: DEFAULT_RAW_REFRESH_HZ,
                swap_axes: DEFAULT_SWAP_AXES,
                face_direction: DEFAULT_FACE_DIRECTION,
                acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
            },
            gate: GateSettings {
                trust_accuracy_meters: DEFAULT_TRUST_ACCURACY_METERS,
                min_movement_meters: DEFAULT_MIN_MOVEMENT_METERS,
                accuracy_multiplier: DEFAULT_ACCURACY_MULTIPLIER,
            },
            smoothing: SmoothingSettings {
                enabled: DEFAULT_SMOOTHING_ENABLED,
                duration: DEFAULT_SMOOTHING_DURATION,
            },
            snapper: SnapperSettings {
                enabled: DEFAULT_SNAPPER_ENABLED,
                min_accuracy_meters: DEFAULT_MIN_SNAP_ACCURACY_METERS,
                max_accuracy_meters: DEFAULT_MAX_SNAP_ACCURACY_METERS,
                max_snap_distance_meters: DEFAULT_MAX_SNAP_DISTANCE_METERS,
            },
            simulator: SimulatorSettings {
                start_latitude: DEFAULT_START_LATITUDE,
                start_longitude: DEFAULT_START_LONGITUDE,
                north_meters_per_sec: DEFAULT_NORTH_METERS_PER_SEC,
                east_meters_per_sec: 0.0,
                accuracy_meters: DEFAULT_SIMULATED_ACCURACY_METERS,
            },
            logging: LoggingSettings {
                directory: PathBuf::from(default_log_dir()),
                file: default_log_file().to_string(),
            },
        }
    }
}
