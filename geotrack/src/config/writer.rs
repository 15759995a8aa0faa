//! INI serialization logic for converting `ConfigFile` → INI string.
//!
//! This module contains the `to_config_string()` function that produces
//! the commented INI representation written to `config.ini`.

use std::path::Path;
use std::time::Duration;

use super::settings::ConfigFile;

/// Convert a `ConfigFile` to a commented INI string for saving.
pub(super) fn to_config_string(config: &ConfigFile) -> String {
    let tracking = &config.tracking;
    let gate = &config.gate;
    let smoothing = &config.smoothing;
    let snapper = &config.snapper;
    let simulator = &config.simulator;
    let logging = &config.logging;

    format!(
        r#"[tracking]
; Seconds between gated position updates (minimum 1)
poll_interval_secs = {}
; Rate at which the raw fix is republished, in Hz (minimum 1)
raw_refresh_hz = {}
; Map north onto world X and east onto world Z
swap_axes = {}
; Turn the agent towards each accepted target
face_direction = {}
; Seconds allowed for the source to start and deliver a first fix
acquire_timeout_secs = {}

[gate]
; Fixes at least this accurate (meters) are always accepted
trust_accuracy_meters = {}
; Smallest movement (meters) accepted from a less accurate fix
min_movement_meters = {}
; Movement must also exceed accuracy times this factor (1.0 - 3.0)
accuracy_multiplier = {}

[smoothing]
; Animate accepted moves instead of teleporting
enabled = {}
; Seconds each animated move takes (minimum 0.1)
duration_secs = {}

[snapper]
; Snap accepted targets onto the nearest path
enabled = {}
; Only fixes with accuracy inside this band (meters) are snapped
min_accuracy_meters = {}
max_accuracy_meters = {}
; Farthest a target may be moved by snapping (meters)
max_snap_distance_meters = {}

[simulator]
; Start coordinate of the simulated walker (decimal degrees)
start_latitude = {}
start_longitude = {}
; Constant walking velocity (meters per second)
north_meters_per_sec = {}
east_meters_per_sec = {}
; Accuracy reported with every simulated fix (meters)
accuracy_meters = {}

[logging]
; Directory and file name of the session log (cleared on each run)
directory = {}
file = {}
"#,
        secs(tracking.poll_interval),
        tracking.raw_refresh_hz,
        tracking.swap_axes,
        tracking.face_direction,
        secs(tracking.acquire_timeout),
        gate.trust_accuracy_meters,
        gate.min_movement_meters,
        gate.accuracy_multiplier,
        smoothing.enabled,
        secs(smoothing.duration),
        snapper.enabled,
        snapper.min_accuracy_meters,
        snapper.max_accuracy_meters,
        snapper.max_snap_distance_meters,
        simulator.start_latitude,
        simulator.start_longitude,
        simulator.north_meters_per_sec,
        simulator.east_meters_per_sec,
        simulator.accuracy_meters,
        path_to_string(&logging.directory),
        logging.file,
    )
}

fn secs(duration: Duration) -> f64 {
    duration.as_secs_f64()
}

fn path_to_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
