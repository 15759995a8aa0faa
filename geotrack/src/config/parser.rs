//! INI parsing logic for converting `Ini` → `ConfigFile`.
//!
//! This module contains the `parse_ini()` function and its helpers.
//! It is the single place where INI key names are mapped to struct fields.

use std::path::PathBuf;
use std::time::Duration;

use ini::Ini;

use super::defaults::clamp_snap_band;
use super::file::ConfigFileError;
use super::settings::ConfigFile;
use crate::tracking::gate::clamp_accuracy_multiplier;
use crate::tracking::tracker::{
    clamp_acquire_timeout, clamp_poll_interval, clamp_raw_refresh_hz, clamp_smoothing_duration,
};

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found in the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [tracking] section
    if let Some(section) = ini.section(Some("tracking")) {
        if let Some(v) = section.get("poll_interval_secs") {
            config.tracking.poll_interval =
                clamp_poll_interval(parse_secs("tracking", "poll_interval_secs", v)?);
        }
        if let Some(v) = section.get("raw_refresh_hz") {
            config.tracking.raw_refresh_hz =
                clamp_raw_refresh_hz(parse_f64("tracking", "raw_refresh_hz", v)?);
        }
        if let Some(v) = section.get("swap_axes") {
            config.tracking.swap_axes = parse_bool(v);
        }
        if let Some(v) = section.get("face_direction") {
            config.tracking.face_direction = parse_bool(v);
        }
        if let Some(v) = section.get("acquire_timeout_secs") {
            config.tracking.acquire_timeout =
                clamp_acquire_timeout(parse_secs("tracking", "acquire_timeout_secs", v)?);
        }
    }

    // [gate] section
    if let Some(section) = ini.section(Some("gate")) {
        if let Some(v) = section.get("trust_accuracy_meters") {
            config.gate.trust_accuracy_meters =
                parse_non_negative("gate", "trust_accuracy_meters", v)?;
        }
        if let Some(v) = section.get("min_movement_meters") {
            config.gate.min_movement_meters =
                parse_non_negative("gate", "min_movement_meters", v)?;
        }
        if let Some(v) = section.get("accuracy_multiplier") {
            config.gate.accuracy_multiplier =
                clamp_accuracy_multiplier(parse_f64("gate", "accuracy_multiplier", v)?);
        }
    }

    // [smoothing] section
    if let Some(section) = ini.section(Some("smoothing")) {
        if let Some(v) = section.get("enabled") {
            config.smoothing.enabled = parse_bool(v);
        }
        if let Some(v) = section.get("duration_secs") {
            config.smoothing.duration =
                clamp_smoothing_duration(parse_secs("smoothing", "duration_secs", v)?);
        }
    }

    // [snapper] section
    if let Some(section) = ini.section(Some("snapper")) {
        if let Some(v) = section.get("enabled") {
            config.snapper.enabled = parse_bool(v);
        }
        if let Some(v) = section.get("min_accuracy_meters") {
            config.snapper.min_accuracy_meters =
                parse_non_negative("snapper", "min_accuracy_meters", v)?;
        }
        if let Some(v) = section.get("max_accuracy_meters") {
            config.snapper.max_accuracy_meters =
                parse_non_negative("snapper", "max_accuracy_meters", v)?;
        }
        if let Some(v) = section.get("max_snap_distance_meters") {
            config.snapper.max_snap_distance_meters =
                parse_non_negative("snapper", "max_snap_distance_meters", v)? as f32;
        }
        let (min, max) = clamp_snap_band(
            config.snapper.min_accuracy_meters,
            config.snapper.max_accuracy_meters,
        );
        config.snapper.min_accuracy_meters = min;
        config.snapper.max_accuracy_meters = max;
    }

    // [simulator] section
    if let Some(section) = ini.section(Some("simulator")) {
        if let Some(v) = section.get("start_latitude") {
            let latitude = parse_f64("simulator", "start_latitude", v)?;
            if !(-90.0..=90.0).contains(&latitude) {
                return Err(invalid(
                    "simulator",
                    "start_latitude",
                    v,
                    "must be between -90 and 90",
                ));
            }
            config.simulator.start_latitude = latitude;
        }
        if let Some(v) = section.get("start_longitude") {
            let longitude = parse_f64("simulator", "start_longitude", v)?;
            if !(-180.0..=180.0).contains(&longitude) {
                return Err(invalid(
                    "simulator",
                    "start_longitude",
                    v,
                    "must be between -180 and 180",
                ));
            }
            config.simulator.start_longitude = longitude;
        }
        if let Some(v) = section.get("north_meters_per_sec") {
            config.simulator.north_meters_per_sec =
                parse_f64("simulator", "north_meters_per_sec", v)?;
        }
        if let Some(v) = section.get("east_meters_per_sec") {
            config.simulator.east_meters_per_sec =
                parse_f64("simulator", "east_meters_per_sec", v)?;
        }
        if let Some(v) = section.get("accuracy_meters") {
            config.simulator.accuracy_meters =
                parse_non_negative("simulator", "accuracy_meters", v)?;
        }
    }

    // [logging] section
    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = section.get("directory") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.directory = expand_tilde(v);
            }
        }
        if let Some(v) = section.get("file") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.file = v.to_string();
            }
        }
    }

    Ok(config)
}

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Parse a finite floating point value.
fn parse_f64(section: &str, key: &str, value: &str) -> Result<f64, ConfigFileError> {
    match value.trim().parse::<f64>() {
        Ok(parsed) if parsed.is_finite() => Ok(parsed),
        _ => Err(invalid(section, key, value, "must be a number")),
    }
}

fn parse_non_negative(section: &str, key: &str, value: &str) -> Result<f64, ConfigFileError> {
    let parsed = parse_f64(section, key, value)?;
    if parsed < 0.0 {
        return Err(invalid(section, key, value, "must not be negative"));
    }
    Ok(parsed)
}

/// Parse a duration given in (possibly fractional) seconds.
fn parse_secs(section: &str, key: &str, value: &str) -> Result<Duration, ConfigFileError> {
    let secs = parse_f64(section, key, value)?;
    Duration::try_from_secs_f64(secs)
        .map_err(|_| invalid(section, key, value, "must be a non-negative number of seconds"))
}

pub(super) fn parse_bool(value: &str) -> bool {
    let v = value.trim().to_lowercase();
    v == "true" || v == "1" || v == "yes" || v == "on"
}

/// Expand ~ to home directory in paths.
pub(super) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::gate::MAX_ACCURACY_MULTIPLIER;
    use crate::tracking::tracker::{MIN_POLL_INTERVAL, MIN_RAW_REFRESH_HZ};
    use tempfile::TempDir;

    fn load(content: &str) -> Result<ConfigFile, ConfigFileError> {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.ini");
        std::fs::write(&config_path, content).unwrap();
        ConfigFile::load_from(&config_path)
    }

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = load("").unwrap();
        assert_eq!(config, ConfigFile::default());
    }

    #[test]
    fn test_tracking_section() {
        let config = load(
            r#"
[tracking]
poll_interval_secs = 2.5
raw_refresh_hz = 10
swap_axes = true
face_direction = no
acquire_timeout_secs = 30
"#,
        )
        .unwrap();

        assert_eq!(config.tracking.poll_interval, Duration::from_millis(2500));
        assert_eq!(config.tracking.raw_refresh_hz, 10.0);
        assert!(config.tracking.swap_axes);
        assert!(!config.tracking.face_direction);
        assert_eq!(config.tracking.acquire_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_gate_and_smoothing_sections() {
        let config = load(
            r#"
[gate]
trust_accuracy_meters = 6
min_movement_meters = 12.5
accuracy_multiplier = 2

[smoothing]
enabled = false
duration_secs = 0.5
"#,
        )
        .unwrap();

        assert_eq!(config.gate.trust_accuracy_meters, 6.0);
        assert_eq!(config.gate.min_movement_meters, 12.5);
        assert_eq!(config.gate.accuracy_multiplier, 2.0);
        assert!(!config.smoothing.enabled);
        assert_eq!(config.smoothing.duration, Duration::from_millis(500));
    }

    #[test]
    fn test_small_values_are_clamped() {
        let config = load(
            r#"
[tracking]
poll_interval_secs = 0.2
raw_refresh_hz = 0.1

[gate]
accuracy_multiplier = 7

[smoothing]
duration_secs = 0.01
"#,
        )
        .unwrap();

        assert_eq!(config.tracking.poll_interval, MIN_POLL_INTERVAL);
        assert_eq!(config.tracking.raw_refresh_hz, MIN_RAW_REFRESH_HZ);
        assert_eq!(config.gate.accuracy_multiplier, MAX_ACCURACY_MULTIPLIER);
        assert_eq!(config.smoothing.duration, Duration::from_millis(100));
    }

    #[test]
    fn test_inverted_snap_band_is_reordered() {
        let config = load(
            r#"
[snapper]
enabled = true
min_accuracy_meters = 25
max_accuracy_meters = 10
max_snap_distance_meters = 3
"#,
        )
        .unwrap();

        assert!(config.snapper.enabled);
        assert_eq!(config.snapper.min_accuracy_meters, 10.0);
        assert_eq!(config.snapper.max_accuracy_meters, 25.0);
        assert_eq!(config.snapper.max_snap_distance_meters, 3.0);
    }

    #[test]
    fn test_invalid_number() {
        let err = load(
            r#"
[gate]
min_movement_meters = far
"#,
        )
        .unwrap_err();

        assert!(err.to_string().contains("gate.min_movement_meters"));
        assert!(err.to_string().contains("must be a number"));
    }

    #[test]
    fn test_negative_values_rejected() {
        let err = load(
            r#"
[tracking]
poll_interval_secs = -3
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("poll_interval_secs"));

        let err = load(
            r#"
[gate]
trust_accuracy_meters = -1
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("must not be negative"));
    }

    #[test]
    fn test_non_finite_rejected() {
        let err = load(
            r#"
[tracking]
raw_refresh_hz = NaN
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("raw_refresh_hz"));
    }

    #[test]
    fn test_latitude_out_of_range() {
        let err = load(
            r#"
[simulator]
start_latitude = 91
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("between -90 and 90"));
    }

    #[test]
    fn test_logging_section() {
        let config = load(
            r#"
[logging]
directory = /var/log/geotrack
file = walk.log
"#,
        )
        .unwrap();

        assert_eq!(config.logging.directory, PathBuf::from("/var/log/geotrack"));
        assert_eq!(config.logging.file, "walk.log");
    }

    #[test]
    fn test_parse_bool_variants() {
        assert!(parse_bool("true"));
        assert!(parse_bool(" YES "));
        assert!(parse_bool("1"));
        assert!(parse_bool("on"));
        assert!(!parse_bool("false"));
        assert!(!parse_bool("off"));
        assert!(!parse_bool(""));
    }

    #[test]
    fn test_expand_tilde() {
        let expanded = expand_tilde("~/logs");
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expanded, home.join("logs"));
        }
        assert_eq!(expand_tilde("/tmp/logs"), PathBuf::from("/tmp/logs"));
    }
}
