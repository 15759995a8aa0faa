//! Configuration file handling for ~/.geotrack/config.ini.
//!
//! Loads and saves user configuration with sensible defaults.
//! Settings structs live in [`super::settings`], constants in [`super::defaults`],
//! parsing in [`super::parser`], and serialization in [`super::writer`].

use std::path::{Path, PathBuf};

use ini::Ini;
use thiserror::Error;

pub use super::defaults::*;
pub use super::settings::*;

use crate::tracking::{GateConfig, SimulatorConfig, SnapperConfig, TrackerConfig};

/// Configuration file errors.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] ini::Error),

    /// Failed to write config file
    #[error("Failed to write config file: {0}")]
    WriteError(String),

    /// Invalid configuration value
    #[error("Invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },

    /// Failed to create config directory
    #[error("Failed to create config directory: {0}")]
    DirectoryError(std::io::Error),
}

impl ConfigFile {
    /// Load configuration from the default path (~/.geotrack/config.ini).
    ///
    /// If the file doesn't exist, returns defaults.
    pub fn load() -> Result<Self, ConfigFileError> {
        let path = config_file_path();
        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    ///
    /// If the file doesn't exist, returns defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigFileError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let ini = Ini::load_from_file(path)?;
        super::parser::parse_ini(&ini)
    }

    /// Save configuration to the default path (~/.geotrack/config.ini).
    pub fn save(&self) -> Result<(), ConfigFileError> {
        let path = config_file_path();
        self.save_to(&path)
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigFileError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ConfigFileError::DirectoryError)?;
        }

        std::fs::write(path, self.to_ini_string())
            .map_err(|e| ConfigFileError::WriteError(e.to_string()))
    }

    /// The commented INI text `save_to` would write.
    pub fn to_ini_string(&self) -> String {
        super::writer::to_config_string(self)
    }

    /// Create the default config file if it doesn't exist.
    ///
    /// Returns the path to the config file.
    pub fn ensure_exists() -> Result<PathBuf, ConfigFileError> {
        let path = config_file_path();
        Self::ensure_exists_at(&path)?;
        Ok(path)
    }

    /// Write defaults to `path` unless a file is already there.
    ///
    /// Returns `true` if a new file was written.
    pub fn ensure_exists_at(path: &Path) -> Result<bool, ConfigFileError> {
        if path.exists() {
            return Ok(false);
        }
        Self::default().save_to(path)?;
        Ok(true)
    }

    /// Runtime tracker configuration described by this file.
    pub fn to_tracker_config(&self) -> TrackerConfig {
        TrackerConfig::new()
            .with_poll_interval(self.tracking.poll_interval)
            .with_raw_refresh_hz(self.tracking.raw_refresh_hz)
            .with_swap_axes(self.tracking.swap_axes)
            .with_face_direction(self.tracking.face_direction)
            .with_acquire_timeout(self.tracking.acquire_timeout)
            .with_gate(GateConfig::new(
                self.gate.trust_accuracy_meters,
                self.gate.min_movement_meters,
                self.gate.accuracy_multiplier,
            ))
            .with_smoothing(self.smoothing.enabled)
            .with_smoothing_duration(self.smoothing.duration)
    }

    /// Snapping band, or `None` when snapping is disabled.
    pub fn snapper_config(&self) -> Option<SnapperConfig> {
        if !self.snapper.enabled {
            return None;
        }
        Some(SnapperConfig {
            min_accuracy_meters: self.snapper.min_accuracy_meters,
            max_accuracy_meters: self.snapper.max_accuracy_meters,
            max_snap_distance_meters: self.snapper.max_snap_distance_meters,
        })
    }

    pub fn simulator_config(&self) -> SimulatorConfig {
        SimulatorConfig {
            start_latitude: self.simulator.start_latitude,
            start_longitude: self.simulator.start_longitude,
            north_meters_per_sec: self.simulator.north_meters_per_sec,
            east_meters_per_sec: self.simulator.east_meters_per_sec,
            accuracy_meters: self.simulator.accuracy_meters,
            ..SimulatorConfig::default()
        }
    }
}

/// Get the path to the config directory (~/.geotrack).
pub fn config_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".geotrack")
}

/// Get the path to the config file (~/.geotrack/config.ini).
pub fn config_file_path() -> PathBuf {
    config_directory().join("config.ini")
}
