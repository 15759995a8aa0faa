//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and appropriate exit codes.

use std::fmt;
use std::path::PathBuf;
use std::process;

use geotrack::config::ConfigFileError;
use geotrack::tracking::{ReplayError, TrackingError};

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration error
    Config(String),
    /// Config file could not be read or written
    ConfigFile(ConfigFileError),
    /// Replay track could not be loaded
    Replay { path: PathBuf, error: ReplayError },
    /// Tracker failed to reach the running state
    Tracking(TrackingError),
    /// Failed to build the async runtime
    Runtime(std::io::Error),
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        // Print additional help for specific errors
        match self {
            CliError::ConfigFile(ConfigFileError::InvalidValue { .. }) => {
                eprintln!();
                eprintln!("Fix the value in the config file, or regenerate it with:");
                eprintln!("  geotrack config init --force");
            }
            CliError::Replay { .. } => {
                eprintln!();
                eprintln!("A replay file is a JSON array of samples, for example:");
                eprintln!(
                    r#"  [{{"latitude": 38.4237, "longitude": 27.1428, "accuracy": 5.0, "timestamp": 0.0}}]"#
                );
            }
            _ => {}
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::ConfigFile(e) => write!(f, "{}", e),
            CliError::Replay { path, error } => {
                write!(f, "Failed to load replay '{}': {}", path.display(), error)
            }
            CliError::Tracking(e) => write!(f, "Tracking failed: {}", e),
            CliError::Runtime(e) => write!(f, "Failed to start async runtime: {}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::ConfigFile(e) => Some(e),
            CliError::Replay { error, .. } => Some(error),
            CliError::Tracking(e) => Some(e),
            CliError::Runtime(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::ConfigFile(e)
    }
}

impl From<TrackingError> for CliError {
    fn from(e: TrackingError) -> Self {
        CliError::Tracking(e)
    }
}
