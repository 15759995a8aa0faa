//! CLI runner for common setup.
//!
//! Encapsulates config loading and logging initialization so command
//! handlers start from a ready environment.

use std::path::Path;

use geotrack::config::ConfigFile;
use geotrack::logging::{init_logging, LoggingGuard};
use tracing::info;

use crate::error::CliError;

/// Runner that manages CLI lifecycle and common operations.
pub struct CliRunner {
    /// Logging guard - keeps logging active while runner exists
    logging_guard: LoggingGuard,
    /// Loaded configuration file
    config: ConfigFile,
}

impl CliRunner {
    /// Load the config (from `config_path` or the default location) and
    /// initialize logging.
    pub fn new(config_path: Option<&Path>) -> Result<Self, CliError> {
        // Missing files fall back to defaults
        let config = match config_path {
            Some(path) => ConfigFile::load_from(path)?,
            None => ConfigFile::load()?,
        };

        let logging_guard = init_logging(&config.logging.directory, &config.logging.file)
            .map_err(|e| CliError::LoggingInit(e.to_string()))?;

        Ok(Self {
            logging_guard,
            config,
        })
    }

    /// Get the loaded configuration.
    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    /// Log startup information for a command.
    pub fn log_startup(&self, command: &str) {
        info!("geotrack v{}", geotrack::VERSION);
        info!(
            log_file = %self.logging_guard.log_path().display(),
            "geotrack CLI: {} command",
            command
        );
    }
}
