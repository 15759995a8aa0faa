//! Configuration management CLI commands.
//!
//! Provides `config init`, `config show` and `config path` for creating and
//! inspecting `~/.geotrack/config.ini`.

use std::path::{Path, PathBuf};

use clap::Subcommand;
use geotrack::config::{config_file_path, ConfigFile};

use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Write a config file with default values
    Init {
        /// Where to write the file (defaults to ~/.geotrack/config.ini)
        #[arg(long)]
        file: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the effective configuration
    ///
    /// Values are shown after defaults are applied and out-of-range values
    /// are clamped.
    Show {
        /// Config file to read (defaults to ~/.geotrack/config.ini)
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Show the configuration file path
    Path,
}

/// Run a config subcommand.
pub fn run(command: ConfigCommands) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init { file, force } => run_init(&resolve(file), force),
        ConfigCommands::Show { file } => run_show(&resolve(file)),
        ConfigCommands::Path => run_path(),
    }
}

fn resolve(file: Option<PathBuf>) -> PathBuf {
    file.unwrap_or_else(config_file_path)
}

/// Write defaults to `path`.
fn run_init(path: &Path, force: bool) -> Result<(), CliError> {
    if force {
        ConfigFile::default().save_to(path)?;
        println!("Wrote default configuration to {}", path.display());
        return Ok(());
    }

    if ConfigFile::ensure_exists_at(path)? {
        println!("Created {}", path.display());
    } else {
        println!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }
    Ok(())
}

/// Print the effective configuration.
fn run_show(path: &Path) -> Result<(), CliError> {
    let config = ConfigFile::load_from(path)?;

    if path.exists() {
        println!("; Loaded from {}", path.display());
    } else {
        println!("; {} not found, showing defaults", path.display());
    }
    println!();
    print!("{}", config.to_ini_string());

    Ok(())
}

/// Show the configuration file path.
fn run_path() -> Result<(), CliError> {
    println!("{}", config_file_path().display());
    Ok(())
}
