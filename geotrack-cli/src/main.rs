//! geotrack CLI - Command-line interface
//!
//! Runs the position tracking pipeline against a simulated walker or a
//! recorded track and manages the config file.

mod commands;
mod error;
mod runner;

use clap::{Parser, Subcommand};

use commands::config::ConfigCommands;
use commands::run::RunArgs;
use error::CliError;

#[derive(Parser)]
#[command(name = "geotrack")]
#[command(version = geotrack::VERSION)]
#[command(about = "Filter and smooth GPS fixes into a stable agent position", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Track the simulated walker or a replayed track and print events
    Run(RunArgs),

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = dispatch(cli.command) {
        e.exit();
    }
}

fn dispatch(command: Commands) -> Result<(), CliError> {
    match command {
        Commands::Run(args) => commands::run::run(args),
        Commands::Config { command } => commands::config::run(command),
    }
}
