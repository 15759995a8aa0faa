//! CLI command implementations.
//!
//! Each subcommand has its own module with argument definitions and handlers.
//!
//! # Command Modules
//!
//! - [`config`] - Configuration management (init, show, path)
//! - [`run`] - Main command (track the simulator or a replay)

pub mod config;
pub mod run;
