//! geotrack - GPS position tracking for a single agent
//!
//! This library turns a noisy stream of geodetic fixes into a filtered,
//! smoothed world-space position. Samples are projected onto a local tangent
//! plane around an anchor, passed through a jitter gate, optionally snapped
//! onto a path network, and animated rather than teleported.
//!
//! # High-Level API
//!
//! ```ignore
//! use geotrack::tracking::{PositionTracker, SimulatedSource, TrackerConfig};
//!
//! let tracker = PositionTracker::new(SimulatedSource::default(), TrackerConfig::default());
//! tracker.start();
//! tracker.wait_for_running(std::time::Duration::from_secs(20)).await?;
//!
//! let pose = tracker.pose();
//! println!("agent at {}", pose.position);
//!
//! tracker.stop();
//! ```
//!
//! # Modules
//!
//! - [`tracking`] - The tracking pipeline, sources, sinks and state machine
//! - [`config`] - INI configuration file at `~/.geotrack/config.ini`
//! - [`logging`] - File and console logging setup

pub mod config;
pub mod logging;
pub mod tracking;

/// Version of the geotrack library and CLI.
///
/// This is synchronized across all components in the workspace.
/// The version is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
