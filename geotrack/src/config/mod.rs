//! User configuration for geotrack.
//!
//! The configuration lives in `~/.geotrack/config.ini` and is split the
//! same way as the file on disk:
//!
//! - **settings** - one plain struct per `[section]`
//! - **defaults** - default values and clamp helpers
//! - **parser** / **writer** - INI to `ConfigFile` and back
//! - **file** - load, save and the conversion into runtime configs
//!
//! # Example
//!
//! ```no_run
//! use geotrack::config::ConfigFile;
//!
//! let config = ConfigFile::load()?;
//! let tracker_config = config.to_tracker_config();
//! # Ok::<(), geotrack::config::ConfigFileError>(())
//! ```

mod defaults;
mod file;
mod parser;
mod settings;
mod writer;

pub use file::{
    clamp_snap_band, config_directory, config_file_path, ConfigFile, ConfigFileError, GateSettings,
    LoggingSettings, SimulatorSettings, SmoothingSettings, SnapperSettings, TrackingSettings,
    DEFAULT_FACE_DIRECTION, DEFAULT_SMOOTHING_ENABLED, DEFAULT_SNAPPER_ENABLED, DEFAULT_SWAP_AXES,
};
