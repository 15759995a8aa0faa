//! Synthetic sample source.
//!
//! Walks a straight line from a start coordinate at a constant velocity.
//! Position is a function of time since `initialize`, so it does not matter
//! how often the tracker polls.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use super::lock_or_recover;
use super::projection::{offset_to_geodetic, PlanarOffset};
use super::sample::GeodeticSample;
use super::source::{SampleSource, SourceError};

/// Default start latitude (degrees).
pub const DEFAULT_START_LATITUDE: f64 = 38.4237;

/// Default start longitude (degrees).
pub const DEFAULT_START_LONGITUDE: f64 = 27.1428;

/// Default walking speed towards north (m/s).
pub const DEFAULT_NORTH_METERS_PER_SEC: f64 = 1.0;

/// Default accuracy reported with every fix (meters).
pub const DEFAULT_SIMULATED_ACCURACY_METERS: f64 = 20.0;

/// Configuration for [`SimulatedSource`].
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatorConfig {
    pub start_latitude: f64,
    pub start_longitude: f64,
    pub north_meters_per_sec: f64,
    pub east_meters_per_sec: f64,
    pub accuracy_meters: f64,

    /// Delay before `initialize` completes, mimicking a service warming up.
    pub startup_delay: Duration,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            start_latitude: DEFAULT_START_LATITUDE,
            start_longitude: DEFAULT_START_LONGITUDE,
            north_meters_per_sec: DEFAULT_NORTH_METERS_PER_SEC,
            east_meters_per_sec: 0.0,
            accuracy_meters: DEFAULT_SIMULATED_ACCURACY_METERS,
            startup_delay: Duration::ZERO,
        }
    }
}

/// A source that moves at constant velocity from a start coordinate.
pub struct SimulatedSource {
    config: SimulatorConfig,
    started: Mutex<Option<Instant>>,
}

impl SimulatedSource {
    pub fn new(config: SimulatorConfig) -> Self {
        Self {
            config,
            started: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    /// The fix this source reports `elapsed` after starting.
    pub fn sample_at(&self, elapsed: Duration) -> GeodeticSample {
        let secs = elapsed.as_secs_f64();
        let origin = GeodeticSample::new(
            self.config.start_latitude,
            self.config.start_longitude,
            self.config.accuracy_meters,
            0.0,
        );
        let offset = PlanarOffset::new(
            self.config.east_meters_per_sec * secs,
            self.config.north_meters_per_sec * secs,
        );
        let (latitude, longitude) = offset_to_geodetic(&origin, offset);

        GeodeticSample::new(latitude, longitude, self.config.accuracy_meters, secs)
    }
}

impl Default for SimulatedSource {
    fn default() -> Self {
        Self::new(SimulatorConfig::default())
    }
}

impl SampleSource for SimulatedSource {
    async fn initialize(&self) -> Result<(), SourceError> {
        if !self.config.startup_delay.is_zero() {
            tokio::time::sleep(self.config.startup_delay).await;
        }

        *lock_or_recover(&self.started) = Some(Instant::now());
        tracing::info!(
            lat = self.config.start_latitude,
            lon = self.config.start_longitude,
            north_mps = self.config.north_meters_per_sec,
            east_mps = self.config.east_meters_per_sec,
            "Simulated source started"
        );
        Ok(())
    }

    fn try_get_latest(&self) -> Option<GeodeticSample> {
        let started = (*lock_or_recover(&self.started))?;
        Some(self.sample_at(started.elapsed()))
    }

    fn shutdown(&self) {
        if lock_or_recover(&self.started).take().is_some() {
            tracing::info!("Simulated source stopped");
        }
    }
}
