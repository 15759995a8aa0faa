//! Recorded track playback.
//!
//! A replay file is a JSON array of [`GeodeticSample`]s. Timestamps are
//! interpreted relative to the first sample: after `initialize`, the source
//! reports the latest sample whose relative timestamp has elapsed, scaled by
//! the playback speed. Once the track ends the last sample is held.
//!
//! ```json
//! [
//!   { "latitude": 38.4237,  "longitude": 27.1428, "accuracy": 2.0, "timestamp": 0.0 },
//!   { "latitude": 38.42373, "longitude": 27.1428, "accuracy": 5.0, "timestamp": 3.0 }
//! ]
//! ```

use std::path::Path;
use std::sync::Mutex;
use std::time::Instant;

use thiserror::Error;

use super::lock_or_recover;
use super::sample::GeodeticSample;
use super::source::{SampleSource, SourceError};

/// Errors loading a replay track.
#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("Failed to read replay file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse replay file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Replay track contains no samples")]
    Empty,
}

/// Plays back a recorded list of samples in real time.
pub struct ReplaySource {
    samples: Vec<GeodeticSample>,
    speed: f64,
    started: Mutex<Option<Instant>>,
}

impl ReplaySource {
    /// Create a source from samples; they are ordered by timestamp.
    pub fn from_samples(mut samples: Vec<GeodeticSample>) -> Result<Self, ReplayError> {
        if samples.is_empty() {
            return Err(ReplayError::Empty);
        }
        samples.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));

        Ok(Self {
            samples,
            speed: 1.0,
            started: Mutex::new(None),
        })
    }

    pub fn from_json(json: &str) -> Result<Self, ReplayError> {
        let samples: Vec<GeodeticSample> = serde_json::from_str(json)?;
        Self::from_samples(samples)
    }

    pub fn from_file(path: &Path) -> Result<Self, ReplayError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Play back faster (`> 1.0`) or slower (`< 1.0`). Non-positive values are ignored.
    pub fn with_speed(mut self, speed: f64) -> Self {
        if speed > 0.0 {
            self.speed = speed;
        } else {
            tracing::warn!(speed, "Ignoring non-positive replay speed");
        }
        self
    }

    /// Recorded samples in playback order.
    pub fn samples(&self) -> &[GeodeticSample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Track duration in seconds, from the first to the last timestamp.
    pub fn duration_secs(&self) -> f64 {
        match (self.samples.first(), self.samples.last()) {
            (Some(first), Some(last)) => last.timestamp - first.timestamp,
            _ => 0.0,
        }
    }

    /// The sample current `elapsed_secs` into playback.
    pub fn sample_at(&self, elapsed_secs: f64) -> Option<GeodeticSample> {
        let base = self.samples.first()?.timestamp;
        let track_time = elapsed_secs * self.speed;
        let index = self
            .samples
            .partition_point(|sample| sample.timestamp - base <= track_time);

        self.samples.get(index.saturating_sub(1)).copied()
    }
}

impl SampleSource for ReplaySource {
    async fn initialize(&self) -> Result<(), SourceError> {
        *lock_or_recover(&self.started) = Some(Instant::now());
        tracing::info!(
            samples = self.samples.len(),
            duration_secs = format!("{:.1}", self.duration_secs()),
            speed = self.speed,
            "Replay source started"
        );
        Ok(())
    }

    fn try_get_latest(&self) -> Option<GeodeticSample> {
        let started = (*lock_or_recover(&self.started))?;
        self.sample_at(started.elapsed().as_secs_f64())
    }

    fn shutdown(&self) {
        if lock_or_recover(&self.started).take().is_some() {
            tracing::info!("Replay source stopped");
        }
    }
}
