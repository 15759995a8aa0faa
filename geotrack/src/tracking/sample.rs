//! Geodetic sample types.
//!
//! - [`GeodeticSample`] - One position fix from a sample source
//! - [`AccuracyQuality`] - Coarse quality band for a reported accuracy

use serde::{Deserialize, Serialize};

/// Upper bound (meters) of the [`AccuracyQuality::Good`] band.
pub const GOOD_ACCURACY_METERS: f64 = 5.0;

/// Upper bound (meters) of the [`AccuracyQuality::Ok`] band.
pub const OK_ACCURACY_METERS: f64 = 15.0;

/// One geodetic position fix.
///
/// Samples are immutable values produced by a
/// [`SampleSource`](super::SampleSource). A later sample supersedes an earlier
/// one as the "current" fix but carries no identity beyond its fields.
///
/// An `accuracy` of zero or below means the source could not report one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeodeticSample {
    /// Latitude in degrees (-90 to 90).
    pub latitude: f64,

    /// Longitude in degrees (-180 to 180).
    pub longitude: f64,

    /// Horizontal accuracy radius in meters (lower is better).
    pub accuracy: f64,

    /// Capture time in seconds, on the source's own clock.
    #[serde(default)]
    pub timestamp: f64,
}

impl GeodeticSample {
    /// Create a new sample.
    pub fn new(latitude: f64, longitude: f64, accuracy: f64, timestamp: f64) -> Self {
        Self {
            latitude,
            longitude,
            accuracy,
            timestamp,
        }
    }

    /// Returns true if the source reported a usable accuracy value.
    #[inline]
    pub fn has_accuracy(&self) -> bool {
        self.accuracy > 0.0
    }

    /// Classify the reported accuracy.
    pub fn quality(&self) -> AccuracyQuality {
        AccuracyQuality::from_meters(self.accuracy)
    }
}

impl std::fmt::Display for GeodeticSample {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({:.6}, {:.6}) ±{:.1}m",
            self.latitude, self.longitude, self.accuracy
        )
    }
}

/// Coarse quality band for a reported accuracy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccuracyQuality {
    /// Source did not report an accuracy (zero or negative).
    #[default]
    Unknown,
    /// At most [`GOOD_ACCURACY_METERS`].
    Good,
    /// At most [`OK_ACCURACY_METERS`].
    Ok,
    /// Worse than [`OK_ACCURACY_METERS`].
    Poor,
}

impl AccuracyQuality {
    /// Classify an accuracy value in meters.
    pub fn from_meters(meters: f64) -> Self {
        if meters.is_nan() || meters <= 0.0 {
            Self::Unknown
        } else if meters <= GOOD_ACCURACY_METERS {
            Self::Good
        } else if meters <= OK_ACCURACY_METERS {
            Self::Ok
        } else {
            Self::Poor
        }
    }
}

impl std::fmt::Display for AccuracyQuality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unknown => write!(f, "Unknown"),
            Self::Good => write!(f, "Good"),
            Self::Ok => write!(f, "Ok"),
            Self::Poor => write!(f, "Poor"),
        }
    }
}
