//! Error types for the position tracker.

use thiserror::Error;

use super::source::SourceError;
use super::state::TrackingState;

/// Errors returned by [`PositionTracker`](super::PositionTracker) operations.
///
/// None of these are fatal: the tracker keeps its last known position and
/// stays usable after any of them.
#[derive(Debug, Error)]
pub enum TrackingError {
    /// The source failed to start or never produced a first fix.
    #[error("Position source unavailable: {0}")]
    SourceUnavailable(#[from] SourceError),

    /// The source had no sample to anchor on.
    #[error("No sample available from the position source")]
    NoSampleAvailable,

    /// The operation needs a running tracker.
    #[error("Tracker is not running (state: {0})")]
    NotRunning(TrackingState),

    /// No tokio runtime to run the tracker's background tasks on.
    #[error("No tokio runtime available for tracker tasks")]
    NoRuntime,
}
