//! Sample source abstraction.
//!
//! A [`SampleSource`] is whatever produces position fixes: a platform
//! location service, a replayed track, or the [`SimulatedSource`](super::SimulatedSource).
//! The tracker only needs three operations from it.

use std::future::Future;

use thiserror::Error;

use super::sample::GeodeticSample;

/// Errors a source can report while starting up.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The user or platform refused location access.
    #[error("Location permission denied")]
    PermissionDenied,

    /// The underlying location service failed to start.
    #[error("Location service failed: {0}")]
    ServiceFailed(String),

    /// The source did not become ready in time.
    #[error("Timed out waiting for location service")]
    Timeout,

    /// The source started but never produced a fix.
    #[error("No position fix available")]
    NoFix,

    /// I/O failure while opening the source.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Producer of geodetic samples.
///
/// `try_get_latest` must be safe to call at any time: before `initialize`
/// completes and after `shutdown` it returns `None`.
pub trait SampleSource: Send + Sync {
    /// Start the source. May suspend for as long as the platform needs.
    fn initialize(&self) -> impl Future<Output = Result<(), SourceError>> + Send;

    /// Most recent fix, if any.
    fn try_get_latest(&self) -> Option<GeodeticSample>;

    /// Release the source. Called at most once per successful start.
    fn shutdown(&self);
}
