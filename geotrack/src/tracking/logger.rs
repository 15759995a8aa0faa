//! Periodic position logging daemon.
//!
//! Spawns a background task that logs the tracker snapshot at a fixed
//! interval, useful for reviewing a walk afterwards and for tuning the gate.
//!
//! # Usage
//!
//! ```ignore
//! use geotrack::tracking::{spawn_position_logger, DEFAULT_LOG_INTERVAL};
//! use tokio_util::sync::CancellationToken;
//!
//! let cancellation = CancellationToken::new();
//! if tracing::enabled!(tracing::Level::DEBUG) {
//!     spawn_position_logger(tracker.clone(), cancellation.clone(), DEFAULT_LOG_INTERVAL);
//! }
//! ```
//!
//! # Output Format
//!
//! Logs are emitted at DEBUG level with structured fields:
//! - `state` - Tracking state
//! - `lat`, `lon` - Last accepted position in decimal degrees
//! - `accuracy_m`, `quality` - Accuracy of that fix and its band
//! - `x`, `z` - Displayed agent position
//! - `facing` - Compass point of the agent's yaw
//! - `accepted`, `rejected` - Gate counters for the session

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::source::SampleSource;
use super::tracker::PositionTracker;

/// Default logging interval (10 seconds).
pub const DEFAULT_LOG_INTERVAL: Duration = Duration::from_secs(10);

/// Spawns a background task that periodically logs the tracker position.
///
/// The task stops when `cancellation` is triggered.
pub fn spawn_position_logger<S: SampleSource + 'static>(
    tracker: PositionTracker<S>,
    cancellation: CancellationToken,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    log_position(&tracker);
                }
                _ = cancellation.cancelled() => {
                    tracing::debug!("Position logger stopped");
                    break;
                }
            }
        }
    })
}

fn log_position<S: SampleSource + 'static>(tracker: &PositionTracker<S>) {
    let snapshot = tracker.snapshot();

    if let Some(last) = snapshot.last_accepted {
        let sample = last.source_sample;
        let facing = snapshot
            .pose
            .yaw_degrees
            .map(compass_point)
            .unwrap_or("-");

        tracing::debug!(
            state = %snapshot.state,
            lat = format!("{:.6}", sample.latitude),
            lon = format!("{:.6}", sample.longitude),
            accuracy_m = format!("{:.1}", sample.accuracy),
            quality = %sample.quality(),
            x = format!("{:.2}", snapshot.pose.position.x),
            z = format!("{:.2}", snapshot.pose.position.z),
            facing,
            accepted = snapshot.counters.accepted,
            rejected = snapshot.counters.rejected,
            "Position update"
        );
    } else {
        tracing::debug!(state = %snapshot.state, "Position update (not anchored)");
    }
}

/// Eight-point compass label for a yaw in degrees (0 = north, clockwise).
fn compass_point(yaw_degrees: f32) -> &'static str {
    const POINTS: [&str; 8] = ["N", "NE", "E", "SE", "S", "SW", "W", "NW"];

    let normalized = yaw_degrees.rem_euclid(360.0);
    let index = ((normalized + 22.5) / 45.0) as usize % POINTS.len();
    POINTS[index]
}
