//! Position tracking pipeline.
//!
//! Turns a noisy stream of geodetic samples into a filtered, smoothed
//! world-space position for a single agent moving over a small area.
//!
//! # Pipeline
//!
//! Each slow tick runs the same fixed sequence:
//!
//! 1. **Project** the sample onto the tangent plane at the anchor
//! 2. **Gate** the candidate against the last accepted target
//! 3. **Snap** an accepted target onto a surface (optional)
//! 4. **Move** the agent there, smoothly or instantly
//! 5. **Record** the new last accepted target
//!
//! The very first fix after a start skips the gate and becomes the anchor.
//!
//! # Components
//!
//! - [`sample`] - `GeodeticSample` and `AccuracyQuality`
//! - [`projection`] - Tangent-plane projection and world placement
//! - [`gate`] - `AcceptanceGate` jitter filter
//! - [`snapper`] - `SurfaceSnapper` trait, `BandedSnapper`, `PathNetwork`
//! - [`motion`] - `MotionController` interpolation task
//! - [`source`] - `SampleSource` trait
//! - [`simulator`] - `SimulatedSource` constant-velocity walker
//! - [`replay`] - `ReplaySource` recorded track playback
//! - [`status`] - `StatusSink` trait and shipped sinks
//! - [`state`] - `TrackingState` and `TrackerCore`
//! - [`tracker`] - `PositionTracker` state machine

use std::sync::{Mutex, MutexGuard, PoisonError};

mod error;
pub mod gate;
mod logger;
pub mod motion;
pub mod projection;
pub mod replay;
pub mod sample;
pub mod simulator;
pub mod snapper;
pub mod source;
pub mod state;
pub mod status;
pub mod tracker;

pub use error::TrackingError;
pub use gate::{AcceptanceGate, DecisionReason, GateConfig, GateDecision};
pub use motion::{AgentPose, MotionController, MotionPlan, PoseHandle};
pub use projection::{
    offset_meters, offset_to_geodetic, planar_distance, AxisMapping, PlanarOffset, PlanarPoint,
    WorldPosition,
};
pub use replay::{ReplayError, ReplaySource};
pub use sample::{AccuracyQuality, GeodeticSample};
pub use simulator::{SimulatedSource, SimulatorConfig};
pub use snapper::{
    BandedSnapper, NavigableSurface, PathNetwork, PathSegment, SnapperConfig, SurfaceSnapper,
};
pub use source::{SampleSource, SourceError};
pub use state::{LastAccepted, TickCounters, TrackingState};
pub use status::{
    BroadcastStatusSink, FanOutStatusSink, StatusSink, StatusSinkError, TickReport,
    TrackerEvent, TracingStatusSink,
};
pub use tracker::{PositionTracker, TrackerBuilder, TrackerConfig, TrackerSnapshot};

// Position logger for walk review (DEBUG level only)
pub use logger::{spawn_position_logger, DEFAULT_LOG_INTERVAL};

/// Lock a mutex, recovering the data if a previous holder panicked.
pub(crate) fn lock_or_recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
