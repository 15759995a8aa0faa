//! Tracker state and the per-tick pipeline.
//!
//! - [`TrackingState`] - Lifecycle of the tracker
//! - [`LastAccepted`] - Most recent accepted target and the sample behind it
//! - [`TrackerCore`] - Every piece of mutable tracker state, owned in one place
//!
//! `TrackerCore` is kept behind a single mutex by the
//! [`PositionTracker`](super::PositionTracker). Anchor swaps, ticks and
//! shutdown all run against it with the lock held, so a tick always sees
//! either the old anchor or the new one, never a mix.

use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

use super::gate::AcceptanceGate;
use super::motion::{yaw_towards, AgentPose, MotionController};
use super::projection::{offset_meters, planar_distance, AxisMapping, WorldPosition};
use super::sample::GeodeticSample;
use super::snapper::SurfaceSnapper;
use super::status::TickReport;

/// Tracker lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackingState {
    /// Not started, or explicitly stopped.
    #[default]
    Stopped,
    /// Waiting for the source to start and produce a first fix.
    Initializing,
    /// Anchored and processing samples.
    Running,
    /// The source failed to start or never produced a fix.
    Unavailable,
}

impl TrackingState {
    /// True while the tracker holds an active session.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Initializing | Self::Running)
    }
}

impl std::fmt::Display for TrackingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stopped => write!(f, "Stopped"),
            Self::Initializing => write!(f, "Initializing"),
            Self::Running => write!(f, "Running"),
            Self::Unavailable => write!(f, "Unavailable"),
        }
    }
}

/// The last target the gate let through.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LastAccepted {
    /// World position the agent is heading to (or resting at).
    pub target: WorldPosition,

    /// Sample that produced the target.
    pub source_sample: GeodeticSample,
}

/// Fixed pipeline settings, derived from the tracker configuration.
#[derive(Clone)]
pub struct Pipeline {
    pub gate: AcceptanceGate,
    pub axes: AxisMapping,

    /// Move duration, or `None` to place the agent instantly.
    pub smoothing: Option<Duration>,

    pub face_direction: bool,
    pub snapper: Option<Arc<dyn SurfaceSnapper>>,
}

/// One start-to-stop lifetime of the tracker's background tasks.
#[derive(Debug, Clone)]
pub(crate) struct Session {
    pub(crate) id: u64,
    pub(crate) cancellation: CancellationToken,
    pub(crate) tick_loop_active: bool,
}

/// Counters for one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickCounters {
    /// Ticks that had a sample to evaluate.
    pub processed: u64,
    pub accepted: u64,
    pub rejected: u64,
}

/// All mutable tracker state.
pub struct TrackerCore {
    pub(crate) state: TrackingState,
    pub(crate) session: Option<Session>,

    /// Set between a `start` and the matching source shutdown.
    pub(crate) source_held: bool,

    pub(crate) anchor: Option<GeodeticSample>,
    pub(crate) last_accepted: Option<LastAccepted>,

    /// Newest raw sample seen by either cadence.
    pub(crate) latest: Option<GeodeticSample>,

    /// World point the anchor maps to.
    pub(crate) reference: WorldPosition,

    pub(crate) last_error: Option<String>,
    pub(crate) counters: TickCounters,
    pub(crate) motion: MotionController,

    /// Runtime the tracker's tasks are spawned on.
    pub(crate) runtime: Option<Handle>,

    pipeline: Pipeline,
}

impl TrackerCore {
    pub fn new(pipeline: Pipeline, reference: WorldPosition) -> Self {
        Self {
            state: TrackingState::Stopped,
            session: None,
            source_held: false,
            anchor: None,
            last_accepted: None,
            latest: None,
            reference,
            last_error: None,
            counters: TickCounters::default(),
            motion: MotionController::new(reference),
            runtime: None,
            pipeline,
        }
    }

    /// Run background tasks and motion on `runtime`.
    pub fn attach_runtime(&mut self, runtime: Handle) {
        self.motion.attach_runtime(runtime.clone());
        self.runtime = Some(runtime);
    }

    /// The attached runtime, falling back to (and attaching) the caller's.
    pub(crate) fn resolve_runtime(&mut self) -> Option<Handle> {
        if self.runtime.is_none() {
            self.attach_runtime(Handle::try_current().ok()?);
        }
        self.runtime.clone()
    }

    pub fn state(&self) -> TrackingState {
        self.state
    }

    pub fn anchor(&self) -> Option<GeodeticSample> {
        self.anchor
    }

    pub fn last_accepted(&self) -> Option<LastAccepted> {
        self.last_accepted
    }

    pub fn counters(&self) -> TickCounters {
        self.counters
    }

    pub fn pose(&self) -> AgentPose {
        self.motion.pose()
    }

    /// Make `sample` the anchor and place the agent at `reference`.
    ///
    /// Used for the first fix of a session and for re-anchoring. The sample
    /// becomes the last accepted one without passing the gate.
    pub fn anchor_at(&mut self, sample: GeodeticSample, reference: WorldPosition) {
        self.anchor = Some(sample);
        self.latest = Some(sample);
        self.reference = reference;
        self.last_accepted = Some(LastAccepted {
            target: reference,
            source_sample: sample,
        });
        self.motion.teleport(reference);
        self.state = TrackingState::Running;
    }

    /// Run one pipeline step for `sample`.
    ///
    /// Order is fixed: project, gate, snap, start or replace motion, then
    /// update the bookkeeping. Returns `None` unless the tracker is running
    /// with an anchor.
    pub fn tick(&mut self, sample: GeodeticSample) -> Option<TickReport> {
        if self.state != TrackingState::Running {
            return None;
        }
        let anchor = self.anchor?;
        let last = self.last_accepted?;
        self.latest = Some(sample);

        let offset = offset_meters(&anchor, &sample);
        let candidate = self.pipeline.axes.to_world(&self.reference, offset);
        let distance = f64::from(planar_distance(&candidate, &last.target));
        let decision = self.pipeline.gate.evaluate(distance, sample.accuracy);

        self.counters.processed += 1;

        if !decision.is_accepted() {
            self.counters.rejected += 1;
            return Some(TickReport {
                sample,
                offset,
                decision,
                snapped: false,
                target: None,
            });
        }

        let mut target = candidate;
        let mut snapped = false;
        if let Some(snapper) = &self.pipeline.snapper {
            if let Some(point) = snapper.try_snap(candidate.planar(), sample.accuracy) {
                target = candidate.with_planar(point);
                snapped = true;
            }
        }

        if self.pipeline.face_direction {
            if let Some(yaw) = yaw_towards(&last.target, &target) {
                self.motion.set_yaw(yaw);
            }
        }

        match self.pipeline.smoothing {
            Some(duration) => {
                self.motion.start_move(target, duration);
            }
            None => {
                self.motion.teleport(target);
            }
        }

        self.last_accepted = Some(LastAccepted {
            target,
            source_sample: sample,
        });
        self.counters.accepted += 1;

        Some(TickReport {
            sample,
            offset,
            decision,
            snapped,
            target: Some(target),
        })
    }

    /// Drop the anchor and bookkeeping and halt motion.
    ///
    /// Returns true if an in-flight move was cancelled.
    pub fn clear(&mut self) -> bool {
        self.anchor = None;
        self.last_accepted = None;
        self.motion.cancel()
    }
}
