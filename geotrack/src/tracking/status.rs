//! Status reporting.
//!
//! The tracker publishes four kinds of observations through a [`StatusSink`]:
//! lifecycle state changes, the raw current sample (fast cadence), the last
//! accepted sample, and one [`TickReport`] per pipeline tick.
//!
//! Sinks are write-only from the tracker's point of view. Any error a sink
//! returns is logged at TRACE and dropped; a sink can never stall or fail
//! the pipeline.
//!
//! # Shipped sinks
//!
//! - [`BroadcastStatusSink`] - republishes everything as [`TrackerEvent`]s on a
//!   tokio broadcast channel
//! - [`TracingStatusSink`] - writes every observation to the log
//! - [`FanOutStatusSink`] - forwards to several sinks

use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::broadcast;

use super::gate::{DecisionReason, GateDecision};
use super::projection::{PlanarOffset, WorldPosition};
use super::sample::GeodeticSample;
use super::state::TrackingState;

/// Default broadcast channel capacity.
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Errors a sink may report. Never propagated past the tracker.
#[derive(Debug, Error)]
pub enum StatusSinkError {
    /// Nobody is listening.
    #[error("Status channel closed")]
    ChannelClosed,

    /// The sink refused the observation.
    #[error("Status sink rejected update: {0}")]
    Rejected(String),
}

/// Result of one slow-cadence tick that had a sample to work with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickReport {
    /// The sample the tick evaluated.
    pub sample: GeodeticSample,

    /// Offset of the sample from the anchor.
    pub offset: PlanarOffset,

    /// Gate outcome.
    pub decision: GateDecision,

    /// Whether the snapper moved the target.
    pub snapped: bool,

    /// New target, if the sample was accepted.
    pub target: Option<WorldPosition>,
}

impl TickReport {
    pub fn reason(&self) -> DecisionReason {
        self.decision.reason
    }

    pub fn is_accepted(&self) -> bool {
        self.decision.is_accepted()
    }

    /// Reason label with a `+Snapped` suffix when a snap occurred,
    /// e.g. `AcceptedDistance+Snapped`.
    pub fn label(&self) -> String {
        if self.snapped {
            format!("{}+Snapped", self.decision.reason.label())
        } else {
            self.decision.reason.label().to_string()
        }
    }
}

impl fmt::Display for TickReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.snapped {
            write!(f, "{} + Snapped", self.decision)
        } else {
            write!(f, "{}", self.decision)
        }
    }
}

/// Observer of tracker activity.
///
/// Every method defaults to doing nothing, so a sink only implements the
/// observations it cares about.
///
/// The tracker calls sinks while holding its state lock, so observations
/// arrive in the order the state changed. Implementations must not block or
/// call back into the tracker.
pub trait StatusSink: Send + Sync {
    fn on_status(&self, _state: TrackingState) -> Result<(), StatusSinkError> {
        Ok(())
    }

    /// Latest raw sample, published on the fast cadence.
    fn on_current(&self, _sample: &GeodeticSample) -> Result<(), StatusSinkError> {
        Ok(())
    }

    /// Sample that produced the newest accepted target.
    fn on_accepted(&self, _sample: &GeodeticSample) -> Result<(), StatusSinkError> {
        Ok(())
    }

    fn on_decision(&self, _report: &TickReport) -> Result<(), StatusSinkError> {
        Ok(())
    }
}

/// Tracker observation as a single value.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackerEvent {
    Status(TrackingState),
    Current(GeodeticSample),
    Accepted(GeodeticSample),
    Decision(TickReport),
}

/// Publishes observations as [`TrackerEvent`]s on a broadcast channel.
///
/// Sending with no subscribers reports [`StatusSinkError::ChannelClosed`],
/// which the tracker ignores.
#[derive(Debug, Clone)]
pub struct BroadcastStatusSink {
    tx: broadcast::Sender<TrackerEvent>,
}

impl BroadcastStatusSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TrackerEvent> {
        self.tx.subscribe()
    }

    fn send(&self, event: TrackerEvent) -> Result<(), StatusSinkError> {
        self.tx
            .send(event)
            .map(|_| ())
            .map_err(|_| StatusSinkError::ChannelClosed)
    }
}

impl Default for BroadcastStatusSink {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

impl StatusSink for BroadcastStatusSink {
    fn on_status(&self, state: TrackingState) -> Result<(), StatusSinkError> {
        self.send(TrackerEvent::Status(state))
    }

    fn on_current(&self, sample: &GeodeticSample) -> Result<(), StatusSinkError> {
        self.send(TrackerEvent::Current(*sample))
    }

    fn on_accepted(&self, sample: &GeodeticSample) -> Result<(), StatusSinkError> {
        self.send(TrackerEvent::Accepted(*sample))
    }

    fn on_decision(&self, report: &TickReport) -> Result<(), StatusSinkError> {
        self.send(TrackerEvent::Decision(*report))
    }
}

/// Writes observations to the `tracing` log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingStatusSink;

impl StatusSink for TracingStatusSink {
    fn on_status(&self, state: TrackingState) -> Result<(), StatusSinkError> {
        tracing::info!(state = %state, "Tracking status");
        Ok(())
    }

    fn on_current(&self, sample: &GeodeticSample) -> Result<(), StatusSinkError> {
        tracing::trace!(
            lat = format!("{:.6}", sample.latitude),
            lon = format!("{:.6}", sample.longitude),
            accuracy_m = format!("{:.1}", sample.accuracy),
            "Current position"
        );
        Ok(())
    }

    fn on_accepted(&self, sample: &GeodeticSample) -> Result<(), StatusSinkError> {
        tracing::debug!(
            lat = format!("{:.6}", sample.latitude),
            lon = format!("{:.6}", sample.longitude),
            accuracy_m = format!("{:.1}", sample.accuracy),
            quality = %sample.quality(),
            "Accepted position"
        );
        Ok(())
    }

    fn on_decision(&self, report: &TickReport) -> Result<(), StatusSinkError> {
        tracing::debug!(
            reason = %report.label(),
            distance_m = format!("{:.1}", report.decision.distance),
            threshold_m = format!("{:.1}", report.decision.threshold),
            "{}",
            report
        );
        Ok(())
    }
}

/// Forwards every observation to each inner sink.
///
/// All sinks are called even if one fails; the first error is returned.
#[derive(Clone, Default)]
pub struct FanOutStatusSink {
    sinks: Vec<Arc<dyn StatusSink>>,
}

impl FanOutStatusSink {
    pub fn new(sinks: Vec<Arc<dyn StatusSink>>) -> Self {
        Self { sinks }
    }

    fn forward<F>(&self, f: F) -> Result<(), StatusSinkError>
    where
        F: Fn(&dyn StatusSink) -> Result<(), StatusSinkError>,
    {
        let mut first_error = None;
        for sink in &self.sinks {
            if let Err(e) = f(sink.as_ref()) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl StatusSink for FanOutStatusSink {
    fn on_status(&self, state: TrackingState) -> Result<(), StatusSinkError> {
        self.forward(|sink| sink.on_status(state))
    }

    fn on_current(&self, sample: &GeodeticSample) -> Result<(), StatusSinkError> {
        self.forward(|sink| sink.on_current(sample))
    }

    fn on_accepted(&self, sample: &GeodeticSample) -> Result<(), StatusSinkError> {
        self.forward(|sink| sink.on_accepted(sample))
    }

    fn on_decision(&self, report: &TickReport) -> Result<(), StatusSinkError> {
        self.forward(|sink| sink.on_decision(report))
    }
}

/// Optional sink wrapper that swallows failures.
#[derive(Clone, Default)]
pub(crate) struct StatusReporter {
    sink: Option<Arc<dyn StatusSink>>,
}

impl StatusReporter {
    pub(crate) fn new(sink: Option<Arc<dyn StatusSink>>) -> Self {
        Self { sink }
    }

    pub(crate) fn status(&self, state: TrackingState) {
        if let Some(sink) = &self.sink {
            swallow("status", sink.on_status(state));
        }
    }

    pub(crate) fn current(&self, sample: &GeodeticSample) {
        if let Some(sink) = &self.sink {
            swallow("current", sink.on_current(sample));
        }
    }

    pub(crate) fn accepted(&self, sample: &GeodeticSample) {
        if let Some(sink) = &self.sink {
            swallow("accepted", sink.on_accepted(sample));
        }
    }

    pub(crate) fn decision(&self, report: &TickReport) {
        if let Some(sink) = &self.sink {
            swallow("decision", sink.on_decision(report));
        }
    }
}

fn swallow(kind: &'static str, result: Result<(), StatusSinkError>) {
    if let Err(e) = result {
        tracing::trace!(kind, error = %e, "Status sink update dropped");
    }
}
