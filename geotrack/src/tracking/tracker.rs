//! The position tracker state machine.
//!
//! [`PositionTracker`] sequences acquisition, anchoring and the per-tick
//! pipeline, and runs two independent cadences against the shared
//! [`TrackerCore`]:
//!
//! - **slow tick** (`poll_interval`, at least 1 s) - project, gate, snap,
//!   move, then update the bookkeeping
//! - **fast refresh** (`raw_refresh_hz`, at least 1 Hz) - republish the latest
//!   raw sample; never touches the anchor, the last accepted target or motion
//!
//! # Lifecycle
//!
//! ```text
//! Stopped --start--> Initializing --first fix--> Running --stop--> Stopped
//!                         |
//!                         +--init failed / timed out--> Unavailable
//! ```
//!
//! `reanchor` moves any state to `Running` with the current sample as the
//! new anchor. `start` from `Unavailable` retries acquisition.
//!
//! # Sessions
//!
//! Each `start` opens a session with its own [`CancellationToken`]. All
//! background tasks of a session select on that token and re-check the
//! session id under the core lock before touching state, so a task left over
//! from an earlier session can never act on a newer one.
//!
//! Tasks are spawned on the runtime captured at build or start time, so
//! `poll_now`, `reanchor` and `stop` may be called from threads outside the
//! runtime. Observers are notified with the core lock held, in the order the
//! state changed.
//!
//! # Usage
//!
//! ```ignore
//! use geotrack::tracking::{PositionTracker, SimulatedSource, TrackerConfig};
//!
//! let tracker = PositionTracker::builder(SimulatedSource::default())
//!     .config(TrackerConfig::default())
//!     .broadcast_events(64)
//!     .build();
//!
//! let mut events = tracker.subscribe().unwrap();
//! tracker.start();
//! while let Ok(event) = events.recv().await {
//!     println!("{:?}", event);
//! }
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::{broadcast, watch};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::error::TrackingError;
use super::gate::{AcceptanceGate, GateConfig};
use super::lock_or_recover;
use super::motion::{AgentPose, PoseHandle, MIN_MOVE_DURATION};
use super::projection::{AxisMapping, WorldPosition};
use super::sample::GeodeticSample;
use super::snapper::SurfaceSnapper;
use super::source::{SampleSource, SourceError};
use super::state::{LastAccepted, Pipeline, Session, TickCounters, TrackerCore, TrackingState};
use super::status::{
    BroadcastStatusSink, FanOutStatusSink, StatusReporter, StatusSink, TickReport, TrackerEvent,
};

/// Default slow-tick interval.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Shortest allowed slow-tick interval.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Default fast-refresh rate (Hz).
pub const DEFAULT_RAW_REFRESH_HZ: f64 = 5.0;

/// Lowest allowed fast-refresh rate (Hz).
pub const MIN_RAW_REFRESH_HZ: f64 = 1.0;

/// Default smoothing duration for accepted moves.
pub const DEFAULT_SMOOTHING_DURATION: Duration = Duration::from_millis(750);

/// Default bound on source initialization plus first fix.
pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(20);

/// Shortest allowed acquisition bound.
pub const MIN_ACQUIRE_TIMEOUT: Duration = Duration::from_millis(100);

/// How often the source is polled while waiting for the first fix.
pub const ACQUIRE_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Clamps the slow-tick interval and logs a warning if clamped.
pub fn clamp_poll_interval(value: Duration) -> Duration {
    if value < MIN_POLL_INTERVAL {
        tracing::warn!(
            requested_ms = value.as_millis() as u64,
            min_ms = MIN_POLL_INTERVAL.as_millis() as u64,
            "poll_interval below minimum, clamping to {:?}",
            MIN_POLL_INTERVAL
        );
        MIN_POLL_INTERVAL
    } else {
        value
    }
}

/// Clamps the fast-refresh rate and logs a warning if clamped.
pub fn clamp_raw_refresh_hz(value: f64) -> f64 {
    if value.is_nan() || value < MIN_RAW_REFRESH_HZ {
        tracing::warn!(
            requested = value,
            min = MIN_RAW_REFRESH_HZ,
            "raw_refresh_hz below minimum, clamping to {}",
            MIN_RAW_REFRESH_HZ
        );
        MIN_RAW_REFRESH_HZ
    } else {
        value
    }
}

/// Clamps the smoothing duration and logs a warning if clamped.
pub fn clamp_smoothing_duration(value: Duration) -> Duration {
    if value < MIN_MOVE_DURATION {
        tracing::warn!(
            requested_ms = value.as_millis() as u64,
            min_ms = MIN_MOVE_DURATION.as_millis() as u64,
            "smoothing_duration below minimum, clamping to {:?}",
            MIN_MOVE_DURATION
        );
        MIN_MOVE_DURATION
    } else {
        value
    }
}

/// Clamps the acquisition timeout and logs a warning if clamped.
pub fn clamp_acquire_timeout(value: Duration) -> Duration {
    if value < MIN_ACQUIRE_TIMEOUT {
        tracing::warn!(
            requested_ms = value.as_millis() as u64,
            min_ms = MIN_ACQUIRE_TIMEOUT.as_millis() as u64,
            "acquire_timeout below minimum, clamping to {:?}",
            MIN_ACQUIRE_TIMEOUT
        );
        MIN_ACQUIRE_TIMEOUT
    } else {
        value
    }
}

/// Tracker configuration.
///
/// Built with `with_*` methods, each of which clamps its value into range.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerConfig {
    poll_interval: Duration,
    raw_refresh_hz: f64,
    swap_axes: bool,
    gate: GateConfig,
    smoothing_enabled: bool,
    smoothing_duration: Duration,
    face_direction: bool,
    acquire_timeout: Duration,
    reference: WorldPosition,
    automatic_ticks: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            raw_refresh_hz: DEFAULT_RAW_REFRESH_HZ,
            swap_axes: false,
            gate: GateConfig::default(),
            smoothing_enabled: true,
            smoothing_duration: DEFAULT_SMOOTHING_DURATION,
            face_direction: true,
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
            reference: WorldPosition::ORIGIN,
            automatic_ticks: true,
        }
    }
}

impl TrackerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = clamp_poll_interval(interval);
        self
    }

    pub fn with_raw_refresh_hz(mut self, hz: f64) -> Self {
        self.raw_refresh_hz = clamp_raw_refresh_hz(hz);
        self
    }

    /// Map north to `x` and east to `z` instead of the reverse.
    pub fn with_swap_axes(mut self, swap: bool) -> Self {
        self.swap_axes = swap;
        self
    }

    pub fn with_gate(mut self, gate: GateConfig) -> Self {
        self.gate = GateConfig::new(
            gate.trust_accuracy_meters,
            gate.min_movement_meters,
            gate.accuracy_multiplier,
        );
        self
    }

    pub fn with_trust_accuracy_meters(self, meters: f64) -> Self {
        let gate = GateConfig {
            trust_accuracy_meters: meters,
            ..self.gate
        };
        self.with_gate(gate)
    }

    pub fn with_min_movement_meters(self, meters: f64) -> Self {
        let gate = GateConfig {
            min_movement_meters: meters,
            ..self.gate
        };
        self.with_gate(gate)
    }

    pub fn with_accuracy_multiplier(self, multiplier: f64) -> Self {
        let gate = GateConfig {
            accuracy_multiplier: multiplier,
            ..self.gate
        };
        self.with_gate(gate)
    }

    /// Animate accepted moves (`true`) or place the agent instantly.
    pub fn with_smoothing(mut self, enabled: bool) -> Self {
        self.smoothing_enabled = enabled;
        self
    }

    pub fn with_smoothing_duration(mut self, duration: Duration) -> Self {
        self.smoothing_duration = clamp_smoothing_duration(duration);
        self
    }

    pub fn with_face_direction(mut self, enabled: bool) -> Self {
        self.face_direction = enabled;
        self
    }

    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = clamp_acquire_timeout(timeout);
        self
    }

    /// World point the anchor maps to.
    pub fn with_reference(mut self, reference: WorldPosition) -> Self {
        self.reference = reference;
        self
    }

    /// Disable the slow-tick loop. Ticks then only happen through
    /// [`PositionTracker::poll_now`], for hosts with their own scheduler.
    pub fn with_automatic_ticks(mut self, enabled: bool) -> Self {
        self.automatic_ticks = enabled;
        self
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn raw_refresh_hz(&self) -> f64 {
        self.raw_refresh_hz
    }

    pub fn swap_axes(&self) -> bool {
        self.swap_axes
    }

    pub fn gate(&self) -> &GateConfig {
        &self.gate
    }

    pub fn smoothing_enabled(&self) -> bool {
        self.smoothing_enabled
    }

    pub fn smoothing_duration(&self) -> Duration {
        self.smoothing_duration
    }

    pub fn face_direction(&self) -> bool {
        self.face_direction
    }

    pub fn acquire_timeout(&self) -> Duration {
        self.acquire_timeout
    }

    pub fn reference(&self) -> WorldPosition {
        self.reference
    }

    pub fn automatic_ticks(&self) -> bool {
        self.automatic_ticks
    }

    /// Fast-refresh period derived from the rate.
    pub fn raw_refresh_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.raw_refresh_hz).max(Duration::from_millis(1))
    }

    fn pipeline(&self, snapper: Option<Arc<dyn SurfaceSnapper>>) -> Pipeline {
        Pipeline {
            gate: AcceptanceGate::new(self.gate),
            axes: AxisMapping::new(self.swap_axes),
            smoothing: self.smoothing_enabled.then_some(self.smoothing_duration),
            face_direction: self.face_direction,
            snapper,
        }
    }
}

/// Point-in-time view of the tracker.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerSnapshot {
    pub state: TrackingState,
    pub session: Option<u64>,
    pub anchor: Option<GeodeticSample>,
    pub last_accepted: Option<LastAccepted>,

    /// Newest raw sample from either cadence.
    pub latest: Option<GeodeticSample>,

    pub reference: WorldPosition,
    pub pose: AgentPose,
    pub counters: TickCounters,

    /// Why the last acquisition failed, if it did.
    pub last_error: Option<String>,
}

/// Builder for [`PositionTracker`].
pub struct TrackerBuilder<S> {
    source: S,
    config: TrackerConfig,
    snapper: Option<Arc<dyn SurfaceSnapper>>,
    sinks: Vec<Arc<dyn StatusSink>>,
    event_capacity: Option<usize>,
    runtime: Option<Handle>,
}

impl<S: SampleSource + 'static> TrackerBuilder<S> {
    pub fn config(mut self, config: TrackerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn snapper(mut self, snapper: Arc<dyn SurfaceSnapper>) -> Self {
        self.snapper = Some(snapper);
        self
    }

    /// Spawn background tasks on `runtime` instead of the runtime current
    /// at build or start time.
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Add an observer. May be called more than once.
    ///
    /// Sinks are called with the tracker lock held and must not block or
    /// call back into the tracker.
    pub fn status_sink(mut self, sink: Arc<dyn StatusSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Publish every observation on a broadcast channel, see
    /// [`PositionTracker::subscribe`].
    pub fn broadcast_events(mut self, capacity: usize) -> Self {
        self.event_capacity = Some(capacity);
        self
    }

    pub fn build(self) -> PositionTracker<S> {
        let events = self.event_capacity.map(BroadcastStatusSink::new);

        let mut sinks = self.sinks;
        if let Some(events) = &events {
            sinks.push(Arc::new(events.clone()));
        }
        let sink: Option<Arc<dyn StatusSink>> = match sinks.len() {
            0 => None,
            1 => sinks.pop(),
            _ => Some(Arc::new(FanOutStatusSink::new(sinks))),
        };

        let mut core = TrackerCore::new(
            self.config.pipeline(self.snapper),
            self.config.reference,
        );
        if let Some(runtime) = self.runtime.or_else(|| Handle::try_current().ok()) {
            core.attach_runtime(runtime);
        }
        let (state_tx, _) = watch::channel(TrackingState::Stopped);

        PositionTracker {
            inner: Arc::new(Inner {
                source: self.source,
                config: self.config,
                core: Mutex::new(core),
                reporter: StatusReporter::new(sink),
                events,
                state_tx,
                next_session: AtomicU64::new(0),
            }),
        }
    }
}

/// Tracks a single agent from a [`SampleSource`].
///
/// Cheap to clone; clones share the same tracker. Background tasks run until
/// [`stop`](Self::stop) is called. They run on the runtime given to
/// [`TrackerBuilder::runtime`], or else the one current when the tracker is
/// built or started.
pub struct PositionTracker<S: SampleSource + 'static> {
    inner: Arc<Inner<S>>,
}

impl<S: SampleSource + 'static> Clone for PositionTracker<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: SampleSource + 'static> PositionTracker<S> {
    /// Create a tracker with no snapper and no observers.
    pub fn new(source: S, config: TrackerConfig) -> Self {
        Self::builder(source).config(config).build()
    }

    pub fn builder(source: S) -> TrackerBuilder<S> {
        TrackerBuilder {
            source,
            config: TrackerConfig::default(),
            snapper: None,
            sinks: Vec::new(),
            event_capacity: None,
            runtime: None,
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.inner.config
    }

    pub fn source(&self) -> &S {
        &self.inner.source
    }

    pub fn state(&self) -> TrackingState {
        self.inner.lock_core().state
    }

    pub fn pose(&self) -> AgentPose {
        self.inner.lock_core().pose()
    }

    /// Pose handle that can be read without touching the tracker lock.
    pub fn pose_handle(&self) -> PoseHandle {
        self.inner.lock_core().motion.pose_handle()
    }

    pub fn snapshot(&self) -> TrackerSnapshot {
        let core = self.inner.lock_core();
        TrackerSnapshot {
            state: core.state,
            session: core.session.as_ref().map(|s| s.id),
            anchor: core.anchor,
            last_accepted: core.last_accepted,
            latest: core.latest,
            reference: core.reference,
            pose: core.pose(),
            counters: core.counters,
            last_error: core.last_error.clone(),
        }
    }

    /// Receive every observation as a [`TrackerEvent`].
    ///
    /// `None` unless the tracker was built with
    /// [`broadcast_events`](TrackerBuilder::broadcast_events).
    pub fn subscribe(&self) -> Option<broadcast::Receiver<TrackerEvent>> {
        self.inner.events.as_ref().map(BroadcastStatusSink::subscribe)
    }

    /// Watch lifecycle state changes.
    pub fn watch_state(&self) -> watch::Receiver<TrackingState> {
        self.inner.state_tx.subscribe()
    }

    /// Begin acquisition.
    ///
    /// Returns false if the tracker is already initializing or running, or
    /// if no tokio runtime is available.
    pub fn start(&self) -> bool {
        self.inner.start()
    }

    /// Stop tracking, release the source and cancel any motion.
    ///
    /// Idempotent: only the first call after a start returns true.
    pub fn stop(&self) -> bool {
        self.inner.stop()
    }

    /// Anchor on the source's current sample and place the agent at `reference`.
    ///
    /// Works from any state. When the source has no sample, nothing changes
    /// and [`TrackingError::NoSampleAvailable`] is returned.
    pub fn reanchor(&self, reference: WorldPosition) -> Result<GeodeticSample, TrackingError> {
        self.inner.reanchor(reference)
    }

    /// Run one slow tick now.
    ///
    /// Returns `Ok(None)` when the source has no sample this tick.
    pub fn poll_now(&self) -> Result<Option<TickReport>, TrackingError> {
        self.inner.tick(None)
    }

    /// Wait until acquisition settles.
    ///
    /// Returns `Ok` once the tracker is running, or
    /// [`TrackingError::NotRunning`] if it ends up in any other state or
    /// `timeout` elapses first.
    pub async fn wait_for_running(&self, timeout: Duration) -> Result<(), TrackingError> {
        let mut rx = self.inner.state_tx.subscribe();
        let settled = tokio::time::timeout(
            timeout,
            rx.wait_for(|state| *state != TrackingState::Initializing),
        )
        .await;

        let state = match settled {
            Ok(Ok(state)) => *state,
            _ => self.state(),
        };

        match state {
            TrackingState::Running => Ok(()),
            other => Err(TrackingError::NotRunning(other)),
        }
    }
}

struct Inner<S> {
    source: S,
    config: TrackerConfig,
    core: Mutex<TrackerCore>,
    reporter: StatusReporter,
    events: Option<BroadcastStatusSink>,
    state_tx: watch::Sender<TrackingState>,
    next_session: AtomicU64,
}

impl<S: SampleSource + 'static> Inner<S> {
    fn lock_core(&self) -> MutexGuard<'_, TrackerCore> {
        lock_or_recover(&self.core)
    }

    /// Change state and notify observers. Called with the core lock held.
    fn transition(&self, core: &mut TrackerCore, state: TrackingState) {
        core.state = state;
        self.state_tx.send_replace(state);
        self.reporter.status(state);
    }

    fn open_session(&self, core: &mut TrackerCore) -> Session {
        let id = self.next_session.fetch_add(1, Ordering::SeqCst) + 1;
        let session = Session {
            id,
            cancellation: CancellationToken::new(),
            tick_loop_active: false,
        };
        core.session = Some(session.clone());
        session
    }

    fn start(self: &Arc<Self>) -> bool {
        let (session, runtime) = {
            let mut core = self.lock_core();
            if core.state.is_active() {
                tracing::debug!(state = %core.state, "Position tracker already active");
                return false;
            }
            let Some(runtime) = core.resolve_runtime() else {
                tracing::warn!("Position tracker needs a tokio runtime to start");
                return false;
            };

            // Restart after Unavailable: the previous start still holds the source
            if core.source_held {
                self.source.shutdown();
                core.source_held = false;
            }

            let session = self.open_session(&mut core);
            core.source_held = true;
            core.anchor = None;
            core.last_accepted = None;
            core.latest = None;
            core.last_error = None;
            core.counters = TickCounters::default();
            self.transition(&mut core, TrackingState::Initializing);
            (session, runtime)
        };

        tracing::info!(
            session = session.id,
            poll_interval_secs = self.config.poll_interval.as_secs_f64(),
            raw_refresh_hz = self.config.raw_refresh_hz,
            "Position tracker starting"
        );

        runtime.spawn(Arc::clone(self).run_acquisition(session.id, session.cancellation.clone()));
        runtime.spawn(Arc::clone(self).run_fast_refresh(session.id, session.cancellation));
        true
    }

    fn stop(&self) -> bool {
        let motion_cancelled = {
            let mut core = self.lock_core();
            if core.state == TrackingState::Stopped {
                return false;
            }

            if let Some(session) = core.session.take() {
                session.cancellation.cancel();
            }
            let motion_cancelled = core.clear();
            if core.source_held {
                self.source.shutdown();
                core.source_held = false;
            }
            self.transition(&mut core, TrackingState::Stopped);
            motion_cancelled
        };

        tracing::info!(motion_cancelled, "Position tracker stopped");
        true
    }

    fn reanchor(self: &Arc<Self>, reference: WorldPosition) -> Result<GeodeticSample, TrackingError> {
        let (sample, previous) = {
            let mut core = self.lock_core();
            let sample = self
                .source
                .try_get_latest()
                .ok_or(TrackingError::NoSampleAvailable)?;

            let runtime = if core.session.is_none() {
                Some(core.resolve_runtime().ok_or(TrackingError::NoRuntime)?)
            } else {
                None
            };

            let previous = core.state;
            core.anchor_at(sample, reference);
            if previous != TrackingState::Running {
                self.transition(&mut core, TrackingState::Running);
            }
            self.reporter.accepted(&sample);

            // From Stopped the source was never initialized, so there is
            // nothing to hold; after Unavailable the earlier hold stays.
            if let Some(runtime) = runtime {
                let session = self.open_session(&mut core);
                core.last_error = None;
                runtime.spawn(Arc::clone(self).run_fast_refresh(session.id, session.cancellation));
            }
            self.ensure_tick_loop(&mut core);
            (sample, previous)
        };

        tracing::info!(
            lat = format!("{:.6}", sample.latitude),
            lon = format!("{:.6}", sample.longitude),
            accuracy_m = format!("{:.1}", sample.accuracy),
            reference = %reference,
            previous = %previous,
            "Re-anchored"
        );
        Ok(sample)
    }

    /// Start the slow-tick loop for the current session if it is not running.
    fn ensure_tick_loop(self: &Arc<Self>, core: &mut TrackerCore) {
        if !self.config.automatic_ticks {
            return;
        }
        let Some(runtime) = core.runtime.clone() else {
            return;
        };
        let Some(session) = core.session.as_mut() else {
            return;
        };
        if session.tick_loop_active {
            return;
        }

        session.tick_loop_active = true;
        runtime.spawn(Arc::clone(self).run_ticks(session.id, session.cancellation.clone()));
    }

    fn is_current(core: &TrackerCore, session_id: u64) -> bool {
        core.session.as_ref().is_some_and(|s| s.id == session_id)
    }

    /// One slow tick. `session` is `None` for on-demand polls.
    fn tick(&self, session: Option<u64>) -> Result<Option<TickReport>, TrackingError> {
        let report = {
            let mut core = self.lock_core();
            if let Some(id) = session {
                if !Self::is_current(&core, id) {
                    return Ok(None);
                }
            }
            if core.state != TrackingState::Running {
                return Err(TrackingError::NotRunning(core.state));
            }

            let Some(sample) = self.source.try_get_latest() else {
                tracing::trace!("No sample this tick");
                return Ok(None);
            };
            let report = core.tick(sample);
            if let Some(report) = &report {
                self.reporter.decision(report);
                if report.is_accepted() {
                    self.reporter.accepted(&report.sample);
                }
            }
            report
        };

        if let Some(report) = &report {
            tracing::debug!(
                reason = %report.label(),
                distance_m = format!("{:.1}", report.decision.distance),
                accuracy_m = format!("{:.1}", report.decision.accuracy),
                threshold_m = format!("{:.1}", report.decision.threshold),
                "Tick decision"
            );
        }
        Ok(report)
    }

    /// Fast-cadence step: publish the latest raw sample.
    fn refresh_current(&self, session_id: u64) {
        let Some(sample) = self.source.try_get_latest() else {
            return;
        };
        let mut core = self.lock_core();
        if !Self::is_current(&core, session_id) {
            return;
        }
        core.latest = Some(sample);
        self.reporter.current(&sample);
    }

    async fn first_fix(&self, initialized: &AtomicBool) -> Result<GeodeticSample, SourceError> {
        self.source.initialize().await?;
        initialized.store(true, Ordering::SeqCst);
        tracing::debug!("Position source initialized, waiting for first fix");

        loop {
            if let Some(sample) = self.source.try_get_latest() {
                return Ok(sample);
            }
            tokio::time::sleep(ACQUIRE_POLL_INTERVAL).await;
        }
    }

    async fn run_acquisition(self: Arc<Self>, session_id: u64, cancellation: CancellationToken) {
        let initialized = AtomicBool::new(false);

        let outcome = tokio::select! {
            _ = cancellation.cancelled() => {
                tracing::debug!(session = session_id, "Acquisition cancelled");
                return;
            }
            outcome = tokio::time::timeout(
                self.config.acquire_timeout,
                self.first_fix(&initialized),
            ) => outcome,
        };

        match outcome {
            Ok(Ok(sample)) => self.on_acquired(session_id, sample),
            Ok(Err(e)) => self.on_unavailable(session_id, TrackingError::SourceUnavailable(e)),
            Err(_) => {
                let e = if initialized.load(Ordering::SeqCst) {
                    SourceError::NoFix
                } else {
                    SourceError::Timeout
                };
                self.on_unavailable(session_id, TrackingError::SourceUnavailable(e));
            }
        }
    }

    fn on_acquired(self: &Arc<Self>, session_id: u64, sample: GeodeticSample) {
        let reference = {
            let mut core = self.lock_core();
            if !Self::is_current(&core, session_id) || core.state != TrackingState::Initializing {
                tracing::trace!(session = session_id, "Ignoring first fix for stale session");
                return;
            }

            let reference = core.reference;
            core.anchor_at(sample, reference);
            self.transition(&mut core, TrackingState::Running);
            self.reporter.accepted(&sample);
            self.ensure_tick_loop(&mut core);
            reference
        };

        tracing::info!(
            session = session_id,
            lat = format!("{:.6}", sample.latitude),
            lon = format!("{:.6}", sample.longitude),
            accuracy_m = format!("{:.1}", sample.accuracy),
            reference = %reference,
            "Anchored on first fix"
        );
    }

    fn on_unavailable(&self, session_id: u64, error: TrackingError) {
        {
            let mut core = self.lock_core();
            if !Self::is_current(&core, session_id) || core.state != TrackingState::Initializing {
                return;
            }

            core.last_error = Some(error.to_string());
            if let Some(session) = core.session.take() {
                session.cancellation.cancel();
            }
            self.transition(&mut core, TrackingState::Unavailable);
        }

        tracing::warn!(session = session_id, error = %error, "Position source unavailable");
    }

    async fn run_ticks(self: Arc<Self>, session_id: u64, cancellation: CancellationToken) {
        let period = self.config.poll_interval;
        let now = tokio::time::Instant::now();
        let first = now.checked_add(period).unwrap_or(now);
        let mut ticker = tokio::time::interval_at(first, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.tick(Some(session_id)) {
                        tracing::trace!(session = session_id, error = %e, "Tick skipped");
                    }
                }
                _ = cancellation.cancelled() => {
                    tracing::debug!(session = session_id, "Tick loop stopped");
                    break;
                }
            }
        }
    }

    async fn run_fast_refresh(self: Arc<Self>, session_id: u64, cancellation: CancellationToken) {
        let mut ticker = tokio::time::interval(self.config.raw_refresh_period());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.refresh_current(session_id);
                }
                _ = cancellation.cancelled() => {
                    tracing::debug!(session = session_id, "Fast refresh stopped");
                    break;
                }
            }
        }
    }
}
