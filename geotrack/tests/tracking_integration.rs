//! Integration tests for the position tracker.
//!
//! These tests drive a `PositionTracker` end to end against a scripted
//! source and verify:
//! - Acquisition, anchoring and the first-sample gate bypass
//! - Gate outcomes through on-demand ticks
//! - Re-anchoring from any state
//! - Stop/restart lifecycle and source release
//! - The fast refresh cadence and observer fan-out
//!
//! Run with: `cargo test --test tracking_integration`

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use geotrack::tracking::{
    DecisionReason, GeodeticSample, PositionTracker, SampleSource, SourceError, StatusSink,
    StatusSinkError, TickReport, TrackerConfig, TrackerEvent, TrackingError, TrackingState,
    WorldPosition,
};

// ============================================================================
// Test Helpers
// ============================================================================

const ANCHOR_LAT: f64 = 38.4237;
const ANCHOR_LON: f64 = 27.1428;

const SETTLE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy)]
enum InitBehavior {
    Ready,
    Fail,
    Hang,
}

/// Scripted source: the test decides what `try_get_latest` returns.
struct MockSource {
    behavior: InitBehavior,
    sample: Mutex<Option<GeodeticSample>>,
    init_calls: AtomicUsize,
    shutdown_calls: AtomicUsize,
}

impl MockSource {
    fn new(behavior: InitBehavior, sample: Option<GeodeticSample>) -> Self {
        Self {
            behavior,
            sample: Mutex::new(sample),
            init_calls: AtomicUsize::new(0),
            shutdown_calls: AtomicUsize::new(0),
        }
    }

    fn ready_at(sample: GeodeticSample) -> Self {
        Self::new(InitBehavior::Ready, Some(sample))
    }

    fn set(&self, sample: Option<GeodeticSample>) {
        *self.sample.lock().unwrap() = sample;
    }

    fn init_calls(&self) -> usize {
        self.init_calls.load(Ordering::SeqCst)
    }

    fn shutdown_calls(&self) -> usize {
        self.shutdown_calls.load(Ordering::SeqCst)
    }
}

impl SampleSource for MockSource {
    async fn initialize(&self) -> Result<(), SourceError> {
        self.init_calls.fetch_add(1, Ordering::SeqCst);
        match self.behavior {
            InitBehavior::Ready => Ok(()),
            InitBehavior::Fail => Err(SourceError::PermissionDenied),
            InitBehavior::Hang => std::future::pending().await,
        }
    }

    fn try_get_latest(&self) -> Option<GeodeticSample> {
        *self.sample.lock().unwrap()
    }

    fn shutdown(&self) {
        self.shutdown_calls.fetch_add(1, Ordering::SeqCst);
    }
}

/// Sink that records everything it is told.
#[derive(Default)]
struct RecordingSink {
    statuses: Mutex<Vec<TrackingState>>,
    current: AtomicUsize,
    accepted: Mutex<Vec<GeodeticSample>>,
    decisions: Mutex<Vec<DecisionReason>>,
}

impl RecordingSink {
    fn statuses(&self) -> Vec<TrackingState> {
        self.statuses.lock().unwrap().clone()
    }

    fn accepted(&self) -> Vec<GeodeticSample> {
        self.accepted.lock().unwrap().clone()
    }

    fn decisions(&self) -> Vec<DecisionReason> {
        self.decisions.lock().unwrap().clone()
    }
}

impl StatusSink for RecordingSink {
    fn on_status(&self, state: TrackingState) -> Result<(), StatusSinkError> {
        self.statuses.lock().unwrap().push(state);
        Ok(())
    }

    fn on_current(&self, _sample: &GeodeticSample) -> Result<(), StatusSinkError> {
        self.current.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn on_accepted(&self, sample: &GeodeticSample) -> Result<(), StatusSinkError> {
        self.accepted.lock().unwrap().push(*sample);
        Ok(())
    }

    fn on_decision(&self, report: &TickReport) -> Result<(), StatusSinkError> {
        self.decisions.lock().unwrap().push(report.reason());
        Ok(())
    }
}

/// Sink that always fails, to check the pipeline ignores observer errors.
struct FailingSink;

impl StatusSink for FailingSink {
    fn on_status(&self, _state: TrackingState) -> Result<(), StatusSinkError> {
        Err(StatusSinkError::Rejected("closed".to_string()))
    }

    fn on_accepted(&self, _sample: &GeodeticSample) -> Result<(), StatusSinkError> {
        Err(StatusSinkError::Rejected("closed".to_string()))
    }
}

fn anchor_sample() -> GeodeticSample {
    GeodeticSample::new(ANCHOR_LAT, ANCHOR_LON, 4.0, 0.0)
}

/// A sample `north_deg` degrees of latitude north of the anchor.
fn north_of_anchor(north_deg: f64, accuracy: f64) -> GeodeticSample {
    GeodeticSample::new(ANCHOR_LAT + north_deg, ANCHOR_LON, accuracy, 1.0)
}

/// Manual ticks, instant moves.
fn manual_config() -> TrackerConfig {
    TrackerConfig::new()
        .with_automatic_ticks(false)
        .with_smoothing(false)
}

fn tracker_with_sink(
    source: MockSource,
    config: TrackerConfig,
) -> (PositionTracker<MockSource>, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::default());
    let tracker = PositionTracker::builder(source)
        .config(config)
        .status_sink(sink.clone())
        .build();
    (tracker, sink)
}

async fn running_tracker(config: TrackerConfig) -> (PositionTracker<MockSource>, Arc<RecordingSink>) {
    let (tracker, sink) = tracker_with_sink(MockSource::ready_at(anchor_sample()), config);
    assert!(tracker.start());
    tracker.wait_for_running(SETTLE).await.unwrap();
    (tracker, sink)
}

fn assert_near(actual: f32, expected: f32, tolerance: f32) {
    assert!(
        (actual - expected).abs() <= tolerance,
        "expected {} within {} of {}",
        actual,
        tolerance,
        expected
    );
}

// ============================================================================
// Acquisition
// ============================================================================

#[tokio::test]
async fn test_first_fix_bypasses_gate() {
    // Accuracy this poor would fail the gate on any later tick
    let first = GeodeticSample::new(ANCHOR_LAT, ANCHOR_LON, 60.0, 0.0);
    let (tracker, sink) = tracker_with_sink(MockSource::ready_at(first), manual_config());

    assert!(tracker.start());
    assert_eq!(tracker.state(), TrackingState::Initializing);
    tracker.wait_for_running(SETTLE).await.unwrap();

    let snapshot = tracker.snapshot();
    assert_eq!(snapshot.state, TrackingState::Running);
    assert_eq!(snapshot.anchor, Some(first));
    let last = snapshot.last_accepted.unwrap();
    assert_eq!(last.source_sample, first);
    assert_eq!(last.target, WorldPosition::ORIGIN);
    assert_eq!(snapshot.pose.position, WorldPosition::ORIGIN);

    assert_eq!(
        sink.statuses(),
        vec![TrackingState::Initializing, TrackingState::Running]
    );
    assert_eq!(sink.accepted(), vec![first]);
    assert!(sink.decisions().is_empty());
    assert_eq!(tracker.source().init_calls(), 1);

    tracker.stop();
}

#[tokio::test]
async fn test_anchor_placed_at_configured_reference() {
    let reference = WorldPosition::new(100.0, 2.0, -50.0);
    let (tracker, _sink) = running_tracker(manual_config().with_reference(reference)).await;

    assert_eq!(tracker.pose().position, reference);

    tracker.source().set(Some(north_of_anchor(0.00003, 5.0)));
    tracker.poll_now().unwrap().unwrap();

    let pose = tracker.pose();
    assert_near(pose.position.x, 100.0, 0.01);
    assert_near(pose.position.y, 2.0, 0.001);
    assert_near(pose.position.z, -50.0 + 3.34, 0.05);

    tracker.stop();
}

#[tokio::test]
async fn test_init_failure_makes_unavailable() {
    let source = MockSource::new(InitBehavior::Fail, Some(anchor_sample()));
    let (tracker, sink) = tracker_with_sink(source, manual_config());

    tracker.start();
    let err = tracker.wait_for_running(SETTLE).await.unwrap_err();

    assert!(matches!(
        err,
        TrackingError::NotRunning(TrackingState::Unavailable)
    ));
    let snapshot = tracker.snapshot();
    assert!(snapshot.anchor.is_none());
    assert!(snapshot
        .last_error
        .unwrap()
        .contains("Location permission denied"));
    assert_eq!(
        sink.statuses(),
        vec![TrackingState::Initializing, TrackingState::Unavailable]
    );
    assert!(matches!(
        tracker.poll_now(),
        Err(TrackingError::NotRunning(TrackingState::Unavailable))
    ));
}

#[tokio::test]
async fn test_hanging_init_times_out() {
    let source = MockSource::new(InitBehavior::Hang, Some(anchor_sample()));
    let config = manual_config().with_acquire_timeout(Duration::from_millis(150));
    let (tracker, _sink) = tracker_with_sink(source, config);

    tracker.start();
    let err = tracker.wait_for_running(SETTLE).await.unwrap_err();

    assert!(matches!(
        err,
        TrackingError::NotRunning(TrackingState::Unavailable)
    ));
    assert!(tracker
        .snapshot()
        .last_error
        .unwrap()
        .contains("Timed out waiting for location service"));
}

#[tokio::test]
async fn test_missing_first_fix_times_out() {
    let source = MockSource::new(InitBehavior::Ready, None);
    let config = manual_config().with_acquire_timeout(Duration::from_millis(150));
    let (tracker, _sink) = tracker_with_sink(source, config);

    tracker.start();
    assert!(tracker.wait_for_running(SETTLE).await.is_err());

    assert_eq!(tracker.state(), TrackingState::Unavailable);
    assert!(tracker
        .snapshot()
        .last_error
        .unwrap()
        .contains("No position fix available"));
}

#[tokio::test]
async fn test_restart_after_unavailable_releases_previous_hold() {
    let source = MockSource::new(InitBehavior::Ready, None);
    let config = manual_config().with_acquire_timeout(Duration::from_millis(150));
    let (tracker, _sink) = tracker_with_sink(source, config);

    tracker.start();
    assert!(tracker.wait_for_running(SETTLE).await.is_err());
    assert_eq!(tracker.source().shutdown_calls(), 0);

    tracker.source().set(Some(anchor_sample()));
    assert!(tracker.start());
    assert_eq!(tracker.source().shutdown_calls(), 1);

    tracker.wait_for_running(SETTLE).await.unwrap();
    assert_eq!(tracker.source().init_calls(), 2);
    assert!(tracker.snapshot().last_error.is_none());

    tracker.stop();
    assert_eq!(tracker.source().shutdown_calls(), 2);
}

// ============================================================================
// Gate through the tracker
// ============================================================================

#[tokio::test]
async fn test_jitter_does_not_move_agent() {
    let (tracker, sink) = running_tracker(manual_config()).await;

    // ~3.3 m with 20 m accuracy: well inside the noise envelope
    tracker.source().set(Some(north_of_anchor(0.00003, 20.0)));
    let report = tracker.poll_now().unwrap().unwrap();

    assert_eq!(report.reason(), DecisionReason::RejectedJitter);
    assert!((report.decision.distance - 3.34).abs() < 0.05);
    assert_eq!(report.decision.threshold, 30.0);
    assert!(report.target.is_none());

    let snapshot = tracker.snapshot();
    assert_eq!(snapshot.pose.position, WorldPosition::ORIGIN);
    assert_eq!(snapshot.last_accepted.unwrap().source_sample, anchor_sample());
    assert_eq!(snapshot.counters.rejected, 1);
    assert_eq!(sink.decisions(), vec![DecisionReason::RejectedJitter]);
    assert_eq!(sink.accepted(), vec![anchor_sample()]);

    tracker.stop();
}

#[tokio::test]
async fn test_accurate_small_move_accepted() {
    let (tracker, sink) = running_tracker(manual_config()).await;

    let moved = north_of_anchor(0.00003, 5.0);
    tracker.source().set(Some(moved));
    let report = tracker.poll_now().unwrap().unwrap();

    assert_eq!(report.reason(), DecisionReason::AcceptedAccuracy);

    let pose = tracker.pose();
    assert_near(pose.position.x, 0.0, 0.01);
    assert_near(pose.position.z, 3.34, 0.05);
    // Moving north faces 0 degrees
    assert_near(pose.yaw_degrees.unwrap(), 0.0, 0.5);

    let snapshot = tracker.snapshot();
    assert_eq!(snapshot.last_accepted.unwrap().source_sample, moved);
    assert_eq!(snapshot.anchor, Some(anchor_sample()));
    assert_eq!(sink.accepted(), vec![anchor_sample(), moved]);

    tracker.stop();
}

#[tokio::test]
async fn test_distance_measured_from_last_accepted() {
    let (tracker, _sink) = running_tracker(manual_config()).await;

    // ~40 m with 20 m accuracy exceeds max(10, 30)
    tracker.source().set(Some(north_of_anchor(0.00036, 20.0)));
    let far = tracker.poll_now().unwrap().unwrap();
    assert_eq!(far.reason(), DecisionReason::AcceptedDistance);

    // ~56 m from the anchor but only ~16 m from the last accepted target
    tracker.source().set(Some(north_of_anchor(0.0005, 20.0)));
    let next = tracker.poll_now().unwrap().unwrap();
    assert_eq!(next.reason(), DecisionReason::RejectedJitter);
    assert!(next.decision.distance < 20.0);

    tracker.stop();
}

#[tokio::test]
async fn test_no_sample_tick_is_noop() {
    let (tracker, sink) = running_tracker(manual_config()).await;

    tracker.source().set(None);
    assert!(tracker.poll_now().unwrap().is_none());

    assert_eq!(tracker.snapshot().counters.processed, 0);
    assert!(sink.decisions().is_empty());

    tracker.stop();
}

#[tokio::test]
async fn test_swap_axes_maps_north_to_x() {
    let (tracker, _sink) = running_tracker(manual_config().with_swap_axes(true)).await;

    tracker.source().set(Some(north_of_anchor(0.00003, 5.0)));
    tracker.poll_now().unwrap().unwrap();

    let pose = tracker.pose();
    assert_near(pose.position.x, 3.34, 0.05);
    assert_near(pose.position.z, 0.0, 0.01);

    tracker.stop();
}

#[tokio::test]
async fn test_automatic_ticks_move_agent() {
    let config = TrackerConfig::new()
        .with_poll_interval(Duration::from_secs(1))
        .with_smoothing(false);
    let (tracker, sink) = running_tracker(config).await;

    tracker.source().set(Some(north_of_anchor(0.00003, 5.0)));
    tokio::time::sleep(Duration::from_millis(1400)).await;

    assert_near(tracker.pose().position.z, 3.34, 0.05);
    assert!(sink
        .decisions()
        .contains(&DecisionReason::AcceptedAccuracy));

    tracker.stop();
}

#[tokio::test]
async fn test_smoothing_animates_accepted_move() {
    let config = manual_config()
        .with_smoothing(true)
        .with_smoothing_duration(Duration::from_millis(300));
    let (tracker, _sink) = running_tracker(config).await;

    tracker.source().set(Some(north_of_anchor(0.00036, 5.0)));
    let report = tracker.poll_now().unwrap().unwrap();
    let target = report.target.unwrap();

    // The move has only just been scheduled
    assert!(tracker.pose().position.z < target.z);

    tokio::time::sleep(Duration::from_millis(600)).await;
    let pose = tracker.pose();
    assert_near(pose.position.z, target.z, 0.01);
    assert_eq!(tracker.snapshot().last_accepted.unwrap().target, target);

    tracker.stop();
}

// ============================================================================
// Re-anchoring
// ============================================================================

#[tokio::test]
async fn test_reanchor_while_running() {
    let (tracker, sink) = running_tracker(manual_config()).await;

    let elsewhere = north_of_anchor(0.001, 12.0);
    tracker.source().set(Some(elsewhere));
    let reference = WorldPosition::new(10.0, 0.0, 5.0);

    let anchored = tracker.reanchor(reference).unwrap();
    assert_eq!(anchored, elsewhere);

    let snapshot = tracker.snapshot();
    assert_eq!(snapshot.state, TrackingState::Running);
    assert_eq!(snapshot.anchor, Some(elsewhere));
    assert_eq!(snapshot.reference, reference);
    assert_eq!(snapshot.pose.position, reference);
    let last = snapshot.last_accepted.unwrap();
    assert_eq!(last.target, reference);
    assert_eq!(last.source_sample, elsewhere);

    // The same fix now sits exactly on the anchor
    let report = tracker.poll_now().unwrap().unwrap();
    assert_eq!(report.decision.distance, 0.0);
    assert_eq!(tracker.pose().position, reference);

    assert_eq!(sink.accepted().last(), Some(&elsewhere));
    tracker.stop();
}

#[tokio::test]
async fn test_reanchor_without_sample_changes_nothing() {
    let (tracker, sink) = tracker_with_sink(MockSource::new(InitBehavior::Ready, None), manual_config());

    let err = tracker.reanchor(WorldPosition::new(1.0, 0.0, 1.0)).unwrap_err();

    assert!(matches!(err, TrackingError::NoSampleAvailable));
    let snapshot = tracker.snapshot();
    assert_eq!(snapshot.state, TrackingState::Stopped);
    assert!(snapshot.anchor.is_none());
    assert_eq!(snapshot.pose.position, WorldPosition::ORIGIN);
    assert!(sink.statuses().is_empty());
}

#[tokio::test]
async fn test_reanchor_from_stopped_starts_running() {
    let (tracker, sink) = tracker_with_sink(MockSource::ready_at(anchor_sample()), manual_config());

    tracker.reanchor(WorldPosition::ORIGIN).unwrap();

    assert_eq!(tracker.state(), TrackingState::Running);
    assert_eq!(sink.statuses(), vec![TrackingState::Running]);

    tracker.source().set(Some(north_of_anchor(0.00003, 5.0)));
    assert!(tracker.poll_now().unwrap().unwrap().is_accepted());

    // The source was never started, so there is nothing to release
    assert!(tracker.stop());
    assert_eq!(tracker.source().init_calls(), 0);
    assert_eq!(tracker.source().shutdown_calls(), 0);
}

#[tokio::test]
async fn test_reanchor_after_unavailable_keeps_single_release() {
    let source = MockSource::new(InitBehavior::Fail, Some(anchor_sample()));
    let (tracker, _sink) = tracker_with_sink(source, manual_config());

    tracker.start();
    assert!(tracker.wait_for_running(SETTLE).await.is_err());
    assert_eq!(tracker.state(), TrackingState::Unavailable);

    tracker.reanchor(WorldPosition::ORIGIN).unwrap();
    assert_eq!(tracker.state(), TrackingState::Running);

    assert!(tracker.stop());
    assert_eq!(tracker.source().init_calls(), 1);
    assert_eq!(tracker.source().shutdown_calls(), 1);
}

#[tokio::test]
async fn test_reanchor_during_initialization_wins() {
    let source = MockSource::new(InitBehavior::Hang, Some(anchor_sample()));
    let config = manual_config().with_acquire_timeout(Duration::from_millis(200));
    let (tracker, _sink) = tracker_with_sink(source, config);

    tracker.start();
    let reference = WorldPosition::new(3.0, 0.0, 3.0);
    tracker.reanchor(reference).unwrap();
    assert_eq!(tracker.state(), TrackingState::Running);

    // The acquisition timeout must not knock a re-anchored tracker over
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(tracker.state(), TrackingState::Running);
    assert_eq!(tracker.pose().position, reference);

    tracker.stop();
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test]
async fn test_start_twice_is_rejected() {
    let (tracker, _sink) = running_tracker(manual_config()).await;

    assert!(!tracker.start());
    assert_eq!(tracker.source().init_calls(), 1);

    tracker.stop();
}

#[tokio::test]
async fn test_stop_is_idempotent() {
    let (tracker, sink) = running_tracker(manual_config()).await;

    assert!(tracker.stop());
    assert!(!tracker.stop());
    assert!(!tracker.stop());

    assert_eq!(tracker.source().shutdown_calls(), 1);
    let snapshot = tracker.snapshot();
    assert_eq!(snapshot.state, TrackingState::Stopped);
    assert!(snapshot.anchor.is_none());
    assert!(snapshot.last_accepted.is_none());
    assert_eq!(
        sink.statuses(),
        vec![
            TrackingState::Initializing,
            TrackingState::Running,
            TrackingState::Stopped
        ]
    );
    assert!(matches!(
        tracker.poll_now(),
        Err(TrackingError::NotRunning(TrackingState::Stopped))
    ));
}

#[tokio::test]
async fn test_stop_during_initialization() {
    let source = MockSource::new(InitBehavior::Hang, Some(anchor_sample()));
    let (tracker, _sink) = tracker_with_sink(source, manual_config());

    tracker.start();
    assert!(tracker.stop());
    assert_eq!(tracker.source().shutdown_calls(), 1);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(tracker.state(), TrackingState::Stopped);
}

#[tokio::test]
async fn test_restart_after_stop_reanchors() {
    let (tracker, _sink) = running_tracker(manual_config()).await;
    let first_session = tracker.snapshot().session;
    tracker.stop();

    let moved = north_of_anchor(0.002, 6.0);
    tracker.source().set(Some(moved));
    assert!(tracker.start());
    tracker.wait_for_running(SETTLE).await.unwrap();

    let snapshot = tracker.snapshot();
    assert_ne!(snapshot.session, first_session);
    assert_eq!(snapshot.anchor, Some(moved));
    assert_eq!(snapshot.pose.position, WorldPosition::ORIGIN);
    assert_eq!(snapshot.counters.processed, 0);

    tracker.stop();
    assert_eq!(tracker.source().shutdown_calls(), 2);
}

#[tokio::test]
async fn test_stop_cancels_motion() {
    let config = manual_config()
        .with_smoothing(true)
        .with_smoothing_duration(Duration::from_secs(5));
    let (tracker, _sink) = running_tracker(config).await;

    tracker.source().set(Some(north_of_anchor(0.00036, 5.0)));
    tracker.poll_now().unwrap().unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    tracker.stop();
    let stopped_at = tracker.pose().position;
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(tracker.pose().position, stopped_at);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_host_thread_drives_ticks() {
    let config = manual_config()
        .with_smoothing(true)
        .with_smoothing_duration(Duration::from_millis(100));
    let (tracker, sink) = running_tracker(config).await;
    tracker.source().set(Some(north_of_anchor(0.00036, 5.0)));

    // A host scheduler thread with no tokio context of its own
    let host = tracker.clone();
    let report = std::thread::spawn(move || host.poll_now())
        .join()
        .expect("host thread panicked")
        .unwrap()
        .unwrap();
    assert!(report.is_accepted());

    let target = report.target.unwrap();
    let snapshot = tracker.snapshot();
    assert_eq!(snapshot.counters.accepted, 1);
    assert_eq!(snapshot.last_accepted.unwrap().target, target);

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(tracker.pose().position, target);

    let host = tracker.clone();
    assert!(std::thread::spawn(move || host.stop()).join().unwrap());
    assert_eq!(sink.statuses().last(), Some(&TrackingState::Stopped));
}

#[test]
fn test_no_runtime_refuses_to_start() {
    let (tracker, sink) = tracker_with_sink(MockSource::ready_at(anchor_sample()), manual_config());

    assert!(!tracker.start());
    assert!(matches!(
        tracker.reanchor(WorldPosition::ORIGIN),
        Err(TrackingError::NoRuntime)
    ));
    assert_eq!(tracker.state(), TrackingState::Stopped);
    assert!(tracker.snapshot().anchor.is_none());
    assert!(sink.statuses().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_lifecycle_keeps_observers_in_order() {
    let config = manual_config().with_raw_refresh_hz(50.0);
    let (tracker, sink) = tracker_with_sink(MockSource::ready_at(anchor_sample()), config);

    let workers: Vec<_> = (0..4)
        .map(|worker| {
            let tracker = tracker.clone();
            tokio::spawn(async move {
                for step in 0..60 {
                    match (step + worker) % 3 {
                        0 => {
                            tracker.start();
                        }
                        1 => {
                            let _ = tracker.reanchor(WorldPosition::ORIGIN);
                        }
                        _ => {
                            tracker.stop();
                        }
                    }
                    tokio::task::yield_now().await;
                }
            })
        })
        .collect();
    for worker in workers {
        worker.await.unwrap();
    }

    // Let any acquisition still in flight settle
    tokio::time::sleep(Duration::from_millis(300)).await;

    let statuses = sink.statuses();
    assert!(!statuses.is_empty());
    assert_eq!(statuses.last(), Some(&tracker.state()));
    assert_eq!(*tracker.watch_state().borrow(), tracker.state());

    // Every reported status is a real change from the one before it
    let mut previous = TrackingState::Stopped;
    for state in statuses {
        assert_ne!(state, previous);
        previous = state;
    }

    tracker.stop();
}

// ============================================================================
// Fast cadence and observers
// ============================================================================

#[tokio::test]
async fn test_fast_refresh_does_not_touch_bookkeeping() {
    let config = manual_config().with_raw_refresh_hz(20.0);
    let (tracker, sink) = running_tracker(config).await;

    let moved = north_of_anchor(0.00036, 5.0);
    tracker.source().set(Some(moved));
    tokio::time::sleep(Duration::from_millis(300)).await;

    let snapshot = tracker.snapshot();
    assert_eq!(snapshot.latest, Some(moved));
    assert_eq!(snapshot.anchor, Some(anchor_sample()));
    assert_eq!(snapshot.last_accepted.unwrap().source_sample, anchor_sample());
    assert_eq!(snapshot.pose.position, WorldPosition::ORIGIN);
    assert_eq!(snapshot.counters.processed, 0);
    assert!(sink.current.load(Ordering::SeqCst) > 0);

    tracker.stop();
}

#[tokio::test]
async fn test_broadcast_events() {
    let tracker = PositionTracker::builder(MockSource::ready_at(anchor_sample()))
        .config(manual_config())
        .broadcast_events(64)
        .build();
    let mut events = tracker.subscribe().unwrap();

    tracker.start();
    tracker.wait_for_running(SETTLE).await.unwrap();
    tracker.source().set(Some(north_of_anchor(0.00003, 20.0)));
    tracker.poll_now().unwrap();
    tracker.stop();

    let mut received = Vec::new();
    while let Ok(event) = events.try_recv() {
        received.push(event);
    }

    let lifecycle: Vec<TrackingState> = received
        .iter()
        .filter_map(|event| match event {
            TrackerEvent::Status(state) => Some(*state),
            _ => None,
        })
        .collect();
    assert_eq!(
        lifecycle,
        vec![
            TrackingState::Initializing,
            TrackingState::Running,
            TrackingState::Stopped
        ]
    );
    assert!(received
        .iter()
        .any(|event| matches!(event, TrackerEvent::Accepted(s) if *s == anchor_sample())));
    assert!(received.iter().any(|event| matches!(
        event,
        TrackerEvent::Decision(report) if report.reason() == DecisionReason::RejectedJitter
    )));
}

#[tokio::test]
async fn test_subscribe_without_broadcast() {
    let tracker = PositionTracker::new(MockSource::ready_at(anchor_sample()), manual_config());
    assert!(tracker.subscribe().is_none());
}

#[tokio::test]
async fn test_failing_sink_does_not_break_tracking() {
    let tracker = PositionTracker::builder(MockSource::ready_at(anchor_sample()))
        .config(manual_config())
        .status_sink(Arc::new(FailingSink))
        .build();

    tracker.start();
    tracker.wait_for_running(SETTLE).await.unwrap();

    tracker.source().set(Some(north_of_anchor(0.00003, 5.0)));
    assert!(tracker.poll_now().unwrap().unwrap().is_accepted());

    tracker.stop();
}

#[tokio::test]
async fn test_watch_state_follows_lifecycle() {
    let (tracker, _sink) = tracker_with_sink(MockSource::ready_at(anchor_sample()), manual_config());
    let mut state = tracker.watch_state();
    assert_eq!(*state.borrow(), TrackingState::Stopped);

    tracker.start();
    let running = tokio::time::timeout(SETTLE, state.wait_for(|s| *s == TrackingState::Running))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(*running, TrackingState::Running);
    drop(running);

    tracker.stop();
    assert_eq!(*state.borrow_and_update(), TrackingState::Stopped);
}
