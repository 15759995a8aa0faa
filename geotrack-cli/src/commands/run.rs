//! Run command - track the simulated walker or a recorded track.
//!
//! Builds a `PositionTracker` from the loaded config, prints every event the
//! tracker publishes, and stops on Ctrl+C, after `--duration`, or when the
//! source becomes unavailable.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use geotrack::config::ConfigFile;
use geotrack::tracking::{
    offset_meters, spawn_position_logger, AxisMapping, BandedSnapper, PathNetwork, PlanarOffset,
    PlanarPoint, PositionTracker, ReplaySource, SampleSource, SimulatedSource, SimulatorConfig,
    TrackerEvent, TracingStatusSink, TrackingError, TrackingState, WorldPosition,
    DEFAULT_LOG_INTERVAL,
};

use crate::error::CliError;
use crate::runner::CliRunner;

/// Buffered events per subscriber before the printer starts lagging.
const EVENT_CAPACITY: usize = 256;

/// Length of the straight path laid along the simulated walk.
const SIMULATED_PATH_SECS: f64 = 3600.0;

/// Arguments for the run command.
#[derive(Debug, Args)]
pub struct RunArgs {
    /// Config file to use (defaults to ~/.geotrack/config.ini)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Play back a recorded JSON track instead of the simulator
    #[arg(long)]
    pub replay: Option<PathBuf>,

    /// Replay speed multiplier
    #[arg(long, default_value = "1.0", requires = "replay")]
    pub speed: f64,

    /// Stop after this many seconds
    #[arg(long)]
    pub duration: Option<f64>,

    /// Re-anchor on the current fix after this many seconds
    #[arg(long)]
    pub reanchor_after: Option<f64>,

    /// Also print raw fixes from the fast refresh
    #[arg(long)]
    pub raw: bool,
}

/// Timing options validated from [`RunArgs`].
#[derive(Debug, Clone, Copy)]
struct RunOptions {
    duration: Option<Duration>,
    reanchor_after: Option<Duration>,
    raw: bool,
}

/// Run the run command.
pub fn run(args: RunArgs) -> Result<(), CliError> {
    let options = RunOptions {
        duration: args.duration.map(|s| seconds("--duration", s)).transpose()?,
        reanchor_after: args
            .reanchor_after
            .map(|s| seconds("--reanchor-after", s))
            .transpose()?,
        raw: args.raw,
    };

    let runner = CliRunner::new(args.config.as_deref())?;
    runner.log_startup("run");
    let config = runner.config();
    let axes = AxisMapping::new(config.tracking.swap_axes);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;

    match args.replay {
        Some(path) => {
            let source = ReplaySource::from_file(&path)
                .map_err(|error| CliError::Replay {
                    path: path.clone(),
                    error,
                })?
                .with_speed(args.speed);
            println!(
                "Replaying {} ({} samples, {:.0}s)",
                path.display(),
                source.len(),
                source.duration_secs()
            );
            let path_network = replay_path(&source, axes);
            runtime.block_on(track(source, path_network, config, options))
        }
        None => {
            let simulator = config.simulator_config();
            println!(
                "Simulating walk from ({:.6}, {:.6})",
                simulator.start_latitude, simulator.start_longitude
            );
            let path_network = simulated_path(&simulator, axes);
            runtime.block_on(track(
                SimulatedSource::new(simulator),
                path_network,
                config,
                options,
            ))
        }
    }
}

fn seconds(flag: &str, value: f64) -> Result<Duration, CliError> {
    Duration::try_from_secs_f64(value).map_err(|_| {
        CliError::Config(format!(
            "{} must be a non-negative number of seconds, got {}",
            flag, value
        ))
    })
}

/// How the tracking loop ended.
enum Outcome {
    Finished,
    Interrupted,
    Unavailable,
}

async fn track<S: SampleSource + 'static>(
    source: S,
    path_network: Option<PathNetwork>,
    config: &ConfigFile,
    options: RunOptions,
) -> Result<(), CliError> {
    let mut builder = PositionTracker::builder(source)
        .config(config.to_tracker_config())
        .status_sink(Arc::new(TracingStatusSink))
        .broadcast_events(EVENT_CAPACITY);

    match (config.snapper_config(), path_network) {
        (Some(snapper_config), Some(network)) => {
            info!(
                segments = network.segments().len(),
                "Snapping accepted targets onto path"
            );
            builder = builder.snapper(Arc::new(BandedSnapper::with_config(network, snapper_config)));
        }
        (Some(_), None) => warn!("Snapping enabled but there is no path to snap to"),
        _ => {}
    }

    let tracker = builder.build();
    let mut events = tracker
        .subscribe()
        .ok_or_else(|| CliError::Config("tracker event channel missing".to_string()))?;

    let cancellation = CancellationToken::new();
    if tracing::enabled!(tracing::Level::DEBUG) {
        spawn_position_logger(tracker.clone(), cancellation.clone(), DEFAULT_LOG_INTERVAL);
    }

    tracker.start();
    println!("Press Ctrl+C to stop");
    println!();

    let deadline = sleep_or_never(options.duration);
    let reanchor = sleep_or_never(options.reanchor_after);
    tokio::pin!(deadline);
    tokio::pin!(reanchor);
    let mut reanchored = false;

    let outcome = loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    if let Some(line) = format_event(&event, options.raw) {
                        println!("{}", line);
                    }
                    if matches!(event, TrackerEvent::Status(TrackingState::Unavailable)) {
                        break Outcome::Unavailable;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Event printer lagging, events dropped");
                }
                Err(RecvError::Closed) => break Outcome::Finished,
            },
            _ = &mut reanchor, if !reanchored => {
                reanchored = true;
                let reference = tracker.pose().position;
                match tracker.reanchor(reference) {
                    Ok(sample) => println!("[reanchor] {} -> {}", sample, reference),
                    Err(e) => println!("[reanchor] skipped: {}", e),
                }
            }
            _ = &mut deadline => break Outcome::Finished,
            _ = tokio::signal::ctrl_c() => break Outcome::Interrupted,
        }
    };

    let snapshot = tracker.snapshot();
    tracker.stop();
    cancellation.cancel();

    if matches!(outcome, Outcome::Interrupted) {
        println!();
        println!("Interrupted");
    }
    println!();
    println!(
        "Ticks: {} processed, {} accepted, {} rejected",
        snapshot.counters.processed, snapshot.counters.accepted, snapshot.counters.rejected
    );
    println!("Final position: {}", snapshot.pose.position);

    match outcome {
        Outcome::Unavailable => {
            if let Some(reason) = &snapshot.last_error {
                eprintln!("{}", reason);
            }
            Err(CliError::Tracking(TrackingError::NotRunning(
                TrackingState::Unavailable,
            )))
        }
        Outcome::Finished | Outcome::Interrupted => Ok(()),
    }
}

async fn sleep_or_never(duration: Option<Duration>) {
    match duration {
        Some(duration) => tokio::time::sleep(duration).await,
        None => std::future::pending().await,
    }
}

/// One console line per event. Raw fixes are hidden unless `raw` is set.
fn format_event(event: &TrackerEvent, raw: bool) -> Option<String> {
    match event {
        TrackerEvent::Status(state) => Some(format!("[status] {}", state)),
        TrackerEvent::Current(sample) => raw.then(|| format!("[raw] {}", sample)),
        TrackerEvent::Accepted(sample) => Some(format!("[accepted] {}", sample)),
        TrackerEvent::Decision(report) => Some(match report.target {
            Some(target) => format!("[tick] {} -> {}", report, target),
            None => format!("[tick] {}", report),
        }),
    }
}

/// A straight path along the simulated walking direction.
fn simulated_path(config: &SimulatorConfig, axes: AxisMapping) -> Option<PathNetwork> {
    if config.north_meters_per_sec == 0.0 && config.east_meters_per_sec == 0.0 {
        return None;
    }

    let end = PlanarOffset::new(
        config.east_meters_per_sec * SIMULATED_PATH_SECS,
        config.north_meters_per_sec * SIMULATED_PATH_SECS,
    );
    let points = [
        axes.to_world(&WorldPosition::ORIGIN, PlanarOffset::new(0.0, 0.0))
            .planar(),
        axes.to_world(&WorldPosition::ORIGIN, end).planar(),
    ];
    Some(PathNetwork::from_polyline(&points))
}

/// The recorded track itself, relative to its first sample.
fn replay_path(source: &ReplaySource, axes: AxisMapping) -> Option<PathNetwork> {
    let samples = source.samples();
    let first = samples.first()?;
    if samples.len() < 2 {
        return None;
    }

    let points: Vec<PlanarPoint> = samples
        .iter()
        .map(|sample| {
            axes.to_world(&WorldPosition::ORIGIN, offset_meters(first, sample))
                .planar()
        })
        .collect();
    Some(PathNetwork::from_polyline(&points))
}
