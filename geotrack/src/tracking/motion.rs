//! Smoothed agent motion.
//!
//! The [`MotionController`] owns the agent's displayed pose. Accepted targets
//! are reached through a timed linear interpolation running as a tokio task;
//! a newer target preempts the running one and starts from wherever the agent
//! currently is, so the displayed position never jumps backwards.
//!
//! The pose lives behind its own mutex with a generation counter. A task
//! writes the pose only while its generation is current, and every
//! replacement bumps the generation under that same lock, so a cancelled task
//! can never overwrite a newer move.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::lock_or_recover;
use super::projection::WorldPosition;

/// Shortest allowed move duration.
pub const MIN_MOVE_DURATION: Duration = Duration::from_millis(100);

/// Interpolation step cadence (~60 Hz).
pub const MOTION_STEP: Duration = Duration::from_millis(16);

/// Squared horizontal displacement below which the facing is left unchanged.
pub const YAW_EPSILON_SQ: f32 = 1e-4;

/// Displayed agent position and facing.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AgentPose {
    pub position: WorldPosition,

    /// Heading in degrees, 0 = +z, increasing clockwise towards +x.
    /// `None` until the agent has moved far enough to have a direction.
    pub yaw_degrees: Option<f32>,
}

/// Yaw from `from` towards `to`, ignoring height.
///
/// Returns `None` when the horizontal displacement is too small to define a
/// direction.
pub fn yaw_towards(from: &WorldPosition, to: &WorldPosition) -> Option<f32> {
    let dx = to.x - from.x;
    let dz = to.z - from.z;

    if dx * dx + dz * dz > YAW_EPSILON_SQ {
        Some(dx.atan2(dz).to_degrees().rem_euclid(360.0))
    } else {
        None
    }
}

/// A single timed move between two positions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionPlan {
    pub from: WorldPosition,
    pub to: WorldPosition,
    pub started: Instant,
    pub duration: Duration,
}

impl MotionPlan {
    /// Create a plan; `duration` is raised to at least [`MIN_MOVE_DURATION`].
    pub fn new(from: WorldPosition, to: WorldPosition, started: Instant, duration: Duration) -> Self {
        Self {
            from,
            to,
            started,
            duration: duration.max(MIN_MOVE_DURATION),
        }
    }

    /// Interpolation parameter in `[0, 1]`.
    pub fn progress(&self, now: Instant) -> f32 {
        let elapsed = now.saturating_duration_since(self.started);
        (elapsed.as_secs_f32() / self.duration.as_secs_f32()).clamp(0.0, 1.0)
    }

    pub fn is_complete(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.started) >= self.duration
    }

    /// Position along the move at `now`. Exactly `to` once complete.
    pub fn position_at(&self, now: Instant) -> WorldPosition {
        if self.is_complete(now) {
            self.to
        } else {
            self.from.lerp(&self.to, self.progress(now))
        }
    }
}

#[derive(Debug, Default)]
struct PoseCell {
    pose: AgentPose,
    generation: u64,
}

/// Read-only handle on the agent pose, cheap to clone.
#[derive(Debug, Clone)]
pub struct PoseHandle {
    cell: Arc<Mutex<PoseCell>>,
}

impl PoseHandle {
    pub fn get(&self) -> AgentPose {
        lock_or_recover(&self.cell).pose
    }
}

struct ActiveMotion {
    plan: MotionPlan,
    handle: JoinHandle<()>,
}

/// Drives the agent pose towards accepted targets.
///
/// At most one interpolation task exists at any time. Tasks are spawned on
/// the attached runtime, so moves can be started from any thread once
/// [`attach_runtime`](Self::attach_runtime) has been called. Without a
/// runtime a move lands on its target immediately.
pub struct MotionController {
    cell: Arc<Mutex<PoseCell>>,
    active: Option<ActiveMotion>,
    runtime: Option<Handle>,
}

impl MotionController {
    pub fn new(initial: WorldPosition) -> Self {
        Self {
            cell: Arc::new(Mutex::new(PoseCell {
                pose: AgentPose {
                    position: initial,
                    yaw_degrees: None,
                },
                generation: 0,
            })),
            active: None,
            runtime: Handle::try_current().ok(),
        }
    }

    /// Spawn interpolation tasks on `runtime` from now on.
    pub fn attach_runtime(&mut self, runtime: Handle) {
        self.runtime = Some(runtime);
    }

    pub fn pose(&self) -> AgentPose {
        lock_or_recover(&self.cell).pose
    }

    pub fn pose_handle(&self) -> PoseHandle {
        PoseHandle {
            cell: Arc::clone(&self.cell),
        }
    }

    /// True while an interpolation task is still running.
    pub fn is_moving(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|active| !active.handle.is_finished())
    }

    /// Start moving towards `to` over `duration`, replacing any running move.
    ///
    /// Returns the plan, whose `from` is the interpolated position at the
    /// moment of replacement.
    pub fn start_move(&mut self, to: WorldPosition, duration: Duration) -> MotionPlan {
        let now = Instant::now();
        let Some(runtime) = self.runtime.clone().or_else(|| Handle::try_current().ok()) else {
            let from = self.pose().position;
            tracing::warn!(to = %to, "No tokio runtime for motion, placing agent directly");
            self.teleport(to);
            return MotionPlan::new(from, to, now, duration);
        };

        let (plan, generation) = {
            let mut cell = lock_or_recover(&self.cell);
            let from = self.position_now(&cell, now);
            cell.generation += 1;
            cell.pose.position = from;
            (MotionPlan::new(from, to, now, duration), cell.generation)
        };

        if let Some(previous) = self.active.take() {
            previous.handle.abort();
        }

        tracing::trace!(
            from = %plan.from,
            to = %plan.to,
            duration_ms = plan.duration.as_millis() as u64,
            "Motion started"
        );

        let handle = runtime.spawn(run_motion(Arc::clone(&self.cell), plan, generation));
        self.active = Some(ActiveMotion { plan, handle });
        plan
    }

    /// Place the agent at `position` immediately.
    ///
    /// Returns true if a running move was cancelled.
    pub fn teleport(&mut self, position: WorldPosition) -> bool {
        let cancelled = self.cancel();
        let mut cell = lock_or_recover(&self.cell);
        cell.pose.position = position;
        tracing::trace!(to = %position, "Agent teleported");
        cancelled
    }

    /// Stop any running move where it is.
    ///
    /// Returns true only if a move was actually in progress.
    pub fn cancel(&mut self) -> bool {
        let Some(active) = self.active.take() else {
            return false;
        };

        let now = Instant::now();
        let mut cell = lock_or_recover(&self.cell);
        cell.generation += 1;

        let was_running = !active.handle.is_finished() && !active.plan.is_complete(now);
        active.handle.abort();
        cell.pose.position = active.plan.position_at(now);

        if was_running {
            tracing::trace!(at = %cell.pose.position, "Motion cancelled");
        }
        was_running
    }

    pub fn set_yaw(&mut self, yaw_degrees: f32) {
        lock_or_recover(&self.cell).pose.yaw_degrees = Some(yaw_degrees);
    }

    fn position_now(&self, cell: &PoseCell, now: Instant) -> WorldPosition {
        match &self.active {
            Some(active) if !active.handle.is_finished() => active.plan.position_at(now),
            _ => cell.pose.position,
        }
    }
}

impl Drop for MotionController {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            active.handle.abort();
        }
    }
}

async fn run_motion(cell: Arc<Mutex<PoseCell>>, plan: MotionPlan, generation: u64) {
    let mut ticker = tokio::time::interval(MOTION_STEP);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;

        let now = Instant::now();
        let mut guard = lock_or_recover(&cell);
        if guard.generation != generation {
            return;
        }

        guard.pose.position = plan.position_at(now);
        if plan.is_complete(now) {
            tracing::trace!(at = %plan.to, "Motion complete");
            return;
        }
    }
}
