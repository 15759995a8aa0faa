//! Surface snapping.
//!
//! After the gate accepts a target, an optional [`SurfaceSnapper`] may move
//! its planar part onto a constraint surface (footpaths, corridors). The
//! tracker keeps the vertical reference and records whether a snap happened.
//!
//! [`BandedSnapper`] only snaps fixes in a middle accuracy band: precise fixes
//! are trusted as-is and very noisy ones are too far off to be worth pulling
//! onto the nearest path.

use super::projection::PlanarPoint;

/// Default lower accuracy bound for snapping (meters).
pub const DEFAULT_MIN_SNAP_ACCURACY_METERS: f64 = 8.0;

/// Default upper accuracy bound for snapping (meters).
pub const DEFAULT_MAX_SNAP_ACCURACY_METERS: f64 = 20.0;

/// Default search radius around the desired point (meters).
pub const DEFAULT_MAX_SNAP_DISTANCE_METERS: f32 = 5.0;

/// Optionally reconcile an accepted planar target with a constraint surface.
pub trait SurfaceSnapper: Send + Sync {
    /// Returns the snapped point, or `None` to use `desired` unchanged.
    fn try_snap(&self, desired: PlanarPoint, accuracy_meters: f64) -> Option<PlanarPoint>;
}

/// A surface that can answer nearest-navigable-point queries.
pub trait NavigableSurface: Send + Sync {
    /// Closest navigable point to `point` no farther than `max_distance`.
    fn nearest_point(&self, point: PlanarPoint, max_distance: f32) -> Option<PlanarPoint>;
}

/// Configuration for [`BandedSnapper`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnapperConfig {
    /// Fixes more precise than this are not snapped.
    pub min_accuracy_meters: f64,

    /// Fixes less precise than this are not snapped.
    pub max_accuracy_meters: f64,

    /// How far the snapped point may be from the desired one.
    pub max_snap_distance_meters: f32,
}

impl Default for SnapperConfig {
    fn default() -> Self {
        Self {
            min_accuracy_meters: DEFAULT_MIN_SNAP_ACCURACY_METERS,
            max_accuracy_meters: DEFAULT_MAX_SNAP_ACCURACY_METERS,
            max_snap_distance_meters: DEFAULT_MAX_SNAP_DISTANCE_METERS,
        }
    }
}

/// Snaps to a [`NavigableSurface`] only inside an accuracy band.
pub struct BandedSnapper<S: NavigableSurface> {
    surface: S,
    config: SnapperConfig,
}

impl<S: NavigableSurface> BandedSnapper<S> {
    pub fn new(surface: S) -> Self {
        Self::with_config(surface, SnapperConfig::default())
    }

    pub fn with_config(surface: S, config: SnapperConfig) -> Self {
        Self { surface, config }
    }

    pub fn config(&self) -> &SnapperConfig {
        &self.config
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    fn in_band(&self, accuracy_meters: f64) -> bool {
        accuracy_meters >= self.config.min_accuracy_meters
            && accuracy_meters <= self.config.max_accuracy_meters
    }
}

impl<S: NavigableSurface> SurfaceSnapper for BandedSnapper<S> {
    fn try_snap(&self, desired: PlanarPoint, accuracy_meters: f64) -> Option<PlanarPoint> {
        if !self.in_band(accuracy_meters) {
            tracing::trace!(
                accuracy_m = accuracy_meters,
                min = self.config.min_accuracy_meters,
                max = self.config.max_accuracy_meters,
                "Accuracy outside snap band"
            );
            return None;
        }

        self.surface
            .nearest_point(desired, self.config.max_snap_distance_meters)
    }
}

/// A straight piece of a path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathSegment {
    pub start: PlanarPoint,
    pub end: PlanarPoint,
}

impl PathSegment {
    pub fn new(start: PlanarPoint, end: PlanarPoint) -> Self {
        Self { start, end }
    }

    /// Closest point on the segment to `point`.
    pub fn closest_point(&self, point: PlanarPoint) -> PlanarPoint {
        let dx = self.end.x - self.start.x;
        let dz = self.end.z - self.start.z;
        let length_sq = dx * dx + dz * dz;

        if length_sq <= f32::EPSILON {
            return self.start;
        }

        let t = ((point.x - self.start.x) * dx + (point.z - self.start.z) * dz) / length_sq;
        let t = t.clamp(0.0, 1.0);

        PlanarPoint {
            x: self.start.x + dx * t,
            z: self.start.z + dz * t,
        }
    }
}

/// A set of walkable polylines in world x/z.
#[derive(Debug, Clone, Default)]
pub struct PathNetwork {
    segments: Vec<PathSegment>,
}

impl PathNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a network from a single polyline.
    pub fn from_polyline(points: &[PlanarPoint]) -> Self {
        let mut network = Self::new();
        network.add_polyline(points);
        network
    }

    /// Add consecutive points as connected segments.
    ///
    /// Fewer than two points adds nothing.
    pub fn add_polyline(&mut self, points: &[PlanarPoint]) {
        self.segments.extend(
            points
                .windows(2)
                .map(|pair| PathSegment::new(pair[0], pair[1])),
        );
    }

    pub fn add_segment(&mut self, segment: PathSegment) {
        self.segments.push(segment);
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

impl NavigableSurface for PathNetwork {
    fn nearest_point(&self, point: PlanarPoint, max_distance: f32) -> Option<PlanarPoint> {
        self.segments
            .iter()
            .map(|segment| {
                let candidate = segment.closest_point(point);
                (candidate, candidate.distance(&point))
            })
            .filter(|(_, distance)| *distance <= max_distance)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(candidate, _)| candidate)
    }
}
