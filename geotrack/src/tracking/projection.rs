//! Local tangent-plane projection.
//!
//! Converts a geodetic delta between an anchor and a sample into planar
//! east/north meters using the equirectangular approximation around the
//! mean latitude of the two points. Accurate to well under a percent for
//! the few-kilometer areas this crate is built for.
//!
//! World-space placement lives here too: [`AxisMapping`] decides which
//! horizontal world axis receives east and which receives north.

use super::sample::GeodeticSample;

/// Equatorial Earth radius (WGS84) in meters.
pub const EARTH_RADIUS_METERS: f64 = 6_378_137.0;

/// Planar offset from the anchor in meters.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PlanarOffset {
    /// Meters east of the anchor (negative is west).
    pub east: f64,
    /// Meters north of the anchor (negative is south).
    pub north: f64,
}

impl PlanarOffset {
    pub fn new(east: f64, north: f64) -> Self {
        Self { east, north }
    }

    /// Euclidean length of the offset in meters.
    pub fn length(&self) -> f64 {
        self.east.hypot(self.north)
    }
}

/// Project `sample` onto the tangent plane centered at `anchor`.
///
/// Pure and total: any pair of finite coordinates yields a finite offset.
pub fn offset_meters(anchor: &GeodeticSample, sample: &GeodeticSample) -> PlanarOffset {
    let d_lat = (sample.latitude - anchor.latitude).to_radians();
    let d_lon = (sample.longitude - anchor.longitude).to_radians();
    let mean_lat = ((sample.latitude + anchor.latitude) * 0.5).to_radians();

    PlanarOffset {
        east: d_lon * mean_lat.cos() * EARTH_RADIUS_METERS,
        north: d_lat * EARTH_RADIUS_METERS,
    }
}

/// Inverse of [`offset_meters`]: the coordinate lying `offset` away from `anchor`.
///
/// Latitude is solved first so the mean-latitude term matches the forward
/// projection exactly. Returns `(latitude, longitude)` in degrees.
pub fn offset_to_geodetic(anchor: &GeodeticSample, offset: PlanarOffset) -> (f64, f64) {
    let latitude = anchor.latitude + (offset.north / EARTH_RADIUS_METERS).to_degrees();
    let mean_lat = ((latitude + anchor.latitude) * 0.5).to_radians();
    let longitude =
        anchor.longitude + (offset.east / (EARTH_RADIUS_METERS * mean_lat.cos())).to_degrees();
    (latitude, longitude)
}

/// A position in world space. `y` is the vertical axis.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WorldPosition {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl WorldPosition {
    pub const ORIGIN: WorldPosition = WorldPosition {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Horizontal (x/z) part of the position.
    pub fn planar(&self) -> PlanarPoint {
        PlanarPoint {
            x: self.x,
            z: self.z,
        }
    }

    /// Replace the horizontal part, keeping the vertical component.
    pub fn with_planar(&self, point: PlanarPoint) -> Self {
        Self {
            x: point.x,
            y: self.y,
            z: point.z,
        }
    }

    /// Linear interpolation; `t` is not clamped.
    pub fn lerp(&self, to: &WorldPosition, t: f32) -> Self {
        Self {
            x: self.x + (to.x - self.x) * t,
            y: self.y + (to.y - self.y) * t,
            z: self.z + (to.z - self.z) * t,
        }
    }
}

impl std::fmt::Display for WorldPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.2}, {:.2}, {:.2})", self.x, self.y, self.z)
    }
}

/// A point on the horizontal world plane.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PlanarPoint {
    pub x: f32,
    pub z: f32,
}

impl PlanarPoint {
    pub fn new(x: f32, z: f32) -> Self {
        Self { x, z }
    }

    pub fn distance(&self, other: &PlanarPoint) -> f32 {
        (self.x - other.x).hypot(self.z - other.z)
    }
}

/// Horizontal distance between two world positions, ignoring `y`.
pub fn planar_distance(a: &WorldPosition, b: &WorldPosition) -> f32 {
    a.planar().distance(&b.planar())
}

/// How east/north offsets land on the world's horizontal axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AxisMapping {
    /// When set, north maps to `x` and east maps to `z`.
    pub swap_axes: bool,
}

impl AxisMapping {
    pub fn new(swap_axes: bool) -> Self {
        Self { swap_axes }
    }

    /// Place `offset` relative to `reference`, keeping the reference height.
    pub fn to_world(&self, reference: &WorldPosition, offset: PlanarOffset) -> WorldPosition {
        let east = offset.east as f32;
        let north = offset.north as f32;
        let (dx, dz) = if self.swap_axes {
            (north, east)
        } else {
            (east, north)
        };

        WorldPosition {
            x: reference.x + dx,
            y: reference.y,
            z: reference.z + dz,
        }
    }
}
