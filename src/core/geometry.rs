//! Map Geometry
//!
//! Points, paths and the path-corridor test used for tower placement.
//!
//! Coordinates are `f32` map units. Every operation here is a pure function of
//! its inputs, so the same position always gives the same answer on replay.

use std::fmt;
use std::ops::{Add, Sub};
use serde::{Serialize, Deserialize};

/// A position on the map.
#[derive(Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    /// X coordinate
    pub x: f32,
    /// Y coordinate
    pub y: f32,
}

impl Point {
    /// Origin
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    /// Create a new point.
    #[inline]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Create a point from integer map coordinates.
    #[inline]
    pub fn from_ints(x: i32, y: i32) -> Self {
        Self::new(x as f32, y as f32)
    }

    /// Squared distance to another point (no sqrt, use for range checks).
    #[inline]
    pub fn distance_squared(self, other: Self) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    /// Euclidean distance, computed in f64.
    #[inline]
    pub fn distance(self, other: Self) -> f64 {
        (other.x as f64 - self.x as f64).hypot(other.y as f64 - self.y as f64)
    }

    /// Scale both components.
    #[inline]
    pub fn scale(self, factor: f32) -> Self {
        Self::new(self.x * factor, self.y * factor)
    }
}

impl Add for Point {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Self::new(self.x + other.x, self.y + other.y)
    }
}

impl Sub for Point {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Self::new(self.x - other.x, self.y - other.y)
    }
}

impl fmt::Debug for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.2}, {:.2})", self.x, self.y)
    }
}

/// Steps needed to cover `distance` at `speed` units per frame.
///
/// Rounded to the nearest frame. Callers decide what zero means for them.
#[inline]
pub fn frames_to_cover(distance: f64, speed: f32) -> u32 {
    let frames = (distance / speed as f64).round();
    if frames.is_finite() && frames > 0.0 {
        frames as u32
    } else {
        0
    }
}

// =============================================================================
// PATH
// =============================================================================

/// Ordered waypoints enemies walk along. Immutable per map.
#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Path(pub Vec<Point>);

impl Path {
    /// Create a path from waypoints.
    pub fn new(points: Vec<Point>) -> Self {
        Self(points)
    }

    /// Number of waypoints.
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if the path has no waypoints.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Waypoint at `index`.
    #[inline]
    pub fn get(&self, index: usize) -> Option<Point> {
        self.0.get(index).copied()
    }

    /// First waypoint (spawn point).
    #[inline]
    pub fn start(&self) -> Option<Point> {
        self.0.first().copied()
    }

    /// Consecutive segments.
    pub fn segments(&self) -> impl Iterator<Item = (Point, Point)> + '_ {
        self.0.windows(2).map(|w| (w[0], w[1]))
    }
}

// =============================================================================
// CORRIDOR
// =============================================================================

/// Check whether `p` lies inside the corridor around segment `a -> b`.
///
/// The segment is extended by `width / 2` past both ends and widened to
/// `width`, giving a rotated rectangle. A is a corner at the start, B the
/// opposite corner across the width, D the corner at the far end on A's side.
/// The point is inside when its projections onto AB and AD both fall strictly
/// within the edges.
pub fn segment_contains(p: Point, a: Point, b: Point, width: f32) -> bool {
    let (mut x1, mut x2) = (a.x as f64, b.x as f64);
    let (mut y1, mut y2) = (a.y as f64, b.y as f64);

    let len = (x2 - x1).hypot(y2 - y1);
    if len == 0.0 {
        return false;
    }

    let sin = (y2 - y1) / len;
    let sign = if (x2 - x1).is_sign_negative() { -1.0 } else { 1.0 };
    let cos = sign * (1.0 - sin * sin).sqrt();

    let half = width as f64 / 2.0;
    let dx = half * cos;
    let dy = half * sin;

    x1 -= dx;
    x2 += dx;
    y1 -= dy;
    y2 += dy;

    let corner_a = (x1 - dy, y1 + dx);
    let corner_b = (x1 + dy, y1 - dx);
    let corner_d = (x2 - dy, y2 + dx);

    let am = (p.x as f64 - corner_a.0, p.y as f64 - corner_a.1);
    let ab = (corner_b.0 - corner_a.0, corner_b.1 - corner_a.1);
    let ad = (corner_d.0 - corner_a.0, corner_d.1 - corner_a.1);

    let dot = |u: (f64, f64), v: (f64, f64)| u.0 * v.0 + u.1 * v.1;

    let am_ab = dot(am, ab);
    let am_ad = dot(am, ad);

    0.0 < am_ab && am_ab < dot(ab, ab) && 0.0 < am_ad && am_ad < dot(ad, ad)
}

/// Check whether `p` lies inside the corridor of any path segment.
pub fn path_contains(p: Point, path: &Path, width: f32) -> bool {
    path.segments().any(|(a, b)| segment_contains(p, a, b, width))
}
