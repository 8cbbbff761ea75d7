//! Parameter-space primitives shared by the trimming code.
//!
//! # Main Types
//! - [`UvPoint`] / [`UvDomain`]: points and rectangles in a surface's (u,v) domain
//! - [`SplitDirection`]: which parameter a subdivision line holds constant
//! - [`UvPolygon`]: a closed polygonal ring with orientation and containment queries
//! - [`TrimError`]: the fatal conditions raised by trimming operations
//! - [`TrimDiagnostics`]: non-fatal adjustments made along the way
//!
//! Orientation follows the trimming convention: outer boundaries are clockwise
//! (negative signed area), islands are counter-clockwise.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::core::Tolerance;

// ============================================================================
// Error Types
// ============================================================================

/// Fatal conditions raised by trimming operations.
///
/// Once one of these is returned the current top-level operation has not
/// produced any partial result.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TrimError {
    /// A trimming curve sample lies outside the surface domain beyond tolerance.
    #[error("trimming curve sample ({u:.6}, {v:.6}) lies outside surface domain {domain}")]
    DomainViolation { u: f64, v: f64, domain: UvDomain },
    /// Chaining could not close the segments even at the largest tolerance.
    #[error("trimming curves do not form closed loops (largest tolerance tried: {tolerance:e})")]
    NotLoops { tolerance: f64 },
    /// An open end point could not be matched to a peer segment or a seam.
    #[error("open trimming loop end at ({u:.6}, {v:.6}) could not be reconciled")]
    OpenLoop { u: f64, v: f64 },
    /// A loop or intersection result violates a structural precondition.
    #[error("malformed trimming segment: {0}")]
    MalformedSegment(String),
    /// The input uses a representation or argument this code cannot handle.
    #[error("unsupported representation: {0}")]
    UnsupportedRepresentation(String),
    /// Too many subdivision-line crossings were accumulated.
    #[error("trimming curves too complex: more than {limit} subdivision-line crossings")]
    Capacity { limit: usize },
    /// Curve or surface construction rejected its input.
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),
    /// The polygon-to-triangle utility failed on a prepared polygon.
    #[error("triangulation failed: {0}")]
    Triangulation(String),
}

impl From<String> for TrimError {
    fn from(s: String) -> Self {
        Self::InvalidGeometry(s)
    }
}

// ============================================================================
// Diagnostics
// ============================================================================

/// Non-fatal adjustments made while building or refining trimming loops.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrimDiagnostics {
    /// Number of loops produced.
    pub loop_count: usize,
    /// Highest chaining tolerance that was needed.
    pub chain_tolerance: f64,
    /// Number of segment junctions moved onto an exact shared point.
    pub snapped_junctions: usize,
    /// Number of straight edges synthesized along a seam or pole.
    pub seam_edges: usize,
    /// Number of segments reversed while chaining.
    pub reversed_segments: usize,
    /// Number of degenerate segments dropped.
    pub degenerate_segments: usize,
    /// Number of zero-area sides dropped by subdivision.
    pub sliver_sides: usize,
    /// Warnings generated during processing.
    pub warnings: Vec<String>,
}

impl TrimDiagnostics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge another diagnostics into this one.
    pub fn merge(&mut self, other: &Self) {
        self.loop_count += other.loop_count;
        self.chain_tolerance = self.chain_tolerance.max(other.chain_tolerance);
        self.snapped_junctions += other.snapped_junctions;
        self.seam_edges += other.seam_edges;
        self.reversed_segments += other.reversed_segments;
        self.degenerate_segments += other.degenerate_segments;
        self.sliver_sides += other.sliver_sides;
        self.warnings.extend(other.warnings.iter().cloned());
    }

    /// Check if any adjustments were made.
    #[must_use]
    pub fn had_adjustments(&self) -> bool {
        self.snapped_junctions > 0
            || self.seam_edges > 0
            || self.degenerate_segments > 0
            || self.sliver_sides > 0
    }

    #[must_use]
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

// ============================================================================
// UV Domain
// ============================================================================

/// One of the four boundary lines of a [`UvDomain`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DomainSide {
    UMin,
    UMax,
    VMin,
    VMax,
}

impl DomainSide {
    pub const ALL: [Self; 4] = [Self::UMin, Self::UMax, Self::VMin, Self::VMax];
}

/// A rectangular domain in UV parameter space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UvDomain {
    pub u_min: f64,
    pub u_max: f64,
    pub v_min: f64,
    pub v_max: f64,
}

impl UvDomain {
    #[must_use]
    pub const fn new(u_min: f64, u_max: f64, v_min: f64, v_max: f64) -> Self {
        Self {
            u_min,
            u_max,
            v_min,
            v_max,
        }
    }

    /// The unit domain [0, 1] x [0, 1].
    #[must_use]
    pub const fn unit() -> Self {
        Self::new(0.0, 1.0, 0.0, 1.0)
    }

    /// Bounding rectangle of a point set, `None` when empty.
    #[must_use]
    pub fn from_points(points: &[UvPoint]) -> Option<Self> {
        let first = points.first()?;
        let mut d = Self::new(first.u, first.u, first.v, first.v);
        for p in &points[1..] {
            d.u_min = d.u_min.min(p.u);
            d.u_max = d.u_max.max(p.u);
            d.v_min = d.v_min.min(p.v);
            d.v_max = d.v_max.max(p.v);
        }
        Some(d)
    }

    /// Check if a point is inside this domain (with tolerance).
    #[must_use]
    pub fn contains(&self, point: UvPoint, tol: Tolerance) -> bool {
        point.u >= self.u_min - tol.eps
            && point.u <= self.u_max + tol.eps
            && point.v >= self.v_min - tol.eps
            && point.v <= self.v_max + tol.eps
    }

    #[must_use]
    pub fn clamp(&self, point: UvPoint) -> UvPoint {
        UvPoint::new(
            point.u.clamp(self.u_min, self.u_max),
            point.v.clamp(self.v_min, self.v_max),
        )
    }

    /// Check if this domain is valid (finite, min < max for both axes).
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.u_min.is_finite()
            && self.u_max.is_finite()
            && self.v_min.is_finite()
            && self.v_max.is_finite()
            && self.u_min < self.u_max
            && self.v_min < self.v_max
    }

    #[must_use]
    pub fn u_span(&self) -> f64 {
        self.u_max - self.u_min
    }

    #[must_use]
    pub fn v_span(&self) -> f64 {
        self.v_max - self.v_min
    }

    #[must_use]
    pub fn area(&self) -> f64 {
        self.u_span() * self.v_span()
    }

    #[must_use]
    pub fn center(&self) -> UvPoint {
        UvPoint::new(
            0.5 * (self.u_min + self.u_max),
            0.5 * (self.v_min + self.v_max),
        )
    }

    /// Range of parameters along the axis named by `direction`.
    #[must_use]
    pub fn range(&self, direction: SplitDirection) -> (f64, f64) {
        match direction {
            SplitDirection::U => (self.u_min, self.u_max),
            SplitDirection::V => (self.v_min, self.v_max),
        }
    }

    /// Corners in clockwise order starting at `(u_min, v_min)`.
    #[must_use]
    pub fn corners_cw(&self) -> [UvPoint; 4] {
        [
            UvPoint::new(self.u_min, self.v_min),
            UvPoint::new(self.u_min, self.v_max),
            UvPoint::new(self.u_max, self.v_max),
            UvPoint::new(self.u_max, self.v_min),
        ]
    }

    #[must_use]
    pub fn is_corner(&self, p: UvPoint) -> bool {
        (p.u == self.u_min || p.u == self.u_max) && (p.v == self.v_min || p.v == self.v_max)
    }

    /// The boundary line a point lies on (first match), if any.
    #[must_use]
    pub fn side_of(&self, p: UvPoint, tol: Tolerance) -> Option<DomainSide> {
        DomainSide::ALL
            .into_iter()
            .find(|&side| self.on_side(p, side, tol))
    }

    #[must_use]
    pub fn on_side(&self, p: UvPoint, side: DomainSide, tol: Tolerance) -> bool {
        if !self.contains(p, tol) {
            return false;
        }
        match side {
            DomainSide::UMin => (p.u - self.u_min).abs() <= tol.eps,
            DomainSide::UMax => (p.u - self.u_max).abs() <= tol.eps,
            DomainSide::VMin => (p.v - self.v_min).abs() <= tol.eps,
            DomainSide::VMax => (p.v - self.v_max).abs() <= tol.eps,
        }
    }
}

impl Default for UvDomain {
    fn default() -> Self {
        Self::unit()
    }
}

impl fmt::Display for UvDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:.6}, {:.6}] x [{:.6}, {:.6}]",
            self.u_min, self.u_max, self.v_min, self.v_max
        )
    }
}

// ============================================================================
// UvPoint / SplitDirection
// ============================================================================

/// A point in UV parameter space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UvPoint {
    pub u: f64,
    pub v: f64,
}

impl UvPoint {
    #[must_use]
    pub const fn new(u: f64, v: f64) -> Self {
        Self { u, v }
    }

    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.u.is_finite() && self.v.is_finite()
    }

    #[must_use]
    pub fn distance_squared(&self, other: UvPoint) -> f64 {
        let du = self.u - other.u;
        let dv = self.v - other.v;
        du * du + dv * dv
    }

    #[must_use]
    pub fn distance(&self, other: UvPoint) -> f64 {
        self.distance_squared(other).sqrt()
    }

    /// Coordinate along the split axis of `direction`.
    #[must_use]
    pub const fn along(&self, direction: SplitDirection) -> f64 {
        match direction {
            SplitDirection::U => self.u,
            SplitDirection::V => self.v,
        }
    }

    /// Coordinate along the axis the split line runs in.
    #[must_use]
    pub const fn across(&self, direction: SplitDirection) -> f64 {
        match direction {
            SplitDirection::U => self.v,
            SplitDirection::V => self.u,
        }
    }

    /// Point built from its split-axis and line-axis coordinates.
    #[must_use]
    pub const fn from_axes(direction: SplitDirection, along: f64, across: f64) -> Self {
        match direction {
            SplitDirection::U => Self::new(along, across),
            SplitDirection::V => Self::new(across, along),
        }
    }

    /// Map this point from one domain to another.
    #[must_use]
    pub fn map_domain(&self, from: &UvDomain, to: &UvDomain) -> Self {
        let u_normalized = if from.u_span() > 0.0 {
            (self.u - from.u_min) / from.u_span()
        } else {
            0.5
        };
        let v_normalized = if from.v_span() > 0.0 {
            (self.v - from.v_min) / from.v_span()
        } else {
            0.5
        };

        Self {
            u: to.u_min + u_normalized * to.u_span(),
            v: to.v_min + v_normalized * to.v_span(),
        }
    }
}

/// Which parameter a subdivision line holds constant.
///
/// `U` splits along the line `u = t`; `V` along `v = t`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SplitDirection {
    U,
    V,
}

impl SplitDirection {
    #[must_use]
    pub const fn other(self) -> Self {
        match self {
            Self::U => Self::V,
            Self::V => Self::U,
        }
    }
}

impl FromStr for SplitDirection {
    type Err = TrimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "u" | "U" => Ok(Self::U),
            "v" | "V" => Ok(Self::V),
            other => Err(TrimError::UnsupportedRepresentation(format!(
                "subdivision direction `{other}` is neither u nor v"
            ))),
        }
    }
}

// ============================================================================
// Polygon helpers
// ============================================================================

/// Signed area of a closed ring (positive when counter-clockwise).
#[must_use]
pub fn signed_area(points: &[UvPoint]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }

    let mut area = 0.0;
    for i in 0..points.len() {
        let a = points[i];
        let b = points[(i + 1) % points.len()];
        area += a.u * b.v - b.u * a.v;
    }
    0.5 * area
}

#[must_use]
pub fn orient2d(a: UvPoint, b: UvPoint, c: UvPoint) -> f64 {
    (b.u - a.u) * (c.v - a.v) - (b.v - a.v) * (c.u - a.u)
}

#[must_use]
pub fn point_on_segment(p: UvPoint, a: UvPoint, b: UvPoint, tol: Tolerance) -> bool {
    let ab_u = b.u - a.u;
    let ab_v = b.v - a.v;
    let ap_u = p.u - a.u;
    let ap_v = p.v - a.v;

    let ab_len = (ab_u * ab_u + ab_v * ab_v).sqrt();
    let cross = ab_u * ap_v - ab_v * ap_u;
    if cross.abs() > tol.eps * ab_len.max(1.0) {
        return false;
    }

    let dot = ap_u * ab_u + ap_v * ab_v;
    if dot < -tol.eps {
        return false;
    }

    dot - ab_len * ab_len <= tol.eps
}

/// Horizontal-ray crossing parity: casts a ray toward `+u` from `p`.
///
/// Uses the half-open rule on edge end points so a ray through a vertex is
/// counted once. Points exactly on the boundary may land on either side.
#[must_use]
pub fn ray_parity(p: UvPoint, points: &[UvPoint]) -> bool {
    let n = points.len();
    if n < 3 {
        return false;
    }

    let mut inside = false;
    for i in 0..n {
        let a = points[i];
        let b = points[(i + 1) % n];
        if (a.v > p.v) == (b.v > p.v) {
            continue;
        }
        let t = (p.v - a.v) / (b.v - a.v);
        let x = a.u + t * (b.u - a.u);
        if p.u < x {
            inside = !inside;
        }
    }
    inside
}

/// Ray-parity containment that reports boundary points as inside.
#[must_use]
pub fn contains_point_polygon(p: UvPoint, points: &[UvPoint], tol: Tolerance) -> bool {
    if points.len() < 3 {
        return false;
    }
    let n = points.len();
    if (0..n).any(|i| point_on_segment(p, points[i], points[(i + 1) % n], tol)) {
        return true;
    }
    ray_parity(p, points)
}

// ============================================================================
// UvPolygon
// ============================================================================

/// A closed polygonal ring in parameter space (no repeated closing point).
#[derive(Debug, Clone, PartialEq)]
pub struct UvPolygon {
    points: Vec<UvPoint>,
}

impl UvPolygon {
    /// Build a ring, dropping a repeated closing point and exact consecutive duplicates.
    #[must_use]
    pub fn new(points: Vec<UvPoint>) -> Self {
        let mut cleaned: Vec<UvPoint> = Vec::with_capacity(points.len());
        for p in points {
            if cleaned.last() != Some(&p) {
                cleaned.push(p);
            }
        }
        while cleaned.len() > 1 && cleaned.first() == cleaned.last() {
            cleaned.pop();
        }
        Self { points: cleaned }
    }

    #[must_use]
    pub fn points(&self) -> &[UvPoint] {
        &self.points
    }

    #[must_use]
    pub fn into_points(self) -> Vec<UvPoint> {
        self.points
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    #[must_use]
    pub fn signed_area(&self) -> f64 {
        signed_area(&self.points)
    }

    #[must_use]
    pub fn is_ccw(&self) -> bool {
        self.signed_area() > 0.0
    }

    #[must_use]
    pub fn is_cw(&self) -> bool {
        self.signed_area() < 0.0
    }

    /// True when the ring encloses no area (fewer than 3 points or all collinear on an axis).
    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        if self.points.len() < 3 {
            return true;
        }
        let first = self.points[0];
        self.points.iter().all(|p| p.u == first.u) || self.points.iter().all(|p| p.v == first.v)
    }

    #[must_use]
    pub fn reversed(&self) -> Self {
        let mut points = self.points.clone();
        points.reverse();
        Self { points }
    }

    /// Returns true if the ring was reversed.
    pub fn ensure_cw(&mut self) -> bool {
        if self.is_ccw() {
            self.points.reverse();
            true
        } else {
            false
        }
    }

    /// Returns true if the ring was reversed.
    pub fn ensure_ccw(&mut self) -> bool {
        if self.is_cw() {
            self.points.reverse();
            true
        } else {
            false
        }
    }

    #[must_use]
    pub fn bounds(&self) -> Option<UvDomain> {
        UvDomain::from_points(&self.points)
    }

    #[must_use]
    pub fn contains(&self, p: UvPoint, tol: Tolerance) -> bool {
        contains_point_polygon(p, &self.points, tol)
    }

    /// Index of the vertex with the largest `u` (lowest index on ties).
    #[must_use]
    pub fn max_u_index(&self) -> Option<usize> {
        let mut best: Option<usize> = None;
        for (i, p) in self.points.iter().enumerate() {
            match best {
                Some(b) if self.points[b].u >= p.u => {}
                _ => best = Some(i),
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_ccw() -> Vec<UvPoint> {
        vec![
            UvPoint::new(0.0, 0.0),
            UvPoint::new(1.0, 0.0),
            UvPoint::new(1.0, 1.0),
            UvPoint::new(0.0, 1.0),
        ]
    }

    #[test]
    fn signed_area_sign_follows_orientation() {
        let ccw = UvPolygon::new(square_ccw());
        assert!((ccw.signed_area() - 1.0).abs() < 1e-12);
        assert!(ccw.is_ccw());
        assert!(ccw.reversed().is_cw());
    }

    #[test]
    fn polygon_drops_closing_point_and_duplicates() {
        let mut pts = square_ccw();
        pts.insert(1, UvPoint::new(0.0, 0.0));
        pts.push(UvPoint::new(0.0, 0.0));
        let poly = UvPolygon::new(pts);
        assert_eq!(poly.len(), 4);
    }

    #[test]
    fn ray_parity_counts_vertex_hits_once() {
        let diamond = vec![
            UvPoint::new(0.5, 0.0),
            UvPoint::new(1.0, 0.5),
            UvPoint::new(0.5, 1.0),
            UvPoint::new(0.0, 0.5),
        ];
        assert!(ray_parity(UvPoint::new(0.25, 0.5), &diamond));
        assert!(!ray_parity(UvPoint::new(-0.5, 0.5), &diamond));
        assert!(!ray_parity(UvPoint::new(1.5, 0.5), &diamond));
    }

    #[test]
    fn contains_includes_boundary() {
        let tol = Tolerance::new(1e-9);
        let poly = UvPolygon::new(square_ccw());
        assert!(poly.contains(UvPoint::new(1.0, 0.5), tol));
        assert!(poly.contains(UvPoint::new(0.5, 0.5), tol));
        assert!(!poly.contains(UvPoint::new(1.5, 0.5), tol));
    }

    #[test]
    fn split_direction_parses_axes_only() {
        assert_eq!("u".parse::<SplitDirection>().unwrap(), SplitDirection::U);
        assert_eq!(" V ".parse::<SplitDirection>().unwrap(), SplitDirection::V);
        assert!(matches!(
            "w".parse::<SplitDirection>(),
            Err(TrimError::UnsupportedRepresentation(_))
        ));
    }

    #[test]
    fn domain_sides_and_corners() {
        let tol = Tolerance::new(1e-9);
        let d = UvDomain::new(0.0, 2.0, 0.0, 1.0);
        assert_eq!(d.side_of(UvPoint::new(0.0, 0.5), tol), Some(DomainSide::UMin));
        assert_eq!(d.side_of(UvPoint::new(1.0, 1.0), tol), Some(DomainSide::VMax));
        assert_eq!(d.side_of(UvPoint::new(1.0, 0.5), tol), None);
        assert!(d.is_corner(UvPoint::new(2.0, 0.0)));
        assert!(UvPolygon::new(d.corners_cw().to_vec()).is_cw());
    }

    #[test]
    fn axis_helpers_round_trip() {
        let p = UvPoint::new(0.25, 0.75);
        for dir in [SplitDirection::U, SplitDirection::V] {
            assert_eq!(UvPoint::from_axes(dir, p.along(dir), p.across(dir)), p);
        }
        assert_eq!(SplitDirection::U.other(), SplitDirection::V);
    }
}
