//! Trimmed surfaces: a base surface plus closed loops of parameter-space curves.
//!
//! # Main Types
//! - [`TrimSegment`]: one trimming curve, optionally with a cached Euclidean image
//! - [`TrimLoop`]: an ordered ring of segments, end of each equal to start of the next
//! - [`TrimmedSurface`]: the surface and its loops
//!
//! - [`LoopClassifier`]: the loops flattened once for repeated point queries
//!
//! Loops handed out by [`TrimmedSurface`] are closed exactly: every junction and the
//! final point compare equal bit for bit. They keep the direction they were given;
//! [`classify_loops`](super::hierarchy::classify_loops) reorients flattened copies so
//! outer boundaries run clockwise and islands counter-clockwise.

use super::chain;
use super::context::{PolylineOptions, TrimContext};
use super::core::{Point3, Tolerance, Transform};
use super::curve::UvCurve;
use super::retrim::{self, SubdivisionResult};
use super::surface::{NurbsSurface, Surface};
use super::tessellation::approximate_curve;
use super::trim::{
    SplitDirection, TrimDiagnostics, TrimError, UvDomain, UvPoint, UvPolygon, ray_parity,
};

// ============================================================================
// TrimSegment
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct TrimSegment {
    pub curve: UvCurve,
    euclidean: Option<Vec<Point3>>,
}

impl TrimSegment {
    #[must_use]
    pub fn new(curve: UvCurve) -> Self {
        Self {
            curve,
            euclidean: None,
        }
    }

    #[must_use]
    pub fn start_point(&self) -> UvPoint {
        self.curve.start_point()
    }

    #[must_use]
    pub fn end_point(&self) -> UvPoint {
        self.curve.end_point()
    }

    /// Same segment traversed the other way; a cached image is reversed with it.
    #[must_use]
    pub fn reversed(&self) -> Self {
        Self {
            curve: self.curve.reversed(),
            euclidean: self.euclidean.as_ref().map(|pts| pts.iter().rev().copied().collect()),
        }
    }

    #[must_use]
    pub fn euclidean(&self) -> Option<&[Point3]> {
        self.euclidean.as_deref()
    }

    pub fn clear_euclidean(&mut self) {
        self.euclidean = None;
    }

    /// Samples the curve and stores its image on `surface`.
    pub fn cache_euclidean(&mut self, surface: &impl Surface, options: &PolylineOptions) {
        let points = approximate_curve(&self.curve, options)
            .into_iter()
            .map(|p| surface.point_at(p.u, p.v))
            .collect();
        self.euclidean = Some(points);
    }

    /// Replaces the curve, dropping any cached image.
    pub fn set_curve(&mut self, curve: UvCurve) {
        self.curve = curve;
        self.euclidean = None;
    }

    #[must_use]
    pub fn is_degenerate(&self, eps: f64) -> bool {
        self.curve.approximate_length() <= eps
    }
}

impl From<UvCurve> for TrimSegment {
    fn from(curve: UvCurve) -> Self {
        Self::new(curve)
    }
}

// ============================================================================
// TrimLoop
// ============================================================================

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TrimLoop {
    segments: Vec<TrimSegment>,
}

impl TrimLoop {
    #[must_use]
    pub fn new(segments: Vec<TrimSegment>) -> Self {
        Self { segments }
    }

    #[must_use]
    pub fn from_curve(curve: UvCurve) -> Self {
        Self::new(vec![TrimSegment::new(curve)])
    }

    /// Clockwise boundary of `domain` as four line segments.
    #[must_use]
    pub fn rectangle(domain: &UvDomain) -> Self {
        let c = domain.corners_cw();
        Self::new(
            (0..4)
                .map(|i| TrimSegment::new(UvCurve::line(c[i], c[(i + 1) % 4])))
                .collect(),
        )
    }

    #[must_use]
    pub fn segments(&self) -> &[TrimSegment] {
        &self.segments
    }

    pub fn segments_mut(&mut self) -> &mut [TrimSegment] {
        &mut self.segments
    }

    #[must_use]
    pub fn into_segments(self) -> Vec<TrimSegment> {
        self.segments
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    #[must_use]
    pub fn start_point(&self) -> Option<UvPoint> {
        self.segments.first().map(TrimSegment::start_point)
    }

    #[must_use]
    pub fn end_point(&self) -> Option<UvPoint> {
        self.segments.last().map(TrimSegment::end_point)
    }

    /// True when every junction and the closing point coincide exactly.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        let n = self.segments.len();
        n > 0
            && (0..n).all(|i| {
                self.segments[i].end_point() == self.segments[(i + 1) % n].start_point()
            })
    }

    /// Polyline approximation as an open ring (closing point not repeated).
    #[must_use]
    pub fn polygon(&self, options: &PolylineOptions) -> UvPolygon {
        let mut points: Vec<UvPoint> = Vec::new();
        for segment in &self.segments {
            let pts = approximate_curve(&segment.curve, options);
            let skip = usize::from(points.last() == pts.first());
            points.extend_from_slice(&pts[skip..]);
        }
        UvPolygon::new(points)
    }

    /// The loop approximated and merged into one polyline segment.
    pub fn to_polyline_loop(&self, options: &PolylineOptions) -> Result<Self, TrimError> {
        let polygon = self.polygon(options);
        let mut points = polygon.into_points();
        if let Some(&first) = points.first() {
            points.push(first);
        }
        Ok(Self::from_curve(UvCurve::polyline(&points)?))
    }

    #[must_use]
    pub fn reversed(&self) -> Self {
        Self::new(self.segments.iter().rev().map(TrimSegment::reversed).collect())
    }

    /// Applies an affine map of the parameter plane to every segment.
    #[must_use]
    pub fn map_points(&self, f: impl Fn(UvPoint) -> UvPoint) -> Self {
        Self::new(
            self.segments
                .iter()
                .map(|s| TrimSegment::new(s.curve.map_points(&f)))
                .collect(),
        )
    }

    pub fn clear_euclidean(&mut self) {
        for segment in &mut self.segments {
            segment.clear_euclidean();
        }
    }
}

// ============================================================================
// TrimmedSurface
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct TrimmedSurface {
    surface: NurbsSurface,
    loops: Vec<TrimLoop>,
}

impl TrimmedSurface {
    /// The surface with its implicit full-domain loop.
    #[must_use]
    pub fn untrimmed(surface: NurbsSurface) -> Self {
        let rect = TrimLoop::rectangle(&surface.domain());
        Self {
            surface,
            loops: vec![rect],
        }
    }

    /// Builds a trimmed surface from unordered trimming curves.
    ///
    /// The curves are validated against the surface domain, then chained and
    /// healed into exactly closed loops. No curves means the full domain.
    pub fn new(
        surface: NurbsSurface,
        curves: Vec<UvCurve>,
        ctx: &TrimContext,
    ) -> Result<(Self, TrimDiagnostics), TrimError> {
        if curves.is_empty() {
            return Ok((Self::untrimmed(surface), TrimDiagnostics::new()));
        }

        let domain = surface.domain();
        for curve in &curves {
            check_in_domain(curve, &domain, ctx)?;
        }

        let segments = curves.into_iter().map(TrimSegment::new).collect();
        let (loops, diagnostics) = chain::heal_loops(segments, &surface, ctx)?;
        log::debug!(
            "trimmed surface: {} loops, chain tolerance {:e}",
            loops.len(),
            diagnostics.chain_tolerance
        );
        Ok((Self { surface, loops }, diagnostics))
    }

    /// Wraps loops that are already closed and inside the domain.
    #[must_use]
    pub fn from_loops(surface: NurbsSurface, loops: Vec<TrimLoop>) -> Self {
        Self { surface, loops }
    }

    #[must_use]
    pub fn surface(&self) -> &NurbsSurface {
        &self.surface
    }

    #[must_use]
    pub fn loops(&self) -> &[TrimLoop] {
        &self.loops
    }

    #[must_use]
    pub fn into_parts(self) -> (NurbsSurface, Vec<TrimLoop>) {
        (self.surface, self.loops)
    }

    #[must_use]
    pub fn domain(&self) -> UvDomain {
        self.surface.domain()
    }

    #[must_use]
    pub fn loop_polygons(&self, options: &PolylineOptions) -> Vec<UvPolygon> {
        self.loops.iter().map(|l| l.polygon(options)).collect()
    }

    /// True when the loops are exactly the rectangular boundary of the domain.
    #[must_use]
    pub fn is_untrimmed(&self) -> bool {
        let [lp] = self.loops.as_slice() else {
            return false;
        };
        let polygon = lp.polygon(&PolylineOptions::default());
        let domain = self.domain();
        let corners = domain.corners_cw();
        let points = polygon.points();
        points.iter().all(|&p| domain.side_of(p, Tolerance::new(0.0)).is_some())
            && corners.iter().all(|c| points.contains(c))
            && (polygon.signed_area().abs() - domain.area()).abs() <= 1e-12 * domain.area()
    }

    /// Even-odd classification of a parameter point against all loops.
    ///
    /// Flattens every loop on each call; use [`Self::classifier`] for many queries.
    #[must_use]
    pub fn contains(&self, uv: UvPoint, options: &PolylineOptions) -> bool {
        self.classifier(options).contains(uv)
    }

    /// Flattens the loops once so points can be classified repeatedly.
    #[must_use]
    pub fn classifier(&self, options: &PolylineOptions) -> LoopClassifier {
        LoopClassifier {
            domain: self.domain(),
            polygons: self.loop_polygons(options),
        }
    }

    /// Area of the valid parameter region (islands subtracted).
    #[must_use]
    pub fn trimmed_area(&self, options: &PolylineOptions) -> f64 {
        let polygons = self.loop_polygons(options);
        let mut area = 0.0;
        for (i, poly) in polygons.iter().enumerate() {
            let Some(&first) = poly.points().first() else {
                continue;
            };
            let depth = polygons
                .iter()
                .enumerate()
                .filter(|&(j, other)| j != i && ray_parity(first, other.points()))
                .count();
            let a = poly.signed_area().abs();
            area += if depth % 2 == 0 { a } else { -a };
        }
        area
    }

    /// Splits the surface at `t` along `direction`, partitioning the loops.
    pub fn subdivide(
        &self,
        t: f64,
        direction: SplitDirection,
        ctx: &TrimContext,
    ) -> Result<SubdivisionResult, TrimError> {
        retrim::subdivide(self, t, direction, ctx)
    }

    /// The part of this trimmed surface inside `domain`, if any.
    pub fn region(&self, domain: &UvDomain, ctx: &TrimContext) -> Result<Option<Self>, TrimError> {
        let mut current = self.clone();
        let cuts = [
            (SplitDirection::U, domain.u_min, true),
            (SplitDirection::U, domain.u_max, false),
            (SplitDirection::V, domain.v_min, true),
            (SplitDirection::V, domain.v_max, false),
        ];
        for (direction, t, keep_high) in cuts {
            let (lo, hi) = current.domain().range(direction);
            if !(t > lo && t < hi) {
                continue;
            }
            let result = current.subdivide(t, direction, ctx)?;
            let side = if keep_high { result.high } else { result.low };
            match side {
                Some(side) => current = side,
                None => return Ok(None),
            }
        }
        Ok(Some(current))
    }

    /// Flips the surface orientation: the surface is reversed in u and the loops
    /// are mirrored with it, keeping outer loops clockwise.
    pub fn reversed(&self) -> Result<Self, TrimError> {
        let surface = self.surface.reversed_u()?;
        let (u0, u1) = self.surface.domain_u();
        let loops = self
            .loops
            .iter()
            .map(|l| l.map_points(|p| UvPoint::new(u0 + u1 - p.u, p.v)).reversed())
            .collect();
        Ok(Self { surface, loops })
    }

    /// Affinely remaps surface and loops onto a new parameter domain.
    pub fn with_domain(&self, domain: &UvDomain) -> Result<Self, TrimError> {
        let from = self.domain();
        let surface = self.surface.with_domain(domain)?;
        let loops = self
            .loops
            .iter()
            .map(|l| l.map_points(|p| p.map_domain(&from, domain)))
            .collect();
        Ok(Self { surface, loops })
    }

    /// Transforms the base surface; cached Euclidean images are dropped.
    pub fn transformed(&self, transform: Transform) -> Result<Self, TrimError> {
        let surface = self.surface.transformed(transform)?;
        let mut loops = self.loops.clone();
        for l in &mut loops {
            l.clear_euclidean();
        }
        Ok(Self { surface, loops })
    }

    /// Fills every segment's Euclidean image cache.
    pub fn cache_euclidean(&mut self, options: &PolylineOptions) {
        let surface = &self.surface;
        for l in &mut self.loops {
            for segment in l.segments_mut() {
                segment.cache_euclidean(surface, options);
            }
        }
    }
}

/// Loop polygons of a [`TrimmedSurface`] flattened at one tolerance.
#[derive(Debug, Clone)]
pub struct LoopClassifier {
    domain: UvDomain,
    polygons: Vec<UvPolygon>,
}

impl LoopClassifier {
    /// Even-odd test against the cached polygons; false outside the domain.
    #[must_use]
    pub fn contains(&self, uv: UvPoint) -> bool {
        if !self.domain.contains(uv, Tolerance::new(0.0)) {
            return false;
        }
        let crossings = self
            .polygons
            .iter()
            .filter(|poly| ray_parity(uv, poly.points()))
            .count();
        crossings % 2 == 1
    }

    #[must_use]
    pub fn polygons(&self) -> &[UvPolygon] {
        &self.polygons
    }
}

/// Raises `DomainViolation` for the first sample of `curve` outside `domain`.
pub(crate) fn check_in_domain(
    curve: &UvCurve,
    domain: &UvDomain,
    ctx: &TrimContext,
) -> Result<(), TrimError> {
    let samples = approximate_curve(curve, &ctx.polyline);
    match samples
        .into_iter()
        .find(|&p| !domain.contains(p, ctx.domain_tolerance))
    {
        Some(p) => Err(ctx.fatal(TrimError::DomainViolation {
            u: p.u,
            v: p.v,
            domain: *domain,
        })),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plane() -> NurbsSurface {
        NurbsSurface::bilinear(
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
        )
    }

    #[test]
    fn no_curves_means_the_full_domain() {
        let (ts, _) = TrimmedSurface::new(plane(), Vec::new(), &TrimContext::new()).unwrap();
        assert!(ts.is_untrimmed());
        assert!(ts.loops()[0].is_closed());
        assert!(ts.loop_polygons(&PolylineOptions::default())[0].is_cw());
    }

    #[test]
    fn curve_outside_domain_is_rejected() {
        let curve = UvCurve::circle(UvPoint::new(0.9, 0.5), 0.3).unwrap();
        let err = TrimmedSurface::new(plane(), vec![curve], &TrimContext::new()).unwrap_err();
        assert!(matches!(err, TrimError::DomainViolation { .. }));
    }

    #[test]
    fn classifier_matches_direct_queries() {
        let ctx = TrimContext::new();
        let curves = vec![
            UvCurve::circle(UvPoint::new(0.5, 0.5), 0.4).unwrap(),
            UvCurve::circle(UvPoint::new(0.5, 0.5), 0.1).unwrap(),
        ];
        let (ts, _) = TrimmedSurface::new(plane(), curves, &ctx).unwrap();
        let opts = PolylineOptions::default();
        let classifier = ts.classifier(&opts);
        assert_eq!(classifier.polygons().len(), 2);
        for (u, v, inside) in [(0.5, 0.5, false), (0.5, 0.75, true), (0.02, 0.02, false), (1.5, 0.5, false)] {
            let uv = UvPoint::new(u, v);
            assert_eq!(classifier.contains(uv), inside, "at ({u}, {v})");
            assert_eq!(ts.contains(uv, &opts), inside);
        }
    }

    #[test]
    fn reversed_keeps_outer_loops_clockwise() {
        let ts = TrimmedSurface::untrimmed(plane());
        let r = ts.reversed().unwrap();
        let polys = r.loop_polygons(&PolylineOptions::default());
        assert!(polys[0].is_cw());
        assert!(r.loops()[0].is_closed());
    }

    #[test]
    fn euclidean_cache_survives_copies_and_clears_on_transform() {
        let mut ts = TrimmedSurface::untrimmed(plane());
        ts.cache_euclidean(&PolylineOptions::default());
        let copy = ts.clone();
        assert!(copy.loops()[0].segments()[0].euclidean().is_some());
        let moved = ts
            .transformed(Transform::translate(crate::geom::Vec3::new(0.0, 0.0, 1.0)))
            .unwrap();
        assert!(moved.loops()[0].segments()[0].euclidean().is_none());
    }
}
