//! Trimming curves: rational B-splines living in a surface's (u,v) domain.

use super::knot::{self, ControlRow};
use super::trim::{SplitDirection, UvDomain, UvPoint};

/// Bisection steps used when refining an isolated line crossing.
const ROOT_BISECTIONS: usize = 64;

/// Subdivision depth limit when isolating line crossings.
const ISOLATION_DEPTH: usize = 48;

#[derive(Debug, Clone, PartialEq)]
pub struct UvCurve {
    degree: usize,
    control_points: Vec<UvPoint>,
    knots: Vec<f64>,
    weights: Option<Vec<f64>>,
}

impl UvCurve {
    pub fn new(
        degree: usize,
        control_points: Vec<UvPoint>,
        knots: Vec<f64>,
        weights: Option<Vec<f64>>,
    ) -> Result<Self, String> {
        if control_points.len() < 2 {
            return Err("trimming curve requires at least 2 control points".to_string());
        }
        if degree == 0 {
            return Err("trimming curve degree must be >= 1".to_string());
        }
        if degree >= control_points.len() {
            return Err("trimming curve degree must be < control point count".to_string());
        }
        if control_points.iter().any(|p| !p.is_finite()) {
            return Err("trimming curve control points must be finite".to_string());
        }

        let expected_knot_len = control_points.len() + degree + 1;
        if knots.len() != expected_knot_len {
            return Err(format!(
                "trimming curve knot length must be {}, got {}",
                expected_knot_len,
                knots.len()
            ));
        }
        if knots.iter().any(|k| !k.is_finite()) || !knot::is_non_decreasing(&knots) {
            return Err("trimming curve knots must be finite and non-decreasing".to_string());
        }
        if knots[degree] >= knots[control_points.len()] {
            return Err("trimming curve parameter domain is empty".to_string());
        }

        if let Some(ref weights) = weights {
            if weights.len() != control_points.len() {
                return Err("trimming curve weights length must match control point count".to_string());
            }
            if weights.iter().any(|w| !w.is_finite() || *w <= 0.0) {
                return Err("trimming curve weights must be finite and > 0".to_string());
            }
        }

        Ok(Self {
            degree,
            control_points,
            knots,
            weights,
        })
    }

    /// Straight segment from `a` to `b` over `[0, 1]`.
    #[must_use]
    pub fn line(a: UvPoint, b: UvPoint) -> Self {
        Self {
            degree: 1,
            control_points: vec![a, b],
            knots: vec![0.0, 0.0, 1.0, 1.0],
            weights: None,
        }
    }

    /// Degree-1 curve through `points`, vertex `i` at parameter `i`.
    pub fn polyline(points: &[UvPoint]) -> Result<Self, String> {
        if points.len() < 2 {
            return Err("polyline requires at least 2 points".to_string());
        }
        let last = (points.len() - 1) as f64;
        let mut knots = Vec::with_capacity(points.len() + 2);
        knots.push(0.0);
        knots.extend((0..points.len()).map(|i| i as f64));
        knots.push(last);
        Self::new(1, points.to_vec(), knots, None)
    }

    /// Single-span Bezier curve of degree `points.len() - 1`.
    pub fn bezier(points: &[UvPoint]) -> Result<Self, String> {
        if points.len() < 2 {
            return Err("bezier curve requires at least 2 points".to_string());
        }
        let degree = points.len() - 1;
        let mut knots = vec![0.0; degree + 1];
        knots.extend(std::iter::repeat_n(1.0, degree + 1));
        Self::new(degree, points.to_vec(), knots, None)
    }

    /// Full circle as a 9-point rational quadratic, counter-clockwise from `(c.u + r, c.v)`.
    pub fn circle(center: UvPoint, radius: f64) -> Result<Self, String> {
        if !radius.is_finite() || radius <= 0.0 {
            return Err("circle radius must be finite and > 0".to_string());
        }
        let s = std::f64::consts::FRAC_1_SQRT_2;
        let offsets = [
            (1.0, 0.0),
            (1.0, 1.0),
            (0.0, 1.0),
            (-1.0, 1.0),
            (-1.0, 0.0),
            (-1.0, -1.0),
            (0.0, -1.0),
            (1.0, -1.0),
            (1.0, 0.0),
        ];
        let points = offsets
            .iter()
            .map(|(du, dv)| UvPoint::new(center.u + radius * du, center.v + radius * dv))
            .collect();
        let weights = (0..9).map(|i| if i % 2 == 0 { 1.0 } else { s }).collect();
        let knots = vec![0.0, 0.0, 0.0, 0.25, 0.25, 0.5, 0.5, 0.75, 0.75, 1.0, 1.0, 1.0];
        Self::new(2, points, knots, Some(weights))
    }

    #[must_use]
    pub fn degree(&self) -> usize {
        self.degree
    }

    #[must_use]
    pub fn control_points(&self) -> &[UvPoint] {
        &self.control_points
    }

    #[must_use]
    pub fn knots(&self) -> &[f64] {
        &self.knots
    }

    #[must_use]
    pub fn weights(&self) -> Option<&[f64]> {
        self.weights.as_deref()
    }

    #[must_use]
    pub fn is_rational(&self) -> bool {
        self.weights
            .as_ref()
            .is_some_and(|w| w.iter().any(|&x| x != 1.0))
    }

    /// Degree 1 and non-rational: the control polygon is the curve.
    #[must_use]
    pub fn is_polyline(&self) -> bool {
        self.degree == 1 && !self.is_rational()
    }

    #[must_use]
    pub fn domain(&self) -> (f64, f64) {
        (self.knots[self.degree], self.knots[self.control_points.len()])
    }

    #[must_use]
    pub fn is_clamped(&self) -> bool {
        knot::is_clamped(&self.knots, self.degree)
    }

    fn to_row(&self) -> ControlRow<3> {
        let points = self
            .control_points
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let w = self.weights.as_ref().map_or(1.0, |w| w[i]);
                [p.u * w, p.v * w, w]
            })
            .collect();
        ControlRow::new(self.knots.clone(), points)
    }

    fn from_row(degree: usize, row: ControlRow<3>, rational: bool) -> Self {
        let control_points = row
            .points
            .iter()
            .map(|h| UvPoint::new(h[0] / h[2], h[1] / h[2]))
            .collect();
        let weights = rational.then(|| row.points.iter().map(|h| h[2]).collect());
        Self {
            degree,
            control_points,
            knots: row.knots,
            weights,
        }
    }

    /// Evaluates the curve, clamping `t` into the domain.
    #[must_use]
    pub fn point_at(&self, t: f64) -> UvPoint {
        if self.weights.is_none() {
            let points: Vec<[f64; 2]> = self.control_points.iter().map(|p| [p.u, p.v]).collect();
            let [u, v] = knot::evaluate(&self.knots, &points, self.degree, t);
            return UvPoint::new(u, v);
        }
        let row = self.to_row();
        let h = knot::evaluate(&row.knots, &row.points, self.degree, t);
        UvPoint::new(h[0] / h[2], h[1] / h[2])
    }

    /// First point of the curve; exact for clamped curves.
    #[must_use]
    pub fn start_point(&self) -> UvPoint {
        if self.is_clamped() {
            self.control_points[0]
        } else {
            self.point_at(self.domain().0)
        }
    }

    /// Last point of the curve; exact for clamped curves.
    #[must_use]
    pub fn end_point(&self) -> UvPoint {
        if self.is_clamped() {
            self.control_points[self.control_points.len() - 1]
        } else {
            self.point_at(self.domain().1)
        }
    }

    /// Same curve over the same domain with clamped (open-end) knots.
    #[must_use]
    pub fn to_open_end(&self) -> Self {
        if self.is_clamped() {
            return self.clone();
        }
        let rational = self.weights.is_some();
        Self::from_row(self.degree, knot::clamp_row(&self.to_row(), self.degree), rational)
    }

    /// Opposite direction, same domain.
    #[must_use]
    pub fn reversed(&self) -> Self {
        let curve = self.to_open_end();
        let mut control_points = curve.control_points;
        control_points.reverse();
        let weights = curve.weights.map(|mut w| {
            w.reverse();
            w
        });
        Self {
            degree: curve.degree,
            control_points,
            knots: knot::reflect_knots(&curve.knots),
            weights,
        }
    }

    /// Splits at an interior parameter into two clamped curves sharing the split point exactly.
    pub fn split_at(&self, t: f64) -> Result<(Self, Self), String> {
        let rational = self.weights.is_some();
        let row = self.to_open_end().to_row();
        let (left, right) = knot::split_row(&row, self.degree, t)?;
        let left = Self::from_row(self.degree, left, rational);
        let mut right = Self::from_row(self.degree, right, rational);
        // Rational division can round differently; the junction is shared.
        let joint = left.end_point();
        right.control_points[0] = joint;
        Ok((left, right))
    }

    /// Part of the curve between `t0 < t1`, both clamped into the domain.
    pub fn region(&self, t0: f64, t1: f64) -> Result<Self, String> {
        let (a, b) = self.domain();
        let (t0, t1) = (t0.max(a), t1.min(b));
        if t0 >= t1 {
            return Err(format!("empty curve region [{t0}, {t1}]"));
        }
        let mut curve = self.to_open_end();
        if t0 > a {
            curve = curve.split_at(t0)?.1;
        }
        if t1 < b {
            curve = curve.split_at(t1)?.0;
        }
        Ok(curve)
    }

    /// Applies an affine map of the parameter plane to the control points.
    #[must_use]
    pub fn map_points(&self, f: impl Fn(UvPoint) -> UvPoint) -> Self {
        Self {
            degree: self.degree,
            control_points: self.control_points.iter().map(|&p| f(p)).collect(),
            knots: self.knots.clone(),
            weights: self.weights.clone(),
        }
    }

    /// Moves the first point of the curve onto `p` exactly.
    pub fn set_start_point(&mut self, p: UvPoint) {
        if !self.is_clamped() {
            *self = self.to_open_end();
        }
        self.control_points[0] = p;
    }

    /// Moves the last point of the curve onto `p` exactly.
    pub fn set_end_point(&mut self, p: UvPoint) {
        if !self.is_clamped() {
            *self = self.to_open_end();
        }
        let last = self.control_points.len() - 1;
        self.control_points[last] = p;
    }

    /// Moves control-point coordinates within `eps` of `value` (along `direction`) onto it.
    ///
    /// Returns how many coordinates were moved.
    pub fn snap_axis(&mut self, direction: SplitDirection, value: f64, eps: f64) -> usize {
        let mut moved = 0;
        for p in &mut self.control_points {
            let c = p.along(direction);
            if c != value && (c - value).abs() <= eps {
                *p = UvPoint::from_axes(direction, value, p.across(direction));
                moved += 1;
            }
        }
        moved
    }

    /// Parameters evenly spaced over the domain, ends included.
    #[must_use]
    pub fn sample_params(&self, count: usize) -> Vec<f64> {
        let count = count.max(2);
        let (a, b) = self.domain();
        (0..count)
            .map(|i| {
                if i + 1 == count {
                    b
                } else {
                    a + (b - a) * i as f64 / (count - 1) as f64
                }
            })
            .collect()
    }

    /// Parameters at every distinct knot in the domain plus `per_span` interior samples.
    #[must_use]
    pub fn span_params(&self, per_span: usize) -> Vec<f64> {
        let (a, b) = self.domain();
        let mut breaks: Vec<f64> = self
            .knots
            .iter()
            .copied()
            .filter(|&k| k >= a && k <= b)
            .collect();
        breaks.dedup();

        let mut params = Vec::with_capacity(breaks.len() * (per_span + 1));
        for w in breaks.windows(2) {
            let (k0, k1) = (w[0], w[1]);
            for i in 0..=per_span {
                params.push(k0 + (k1 - k0) * i as f64 / (per_span + 1) as f64);
            }
        }
        params.push(b);
        params
    }

    #[must_use]
    pub fn sample_points(&self, count: usize) -> Vec<UvPoint> {
        self.sample_params(count)
            .into_iter()
            .map(|t| self.point_at(t))
            .collect()
    }

    /// Mean coordinate along `direction` over evenly spaced samples.
    #[must_use]
    pub fn mean_along(&self, direction: SplitDirection) -> f64 {
        let samples = self.sample_points(4 * (self.degree + 1));
        samples.iter().map(|p| p.along(direction)).sum::<f64>() / samples.len() as f64
    }

    /// Chord length of the sampled curve.
    #[must_use]
    pub fn approximate_length(&self) -> f64 {
        if self.is_polyline() {
            return self
                .control_points
                .windows(2)
                .map(|w| w[0].distance(w[1]))
                .sum();
        }
        self.span_params(4 * self.degree)
            .windows(2)
            .map(|w| self.point_at(w[0]).distance(self.point_at(w[1])))
            .sum()
    }

    /// Bounding rectangle of the control polygon (encloses the curve).
    #[must_use]
    pub fn control_bounds(&self) -> Option<UvDomain> {
        UvDomain::from_points(&self.control_points)
    }

    /// True when every control point lies on the line `along(direction) == value`.
    #[must_use]
    pub fn lies_on_line(&self, direction: SplitDirection, value: f64, eps: f64) -> bool {
        self.control_points
            .iter()
            .all(|p| (p.along(direction) - value).abs() <= eps)
    }

    /// Parameters where the curve meets the line `along(direction) == value`, sorted.
    ///
    /// Polylines are intersected exactly per span, including vertices lying on the
    /// line. Other curves are subdivided until each crossing is isolated on the
    /// control polygon, so two crossings close together are both found. Roots
    /// closer than `tol` in parameter are merged.
    #[must_use]
    pub fn line_intersections(&self, direction: SplitDirection, value: f64, tol: f64) -> Vec<f64> {
        let f = |p: UvPoint| p.along(direction) - value;
        let mut roots = Vec::new();

        if let Some(bounds) = self.control_bounds() {
            let (lo, hi) = bounds.range(direction);
            if value < lo || value > hi {
                return roots;
            }
        }

        if self.is_polyline() {
            let n = self.control_points.len();
            for i in 0..n - 1 {
                let fa = f(self.control_points[i]);
                let fb = f(self.control_points[i + 1]);
                let (ka, kb) = (self.knots[i + 1], self.knots[i + 2]);
                if fa == 0.0 {
                    roots.push(ka);
                } else if (fa < 0.0 && fb > 0.0) || (fa > 0.0 && fb < 0.0) {
                    roots.push(ka + (kb - ka) * fa / (fa - fb));
                }
            }
            if f(self.control_points[n - 1]) == 0.0 {
                roots.push(self.knots[n]);
            }
        } else {
            let (a, b) = self.domain();
            let min_width = tol.max(f64::EPSILON * (b - a));
            self.isolate_crossings(&f, min_width, ISOLATION_DEPTH, &mut roots);
            if f(self.point_at(a)) == 0.0 {
                roots.push(a);
            }
            if f(self.point_at(b)) == 0.0 {
                roots.push(b);
            }
        }

        roots.sort_by(f64::total_cmp);
        roots.dedup_by(|b, a| (*b - *a).abs() <= tol);
        roots
    }

    /// Splits the curve until every piece's control polygon changes sign at most
    /// once, then refines each single crossing by bisection.
    ///
    /// The curve never crosses the line more often than its control polygon, so a
    /// piece whose polygon stays on one side has no crossing.
    fn isolate_crossings(&self, f: &impl Fn(UvPoint) -> f64, min_width: f64, depth: usize, roots: &mut Vec<f64>) {
        let changes = self
            .control_points
            .windows(2)
            .filter(|w| (f(w[0]) < 0.0) != (f(w[1]) < 0.0))
            .count();
        if changes == 0 {
            return;
        }

        let (a, b) = self.domain();
        let fa = f(self.point_at(a));
        let ends_differ = (fa < 0.0) != (f(self.point_at(b)) < 0.0);
        if changes == 1 && ends_differ {
            roots.push(self.bisect_root(f, a, b, fa));
            return;
        }
        if depth == 0 || b - a <= min_width {
            if ends_differ {
                roots.push(self.bisect_root(f, a, b, fa));
            }
            return;
        }

        match self.split_at(0.5 * (a + b)) {
            Ok((left, right)) => {
                left.isolate_crossings(f, min_width, depth - 1, roots);
                right.isolate_crossings(f, min_width, depth - 1, roots);
            }
            Err(_) if ends_differ => roots.push(self.bisect_root(f, a, b, fa)),
            Err(_) => {}
        }
    }

    fn bisect_root(&self, f: &impl Fn(UvPoint) -> f64, mut lo: f64, mut hi: f64, f_lo: f64) -> f64 {
        let lo_negative = f_lo < 0.0;
        for _ in 0..ROOT_BISECTIONS {
            let mid = 0.5 * (lo + hi);
            if mid <= lo || mid >= hi {
                break;
            }
            let fm = f(self.point_at(mid));
            if fm == 0.0 {
                return mid;
            }
            if (fm < 0.0) == lo_negative {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        0.5 * (lo + hi)
    }

    /// Joins degree-1 curves end to start into one polyline.
    pub fn merge_polylines(curves: &[Self]) -> Result<Self, String> {
        let mut points: Vec<UvPoint> = Vec::new();
        for curve in curves {
            if !curve.is_polyline() {
                return Err("only polylines can be merged".to_string());
            }
            let pts = curve.control_points();
            let skip = usize::from(points.last() == pts.first());
            points.extend_from_slice(&pts[skip..]);
        }
        Self::polyline(&points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn circle_points_stay_on_radius() {
        let c = UvCurve::circle(UvPoint::new(0.5, 0.5), 0.3).unwrap();
        for t in c.sample_params(33) {
            let r = c.point_at(t).distance(UvPoint::new(0.5, 0.5));
            assert!((r - 0.3).abs() < 1e-12, "radius {r} at {t}");
        }
        assert_eq!(c.start_point(), c.end_point());
    }

    #[test]
    fn polyline_crossings_include_vertices_on_the_line() {
        let c = UvCurve::polyline(&[
            UvPoint::new(0.0, 0.0),
            UvPoint::new(0.5, 1.0),
            UvPoint::new(1.0, 0.0),
        ])
        .unwrap();
        assert_eq!(c.line_intersections(SplitDirection::U, 0.5, 1e-12), vec![1.0]);
        let hits = c.line_intersections(SplitDirection::V, 0.5, 1e-12);
        assert_eq!(hits.len(), 2);
        assert!((hits[0] - 0.5).abs() < 1e-12);
        assert!((hits[1] - 1.5).abs() < 1e-12);
    }

    #[test]
    fn close_crossing_pair_is_found() {
        let cap = UvCurve::bezier(&[
            UvPoint::new(0.1, 0.2),
            UvPoint::new(0.5, 0.8),
            UvPoint::new(0.9, 0.2),
        ])
        .unwrap();
        let hits = cap.line_intersections(SplitDirection::V, 0.4999, 1e-12);
        assert_eq!(hits.len(), 2);
        for t in hits {
            assert!((cap.point_at(t).v - 0.4999).abs() < 1e-12, "v at {t}");
            assert!((t - 0.5).abs() < 0.01);
        }
        assert!(cap.line_intersections(SplitDirection::V, 0.5001, 1e-12).is_empty());
    }

    #[test]
    fn reversed_keeps_domain_and_swaps_ends() {
        let c = UvCurve::bezier(&[
            UvPoint::new(0.0, 0.0),
            UvPoint::new(0.3, 0.8),
            UvPoint::new(1.0, 0.2),
        ])
        .unwrap();
        let r = c.reversed();
        assert_eq!(r.domain(), c.domain());
        assert_eq!(r.start_point(), c.end_point());
        let p = c.point_at(0.3);
        let q = r.point_at(0.7);
        assert!(p.distance(q) < 1e-12);
    }
}
