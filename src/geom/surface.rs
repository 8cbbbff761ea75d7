use super::core::{Point3, Tolerance, Transform, Vec3};
use super::knot::{self, ControlRow};
use super::trim::{SplitDirection, UvDomain};

fn wrap_param(value: f64, start: f64, end: f64) -> f64 {
    let span = end - start;
    if !span.is_finite() || span == 0.0 {
        return start;
    }
    let mut t = (value - start) % span;
    if t < 0.0 {
        t += span;
    }
    start + t
}

fn h_sub(a: [f64; 4], b: [f64; 4]) -> [f64; 4] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2], a[3] - b[3]]
}

fn h_scale(a: [f64; 4], s: f64) -> [f64; 4] {
    [a[0] * s, a[1] * s, a[2] * s, a[3] * s]
}

fn h_to_point(h: [f64; 4]) -> Option<Point3> {
    if !h[3].is_finite() || h[3] == 0.0 {
        return None;
    }
    Some(Point3::new(h[0] / h[3], h[1] / h[3], h[2] / h[3]))
}

pub trait Surface {
    fn point_at(&self, u: f64, v: f64) -> Point3;

    #[must_use]
    fn domain_u(&self) -> (f64, f64) {
        (0.0, 1.0)
    }

    #[must_use]
    fn domain_v(&self) -> (f64, f64) {
        (0.0, 1.0)
    }

    #[must_use]
    fn domain(&self) -> UvDomain {
        let (u0, u1) = self.domain_u();
        let (v0, v1) = self.domain_v();
        UvDomain::new(u0, u1, v0, v1)
    }

    #[must_use]
    fn is_u_closed(&self) -> bool {
        false
    }

    #[must_use]
    fn is_v_closed(&self) -> bool {
        false
    }

    #[must_use]
    fn pole_u_start(&self) -> bool {
        false
    }

    #[must_use]
    fn pole_u_end(&self) -> bool {
        false
    }

    #[must_use]
    fn pole_v_start(&self) -> bool {
        false
    }

    #[must_use]
    fn pole_v_end(&self) -> bool {
        false
    }

    #[must_use]
    fn partial_derivatives_at(&self, u: f64, v: f64) -> (Vec3, Vec3) {
        let (u0, u1) = self.domain_u();
        let (v0, v1) = self.domain_v();
        let u = u.clamp(u0, u1);
        let v = v.clamp(v0, v1);

        let mut du = Vec3::ZERO;
        let mut dv = Vec3::ZERO;

        let hu = Tolerance::DERIVATIVE.relative_to(u1 - u0);
        if hu.is_finite() && hu != 0.0 {
            let (ua, ub) = ((u - hu).max(u0), (u + hu).min(u1));
            if ua != ub {
                du = self.point_at(ub, v).sub_point(self.point_at(ua, v)) * (1.0 / (ub - ua));
            }
        }

        let hv = Tolerance::DERIVATIVE.relative_to(v1 - v0);
        if hv.is_finite() && hv != 0.0 {
            let (va, vb) = ((v - hv).max(v0), (v + hv).min(v1));
            if va != vb {
                dv = self.point_at(u, vb).sub_point(self.point_at(u, va)) * (1.0 / (vb - va));
            }
        }

        (du, dv)
    }

    #[must_use]
    fn normal_at(&self, u: f64, v: f64) -> Option<Vec3> {
        let (du, dv) = self.partial_derivatives_at(u, v);
        du.cross(dv).normalized()
    }
}

/// Tensor-product NURBS surface with a v-major control net (`idx = v * u_count + u`).
#[derive(Debug, Clone, PartialEq)]
pub struct NurbsSurface {
    pub degree_u: usize,
    pub degree_v: usize,
    pub u_count: usize,
    pub v_count: usize,
    pub control_points: Vec<Point3>,
    pub knots_u: Vec<f64>,
    pub knots_v: Vec<f64>,
    pub weights: Option<Vec<f64>>,
    u_closed: bool,
    v_closed: bool,
    pole_u_start: bool,
    pole_u_end: bool,
    pole_v_start: bool,
    pole_v_end: bool,
}

impl NurbsSurface {
    pub fn new(
        degree_u: usize,
        degree_v: usize,
        u_count: usize,
        v_count: usize,
        control_points: Vec<Point3>,
        knots_u: Vec<f64>,
        knots_v: Vec<f64>,
        weights: Option<Vec<f64>>,
    ) -> Result<Self, String> {
        if u_count < 2 || v_count < 2 {
            return Err("nurbs surface requires at least a 2x2 control net".to_string());
        }
        if degree_u == 0 || degree_v == 0 {
            return Err("nurbs surface degrees must be >= 1".to_string());
        }
        if degree_u >= u_count || degree_v >= v_count {
            return Err("nurbs surface degrees must be < control point counts".to_string());
        }
        if control_points.len() != u_count * v_count {
            return Err("nurbs surface control point count must match u_count*v_count".to_string());
        }

        let expected_u_knots = u_count + degree_u + 1;
        if knots_u.len() != expected_u_knots {
            return Err(format!(
                "nurbs surface u knot length must be {}, got {}",
                expected_u_knots,
                knots_u.len()
            ));
        }

        let expected_v_knots = v_count + degree_v + 1;
        if knots_v.len() != expected_v_knots {
            return Err(format!(
                "nurbs surface v knot length must be {}, got {}",
                expected_v_knots,
                knots_v.len()
            ));
        }

        if !knot::is_non_decreasing(&knots_u) || !knot::is_non_decreasing(&knots_v) {
            return Err("nurbs surface knots must be non-decreasing".to_string());
        }
        if knots_u[degree_u] >= knots_u[u_count] || knots_v[degree_v] >= knots_v[v_count] {
            return Err("nurbs surface parameter domain is empty".to_string());
        }

        if let Some(ref weights) = weights {
            if weights.len() != control_points.len() {
                return Err(
                    "nurbs surface weights length must match control point count".to_string(),
                );
            }
            if weights.iter().any(|w| !w.is_finite() || *w <= 0.0) {
                return Err("nurbs surface weights must be finite and > 0".to_string());
            }
        }

        let mut surface = Self {
            degree_u,
            degree_v,
            u_count,
            v_count,
            control_points,
            knots_u,
            knots_v,
            weights,
            u_closed: false,
            v_closed: false,
            pole_u_start: false,
            pole_u_end: false,
            pole_v_start: false,
            pole_v_end: false,
        };

        let tol = Tolerance::DEFAULT;
        surface.u_closed = surface.compute_closed(SplitDirection::U, tol);
        surface.v_closed = surface.compute_closed(SplitDirection::V, tol);
        surface.pole_u_start = !surface.u_closed && surface.compute_pole(SplitDirection::U, false, tol);
        surface.pole_u_end = !surface.u_closed && surface.compute_pole(SplitDirection::U, true, tol);
        surface.pole_v_start = !surface.v_closed && surface.compute_pole(SplitDirection::V, false, tol);
        surface.pole_v_end = !surface.v_closed && surface.compute_pole(SplitDirection::V, true, tol);

        Ok(surface)
    }

    /// Flat bilinear patch over `[0, 1]^2` through four corners.
    #[must_use]
    pub fn bilinear(p00: Point3, p10: Point3, p01: Point3, p11: Point3) -> Self {
        Self {
            degree_u: 1,
            degree_v: 1,
            u_count: 2,
            v_count: 2,
            control_points: vec![p00, p10, p01, p11],
            knots_u: vec![0.0, 0.0, 1.0, 1.0],
            knots_v: vec![0.0, 0.0, 1.0, 1.0],
            weights: None,
            u_closed: false,
            v_closed: false,
            pole_u_start: false,
            pole_u_end: false,
            pole_v_start: false,
            pole_v_end: false,
        }
    }

    /// Non-rational surface over `[0, 1]^2` with uniform clamped knots.
    pub fn from_grid(
        degree_u: usize,
        degree_v: usize,
        u_count: usize,
        v_count: usize,
        control_points: Vec<Point3>,
    ) -> Result<Self, String> {
        Self::new(
            degree_u,
            degree_v,
            u_count,
            v_count,
            control_points,
            knot::uniform_clamped_knots(degree_u, u_count),
            knot::uniform_clamped_knots(degree_v, v_count),
            None,
        )
    }

    #[must_use]
    pub fn is_rational(&self) -> bool {
        self.weights
            .as_ref()
            .is_some_and(|w| w.iter().any(|&x| x != 1.0))
    }

    fn control_hpoint(&self, idx: usize) -> [f64; 4] {
        let p = self.control_points[idx];
        let w = self
            .weights
            .as_ref()
            .and_then(|weights| weights.get(idx).copied())
            .unwrap_or(1.0);
        [p.x * w, p.y * w, p.z * w, w]
    }

    /// Control rows running along `direction`'s parameter: one per index of the other.
    fn rows_along(&self, direction: SplitDirection) -> Vec<ControlRow<4>> {
        match direction {
            SplitDirection::U => (0..self.v_count)
                .map(|v| {
                    let points = (0..self.u_count)
                        .map(|u| self.control_hpoint(v * self.u_count + u))
                        .collect();
                    ControlRow::new(self.knots_u.clone(), points)
                })
                .collect(),
            SplitDirection::V => (0..self.u_count)
                .map(|u| {
                    let points = (0..self.v_count)
                        .map(|v| self.control_hpoint(v * self.u_count + u))
                        .collect();
                    ControlRow::new(self.knots_v.clone(), points)
                })
                .collect(),
        }
    }

    fn with_rows(&self, direction: SplitDirection, rows: Vec<ControlRow<4>>) -> Result<Self, String> {
        let Some(first) = rows.first() else {
            return Err("nurbs surface has no control rows".to_string());
        };
        let knots = first.knots.clone();
        let count = first.points.len();
        if rows.iter().any(|r| r.points.len() != count || r.knots != knots) {
            return Err("nurbs surface rows diverged during refinement".to_string());
        }

        let (u_count, v_count, knots_u, knots_v) = match direction {
            SplitDirection::U => (count, self.v_count, knots, self.knots_v.clone()),
            SplitDirection::V => (self.u_count, count, self.knots_u.clone(), knots),
        };

        let mut net = vec![[0.0; 4]; u_count * v_count];
        for (r, row) in rows.iter().enumerate() {
            for (i, h) in row.points.iter().enumerate() {
                let idx = match direction {
                    SplitDirection::U => r * u_count + i,
                    SplitDirection::V => i * u_count + r,
                };
                net[idx] = *h;
            }
        }

        let mut control_points = Vec::with_capacity(net.len());
        for h in &net {
            control_points.push(h_to_point(*h).ok_or("nurbs surface weight collapsed to zero")?);
        }
        let weights = self
            .weights
            .is_some()
            .then(|| net.iter().map(|h| h[3]).collect());

        Self::new(
            self.degree_u,
            self.degree_v,
            u_count,
            v_count,
            control_points,
            knots_u,
            knots_v,
            weights,
        )
    }

    fn degree(&self, direction: SplitDirection) -> usize {
        match direction {
            SplitDirection::U => self.degree_u,
            SplitDirection::V => self.degree_v,
        }
    }

    /// Same surface with clamped (open-end) knots in both directions.
    pub fn to_open_end(&self) -> Result<Self, String> {
        let mut surface = self.clone();
        for direction in [SplitDirection::U, SplitDirection::V] {
            let degree = surface.degree(direction);
            let knots = match direction {
                SplitDirection::U => &surface.knots_u,
                SplitDirection::V => &surface.knots_v,
            };
            if knot::is_clamped(knots, degree) {
                continue;
            }
            let rows = surface
                .rows_along(direction)
                .iter()
                .map(|row| knot::clamp_row(row, degree))
                .collect();
            surface = surface.with_rows(direction, rows)?;
        }
        Ok(surface)
    }

    /// Splits at the interior line `direction == t` into the low and high halves.
    pub fn split(&self, t: f64, direction: SplitDirection) -> Result<(Self, Self), String> {
        let surface = self.to_open_end()?;
        let degree = surface.degree(direction);
        let mut lows = Vec::new();
        let mut highs = Vec::new();
        for row in surface.rows_along(direction) {
            let (lo, hi) = knot::split_row(&row, degree, t)?;
            lows.push(lo);
            highs.push(hi);
        }
        Ok((
            surface.with_rows(direction, lows)?,
            surface.with_rows(direction, highs)?,
        ))
    }

    /// Reverses the u direction over the same domain (flips the normal).
    pub fn reversed_u(&self) -> Result<Self, String> {
        let surface = self.to_open_end()?;
        let rows = surface
            .rows_along(SplitDirection::U)
            .into_iter()
            .map(|row| {
                let mut points = row.points;
                points.reverse();
                ControlRow::new(knot::reflect_knots(&row.knots), points)
            })
            .collect();
        surface.with_rows(SplitDirection::U, rows)
    }

    /// Affinely remaps the parameter domain onto `domain`.
    pub fn with_domain(&self, domain: &UvDomain) -> Result<Self, String> {
        if !domain.is_valid() {
            return Err(format!("invalid target domain {domain}"));
        }
        let surface = self.to_open_end()?;
        let knots_u = knot::remap_knots(&surface.knots_u, surface.domain_u(), (domain.u_min, domain.u_max));
        let knots_v = knot::remap_knots(&surface.knots_v, surface.domain_v(), (domain.v_min, domain.v_max));
        Self::new(
            surface.degree_u,
            surface.degree_v,
            surface.u_count,
            surface.v_count,
            surface.control_points,
            knots_u,
            knots_v,
            surface.weights,
        )
    }

    /// Applies an affine transform to the control net.
    pub fn transformed(&self, transform: Transform) -> Result<Self, String> {
        Self::new(
            self.degree_u,
            self.degree_v,
            self.u_count,
            self.v_count,
            self.control_points
                .iter()
                .map(|&p| transform.apply_point(p))
                .collect(),
            self.knots_u.clone(),
            self.knots_v.clone(),
            self.weights.clone(),
        )
    }

    /// Control points of the four corners `[p00, p10, p01, p11]`.
    #[must_use]
    pub fn corner_control_points(&self) -> [Point3; 4] {
        let nu = self.u_count;
        let nv = self.v_count;
        [
            self.control_points[0],
            self.control_points[nu - 1],
            self.control_points[(nv - 1) * nu],
            self.control_points[nv * nu - 1],
        ]
    }

    fn point_at_clamped(&self, u: f64, v: f64) -> Point3 {
        let p = self.degree_u;
        let q = self.degree_v;
        let (u0, u1) = self.domain_u();
        let (v0, v1) = self.domain_v();
        let u = u.clamp(u0, u1);
        let v = v.clamp(v0, v1);

        let nu = self.u_count - 1;
        let nv = self.v_count - 1;
        let span_u = knot::find_span(nu, p, u, &self.knots_u);
        let span_v = knot::find_span(nv, q, v, &self.knots_v);

        let mut temp = vec![[0.0; 4]; q + 1];
        for (l, slot) in temp.iter_mut().enumerate() {
            let v_index = span_v - q + l;
            let mut d: Vec<[f64; 4]> = (0..=p)
                .map(|j| self.control_hpoint(v_index * self.u_count + span_u - p + j))
                .collect();
            knot::de_boor(&mut d, span_u, p, u, &self.knots_u);
            *slot = d[p];
        }

        knot::de_boor(&mut temp, span_v, q, v, &self.knots_v);
        h_to_point(temp[q]).unwrap_or(self.control_points[0])
    }

    fn compute_closed(&self, direction: SplitDirection, tol: Tolerance) -> bool {
        let (a0, a1) = self.range(direction);
        let (b0, b1) = self.range(direction.other());
        let at = |along: f64, across: f64| match direction {
            SplitDirection::U => self.point_at_clamped(along, across),
            SplitDirection::V => self.point_at_clamped(across, along),
        };
        let b_mid = b0 + 0.5 * (b1 - b0);
        [b0, b_mid, b1]
            .iter()
            .all(|&b| tol.approx_eq_point3(at(a0, b), at(a1, b)))
    }

    /// True when the whole boundary line `direction == start|end` maps to one point.
    fn compute_pole(&self, direction: SplitDirection, at_end: bool, tol: Tolerance) -> bool {
        let (a0, a1) = self.range(direction);
        let a = if at_end { a1 } else { a0 };
        let (b0, b1) = self.range(direction.other());
        let at = |across: f64| match direction {
            SplitDirection::U => self.point_at_clamped(a, across),
            SplitDirection::V => self.point_at_clamped(across, a),
        };
        let p0 = at(b0);
        [0.25, 0.5, 0.75, 1.0]
            .iter()
            .all(|&f| tol.approx_eq_point3(p0, at(b0 + f * (b1 - b0))))
    }

    fn range(&self, direction: SplitDirection) -> (f64, f64) {
        match direction {
            SplitDirection::U => self.domain_u(),
            SplitDirection::V => self.domain_v(),
        }
    }
}

impl Surface for NurbsSurface {
    fn point_at(&self, u: f64, v: f64) -> Point3 {
        let (u0, u1) = self.domain_u();
        let (v0, v1) = self.domain_v();
        let u = if self.u_closed { wrap_param(u, u0, u1) } else { u.clamp(u0, u1) };
        let v = if self.v_closed { wrap_param(v, v0, v1) } else { v.clamp(v0, v1) };
        self.point_at_clamped(u, v)
    }

    fn domain_u(&self) -> (f64, f64) {
        (self.knots_u[self.degree_u], self.knots_u[self.u_count])
    }

    fn domain_v(&self) -> (f64, f64) {
        (self.knots_v[self.degree_v], self.knots_v[self.v_count])
    }

    fn is_u_closed(&self) -> bool {
        self.u_closed
    }

    fn is_v_closed(&self) -> bool {
        self.v_closed
    }

    fn pole_u_start(&self) -> bool {
        self.pole_u_start
    }

    fn pole_u_end(&self) -> bool {
        self.pole_u_end
    }

    fn pole_v_start(&self) -> bool {
        self.pole_v_start
    }

    fn pole_v_end(&self) -> bool {
        self.pole_v_end
    }

    fn partial_derivatives_at(&self, u: f64, v: f64) -> (Vec3, Vec3) {
        let p = self.degree_u;
        let q = self.degree_v;
        let (u0, u1) = self.domain_u();
        let (v0, v1) = self.domain_v();
        let u = u.clamp(u0, u1);
        let v = v.clamp(v0, v1);

        let nu = self.u_count - 1;
        let nv = self.v_count - 1;
        let span_u = knot::find_span(nu, p, u, &self.knots_u);
        let span_v = knot::find_span(nv, q, v, &self.knots_v);

        let mut temp: Vec<[f64; 4]> = Vec::with_capacity(q + 1);
        let mut temp_du: Vec<[f64; 4]> = Vec::with_capacity(q + 1);

        let knots_u_der = &self.knots_u[1..self.knots_u.len() - 1];
        for l in 0..=q {
            let v_index = span_v - q + l;
            let row_ctrl: Vec<[f64; 4]> = (0..=p)
                .map(|j| self.control_hpoint(v_index * self.u_count + span_u - p + j))
                .collect();

            let mut d_der: Vec<[f64; 4]> = (0..p)
                .map(|k| {
                    let i = span_u - p + k;
                    let denom = self.knots_u[i + p + 1] - self.knots_u[i + 1];
                    let scale = if denom == 0.0 { 0.0 } else { p as f64 / denom };
                    h_scale(h_sub(row_ctrl[k + 1], row_ctrl[k]), scale)
                })
                .collect();
            knot::de_boor(&mut d_der, span_u - 1, p - 1, u, knots_u_der);
            temp_du.push(d_der[p - 1]);

            let mut row_eval = row_ctrl;
            knot::de_boor(&mut row_eval, span_u, p, u, &self.knots_u);
            temp.push(row_eval[p]);
        }

        let mut d_der: Vec<[f64; 4]> = (0..q)
            .map(|k| {
                let i = span_v - q + k;
                let denom = self.knots_v[i + q + 1] - self.knots_v[i + 1];
                let scale = if denom == 0.0 { 0.0 } else { q as f64 / denom };
                h_scale(h_sub(temp[k + 1], temp[k]), scale)
            })
            .collect();
        let knots_v_der = &self.knots_v[1..self.knots_v.len() - 1];
        knot::de_boor(&mut d_der, span_v - 1, q - 1, v, knots_v_der);
        let hv = d_der[q - 1];

        let mut d_v = temp;
        knot::de_boor(&mut d_v, span_v, q, v, &self.knots_v);
        let h = d_v[q];

        let mut d_du = temp_du;
        knot::de_boor(&mut d_du, span_v, q, v, &self.knots_v);
        let hu = d_du[q];

        let w = h[3];
        if !w.is_finite() || w == 0.0 {
            return (Vec3::ZERO, Vec3::ZERO);
        }
        let inv_w2 = 1.0 / (w * w);

        let du = Vec3::new(
            (hu[0] * w - h[0] * hu[3]) * inv_w2,
            (hu[1] * w - h[1] * hu[3]) * inv_w2,
            (hu[2] * w - h[2] * hu[3]) * inv_w2,
        );
        let dv = Vec3::new(
            (hv[0] * w - h[0] * hv[3]) * inv_w2,
            (hv[1] * w - h[1] * hv[3]) * inv_w2,
            (hv[2] * w - h[2] * hv[3]) * inv_w2,
        );

        (du, dv)
    }
}
