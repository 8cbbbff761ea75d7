//! Knot-vector utilities shared by trimming curves and base surfaces.
//!
//! Control points are handled in homogeneous form (`[x*w, y*w, .., w]`), so the
//! same routines serve 2D trimming curves (`N = 3`) and surface rows (`N = 4`).

/// Relative amount a split parameter is moved when it lands exactly on a knot.
pub const SPLIT_PARAM_NUDGE: f64 = 1e-10;

/// Knot vector plus the homogeneous control points it drives.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlRow<const N: usize> {
    pub knots: Vec<f64>,
    pub points: Vec<[f64; N]>,
}

impl<const N: usize> ControlRow<N> {
    #[must_use]
    pub fn new(knots: Vec<f64>, points: Vec<[f64; N]>) -> Self {
        Self { knots, points }
    }
}

#[must_use]
pub fn is_non_decreasing(values: &[f64]) -> bool {
    values.windows(2).all(|w| w[0] <= w[1])
}

/// Blends two homogeneous points; coordinates shared by `a` and `b` are kept exactly.
#[must_use]
pub fn lerp_h<const N: usize>(a: [f64; N], b: [f64; N], t: f64) -> [f64; N] {
    let s = 1.0 - t;
    let mut out = [0.0; N];
    for i in 0..N {
        out[i] = if a[i] == b[i] { a[i] } else { a[i] * s + b[i] * t };
    }
    out
}

/// Span index `k` with `knots[k] <= u < knots[k + 1]`, clamped to `[p, n]`.
#[must_use]
pub fn find_span(n: usize, p: usize, u: f64, knots: &[f64]) -> usize {
    if u >= knots[n + 1] {
        return n;
    }
    if u <= knots[p] {
        return p;
    }

    let mut low = p;
    let mut high = n + 1;
    let mut mid = (low + high) / 2;
    while u < knots[mid] || u >= knots[mid + 1] {
        if u < knots[mid] {
            high = mid;
        } else {
            low = mid;
        }
        mid = (low + high) / 2;
    }
    mid
}

pub fn de_boor<const N: usize>(d: &mut [[f64; N]], span: usize, p: usize, u: f64, knots: &[f64]) {
    for r in 1..=p {
        for j in (r..=p).rev() {
            let i = span - p + j;
            let denom = knots[i + p + 1 - r] - knots[i];
            let alpha = if denom == 0.0 { 0.0 } else { (u - knots[i]) / denom };
            d[j] = lerp_h(d[j - 1], d[j], alpha);
        }
    }
}

/// Evaluates the homogeneous B-spline at `u` (clamped into the valid domain).
#[must_use]
pub fn evaluate<const N: usize>(knots: &[f64], points: &[[f64; N]], degree: usize, u: f64) -> [f64; N] {
    let n = points.len() - 1;
    let u = u.clamp(knots[degree], knots[n + 1]);
    let span = find_span(n, degree, u, knots);
    let mut d: Vec<[f64; N]> = points[span - degree..=span].to_vec();
    de_boor(&mut d, span, degree, u, knots);
    d[degree]
}

/// Number of knots exactly equal to `u`.
#[must_use]
pub fn knot_multiplicity(u: f64, knots: &[f64]) -> usize {
    knots.iter().filter(|&&k| k == u).count()
}

/// Span used for insertion: last `k` in `[p, n]` with `knots[k] <= u`.
fn insertion_span(knots: &[f64], n: usize, p: usize, u: f64) -> usize {
    let mut k = p;
    while k < n && knots[k + 1] <= u {
        k += 1;
    }
    k
}

/// Inserts `u` once (Boehm insertion, NURBS Book A5.1).
#[must_use]
pub fn insert_knot<const N: usize>(row: &ControlRow<N>, degree: usize, u: f64) -> ControlRow<N> {
    let p = degree;
    let n = row.points.len() - 1;
    let k = insertion_span(&row.knots, n, p, u);

    let mut knots = Vec::with_capacity(row.knots.len() + 1);
    knots.extend_from_slice(&row.knots[..=k]);
    knots.push(u);
    knots.extend_from_slice(&row.knots[k + 1..]);

    let mut points = Vec::with_capacity(row.points.len() + 1);
    points.extend_from_slice(&row.points[..=(k - p)]);
    for i in (k - p + 1)..=k {
        let denom = row.knots[i + p] - row.knots[i];
        let alpha = if denom == 0.0 { 0.0 } else { (u - row.knots[i]) / denom };
        points.push(lerp_h(row.points[i - 1], row.points[i], alpha));
    }
    points.extend_from_slice(&row.points[k..]);

    ControlRow { knots, points }
}

/// Inserts `u` until its multiplicity reaches `degree`.
fn saturate_knot<const N: usize>(row: &ControlRow<N>, degree: usize, u: f64) -> ControlRow<N> {
    let mut row = row.clone();
    let mut s = knot_multiplicity(u, &row.knots);
    while s < degree {
        row = insert_knot(&row, degree, u);
        s += 1;
    }
    row
}

/// Part of a saturated row to the left of the knot `t`.
fn left_of<const N: usize>(row: &ControlRow<N>, degree: usize, t: f64) -> Option<ControlRow<N>> {
    let k = row.knots.iter().position(|&x| x == t)?;
    let mut knots = row.knots[..k + degree].to_vec();
    knots.push(t);
    Some(ControlRow::new(knots, row.points[..k].to_vec()))
}

/// Part of a saturated row to the right of the knot `t`.
fn right_of<const N: usize>(row: &ControlRow<N>, degree: usize, t: f64) -> Option<ControlRow<N>> {
    let k = row.knots.iter().position(|&x| x == t)?;
    let s = knot_multiplicity(t, &row.knots);
    let first = (k + s).checked_sub(degree + 1)?;
    let mut knots = vec![t];
    knots.extend_from_slice(&row.knots[k + s - degree..]);
    Some(ControlRow::new(knots, row.points[first..].to_vec()))
}

/// Splits a clamped row at an interior parameter into two clamped rows.
pub fn split_row<const N: usize>(
    row: &ControlRow<N>,
    degree: usize,
    t: f64,
) -> Result<(ControlRow<N>, ControlRow<N>), String> {
    let n = row.points.len() - 1;
    let (t0, t1) = (row.knots[degree], row.knots[n + 1]);
    if !(t > t0 && t < t1) {
        return Err(format!("split parameter {t} is not inside ({t0}, {t1})"));
    }

    let saturated = saturate_knot(row, degree, t);
    let left = left_of(&saturated, degree, t).ok_or("split knot missing after insertion")?;
    let right = right_of(&saturated, degree, t).ok_or("split knot missing after insertion")?;
    Ok((left, right))
}

#[must_use]
pub fn is_clamped(knots: &[f64], degree: usize) -> bool {
    let m = knots.len();
    if m < 2 * (degree + 1) {
        return false;
    }
    knots[..=degree].iter().all(|&k| k == knots[0])
        && knots[m - degree - 1..].iter().all(|&k| k == knots[m - 1])
}

/// Converts an unclamped (periodic/floating) row to open-end form over the same domain.
#[must_use]
pub fn clamp_row<const N: usize>(row: &ControlRow<N>, degree: usize) -> ControlRow<N> {
    if is_clamped(&row.knots, degree) {
        return row.clone();
    }

    let n = row.points.len() - 1;
    let (a, b) = (row.knots[degree], row.knots[n + 1]);
    let mut row = row.clone();

    let m = row.knots.len();
    if !row.knots[m - degree - 1..].iter().all(|&k| k == b) {
        let saturated = saturate_knot(&row, degree, b);
        if let Some(left) = left_of(&saturated, degree, b) {
            row = left;
        }
    }

    if !row.knots[..=degree].iter().all(|&k| k == a) {
        let saturated = saturate_knot(&row, degree, a);
        if let Some(right) = right_of(&saturated, degree, a) {
            row = right;
        }
    }

    row
}

/// Affinely maps knots from the `from` interval onto the `to` interval.
#[must_use]
pub fn remap_knots(knots: &[f64], from: (f64, f64), to: (f64, f64)) -> Vec<f64> {
    let span = from.1 - from.0;
    if span == 0.0 {
        return knots.to_vec();
    }
    let scale = (to.1 - to.0) / span;
    let pin = 4.0 * f64::EPSILON * to.0.abs().max(to.1.abs()).max(1.0);
    let mut out: Vec<f64> = knots.iter().map(|&k| to.0 + (k - from.0) * scale).collect();
    // Domain ends land exactly on the target interval.
    for k in &mut out {
        if (*k - to.0).abs() <= pin {
            *k = to.0;
        } else if (*k - to.1).abs() <= pin {
            *k = to.1;
        }
    }
    out
}

/// Mirrors a knot vector about the centre of its full range (used for reversal).
#[must_use]
pub fn reflect_knots(knots: &[f64]) -> Vec<f64> {
    let (Some(&first), Some(&last)) = (knots.first(), knots.last()) else {
        return Vec::new();
    };
    knots.iter().rev().map(|&k| first + last - k).collect()
}

/// Uniform clamped knot vector on `[0, 1]`.
#[must_use]
pub fn uniform_clamped_knots(degree: usize, n_ctrl: usize) -> Vec<f64> {
    let m = n_ctrl + degree + 1;
    let mut knots = vec![0.0; m];
    for i in 0..=degree {
        knots[m - 1 - i] = 1.0;
    }
    let n_interior = n_ctrl.saturating_sub(degree + 1);
    for i in 1..=n_interior {
        knots[degree + i] = i as f64 / (n_interior + 1) as f64;
    }
    knots
}

/// Returns a split parameter that does not coincide with an interior knot.
///
/// When `t` equals a knot exactly it is moved by `SPLIT_PARAM_NUDGE` times the
/// domain span, toward the domain end that keeps it strictly inside. Values
/// already off every knot, or outside the open domain, are returned unchanged.
#[must_use]
pub fn non_degenerate_split_param(knots: &[f64], t: f64, domain: (f64, f64)) -> f64 {
    let (t0, t1) = domain;
    if !(t > t0 && t < t1) || !knots.iter().any(|&k| k == t) {
        return t;
    }
    let nudge = SPLIT_PARAM_NUDGE * (t1 - t0);
    let forward = t + nudge;
    if forward < t1 { forward } else { t - nudge }
}
