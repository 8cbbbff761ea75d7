//! Piecewise-linear approximation of trimming curves and surface flatness.
//!
//! # Curve Approximation
//!
//! Use [`approximate_curve`] to turn a [`UvCurve`] into a polyline in the
//! parameter plane:
//!
//! ```ignore
//! use trim_engine::geom::{PolylineOptions, UvCurve, UvPoint, approximate_curve};
//!
//! let circle = UvCurve::circle(UvPoint::new(0.5, 0.5), 0.3)?;
//! let points = approximate_curve(&circle, &PolylineOptions::default());
//! ```
//!
//! Three methods are available (see [`PolylineMethod`]):
//! - `Uniform`: a fixed number of samples per knot span.
//! - `CurvatureAdaptive`: step length derived from local curvature so the chord
//!   height stays under the tolerance.
//! - `ChordalError`: recursive bisection until the curve deviates from every chord
//!   by at most the tolerance.
//!
//! In all cases the first and last points are the curve's exact end points, so
//! loops that were snapped closed stay closed after approximation. Polylines
//! (degree 1, non-rational) are returned as their control polygon.
//!
//! # Surface Flatness
//!
//! [`surface_flatness`] measures how far a control net strays from the bilinear
//! patch through its corner control points. By the convex hull property this
//! bounds the distance between the surface and its two-triangle approximation.

use super::context::{PolylineMethod, PolylineOptions};
use super::core::Point3;
use super::curve::UvCurve;
use super::surface::NurbsSurface;
use super::trim::UvPoint;

/// Recursion limit for chordal bisection of one knot span.
const MAX_CHORD_DEPTH: usize = 24;

/// Approximates a trimming curve by a polyline.
///
/// # Returns
/// At least two points; the first and last are the exact curve end points.
#[must_use]
pub fn approximate_curve(curve: &UvCurve, options: &PolylineOptions) -> Vec<UvPoint> {
    if curve.is_polyline() {
        return curve.control_points().to_vec();
    }

    let tolerance = if options.tolerance.is_finite() && options.tolerance > 0.0 {
        options.tolerance
    } else {
        PolylineOptions::default().tolerance
    };
    let max_segments = options.max_segments.max(2);

    let params = match options.method {
        PolylineMethod::Uniform => uniform_params(curve, options.samples, max_segments),
        PolylineMethod::ChordalError => chordal_params(curve, tolerance, options.samples, max_segments),
        PolylineMethod::CurvatureAdaptive => {
            curvature_params(curve, tolerance, options.samples, max_segments)
        }
    };

    let mut points: Vec<UvPoint> = params.iter().map(|&t| curve.point_at(t)).collect();
    let last = points.len() - 1;
    points[0] = curve.start_point();
    points[last] = curve.end_point();
    points.dedup();
    if points.len() < 2 {
        points.push(curve.end_point());
    }
    points
}

fn uniform_params(curve: &UvCurve, samples: usize, max_segments: usize) -> Vec<f64> {
    let params = curve.span_params(samples.max(1).saturating_sub(1));
    if params.len() - 1 > max_segments {
        curve.sample_params(max_segments + 1)
    } else {
        params
    }
}

/// Distance from `p` to the segment `a..b`.
fn distance_to_chord(p: UvPoint, a: UvPoint, b: UvPoint) -> f64 {
    let (du, dv) = (b.u - a.u, b.v - a.v);
    let len2 = du * du + dv * dv;
    if len2 == 0.0 {
        return p.distance(a);
    }
    let t = (((p.u - a.u) * du + (p.v - a.v) * dv) / len2).clamp(0.0, 1.0);
    p.distance(UvPoint::new(a.u + t * du, a.v + t * dv))
}

fn chordal_params(curve: &UvCurve, tolerance: f64, samples: usize, max_segments: usize) -> Vec<f64> {
    let seeds = curve.span_params((samples / 4).max(1));
    let mut params = vec![seeds[0]];
    for w in seeds.windows(2) {
        refine_chord(curve, w[0], w[1], tolerance, 0, max_segments, &mut params);
    }
    params
}

fn refine_chord(
    curve: &UvCurve,
    a: f64,
    b: f64,
    tolerance: f64,
    depth: usize,
    max_segments: usize,
    out: &mut Vec<f64>,
) {
    let pa = curve.point_at(a);
    let pb = curve.point_at(b);
    let deviation = [0.25, 0.5, 0.75]
        .iter()
        .map(|f| distance_to_chord(curve.point_at(a + (b - a) * f), pa, pb))
        .fold(0.0_f64, f64::max);

    if deviation <= tolerance || depth >= MAX_CHORD_DEPTH || out.len() >= max_segments {
        out.push(b);
        return;
    }
    let mid = 0.5 * (a + b);
    refine_chord(curve, a, mid, tolerance, depth + 1, max_segments, out);
    refine_chord(curve, mid, b, tolerance, depth + 1, max_segments, out);
}

/// Walks a dense sampling and keeps points spaced by the chord-height step `sqrt(8 h / k)`.
fn curvature_params(curve: &UvCurve, tolerance: f64, samples: usize, max_segments: usize) -> Vec<f64> {
    let dense = curve.span_params(samples.max(2) * 4);
    let pts: Vec<UvPoint> = dense.iter().map(|&t| curve.point_at(t)).collect();
    let n = pts.len();

    let mut curvature = vec![0.0; n];
    for i in 1..n - 1 {
        let (a, b, c) = (pts[i - 1], pts[i], pts[i + 1]);
        let ab = a.distance(b);
        let bc = b.distance(c);
        let ac = a.distance(c);
        let cross = (b.u - a.u) * (c.v - a.v) - (b.v - a.v) * (c.u - a.u);
        let denom = ab * bc * ac;
        if denom > 0.0 {
            curvature[i] = 2.0 * cross.abs() / denom;
        }
    }

    let mut params = vec![dense[0]];
    let mut travelled = 0.0;
    let mut k_max: f64 = 0.0;
    for i in 1..n {
        travelled += pts[i - 1].distance(pts[i]);
        k_max = k_max.max(curvature[i]);
        let step = if k_max > 0.0 {
            (8.0 * tolerance / k_max).sqrt()
        } else {
            f64::INFINITY
        };
        if i == n - 1 {
            params.push(dense[i]);
        } else if travelled >= step && params.len() < max_segments {
            params.push(dense[i]);
            travelled = 0.0;
            k_max = curvature[i];
        }
    }
    params
}

/// Largest distance between a control point and the bilinear patch of the corner control points.
#[must_use]
pub fn surface_flatness(surface: &NurbsSurface) -> f64 {
    let [p00, p10, p01, p11] = surface.corner_control_points();
    let nu = surface.u_count;
    let nv = surface.v_count;
    let bilinear = |s: f64, t: f64| -> Point3 {
        let a = p00.lerp(p10, s);
        let b = p01.lerp(p11, s);
        a.lerp(b, t)
    };

    let mut worst: f64 = 0.0;
    for j in 0..nv {
        let t = j as f64 / (nv - 1) as f64;
        for i in 0..nu {
            let s = i as f64 / (nu - 1) as f64;
            let d = surface.control_points[j * nu + i].distance_to(bilinear(s, t));
            worst = worst.max(d);
        }
    }
    worst
}
