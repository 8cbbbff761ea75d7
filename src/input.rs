//! Serde shapes accepted by the wasm facade and the CLI.
//!
//! Inputs arrive as plain arrays; conversion into the geometry types
//! validates them and reports problems as [`TrimError::InvalidGeometry`].

use serde::{Deserialize, Serialize};

use crate::geom::{
    NurbsSurface, Point3, TrimContext, TrimDiagnostics, TrimError, TrimLoop, TrimmedSurface,
    UvCurve, UvPoint, knot,
};

/// A tensor-product surface, or its bilinear shorthand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SurfaceInput {
    /// Corners in the order `(0,0)`, `(1,0)`, `(0,1)`, `(1,1)`.
    Bilinear { corners: [[f64; 3]; 4] },
    Nurbs {
        degree_u: usize,
        degree_v: usize,
        u_count: usize,
        v_count: usize,
        /// Row-major in `v`: index `v * u_count + u`.
        control_points: Vec<[f64; 3]>,
        /// Uniform clamped knots over `[0, 1]` when absent.
        #[serde(default)]
        knots_u: Option<Vec<f64>>,
        #[serde(default)]
        knots_v: Option<Vec<f64>>,
        #[serde(default)]
        weights: Option<Vec<f64>>,
    },
}

impl SurfaceInput {
    pub fn build(&self) -> Result<NurbsSurface, TrimError> {
        match self {
            Self::Bilinear { corners } => {
                let [p00, p10, p01, p11] = corners.map(Point3::from_array);
                Ok(NurbsSurface::bilinear(p00, p10, p01, p11))
            }
            Self::Nurbs {
                degree_u,
                degree_v,
                u_count,
                v_count,
                control_points,
                knots_u,
                knots_v,
                weights,
            } => {
                let knots_u = knots_u
                    .clone()
                    .unwrap_or_else(|| knot::uniform_clamped_knots(*degree_u, *u_count));
                let knots_v = knots_v
                    .clone()
                    .unwrap_or_else(|| knot::uniform_clamped_knots(*degree_v, *v_count));
                let surface = NurbsSurface::new(
                    *degree_u,
                    *degree_v,
                    *u_count,
                    *v_count,
                    control_points.iter().copied().map(Point3::from_array).collect(),
                    knots_u,
                    knots_v,
                    weights.clone(),
                )?;
                Ok(surface)
            }
        }
    }
}

/// A trimming curve in the surface's parameter space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CurveInput {
    Line { start: [f64; 2], end: [f64; 2] },
    Polyline { points: Vec<[f64; 2]> },
    Bezier { points: Vec<[f64; 2]> },
    Circle { center: [f64; 2], radius: f64 },
    Nurbs {
        degree: usize,
        control_points: Vec<[f64; 2]>,
        #[serde(default)]
        knots: Option<Vec<f64>>,
        #[serde(default)]
        weights: Option<Vec<f64>>,
    },
}

fn uv_points(points: &[[f64; 2]]) -> Vec<UvPoint> {
    points.iter().map(|&[u, v]| UvPoint::new(u, v)).collect()
}

impl CurveInput {
    pub fn build(&self) -> Result<UvCurve, TrimError> {
        let curve = match self {
            Self::Line { start, end } => {
                let (a, b) = (UvPoint::new(start[0], start[1]), UvPoint::new(end[0], end[1]));
                if !a.is_finite() || !b.is_finite() {
                    return Err(TrimError::InvalidGeometry(
                        "line endpoints must be finite".to_string(),
                    ));
                }
                UvCurve::line(a, b)
            }
            Self::Polyline { points } => UvCurve::polyline(&uv_points(points))?,
            Self::Bezier { points } => UvCurve::bezier(&uv_points(points))?,
            Self::Circle { center, radius } => {
                UvCurve::circle(UvPoint::new(center[0], center[1]), *radius)?
            }
            Self::Nurbs {
                degree,
                control_points,
                knots,
                weights,
            } => {
                let knots = knots
                    .clone()
                    .unwrap_or_else(|| knot::uniform_clamped_knots(*degree, control_points.len()));
                UvCurve::new(*degree, uv_points(control_points), knots, weights.clone())?
            }
        };
        Ok(curve)
    }
}

/// A surface with unordered trimming curves; no curves means untrimmed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrimmedSurfaceInput {
    pub surface: SurfaceInput,
    #[serde(default)]
    pub curves: Vec<CurveInput>,
}

impl TrimmedSurfaceInput {
    /// Builds the surface and heals the curves into closed loops.
    pub fn build(&self, ctx: &TrimContext) -> Result<(TrimmedSurface, TrimDiagnostics), TrimError> {
        let surface = self.surface.build()?;
        let curves = self
            .curves
            .iter()
            .map(CurveInput::build)
            .collect::<Result<Vec<_>, _>>()?;
        TrimmedSurface::new(surface, curves, ctx)
    }
}

/// Loop boundaries of one side of a split, as uv polylines.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SideOutput {
    pub domain: [f64; 4],
    pub untrimmed: bool,
    pub loops: Vec<Vec<[f64; 2]>>,
}

impl SideOutput {
    #[must_use]
    pub fn from_trimmed(trimmed: &TrimmedSurface, ctx: &TrimContext) -> Self {
        let d = trimmed.domain();
        Self {
            domain: [d.u_min, d.u_max, d.v_min, d.v_max],
            untrimmed: trimmed.is_untrimmed(),
            loops: trimmed
                .loops()
                .iter()
                .map(|lp| loop_polyline(lp, ctx))
                .collect(),
        }
    }
}

fn loop_polyline(lp: &TrimLoop, ctx: &TrimContext) -> Vec<[f64; 2]> {
    lp.polygon(&ctx.polyline)
        .points()
        .iter()
        .map(|p| [p.u, p.v])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::{PolylineOptions, Surface};

    fn unit_square() -> SurfaceInput {
        SurfaceInput::Bilinear {
            corners: [
                [0.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                [0.0, 1.0, 0.0],
                [1.0, 1.0, 0.0],
            ],
        }
    }

    #[test]
    fn nurbs_input_defaults_to_uniform_knots() {
        let input = SurfaceInput::Nurbs {
            degree_u: 2,
            degree_v: 1,
            u_count: 3,
            v_count: 2,
            control_points: vec![
                [0.0, 0.0, 0.0],
                [0.5, 0.0, 1.0],
                [1.0, 0.0, 0.0],
                [0.0, 1.0, 0.0],
                [0.5, 1.0, 1.0],
                [1.0, 1.0, 0.0],
            ],
            knots_u: None,
            knots_v: None,
            weights: None,
        };
        let surface = input.build().unwrap();
        assert_eq!(surface.knots_u, vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0]);
        let mid = surface.point_at(0.5, 0.5);
        assert!((mid.z - 0.5).abs() < 1e-12);
    }

    #[test]
    fn mismatched_control_net_is_invalid() {
        let input = SurfaceInput::Nurbs {
            degree_u: 1,
            degree_v: 1,
            u_count: 2,
            v_count: 2,
            control_points: vec![[0.0; 3]; 3],
            knots_u: None,
            knots_v: None,
            weights: None,
        };
        assert!(matches!(input.build(), Err(TrimError::InvalidGeometry(_))));
    }

    #[test]
    fn circle_input_heals_into_one_loop() {
        let input = TrimmedSurfaceInput {
            surface: unit_square(),
            curves: vec![CurveInput::Circle {
                center: [0.5, 0.5],
                radius: 0.25,
            }],
        };
        let ctx = TrimContext::new();
        let (trimmed, diagnostics) = input.build(&ctx).unwrap();
        assert_eq!(diagnostics.loop_count, 1);
        assert!(trimmed.contains(UvPoint::new(0.5, 0.5), &PolylineOptions::default()));
        assert!(!trimmed.contains(UvPoint::new(0.05, 0.05), &PolylineOptions::default()));
    }

    #[test]
    fn line_pieces_chain_and_report_polylines() {
        let corners = [[0.2, 0.2], [0.8, 0.2], [0.8, 0.8], [0.2, 0.8]];
        let curves = (0..4)
            .map(|i| CurveInput::Line {
                start: corners[i],
                end: corners[(i + 1) % 4],
            })
            .collect();
        let input = TrimmedSurfaceInput {
            surface: unit_square(),
            curves,
        };
        let ctx = TrimContext::new();
        let (trimmed, _) = input.build(&ctx).unwrap();
        let side = SideOutput::from_trimmed(&trimmed, &ctx);
        assert!(!side.untrimmed);
        assert_eq!(side.domain, [0.0, 1.0, 0.0, 1.0]);
        assert_eq!(side.loops.len(), 1);
        assert!(side.loops[0].len() >= 4);
    }

    #[test]
    fn non_finite_line_is_rejected() {
        let curve = CurveInput::Line {
            start: [f64::NAN, 0.0],
            end: [1.0, 1.0],
        };
        assert!(matches!(curve.build(), Err(TrimError::InvalidGeometry(_))));
    }
}
