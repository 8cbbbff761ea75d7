//! Adaptive polygonization of trimmed surfaces.
//!
//! The trimming loops are first flattened to polylines no coarser than the
//! requested flatness. The base surface is then subdivided under control of a
//! [`SubdivisionDriver`]; every split re-trims the patch's loops so each leaf
//! carries exactly the part of the trimmed region it covers.
//!
//! Leaves are emitted in two passes. The first collects every loop vertex that
//! lies on a leaf boundary. The second inserts the ones falling inside a
//! neighbour's boundary edge into that neighbour's polygon, so adjacent leaves
//! share vertices along common edges and the mesh has no T-junctions. A leaf
//! whose loop is exactly its rectangle (and needs no extra points) becomes two
//! triangles; any other leaf is classified, its islands bridged in, and the
//! resulting polygon ear-clipped.
//!
//! Vertex parameters are clamped into the surface domain before evaluation and
//! vertices are shared between leaves by exact (u,v) value.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::chain;
use super::context::{PolylineOptions, TrimContext};
use super::core::{Point3, Vec3};
use super::curve::UvCurve;
use super::hierarchy::{classify_loops, merge_islands};
use super::loops::{TrimLoop, TrimSegment, TrimmedSurface};
use super::mesh::{TrimMesh, TrimMeshBuilder};
use super::metrics::{TimingBucket, TrimMetrics, TrimTimingReport};
use super::retrim;
use super::surface::{NurbsSurface, Surface};
use super::tessellation::surface_flatness;
use super::triangulation::{triangulate_grid, triangulate_polygon};
use super::trim::{SplitDirection, TrimDiagnostics, TrimError, UvDomain, UvPoint, UvPolygon};

/// Settings for [`polygonize`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolygonizeOptions {
    /// Largest allowed distance between a patch and its planar approximation.
    pub flatness: f64,
    pub normals: bool,
    pub uvs: bool,
    /// Subdivide at least this many times regardless of flatness.
    pub min_depth: usize,
    /// Never subdivide deeper than this.
    pub max_depth: usize,
}

impl Default for PolygonizeOptions {
    fn default() -> Self {
        Self {
            flatness: 1e-2,
            normals: true,
            uvs: true,
            min_depth: 0,
            max_depth: 12,
        }
    }
}

impl PolygonizeOptions {
    #[must_use]
    pub fn with_flatness(flatness: f64) -> Self {
        Self {
            flatness,
            ..Self::default()
        }
    }

    /// The driver these options describe.
    #[must_use]
    pub fn driver(&self) -> FlatnessDriver {
        FlatnessDriver {
            flatness: self.flatness,
            min_depth: self.min_depth,
            max_depth: self.max_depth,
        }
    }
}

/// Decides where, if at all, a patch is subdivided further.
pub trait SubdivisionDriver {
    /// `None` when `patch` is flat enough to emit at this `depth`.
    fn split(&self, patch: &TrimmedSurface, depth: usize) -> Option<(f64, SplitDirection)>;
}

/// Splits at the parameter midpoint across the longer side until the control
/// net is within `flatness` of the corner bilinear patch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlatnessDriver {
    pub flatness: f64,
    pub min_depth: usize,
    pub max_depth: usize,
}

impl FlatnessDriver {
    fn longer_direction(surface: &NurbsSurface) -> SplitDirection {
        let [p00, p10, p01, p11] = surface.corner_control_points();
        let along_u = p00.distance_to(p10) + p01.distance_to(p11);
        let along_v = p00.distance_to(p01) + p10.distance_to(p11);
        if along_v > along_u {
            SplitDirection::V
        } else {
            SplitDirection::U
        }
    }
}

impl SubdivisionDriver for FlatnessDriver {
    fn split(&self, patch: &TrimmedSurface, depth: usize) -> Option<(f64, SplitDirection)> {
        if depth >= self.max_depth {
            return None;
        }
        let surface = patch.surface();
        if depth >= self.min_depth && surface_flatness(surface) <= self.flatness {
            return None;
        }
        let direction = if depth < self.min_depth {
            if depth % 2 == 0 {
                SplitDirection::U
            } else {
                SplitDirection::V
            }
        } else {
            Self::longer_direction(surface)
        };
        let (lo, hi) = patch.domain().range(direction);
        Some((0.5 * (lo + hi), direction))
    }
}

/// Output of [`polygonize`].
#[derive(Debug, Clone)]
pub struct PolygonizeResult {
    pub mesh: TrimMesh,
    pub diagnostics: TrimDiagnostics,
    /// Number of flat patches emitted.
    pub leaf_count: usize,
    /// Leaves emitted as plain rectangles.
    pub rectangle_leaves: usize,
    /// Phase timings when the `metrics` feature is enabled.
    pub metrics: Option<TrimTimingReport>,
}

/// Polygonizes `trimmed` with the default [`FlatnessDriver`].
pub fn polygonize(
    trimmed: &TrimmedSurface,
    options: &PolygonizeOptions,
    ctx: &TrimContext,
) -> Result<PolygonizeResult, TrimError> {
    polygonize_with_driver(trimmed, &options.driver(), options, ctx)
}

/// Polygonizes `trimmed`, letting `driver` own the subdivision decisions.
pub fn polygonize_with_driver(
    trimmed: &TrimmedSurface,
    driver: &impl SubdivisionDriver,
    options: &PolygonizeOptions,
    ctx: &TrimContext,
) -> Result<PolygonizeResult, TrimError> {
    let mut metrics = TrimMetrics::default();
    metrics.begin();
    let mut diagnostics = TrimDiagnostics::new();

    let polyline = ctx.polyline.no_coarser_than(options.flatness);
    let flat = metrics.time(TimingBucket::Approximation, || flatten_loops(trimmed, &polyline))?;
    let (loops, chained) = metrics.time(TimingBucket::Chaining, || {
        let segments = flat.into_iter().flat_map(TrimLoop::into_segments).collect();
        chain::chain_into_loops(segments, ctx)
    })?;
    diagnostics.merge(&chained);
    let root = TrimmedSurface::from_loops(trimmed.surface().clone(), loops);

    let leaves = collect_leaves(root, driver, ctx, &mut metrics, &mut diagnostics)?;
    log::debug!("polygonize: {} leaves", leaves.len());

    let mut patches = Vec::with_capacity(leaves.len());
    for leaf in &leaves {
        patches.push(leaf_polygons(leaf, &polyline, ctx, &mut metrics, &mut diagnostics)?);
    }
    let boundary = BoundaryPoints::collect(&patches);

    let surface = trimmed.surface();
    let domain = trimmed.domain();
    let mut builder = TrimMeshBuilder::new(options.uvs, options.normals);
    let mut rectangle_leaves = 0usize;

    for patch in &patches {
        let polygons: Vec<Vec<UvPoint>> = patch
            .polygons
            .iter()
            .map(|p| boundary.reconcile(p, &patch.domain))
            .collect();

        if patch.untrimmed && polygons.iter().map(Vec::len).sum::<usize>() == 4 {
            rectangle_leaves += 1;
            let d = patch.domain;
            let corners = [
                UvPoint::new(d.u_min, d.v_min),
                UvPoint::new(d.u_max, d.v_min),
                UvPoint::new(d.u_min, d.v_max),
                UvPoint::new(d.u_max, d.v_max),
            ];
            metrics.time(TimingBucket::Evaluation, || {
                emit(&mut builder, surface, &domain, &corners, &triangulate_grid(2, 2));
            });
            continue;
        }

        let leaf_loops = polygons
            .iter()
            .map(|points| closed_polyline(points).map(TrimLoop::from_curve))
            .collect::<Result<Vec<_>, TrimError>>()?;
        let regions = metrics.time(TimingBucket::Classification, || classify_loops(&leaf_loops, ctx))?;
        for region in &regions {
            let merged = metrics.time(TimingBucket::Classification, || merge_islands(region, ctx))?;
            let triangulated = metrics
                .time(TimingBucket::Triangulation, || triangulate_polygon(&merged, ctx.tolerance))
                .map_err(|e| ctx.fatal(e))?;
            metrics.time(TimingBucket::Evaluation, || {
                emit(
                    &mut builder,
                    surface,
                    &domain,
                    &triangulated.vertices,
                    &triangulated.indices,
                );
            });
        }
    }

    let mesh = builder.finish();
    mesh.validate().map_err(|e| ctx.fatal(TrimError::Triangulation(e)))?;
    log::debug!(
        "polygonize: {} triangles, {} vertices, {} rectangle leaves",
        mesh.triangle_count(),
        mesh.vertex_count(),
        rectangle_leaves
    );

    Ok(PolygonizeResult {
        mesh,
        diagnostics,
        leaf_count: patches.len(),
        rectangle_leaves,
        metrics: metrics.end(),
    })
}

fn flatten_loops(trimmed: &TrimmedSurface, polyline: &PolylineOptions) -> Result<Vec<TrimLoop>, TrimError> {
    trimmed
        .loops()
        .iter()
        .map(|lp| lp.to_polyline_loop(polyline))
        .collect()
}

fn collect_leaves(
    root: TrimmedSurface,
    driver: &impl SubdivisionDriver,
    ctx: &TrimContext,
    metrics: &mut TrimMetrics,
    diagnostics: &mut TrimDiagnostics,
) -> Result<Vec<TrimmedSurface>, TrimError> {
    let mut leaves = Vec::new();
    let mut stack = vec![(root, 0usize)];
    while let Some((patch, depth)) = stack.pop() {
        let Some((t, direction)) = driver.split(&patch, depth) else {
            leaves.push(patch);
            continue;
        };
        let split = metrics.time(TimingBucket::Retrim, || retrim::subdivide(&patch, t, direction, ctx))?;
        diagnostics.merge(&split.diagnostics);
        if let Some(high) = split.high {
            stack.push((high, depth + 1));
        }
        if let Some(low) = split.low {
            stack.push((low, depth + 1));
        }
    }
    Ok(leaves)
}

/// A leaf's loops as open vertex rings.
struct LeafPolygons {
    domain: UvDomain,
    untrimmed: bool,
    polygons: Vec<Vec<UvPoint>>,
}

fn leaf_polygons(
    leaf: &TrimmedSurface,
    polyline: &PolylineOptions,
    ctx: &TrimContext,
    metrics: &mut TrimMetrics,
    diagnostics: &mut TrimDiagnostics,
) -> Result<LeafPolygons, TrimError> {
    let segments: Vec<TrimSegment> = leaf.loops().iter().flat_map(|lp| lp.segments().to_vec()).collect();
    let (loops, chained) = metrics.time(TimingBucket::Chaining, || chain::chain_into_loops(segments, ctx))?;
    diagnostics.merge(&chained);
    Ok(LeafPolygons {
        domain: leaf.domain(),
        untrimmed: leaf.is_untrimmed(),
        polygons: loops
            .iter()
            .map(|lp| lp.polygon(polyline).into_points())
            .filter(|points| points.len() >= 3)
            .collect(),
    })
}

fn closed_polyline(points: &[UvPoint]) -> Result<UvCurve, TrimError> {
    let mut closed = points.to_vec();
    if let Some(&first) = points.first() {
        closed.push(first);
    }
    Ok(UvCurve::polyline(&closed)?)
}

/// Which constant-parameter line a boundary vertex sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct LineKey {
    direction: SplitDirection,
    bits: u64,
}

impl LineKey {
    fn new(direction: SplitDirection, value: f64) -> Self {
        Self {
            direction,
            bits: value.to_bits(),
        }
    }
}

/// Loop vertices lying on leaf boundaries, grouped by boundary line and
/// sorted along it.
struct BoundaryPoints {
    lines: HashMap<LineKey, Vec<f64>>,
}

impl BoundaryPoints {
    fn collect(patches: &[LeafPolygons]) -> Self {
        let mut lines: HashMap<LineKey, Vec<f64>> = HashMap::new();
        for patch in patches {
            let d = &patch.domain;
            for &p in patch.polygons.iter().flatten() {
                for (direction, value) in [
                    (SplitDirection::U, d.u_min),
                    (SplitDirection::U, d.u_max),
                    (SplitDirection::V, d.v_min),
                    (SplitDirection::V, d.v_max),
                ] {
                    if p.along(direction) == value {
                        lines
                            .entry(LineKey::new(direction, value))
                            .or_default()
                            .push(p.across(direction));
                    }
                }
            }
        }
        for values in lines.values_mut() {
            values.sort_by(f64::total_cmp);
            values.dedup();
        }
        Self { lines }
    }

    /// `ring` with neighbour boundary points inserted into its edges on `domain`'s sides.
    fn reconcile(&self, ring: &[UvPoint], domain: &UvDomain) -> Vec<UvPoint> {
        let n = ring.len();
        let mut out = Vec::with_capacity(n);
        for i in 0..n {
            let a = ring[i];
            let b = ring[(i + 1) % n];
            out.push(a);
            for (direction, value) in [
                (SplitDirection::U, domain.u_min),
                (SplitDirection::U, domain.u_max),
                (SplitDirection::V, domain.v_min),
                (SplitDirection::V, domain.v_max),
            ] {
                if a.along(direction) != value || b.along(direction) != value {
                    continue;
                }
                let Some(values) = self.lines.get(&LineKey::new(direction, value)) else {
                    continue;
                };
                let (s, e) = (a.across(direction), b.across(direction));
                let (lo, hi) = (s.min(e), s.max(e));
                let inside = values.iter().copied().filter(|&x| x > lo && x < hi);
                let start = out.len();
                out.extend(inside.map(|x| UvPoint::from_axes(direction, value, x)));
                if s > e {
                    out[start..].reverse();
                }
                break;
            }
        }
        UvPolygon::new(out).into_points()
    }
}

fn emit(
    builder: &mut TrimMeshBuilder,
    surface: &NurbsSurface,
    domain: &UvDomain,
    vertices: &[UvPoint],
    indices: &[u32],
) {
    let ids: Vec<u32> = vertices
        .iter()
        .map(|&uv| builder.vertex(domain.clamp(uv), |uv| evaluate(surface, domain, uv)))
        .collect();
    for tri in indices.chunks_exact(3) {
        builder.triangle([ids[tri[0] as usize], ids[tri[1] as usize], ids[tri[2] as usize]]);
    }
}

/// Position and unit normal; at poles the normal is taken slightly toward the
/// domain centre.
fn evaluate(surface: &NurbsSurface, domain: &UvDomain, uv: UvPoint) -> (Point3, Vec3) {
    let position = surface.point_at(uv.u, uv.v);
    let normal = surface.normal_at(uv.u, uv.v).or_else(|| {
        let c = domain.center();
        let s = 1e-6;
        surface.normal_at(uv.u + s * (c.u - uv.u), uv.v + s * (c.v - uv.v))
    });
    (position, normal.unwrap_or(Vec3::Z))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_square() -> NurbsSurface {
        NurbsSurface::bilinear(
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
        )
    }

    #[test]
    fn flat_untrimmed_patch_is_two_triangles() {
        let trimmed = TrimmedSurface::untrimmed(unit_square());
        let result = polygonize(&trimmed, &PolygonizeOptions::default(), &TrimContext::new()).unwrap();
        assert_eq!(result.leaf_count, 1);
        assert_eq!(result.rectangle_leaves, 1);
        assert_eq!(result.mesh.triangle_count(), 2);
        assert_eq!(result.mesh.vertex_count(), 4);
        for n in result.mesh.normals.as_ref().unwrap() {
            assert!((n[2] - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn forced_depth_shares_boundary_vertices() {
        let trimmed = TrimmedSurface::untrimmed(unit_square());
        let options = PolygonizeOptions {
            min_depth: 3,
            ..PolygonizeOptions::default()
        };
        let result = polygonize(&trimmed, &options, &TrimContext::new()).unwrap();
        assert_eq!(result.leaf_count, 8);
        assert_eq!(result.mesh.triangle_count(), 16);
        // 8 leaves of a 4x2 grid share a 5x3 vertex lattice.
        assert_eq!(result.mesh.vertex_count(), 15);
    }

    #[test]
    fn reconcile_inserts_points_in_edge_order() {
        let left = LeafPolygons {
            domain: UvDomain::new(0.0, 0.5, 0.0, 1.0),
            untrimmed: true,
            polygons: vec![UvDomain::new(0.0, 0.5, 0.0, 1.0).corners_cw().to_vec()],
        };
        let right = LeafPolygons {
            domain: UvDomain::new(0.5, 1.0, 0.0, 0.5),
            untrimmed: true,
            polygons: vec![UvDomain::new(0.5, 1.0, 0.0, 0.5).corners_cw().to_vec()],
        };
        let boundary = BoundaryPoints::collect(&[left, right]);
        let ring = UvDomain::new(0.0, 0.5, 0.0, 1.0).corners_cw().to_vec();
        let reconciled = boundary.reconcile(&ring, &UvDomain::new(0.0, 0.5, 0.0, 1.0));
        assert_eq!(reconciled.len(), 5);
        let idx = reconciled.iter().position(|&p| p == UvPoint::new(0.5, 0.5)).unwrap();
        assert_eq!(reconciled[idx - 1], UvPoint::new(0.5, 1.0));
        assert_eq!(reconciled[idx + 1], UvPoint::new(0.5, 0.0));
    }
}
