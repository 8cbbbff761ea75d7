//! Loop nesting: which trimming loops lie inside which, and island merging.
//!
//! [`classify_loops`] takes a flat set of closed single-segment loops and
//! groups them into [`LoopRegion`]s: every loop contained by an even number of
//! other loops is an outer boundary (oriented clockwise), every loop with an
//! odd count is an island (oriented counter-clockwise) attached to the
//! innermost even loop that contains it. Islands inside islands become outer
//! boundaries of their own regions.
//!
//! [`merge_islands`] splices a region's islands into its outer boundary with
//! zero-width bridges so the result is one weakly simple polygon ready for
//! ear clipping.

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use super::context::TrimContext;
use super::loops::TrimLoop;
use super::trim::{TrimError, UvPoint, UvPolygon, ray_parity};

/// Fraction of a loop's parameter range used to pick its witness point.
///
/// Irrational-ish so the witness avoids segment joints and polyline vertices.
const WITNESS_FRACTION: f64 = 0.318_309_886_183_790_7;

/// One outer boundary with the islands directly nested in it.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopRegion {
    /// Clockwise outer boundary.
    pub outer: UvPolygon,
    /// Counter-clockwise islands whose innermost container is `outer`.
    pub islands: Vec<UvPolygon>,
    /// Number of input loops containing `outer`; always even.
    pub depth: usize,
}

impl LoopRegion {
    /// Area of the outer boundary minus its islands.
    #[must_use]
    pub fn area(&self) -> f64 {
        let holes: f64 = self.islands.iter().map(|i| i.signed_area().abs()).sum();
        self.outer.signed_area().abs() - holes
    }
}

struct Witness {
    polygon: UvPolygon,
    point: UvPoint,
}

fn witness(lp: &TrimLoop, ctx: &TrimContext) -> Result<Witness, TrimError> {
    let [segment] = lp.segments() else {
        return Err(ctx.fatal(TrimError::MalformedSegment(format!(
            "loop entering classification has {} segments, expected 1",
            lp.len()
        ))));
    };
    let (t0, t1) = segment.curve.domain();
    Ok(Witness {
        polygon: lp.polygon(&ctx.polyline),
        point: segment.curve.point_at(t0 + WITNESS_FRACTION * (t1 - t0)),
    })
}

/// `inside[i][j]` is true when loop `j`'s witness lies inside loop `i`.
fn inclusion_row(i: usize, witnesses: &[Witness]) -> Vec<bool> {
    witnesses
        .iter()
        .enumerate()
        .map(|(j, pj)| i != j && ray_parity(pj.point, witnesses[i].polygon.points()))
        .collect()
}

#[cfg(feature = "parallel")]
fn inclusion_matrix(witnesses: &[Witness]) -> Vec<Vec<bool>> {
    (0..witnesses.len())
        .into_par_iter()
        .map(|i| inclusion_row(i, witnesses))
        .collect()
}

#[cfg(not(feature = "parallel"))]
fn inclusion_matrix(witnesses: &[Witness]) -> Vec<Vec<bool>> {
    (0..witnesses.len()).map(|i| inclusion_row(i, witnesses)).collect()
}

/// Orients and nests a flat set of closed loops.
///
/// Every loop must consist of exactly one segment (chain and merge first).
/// Loops whose polygonal approximation encloses no area are dropped with a
/// warning.
///
/// # Errors
/// [`TrimError::MalformedSegment`] for a multi-segment loop or an island with
/// no containing outer loop.
pub fn classify_loops(loops: &[TrimLoop], ctx: &TrimContext) -> Result<Vec<LoopRegion>, TrimError> {
    let mut witnesses = Vec::with_capacity(loops.len());
    for lp in loops {
        let p = witness(lp, ctx)?;
        if p.polygon.is_degenerate() || p.polygon.signed_area() == 0.0 {
            log::warn!("classify: dropping zero-area loop of {} points", p.polygon.len());
            continue;
        }
        witnesses.push(p);
    }

    let inside = inclusion_matrix(&witnesses);
    let n = witnesses.len();
    let counts: Vec<usize> = (0..n)
        .map(|j| (0..n).filter(|&i| inside[i][j]).count())
        .collect();

    let mut outer_of: Vec<Option<usize>> = vec![None; n];
    let mut region_index: Vec<Option<usize>> = vec![None; n];
    let mut regions: Vec<LoopRegion> = Vec::new();

    for (i, p) in witnesses.iter().enumerate() {
        if counts[i] % 2 == 0 {
            let mut outer = p.polygon.clone();
            outer.ensure_cw();
            region_index[i] = Some(regions.len());
            regions.push(LoopRegion {
                outer,
                islands: Vec::new(),
                depth: counts[i],
            });
        }
    }

    for j in (0..n).filter(|&j| counts[j] % 2 == 1) {
        let container = (0..n)
            .filter(|&i| inside[i][j] && counts[i] % 2 == 0)
            .max_by_key(|&i| counts[i]);
        let Some(i) = container else {
            let p = witnesses[j].point;
            return Err(ctx.fatal(TrimError::MalformedSegment(format!(
                "island through ({:.6}, {:.6}) has no containing outer loop",
                p.u, p.v
            ))));
        };
        outer_of[j] = Some(i);
    }

    for (j, container) in outer_of.into_iter().enumerate() {
        let Some(i) = container else { continue };
        let Some(r) = region_index[i] else { continue };
        let mut island = witnesses[j].polygon.clone();
        island.ensure_ccw();
        regions[r].islands.push(island);
    }

    log::debug!(
        "classify: {} loops -> {} regions, {} islands",
        n,
        regions.len(),
        regions.iter().map(|r| r.islands.len()).sum::<usize>()
    );
    Ok(regions)
}

/// First hit of the ray from `p` toward `+u` on the ring `points`.
///
/// Returns `(k, hit)` where `hit` lies on the edge `points[k]..points[k+1]`
/// (or equals `points[k]` for a vertex hit).
fn ray_hit(p: UvPoint, points: &[UvPoint]) -> Option<(usize, UvPoint)> {
    let n = points.len();
    let mut best: Option<(usize, UvPoint)> = None;
    let mut consider = |k: usize, hit: UvPoint| {
        if hit.u >= p.u && best.is_none_or(|(_, b)| hit.u < b.u) {
            best = Some((k, hit));
        }
    };
    for k in 0..n {
        let a = points[k];
        let b = points[(k + 1) % n];
        if a.v == p.v {
            consider(k, a);
        } else if (a.v > p.v) != (b.v > p.v) && b.v != p.v {
            let t = (p.v - a.v) / (b.v - a.v);
            consider(k, UvPoint::new(a.u + t * (b.u - a.u), p.v));
        }
    }
    best
}

/// Splices every island of `region` into its outer boundary.
///
/// Islands are merged in order of descending maximum `u`. From each island's
/// maximum-`u` vertex a ray toward `+u` finds the nearest edge or vertex of the
/// polygon merged so far; the island ring is inserted there, with the bridge
/// point and the island vertex duplicated so the ring stays closed.
///
/// # Errors
/// [`TrimError::MalformedSegment`] when a ray misses the merged polygon (the
/// island is not inside its container).
pub fn merge_islands(region: &LoopRegion, ctx: &TrimContext) -> Result<UvPolygon, TrimError> {
    let mut islands: Vec<(usize, &UvPolygon)> = region
        .islands
        .iter()
        .filter_map(|island| island.max_u_index().map(|m| (m, island)))
        .collect();
    islands.sort_by(|(ma, a), (mb, b)| b.points()[*mb].u.total_cmp(&a.points()[*ma].u));

    let mut merged: Vec<UvPoint> = region.outer.points().to_vec();
    for (m, island) in islands {
        let ring = island.points();
        let p = ring[m];
        let Some((k, hit)) = ray_hit(p, &merged) else {
            return Err(ctx.fatal(TrimError::MalformedSegment(format!(
                "island vertex ({:.6}, {:.6}) sees no edge of its container",
                p.u, p.v
            ))));
        };

        let mut spliced = Vec::with_capacity(merged.len() + ring.len() + 3);
        spliced.extend_from_slice(&merged[..=k]);
        spliced.push(hit);
        spliced.extend(ring[m..].iter().chain(&ring[..m]).copied());
        spliced.push(p);
        spliced.push(hit);
        spliced.extend_from_slice(&merged[k + 1..]);
        merged = UvPolygon::new(spliced).into_points();
    }
    Ok(UvPolygon::new(merged))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::{UvCurve, UvDomain};

    fn square_loop(lo: f64, hi: f64) -> TrimLoop {
        TrimLoop::from_curve(
            UvCurve::polyline(&[
                UvPoint::new(lo, lo),
                UvPoint::new(hi, lo),
                UvPoint::new(hi, hi),
                UvPoint::new(lo, hi),
                UvPoint::new(lo, lo),
            ])
            .unwrap(),
        )
    }

    #[test]
    fn nested_squares_alternate_orientation() {
        let ctx = TrimContext::default();
        let loops = vec![square_loop(0.4, 0.6), square_loop(0.0, 1.0), square_loop(0.2, 0.8)];
        let regions = classify_loops(&loops, &ctx).unwrap();
        assert_eq!(regions.len(), 2);

        let outer = regions.iter().find(|r| r.depth == 0).unwrap();
        assert!(outer.outer.is_cw());
        assert_eq!(outer.islands.len(), 1);
        assert!(outer.islands[0].is_ccw());
        assert!((outer.area() - (1.0 - 0.36)).abs() < 1e-12);

        let inner = regions.iter().find(|r| r.depth == 2).unwrap();
        assert!(inner.outer.is_cw());
        assert!(inner.islands.is_empty());
    }

    #[test]
    fn multi_segment_loop_is_malformed() {
        let ctx = TrimContext::default();
        let lp = TrimLoop::rectangle(&UvDomain::unit());
        assert!(matches!(
            classify_loops(&[lp], &ctx),
            Err(TrimError::MalformedSegment(_))
        ));
    }

    #[test]
    fn merge_bridges_island_to_right_edge() {
        let ctx = TrimContext::default();
        let regions = classify_loops(&[square_loop(0.0, 1.0), square_loop(0.25, 0.75)], &ctx).unwrap();
        let merged = merge_islands(&regions[0], &ctx).unwrap();
        assert_eq!(merged.len(), 4 + 4 + 3);
        assert!((merged.signed_area().abs() - 0.75).abs() < 1e-12);
        assert!(merged.points().contains(&UvPoint::new(1.0, 0.75)) || merged.points().contains(&UvPoint::new(1.0, 0.25)));
    }
}
