//! Chaining unordered trimming segments into closed loops, and healing them.
//!
//! Chaining grows one loop at a time: the first free segment seeds a chain, which is
//! extended at either end by the closest free segment end point within the current
//! tolerance (reversing the segment when needed) until the chain closes. Any dead
//! end restarts the whole pass at the next tolerance of the escalation ladder.
//!
//! Healing snaps every junction onto one exact point and synthesizes straight edges
//! along closed seams and poles where loose ends meet the domain boundary.

use std::collections::VecDeque;

use super::context::TrimContext;
use super::core::Tolerance;
use super::curve::UvCurve;
use super::loops::{TrimLoop, TrimSegment};
use super::surface::{NurbsSurface, Surface};
use super::trim::{DomainSide, TrimDiagnostics, TrimError, UvPoint};

/// How a free segment attaches to the current chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pairing {
    /// Chain end meets segment start.
    EndStart,
    /// Chain end meets segment end: the segment is reversed and appended.
    EndEnd,
    /// Chain start meets segment end.
    StartEnd,
    /// Chain start meets segment start: the segment is reversed and prepended.
    StartStart,
}

impl Pairing {
    const ALL: [Self; 4] = [Self::EndStart, Self::EndEnd, Self::StartEnd, Self::StartStart];

    fn gap(self, chain_start: UvPoint, chain_end: UvPoint, segment: &TrimSegment) -> f64 {
        match self {
            Self::EndStart => chain_end.distance(segment.start_point()),
            Self::EndEnd => chain_end.distance(segment.end_point()),
            Self::StartEnd => chain_start.distance(segment.end_point()),
            Self::StartStart => chain_start.distance(segment.start_point()),
        }
    }

    const fn reverses(self) -> bool {
        matches!(self, Self::EndEnd | Self::StartStart)
    }

    const fn appends(self) -> bool {
        matches!(self, Self::EndStart | Self::EndEnd)
    }
}

#[derive(Debug, Clone, Copy)]
struct Match {
    index: usize,
    pairing: Pairing,
    gap: f64,
}

/// Closest attachment within `tol`; ties keep the earliest segment and pairing.
fn best_match(pool: &[TrimSegment], start: UvPoint, end: UvPoint, tol: f64) -> Option<Match> {
    let mut best: Option<Match> = None;
    for (index, segment) in pool.iter().enumerate() {
        for pairing in Pairing::ALL {
            let gap = pairing.gap(start, end, segment);
            if gap > tol {
                continue;
            }
            if best.is_none_or(|b| gap < b.gap) {
                best = Some(Match {
                    index,
                    pairing,
                    gap,
                });
            }
        }
    }
    best
}

/// Result of growing one chain from a seed segment.
enum Growth {
    Closed(Vec<TrimSegment>),
    Open(Vec<TrimSegment>),
}

fn grow_chain(seed: TrimSegment, pool: &mut Vec<TrimSegment>, tol: f64, reversed: &mut usize) -> Growth {
    let mut chain = VecDeque::from([seed]);
    loop {
        let (Some(first), Some(last)) = (chain.front(), chain.back()) else {
            return Growth::Open(Vec::new());
        };
        let start = first.start_point();
        let end = last.end_point();
        if start.distance(end) <= tol {
            return Growth::Closed(chain.into());
        }

        let Some(m) = best_match(pool, start, end, tol) else {
            return Growth::Open(chain.into());
        };
        let segment = pool.remove(m.index);
        let segment = if m.pairing.reverses() {
            *reversed += 1;
            segment.reversed()
        } else {
            segment
        };
        if m.pairing.appends() {
            chain.push_back(segment);
        } else {
            chain.push_front(segment);
        }
    }
}

/// One full chaining pass at a fixed tolerance; `None` on the first dead end.
fn chain_pass(segments: &[TrimSegment], tol: f64) -> Option<(Vec<TrimLoop>, usize)> {
    let mut pool = segments.to_vec();
    let mut loops = Vec::new();
    let mut reversed = 0;
    while !pool.is_empty() {
        let seed = pool.remove(0);
        match grow_chain(seed, &mut pool, tol, &mut reversed) {
            Growth::Closed(chain) => loops.push(TrimLoop::new(chain)),
            Growth::Open(_) => return None,
        }
    }
    Some((loops, reversed))
}

/// Greedy chaining that keeps going past dead ends, returning the chains left open.
fn open_chains(segments: &[TrimSegment], tol: f64) -> Vec<Vec<TrimSegment>> {
    let mut pool = segments.to_vec();
    let mut open = Vec::new();
    let mut reversed = 0;
    while !pool.is_empty() {
        let seed = pool.remove(0);
        if let Growth::Open(chain) = grow_chain(seed, &mut pool, tol, &mut reversed) {
            open.push(chain);
        }
    }
    open
}

/// Escalating chaining without reporting; `Err` carries the largest tolerance tried.
fn chain_escalating(
    segments: &[TrimSegment],
    ctx: &TrimContext,
) -> Result<(Vec<TrimLoop>, TrimDiagnostics), f64> {
    let levels = ctx.chain.levels();
    for &tol in &levels {
        let Some((mut loops, reversed)) = chain_pass(segments, tol) else {
            log::debug!("chain: dead end at tolerance {tol:e}, escalating");
            continue;
        };

        let mut diagnostics = TrimDiagnostics::new();
        diagnostics.chain_tolerance = tol;
        diagnostics.reversed_segments = reversed;
        for lp in &mut loops {
            diagnostics.snapped_junctions += snap_junctions(lp);
        }
        diagnostics.loop_count = loops.len();
        return Ok((loops, diagnostics));
    }
    Err(levels.last().copied().unwrap_or(ctx.chain.max))
}

/// Chains unordered segments into closed loops with exactly shared junctions.
///
/// Tolerance escalates along `ctx.chain`; every failure restarts the whole pass.
/// Already ordered, exactly closed input comes back unchanged.
pub fn chain_into_loops(
    segments: Vec<TrimSegment>,
    ctx: &TrimContext,
) -> Result<(Vec<TrimLoop>, TrimDiagnostics), TrimError> {
    chain_escalating(&segments, ctx)
        .map_err(|tolerance| ctx.fatal(TrimError::NotLoops { tolerance }))
}

/// Moves every junction of a chained loop onto one exact point.
///
/// The segment whose end is open (clamped) is moved; the earlier segment's end is
/// kept so repeated snapping never drifts. Returns the number of junctions moved.
pub fn snap_junctions(lp: &mut TrimLoop) -> usize {
    let segments = lp.segments_mut();
    for segment in segments.iter_mut() {
        if !segment.curve.is_clamped() {
            let curve = segment.curve.to_open_end();
            segment.set_curve(curve);
        }
    }

    let n = segments.len();
    let mut moved = 0;
    for i in 0..n {
        let target = segments[i].end_point();
        let next = &mut segments[(i + 1) % n];
        if next.start_point() != target {
            let mut curve = next.curve.clone();
            curve.set_start_point(target);
            next.set_curve(curve);
            moved += 1;
        }
    }
    moved
}

fn side_is_seam(surface: &NurbsSurface, side: DomainSide) -> bool {
    match side {
        DomainSide::UMin => surface.is_u_closed() || surface.pole_u_start(),
        DomainSide::UMax => surface.is_u_closed() || surface.pole_u_end(),
        DomainSide::VMin => surface.is_v_closed() || surface.pole_v_start(),
        DomainSide::VMax => surface.is_v_closed() || surface.pole_v_end(),
    }
}

/// Straight edges joining loose ends that sit on seam or pole sides of the domain.
///
/// Up to four loose ends on one side are sorted along it and joined pairwise.
fn seam_edges(
    loose: &mut Vec<UvPoint>,
    surface: &NurbsSurface,
    ctx: &TrimContext,
    diagnostics: &mut TrimDiagnostics,
) -> Vec<TrimSegment> {
    let domain = surface.domain();
    let mut edges = Vec::new();
    for side in DomainSide::ALL {
        if !side_is_seam(surface, side) {
            continue;
        }
        let (mut on_side, rest): (Vec<UvPoint>, Vec<UvPoint>) = loose
            .iter()
            .partition(|&&p| domain.on_side(p, side, ctx.domain_tolerance));
        if on_side.len() < 2 {
            continue;
        }
        if on_side.len() > 4 || on_side.len() % 2 == 1 {
            let msg = format!("{} loose ends on {side:?} seam cannot be paired", on_side.len());
            log::warn!("heal: {msg}");
            diagnostics.warnings.push(msg);
            continue;
        }

        match side {
            DomainSide::UMin | DomainSide::UMax => on_side.sort_by(|a, b| a.v.total_cmp(&b.v)),
            DomainSide::VMin | DomainSide::VMax => on_side.sort_by(|a, b| a.u.total_cmp(&b.u)),
        }
        for pair in on_side.chunks_exact(2) {
            if pair[0] != pair[1] {
                edges.push(TrimSegment::new(UvCurve::line(pair[0], pair[1])));
            }
        }
        log::debug!("heal: synthesized {} seam edges on {side:?}", on_side.len() / 2);
        *loose = rest;
    }
    diagnostics.seam_edges += edges.len();
    edges
}

/// Loose end behind a loop that closed only by escalation and then collapsed.
///
/// `None` when chaining at the base tolerance left no loose ends.
fn collapsed_loose_end(lp: &TrimLoop, loose: &[UvPoint], tol: f64) -> Option<UvPoint> {
    let first = *loose.first()?;
    let near_loop = |p: &UvPoint| {
        lp.segments()
            .iter()
            .any(|s| s.start_point().distance(*p) <= tol || s.end_point().distance(*p) <= tol)
    };
    Some(loose.iter().copied().find(near_loop).unwrap_or(first))
}

/// Chains and heals raw trimming segments into closed loops.
///
/// Degenerate segments and zero-area loops are dropped with a warning. Loose ends on
/// closed seams or poles are joined by synthesized edges before tolerance escalation.
/// A remaining end that cannot be matched, or whose loop only closes by collapsing
/// onto itself, is reported as `OpenLoop`.
pub fn heal_loops(
    segments: Vec<TrimSegment>,
    surface: &NurbsSurface,
    ctx: &TrimContext,
) -> Result<(Vec<TrimLoop>, TrimDiagnostics), TrimError> {
    let mut diagnostics = TrimDiagnostics::new();
    let mut kept = Vec::with_capacity(segments.len());
    for segment in segments {
        if segment.is_degenerate(Tolerance::ZERO_LENGTH.eps) {
            log::warn!("heal: dropping zero-length trimming segment");
            diagnostics.degenerate_segments += 1;
        } else {
            kept.push(segment);
        }
    }
    if kept.is_empty() {
        return Err(ctx.fatal(TrimError::NotLoops {
            tolerance: ctx.chain.start,
        }));
    }

    let base = ctx.tolerance.eps.max(ctx.chain.start);
    let open = open_chains(&kept, base);
    let mut loose: Vec<UvPoint> = open
        .iter()
        .filter_map(|chain| Some([chain.first()?.start_point(), chain.last()?.end_point()]))
        .flatten()
        .collect();
    if !loose.is_empty() {
        kept.extend(seam_edges(&mut loose, surface, ctx, &mut diagnostics));
    }

    let (loops, chained) = match chain_escalating(&kept, ctx) {
        Ok(result) => result,
        Err(tolerance) => {
            let err = match loose.first() {
                Some(p) => TrimError::OpenLoop { u: p.u, v: p.v },
                None => TrimError::NotLoops { tolerance },
            };
            return Err(ctx.fatal(err));
        }
    };
    diagnostics.merge(&chained);

    let mut healed = Vec::with_capacity(loops.len());
    for lp in loops {
        let polygon = lp.polygon(&ctx.polyline);
        if polygon.is_degenerate() || polygon.signed_area().abs() <= ctx.tolerance.eps_squared() {
            if let Some(p) = collapsed_loose_end(&lp, &loose, diagnostics.chain_tolerance) {
                return Err(ctx.fatal(TrimError::OpenLoop { u: p.u, v: p.v }));
            }
            let msg = format!("dropped zero-area loop of {} segments", lp.len());
            log::warn!("heal: {msg}");
            diagnostics.warnings.push(msg);
            diagnostics.degenerate_segments += lp.len();
            continue;
        }
        healed.push(lp);
    }
    if healed.is_empty() {
        return Err(ctx.fatal(TrimError::NotLoops {
            tolerance: diagnostics.chain_tolerance,
        }));
    }
    diagnostics.loop_count = healed.len();
    Ok((healed, diagnostics))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(a: (f64, f64), b: (f64, f64)) -> TrimSegment {
        TrimSegment::new(UvCurve::line(UvPoint::new(a.0, a.1), UvPoint::new(b.0, b.1)))
    }

    #[test]
    fn shuffled_and_flipped_segments_close_into_one_loop() {
        let segments = vec![
            line((1.0, 1.0), (1.0, 0.0)),
            line((0.0, 0.0), (0.0, 1.0)),
            line((0.0, 0.0), (1.0, 0.0)),
            line((0.0, 1.0), (1.0, 1.0)),
        ];
        let (loops, diag) = chain_into_loops(segments, &TrimContext::new()).unwrap();
        assert_eq!(loops.len(), 1);
        assert_eq!(loops[0].len(), 4);
        assert!(loops[0].is_closed());
        assert_eq!(diag.reversed_segments, 1);
        assert_eq!(diag.snapped_junctions, 0);
    }

    #[test]
    fn ordered_closed_loop_is_unchanged() {
        let segments = vec![
            line((0.0, 0.0), (0.0, 1.0)),
            line((0.0, 1.0), (1.0, 1.0)),
            line((1.0, 1.0), (1.0, 0.0)),
            line((1.0, 0.0), (0.0, 0.0)),
        ];
        let (loops, _) = chain_into_loops(segments.clone(), &TrimContext::new()).unwrap();
        assert_eq!(loops[0].segments(), segments.as_slice());
    }

    #[test]
    fn gap_beyond_largest_tolerance_is_not_loops() {
        let segments = vec![line((0.0, 0.0), (3.0, 0.0))];
        let err = chain_into_loops(segments, &TrimContext::new()).unwrap_err();
        assert!(matches!(err, TrimError::NotLoops { .. }));
    }

    fn unit_patch() -> NurbsSurface {
        use crate::geom::core::Point3;
        NurbsSurface::bilinear(
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
        )
    }

    #[test]
    fn dangling_curve_is_an_open_loop() {
        let segments = vec![line((0.2, 0.2), (0.8, 0.3))];
        let err = heal_loops(segments, &unit_patch(), &TrimContext::new()).unwrap_err();
        let TrimError::OpenLoop { u, v } = err else {
            panic!("expected OpenLoop, got {err:?}");
        };
        assert!((u, v) == (0.2, 0.2) || (u, v) == (0.8, 0.3));
    }

    #[test]
    fn small_gap_still_heals() {
        let segments = vec![
            line((0.2, 0.2), (0.8, 0.2)),
            line((0.8, 0.2), (0.5, 0.8)),
            line((0.5, 0.8), (0.2, 0.2 + 1e-7)),
        ];
        let (loops, diag) = heal_loops(segments, &unit_patch(), &TrimContext::new()).unwrap();
        assert_eq!(loops.len(), 1);
        assert!(loops[0].is_closed());
        assert!(diag.chain_tolerance > 1e-9);
        assert_eq!(diag.snapped_junctions, 1);
    }

    #[test]
    fn snapping_keeps_the_earlier_end_point() {
        let mut lp = TrimLoop::new(vec![
            line((0.0, 0.0), (0.5, 1.0)),
            line((0.5 + 1e-7, 1.0), (1.0, 0.0)),
            line((1.0, 0.0), (0.0, 0.0)),
        ]);
        assert_eq!(snap_junctions(&mut lp), 1);
        assert_eq!(lp.segments()[1].start_point(), UvPoint::new(0.5, 1.0));
        assert!(lp.is_closed());
        assert_eq!(snap_junctions(&mut lp), 0);
    }
}
