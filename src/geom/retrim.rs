//! Subdivision-consistent re-trimming.
//!
//! Splitting a trimmed surface at `direction == t` splits the base surface and
//! distributes every trimming loop between the two halves. Loop pieces are cut
//! where they cross the split line; each half then gets new straight edges along
//! the line so its loops close again.
//!
//! The edges along the line come from crossing records: walking a loop, every run
//! of pieces on one side starts and ends on the split line. Sorting those points
//! along the line and pairing them up yields exactly the intervals where the side's
//! region touches the line.

use super::chain;
use super::context::TrimContext;
use super::core::Tolerance;
use super::curve::UvCurve;
use super::knot;
use super::loops::{TrimLoop, TrimSegment, TrimmedSurface};
use super::trim::{SplitDirection, TrimDiagnostics, TrimError, UvPoint};

/// The two halves of a subdivided trimmed surface.
///
/// A side is `None` when no valid region falls on it.
#[derive(Debug, Clone)]
pub struct SubdivisionResult {
    /// Part with parameters below the split value.
    pub low: Option<TrimmedSurface>,
    /// Part with parameters above the split value.
    pub high: Option<TrimmedSurface>,
    /// The split value actually used (moved off coincident knots).
    pub parameter: f64,
    pub direction: SplitDirection,
    pub diagnostics: TrimDiagnostics,
}

impl SubdivisionResult {
    /// True only when both halves are non-empty.
    #[must_use]
    pub fn is_split(&self) -> bool {
        self.low.is_some() && self.high.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Low,
    High,
    On,
}

/// A loop piece lying entirely on one side of the split line.
#[derive(Debug, Clone)]
struct Piece {
    segment: TrimSegment,
    side: Side,
}

/// The split line `along(direction) == value` with its snapping tolerance.
#[derive(Debug, Clone, Copy)]
struct SplitLine {
    direction: SplitDirection,
    value: f64,
    eps: f64,
}

impl SplitLine {
    fn point(&self, across: f64) -> UvPoint {
        UvPoint::from_axes(self.direction, self.value, across)
    }

    /// Exact point on the line nearest `p`.
    fn project(&self, p: UvPoint) -> UvPoint {
        self.point(p.across(self.direction))
    }

    fn classify(&self, curve: &UvCurve) -> Side {
        if curve.lies_on_line(self.direction, self.value, self.eps) {
            return Side::On;
        }
        if curve.mean_along(self.direction) < self.value {
            Side::Low
        } else {
            Side::High
        }
    }
}

/// Cuts one segment at its interior crossings with the line.
fn cut_segment(segment: &TrimSegment, line: &SplitLine) -> Result<Vec<TrimSegment>, String> {
    let mut curve = segment.curve.to_open_end();
    curve.snap_axis(line.direction, line.value, line.eps);

    let (a, b) = curve.domain();
    let end_tol = Tolerance::PARAM.relative_to(b - a);
    let roots: Vec<f64> = curve
        .line_intersections(line.direction, line.value, end_tol)
        .into_iter()
        .filter(|&r| r > a + end_tol && r < b - end_tol)
        .collect();

    if roots.is_empty() {
        return Ok(vec![TrimSegment::new(curve)]);
    }

    // A segment lying on an earlier cut keeps that coordinate bit-exact.
    let start = curve.start_point();
    let across = start.across(line.direction);
    let fixed_across = curve.lies_on_line(line.direction.other(), across, 0.0);

    let keep_across = |c: UvCurve| {
        if fixed_across {
            c.map_points(|p| UvPoint::from_axes(line.direction, p.along(line.direction), across))
        } else {
            c
        }
    };

    let mut pieces = Vec::with_capacity(roots.len() + 1);
    let mut rest = curve;
    for r in roots {
        let (left, right) = rest.split_at(r)?;
        let (mut left, mut right) = (keep_across(left), keep_across(right));
        let joint = line.project(left.end_point());
        left.set_end_point(joint);
        right.set_start_point(joint);
        pieces.push(TrimSegment::new(left));
        rest = right;
    }
    pieces.push(TrimSegment::new(rest));
    Ok(pieces)
}

/// Cuts and classifies a loop's segments, keeping loop order.
fn cut_loop(lp: &TrimLoop, line: &SplitLine, diagnostics: &mut TrimDiagnostics) -> Result<Vec<Piece>, String> {
    let mut pieces = Vec::new();
    for segment in lp.segments() {
        for piece in cut_segment(segment, line)? {
            if piece.is_degenerate(Tolerance::ZERO_LENGTH.eps) {
                diagnostics.degenerate_segments += 1;
                continue;
            }
            let side = line.classify(&piece.curve);
            pieces.push(Piece {
                segment: piece,
                side,
            });
        }
    }
    Ok(pieces)
}

/// Positions along the line where runs of `side` pieces start or end.
///
/// A loop lying entirely on `side` contributes nothing.
fn run_crossings(pieces: &[Piece], side: Side, line: &SplitLine) -> Vec<f64> {
    let n = pieces.len();
    let mut crossings = Vec::new();
    if n == 0 || pieces.iter().all(|p| p.side == side) {
        return crossings;
    }
    for i in 0..n {
        if pieces[i].side != side {
            continue;
        }
        let prev = &pieces[(i + n - 1) % n];
        let next = &pieces[(i + 1) % n];
        if prev.side != side {
            crossings.push(pieces[i].segment.start_point().across(line.direction));
        }
        if next.side != side {
            crossings.push(pieces[i].segment.end_point().across(line.direction));
        }
    }
    crossings
}

/// Straight edges along the line joining sorted crossings pairwise.
fn line_edges(mut crossings: Vec<f64>, line: &SplitLine) -> Vec<TrimSegment> {
    crossings.sort_by(f64::total_cmp);
    crossings
        .chunks_exact(2)
        .filter(|pair| pair[0] != pair[1])
        .map(|pair| TrimSegment::new(UvCurve::line(line.point(pair[0]), line.point(pair[1]))))
        .collect()
}

/// True when all loop points share one u or one v value.
fn is_sliver(loops: &[TrimLoop], ctx: &TrimContext) -> bool {
    let points: Vec<UvPoint> = loops
        .iter()
        .flat_map(|l| l.polygon(&ctx.polyline).into_points())
        .collect();
    let Some(first) = points.first() else {
        return true;
    };
    points.iter().all(|p| p.u == first.u) || points.iter().all(|p| p.v == first.v)
}

/// Splits `trimmed` at `direction == t` and partitions its trimming loops.
///
/// `t` must lie strictly inside the surface domain. When it coincides with a knot
/// of the surface it is first moved off by [`knot::non_degenerate_split_param`].
pub fn subdivide(
    trimmed: &TrimmedSurface,
    t: f64,
    direction: SplitDirection,
    ctx: &TrimContext,
) -> Result<SubdivisionResult, TrimError> {
    let domain = trimmed.domain();
    let (lo, hi) = domain.range(direction);
    if !(t > lo && t < hi) {
        let center = domain.center();
        let p = UvPoint::from_axes(direction, t, center.across(direction));
        return Err(ctx.fatal(TrimError::DomainViolation {
            u: p.u,
            v: p.v,
            domain,
        }));
    }

    let surface = trimmed.surface();
    let knots = match direction {
        SplitDirection::U => &surface.knots_u,
        SplitDirection::V => &surface.knots_v,
    };
    let value = knot::non_degenerate_split_param(knots, t, (lo, hi));
    let line = SplitLine {
        direction,
        value,
        eps: ctx.tolerance.eps,
    };

    let mut diagnostics = TrimDiagnostics::new();
    let mut low_pieces = Vec::new();
    let mut high_pieces = Vec::new();
    let mut low_crossings = Vec::new();
    let mut high_crossings = Vec::new();

    for lp in trimmed.loops() {
        let pieces = cut_loop(lp, &line, &mut diagnostics).map_err(|e| ctx.fatal(e.into()))?;
        low_crossings.extend(run_crossings(&pieces, Side::Low, &line));
        high_crossings.extend(run_crossings(&pieces, Side::High, &line));

        let recorded = low_crossings.len() + high_crossings.len();
        if recorded > ctx.max_line_crossings {
            return Err(ctx.fatal(TrimError::Capacity {
                limit: ctx.max_line_crossings,
            }));
        }

        for piece in pieces {
            match piece.side {
                Side::Low => low_pieces.push(piece.segment),
                Side::High => high_pieces.push(piece.segment),
                Side::On => diagnostics.degenerate_segments += 1,
            }
        }
    }

    for (name, crossings) in [("low", &low_crossings), ("high", &high_crossings)] {
        if crossings.len() % 2 == 1 {
            return Err(ctx.fatal(TrimError::MalformedSegment(format!(
                "{} split-line crossings on the {name} side at {direction:?} = {value}",
                crossings.len()
            ))));
        }
    }

    let (low_surface, high_surface) = surface
        .split(value, direction)
        .map_err(|e| ctx.fatal(e.into()))?;

    let low = build_side(low_pieces, low_crossings, &line, ctx, &mut diagnostics)?
        .map(|loops| TrimmedSurface::from_loops(low_surface, loops));
    let high = build_side(high_pieces, high_crossings, &line, ctx, &mut diagnostics)?
        .map(|loops| TrimmedSurface::from_loops(high_surface, loops));

    log::debug!(
        "retrim: split at {direction:?} = {value}: low {}, high {}",
        low.as_ref().map_or(0, |s| s.loops().len()),
        high.as_ref().map_or(0, |s| s.loops().len()),
    );

    Ok(SubdivisionResult {
        low,
        high,
        parameter: value,
        direction,
        diagnostics,
    })
}

fn build_side(
    mut pieces: Vec<TrimSegment>,
    crossings: Vec<f64>,
    line: &SplitLine,
    ctx: &TrimContext,
    diagnostics: &mut TrimDiagnostics,
) -> Result<Option<Vec<TrimLoop>>, TrimError> {
    if pieces.is_empty() {
        return Ok(None);
    }
    let edges = line_edges(crossings, line);
    diagnostics.seam_edges += edges.len();
    pieces.extend(edges);

    let (loops, chained) = chain::chain_into_loops(pieces, ctx)?;
    diagnostics.merge(&chained);

    if is_sliver(&loops, ctx) {
        log::warn!("retrim: dropping zero-area side at {:?} = {}", line.direction, line.value);
        diagnostics.sliver_sides += 1;
        return Ok(None);
    }
    Ok(Some(loops))
}
