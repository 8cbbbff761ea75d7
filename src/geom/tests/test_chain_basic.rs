use crate::geom::{
    NurbsSurface, Point3, TrimContext, TrimError, TrimLoop, TrimSegment, UvCurve, UvPoint, heal_loops,
    snap_junctions,
};

fn unit_patch() -> NurbsSurface {
    NurbsSurface::bilinear(
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(1.0, 0.0, 0.0),
        Point3::new(0.0, 1.0, 0.0),
        Point3::new(1.0, 1.0, 0.0),
    )
}

fn polyline(points: &[(f64, f64)]) -> TrimSegment {
    let pts: Vec<UvPoint> = points.iter().map(|&(u, v)| UvPoint::new(u, v)).collect();
    TrimSegment::new(UvCurve::polyline(&pts).unwrap())
}

/// Two halves of a diamond whose junction misses by 1e-6.
fn near_miss_halves() -> Vec<TrimSegment> {
    vec![
        polyline(&[(0.2, 0.5), (0.5, 0.8), (0.8, 0.5)]),
        polyline(&[(0.8 + 1e-6, 0.5), (0.5, 0.2), (0.2, 0.5)]),
    ]
}

#[test]
fn near_miss_junction_snaps_onto_the_earlier_end() {
    let ctx = TrimContext::new();
    let (loops, diag) = heal_loops(near_miss_halves(), &unit_patch(), &ctx).unwrap();
    assert_eq!(loops.len(), 1);
    let lp = &loops[0];
    assert!(lp.is_closed());
    let moved = lp
        .segments()
        .iter()
        .find(|s| s.start_point().u > 0.7)
        .unwrap();
    assert_eq!(moved.start_point(), UvPoint::new(0.8, 0.5));
    assert_eq!(lp.segments()[0].end_point(), lp.segments()[1].start_point());
    assert_eq!(lp.segments()[1].end_point(), lp.segments()[0].start_point());
    assert!(diag.snapped_junctions >= 1);
    assert!(diag.chain_tolerance >= 1e-6 && diag.chain_tolerance <= 1e-5 * 1.000_001);
}

#[test]
fn healing_twice_does_not_drift() {
    let ctx = TrimContext::new();
    let surface = unit_patch();
    let (first, _) = heal_loops(near_miss_halves(), &surface, &ctx).unwrap();
    let segments = first[0].clone().into_segments();
    let (second, diag) = heal_loops(segments, &surface, &ctx).unwrap();
    assert_eq!(first, second);
    assert_eq!(diag.snapped_junctions, 0);
    assert_eq!(diag.chain_tolerance, ctx.chain.start);
}

#[test]
fn snapping_a_closed_loop_is_a_no_op() {
    let ctx = TrimContext::new();
    let (mut loops, _) = heal_loops(near_miss_halves(), &unit_patch(), &ctx).unwrap();
    assert_eq!(snap_junctions(&mut loops[0]), 0);
}

#[test]
fn zero_length_segments_are_dropped() {
    let ctx = TrimContext::new();
    let mut segments = near_miss_halves();
    segments.push(TrimSegment::new(UvCurve::line(
        UvPoint::new(0.3, 0.3),
        UvPoint::new(0.3, 0.3),
    )));
    let (loops, diag) = heal_loops(segments, &unit_patch(), &ctx).unwrap();
    assert_eq!(loops.len(), 1);
    assert_eq!(diag.degenerate_segments, 1);
}

#[test]
fn loose_ends_on_a_seam_are_bridged() {
    // Degree-1 strip folded so that u = 0 and u = 1 coincide.
    let net = vec![
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(1.0, 0.0, 0.0),
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(0.0, 0.0, 1.0),
        Point3::new(1.0, 0.0, 1.0),
        Point3::new(0.0, 0.0, 1.0),
    ];
    let surface = NurbsSurface::from_grid(1, 1, 3, 2, net).unwrap();
    let segments = vec![
        TrimSegment::new(UvCurve::line(UvPoint::new(0.0, 0.2), UvPoint::new(1.0, 0.2))),
        TrimSegment::new(UvCurve::line(UvPoint::new(1.0, 0.8), UvPoint::new(0.0, 0.8))),
    ];
    let (loops, diag) = heal_loops(segments, &surface, &TrimContext::new()).unwrap();
    assert_eq!(diag.seam_edges, 2);
    assert_eq!(loops.len(), 1);
    assert_eq!(loops[0].len(), 4);
    assert!(loops[0].is_closed());
}

#[test]
fn dangling_curve_is_an_open_loop() {
    let segments = vec![TrimSegment::new(UvCurve::line(
        UvPoint::new(0.0, 0.0),
        UvPoint::new(1.0, 1.0),
    ))];
    let err = heal_loops(segments, &unit_patch(), &TrimContext::new()).unwrap_err();
    assert_eq!(err, TrimError::OpenLoop { u: 0.0, v: 0.0 });
}

#[test]
fn fatal_hook_sees_the_error() {
    use std::sync::atomic::{AtomicUsize, Ordering};
    static CALLS: AtomicUsize = AtomicUsize::new(0);
    fn count(_: &TrimError) {
        CALLS.fetch_add(1, Ordering::SeqCst);
    }

    let ctx = TrimContext::new().with_fatal_hook(count);
    let segments = vec![TrimSegment::new(UvCurve::line(
        UvPoint::new(0.0, 0.0),
        UvPoint::new(1.0, 1.0),
    ))];
    assert!(heal_loops(segments, &unit_patch(), &ctx).is_err());
    assert_eq!(CALLS.load(Ordering::SeqCst), 1);
}

#[test]
fn every_loop_junction_is_exact() {
    let ctx = TrimContext::new();
    let circle = UvCurve::circle(UvPoint::new(0.5, 0.5), 0.25).unwrap();
    let (left, right) = circle.split_at(0.5).unwrap();
    let shifted = right.map_points(|p| UvPoint::new(p.u + 3e-8, p.v));
    let (loops, _) = heal_loops(
        vec![TrimSegment::new(shifted), TrimSegment::new(left)],
        &unit_patch(),
        &ctx,
    )
    .unwrap();
    let lp: &TrimLoop = &loops[0];
    let n = lp.len();
    for i in 0..n {
        assert_eq!(lp.segments()[i].end_point(), lp.segments()[(i + 1) % n].start_point());
    }
}
