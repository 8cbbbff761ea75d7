use crate::geom::{
    PolylineMethod, PolylineOptions, SplitDirection, UvCurve, UvDomain, UvPoint, approximate_curve,
};

#[test]
fn split_halves_share_the_junction_exactly() {
    let c = UvCurve::circle(UvPoint::new(0.5, 0.5), 0.3).unwrap();
    let (left, right) = c.split_at(0.375).unwrap();
    assert_eq!(left.end_point(), right.start_point());
    assert_eq!(left.domain(), (0.0, 0.375));
    assert_eq!(right.domain(), (0.375, 1.0));

    let mid = c.point_at(0.2);
    assert!(left.point_at(0.2).distance(mid) < 1e-12);
    let late = c.point_at(0.8);
    assert!(right.point_at(0.8).distance(late) < 1e-12);
}

#[test]
fn region_extracts_the_middle_of_a_line() {
    let line = UvCurve::line(UvPoint::new(0.0, 0.0), UvPoint::new(1.0, 2.0));
    let mid = line.region(0.25, 0.75).unwrap();
    assert!(mid.start_point().distance(UvPoint::new(0.25, 0.5)) < 1e-15);
    assert!(mid.end_point().distance(UvPoint::new(0.75, 1.5)) < 1e-15);
    assert!(line.region(0.6, 0.4).is_err());
}

#[test]
fn circle_crosses_its_centre_line_twice() {
    let c = UvCurve::circle(UvPoint::new(0.5, 0.5), 0.3).unwrap();
    let hits = c.line_intersections(SplitDirection::U, 0.5, 1e-12);
    assert_eq!(hits.len(), 2);
    for t in hits {
        assert!((c.point_at(t).u - 0.5).abs() < 1e-12);
    }
    assert!(c.line_intersections(SplitDirection::V, 0.9, 1e-12).is_empty());
}

#[test]
fn map_points_remaps_the_domain() {
    let c = UvCurve::polyline(&[UvPoint::new(0.0, 0.0), UvPoint::new(1.0, 1.0)]).unwrap();
    let from = UvDomain::unit();
    let to = UvDomain::new(2.0, 4.0, -1.0, 0.0);
    let mapped = c.map_points(|p| p.map_domain(&from, &to));
    assert_eq!(mapped.start_point(), UvPoint::new(2.0, -1.0));
    assert_eq!(mapped.end_point(), UvPoint::new(4.0, 0.0));
}

#[test]
fn merge_polylines_drops_shared_vertices() {
    let a = UvCurve::polyline(&[UvPoint::new(0.0, 0.0), UvPoint::new(1.0, 0.0)]).unwrap();
    let b = UvCurve::polyline(&[UvPoint::new(1.0, 0.0), UvPoint::new(1.0, 1.0)]).unwrap();
    let merged = UvCurve::merge_polylines(&[a, b]).unwrap();
    assert_eq!(merged.control_points().len(), 3);
    assert!(merged.is_polyline());

    let circle = UvCurve::circle(UvPoint::new(0.5, 0.5), 0.1).unwrap();
    assert!(UvCurve::merge_polylines(&[circle]).is_err());
}

#[test]
fn uniform_approximation_samples_every_span() {
    let c = UvCurve::circle(UvPoint::new(0.5, 0.5), 0.3).unwrap();
    let opts = PolylineOptions {
        method: PolylineMethod::Uniform,
        samples: 4,
        ..PolylineOptions::default()
    };
    let pts = approximate_curve(&c, &opts);
    // 4 spans, 3 interior samples each, plus the shared closing point.
    assert_eq!(pts.len(), 4 * 4 + 1);
}

#[test]
fn invalid_curves_are_rejected() {
    assert!(UvCurve::polyline(&[UvPoint::new(0.0, 0.0)]).is_err());
    assert!(UvCurve::circle(UvPoint::new(0.0, 0.0), 0.0).is_err());
    assert!(
        UvCurve::new(
            2,
            vec![UvPoint::new(0.0, 0.0), UvPoint::new(1.0, 0.0), UvPoint::new(1.0, 1.0)],
            vec![0.0, 0.0, 0.0, 1.0, 1.0],
            None,
        )
        .is_err()
    );
}
