use crate::geom::{
    Tolerance, TrimContext, TrimLoop, UvCurve, UvPoint, UvPolygon, classify_loops, merge_islands,
    orient2d, triangulate_polygon,
};

fn triangle_area_sum(vertices: &[UvPoint], indices: &[u32]) -> f64 {
    indices
        .chunks_exact(3)
        .map(|t| 0.5 * orient2d(vertices[t[0] as usize], vertices[t[1] as usize], vertices[t[2] as usize]))
        .sum()
}

#[test]
fn comb_polygon_is_fully_covered() {
    // Clockwise comb with three teeth.
    let mut points = vec![UvPoint::new(0.0, 0.0), UvPoint::new(0.0, 1.0)];
    for k in 0..3 {
        let u = 0.2 + 0.3 * k as f64;
        points.push(UvPoint::new(u - 0.1, 1.0));
        points.push(UvPoint::new(u - 0.1, 0.3));
        points.push(UvPoint::new(u, 0.3));
        points.push(UvPoint::new(u, 1.0));
    }
    points.push(UvPoint::new(1.0, 1.0));
    points.push(UvPoint::new(1.0, 0.0));
    let polygon = UvPolygon::new(points);
    assert!(polygon.is_cw());

    let result = triangulate_polygon(&polygon, Tolerance::DEFAULT).unwrap();
    let area = triangle_area_sum(&result.vertices, &result.indices);
    assert!((area - polygon.signed_area().abs()).abs() < 1e-12);
    for t in result.indices.chunks_exact(3) {
        let a = orient2d(
            result.vertices[t[0] as usize],
            result.vertices[t[1] as usize],
            result.vertices[t[2] as usize],
        );
        assert!(a > 0.0);
    }
}

#[test]
fn bridged_polygon_with_hole_triangulates() {
    let ctx = TrimContext::new();
    let outer = TrimLoop::from_curve(
        UvCurve::polyline(&[
            UvPoint::new(0.0, 0.0),
            UvPoint::new(1.0, 0.0),
            UvPoint::new(1.0, 1.0),
            UvPoint::new(0.0, 1.0),
            UvPoint::new(0.0, 0.0),
        ])
        .unwrap(),
    );
    let hole = TrimLoop::from_curve(UvCurve::circle(UvPoint::new(0.5, 0.5), 0.25).unwrap());
    let regions = classify_loops(&[outer, hole], &ctx).unwrap();
    let merged = merge_islands(&regions[0], &ctx).unwrap();
    let result = triangulate_polygon(&merged, ctx.tolerance).unwrap();

    let area = triangle_area_sum(&result.vertices, &result.indices);
    assert!((area - regions[0].area()).abs() < 1e-9);
    for t in result.indices.chunks_exact(3) {
        let (a, b, c) = (
            result.vertices[t[0] as usize],
            result.vertices[t[1] as usize],
            result.vertices[t[2] as usize],
        );
        let centroid = UvPoint::new((a.u + b.u + c.u) / 3.0, (a.v + b.v + c.v) / 3.0);
        assert!(centroid.distance(UvPoint::new(0.5, 0.5)) > 0.24);
    }
}

#[test]
fn collinear_edge_points_survive() {
    let polygon = UvPolygon::new(vec![
        UvPoint::new(0.0, 0.0),
        UvPoint::new(0.0, 0.5),
        UvPoint::new(0.0, 1.0),
        UvPoint::new(1.0, 1.0),
        UvPoint::new(1.0, 0.0),
    ]);
    let result = triangulate_polygon(&polygon, Tolerance::DEFAULT).unwrap();
    assert!(result.indices.contains(&1));
    assert_eq!(result.diagnostics.dropped_collinear_vertices, 0);
    assert_eq!(result.diagnostics.output_triangle_count, 3);
}

#[test]
fn non_finite_vertices_fail() {
    let polygon = UvPolygon::new(vec![
        UvPoint::new(0.0, 0.0),
        UvPoint::new(f64::NAN, 0.0),
        UvPoint::new(1.0, 1.0),
    ]);
    assert!(triangulate_polygon(&polygon, Tolerance::DEFAULT).is_err());
}
