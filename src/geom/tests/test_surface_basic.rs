use crate::geom::{
    NurbsSurface, Point3, SplitDirection, Surface, Transform, UvDomain, Vec3, surface_flatness,
};

fn bump() -> NurbsSurface {
    let mut net = Vec::with_capacity(9);
    for j in 0..3 {
        for i in 0..3 {
            let z = if i == 1 && j == 1 { 1.0 } else { 0.0 };
            net.push(Point3::new(i as f64 * 0.5, j as f64 * 0.5, z));
        }
    }
    NurbsSurface::from_grid(2, 2, 3, 3, net).unwrap()
}

#[test]
fn collapsed_edge_is_a_pole() {
    let surface = NurbsSurface::from_grid(
        1,
        1,
        2,
        2,
        vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.5, 1.0, 0.0),
            Point3::new(0.5, 1.0, 0.0),
        ],
    )
    .unwrap();
    assert!(surface.pole_v_end());
    assert!(!surface.pole_v_start());
    assert!(!surface.pole_u_start());
    assert!(!surface.is_u_closed());
    assert!(surface.normal_at(0.5, 1.0).is_none());
    assert!(surface.normal_at(0.5, 0.5).is_some());
}

#[test]
fn folded_strip_is_closed_in_u() {
    let surface = NurbsSurface::from_grid(
        1,
        1,
        3,
        2,
        vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(0.0, 0.0, 1.0),
            Point3::new(1.0, 0.0, 1.0),
            Point3::new(0.0, 0.0, 1.0),
        ],
    )
    .unwrap();
    assert!(surface.is_u_closed());
    assert!(!surface.is_v_closed());
    assert!(!surface.pole_u_start() && !surface.pole_u_end());
}

#[test]
fn flatness_shrinks_under_subdivision() {
    let surface = bump();
    let whole = surface_flatness(&surface);
    assert!((whole - 1.0).abs() < 1e-12);
    let (low, high) = surface.split(0.5, SplitDirection::U).unwrap();
    assert!(surface_flatness(&low) < whole);
    assert!(surface_flatness(&high) < whole);
}

#[test]
fn remapped_domain_evaluates_the_same_points() {
    let surface = bump();
    let target = UvDomain::new(2.0, 6.0, -1.0, 1.0);
    let remapped = surface.with_domain(&target).unwrap();
    assert_eq!(remapped.domain(), target);
    for (u, v) in [(0.0, 0.0), (0.25, 0.75), (0.5, 0.5), (1.0, 0.3)] {
        let a = surface.point_at(u, v);
        let b = remapped.point_at(2.0 + 4.0 * u, -1.0 + 2.0 * v);
        assert!(a.distance_to(b) < 1e-12);
    }
    assert!(surface.with_domain(&UvDomain::new(1.0, 0.0, 0.0, 1.0)).is_err());
}

#[test]
fn transform_moves_every_point() {
    let surface = bump();
    let moved = surface
        .transformed(Transform::translate(Vec3::new(0.0, 0.0, 2.0)))
        .unwrap();
    let a = surface.point_at(0.3, 0.6);
    let b = moved.point_at(0.3, 0.6);
    assert!((b.z - a.z - 2.0).abs() < 1e-12);
    assert!((b.x - a.x).abs() < 1e-12);
}

#[test]
fn invalid_nets_are_rejected() {
    assert!(NurbsSurface::from_grid(1, 1, 2, 2, vec![Point3::ORIGIN; 3]).is_err());
    assert!(NurbsSurface::from_grid(2, 1, 2, 2, vec![Point3::ORIGIN; 4]).is_err());
}
