use crate::geom::{
    NurbsSurface, Point3, PolylineOptions, TrimContext, TrimDiagnostics, TrimError, TrimmedSurface, UvCurve,
    UvDomain, UvPoint,
};

fn unit_patch() -> NurbsSurface {
    NurbsSurface::bilinear(
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(1.0, 0.0, 0.0),
        Point3::new(0.0, 1.0, 0.0),
        Point3::new(1.0, 1.0, 0.0),
    )
}

fn fine() -> PolylineOptions {
    PolylineOptions {
        tolerance: 1e-7,
        max_segments: 1 << 16,
        ..PolylineOptions::default()
    }
}

fn donut() -> TrimmedSurface {
    let outer = UvCurve::polyline(&[
        UvPoint::new(0.1, 0.1),
        UvPoint::new(0.9, 0.1),
        UvPoint::new(0.9, 0.9),
        UvPoint::new(0.1, 0.9),
        UvPoint::new(0.1, 0.1),
    ])
    .unwrap();
    let hole = UvCurve::circle(UvPoint::new(0.5, 0.5), 0.2).unwrap();
    TrimmedSurface::new(unit_patch(), vec![hole, outer], &TrimContext::new())
        .unwrap()
        .0
}

#[test]
fn donut_area_and_containment() {
    let d = donut();
    assert_eq!(d.loops().len(), 2);
    assert!(d.loops().iter().all(|l| l.is_closed()));
    let expected = 0.64 - std::f64::consts::PI * 0.04;
    assert!((d.trimmed_area(&fine()) - expected).abs() < 1e-6);

    let opts = PolylineOptions::default();
    assert!(d.contains(UvPoint::new(0.2, 0.2), &opts));
    assert!(!d.contains(UvPoint::new(0.5, 0.5), &opts));
    assert!(!d.contains(UvPoint::new(0.05, 0.5), &opts));
    assert!(!d.contains(UvPoint::new(1.5, 0.5), &opts));
}

#[test]
fn remapping_the_domain_carries_the_loops() {
    let d = donut();
    let target = UvDomain::new(0.0, 2.0, 0.0, 4.0);
    let remapped = d.with_domain(&target).unwrap();
    assert_eq!(remapped.domain(), target);
    let opts = PolylineOptions::default();
    assert!(remapped.contains(UvPoint::new(0.4, 0.8), &opts));
    assert!(!remapped.contains(UvPoint::new(1.0, 2.0), &opts));
    let scaled = d.trimmed_area(&fine()) * target.area();
    assert!((remapped.trimmed_area(&fine()) - scaled).abs() < 5e-6);
}

#[test]
fn reversing_mirrors_containment() {
    let d = donut();
    let r = d.reversed().unwrap();
    let opts = PolylineOptions::default();
    for p in [UvPoint::new(0.2, 0.3), UvPoint::new(0.8, 0.75), UvPoint::new(0.45, 0.5)] {
        let mirrored = UvPoint::new(1.0 - p.u, p.v);
        assert_eq!(d.contains(p, &opts), r.contains(mirrored, &opts));
    }
    assert!(r.loops().iter().all(|l| l.is_closed()));
}

#[test]
fn curves_crossing_the_boundary_are_rejected() {
    let line = UvCurve::line(UvPoint::new(-0.5, 0.5), UvPoint::new(0.5, 0.5));
    let err = TrimmedSurface::new(unit_patch(), vec![line], &TrimContext::new()).unwrap_err();
    let TrimError::DomainViolation { u, domain, .. } = err else {
        panic!("unexpected {err:?}");
    };
    assert!(u < 0.0);
    assert_eq!(domain, UvDomain::unit());
}

#[test]
fn diagnostics_merge_accumulates() {
    let mut a = TrimDiagnostics {
        snapped_junctions: 1,
        chain_tolerance: 1e-9,
        ..TrimDiagnostics::default()
    };
    let b = TrimDiagnostics {
        snapped_junctions: 2,
        chain_tolerance: 1e-6,
        warnings: vec!["dropped".to_string()],
        ..TrimDiagnostics::default()
    };
    a.merge(&b);
    assert_eq!(a.snapped_junctions, 3);
    assert_eq!(a.chain_tolerance, 1e-6);
    assert!(a.had_adjustments());
    assert!(a.has_warnings());
}

#[test]
fn errors_render_their_location() {
    let err = TrimError::OpenLoop { u: 0.25, v: 1.0 };
    assert_eq!(
        err.to_string(),
        "open trimming loop end at (0.250000, 1.000000) could not be reconciled"
    );
    assert_eq!("v".parse::<crate::geom::SplitDirection>().unwrap(), crate::geom::SplitDirection::V);
    assert!("w".parse::<crate::geom::SplitDirection>().is_err());
}
