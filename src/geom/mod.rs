mod chain;
mod context;
mod core;
mod curve;
mod hierarchy;
pub mod knot;
mod loops;
mod mesh;
mod metrics;
mod polygonize;
mod retrim;
mod surface;
mod tessellation;
mod trim;
mod triangulation;

pub use chain::{chain_into_loops, heal_loops, snap_junctions};
pub use context::{ChainOptions, FatalHook, PolylineMethod, PolylineOptions, TrimContext};
pub use core::{Point3, Tolerance, Transform, Vec3};
pub use curve::UvCurve;
pub use hierarchy::{LoopRegion, classify_loops, merge_islands};
pub use loops::{LoopClassifier, TrimLoop, TrimSegment, TrimmedSurface};
pub use mesh::{TrimMesh, TrimMeshBuilder};
pub use metrics::{TimingBucket, TrimMetrics, TrimTimingReport};
pub use polygonize::{
    FlatnessDriver, PolygonizeOptions, PolygonizeResult, SubdivisionDriver, polygonize,
    polygonize_with_driver,
};
pub use retrim::{SubdivisionResult, subdivide};
pub use surface::{NurbsSurface, Surface};
pub use tessellation::{approximate_curve, surface_flatness};
pub use trim::{
    DomainSide, SplitDirection, TrimDiagnostics, TrimError, UvDomain, UvPoint, UvPolygon,
    contains_point_polygon, orient2d, point_on_segment, ray_parity, signed_area,
};
pub use triangulation::{
    TriangulationDiagnostics, TriangulationResult, triangulate_grid, triangulate_polygon,
};

#[cfg(test)]
mod tests;
