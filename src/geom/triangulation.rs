use super::core::Tolerance;
use super::trim::{TrimError, UvPoint, UvPolygon, orient2d};

/// Row-major grid triangulation; `u_count * v_count` vertices, counter-clockwise in (u,v).
#[must_use]
pub fn triangulate_grid(u_count: usize, v_count: usize) -> Vec<u32> {
    let u_count = u_count.max(2);
    let v_count = v_count.max(2);
    let mut indices = Vec::with_capacity((u_count - 1) * (v_count - 1) * 6);

    for v in 0..v_count - 1 {
        for u in 0..u_count - 1 {
            let i0 = (v * u_count + u) as u32;
            let i1 = i0 + 1;
            let i2 = i0 + u_count as u32;
            let i3 = i2 + 1;
            indices.extend_from_slice(&[i0, i1, i2]);
            indices.extend_from_slice(&[i2, i1, i3]);
        }
    }
    indices
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct TriangulationDiagnostics {
    pub input_vertex_count: usize,
    pub output_triangle_count: usize,
    pub culled_degenerate_triangles: usize,
    pub dropped_collinear_vertices: usize,
}

/// Triangles over the vertices of the input polygon.
#[derive(Debug, Clone, PartialEq)]
pub struct TriangulationResult {
    pub vertices: Vec<UvPoint>,
    /// Counter-clockwise triples into `vertices`.
    pub indices: Vec<u32>,
    pub diagnostics: TriangulationDiagnostics,
}

#[derive(Debug, Clone, Copy)]
struct Node {
    idx: u32,
    point: UvPoint,
    prev: usize,
    next: usize,
}

/// Ear-clips one simple or weakly simple polygon.
///
/// Bridged polygons produced by island merging are accepted: repeated
/// vertices at a bridge are treated as distinct ring entries. Collinear
/// vertices are kept so boundary points shared with neighbouring patches
/// appear in the output; they are only dropped when no ear can be found
/// otherwise.
///
/// # Errors
/// [`TrimError::Triangulation`] when the ring has fewer than three usable
/// vertices or clipping stalls.
pub fn triangulate_polygon(polygon: &UvPolygon, tol: Tolerance) -> Result<TriangulationResult, TrimError> {
    let vertices = polygon.points().to_vec();
    if vertices.iter().any(|p| !p.is_finite()) {
        return Err(TrimError::Triangulation("polygon vertices must be finite".to_string()));
    }
    if vertices.len() < 3 {
        return Err(TrimError::Triangulation(format!(
            "polygon has {} vertices, need at least 3",
            vertices.len()
        )));
    }

    let mut nodes = build_ring_nodes(&vertices);
    let mut diagnostics = TriangulationDiagnostics {
        input_vertex_count: vertices.len(),
        ..TriangulationDiagnostics::default()
    };
    let triangles = earclip_ring(0, &mut nodes, tol, &mut diagnostics)?;

    let mut indices: Vec<u32> = Vec::with_capacity(triangles.len() * 3);
    for [i0, i1, i2] in triangles {
        let (a, b, c) = (vertices[i0 as usize], vertices[i1 as usize], vertices[i2 as usize]);
        let area = 0.5 * orient2d(a, b, c);
        if !area.is_finite() || area <= tol.eps_squared() {
            diagnostics.culled_degenerate_triangles += 1;
            continue;
        }
        indices.extend_from_slice(&[i0, i1, i2]);
    }
    if indices.is_empty() {
        return Err(TrimError::Triangulation("polygon produced no triangles".to_string()));
    }
    diagnostics.output_triangle_count = indices.len() / 3;

    Ok(TriangulationResult {
        vertices,
        indices,
        diagnostics,
    })
}

fn build_ring_nodes(vertices: &[UvPoint]) -> Vec<Node> {
    let len = vertices.len();
    (0..len)
        .map(|i| Node {
            idx: i as u32,
            point: vertices[i],
            prev: (i + len - 1) % len,
            next: (i + 1) % len,
        })
        .collect()
}

fn ring_len(start: usize, nodes: &[Node]) -> usize {
    let mut count = 0usize;
    let mut cur = start;
    loop {
        count += 1;
        cur = nodes[cur].next;
        if cur == start || count > nodes.len() {
            break;
        }
    }
    count
}

/// Unlinks coincident neighbours and, when `drop_collinear`, flat vertices.
fn filter_ring(
    start: usize,
    nodes: &mut [Node],
    tol: Tolerance,
    drop_collinear: bool,
    dropped: &mut usize,
) -> Option<usize> {
    let mut start = start;
    let mut cur = start;
    let mut guard = 0usize;
    loop {
        if ring_len(start, nodes) < 3 {
            return None;
        }
        guard += 1;
        if guard > nodes.len().saturating_mul(4).max(16) {
            break;
        }

        let prev = nodes[cur].prev;
        let next = nodes[cur].next;
        let (p, c, n) = (nodes[prev].point, nodes[cur].point, nodes[next].point);
        let dup = c.distance(n) <= tol.eps;
        let flat = drop_collinear && distance_to_line(p, c, n) <= tol.eps;

        if dup || flat {
            if flat && !dup {
                *dropped += 1;
            }
            if cur == start {
                start = next;
            }
            remove_node(cur, nodes);
            cur = prev;
        } else {
            cur = next;
            if cur == start {
                break;
            }
        }
    }
    Some(start)
}

fn earclip_ring(
    start: usize,
    nodes: &mut [Node],
    tol: Tolerance,
    diagnostics: &mut TriangulationDiagnostics,
) -> Result<Vec<[u32; 3]>, TrimError> {
    let mut dropped = 0usize;
    let mut start = filter_ring(start, nodes, tol, false, &mut dropped)
        .ok_or_else(|| TrimError::Triangulation("polygon degenerates after filtering".to_string()))?;

    let is_ccw = ring_area(start, nodes) > 0.0;
    let mut remaining = ring_len(start, nodes);
    let mut triangles = Vec::with_capacity(remaining.saturating_sub(2));
    let mut ear = start;
    let mut stop = start;
    let mut stalled = 0usize;

    while remaining > 2 {
        let prev = nodes[ear].prev;
        let next = nodes[ear].next;
        if is_ear(prev, ear, next, nodes, is_ccw, tol) {
            if is_ccw {
                triangles.push([nodes[prev].idx, nodes[ear].idx, nodes[next].idx]);
            } else {
                triangles.push([nodes[prev].idx, nodes[next].idx, nodes[ear].idx]);
            }
            if ear == start {
                start = next;
            }
            remove_node(ear, nodes);
            remaining -= 1;
            ear = next;
            stop = next;
            stalled = 0;
            continue;
        }

        ear = next;
        if ear == stop {
            stalled += 1;
            if stalled > 2 {
                return Err(TrimError::Triangulation(format!(
                    "no ear found with {remaining} vertices left"
                )));
            }
            start = match filter_ring(start, nodes, tol, stalled > 1, &mut dropped) {
                Some(s) => s,
                None => break,
            };
            remaining = ring_len(start, nodes);
            ear = start;
            stop = start;
        }
    }

    diagnostics.dropped_collinear_vertices = dropped;
    Ok(triangles)
}

fn is_ear(prev: usize, ear: usize, next: usize, nodes: &[Node], is_ccw: bool, tol: Tolerance) -> bool {
    let a = nodes[prev].point;
    let b = nodes[ear].point;
    let c = nodes[next].point;

    if distance_to_line(a, b, c) <= tol.eps {
        return false;
    }
    let cross = orient2d(a, b, c);
    if (is_ccw && cross <= 0.0) || (!is_ccw && cross >= 0.0) {
        return false;
    }

    let mut p = nodes[next].next;
    while p != prev {
        let pt = nodes[p].point;
        if pt != a && pt != b && pt != c && point_in_triangle(a, b, c, pt, is_ccw, tol) {
            let cross_p = orient2d(nodes[nodes[p].prev].point, pt, nodes[nodes[p].next].point);
            let reflex = if is_ccw {
                cross_p <= tol.eps
            } else {
                cross_p >= -tol.eps
            };
            if reflex {
                return false;
            }
        }
        p = nodes[p].next;
    }
    true
}

fn ring_area(start: usize, nodes: &[Node]) -> f64 {
    let mut area = 0.0;
    let mut p = start;
    loop {
        let q = nodes[p].next;
        let (a, b) = (nodes[p].point, nodes[q].point);
        area += a.u * b.v - b.u * a.v;
        p = q;
        if p == start {
            break;
        }
    }
    0.5 * area
}

fn remove_node(node: usize, nodes: &mut [Node]) {
    let prev = nodes[node].prev;
    let next = nodes[node].next;
    nodes[prev].next = next;
    nodes[next].prev = prev;
}

fn point_in_triangle(a: UvPoint, b: UvPoint, c: UvPoint, p: UvPoint, is_ccw: bool, tol: Tolerance) -> bool {
    let ab = orient2d(a, b, p);
    let bc = orient2d(b, c, p);
    let ca = orient2d(c, a, p);
    if is_ccw {
        ab >= -tol.eps && bc >= -tol.eps && ca >= -tol.eps
    } else {
        ab <= tol.eps && bc <= tol.eps && ca <= tol.eps
    }
}

/// Distance from `p` to the infinite line through `a` and `b`.
fn distance_to_line(a: UvPoint, p: UvPoint, b: UvPoint) -> f64 {
    let len = a.distance(b);
    if len <= 0.0 {
        return p.distance(a);
    }
    orient2d(a, b, p).abs() / len
}

#[cfg(test)]
mod tests {
    use super::*;

    fn area_of(result: &TriangulationResult) -> f64 {
        result
            .indices
            .chunks(3)
            .map(|t| {
                0.5 * orient2d(
                    result.vertices[t[0] as usize],
                    result.vertices[t[1] as usize],
                    result.vertices[t[2] as usize],
                )
            })
            .sum()
    }

    #[test]
    fn grid_has_two_triangles_per_cell() {
        assert_eq!(triangulate_grid(2, 2), vec![0, 1, 2, 2, 1, 3]);
        assert_eq!(triangulate_grid(4, 3).len(), 3 * 2 * 6);
    }

    #[test]
    fn clockwise_square_with_edge_point_keeps_it() {
        let poly = UvPolygon::new(vec![
            UvPoint::new(0.0, 0.0),
            UvPoint::new(0.0, 1.0),
            UvPoint::new(1.0, 1.0),
            UvPoint::new(1.0, 0.0),
            UvPoint::new(0.5, 0.0),
        ]);
        let result = triangulate_polygon(&poly, Tolerance::DEFAULT).unwrap();
        assert_eq!(result.diagnostics.output_triangle_count, 3);
        assert!(result.indices.contains(&4));
        assert!((area_of(&result) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn concave_polygon_area_preserved() {
        let poly = UvPolygon::new(vec![
            UvPoint::new(0.0, 0.0),
            UvPoint::new(2.0, 0.0),
            UvPoint::new(2.0, 2.0),
            UvPoint::new(1.0, 0.5),
            UvPoint::new(0.0, 2.0),
        ]);
        let result = triangulate_polygon(&poly, Tolerance::DEFAULT).unwrap();
        assert_eq!(result.indices.len(), 9);
        assert!((area_of(&result) - poly.signed_area()).abs() < 1e-12);
    }

    #[test]
    fn too_few_vertices_fail() {
        let poly = UvPolygon::new(vec![UvPoint::new(0.0, 0.0), UvPoint::new(1.0, 0.0)]);
        assert!(matches!(
            triangulate_polygon(&poly, Tolerance::DEFAULT),
            Err(TrimError::Triangulation(_))
        ));
    }
}
