use std::collections::HashMap;

use super::core::{Point3, Vec3};
use super::trim::UvPoint;

/// Triangle list produced by polygonizing a trimmed surface.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TrimMesh {
    pub positions: Vec<[f64; 3]>,
    pub indices: Vec<u32>,
    pub uvs: Option<Vec<[f64; 2]>>,
    pub normals: Option<Vec<[f64; 3]>>,
}

impl TrimMesh {
    #[must_use]
    pub fn new(positions: Vec<[f64; 3]>, indices: Vec<u32>) -> Self {
        Self {
            positions,
            indices,
            uvs: None,
            normals: None,
        }
    }

    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Returns true if any vertex position contains NaN or Inf values.
    #[must_use]
    pub fn has_invalid_vertices(&self) -> bool {
        self.positions.iter().any(|p| p.iter().any(|c| !c.is_finite()))
    }

    #[must_use]
    pub fn has_valid_indices(&self) -> bool {
        let n = self.positions.len() as u32;
        self.indices.len() % 3 == 0 && self.indices.iter().all(|&i| i < n)
    }

    /// Returns true if all optional vertex attribute buffers match `positions.len()`.
    #[must_use]
    pub fn has_valid_attribute_lengths(&self) -> bool {
        let n = self.positions.len();
        self.uvs.as_ref().is_none_or(|uvs| uvs.len() == n)
            && self.normals.as_ref().is_none_or(|normals| normals.len() == n)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.indices.len() % 3 != 0 {
            return Err("mesh indices are not a triangle list (len % 3 != 0)".to_string());
        }
        if self.has_invalid_vertices() {
            return Err("mesh has invalid vertex coordinates (NaN/Inf)".to_string());
        }
        if !self.has_valid_indices() {
            return Err("mesh has out-of-bounds vertex indices".to_string());
        }
        if !self.has_valid_attribute_lengths() {
            return Err("mesh attribute buffers do not match vertex count".to_string());
        }
        Ok(())
    }

    /// `[x0, y0, z0, x1, ...]` copy of the positions.
    #[must_use]
    pub fn positions_flat(&self) -> Vec<f64> {
        self.positions.iter().flatten().copied().collect()
    }

    #[must_use]
    pub fn uvs_flat(&self) -> Option<Vec<f64>> {
        self.uvs.as_ref().map(|uvs| uvs.iter().flatten().copied().collect())
    }

    #[must_use]
    pub fn normals_flat(&self) -> Option<Vec<f64>> {
        self.normals
            .as_ref()
            .map(|normals| normals.iter().flatten().copied().collect())
    }

    /// Vertices keyed back to their parameter values, when uvs were kept.
    #[must_use]
    pub fn uv_points(&self) -> Option<Vec<UvPoint>> {
        self.uvs
            .as_ref()
            .map(|uvs| uvs.iter().map(|&[u, v]| UvPoint::new(u, v)).collect())
    }
}

/// Accumulates triangles from many patches, sharing vertices whose (u,v)
/// values are bit-identical.
#[derive(Debug, Default)]
pub struct TrimMeshBuilder {
    mesh: TrimMesh,
    lookup: HashMap<(u64, u64), u32>,
    keep_uvs: bool,
    keep_normals: bool,
}

impl TrimMeshBuilder {
    #[must_use]
    pub fn new(keep_uvs: bool, keep_normals: bool) -> Self {
        Self {
            mesh: TrimMesh {
                uvs: keep_uvs.then(Vec::new),
                normals: keep_normals.then(Vec::new),
                ..TrimMesh::default()
            },
            keep_uvs,
            keep_normals,
            ..Self::default()
        }
    }

    /// Index of the vertex at `uv`, evaluating it with `eval` only on first sight.
    pub fn vertex(&mut self, uv: UvPoint, eval: impl FnOnce(UvPoint) -> (Point3, Vec3)) -> u32 {
        let key = (uv.u.to_bits(), uv.v.to_bits());
        if let Some(&idx) = self.lookup.get(&key) {
            return idx;
        }
        let (position, normal) = eval(uv);
        let idx = self.mesh.positions.len() as u32;
        self.mesh.positions.push(position.to_array());
        if let Some(uvs) = self.mesh.uvs.as_mut() {
            uvs.push([uv.u, uv.v]);
        }
        if let Some(normals) = self.mesh.normals.as_mut() {
            normals.push(normal.to_array());
        }
        self.lookup.insert(key, idx);
        idx
    }

    pub fn triangle(&mut self, tri: [u32; 3]) {
        if tri[0] != tri[1] && tri[1] != tri[2] && tri[0] != tri[2] {
            self.mesh.indices.extend_from_slice(&tri);
        }
    }

    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.mesh.positions.len()
    }

    #[must_use]
    pub fn finish(self) -> TrimMesh {
        debug_assert_eq!(self.keep_uvs, self.mesh.uvs.is_some());
        debug_assert_eq!(self.keep_normals, self.mesh.normals.is_some());
        self.mesh
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_welds_identical_uvs() {
        let mut builder = TrimMeshBuilder::new(true, false);
        let eval = |uv: UvPoint| (Point3::new(uv.u, uv.v, 0.0), Vec3::Z);
        let a = builder.vertex(UvPoint::new(0.0, 0.0), eval);
        let b = builder.vertex(UvPoint::new(1.0, 0.0), eval);
        let c = builder.vertex(UvPoint::new(0.0, 1.0), eval);
        let again = builder.vertex(UvPoint::new(1.0, 0.0), |_| panic!("re-evaluated"));
        assert_eq!(b, again);
        builder.triangle([a, b, c]);
        builder.triangle([a, a, c]);
        let mesh = builder.finish();
        assert_eq!(mesh.vertex_count(), 3);
        assert_eq!(mesh.triangle_count(), 1);
        assert!(mesh.normals.is_none());
        assert_eq!(mesh.uvs_flat().unwrap(), vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0]);
        mesh.validate().unwrap();
    }

    #[test]
    fn validate_rejects_bad_index() {
        let mesh = TrimMesh::new(vec![[0.0; 3]; 3], vec![0, 1, 3]);
        assert!(mesh.validate().is_err());
    }
}
