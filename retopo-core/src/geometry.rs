//! Geometry buffer data structures and functionality

use crate::error::{Error, Result};
use crate::point::*;
use serde::{Deserialize, Serialize};

/// Triangles with an area at or below this threshold are degenerate.
pub const DEGENERATE_AREA_EPSILON: f32 = 1e-6;

/// A flat vertex/triangle buffer shared by every pipeline stage.
///
/// Positions are mandatory; all other attributes are optional and, when
/// present, run parallel to the position array. The triangle index list is
/// optional: an unindexed buffer is read as consecutive position triples.
/// Vertex indices are stable only within one buffer instance; any derived
/// data (weights, curvature) is stale after vertices are merged or
/// triangles are dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeometryBuffer {
    pub positions: Vec<Point3f>,
    pub normals: Option<Vec<Vector3f>>,
    pub uvs: Option<Vec<Vector2f>>,
    pub colors: Option<Vec<[u8; 3]>>,
    pub skin_indices: Option<Vec<[u16; 4]>>,
    pub skin_weights: Option<Vec<[f32; 4]>>,
    pub indices: Option<Vec<usize>>,
}

impl GeometryBuffer {
    /// Create a new empty buffer
    pub fn new() -> Self {
        Self {
            positions: Vec::new(),
            normals: None,
            uvs: None,
            colors: None,
            skin_indices: None,
            skin_weights: None,
            indices: None,
        }
    }

    /// Create an unindexed buffer from positions
    pub fn from_positions(positions: Vec<Point3f>) -> Self {
        Self {
            positions,
            ..Self::new()
        }
    }

    /// Create an indexed buffer from positions and a triangle index list
    pub fn from_positions_and_indices(positions: Vec<Point3f>, indices: Vec<usize>) -> Self {
        Self {
            positions,
            indices: Some(indices),
            ..Self::new()
        }
    }

    /// Get the number of vertices
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Get the number of triangles
    pub fn triangle_count(&self) -> usize {
        match &self.indices {
            Some(indices) => indices.len() / 3,
            None => self.positions.len() / 3,
        }
    }

    /// Check if the buffer holds no renderable geometry
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty() || self.triangle_count() == 0
    }

    /// Get the vertex indices of triangle `i`.
    ///
    /// Unindexed buffers yield sequential triples, so the two storage forms
    /// read identically.
    pub fn triangle(&self, i: usize) -> [usize; 3] {
        match &self.indices {
            Some(indices) => [indices[3 * i], indices[3 * i + 1], indices[3 * i + 2]],
            None => [3 * i, 3 * i + 1, 3 * i + 2],
        }
    }

    /// Iterate over all triangles as index triples
    pub fn triangles(&self) -> impl Iterator<Item = [usize; 3]> + '_ {
        (0..self.triangle_count()).map(move |i| self.triangle(i))
    }

    /// Geometric area of a triangle given its vertex indices
    pub fn triangle_area(&self, tri: [usize; 3]) -> f32 {
        let e1 = self.positions[tri[1]] - self.positions[tri[0]];
        let e2 = self.positions[tri[2]] - self.positions[tri[0]];
        e1.cross(&e2).norm() * 0.5
    }

    /// Whether a triangle is degenerate (repeated indices or near-zero area)
    pub fn is_degenerate(&self, tri: [usize; 3]) -> bool {
        tri[0] == tri[1]
            || tri[1] == tri[2]
            || tri[2] == tri[0]
            || self.triangle_area(tri) <= DEGENERATE_AREA_EPSILON
    }

    /// Compute area-weighted vertex normals from the current topology.
    ///
    /// The unnormalized face cross product carries twice the face area, so
    /// accumulating it before normalizing weights each face by its area.
    /// Isolated vertices fall back to +Z.
    pub fn computed_vertex_normals(&self) -> Vec<Vector3f> {
        let mut accum = vec![Vector3f::zeros(); self.vertex_count()];
        for [i0, i1, i2] in self.triangles() {
            let v0 = self.positions[i0];
            let e1 = self.positions[i1] - v0;
            let e2 = self.positions[i2] - v0;
            let n = e1.cross(&e2);
            accum[i0] += n;
            accum[i1] += n;
            accum[i2] += n;
        }
        accum
            .into_iter()
            .map(|n| {
                let len = n.norm();
                if len > f32::EPSILON {
                    n / len
                } else {
                    Vector3f::new(0.0, 0.0, 1.0)
                }
            })
            .collect()
    }

    /// Set vertex normals; ignored if the length does not match
    pub fn set_normals(&mut self, normals: Vec<Vector3f>) {
        if normals.len() == self.positions.len() {
            self.normals = Some(normals);
        }
    }

    /// Set texture coordinates; ignored if the length does not match
    pub fn set_uvs(&mut self, uvs: Vec<Vector2f>) {
        if uvs.len() == self.positions.len() {
            self.uvs = Some(uvs);
        }
    }

    /// Set vertex colors; ignored if the length does not match
    pub fn set_colors(&mut self, colors: Vec<[u8; 3]>) {
        if colors.len() == self.positions.len() {
            self.colors = Some(colors);
        }
    }

    /// Check the buffer's structural invariants.
    ///
    /// An indexed buffer must have an index list length divisible by three
    /// with every index in range; an unindexed buffer must hold a whole
    /// number of position triples. Attribute arrays, when present, must
    /// parallel the position array.
    pub fn validate(&self) -> Result<()> {
        match &self.indices {
            Some(indices) => {
                if indices.len() % 3 != 0 {
                    return Err(Error::InvalidGeometry(format!(
                        "index list length {} is not a multiple of three",
                        indices.len()
                    )));
                }
                if let Some(&bad) = indices.iter().find(|&&i| i >= self.positions.len()) {
                    return Err(Error::InvalidGeometry(format!(
                        "triangle index {} out of range for {} vertices",
                        bad,
                        self.positions.len()
                    )));
                }
            }
            None => {
                if self.positions.len() % 3 != 0 {
                    return Err(Error::InvalidGeometry(format!(
                        "unindexed buffer holds {} positions, not a multiple of three",
                        self.positions.len()
                    )));
                }
            }
        }

        let nv = self.positions.len();
        Self::check_attribute_len("normal", self.normals.as_ref().map(Vec::len), nv)?;
        Self::check_attribute_len("uv", self.uvs.as_ref().map(Vec::len), nv)?;
        Self::check_attribute_len("color", self.colors.as_ref().map(Vec::len), nv)?;
        Self::check_attribute_len("skin index", self.skin_indices.as_ref().map(Vec::len), nv)?;
        Self::check_attribute_len("skin weight", self.skin_weights.as_ref().map(Vec::len), nv)?;
        Ok(())
    }

    fn check_attribute_len(name: &str, len: Option<usize>, nv: usize) -> Result<()> {
        match len {
            Some(len) if len != nv => Err(Error::InvalidGeometry(format!(
                "{} attribute has {} entries for {} vertices",
                name, len, nv
            ))),
            _ => Ok(()),
        }
    }

    /// Positions as a flat `[x, y, z, ...]` slice for renderer/exporter interop
    pub fn positions_flat(&self) -> &[f32] {
        bytemuck::cast_slice(&self.positions)
    }

    /// Normals as a flat `[x, y, z, ...]` slice, if present
    pub fn normals_flat(&self) -> Option<&[f32]> {
        self.normals.as_deref().map(|n| bytemuck::cast_slice(n))
    }

    /// Texture coordinates as a flat `[u, v, ...]` slice, if present
    pub fn uvs_flat(&self) -> Option<&[f32]> {
        self.uvs.as_deref().map(|uv| bytemuck::cast_slice(uv))
    }
}

impl Default for GeometryBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit_triangle() -> GeometryBuffer {
        GeometryBuffer::from_positions_and_indices(
            vec![
                Point3f::new(0.0, 0.0, 0.0),
                Point3f::new(1.0, 0.0, 0.0),
                Point3f::new(0.0, 1.0, 0.0),
            ],
            vec![0, 1, 2],
        )
    }

    #[test]
    fn test_triangle_count_indexed_and_unindexed() {
        let indexed = unit_triangle();
        assert_eq!(indexed.triangle_count(), 1);
        assert_eq!(indexed.triangle(0), [0, 1, 2]);

        let unindexed = GeometryBuffer::from_positions(vec![
            Point3f::new(0.0, 0.0, 0.0),
            Point3f::new(1.0, 0.0, 0.0),
            Point3f::new(0.0, 1.0, 0.0),
        ]);
        assert_eq!(unindexed.triangle_count(), 1);
        assert_eq!(unindexed.triangle(0), [0, 1, 2]);
    }

    #[test]
    fn test_triangle_area() {
        let buffer = unit_triangle();
        assert_relative_eq!(buffer.triangle_area([0, 1, 2]), 0.5, epsilon = 1e-6);
    }

    #[test]
    fn test_degenerate_detection() {
        let mut buffer = unit_triangle();
        assert!(!buffer.is_degenerate([0, 1, 2]));
        assert!(buffer.is_degenerate([0, 0, 2]));

        // Collinear points span no area
        buffer.positions[2] = Point3f::new(2.0, 0.0, 0.0);
        assert!(buffer.is_degenerate([0, 1, 2]));
    }

    #[test]
    fn test_validate_rejects_ragged_index_list() {
        let mut buffer = unit_triangle();
        buffer.indices = Some(vec![0, 1]);
        assert!(buffer.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_out_of_range_index() {
        let mut buffer = unit_triangle();
        buffer.indices = Some(vec![0, 1, 7]);
        assert!(buffer.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_mismatched_attribute() {
        let mut buffer = unit_triangle();
        buffer.normals = Some(vec![Vector3f::new(0.0, 0.0, 1.0)]);
        assert!(buffer.validate().is_err());
    }

    #[test]
    fn test_computed_normals_are_unit_length() {
        let buffer = unit_triangle();
        let normals = buffer.computed_vertex_normals();
        assert_eq!(normals.len(), 3);
        for n in &normals {
            assert_relative_eq!(n.norm(), 1.0, epsilon = 1e-5);
            assert_relative_eq!(n.z, 1.0, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_flat_views() {
        let buffer = unit_triangle();
        let flat = buffer.positions_flat();
        assert_eq!(flat.len(), 9);
        assert_eq!(flat[3], 1.0);
        assert!(buffer.normals_flat().is_none());
    }
}
