//! Normal-based curvature estimation

use crate::adjacency::VertexAdjacency;
use retopo_core::{Error, GeometryBuffer, Result};

/// Estimate a per-vertex curvature score from vertex normals.
///
/// `curvature(v)` is the mean of `1 - |normal(v) . normal(n)|` over the
/// neighbors `n` of `v`: flat neighborhoods score 0, sharp creases approach
/// 1. Vertices with no neighbors score 0. Requires computed vertex normals.
pub fn vertex_curvature(
    buffer: &GeometryBuffer,
    adjacency: &VertexAdjacency,
) -> Result<Vec<f32>> {
    let normals = buffer.normals.as_ref().ok_or_else(|| {
        Error::InvalidGeometry("vertex normals are required for curvature estimation".to_string())
    })?;

    let curvatures = (0..buffer.vertex_count())
        .map(|v| {
            let neighbors = adjacency.neighbors(v);
            if neighbors.is_empty() {
                return 0.0;
            }
            let total: f32 = neighbors
                .iter()
                .map(|&n| 1.0 - normals[v].dot(&normals[n]).abs())
                .sum();
            total / neighbors.len() as f32
        })
        .collect();

    Ok(curvatures)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use retopo_core::{Point3f, Vector3f};

    fn flat_quad() -> GeometryBuffer {
        let mut buffer = GeometryBuffer::from_positions_and_indices(
            vec![
                Point3f::new(0.0, 0.0, 0.0),
                Point3f::new(1.0, 0.0, 0.0),
                Point3f::new(1.0, 1.0, 0.0),
                Point3f::new(0.0, 1.0, 0.0),
            ],
            vec![0, 1, 2, 0, 2, 3],
        );
        let normals = buffer.computed_vertex_normals();
        buffer.set_normals(normals);
        buffer
    }

    /// Two triangles folded 90 degrees along a shared edge
    fn folded_quad() -> GeometryBuffer {
        let mut buffer = GeometryBuffer::from_positions_and_indices(
            vec![
                Point3f::new(0.0, 0.0, 0.0),
                Point3f::new(1.0, 0.0, 0.0),
                Point3f::new(1.0, 1.0, 0.0),
                Point3f::new(0.0, 0.0, 1.0),
            ],
            vec![0, 1, 2, 0, 3, 1],
        );
        let normals = buffer.computed_vertex_normals();
        buffer.set_normals(normals);
        buffer
    }

    #[test]
    fn test_flat_surface_has_zero_curvature() {
        let buffer = flat_quad();
        let adjacency = VertexAdjacency::build(&buffer);
        let curvature = vertex_curvature(&buffer, &adjacency).unwrap();
        assert_eq!(curvature.len(), 4);
        for c in curvature {
            assert_relative_eq!(c, 0.0, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_fold_raises_curvature() {
        let buffer = folded_quad();
        let adjacency = VertexAdjacency::build(&buffer);
        let curvature = vertex_curvature(&buffer, &adjacency).unwrap();
        assert!(curvature.iter().any(|&c| c > 0.05));
    }

    #[test]
    fn test_missing_normals_is_invalid_geometry() {
        let buffer = GeometryBuffer::from_positions_and_indices(
            vec![
                Point3f::new(0.0, 0.0, 0.0),
                Point3f::new(1.0, 0.0, 0.0),
                Point3f::new(0.5, 1.0, 0.0),
            ],
            vec![0, 1, 2],
        );
        let adjacency = VertexAdjacency::build(&buffer);
        assert!(matches!(
            vertex_curvature(&buffer, &adjacency),
            Err(Error::InvalidGeometry(_))
        ));
    }

    #[test]
    fn test_isolated_vertex_scores_zero() {
        let mut buffer = GeometryBuffer::from_positions_and_indices(
            vec![
                Point3f::new(0.0, 0.0, 0.0),
                Point3f::new(1.0, 0.0, 0.0),
                Point3f::new(0.5, 1.0, 0.0),
                Point3f::new(5.0, 5.0, 5.0),
            ],
            vec![0, 1, 2],
        );
        buffer.set_normals(vec![Vector3f::new(0.0, 0.0, 1.0); 4]);
        let adjacency = VertexAdjacency::build(&buffer);
        let curvature = vertex_curvature(&buffer, &adjacency).unwrap();
        assert_relative_eq!(curvature[3], 0.0);
    }
}
