//! Vertex adjacency index
//!
//! Built once per buffer in O(triangles) and shared by the curvature
//! estimator and any other per-vertex neighborhood scan, instead of
//! rescanning the full triangle list for every vertex.

use itertools::Itertools;
use retopo_core::GeometryBuffer;

/// Per-vertex neighbor lists, sorted and deduplicated.
#[derive(Debug, Clone)]
pub struct VertexAdjacency {
    neighbors: Vec<Vec<usize>>,
}

impl VertexAdjacency {
    /// Build the index from a buffer's triangle list
    pub fn build(buffer: &GeometryBuffer) -> Self {
        let mut neighbors = vec![Vec::new(); buffer.vertex_count()];

        for tri in buffer.triangles() {
            for (&a, &b) in tri.iter().circular_tuple_windows() {
                neighbors[a].push(b);
                neighbors[b].push(a);
            }
        }

        for list in &mut neighbors {
            list.sort_unstable();
            list.dedup();
        }

        Self { neighbors }
    }

    /// Neighbors of a vertex, in ascending index order
    pub fn neighbors(&self, vertex: usize) -> &[usize] {
        &self.neighbors[vertex]
    }

    /// Number of vertices covered by the index
    pub fn vertex_count(&self) -> usize {
        self.neighbors.len()
    }
}
