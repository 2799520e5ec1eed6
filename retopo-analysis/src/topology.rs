//! Edge multiplicity and boundary classification

use itertools::Itertools;
use retopo_core::GeometryBuffer;
use std::collections::{HashMap, HashSet};

/// Edge-adjacency counts and boundary classification for one buffer.
///
/// Edges are keyed canonically as `(min, max)`. An edge touched by exactly
/// one triangle is a boundary edge; every vertex on a boundary edge is a
/// boundary vertex.
#[derive(Debug, Clone, Default)]
pub struct EdgeTopology {
    pub edge_counts: HashMap<(usize, usize), usize>,
    pub boundary_vertices: HashSet<usize>,
}

impl EdgeTopology {
    /// Whether the vertex lies on at least one boundary edge
    pub fn is_boundary(&self, vertex: usize) -> bool {
        self.boundary_vertices.contains(&vertex)
    }

    /// Number of triangles sharing the edge, 0 if absent
    pub fn edge_multiplicity(&self, a: usize, b: usize) -> usize {
        self.edge_counts
            .get(&(a.min(b), a.max(b)))
            .copied()
            .unwrap_or(0)
    }

    /// Iterate over all multiplicity-1 edges
    pub fn boundary_edges(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.edge_counts
            .iter()
            .filter(|(_, &count)| count == 1)
            .map(|(&edge, _)| edge)
    }
}

/// Derive edge counts and the boundary vertex set from a geometry buffer.
///
/// Reads the triangle list only; an empty buffer yields an empty result.
pub fn analyze_topology(buffer: &GeometryBuffer) -> EdgeTopology {
    let mut edge_counts: HashMap<(usize, usize), usize> = HashMap::new();

    for tri in buffer.triangles() {
        for (&a, &b) in tri.iter().circular_tuple_windows() {
            let key = (a.min(b), a.max(b));
            *edge_counts.entry(key).or_insert(0) += 1;
        }
    }

    let mut boundary_vertices = HashSet::new();
    for (&(a, b), &count) in &edge_counts {
        if count == 1 {
            boundary_vertices.insert(a);
            boundary_vertices.insert(b);
        }
    }

    EdgeTopology {
        edge_counts,
        boundary_vertices,
    }
}
