//! Geometry cleanup
//!
//! Produces a valid, deduplicated buffer: near-duplicate vertices merged,
//! degenerate triangles dropped, unreferenced vertices compacted away,
//! vertex normals recomputed, and skin-binding attributes removed (they
//! reference a vertex topology that no longer matches any bone mapping).
//! The pass is idempotent: running it on its own output changes nothing.

use retopo_core::{GeometryBuffer, Point3f};
use std::collections::HashMap;

/// Vertices closer than this are merged, in mesh units.
pub const MERGE_TOLERANCE: f32 = 0.001;

fn quantize(p: &Point3f) -> (i64, i64, i64) {
    (
        (p.x / MERGE_TOLERANCE).round() as i64,
        (p.y / MERGE_TOLERANCE).round() as i64,
        (p.z / MERGE_TOLERANCE).round() as i64,
    )
}

/// Clean a geometry buffer, returning a new self-consistent buffer.
///
/// Merging snaps vertices onto a tolerance grid; the first vertex scanned
/// in each grid cell is the representative and its attributes win, which
/// keeps the merge deterministic for identical input.
pub fn cleanup(buffer: &GeometryBuffer) -> GeometryBuffer {
    // Map every vertex to the representative of its grid cell
    let mut cell_owner: HashMap<(i64, i64, i64), usize> = HashMap::new();
    let mut merged_of: Vec<usize> = Vec::with_capacity(buffer.vertex_count());
    for (i, p) in buffer.positions.iter().enumerate() {
        let rep = *cell_owner.entry(quantize(p)).or_insert(i);
        merged_of.push(rep);
    }

    // Remap triangles and drop the ones the merge degenerated
    let mut triangles: Vec<[usize; 3]> = Vec::new();
    for tri in buffer.triangles() {
        let mapped = [merged_of[tri[0]], merged_of[tri[1]], merged_of[tri[2]]];
        if !buffer.is_degenerate(mapped) {
            triangles.push(mapped);
        }
    }

    // Compact to referenced vertices only, in first-use order
    let mut new_index: HashMap<usize, usize> = HashMap::new();
    let mut positions = Vec::new();
    let mut uvs = buffer.uvs.as_ref().map(|_| Vec::new());
    let mut colors = buffer.colors.as_ref().map(|_| Vec::new());
    let mut indices = Vec::with_capacity(triangles.len() * 3);

    for tri in &triangles {
        for &old in tri {
            let idx = match new_index.get(&old) {
                Some(&idx) => idx,
                None => {
                    let idx = positions.len();
                    positions.push(buffer.positions[old]);
                    if let (Some(dst), Some(src)) = (uvs.as_mut(), buffer.uvs.as_ref()) {
                        dst.push(src[old]);
                    }
                    if let (Some(dst), Some(src)) = (colors.as_mut(), buffer.colors.as_ref()) {
                        dst.push(src[old]);
                    }
                    new_index.insert(old, idx);
                    idx
                }
            };
            indices.push(idx);
        }
    }

    let mut out = GeometryBuffer {
        positions,
        normals: None,
        uvs,
        colors,
        skin_indices: None,
        skin_weights: None,
        indices: Some(indices),
    };
    let normals = out.computed_vertex_normals();
    out.set_normals(normals);
    out
}
