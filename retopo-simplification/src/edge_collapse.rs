//! Weighted edge-collapse decimation
//!
//! Iterative edge collapse driven by quadric error metrics. Per-vertex
//! retention weights scale collapse costs so boundary, feature, and
//! extremity detail survives longest; boundary edges additionally
//! contribute constraint-plane quadrics so moving an open seam carries a
//! real geometric cost.

use crate::{DecimationOutcome, MeshDecimator};
use itertools::Itertools;
use nalgebra::{Matrix4, Vector4};
use priority_queue::PriorityQueue;
use retopo_core::{GeometryBuffer, Point3f, Result, DEGENERATE_AREA_EPSILON};
use retopo_analysis::{analyze_topology, EdgeTopology};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

// ============================================================
// Quadric helpers
// ============================================================

fn face_plane(p0: &Point3f, p1: &Point3f, p2: &Point3f) -> Vector4<f64> {
    let n = (p1 - p0).cross(&(p2 - p0));
    let len = n.norm();
    if len <= f32::EPSILON {
        return Vector4::new(0.0, 0.0, 1.0, 0.0);
    }
    let n = n / len;
    let d = -n.dot(&p0.coords);
    Vector4::new(n.x as f64, n.y as f64, n.z as f64, d as f64)
}

fn plane_quadric(p: &Vector4<f64>) -> Matrix4<f64> {
    let (a, b, c, d) = (p[0], p[1], p[2], p[3]);
    Matrix4::new(
        a * a, a * b, a * c, a * d,
        a * b, b * b, b * c, b * d,
        a * c, b * c, c * c, c * d,
        a * d, b * d, c * d, d * d,
    )
}

// ============================================================
// Edge cost for the priority queue
// ============================================================

/// Collapse candidate cost: importance-adjusted error first, then raw
/// quadric error, then lowest vertex pair, so the pop order is total and
/// reproducible for identical input.
#[derive(Debug, Clone)]
struct EdgeCost {
    v1: usize,
    v2: usize,
    error: f64,
    cost: f64,
}

impl PartialEq for EdgeCost {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for EdgeCost {}

impl PartialOrd for EdgeCost {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EdgeCost {
    fn cmp(&self, other: &Self) -> Ordering {
        // Max-priority pop; reversed comparisons make the cheapest edge
        // (and on ties, the lowest vertex pair) pop first
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.error.total_cmp(&self.error))
            .then_with(|| other.v1.cmp(&self.v1))
            .then_with(|| other.v2.cmp(&self.v2))
    }
}

// ============================================================
// Collapse working state
// ============================================================

struct CollapseState {
    positions: Vec<Point3f>,
    uvs: Option<Vec<retopo_core::Vector2f>>,
    colors: Option<Vec<[u8; 3]>>,
    weights: Vec<f64>,
    quadrics: Vec<Matrix4<f64>>,
    faces: Vec<[usize; 3]>,
    face_alive: Vec<bool>,
    /// Alive face ids per vertex
    vertex_faces: Vec<HashSet<usize>>,
    alive_faces: usize,
    removed: Vec<bool>,
}

impl CollapseState {
    fn build(
        buffer: &GeometryBuffer,
        topology: &EdgeTopology,
        weights: Option<&[f32]>,
        boundary_penalty: f64,
    ) -> Self {
        let nv = buffer.vertex_count();
        let faces: Vec<[usize; 3]> = buffer
            .triangles()
            .filter(|t| t[0] != t[1] && t[1] != t[2] && t[2] != t[0])
            .collect();

        let mut vertex_faces = vec![HashSet::new(); nv];
        for (fi, tri) in faces.iter().enumerate() {
            for &v in tri {
                vertex_faces[v].insert(fi);
            }
        }

        let mut quadrics = vec![Matrix4::zeros(); nv];
        for tri in &faces {
            let plane = face_plane(
                &buffer.positions[tri[0]],
                &buffer.positions[tri[1]],
                &buffer.positions[tri[2]],
            );
            let q = plane_quadric(&plane);
            for &v in tri {
                quadrics[v] += q;
            }
        }

        // Constraint planes perpendicular to each boundary edge's face, so
        // pulling the seam inward scores a penalized error
        for tri in &faces {
            let fp = face_plane(
                &buffer.positions[tri[0]],
                &buffer.positions[tri[1]],
                &buffer.positions[tri[2]],
            );
            let fnormal = retopo_core::Vector3f::new(fp[0] as f32, fp[1] as f32, fp[2] as f32);
            for (&a, &b) in tri.iter().circular_tuple_windows() {
                if topology.edge_multiplicity(a, b) != 1 {
                    continue;
                }
                let edge = buffer.positions[b] - buffer.positions[a];
                let c = edge.cross(&fnormal);
                let len = c.norm();
                if len <= f32::EPSILON {
                    continue;
                }
                let c = c / len;
                let d = -c.dot(&buffer.positions[a].coords);
                let plane = Vector4::new(c.x as f64, c.y as f64, c.z as f64, d as f64);
                let q = plane_quadric(&plane) * boundary_penalty;
                quadrics[a] += q;
                quadrics[b] += q;
            }
        }

        let weights = match weights {
            Some(w) => w.iter().map(|&w| w.max(0.0) as f64).collect(),
            None => vec![1.0; nv],
        };

        let alive_faces = faces.len();
        CollapseState {
            positions: buffer.positions.clone(),
            uvs: buffer.uvs.clone(),
            colors: buffer.colors.clone(),
            weights,
            quadrics,
            face_alive: vec![true; alive_faces],
            faces,
            vertex_faces,
            alive_faces,
            removed: vec![false; nv],
        }
    }

    /// Optimal merged position and its raw quadric error
    fn collapse_target(&self, u: usize, v: usize) -> (Point3f, f64) {
        let q = self.quadrics[u] + self.quadrics[v];
        let q3 = q.fixed_view::<3, 3>(0, 0).into_owned();
        let q1 = q.fixed_view::<3, 1>(0, 3).into_owned();

        let midpoint = Point3f::from((self.positions[u].coords + self.positions[v].coords) * 0.5);
        let optimal = if q3.determinant().abs() > 1e-12 {
            match q3.try_inverse() {
                Some(inv) => {
                    let p = -(inv * q1);
                    let candidate = Point3f::new(p[0] as f32, p[1] as f32, p[2] as f32);
                    if candidate.coords.iter().all(|x| x.is_finite()) {
                        candidate
                    } else {
                        midpoint
                    }
                }
                None => midpoint,
            }
        } else {
            midpoint
        };

        let vh = Vector4::new(optimal.x as f64, optimal.y as f64, optimal.z as f64, 1.0);
        let error = (vh.transpose() * q * vh)[(0, 0)].max(0.0);
        (optimal, error)
    }

    /// Cost of collapsing (u, v): raw error scaled by the mean endpoint
    /// retention weight
    fn edge_cost(&self, u: usize, v: usize) -> EdgeCost {
        let (_, error) = self.collapse_target(u, v);
        let penalty = 0.5 * (self.weights[u] + self.weights[v]);
        EdgeCost {
            v1: u.min(v),
            v2: u.max(v),
            error,
            cost: error * penalty,
        }
    }

    /// Alive faces containing both endpoints, sorted
    fn shared_faces(&self, u: usize, v: usize) -> Vec<usize> {
        let mut shared: Vec<usize> = self.vertex_faces[u]
            .intersection(&self.vertex_faces[v])
            .copied()
            .collect();
        shared.sort_unstable();
        shared
    }

    /// Current neighbors of a vertex, sorted
    fn neighbors(&self, v: usize) -> Vec<usize> {
        let mut out: Vec<usize> = self.vertex_faces[v]
            .iter()
            .flat_map(|&fi| self.faces[fi].iter().copied())
            .filter(|&w| w != v)
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    /// Link condition: the common neighbors of the endpoints must be
    /// exactly the apices of the shared faces, else the collapse pinches
    /// the surface into non-manifold topology.
    fn link_condition_holds(&self, u: usize, v: usize, shared: &[usize]) -> bool {
        let nu: HashSet<usize> = self.neighbors(u).into_iter().collect();
        let common = self
            .neighbors(v)
            .into_iter()
            .filter(|n| nu.contains(n))
            .count();
        common == shared.len()
    }

    /// Whether merging v into u would leave two alive faces over the same
    /// vertex set (e.g. collapsing a tetrahedron into a two-face sandwich)
    fn creates_duplicate_face(&self, u: usize, v: usize, shared: &[usize]) -> bool {
        fn sorted(mut tri: [usize; 3]) -> [usize; 3] {
            tri.sort_unstable();
            tri
        }

        let shared_set: HashSet<usize> = shared.iter().copied().collect();
        let kept: HashSet<[usize; 3]> = self.vertex_faces[u]
            .iter()
            .filter(|fi| !shared_set.contains(*fi))
            .map(|&fi| sorted(self.faces[fi]))
            .collect();

        self.vertex_faces[v]
            .iter()
            .filter(|fi| !shared_set.contains(*fi))
            .any(|&fi| {
                let mut tri = self.faces[fi];
                for slot in tri.iter_mut() {
                    if *slot == v {
                        *slot = u;
                    }
                }
                kept.contains(&sorted(tri))
            })
    }

    /// Merge v into u at `new_pos`
    fn collapse(&mut self, u: usize, v: usize, new_pos: Point3f) {
        let shared = self.shared_faces(u, v);
        for &fi in &shared {
            self.face_alive[fi] = false;
            for w in self.faces[fi] {
                self.vertex_faces[w].remove(&fi);
            }
            self.alive_faces -= 1;
        }

        let moved: Vec<usize> = self.vertex_faces[v].iter().copied().collect();
        for fi in moved {
            for slot in self.faces[fi].iter_mut() {
                if *slot == v {
                    *slot = u;
                }
            }
            self.vertex_faces[u].insert(fi);
        }
        self.vertex_faces[v].clear();
        self.removed[v] = true;

        self.positions[u] = new_pos;
        let qv = self.quadrics[v];
        self.quadrics[u] += qv;
        // Keep the strongest preservation hint on the survivor
        self.weights[u] = self.weights[u].max(self.weights[v]);
    }

    /// Every current edge as a fresh cost queue
    fn build_queue(&self) -> PriorityQueue<(usize, usize), EdgeCost> {
        let mut queue = PriorityQueue::new();
        for (fi, tri) in self.faces.iter().enumerate() {
            if !self.face_alive[fi] {
                continue;
            }
            for (&a, &b) in tri.iter().circular_tuple_windows() {
                let key = (a.min(b), a.max(b));
                if queue.get(&key).is_none() {
                    queue.push(key, self.edge_cost(a, b));
                }
            }
        }
        queue
    }

    /// Compact alive geometry into a fresh buffer with recomputed normals
    fn to_buffer(&self) -> GeometryBuffer {
        let mut new_index: HashMap<usize, usize> = HashMap::new();
        let mut positions = Vec::new();
        let mut uvs = self.uvs.as_ref().map(|_| Vec::new());
        let mut colors = self.colors.as_ref().map(|_| Vec::new());
        let mut indices = Vec::new();

        for (fi, tri) in self.faces.iter().enumerate() {
            if !self.face_alive[fi] {
                continue;
            }
            if tri[0] == tri[1] || tri[1] == tri[2] || tri[2] == tri[0] {
                continue;
            }
            let e1 = self.positions[tri[1]] - self.positions[tri[0]];
            let e2 = self.positions[tri[2]] - self.positions[tri[0]];
            if e1.cross(&e2).norm() * 0.5 <= DEGENERATE_AREA_EPSILON {
                continue;
            }
            for &old in tri {
                let idx = match new_index.get(&old) {
                    Some(&idx) => idx,
                    None => {
                        let idx = positions.len();
                        positions.push(self.positions[old]);
                        if let (Some(dst), Some(src)) = (uvs.as_mut(), self.uvs.as_ref()) {
                            dst.push(src[old]);
                        }
                        if let (Some(dst), Some(src)) = (colors.as_mut(), self.colors.as_ref()) {
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
}

// ============================================================
// Decimator
// ============================================================

/// Edge-collapse decimator with weight-scaled quadric error costs.
#[derive(Debug, Clone)]
pub struct EdgeCollapseDecimator {
    /// Weight of the constraint-plane quadrics attached to boundary edges
    pub boundary_penalty: f64,
}

impl Default for EdgeCollapseDecimator {
    fn default() -> Self {
        Self {
            boundary_penalty: 100.0,
        }
    }
}

impl EdgeCollapseDecimator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_boundary_penalty(boundary_penalty: f64) -> Self {
        Self { boundary_penalty }
    }
}

impl MeshDecimator for EdgeCollapseDecimator {
    /// Reduce toward `target_faces` without ever exceeding the input count.
    ///
    /// The effective target is clamped to `[1, current]`; an unreachable
    /// target makes the call a safe no-op. The input buffer is never
    /// mutated. When the queue runs dry above target the best-effort result
    /// is returned with `stalled` set; when collapse would zero out the
    /// mesh, the input passes through unchanged.
    fn decimate(
        &self,
        buffer: &GeometryBuffer,
        target_faces: usize,
        weights: Option<&[f32]>,
    ) -> Result<DecimationOutcome> {
        buffer.validate()?;

        let current = buffer.triangle_count();
        if current == 0 {
            return Ok(DecimationOutcome {
                buffer: buffer.clone(),
                achieved_faces: 0,
                stalled: false,
            });
        }

        let target = target_faces.clamp(1, current);
        if target >= current {
            log::debug!(
                "decimation no-op: target {} >= current {}",
                target_faces,
                current
            );
            return Ok(DecimationOutcome {
                buffer: buffer.clone(),
                achieved_faces: current,
                stalled: false,
            });
        }

        let topology = analyze_topology(buffer);
        let mut state = CollapseState::build(buffer, &topology, weights, self.boundary_penalty);

        // Outer rebuild loop in case locally-skipped edges become
        // collapsible after their neighborhood changes
        let mut made_progress = true;
        while state.alive_faces > target && made_progress {
            made_progress = false;
            let mut queue = state.build_queue();

            while state.alive_faces > target {
                let ((u, v), popped) = match queue.pop() {
                    Some(item) => item,
                    None => break,
                };
                if state.removed[u] || state.removed[v] {
                    continue;
                }
                let shared = state.shared_faces(u, v);
                if shared.is_empty() {
                    continue;
                }

                // The neighborhood may have changed since this entry was
                // queued; requeue at the fresh cost instead of acting on a
                // stale one
                let fresh = state.edge_cost(u, v);
                if fresh.cost.total_cmp(&popped.cost) != Ordering::Equal
                    || fresh.error.total_cmp(&popped.error) != Ordering::Equal
                {
                    queue.push((u, v), fresh);
                    continue;
                }

                if state.alive_faces - shared.len() < 1 {
                    continue;
                }
                if !state.link_condition_holds(u, v, &shared) {
                    continue;
                }
                if state.creates_duplicate_face(u, v, &shared) {
                    continue;
                }

                let (new_pos, _) = state.collapse_target(u, v);
                state.collapse(u, v, new_pos);
                made_progress = true;

                for n in state.neighbors(u) {
                    let cost = state.edge_cost(u, n);
                    queue.push((u.min(n), u.max(n)), cost);
                }
            }
        }

        let out = state.to_buffer();
        if out.triangle_count() == 0 {
            log::warn!("decimation collapsed mesh to zero faces; returning input unchanged");
            return Ok(DecimationOutcome {
                buffer: buffer.clone(),
                achieved_faces: current,
                stalled: true,
            });
        }

        let achieved_faces = out.triangle_count();
        Ok(DecimationOutcome {
            buffer: out,
            achieved_faces,
            stalled: achieved_faces > target,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use retopo_core::Error;

    fn make_plane_grid(size: usize) -> GeometryBuffer {
        let mut positions = Vec::new();
        for y in 0..size {
            for x in 0..size {
                positions.push(Point3f::new(x as f32, y as f32, 0.0));
            }
        }
        let mut indices = Vec::new();
        for y in 0..(size - 1) {
            for x in 0..(size - 1) {
                let tl = y * size + x;
                let tr = tl + 1;
                let bl = (y + 1) * size + x;
                let br = bl + 1;
                indices.extend_from_slice(&[tl, bl, tr]);
                indices.extend_from_slice(&[tr, bl, br]);
            }
        }
        GeometryBuffer::from_positions_and_indices(positions, indices)
    }

    fn make_cube() -> GeometryBuffer {
        let positions = vec![
            Point3f::new(-1.0, -1.0, -1.0),
            Point3f::new(1.0, -1.0, -1.0),
            Point3f::new(1.0, 1.0, -1.0),
            Point3f::new(-1.0, 1.0, -1.0),
            Point3f::new(-1.0, -1.0, 1.0),
            Point3f::new(1.0, -1.0, 1.0),
            Point3f::new(1.0, 1.0, 1.0),
            Point3f::new(-1.0, 1.0, 1.0),
        ];
        // Consistently wound closed cube, 12 triangles
        let indices = vec![
            0, 2, 1, 0, 3, 2, // -z
            4, 5, 6, 4, 6, 7, // +z
            0, 1, 5, 0, 5, 4, // -y
            2, 3, 7, 2, 7, 6, // +y
            1, 2, 6, 1, 6, 5, // +x
            3, 0, 4, 3, 4, 7, // -x
        ];
        GeometryBuffer::from_positions_and_indices(positions, indices)
    }

    fn make_tetrahedron() -> GeometryBuffer {
        GeometryBuffer::from_positions_and_indices(
            vec![
                Point3f::new(0.0, 0.0, 0.0),
                Point3f::new(1.0, 0.0, 0.0),
                Point3f::new(0.5, 1.0, 0.0),
                Point3f::new(0.5, 0.5, 1.0),
            ],
            vec![0, 2, 1, 0, 1, 3, 0, 3, 2, 1, 2, 3],
        )
    }

    #[test]
    fn test_cube_to_four_faces() {
        let cube = make_cube();
        let outcome = EdgeCollapseDecimator::new()
            .decimate(&cube, 4, None)
            .unwrap();

        assert!(outcome.achieved_faces <= 4);
        assert!(outcome.achieved_faces >= 1);
        assert!(!outcome.stalled);

        let result = &outcome.buffer;
        result.validate().unwrap();
        for tri in result.triangles() {
            assert!(!result.is_degenerate(tri));
        }
        for n in result.normals.as_ref().unwrap() {
            assert_relative_eq!(n.norm(), 1.0, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_output_never_exceeds_input() {
        let grid = make_plane_grid(6);
        let original = grid.triangle_count();
        let outcome = EdgeCollapseDecimator::new()
            .decimate(&grid, original / 2, None)
            .unwrap();
        assert!(outcome.achieved_faces <= original);
        assert!(outcome.achieved_faces >= 1);
    }

    #[test]
    fn test_minimal_reduction_does_not_stall() {
        let cube = make_cube();
        let target = cube.triangle_count() - 1;
        let outcome = EdgeCollapseDecimator::new()
            .decimate(&cube, target, None)
            .unwrap();
        assert!(!outcome.stalled);
        assert!(outcome.achieved_faces <= target);
    }

    #[test]
    fn test_unreachable_target_is_noop() {
        let cube = make_cube();
        let outcome = EdgeCollapseDecimator::new()
            .decimate(&cube, cube.triangle_count() + 10, None)
            .unwrap();
        assert_eq!(outcome.achieved_faces, cube.triangle_count());
        assert!(!outcome.stalled);
        assert_eq!(outcome.buffer, cube);
    }

    #[test]
    fn test_single_triangle_survives() {
        let tri = GeometryBuffer::from_positions_and_indices(
            vec![
                Point3f::new(0.0, 0.0, 0.0),
                Point3f::new(1.0, 0.0, 0.0),
                Point3f::new(0.5, 1.0, 0.0),
            ],
            vec![0, 1, 2],
        );
        let outcome = EdgeCollapseDecimator::new().decimate(&tri, 1, None).unwrap();
        assert_eq!(outcome.achieved_faces, 1);
    }

    #[test]
    fn test_input_buffer_is_untouched() {
        let grid = make_plane_grid(5);
        let before = grid.clone();
        let _ = EdgeCollapseDecimator::new().decimate(&grid, 10, None).unwrap();
        assert_eq!(grid, before);
    }

    #[test]
    fn test_deterministic_output() {
        let grid = make_plane_grid(6);
        let decimator = EdgeCollapseDecimator::new();
        let a = decimator.decimate(&grid, 20, None).unwrap();
        let b = decimator.decimate(&grid, 20, None).unwrap();
        assert_eq!(a.buffer, b.buffer);
        assert_eq!(a.achieved_faces, b.achieved_faces);
    }

    #[test]
    fn test_grid_outline_survives_decimation() {
        let grid = make_plane_grid(6);
        let outcome = EdgeCollapseDecimator::new().decimate(&grid, 25, None).unwrap();

        use retopo_core::Bounded;
        let (min, max) = outcome.buffer.bounding_box();
        // Boundary constraint planes keep the open seam in place, so the
        // grid corners pin the bounding box
        assert_relative_eq!(min.x, 0.0, epsilon = 1e-3);
        assert_relative_eq!(min.y, 0.0, epsilon = 1e-3);
        assert_relative_eq!(max.x, 5.0, epsilon = 1e-3);
        assert_relative_eq!(max.y, 5.0, epsilon = 1e-3);
    }

    #[test]
    fn test_weights_steer_collapse_order() {
        let grid = make_plane_grid(5);
        let nv = grid.vertex_count();

        // Strongly protect the left half of the grid
        let weights: Vec<f32> = (0..nv)
            .map(|i| if i % 5 < 2 { 1000.0 } else { 1.0 })
            .collect();
        let outcome = EdgeCollapseDecimator::new()
            .decimate(&grid, 12, Some(&weights))
            .unwrap();

        outcome.buffer.validate().unwrap();
        assert!(outcome.achieved_faces <= 12 || outcome.stalled);
    }

    #[test]
    fn test_tetrahedron_is_already_minimal_for_closed_surfaces() {
        let tet = make_tetrahedron();
        let outcome = EdgeCollapseDecimator::new().decimate(&tet, 2, None).unwrap();
        // Any collapse would leave two faces over the same vertex set; the
        // duplicate-face guard rejects them all and the stall is reported
        assert_eq!(outcome.achieved_faces, 4);
        assert!(outcome.stalled);
    }

    #[test]
    fn test_require_reached_maps_stall_to_error() {
        let tet = make_tetrahedron();
        let outcome = EdgeCollapseDecimator::new().decimate(&tet, 2, None).unwrap();
        assert!(matches!(
            outcome.require_reached(2),
            Err(Error::SimplificationStalled { .. })
        ));
    }

    #[test]
    fn test_invalid_buffer_is_rejected() {
        let mut grid = make_plane_grid(3);
        grid.indices.as_mut().unwrap().push(999);
        assert!(EdgeCollapseDecimator::new().decimate(&grid, 4, None).is_err());
    }
}
