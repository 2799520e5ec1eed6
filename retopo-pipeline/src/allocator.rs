//! Hierarchy budget allocation
//!
//! Flattens a mesh tree to its geometry-bearing leaves, validates the
//! global target, scores leaves by density and extremity to fix the
//! processing order, and hands each leaf a count-proportional face budget.

use retopo_core::{
    Bounded, Error, MeshNode, Result, Transformable, Transform3D,
};

/// Floor for bounding-box volume so flat leaves do not divide by zero
pub const MIN_LEAF_VOLUME: f32 = 1e-6;

/// Scale of the extremity term in the leaf priority score
pub const EXTREMITY_SCORE_FACTOR: f32 = 0.5;

/// One leaf's share of the global budget, plus the stats that ordered it.
#[derive(Debug, Clone)]
pub struct LeafPlan {
    pub path: Vec<usize>,
    pub name: String,
    pub face_count: usize,
    pub volume: f32,
    pub density: f32,
    /// Distance of the world-space bounding-box center from the origin
    pub extremity: f32,
    pub target_faces: usize,
    pub world: Transform3D,
}

impl LeafPlan {
    /// Priority score: denser, more extreme leaves are processed first.
    ///
    /// The score fixes processing order only; the face budget itself is
    /// count-proportional.
    pub fn score(&self) -> f32 {
        self.density * (1.0 + self.extremity * EXTREMITY_SCORE_FACTOR)
    }
}

/// Validate the request and compute per-leaf budgets.
///
/// Fails with `EmptyMesh` when the tree bears no geometry and with
/// `TargetNotReducible` when the target does not strictly reduce the
/// total; both happen before any leaf is touched. Each budget is
/// `floor(count * target / total)`, so budgets sum to at most the global
/// target and never exceed the leaf's own count.
pub fn plan_budgets(root: &MeshNode, global_target: usize) -> Result<Vec<LeafPlan>> {
    let leaves = root.geometry_leaves();
    if leaves.is_empty() {
        return Err(Error::EmptyMesh);
    }

    let total: usize = leaves
        .iter()
        .map(|leaf| leaf.geometry.triangle_count())
        .sum();
    if global_target >= total {
        return Err(Error::TargetNotReducible {
            target: global_target,
            current: total,
        });
    }

    let mut plans: Vec<LeafPlan> = leaves
        .iter()
        .map(|leaf| {
            let mut world_geometry = leaf.geometry.clone();
            world_geometry.apply_transform(&leaf.world);
            let (min, max) = world_geometry.bounding_box();
            let size = max - min;

            let face_count = leaf.geometry.triangle_count();
            let volume = (size.x * size.y * size.z).max(MIN_LEAF_VOLUME);
            let density = face_count as f32 / volume;
            let extremity = world_geometry.center().coords.norm();
            let target_faces =
                (face_count as f64 * global_target as f64 / total as f64).floor() as usize;

            LeafPlan {
                path: leaf.path.clone(),
                name: leaf.name.to_string(),
                face_count,
                volume,
                density,
                extremity,
                target_faces,
                world: leaf.world,
            }
        })
        .collect();

    // Stable sort: equal scores keep depth-first tree order
    plans.sort_by(|a, b| b.score().total_cmp(&a.score()));
    Ok(plans)
}
