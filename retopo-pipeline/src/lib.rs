//! End-to-end mesh simplification pipeline
//!
//! Given a mesh-node tree and a global face budget, this crate flattens
//! the tree to its geometry-bearing leaves, allocates each leaf a
//! count-proportional share of the budget, runs the per-leaf pipeline
//! (cleanup, topology, curvature, importance weights, decimation), and
//! reassembles an equivalent hierarchy around the simplified leaves.
//!
//! Hosts with a render loop can drive [`SimplifyJob`] one leaf at a time;
//! [`simplify_hierarchy`] is the one-call form.

pub mod allocator;
pub mod job;
pub mod report;

pub use allocator::*;
pub use job::*;
pub use report::*;

use retopo_core::{MeshNode, Result};

/// Simplify a whole mesh hierarchy in one call.
///
/// Returns the rebuilt tree and a summary record; the input tree is never
/// mutated. Validation failures (`EmptyMesh`, `TargetNotReducible`) reject
/// the request before any work with no partial output.
pub fn simplify_hierarchy(
    root: &MeshNode,
    options: &SimplifyOptions,
) -> Result<(MeshNode, SimplifySummary)> {
    SimplifyJob::new(root, options.clone())?.run()
}
