//! Chunked, cancellable pipeline driver

use crate::allocator::{plan_budgets, LeafPlan};
use crate::report::{LeafReport, SimplifySummary};
use rayon::prelude::*;
use retopo_analysis::{analyze_topology, importance_weights, vertex_curvature, VertexAdjacency};
use retopo_core::{Error, GeometryBuffer, MeshNode, Result};
use retopo_simplification::{cleanup, DecimationOutcome, EdgeCollapseDecimator, MeshDecimator};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Fallback face budget when the caller supplies none
pub const DEFAULT_TARGET_FACES: usize = 5000;

/// Caller-facing knobs for one simplification request
#[derive(Debug, Clone)]
pub struct SimplifyOptions {
    pub target_faces: usize,
    /// Boost detected feature vertices in the retention weights
    pub preserve_features: bool,
    /// Process leaves in parallel, each on its own cloned buffer
    pub parallel: bool,
}

impl Default for SimplifyOptions {
    fn default() -> Self {
        Self {
            target_faces: DEFAULT_TARGET_FACES,
            preserve_features: false,
            parallel: false,
        }
    }
}

/// Cooperative cancellation flag shared with the host
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Progress of a chunked simplification job
#[derive(Debug)]
pub enum JobProgress {
    /// One leaf processed; more calls needed
    Leaf(LeafReport),
    /// All leaves processed: the rebuilt tree and its summary
    Done(MeshNode, SimplifySummary),
}

/// Run the per-leaf pipeline on one cloned buffer:
/// cleanup -> topology -> curvature -> weights -> decimate
fn simplify_leaf(
    geometry: &GeometryBuffer,
    target_faces: usize,
    preserve_features: bool,
) -> Result<DecimationOutcome> {
    let cleaned = cleanup(geometry);
    let topology = analyze_topology(&cleaned);
    let adjacency = VertexAdjacency::build(&cleaned);
    let curvature = vertex_curvature(&cleaned, &adjacency)?;
    let importance = importance_weights(&cleaned, &topology, &curvature, preserve_features);
    EdgeCollapseDecimator::new().decimate(&cleaned, target_faces, Some(&importance.weights))
}

fn process_leaf(
    root: &MeshNode,
    plan: &LeafPlan,
    options: &SimplifyOptions,
) -> (LeafReport, Option<(Vec<usize>, GeometryBuffer)>) {
    let unchanged_report = |stalled| LeafReport {
        name: plan.name.clone(),
        path: plan.path.clone(),
        original_faces: plan.face_count,
        target_faces: plan.target_faces,
        achieved_faces: plan.face_count,
        stalled,
    };

    let geometry = match root
        .node_at_path(&plan.path)
        .and_then(|node| node.geometry.as_ref())
    {
        Some(geometry) => geometry,
        None => {
            log::warn!("leaf '{}' disappeared from the tree; skipping", plan.name);
            return (unchanged_report(true), None);
        }
    };

    log::info!(
        "processing leaf '{}': {} faces, target {}",
        plan.name,
        plan.face_count,
        plan.target_faces
    );

    match simplify_leaf(geometry, plan.target_faces, options.preserve_features) {
        Ok(outcome) => {
            if outcome.stalled {
                log::warn!(
                    "leaf '{}' stalled at {} faces (target {})",
                    plan.name,
                    outcome.achieved_faces,
                    plan.target_faces
                );
            }
            let report = LeafReport {
                name: plan.name.clone(),
                path: plan.path.clone(),
                original_faces: plan.face_count,
                target_faces: plan.target_faces,
                achieved_faces: outcome.achieved_faces,
                stalled: outcome.stalled,
            };
            (report, Some((plan.path.clone(), outcome.buffer)))
        }
        Err(err) => {
            // Recovered at the leaf boundary: this leaf passes through
            // unchanged, siblings keep processing
            log::warn!(
                "leaf '{}' failed to simplify ({}); passing through unchanged",
                plan.name,
                err
            );
            (unchanged_report(true), None)
        }
    }
}

/// A simplification run that yields between leaves.
///
/// `step()` processes one leaf per call so an interactive host can keep
/// its render loop responsive between quanta; `run()` drains the job in
/// one go, optionally fanning leaves out over rayon. The original tree is
/// never mutated, so cancellation has nothing to roll back.
pub struct SimplifyJob<'a> {
    root: &'a MeshNode,
    options: SimplifyOptions,
    cancel: CancelToken,
    plans: Vec<LeafPlan>,
    next: usize,
    results: Vec<(Vec<usize>, GeometryBuffer)>,
    reports: Vec<LeafReport>,
}

impl<'a> SimplifyJob<'a> {
    /// Validate the request and plan budgets; fails before any leaf work
    /// with no partial output
    pub fn new(root: &'a MeshNode, options: SimplifyOptions) -> Result<Self> {
        let plans = plan_budgets(root, options.target_faces)?;
        Ok(Self {
            root,
            options,
            cancel: CancelToken::new(),
            plans,
            next: 0,
            results: Vec::new(),
            reports: Vec::new(),
        })
    }

    /// Share a cancellation flag with the host
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Leaves not yet processed
    pub fn remaining_leaves(&self) -> usize {
        self.plans.len() - self.next
    }

    /// Process one leaf, or finish the job when none remain
    pub fn step(&mut self) -> Result<JobProgress> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        if self.next < self.plans.len() {
            let plan = &self.plans[self.next];
            let (report, result) = process_leaf(self.root, plan, &self.options);
            self.next += 1;
            if let Some(result) = result {
                self.results.push(result);
            }
            self.reports.push(report.clone());
            return Ok(JobProgress::Leaf(report));
        }

        Ok(JobProgress::Done(
            self.reassemble(),
            SimplifySummary::from_leaves(self.reports.clone()),
        ))
    }

    /// Drain the job to completion
    pub fn run(mut self) -> Result<(MeshNode, SimplifySummary)> {
        if self.options.parallel {
            let root = self.root;
            let options = self.options.clone();
            let cancel = self.cancel.clone();

            let processed: Vec<_> = self.plans[self.next..]
                .par_iter()
                .map(|plan| {
                    if cancel.is_cancelled() {
                        return None;
                    }
                    Some(process_leaf(root, plan, &options))
                })
                .collect();
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            for (report, result) in processed.into_iter().flatten() {
                self.reports.push(report);
                if let Some(result) = result {
                    self.results.push(result);
                }
            }
            self.next = self.plans.len();
            return Ok((
                self.reassemble(),
                SimplifySummary::from_leaves(self.reports.clone()),
            ));
        }

        loop {
            match self.step()? {
                JobProgress::Leaf(_) => {}
                JobProgress::Done(tree, summary) => return Ok((tree, summary)),
            }
        }
    }

    /// Mirror the original parent/child structure, with each processed
    /// leaf's geometry replaced and every transform carried over unchanged
    fn reassemble(&self) -> MeshNode {
        let mut out = self.root.clone();
        for (path, buffer) in &self.results {
            if let Some(node) = out.node_at_path_mut(path) {
                node.geometry = Some(buffer.clone());
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use retopo_core::Point3f;

    fn grid_leaf(size: usize) -> GeometryBuffer {
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

    fn grid_tree() -> MeshNode {
        let mut root = MeshNode::new("root");
        root.add_child(MeshNode::with_geometry("a", grid_leaf(6)));
        root.add_child(MeshNode::with_geometry("b", grid_leaf(4)));
        root
    }

    #[test]
    fn test_stepwise_execution() {
        let root = grid_tree();
        let mut job = SimplifyJob::new(&root, SimplifyOptions {
            target_faces: 30,
            ..Default::default()
        })
        .unwrap();

        assert_eq!(job.remaining_leaves(), 2);
        assert!(matches!(job.step().unwrap(), JobProgress::Leaf(_)));
        assert_eq!(job.remaining_leaves(), 1);
        assert!(matches!(job.step().unwrap(), JobProgress::Leaf(_)));

        match job.step().unwrap() {
            JobProgress::Done(tree, summary) => {
                assert_eq!(summary.leaves.len(), 2);
                assert!(tree.total_triangle_count() < root.total_triangle_count());
            }
            JobProgress::Leaf(_) => panic!("expected the job to finish"),
        }
    }

    #[test]
    fn test_cancellation_stops_the_job() {
        let root = grid_tree();
        let cancel = CancelToken::new();
        let mut job = SimplifyJob::new(&root, SimplifyOptions {
            target_faces: 30,
            ..Default::default()
        })
        .unwrap()
        .with_cancel_token(cancel.clone());

        assert!(matches!(job.step().unwrap(), JobProgress::Leaf(_)));
        cancel.cancel();
        assert!(matches!(job.step(), Err(Error::Cancelled)));
    }

    #[test]
    fn test_default_options_carry_fallback_target() {
        let options = SimplifyOptions::default();
        assert_eq!(options.target_faces, DEFAULT_TARGET_FACES);
        assert!(!options.preserve_features);
        assert!(!options.parallel);
    }
}
