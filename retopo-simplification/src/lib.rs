//! Mesh cleanup and decimation
//!
//! This crate holds the two mutating stages of the retopo pipeline:
//! - A cleanup pass that merges near-duplicate vertices, drops degenerate
//!   triangles, and recomputes normals
//! - A weighted edge-collapse decimator that reduces triangle count toward
//!   a target while consulting per-vertex retention weights
//!
//! Both stages are pure: the input buffer is never mutated, a new buffer is
//! returned.

pub mod cleanup;
pub mod edge_collapse;

pub use cleanup::*;
pub use edge_collapse::*;

use retopo_core::{Error, GeometryBuffer, Result};

/// Reduce a mesh's triangle count toward a target
pub trait MeshDecimator {
    /// Decimate toward `target_faces`, optionally consulting per-vertex
    /// retention weights as soft preservation hints
    fn decimate(
        &self,
        buffer: &GeometryBuffer,
        target_faces: usize,
        weights: Option<&[f32]>,
    ) -> Result<DecimationOutcome>;
}

/// Result of one decimation run.
///
/// A best-effort result above target is reported with `stalled` set rather
/// than as a hard failure; an unchanged buffer is a valid outcome.
#[derive(Debug, Clone)]
pub struct DecimationOutcome {
    pub buffer: GeometryBuffer,
    pub achieved_faces: usize,
    pub stalled: bool,
}

impl DecimationOutcome {
    /// Convert a stalled best-effort result into a typed failure, for
    /// callers that need the target reached exactly
    pub fn require_reached(self, target_faces: usize) -> Result<GeometryBuffer> {
        if self.stalled {
            Err(Error::SimplificationStalled {
                achieved: self.achieved_faces,
                target: target_faces,
            })
        } else {
            Ok(self.buffer)
        }
    }
}
