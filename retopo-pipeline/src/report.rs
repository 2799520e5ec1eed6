//! Simplification summary reporting

use serde::{Deserialize, Serialize};

/// Per-leaf outcome of one simplification run.
///
/// `stalled` covers every leaf that did not reach its target, including
/// leaves passed through unchanged after a recovered processing error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeafReport {
    pub name: String,
    pub path: Vec<usize>,
    pub original_faces: usize,
    pub target_faces: usize,
    pub achieved_faces: usize,
    pub stalled: bool,
}

/// Whole-run summary handed back to the caller next to the rebuilt tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimplifySummary {
    pub original_faces: usize,
    pub achieved_faces: usize,
    pub percent_of_original: f32,
    pub leaves: Vec<LeafReport>,
}

impl SimplifySummary {
    pub(crate) fn from_leaves(leaves: Vec<LeafReport>) -> Self {
        let original_faces: usize = leaves.iter().map(|l| l.original_faces).sum();
        let achieved_faces: usize = leaves.iter().map(|l| l.achieved_faces).sum();
        let percent_of_original = if original_faces > 0 {
            achieved_faces as f32 / original_faces as f32 * 100.0
        } else {
            0.0
        };
        Self {
            original_faces,
            achieved_faces,
            percent_of_original,
            leaves,
        }
    }

    /// Whether any leaf fell short of its target
    pub fn any_stalled(&self) -> bool {
        self.leaves.iter().any(|l| l.stalled)
    }
}
