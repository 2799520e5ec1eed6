//! Per-vertex importance weighting and feature detection

use crate::topology::EdgeTopology;
use retopo_core::GeometryBuffer;
use std::collections::HashSet;

/// Multiplier applied to boundary vertices
pub const BOUNDARY_WEIGHT: f32 = 3.0;

/// Scale of the distance-from-origin term, a proxy for extremity on meshes
/// roughly centered at the origin
pub const EXTREMITY_FACTOR: f32 = 0.1;

/// Extra multiplier for detected feature vertices when feature
/// preservation is requested
pub const FEATURE_WEIGHT: f32 = 2.0;

/// Retention weights and the detected feature vertex set for one buffer.
///
/// Both arrays are parallel to the buffer's vertices and are stale after
/// any vertex-count-changing operation.
#[derive(Debug, Clone)]
pub struct VertexImportance {
    pub weights: Vec<f32>,
    pub feature_vertices: HashSet<usize>,
}

/// Classify feature vertices: curvature above mean plus one population
/// standard deviation.
pub fn detect_features(curvature: &[f32]) -> HashSet<usize> {
    if curvature.is_empty() {
        return HashSet::new();
    }
    let n = curvature.len() as f32;
    let mean = curvature.iter().sum::<f32>() / n;
    let variance = curvature.iter().map(|c| (c - mean).powi(2)).sum::<f32>() / n;
    let threshold = mean + variance.sqrt();

    curvature
        .iter()
        .enumerate()
        .filter(|&(_, &c)| c > threshold)
        .map(|(i, _)| i)
        .collect()
}

/// Combine boundary classification, curvature, and extremity into
/// per-vertex retention weights.
///
/// base 1.0, x3.0 on the boundary, x(1 + 0.1 * distance from origin). With
/// `preserve_features` off the detected feature set is reported but does
/// not enter the formula; with it on, feature vertices get an extra x2.0.
pub fn importance_weights(
    buffer: &GeometryBuffer,
    topology: &EdgeTopology,
    curvature: &[f32],
    preserve_features: bool,
) -> VertexImportance {
    let feature_vertices = detect_features(curvature);

    let weights = buffer
        .positions
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let mut weight = 1.0f32;
            if topology.is_boundary(i) {
                weight *= BOUNDARY_WEIGHT;
            }
            weight *= 1.0 + p.coords.norm() * EXTREMITY_FACTOR;
            if preserve_features && feature_vertices.contains(&i) {
                weight *= FEATURE_WEIGHT;
            }
            weight
        })
        .collect();

    VertexImportance {
        weights,
        feature_vertices,
    }
}
