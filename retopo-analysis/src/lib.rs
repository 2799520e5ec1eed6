//! Mesh analysis for the retopo pipeline
//!
//! This crate derives per-vertex signals from a geometry buffer that the
//! decimator consumes as soft preservation hints:
//! - Edge multiplicity and boundary classification
//! - A shared vertex adjacency index
//! - Normal-based curvature estimation
//! - Importance weighting and feature detection

pub mod adjacency;
pub mod curvature;
pub mod topology;
pub mod weights;

pub use adjacency::*;
pub use curvature::*;
pub use topology::*;
pub use weights::*;
