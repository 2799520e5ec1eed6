//! Core data structures for the retopo mesh decimation pipeline
//!
//! This crate provides the fundamental types shared by every pipeline stage:
//! geometry buffers, the mesh-node scene tree, transforms, and the common
//! error type.

pub mod error;
pub mod geometry;
pub mod node;
pub mod point;
pub mod traits;
pub mod transform;

pub use error::*;
pub use geometry::*;
pub use node::*;
pub use point::*;
pub use traits::*;
pub use transform::*;

/// Re-export commonly used types from nalgebra
pub use nalgebra::{Matrix3, Matrix4, Point3, UnitQuaternion, Vector2, Vector3};
