//! Error types for the retopo pipeline

use thiserror::Error;

/// Main error type for retopo operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("Target face count {target} must be less than current face count {current}")]
    TargetNotReducible { target: usize, current: usize },

    #[error("No geometry-bearing nodes found under the supplied root")]
    EmptyMesh,

    #[error("Simplification stalled at {achieved} faces (target was {target})")]
    SimplificationStalled { achieved: usize, target: usize },

    #[error("Operation cancelled")]
    Cancelled,
}

/// Result type alias for retopo operations
pub type Result<T> = std::result::Result<T, Error>;
