//! Error types.

use thiserror::Error;

/// Construction-time configuration error.
///
/// Invalid configurations are rejected when a map or localizer is built,
/// never at update time.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Cell resolution must be positive.
    #[error("resolution must be positive, got {0}")]
    InvalidResolution(f64),

    /// Patch edge length must be positive.
    #[error("patch size must be positive, got {0}")]
    InvalidPatchSize(usize),

    /// Distance-map saturation must be positive.
    #[error("max distance must be positive, got {0}")]
    InvalidMaxDistance(f64),

    /// The solver needs at least one iteration.
    #[error("solver iteration cap must be positive")]
    InvalidIterationCap,

    /// Motion gates must be non-negative.
    #[error("motion threshold must be non-negative, got {0}")]
    InvalidThreshold(f64),
}

/// Nonlinear solve failure.
///
/// Non-fatal: a caller keeps its predicted state and may succeed on the
/// next observation.
#[derive(Error, Debug, Clone)]
pub enum SolveError {
    /// The normal equations are singular even after diagonal jitter.
    #[error("normal equations are singular")]
    Degenerate,

    /// The problem produced no residuals to minimize.
    #[error("no residuals to evaluate")]
    Empty,
}
