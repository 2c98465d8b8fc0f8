//! Error types for the dcs-pgo library
//!
//! Module-level errors (`FactorError`, `LossError`, `GraphError`, `IoError`)
//! are defined next to the code that raises them; this module provides the
//! top-level error that wraps them for callers that cross module boundaries.
//! All errors use the `thiserror` crate for automatic trait implementations.

use thiserror::Error;

use crate::factors::FactorError;
use crate::graph::GraphError;
use crate::io::IoError;
use crate::loss::LossError;

/// Main result type used throughout the dcs-pgo library
pub type PgoResult<T> = Result<T, PgoError>;

/// Main error type for the dcs-pgo library
#[derive(Debug, Error)]
pub enum PgoError {
    /// Residual-function configuration errors
    #[error("Factor error: {0}")]
    Factor(#[from] FactorError),

    /// Robust loss configuration errors
    #[error("Loss error: {0}")]
    Loss(#[from] LossError),

    /// Pose-graph construction errors
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    /// IO related errors (file loading, parsing, writing)
    #[error("IO error: {0}")]
    Io(#[from] IoError),
}
