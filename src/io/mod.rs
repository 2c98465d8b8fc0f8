//! Reading and writing pose-graph files
//!
//! `g2o` loads the text dataset format into a [`crate::graph::PoseGraph`];
//! `report` writes the node/edge/weight files consumed by the visualization
//! scripts downstream.

use thiserror::Error;

pub mod g2o;
pub mod report;

pub use g2o::G2oLoader;

/// Errors that can occur during graph file parsing or report writing
#[derive(Debug, Error)]
pub enum IoError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid UTF-8 in file: {0}")]
    Encoding(#[from] std::str::Utf8Error),

    #[error("Missing required fields at line {line}")]
    MissingFields { line: usize },

    #[error("Invalid number format at line {line}: {value}")]
    InvalidNumber { line: usize, value: String },

    #[error("Edge at line {line} references undeclared node {id}")]
    UndeclaredNode { line: usize, id: usize },

    #[error("Weight report expected {expected} prior weights, got {actual}")]
    PriorCountMismatch { expected: usize, actual: usize },
}
