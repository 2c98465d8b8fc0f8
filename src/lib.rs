//! Robust 2D pose-graph core with Dynamic Covariance Scaling (DCS).
//!
//! This crate owns the measurement-residual model of a planar pose-graph
//! estimation pipeline: SE(2) transform algebra, rigid and DCS-robust
//! residual functions generic over an automatic-differentiation scalar,
//! and the node/edge data model that assembles them into residual blocks
//! for an external nonlinear least-squares solver.

pub mod autodiff;
pub mod error;
pub mod factors;
pub mod graph;
pub mod io;
pub mod logger;
pub mod loss;
pub mod se2;

pub use error::{PgoError, PgoResult};
pub use logger::{init_logger, init_logger_with_level};
