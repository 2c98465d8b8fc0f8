//! Residual functions bound to single pose-graph edges
//!
//! Each factor is constructed once from an edge's measured relative pose and
//! then evaluated as a pure function of its two endpoint poses. Evaluation is
//! generic over [`Real`] so the external solver can differentiate through it
//! with dual numbers.

use nalgebra::{Matrix3, Vector3};
use thiserror::Error;

use crate::autodiff::Real;
use crate::se2;

pub mod dcs;
pub mod rigid;

pub use dcs::DcsFactor;
pub use rigid::RigidFactor;

/// Errors raised while constructing a factor
#[derive(Debug, Clone, Error)]
pub enum FactorError {
    /// The DCS transition scale must be strictly positive
    #[error("DCS scale must be positive, got {0}")]
    InvalidScale(f64),
}

/// Residual function selected for one edge during problem assembly.
///
/// Enum dispatch keeps the per-edge evaluation generic over the scalar type,
/// which a trait object could not express.
#[derive(Debug, Clone)]
pub enum EdgeFactor {
    Rigid(RigidFactor),
    Dcs(DcsFactor),
}

impl EdgeFactor {
    /// Evaluate the 3-vector error for the current endpoint poses.
    pub fn residual<T: Real>(&self, pose_a: &Vector3<T>, pose_b: &Vector3<T>) -> Vector3<T> {
        match self {
            EdgeFactor::Rigid(factor) => factor.residual(pose_a, pose_b),
            EdgeFactor::Dcs(factor) => factor.residual(pose_a, pose_b),
        }
    }

    /// The robust weight at the given poses: the DCS weight for a DCS factor,
    /// 1.0 for a rigid factor (full, undamped influence).
    pub fn weight(&self, pose_a: &Vector3<f64>, pose_b: &Vector3<f64>) -> f64 {
        match self {
            EdgeFactor::Rigid(_) => 1.0,
            EdgeFactor::Dcs(factor) => factor.weight(pose_a, pose_b),
        }
    }
}

/// Shared geometric core of both residuals:
/// `diff = measured⁻¹ · (T(pose_a)⁻¹ · T(pose_b))`.
///
/// `diff` is the identity transform exactly when the relative pose implied by
/// the two estimates equals the measurement.
pub(crate) fn relative_diff<T: Real>(
    measured: &Matrix3<f64>,
    pose_a: &Vector3<T>,
    pose_b: &Vector3<T>,
) -> Matrix3<T> {
    let world_t_a = se2::pose_matrix(pose_a.x, pose_a.y, pose_a.z);
    let world_t_b = se2::pose_matrix(pose_b.x, pose_b.y, pose_b.z);
    let measured = measured.map(T::from_f64);
    se2::rigid_inverse(&measured) * (se2::rigid_inverse(&world_t_a) * world_t_b)
}

/// Heading component of the residual: `asin` of the (1,0) rotation entry.
///
/// Repeated products of nearly-orthonormal matrices can push the entry a few
/// ulps past ±1, which would turn `asin` into NaN. The argument is clamped
/// strictly inside the domain: at |x| = 1 exactly, `asin'` is infinite and a
/// dual-number evaluation would still produce NaN derivatives.
pub(crate) fn heading_error<T: Real>(diff: &Matrix3<T>) -> T {
    let limit = T::from_f64(1.0 - f64::EPSILON);
    diff[(1, 0)].min(limit).max(-limit).asin()
}
