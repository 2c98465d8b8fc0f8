//! Rigid (odometry-style) relative-pose residual

use nalgebra::{Matrix3, Vector3};

use super::{heading_error, relative_diff};
use crate::autodiff::Real;
use crate::se2;

/// Residual penalizing deviation between a measured relative pose and the
/// relative pose implied by two estimates, with no robust damping.
///
/// Given measurement `(dx, dy, dθ)` and poses `P1`, `P2`, the error is
///
/// ```text
/// diff = T(dx,dy,dθ)⁻¹ · (T(P1)⁻¹ · T(P2))
/// e    = (diff.x, diff.y, asin(diff[1,0]))
/// ```
///
/// which is zero exactly when the estimates reproduce the measurement. Used
/// for every odometry edge, and for closure/bogus edges when DCS is disabled.
#[derive(Debug, Clone)]
pub struct RigidFactor {
    measurement: Vector3<f64>,
    /// Measured relative transform, built once at construction
    measured: Matrix3<f64>,
}

impl RigidFactor {
    /// Create the factor from the edge's measured relative pose.
    pub fn new(dx: f64, dy: f64, dtheta: f64) -> Self {
        Self {
            measurement: Vector3::new(dx, dy, dtheta),
            measured: se2::pose_matrix(dx, dy, dtheta),
        }
    }

    /// The measured relative pose `(dx, dy, dθ)` this factor was built from.
    pub fn measurement(&self) -> &Vector3<f64> {
        &self.measurement
    }

    /// Evaluate the 3-vector error. Pure in its arguments; safe to call
    /// concurrently across edges.
    pub fn residual<T: Real>(&self, pose_a: &Vector3<T>, pose_b: &Vector3<T>) -> Vector3<T> {
        let diff = relative_diff(&self.measured, pose_a, pose_b);
        Vector3::new(diff[(0, 2)], diff[(1, 2)], heading_error(&diff))
    }
}
