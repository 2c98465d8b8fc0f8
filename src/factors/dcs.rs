//! Dynamic Covariance Scaling loop-closure residual
//!
//! DCS (Agarwal et al.) continuously down-weights a residual by its own
//! magnitude instead of making a hard inlier/outlier decision. The weight is
//! recomputed from the current pose estimates at every evaluation, so the
//! effective cost surface reshapes itself as the optimizer converges and
//! false loop-closures lose influence.

use nalgebra::{Matrix3, Vector3};

use super::{heading_error, relative_diff, FactorError};
use crate::autodiff::Real;
use crate::se2;

/// Default transition scale between the full-weight and down-weighted regimes.
pub const DEFAULT_SCALE: f64 = 0.5;

/// Robust relative-pose residual for loop-closure (and bogus) edges.
///
/// Identical geometry to [`super::RigidFactor`], then scaled by
///
/// ```text
/// w = min(1, √(2c / (c + eₓ² + e_y²)))
/// ```
///
/// `w = 1` while the squared translation error stays below `c`, and decays
/// monotonically toward 0 as the error grows. The weight is a function of the
/// poses, not a separate optimization variable.
#[derive(Debug, Clone)]
pub struct DcsFactor {
    measurement: Vector3<f64>,
    measured: Matrix3<f64>,
    scale: f64,
}

impl DcsFactor {
    /// Create the factor with the default transition scale.
    pub fn new(dx: f64, dy: f64, dtheta: f64) -> Self {
        Self {
            measurement: Vector3::new(dx, dy, dtheta),
            measured: se2::pose_matrix(dx, dy, dtheta),
            scale: DEFAULT_SCALE,
        }
    }

    /// Create the factor with an explicit transition scale `c`.
    ///
    /// `c` must be strictly positive; this is checked here so that evaluation
    /// can never hit a non-positive square-root argument.
    pub fn with_scale(dx: f64, dy: f64, dtheta: f64, scale: f64) -> Result<Self, FactorError> {
        if scale <= 0.0 {
            return Err(FactorError::InvalidScale(scale));
        }
        let mut factor = Self::new(dx, dy, dtheta);
        factor.scale = scale;
        Ok(factor)
    }

    /// The measured relative pose `(dx, dy, dθ)` this factor was built from.
    pub fn measurement(&self) -> &Vector3<f64> {
        &self.measurement
    }

    /// The transition scale `c`.
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Evaluate the weighted 3-vector error for the current endpoint poses.
    pub fn residual<T: Real>(&self, pose_a: &Vector3<T>, pose_b: &Vector3<T>) -> Vector3<T> {
        let diff = relative_diff(&self.measured, pose_a, pose_b);
        let ex = diff[(0, 2)];
        let ey = diff[(1, 2)];
        let weight = self.dcs_weight(ex * ex + ey * ey);
        Vector3::new(weight * ex, weight * ey, weight * heading_error(&diff))
    }

    /// The DCS weight at the given poses, in (0, 1].
    ///
    /// Exposed separately so reports can pair the weight before optimization
    /// with the weight at the converged poses.
    pub fn weight(&self, pose_a: &Vector3<f64>, pose_b: &Vector3<f64>) -> f64 {
        let diff = relative_diff(&self.measured, pose_a, pose_b);
        let ex = diff[(0, 2)];
        let ey = diff[(1, 2)];
        self.dcs_weight(ex * ex + ey * ey)
    }

    fn dcs_weight<T: Real>(&self, translation_error_sq: T) -> T {
        let c = T::from_f64(self.scale);
        let raw = ((T::from_f64(2.0) * c) / (c + translation_error_sq)).sqrt();
        raw.min(T::one())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factors::RigidFactor;

    const TOLERANCE: f64 = 1e-9;

    #[test]
    fn test_weight_is_one_at_zero_error() {
        let factor = DcsFactor::new(1.0, 0.0, 0.0);
        let pose_a = Vector3::zeros();
        let pose_b = Vector3::new(1.0, 0.0, 0.0);
        assert!((factor.weight(&pose_a, &pose_b) - 1.0).abs() < TOLERANCE);
    }

    #[test]
    fn test_weight_is_one_up_to_transition_point() {
        // raw = √(2c/(c+s)) ≥ 1 iff s ≤ c, so the clamp holds until s = c.
        let factor = DcsFactor::new(0.0, 0.0, 0.0);
        let pose_a = Vector3::zeros();
        let at_boundary = Vector3::new(DEFAULT_SCALE.sqrt(), 0.0, 0.0);
        assert!((factor.weight(&pose_a, &at_boundary) - 1.0).abs() < TOLERANCE);
        let past_boundary = Vector3::new((DEFAULT_SCALE * 1.1).sqrt(), 0.0, 0.0);
        assert!(factor.weight(&pose_a, &past_boundary) < 1.0);
    }

    #[test]
    fn test_weight_bounds_and_monotonicity() {
        let factor = DcsFactor::new(0.0, 0.0, 0.0);
        let pose_a = Vector3::zeros();
        let mut previous = 1.0;
        for step in 1..40 {
            let pose_b = Vector3::new(step as f64 * 0.5, 0.0, 0.0);
            let weight = factor.weight(&pose_a, &pose_b);
            assert!(weight > 0.0 && weight <= 1.0);
            if step as f64 * 0.5 > DEFAULT_SCALE.sqrt() {
                assert!(weight < previous);
            }
            previous = weight;
        }
    }

    #[test]
    fn test_outlier_damped_relative_to_rigid() {
        // Closure measurement (0,0,0) against poses actually 2m apart: the
        // DCS error must be strictly smaller than the rigid error.
        let rigid = RigidFactor::new(0.0, 0.0, 0.0);
        let dcs = DcsFactor::new(0.0, 0.0, 0.0);
        let pose_a = Vector3::zeros();
        let pose_b = Vector3::new(2.0, 0.0, 0.0);
        let rigid_error = rigid.residual(&pose_a, &pose_b);
        let dcs_error = dcs.residual(&pose_a, &pose_b);
        assert!(dcs_error.norm() < rigid_error.norm());
        // The damped error is the rigid error scaled by the weight.
        let weight = dcs.weight(&pose_a, &pose_b);
        assert!((dcs_error.x - weight * rigid_error.x).abs() < TOLERANCE);
    }

    #[test]
    fn test_inlier_matches_rigid_residual() {
        let rigid = RigidFactor::new(1.0, 0.0, 0.0);
        let dcs = DcsFactor::new(1.0, 0.0, 0.0);
        let pose_a = Vector3::zeros();
        let pose_b = Vector3::new(1.1, 0.05, 0.01);
        let rigid_error = rigid.residual(&pose_a, &pose_b);
        let dcs_error = dcs.residual(&pose_a, &pose_b);
        assert!((rigid_error - dcs_error).norm() < TOLERANCE);
    }

    #[test]
    fn test_non_positive_scale_rejected() {
        assert!(matches!(
            DcsFactor::with_scale(0.0, 0.0, 0.0, 0.0),
            Err(FactorError::InvalidScale(_))
        ));
        assert!(matches!(
            DcsFactor::with_scale(0.0, 0.0, 0.0, -0.5),
            Err(FactorError::InvalidScale(_))
        ));
        assert!(DcsFactor::with_scale(0.0, 0.0, 0.0, 0.25).is_ok());
    }
}
