//! SE(2) transform algebra on homogeneous 3×3 matrices
//!
//! A planar rigid transform (x, y, θ) is represented as
//!
//! ```text
//! | cos θ  −sin θ  x |
//! | sin θ   cos θ  y |
//! |   0       0    1 |
//! ```
//!
//! Composition is the plain matrix product. Everything here is generic over
//! [`Real`] so derivatives propagate through when a residual is evaluated on
//! dual numbers. θ is deliberately not wrapped to a canonical range.

use nalgebra::Matrix3;

use crate::autodiff::Real;

/// Build the homogeneous transform matrix for pose `(x, y, theta)`.
pub fn pose_matrix<T: Real>(x: T, y: T, theta: T) -> Matrix3<T> {
    let cos_t = theta.cos();
    let sin_t = theta.sin();
    Matrix3::new(
        cos_t,
        -sin_t,
        x,
        sin_t,
        cos_t,
        y,
        T::zero(),
        T::zero(),
        T::one(),
    )
}

/// Closed-form inverse of a rigid transform: transposed rotation block,
/// translation mapped through `−Rᵀ t`.
///
/// Cheaper and better conditioned than a general 3×3 inverse; on orthonormal
/// input the two agree.
pub fn rigid_inverse<T: Real>(m: &Matrix3<T>) -> Matrix3<T> {
    let r00 = m[(0, 0)];
    let r01 = m[(0, 1)];
    let r10 = m[(1, 0)];
    let r11 = m[(1, 1)];
    let tx = m[(0, 2)];
    let ty = m[(1, 2)];
    Matrix3::new(
        r00,
        r10,
        -(r00 * tx + r10 * ty),
        r01,
        r11,
        -(r01 * tx + r11 * ty),
        T::zero(),
        T::zero(),
        T::one(),
    )
}
