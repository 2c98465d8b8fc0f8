//! Scalar abstraction and forward-mode dual numbers
//!
//! Residual functions in this crate are generic over [`Real`], so the same
//! code path runs under plain `f64` evaluation and under a derivative-carrying
//! scalar. [`Jet`] is the forward-mode implementation used by
//! [`crate::graph::ResidualBlock::linearize`]; an external solver may supply
//! its own scalar by implementing [`Real`].

use std::ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Sub, SubAssign};

use num_traits::{One, Zero};

/// Arithmetic interface required by the SE(2) residual functions.
///
/// The supertraits are exactly what `nalgebra` needs to multiply
/// `Matrix3<T>` values; the methods cover the transcendental operations the
/// residuals use. Implemented for `f64` and for [`Jet`].
pub trait Real:
    nalgebra::Scalar
    + Copy
    + Zero
    + One
    + Add<Output = Self>
    + AddAssign
    + Sub<Output = Self>
    + SubAssign
    + Mul<Output = Self>
    + MulAssign
    + Div<Output = Self>
    + DivAssign
    + Neg<Output = Self>
{
    /// Lift a plain constant into this scalar type (zero derivatives).
    fn from_f64(value: f64) -> Self;

    fn sin(self) -> Self;
    fn cos(self) -> Self;
    fn asin(self) -> Self;
    fn sqrt(self) -> Self;

    /// The smaller of two scalars, compared by value. Ties keep `self`.
    fn min(self, other: Self) -> Self;

    /// The larger of two scalars, compared by value. Ties keep `self`.
    fn max(self, other: Self) -> Self;
}

impl Real for f64 {
    fn from_f64(value: f64) -> Self {
        value
    }

    fn sin(self) -> Self {
        f64::sin(self)
    }

    fn cos(self) -> Self {
        f64::cos(self)
    }

    fn asin(self) -> Self {
        f64::asin(self)
    }

    fn sqrt(self) -> Self {
        f64::sqrt(self)
    }

    fn min(self, other: Self) -> Self {
        f64::min(self, other)
    }

    fn max(self, other: Self) -> Self {
        f64::max(self, other)
    }
}

/// A dual number carrying a value and its derivatives with respect to `N`
/// parameters.
///
/// Arithmetic follows the usual forward-mode chain rules, so evaluating a
/// residual on `Jet` inputs yields the residual value together with one row
/// of the Jacobian per output component.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Jet<const N: usize> {
    /// The scalar value
    pub value: f64,
    /// Derivatives with respect to each parameter
    pub derivs: [f64; N],
}

impl<const N: usize> Jet<N> {
    /// Create a constant (zero derivatives).
    pub fn constant(value: f64) -> Self {
        Self {
            value,
            derivs: [0.0; N],
        }
    }

    /// Create a variable with unit derivative at the given parameter index.
    pub fn variable(value: f64, index: usize) -> Self {
        let mut derivs = [0.0; N];
        derivs[index] = 1.0;
        Self { value, derivs }
    }
}

impl<const N: usize> Add for Jet<N> {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            value: self.value + rhs.value,
            derivs: std::array::from_fn(|i| self.derivs[i] + rhs.derivs[i]),
        }
    }
}

impl<const N: usize> Sub for Jet<N> {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self {
            value: self.value - rhs.value,
            derivs: std::array::from_fn(|i| self.derivs[i] - rhs.derivs[i]),
        }
    }
}

/// (a + da)(b + db) = ab + a·db + b·da
impl<const N: usize> Mul for Jet<N> {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        Self {
            value: self.value * rhs.value,
            derivs: std::array::from_fn(|i| {
                self.value * rhs.derivs[i] + rhs.value * self.derivs[i]
            }),
        }
    }
}

/// (a + da)/(b + db) = a/b + (da·b − a·db)/b²
impl<const N: usize> Div for Jet<N> {
    type Output = Self;

    fn div(self, rhs: Self) -> Self {
        let b_squared = rhs.value * rhs.value;
        Self {
            value: self.value / rhs.value,
            derivs: std::array::from_fn(|i| {
                (self.derivs[i] * rhs.value - self.value * rhs.derivs[i]) / b_squared
            }),
        }
    }
}

impl<const N: usize> Neg for Jet<N> {
    type Output = Self;

    fn neg(self) -> Self {
        Self {
            value: -self.value,
            derivs: std::array::from_fn(|i| -self.derivs[i]),
        }
    }
}

impl<const N: usize> AddAssign for Jet<N> {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl<const N: usize> SubAssign for Jet<N> {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl<const N: usize> MulAssign for Jet<N> {
    fn mul_assign(&mut self, rhs: Self) {
        *self = *self * rhs;
    }
}

impl<const N: usize> DivAssign for Jet<N> {
    fn div_assign(&mut self, rhs: Self) {
        *self = *self / rhs;
    }
}

impl<const N: usize> Zero for Jet<N> {
    fn zero() -> Self {
        Self::constant(0.0)
    }

    fn is_zero(&self) -> bool {
        self.value == 0.0 && self.derivs.iter().all(|d| *d == 0.0)
    }
}

impl<const N: usize> One for Jet<N> {
    fn one() -> Self {
        Self::constant(1.0)
    }
}

impl<const N: usize> Real for Jet<N> {
    fn from_f64(value: f64) -> Self {
        Self::constant(value)
    }

    fn sin(self) -> Self {
        let cos_v = self.value.cos();
        Self {
            value: self.value.sin(),
            derivs: std::array::from_fn(|i| cos_v * self.derivs[i]),
        }
    }

    fn cos(self) -> Self {
        let sin_v = self.value.sin();
        Self {
            value: self.value.cos(),
            derivs: std::array::from_fn(|i| -sin_v * self.derivs[i]),
        }
    }

    /// asin'(x) = 1/√(1 − x²); the derivative blows up at |x| = 1, which the
    /// residual layer avoids by clamping before calling.
    fn asin(self) -> Self {
        let scale = 1.0 / (1.0 - self.value * self.value).sqrt();
        Self {
            value: self.value.asin(),
            derivs: std::array::from_fn(|i| scale * self.derivs[i]),
        }
    }

    fn sqrt(self) -> Self {
        let root = self.value.sqrt();
        let scale = 0.5 / root;
        Self {
            value: root,
            derivs: std::array::from_fn(|i| scale * self.derivs[i]),
        }
    }

    fn min(self, other: Self) -> Self {
        if other.value < self.value {
            other
        } else {
            self
        }
    }

    fn max(self, other: Self) -> Self {
        if other.value > self.value {
            other
        } else {
            self
        }
    }
}
