//! Robust loss wrapper applied by the external solver
//!
//! Independent of the DCS weighting inside the residual, the original
//! pipeline wraps every residual block in a small-scale Huber kernel. The
//! two damping mechanisms are deliberately kept separate and individually
//! configurable (see `AssemblyConfig`).
//!
//! A loss transforms the squared residual norm `s = ||r||²` into a robust
//! cost `ρ(s)`; `evaluate` returns `[ρ(s), ρ'(s), ρ''(s)]`, the shape a
//! corrector-style solver consumes.

use thiserror::Error;

/// Errors raised while constructing a loss function
#[derive(Debug, Clone, Error)]
pub enum LossError {
    /// The loss scale must be strictly positive
    #[error("loss scale must be positive, got {0}")]
    InvalidScale(f64),
}

/// Robust loss function interface.
pub trait Loss: Send + Sync {
    /// Evaluate the loss and its first two derivatives at squared residual
    /// norm `s`.
    fn evaluate(&self, s: f64) -> [f64; 3];
}

/// Huber loss: quadratic for inliers, linear for outliers.
///
/// ```text
/// ρ(s) = s                    if s ≤ δ²
///      = 2δ√s − δ²            if s > δ²
/// ```
#[derive(Debug, Clone)]
pub struct HuberLoss {
    /// Scale parameter δ
    scale: f64,
    /// Cached δ²
    scale2: f64,
}

impl HuberLoss {
    /// Create a Huber loss with threshold `scale` (must be positive).
    pub fn new(scale: f64) -> Result<Self, LossError> {
        if scale <= 0.0 {
            return Err(LossError::InvalidScale(scale));
        }
        Ok(Self {
            scale,
            scale2: scale * scale,
        })
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }
}

impl Loss for HuberLoss {
    fn evaluate(&self, s: f64) -> [f64; 3] {
        if s <= self.scale2 {
            [s, 1.0, 0.0]
        } else {
            let root = s.sqrt();
            [
                2.0 * self.scale * root - self.scale2,
                self.scale / root,
                -self.scale / (2.0 * s * root),
            ]
        }
    }
}
