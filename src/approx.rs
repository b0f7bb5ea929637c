//! Utilities to approximate equality of floating point values.

/// Tolerance for probability-normalization checks (exponentiated rows).
pub const SUM_TOLERANCE: f64 = 1e-5;

/// Tolerance for comparing analytic gradients against centered finite
/// differences.
pub const GRAD_TOLERANCE: f64 = 1e-4;

/// Tight tolerance for values that should match to rounding error.
pub const TIGHT_TOLERANCE: f64 = 1e-9;

/// Checks distance against a caller-supplied tolerance.
pub trait ApproxEq<Rhs: ?Sized> {
    /// True when `self` and `rhs` differ by at most `tol`.
    fn approx_eq(&self, rhs: &Rhs, tol: f64) -> bool;
}

impl ApproxEq<Self> for f64 {
    fn approx_eq(&self, rhs: &Self, tol: f64) -> bool {
        (self - rhs).abs() <= tol
    }
}

impl ApproxEq<Self> for [f64] {
    fn approx_eq(&self, rhs: &Self, tol: f64) -> bool {
        self.len() == rhs.len()
            && self
                .iter()
                .zip(rhs)
                .all(|(a, b)| a.approx_eq(b, tol))
    }
}
