//! Typed failures for shape and label violations.
//!
//! Dimension mismatches and out-of-range labels fail fast with a typed error
//! instead of producing an undefined loss. Non-finite losses are *not* errors:
//! divergence is a tuning concern that propagates to the caller as a value.

use thiserror::Error;

/// Errors produced when inputs violate a shape or range invariant.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    /// A shape invariant was violated (e.g. input width vs layer width).
    #[error("shape mismatch for {what}: got {got}, expected {expected}")]
    ShapeMismatch {
        /// Context for the mismatch (e.g. "input width", "labels").
        what: &'static str,
        got: usize,
        expected: usize,
    },

    /// A class label fell outside `[0, classes)`.
    #[error("label {label} out of range for {classes} classes")]
    LabelOutOfRange { label: usize, classes: usize },

    /// A dropout probability fell outside `[0, 1)`.
    #[error("dropout probability {p} outside [0, 1)")]
    BadDropoutRate { p: f64 },
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;
