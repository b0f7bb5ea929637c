//! Differentiable CPU kernels and their closure signatures.
//!
//! Each kernel computes a forward result plus a boxed backward closure that
//! captures the minimal cloned state needed to map an upstream gradient back
//! to its inputs. Shape and label violations are returned as typed errors
//! before any computation happens.

use crate::tensors::Ten64;

pub mod cpu;

/// Backward closure mapping `dL/d(out)` to `dL/d(input)`.
pub type FnTen64To = dyn Fn(&Ten64) -> Ten64;

/// Backward closure for the affine op: `dL/d(out)` to `(dL/dx, dL/dW, dL/db)`.
pub type FnToTripleTen64 = dyn Fn(&Ten64) -> (Ten64, Ten64, Ten64);

/// Backward closure mapping an upstream scalar loss gradient into logit space.
pub type FnF64Ten64 = dyn Fn(f64) -> Ten64;
