//! Differentiable operations and autograd utilities.
//!
//! # Backpropagation and Optimization Primitives
//!
//! Provides the operations a feed-forward classifier records on its tape,
//! each with built-in autograd support.
//!
//! **Key Features:**
//! - **Affine Transform:** `x·W + b` with gradient closures for input,
//!   weights, and bias.
//! - **Elementwise Activation (ReLU):** Zero-out negatives and propagate
//!   gradients accordingly.
//! - **Dropout:** Randomly zero activations during training, rescaling
//!   survivors to preserve expected magnitude.
//! - **Loss Computation (Cross-Entropy):** Stable log-softmax folded into the
//!   mean negative log-likelihood, with gradient generator.
//! - **Optimizer (SGD):** In-place parameter update with gradient reset.
//!
//! ## Autograd Pattern
//!
//! Each operation follows a simple pattern:
//! 1. **Inputs** are plain tensors; parameters arrive as value tensors from
//!    their `WithGrad` wrappers.
//! 2. **Forward Pass** computes an output `Ten64`.
//! 3. **Backward Pass** returns a closure capturing minimal cloned data to
//!    compute gradients.
//! 4. **Gradient Application** accumulates closure outputs into `WithGrad`
//!    buffers, either by hand or through [`crate::graph::Tape`].
//!
//! ## Usage Guidelines
//!
//! - Operations return [`crate::error::Error`] on shape or label-range
//!   violations; nothing panics on mismatched dimensions.
//! - The backward closures implement `Fn`, allowing multiple invocations.
//! - A closure is only valid for the forward values it captured; discard it
//!   once the parameters move.

use rand::Rng;

use crate::error::Result;
use crate::ops::{FnF64Ten64, FnTen64To, FnToTripleTen64};
use crate::tensors::{Ten64, WithGrad};

/// Affine transform `x·W + b` of a batch of row vectors.
///
/// # Returns
/// - `out`: Tensor of shape `[batch, fan_out]`.
/// - `back`: Closure mapping `dL/d(out)` to `(dL/dx, dL/dW, dL/db)`.
///
/// # Errors
/// Fails fast with a dimension-mismatch error when the input width disagrees
/// with the weight matrix or the bias length disagrees with its column count.
pub fn affine(x: &Ten64, w: &Ten64, b: &Ten64) -> Result<(Ten64, Box<FnToTripleTen64>)> {
    crate::ops::cpu::affine(x, w, b)
}

/// Applies the ReLU activation (Rectified Linear Unit): `max(0, x)` elementwise.
///
/// # Returns
/// - `out`: Tensor with negatives zeroed.
/// - `back`: Closure mapping `dL/d(out)` to `dL/d(input)` by passing gradients
///   only where input > 0.
///
/// # Example
/// ```rust
/// use gradnet::tensor;
///
/// let input = tensor!([[3.0, -3.0], [9.0, 0.0]]);
/// let (out, back) = gradnet::backprop::relu(&input);
/// assert_eq!(out.data, vec![3.0, 0.0, 9.0, 0.0]);
/// let grad_in = back(&tensor!([[2.0, 4.0], [6.0, 3.0]]));
/// assert_eq!(grad_in.data, vec![2.0, 0.0, 6.0, 0.0]);
/// ```
pub fn relu(x: &Ten64) -> (Ten64, Box<FnTen64To>) {
    crate::ops::cpu::relu(x)
}

/// Inverted dropout over a batch of activations.
///
/// Each element is zeroed independently with probability `p`; survivors are
/// rescaled by `1/(1−p)`. Record this op during training only — evaluation is
/// an identity pass-through by construction, not by calling dropout.
///
/// # Errors
/// Fails when `p` is outside `[0, 1)`.
pub fn dropout<R: Rng + ?Sized>(
    x: &Ten64,
    p: f64,
    rng: &mut R,
) -> Result<(Ten64, Box<FnTen64To>)> {
    crate::ops::cpu::dropout(x, p, rng)
}

/// Numerically stable log-softmax along the last axis.
///
/// # Returns
/// - `out`: Log-probabilities; exponentiated rows sum to 1.
/// - `back`: Closure computing `dy − softmax · rowsum(dy)` per row.
pub fn log_softmax(x: &Ten64) -> (Ten64, Box<FnTen64To>) {
    crate::ops::cpu::log_softmax(x)
}

/// Cross-entropy loss over raw class scores and integer labels.
///
/// # Returns
/// - Scalar loss: mean negative log-probability of the true class.
/// - Closure that maps `dL/dloss` into a gradient tensor shaped like the
///   logits.
///
/// # Errors
/// Fails when the logits are not a matrix, the label count disagrees with the
/// batch size, or any label falls outside `[0, classes)`.
pub fn cross_entropy_from_logits(
    logits: &Ten64,
    labels: &[usize],
) -> Result<(f64, Box<FnF64Ten64>)> {
    crate::ops::cpu::cross_entropy_from_logits(logits, labels)
}

/// Performs an in-place Stochastic Gradient Descent (SGD) update.
///
/// Applies: `param = param - learning_rate * gradient` and then zeros the
/// gradient buffer.
pub fn sgd(w: &mut WithGrad<Ten64>, lr: f64) {
    crate::ops::cpu::sgd(w, lr)
}
