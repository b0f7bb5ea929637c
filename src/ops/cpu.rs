//! Parallel CPU kernels for the differentiable operations.
//!
//! This module provides the concrete implementations behind [`crate::backprop`]:
//! forward computation plus backward closures for every operation the
//! classifier pipeline records on its tape.
//!
//! ## Features
//!
//! - Parallel execution using [`rayon`](https://docs.rs/rayon) for the
//!   row-structured kernels (affine, log-softmax)
//! - Elementwise kernels (ReLU, dropout) parallelized over the flat buffer
//! - Forward-only variants (`affine_forward`, `relu_forward`, `mean_nll`)
//!   shared with the closure-free inference path
//!
//! ## Design Goals
//!
//! - Deterministic results for fixed inputs (dropout excepted: it draws from
//!   the RNG handed in by the caller)
//! - Typed errors on shape or label violations, checked before any work
//! - Backward closures capture owned clones only, so a recorded tape has no
//!   borrows into the model

use rand::Rng;
use rayon::prelude::*;

use crate::error::{Error, Result};
use crate::ops::{FnF64Ten64, FnTen64To, FnToTripleTen64};
use crate::tensors::{Ten64, Tensor, WithGrad};

fn check_matrix(t: &Ten64, what: &'static str) -> Result<(usize, usize)> {
    if t.shape.len() != 2 {
        return Err(Error::ShapeMismatch {
            what,
            got: t.shape.len(),
            expected: 2,
        });
    }
    Ok((t.shape[0], t.shape[1]))
}

/// Computes `x·W + b` without recording a backward closure.
///
/// Shared by the differentiable [`affine`] op and the inference path.
///
/// # Errors
/// Returns [`Error::ShapeMismatch`] if `x` or `w` is not rank-2, if
/// `x.shape[1] != w.shape[0]`, or if `b` is not a vector of `w.shape[1]`.
pub fn affine_forward(x: &Ten64, w: &Ten64, b: &Ten64) -> Result<Ten64> {
    let (m, k) = check_matrix(x, "affine input rank")?;
    let (wk, n) = check_matrix(w, "affine weight rank")?;
    if k != wk {
        return Err(Error::ShapeMismatch {
            what: "input width",
            got: k,
            expected: wk,
        });
    }
    if b.shape != [n] {
        return Err(Error::ShapeMismatch {
            what: "bias width",
            got: b.data.len(),
            expected: n,
        });
    }

    let x_data = &x.data;
    let w_data = &w.data;
    let b_data = &b.data;

    let mut out_data = vec![0.0; m * n];
    out_data
        .par_chunks_mut(n)
        .enumerate()
        .for_each(|(i, row)| {
            for j in 0..n {
                let mut sum = b_data[j];
                for l in 0..k {
                    sum += x_data[i * k + l] * w_data[l * n + j];
                }
                row[j] = sum;
            }
        });

    Ok(Tensor::new(vec![m, n], out_data))
}

/// Affine transform `x·W + b` with gradient closures for all three inputs.
///
/// # Returns
/// - Output tensor of shape `[m, n]`
/// - Backward function mapping `dL/d(out)` to `(dL/dx, dL/dW, dL/db)`:
///   upstream times `Wᵀ`, `xᵀ` times upstream, and the column sums of the
///   upstream gradient respectively.
///
/// # Errors
/// Same shape checks as [`affine_forward`].
pub fn affine(x: &Ten64, w: &Ten64, b: &Ten64) -> Result<(Ten64, Box<FnToTripleTen64>)> {
    let out = affine_forward(x, w, b)?;
    let (m, k) = (x.shape[0], x.shape[1]);
    let n = w.shape[1];

    let x_data = x.data.clone();
    let w_data = w.data.clone();

    let back = move |grad: &Ten64| {
        let g = &grad.data;

        let mut dx = vec![0.0; m * k];
        dx.par_chunks_mut(k).enumerate().for_each(|(i, row)| {
            for l in 0..k {
                let mut sum = 0.0;
                for j in 0..n {
                    sum += g[i * n + j] * w_data[l * n + j];
                }
                row[l] = sum;
            }
        });

        let mut dw = vec![0.0; k * n];
        dw.par_chunks_mut(n).enumerate().for_each(|(l, row)| {
            for j in 0..n {
                let mut sum = 0.0;
                for i in 0..m {
                    sum += x_data[i * k + l] * g[i * n + j];
                }
                row[j] = sum;
            }
        });

        let mut db = vec![0.0; n];
        for i in 0..m {
            for j in 0..n {
                db[j] += g[i * n + j];
            }
        }

        (
            Tensor::new(vec![m, k], dx),
            Tensor::new(vec![k, n], dw),
            Tensor::new(vec![n], db),
        )
    };

    Ok((out, Box::new(back)))
}

/// ReLU forward without a backward closure.
pub fn relu_forward(x: &Ten64) -> Ten64 {
    let data = x
        .data
        .par_iter()
        .map(|&v| if v > 0.0 { v } else { 0.0 })
        .collect();
    Tensor::new(x.shape.clone(), data)
}

/// Applies the ReLU activation function element-wise: `max(0, x)`.
///
/// # Returns
/// - Output tensor of same shape
/// - Backward function which passes upstream gradients only where the input
///   was positive
pub fn relu(x: &Ten64) -> (Ten64, Box<FnTen64To>) {
    let out = relu_forward(x);
    let shape = x.shape.clone();
    let input_data = x.data.clone();

    let back = move |grad_output: &Ten64| {
        let grad = input_data
            .par_iter()
            .zip(grad_output.data.par_iter())
            .map(|(&v, &dy)| if v > 0.0 { dy } else { 0.0 })
            .collect();
        Tensor::new(shape.clone(), grad)
    };

    (out, Box::new(back))
}

/// Inverted dropout: zeroes each element independently with probability `p`
/// and rescales survivors by `1/(1−p)` so expected magnitude is preserved.
///
/// Only meaningful during training; evaluation skips the op entirely rather
/// than calling it with `p = 0`.
///
/// # Returns
/// - Output tensor with the mask applied
/// - Backward function applying the same mask to the upstream gradient
///
/// # Errors
/// Returns [`Error::BadDropoutRate`] unless `0 ≤ p < 1`.
pub fn dropout<R: Rng + ?Sized>(
    x: &Ten64,
    p: f64,
    rng: &mut R,
) -> Result<(Ten64, Box<FnTen64To>)> {
    if !(0.0..1.0).contains(&p) {
        return Err(Error::BadDropoutRate { p });
    }

    let scale = 1.0 / (1.0 - p);
    // Mask drawn serially so a seeded RNG reproduces the same run.
    let mask: Vec<f64> = (0..x.data.len())
        .map(|_| if rng.random::<f64>() < p { 0.0 } else { scale })
        .collect();

    let data = x
        .data
        .par_iter()
        .zip(mask.par_iter())
        .map(|(&v, &m)| v * m)
        .collect();
    let out = Tensor::new(x.shape.clone(), data);

    let shape = x.shape.clone();
    let back = move |grad_output: &Ten64| {
        let grad = grad_output
            .data
            .par_iter()
            .zip(mask.par_iter())
            .map(|(&dy, &m)| dy * m)
            .collect();
        Tensor::new(shape.clone(), grad)
    };

    Ok((out, Box::new(back)))
}

/// Numerically stable log-softmax along the last axis.
///
/// Subtracts the row-wise maximum before exponentiating, so rows of all-equal
/// scores yield uniform, finite log-probabilities.
///
/// # Returns
/// - Log-probability tensor of same shape
/// - Backward function computing `dy − softmax · rowsum(dy)` per row
pub fn log_softmax(x: &Ten64) -> (Ten64, Box<FnTen64To>) {
    let shape = x.shape.clone();
    let last_dim = *shape.last().unwrap_or(&1);
    let mut out_data = vec![0.0; x.data.len()];

    out_data
        .par_chunks_mut(last_dim)
        .zip(x.data.par_chunks(last_dim))
        .for_each(|(out_row, row)| {
            let max_val = row.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let log_sum = max_val
                + row
                    .iter()
                    .map(|&v| (v - max_val).exp())
                    .sum::<f64>()
                    .ln();
            for (o, &v) in out_row.iter_mut().zip(row) {
                *o = v - log_sum;
            }
        });

    let out = Tensor::new(shape.clone(), out_data.clone());

    let back = move |grad_output: &Ten64| {
        let mut grad = vec![0.0; grad_output.data.len()];
        grad.par_chunks_mut(last_dim)
            .zip(out_data.par_chunks(last_dim))
            .zip(grad_output.data.par_chunks(last_dim))
            .for_each(|((g_row, y_row), dy_row)| {
                let dy_sum: f64 = dy_row.iter().sum();
                for ((g, &y), &dy) in g_row.iter_mut().zip(y_row).zip(dy_row) {
                    *g = dy - y.exp() * dy_sum;
                }
            });
        Tensor::new(shape.clone(), grad)
    };

    (out, Box::new(back))
}

fn check_logits_and_labels(logits: &Ten64, labels: &[usize]) -> Result<(usize, usize)> {
    let (batch, classes) = check_matrix(logits, "logits rank")?;
    if labels.len() != batch {
        return Err(Error::ShapeMismatch {
            what: "labels",
            got: labels.len(),
            expected: batch,
        });
    }
    for &label in labels {
        if label >= classes {
            return Err(Error::LabelOutOfRange { label, classes });
        }
    }
    Ok((batch, classes))
}

/// Mean negative log-probability of the true class, forward only.
///
/// Used by the evaluation pass, which never needs the gradient closure.
///
/// # Errors
/// Returns [`Error::ShapeMismatch`] for non-matrix logits or a label count
/// that disagrees with the batch size, and [`Error::LabelOutOfRange`] for
/// labels outside `[0, classes)`.
pub fn mean_nll(logits: &Ten64, labels: &[usize]) -> Result<f64> {
    let (batch, classes) = check_logits_and_labels(logits, labels)?;

    // Per-row losses are computed in parallel but summed serially, so the
    // result does not depend on rayon's reduction order.
    let losses: Vec<f64> = logits
        .data
        .par_chunks(classes)
        .zip(labels.par_iter())
        .map(|(row, &label)| {
            let max_val = row.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let log_sum = max_val
                + row
                    .iter()
                    .map(|&v| (v - max_val).exp())
                    .sum::<f64>()
                    .ln();
            log_sum - row[label]
        })
        .collect();

    Ok(losses.iter().sum::<f64>() / batch as f64)
}

/// Cross-entropy loss over raw class scores and integer labels.
///
/// Folds the stable log-softmax into the loss: the forward pass produces the
/// mean negative log-probability of the true class, and the backward closure
/// maps an upstream scalar to `(softmax − onehot)/batch` in logit space.
///
/// # Returns
/// - Scalar loss
/// - Backward function mapping `dL/dloss` to a gradient tensor shaped like
///   the logits
///
/// # Errors
/// Same checks as [`mean_nll`].
pub fn cross_entropy_from_logits(
    logits: &Ten64,
    labels: &[usize],
) -> Result<(f64, Box<FnF64Ten64>)> {
    let (batch, classes) = check_logits_and_labels(logits, labels)?;

    let mut softmax = vec![0.0; logits.data.len()];
    let losses: Vec<f64> = softmax
        .par_chunks_mut(classes)
        .zip(logits.data.par_chunks(classes))
        .zip(labels.par_iter())
        .map(|((s_row, row), &label)| {
            let max_val = row.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let exp_sum: f64 = row.iter().map(|&v| (v - max_val).exp()).sum();
            for (s, &v) in s_row.iter_mut().zip(row) {
                *s = (v - max_val).exp() / exp_sum;
            }
            max_val + exp_sum.ln() - row[label]
        })
        .collect();

    let loss = losses.iter().sum::<f64>() / batch as f64;

    let shape = logits.shape.clone();
    let labels = labels.to_vec();
    let back = move |grad_output: f64| {
        let scale = grad_output / batch as f64;
        let mut grad = softmax.clone();
        for (i, &label) in labels.iter().enumerate() {
            grad[i * classes + label] -= 1.0;
        }
        for g in &mut grad {
            *g *= scale;
        }
        Tensor::new(shape.clone(), grad)
    };

    Ok((loss, Box::new(back)))
}

/// Performs one step of stochastic gradient descent on the given parameter.
///
/// Updates `w.value` in place as `w := w − lr · ∂L/∂w`, then zeroes the
/// gradient buffer so the next batch starts clean.
pub fn sgd(w: &mut WithGrad<Ten64>, lr: f64) {
    for (param, grad) in w.value.data.iter_mut().zip(&w.grad.data) {
        *param -= lr * *grad;
    }
    for grad in &mut w.grad.data {
        *grad = 0.0;
    }
}

/// Index of the maximum score in each row of a matrix of class scores.
///
/// Ties resolve to the lowest index.
pub fn argmax_rows(t: &Ten64) -> Vec<usize> {
    let last_dim = *t.shape.last().unwrap_or(&1);
    if last_dim == 0 {
        return Vec::new();
    }
    t.data
        .chunks(last_dim)
        .map(|row| {
            let mut best = 0;
            for (j, &v) in row.iter().enumerate() {
                if v > row[best] {
                    best = j;
                }
            }
            best
        })
        .collect()
}
