//! gradnet: a small feed-forward classifier trainer in Rust.
//!
//! Provides flat tensors with gradient buffers, differentiable CPU operations
//! with backward closures, a recorded operation tape consumed once per batch,
//! and a synchronous epoch-based training loop with held-out evaluation.
//!
//! # Features
//!
//! - Multi-dimensional tensor management with gradient support.
//! - Core classifier operations (affine, ReLU, dropout, log-softmax,
//!   cross-entropy) with manual backpropagation closures.
//! - An explicit train/eval mode threaded through every forward call.
//! - Plain SGD updates and accuracy-based evaluation.
//!
//! # Goals
//!
//! - Make every step of forward/loss/backward/update visible and owned by the
//!   caller; no hidden global registries or implicit mode flags.
//! - Prioritize correctness and explicitness over black-box abstraction.
//! - Fail fast with typed errors on shape and label-range violations.
//!
//! # Modules
//!
//! - [`tensors`] — Core tensor data structures and gradient wrappers.
//! - [`backprop`] — Differentiable operations with backward closures.
//! - [`graph`] — The recorded operation tape and the train/eval mode.
//! - [`net`] — Feed-forward predictor (affine stacks with ReLU and dropout).
//! - [`data`] — Validated input/label batches.
//! - [`train`] — The epoch loop: train, update, evaluate.
//!
//! # Example
//!
//! ```rust
//! use gradnet::tensors::Tensor;
//! let t = Tensor::new(vec![2, 3], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
//! assert_eq!(t.shape, vec![2, 3]);
//! ```

pub mod approx;
pub mod backprop;
pub mod data;
pub mod error;
pub mod graph;
pub mod net;
pub mod ops;
pub mod tensors;
pub mod train;
