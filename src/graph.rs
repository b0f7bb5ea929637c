//! The recorded operation tape and the train/eval mode.
//!
//! A forward pass in training mode records one [`Node`] per operation, in
//! execution order. Each node owns its local derivative rule as a `FnOnce`
//! backward closure, plus the index of the layer whose parameter gradients it
//! produces (if any). [`Tape::backward`] consumes the nodes in reverse,
//! threading the upstream gradient through each closure and accumulating
//! weight and bias gradients into the layers' buffers.
//!
//! The tape is valid from the forward call through the end of the backward
//! pass; `backward` takes the tape by value, so a stale graph cannot be
//! replayed against parameters it no longer describes.

use crate::error::{Error, Result};
use crate::net::Linear;
use crate::tensors::Ten64;

/// Whether a forward pass is part of training or evaluation.
///
/// Threaded explicitly through every forward call; dropout is recorded only
/// in [`Mode::Train`], and evaluation passes through activations unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Recording forward pass with regularization active.
    Train,
    /// Deterministic forward pass; no zeroing, no graph retention needed.
    Eval,
}

impl Mode {
    /// True in [`Mode::Train`].
    pub fn is_train(self) -> bool {
        matches!(self, Mode::Train)
    }
}

/// Gradients produced by one node's backward closure.
pub struct NodeGrads {
    /// Gradient with respect to the node's input, passed to the next node.
    pub input: Ten64,
    /// Gradient for the owning layer's weight matrix, if the node has one.
    pub weight: Option<Ten64>,
    /// Gradient for the owning layer's bias vector, if the node has one.
    pub bias: Option<Ten64>,
}

type NodeBack = Box<dyn FnOnce(&Ten64) -> NodeGrads>;

/// One recorded operation: a local derivative rule plus the index of the
/// layer receiving its parameter gradients.
pub struct Node {
    layer: Option<usize>,
    back: NodeBack,
}

/// Operation graph recorded during a forward pass.
///
/// The network is a chain, so the graph is an ordered list; reverse traversal
/// is the chain rule.
#[derive(Default)]
pub struct Tape {
    nodes: Vec<Node>,
}

impl Tape {
    /// Creates an empty tape.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of recorded operations.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether no operations have been recorded.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Records one operation node.
    ///
    /// `layer` names the layer whose parameter gradients the closure yields;
    /// pure activations (ReLU, dropout) record `None`.
    pub fn record<F>(&mut self, layer: Option<usize>, back: F)
    where
        F: FnOnce(&Ten64) -> NodeGrads + 'static,
    {
        self.nodes.push(Node {
            layer,
            back: Box::new(back),
        });
    }

    /// Reverse traversal: consumes the tape, threading `seed` (the loss
    /// gradient in logit space) backward through every node and accumulating
    /// parameter gradients into the layers' buffers.
    ///
    /// Parameter values are never mutated here; only gradient buffers change,
    /// and they change by accumulation — callers zero them beforehand.
    ///
    /// # Returns
    /// The gradient with respect to the original network input.
    ///
    /// # Errors
    /// Fails if a node names a layer index outside `layers`, or if a closure
    /// produces a gradient whose shape disagrees with its parameter buffer.
    pub fn backward(self, seed: Ten64, layers: &mut [Linear]) -> Result<Ten64> {
        let nlayers = layers.len();
        let mut upstream = seed;

        for node in self.nodes.into_iter().rev() {
            let grads = (node.back)(&upstream);

            if let Some(index) = node.layer {
                let layer = layers.get_mut(index).ok_or(Error::ShapeMismatch {
                    what: "layer index",
                    got: index,
                    expected: nlayers,
                })?;
                if let Some(dw) = grads.weight {
                    accumulate(&mut layer.weight.grad, &dw)?;
                }
                if let Some(db) = grads.bias {
                    accumulate(&mut layer.bias.grad, &db)?;
                }
            }

            upstream = grads.input;
        }

        Ok(upstream)
    }
}

/// Shape-checked `dst += src` over gradient buffers.
fn accumulate(dst: &mut Ten64, src: &Ten64) -> Result<()> {
    if dst.shape != src.shape {
        return Err(Error::ShapeMismatch {
            what: "gradient buffer",
            got: src.data.len(),
            expected: dst.data.len(),
        });
    }
    for (d, s) in dst.data.iter_mut().zip(&src.data) {
        *d += s;
    }
    Ok(())
}
