//! Feed-forward predictor: affine stacks with ReLU and optional dropout.
//!
//! The network owns its parameters as an ordered list of [`Linear`] layers,
//! each a weight matrix and bias vector wrapped in `WithGrad`. Forward passes
//! come in two flavors: a recording pass that builds a [`Tape`] for the
//! backward traversal, and a closure-free inference pass for evaluation.

use rand::Rng;

use crate::backprop;
use crate::error::{Error, Result};
use crate::graph::{Mode, NodeGrads, Tape};
use crate::ops::cpu;
use crate::tensors::{Ten64, WithGrad};

/// One affine layer: weight matrix `[fan_in, fan_out]` and bias `[fan_out]`.
#[derive(Debug, Clone)]
pub struct Linear {
    pub weight: WithGrad<Ten64>,
    pub bias: WithGrad<Ten64>,
}

impl Linear {
    /// Creates a layer with scaled-uniform (Glorot) weights and zero biases.
    ///
    /// Weights are drawn from `U(−limit, limit)` with
    /// `limit = sqrt(6 / (fan_in + fan_out))`, which keeps activation
    /// magnitudes near unit scale through the stack.
    pub fn new<R: Rng + ?Sized>(fan_in: usize, fan_out: usize, rng: &mut R) -> Self {
        let limit = (6.0 / (fan_in + fan_out) as f64).sqrt();
        let data = (0..fan_in * fan_out)
            .map(|_| rng.random_range(-limit..limit))
            .collect();
        Self {
            weight: WithGrad::new(Ten64::new(vec![fan_in, fan_out], data)),
            bias: WithGrad::new(Ten64::zeros(vec![fan_out])),
        }
    }

    /// Builds a layer from explicit parameter tensors.
    ///
    /// # Errors
    /// Fails unless `weight` is a matrix and `bias` is a vector of the weight
    /// matrix's column count.
    pub fn from_parts(weight: Ten64, bias: Ten64) -> Result<Self> {
        if weight.shape.len() != 2 {
            return Err(Error::ShapeMismatch {
                what: "weight rank",
                got: weight.shape.len(),
                expected: 2,
            });
        }
        if bias.shape != [weight.shape[1]] {
            return Err(Error::ShapeMismatch {
                what: "bias width",
                got: bias.data.len(),
                expected: weight.shape[1],
            });
        }
        Ok(Self {
            weight: WithGrad::new(weight),
            bias: WithGrad::new(bias),
        })
    }

    /// Input width of the layer.
    pub fn fan_in(&self) -> usize {
        self.weight.value.shape[0]
    }

    /// Output width of the layer.
    pub fn fan_out(&self) -> usize {
        self.weight.value.shape[1]
    }
}

/// Multi-layer perceptron producing raw class scores (logits).
///
/// Applies each layer's affine transform, with ReLU after every hidden layer
/// and nothing after the last; no normalization happens inside the network.
/// Dropout, when configured, zeroes hidden activations during training only.
#[derive(Debug, Clone)]
pub struct Mlp {
    layers: Vec<Linear>,
    dropout: f64,
}

impl Mlp {
    /// Creates a network from consecutive layer widths, e.g. `[784, 128, 10]`.
    ///
    /// # Errors
    /// Fails unless at least an input and an output width are given.
    pub fn new<R: Rng + ?Sized>(dims: &[usize], rng: &mut R) -> Result<Self> {
        if dims.len() < 2 {
            return Err(Error::ShapeMismatch {
                what: "layer dims",
                got: dims.len(),
                expected: 2,
            });
        }
        let layers = dims
            .windows(2)
            .map(|pair| Linear::new(pair[0], pair[1], rng))
            .collect();
        Ok(Self {
            layers,
            dropout: 0.0,
        })
    }

    /// Builds a network from explicit layers.
    ///
    /// # Errors
    /// Fails when consecutive layers disagree on width, or no layers are given.
    pub fn from_layers(layers: Vec<Linear>) -> Result<Self> {
        if layers.is_empty() {
            return Err(Error::ShapeMismatch {
                what: "layers",
                got: 0,
                expected: 1,
            });
        }
        for pair in layers.windows(2) {
            if pair[0].fan_out() != pair[1].fan_in() {
                return Err(Error::ShapeMismatch {
                    what: "layer widths",
                    got: pair[1].fan_in(),
                    expected: pair[0].fan_out(),
                });
            }
        }
        Ok(Self {
            layers,
            dropout: 0.0,
        })
    }

    /// Enables dropout on hidden activations with keep-adjusted rescaling.
    ///
    /// # Errors
    /// Fails unless `0 ≤ p < 1`.
    pub fn with_dropout(mut self, p: f64) -> Result<Self> {
        if !(0.0..1.0).contains(&p) {
            return Err(Error::BadDropoutRate { p });
        }
        self.dropout = p;
        Ok(self)
    }

    /// The layers, in forward order.
    pub fn layers(&self) -> &[Linear] {
        &self.layers
    }

    /// Mutable access to the layers, for the backward and update steps.
    pub fn layers_mut(&mut self) -> &mut [Linear] {
        &mut self.layers
    }

    /// Expected width of input rows.
    pub fn input_dim(&self) -> usize {
        self.layers[0].fan_in()
    }

    /// Number of classes scored by the final layer.
    pub fn num_classes(&self) -> usize {
        self.layers[self.layers.len() - 1].fan_out()
    }

    /// Recording forward pass: maps a `[batch, input_dim]` tensor to logits
    /// and the tape describing the computation.
    ///
    /// Dropout nodes are recorded only when `mode` is [`Mode::Train`]; in
    /// [`Mode::Eval`] hidden activations pass through unchanged. The returned
    /// tape is valid until [`Tape::backward`] consumes it.
    ///
    /// # Errors
    /// Fails fast when the input width disagrees with the first layer.
    pub fn forward<R: Rng + ?Sized>(
        &self,
        x: &Ten64,
        mode: Mode,
        rng: &mut R,
    ) -> Result<(Ten64, Tape)> {
        let mut tape = Tape::new();
        let mut h = x.clone();
        let last = self.layers.len() - 1;

        for (i, layer) in self.layers.iter().enumerate() {
            let (z, back) = backprop::affine(&h, &layer.weight.value, &layer.bias.value)?;
            tape.record(Some(i), move |g| {
                let (dx, dw, db) = back(g);
                NodeGrads {
                    input: dx,
                    weight: Some(dw),
                    bias: Some(db),
                }
            });
            h = z;

            if i < last {
                let (a, back) = backprop::relu(&h);
                tape.record(None, move |g| NodeGrads {
                    input: back(g),
                    weight: None,
                    bias: None,
                });
                h = a;

                if mode.is_train() && self.dropout > 0.0 {
                    let (d, back) = backprop::dropout(&h, self.dropout, rng)?;
                    tape.record(None, move |g| NodeGrads {
                        input: back(g),
                        weight: None,
                        bias: None,
                    });
                    h = d;
                }
            }
        }

        Ok((h, tape))
    }

    /// Closure-free forward pass for evaluation.
    ///
    /// Equivalent to [`Mlp::forward`] in [`Mode::Eval`] but records nothing:
    /// no graph is built, no gradient state is touched, and the result is
    /// deterministic for fixed parameters and input.
    pub fn infer(&self, x: &Ten64) -> Result<Ten64> {
        let mut h = x.clone();
        let last = self.layers.len() - 1;

        for (i, layer) in self.layers.iter().enumerate() {
            h = cpu::affine_forward(&h, &layer.weight.value, &layer.bias.value)?;
            if i < last {
                h = cpu::relu_forward(&h);
            }
        }

        Ok(h)
    }

    /// Zeroes every parameter's gradient buffer.
    pub fn zero_grad(&mut self) {
        for layer in &mut self.layers {
            layer.weight.zero_grad();
            layer.bias.zero_grad();
        }
    }

    /// Applies one SGD step to every parameter tensor, consuming and
    /// resetting the gradient buffers.
    pub fn step(&mut self, lr: f64) {
        for layer in &mut self.layers {
            backprop::sgd(&mut layer.weight, lr);
            backprop::sgd(&mut layer.bias, lr);
        }
    }
}
