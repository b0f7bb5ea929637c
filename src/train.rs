//! The epoch loop: train, update, evaluate.
//!
//! Each epoch has two phases. TRAIN iterates the training batches — zero
//! gradients, forward in [`Mode::Train`], loss, backward over the tape, SGD
//! step. EVAL iterates the held-out batches with the closure-free inference
//! path, accumulating loss and argmax accuracy without touching gradient
//! state. The loop terminates after a fixed epoch count; checkpointing and
//! early stopping are caller-level concerns.
//!
//! A non-finite loss is logged and reported in the epoch stats but never
//! intercepted — divergence is a tuning concern, not an error.

use log::{debug, info, warn};
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::backprop;
use crate::data::Batch;
use crate::error::Result;
use crate::graph::Mode;
use crate::net::Mlp;
use crate::ops::cpu;

/// Loss and accuracy over a set of held-out batches.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvalReport {
    /// Mean cross-entropy over the evaluation batches.
    pub loss: f64,
    /// Fraction of rows whose argmax prediction equals the true label.
    pub accuracy: f64,
}

/// Per-epoch training and evaluation numbers produced by [`Trainer::fit`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochStats {
    pub epoch: usize,
    pub train_loss: f64,
    pub eval_loss: f64,
    pub eval_accuracy: f64,
}

/// Orchestrates the supervised training loop over a network it borrows.
///
/// The trainer owns the run's RNG so that dropout masks are reproducible when
/// seeded via [`Trainer::with_seed`].
pub struct Trainer {
    lr: f64,
    epochs: usize,
    rng: StdRng,
}

impl Trainer {
    /// Creates a trainer with a learning rate, an epoch count, and an
    /// OS-seeded RNG.
    pub fn new(lr: f64, epochs: usize) -> Self {
        Self {
            lr,
            epochs,
            rng: StdRng::from_os_rng(),
        }
    }

    /// Same as [`Trainer::new`] with a fixed RNG seed for reproducible runs.
    pub fn with_seed(lr: f64, epochs: usize, seed: u64) -> Self {
        Self {
            lr,
            epochs,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// The configured learning rate.
    pub fn learning_rate(&self) -> f64 {
        self.lr
    }

    /// One full pass over the training batches.
    ///
    /// Per batch: zero gradients, recording forward, cross-entropy loss,
    /// reverse tape traversal, SGD step.
    ///
    /// # Returns
    /// Mean batch loss for the epoch (0.0 when no batches are given).
    ///
    /// # Errors
    /// Propagates shape and label-range violations from the forward and loss
    /// computations.
    pub fn train_epoch(&mut self, net: &mut Mlp, batches: &[Batch]) -> Result<f64> {
        if batches.is_empty() {
            debug!("train_epoch called with no batches");
            return Ok(0.0);
        }

        let mut total = 0.0;
        for batch in batches {
            net.zero_grad();

            let (logits, tape) = net.forward(batch.inputs(), Mode::Train, &mut self.rng)?;
            let (loss, back) = backprop::cross_entropy_from_logits(&logits, batch.labels())?;
            total += loss;

            let seed = back(1.0);
            tape.backward(seed, net.layers_mut())?;
            net.step(self.lr);
        }

        Ok(total / batches.len() as f64)
    }

    /// Measures loss and accuracy on held-out batches.
    ///
    /// Runs the predictor with regularization disabled and no graph
    /// retention; parameters and gradient buffers are untouched, so repeated
    /// calls on the same state yield identical numbers.
    ///
    /// # Errors
    /// Propagates shape and label-range violations.
    pub fn evaluate(&self, net: &Mlp, batches: &[Batch]) -> Result<EvalReport> {
        let mut loss_sum = 0.0;
        let mut correct = 0usize;
        let mut rows = 0usize;

        for batch in batches {
            let logits = net.infer(batch.inputs())?;
            loss_sum += cpu::mean_nll(&logits, batch.labels())?;

            let predicted = cpu::argmax_rows(&logits);
            correct += predicted
                .iter()
                .zip(batch.labels())
                .filter(|(p, l)| p == l)
                .count();
            rows += batch.len();
        }

        Ok(EvalReport {
            loss: loss_sum / batches.len().max(1) as f64,
            accuracy: correct as f64 / rows.max(1) as f64,
        })
    }

    /// Runs the full loop: TRAIN then EVAL per epoch, for the configured
    /// number of epochs.
    ///
    /// All labels are validated against the network's class count up front,
    /// so a bad batch fails before any parameter is touched.
    ///
    /// # Errors
    /// Propagates the first shape or label-range violation encountered.
    pub fn fit(
        &mut self,
        net: &mut Mlp,
        train_batches: &[Batch],
        eval_batches: &[Batch],
    ) -> Result<Vec<EpochStats>> {
        for batch in train_batches.iter().chain(eval_batches) {
            batch.validate_labels(net.num_classes())?;
        }

        let mut stats = Vec::with_capacity(self.epochs);

        for epoch in 0..self.epochs {
            let train_loss = self.train_epoch(net, train_batches)?;
            if !train_loss.is_finite() {
                warn!("epoch {epoch}: non-finite training loss {train_loss}; learning rate may be too large");
            }

            let report = self.evaluate(net, eval_batches)?;
            info!(
                "epoch {epoch}: train_loss={train_loss:.6} eval_loss={:.6} eval_acc={:.4}",
                report.loss, report.accuracy
            );

            stats.push(EpochStats {
                epoch,
                train_loss,
                eval_loss: report.loss,
                eval_accuracy: report.accuracy,
            });
        }

        Ok(stats)
    }
}
