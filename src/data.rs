//! Validated input/label batches.
//!
//! Dataset acquisition, shuffling, and normalization live with the caller;
//! the trainer consumes slices of prepared [`Batch`]es. A batch is immutable
//! once built, and construction checks that every input row has a label.

use crate::error::{Error, Result};
use crate::tensors::Ten64;

/// A fixed set of `(input row, integer class label)` pairs.
#[derive(Debug, Clone)]
pub struct Batch {
    inputs: Ten64,
    labels: Vec<usize>,
}

impl Batch {
    /// Builds a batch from a `[rows, width]` input tensor and one label per row.
    ///
    /// # Errors
    /// Fails unless `inputs` is rank-2 and `labels.len()` equals its row count.
    pub fn new(inputs: Ten64, labels: Vec<usize>) -> Result<Self> {
        if inputs.shape.len() != 2 {
            return Err(Error::ShapeMismatch {
                what: "batch input rank",
                got: inputs.shape.len(),
                expected: 2,
            });
        }
        if labels.len() != inputs.shape[0] {
            return Err(Error::ShapeMismatch {
                what: "labels",
                got: labels.len(),
                expected: inputs.shape[0],
            });
        }
        Ok(Self { inputs, labels })
    }

    /// The input rows, shape `[rows, width]`.
    pub fn inputs(&self) -> &Ten64 {
        &self.inputs
    }

    /// One class label per input row.
    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    /// Number of rows in the batch.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Whether the batch holds no rows.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Checks every label against the class count. [`Trainer::fit`] runs this
    /// over all batches before training starts.
    ///
    /// [`Trainer::fit`]: crate::train::Trainer::fit
    ///
    /// # Errors
    /// Returns [`Error::LabelOutOfRange`] for the first label at or beyond
    /// `classes`.
    pub fn validate_labels(&self, classes: usize) -> Result<()> {
        for &label in &self.labels {
            if label >= classes {
                return Err(Error::LabelOutOfRange { label, classes });
            }
        }
        Ok(())
    }
}
