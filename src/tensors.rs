//! Core tensor data structures and gradient wrappers.
//!
//! This module defines the core logic for representing and computing with
//! multi-dimensional arrays, or tensors.
//!
//! It supports:
//! - Construction of N-dimensional tensors with shape and row-major data layout
//! - Zero-filled construction for gradient and activation buffers
//! - `WithGrad<T>` wrappers pairing a parameter with its gradient buffer
//! - Compile-time tensor macros
//!
//! ## Design Highlights
//! - Tensors are strongly typed: `Tensor<T>` for any element type; the
//!   training pipeline computes in `f64` via the [`Ten64`] alias
//! - Shape is stored as a `Vec<usize>` and enforced at runtime
//! - A parameter's gradient buffer always has the parameter's shape
//! - The `tensor!` macro supports ergonomic tensor creation from nested arrays
//!
//! ## Limitations
//! - Row-major only
//! - No broadcasting, slicing, or shape inference
//!
//! ## Example
//!
//! ```rust
//! use gradnet::tensors::Tensor;
//! let t = Tensor::new(vec![2, 3], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
//! assert_eq!(t.shape, vec![2, 3]);
//! ```

/// Represents an N-dimensional tensor with a shape and flat row-major data.
///
/// - All elements must be the same type (`T`).
/// - `shape` defines the structure, e.g., `[2, 3]` for a 2×3 matrix.
/// - `data` holds the flattened content in row-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor<T> {
    pub shape: Vec<usize>,
    pub data: Vec<T>,
}

/// The tensor type used throughout the training pipeline.
pub type Ten64 = Tensor<f64>;

impl<T> Tensor<T> {
    /// Creates a new tensor with the given shape and flat data.
    ///
    /// # Panics
    /// Panics if the number of elements in `data` does not match the shape product.
    pub fn new(shape: impl Into<Vec<usize>>, data: Vec<T>) -> Self {
        let shape = shape.into();
        assert_eq!(
            shape.iter().product::<usize>(),
            data.len(),
            "shape {:?} is incompatible with {} data elements",
            shape,
            data.len()
        );
        Self { shape, data }
    }

    /// Number of elements in the tensor.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the tensor holds no elements.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl<T: Clone + Default> Tensor<T> {
    /// Creates a zero-filled (default-filled) tensor of the given shape.
    pub fn zeros(shape: impl Into<Vec<usize>>) -> Self {
        let shape = shape.into();
        let len = shape.iter().product();
        Self {
            shape,
            data: vec![T::default(); len],
        }
    }
}

/// A container for tracking gradients of values (used in autograd).
///
/// Typically used as `WithGrad<Ten64>` for parameter tensors. The gradient
/// buffer is overwritten by zeroing before each backward pass and accumulated
/// during it; the update step consumes and resets it.
#[derive(Debug, Clone)]
pub struct WithGrad<T> {
    pub value: T,
    pub grad: T,
}

impl WithGrad<Ten64> {
    /// Wraps a tensor with a zeroed gradient buffer of the same shape.
    ///
    /// # Example
    /// ```rust
    /// use gradnet::{tensor, tensors::WithGrad};
    /// let w = WithGrad::new(tensor!([[1.0, 2.0], [3.0, 4.0]]));
    /// assert_eq!(w.grad.data, vec![0.0; 4]);
    /// ```
    pub fn new(value: Ten64) -> Self {
        let grad = Ten64::zeros(value.shape.clone());
        Self { value, grad }
    }

    /// Resets the gradient buffer to zero.
    ///
    /// Must be called before each backward pass; a stale buffer silently
    /// accumulates gradients across unrelated batches.
    pub fn zero_grad(&mut self) {
        for g in &mut self.grad.data {
            *g = 0.0;
        }
    }
}

/// Defines a tensor from nested literal arrays.
///
/// Supports arbitrary dimensionality as long as sublists are uniform in shape.
/// Innermost elements may be any `f64` expression, negative literals included.
///
/// # Example
/// ```
/// use gradnet::tensor;
/// let t = tensor!([[1.0, -2.0], [3.0, 4.0]]);
/// assert_eq!(t.shape, vec![2, 2]);
/// ```
#[macro_export]
macro_rules! tensor {
    // Nested case: every element is itself a bracketed array. Must come
    // before the leaf arm, since `[1.0, 2.0]` also parses as an expression.
    ([ $( [ $( $inner:tt )* ] ),+ $(,)? ]) => {{
        let children = vec![ $( tensor!([ $( $inner )* ]) ),+ ];
        let first_shape = &children[0].shape;
        assert!(children.iter().all(|c| c.shape == *first_shape),
            "ragged tensor literal (rows have mismatched shapes)");
        let mut shape = vec![children.len()];
        shape.extend_from_slice(first_shape);
        let mut data = Vec::with_capacity(children.len() * children[0].data.len());
        for c in children { data.extend(c.data); }
        $crate::tensors::Tensor::new(shape, data)
    }};

    // Leaf row of scalar expressions.
    ([ $( $x:expr ),+ $(,)? ]) => {{
        let data = vec![ $( $x ),+ ];
        let shape = vec![data.len()];
        $crate::tensors::Tensor::new(shape, data)
    }};

    // Bare scalar.
    ($x:expr) => {
        $crate::tensors::Tensor::new(Vec::<usize>::new(), vec![$x])
    };
}
