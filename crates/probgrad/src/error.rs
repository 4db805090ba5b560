//! Error types for probgrad.

use thiserror::Error;

/// Errors raised while constructing graph nodes or dense tensors.
///
/// Every variant is a structural precondition failure: the graph is
/// rejected at construction time and no node is created.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GraphError {
    /// Binary elementwise operands (or a threshold) have different shapes.
    #[error("shape mismatch: {left:?} vs {right:?}")]
    ShapeMismatch { left: Vec<usize>, right: Vec<usize> },

    /// Data length does not match the element count of a shape.
    #[error("length mismatch: shape requires {expected} elements, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    /// Axis argument does not exist in the operand.
    #[error("axis {axis} out of range for tensor of rank {ndim}")]
    AxisOutOfRange { axis: usize, ndim: usize },

    /// Index out of bounds.
    #[error("index out of bounds: index {index} is out of range for dimension {dim_size}")]
    IndexOutOfBounds { index: usize, dim_size: usize },

    /// Wrong number of indices provided.
    #[error("wrong number of indices: expected {expected}, got {actual}")]
    WrongNumberOfIndices { expected: usize, actual: usize },

    /// Invalid permutation.
    #[error("invalid permutation {perm:?} for tensor with {ndim} dimensions")]
    InvalidPermutation { perm: Vec<usize>, ndim: usize },

    /// A contracted axis pair joins axes of different sizes.
    #[error("contracted axes a[{axis_a}] (size {size_a}) and b[{axis_b}] (size {size_b}) differ")]
    ContractionMismatch {
        axis_a: usize,
        axis_b: usize,
        size_a: usize,
        size_b: usize,
    },

    /// Contraction pairs or result-position maps are malformed.
    #[error("invalid contraction axes: {0}")]
    InvalidAxisMap(String),

    /// Comparison kind not understood by `count`.
    #[error("unsupported condition {0:?}")]
    UnsupportedCondition(String),

    /// A categorical distribution was given no categories.
    #[error("categorical distribution has no categories")]
    EmptySupport,
}
