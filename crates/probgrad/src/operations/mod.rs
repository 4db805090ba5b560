//! Dense tensor operations.
//!
//! ```text
//! Level 1: elementwise tags (UnaryOp, BinaryOp, Comparison)
//!     → evaluated per element by backends and the scalar graph
//!
//! Level 2: axis kernels (sum/broadcast/cumsum/count/argmax, permutedims)
//!     → DenseTensor in, DenseTensor out, axis arguments validated
//! ```

mod elementwise;
mod permutedims;
mod reduce;

pub use elementwise::{BinaryOp, Comparison, UnaryOp};
pub use permutedims::{is_identity_permutation, permutedims};
pub use reduce::{argmax_axis, broadcast_axis, count_axis, cumsum_axis, sum_axis};
