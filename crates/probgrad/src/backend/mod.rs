//! Numeric array backends for the tensor graph.
//!
//! The tensor graph never touches array storage directly; every forward and
//! backward rule is expressed through the static methods of
//! [`ArrayBackend`]. Shape preconditions are checked by the graph when a
//! node is built, so backend methods receive valid arguments and do not
//! return errors.
//!
//! # Backends
//!
//! - `DenseBackend`: `f64` over [`DenseTensor`](crate::DenseTensor), with
//!   faer GEMM contraction under the `gemm` feature

mod dense;
#[cfg(feature = "gemm")]
mod faer_interop;

use std::fmt::Debug;

use rand::Rng;

use crate::contract::ContractionPlan;
use crate::error::GraphError;
use crate::operations::{BinaryOp, Comparison, UnaryOp};
use crate::scalar::Real;

pub use dense::DenseBackend;
#[cfg(feature = "gemm")]
pub use faer_interop::AsFaerMat;

/// Array capability consumed by [`TensorValue`](crate::TensorValue).
pub trait ArrayBackend: 'static {
    /// Element type; also the type of scalar bridges into the `Value` graph.
    type Elem: Real;
    /// Owned array type.
    type Array: Clone + Debug + 'static;

    fn shape(a: &Self::Array) -> Vec<usize>;

    fn fill(value: Self::Elem, shape: &[usize]) -> Self::Array;

    /// Build an array from column-major elements.
    fn from_elems(data: Vec<Self::Elem>, shape: &[usize]) -> Result<Self::Array, GraphError>;

    /// Elements in column-major order.
    fn to_elems(a: &Self::Array) -> Vec<Self::Elem>;

    fn random_normal<R: Rng + ?Sized>(shape: &[usize], rng: &mut R) -> Self::Array;

    fn get(a: &Self::Array, index: &[usize]) -> Self::Elem;

    fn put(a: &mut Self::Array, index: &[usize], value: Self::Elem);

    /// Per-slice count of elements `e` along `dim` with `e <cmp> threshold`.
    fn count(a: &Self::Array, dim: usize, cmp: Comparison, threshold: &Self::Array) -> Self::Array;

    /// Per-slice index of the maximum along `dim`.
    fn argmax(a: &Self::Array, dim: usize) -> Vec<usize>;

    fn map(op: UnaryOp, a: &Self::Array) -> Self::Array;

    fn zip(op: BinaryOp, a: &Self::Array, b: &Self::Array) -> Self::Array;

    fn cumsum(a: &Self::Array, dim: usize) -> Self::Array;

    fn reduce_sum(a: &Self::Array, dim: usize) -> Self::Array;

    fn broadcast(a: &Self::Array, dim: usize, size: usize) -> Self::Array;

    fn sum_all(a: &Self::Array) -> Self::Elem;

    fn tensordot(a: &Self::Array, b: &Self::Array, plan: &ContractionPlan) -> Self::Array;
}
