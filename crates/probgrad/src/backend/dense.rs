//! `f64` backend over [`DenseTensor`].

use rand::Rng;

use crate::backend::ArrayBackend;
use crate::contract::ContractionPlan;
use crate::error::GraphError;
use crate::operations::{
    BinaryOp, Comparison, UnaryOp, argmax_axis, broadcast_axis, count_axis, cumsum_axis, sum_axis,
};
use crate::tensor::DenseTensor;

/// Dense column-major `f64` arrays.
///
/// Contraction goes through faer's GEMM when the `gemm` feature is enabled
/// and through the naive kernel otherwise.
#[derive(Debug, Clone, Copy, Default)]
pub struct DenseBackend;

const VALIDATED: &str = "arguments validated when the graph node was built";

impl ArrayBackend for DenseBackend {
    type Elem = f64;
    type Array = DenseTensor<f64>;

    fn shape(a: &DenseTensor<f64>) -> Vec<usize> {
        a.shape().to_vec()
    }

    fn fill(value: f64, shape: &[usize]) -> DenseTensor<f64> {
        DenseTensor::filled(value, shape)
    }

    fn from_elems(data: Vec<f64>, shape: &[usize]) -> Result<DenseTensor<f64>, GraphError> {
        DenseTensor::from_vec(data, shape)
    }

    fn to_elems(a: &DenseTensor<f64>) -> Vec<f64> {
        a.data().to_vec()
    }

    fn random_normal<R: Rng + ?Sized>(shape: &[usize], rng: &mut R) -> DenseTensor<f64> {
        DenseTensor::randn_with_rng(shape, rng)
    }

    fn get(a: &DenseTensor<f64>, index: &[usize]) -> f64 {
        *a.get(index).expect(VALIDATED)
    }

    fn put(a: &mut DenseTensor<f64>, index: &[usize], value: f64) {
        a.set(index, value).expect(VALIDATED);
    }

    fn count(
        a: &DenseTensor<f64>,
        dim: usize,
        cmp: Comparison,
        threshold: &DenseTensor<f64>,
    ) -> DenseTensor<f64> {
        count_axis(a, dim, cmp, threshold).expect(VALIDATED)
    }

    fn argmax(a: &DenseTensor<f64>, dim: usize) -> Vec<usize> {
        argmax_axis(a, dim).expect(VALIDATED)
    }

    fn map(op: UnaryOp, a: &DenseTensor<f64>) -> DenseTensor<f64> {
        a.map(|x| op.apply(x))
    }

    fn zip(op: BinaryOp, a: &DenseTensor<f64>, b: &DenseTensor<f64>) -> DenseTensor<f64> {
        a.zip_with(b, |x, y| op.apply(x, y)).expect(VALIDATED)
    }

    fn cumsum(a: &DenseTensor<f64>, dim: usize) -> DenseTensor<f64> {
        cumsum_axis(a, dim).expect(VALIDATED)
    }

    fn reduce_sum(a: &DenseTensor<f64>, dim: usize) -> DenseTensor<f64> {
        sum_axis(a, dim).expect(VALIDATED)
    }

    fn broadcast(a: &DenseTensor<f64>, dim: usize, size: usize) -> DenseTensor<f64> {
        broadcast_axis(a, dim, size).expect(VALIDATED)
    }

    fn sum_all(a: &DenseTensor<f64>) -> f64 {
        a.sum()
    }

    #[cfg(feature = "gemm")]
    fn tensordot(a: &DenseTensor<f64>, b: &DenseTensor<f64>, plan: &ContractionPlan) -> DenseTensor<f64> {
        crate::contract::contract_gemm(a, b, plan)
    }

    #[cfg(not(feature = "gemm"))]
    fn tensordot(a: &DenseTensor<f64>, b: &DenseTensor<f64>, plan: &ContractionPlan) -> DenseTensor<f64> {
        crate::contract::contract_naive(a, b, plan)
    }
}
