//! Loop-based reference contraction.

use crate::contract::ContractionPlan;
use crate::operations::permutedims;
use crate::scalar::Real;
use crate::strides::{cartesian_to_linear, linear_to_cartesian};
use crate::tensor::DenseTensor;

/// Contract `a` and `b` by direct summation over the contracted index space.
///
/// Works for any [`Real`] element type; used when the `gemm` feature is off
/// and as the reference the GEMM kernel is tested against.
pub fn contract_naive<T: Real>(a: &DenseTensor<T>, b: &DenseTensor<T>, plan: &ContractionPlan) -> DenseTensor<T> {
    let contracted_shape: Vec<usize> = plan.axes.pairs.iter().map(|&(i, _)| a.shape()[i]).collect();
    let n_left = plan.uncontracted_a.len();
    let mut natural = DenseTensor::zeros(&plan.natural_shape);
    let mut idx_a = vec![0; a.ndim()];
    let mut idx_b = vec![0; b.ndim()];

    for out in 0..natural.len() {
        let free = linear_to_cartesian(out, &plan.natural_shape);
        for (k, &ax) in plan.uncontracted_a.iter().enumerate() {
            idx_a[ax] = free[k];
        }
        for (k, &ax) in plan.uncontracted_b.iter().enumerate() {
            idx_b[ax] = free[n_left + k];
        }

        let mut acc = T::zero();
        for c in 0..plan.dmid {
            let summed = linear_to_cartesian(c, &contracted_shape);
            for (&(i, j), &v) in plan.axes.pairs.iter().zip(&summed) {
                idx_a[i] = v;
                idx_b[j] = v;
            }
            acc += a.data()[cartesian_to_linear(&idx_a, a.strides())]
                * b.data()[cartesian_to_linear(&idx_b, b.strides())];
        }
        natural.data_mut()[out] = acc;
    }

    if plan.permute_c() {
        permutedims(&natural, &plan.perm_c).expect("plan permutations are validated")
    } else {
        natural
    }
}
