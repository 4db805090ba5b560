//! GEMM-based contraction using faer.
//!
//! Operands are permuted into `[free..., contracted...]` and
//! `[contracted..., free...]` layouts, viewed as column-major matrices and
//! multiplied with faer's `matmul`.

use std::borrow::Cow;

use faer::linalg::matmul::matmul;
use faer::{Accum, Par};

use crate::backend::AsFaerMat;
use crate::contract::ContractionPlan;
use crate::operations::permutedims;
use crate::tensor::DenseTensor;

fn permuted<'a>(t: &'a DenseTensor<f64>, perm: &[usize], needed: bool) -> Cow<'a, DenseTensor<f64>> {
    if needed {
        Cow::Owned(permutedims(t, perm).expect("plan permutations are validated"))
    } else {
        Cow::Borrowed(t)
    }
}

/// Contract `a` and `b` according to a validated `plan`.
///
/// # Example
///
/// ```
/// use probgrad::DenseTensor;
/// use probgrad::contract::{ContractionPlan, DotAxes, contract_gemm};
///
/// let a = DenseTensor::<f64>::ones(&[2, 3]);
/// let b = DenseTensor::<f64>::ones(&[3, 4]);
/// let plan = ContractionPlan::new(a.shape(), b.shape(), &DotAxes::pairs(&[(1, 0)], 2, 2)).unwrap();
/// let c = contract_gemm(&a, &b, &plan);
/// assert_eq!(c.shape(), &[2, 4]);
/// assert_eq!(c.data()[0], 3.0);
/// ```
pub fn contract_gemm(
    a: &DenseTensor<f64>,
    b: &DenseTensor<f64>,
    plan: &ContractionPlan,
) -> DenseTensor<f64> {
    if plan.result_shape.is_empty() {
        return contract_full(a, b, plan);
    }

    let a_work = permuted(a, &plan.perm_a, plan.permute_a());
    let b_work = permuted(b, &plan.perm_b, plan.permute_b());

    let (m, k, n) = (plan.dleft, plan.dmid, plan.dright);
    let mut c = DenseTensor::<f64>::zeros(&[m, n]);
    if m * k * n > 0 {
        let a_mat = a_work.as_faer_mat(m, k);
        let b_mat = b_work.as_faer_mat(k, n);
        let mut c_mat = c.as_faer_mat_mut(m, n);
        matmul(c_mat.as_mut(), Accum::Replace, a_mat, b_mat, 1.0, Par::Seq);
    }

    let natural = c
        .reshape(&plan.natural_shape)
        .expect("natural shape has dleft * dright elements");
    if plan.permute_c() {
        permutedims(&natural, &plan.perm_c).expect("plan permutations are validated")
    } else {
        natural
    }
}

/// Full contraction to a rank-0 tensor.
fn contract_full(a: &DenseTensor<f64>, b: &DenseTensor<f64>, plan: &ContractionPlan) -> DenseTensor<f64> {
    let a_work = permuted(a, &plan.perm_a, plan.permute_a());
    let b_work = permuted(b, &plan.perm_b, plan.permute_b());
    let dot = a_work
        .data()
        .iter()
        .zip(b_work.data())
        .map(|(x, y)| x * y)
        .sum();
    DenseTensor::scalar(dot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::{DotAxes, contract_naive};
    use approx::assert_relative_eq;

    fn sequential(shape: &[usize]) -> DenseTensor<f64> {
        let len = shape.iter().product();
        DenseTensor::from_vec((0..len).map(|x| x as f64 * 0.5 - 1.0).collect(), shape).unwrap()
    }

    fn check(shape_a: &[usize], shape_b: &[usize], axes: DotAxes) {
        let a = sequential(shape_a);
        let b = sequential(shape_b);
        let plan = ContractionPlan::new(shape_a, shape_b, &axes).unwrap();
        let fast = contract_gemm(&a, &b, &plan);
        let slow = contract_naive(&a, &b, &plan);
        assert_eq!(fast.shape(), slow.shape());
        for (x, y) in fast.data().iter().zip(slow.data()) {
            assert_relative_eq!(x, y, epsilon = 1e-10);
        }
    }

    #[test]
    fn test_gemm_matrix_multiply() {
        let a = DenseTensor::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]).unwrap();
        let b = DenseTensor::from_vec((1..=12).map(f64::from).collect(), &[3, 4]).unwrap();
        let plan = ContractionPlan::new(a.shape(), b.shape(), &DotAxes::pairs(&[(1, 0)], 2, 2)).unwrap();
        let c = contract_gemm(&a, &b, &plan);
        // C[0,0] = 1*1 + 3*2 + 5*3
        assert_relative_eq!(*c.get(&[0, 0]).unwrap(), 22.0);
        // C[1,3] = 2*10 + 4*11 + 6*12
        assert_relative_eq!(*c.get(&[1, 3]).unwrap(), 136.0);
    }

    #[test]
    fn test_gemm_matches_naive() {
        check(&[2, 3], &[3, 4], DotAxes::pairs(&[(1, 0)], 2, 2));
        check(&[3, 2], &[4, 3], DotAxes::pairs(&[(0, 1)], 2, 2));
        check(&[2, 3, 4], &[4, 3, 5], DotAxes::pairs(&[(1, 1), (2, 0)], 3, 3));
        check(&[2, 3], &[4], DotAxes::pairs(&[], 2, 1));
        check(&[2, 3], &[3, 2], DotAxes::pairs(&[(0, 1), (1, 0)], 2, 2));
        check(
            &[2, 3, 4],
            &[5, 6, 3],
            DotAxes::new(vec![(1, 2)], vec![(0, 2), (2, 0)], vec![(0, 1), (1, 3)]),
        );
    }

    #[test]
    fn test_zero_extent() {
        check(&[0, 3], &[3, 4], DotAxes::pairs(&[(1, 0)], 2, 2));
        check(&[2, 0], &[0, 4], DotAxes::pairs(&[(1, 0)], 2, 2));
    }
}
