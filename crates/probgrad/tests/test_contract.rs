//! Cross-checks of the contraction kernels on randomly permuted layouts.

use approx::assert_relative_eq;
use probgrad::DenseTensor;
use probgrad::contract::{ContractionPlan, DotAxes, contract_naive};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Random contraction of two rank-3 tensors over `k` axis pairs with a
/// shuffled result layout.
fn random_case(rng: &mut ChaCha8Rng, k: usize) -> (DenseTensor<f64>, DenseTensor<f64>, DotAxes) {
    let mut axes_a: Vec<usize> = (0..3).collect();
    let mut axes_b: Vec<usize> = (0..3).collect();
    axes_a.shuffle(rng);
    axes_b.shuffle(rng);

    let mut shape_a = [0usize; 3];
    let mut shape_b = [0usize; 3];
    for ax in 0..3 {
        shape_a[ax] = rng.random_range(1..4);
        shape_b[ax] = rng.random_range(1..4);
    }
    let pairs: Vec<(usize, usize)> = axes_a[..k].iter().copied().zip(axes_b[..k].iter().copied()).collect();
    for &(i, j) in &pairs {
        shape_b[j] = shape_a[i];
    }

    let mut slots: Vec<usize> = (0..(6 - 2 * k)).collect();
    slots.shuffle(rng);
    let a_to_result = axes_a[k..].iter().copied().zip(slots[..3 - k].iter().copied()).collect();
    let b_to_result = axes_b[k..].iter().copied().zip(slots[3 - k..].iter().copied()).collect();

    let a = DenseTensor::<f64>::randn_with_rng(&shape_a, rng);
    let b = DenseTensor::<f64>::randn_with_rng(&shape_b, rng);
    (a, b, DotAxes::new(pairs, a_to_result, b_to_result))
}

/// Direct definition: loop over every full index assignment.
fn brute_force(a: &DenseTensor<f64>, b: &DenseTensor<f64>, axes: &DotAxes, result_shape: &[usize]) -> DenseTensor<f64> {
    let mut out = DenseTensor::zeros(result_shape);
    for la in 0..a.len() {
        let ia = unravel(la, a.shape());
        for lb in 0..b.len() {
            let ib = unravel(lb, b.shape());
            if axes.pairs.iter().any(|&(i, j)| ia[i] != ib[j]) {
                continue;
            }
            let mut ic = vec![0; result_shape.len()];
            for &(ax, pos) in &axes.a_to_result {
                ic[pos] = ia[ax];
            }
            for &(ax, pos) in &axes.b_to_result {
                ic[pos] = ib[ax];
            }
            let cur = *out.get(&ic).unwrap();
            out.set(&ic, cur + a.data()[la] * b.data()[lb]).unwrap();
        }
    }
    out
}

fn unravel(mut linear: usize, shape: &[usize]) -> Vec<usize> {
    shape
        .iter()
        .map(|&d| {
            let i = linear % d;
            linear /= d;
            i
        })
        .collect()
}

#[test]
fn test_naive_matches_definition() {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    for trial in 0..40 {
        let (a, b, axes) = random_case(&mut rng, trial % 4);
        let plan = ContractionPlan::new(a.shape(), b.shape(), &axes).unwrap();
        let expected = brute_force(&a, &b, &axes, &plan.result_shape);
        let got = contract_naive(&a, &b, &plan);
        assert_eq!(got.shape(), expected.shape());
        for (x, y) in got.data().iter().zip(expected.data()) {
            assert_relative_eq!(x, y, epsilon = 1e-12);
        }
    }
}

#[cfg(feature = "gemm")]
#[test]
fn test_gemm_matches_naive() {
    use probgrad::contract::contract_gemm;

    let mut rng = ChaCha8Rng::seed_from_u64(7);
    for trial in 0..40 {
        let (a, b, axes) = random_case(&mut rng, trial % 4);
        let plan = ContractionPlan::new(a.shape(), b.shape(), &axes).unwrap();
        let naive = contract_naive(&a, &b, &plan);
        let gemm = contract_gemm(&a, &b, &plan);
        assert_eq!(gemm.shape(), naive.shape());
        for (x, y) in gemm.data().iter().zip(naive.data()) {
            assert_relative_eq!(x, y, epsilon = 1e-10);
        }
    }
}
