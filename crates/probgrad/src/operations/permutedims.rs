//! Axis permutation for dense tensors.

use crate::error::GraphError;
use crate::scalar::Real;
use crate::strides::{cartesian_to_linear, linear_to_cartesian};
use crate::tensor::DenseTensor;

/// Reorder the axes of `tensor`: axis `i` of the result is axis `perm[i]`
/// of the input.
///
/// # Errors
///
/// Returns `GraphError::InvalidPermutation` if `perm` is not a permutation
/// of `0..ndim`.
///
/// # Examples
///
/// ```
/// use probgrad::DenseTensor;
/// use probgrad::operations::permutedims;
///
/// let t = DenseTensor::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]).unwrap();
/// let t2 = permutedims(&t, &[1, 0]).unwrap();
/// assert_eq!(t2.shape(), &[3, 2]);
/// assert_eq!(t.get(&[1, 0]), t2.get(&[0, 1]));
/// ```
pub fn permutedims<T: Real>(
    tensor: &DenseTensor<T>,
    perm: &[usize],
) -> Result<DenseTensor<T>, GraphError> {
    validate_permutation(perm, tensor.ndim())?;

    let shape: Vec<usize> = perm.iter().map(|&p| tensor.shape()[p]).collect();
    let mut out = DenseTensor::zeros(&shape);
    let out_strides = out.strides().to_vec();
    let dst = out.data_mut();
    for (linear, &x) in tensor.data().iter().enumerate() {
        let from = linear_to_cartesian(linear, tensor.shape());
        let to: Vec<usize> = perm.iter().map(|&p| from[p]).collect();
        dst[cartesian_to_linear(&to, &out_strides)] = x;
    }
    Ok(out)
}

/// True when `perm` leaves every axis in place, including the empty one.
pub fn is_identity_permutation(perm: &[usize]) -> bool {
    perm.iter().enumerate().all(|(i, &p)| i == p)
}

/// Check that `perm` names each of `0..ndim` exactly once.
fn validate_permutation(perm: &[usize], ndim: usize) -> Result<(), GraphError> {
    let mut seen = vec![false; ndim];
    let ok = perm.len() == ndim
        && perm
            .iter()
            .all(|&p| p < ndim && !std::mem::replace(&mut seen[p], true));
    if ok {
        Ok(())
    } else {
        Err(GraphError::InvalidPermutation {
            perm: perm.to_vec(),
            ndim,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permutedims_rank_three() {
        let data = (0..24).map(|x| x as f64).collect();
        let t = DenseTensor::from_vec(data, &[2, 3, 4]).unwrap();

        let moved = permutedims(&t, &[2, 0, 1]).unwrap();
        assert_eq!(moved.shape(), &[4, 2, 3]);
        for i in 0..2 {
            for j in 0..3 {
                for k in 0..4 {
                    assert_eq!(t.get(&[i, j, k]), moved.get(&[k, i, j]));
                }
            }
        }

        // [1, 2, 0] undoes [2, 0, 1]
        assert_eq!(permutedims(&moved, &[1, 2, 0]).unwrap(), t);
    }

    #[test]
    fn test_permutedims_invalid() {
        let t: DenseTensor<f64> = DenseTensor::zeros(&[2, 3]);
        assert!(permutedims(&t, &[0]).is_err());
        assert!(permutedims(&t, &[0, 2]).is_err());
        assert!(permutedims(&t, &[1, 1]).is_err());
        assert!(validate_permutation(&[], 0).is_ok());
    }

    #[test]
    fn test_identity_detection() {
        assert!(is_identity_permutation(&[0, 1, 2]));
        assert!(is_identity_permutation(&[]));
        assert!(!is_identity_permutation(&[1, 0]));
    }
}
