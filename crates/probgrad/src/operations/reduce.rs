//! Per-axis kernels: reduction, replication, scans, and queries.
//!
//! Each kernel walks the tensor as `(inner, extent, outer)` blocks around
//! the target axis; see [`axis_split`].

use crate::error::GraphError;
use crate::operations::Comparison;
use crate::scalar::Real;
use crate::strides::{axis_split, insert_axis, remove_axis};
use crate::tensor::DenseTensor;

fn check_axis(ndim: usize, dim: usize) -> Result<(), GraphError> {
    if dim >= ndim {
        return Err(GraphError::AxisOutOfRange { axis: dim, ndim });
    }
    Ok(())
}

/// Sum over axis `dim`, removing it.
///
/// # Examples
///
/// ```
/// use probgrad::DenseTensor;
/// use probgrad::operations::sum_axis;
///
/// let t = DenseTensor::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]).unwrap();
/// assert_eq!(sum_axis(&t, 1).unwrap().data(), &[9.0, 12.0]);
/// assert_eq!(sum_axis(&t, 0).unwrap().data(), &[3.0, 7.0, 11.0]);
/// ```
pub fn sum_axis<T: Real>(t: &DenseTensor<T>, dim: usize) -> Result<DenseTensor<T>, GraphError> {
    check_axis(t.ndim(), dim)?;
    let (inner, extent, outer) = axis_split(t.shape(), dim);
    let mut out = DenseTensor::zeros(&remove_axis(t.shape(), dim));
    let src = t.data();
    let dst = out.data_mut();
    for o in 0..outer {
        for j in 0..extent {
            let base = inner * (j + extent * o);
            for i in 0..inner {
                dst[i + inner * o] += src[base + i];
            }
        }
    }
    Ok(out)
}

/// Insert axis `dim` of length `size`, replicating the data along it.
///
/// `dim` may equal the rank, which appends a trailing axis.
pub fn broadcast_axis<T: Real>(
    t: &DenseTensor<T>,
    dim: usize,
    size: usize,
) -> Result<DenseTensor<T>, GraphError> {
    check_axis(t.ndim() + 1, dim)?;
    let shape = insert_axis(t.shape(), dim, size);
    let (inner, extent, outer) = axis_split(&shape, dim);
    let mut out = DenseTensor::zeros(&shape);
    let src = t.data();
    let dst = out.data_mut();
    for o in 0..outer {
        for j in 0..extent {
            let base = inner * (j + extent * o);
            dst[base..base + inner].copy_from_slice(&src[inner * o..inner * (o + 1)]);
        }
    }
    Ok(out)
}

/// Inclusive running sum along axis `dim`.
pub fn cumsum_axis<T: Real>(t: &DenseTensor<T>, dim: usize) -> Result<DenseTensor<T>, GraphError> {
    check_axis(t.ndim(), dim)?;
    let (inner, extent, outer) = axis_split(t.shape(), dim);
    let mut out = t.clone();
    let dst = out.data_mut();
    for o in 0..outer {
        for j in 1..extent {
            let prev = inner * (j - 1 + extent * o);
            let cur = inner * (j + extent * o);
            for i in 0..inner {
                let carried = dst[prev + i];
                dst[cur + i] += carried;
            }
        }
    }
    Ok(out)
}

/// Count, per slice along `dim`, the elements `e` with `e <cmp> threshold`.
///
/// `threshold` has the input's shape with `dim` removed; the result has the
/// same shape and holds the counts as element values.
///
/// # Examples
///
/// ```
/// use probgrad::DenseTensor;
/// use probgrad::operations::{Comparison, count_axis};
///
/// let cdf = DenseTensor::from_vec(vec![0.2, 0.5, 1.0], &[3]).unwrap();
/// let u = DenseTensor::scalar(0.4);
/// let n = count_axis(&cdf, 0, Comparison::Greater, &u).unwrap();
/// assert_eq!(n.data(), &[2.0]);
/// ```
pub fn count_axis<T: Real>(
    t: &DenseTensor<T>,
    dim: usize,
    cmp: Comparison,
    threshold: &DenseTensor<T>,
) -> Result<DenseTensor<T>, GraphError> {
    check_axis(t.ndim(), dim)?;
    let reduced = remove_axis(t.shape(), dim);
    if threshold.shape() != reduced.as_slice() {
        return Err(GraphError::ShapeMismatch {
            left: reduced,
            right: threshold.shape().to_vec(),
        });
    }
    let (inner, extent, outer) = axis_split(t.shape(), dim);
    let mut counts = vec![0usize; inner * outer];
    let src = t.data();
    let bound = threshold.data();
    for o in 0..outer {
        for j in 0..extent {
            let base = inner * (j + extent * o);
            for i in 0..inner {
                if cmp.holds(src[base + i], bound[i + inner * o]) {
                    counts[i + inner * o] += 1;
                }
            }
        }
    }
    let data = counts.into_iter().map(|c| T::from_f64(c as f64)).collect();
    DenseTensor::from_vec(data, &reduced)
}

/// Index of the maximum along `dim` for every slice, in column-major order
/// of the remaining axes. Ties resolve to the first index.
pub fn argmax_axis<T: Real>(t: &DenseTensor<T>, dim: usize) -> Result<Vec<usize>, GraphError> {
    check_axis(t.ndim(), dim)?;
    let (inner, extent, outer) = axis_split(t.shape(), dim);
    let src = t.data();
    let mut result = Vec::with_capacity(inner * outer);
    for o in 0..outer {
        for i in 0..inner {
            let mut best = 0;
            for j in 1..extent {
                let here = src[i + inner * (j + extent * o)];
                let top = src[i + inner * (best + extent * o)];
                if here > top {
                    best = j;
                }
            }
            result.push(best);
        }
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DenseTensor<f64> {
        // shape [2, 3, 2], values 0..12 in storage order
        DenseTensor::from_vec((0..12).map(|x| x as f64).collect(), &[2, 3, 2]).unwrap()
    }

    #[test]
    fn test_sum_middle_axis() {
        let s = sum_axis(&sample(), 1).unwrap();
        assert_eq!(s.shape(), &[2, 2]);
        // [i, :, k] = i + 2j + 6k summed over j = 3i + 6 + 18k
        for i in 0..2 {
            for k in 0..2 {
                assert_eq!(s.get(&[i, k]), Some(&((3 * i + 6 + 18 * k) as f64)));
            }
        }
    }

    #[test]
    fn test_broadcast_then_sum_scales() {
        let t = sample();
        for dim in 0..=3 {
            let b = broadcast_axis(&t, dim, 4).unwrap();
            assert_eq!(b.shape()[dim], 4);
            let back = sum_axis(&b, dim).unwrap();
            assert_eq!(back.shape(), t.shape());
            for (x, y) in back.data().iter().zip(t.data()) {
                assert_eq!(*x, 4.0 * y);
            }
        }
    }

    #[test]
    fn test_broadcast_values() {
        let v = DenseTensor::from_vec(vec![1.0, 2.0], &[2]).unwrap();
        let b = broadcast_axis(&v, 0, 3).unwrap();
        assert_eq!(b.shape(), &[3, 2]);
        assert_eq!(b.get(&[2, 1]), Some(&2.0));
        assert!(broadcast_axis(&v, 2, 3).is_err());
    }

    #[test]
    fn test_cumsum() {
        let t = DenseTensor::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]).unwrap();
        let c = cumsum_axis(&t, 1).unwrap();
        // rows are [1,3,5] and [2,4,6]
        assert_eq!(c.data(), &[1.0, 2.0, 4.0, 6.0, 9.0, 12.0]);
        let c0 = cumsum_axis(&t, 0).unwrap();
        assert_eq!(c0.data(), &[1.0, 3.0, 3.0, 7.0, 5.0, 11.0]);
    }

    #[test]
    fn test_count_threshold_shape() {
        let t = sample();
        let threshold = DenseTensor::filled(5.0, &[2, 2]);
        let n = count_axis(&t, 1, Comparison::Greater, &threshold).unwrap();
        // slice [0, :, 0] = {0, 2, 4}: none above 5; [0, :, 1] = {6, 8, 10}: all
        assert_eq!(n.get(&[0, 0]), Some(&0.0));
        assert_eq!(n.get(&[0, 1]), Some(&3.0));
        let bad = DenseTensor::filled(5.0, &[2]);
        assert!(count_axis(&t, 1, Comparison::Greater, &bad).is_err());
    }

    #[test]
    fn test_argmax() {
        let t = DenseTensor::from_vec(vec![0.1, 0.9, 0.7, 0.2, 0.2, 0.5], &[2, 3]).unwrap();
        // rows: [0.1, 0.7, 0.2] and [0.9, 0.2, 0.5]
        assert_eq!(argmax_axis(&t, 1).unwrap(), vec![1, 0]);
        assert_eq!(argmax_axis(&t, 0).unwrap(), vec![1, 0, 1]);
        assert!(argmax_axis(&t, 2).is_err());
    }
}
