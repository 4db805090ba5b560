//! Column-major stride and axis bookkeeping.
//!
//! Storage is column-major (first index fastest) so dense tensors can be
//! viewed as faer matrices without copying.

/// Compute column-major strides from shape.
///
/// For shape [d0, d1, d2, ...], returns strides [1, d0, d0*d1, ...].
///
/// # Examples
///
/// ```
/// use probgrad::strides::compute_strides;
///
/// assert_eq!(compute_strides(&[3, 4, 5]), vec![1, 3, 12]);
/// assert_eq!(compute_strides(&[]), Vec::<usize>::new());
/// ```
pub fn compute_strides(shape: &[usize]) -> Vec<usize> {
    let mut stride = 1;
    shape
        .iter()
        .map(|&dim| {
            let current = stride;
            stride *= dim;
            current
        })
        .collect()
}

/// Linear storage offset of a cartesian index.
#[inline]
pub fn cartesian_to_linear(indices: &[usize], strides: &[usize]) -> usize {
    indices
        .iter()
        .zip(strides.iter())
        .map(|(&idx, &stride)| idx * stride)
        .sum()
}

/// Cartesian index of a linear storage offset.
pub fn linear_to_cartesian(mut linear: usize, shape: &[usize]) -> Vec<usize> {
    let mut indices = Vec::with_capacity(shape.len());
    for &dim in shape.iter() {
        indices.push(linear % dim);
        linear /= dim;
    }
    indices
}

/// Shape with axis `dim` dropped.
pub fn remove_axis(shape: &[usize], dim: usize) -> Vec<usize> {
    shape
        .iter()
        .enumerate()
        .filter(|&(i, _)| i != dim)
        .map(|(_, &d)| d)
        .collect()
}

/// Shape with a new axis of `size` inserted at position `dim`.
pub fn insert_axis(shape: &[usize], dim: usize, size: usize) -> Vec<usize> {
    let mut out = shape.to_vec();
    out.insert(dim, size);
    out
}

/// Split a shape around axis `dim` into `(inner, extent, outer)`.
///
/// In column-major order the element `(i, j, o)` (inner offset `i`, position
/// `j` along `dim`, outer offset `o`) lives at `i + inner * (j + extent * o)`.
/// Every per-axis kernel in [`crate::operations`] walks tensors this way.
///
/// # Examples
///
/// ```
/// use probgrad::strides::axis_split;
///
/// assert_eq!(axis_split(&[2, 3, 4], 1), (2, 3, 4));
/// assert_eq!(axis_split(&[2, 3, 4], 0), (1, 2, 12));
/// ```
pub fn axis_split(shape: &[usize], dim: usize) -> (usize, usize, usize) {
    let inner = shape[..dim].iter().product();
    let extent = shape[dim];
    let outer = shape[dim + 1..].iter().product();
    (inner, extent, outer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_strides() {
        assert_eq!(compute_strides(&[3, 4, 5]), vec![1, 3, 12]);
        assert_eq!(compute_strides(&[5]), vec![1]);
        assert!(compute_strides(&[]).is_empty());
    }

    #[test]
    fn test_roundtrip() {
        let shape = [3, 4, 5];
        let strides = compute_strides(&shape);
        for linear in 0..60 {
            let cartesian = linear_to_cartesian(linear, &shape);
            assert_eq!(cartesian_to_linear(&cartesian, &strides), linear);
        }
    }

    #[test]
    fn test_axis_edit() {
        assert_eq!(remove_axis(&[2, 3, 4], 1), vec![2, 4]);
        assert_eq!(remove_axis(&[7], 0), Vec::<usize>::new());
        assert_eq!(insert_axis(&[2, 4], 1, 3), vec![2, 3, 4]);
        assert_eq!(insert_axis(&[], 0, 5), vec![5]);
    }

    #[test]
    fn test_axis_split_matches_strides() {
        let shape = [2, 3, 4];
        let strides = compute_strides(&shape);
        let (inner, extent, _) = axis_split(&shape, 1);
        // [1, 2, 3] -> 1 + 2 * (2 + 3 * 3)
        assert_eq!(
            cartesian_to_linear(&[1, 2, 3], &strides),
            1 + inner * (2 + extent * 3)
        );
    }
}
