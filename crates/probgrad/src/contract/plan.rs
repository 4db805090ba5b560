//! Contraction axis bookkeeping.
//!
//! A contraction is described by [`DotAxes`]: which axis pairs are summed
//! and where every surviving axis lands in the result. [`ContractionPlan`]
//! validates that description against concrete shapes and lays the
//! operation out as a single matrix product:
//!
//! ```text
//! A --perm_a--> [uncontracted_a..., contracted...]   (dleft x dmid)
//! B --perm_b--> [contracted..., uncontracted_b...]   (dmid x dright)
//! C  = A' * B'                                       (dleft x dright)
//!    --reshape--> [uncontracted_a..., uncontracted_b...]
//!    --perm_c---> result
//! ```

use crate::error::GraphError;
use crate::operations::is_identity_permutation;

/// Contracted axis pairs plus the result position of every uncontracted axis.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DotAxes {
    /// `(axis of a, axis of b)` pairs summed over.
    pub pairs: Vec<(usize, usize)>,
    /// `(axis of a, result position)` for each uncontracted axis of `a`.
    pub a_to_result: Vec<(usize, usize)>,
    /// `(axis of b, result position)` for each uncontracted axis of `b`.
    pub b_to_result: Vec<(usize, usize)>,
}

impl DotAxes {
    pub fn new(
        pairs: Vec<(usize, usize)>,
        a_to_result: Vec<(usize, usize)>,
        b_to_result: Vec<(usize, usize)>,
    ) -> Self {
        Self {
            pairs,
            a_to_result,
            b_to_result,
        }
    }

    /// Contract `pairs` and keep the remaining axes in natural order:
    /// `a`'s uncontracted axes first, then `b`'s, each ascending.
    ///
    /// # Examples
    ///
    /// ```
    /// use probgrad::contract::DotAxes;
    ///
    /// // matrix product of [m, k] and [k, n]
    /// let axes = DotAxes::pairs(&[(1, 0)], 2, 2);
    /// assert_eq!(axes.a_to_result, vec![(0, 0)]);
    /// assert_eq!(axes.b_to_result, vec![(1, 1)]);
    /// ```
    pub fn pairs(pairs: &[(usize, usize)], rank_a: usize, rank_b: usize) -> Self {
        let free_a: Vec<usize> = (0..rank_a)
            .filter(|ax| !pairs.iter().any(|&(i, _)| i == *ax))
            .collect();
        let free_b: Vec<usize> = (0..rank_b)
            .filter(|ax| !pairs.iter().any(|&(_, j)| j == *ax))
            .collect();
        let a_to_result = free_a.iter().enumerate().map(|(p, &ax)| (ax, p)).collect();
        let b_to_result = free_b
            .iter()
            .enumerate()
            .map(|(p, &ax)| (ax, free_a.len() + p))
            .collect();
        Self::new(pairs.to_vec(), a_to_result, b_to_result)
    }
}

/// A validated contraction of two concrete shapes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractionPlan {
    pub axes: DotAxes,
    /// Uncontracted axes of `a`, ascending.
    pub uncontracted_a: Vec<usize>,
    /// Uncontracted axes of `b`, ascending.
    pub uncontracted_b: Vec<usize>,
    /// Result position of `uncontracted_a[k]`.
    pub positions_a: Vec<usize>,
    /// Result position of `uncontracted_b[k]`.
    pub positions_b: Vec<usize>,
    /// Product of uncontracted dimensions of `a`.
    pub dleft: usize,
    /// Product of contracted dimensions.
    pub dmid: usize,
    /// Product of uncontracted dimensions of `b`.
    pub dright: usize,
    /// Permutation bringing `a` to `[uncontracted..., contracted...]`.
    pub perm_a: Vec<usize>,
    /// Permutation bringing `b` to `[contracted..., uncontracted...]`.
    pub perm_b: Vec<usize>,
    /// Permutation taking the natural product layout to the result.
    pub perm_c: Vec<usize>,
    /// Shape of the product before `perm_c`.
    pub natural_shape: Vec<usize>,
    pub result_shape: Vec<usize>,
}

impl ContractionPlan {
    /// Validate `axes` against `shape_a`/`shape_b` and compute the layout.
    ///
    /// # Errors
    ///
    /// - `AxisOutOfRange` if a pair or map names an axis the operand lacks.
    /// - `ContractionMismatch` if a pair joins axes of different sizes.
    /// - `InvalidAxisMap` if an axis is contracted twice, the maps do not
    ///   cover exactly the uncontracted axes, or the result positions are
    ///   not a permutation of `0..rank`.
    pub fn new(shape_a: &[usize], shape_b: &[usize], axes: &DotAxes) -> Result<Self, GraphError> {
        let (rank_a, rank_b) = (shape_a.len(), shape_b.len());
        let mut contracted_a = vec![false; rank_a];
        let mut contracted_b = vec![false; rank_b];

        for &(i, j) in &axes.pairs {
            if i >= rank_a {
                return Err(GraphError::AxisOutOfRange {
                    axis: i,
                    ndim: rank_a,
                });
            }
            if j >= rank_b {
                return Err(GraphError::AxisOutOfRange {
                    axis: j,
                    ndim: rank_b,
                });
            }
            if contracted_a[i] || contracted_b[j] {
                return Err(GraphError::InvalidAxisMap(format!(
                    "pair ({i}, {j}) reuses a contracted axis"
                )));
            }
            if shape_a[i] != shape_b[j] {
                return Err(GraphError::ContractionMismatch {
                    axis_a: i,
                    axis_b: j,
                    size_a: shape_a[i],
                    size_b: shape_b[j],
                });
            }
            contracted_a[i] = true;
            contracted_b[j] = true;
        }

        let uncontracted_a: Vec<usize> = (0..rank_a).filter(|&ax| !contracted_a[ax]).collect();
        let uncontracted_b: Vec<usize> = (0..rank_b).filter(|&ax| !contracted_b[ax]).collect();
        let rank_c = uncontracted_a.len() + uncontracted_b.len();

        let positions_a = result_positions("a", &uncontracted_a, &axes.a_to_result, rank_a)?;
        let positions_b = result_positions("b", &uncontracted_b, &axes.b_to_result, rank_b)?;

        // natural layout index k lands at result position natural_pos[k]
        let natural_pos: Vec<usize> = positions_a.iter().chain(&positions_b).copied().collect();
        let mut perm_c = vec![usize::MAX; rank_c];
        for (k, &p) in natural_pos.iter().enumerate() {
            if p >= rank_c || perm_c[p] != usize::MAX {
                return Err(GraphError::InvalidAxisMap(format!(
                    "result positions {natural_pos:?} are not a permutation of 0..{rank_c}"
                )));
            }
            perm_c[p] = k;
        }

        let perm_a: Vec<usize> = uncontracted_a
            .iter()
            .copied()
            .chain(axes.pairs.iter().map(|&(i, _)| i))
            .collect();
        let perm_b: Vec<usize> = axes
            .pairs
            .iter()
            .map(|&(_, j)| j)
            .chain(uncontracted_b.iter().copied())
            .collect();

        let natural_shape: Vec<usize> = uncontracted_a
            .iter()
            .map(|&ax| shape_a[ax])
            .chain(uncontracted_b.iter().map(|&ax| shape_b[ax]))
            .collect();
        let result_shape = perm_c.iter().map(|&k| natural_shape[k]).collect();

        let dleft = uncontracted_a.iter().map(|&ax| shape_a[ax]).product();
        let dmid = axes.pairs.iter().map(|&(i, _)| shape_a[i]).product();
        let dright = uncontracted_b.iter().map(|&ax| shape_b[ax]).product();

        Ok(Self {
            axes: axes.clone(),
            uncontracted_a,
            uncontracted_b,
            positions_a,
            positions_b,
            dleft,
            dmid,
            dright,
            perm_a,
            perm_b,
            perm_c,
            natural_shape,
            result_shape,
        })
    }

    /// Check if A needs permutation before the product.
    pub fn permute_a(&self) -> bool {
        !is_identity_permutation(&self.perm_a)
    }

    /// Check if B needs permutation before the product.
    pub fn permute_b(&self) -> bool {
        !is_identity_permutation(&self.perm_b)
    }

    /// Check if the product needs permutation into the result order.
    pub fn permute_c(&self) -> bool {
        !is_identity_permutation(&self.perm_c)
    }

    /// Axes for `grad_a = tensordot(grad_c, b, ..)`.
    ///
    /// Contracts the gradient's `b`-positions with `b`'s uncontracted axes;
    /// the gradient's `a`-positions land back on `a`'s uncontracted axes and
    /// `b`'s contracted axes land on their partners in `a`.
    pub fn a_gradient_axes(&self) -> DotAxes {
        let pairs = self
            .positions_b
            .iter()
            .zip(&self.uncontracted_b)
            .map(|(&q, &j)| (q, j))
            .collect();
        let g_to_result = self
            .positions_a
            .iter()
            .zip(&self.uncontracted_a)
            .map(|(&p, &i)| (p, i))
            .collect();
        let b_to_result = self.axes.pairs.iter().map(|&(i, j)| (j, i)).collect();
        DotAxes::new(pairs, g_to_result, b_to_result)
    }

    /// Axes for `grad_b = tensordot(a, grad_c, ..)`, mirroring
    /// [`a_gradient_axes`](Self::a_gradient_axes).
    pub fn b_gradient_axes(&self) -> DotAxes {
        let pairs = self
            .uncontracted_a
            .iter()
            .zip(&self.positions_a)
            .map(|(&i, &p)| (i, p))
            .collect();
        let a_to_result = self.axes.pairs.clone();
        let g_to_result = self
            .positions_b
            .iter()
            .zip(&self.uncontracted_b)
            .map(|(&q, &j)| (q, j))
            .collect();
        DotAxes::new(pairs, a_to_result, g_to_result)
    }
}

/// Look up the result position of each uncontracted axis in `map`.
fn result_positions(
    operand: &str,
    uncontracted: &[usize],
    map: &[(usize, usize)],
    rank: usize,
) -> Result<Vec<usize>, GraphError> {
    if let Some(&(ax, _)) = map.iter().find(|&&(ax, _)| ax >= rank) {
        return Err(GraphError::AxisOutOfRange { axis: ax, ndim: rank });
    }
    if map.len() != uncontracted.len() {
        return Err(GraphError::InvalidAxisMap(format!(
            "{operand} has {} uncontracted axes but {} map entries",
            uncontracted.len(),
            map.len()
        )));
    }
    uncontracted
        .iter()
        .map(|&ax| {
            let mut hits = map.iter().filter(|&&(m, _)| m == ax);
            match (hits.next(), hits.next()) {
                (Some(&(_, pos)), None) => Ok(pos),
                _ => Err(GraphError::InvalidAxisMap(format!(
                    "axis {ax} of {operand} must appear exactly once in its result map"
                ))),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matrix_product_plan() {
        let axes = DotAxes::pairs(&[(1, 0)], 2, 2);
        let plan = ContractionPlan::new(&[2, 3], &[3, 4], &axes).unwrap();
        assert_eq!(plan.result_shape, vec![2, 4]);
        assert_eq!((plan.dleft, plan.dmid, plan.dright), (2, 3, 4));
        assert!(!plan.permute_a());
        assert!(!plan.permute_b());
        assert!(!plan.permute_c());
    }

    #[test]
    fn test_transposed_result() {
        // C[k, i] = sum_j A[i, j] B[j, k]
        let axes = DotAxes::new(vec![(1, 0)], vec![(0, 1)], vec![(1, 0)]);
        let plan = ContractionPlan::new(&[2, 3], &[3, 4], &axes).unwrap();
        assert_eq!(plan.result_shape, vec![4, 2]);
        assert_eq!(plan.perm_c, vec![1, 0]);
    }

    #[test]
    fn test_full_contraction_is_scalar() {
        let axes = DotAxes::pairs(&[(0, 0), (1, 1)], 2, 2);
        let plan = ContractionPlan::new(&[2, 3], &[2, 3], &axes).unwrap();
        assert!(plan.result_shape.is_empty());
        assert_eq!((plan.dleft, plan.dmid, plan.dright), (1, 6, 1));
    }

    #[test]
    fn test_outer_product() {
        let axes = DotAxes::pairs(&[], 1, 2);
        let plan = ContractionPlan::new(&[2], &[3, 4], &axes).unwrap();
        assert_eq!(plan.result_shape, vec![2, 3, 4]);
        assert_eq!(plan.dmid, 1);
    }

    #[test]
    fn test_permuted_operands() {
        // A[k, i] with k contracted against B[n, k]
        let axes = DotAxes::pairs(&[(0, 1)], 2, 2);
        let plan = ContractionPlan::new(&[5, 2], &[3, 5], &axes).unwrap();
        assert_eq!(plan.perm_a, vec![1, 0]);
        assert_eq!(plan.perm_b, vec![1, 0]);
        assert_eq!(plan.result_shape, vec![2, 3]);
    }

    #[test]
    fn test_size_mismatch() {
        let axes = DotAxes::pairs(&[(1, 0)], 2, 2);
        let err = ContractionPlan::new(&[2, 3], &[4, 5], &axes).unwrap_err();
        assert_eq!(
            err,
            GraphError::ContractionMismatch {
                axis_a: 1,
                axis_b: 0,
                size_a: 3,
                size_b: 4
            }
        );
    }

    #[test]
    fn test_malformed_maps() {
        // axis contracted twice
        let twice = DotAxes::new(vec![(0, 0), (0, 1)], vec![], vec![]);
        assert!(matches!(
            ContractionPlan::new(&[2], &[2, 2], &twice),
            Err(GraphError::InvalidAxisMap(_))
        ));

        // a contracted axis appears in the result map
        let covered = DotAxes::new(vec![(1, 0)], vec![(1, 0)], vec![(1, 1)]);
        assert!(matches!(
            ContractionPlan::new(&[2, 3], &[3, 4], &covered),
            Err(GraphError::InvalidAxisMap(_))
        ));

        // duplicate result position
        let clash = DotAxes::new(vec![(1, 0)], vec![(0, 0)], vec![(1, 0)]);
        assert!(matches!(
            ContractionPlan::new(&[2, 3], &[3, 4], &clash),
            Err(GraphError::InvalidAxisMap(_))
        ));

        let out_of_range = DotAxes::new(vec![(2, 0)], vec![], vec![]);
        assert!(matches!(
            ContractionPlan::new(&[2, 3], &[3, 4], &out_of_range),
            Err(GraphError::AxisOutOfRange { axis: 2, ndim: 2 })
        ));
    }

    #[test]
    fn test_gradient_axes_shapes() {
        let axes = DotAxes::new(vec![(1, 2)], vec![(0, 2), (2, 0)], vec![(0, 1), (1, 3)]);
        let shape_a = [2, 3, 4];
        let shape_b = [5, 6, 3];
        let plan = ContractionPlan::new(&shape_a, &shape_b, &axes).unwrap();
        assert_eq!(plan.result_shape, vec![4, 5, 2, 6]);

        let ga = ContractionPlan::new(&plan.result_shape, &shape_b, &plan.a_gradient_axes()).unwrap();
        assert_eq!(ga.result_shape, shape_a.to_vec());
        let gb = ContractionPlan::new(&shape_a, &plan.result_shape, &plan.b_gradient_axes()).unwrap();
        assert_eq!(gb.result_shape, shape_b.to_vec());
    }
}
