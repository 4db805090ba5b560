//! Zero-copy views of dense tensors as faer matrices.
//!
//! Both `DenseTensor` and faer store column-major, so a tensor whose data
//! has been permuted into `[rows..., cols...]` order can be handed to faer
//! as a matrix without copying.

use faer::{MatMut, MatRef};

use crate::tensor::DenseTensor;

/// Extension trait viewing tensor storage as a faer matrix.
pub trait AsFaerMat {
    /// View tensor data as an immutable `rows x cols` matrix.
    ///
    /// # Panics
    ///
    /// Panics if `rows * cols != tensor.len()`.
    ///
    /// # Example
    ///
    /// ```
    /// use probgrad::DenseTensor;
    /// use probgrad::backend::AsFaerMat;
    ///
    /// let t = DenseTensor::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]).unwrap();
    /// let mat = t.as_faer_mat(2, 3);
    /// assert_eq!(mat[(1, 2)], 6.0);
    /// ```
    fn as_faer_mat(&self, rows: usize, cols: usize) -> MatRef<'_, f64>;

    /// View tensor data as a mutable `rows x cols` matrix.
    ///
    /// # Panics
    ///
    /// Panics if `rows * cols != tensor.len()`.
    fn as_faer_mat_mut(&mut self, rows: usize, cols: usize) -> MatMut<'_, f64>;
}

impl AsFaerMat for DenseTensor<f64> {
    fn as_faer_mat(&self, rows: usize, cols: usize) -> MatRef<'_, f64> {
        assert_eq!(
            rows * cols,
            self.len(),
            "matrix view {rows} x {cols} does not cover tensor of {} elements",
            self.len()
        );
        MatRef::from_column_major_slice(self.data(), rows, cols)
    }

    fn as_faer_mat_mut(&mut self, rows: usize, cols: usize) -> MatMut<'_, f64> {
        assert_eq!(
            rows * cols,
            self.len(),
            "matrix view {rows} x {cols} does not cover tensor of {} elements",
            self.len()
        );
        MatMut::from_column_major_slice_mut(self.data_mut(), rows, cols)
    }
}
