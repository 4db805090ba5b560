//! Dense n-dimensional tensor storage.
//!
//! `DenseTensor` is the concrete array type behind
//! [`DenseBackend`](crate::backend::DenseBackend). Data is stored
//! contiguously in column-major order; a rank-0 tensor (shape `[]`) holds
//! exactly one element.

use crate::error::GraphError;
use crate::scalar::Real;
use crate::strides::{cartesian_to_linear, compute_strides};

/// An owned, column-major dense tensor.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseTensor<T: Real> {
    data: Vec<T>,
    shape: Vec<usize>,
    strides: Vec<usize>,
}

impl<T: Real> DenseTensor<T> {
    /// Create a new tensor with the given shape, zero-initialized.
    ///
    /// # Examples
    ///
    /// ```
    /// use probgrad::DenseTensor;
    ///
    /// let t: DenseTensor<f64> = DenseTensor::zeros(&[2, 3, 4]);
    /// assert_eq!(t.shape(), &[2, 3, 4]);
    /// assert_eq!(t.len(), 24);
    ///
    /// let s: DenseTensor<f64> = DenseTensor::zeros(&[]);
    /// assert_eq!(s.len(), 1);
    /// ```
    pub fn zeros(shape: &[usize]) -> Self {
        Self::filled(T::zero(), shape)
    }

    /// Create a tensor with every element set to one.
    pub fn ones(shape: &[usize]) -> Self {
        Self::filled(T::one(), shape)
    }

    /// Create a tensor with every element set to `value`.
    pub fn filled(value: T, shape: &[usize]) -> Self {
        let len: usize = shape.iter().product();
        Self {
            data: vec![value; len],
            shape: shape.to_vec(),
            strides: compute_strides(shape),
        }
    }

    /// Create tensor from column-major data and shape.
    ///
    /// # Errors
    ///
    /// Returns `GraphError::LengthMismatch` if data length doesn't match shape.
    ///
    /// # Examples
    ///
    /// ```
    /// use probgrad::DenseTensor;
    ///
    /// let t = DenseTensor::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]).unwrap();
    /// assert_eq!(t.get(&[1, 0]), Some(&2.0)); // Column-major: [1,0] is second element
    /// assert_eq!(t.get(&[0, 1]), Some(&3.0));
    /// ```
    pub fn from_vec(data: Vec<T>, shape: &[usize]) -> Result<Self, GraphError> {
        let expected: usize = shape.iter().product();
        if data.len() != expected {
            return Err(GraphError::LengthMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            data,
            shape: shape.to_vec(),
            strides: compute_strides(shape),
        })
    }

    /// Rank-0 tensor holding a single value.
    pub fn scalar(value: T) -> Self {
        Self::filled(value, &[])
    }

    #[inline]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    #[inline]
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn strides(&self) -> &[usize] {
        &self.strides
    }

    #[inline]
    pub fn data(&self) -> &[T] {
        &self.data
    }

    #[inline]
    pub fn data_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Storage offset of a cartesian index, with bounds checking.
    pub fn linear_index(&self, indices: &[usize]) -> Result<usize, GraphError> {
        if indices.len() != self.ndim() {
            return Err(GraphError::WrongNumberOfIndices {
                expected: self.ndim(),
                actual: indices.len(),
            });
        }
        for (&index, &dim_size) in indices.iter().zip(self.shape.iter()) {
            if index >= dim_size {
                return Err(GraphError::IndexOutOfBounds { index, dim_size });
            }
        }
        Ok(cartesian_to_linear(indices, &self.strides))
    }

    /// Get element by cartesian indices, `None` if the index is invalid.
    pub fn get(&self, indices: &[usize]) -> Option<&T> {
        self.linear_index(indices)
            .ok()
            .and_then(|i| self.data.get(i))
    }

    /// Set element by cartesian indices.
    pub fn set(&mut self, indices: &[usize], value: T) -> Result<(), GraphError> {
        let i = self.linear_index(indices)?;
        self.data[i] = value;
        Ok(())
    }

    /// Apply `f` to every element, keeping the shape.
    pub fn map<F: Fn(T) -> T>(&self, f: F) -> Self {
        Self {
            data: self.data.iter().map(|&x| f(x)).collect(),
            shape: self.shape.clone(),
            strides: self.strides.clone(),
        }
    }

    /// Combine two same-shaped tensors element by element.
    ///
    /// # Errors
    ///
    /// Returns `GraphError::ShapeMismatch` if the shapes differ.
    pub fn zip_with<F: Fn(T, T) -> T>(&self, other: &Self, f: F) -> Result<Self, GraphError> {
        if self.shape != other.shape {
            return Err(GraphError::ShapeMismatch {
                left: self.shape.clone(),
                right: other.shape.clone(),
            });
        }
        Ok(Self {
            data: self
                .data
                .iter()
                .zip(other.data.iter())
                .map(|(&a, &b)| f(a, b))
                .collect(),
            shape: self.shape.clone(),
            strides: self.strides.clone(),
        })
    }

    /// Reinterpret the data under a new shape with the same element count.
    pub fn reshape(&self, new_shape: &[usize]) -> Result<Self, GraphError> {
        Self::from_vec(self.data.clone(), new_shape)
    }

    /// Sum of all elements.
    pub fn sum(&self) -> T {
        self.data.iter().fold(T::zero(), |acc, &x| acc + x)
    }
}
