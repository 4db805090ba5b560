//! Random draws for dense tensors and sampling sites.
//!
//! All draws go through a caller-supplied RNG so inference runs are
//! reproducible with a seeded generator.

use rand::Rng;
use rand::distr::{Distribution, StandardUniform};
use rand_distr::StandardNormal;

use crate::scalar::Real;
use crate::tensor::DenseTensor;

/// Draw from the uniform distribution on `[0, 1)`.
#[inline]
pub fn uniform<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    StandardUniform.sample(rng)
}

/// Draw from the standard normal distribution.
#[inline]
pub fn standard_normal<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    StandardNormal.sample(rng)
}

impl<T: Real> DenseTensor<T> {
    /// Create a tensor with uniform random values in `[0, 1)`.
    ///
    /// # Example
    ///
    /// ```
    /// use probgrad::DenseTensor;
    /// use rand::SeedableRng;
    /// use rand::rngs::StdRng;
    ///
    /// let mut rng = StdRng::seed_from_u64(42);
    /// let t: DenseTensor<f64> = DenseTensor::random_with_rng(&[2, 3], &mut rng);
    /// assert!(t.data().iter().all(|&v| (0.0..1.0).contains(&v)));
    /// ```
    pub fn random_with_rng<R: Rng + ?Sized>(shape: &[usize], rng: &mut R) -> Self {
        let len: usize = shape.iter().product();
        let data = (0..len).map(|_| T::from_f64(uniform(rng))).collect();
        Self::from_vec(data, shape).expect("length computed from shape")
    }

    /// Create a tensor with standard normal random values.
    pub fn randn_with_rng<R: Rng + ?Sized>(shape: &[usize], rng: &mut R) -> Self {
        let len: usize = shape.iter().product();
        let data = (0..len).map(|_| T::from_f64(standard_normal(rng))).collect();
        Self::from_vec(data, shape).expect("length computed from shape")
    }
}
