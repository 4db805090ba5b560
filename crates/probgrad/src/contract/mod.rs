//! Tensor contraction.
//!
//! Axis pairs to sum over and the placement of the surviving axes are given
//! as a [`DotAxes`]; [`ContractionPlan`] validates them against operand
//! shapes once, so kernels never fail.
//!
//! # Implementations
//!
//! - `naive`: loop-based reference kernel, generic over [`Real`](crate::Real)
//! - `gemm`: faer matrix-multiply kernel for `f64` (feature `gemm`)

#[cfg(feature = "gemm")]
mod gemm;
mod naive;
mod plan;

#[cfg(feature = "gemm")]
pub use gemm::contract_gemm;
pub use naive::contract_naive;
pub use plan::{ContractionPlan, DotAxes};
