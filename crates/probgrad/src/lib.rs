//! probgrad - reverse-mode autodiff for online variational inference
//!
//! This crate provides a scalar and a shape-indexed tensor autodiff graph
//! sharing one lazy, exactly-once backward protocol, and the stochastic
//! gradient estimators that fit approximate posteriors one sample at a
//! time.
//!
//! # Architecture
//!
//! ```text
//! Level 1: Inference (infer module)
//!     → Variable / Observation, BbviGuide, ReparamGuide
//!
//! Level 2: Graphs (autodiff module) and parameter state (optim module)
//!     → Value, TensorValue, Buffer, ParamStore
//!
//! Level 3: Backend implementation (backend, contract, operations modules)
//!     → DenseBackend (column-major DenseTensor, faer GEMM)
//! ```
//!
//! # Example
//!
//! ```
//! use probgrad::optim::{Optimizer, ParamStore, Sgd};
//! use probgrad::{Complete, Value};
//!
//! let store = ParamStore::new(Sgd);
//! let w = store.param(3.0, 0.1, "w");
//!
//! // y = w * w, so w is consumed twice and goes through a buffer
//! let wb = w.buffer();
//! let y = &*wb * &*wb;
//! assert_eq!(y.v(), 9.0);
//!
//! y.dv(-1.0);
//! assert_eq!(wb.accumulated(), Some(-6.0));
//! wb.complete();
//! assert!((store.value("w").unwrap() - 2.4).abs() < 1e-12);
//! ```

pub mod autodiff;
pub mod backend;
pub mod contract;
pub mod error;
pub mod infer;
pub mod operations;
pub mod optim;
pub mod random;
pub mod scalar;
pub mod strides;
pub mod tensor;

pub use autodiff::{
    Buffer, Complete, Differentiable, Parameter, TensorBuffer, TensorValue, Value,
};
pub use backend::{ArrayBackend, DenseBackend};
pub use error::GraphError;
pub use scalar::Real;
pub use tensor::DenseTensor;
