//! Reverse-mode automatic differentiation over a per-sample graph.
//!
//! Nodes are reference-counted handles built eagerly as a model runs.
//! Forward values are computed lazily and memoized; gradients are pushed
//! from consumers to operands with `dv`.
//!
//! # Architecture
//!
//! ```text
//! Value<T> ─────────── scalar nodes (Constant, Parameter, Unary, Binary, Custom)
//!    │ Buffer<T> ────── sums incoming gradients, flushes once on complete()
//!    │
//! TensorValue<B> ───── array nodes over an ArrayBackend
//!    │ TensorBuffer<B>
//!    └ sum_all / get ── bridges into the scalar graph
//! ```
//!
//! # Completion protocol
//!
//! A node with a single consumer receives exactly one `dv` per backward
//! pass. A node with several consumers is wrapped in a buffer; the buffer
//! is completed after every consumer has pushed its gradient, in reverse
//! construction order. The protocol is a caller discipline and is not
//! checked at runtime.

mod tensor;
mod value;

pub use tensor::{TensorBuffer, TensorValue};
pub use value::{Buffer, Differentiable, Parameter, Value};

/// Flush deferred gradients downstream.
pub trait Complete {
    fn complete(&self);
}
