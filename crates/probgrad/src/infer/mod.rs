//! Stochastic layer: sampled variables, observations and gradient
//! estimators for variational inference.
//!
//! One inference step builds a fresh graph:
//!
//! ```text
//! guide.sample(q, prior, rng) ──► Variable { value, model_score, guide_score }
//!         │                              ▲
//!         │ downstream scores            │ add_variable / add_observation
//!         ▼                              │
//! Observation::new(likelihood, data) ────┘
//!
//! completion, reverse construction order:
//!   observation.complete()  →  child.complete()  →  parent.complete()
//! ```
//!
//! Each `Variable` keeps only the scores registered on it (its local
//! Markov blanket), which is what its estimator uses as the learning
//! signal.

mod bbvi;
mod distribution;
mod reparam;
mod variable;

use rand::RngCore;

use crate::autodiff::{Complete, Value};

pub use bbvi::{BbviConfig, BbviGuide, ControlVariate};
pub use distribution::{Bernoulli, Categorical, Normal};
pub use reparam::{LocationScale, ReparamConfig, ReparamGuide, Reparameterized};
pub use variable::{Estimator, Observation, Variable};

/// A scalar log-probability node.
pub type Score = Value<f64>;

/// A drawn outcome with its log-probability under the distribution that
/// drew it.
///
/// `pending` holds buffers created while drawing; they are flushed after
/// the owning variable's scores.
pub struct Sample<A> {
    value: A,
    score: Score,
    pending: Vec<Box<dyn Complete>>,
}

impl<A> Sample<A> {
    pub fn new(value: A, score: Score) -> Self {
        Self {
            value,
            score,
            pending: Vec::new(),
        }
    }

    /// Queue `handle` to be completed with this sample.
    pub fn with_pending(mut self, handle: impl Complete + 'static) -> Self {
        self.pending.push(Box::new(handle));
        self
    }

    pub fn get(&self) -> &A {
        &self.value
    }

    pub fn score(&self) -> &Score {
        &self.score
    }

    pub fn into_parts(self) -> (A, Score, Vec<Box<dyn Complete>>) {
        (self.value, self.score, self.pending)
    }
}

impl<A> Complete for Sample<A> {
    fn complete(&self) {
        for handle in &self.pending {
            handle.complete();
        }
    }
}

/// Something that can be sampled and scored.
pub trait Distribution<A> {
    fn sample(&self, rng: &mut dyn RngCore) -> Sample<A>;

    /// Log-probability of `value`, differentiable in the distribution's
    /// parameters (and in `value` where that makes sense).
    fn observe(&self, value: &A) -> Score;
}
