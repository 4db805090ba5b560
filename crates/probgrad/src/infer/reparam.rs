//! Pathwise (reparameterization) guide.

use rand::RngCore;

use crate::autodiff::{Differentiable, Value};
use crate::infer::{Distribution, Estimator, Sample, Score, Variable};

/// Options for pathwise draws.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReparamConfig {
    /// Bound of the location-scale backward transform; see
    /// [`LocationScale`].
    pub clamp: f64,
}

impl Default for ReparamConfig {
    fn default() -> Self {
        Self { clamp: 1.0 }
    }
}

/// A distribution that can draw through a differentiable transform of
/// fixed noise.
pub trait Reparameterized<A>: Distribution<A> {
    fn rsample(&self, rng: &mut dyn RngCore, config: &ReparamConfig) -> Sample<A>;
}

/// `x = loc + scale * noise` with a bounded backward pass.
///
/// An incoming gradient `d` is first squashed to
/// `r = clamp * tanh(d / (scale * clamp)) / scale`; `loc` receives `r` and
/// `scale` receives `noise * r / 2`.
pub struct LocationScale {
    loc: Value<f64>,
    scale: Value<f64>,
    noise: f64,
    clamp: f64,
}

impl LocationScale {
    pub fn new(loc: Value<f64>, scale: Value<f64>, noise: f64, clamp: f64) -> Self {
        Self {
            loc,
            scale,
            noise,
            clamp,
        }
    }

    pub fn into_value(self) -> Value<f64> {
        Value::custom(Box::new(self))
    }
}

impl Differentiable<f64> for LocationScale {
    fn forward(&self) -> f64 {
        self.loc.v() + self.scale.v() * self.noise
    }

    fn backward(&self, gradient: f64) {
        let sigma = self.scale.v();
        let r = self.clamp * (gradient / (sigma * self.clamp)).tanh() / sigma;
        self.loc.dv(r);
        self.scale.dv(self.noise * r / 2.0);
    }
}

struct Pathwise;

impl Estimator for Pathwise {
    fn seed(&self, model: &Score, guide: &Score, _logp: f64, _logq: f64) {
        model.dv(1.0);
        guide.dv(-1.0);
    }
}

/// Draws variables whose value carries gradient back to the guide
/// parameters, differentiating `model_score - guide_score` directly.
#[derive(Debug, Clone, Default)]
pub struct ReparamGuide {
    config: ReparamConfig,
}

impl ReparamGuide {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ReparamConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ReparamConfig {
        &self.config
    }

    /// Draw from `guide` through its transform and score the draw under
    /// `prior`.
    pub fn sample<A, Q, P>(&self, guide: &Q, prior: &P, rng: &mut dyn RngCore) -> Variable<A>
    where
        Q: Reparameterized<A> + ?Sized,
        P: Distribution<A> + ?Sized,
    {
        let drawn = guide.rsample(rng, &self.config);
        let model_score = prior.observe(drawn.get());
        let (value, guide_score, pending) = drawn.into_parts();
        Variable::new(value, model_score, guide_score, Box::new(Pathwise)).with_pending(pending)
    }
}
