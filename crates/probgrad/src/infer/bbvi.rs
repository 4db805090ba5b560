//! Score-function (REINFORCE) guide with a control variate.

use std::cell::Cell;
use std::rc::Rc;

use log::trace;
use rand::RngCore;

use crate::infer::{Distribution, Estimator, Score, Variable};

/// Options for [`ControlVariate`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BbviConfig {
    /// Robbins-Monro exponent: step `t` mixes with weight `t^-decay`.
    pub decay: f64,
    /// Below this weight the control is zero.
    pub min_weight: f64,
}

impl Default for BbviConfig {
    fn default() -> Self {
        Self {
            decay: 0.5,
            min_weight: 1e-12,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct ControlState {
    iteration: u64,
    weight: f64,
    offset: f64,
}

/// Running estimate of `E[logp - logq]`, subtracted from the learning
/// signal of every sample drawn through the same guide.
#[derive(Debug, Default)]
pub struct ControlVariate {
    config: BbviConfig,
    state: Cell<ControlState>,
}

impl ControlVariate {
    pub fn new(config: BbviConfig) -> Self {
        Self {
            config,
            state: Cell::new(ControlState::default()),
        }
    }

    pub fn config(&self) -> &BbviConfig {
        &self.config
    }

    /// Number of updates so far.
    pub fn iteration(&self) -> u64 {
        self.state.get().iteration
    }

    /// Current control value.
    pub fn control(&self) -> f64 {
        let state = self.state.get();
        if state.weight < self.config.min_weight {
            0.0
        } else {
            state.offset / state.weight
        }
    }

    /// Mix `delta` into the running estimate and return the new control.
    ///
    /// # Examples
    ///
    /// ```
    /// use probgrad::infer::{BbviConfig, ControlVariate};
    ///
    /// let cv = ControlVariate::new(BbviConfig::default());
    /// // The first step has rho = 1, so the control equals delta.
    /// assert_eq!(cv.update(-3.0), -3.0);
    /// ```
    pub fn update(&self, delta: f64) -> f64 {
        let mut state = self.state.get();
        state.iteration += 1;
        let rho = (state.iteration as f64).powf(-self.config.decay);
        state.weight = (1.0 - rho) * state.weight + rho;
        state.offset = (1.0 - rho) * state.offset + rho * delta;
        self.state.set(state);
        let control = self.control();
        trace!(
            "control variate step {}: delta {delta}, control {control}",
            state.iteration
        );
        control
    }
}

struct ScoreFunction {
    control: Rc<ControlVariate>,
}

impl Estimator for ScoreFunction {
    fn seed(&self, model: &Score, guide: &Score, logp: f64, logq: f64) {
        let delta = logp - logq;
        let control = self.control.update(delta);
        model.dv(1.0);
        guide.dv(delta - control);
    }
}

/// Draws variables whose guide gradient is the centred score function
/// `(logp - logq - control) * d log q`.
///
/// One guide (and so one control variate) should serve one latent site.
///
/// # Example
///
/// ```
/// use probgrad::infer::{BbviGuide, Bernoulli};
/// use rand::SeedableRng;
/// use rand::rngs::StdRng;
///
/// let guide = BbviGuide::new();
/// let mut rng = StdRng::seed_from_u64(0);
/// let rain = guide.sample(&Bernoulli::new(0.5), &Bernoulli::new(0.2), &mut rng);
/// rain.complete();
/// assert_eq!(guide.control_variate().iteration(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct BbviGuide {
    control: Rc<ControlVariate>,
}

impl BbviGuide {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: BbviConfig) -> Self {
        Self {
            control: Rc::new(ControlVariate::new(config)),
        }
    }

    pub fn control_variate(&self) -> &ControlVariate {
        &self.control
    }

    /// Draw from `guide` and score the draw under `prior`.
    pub fn sample<A, Q, P>(&self, guide: &Q, prior: &P, rng: &mut dyn RngCore) -> Variable<A>
    where
        Q: Distribution<A> + ?Sized,
        P: Distribution<A> + ?Sized,
    {
        let drawn = guide.sample(rng);
        let model_score = prior.observe(drawn.get());
        let (value, guide_score, pending) = drawn.into_parts();
        let estimator = ScoreFunction {
            control: Rc::clone(&self.control),
        };
        Variable::new(value, model_score, guide_score, Box::new(estimator)).with_pending(pending)
    }
}
