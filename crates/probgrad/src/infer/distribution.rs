//! Concrete distributions over booleans, categories and reals.

use rand::RngCore;

use crate::autodiff::{Buffer, Complete, Differentiable, TensorBuffer, TensorValue, Value};
use crate::backend::ArrayBackend;
use crate::error::GraphError;
use crate::infer::{Distribution, LocationScale, ReparamConfig, Reparameterized, Sample, Score};
use crate::operations::Comparison;
use crate::random::{standard_normal, uniform};

/// A score built over locally buffered operands.
///
/// The backward pass seeds the inner graph, then flushes the buffers so
/// each operand receives one combined gradient.
struct Scoped {
    output: Score,
    scalars: Vec<Buffer<f64>>,
}

impl Differentiable<f64> for Scoped {
    fn forward(&self) -> f64 {
        self.output.v()
    }

    fn backward(&self, gradient: f64) {
        self.output.dv(gradient);
        for buffer in &self.scalars {
            buffer.complete();
        }
    }
}

struct ScopedTensor<B: ArrayBackend<Elem = f64>> {
    output: Score,
    buffer: TensorBuffer<B>,
}

impl<B: ArrayBackend<Elem = f64>> Differentiable<f64> for ScopedTensor<B> {
    fn forward(&self) -> f64 {
        self.output.v()
    }

    fn backward(&self, gradient: f64) {
        self.output.dv(gradient);
        self.buffer.complete();
    }
}

/// Bernoulli distribution over `bool`, parameterised by its logit.
#[derive(Debug, Clone)]
pub struct Bernoulli {
    logit: Value<f64>,
}

impl Bernoulli {
    /// Fixed success probability `p`.
    pub fn new(p: f64) -> Self {
        Self::from_logit(Value::constant((p / (1.0 - p)).ln()))
    }

    pub fn from_logit(logit: Value<f64>) -> Self {
        Self { logit }
    }

    pub fn logit(&self) -> &Value<f64> {
        &self.logit
    }

    /// Success probability at the current logit.
    pub fn probability(&self) -> f64 {
        let l = self.logit.v();
        1.0 / (1.0 + (-l).exp())
    }
}

impl Distribution<bool> for Bernoulli {
    fn sample(&self, rng: &mut dyn RngCore) -> Sample<bool> {
        let outcome = uniform(rng) < self.probability();
        Sample::new(outcome, self.observe(&outcome))
    }

    /// `log p = -softplus(-logit)`, `log (1 - p) = -softplus(logit)`.
    fn observe(&self, value: &bool) -> Score {
        if *value {
            -self.logit.negate().softplus()
        } else {
            -self.logit.softplus()
        }
    }
}

/// Categorical distribution over `0..k`, parameterised by a rank-1 logit
/// tensor.
pub struct Categorical<B: ArrayBackend<Elem = f64>> {
    logits: TensorValue<B>,
}

impl<B: ArrayBackend<Elem = f64>> Clone for Categorical<B> {
    fn clone(&self) -> Self {
        Self {
            logits: self.logits.clone(),
        }
    }
}

impl<B: ArrayBackend<Elem = f64>> Categorical<B> {
    /// # Errors
    ///
    /// Returns `WrongNumberOfIndices` unless `logits` has rank 1, and
    /// `EmptySupport` if it has length 0.
    pub fn new(logits: TensorValue<B>) -> Result<Self, GraphError> {
        if logits.ndim() != 1 {
            return Err(GraphError::WrongNumberOfIndices {
                expected: 1,
                actual: logits.ndim(),
            });
        }
        if logits.shape()[0] == 0 {
            return Err(GraphError::EmptySupport);
        }
        Ok(Self { logits })
    }

    /// Fixed category probabilities.
    pub fn from_probs(probs: &[f64]) -> Result<Self, GraphError> {
        let logits = probs.iter().map(|p| p.ln()).collect();
        Self::new(TensorValue::from_elems(logits, &[probs.len()])?)
    }

    pub fn num_categories(&self) -> usize {
        self.logits.shape()[0]
    }

    /// Most probable category.
    pub fn mode(&self) -> usize {
        self.logits.argmax(0).expect("logits have rank 1")[0]
    }

    /// Normalised log-probabilities of every category, without gradients.
    pub fn log_probs(&self) -> B::Array {
        let logits = self.logits.detach();
        let (max, shifted) = shift_by_max(&logits);
        let lse = shifted.exp().sum_all().log() + max;
        let norm = TensorValue::fill(&lse, logits.shape());
        logits.minus(&norm).expect("same shape").v()
    }
}

/// Subtract the (constant) maximum so `exp` cannot overflow.
fn shift_by_max<B: ArrayBackend<Elem = f64>>(logits: &TensorValue<B>) -> (f64, TensorValue<B>) {
    let values = B::to_elems(&logits.v());
    let argmax = logits.argmax(0).expect("logits have rank 1")[0];
    let max = values[argmax];
    let shift = TensorValue::fill(&Value::constant(max), logits.shape());
    (max, logits.minus(&shift).expect("same shape"))
}

impl<B: ArrayBackend<Elem = f64>> Distribution<usize> for Categorical<B> {
    /// Inverse-CDF draw: the category is `k` minus the number of
    /// cumulative probabilities above a uniform draw.
    fn sample(&self, rng: &mut dyn RngCore) -> Sample<usize> {
        let k = self.num_categories();
        let probs = TensorValue::<B>::constant(self.log_probs()).exp();
        let cdf = probs.cumsum(0).expect("logits have rank 1");
        let u = TensorValue::fill(&Value::constant(uniform(rng)), &[]);
        let above = cdf.count(0, Comparison::Greater, &u).expect("threshold is rank 0");
        let above = B::to_elems(&above.v())[0] as usize;
        let index = (k - above).min(k - 1);
        Sample::new(index, self.observe(&index))
    }

    /// Log-softmax at `value`; out-of-range categories score `-inf`.
    fn observe(&self, value: &usize) -> Score {
        if *value >= self.num_categories() {
            return Score::constant(f64::NEG_INFINITY);
        }
        let logits = self.logits.buffer();
        let (max, shifted) = shift_by_max(logits.value());
        let lse = shifted.exp().sum_all().log() + max;
        let picked = logits.get(&[*value]).expect("index checked above");
        Value::custom(Box::new(ScopedTensor {
            output: picked - lse,
            buffer: logits,
        }))
    }
}

const HALF_LN_2PI: f64 = 0.918_938_533_204_672_8;

/// Normal log-density built from graph primitives.
///
/// `scale` is consumed twice, so callers pass buffered operands.
pub(crate) fn normal_log_density(x: &Value<f64>, loc: &Value<f64>, scale: &Value<f64>) -> Score {
    let z = (x - loc) / scale;
    -(z.pow(&Value::constant(2.0)) * 0.5) - scale.log() - HALF_LN_2PI
}

/// Normal distribution over real-valued nodes.
#[derive(Debug, Clone)]
pub struct Normal {
    loc: Value<f64>,
    scale: Value<f64>,
}

impl Normal {
    pub fn new(loc: f64, scale: f64) -> Self {
        Self::from_values(Value::constant(loc), Value::constant(scale))
    }

    pub fn from_values(loc: Value<f64>, scale: Value<f64>) -> Self {
        Self { loc, scale }
    }

    pub fn loc(&self) -> &Value<f64> {
        &self.loc
    }

    pub fn scale(&self) -> &Value<f64> {
        &self.scale
    }
}

impl Distribution<Value<f64>> for Normal {
    /// Score-function draw: the outcome is a detached constant.
    fn sample(&self, rng: &mut dyn RngCore) -> Sample<Value<f64>> {
        let noise = standard_normal(rng);
        let x = Value::constant(self.loc.v() + self.scale.v() * noise);
        let score = self.observe(&x);
        Sample::new(x, score)
    }

    fn observe(&self, value: &Value<f64>) -> Score {
        let loc = self.loc.buffer();
        let scale = self.scale.buffer();
        let output = normal_log_density(value, &loc, &scale);
        Value::custom(Box::new(Scoped {
            output,
            scalars: vec![loc, scale],
        }))
    }
}

impl Reparameterized<Value<f64>> for Normal {
    /// Pathwise draw `x = loc + scale * noise`.
    ///
    /// The returned sample carries the buffers of `x`, `loc` and `scale`,
    /// flushed in that order.
    fn rsample(&self, rng: &mut dyn RngCore, config: &ReparamConfig) -> Sample<Value<f64>> {
        let loc = self.loc.buffer();
        let scale = self.scale.buffer();
        let noise = standard_normal(rng);
        let x = LocationScale::new(loc.value().clone(), scale.value().clone(), noise, config.clamp)
            .into_value()
            .buffer();
        let score = normal_log_density(&x, &loc, &scale);
        Sample::new(x.value().clone(), score)
            .with_pending(x)
            .with_pending(loc)
            .with_pending(scale)
    }
}
