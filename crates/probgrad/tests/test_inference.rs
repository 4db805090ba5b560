//! End-to-end variational inference runs.
//!
//! Each test builds a fresh graph per step against persistent parameters in
//! a `ParamStore`, completes it in reverse construction order, and checks
//! the long-run behaviour of the fitted guide.

use approx::assert_relative_eq;
use probgrad::infer::{
    BbviGuide, Bernoulli, Categorical, Distribution, Normal, Observation, ReparamConfig, ReparamGuide,
};
use probgrad::optim::{Momentum, Optimizer, ParamStore, Sgd, TensorOptimizer};
use probgrad::{DenseBackend, DenseTensor, TensorValue, Value};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

const BURN_IN: usize = 10_000;
const MEASURED: usize = 10_000;

/// Three standard deviations of a binomial count.
fn binomial_tolerance(n: usize, p: f64) -> f64 {
    3.0 * (n as f64 * p * (1.0 - p)).sqrt()
}

#[test]
fn test_bbvi_recovers_bernoulli_prior() {
    let store = ParamStore::new(Sgd);
    let guide = BbviGuide::new();
    let prior = Bernoulli::new(0.2);
    let mut rng = ChaCha8Rng::seed_from_u64(3);

    let mut hits = 0;
    for step in 0..BURN_IN + MEASURED {
        let q = Bernoulli::from_logit(store.param(0.0, 10.0, "x"));
        let x = guide.sample(&q, &prior, &mut rng);
        if step >= BURN_IN && *x.get() {
            hits += 1;
        }
        x.complete();
    }

    let expected = MEASURED as f64 * 0.2;
    assert!(
        (hits as f64 - expected).abs() < binomial_tolerance(MEASURED, 0.2),
        "{hits} draws of true, expected about {expected}"
    );
    assert_eq!(guide.control_variate().iteration(), (BURN_IN + MEASURED) as u64);
}

fn wet_probability(rain: bool, sprinkler: bool) -> f64 {
    match (rain, sprinkler) {
        (true, true) => 0.99,
        (true, false) => 0.8,
        (false, true) => 0.9,
        (false, false) => 0.001,
    }
}

#[test]
fn test_bbvi_sprinkler_network_posterior() {
    let store = ParamStore::new(Sgd);
    let rain_guide = BbviGuide::new();
    let sprinkler_given_rain = BbviGuide::new();
    let sprinkler_given_dry = BbviGuide::new();
    let mut rng = ChaCha8Rng::seed_from_u64(10);

    let mut rainy = 0;
    for step in 0..BURN_IN + MEASURED {
        let rain = rain_guide.sample(
            &Bernoulli::from_logit(store.param(0.0, 6.0, "rain")),
            &Bernoulli::new(0.2),
            &mut rng,
        );
        let raining = *rain.get();

        let (guide, name, p) = if raining {
            (&sprinkler_given_rain, "sprinkler|rain", 0.01)
        } else {
            (&sprinkler_given_dry, "sprinkler|dry", 0.4)
        };
        let sprinkler = guide.sample(
            &Bernoulli::from_logit(store.param(0.0, 6.0, name)),
            &Bernoulli::new(p),
            &mut rng,
        );
        rain.add_variable(sprinkler.model_score(), sprinkler.guide_score());

        let wet = Observation::new(&Bernoulli::new(wet_probability(raining, *sprinkler.get())), &true);
        rain.add_observation(wet.score());
        sprinkler.add_observation(wet.score());

        wet.complete();
        sprinkler.complete();
        rain.complete();

        if step >= BURN_IN && raining {
            rainy += 1;
        }
    }

    // exact posterior P(rain | wet) for the standard parameters
    let expected = MEASURED as f64 * 0.3577;
    assert!(
        (rainy as f64 - expected).abs() < binomial_tolerance(MEASURED, 0.3577),
        "{rainy} rainy draws, expected about {expected}"
    );
    assert_eq!(store.len(), 3);
}

const XS: [f64; 8] = [-1.0, -0.5, 0.0, 0.5, 1.0, 1.5, 2.0, 2.5];
const NOISE: [f64; 8] = [0.1, -0.2, 0.05, 0.15, -0.1, 0.0, -0.05, 0.2];
const SIGMA: f64 = 0.5;

/// Gaussian log-likelihood of the data under `y = slope * x + intercept`,
/// up to a constant.
fn regression_likelihood(slope: &Value<f64>, intercept: &Value<f64>) -> Value<f64> {
    let n = XS.len();
    let xs = TensorValue::<DenseBackend>::from_elems(XS.to_vec(), &[n]).unwrap();
    let ys: Vec<f64> = XS.iter().zip(NOISE).map(|(x, e)| 2.0 * x + 1.0 + e).collect();
    let ys = TensorValue::<DenseBackend>::from_elems(ys, &[n]).unwrap();

    let mean = TensorValue::fill(slope, &[n])
        .times(&xs)
        .unwrap()
        .plus(&TensorValue::fill(intercept, &[n]))
        .unwrap();
    let resid = ys.minus(&mean).unwrap();
    let two = TensorValue::from_elems(vec![2.0; n], &[n]).unwrap();
    let squares = resid.pow(&two).unwrap().sum_all();
    -(squares / (2.0 * SIGMA * SIGMA))
}

#[test]
fn test_reparam_linear_regression() {
    let store = ParamStore::new(Sgd);
    let guide = ReparamGuide::with_config(ReparamConfig { clamp: 1.0 });
    let prior = Normal::new(0.0, 10.0);
    let mut rng = ChaCha8Rng::seed_from_u64(21);

    let q = |name: &str| {
        let loc = store.param(0.0, 0.5, &format!("{name}.loc"));
        let scale = store.param(-1.0, 0.5, &format!("{name}.log_scale")).exp();
        Normal::from_values(loc, scale)
    };

    let (mut sum_a, mut sum_b) = (0.0, 0.0);
    for step in 0..BURN_IN + MEASURED {
        let a = guide.sample(&q("a"), &prior, &mut rng);
        let b = guide.sample(&q("b"), &prior, &mut rng);
        let data = Observation::from_score(regression_likelihood(a.get(), b.get()));
        if step >= BURN_IN {
            sum_a += a.get().v();
            sum_b += b.get().v();
        }
        data.complete();
        b.complete();
        a.complete();
    }

    let (mean_a, mean_b) = (sum_a / MEASURED as f64, sum_b / MEASURED as f64);
    assert!((mean_a - 2.0).abs() < 0.1, "slope {mean_a}");
    assert!((mean_b - 1.0).abs() < 0.1, "intercept {mean_b}");
    // posterior sd of the slope is 0.5 / sqrt(10.5), about 0.15
    let scale_a = store.value("a.log_scale").unwrap().exp();
    assert!(scale_a > 0.02 && scale_a < 1.0, "slope scale {scale_a}");
}

#[test]
fn test_categorical_guide_with_tensor_parameter() {
    let store = ParamStore::new(Sgd);
    let guide = BbviGuide::new();
    let prior = Categorical::<DenseBackend>::from_probs(&[0.6, 0.3, 0.1]).unwrap();
    let initial = DenseTensor::zeros(&[3]);
    let mut rng = ChaCha8Rng::seed_from_u64(5);

    for _ in 0..5_000 {
        let logits = store.tensor_param::<DenseBackend>(&initial, 2.0, "logits");
        let q = Categorical::new(logits).unwrap();
        guide.sample(&q, &prior, &mut rng).complete();
    }

    let fitted = Categorical::new(TensorValue::<DenseBackend>::constant(
        store.tensor_value::<DenseBackend>("logits").unwrap(),
    ))
    .unwrap();
    assert_eq!(fitted.mode(), 0);
    let probs: Vec<f64> = fitted.log_probs().data().iter().map(|l| l.exp()).collect();
    assert!(probs[0] > probs[1] && probs[1] > probs[2], "{probs:?}");
}

#[test]
fn test_momentum_store_drives_bbvi() {
    let store = ParamStore::new(Momentum::new(0.5));
    let guide = BbviGuide::new();
    let prior = Bernoulli::new(0.8);
    let mut rng = ChaCha8Rng::seed_from_u64(8);

    for _ in 0..5_000 {
        let q = Bernoulli::from_logit(store.param(0.0, 4.0, "p"));
        guide.sample(&q, &prior, &mut rng).complete();
    }

    let fitted = Bernoulli::from_logit(Value::constant(store.value("p").unwrap()));
    assert!(fitted.probability() > 0.6, "{}", fitted.probability());
}

#[test]
fn test_observation_score_matches_distribution() {
    let d = Normal::new(1.0, 2.0);
    let obs = Observation::new(&d, &Value::constant(1.0));
    assert_relative_eq!(
        obs.score().v(),
        -(2.0_f64).ln() - 0.5 * (2.0 * std::f64::consts::PI).ln(),
        epsilon = 1e-12
    );
    assert_relative_eq!(d.observe(&Value::constant(3.0)).v(), obs.score().v() - 0.5, epsilon = 1e-12);
}
