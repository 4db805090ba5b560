//! Real scalar trait for graph values and tensor elements.

use std::fmt::Debug;
use std::ops::AddAssign;

use num_traits::Float;

/// Trait for real scalar types supported by probgrad.
///
/// Arithmetic and the elementary functions come from [`Float`]. The extras
/// here are the functions the graph differentiates that `Float` lacks, so
/// the scalar and tensor graphs share one set of derivative rules.
pub trait Real: Float + AddAssign + Debug + Default + 'static {
    /// Lossy conversion from `f64`.
    fn from_f64(x: f64) -> Self;

    /// Widening conversion to `f64`.
    fn widen(self) -> f64 {
        self.to_f64().unwrap_or(f64::NAN)
    }

    /// `1 / (1 + exp(-x))`.
    fn logistic(self) -> Self {
        Self::one() / (Self::one() + (-self).exp())
    }

    /// `ln(1 + exp(x))`, linear above 30 to avoid overflow.
    fn softplus(self) -> Self {
        if self > Self::from_f64(30.0) { self } else { self.exp().ln_1p() }
    }

    fn digamma(self) -> Self {
        Self::from_f64(digamma(self.widen()))
    }

    fn trigamma(self) -> Self {
        self.polygamma(1)
    }

    /// `order`-th derivative of the digamma function.
    fn polygamma(self, order: u32) -> Self {
        Self::from_f64(polygamma(order, self.widen()))
    }

    /// Natural log of the absolute value of the gamma function.
    fn lgamma(self) -> Self {
        Self::from_f64(lgamma(self.widen()))
    }
}

impl Real for f64 {
    fn from_f64(x: f64) -> Self {
        x
    }

    fn widen(self) -> f64 {
        self
    }
}

impl Real for f32 {
    fn from_f64(x: f64) -> Self {
        x as f32
    }
}

/// Shift the argument up to at least this before using asymptotic series.
const ASYMPTOTIC_CUTOFF: f64 = 10.0;

fn digamma(x: f64) -> f64 {
    if x.is_nan() || x == f64::NEG_INFINITY {
        return f64::NAN;
    }
    if x <= 0.0 {
        if x == x.floor() {
            return f64::NAN;
        }
        // psi(1 - x) - psi(x) = pi * cot(pi * x)
        let pi = std::f64::consts::PI;
        return digamma(1.0 - x) - pi / (pi * x).tan();
    }

    let mut x = x;
    let mut acc = 0.0;
    while x < ASYMPTOTIC_CUTOFF {
        acc -= 1.0 / x;
        x += 1.0;
    }
    let inv2 = 1.0 / (x * x);
    let series = inv2
        * (1.0 / 12.0
            - inv2 * (1.0 / 120.0 - inv2 * (1.0 / 252.0 - inv2 * (1.0 / 240.0 - inv2 / 132.0))));
    acc + x.ln() - 0.5 / x - series
}

/// Bernoulli numbers `B_2, B_4, ..., B_12` for the polygamma series.
const BERNOULLI: [f64; 6] = [
    1.0 / 6.0,
    -1.0 / 30.0,
    1.0 / 42.0,
    -1.0 / 30.0,
    5.0 / 66.0,
    -691.0 / 2730.0,
];

fn polygamma(order: u32, x: f64) -> f64 {
    if order == 0 {
        return digamma(x);
    }
    if x.is_nan() || x == f64::NEG_INFINITY || (x <= 0.0 && x == x.floor()) {
        return f64::NAN;
    }
    let n = order as i32;
    let n_fact: f64 = (1..=order).map(f64::from).product();
    // (-1)^(n + 1)
    let sign = if order % 2 == 1 { 1.0 } else { -1.0 };

    // psi_n(x) = psi_n(x + 1) + (-1)^(n + 1) n! / x^(n + 1)
    let mut x = x;
    let mut acc = 0.0;
    while x < ASYMPTOTIC_CUTOFF {
        acc += sign * n_fact / x.powi(n + 1);
        x += 1.0;
    }

    let mut series = n_fact / f64::from(order) / x.powi(n) + n_fact / (2.0 * x.powi(n + 1));
    // (2k + n - 1)! / (2k)!
    let mut ratio = n_fact * f64::from(order + 1) / 2.0;
    for (k, b) in (1..).zip(BERNOULLI) {
        series += b * ratio / x.powi(2 * k + n);
        let m = f64::from(2 * k + n);
        ratio *= m * (m + 1.0) / (f64::from(2 * k + 1) * f64::from(2 * k + 2));
    }
    acc + sign * series
}

/// Lanczos approximation, g = 7, n = 9.
const LANCZOS_G: f64 = 7.0;
const LANCZOS_COEFFS: [f64; 9] = [
    0.999_999_999_999_809_9,
    676.520_368_121_885_1,
    -1_259.139_216_722_402_8,
    771.323_428_777_653_1,
    -176.615_029_162_140_6,
    12.507_343_278_686_905,
    -0.138_571_095_265_720_12,
    9.984_369_578_019_572e-6,
    1.505_632_735_149_311_6e-7,
];

fn lgamma(x: f64) -> f64 {
    if x.is_nan() {
        return f64::NAN;
    }
    if x <= 0.0 && x == x.floor() {
        return f64::INFINITY;
    }
    let pi = std::f64::consts::PI;
    if x < 0.5 {
        // Gamma(x) Gamma(1 - x) = pi / sin(pi x)
        return (pi / (pi * x).sin().abs()).ln() - lgamma(1.0 - x);
    }

    let x = x - 1.0;
    let mut sum = LANCZOS_COEFFS[0];
    for (i, &c) in LANCZOS_COEFFS.iter().enumerate().skip(1) {
        sum += c / (x + i as f64);
    }
    let t = x + LANCZOS_G + 0.5;
    0.5 * (2.0 * pi).ln() + (x + 0.5) * t.ln() - t + sum.ln()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const EULER_MASCHERONI: f64 = 0.577_215_664_901_532_9;

    #[test]
    fn test_f32_extras() {
        assert_relative_eq!(Real::digamma(1.0_f32), -EULER_MASCHERONI as f32, epsilon = 1e-6);
        assert_relative_eq!(Real::logistic(0.0_f32), 0.5);
        assert_eq!(Real::widen(0.5_f32), 0.5);
    }

    #[test]
    fn test_lgamma_known_values() {
        assert_relative_eq!(Real::lgamma(1.0_f64), 0.0, epsilon = 1e-12);
        assert_relative_eq!(Real::lgamma(2.0_f64), 0.0, epsilon = 1e-12);
        // Gamma(5) = 24
        assert_relative_eq!(Real::lgamma(5.0_f64), 24.0_f64.ln(), epsilon = 1e-12);
        // Gamma(1/2) = sqrt(pi)
        let half_ln_pi = 0.5 * std::f64::consts::PI.ln();
        assert_relative_eq!(Real::lgamma(0.5_f64), half_ln_pi, epsilon = 1e-12);
        // |Gamma(-1/2)| = 2 sqrt(pi)
        assert_relative_eq!(
            Real::lgamma(-0.5_f64),
            (2.0 * std::f64::consts::PI.sqrt()).ln(),
            epsilon = 1e-10
        );
    }

    #[test]
    fn test_digamma_known_values() {
        assert_relative_eq!(Real::digamma(1.0_f64), -EULER_MASCHERONI, epsilon = 1e-12);
        // psi(1/2) = -gamma - 2 ln 2
        assert_relative_eq!(
            Real::digamma(0.5_f64),
            -EULER_MASCHERONI - 2.0 * 2.0_f64.ln(),
            epsilon = 1e-12
        );
        // psi(x + 1) = psi(x) + 1/x
        for &x in &[0.3, 1.7, 4.2, 11.0] {
            assert_relative_eq!(
                Real::digamma(x + 1.0),
                Real::digamma(x) + 1.0 / x,
                epsilon = 1e-12
            );
        }
    }

    #[test]
    fn test_trigamma_known_values() {
        let pi2 = std::f64::consts::PI * std::f64::consts::PI;
        assert_relative_eq!(Real::trigamma(1.0_f64), pi2 / 6.0, epsilon = 1e-10);
        assert_relative_eq!(Real::trigamma(0.5_f64), pi2 / 2.0, epsilon = 1e-10);
        // reflection: psi_1(1 - x) + psi_1(x) = pi^2 / sin^2(pi x)
        let x = -0.25_f64;
        let s = (std::f64::consts::PI * x).sin();
        assert_relative_eq!(
            Real::trigamma(1.0 - x) + Real::trigamma(x),
            pi2 / (s * s),
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_polygamma_known_values() {
        const APERY: f64 = 1.202_056_903_159_594_3;
        let pi = std::f64::consts::PI;
        assert_relative_eq!(Real::polygamma(1.0_f64, 2), -2.0 * APERY, epsilon = 1e-12);
        assert_relative_eq!(Real::polygamma(0.5_f64, 2), -14.0 * APERY, epsilon = 1e-11);
        assert_relative_eq!(Real::polygamma(1.0_f64, 3), pi.powi(4) / 15.0, epsilon = 1e-11);
        assert_relative_eq!(Real::polygamma(2.5_f64, 0), Real::digamma(2.5_f64));
        assert!(Real::polygamma(-2.0_f64, 2).is_nan());
    }

    #[test]
    fn test_polygamma_chain() {
        let h = 1e-5;
        for &x in &[-1.5, 0.3, 1.7, 4.2, 11.0] {
            for order in 1..3 {
                let numerical = (Real::polygamma(x + h, order) - Real::polygamma(x - h, order)) / (2.0 * h);
                assert_relative_eq!(
                    Real::polygamma(x, order + 1),
                    numerical,
                    max_relative = 1e-6
                );
            }
        }
    }

    #[test]
    fn test_digamma_is_derivative_of_lgamma() {
        let h = 1e-6;
        for &x in &[-1.5, 0.25, 1.0, 3.5, 20.0] {
            let numerical = (Real::lgamma(x + h) - Real::lgamma(x - h)) / (2.0 * h);
            assert_relative_eq!(Real::digamma(x), numerical, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_softplus_and_logistic() {
        assert_relative_eq!(Real::softplus(0.0_f64), 2.0_f64.ln());
        assert_eq!(Real::softplus(100.0_f64), 100.0);
        assert_relative_eq!(Real::logistic(0.0_f64), 0.5);
        assert_eq!(Real::logistic(-1000.0_f64), 0.0);
    }
}
