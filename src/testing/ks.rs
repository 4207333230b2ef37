//! Kolmogorov-Smirnov tests for uniformity.
//!
//! # Algorithm
//!
//! ```text
//! K_n  = sup_t |U_n(t)|        (two-sided)
//! K_n⁺ = sup_t  U_n(t)         (one-sided)
//! ```
//!
//! The two-sided statistic converges to the Kolmogorov distribution
//!
//! ```text
//! K(x) = √(2π)/x · Σ_{k≥1} exp(−(2k−1)²π² / (8x²))
//! ```
//!
//! which converges much faster for small x than the alternating
//! `1 − 2Σ(−1)^{k−1} exp(−2k²x²)` form. The one-sided statistic has
//! `P(K⁺ ≤ x) = 1 − exp(−2x²)`, so its critical value is closed-form.
//!
//! # References
//!
//! - Kolmogorov, A. (1933). "Sulla determinazione empirica di una legge di
//!   distribuzione", *Giornale dell'Istituto Italiano degli Attuari* 4, 83–91.
//! - Smirnov, N. (1948). "Table for estimating the goodness of fit of
//!   empirical distributions", *Ann. Math. Statist.* 19(2), 279–281.

use std::f64::consts::PI;

use crate::empirical::Sample;
use crate::error::Result;

use super::engine::maximize_over_jumps;
use super::kind::{clamp_probability, Cdf, UniformityStatistic};

/// Two-sided Kolmogorov-Smirnov test.
#[derive(Debug, Clone, Copy, Default)]
pub struct KsTest;

/// One-sided Kolmogorov-Smirnov test.
#[derive(Debug, Clone, Copy, Default)]
pub struct KsTestOneSided;

/// Kolmogorov distribution function truncated to `max_iter` terms.
pub fn kolmogorov_cdf(x: f64, max_iter: usize) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    let denom = 8.0 * x * x;
    let sum: f64 = (1..=max_iter)
        .map(|k| {
            let a = (2 * k - 1) as f64;
            (-(a * a * PI * PI) / denom).exp()
        })
        .sum();
    clamp_probability((2.0 * PI).sqrt() / x * sum)
}

impl UniformityStatistic for KsTest {
    fn name(&self) -> &'static str {
        "Kolmogorov Smirnov test"
    }

    fn compute_statistic(&self, sample: &Sample) -> Result<f64> {
        Ok(maximize_over_jumps(sample, |t| sample.uep_unchecked(t).abs())?.max)
    }

    fn asymptotic_cdf(&self, max_iter: usize) -> Result<Cdf> {
        Ok(Box::new(move |x| kolmogorov_cdf(x, max_iter)))
    }
}

impl UniformityStatistic for KsTestOneSided {
    fn name(&self) -> &'static str {
        "one-sided Kolmogorov Smirnov test"
    }

    fn compute_statistic(&self, sample: &Sample) -> Result<f64> {
        Ok(maximize_over_jumps(sample, |t| sample.uep_unchecked(t))?.max)
    }

    fn asymptotic_cdf(&self, _max_iter: usize) -> Result<Cdf> {
        Ok(Box::new(|x: f64| {
            if x <= 0.0 {
                0.0
            } else {
                clamp_probability(1.0 - (-2.0 * x * x).exp())
            }
        }))
    }

    fn closed_form_critical_value(&self, alpha: f64, _n: usize) -> Option<Result<f64>> {
        Some(Ok((-0.5 * alpha.ln()).sqrt()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::UniformityError;

    #[test]
    fn kolmogorov_cdf_known_values() {
        // K(1.358) ≈ 0.95, K(1.224) ≈ 0.90
        assert!((kolmogorov_cdf(1.3581, 100) - 0.95).abs() < 1e-3);
        assert!((kolmogorov_cdf(1.2238, 100) - 0.90).abs() < 1e-3);
        assert_eq!(kolmogorov_cdf(0.0, 100), 0.0);
        assert_eq!(kolmogorov_cdf(-1.0, 100), 0.0);
        assert!(kolmogorov_cdf(0.1, 100) < 1e-10);
    }

    #[test]
    fn kolmogorov_cdf_is_monotone() {
        let mut prev = 0.0;
        for i in 1..=300 {
            let p = kolmogorov_cdf(i as f64 * 0.01, 100);
            assert!(p >= prev - 1e-12, "x = {}", i as f64 * 0.01);
            prev = p;
        }
        assert!(prev > 0.999);
    }

    #[test]
    fn statistic_of_small_sample() {
        // F_n(0.1⁻) − 0.1 = −0.1, F_n(0.4) − 0.4 ≈ 0.2667, F_n(0.7) − 0.7 = 0.3.
        let s = Sample::new(&[0.7, 0.1, 0.4]);
        let k = KsTest.compute_statistic(&s).unwrap();
        assert!((k - 3f64.sqrt() * 0.3).abs() < 1e-5, "K = {k}");
        let k_plus = KsTestOneSided.compute_statistic(&s).unwrap();
        assert!((k_plus - 3f64.sqrt() * 0.3).abs() < 1e-5, "K+ = {k_plus}");
    }

    #[test]
    fn one_sided_ignores_negative_deviations() {
        // All mass late: U_n is never far above zero.
        let s = Sample::new(&[0.91, 0.93, 0.95, 0.97, 0.99]);
        let k = KsTest.compute_statistic(&s).unwrap();
        let k_plus = KsTestOneSided.compute_statistic(&s).unwrap();
        assert!(k > 2.0);
        assert!(k_plus < 0.1);
    }

    #[test]
    fn empty_sample() {
        assert!(matches!(
            KsTest.compute_statistic(&Sample::default()),
            Err(UniformityError::EmptySample)
        ));
    }

    #[test]
    fn one_sided_closed_form() {
        let c = KsTestOneSided
            .closed_form_critical_value(0.1, 0)
            .unwrap()
            .unwrap();
        assert_eq!(c, (-0.5 * 0.1f64.ln()).sqrt());
        // Agrees with its own distribution function.
        let cdf = KsTestOneSided.asymptotic_cdf(0).unwrap();
        assert!((cdf(c) - 0.9).abs() < 1e-12);
    }
}
