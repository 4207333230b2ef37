//! Ln tests: the KS supremum studentised at its own location.
//!
//! # Algorithm
//!
//! With τ_n the point where |U_n| attains its supremum,
//!
//! ```text
//! L_n = |U_n(τ_n)| / √(τ_n (1 − τ_n))
//! ```
//!
//! and L_n⁺ is the same with the signed process. With a_k = 2k + 1, Φ the
//! standard normal CDF and φ its density, the limiting distribution is
//!
//! ```text
//! F(x) = 16 Σ_{l≥1} Σ_{j<l} (−1)^{j+l} a_j a_l / (a_l² − a_j²)
//!              · ((Φ(a_j x) − ½)/a_j − (Φ(a_l x) − ½)/a_l)
//!      +  4 Σ_{j≥0} ((Φ(a_j x) − ½)/a_j − x φ(a_j x))
//! ```
//!
//! and for the one-sided statistic `F⁺(x) = 2Φ(x) − √(2/π) x e^{−x²/2} − 1`.
//!
//! Truncating the double series can push the sum slightly outside [0, 1];
//! the result is clamped.
//!
//! # References
//!
//! Ferger, D. (2018). "On the supremum of a Brownian bridge standardized by
//! its maximizing point with applications to statistics",
//! *Statistics & Probability Letters* 134, 63–69.

use std::f64::consts::PI;

use u_numflow::special::{standard_normal_cdf, standard_normal_pdf};

use crate::empirical::Sample;
use crate::error::Result;

use super::engine::{maximize_over_jumps, Extremum};
use super::kind::{clamp_probability, Cdf, UniformityStatistic};

/// Two-sided Ln test.
#[derive(Debug, Clone, Copy, Default)]
pub struct LnTest;

/// One-sided Ln test.
#[derive(Debug, Clone, Copy, Default)]
pub struct LnTestOneSided;

fn studentise(e: Extremum) -> f64 {
    let t = e.argmax;
    let var = t * (1.0 - t);
    if var <= 0.0 {
        0.0
    } else {
        e.max / var.sqrt()
    }
}

/// Limiting distribution function of L_n, truncated after `max_iter` outer
/// terms.
///
/// Each Φ(a_j x) is evaluated once; the summation order is otherwise that of
/// the nested series.
pub fn ln_cdf(x: f64, max_iter: usize) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    // (Φ(a_j x) − ½) / a_j for j = 0..=max_iter
    let scaled: Vec<f64> = (0..=max_iter)
        .map(|j| {
            let a = (2 * j + 1) as f64;
            (standard_normal_cdf(a * x) - 0.5) / a
        })
        .collect();

    let mut res = 4.0 * (standard_normal_cdf(x) - 0.5 - x * standard_normal_pdf(x));
    for l in 1..=max_iter {
        let al = (2 * l + 1) as f64;
        let phi_l = scaled[l];
        res += 4.0 * (phi_l - x * standard_normal_pdf(al * x));

        for (j, &phi_j) in scaled.iter().enumerate().take(l) {
            let aj = (2 * j + 1) as f64;
            let sign = if (j + l) % 2 == 0 { 1.0 } else { -1.0 };
            res += 16.0 * sign * (aj * al) / (al * al - aj * aj) * (phi_j - phi_l);
        }
    }
    clamp_probability(res)
}

/// Limiting distribution function of L_n⁺.
pub fn ln_one_sided_cdf(x: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    clamp_probability(
        2.0 * standard_normal_cdf(x) - (2.0 / PI).sqrt() * x * (-0.5 * x * x).exp() - 1.0,
    )
}

impl UniformityStatistic for LnTest {
    fn name(&self) -> &'static str {
        "Ln test"
    }

    fn compute_statistic(&self, sample: &Sample) -> Result<f64> {
        let e = maximize_over_jumps(sample, |t| sample.uep_unchecked(t).abs())?;
        Ok(studentise(e))
    }

    fn asymptotic_cdf(&self, max_iter: usize) -> Result<Cdf> {
        Ok(Box::new(move |x| ln_cdf(x, max_iter)))
    }
}

impl UniformityStatistic for LnTestOneSided {
    fn name(&self) -> &'static str {
        "one-sided Ln test"
    }

    fn compute_statistic(&self, sample: &Sample) -> Result<f64> {
        let e = maximize_over_jumps(sample, |t| sample.uep_unchecked(t))?;
        Ok(studentise(e))
    }

    fn asymptotic_cdf(&self, _max_iter: usize) -> Result<Cdf> {
        Ok(Box::new(ln_one_sided_cdf))
    }
}
