//! Vn tests: the standardised (Anderson-Darling weighted) KS supremum.
//!
//! # Algorithm
//!
//! ```text
//! V_n  = sup_{0<t<1} |U_n(t)| / √(t(1 − t))
//! V_n⁺ = sup_{0<t<1}  U_n(t)  / √(t(1 − t))
//! ```
//!
//! The weight is singular at 0 and 1, where the functional is taken as 0.
//! V_n has no non-degenerate limit law; instead, with
//!
//! ```text
//! a_n = √(2 log log n)
//! d_n = 2 log log n + ½ log log log n − ½ log π
//! ```
//!
//! `a_n V_n − d_n` converges to a Gumbel law, giving the critical values
//!
//! ```text
//! c_α  = (d_n − log(−½ log(1 − α))) / a_n     (two-sided)
//! c_α⁺ = (d_n − log(−log(1 − α)))   / a_n     (one-sided)
//! ```
//!
//! These need n ≥ 3 so that log log log n is defined.
//!
//! # References
//!
//! Jaeschke, D. (1979). "The asymptotic distribution of the supremum of the
//! standardized empirical distribution function on subintervals",
//! *Ann. Statist.* 7(1), 108–115.

use std::f64::consts::PI;

use crate::empirical::Sample;
use crate::error::{invalid, Result, UniformityError};

use super::engine::maximize_over_jumps;
use super::kind::{Cdf, UniformityStatistic};

/// Two-sided Vn test.
#[derive(Debug, Clone, Copy, Default)]
pub struct VnTest;

/// One-sided Vn test.
#[derive(Debug, Clone, Copy, Default)]
pub struct VnTestOneSided;

fn weighted(t: f64, u: f64) -> f64 {
    if t <= 0.0 || t >= 1.0 {
        0.0
    } else {
        u / (t * (1.0 - t)).sqrt()
    }
}

/// Extreme-value critical value for samples of length `n`.
///
/// `two_sided` selects the `−½ log(1 − α)` term.
pub fn vn_critical_value(alpha: f64, n: usize, two_sided: bool) -> Result<f64> {
    if n < 3 {
        return Err(invalid(format!("n must be at least 3, got {n}")));
    }
    let loglog = (n as f64).ln().ln();
    let a_n = (2.0 * loglog).sqrt();
    let d_n = 2.0 * loglog + 0.5 * loglog.ln() - 0.5 * PI.ln();
    let tail = if two_sided {
        -0.5 * (1.0 - alpha).ln()
    } else {
        -(1.0 - alpha).ln()
    };
    Ok((d_n - tail.ln()) / a_n)
}

fn no_cdf(name: &str) -> UniformityError {
    UniformityError::UnsupportedOperation(format!("the {name} has no distribution function"))
}

impl UniformityStatistic for VnTest {
    fn name(&self) -> &'static str {
        "Vn test"
    }

    fn compute_statistic(&self, sample: &Sample) -> Result<f64> {
        Ok(maximize_over_jumps(sample, |t| weighted(t, sample.uep_unchecked(t).abs()))?.max)
    }

    fn asymptotic_cdf(&self, _max_iter: usize) -> Result<Cdf> {
        Err(no_cdf(self.name()))
    }

    fn closed_form_critical_value(&self, alpha: f64, n: usize) -> Option<Result<f64>> {
        Some(vn_critical_value(alpha, n, true))
    }
}

impl UniformityStatistic for VnTestOneSided {
    fn name(&self) -> &'static str {
        "one-sided Vn test"
    }

    fn compute_statistic(&self, sample: &Sample) -> Result<f64> {
        Ok(maximize_over_jumps(sample, |t| weighted(t, sample.uep_unchecked(t)))?.max)
    }

    fn asymptotic_cdf(&self, _max_iter: usize) -> Result<Cdf> {
        Err(no_cdf(self.name()))
    }

    fn closed_form_critical_value(&self, alpha: f64, n: usize) -> Option<Result<f64>> {
        Some(vn_critical_value(alpha, n, false))
    }
}
