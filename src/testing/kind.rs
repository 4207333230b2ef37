//! The capability interface shared by all test variants and the closed set of
//! variants implementing it.

use std::fmt;

use crate::empirical::Sample;
use crate::error::Result;

use super::ks::{KsTest, KsTestOneSided};
use super::ln::{LnTest, LnTestOneSided};
use super::vn::{VnTest, VnTestOneSided};

/// An asymptotic distribution function of a test statistic.
pub type Cdf = Box<dyn Fn(f64) -> f64 + Send + Sync>;

/// What every uniformity test supplies to the shared engine.
pub trait UniformityStatistic {
    /// Human-readable name; also names the quantile cache file.
    fn name(&self) -> &'static str;

    /// Computes the test statistic T_n of `sample`.
    ///
    /// # Errors
    ///
    /// [`UniformityError::EmptySample`](crate::UniformityError::EmptySample)
    /// if `sample` is empty.
    fn compute_statistic(&self, sample: &Sample) -> Result<f64>;

    /// The limiting (n → ∞) distribution function of T_n under H₀, truncated
    /// to `max_iter` series terms where a series is involved. Output is
    /// clamped to [0, 1].
    ///
    /// # Errors
    ///
    /// [`UniformityError::UnsupportedOperation`](crate::UniformityError::UnsupportedOperation)
    /// if the statistic has no known distribution function.
    fn asymptotic_cdf(&self, max_iter: usize) -> Result<Cdf>;

    /// Closed-form critical value at significance level `alpha` for samples
    /// of length `n`, bypassing distribution-function inversion.
    ///
    /// `None` means the engine should invert [`asymptotic_cdf`](Self::asymptotic_cdf).
    fn closed_form_critical_value(&self, _alpha: f64, _n: usize) -> Option<Result<f64>> {
        None
    }
}

/// The closed set of supported test variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TestKind {
    /// Two-sided Kolmogorov-Smirnov.
    Ks,
    /// One-sided Kolmogorov-Smirnov.
    KsOneSided,
    /// Studentised KS statistic at the argmax of |U_n|.
    Ln,
    /// One-sided Ln.
    LnOneSided,
    /// Weighted sup of |U_n| / √(t(1−t)).
    Vn,
    /// One-sided Vn.
    VnOneSided,
}

impl TestKind {
    /// Every variant, two-sided first.
    pub const ALL: [TestKind; 6] = [
        TestKind::Ks,
        TestKind::Ln,
        TestKind::Vn,
        TestKind::KsOneSided,
        TestKind::LnOneSided,
        TestKind::VnOneSided,
    ];

    fn statistic(self) -> &'static dyn UniformityStatistic {
        match self {
            TestKind::Ks => &KsTest,
            TestKind::KsOneSided => &KsTestOneSided,
            TestKind::Ln => &LnTest,
            TestKind::LnOneSided => &LnTestOneSided,
            TestKind::Vn => &VnTest,
            TestKind::VnOneSided => &VnTestOneSided,
        }
    }

    /// True if the variant has an asymptotic distribution function.
    pub fn has_cdf(self) -> bool {
        !matches!(self, TestKind::Vn | TestKind::VnOneSided)
    }
}

impl UniformityStatistic for TestKind {
    fn name(&self) -> &'static str {
        self.statistic().name()
    }

    fn compute_statistic(&self, sample: &Sample) -> Result<f64> {
        self.statistic().compute_statistic(sample)
    }

    fn asymptotic_cdf(&self, max_iter: usize) -> Result<Cdf> {
        self.statistic().asymptotic_cdf(max_iter)
    }

    fn closed_form_critical_value(&self, alpha: f64, n: usize) -> Option<Result<f64>> {
        self.statistic().closed_form_critical_value(alpha, n)
    }
}

impl fmt::Display for TestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Clamps a truncated-series probability to [0, 1].
pub(crate) fn clamp_probability(p: f64) -> f64 {
    p.clamp(0.0, 1.0)
}
