//! Goodness-of-fit tests for the hypothesis H₀: "the sample is U(0, 1)".
//!
//! Every test is a supremum-type functional of the uniform empirical process
//! U_n(t) = √n (F_n(t) − t). The variants differ in the functional and in
//! how the critical value is obtained:
//!
//! | Test | Statistic | Critical value |
//! |------|-----------|----------------|
//! | [`TestKind::Ks`] | sup \|U_n\| | inverted Kolmogorov distribution |
//! | [`TestKind::KsOneSided`] | sup U_n | closed form √(−½ log α) |
//! | [`TestKind::Ln`] | \|U_n(τ_n)\| / √(τ_n(1−τ_n)) | inverted series |
//! | [`TestKind::LnOneSided`] | signed Ln | inverted closed-form CDF |
//! | [`TestKind::Vn`] | sup \|U_n\| / √(t(1−t)) | extreme-value formula in n |
//! | [`TestKind::VnOneSided`] | signed Vn | extreme-value formula in n |
//!
//! [`StatisticalTest`] binds a variant to a sample and memoises solved
//! quantiles in a [`QuantileTable`](crate::quantile_table::QuantileTable).
//!
//! # Examples
//!
//! ```
//! use u_uniformity::testing::{Precision, StatisticalTest, TestKind};
//!
//! let mut ln = StatisticalTest::new(TestKind::Ln);
//! let c = ln.critical_value(0.1, Precision::default(), None).unwrap();
//! assert!((c - 2.70).abs() < 0.01);
//! ```

mod engine;
mod kind;
mod ks;
mod ln;
mod vn;

pub use engine::{
    invert_cdf, maximize_over_jumps, maximize_over_jumps_with, Extremum, Precision,
    StatisticalTest, TestOutcome, DEFAULT_JUMP_PROBE, DEFAULT_MAX_SOLVER_STEPS,
};
pub use kind::{Cdf, TestKind, UniformityStatistic};
pub use ks::{kolmogorov_cdf, KsTest, KsTestOneSided};
pub use ln::{ln_cdf, ln_one_sided_cdf, LnTest, LnTestOneSided};
pub use vn::{vn_critical_value, VnTest, VnTestOneSided};
