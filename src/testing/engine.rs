//! The shared test engine: sample handling, maximisation over jump points,
//! and critical values backed by the quantile cache.

use std::fmt;
use std::path::Path;

use crate::chart::Color;
use crate::empirical::Sample;
use crate::error::{invalid, Result, UniformityError};
use crate::quantile_table::{normalize_alpha, QuantileTable, QuantileTableEntry};

use super::kind::{Cdf, TestKind, UniformityStatistic};

/// Relative probe width of [`maximize_over_jumps`]: the functional is
/// evaluated at `x_i ± DEFAULT_JUMP_PROBE / n`.
///
/// Empirically tuned. Too large a probe skips over neighbouring jump points
/// for dense samples; too small a probe is lost in rounding near 1.
pub const DEFAULT_JUMP_PROBE: f64 = 1e-6;

/// Step guard of the critical-value solver.
pub const DEFAULT_MAX_SOLVER_STEPS: usize = 100_000;

/// Location and value of a maximum.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extremum {
    /// Point where the maximum was found.
    pub argmax: f64,
    /// The maximum value.
    pub max: f64,
}

/// Maximises a functional of the empirical process over the sample's jump
/// points, with the default probe.
///
/// See [`maximize_over_jumps_with`].
pub fn maximize_over_jumps<F>(sample: &Sample, f: F) -> Result<Extremum>
where
    F: Fn(f64) -> f64,
{
    maximize_over_jumps_with(sample, DEFAULT_JUMP_PROBE, f)
}

/// Maximises `f` by evaluating it at every sorted sample point x_i and at
/// `x_i ± probe / n`.
///
/// U_n is càdlàg and affine between jumps, so the supremum of a monotone
/// transform of it is attained at a jump point or immediately to its left.
/// The result is exact for functionals that are piecewise affine between
/// jumps and within O(probe / n) of the supremum for smoother ones.
///
/// Ties keep the first point found.
///
/// # Errors
///
/// [`UniformityError::EmptySample`] if the sample is empty.
///
/// # Examples
///
/// ```
/// use u_uniformity::empirical::Sample;
/// use u_uniformity::testing::maximize_over_jumps;
///
/// let s = Sample::new(&[0.2, 0.9]);
/// // U_2 jumps up to √2 (0.5 − 0.2) at 0.2.
/// let e = maximize_over_jumps(&s, |t| s.uniform_empirical_process(t).unwrap()).unwrap();
/// assert_eq!(e.argmax, 0.2);
/// assert!((e.max - 2f64.sqrt() * 0.3).abs() < 1e-12);
/// ```
pub fn maximize_over_jumps_with<F>(sample: &Sample, probe: f64, f: F) -> Result<Extremum>
where
    F: Fn(f64) -> f64,
{
    if sample.is_empty() {
        return Err(UniformityError::EmptySample);
    }
    let eps = probe / sample.len() as f64;
    let mut best = Extremum {
        argmax: 0.0,
        max: f64::NEG_INFINITY,
    };
    for &x in sample.sorted() {
        for t in [x, x + eps, x - eps] {
            let v = f(t);
            if v > best.max {
                best = Extremum { argmax: t, max: v };
            }
        }
    }
    Ok(best)
}

/// Finds x with `cdf(x) ≈ target` by the fixed-point correction
/// `x ← x − (cdf(x) − target)`, starting at 0.5.
///
/// This treats the local slope of the CDF as 1. It converges for the
/// steep, smooth distribution functions used here but not on flat regions,
/// which is why the step count is bounded.
///
/// # Errors
///
/// [`UniformityError::NotConverged`] if |cdf(x) − target| is still at least
/// `epsilon` after `max_steps` corrections.
///
/// # Examples
///
/// ```
/// use u_uniformity::testing::invert_cdf;
///
/// let cdf = |x: f64| 1.0 - (-2.0 * x * x).exp();
/// let q = invert_cdf(&cdf, 0.9, 1e-8, 10_000).unwrap();
/// assert!((cdf(q) - 0.9).abs() < 1e-8);
/// ```
pub fn invert_cdf(
    cdf: &dyn Fn(f64) -> f64,
    target: f64,
    epsilon: f64,
    max_steps: usize,
) -> Result<f64> {
    let mut x = 0.5;
    for step in 0..max_steps {
        let p = cdf(x);
        if (p - target).abs() < epsilon {
            tracing::debug!(target, quantile = x, steps = step, "quantile solved");
            return Ok(x);
        }
        x -= p - target;
    }
    Err(UniformityError::NotConverged { steps: max_steps })
}

/// Requested precision of a solved quantile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Precision {
    /// Tolerance on |F(x) − alpha|.
    pub epsilon: f64,
    /// Number of series terms in the distribution function.
    pub max_iter: usize,
}

impl Precision {
    /// Creates a validated precision; `epsilon` must be finite and non-negative.
    pub fn new(epsilon: f64, max_iter: usize) -> Result<Self> {
        let p = Self { epsilon, max_iter };
        p.validate()?;
        Ok(p)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if !self.epsilon.is_finite() || self.epsilon < 0.0 {
            return Err(invalid(format!(
                "epsilon must be finite and non-negative, got {}",
                self.epsilon
            )));
        }
        Ok(())
    }
}

impl Default for Precision {
    fn default() -> Self {
        Self {
            epsilon: 1e-4,
            max_iter: 100,
        }
    }
}

/// Result of a single test decision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TestOutcome {
    /// The variant that was run.
    pub kind: TestKind,
    /// Significance level.
    pub alpha: f64,
    /// Observed statistic T_n.
    pub statistic: f64,
    /// Critical value c_α.
    pub critical_value: f64,
    /// True iff H₀ ("the sample is uniform") is rejected.
    pub rejected: bool,
}

impl fmt::Display for TestOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.rejected {
            write!(
                f,
                "{}: H0 rejected, because Tn = {} > {} = c_alpha. \
                 The data is not uniformly distributed.",
                self.kind, self.statistic, self.critical_value
            )
        } else {
            write!(
                f,
                "{}: H0 accepted, because Tn = {} <= {} = c_alpha. \
                 The data is consistent with the uniform distribution.",
                self.kind, self.statistic, self.critical_value
            )
        }
    }
}

/// A uniformity test bound to one sample and one quantile cache.
///
/// Without a sample only critical values can be queried; after
/// [`set_sample`](Self::set_sample) the statistic and the empirical process
/// are available too. Samples may be swapped any number of times.
///
/// # Examples
///
/// ```
/// use u_uniformity::testing::{StatisticalTest, TestKind};
///
/// let data = [0.23209831, 0.31096291, 0.05139859, 0.69648799, 0.70084184,
///             0.54187119, 0.25457916, 0.46355967, 0.46506956, 0.88873228];
/// let mut ks = StatisticalTest::new(TestKind::Ks);
/// ks.set_sample(&data);
/// let outcome = ks.do_test(0.1).unwrap();
/// assert!(!outcome.rejected);
/// assert!((outcome.critical_value - 1.224).abs() < 1e-3);
/// ```
#[derive(Debug, Clone)]
pub struct StatisticalTest {
    kind: TestKind,
    sample: Sample,
    color: Color,
    table: QuantileTable,
    max_solver_steps: usize,
}

impl StatisticalTest {
    /// Creates a test with an in-memory quantile cache.
    pub fn new(kind: TestKind) -> Self {
        Self {
            kind,
            sample: Sample::default(),
            color: Color::default(),
            table: QuantileTable::new(kind.name()),
            max_solver_steps: DEFAULT_MAX_SOLVER_STEPS,
        }
    }

    /// Creates a test whose quantile cache is backed by a file under `dir`.
    ///
    /// Variants without a distribution function never cache anything and
    /// get an in-memory table.
    pub fn with_quantile_dir(kind: TestKind, dir: impl AsRef<Path>) -> Self {
        let mut test = Self::new(kind);
        if kind.has_cdf() {
            test.table = QuantileTable::open(dir, kind.name());
        }
        test
    }

    /// Sets the display color used in charts.
    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    /// Loads `values` as the sample.
    pub fn with_sample(mut self, values: &[f64]) -> Self {
        self.set_sample(values);
        self
    }

    /// Overrides the step guard of the quantile solver.
    pub fn with_max_solver_steps(mut self, steps: usize) -> Self {
        self.max_solver_steps = steps;
        self
    }

    /// Replaces the held sample.
    pub fn set_sample(&mut self, values: &[f64]) {
        self.sample.set(values);
    }

    /// The held sample.
    pub fn sample(&self) -> &Sample {
        &self.sample
    }

    /// The test variant.
    pub fn kind(&self) -> TestKind {
        self.kind
    }

    /// Display name of the variant.
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    /// Display color.
    pub fn color(&self) -> Color {
        self.color
    }

    /// The quantile cache.
    pub fn quantile_table(&self) -> &QuantileTable {
        &self.table
    }

    /// The test statistic of the held sample.
    pub fn statistic(&self) -> Result<f64> {
        self.kind.compute_statistic(&self.sample)
    }

    /// Empirical distribution function of the held sample at `v`.
    pub fn ecdf(&self, v: f64) -> Result<f64> {
        self.sample.ecdf(v)
    }

    /// U_n(v) of the held sample.
    pub fn uniform_empirical_process(&self, v: f64) -> Result<f64> {
        self.sample.uniform_empirical_process(v)
    }

    /// |U_n(v)| of the held sample.
    pub fn uniform_empirical_process_abs(&self, v: f64) -> Result<f64> {
        self.sample.uniform_empirical_process_abs(v)
    }

    /// See [`maximize_over_jumps`].
    pub fn maximize_over_jumps<F: Fn(f64) -> f64>(&self, f: F) -> Result<Extremum> {
        maximize_over_jumps(&self.sample, f)
    }

    /// See [`UniformityStatistic::asymptotic_cdf`].
    pub fn asymptotic_cdf(&self, max_iter: usize) -> Result<Cdf> {
        self.kind.asymptotic_cdf(max_iter)
    }

    /// The p-quantile of the asymptotic distribution, served from the cache
    /// when a sufficiently precise entry exists.
    ///
    /// # Errors
    ///
    /// - [`UniformityError::InvalidParameter`] if `p ∉ (0, 1)` or
    ///   `precision.epsilon < 0`.
    /// - [`UniformityError::UnsupportedOperation`] for the Vn family.
    /// - [`UniformityError::NotConverged`] if the solver hits its step guard.
    pub fn quantile(&mut self, p: f64, precision: Precision) -> Result<f64> {
        check_probability(p)?;
        precision.validate()?;

        if let Some(hit) = self.table.get(p, precision.epsilon, precision.max_iter) {
            tracing::debug!(test = self.name(), p, value = hit.value, "quantile cache hit");
            return Ok(hit.value);
        }

        let cdf = self.kind.asymptotic_cdf(precision.max_iter)?;
        let value = invert_cdf(&*cdf, p, precision.epsilon, self.max_solver_steps)?;
        self.table.append(QuantileTableEntry::new(
            p,
            value,
            precision.epsilon,
            precision.max_iter,
        ));
        Ok(value)
    }

    /// Critical value c_α: H₀ is rejected when T_n > c_α.
    ///
    /// Uses the variant's closed form when it has one (`n` defaults to the
    /// held sample's length), else the (1 − α)-quantile of the asymptotic
    /// distribution.
    pub fn critical_value(
        &mut self,
        alpha: f64,
        precision: Precision,
        n: Option<usize>,
    ) -> Result<f64> {
        check_probability(alpha)?;
        precision.validate()?;
        let n = n.unwrap_or_else(|| self.sample.len());
        match self.kind.closed_form_critical_value(alpha, n) {
            Some(c) => c,
            None => self.quantile(normalize_alpha(1.0 - alpha), precision),
        }
    }

    /// Tests the held sample at significance level `alpha` with the default
    /// solver precision.
    pub fn do_test(&mut self, alpha: f64) -> Result<TestOutcome> {
        self.do_test_with(alpha, Precision::default())
    }

    /// Tests the held sample at `alpha` with an explicit solver precision.
    pub fn do_test_with(&mut self, alpha: f64, precision: Precision) -> Result<TestOutcome> {
        let statistic = self.statistic()?;
        let critical_value = self.critical_value(alpha, precision, None)?;
        let outcome = TestOutcome {
            kind: self.kind,
            alpha,
            statistic,
            critical_value,
            rejected: statistic > critical_value,
        };
        tracing::info!("{outcome}");
        Ok(outcome)
    }

    /// Solves and caches the quantiles for p = i / resolution,
    /// i = 1, ..., resolution − 1, then saves the cache.
    pub fn generate_quantile_table(&mut self, resolution: usize, precision: Precision) -> Result<()> {
        if resolution < 2 {
            return Err(invalid(format!("resolution must be at least 2, got {resolution}")));
        }
        for i in 1..resolution {
            let p = normalize_alpha(i as f64 / resolution as f64);
            let q = self.quantile(p, precision)?;
            tracing::debug!(test = self.name(), p, quantile = q, "quantile generated");
        }
        self.save_quantile_table();
        Ok(())
    }

    /// Persists the cache; failures are logged.
    pub fn save_quantile_table(&self) {
        if self.kind.has_cdf() {
            self.table.save();
        }
    }
}

fn check_probability(p: f64) -> Result<()> {
    if p.is_nan() || p <= 0.0 || p >= 1.0 {
        return Err(invalid(format!("alpha must be between 0 and 1, got {p}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(n: usize) -> Vec<f64> {
        (0..n).map(|i| (i as f64 + 0.5) / n as f64).collect()
    }

    #[test]
    fn bare_test_serves_critical_values() {
        let mut t = StatisticalTest::new(TestKind::Ks);
        let c = t.critical_value(0.1, Precision::default(), None).unwrap();
        assert!((c - 1.224).abs() < 1e-3, "c = {c}");
        assert!(matches!(t.statistic(), Err(UniformityError::EmptySample)));
    }

    #[test]
    fn critical_value_is_cached() {
        let mut t = StatisticalTest::new(TestKind::Ln);
        assert!(t.quantile_table().is_empty());
        let c1 = t.critical_value(0.1, Precision::default(), None).unwrap();
        assert_eq!(t.quantile_table().len(), 1);
        let entry = t.quantile_table().entries()[0];
        assert_eq!(entry.alpha, 0.9);
        assert_eq!(entry.value, c1);
        // A cruder request is served from the cache.
        let c2 = t.critical_value(0.1, Precision::new(1e-3, 50).unwrap(), None).unwrap();
        assert_eq!(c1, c2);
        assert!((c1 - 2.7009).abs() < 2e-3, "c = {c1}");
    }

    #[test]
    fn finer_request_replaces_cache_entry() {
        let mut t = StatisticalTest::new(TestKind::Ks);
        t.critical_value(0.05, Precision::default(), None).unwrap();
        let fine = Precision::new(1e-8, 150).unwrap();
        let c = t.critical_value(0.05, fine, None).unwrap();
        assert_eq!(t.quantile_table().len(), 1);
        assert_eq!(t.quantile_table().entries()[0].epsilon, 1e-8);
        assert!((c - 1.3581).abs() < 1e-3);
    }

    #[test]
    fn one_sided_ks_closed_form_is_exact() {
        let mut t = StatisticalTest::new(TestKind::KsOneSided);
        let c = t.critical_value(0.1, Precision::default(), None).unwrap();
        assert_eq!(c, (-0.5 * 0.1f64.ln()).sqrt());
        assert!(t.quantile_table().is_empty());
    }

    #[test]
    fn vn_uses_sample_length() {
        let mut t = StatisticalTest::new(TestKind::Vn);
        assert!(t.critical_value(0.1, Precision::default(), None).is_err());
        t.set_sample(&ramp(200));
        let c = t.critical_value(0.1, Precision::default(), None).unwrap();
        assert!((c - 3.264572).abs() < 1e-5);
        let c_explicit = t.critical_value(0.1, Precision::default(), Some(200)).unwrap();
        assert_eq!(c, c_explicit);
    }

    #[test]
    fn vn_has_no_cdf() {
        let t = StatisticalTest::new(TestKind::Vn);
        assert!(matches!(
            t.asymptotic_cdf(100),
            Err(UniformityError::UnsupportedOperation(_))
        ));
    }

    #[test]
    fn rejects_invalid_parameters() {
        let mut t = StatisticalTest::new(TestKind::Ks);
        for alpha in [0.0, 1.0, -0.5, 1.5, f64::NAN] {
            assert!(matches!(
                t.critical_value(alpha, Precision::default(), None),
                Err(UniformityError::InvalidParameter(_))
            ));
        }
        let bad = Precision {
            epsilon: -1.0,
            max_iter: 100,
        };
        assert!(t.quantile(0.9, bad).is_err());
        assert!(Precision::new(-1e-3, 10).is_err());
    }

    #[test]
    fn solver_guard_trips() {
        let mut t = StatisticalTest::new(TestKind::Ln).with_max_solver_steps(2);
        assert!(matches!(
            t.quantile(0.9, Precision::default()),
            Err(UniformityError::NotConverged { steps: 2 })
        ));
        assert!(t.quantile_table().is_empty());
    }

    #[test]
    fn invert_cdf_flat_region_does_not_loop() {
        let flat = |_: f64| 0.2;
        assert!(matches!(
            invert_cdf(&flat, 0.9, 1e-4, 1000),
            Err(UniformityError::NotConverged { steps: 1000 })
        ));
    }

    #[test]
    fn do_test_is_deterministic() {
        let data = [0.05, 0.07, 0.1, 0.12, 0.15, 0.2, 0.22, 0.3, 0.31, 0.9];
        for kind in TestKind::ALL {
            let mut t = StatisticalTest::new(kind).with_sample(&data);
            let first = t.do_test(0.1).unwrap();
            for _ in 0..5 {
                assert_eq!(t.do_test(0.1).unwrap(), first, "{kind}");
            }
        }
    }

    #[test]
    fn clustered_sample_is_rejected() {
        let data: Vec<f64> = (0..100).map(|i| 0.3 * i as f64 / 100.0).collect();
        let mut t = StatisticalTest::new(TestKind::Ks).with_sample(&data);
        let outcome = t.do_test(0.05).unwrap();
        assert!(outcome.rejected);
        assert!(outcome.to_string().contains("H0 rejected"));
    }

    #[test]
    fn evenly_spread_sample_is_accepted() {
        for kind in [TestKind::Ks, TestKind::Ln, TestKind::KsOneSided, TestKind::LnOneSided] {
            let mut t = StatisticalTest::new(kind).with_sample(&ramp(50));
            let outcome = t.do_test(0.1).unwrap();
            assert!(!outcome.rejected, "{outcome}");
            assert!(outcome.to_string().contains("H0 accepted"));
        }
    }

    #[test]
    fn maximize_tracks_argmax() {
        let s = Sample::new(&[0.1, 0.5, 0.9]);
        let e = maximize_over_jumps(&s, |t| -(t - 0.5).abs()).unwrap();
        assert_eq!(e.argmax, 0.5);
        assert_eq!(e.max, 0.0);
    }

    #[test]
    fn maximize_probes_left_of_jumps() {
        // Decreasing just before each jump: best value is at x − ε.
        let s = Sample::new(&[0.4]);
        let e = maximize_over_jumps_with(&s, 1e-3, |t| if t < 0.4 { 1.0 - t } else { 0.0 }).unwrap();
        assert!((e.argmax - (0.4 - 1e-3)).abs() < 1e-15);
    }

    #[test]
    fn maximize_probes_right_of_jumps() {
        // Peaks just after the jump: best value is at x + ε.
        let s = Sample::new(&[0.4]);
        let e = maximize_over_jumps_with(&s, 1e-3, |t| if t > 0.4 { 1.0 - t } else { 0.0 }).unwrap();
        assert!((e.argmax - (0.4 + 1e-3)).abs() < 1e-15);
        assert!((e.max - (0.6 - 1e-3)).abs() < 1e-12);
    }

    #[test]
    fn maximize_probe_sensitivity() {
        // The KS statistic should barely move when the probe changes by an
        // order of magnitude.
        let data: Vec<f64> = (0..200).map(|i| ((i * 37) % 200) as f64 / 200.0 + 0.001).collect();
        let s = Sample::new(&data);
        let uep_abs = |t: f64| s.uniform_empirical_process_abs(t).unwrap_or(0.0);
        let a = maximize_over_jumps_with(&s, 1e-5, uep_abs).unwrap().max;
        let b = maximize_over_jumps_with(&s, 1e-7, uep_abs).unwrap().max;
        assert!((a - b).abs() < 1e-5, "{a} vs {b}");
    }

    #[test]
    fn quantile_dir_round_trip() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut t = StatisticalTest::with_quantile_dir(TestKind::Ks, dir.path());
        t.generate_quantile_table(10, Precision::default()).unwrap();
        assert_eq!(t.quantile_table().len(), 9);

        let reopened = StatisticalTest::with_quantile_dir(TestKind::Ks, dir.path());
        assert_eq!(reopened.quantile_table().entries(), t.quantile_table().entries());
    }

    #[test]
    fn vn_never_touches_disk() {
        let dir = tempfile::TempDir::new().unwrap();
        let t = StatisticalTest::with_quantile_dir(TestKind::Vn, dir.path());
        t.save_quantile_table();
        assert!(t.quantile_table().path().is_none());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
