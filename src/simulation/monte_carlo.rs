//! Monte Carlo estimation of rejection rates and power curves.

use rand::rngs::SmallRng;
use rand::SeedableRng;

use crate::chart::{Chart, Color, LabeledFunction, Series};
use crate::empirical::{fill_inverse_transform, perturbed_uniform_cdf, Sample};
use crate::error::{invalid, Result};
use crate::piecewise::PiecewiseLinearFunction;
use crate::testing::{StatisticalTest, TestKind, UniformityStatistic};

use super::config::SimulationConfig;

/// Trials handled by one worker with one generator.
const TRIALS_PER_CHUNK: usize = 250;

/// Seed of the generator for chunk `chunk`, derived from the base seed.
///
/// Chunks are seeded independently of how they are scheduled, so sequential
/// and parallel runs draw the same samples.
fn chunk_seed(seed: u64, chunk: usize) -> u64 {
    (seed ^ (chunk as u64).rotate_left(32)).wrapping_mul(0x9e37_79b9_7f4a_7c15)
}

/// Runs `f` for every chunk index, in order.
fn map_chunks<T, F>(chunks: usize, f: F) -> Result<Vec<T>>
where
    T: Send,
    F: Fn(usize) -> Result<T> + Sync + Send,
{
    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        (0..chunks).into_par_iter().map(f).collect()
    }
    #[cfg(not(feature = "parallel"))]
    {
        (0..chunks).map(f).collect()
    }
}

/// A registered test with its legend label and the critical value of the
/// current configuration.
#[derive(Debug, Clone)]
pub struct WrappedTest {
    test: StatisticalTest,
    label: String,
    critical_value: Option<f64>,
}

impl WrappedTest {
    /// The wrapped test.
    pub fn test(&self) -> &StatisticalTest {
        &self.test
    }

    /// Legend label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Critical value used by the last run, if any.
    pub fn critical_value(&self) -> Option<f64> {
        self.critical_value
    }
}

/// Empirical rejection rate of one test against one distribution.
#[derive(Debug, Clone, PartialEq)]
pub struct PowerEstimate {
    /// Legend label of the test.
    pub label: String,
    /// The test variant.
    pub kind: TestKind,
    /// Display color of the test.
    pub color: Color,
    /// Critical value the statistics were compared with.
    pub critical_value: f64,
    /// Fraction of trials on which H₀ was rejected.
    pub rejection_rate: f64,
}

/// Empirical power of one test as a function of the perturbation magnitude.
#[derive(Debug, Clone, PartialEq)]
pub struct PowerCurve {
    /// Legend label of the test.
    pub label: String,
    /// The test variant.
    pub kind: TestKind,
    /// Display color of the test.
    pub color: Color,
    /// Critical value used at every grid point.
    pub critical_value: f64,
    /// `(epsilon, rejection rate)` in ascending epsilon.
    pub points: Vec<(f64, f64)>,
}

impl PowerCurve {
    /// The curve as a chart series.
    pub fn series(&self) -> Series {
        Series {
            label: self.label.clone(),
            color: self.color,
            points: self.points.clone(),
        }
    }
}

/// Monte Carlo driver comparing several uniformity tests on simulated data.
///
/// # Examples
///
/// ```
/// use u_uniformity::piecewise::PiecewiseLinearFunction;
/// use u_uniformity::simulation::{MonteCarloSimulation, SimulationConfig};
/// use u_uniformity::testing::{StatisticalTest, TestKind};
///
/// let config = SimulationConfig::default().with_trials(200).with_sample_len(50);
/// let mut sim = MonteCarloSimulation::new(config).unwrap();
/// sim.add_test(StatisticalTest::new(TestKind::Ks));
///
/// let uniform = PiecewiseLinearFunction::identity();
/// let estimates = sim.estimate_power(&uniform).unwrap();
/// assert!(estimates[0].rejection_rate < 0.25);
/// ```
#[derive(Debug, Clone)]
pub struct MonteCarloSimulation {
    config: SimulationConfig,
    tests: Vec<WrappedTest>,
}

impl MonteCarloSimulation {
    /// Creates a simulation without registered tests.
    ///
    /// # Errors
    ///
    /// Propagates [`SimulationConfig::validate`].
    pub fn new(config: SimulationConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            tests: Vec::new(),
        })
    }

    /// The run configuration.
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Registered tests in registration order.
    pub fn tests(&self) -> &[WrappedTest] {
        &self.tests
    }

    /// Registers a test, labelled with its name.
    pub fn add_test(&mut self, test: StatisticalTest) {
        let label = test.name().to_string();
        self.add_labeled_test(test, label);
    }

    /// Registers a test under a custom legend label.
    pub fn add_labeled_test(&mut self, test: StatisticalTest, label: impl Into<String>) {
        self.tests.push(WrappedTest {
            test,
            label: label.into(),
            critical_value: None,
        });
    }

    /// Solves (or looks up) every registered test's critical value for the
    /// configured alpha and sample length.
    fn prepare(&mut self) -> Result<Vec<(TestKind, f64)>> {
        if self.tests.is_empty() {
            return Err(invalid("no tests registered"));
        }
        let SimulationConfig {
            alpha,
            precision,
            sample_len,
            ..
        } = self.config;
        self.tests
            .iter_mut()
            .map(|w| {
                let c = w.test.critical_value(alpha, precision, Some(sample_len))?;
                w.critical_value = Some(c);
                Ok((w.test.kind(), c))
            })
            .collect()
    }

    /// Rejection counts per test over `trials` samples drawn from
    /// `distribution`.
    fn rejection_counts(
        &self,
        distribution: &PiecewiseLinearFunction,
        thresholds: &[(TestKind, f64)],
    ) -> Result<Vec<usize>> {
        let SimulationConfig {
            trials,
            sample_len,
            seed,
            ..
        } = self.config;
        let chunks = trials.div_ceil(TRIALS_PER_CHUNK);

        let per_chunk = map_chunks(chunks, |chunk| {
            let len = TRIALS_PER_CHUNK.min(trials - chunk * TRIALS_PER_CHUNK);
            let mut rng = SmallRng::seed_from_u64(chunk_seed(seed, chunk));
            let mut buffer = Vec::with_capacity(sample_len);
            let mut sample = Sample::with_capacity(sample_len);
            let mut counts = vec![0usize; thresholds.len()];
            for _ in 0..len {
                fill_inverse_transform(distribution, sample_len, &mut rng, &mut buffer)?;
                sample.set(&buffer);
                for (count, (kind, c)) in counts.iter_mut().zip(thresholds) {
                    if kind.compute_statistic(&sample)? > *c {
                        *count += 1;
                    }
                }
            }
            Ok(counts)
        })?;

        Ok(per_chunk
            .into_iter()
            .fold(vec![0usize; thresholds.len()], |mut acc, counts| {
                for (a, c) in acc.iter_mut().zip(counts) {
                    *a += c;
                }
                acc
            }))
    }

    /// Estimates, for every registered test, the fraction of `trials`
    /// samples from `distribution` on which H₀ is rejected.
    ///
    /// Against the uniform distribution this is the empirical size and
    /// should approach alpha.
    ///
    /// # Errors
    ///
    /// - [`UniformityError::InvalidParameter`](crate::UniformityError::InvalidParameter)
    ///   if no test is registered.
    /// - Any error from solving a critical value or computing a statistic.
    pub fn estimate_power(
        &mut self,
        distribution: &PiecewiseLinearFunction,
    ) -> Result<Vec<PowerEstimate>> {
        let thresholds = self.prepare()?;
        let counts = self.rejection_counts(distribution, &thresholds)?;
        Ok(self.estimates(&thresholds, &counts))
    }

    fn estimates(&self, thresholds: &[(TestKind, f64)], counts: &[usize]) -> Vec<PowerEstimate> {
        let trials = self.config.trials as f64;
        self.tests
            .iter()
            .zip(thresholds)
            .zip(counts)
            .map(|((w, &(kind, critical_value)), &count)| PowerEstimate {
                label: w.label.clone(),
                kind,
                color: w.test.color(),
                critical_value,
                rejection_rate: count as f64 / trials,
            })
            .collect()
    }

    /// Empirical power curves against the uniform law perturbed at
    /// `position` by magnitudes on an evenly spaced grid of `resolution`
    /// points from `min(0, epsilon_max)` to `max(0, epsilon_max)`.
    ///
    /// Every grid point reuses the configured seed, so the curves are
    /// estimated with common random numbers.
    ///
    /// # Errors
    ///
    /// [`UniformityError::InvalidParameter`](crate::UniformityError::InvalidParameter)
    /// if `resolution` is zero, `epsilon_max` is not finite, or a grid point
    /// is not a valid perturbation (see [`perturbed_uniform_cdf`]), plus the
    /// errors of [`estimate_power`](Self::estimate_power).
    pub fn sweep_power_curve(
        &mut self,
        epsilon_max: f64,
        position: f64,
        delta: f64,
        resolution: usize,
    ) -> Result<Vec<PowerCurve>> {
        if resolution == 0 {
            return Err(invalid("resolution must be positive"));
        }
        if !epsilon_max.is_finite() {
            return Err(invalid(format!("epsilon_max must be finite, got {epsilon_max}")));
        }
        let grid = epsilon_grid(epsilon_max, resolution);
        let distributions = grid
            .iter()
            .map(|&eps| perturbed_uniform_cdf(eps, position, delta))
            .collect::<Result<Vec<_>>>()?;

        let thresholds = self.prepare()?;
        let mut curves: Vec<PowerCurve> = self
            .tests
            .iter()
            .zip(&thresholds)
            .map(|(w, &(kind, critical_value))| PowerCurve {
                label: w.label.clone(),
                kind,
                color: w.test.color(),
                critical_value,
                points: Vec::with_capacity(resolution),
            })
            .collect();

        for (&eps, distribution) in grid.iter().zip(&distributions) {
            let counts = self.rejection_counts(distribution, &thresholds)?;
            for (curve, count) in curves.iter_mut().zip(counts) {
                let rate = count as f64 / self.config.trials as f64;
                tracing::info!(test = %curve.label, epsilon = eps, rate, "power estimated");
                curve.points.push((eps, rate));
            }
        }
        Ok(curves)
    }

    /// Finite-sample critical value of `kind`: the lower (1 − alpha)
    /// empirical quantile of the statistic over `trials` uniform samples of
    /// the configured length.
    pub fn empirical_critical_value(&self, kind: TestKind) -> Result<f64> {
        let SimulationConfig {
            trials,
            sample_len,
            alpha,
            seed,
            ..
        } = self.config;
        let uniform = PiecewiseLinearFunction::identity();
        let chunks = trials.div_ceil(TRIALS_PER_CHUNK);

        let per_chunk = map_chunks(chunks, |chunk| {
            let len = TRIALS_PER_CHUNK.min(trials - chunk * TRIALS_PER_CHUNK);
            let mut rng = SmallRng::seed_from_u64(chunk_seed(seed, chunk));
            let mut buffer = Vec::with_capacity(sample_len);
            let mut sample = Sample::with_capacity(sample_len);
            let mut stats = Vec::with_capacity(len);
            for _ in 0..len {
                fill_inverse_transform(&uniform, sample_len, &mut rng, &mut buffer)?;
                sample.set(&buffer);
                stats.push(kind.compute_statistic(&sample)?);
            }
            Ok(stats)
        })?;

        let mut stats: Vec<f64> = per_chunk.into_iter().flatten().collect();
        stats.sort_unstable_by(f64::total_cmp);
        let idx = ((stats.len() - 1) as f64 * (1.0 - alpha)).floor() as usize;
        let c = stats[idx];
        tracing::debug!(test = kind.name(), trials, critical_value = c, "empirical critical value");
        Ok(c)
    }
}

/// `resolution` evenly spaced magnitudes from `min(0, e)` to `max(0, e)`.
fn epsilon_grid(epsilon_max: f64, resolution: usize) -> Vec<f64> {
    let lo = epsilon_max.min(0.0);
    let hi = epsilon_max.max(0.0);
    if resolution == 1 {
        return vec![lo];
    }
    let step = (hi - lo) / (resolution - 1) as f64;
    (0..resolution)
        .map(|i| if i == resolution - 1 { hi } else { lo + i as f64 * step })
        .collect()
}

/// Power curves with a horizontal reference line at `alpha`.
pub fn power_chart(curves: &[PowerCurve], alpha: f64) -> Result<Chart> {
    let (x_min, x_max) = curves
        .iter()
        .flat_map(|c| c.points.iter().map(|p| p.0))
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), x| {
            (lo.min(x), hi.max(x))
        });
    let mut series: Vec<Series> = curves.iter().map(PowerCurve::series).collect();
    series.push(Series {
        label: format!("alpha = {alpha}"),
        color: Color::Black,
        points: vec![(x_min, alpha), (x_max, alpha)],
    });
    Chart::from_series("Empirical power", series, x_min, x_max)
}

/// The perturbed uniform distribution functions for each of `epsilons`.
pub fn perturbation_chart(
    epsilons: &[f64],
    position: f64,
    delta: f64,
    resolution: usize,
) -> Result<Chart> {
    let functions = epsilons
        .iter()
        .map(|&eps| {
            let f = perturbed_uniform_cdf(eps, position, delta)?;
            // evaluate() excludes the right endpoint, where F(1) = 1.
            Ok(LabeledFunction::new(
                format!("epsilon = {eps}"),
                Color::default(),
                move |x| f.evaluate(x).unwrap_or(x),
            ))
        })
        .collect::<Result<Vec<_>>>()?;
    Chart::sample("Perturbed uniform distribution functions", &functions, 0.0, 1.0, resolution)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::UniformityError;

    fn small_config() -> SimulationConfig {
        SimulationConfig::default()
            .with_trials(400)
            .with_sample_len(100)
            .with_seed(7)
    }

    #[test]
    fn chunk_seeds_differ() {
        let seeds: Vec<u64> = (0..100).map(|c| chunk_seed(3, c)).collect();
        let mut unique = seeds.clone();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(unique.len(), seeds.len());
    }

    #[test]
    fn grid_is_inclusive() {
        assert_eq!(epsilon_grid(0.1, 3), vec![0.0, 0.05, 0.1]);
        assert_eq!(epsilon_grid(-0.1, 3), vec![-0.1, -0.05, 0.0]);
        assert_eq!(epsilon_grid(0.1, 1), vec![0.0]);
        assert_eq!(epsilon_grid(0.0, 2), vec![0.0, 0.0]);
    }

    #[test]
    fn requires_registered_tests() {
        let mut sim = MonteCarloSimulation::new(small_config()).unwrap();
        let err = sim.estimate_power(&PiecewiseLinearFunction::identity());
        assert!(matches!(err, Err(UniformityError::InvalidParameter(_))));
    }

    #[test]
    fn rejects_invalid_config() {
        assert!(MonteCarloSimulation::new(small_config().with_trials(0)).is_err());
    }

    #[test]
    fn size_under_null_is_near_alpha() {
        let mut sim = MonteCarloSimulation::new(small_config()).unwrap();
        sim.add_test(StatisticalTest::new(TestKind::Ks));
        sim.add_test(StatisticalTest::new(TestKind::Ln));
        let estimates = sim.estimate_power(&PiecewiseLinearFunction::identity()).unwrap();
        assert_eq!(estimates.len(), 2);
        for e in &estimates {
            assert!(e.rejection_rate < 0.2, "{}: {}", e.label, e.rejection_rate);
        }
        assert!(sim.tests().iter().all(|w| w.critical_value().is_some()));
    }

    #[test]
    fn strong_perturbation_is_detected() {
        let mut sim = MonteCarloSimulation::new(small_config().with_sample_len(200)).unwrap();
        sim.add_test(StatisticalTest::new(TestKind::Ks));
        sim.add_test(StatisticalTest::new(TestKind::KsOneSided));
        let f = perturbed_uniform_cdf(0.2, 0.5, 0.21).unwrap();
        for e in sim.estimate_power(&f).unwrap() {
            assert!(e.rejection_rate > 0.9, "{}: {}", e.label, e.rejection_rate);
        }
    }

    #[test]
    fn runs_are_reproducible() {
        let f = perturbed_uniform_cdf(0.05, 0.5, 0.11).unwrap();
        let run = || {
            let mut sim = MonteCarloSimulation::new(small_config().with_trials(333)).unwrap();
            sim.add_test(StatisticalTest::new(TestKind::Vn));
            sim.estimate_power(&f).unwrap()
        };
        let a = run();
        assert_eq!(a, run());
        // Partial last chunk is counted.
        let count = a[0].rejection_rate * 333.0;
        assert!((count - count.round()).abs() < 1e-9);
    }

    #[test]
    fn sweep_produces_one_curve_per_test() {
        let mut sim = MonteCarloSimulation::new(small_config().with_trials(100)).unwrap();
        sim.add_labeled_test(StatisticalTest::new(TestKind::Ks).with_color(Color::Red), "KS");
        sim.add_test(StatisticalTest::new(TestKind::Vn).with_color(Color::Blue));
        let curves = sim.sweep_power_curve(0.1, 0.5, 0.11, 4).unwrap();
        assert_eq!(curves.len(), 2);
        assert_eq!(curves[0].label, "KS");
        assert_eq!(curves[0].color, Color::Red);
        assert_eq!(curves[1].kind, TestKind::Vn);
        for c in &curves {
            assert_eq!(c.points.len(), 4);
            assert_eq!(c.points[0].0, 0.0);
            assert_eq!(c.points[3].0, 0.1);
        }

        let chart = power_chart(&curves, 0.1).unwrap();
        assert_eq!(chart.series.len(), 3);
        assert_eq!(chart.x_min, 0.0);
        assert_eq!(chart.x_max, 0.1);
    }

    #[test]
    fn sweep_rejects_invalid_geometry() {
        let mut sim = MonteCarloSimulation::new(small_config()).unwrap();
        sim.add_test(StatisticalTest::new(TestKind::Ks));
        // delta must exceed |epsilon|.
        assert!(sim.sweep_power_curve(0.2, 0.5, 0.1, 5).is_err());
        assert!(sim.sweep_power_curve(0.1, 0.5, 0.11, 0).is_err());
    }

    #[test]
    fn sweep_rejects_non_finite_magnitude() {
        let mut sim = MonteCarloSimulation::new(small_config()).unwrap();
        sim.add_test(StatisticalTest::new(TestKind::Ks));
        for eps in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            assert!(matches!(
                sim.sweep_power_curve(eps, 0.5, 0.11, 3),
                Err(UniformityError::InvalidParameter(_))
            ));
        }
    }

    #[test]
    fn empirical_critical_value_is_near_asymptotic() {
        let sim = MonteCarloSimulation::new(
            SimulationConfig::default()
                .with_trials(2000)
                .with_sample_len(200)
                .with_seed(11),
        )
        .unwrap();
        let c = sim.empirical_critical_value(TestKind::Ks).unwrap();
        assert!((c - 1.224).abs() < 0.1, "c = {c}");
    }

    #[test]
    fn perturbation_chart_has_one_series_per_epsilon() {
        let chart = perturbation_chart(&[0.0, 0.05, 0.1], 0.5, 0.11, 101).unwrap();
        assert_eq!(chart.series.len(), 3);
        let top = &chart.series[2].points;
        assert_eq!(top.len(), 101);
        assert!((top[50].1 - 0.6).abs() < 1e-9);
        assert_eq!(top[100].1, 1.0);
        assert!(perturbation_chart(&[0.3], 0.5, 0.11, 101).is_err());
    }
}
