//! Chart builders for single tests and distribution functions.

use crate::chart::{Chart, Color, LabeledFunction};
use crate::error::{Result, UniformityError};
use crate::piecewise::PiecewiseLinearFunction;
use crate::testing::StatisticalTest;

/// Asymptotic distribution functions of `tests` on `[x_min, x_max]`.
///
/// # Errors
///
/// [`UniformityError::UnsupportedOperation`] if a test has no distribution
/// function (Vn family), plus the chart validation errors of
/// [`Chart::sample`].
///
/// # Examples
///
/// ```
/// use u_uniformity::simulation::cdf_chart;
/// use u_uniformity::testing::{StatisticalTest, TestKind};
///
/// let ks = StatisticalTest::new(TestKind::Ks);
/// let ln = StatisticalTest::new(TestKind::Ln);
/// let chart = cdf_chart(&[&ks, &ln], 100, 0.0, 4.0, 50).unwrap();
/// assert_eq!(chart.series.len(), 2);
/// ```
pub fn cdf_chart(
    tests: &[&StatisticalTest],
    max_iter: usize,
    x_min: f64,
    x_max: f64,
    resolution: usize,
) -> Result<Chart> {
    let functions = tests
        .iter()
        .map(|test| {
            let cdf = test.asymptotic_cdf(max_iter)?;
            Ok(LabeledFunction::new(test.name(), test.color(), move |x| cdf(x)))
        })
        .collect::<Result<Vec<_>>>()?;
    Chart::sample("Asymptotic distribution functions", &functions, x_min, x_max, resolution)
}

/// Uniform empirical process of each test's sample on [0, 1]; `absolute`
/// plots |U_n| instead.
///
/// # Errors
///
/// [`UniformityError::EmptySample`] if a test holds no sample, plus the
/// chart validation errors of [`Chart::sample`].
pub fn uep_chart(tests: &[&StatisticalTest], absolute: bool, resolution: usize) -> Result<Chart> {
    let functions = tests
        .iter()
        .map(|test| {
            let sample = test.sample();
            if sample.is_empty() {
                return Err(UniformityError::EmptySample);
            }
            Ok(LabeledFunction::new(test.name(), test.color(), move |t| {
                let u = sample.uep_unchecked(t);
                if absolute {
                    u.abs()
                } else {
                    u
                }
            }))
        })
        .collect::<Result<Vec<_>>>()?;
    let title = if absolute {
        "Absolute uniform empirical process"
    } else {
        "Uniform empirical process"
    };
    Chart::sample(title, &functions, 0.0, 1.0, resolution)
}

/// Piecewise-linear distribution functions on [0, 1].
pub fn distribution_chart(
    functions: &[(&str, &PiecewiseLinearFunction)],
    resolution: usize,
) -> Result<Chart> {
    let functions: Vec<LabeledFunction<'_>> = functions
        .iter()
        .map(|&(label, f)| {
            // evaluate() excludes the right endpoint, where F(1) = 1.
            LabeledFunction::new(label, Color::default(), move |x| f.evaluate(x).unwrap_or(x))
        })
        .collect();
    Chart::sample("Distribution functions", &functions, 0.0, 1.0, resolution)
}
