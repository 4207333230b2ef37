//! Monte Carlo comparison of uniformity tests.
//!
//! Samples are drawn from a [`PiecewiseLinearFunction`](crate::piecewise::PiecewiseLinearFunction)
//! by inverse-transform sampling. Each registered test's statistic is
//! compared with its critical value, and the rejection frequency estimates
//! the test's size (under the uniform law) or power (under a perturbation).
//!
//! # Concurrency
//!
//! Trials are split into fixed-size chunks, each with its own generator
//! seeded from [`SimulationConfig::seed`] and the chunk index. With the
//! `parallel` feature the chunks run on the rayon thread pool; rejection
//! counts are summed afterwards, so results do not depend on the feature.
//!
//! # Examples
//!
//! ```
//! use u_uniformity::simulation::{MonteCarloSimulation, SimulationConfig};
//! use u_uniformity::testing::{StatisticalTest, TestKind};
//!
//! let config = SimulationConfig::default().with_trials(100).with_sample_len(50);
//! let mut sim = MonteCarloSimulation::new(config).unwrap();
//! sim.add_test(StatisticalTest::new(TestKind::Ks));
//! sim.add_test(StatisticalTest::new(TestKind::Ln));
//!
//! let curves = sim.sweep_power_curve(0.1, 0.5, 0.11, 3).unwrap();
//! assert_eq!(curves.len(), 2);
//! assert_eq!(curves[0].points.len(), 3);
//! ```

mod config;
mod monte_carlo;
mod plots;

pub use config::SimulationConfig;
pub use monte_carlo::{
    perturbation_chart, power_chart, MonteCarloSimulation, PowerCurve, PowerEstimate, WrappedTest,
};
pub use plots::{cdf_chart, distribution_chart, uep_chart};
