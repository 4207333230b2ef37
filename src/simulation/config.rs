//! Monte Carlo run configuration.

use crate::error::{invalid, Result};
use crate::testing::Precision;

/// Parameters shared by every Monte Carlo run.
///
/// # Examples
///
/// ```
/// use u_uniformity::simulation::SimulationConfig;
///
/// let config = SimulationConfig::default()
///     .with_trials(500)
///     .with_sample_len(50)
///     .with_seed(42);
/// assert!(config.validate().is_ok());
/// assert_eq!(config.alpha, 0.1);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationConfig {
    /// Number of simulated samples per estimate (m).
    pub trials: usize,
    /// Length of each simulated sample (n).
    pub sample_len: usize,
    /// Significance level of every registered test.
    pub alpha: f64,
    /// Solver precision for the critical values.
    pub precision: Precision,
    /// Base seed; runs with equal configuration are reproducible.
    pub seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            trials: 10_000,
            sample_len: 200,
            alpha: 0.1,
            precision: Precision::default(),
            seed: 0,
        }
    }
}

impl SimulationConfig {
    /// Sets the number of trials.
    pub fn with_trials(mut self, trials: usize) -> Self {
        self.trials = trials;
        self
    }

    /// Sets the sample length.
    pub fn with_sample_len(mut self, sample_len: usize) -> Self {
        self.sample_len = sample_len;
        self
    }

    /// Sets the significance level.
    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    /// Sets the solver precision.
    pub fn with_precision(mut self, precision: Precision) -> Self {
        self.precision = precision;
        self
    }

    /// Sets the base seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Checks the configuration.
    ///
    /// # Errors
    ///
    /// [`UniformityError::InvalidParameter`](crate::UniformityError::InvalidParameter)
    /// if `trials` or `sample_len` is zero, `alpha ∉ (0, 1)`, or the
    /// precision is invalid.
    pub fn validate(&self) -> Result<()> {
        if self.trials == 0 {
            return Err(invalid("trials must be positive"));
        }
        if self.sample_len == 0 {
            return Err(invalid("sample_len must be positive"));
        }
        if self.alpha.is_nan() || self.alpha <= 0.0 || self.alpha >= 1.0 {
            return Err(invalid(format!(
                "alpha must be between 0 and 1, got {}",
                self.alpha
            )));
        }
        self.precision.validate()
    }
}
