//! Empirical distribution functions and the uniform empirical process.
//!
//! For a sample x_1, ..., x_n the empirical distribution function is
//!
//! ```text
//! F_n(v) = #{i : x_i ≤ v} / n
//! ```
//!
//! and the uniform empirical process is `U_n(v) = √n · (F_n(v) − v)`. All
//! goodness-of-fit statistics in [`crate::testing`] are functionals of `U_n`.
//!
//! The module also builds the perturbed uniform distribution functions used as
//! alternatives in power studies, and draws samples from any
//! [`PiecewiseLinearFunction`] by inverse-transform sampling.
//!
//! # Examples
//!
//! ```
//! use u_uniformity::empirical::Sample;
//!
//! let sample = Sample::new(&[0.8, 0.2, 0.5, 0.2]);
//! assert_eq!(sample.sorted(), &[0.2, 0.2, 0.5, 0.8]);
//! assert!((sample.ecdf(0.2).unwrap() - 0.5).abs() < 1e-12);
//! // √4 · (0.5 − 0.2)
//! assert!((sample.uniform_empirical_process(0.2).unwrap() - 0.6).abs() < 1e-12);
//! ```

use rand::Rng;

use crate::error::{invalid, Result, UniformityError};
use crate::piecewise::PiecewiseLinearFunction;

/// A finite sample together with its sorted view.
///
/// The raw values keep their input order for output; all statistics use the
/// sorted view. Both are replaced together by [`set`](Self::set) and are never
/// exposed for independent mutation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sample {
    values: Vec<f64>,
    sorted: Vec<f64>,
}

impl Sample {
    /// Creates a sample from `values`.
    pub fn new(values: &[f64]) -> Self {
        let mut sample = Self::default();
        sample.set(values);
        sample
    }

    /// Creates an empty sample whose buffers can hold `capacity` values
    /// without reallocating.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            values: Vec::with_capacity(capacity),
            sorted: Vec::with_capacity(capacity),
        }
    }

    /// Replaces the sample and recomputes the sorted view in O(n log n).
    ///
    /// Existing buffers are reused, so repeated calls with samples of the
    /// same length do not allocate.
    pub fn set(&mut self, values: &[f64]) {
        self.values.clear();
        self.values.extend_from_slice(values);
        self.sorted.clear();
        self.sorted.extend_from_slice(values);
        self.sorted.sort_unstable_by(f64::total_cmp);
    }

    /// The values in input order.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// The values in ascending order.
    pub fn sorted(&self) -> &[f64] {
        &self.sorted
    }

    /// Number of observations.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True if no sample is loaded.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Empirical distribution function F_n(v), right-inclusive.
    ///
    /// # Errors
    ///
    /// [`UniformityError::EmptySample`] if the sample is empty.
    pub fn ecdf(&self, v: f64) -> Result<f64> {
        if self.sorted.is_empty() {
            return Err(UniformityError::EmptySample);
        }
        Ok(self.ecdf_unchecked(v))
    }

    /// Uniform empirical process √n · (F_n(v) − v).
    pub fn uniform_empirical_process(&self, v: f64) -> Result<f64> {
        if self.sorted.is_empty() {
            return Err(UniformityError::EmptySample);
        }
        Ok(self.uep_unchecked(v))
    }

    /// Absolute value of the uniform empirical process.
    pub fn uniform_empirical_process_abs(&self, v: f64) -> Result<f64> {
        self.uniform_empirical_process(v).map(f64::abs)
    }

    pub(crate) fn ecdf_unchecked(&self, v: f64) -> f64 {
        let rank = self.sorted.partition_point(|&x| x <= v);
        rank as f64 / self.sorted.len() as f64
    }

    pub(crate) fn uep_unchecked(&self, v: f64) -> f64 {
        (self.sorted.len() as f64).sqrt() * (self.ecdf_unchecked(v) - v)
    }
}

/// Empirical distribution function of `data` evaluated at `v`.
///
/// Sorts a copy of `data`; use [`Sample`] when evaluating repeatedly.
///
/// # Examples
///
/// ```
/// use u_uniformity::empirical::ecdf;
///
/// let data = [0.3, 0.1, 0.2, 0.1];
/// assert!((ecdf(&data, 0.1).unwrap() - 0.5).abs() < 1e-12);
/// assert!((ecdf(&data, 0.05).unwrap()).abs() < 1e-12);
/// ```
pub fn ecdf(data: &[f64], v: f64) -> Result<f64> {
    Sample::new(data).ecdf(v)
}

/// Uniform empirical process of `data` evaluated at `v`.
pub fn uniform_empirical_process(data: &[f64], v: f64) -> Result<f64> {
    Sample::new(data).uniform_empirical_process(v)
}

/// Absolute uniform empirical process of `data` evaluated at `v`.
pub fn uniform_empirical_process_abs(data: &[f64], v: f64) -> Result<f64> {
    Sample::new(data).uniform_empirical_process_abs(v)
}

// ---------------------------------------------------------------------------
// Perturbed uniform distribution
// ---------------------------------------------------------------------------

/// Uniform distribution function perturbed by `epsilon` at `position`.
///
/// The result passes through `(position, position + epsilon)` and returns
/// linearly to the identity at `position ± delta` (clamped to [0, 1]).
///
/// # Errors
///
/// [`UniformityError::InvalidParameter`] if
/// - `position` is outside [0, 1],
/// - `delta` is outside (0, 1],
/// - `epsilon` is outside `[max(−position, position − 1), min(position, 1 − position)]`,
/// - `delta ≤ |epsilon|`, which would make the perturbation non-monotone,
/// - `epsilon ≠ 0` moves the peak onto 0 or 1 (e.g. `epsilon = −position`),
///   which would leave a flat piece.
///
/// # Examples
///
/// ```
/// use u_uniformity::empirical::perturbed_uniform_cdf;
///
/// let f = perturbed_uniform_cdf(0.1, 0.5, 0.11).unwrap();
/// assert!((f.evaluate(0.5).unwrap() - 0.6).abs() < 1e-12);
/// assert!((f.evaluate(0.2).unwrap() - 0.2).abs() < 1e-12);
/// ```
pub fn perturbed_uniform_cdf(
    epsilon: f64,
    position: f64,
    delta: f64,
) -> Result<PiecewiseLinearFunction> {
    if !position.is_finite() || !(0.0..=1.0).contains(&position) {
        return Err(invalid(format!("position must be in [0, 1], got {position}")));
    }
    if !delta.is_finite() || delta <= 0.0 || delta > 1.0 {
        return Err(invalid(format!("delta must be in (0, 1], got {delta}")));
    }
    let eps_lo = (-position).max(position - 1.0);
    let eps_hi = position.min(1.0 - position);
    if !epsilon.is_finite() || epsilon < eps_lo || epsilon > eps_hi {
        return Err(invalid(format!(
            "epsilon must be in [{eps_lo}, {eps_hi}] at position {position}, got {epsilon}"
        )));
    }
    if delta <= epsilon.abs() {
        return Err(invalid(format!(
            "delta ({delta}) must exceed |epsilon| ({})",
            epsilon.abs()
        )));
    }

    let left = (position - delta).max(0.0);
    let right = (position + delta).min(1.0);
    let peak = (position + epsilon).min(1.0);
    if epsilon != 0.0 && (peak <= left || peak >= right) {
        return Err(invalid(format!(
            "peak {peak} must lie strictly inside ({left}, {right})"
        )));
    }
    let f = PiecewiseLinearFunction::new(&[
        (position, peak),
        (left, left),
        (right, right),
    ])?;
    if !f.is_inverse_correct(1e-4) {
        tracing::warn!(epsilon, position, delta, "inverse of perturbed cdf might not be correct");
    }
    Ok(f)
}

// ---------------------------------------------------------------------------
// Inverse-transform sampling
// ---------------------------------------------------------------------------

/// Fills `out` with `n` draws from `distribution` by inverse-transform
/// sampling, reusing the buffer's allocation.
///
/// # Errors
///
/// [`UniformityError::OutOfDomain`] if the inverse is undefined at a drawn
/// uniform value (only possible for a malformed distribution).
pub fn fill_inverse_transform<R: Rng>(
    distribution: &PiecewiseLinearFunction,
    n: usize,
    rng: &mut R,
    out: &mut Vec<f64>,
) -> Result<()> {
    out.clear();
    out.reserve(n);
    for _ in 0..n {
        let u: f64 = rng.random();
        let x = distribution
            .inverse(u)
            .ok_or(UniformityError::OutOfDomain { x: u })?;
        out.push(x);
    }
    Ok(())
}

/// Draws `n` values from `distribution` by inverse-transform sampling.
///
/// # Examples
///
/// ```
/// use rand::SeedableRng;
/// use u_uniformity::empirical::inverse_transform_sample;
/// use u_uniformity::piecewise::PiecewiseLinearFunction;
///
/// let mut rng = rand::rngs::SmallRng::seed_from_u64(7);
/// let f = PiecewiseLinearFunction::identity();
/// let xs = inverse_transform_sample(&f, 100, &mut rng).unwrap();
/// assert_eq!(xs.len(), 100);
/// assert!(xs.iter().all(|&x| (0.0..1.0).contains(&x)));
/// ```
pub fn inverse_transform_sample<R: Rng>(
    distribution: &PiecewiseLinearFunction,
    n: usize,
    rng: &mut R,
) -> Result<Vec<f64>> {
    let mut out = Vec::with_capacity(n);
    fill_inverse_transform(distribution, n, rng, &mut out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    /// Closed-form inverse of the perturbed uniform distribution function.
    fn closed_form_inverse(epsilon: f64, delta: f64, position: f64) -> impl Fn(f64) -> f64 {
        move |x| {
            if x < (position - delta).max(0.0) || x > (position + delta).min(1.0) {
                x
            } else if x <= position + epsilon {
                (x - position - epsilon) / (1.0 + epsilon / delta.min(position)) + position
            } else {
                (x - position - epsilon) / (1.0 - epsilon / delta.min(1.0 - position)) + position
            }
        }
    }

    #[test]
    fn ecdf_is_right_inclusive() {
        let s = Sample::new(&[0.1, 0.2, 0.2, 0.7]);
        assert!((s.ecdf(0.0).unwrap()).abs() < 1e-12);
        assert!((s.ecdf(0.1).unwrap() - 0.25).abs() < 1e-12);
        assert!((s.ecdf(0.2).unwrap() - 0.75).abs() < 1e-12);
        assert!((s.ecdf(0.69).unwrap() - 0.75).abs() < 1e-12);
        assert!((s.ecdf(1.0).unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn uniform_empirical_process_values() {
        let s = Sample::new(&[0.25, 0.75]);
        let root2 = 2.0_f64.sqrt();
        assert!((s.uniform_empirical_process(0.25).unwrap() - root2 * 0.25).abs() < 1e-12);
        assert!((s.uniform_empirical_process(0.5).unwrap()).abs() < 1e-12);
        assert!((s.uniform_empirical_process(0.7).unwrap() + root2 * 0.2).abs() < 1e-12);
        assert!((s.uniform_empirical_process_abs(0.7).unwrap() - root2 * 0.2).abs() < 1e-12);
    }

    #[test]
    fn empty_sample_is_an_error() {
        let s = Sample::default();
        assert!(matches!(s.ecdf(0.5), Err(UniformityError::EmptySample)));
        assert!(matches!(
            s.uniform_empirical_process(0.5),
            Err(UniformityError::EmptySample)
        ));
        assert!(ecdf(&[], 0.5).is_err());
    }

    #[test]
    fn set_replaces_both_views() {
        let mut s = Sample::new(&[0.9, 0.1]);
        s.set(&[0.4, 0.3, 0.5]);
        assert_eq!(s.values(), &[0.4, 0.3, 0.5]);
        assert_eq!(s.sorted(), &[0.3, 0.4, 0.5]);
        assert_eq!(s.len(), 3);
    }

    #[test]
    fn set_reuses_buffers() {
        let mut s = Sample::with_capacity(4);
        s.set(&[0.1, 0.2, 0.3, 0.4]);
        let ptr = s.sorted().as_ptr();
        s.set(&[0.4, 0.3, 0.2, 0.1]);
        assert_eq!(ptr, s.sorted().as_ptr());
    }

    #[test]
    fn perturbed_cdf_matches_closed_form_inverse() {
        let (epsilon, delta, position) = (0.1, 0.11, 0.5);
        let expected = closed_form_inverse(epsilon, delta, position);
        let f = perturbed_uniform_cdf(epsilon, position, delta).unwrap();
        for i in 0..1000 {
            let x = i as f64 / 1000.0;
            let got = f.inverse(x).unwrap();
            assert!((got - expected(x)).abs() < 1e-8, "x = {x}: {got} vs {}", expected(x));
        }
    }

    #[test]
    fn zero_perturbation_is_identity() {
        let f = perturbed_uniform_cdf(0.0, 0.3, 0.2).unwrap();
        for i in 0..100 {
            let x = i as f64 / 100.0;
            assert!((f.evaluate(x).unwrap() - x).abs() < 1e-12);
        }
    }

    #[test]
    fn negative_perturbation_near_boundary() {
        let f = perturbed_uniform_cdf(-0.05, 0.1, 1.0).unwrap();
        assert!((f.evaluate(0.1).unwrap() - 0.05).abs() < 1e-12);
        assert!(f.is_inverse_correct(1e-9));
    }

    #[test]
    fn perturbed_cdf_rejects_bad_geometry() {
        assert!(perturbed_uniform_cdf(0.1, 0.5, 0.1).is_err()); // delta == |eps|
        assert!(perturbed_uniform_cdf(0.1, 0.5, 0.05).is_err()); // delta < |eps|
        assert!(perturbed_uniform_cdf(0.1, 1.5, 0.2).is_err());
        assert!(perturbed_uniform_cdf(0.1, 0.5, 0.0).is_err());
        assert!(perturbed_uniform_cdf(0.1, 0.5, 1.5).is_err());
        assert!(perturbed_uniform_cdf(0.3, 0.9, 0.5).is_err()); // overshoots 1
        assert!(perturbed_uniform_cdf(f64::NAN, 0.5, 0.5).is_err());
        // Peak on the lower or upper boundary.
        assert!(matches!(
            perturbed_uniform_cdf(-0.3, 0.3, 0.5),
            Err(UniformityError::InvalidParameter(_))
        ));
        assert!(matches!(
            perturbed_uniform_cdf(0.5, 0.5, 0.6),
            Err(UniformityError::InvalidParameter(_))
        ));
    }

    #[test]
    fn sampling_follows_the_distribution() {
        // Mass 0.6 on [0, 0.5).
        let f = PiecewiseLinearFunction::new(&[(0.5, 0.6)]).unwrap();
        let mut rng = rand::rngs::SmallRng::seed_from_u64(11);
        let xs = inverse_transform_sample(&f, 20_000, &mut rng).unwrap();
        let below = xs.iter().filter(|&&x| x < 0.5).count() as f64 / xs.len() as f64;
        assert!((below - 0.6).abs() < 0.02, "fraction below 0.5 = {below}");
    }
}
