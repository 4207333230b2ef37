//! Piecewise-linear distribution functions on [0, 1].
//!
//! A [`PiecewiseLinearFunction`] is a continuous, strictly increasing,
//! piecewise-affine bijection of [0, 1] through a set of control points. It is
//! used both to perturb the uniform law and, through its inverse, to draw
//! samples by inverse-transform sampling.
//!
//! # Examples
//!
//! ```
//! use u_uniformity::piecewise::PiecewiseLinearFunction;
//!
//! // (0, 0) and (1, 1) are injected automatically.
//! let f = PiecewiseLinearFunction::new(&[(0.5, 0.6)]).unwrap();
//! assert!((f.evaluate(0.25).unwrap() - 0.3).abs() < 1e-12);
//! assert!((f.inverse(0.3).unwrap() - 0.25).abs() < 1e-12);
//! assert!(f.is_inverse_correct(1e-4));
//! ```

use crate::error::{invalid, Result, UniformityError};

/// Number of evenly spaced probes used by [`PiecewiseLinearFunction::is_inverse_correct`].
const INVERSE_PROBES: usize = 100;

/// One affine piece `y = slope * x + intercept` on `[x_start, x_end)`.
///
/// A vertical piece (equal x at both ends) has infinite slope and evaluates
/// to the shared x. Its half-open domain is empty, so it is never selected by
/// [`PiecewiseLinearFunction::evaluate`].
#[derive(Debug, Clone, Copy, PartialEq)]
struct Segment {
    x_start: f64,
    x_end: f64,
    slope: f64,
    intercept: f64,
}

impl Segment {
    fn through(start: (f64, f64), end: (f64, f64)) -> Self {
        let dx = end.0 - start.0;
        let dy = end.1 - start.1;
        if dx == 0.0 {
            Self {
                x_start: start.0,
                x_end: end.0,
                slope: f64::INFINITY,
                intercept: start.0,
            }
        } else {
            let slope = dy / dx;
            Self {
                x_start: start.0,
                x_end: end.0,
                slope,
                intercept: start.1 - start.0 * slope,
            }
        }
    }

    fn value_at(&self, x: f64) -> f64 {
        if self.slope.is_infinite() {
            self.intercept
        } else {
            self.slope * x + self.intercept
        }
    }
}

/// Builds the ordered affine pieces between consecutive points.
fn segments_of(points: &[(f64, f64)]) -> Vec<Segment> {
    points
        .windows(2)
        .map(|w| Segment::through(w[0], w[1]))
        .collect()
}

/// Evaluates a piece list on its half-open domain `[x_0, x_last)`.
fn evaluate_segments(segments: &[Segment], x: f64) -> Option<f64> {
    // x_end is non-decreasing, so the first piece ending after x is the only
    // candidate.
    let idx = segments.partition_point(|s| s.x_end <= x);
    let seg = segments.get(idx)?;
    if seg.x_start <= x && x < seg.x_end {
        Some(seg.value_at(x))
    } else {
        None
    }
}

/// A strictly increasing, continuous piecewise-affine function with its inverse.
///
/// # Invariants
///
/// - Control points are sorted by x and contain `(0, 0)` and `(1, 1)`.
/// - The y-coordinates are strictly increasing, so the function is a
///   bijection of [0, 1] and the inverse is well defined.
/// - Immutable after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct PiecewiseLinearFunction {
    points: Vec<(f64, f64)>,
    forward: Vec<Segment>,
    inverse: Vec<Segment>,
}

impl PiecewiseLinearFunction {
    /// Builds the function through `points`, injecting the endpoints
    /// `(0, 0)` and `(1, 1)` if absent.
    ///
    /// Points need not be sorted. Two points sharing an x-coordinate produce a
    /// vertical piece, which is tolerated as long as the y-sequence stays
    /// strictly increasing.
    ///
    /// # Errors
    ///
    /// - [`UniformityError::InvalidParameter`] if a coordinate is not finite
    ///   or an x-coordinate lies outside [0, 1].
    /// - [`UniformityError::NonBijective`] if the sorted y-sequence is not
    ///   strictly increasing.
    ///
    /// # Examples
    ///
    /// ```
    /// use u_uniformity::piecewise::PiecewiseLinearFunction;
    /// use u_uniformity::UniformityError;
    ///
    /// let flat = [(0.3, 0.1), (0.5, 0.1), (0.8, 0.11), (0.9, 0.2)];
    /// assert!(matches!(
    ///     PiecewiseLinearFunction::new(&flat),
    ///     Err(UniformityError::NonBijective)
    /// ));
    /// ```
    pub fn new(points: &[(f64, f64)]) -> Result<Self> {
        if let Some(&(x, y)) = points
            .iter()
            .find(|(x, y)| !x.is_finite() || !y.is_finite() || !(0.0..=1.0).contains(x))
        {
            return Err(invalid(format!(
                "control point ({x}, {y}) must be finite with x in [0, 1]"
            )));
        }

        let mut pts = points.to_vec();
        if !pts.contains(&(0.0, 0.0)) {
            pts.push((0.0, 0.0));
        }
        if !pts.contains(&(1.0, 1.0)) {
            pts.push((1.0, 1.0));
        }
        // Stable: points sharing an x keep their input order.
        pts.sort_by(|a, b| a.0.total_cmp(&b.0));
        pts.dedup();

        if !is_strictly_increasing(&pts) {
            return Err(UniformityError::NonBijective);
        }

        let swapped: Vec<(f64, f64)> = pts.iter().map(|&(x, y)| (y, x)).collect();
        Ok(Self {
            forward: segments_of(&pts),
            inverse: segments_of(&swapped),
            points: pts,
        })
    }

    /// The identity on [0, 1], i.e. the uniform distribution function.
    pub fn identity() -> Self {
        let pts = vec![(0.0, 0.0), (1.0, 1.0)];
        Self {
            forward: segments_of(&pts),
            inverse: segments_of(&pts),
            points: pts,
        }
    }

    /// Evaluates the function at `x`.
    ///
    /// Returns `None` outside `[x_0, x_last)`; in particular `evaluate(1.0)`
    /// is `None`.
    pub fn evaluate(&self, x: f64) -> Option<f64> {
        evaluate_segments(&self.forward, x)
    }

    /// Evaluates the inverse function at `y`, with the same half-open domain
    /// convention as [`evaluate`](Self::evaluate).
    pub fn inverse(&self, y: f64) -> Option<f64> {
        evaluate_segments(&self.inverse, y)
    }

    /// Returns the inverse as a standalone function.
    pub fn invert(&self) -> Self {
        Self {
            points: self.points.iter().map(|&(x, y)| (y, x)).collect(),
            forward: self.inverse.clone(),
            inverse: self.forward.clone(),
        }
    }

    /// The sorted control points, endpoints included.
    pub fn points(&self) -> &[(f64, f64)] {
        &self.points
    }

    /// True iff the y-sequence of the sorted control points is strictly
    /// increasing. Always true for a successfully constructed function.
    pub fn is_strictly_monotone_increasing(&self) -> bool {
        is_strictly_increasing(&self.points)
    }

    /// Round-trips 100 evenly spaced points of [0, 1) through the function
    /// and its inverse and checks that every deviation stays within `epsilon`.
    ///
    /// This is a self-diagnostic, not a proof of correctness.
    pub fn is_inverse_correct(&self, epsilon: f64) -> bool {
        for i in 0..INVERSE_PROBES {
            let x = i as f64 / INVERSE_PROBES as f64;
            let round_trip = self.evaluate(x).and_then(|y| self.inverse(y));
            match round_trip {
                Some(back) if (x - back).abs() <= epsilon => {}
                other => {
                    tracing::warn!(x, round_trip = ?other, "inverse is not correct");
                    return false;
                }
            }
        }
        true
    }
}

fn is_strictly_increasing(points: &[(f64, f64)]) -> bool {
    points.windows(2).all(|w| w[0].1 < w[1].1)
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn increasing_points_round_trip(
            xs in proptest::collection::btree_set(1u32..1000, 1..8),
            ys in proptest::collection::btree_set(1u32..1000, 1..8),
        ) {
            let k = xs.len().min(ys.len());
            let points: Vec<(f64, f64)> = xs
                .iter()
                .zip(ys.iter())
                .take(k)
                .map(|(&x, &y)| (x as f64 / 1000.0, y as f64 / 1000.0))
                .collect();
            let f = PiecewiseLinearFunction::new(&points).unwrap();
            prop_assert!(f.is_strictly_monotone_increasing());
            prop_assert!(f.is_inverse_correct(1e-9));
        }
    }
}
