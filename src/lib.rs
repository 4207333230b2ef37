//! # u-uniformity
//!
//! Goodness-of-fit tests for the uniform distribution on [0, 1] and Monte
//! Carlo tooling to compare their power.
//!
//! All tests are supremum functionals of the uniform empirical process
//! U_n(t) = √n (F_n(t) − t). Critical values come from asymptotic
//! distribution functions, inverted numerically and memoised in a per-test
//! quantile cache, or from closed forms where they exist.
//!
//! ## Modules
//!
//! - [`piecewise`]: Piecewise-linear bijections of [0, 1] with inverses
//! - [`empirical`]: Samples, ECDF, empirical process, perturbed uniform laws, sampling
//! - [`testing`]: KS, Ln and Vn tests (two- and one-sided) on a shared engine
//! - [`quantile_table`]: Persistent cache of solved quantiles
//! - [`simulation`]: Monte Carlo size and power estimation
//! - [`chart`]: Data handed to an external charting backend
//! - [`error`]: Crate error type
//!
//! ## Example
//!
//! ```
//! use u_uniformity::testing::{StatisticalTest, TestKind};
//!
//! let data: Vec<f64> = (0..100).map(|i| (i as f64 + 0.5) / 100.0).collect();
//! let mut test = StatisticalTest::new(TestKind::Ks).with_sample(&data);
//! let outcome = test.do_test(0.05).unwrap();
//! assert!(!outcome.rejected);
//! ```
//!
//! ## Logging
//!
//! Diagnostics are emitted through [`tracing`]; install a subscriber to see
//! them.

pub mod chart;
pub mod empirical;
pub mod error;
pub mod piecewise;
pub mod quantile_table;
pub mod simulation;
pub mod testing;

pub use error::{Result, UniformityError};
