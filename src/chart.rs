//! Interface to an external charting backend.
//!
//! Rendering and persisting figures is not part of this crate. The crate only
//! samples labelled scalar functions over a domain into a [`Chart`] and hands
//! it to whatever implements [`ChartSink`] (an interactive plotter, an image
//! writer, a serialiser for later reload, ...).
//!
//! # Examples
//!
//! ```
//! use u_uniformity::chart::{Chart, ChartSink, Color, LabeledFunction};
//!
//! struct Count(usize);
//! impl ChartSink for Count {
//!     fn render(&mut self, chart: &Chart) -> u_uniformity::Result<()> {
//!         self.0 += chart.series.len();
//!         Ok(())
//!     }
//! }
//!
//! let square = LabeledFunction::new("x²", Color::Red, |x| x * x);
//! let chart = Chart::sample("square", &[square], -1.0, 1.0, 50).unwrap();
//! assert_eq!(chart.series[0].points.len(), 50);
//!
//! let mut sink = Count(0);
//! sink.render(&chart).unwrap();
//! assert_eq!(sink.0, 1);
//! ```

use std::fmt;

use crate::error::{invalid, Result};

/// Minimum number of evaluation points per series.
pub const MIN_RESOLUTION: usize = 20;

/// Display color of a series. Presentational only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Color {
    #[default]
    Black,
    Red,
    Green,
    Blue,
    Cyan,
    Magenta,
    Yellow,
}

impl Color {
    /// Single-letter color code understood by most plotting backends.
    pub fn code(self) -> char {
        match self {
            Color::Black => 'k',
            Color::Red => 'r',
            Color::Green => 'g',
            Color::Blue => 'b',
            Color::Cyan => 'c',
            Color::Magenta => 'm',
            Color::Yellow => 'y',
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// A scalar function with a legend label and a color.
pub struct LabeledFunction<'a> {
    /// Legend label.
    pub label: String,
    /// Line color.
    pub color: Color,
    /// The function to sample.
    pub function: Box<dyn Fn(f64) -> f64 + 'a>,
}

impl<'a> LabeledFunction<'a> {
    /// Wraps `function` with a label and a color.
    pub fn new(label: impl Into<String>, color: Color, function: impl Fn(f64) -> f64 + 'a) -> Self {
        Self {
            label: label.into(),
            color,
            function: Box::new(function),
        }
    }
}

/// One sampled curve.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    /// Legend label.
    pub label: String,
    /// Line color.
    pub color: Color,
    /// `(x, f(x))` pairs in ascending x.
    pub points: Vec<(f64, f64)>,
}

/// Sampled curves over a common domain, ready for a [`ChartSink`].
#[derive(Debug, Clone, PartialEq)]
pub struct Chart {
    /// Chart title.
    pub title: String,
    /// Left end of the plotted domain.
    pub x_min: f64,
    /// Right end of the plotted domain.
    pub x_max: f64,
    /// Curves, drawn in order.
    pub series: Vec<Series>,
}

impl Chart {
    /// Evaluates every function at `resolution` evenly spaced points of
    /// `[x_min, x_max]`, endpoints included.
    ///
    /// # Errors
    ///
    /// [`UniformityError::InvalidParameter`](crate::UniformityError::InvalidParameter)
    /// if `functions` is empty, `resolution < 20`, or `x_min ≥ x_max`.
    pub fn sample(
        title: impl Into<String>,
        functions: &[LabeledFunction<'_>],
        x_min: f64,
        x_max: f64,
        resolution: usize,
    ) -> Result<Self> {
        check_domain(x_min, x_max, resolution)?;
        if functions.is_empty() {
            return Err(invalid("chart needs at least one function"));
        }
        let step = (x_max - x_min) / (resolution - 1) as f64;
        let series = functions
            .iter()
            .map(|lf| Series {
                label: lf.label.clone(),
                color: lf.color,
                points: (0..resolution)
                    .map(|i| {
                        let x = x_min + i as f64 * step;
                        (x, (lf.function)(x))
                    })
                    .collect(),
            })
            .collect();
        Ok(Self {
            title: title.into(),
            x_min,
            x_max,
            series,
        })
    }

    /// Builds a chart from already-sampled series.
    pub fn from_series(
        title: impl Into<String>,
        series: Vec<Series>,
        x_min: f64,
        x_max: f64,
    ) -> Result<Self> {
        if series.is_empty() {
            return Err(invalid("chart needs at least one series"));
        }
        if x_min.is_nan() || x_max.is_nan() || x_min >= x_max {
            return Err(invalid(format!("x_min ({x_min}) must be below x_max ({x_max})")));
        }
        Ok(Self {
            title: title.into(),
            x_min,
            x_max,
            series,
        })
    }
}

fn check_domain(x_min: f64, x_max: f64, resolution: usize) -> Result<()> {
    if !x_min.is_finite() || !x_max.is_finite() || x_min >= x_max {
        return Err(invalid(format!("x_min ({x_min}) must be below x_max ({x_max})")));
    }
    if resolution < MIN_RESOLUTION {
        return Err(invalid(format!(
            "resolution must be at least {MIN_RESOLUTION}, got {resolution}"
        )));
    }
    Ok(())
}

/// A charting backend: renders, saves, or serialises a [`Chart`].
pub trait ChartSink {
    /// Consumes one chart; backend failures are reported as errors.
    fn render(&mut self, chart: &Chart) -> Result<()>;
}
