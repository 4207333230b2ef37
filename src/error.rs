//! Error taxonomy.
//!
//! Every fallible operation in the crate returns [`Result`]. Errors are raised
//! at the point of detection and are not recovered inside the crate, with one
//! exception: quantile cache I/O is logged and degrades to an empty cache
//! unless the caller explicitly asks for it through
//! [`QuantileTable::try_load`](crate::quantile_table::QuantileTable::try_load)
//! or [`QuantileTable::try_save`](crate::quantile_table::QuantileTable::try_save).

/// Errors produced by the uniformity tests and the simulation layer.
#[derive(Debug, thiserror::Error)]
pub enum UniformityError {
    /// A parameter is outside its domain (alpha, epsilon, position, delta,
    /// sample length, chart bounds, ...).
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Control points do not describe a strictly increasing function.
    #[error("non-bijective functions cannot be inverted")]
    NonBijective,

    /// The test variant does not provide the requested operation.
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// A statistic or empirical-process query was made with no sample loaded.
    #[error("there is no data")]
    EmptySample,

    /// The critical-value solver hit its step guard.
    #[error("quantile solver did not converge within {steps} steps")]
    NotConverged {
        /// Number of correction steps performed.
        steps: usize,
    },

    /// A piecewise-linear function was evaluated outside `[x_0, x_last)`.
    #[error("{x} is outside the domain of the piecewise-linear function")]
    OutOfDomain {
        /// The offending argument.
        x: f64,
    },

    /// Reading or writing a quantile cache file failed.
    #[error("quantile cache I/O: {0}")]
    Io(#[from] std::io::Error),

    /// A quantile cache file could not be parsed or serialised.
    #[error("quantile cache format: {0}")]
    Csv(#[from] csv::Error),
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, UniformityError>;

pub(crate) fn invalid(msg: impl Into<String>) -> UniformityError {
    UniformityError::InvalidParameter(msg.into())
}
