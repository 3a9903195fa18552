//! Risk result error types.
//!
//! This module provides structured error types for futures, result trees
//! and indexing using `thiserror` for derivation.

use std::time::Duration;

use pricer_core::types::{CompositionError, FrameError, RiskMeasure};
use thiserror::Error;

/// Errors raised while waiting on, indexing or combining risk results.
///
/// Failed calculations are not errors: they travel through result trees
/// as [`ResultValue::Error`](pricer_core::results::ResultValue::Error)
/// values and only surface here when used numerically.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RiskError {
    /// Two values could not be composed or aggregated.
    #[error(transparent)]
    Composition(#[from] CompositionError),

    /// A wait exceeded its timeout. The computation continues.
    #[error("Timed out after {0:?} waiting for result")]
    Timeout(Duration),

    /// The future was cancelled.
    #[error("Result was cancelled")]
    Cancelled,

    /// A result was awaited inside the pricing context that will produce it.
    #[error("Cannot evaluate results under the same pricing context")]
    Reentrant,

    /// The pricing service failed to produce a result.
    #[error("Calculation failed: {0}")]
    Failed(String),

    /// A future was resolved twice.
    #[error("Result has already been set")]
    AlreadyResolved,

    /// An instrument, name, position or path is not in the portfolio.
    #[error("{0} not in portfolio")]
    KeyNotFound(String),

    /// A risk measure was not computed for the result.
    #[error("{0} not computed")]
    MeasureNotComputed(RiskMeasure),

    /// Two result trees share measures, instruments and dates.
    #[error("Results overlap on risk measures, instruments or dates")]
    Overlap,

    /// Two result trees were priced under different scenarios or markets.
    #[error("Results must have matching scenario and location")]
    IncompatibleKeys,

    /// Date slicing requested on a result that is not historical.
    #[error("Can only index by date on historical results")]
    NotHistorical,

    /// A resolved instrument was looked up in a result from another context.
    #[error("{0} was resolved in a different pricing context")]
    StaleResolution(String),

    /// Nodes do not mirror the portfolio they were built for.
    #[error("Result tree does not match portfolio shape: {0}")]
    ShapeMismatch(String),

    /// Tabular reshaping failed.
    #[error(transparent)]
    Frame(#[from] FrameError),

    /// An arithmetic operand of the wrong kind.
    #[error("Invalid operand: {0}")]
    InvalidOperand(String),
}

impl RiskError {
    /// Maps slicing errors onto their result-tree meaning.
    pub(crate) fn from_slice(err: CompositionError) -> Self {
        match err {
            CompositionError::NotHistorical => RiskError::NotHistorical,
            other => RiskError::Composition(other),
        }
    }
}
