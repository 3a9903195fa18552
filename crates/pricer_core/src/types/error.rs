//! Error types for structured error handling.
//!
//! This module provides:
//! - `CompositionError`: Errors from composing, slicing or aggregating result values
//! - `DateError`: Errors from date construction and parsing
//! - `FrameError`: Errors from tabular reshaping

use thiserror::Error;

use super::time::Date;
use crate::results::ValueKind;

/// Errors raised by the composition algebra.
///
/// These are fatal to the caller: two values that cannot be composed will
/// never become composable by retrying.
///
/// # Examples
/// ```
/// use pricer_core::results::ValueKind;
/// use pricer_core::types::CompositionError;
///
/// let err = CompositionError::Incompatible { lhs: ValueKind::Scalar, rhs: ValueKind::Table };
/// assert_eq!(format!("{}", err), "Scalar and Table cannot be composed");
/// ```
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompositionError {
    /// The pair of value shapes has no composition rule.
    #[error("{lhs} and {rhs} cannot be composed")]
    Incompatible {
        /// Shape of the left operand
        lhs: ValueKind,
        /// Shape of the right operand
        rhs: ValueKind,
    },

    /// Two scalars priced for different dates.
    #[error("Cannot compose scalars for different dates: {lhs:?} and {rhs:?}")]
    ScalarDates {
        /// Date of the left operand
        lhs: Option<Date>,
        /// Date of the right operand
        rhs: Option<Date>,
    },

    /// Provenance keys differ outside of the risk measure.
    #[error("Results must have matching scenario and location")]
    IncompatibleKeys,

    /// Components of a dated composition come from different markets.
    #[error("Cannot compose results with different markets")]
    MismatchedMarkets,

    /// A value has no date to place it on the date axis.
    #[error("Result has no single date to compose on")]
    MissingDate,

    /// Nothing to compose or aggregate.
    #[error("No results to compose")]
    Empty,

    /// An error value was used in a numeric context.
    #[error("Error value cannot be used numerically: {0}")]
    ErrorValue(String),

    /// An input to an aggregation carries an error.
    #[error("Cannot aggregate results in error: {0}")]
    AggregateError(String),

    /// Aggregation inputs have different shapes.
    #[error("Cannot aggregate heterogeneous types: {lhs} vs {rhs}")]
    Heterogeneous {
        /// Shape of the first input
        lhs: ValueKind,
        /// Shape of the offending input
        rhs: ValueKind,
    },

    /// Aggregation inputs have different units.
    #[error("Cannot aggregate results with different units")]
    UnitMismatch,

    /// Aggregation inputs were priced under different keys.
    #[error("Cannot aggregate results with different pricing keys")]
    KeyMismatch,

    /// The requested date is not on the result's date axis.
    #[error("Date {0} not present in result")]
    DateNotFound(Date),

    /// Date slicing was requested on a value without a date axis.
    #[error("Can only index by date on historical results")]
    NotHistorical,

    /// Bucketed risk tables with different label columns.
    #[error("Bucketed risk dimensions differ: {0}")]
    DimensionMismatch(String),
}

/// Date-related errors.
///
/// # Examples
/// ```
/// use pricer_core::types::DateError;
///
/// let err = DateError::InvalidDate { year: 2024, month: 2, day: 30 };
/// assert_eq!(format!("{}", err), "Invalid date: 2024-2-30");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DateError {
    /// Invalid date components (e.g., February 30th).
    #[error("Invalid date: {year}-{month}-{day}")]
    InvalidDate {
        /// Year component
        year: i32,
        /// Month component (1-12)
        month: u32,
        /// Day component (1-31)
        day: u32,
    },

    /// Failed to parse date string.
    #[error("Date parse error: {0}")]
    ParseError(String),
}

/// Errors from reshaping a [`Frame`](crate::frame::Frame).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    /// A named column does not exist.
    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    /// The pivot request cannot be satisfied.
    #[error("Unable to successfully pivot data: {0}")]
    Pivot(String),
}
