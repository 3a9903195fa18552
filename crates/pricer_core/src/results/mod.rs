//! Computed risk values and the algebra over them.
//!
//! This module provides:
//! - `value`: The [`ResultValue`] sum type and its variant structs
//! - `compose`: Overwriting composition along the date axis
//! - `aggregate`: Summing across instruments and bucketed risk helpers

pub mod aggregate;
pub mod compose;
pub mod value;

pub use aggregate::{aggregate_risk, aggregate_values, sort_risk, subtract_risk, RISK_SORT_COLUMNS};
pub use compose::{combine_dated, compose, compose_measures};
pub use value::{
    ErrorValue, ResultValue, ScalarResult, SeriesResult, TableResult, TableRow, ValueKind,
    DATE_COLUMN, VALUE_COLUMN,
};
