//! Computed risk values.
//!
//! A [`ResultValue`] is a closed sum over the shapes a risk calculation can
//! return: a scalar, a date-indexed series, a table of bucketed rows, or an
//! error captured as data. Every variant carries the [`RiskKey`] of the
//! computation that produced it.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use indexmap::IndexMap;

use crate::frame::{Cell, Frame};
use crate::types::{CompositionError, Date, KeyDates, RiskKey};

/// Name of the numeric column in tabular results.
pub const VALUE_COLUMN: &str = "value";

/// Name of the date column in tabular results.
pub const DATE_COLUMN: &str = "dates";

/// Shape of a [`ResultValue`], used in error reporting and dispatch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ValueKind {
    /// A single number.
    Scalar,
    /// Numbers indexed by date.
    Series,
    /// Bucketed rows (market-data risk, cashflows).
    Table,
    /// A failed computation.
    Error,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Scalar => "Scalar",
            ValueKind::Series => "Series",
            ValueKind::Table => "Table",
            ValueKind::Error => "Error",
        };
        write!(f, "{}", name)
    }
}

/// A single computed number.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScalarResult {
    /// The value.
    pub value: f64,
    /// Provenance.
    pub key: RiskKey,
    /// Unit (e.g. currency), if known.
    pub unit: Option<String>,
}

/// Computed numbers indexed by date, ascending.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SeriesResult {
    /// Date to value.
    pub values: BTreeMap<Date, f64>,
    /// Provenance.
    pub key: RiskKey,
    /// Unit, if known.
    pub unit: Option<String>,
}

/// One row of a tabular result.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TableRow {
    /// Date of the row; `None` means "the table key's date".
    pub date: Option<Date>,
    /// Label columns (`mkt_type`, `mkt_asset`, `mkt_point`, ...) in order.
    pub labels: IndexMap<String, String>,
    /// The numeric value.
    pub value: f64,
}

impl TableRow {
    /// Creates an undated row from label pairs.
    pub fn new<K, V>(labels: impl IntoIterator<Item = (K, V)>, value: f64) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            date: None,
            labels: labels
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            value,
        }
    }

    /// The same row pinned to a date.
    pub fn on(mut self, date: Date) -> Self {
        self.date = Some(date);
        self
    }

    /// Returns a label by column name.
    pub fn label(&self, column: &str) -> Option<&str> {
        self.labels.get(column).map(String::as_str)
    }
}

/// Bucketed rows.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TableResult {
    /// Rows in order.
    pub rows: Vec<TableRow>,
    /// Provenance.
    pub key: RiskKey,
    /// Unit, if known.
    pub unit: Option<String>,
}

impl TableResult {
    /// Label column names in first-appearance order.
    pub fn label_columns(&self) -> Vec<String> {
        let mut columns: Vec<String> = Vec::new();
        for row in &self.rows {
            for name in row.labels.keys() {
                if !columns.contains(name) {
                    columns.push(name.clone());
                }
            }
        }
        columns
    }

    /// Whether any row carries its own date.
    pub fn is_dated(&self) -> bool {
        self.rows.iter().any(|r| r.date.is_some())
    }

    /// Rows with missing dates filled from the table key.
    pub(crate) fn dated_rows(&self) -> Result<Vec<TableRow>, CompositionError> {
        let fallback = self.key.date();
        self.rows
            .iter()
            .map(|row| {
                let date = row.date.or(fallback).ok_or(CompositionError::MissingDate)?;
                Ok(TableRow {
                    date: Some(date),
                    ..row.clone()
                })
            })
            .collect()
    }
}

/// A failed computation, propagated as data.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ErrorValue {
    /// Failure message from the provider.
    pub message: String,
    /// Provenance.
    pub key: RiskKey,
}

/// A computed risk value.
///
/// # Examples
///
/// ```
/// use pricer_core::results::ResultValue;
/// use pricer_core::types::{Date, MarketContext, RiskKey, RiskMeasure};
///
/// let d = Date::from_ymd(2024, 1, 2).unwrap();
/// let key = RiskKey::new("Risk", d, MarketContext::close(d, "NYC"), RiskMeasure::new("Price"));
/// let price = ResultValue::scalar(key, 100.0);
///
/// assert_eq!(price.scale(2.0).unwrap().as_f64(), Some(200.0));
/// assert!(price.for_date(d).is_err());
/// ```
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ResultValue {
    /// A single number.
    Scalar(ScalarResult),
    /// Numbers indexed by date.
    Series(SeriesResult),
    /// Bucketed rows.
    Table(TableResult),
    /// A failed computation.
    Error(ErrorValue),
}

impl ResultValue {
    /// A scalar value.
    pub fn scalar(key: RiskKey, value: f64) -> Self {
        ResultValue::Scalar(ScalarResult {
            value,
            key,
            unit: None,
        })
    }

    /// A series from `(date, value)` pairs.
    ///
    /// The key's date axis is set to the dates of the series.
    pub fn series(key: RiskKey, points: impl IntoIterator<Item = (Date, f64)>) -> Self {
        let values: BTreeMap<Date, f64> = points.into_iter().collect();
        let key = key.with_dates(KeyDates::from_dates(values.keys().copied()));
        ResultValue::Series(SeriesResult {
            values,
            key,
            unit: None,
        })
    }

    /// A table from rows.
    pub fn table(key: RiskKey, rows: Vec<TableRow>) -> Self {
        ResultValue::Table(TableResult {
            rows,
            key,
            unit: None,
        })
    }

    /// A captured failure.
    pub fn error(key: RiskKey, message: impl Into<String>) -> Self {
        ResultValue::Error(ErrorValue {
            message: message.into(),
            key,
        })
    }

    /// Sets the unit.
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        let unit = Some(unit.into());
        match &mut self {
            ResultValue::Scalar(s) => s.unit = unit,
            ResultValue::Series(s) => s.unit = unit,
            ResultValue::Table(t) => t.unit = unit,
            ResultValue::Error(_) => {}
        }
        self
    }

    /// Shape of this value.
    pub fn kind(&self) -> ValueKind {
        match self {
            ResultValue::Scalar(_) => ValueKind::Scalar,
            ResultValue::Series(_) => ValueKind::Series,
            ResultValue::Table(_) => ValueKind::Table,
            ResultValue::Error(_) => ValueKind::Error,
        }
    }

    /// Provenance of this value.
    pub fn key(&self) -> &RiskKey {
        match self {
            ResultValue::Scalar(s) => &s.key,
            ResultValue::Series(s) => &s.key,
            ResultValue::Table(t) => &t.key,
            ResultValue::Error(e) => &e.key,
        }
    }

    /// Unit, if known.
    pub fn unit(&self) -> Option<&str> {
        match self {
            ResultValue::Scalar(s) => s.unit.as_deref(),
            ResultValue::Series(s) => s.unit.as_deref(),
            ResultValue::Table(t) => t.unit.as_deref(),
            ResultValue::Error(_) => None,
        }
    }

    /// Whether this value is a captured failure.
    pub fn is_error(&self) -> bool {
        matches!(self, ResultValue::Error(_))
    }

    /// The number held by a scalar.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ResultValue::Scalar(s) => Some(s.value),
            _ => None,
        }
    }

    /// The number held by a scalar, failing on errors and other shapes.
    pub fn try_f64(&self) -> Result<f64, CompositionError> {
        match self {
            ResultValue::Scalar(s) => Ok(s.value),
            ResultValue::Error(e) => Err(CompositionError::ErrorValue(e.message.clone())),
            other => Err(CompositionError::Incompatible {
                lhs: other.kind(),
                rhs: ValueKind::Scalar,
            }),
        }
    }

    /// Dates covered by this value, ascending.
    ///
    /// Scalars and undated tables report their key date.
    pub fn dates(&self) -> Vec<Date> {
        match self {
            ResultValue::Series(s) => s.values.keys().copied().collect(),
            ResultValue::Table(t) if t.is_dated() => t
                .rows
                .iter()
                .filter_map(|r| r.date)
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect(),
            other => other.key().dates.to_vec(),
        }
    }

    /// Slices a historical value to one date.
    ///
    /// A series yields the scalar for that date, a dated table its rows for
    /// that date. Errors pass through unchanged.
    pub fn for_date(&self, date: Date) -> Result<ResultValue, CompositionError> {
        match self {
            ResultValue::Series(s) => {
                let value = s
                    .values
                    .get(&date)
                    .copied()
                    .ok_or(CompositionError::DateNotFound(date))?;
                Ok(ResultValue::Scalar(ScalarResult {
                    value,
                    key: s.key.with_dates(KeyDates::Single(date)),
                    unit: s.unit.clone(),
                }))
            }
            ResultValue::Table(t) if t.is_dated() => {
                let rows: Vec<TableRow> = t
                    .rows
                    .iter()
                    .filter(|r| r.date == Some(date))
                    .cloned()
                    .collect();
                if rows.is_empty() {
                    return Err(CompositionError::DateNotFound(date));
                }
                Ok(ResultValue::Table(TableResult {
                    rows,
                    key: t.key.with_dates(KeyDates::Single(date)),
                    unit: t.unit.clone(),
                }))
            }
            ResultValue::Error(_) => Ok(self.clone()),
            _ => Err(CompositionError::NotHistorical),
        }
    }

    /// Slices a historical value to several dates, keeping its shape.
    pub fn for_dates(&self, dates: &[Date]) -> Result<ResultValue, CompositionError> {
        match self {
            ResultValue::Series(s) => {
                let mut values = BTreeMap::new();
                for date in dates {
                    let value = s
                        .values
                        .get(date)
                        .copied()
                        .ok_or(CompositionError::DateNotFound(*date))?;
                    values.insert(*date, value);
                }
                Ok(ResultValue::Series(SeriesResult {
                    key: s.key.with_dates(KeyDates::from_dates(values.keys().copied())),
                    values,
                    unit: s.unit.clone(),
                }))
            }
            ResultValue::Table(t) if t.is_dated() => {
                if let Some(missing) = dates
                    .iter()
                    .find(|d| !t.rows.iter().any(|r| r.date == Some(**d)))
                {
                    return Err(CompositionError::DateNotFound(*missing));
                }
                let rows = t
                    .rows
                    .iter()
                    .filter(|r| r.date.map_or(false, |d| dates.contains(&d)))
                    .cloned()
                    .collect();
                Ok(ResultValue::Table(TableResult {
                    rows,
                    key: t.key.with_dates(KeyDates::from_dates(dates.iter().copied())),
                    unit: t.unit.clone(),
                }))
            }
            ResultValue::Error(_) => Ok(self.clone()),
            _ => Err(CompositionError::NotHistorical),
        }
    }

    /// Adds a number to every value.
    pub fn shift(&self, amount: f64) -> Result<ResultValue, CompositionError> {
        self.map_numbers(|v| v + amount)
    }

    /// Multiplies every value by a factor.
    pub fn scale(&self, factor: f64) -> Result<ResultValue, CompositionError> {
        self.map_numbers(|v| v * factor)
    }

    fn map_numbers(&self, f: impl Fn(f64) -> f64) -> Result<ResultValue, CompositionError> {
        match self {
            ResultValue::Scalar(s) => Ok(ResultValue::Scalar(ScalarResult {
                value: f(s.value),
                ..s.clone()
            })),
            ResultValue::Series(s) => Ok(ResultValue::Series(SeriesResult {
                values: s.values.iter().map(|(d, v)| (*d, f(*v))).collect(),
                ..s.clone()
            })),
            ResultValue::Table(t) => Ok(ResultValue::Table(TableResult {
                rows: t
                    .rows
                    .iter()
                    .map(|r| TableRow {
                        value: f(r.value),
                        ..r.clone()
                    })
                    .collect(),
                ..t.clone()
            })),
            ResultValue::Error(e) => Err(CompositionError::ErrorValue(e.message.clone())),
        }
    }

    /// Numeric addition of two values of the same shape.
    ///
    /// Unlike composition this sums rather than overwrites: scalars add,
    /// series add date by date over the union of their dates, and tables
    /// concatenate. The key keeps the fields both operands agree on.
    pub fn sum_with(&self, other: &ResultValue) -> Result<ResultValue, CompositionError> {
        let key = self.key().combine(other.key());
        match (self, other) {
            (ResultValue::Error(e), _) | (_, ResultValue::Error(e)) => {
                Err(CompositionError::ErrorValue(e.message.clone()))
            }
            (ResultValue::Scalar(a), ResultValue::Scalar(b)) => {
                Ok(ResultValue::Scalar(ScalarResult {
                    value: a.value + b.value,
                    key,
                    unit: a.unit.clone().or_else(|| b.unit.clone()),
                }))
            }
            (ResultValue::Series(a), ResultValue::Series(b)) => {
                let mut values = a.values.clone();
                for (date, value) in &b.values {
                    *values.entry(*date).or_insert(0.0) += value;
                }
                Ok(ResultValue::Series(SeriesResult {
                    key: key.with_dates(KeyDates::from_dates(values.keys().copied())),
                    values,
                    unit: a.unit.clone().or_else(|| b.unit.clone()),
                }))
            }
            (ResultValue::Table(a), ResultValue::Table(b)) => {
                let mut rows = a.rows.clone();
                rows.extend(b.rows.iter().cloned());
                Ok(ResultValue::Table(TableResult {
                    rows,
                    key,
                    unit: a.unit.clone().or_else(|| b.unit.clone()),
                }))
            }
            (lhs, rhs) => Err(CompositionError::Incompatible {
                lhs: lhs.kind(),
                rhs: rhs.kind(),
            }),
        }
    }

    /// Flattens the value into a frame.
    ///
    /// Scalars produce a single `value` row, series a `dates`/`value` pair
    /// per point, tables their label columns followed by `value` (with a
    /// leading `dates` column when rows are dated). Errors produce a single
    /// row holding the message.
    pub fn raw_frame(&self) -> Frame {
        match self {
            ResultValue::Scalar(s) => Frame::new(
                vec![VALUE_COLUMN.to_string()],
                vec![vec![Cell::Number(s.value)]],
            ),
            ResultValue::Series(s) => Frame::new(
                vec![DATE_COLUMN.to_string(), VALUE_COLUMN.to_string()],
                s.values
                    .iter()
                    .map(|(d, v)| vec![Cell::Date(*d), Cell::Number(*v)])
                    .collect(),
            ),
            ResultValue::Table(t) => {
                let labels = t.label_columns();
                let dated = t.is_dated();
                let mut columns = Vec::with_capacity(labels.len() + 2);
                if dated {
                    columns.push(DATE_COLUMN.to_string());
                }
                columns.extend(labels.iter().cloned());
                columns.push(VALUE_COLUMN.to_string());

                let rows = t
                    .rows
                    .iter()
                    .map(|row| {
                        let mut cells = Vec::with_capacity(columns.len());
                        if dated {
                            cells.push(row.date.map_or(Cell::Missing, Cell::Date));
                        }
                        cells.extend(labels.iter().map(|name| {
                            row.labels
                                .get(name)
                                .map_or(Cell::Missing, |v| Cell::Text(v.clone()))
                        }));
                        cells.push(Cell::Number(row.value));
                        cells
                    })
                    .collect();
                Frame::new(columns, rows)
            }
            ResultValue::Error(e) => Frame::new(
                vec![VALUE_COLUMN.to_string()],
                vec![vec![Cell::Text(format!("Error: {}", e.message))]],
            ),
        }
    }
}

impl fmt::Display for ResultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultValue::Scalar(s) => write!(f, "{}", s.value),
            ResultValue::Series(s) => {
                write!(f, "[")?;
                for (i, (d, v)) in s.values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", d, v)?;
                }
                write!(f, "]")
            }
            ResultValue::Table(t) => write!(f, "Table({} rows)", t.rows.len()),
            ResultValue::Error(e) => write!(f, "Error: {}", e.message),
        }
    }
}
