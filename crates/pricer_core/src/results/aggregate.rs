//! Aggregation of results across instruments.
//!
//! Unlike composition, aggregation sums: the price of a book is the sum of
//! the prices of its trades, and bucketed risk is summed bucket by bucket.

use std::cmp::Ordering;

use indexmap::IndexMap;

use super::value::{ResultValue, TableResult, TableRow, ValueKind};
use crate::types::{tenor_sort_key, CompositionError, Date};

/// Columns by which bucketed risk is ordered, in priority order.
pub const RISK_SORT_COLUMNS: [&str; 5] = ["date", "mkt_type", "mkt_asset", "mkt_class", "mkt_point"];

/// Sums a set of results into one.
///
/// All inputs must share a shape, a unit and (unless `allow_mismatch`) a
/// provenance key. Scalars are added, series are added date by date over
/// the union of their dates (a missing date counts as zero), and tables are
/// summed per bucket.
///
/// # Errors
///
/// Returns [`CompositionError::Empty`] for no inputs, and
/// `AggregateError`, `Heterogeneous`, `UnitMismatch` or `KeyMismatch`
/// when the inputs cannot be summed.
///
/// # Examples
///
/// ```
/// use pricer_core::results::{aggregate_values, ResultValue};
/// use pricer_core::types::{Date, MarketContext, RiskKey, RiskMeasure};
///
/// let d = Date::from_ymd(2024, 1, 2).unwrap();
/// let key = RiskKey::new("Risk", d, MarketContext::close(d, "NYC"), RiskMeasure::new("Price"));
/// let prices: Vec<_> = [1.0, 2.0, 3.5]
///     .iter()
///     .map(|p| ResultValue::scalar(key.clone(), *p))
///     .collect();
///
/// assert_eq!(aggregate_values(&prices, false).unwrap().as_f64(), Some(6.5));
/// ```
pub fn aggregate_values(
    values: &[ResultValue],
    allow_mismatch: bool,
) -> Result<ResultValue, CompositionError> {
    let first = values.first().ok_or(CompositionError::Empty)?;
    let mut unit: Option<&str> = None;

    for value in values {
        if let ResultValue::Error(e) = value {
            return Err(CompositionError::AggregateError(e.message.clone()));
        }
        if value.kind() != first.kind() {
            return Err(CompositionError::Heterogeneous {
                lhs: first.kind(),
                rhs: value.kind(),
            });
        }
        if let Some(u) = value.unit() {
            if unit.map_or(false, |seen| seen != u) {
                return Err(CompositionError::UnitMismatch);
            }
            unit = unit.or(Some(u));
        }
        if !allow_mismatch && value.key() != first.key() {
            return Err(CompositionError::KeyMismatch);
        }
    }

    let total = match first.kind() {
        ValueKind::Table => {
            let mut summed = group_sum(values.iter().filter_map(as_table).flat_map(|t| t.rows.iter()));
            sort_rows(&mut summed, &RISK_SORT_COLUMNS);
            ResultValue::table(first.key().clone(), summed)
        }
        _ => {
            let mut total = first.clone();
            for value in &values[1..] {
                total = total.sum_with(value)?;
            }
            total
        }
    };

    Ok(match unit {
        Some(u) => total.with_unit(u),
        None => total,
    })
}

/// Merges bucketed risk from several tables.
///
/// Rows are summed per bucket; with a threshold, buckets whose absolute
/// value does not exceed it are dropped. The output is sorted with
/// [`sort_risk`].
pub fn aggregate_risk(
    tables: &[ResultValue],
    threshold: Option<f64>,
) -> Result<ResultValue, CompositionError> {
    let first = tables.first().ok_or(CompositionError::Empty)?;
    let mut parts = Vec::with_capacity(tables.len());
    for value in tables {
        match value {
            ResultValue::Table(t) => parts.push(t),
            ResultValue::Error(e) => return Err(CompositionError::AggregateError(e.message.clone())),
            other => {
                return Err(CompositionError::Heterogeneous {
                    lhs: ValueKind::Table,
                    rhs: other.kind(),
                })
            }
        }
    }

    let mut rows = group_sum(parts.iter().flat_map(|t| t.rows.iter()));
    if let Some(threshold) = threshold {
        rows.retain(|r| r.value.abs() > threshold);
    }
    sort_rows(&mut rows, &RISK_SORT_COLUMNS);

    Ok(ResultValue::Table(TableResult {
        rows,
        key: first.key().clone(),
        unit: first.unit().map(str::to_string),
    }))
}

/// Subtracts bucketed risk. Both tables must have the same label columns.
pub fn subtract_risk(
    left: &ResultValue,
    right: &ResultValue,
) -> Result<ResultValue, CompositionError> {
    let (l, r) = match (as_table(left), as_table(right)) {
        (Some(l), Some(r)) => (l, r),
        _ => {
            return Err(CompositionError::Incompatible {
                lhs: left.kind(),
                rhs: right.kind(),
            })
        }
    };
    let (lc, rc) = (l.label_columns(), r.label_columns());
    if lc != rc {
        return Err(CompositionError::DimensionMismatch(format!(
            "{:?} vs {:?}",
            lc, rc
        )));
    }
    aggregate_risk(&[left.clone(), right.scale(-1.0)?], None)
}

/// Sorts bucketed risk by the given columns.
///
/// `mkt_point` labels that read as tenors (`3m`, `10y`) sort by length;
/// other labels sort lexically, and `date` sorts chronologically. Columns
/// absent from the table are ignored.
pub fn sort_risk(table: &TableResult, by: &[&str]) -> TableResult {
    let mut rows = table.rows.clone();
    sort_rows(&mut rows, by);
    TableResult {
        rows,
        ..table.clone()
    }
}

fn as_table(value: &ResultValue) -> Option<&TableResult> {
    match value {
        ResultValue::Table(t) => Some(t),
        _ => None,
    }
}

fn group_sum<'a>(rows: impl Iterator<Item = &'a TableRow>) -> Vec<TableRow> {
    let mut groups: IndexMap<(Option<Date>, Vec<(String, String)>), TableRow> = IndexMap::new();
    for row in rows {
        let bucket = (
            row.date,
            row.labels
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        );
        groups
            .entry(bucket)
            .and_modify(|acc| acc.value += row.value)
            .or_insert_with(|| row.clone());
    }
    groups.into_values().collect()
}

fn sort_rows(rows: &mut [TableRow], by: &[&str]) {
    rows.sort_by(|a, b| {
        by.iter()
            .map(|column| compare_column(a, b, column))
            .find(|o| *o != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    });
}

fn compare_column(a: &TableRow, b: &TableRow, column: &str) -> Ordering {
    if column == "date" {
        return a.date.cmp(&b.date);
    }
    let (la, lb) = (a.label(column), b.label(column));
    if column == "mkt_point" {
        if let (Some(ta), Some(tb)) = (la.and_then(tenor_sort_key), lb.and_then(tenor_sort_key)) {
            return ta.partial_cmp(&tb).unwrap_or(Ordering::Equal);
        }
    }
    la.cmp(&lb)
}
