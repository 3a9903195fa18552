//! Composition algebra over [`ResultValue`]s.
//!
//! Composition merges two results of the same computation taken on
//! different date axes (or recomputed on the same one) into one result.
//! It is a pure function of the two operands: when both define a value for
//! the same date, the right operand wins.
//!
//! | lhs \ rhs | Scalar | Series | Table |
//! |-----------|--------|--------|-------|
//! | Scalar    | same date: rhs, else error | union, rhs wins | error |
//! | Series    | union, rhs wins | union, rhs wins | error |
//! | Table     | error | error | rows replaced by date |
//!
//! Errors never compose.

use std::collections::{BTreeMap, BTreeSet};

use indexmap::IndexMap;

use super::value::{ResultValue, SeriesResult, TableResult};
use crate::types::{CompositionError, Date, KeyDates, RiskKey, RiskMeasure};

/// Composes two results.
///
/// # Errors
///
/// - [`CompositionError::IncompatibleKeys`] if the keys differ outside of
///   measure and dates
/// - [`CompositionError::ScalarDates`] for scalars on different dates
/// - [`CompositionError::Incompatible`] for shapes without a rule
///
/// # Examples
///
/// ```
/// use pricer_core::results::{compose, ResultValue};
/// use pricer_core::types::{Date, MarketContext, RiskKey, RiskMeasure};
///
/// let d1 = Date::from_ymd(2024, 1, 2).unwrap();
/// let d2 = Date::from_ymd(2024, 1, 3).unwrap();
/// let key = RiskKey::new("Risk", d1, MarketContext::close(d1, "NYC"), RiskMeasure::new("Price"));
///
/// let old = ResultValue::series(key.clone(), [(d1, 1.0), (d2, 2.0)]);
/// let new = ResultValue::series(key, [(d2, 20.0)]);
/// let merged = compose(&old, &new).unwrap();
///
/// assert_eq!(merged.for_date(d1).unwrap().as_f64(), Some(1.0));
/// assert_eq!(merged.for_date(d2).unwrap().as_f64(), Some(20.0));
/// ```
pub fn compose(lhs: &ResultValue, rhs: &ResultValue) -> Result<ResultValue, CompositionError> {
    if lhs.is_error() || rhs.is_error() {
        return Err(CompositionError::Incompatible {
            lhs: lhs.kind(),
            rhs: rhs.kind(),
        });
    }
    if !lhs.key().is_compatible(rhs.key()) {
        return Err(CompositionError::IncompatibleKeys);
    }

    match (lhs, rhs) {
        (ResultValue::Scalar(a), ResultValue::Scalar(b)) => {
            let (da, db) = (a.key.date(), b.key.date());
            if da.is_some() && da == db {
                Ok(rhs.clone())
            } else {
                Err(CompositionError::ScalarDates { lhs: da, rhs: db })
            }
        }
        (ResultValue::Scalar(_), ResultValue::Series(_))
        | (ResultValue::Series(_), ResultValue::Scalar(_))
        | (ResultValue::Series(_), ResultValue::Series(_)) => {
            let left = as_series(lhs)?;
            let right = as_series(rhs)?;
            Ok(union_series(&left, &right))
        }
        (ResultValue::Table(a), ResultValue::Table(b)) => replace_rows(a, b),
        _ => Err(CompositionError::Incompatible {
            lhs: lhs.kind(),
            rhs: rhs.kind(),
        }),
    }
}

/// Composes two per-measure mappings.
///
/// Measures present on one side only are carried over; measures present on
/// both are composed. Order follows `lhs`, then measures new in `rhs`.
pub fn compose_measures(
    lhs: &IndexMap<RiskMeasure, ResultValue>,
    rhs: &IndexMap<RiskMeasure, ResultValue>,
) -> Result<IndexMap<RiskMeasure, ResultValue>, CompositionError> {
    let mut merged = lhs.clone();
    for (measure, value) in rhs {
        let composed = match lhs.get(measure) {
            Some(existing) => compose(existing, value)?,
            None => value.clone(),
        };
        merged.insert(measure.clone(), composed);
    }
    Ok(merged)
}

/// Concatenates per-date results of one computation along the date axis.
///
/// Scalars become a series, series are unioned, and tables are stacked
/// with each row dated. An error among the inputs is returned as the
/// result. All inputs must come from the same market location.
pub fn combine_dated(values: &[ResultValue]) -> Result<ResultValue, CompositionError> {
    let first = values.first().ok_or(CompositionError::Empty)?;
    if let Some(error) = values.iter().find(|v| v.is_error()) {
        return Ok(error.clone());
    }
    let location = &first.key().market.location;
    if values.iter().any(|v| &v.key().market.location != location) {
        return Err(CompositionError::MismatchedMarkets);
    }

    let mut combined = promote(first)?;
    for value in &values[1..] {
        combined = compose(&combined, &promote(value)?)?;
    }
    Ok(combined)
}

fn promote(value: &ResultValue) -> Result<ResultValue, CompositionError> {
    match value {
        ResultValue::Scalar(_) => Ok(ResultValue::Series(as_series(value)?)),
        ResultValue::Table(t) => Ok(ResultValue::Table(TableResult {
            rows: t.dated_rows()?,
            ..t.clone()
        })),
        other => Ok(other.clone()),
    }
}

fn as_series(value: &ResultValue) -> Result<SeriesResult, CompositionError> {
    match value {
        ResultValue::Series(s) => Ok(s.clone()),
        ResultValue::Scalar(s) => {
            let date = s.key.date().ok_or(CompositionError::MissingDate)?;
            let mut values = BTreeMap::new();
            values.insert(date, s.value);
            Ok(SeriesResult {
                values,
                key: s.key.clone(),
                unit: s.unit.clone(),
            })
        }
        other => Err(CompositionError::Incompatible {
            lhs: other.kind(),
            rhs: super::ValueKind::Series,
        }),
    }
}

fn union_series(lhs: &SeriesResult, rhs: &SeriesResult) -> ResultValue {
    let mut values = lhs.values.clone();
    values.extend(rhs.values.iter().map(|(d, v)| (*d, *v)));
    let key = dated_key(&lhs.key, &rhs.key, values.keys().copied());
    ResultValue::Series(SeriesResult {
        values,
        key,
        unit: lhs.unit.clone().or_else(|| rhs.unit.clone()),
    })
}

fn replace_rows(lhs: &TableResult, rhs: &TableResult) -> Result<ResultValue, CompositionError> {
    let incoming = rhs.dated_rows()?;
    let replaced: BTreeSet<Date> = incoming.iter().filter_map(|r| r.date).collect();

    let mut rows: Vec<_> = lhs
        .dated_rows()?
        .into_iter()
        .filter(|r| r.date.map_or(true, |d| !replaced.contains(&d)))
        .collect();
    rows.extend(incoming);
    rows.sort_by_key(|r| r.date);

    let key = dated_key(&lhs.key, &rhs.key, rows.iter().filter_map(|r| r.date));
    Ok(ResultValue::Table(TableResult {
        rows,
        key,
        unit: lhs.unit.clone().or_else(|| rhs.unit.clone()),
    }))
}

fn dated_key(lhs: &RiskKey, rhs: &RiskKey, dates: impl Iterator<Item = Date>) -> RiskKey {
    lhs.combine(rhs).with_dates(KeyDates::from_dates(dates))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::{TableRow, ValueKind};
    use crate::types::MarketContext;

    fn date(day: u32) -> Date {
        Date::from_ymd(2024, 1, day).unwrap()
    }

    fn key_at(day: u32, measure: &str) -> RiskKey {
        RiskKey::new(
            "Risk",
            date(day),
            MarketContext::close(date(day), "NYC"),
            RiskMeasure::new(measure),
        )
    }

    fn key(day: u32) -> RiskKey {
        key_at(day, "Price")
    }

    #[test]
    fn test_scalar_same_date_rhs_wins() {
        let a = ResultValue::scalar(key(2), 1.0);
        let b = ResultValue::scalar(key(2), 2.0);
        assert_eq!(compose(&a, &b).unwrap().as_f64(), Some(2.0));
    }

    #[test]
    fn test_scalar_different_dates_fails() {
        let a = ResultValue::scalar(key(2), 1.0);
        let b = ResultValue::scalar(key(3), 2.0);
        assert_eq!(
            compose(&a, &b).unwrap_err(),
            CompositionError::ScalarDates {
                lhs: Some(date(2)),
                rhs: Some(date(3))
            }
        );
    }

    #[test]
    fn test_scalar_with_series_promotes() {
        let a = ResultValue::scalar(key(2), 1.0);
        let b = ResultValue::series(key(3), [(date(2), 5.0), (date(3), 6.0)]);
        let c = compose(&a, &b).unwrap();
        assert_eq!(c.kind(), ValueKind::Series);
        assert_eq!(c.for_date(date(2)).unwrap().as_f64(), Some(5.0));

        let d = compose(&b, &ResultValue::scalar(key(4), 7.0)).unwrap();
        assert_eq!(d.dates(), vec![date(2), date(3), date(4)]);
        assert_eq!(d.key().market.date, None);
    }

    #[test]
    fn test_series_union_sorted() {
        let a = ResultValue::series(key(2), [(date(5), 1.0)]);
        let b = ResultValue::series(key(2), [(date(2), 2.0)]);
        let c = compose(&a, &b).unwrap();
        assert_eq!(c.dates(), vec![date(2), date(5)]);
    }

    #[test]
    fn test_table_rows_replaced_by_date() {
        let a = ResultValue::table(
            key(2),
            vec![
                TableRow::new([("mkt_point", "1y")], 1.0),
                TableRow::new([("mkt_point", "2y")], 2.0),
            ],
        );
        let b = ResultValue::table(key(2), vec![TableRow::new([("mkt_point", "1y")], 10.0)]);
        let c = ResultValue::table(key(1), vec![TableRow::new([("mkt_point", "1y")], 7.0)]);

        let replaced = compose(&a, &b).unwrap();
        match &replaced {
            ResultValue::Table(t) => {
                assert_eq!(t.rows.len(), 1);
                assert_eq!(t.rows[0].value, 10.0);
            }
            other => panic!("unexpected {:?}", other),
        }

        match compose(&replaced, &c).unwrap() {
            ResultValue::Table(t) => {
                assert_eq!(t.rows.len(), 2);
                assert_eq!(t.rows[0].date, Some(date(1)));
                assert_eq!(t.key.dates, KeyDates::Range(vec![date(1), date(2)]));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_mismatched_shapes_fail() {
        let a = ResultValue::scalar(key(2), 1.0);
        let t = ResultValue::table(key(2), vec![]);
        let e = ResultValue::error(key(2), "boom");
        assert!(matches!(
            compose(&a, &t),
            Err(CompositionError::Incompatible { .. })
        ));
        assert!(matches!(
            compose(&e, &a),
            Err(CompositionError::Incompatible {
                lhs: ValueKind::Error,
                ..
            })
        ));
    }

    #[test]
    fn test_incompatible_keys_fail() {
        let a = ResultValue::scalar(key(2), 1.0);
        let b = ResultValue::scalar(key(2).with_scenario("Up"), 2.0);
        assert_eq!(compose(&a, &b).unwrap_err(), CompositionError::IncompatibleKeys);
    }

    #[test]
    fn test_compose_measures_union() {
        let mut lhs = IndexMap::new();
        lhs.insert(RiskMeasure::new("Price"), ResultValue::scalar(key(2), 1.0));
        let mut rhs = IndexMap::new();
        rhs.insert(
            RiskMeasure::new("Delta"),
            ResultValue::scalar(key_at(2, "Delta"), 3.0),
        );
        rhs.insert(RiskMeasure::new("Price"), ResultValue::scalar(key(2), 2.0));

        let merged = compose_measures(&lhs, &rhs).unwrap();
        let names: Vec<_> = merged.keys().map(|m| m.name().to_string()).collect();
        assert_eq!(names, vec!["Price", "Delta"]);
        assert_eq!(merged[&RiskMeasure::new("Price")].as_f64(), Some(2.0));
    }

    #[test]
    fn test_combine_dated_scalars() {
        let values = vec![
            ResultValue::scalar(key(3), 3.0),
            ResultValue::scalar(key(2), 2.0),
            ResultValue::scalar(key(4), 4.0),
        ];
        let combined = combine_dated(&values).unwrap();
        assert_eq!(combined.dates(), vec![date(2), date(3), date(4)]);
        assert_eq!(combined.for_date(date(4)).unwrap().as_f64(), Some(4.0));
    }

    #[test]
    fn test_combine_dated_error_passes_through() {
        let values = vec![
            ResultValue::scalar(key(2), 2.0),
            ResultValue::error(key(3), "no market"),
        ];
        assert!(combine_dated(&values).unwrap().is_error());
    }

    #[test]
    fn test_combine_dated_tables_get_dates() {
        let values = vec![
            ResultValue::table(key(2), vec![TableRow::new([("mkt_point", "1y")], 1.0)]),
            ResultValue::table(key(3), vec![TableRow::new([("mkt_point", "1y")], 2.0)]),
        ];
        let combined = combine_dated(&values).unwrap();
        assert_eq!(combined.dates(), vec![date(2), date(3)]);
    }

    #[test]
    fn test_combine_dated_mismatched_markets() {
        let mut ldn = key(3);
        ldn.market.location = Some("LDN".to_string());
        let values = vec![ResultValue::scalar(key(2), 1.0), ResultValue::scalar(ldn, 2.0)];
        assert_eq!(
            combine_dated(&values).unwrap_err(),
            CompositionError::MismatchedMarkets
        );
        assert_eq!(combine_dated(&[]).unwrap_err(), CompositionError::Empty);
    }
}
