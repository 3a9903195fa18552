//! Resolved contents of a [`PricingFuture`](super::PricingFuture).

use std::fmt;

use pricer_core::results::{compose, ResultValue};
use pricer_core::types::{Date, RiskMeasure};

use super::multi_measure::MultipleRiskMeasureResult;
use crate::error::RiskError;

/// What a future resolves to: one value, one value per risk measure, or
/// the ordered results of a plain composite.
#[derive(Clone, Debug, PartialEq)]
pub enum RiskResult {
    /// A single computed value.
    Value(ResultValue),
    /// Values keyed by risk measure for one instrument.
    Measures(MultipleRiskMeasureResult),
    /// Child results in order.
    Sequence(Vec<RiskResult>),
}

impl RiskResult {
    /// The value, if this is a single value.
    pub fn as_value(&self) -> Option<&ResultValue> {
        match self {
            RiskResult::Value(v) => Some(v),
            _ => None,
        }
    }

    /// The value, if this is a single value.
    pub fn into_value(self) -> Option<ResultValue> {
        match self {
            RiskResult::Value(v) => Some(v),
            _ => None,
        }
    }

    /// The per-measure mapping, if this is one.
    pub fn as_measures(&self) -> Option<&MultipleRiskMeasureResult> {
        match self {
            RiskResult::Measures(m) => Some(m),
            _ => None,
        }
    }

    /// The number held, if this is a scalar value.
    pub fn as_f64(&self) -> Option<f64> {
        self.as_value().and_then(ResultValue::as_f64)
    }

    /// Dates covered, ascending.
    pub fn dates(&self) -> Vec<Date> {
        let mut dates: Vec<Date> = match self {
            RiskResult::Value(v) => v.dates(),
            RiskResult::Measures(m) => m.dates(),
            RiskResult::Sequence(items) => items.iter().flat_map(RiskResult::dates).collect(),
        };
        dates.sort();
        dates.dedup();
        dates
    }

    /// Slices to one date.
    pub fn for_date(&self, date: Date) -> Result<RiskResult, RiskError> {
        self.try_map(|v| v.for_date(date).map_err(RiskError::from_slice))
    }

    /// Slices to several dates.
    pub fn for_dates(&self, dates: &[Date]) -> Result<RiskResult, RiskError> {
        self.try_map(|v| v.for_dates(dates).map_err(RiskError::from_slice))
    }

    /// The value for one measure.
    ///
    /// A single value is returned unchanged when its key names the measure.
    pub fn for_measure(&self, measure: &RiskMeasure) -> Result<RiskResult, RiskError> {
        match self {
            RiskResult::Measures(m) => m
                .get(measure)
                .cloned()
                .map(RiskResult::Value)
                .ok_or_else(|| RiskError::MeasureNotComputed(measure.clone())),
            RiskResult::Value(v) if &v.key().risk_measure == measure => Ok(self.clone()),
            _ => Err(RiskError::MeasureNotComputed(measure.clone())),
        }
    }

    /// Adds a number to every value.
    pub fn shift(&self, amount: f64) -> Result<RiskResult, RiskError> {
        self.try_map(|v| v.shift(amount).map_err(RiskError::from))
    }

    /// Multiplies every value by a factor.
    pub fn scale(&self, factor: f64) -> Result<RiskResult, RiskError> {
        self.try_map(|v| v.scale(factor).map_err(RiskError::from))
    }

    /// Composes with another result of the same shape.
    pub fn compose(&self, other: &RiskResult) -> Result<RiskResult, RiskError> {
        match (self, other) {
            (RiskResult::Value(a), RiskResult::Value(b)) => Ok(RiskResult::Value(compose(a, b)?)),
            (RiskResult::Measures(a), RiskResult::Measures(b)) => {
                Ok(RiskResult::Measures(a.compose(b)?))
            }
            _ => Err(RiskError::InvalidOperand(
                "results of different shapes cannot be composed".to_string(),
            )),
        }
    }

    fn try_map<F>(&self, f: F) -> Result<RiskResult, RiskError>
    where
        F: Fn(&ResultValue) -> Result<ResultValue, RiskError> + Copy,
    {
        match self {
            RiskResult::Value(v) => Ok(RiskResult::Value(f(v)?)),
            RiskResult::Measures(m) => Ok(RiskResult::Measures(m.try_map_values(f)?)),
            RiskResult::Sequence(items) => items
                .iter()
                .map(|item| item.try_map(f))
                .collect::<Result<Vec<_>, _>>()
                .map(RiskResult::Sequence),
        }
    }
}

impl From<ResultValue> for RiskResult {
    fn from(value: ResultValue) -> Self {
        RiskResult::Value(value)
    }
}

impl fmt::Display for RiskResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskResult::Value(v) => write!(f, "{}", v),
            RiskResult::Measures(m) => write!(f, "{}", m),
            RiskResult::Sequence(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, ")")
            }
        }
    }
}
