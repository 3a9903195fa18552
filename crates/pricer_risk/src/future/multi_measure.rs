//! Results and futures keyed by risk measure.
//!
//! A [`MultipleRiskMeasureFuture`] groups one future per risk measure for a
//! single instrument and resolves to a [`MultipleRiskMeasureResult`] once
//! all of them have.

use std::fmt;
use std::time::Duration;

use indexmap::IndexMap;
use pricer_core::frame::{Cell, Frame};
use pricer_core::results::{compose_measures, ResultValue};
use pricer_core::types::{Date, RiskMeasure};

use super::composite::{owning_composite, Aggregation};
use super::pricing_future::PricingFuture;
use super::risk_result::RiskResult;
use crate::error::RiskError;
use crate::portfolio::Instrument;

/// Column holding the risk measure in flattened results.
pub const RISK_MEASURE_COLUMN: &str = "risk_measure";

/// Values for several risk measures of one instrument, in request order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MultipleRiskMeasureResult {
    instrument: Option<Instrument>,
    values: IndexMap<RiskMeasure, ResultValue>,
}

impl MultipleRiskMeasureResult {
    /// Creates a result from a mapping.
    pub fn new(instrument: Option<Instrument>, values: IndexMap<RiskMeasure, ResultValue>) -> Self {
        Self { instrument, values }
    }

    /// The instrument the values belong to, if known.
    pub fn instrument(&self) -> Option<&Instrument> {
        self.instrument.as_ref()
    }

    /// The value for one measure.
    pub fn get(&self, measure: &RiskMeasure) -> Option<&ResultValue> {
        self.values.get(measure)
    }

    /// Measures present, in order.
    pub fn measures(&self) -> impl Iterator<Item = &RiskMeasure> {
        self.values.keys()
    }

    /// Iterates `(measure, value)` pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&RiskMeasure, &ResultValue)> {
        self.values.iter()
    }

    /// Number of measures.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether there are no measures.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The underlying mapping.
    pub fn values(&self) -> &IndexMap<RiskMeasure, ResultValue> {
        &self.values
    }

    /// Union of the dates of all values, ascending.
    pub fn dates(&self) -> Vec<Date> {
        let mut dates: Vec<Date> = self.values.values().flat_map(ResultValue::dates).collect();
        dates.sort();
        dates.dedup();
        dates
    }

    /// The values for a subset of measures, in the order given.
    pub fn for_measures(&self, measures: &[RiskMeasure]) -> Result<Self, RiskError> {
        let values = measures
            .iter()
            .map(|m| {
                self.values
                    .get(m)
                    .map(|v| (m.clone(), v.clone()))
                    .ok_or_else(|| RiskError::MeasureNotComputed(m.clone()))
            })
            .collect::<Result<_, _>>()?;
        Ok(Self {
            instrument: self.instrument.clone(),
            values,
        })
    }

    /// Every value sliced to one date.
    pub fn for_date(&self, date: Date) -> Result<Self, RiskError> {
        self.try_map_values(|v| v.for_date(date).map_err(RiskError::from_slice))
    }

    /// Every value sliced to several dates.
    pub fn for_dates(&self, dates: &[Date]) -> Result<Self, RiskError> {
        self.try_map_values(|v| v.for_dates(dates).map_err(RiskError::from_slice))
    }

    /// Every value shifted by a number.
    pub fn shift(&self, amount: f64) -> Result<Self, RiskError> {
        self.try_map_values(|v| Ok(v.shift(amount)?))
    }

    /// Every value scaled by a number.
    pub fn scale(&self, factor: f64) -> Result<Self, RiskError> {
        self.try_map_values(|v| Ok(v.scale(factor)?))
    }

    /// Composes measure by measure; see
    /// [`compose_measures`](pricer_core::results::compose_measures).
    pub fn compose(&self, other: &Self) -> Result<Self, RiskError> {
        Ok(Self {
            instrument: self.instrument.clone().or_else(|| other.instrument.clone()),
            values: compose_measures(&self.values, &other.values)?,
        })
    }

    pub(crate) fn try_map_values<F>(&self, f: F) -> Result<Self, RiskError>
    where
        F: Fn(&ResultValue) -> Result<ResultValue, RiskError>,
    {
        let values = self
            .values
            .iter()
            .map(|(m, v)| -> Result<(RiskMeasure, ResultValue), RiskError> {
                Ok((m.clone(), f(v)?))
            })
            .collect::<Result<_, _>>()?;
        Ok(Self {
            instrument: self.instrument.clone(),
            values,
        })
    }

    /// Flattens every value, tagging rows with a `risk_measure` column.
    pub fn raw_frame(&self) -> Frame {
        Frame::concat(self.values.iter().map(|(measure, value)| {
            let mut frame = value.raw_frame();
            frame.insert_column(0, RISK_MEASURE_COLUMN, Cell::text(measure.name()));
            frame
        }))
    }
}

impl fmt::Display for MultipleRiskMeasureResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (measure, value)) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", measure, value)?;
        }
        write!(f, "}}")
    }
}

/// One future per risk measure for a single instrument.
#[derive(Clone, Debug)]
pub struct MultipleRiskMeasureFuture {
    instrument: Option<Instrument>,
    futures: IndexMap<RiskMeasure, PricingFuture>,
    future: PricingFuture,
}

impl MultipleRiskMeasureFuture {
    /// Groups per-measure futures. The mapping is fixed from here on.
    pub fn new(instrument: Option<Instrument>, futures: IndexMap<RiskMeasure, PricingFuture>) -> Self {
        let future = owning_composite(
            futures.values().cloned().collect(),
            Aggregation::Measures {
                measures: futures.keys().cloned().collect(),
                instrument: instrument.clone(),
            },
        );
        Self {
            instrument,
            futures,
            future,
        }
    }

    /// The instrument priced, if known.
    pub fn instrument(&self) -> Option<&Instrument> {
        self.instrument.as_ref()
    }

    /// The per-measure futures.
    pub fn measures_to_futures(&self) -> &IndexMap<RiskMeasure, PricingFuture> {
        &self.futures
    }

    /// Measures present, in order.
    pub fn measures(&self) -> impl Iterator<Item = &RiskMeasure> {
        self.futures.keys()
    }

    /// The future for one measure.
    pub fn get(&self, measure: &RiskMeasure) -> Option<&PricingFuture> {
        self.futures.get(measure)
    }

    /// The composite future over all measures.
    pub fn future(&self) -> &PricingFuture {
        &self.future
    }

    /// Whether every measure has resolved.
    pub fn done(&self) -> bool {
        self.future.done()
    }

    /// Blocks until every measure resolves.
    pub fn result(&self, timeout: Option<Duration>) -> Result<MultipleRiskMeasureResult, RiskError> {
        match self.future.result(timeout)? {
            RiskResult::Measures(m) => Ok(m),
            other => Err(RiskError::InvalidOperand(format!(
                "expected per-measure result, found {}",
                other
            ))),
        }
    }

    /// A future over a subset of measures, in the order given.
    pub fn select(&self, measures: &[RiskMeasure]) -> Result<Self, RiskError> {
        let futures = measures
            .iter()
            .map(|m| {
                self.futures
                    .get(m)
                    .map(|f| (m.clone(), f.clone()))
                    .ok_or_else(|| RiskError::MeasureNotComputed(m.clone()))
            })
            .collect::<Result<_, _>>()?;
        Ok(Self::new(self.instrument.clone(), futures))
    }

    /// Adds measures from `other`. Measures present in both are composed.
    pub fn add(&self, other: &Self) -> Self {
        let mut futures = self.futures.clone();
        for (measure, future) in &other.futures {
            let merged = match self.futures.get(measure) {
                Some(existing) => existing.add(future),
                None => future.clone(),
            };
            futures.insert(measure.clone(), merged);
        }
        let instrument = self.instrument.clone().or_else(|| other.instrument.clone());
        Self::new(instrument, futures)
    }

    /// A copy with a future added for a measure that is not yet present.
    pub(crate) fn with_measure(&self, measure: RiskMeasure, future: PricingFuture) -> Self {
        let mut futures = self.futures.clone();
        futures.entry(measure).or_insert(future);
        Self::new(self.instrument.clone(), futures)
    }

    /// Every measure shifted by a number.
    pub fn shift(&self, amount: f64) -> Self {
        self.map_futures(|f| f.add(amount))
    }

    /// Every measure scaled by a number.
    pub fn scale(&self, factor: f64) -> Self {
        self.map_futures(|f| f.map(move |r| r.scale(factor)))
    }

    fn map_futures(&self, f: impl Fn(&PricingFuture) -> PricingFuture) -> Self {
        let futures = self.futures.iter().map(|(m, fut)| (m.clone(), f(fut))).collect();
        Self::new(self.instrument.clone(), futures)
    }

    /// Cancels the composite, releasing the per-measure futures.
    pub fn cancel(&self) -> bool {
        self.future.cancel()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pricer_core::types::{MarketContext, RiskKey};

    fn date(day: u32) -> Date {
        Date::from_ymd(2024, 1, day).unwrap()
    }

    fn key(measure: &str) -> RiskKey {
        RiskKey::new(
            "Risk",
            date(2),
            MarketContext::close(date(2), "NYC"),
            RiskMeasure::new(measure),
        )
    }

    fn measures() -> IndexMap<RiskMeasure, PricingFuture> {
        let mut futures = IndexMap::new();
        futures.insert(RiskMeasure::new("Price"), PricingFuture::new());
        futures.insert(RiskMeasure::new("Delta"), PricingFuture::new());
        futures
    }

    #[test]
    fn test_resolves_after_all_measures() {
        let futures = measures();
        let multi = MultipleRiskMeasureFuture::new(None, futures.clone());
        assert!(!multi.done());

        futures[0].set_value(ResultValue::scalar(key("Price"), 100.0)).unwrap();
        assert!(!multi.done());
        futures[1].set_value(ResultValue::scalar(key("Delta"), 0.5)).unwrap();

        let result = multi.result(None).unwrap();
        let names: Vec<_> = result.measures().map(|m| m.name().to_string()).collect();
        assert_eq!(names, vec!["Price", "Delta"]);
        assert_eq!(result.get(&RiskMeasure::new("Delta")).unwrap().as_f64(), Some(0.5));
    }

    #[test]
    fn test_select_unknown_measure() {
        let multi = MultipleRiskMeasureFuture::new(None, measures());
        assert_eq!(
            multi.select(&[RiskMeasure::new("Vega")]).unwrap_err(),
            RiskError::MeasureNotComputed(RiskMeasure::new("Vega"))
        );
    }

    #[test]
    fn test_add_disjoint_measures() {
        let mut a = IndexMap::new();
        a.insert(
            RiskMeasure::new("Price"),
            PricingFuture::from_value(ResultValue::scalar(key("Price"), 1.0)),
        );
        let mut b = IndexMap::new();
        b.insert(
            RiskMeasure::new("Delta"),
            PricingFuture::from_value(ResultValue::scalar(key("Delta"), 2.0)),
        );
        let sum = MultipleRiskMeasureFuture::new(None, a).add(&MultipleRiskMeasureFuture::new(None, b));
        let result = sum.result(None).unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result.get(&RiskMeasure::new("Price")).unwrap().as_f64(), Some(1.0));
    }

    #[test]
    fn test_result_for_date_and_frame() {
        let mut values = IndexMap::new();
        values.insert(
            RiskMeasure::new("Price"),
            ResultValue::series(key("Price"), [(date(2), 1.0), (date(3), 2.0)]),
        );
        values.insert(
            RiskMeasure::new("Delta"),
            ResultValue::series(key("Delta"), [(date(2), 0.1), (date(3), 0.2)]),
        );
        let result = MultipleRiskMeasureResult::new(None, values);
        assert_eq!(result.dates(), vec![date(2), date(3)]);

        let day = result.for_date(date(3)).unwrap();
        assert_eq!(day.get(&RiskMeasure::new("Delta")).unwrap().as_f64(), Some(0.2));

        let frame = result.raw_frame();
        assert_eq!(frame.columns(), &["risk_measure", "dates", "value"]);
        assert_eq!(frame.len(), 4);
    }

    #[test]
    fn test_scale_every_measure() {
        let mut a = IndexMap::new();
        a.insert(
            RiskMeasure::new("Price"),
            PricingFuture::from_value(ResultValue::scalar(key("Price"), 2.0)),
        );
        let scaled = MultipleRiskMeasureFuture::new(None, a).scale(1.5).shift(1.0);
        let result = scaled.result(None).unwrap();
        assert_eq!(result.get(&RiskMeasure::new("Price")).unwrap().as_f64(), Some(4.0));
    }

    #[test]
    fn test_resolved_values_shift_and_scale() {
        let mut values = IndexMap::new();
        values.insert(RiskMeasure::new("Price"), ResultValue::scalar(key("Price"), 10.0));
        values.insert(RiskMeasure::new("Delta"), ResultValue::error(key("Delta"), "no model"));
        let result = MultipleRiskMeasureResult::new(None, values);

        let shifted = result
            .for_measures(&[RiskMeasure::new("Price")])
            .unwrap()
            .shift(2.0)
            .unwrap()
            .scale(3.0)
            .unwrap();
        assert_eq!(shifted.get(&RiskMeasure::new("Price")).unwrap().as_f64(), Some(36.0));
        assert!(result.scale(2.0).is_err());
    }
}
