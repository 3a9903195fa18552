//! Summing a result tree into one result.

use std::time::Duration;

use indexmap::IndexMap;
use pricer_core::results::{aggregate_values, ResultValue};
use pricer_core::types::RiskMeasure;
use tracing::debug;

use super::tree::PortfolioRiskResult;
use crate::config::RiskConfig;
use crate::error::RiskError;
use crate::future::{MultipleRiskMeasureResult, RiskResult};

impl PortfolioRiskResult {
    /// Sums every leaf of the tree, waiting for all of them.
    ///
    /// A single-measure tree sums to one value; a multi-measure tree sums
    /// each measure separately into a per-measure result. Leaves that did
    /// not compute a measure are skipped for it.
    ///
    /// # Errors
    ///
    /// - [`RiskError::Composition`] if values differ in shape or unit, carry
    ///   an error, or (unless `allow_mismatch`) differ in provenance key
    /// - [`RiskError::MeasureNotComputed`] if no leaf holds a measure
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::Arc;
    /// use pricer_core::results::ResultValue;
    /// use pricer_core::types::{Date, RiskMeasure};
    /// use pricer_risk::context::{InlinePricingService, PricingContext};
    /// use pricer_risk::portfolio::{Instrument, Portfolio};
    ///
    /// let service = Arc::new(InlinePricingService::new(|req| {
    ///     Ok(ResultValue::scalar(req.key.clone(), 2.5))
    /// }));
    /// let context = PricingContext::new(Date::from_ymd(2024, 1, 2).unwrap(), service);
    /// let book = Portfolio::new([Instrument::new("IRSwap"), Instrument::new("IRSwap")]);
    ///
    /// let tree = book.calc(&[RiskMeasure::new("Price")], &context).unwrap();
    /// assert_eq!(tree.aggregate(false).unwrap().as_f64(), Some(5.0));
    /// ```
    pub fn aggregate(&self, allow_mismatch: bool) -> Result<RiskResult, RiskError> {
        self.aggregate_timeout(allow_mismatch, None)
    }

    /// [`aggregate`](Self::aggregate) with the mismatch policy and wait
    /// timeout taken from configuration.
    pub fn aggregate_with(&self, config: &RiskConfig) -> Result<RiskResult, RiskError> {
        self.aggregate_timeout(config.allow_mismatch_risk_keys, config.result_timeout())
    }

    fn aggregate_timeout(&self, allow_mismatch: bool, timeout: Option<Duration>) -> Result<RiskResult, RiskError> {
        let results = self.results(timeout)?;
        debug!(leaves = results.len(), measures = self.risk_measures().len(), "aggregating result tree");

        let single = self.risk_measures().len() == 1;
        let mut totals = IndexMap::new();
        for measure in self.risk_measures() {
            let values: Vec<ResultValue> = results
                .iter()
                .filter_map(|(_, result)| value_for(result, measure, single))
                .collect();
            if values.is_empty() {
                return Err(RiskError::MeasureNotComputed(measure.clone()));
            }
            totals.insert(measure.clone(), aggregate_values(&values, allow_mismatch)?);
        }

        if single {
            if let Some((_, total)) = totals.pop() {
                return Ok(RiskResult::Value(total));
            }
        }
        Ok(RiskResult::Measures(MultipleRiskMeasureResult::new(None, totals)))
    }
}

fn value_for(result: &RiskResult, measure: &RiskMeasure, single: bool) -> Option<ResultValue> {
    match result {
        RiskResult::Value(v) if single || v.key().risk_measure == *measure => Some(v.clone()),
        RiskResult::Measures(m) => m.get(measure).cloned(),
        _ => None,
    }
}
