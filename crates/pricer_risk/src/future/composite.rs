//! Futures that resolve once a fixed set of children has.
//!
//! One composite type serves every grouping; what it produces from its
//! children is selected by an [`Aggregation`] strategy.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use pricer_core::results::{combine_dated, ResultValue};
use pricer_core::types::{RiskKey, RiskMeasure};
use tracing::{debug, error, trace};

use super::multi_measure::MultipleRiskMeasureResult;
use super::pricing_future::{Outcome, PricingFuture};
use super::risk_result::RiskResult;
use crate::error::RiskError;
use crate::portfolio::Instrument;

/// User-supplied combination of child results.
pub type Combiner = Arc<dyn Fn(Vec<RiskResult>) -> Result<RiskResult, RiskError> + Send + Sync>;

/// How a composite turns its children's results into its own.
#[derive(Clone)]
pub enum Aggregation {
    /// The children's results in order.
    Sequence,
    /// One child per measure, producing a per-measure result.
    Measures {
        /// Measure of each child, in child order.
        measures: Vec<RiskMeasure>,
        /// The instrument the measures were computed for.
        instrument: Option<Instrument>,
    },
    /// One child per pricing date, concatenated along the date axis.
    ///
    /// The first failing child's error becomes the result and is logged
    /// rather than raised. A child that fails outright is recorded as an
    /// error value under its request key.
    Historical {
        /// Request key of each child, in child order.
        keys: Vec<RiskKey>,
    },
    /// A custom combination.
    Custom(Combiner),
}

impl Aggregation {
    /// A custom combination from a closure.
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(Vec<RiskResult>) -> Result<RiskResult, RiskError> + Send + Sync + 'static,
    {
        Aggregation::Custom(Arc::new(f))
    }

    /// Per-date composition over the given request keys.
    pub fn historical(keys: Vec<RiskKey>) -> Self {
        Aggregation::Historical { keys }
    }

    fn synthesise(&self, outcomes: Vec<Option<Outcome>>) -> Outcome {
        let mut results = Vec::with_capacity(outcomes.len());
        for (idx, outcome) in outcomes.into_iter().enumerate() {
            match outcome {
                Some(Ok(result)) => results.push(result),
                Some(Err(err)) => match self {
                    Aggregation::Historical { keys } if idx < keys.len() => {
                        results.push(RiskResult::Value(ResultValue::error(keys[idx].clone(), err.to_string())));
                    }
                    _ => return Err(err),
                },
                None => {
                    return Err(RiskError::InvalidOperand(
                        "child completed without a result".to_string(),
                    ))
                }
            }
        }
        self.combine(results)
    }

    fn combine(&self, results: Vec<RiskResult>) -> Outcome {
        match self {
            Aggregation::Sequence => Ok(RiskResult::Sequence(results)),
            Aggregation::Measures {
                measures,
                instrument,
            } => {
                let mut values = IndexMap::with_capacity(measures.len());
                for (measure, result) in measures.iter().zip(results) {
                    let value = result.into_value().ok_or_else(|| {
                        RiskError::InvalidOperand(format!("{} did not resolve to a value", measure))
                    })?;
                    values.insert(measure.clone(), value);
                }
                Ok(RiskResult::Measures(MultipleRiskMeasureResult::new(
                    instrument.clone(),
                    values,
                )))
            }
            Aggregation::Historical { .. } => historical(results),
            Aggregation::Custom(f) => f(results),
        }
    }
}

impl fmt::Debug for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Aggregation::Sequence => write!(f, "Sequence"),
            Aggregation::Measures { measures, .. } => write!(f, "Measures({:?})", measures),
            Aggregation::Historical { keys } => write!(f, "Historical({} dates)", keys.len()),
            Aggregation::Custom(_) => write!(f, "Custom"),
        }
    }
}

fn historical(results: Vec<RiskResult>) -> Outcome {
    if results.iter().all(|r| matches!(r, RiskResult::Value(_))) {
        let values: Vec<ResultValue> = results.into_iter().filter_map(RiskResult::into_value).collect();
        return Ok(RiskResult::Value(combine_logged(&values)?));
    }

    let mut per_measure: IndexMap<RiskMeasure, Vec<ResultValue>> = IndexMap::new();
    let mut instrument = None;
    for result in results {
        match result {
            RiskResult::Measures(m) => {
                instrument = instrument.or_else(|| m.instrument().cloned());
                for (measure, value) in m.iter() {
                    per_measure.entry(measure.clone()).or_default().push(value.clone());
                }
            }
            other => {
                return Err(RiskError::InvalidOperand(format!(
                    "cannot combine {} along the date axis",
                    other
                )))
            }
        }
    }

    let mut values = IndexMap::with_capacity(per_measure.len());
    for (measure, dated) in per_measure {
        values.insert(measure, combine_logged(&dated)?);
    }
    Ok(RiskResult::Measures(MultipleRiskMeasureResult::new(instrument, values)))
}

fn combine_logged(values: &[ResultValue]) -> Result<ResultValue, RiskError> {
    let combined = combine_dated(values)?;
    if let ResultValue::Error(e) = &combined {
        error!(key = %e.key, "historical calculation failed: {}", e.message);
    }
    Ok(combined)
}

/// A future resolving once every child has, via `aggregation`.
///
/// Resolves immediately if every child is already done (or there are
/// none). Exactly one child completion performs the aggregation, on the
/// thread that completed the last child. A failed or cancelled child fails
/// the composite with the first such error in child order, except under
/// [`Aggregation::Historical`].
///
/// The composite does not own its children: cancelling it leaves them
/// running for whoever else holds them.
///
/// # Examples
///
/// ```
/// use pricer_core::results::ResultValue;
/// use pricer_core::types::{Date, MarketContext, RiskKey, RiskMeasure};
/// use pricer_risk::future::{composite, Aggregation, PricingFuture};
///
/// let d = Date::from_ymd(2024, 1, 2).unwrap();
/// let key = RiskKey::new("Risk", d, MarketContext::close(d, "NYC"), RiskMeasure::new("Price"));
///
/// let a = PricingFuture::new();
/// let b = PricingFuture::from_value(ResultValue::scalar(key.clone(), 2.0));
/// let both = composite(vec![a.clone(), b], Aggregation::Sequence);
///
/// assert!(!both.done());
/// a.set_value(ResultValue::scalar(key, 1.0)).unwrap();
/// assert!(both.done());
/// ```
pub fn composite(children: Vec<PricingFuture>, aggregation: Aggregation) -> PricingFuture {
    build_composite(children, aggregation, false)
}

/// A composite that claims its children.
///
/// Cancelling it cancels each child no other owning composite still
/// claims. Claims are given up when the composite is cancelled or dropped.
pub(crate) fn owning_composite(children: Vec<PricingFuture>, aggregation: Aggregation) -> PricingFuture {
    build_composite(children, aggregation, true)
}

fn build_composite(children: Vec<PricingFuture>, aggregation: Aggregation, owning: bool) -> PricingFuture {
    let origin = children.iter().find_map(PricingFuture::origin);
    let future = PricingFuture::with_children(origin, children.clone(), owning);
    if children.is_empty() {
        if let Err(err) = future.complete(aggregation.combine(Vec::new())) {
            debug!(%err, "composite result discarded");
        }
        return future;
    }

    let total = children.len();
    let remaining = Arc::new(AtomicUsize::new(total));
    let collected: Arc<Mutex<Vec<Option<Outcome>>>> = Arc::new(Mutex::new(vec![None; total]));
    let aggregation = Arc::new(aggregation);

    if owning {
        for child in &children {
            child.claim();
        }
    }
    for (idx, child) in children.iter().enumerate() {
        let remaining = Arc::clone(&remaining);
        let collected = Arc::clone(&collected);
        let aggregation = Arc::clone(&aggregation);
        let target = future.downgrade();
        child.add_done_callback(move |outcome| {
            collected.lock()[idx] = Some(outcome.clone());
            if remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
                let Some(target) = target.upgrade() else {
                    return;
                };
                let outcomes = std::mem::take(&mut *collected.lock());
                let result = aggregation.synthesise(outcomes);
                trace!(children = total, ok = result.is_ok(), "composite resolved");
                if let Err(err) = target.complete(result) {
                    debug!(%err, "composite result discarded");
                }
            }
        });
    }
    future
}
