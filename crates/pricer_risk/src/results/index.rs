//! Indexing result trees by measure, date and portfolio entry.
//!
//! Every axis can be indexed in any order: slicing a tree by date and then
//! picking an instrument gives the same result as picking the instrument
//! and then slicing by date.

use std::time::Duration;

use indexmap::IndexMap;
use pricer_core::types::{Date, RiskMeasure};

use super::tree::{PortfolioRiskResult, ResultNode};
use crate::error::RiskError;
use crate::future::{MultipleRiskMeasureFuture, PricingFuture, RiskResult};
use crate::portfolio::{Instrument, PortfolioPath, PriceableKey};

/// An index into a result tree.
#[derive(Clone, Debug, PartialEq)]
pub enum ResultIndex {
    /// One risk measure.
    Measure(RiskMeasure),
    /// Several risk measures.
    Measures(Vec<RiskMeasure>),
    /// One date of a historical result.
    Date(Date),
    /// Several dates of a historical result.
    Dates(Vec<Date>),
    /// One portfolio entry.
    Item(PriceableKey),
    /// Several portfolio entries, as a sub-tree in the order given.
    Items(Vec<PriceableKey>),
}

impl From<RiskMeasure> for ResultIndex {
    fn from(m: RiskMeasure) -> Self {
        ResultIndex::Measure(m)
    }
}

impl From<&RiskMeasure> for ResultIndex {
    fn from(m: &RiskMeasure) -> Self {
        ResultIndex::Measure(m.clone())
    }
}

impl From<Vec<RiskMeasure>> for ResultIndex {
    fn from(ms: Vec<RiskMeasure>) -> Self {
        ResultIndex::Measures(ms)
    }
}

impl From<Date> for ResultIndex {
    fn from(d: Date) -> Self {
        ResultIndex::Date(d)
    }
}

impl From<Vec<Date>> for ResultIndex {
    fn from(ds: Vec<Date>) -> Self {
        ResultIndex::Dates(ds)
    }
}

impl From<PriceableKey> for ResultIndex {
    fn from(k: PriceableKey) -> Self {
        ResultIndex::Item(k)
    }
}

impl From<Vec<PriceableKey>> for ResultIndex {
    fn from(ks: Vec<PriceableKey>) -> Self {
        ResultIndex::Items(ks)
    }
}

impl From<usize> for ResultIndex {
    fn from(i: usize) -> Self {
        ResultIndex::Item(PriceableKey::Position(i))
    }
}

impl From<&str> for ResultIndex {
    fn from(s: &str) -> Self {
        ResultIndex::Item(PriceableKey::from(s))
    }
}

impl From<PortfolioPath> for ResultIndex {
    fn from(p: PortfolioPath) -> Self {
        ResultIndex::Item(PriceableKey::Path(p))
    }
}

impl From<Instrument> for ResultIndex {
    fn from(i: Instrument) -> Self {
        ResultIndex::Item(PriceableKey::Instrument(i))
    }
}

impl From<&Instrument> for ResultIndex {
    fn from(i: &Instrument) -> Self {
        ResultIndex::Item(PriceableKey::from(i))
    }
}

/// What indexing produces: a resolved result or another tree.
#[derive(Clone, Debug)]
pub enum Indexed {
    /// A concrete result.
    Result(RiskResult),
    /// A (sub-)tree.
    Portfolio(PortfolioRiskResult),
}

impl Indexed {
    /// Indexes further, waiting indefinitely for leaves.
    pub fn index(&self, index: impl Into<ResultIndex>) -> Result<Indexed, RiskError> {
        self.index_timeout(index, None)
    }

    /// Indexes further, waiting up to `timeout` for each leaf.
    pub fn index_timeout(&self, index: impl Into<ResultIndex>, timeout: Option<Duration>) -> Result<Indexed, RiskError> {
        match self {
            Indexed::Portfolio(tree) => tree.index_timeout(index, timeout),
            Indexed::Result(result) => index_result(result, &index.into()).map(Indexed::Result),
        }
    }

    /// The result, if this is one.
    pub fn as_result(&self) -> Option<&RiskResult> {
        match self {
            Indexed::Result(r) => Some(r),
            Indexed::Portfolio(_) => None,
        }
    }

    /// The result, if this is one.
    pub fn into_result(self) -> Option<RiskResult> {
        match self {
            Indexed::Result(r) => Some(r),
            Indexed::Portfolio(_) => None,
        }
    }

    /// The tree, if this is one.
    pub fn as_portfolio(&self) -> Option<&PortfolioRiskResult> {
        match self {
            Indexed::Result(_) => None,
            Indexed::Portfolio(t) => Some(t),
        }
    }

    /// The number held, if this is a scalar result.
    pub fn as_f64(&self) -> Option<f64> {
        self.as_result().and_then(RiskResult::as_f64)
    }
}

fn index_result(result: &RiskResult, index: &ResultIndex) -> Result<RiskResult, RiskError> {
    match index {
        ResultIndex::Measure(m) => result.for_measure(m),
        ResultIndex::Measures(ms) => match result {
            RiskResult::Measures(values) => Ok(RiskResult::Measures(values.for_measures(ms)?)),
            RiskResult::Value(_) if ms.len() == 1 => result.for_measure(&ms[0]),
            _ => Err(RiskError::InvalidOperand(format!("{} is not a per-measure result", result))),
        },
        ResultIndex::Date(d) => result.for_date(*d),
        ResultIndex::Dates(ds) => result.for_dates(ds),
        ResultIndex::Item(PriceableKey::Position(i)) => match result {
            RiskResult::Sequence(items) => items
                .get(*i)
                .cloned()
                .ok_or_else(|| RiskError::KeyNotFound(i.to_string())),
            _ => Err(RiskError::KeyNotFound(i.to_string())),
        },
        ResultIndex::Item(key) => Err(RiskError::KeyNotFound(key.to_string())),
        ResultIndex::Items(keys) => Err(RiskError::KeyNotFound(
            keys.iter().map(ToString::to_string).collect::<Vec<_>>().join(", "),
        )),
    }
}

impl PortfolioRiskResult {
    /// Indexes the tree, waiting indefinitely for leaves.
    ///
    /// See [`index_timeout`](Self::index_timeout).
    pub fn index(&self, index: impl Into<ResultIndex>) -> Result<Indexed, RiskError> {
        self.index_timeout(index, None)
    }

    /// Indexes the tree.
    ///
    /// - A measure returns the tree itself when it is the only measure
    ///   computed, otherwise a tree of the same shape whose leaves hold
    ///   only that measure. Nothing is waited on.
    /// - A date or dates slice every leaf, waiting for each.
    /// - Several portfolio entries give the sub-tree over their paths.
    /// - One portfolio entry gives its resolved result, or its sub-tree
    ///   when it is a sub-portfolio.
    ///
    /// # Errors
    ///
    /// - [`RiskError::MeasureNotComputed`] for an unknown measure
    /// - [`RiskError::NotHistorical`] when slicing by date a leaf without dates
    /// - [`RiskError::KeyNotFound`] for an entry not in the portfolio
    /// - [`RiskError::StaleResolution`] for an instrument resolved in a
    ///   context this tree was not computed in
    pub fn index_timeout(&self, index: impl Into<ResultIndex>, timeout: Option<Duration>) -> Result<Indexed, RiskError> {
        match index.into() {
            ResultIndex::Measure(m) => self.for_measures(&[m]).map(Indexed::Portfolio),
            ResultIndex::Measures(ms) => self.for_measures(&ms).map(Indexed::Portfolio),
            ResultIndex::Date(d) => self
                .slice_dates(&|r| r.for_date(d), timeout)
                .map(Indexed::Portfolio),
            ResultIndex::Dates(ds) => self
                .slice_dates(&|r| r.for_dates(&ds), timeout)
                .map(Indexed::Portfolio),
            ResultIndex::Items(keys) => {
                let mut paths = Vec::new();
                for key in &keys {
                    paths.extend(self.lookup(key)?);
                }
                self.subset(&paths, timeout).map(Indexed::Portfolio)
            }
            ResultIndex::Item(key) => {
                let paths = self.lookup(&key)?;
                match paths.first() {
                    Some(path) => path.resolve(self, timeout),
                    None => Err(RiskError::KeyNotFound(key.to_string())),
                }
            }
        }
    }

    /// Paths matching a key, rejecting instruments resolved elsewhere.
    pub(crate) fn lookup(&self, key: &PriceableKey) -> Result<Vec<PortfolioPath>, RiskError> {
        if let PriceableKey::Instrument(instrument) = key {
            if let Some(context) = instrument.resolution_context() {
                if !self.contexts().contains(&context) {
                    return Err(RiskError::StaleResolution(instrument.to_string()));
                }
            }
        }
        let mut paths = self.portfolio().paths(key);
        if paths.is_empty() {
            if let PriceableKey::Instrument(instrument) = key {
                if let Some(unresolved) = instrument.unresolved() {
                    paths = self.portfolio().paths(&PriceableKey::Instrument(unresolved.clone()));
                }
            }
        }
        if paths.is_empty() {
            return Err(RiskError::KeyNotFound(key.to_string()));
        }
        Ok(paths)
    }

    /// The sub-tree over `paths`, in the order given.
    pub fn subset(&self, paths: &[PortfolioPath], timeout: Option<Duration>) -> Result<PortfolioRiskResult, RiskError> {
        let portfolio = self.portfolio().subset(paths)?;
        let nodes = paths
            .iter()
            .map(|p| p.node(self, timeout))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(PortfolioRiskResult::from_parts(
            portfolio,
            self.risk_measures().to_vec(),
            nodes,
            self.contexts().to_vec(),
        ))
    }

    fn for_measures(&self, measures: &[RiskMeasure]) -> Result<PortfolioRiskResult, RiskError> {
        if let Some(missing) = measures.iter().find(|m| !self.contains_measure(m)) {
            return Err(RiskError::MeasureNotComputed(missing.clone()));
        }
        if self.risk_measures().len() == 1 {
            return Ok(self.clone());
        }
        let sliced = self.map_leaves(&|node, _| match (node, measures) {
            (ResultNode::Measures(m), [single]) => m
                .get(single)
                .cloned()
                .map(ResultNode::Future)
                .ok_or_else(|| RiskError::MeasureNotComputed(single.clone())),
            (ResultNode::Measures(m), _) => m.select(measures).map(ResultNode::Measures),
            (ResultNode::Future(f), [single]) => {
                let single = single.clone();
                Ok(ResultNode::Future(f.map(move |r| r.for_measure(&single))))
            }
            (ResultNode::Future(f), _) => {
                let selected = measures.to_vec();
                Ok(ResultNode::Future(f.map(move |r| match r {
                    RiskResult::Measures(values) => values.for_measures(&selected).map(RiskResult::Measures),
                    other => Err(RiskError::InvalidOperand(format!("{} holds a single measure", other))),
                })))
            }
            (ResultNode::Portfolio(_), _) => Err(RiskError::ShapeMismatch("unexpected sub-portfolio".into())),
        })?;
        Ok(sliced.with_measures(measures.to_vec()))
    }

    fn slice_dates(
        &self,
        slice: &dyn Fn(&RiskResult) -> Result<RiskResult, RiskError>,
        timeout: Option<Duration>,
    ) -> Result<PortfolioRiskResult, RiskError> {
        self.map_leaves(&|node, instrument| match node.result(timeout)? {
            RiskResult::Measures(values) => {
                let sliced = slice(&RiskResult::Measures(values))?;
                let values = sliced.as_measures().map(|m| m.values().clone()).unwrap_or_default();
                let futures: IndexMap<RiskMeasure, PricingFuture> = values
                    .into_iter()
                    .map(|(m, v)| (m, PricingFuture::from_value(v)))
                    .collect();
                Ok(ResultNode::Measures(MultipleRiskMeasureFuture::new(instrument.cloned(), futures)))
            }
            other => Ok(ResultNode::Future(PricingFuture::resolved(slice(&other)?))),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{InlinePricingService, PricingContext};
    use crate::portfolio::Portfolio;
    use pricer_core::results::ResultValue;
    use std::sync::Arc;

    fn date(day: u32) -> Date {
        Date::from_ymd(2024, 1, day).unwrap()
    }

    fn service() -> Arc<InlinePricingService> {
        Arc::new(InlinePricingService::new(|req| {
            let base = match req.key.risk_measure.name() {
                "Price" => 100.0,
                _ => 1.0,
            };
            let day = req.key.date().map_or(0.0, |d| d.day() as f64);
            let notional = match req.instrument.property("notional") {
                Some(crate::portfolio::PropertyValue::Number(n)) => *n,
                _ => 1.0,
            };
            Ok(ResultValue::scalar(req.key.clone(), base * notional + day))
        }))
    }

    fn portfolio() -> Portfolio {
        Portfolio::named(
            "book",
            [
                Instrument::new("IRSwap").with_name("a").with_property("notional", 1.0),
                Instrument::new("IRSwap").with_name("b").with_property("notional", 2.0),
            ],
        )
    }

    fn measures() -> Vec<RiskMeasure> {
        vec![RiskMeasure::new("Price"), RiskMeasure::new("Delta")]
    }

    #[test]
    fn test_single_measure_returns_self() {
        let ctx = PricingContext::new(date(2), service());
        let tree = portfolio().calc(&[RiskMeasure::new("Price")], &ctx).unwrap();
        let same = tree.index(RiskMeasure::new("Price")).unwrap();
        assert_eq!(same.as_portfolio().unwrap().len(), 2);
        assert_eq!(
            tree.index(RiskMeasure::new("Vega")).unwrap_err(),
            RiskError::MeasureNotComputed(RiskMeasure::new("Vega"))
        );
    }

    #[test]
    fn test_measure_then_instrument() {
        let ctx = PricingContext::new(date(2), service());
        let tree = portfolio().calc(&measures(), &ctx).unwrap();
        let delta = tree.index(RiskMeasure::new("Delta")).unwrap();
        assert_eq!(delta.as_portfolio().unwrap().risk_measures(), &[RiskMeasure::new("Delta")]);
        assert_eq!(delta.index("b").unwrap().as_f64(), Some(4.0));
        assert_eq!(tree.index(1usize).unwrap().index(RiskMeasure::new("Price")).unwrap().as_f64(), Some(202.0));
    }

    #[test]
    fn test_date_on_non_historical_fails() {
        let ctx = PricingContext::new(date(2), service());
        let tree = portfolio().calc(&measures(), &ctx).unwrap();
        assert_eq!(tree.index(date(2)).unwrap_err(), RiskError::NotHistorical);
    }

    #[test]
    fn test_historical_index_order_commutes() {
        let ctx = PricingContext::historical([date(2), date(3), date(4)], service());
        let tree = portfolio().calc(&measures(), &ctx).unwrap();
        let price = RiskMeasure::new("Price");

        let a = tree.index(date(3)).unwrap().index("b").unwrap().into_result();
        let b = tree.index("b").unwrap().index(date(3)).unwrap().into_result();
        assert_eq!(a, b);

        let c = tree
            .index(price.clone())
            .unwrap()
            .index(date(3))
            .unwrap()
            .index("a")
            .unwrap()
            .into_result();
        let d = tree
            .index("a")
            .unwrap()
            .index(date(3))
            .unwrap()
            .index(price)
            .unwrap()
            .into_result();
        assert_eq!(c, d);
        assert_eq!(c.and_then(|r| r.as_f64()), Some(103.0));
    }

    #[test]
    fn test_items_subset_in_order() {
        let ctx = PricingContext::new(date(2), service());
        let tree = portfolio().calc(&[RiskMeasure::new("Price")], &ctx).unwrap();
        let keys: Vec<PriceableKey> = vec!["b".into(), "a".into()];
        let subset = tree.index(keys).unwrap();
        let subset = subset.as_portfolio().unwrap();
        assert_eq!(subset.len(), 2);
        assert_eq!(subset.index(0usize).unwrap().as_f64(), Some(202.0));
        assert!(matches!(tree.index("zzz"), Err(RiskError::KeyNotFound(_))));
    }

    #[test]
    fn test_resolved_instrument_lookup_is_context_bound() {
        let original = Instrument::new("IRSwap").with_name("r");
        let ctx = PricingContext::new(date(2), service());
        let resolved = ctx.resolve(&original, IndexMap::new());
        let portfolio = Portfolio::new([resolved.clone()]);
        let tree = portfolio.calc(&[RiskMeasure::new("Price")], &ctx).unwrap();

        let by_original = tree.index(&original).unwrap().as_f64();
        let by_resolved = tree.index(&resolved).unwrap().as_f64();
        assert_eq!(by_original, Some(102.0));
        assert_eq!(by_original, by_resolved);

        let other = PricingContext::new(date(2), service());
        let recomputed = portfolio.calc(&[RiskMeasure::new("Price")], &other).unwrap();
        assert_eq!(
            recomputed.index(&resolved).unwrap_err(),
            RiskError::StaleResolution("r".to_string())
        );
        assert!(recomputed.index(&original).is_ok());
    }
}
