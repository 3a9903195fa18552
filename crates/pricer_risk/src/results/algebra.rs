//! Arithmetic on result trees.
//!
//! Trees add when they do not overlap: the measures, instruments and dates
//! they cover must not all coincide. Trees over the same portfolio add
//! leaf by leaf; trees over different portfolios are placed side by side.

use std::ops::{Add, Mul};

use indexmap::IndexMap;
use pricer_core::types::{RiskKey, RiskMeasure};

use super::tree::{PortfolioRiskResult, ResultNode};
use crate::error::RiskError;
use crate::future::{MultipleRiskMeasureFuture, PricingFuture, RiskResult};
use crate::portfolio::{Instrument, PriceableKey};

impl PortfolioRiskResult {
    /// Combines two trees.
    ///
    /// Measures are the union of both sides, in order. Over the same
    /// portfolio, leaves are added pairwise (composing values of a shared
    /// measure, the right side winning on shared dates). Over different
    /// portfolios, the portfolios are concatenated; when several measures
    /// result, each leaf also picks up measures the other side computed for
    /// the same instrument.
    ///
    /// Waits for leaves to check overlap and compatibility.
    ///
    /// # Errors
    ///
    /// - [`RiskError::Overlap`] if the trees share measures, instruments and dates
    /// - [`RiskError::IncompatibleKeys`] if they were priced under different
    ///   scenarios, locations or parameters
    pub fn add(&self, other: &PortfolioRiskResult) -> Result<PortfolioRiskResult, RiskError> {
        self.check_overlap(other)?;
        self.check_compatible(other)?;

        let mut measures = self.risk_measures().to_vec();
        for measure in other.risk_measures() {
            if !measures.contains(measure) {
                measures.push(measure.clone());
            }
        }
        let mut contexts = self.contexts().to_vec();
        for context in other.contexts() {
            if !contexts.contains(context) {
                contexts.push(*context);
            }
        }

        if self.portfolio() == other.portfolio() {
            let nodes = add_nodes(self, other, &measures, &contexts)?;
            return Ok(PortfolioRiskResult::from_parts(
                self.portfolio().clone(),
                measures,
                nodes,
                contexts,
            ));
        }

        let multi = measures.len() > 1;
        let (lhs, rhs) = if multi {
            (self.as_multiple()?, other.as_multiple()?)
        } else {
            (self.clone(), other.clone())
        };
        let mut nodes = lhs.nodes().to_vec();
        nodes.extend(rhs.nodes().iter().cloned());
        let tree = PortfolioRiskResult::from_parts(
            self.portfolio().concat(other.portfolio()),
            measures,
            nodes,
            contexts,
        );
        if multi {
            tree.fill_measures(&[self, other])
        } else {
            Ok(tree)
        }
    }

    /// Every leaf shifted by a number.
    pub fn add_number(&self, amount: f64) -> PortfolioRiskResult {
        self.broadcast(&|f| f.add(amount))
    }

    /// Every leaf scaled by a number.
    pub fn scale(&self, factor: f64) -> PortfolioRiskResult {
        self.broadcast(&|f| f.map(move |r| r.scale(factor)))
    }

    fn broadcast(&self, op: &dyn Fn(&PricingFuture) -> PricingFuture) -> PortfolioRiskResult {
        let nodes = self
            .nodes()
            .iter()
            .map(|node| match node {
                ResultNode::Future(f) => ResultNode::Future(op(f)),
                ResultNode::Measures(m) => {
                    let futures = m
                        .measures_to_futures()
                        .iter()
                        .map(|(measure, f)| (measure.clone(), op(f)))
                        .collect();
                    ResultNode::Measures(MultipleRiskMeasureFuture::new(m.instrument().cloned(), futures))
                }
                ResultNode::Portfolio(t) => ResultNode::Portfolio(t.broadcast(op)),
            })
            .collect();
        PortfolioRiskResult::from_parts(
            self.portfolio().clone(),
            self.risk_measures().to_vec(),
            nodes,
            self.contexts().to_vec(),
        )
    }

    fn check_overlap(&self, other: &PortfolioRiskResult) -> Result<(), RiskError> {
        if !self.risk_measures().iter().any(|m| other.contains_measure(m)) {
            return Ok(());
        }
        let theirs = other.portfolio().all_instruments();
        if !self.portfolio().all_instruments().iter().any(|i| theirs.contains(i)) {
            return Ok(());
        }
        let their_dates = other.dates(None)?;
        if self.dates(None)?.iter().any(|d| their_dates.contains(d)) {
            return Err(RiskError::Overlap);
        }
        Ok(())
    }

    fn check_compatible(&self, other: &PortfolioRiskResult) -> Result<(), RiskError> {
        if let (Some(lhs), Some(rhs)) = (self.first_key()?, other.first_key()?) {
            if !lhs.is_compatible(&rhs) {
                return Err(RiskError::IncompatibleKeys);
            }
        }
        Ok(())
    }

    fn first_key(&self) -> Result<Option<RiskKey>, RiskError> {
        match self.leaves().first() {
            Some((_, node)) => Ok(first_key_of(&node.result(None)?)),
            None => Ok(None),
        }
    }

    fn as_multiple(&self) -> Result<PortfolioRiskResult, RiskError> {
        let measures = self.risk_measures().to_vec();
        self.map_leaves(&|node, instrument| as_multiple(node, &measures, instrument).map(ResultNode::Measures))
    }

    fn fill_measures(&self, sources: &[&PortfolioRiskResult]) -> Result<PortfolioRiskResult, RiskError> {
        let measures = self.risk_measures().to_vec();
        self.map_leaves(&|node, instrument| {
            let (ResultNode::Measures(leaf), Some(instrument)) = (node, instrument) else {
                return Ok(node.clone());
            };
            let mut filled = leaf.clone();
            for measure in &measures {
                if filled.get(measure).is_some() {
                    continue;
                }
                if let Some(future) = sources.iter().find_map(|s| s.measure_future(instrument, measure)) {
                    filled = filled.with_measure(measure.clone(), future);
                }
            }
            Ok(ResultNode::Measures(filled))
        })
    }

    fn measure_future(&self, instrument: &Instrument, measure: &RiskMeasure) -> Option<PricingFuture> {
        let single = self.risk_measures() == std::slice::from_ref(measure);
        self.portfolio()
            .paths(&PriceableKey::Instrument(instrument.clone()))
            .iter()
            .find_map(|path| match path.node(self, None).ok()? {
                ResultNode::Measures(m) => m.get(measure).cloned(),
                ResultNode::Future(f) if single => Some(f),
                _ => None,
            })
    }
}

fn first_key_of(result: &RiskResult) -> Option<RiskKey> {
    match result {
        RiskResult::Value(v) => Some(v.key().clone()),
        RiskResult::Measures(m) => m.iter().next().map(|(_, v)| v.key().clone()),
        RiskResult::Sequence(items) => items.first().and_then(first_key_of),
    }
}

fn as_multiple(
    node: &ResultNode,
    measures: &[RiskMeasure],
    instrument: Option<&Instrument>,
) -> Result<MultipleRiskMeasureFuture, RiskError> {
    match node {
        ResultNode::Measures(m) => Ok(m.clone()),
        ResultNode::Future(f) => {
            let futures: IndexMap<RiskMeasure, PricingFuture> = match measures {
                [measure] => std::iter::once((measure.clone(), f.clone())).collect(),
                _ => measures
                    .iter()
                    .map(|m| {
                        let measure = m.clone();
                        (m.clone(), f.map(move |r| r.for_measure(&measure)))
                    })
                    .collect(),
            };
            Ok(MultipleRiskMeasureFuture::new(instrument.cloned(), futures))
        }
        ResultNode::Portfolio(_) => Err(RiskError::ShapeMismatch("expected a leaf".to_string())),
    }
}

fn add_nodes(
    lhs: &PortfolioRiskResult,
    rhs: &PortfolioRiskResult,
    measures: &[RiskMeasure],
    contexts: &[crate::context::ContextId],
) -> Result<Vec<ResultNode>, RiskError> {
    lhs.nodes()
        .iter()
        .zip(rhs.nodes())
        .zip(lhs.portfolio().priceables())
        .map(|((a, b), priceable)| match (a, b) {
            (ResultNode::Portfolio(x), ResultNode::Portfolio(y)) => {
                Ok(ResultNode::Portfolio(PortfolioRiskResult::from_parts(
                    x.portfolio().clone(),
                    measures.to_vec(),
                    add_nodes(x, y, measures, contexts)?,
                    contexts.to_vec(),
                )))
            }
            (ResultNode::Future(x), ResultNode::Future(y)) if measures.len() == 1 => {
                Ok(ResultNode::Future(x.add(y)))
            }
            _ => {
                let instrument = priceable.as_instrument();
                let x = as_multiple(a, lhs.risk_measures(), instrument)?;
                let y = as_multiple(b, rhs.risk_measures(), instrument)?;
                Ok(ResultNode::Measures(x.add(&y)))
            }
        })
        .collect()
}

impl Add<f64> for &PortfolioRiskResult {
    type Output = PortfolioRiskResult;

    fn add(self, amount: f64) -> PortfolioRiskResult {
        self.add_number(amount)
    }
}

impl Mul<f64> for &PortfolioRiskResult {
    type Output = PortfolioRiskResult;

    fn mul(self, factor: f64) -> PortfolioRiskResult {
        self.scale(factor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{InlinePricingService, PricingContext};
    use crate::portfolio::Portfolio;
    use approx::assert_relative_eq;
    use pricer_core::results::ResultValue;
    use pricer_core::types::Date;
    use std::sync::Arc;

    fn date(day: u32) -> Date {
        Date::from_ymd(2024, 1, day).unwrap()
    }

    fn service() -> Arc<InlinePricingService> {
        Arc::new(InlinePricingService::new(|req| {
            let value = match req.key.risk_measure.name() {
                "Price" => 10.0,
                "Delta" => 0.5,
                _ => 1.0,
            };
            Ok(ResultValue::scalar(req.key.clone(), value))
        }))
    }

    fn context(day: u32) -> PricingContext {
        PricingContext::new(date(day), service()).with_location("NYC")
    }

    fn swaps(names: &[&str]) -> Portfolio {
        Portfolio::new(names.iter().map(|n| Instrument::new("IRSwap").with_name(*n)))
    }

    #[test]
    fn test_same_portfolio_disjoint_measures() {
        let portfolio = swaps(&["a", "b"]);
        let ctx = context(2);
        let price = portfolio.calc(&[RiskMeasure::new("Price")], &ctx).unwrap();
        let delta = portfolio.calc(&[RiskMeasure::new("Delta")], &ctx).unwrap();

        let both = price.add(&delta).unwrap();
        assert_eq!(both.len(), 2);
        assert_eq!(both.risk_measures(), &[RiskMeasure::new("Price"), RiskMeasure::new("Delta")]);
        let b = both.index("b").unwrap();
        assert_eq!(b.index(RiskMeasure::new("Delta")).unwrap().as_f64(), Some(0.5));
        assert_eq!(b.index(RiskMeasure::new("Price")).unwrap().as_f64(), Some(10.0));
    }

    #[test]
    fn test_overlap_is_rejected() {
        let portfolio = swaps(&["a"]);
        let ctx = context(2);
        let price = portfolio.calc(&[RiskMeasure::new("Price")], &ctx).unwrap();
        assert_eq!(price.add(&price).unwrap_err(), RiskError::Overlap);
    }

    #[test]
    fn test_same_measure_different_dates_compose() {
        let portfolio = swaps(&["a"]);
        let first = PricingContext::historical([date(2)], service()).with_location("NYC");
        let second = PricingContext::historical([date(3)], service()).with_location("NYC");
        let first = portfolio.calc(&[RiskMeasure::new("Price")], &first).unwrap();
        let second = portfolio.calc(&[RiskMeasure::new("Price")], &second).unwrap();

        let both = first.add(&second).unwrap();
        let value = both.index(0usize).unwrap().into_result().unwrap();
        assert_eq!(value.dates(), vec![date(2), date(3)]);
    }

    #[test]
    fn test_incompatible_keys_are_rejected() {
        let portfolio = swaps(&["a"]);
        let nyc = portfolio.calc(&[RiskMeasure::new("Price")], &context(2)).unwrap();
        let service = Arc::new(InlinePricingService::new(|req| Ok(ResultValue::scalar(req.key.clone(), 0.5))));
        let ldn = PricingContext::new(date(2), service).with_location("LDN");
        let delta = portfolio.calc(&[RiskMeasure::new("Delta")], &ldn).unwrap();
        assert_eq!(nyc.add(&delta).unwrap_err(), RiskError::IncompatibleKeys);
    }

    #[test]
    fn test_different_portfolios_fill_measures() {
        let ctx = context(2);
        let price = swaps(&["a", "b"]).calc(&[RiskMeasure::new("Price")], &ctx).unwrap();
        let delta = swaps(&["a", "c"]).calc(&[RiskMeasure::new("Delta")], &ctx).unwrap();

        let both = price.add(&delta).unwrap();
        assert_eq!(both.len(), 4);

        let first_a = both.index(0usize).unwrap().into_result().unwrap();
        let measures = first_a.as_measures().unwrap();
        assert_eq!(measures.len(), 2);
        assert_eq!(measures.get(&RiskMeasure::new("Delta")).unwrap().as_f64(), Some(0.5));

        let b = both.index(1usize).unwrap().into_result().unwrap();
        assert_eq!(b.as_measures().unwrap().len(), 1);
    }

    #[test]
    fn test_scalar_broadcast() {
        let ctx = context(2);
        let price = swaps(&["a", "b"]).calc(&[RiskMeasure::new("Price")], &ctx).unwrap();
        let shifted = &(&price * 1.5) + 1.0;
        assert_eq!(shifted.len(), 2);
        assert_relative_eq!(shifted.index("a").unwrap().as_f64().unwrap(), 16.0);
        assert_relative_eq!(price.index("a").unwrap().as_f64().unwrap(), 10.0);
    }
}
