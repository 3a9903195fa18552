//! The portfolio-shaped result tree.

use std::fmt;
use std::time::Duration;

use pricer_core::types::{Date, RiskMeasure};

use crate::context::ContextId;
use crate::error::RiskError;
use crate::future::{owning_composite, Aggregation, MultipleRiskMeasureFuture, PricingFuture, RiskResult};
use crate::portfolio::{Instrument, Portfolio, PortfolioPath, Priceable, PriceableKey};

/// One entry of a result tree.
#[derive(Clone, Debug)]
pub enum ResultNode {
    /// A single-measure leaf.
    Future(PricingFuture),
    /// A per-measure leaf.
    Measures(MultipleRiskMeasureFuture),
    /// A nested sub-portfolio.
    Portfolio(PortfolioRiskResult),
}

impl ResultNode {
    /// A future resolving once everything under this node has.
    pub fn future(&self) -> PricingFuture {
        match self {
            ResultNode::Future(f) => f.clone(),
            ResultNode::Measures(m) => m.future().clone(),
            ResultNode::Portfolio(t) => t.future().clone(),
        }
    }

    /// Whether everything under this node has resolved.
    pub fn done(&self) -> bool {
        match self {
            ResultNode::Future(f) => f.done(),
            ResultNode::Measures(m) => m.done(),
            ResultNode::Portfolio(t) => t.done(),
        }
    }

    /// Resolves a leaf. Sub-portfolios resolve to the sequence of their
    /// children's results.
    pub fn result(&self, timeout: Option<Duration>) -> Result<RiskResult, RiskError> {
        match self {
            ResultNode::Future(f) => f.result(timeout),
            ResultNode::Measures(m) => m.result(timeout).map(RiskResult::Measures),
            ResultNode::Portfolio(t) => t.future().result(timeout),
        }
    }
}

/// Results of a portfolio calculation, shaped like the portfolio.
///
/// Holds one node per top-level portfolio entry, in portfolio order. Leaves
/// are futures; the tree can be indexed, combined and flattened before or
/// after they resolve, blocking only where a concrete value is needed.
#[derive(Clone, Debug)]
pub struct PortfolioRiskResult {
    portfolio: Portfolio,
    risk_measures: Vec<RiskMeasure>,
    nodes: Vec<ResultNode>,
    contexts: Vec<ContextId>,
    future: PricingFuture,
}

impl PortfolioRiskResult {
    /// Assembles a tree from nodes mirroring `portfolio`.
    ///
    /// # Errors
    ///
    /// [`RiskError::ShapeMismatch`] if the nodes do not match the portfolio
    /// entry for entry (instruments to leaves, sub-portfolios to subtrees).
    pub fn new(
        portfolio: Portfolio,
        risk_measures: Vec<RiskMeasure>,
        nodes: Vec<ResultNode>,
    ) -> Result<Self, RiskError> {
        check_shape(&portfolio, &nodes)?;
        Ok(Self::from_parts(portfolio, risk_measures, nodes, Vec::new()))
    }

    pub(crate) fn from_parts(
        portfolio: Portfolio,
        risk_measures: Vec<RiskMeasure>,
        nodes: Vec<ResultNode>,
        contexts: Vec<ContextId>,
    ) -> Self {
        let future = owning_composite(nodes.iter().map(ResultNode::future).collect(), Aggregation::Sequence);
        Self {
            portfolio,
            risk_measures,
            nodes,
            contexts,
            future,
        }
    }

    /// The same tree, accepting lookups by instruments resolved in `context`.
    pub fn with_context(mut self, context: ContextId) -> Self {
        if !self.contexts.contains(&context) {
            self.contexts.push(context);
        }
        self
    }

    /// Number of top-level entries.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the tree has no entries.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The portfolio the tree mirrors.
    pub fn portfolio(&self) -> &Portfolio {
        &self.portfolio
    }

    /// Measures computed, in request order.
    pub fn risk_measures(&self) -> &[RiskMeasure] {
        &self.risk_measures
    }

    /// Top-level nodes.
    pub fn nodes(&self) -> &[ResultNode] {
        &self.nodes
    }

    /// Contexts whose resolved instruments may be used as lookup keys.
    pub fn contexts(&self) -> &[ContextId] {
        &self.contexts
    }

    /// A future resolving once every leaf has.
    pub fn future(&self) -> &PricingFuture {
        &self.future
    }

    /// Whether every leaf has resolved.
    pub fn done(&self) -> bool {
        self.future.done()
    }

    /// Waits for every leaf, returning the resolved tree.
    pub fn result(&self, timeout: Option<Duration>) -> Result<PortfolioRiskResult, RiskError> {
        self.future.result(timeout)?;
        Ok(self.clone())
    }

    /// Cancels pending leaves not shared with other trees.
    pub fn cancel(&self) -> bool {
        self.future.cancel()
    }

    /// Leaves with their paths, depth-first.
    pub fn leaves(&self) -> Vec<(PortfolioPath, ResultNode)> {
        let mut leaves = Vec::new();
        self.collect_leaves(&PortfolioPath::root(), &mut leaves);
        leaves
    }

    fn collect_leaves(&self, prefix: &PortfolioPath, out: &mut Vec<(PortfolioPath, ResultNode)>) {
        for (i, node) in self.nodes.iter().enumerate() {
            match node {
                ResultNode::Portfolio(sub) => sub.collect_leaves(&prefix.child(i), out),
                leaf => out.push((prefix.child(i), leaf.clone())),
            }
        }
    }

    /// Resolved leaf results with their paths, depth-first.
    pub fn results(&self, timeout: Option<Duration>) -> Result<Vec<(PortfolioPath, RiskResult)>, RiskError> {
        self.leaves()
            .into_iter()
            .map(|(path, node)| Ok((path, node.result(timeout)?)))
            .collect()
    }

    /// Dates covered by any leaf, ascending. Resolves every leaf.
    pub fn dates(&self, timeout: Option<Duration>) -> Result<Vec<Date>, RiskError> {
        let mut dates: Vec<Date> = self
            .results(timeout)?
            .iter()
            .flat_map(|(_, result)| result.dates())
            .collect();
        dates.sort();
        dates.dedup();
        Ok(dates)
    }

    /// Whether a measure was computed.
    pub fn contains_measure(&self, measure: &RiskMeasure) -> bool {
        self.risk_measures.contains(measure)
    }

    /// Whether the key addresses an entry of the portfolio.
    ///
    /// Instruments resolved in one of the tree's contexts match the entry
    /// they were resolved from.
    pub fn contains_key(&self, key: &PriceableKey) -> bool {
        self.lookup(key).is_ok()
    }

    /// Whether any leaf covers the date. Resolves every leaf.
    pub fn contains_date(&self, date: Date, timeout: Option<Duration>) -> Result<bool, RiskError> {
        Ok(self.dates(timeout)?.contains(&date))
    }

    /// The instrument at a leaf path.
    pub(crate) fn instrument_at(&self, path: &PortfolioPath) -> Option<&Instrument> {
        self.portfolio.get(path).and_then(Priceable::as_instrument)
    }

    /// A tree of the same shape with every node rebuilt by `f`.
    pub(crate) fn map_leaves(
        &self,
        f: &dyn Fn(&ResultNode, Option<&Instrument>) -> Result<ResultNode, RiskError>,
    ) -> Result<Self, RiskError> {
        let nodes = self
            .nodes
            .iter()
            .zip(self.portfolio.priceables())
            .map(|(node, priceable)| match node {
                ResultNode::Portfolio(sub) => Ok(ResultNode::Portfolio(sub.map_leaves(f)?)),
                leaf => f(leaf, priceable.as_instrument()),
            })
            .collect::<Result<Vec<_>, RiskError>>()?;
        Ok(Self::from_parts(
            self.portfolio.clone(),
            self.risk_measures.clone(),
            nodes,
            self.contexts.clone(),
        ))
    }

    pub(crate) fn with_measures(mut self, risk_measures: Vec<RiskMeasure>) -> Self {
        self.risk_measures = risk_measures;
        self
    }
}

fn check_shape(portfolio: &Portfolio, nodes: &[ResultNode]) -> Result<(), RiskError> {
    if portfolio.len() != nodes.len() {
        return Err(RiskError::ShapeMismatch(format!(
            "{} entries but {} nodes",
            portfolio.len(),
            nodes.len()
        )));
    }
    for (i, (priceable, node)) in portfolio.priceables().iter().zip(nodes).enumerate() {
        match (priceable, node) {
            (Priceable::Instrument(_), ResultNode::Future(_) | ResultNode::Measures(_)) => {}
            (Priceable::Portfolio(p), ResultNode::Portfolio(t)) if p == t.portfolio() => {}
            _ => {
                return Err(RiskError::ShapeMismatch(format!(
                    "entry {} does not match its node",
                    i
                )))
            }
        }
    }
    Ok(())
}

impl fmt::Display for PortfolioRiskResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let measures: Vec<&str> = self.risk_measures.iter().map(RiskMeasure::name).collect();
        write!(
            f,
            "({}) Results for {} ({})",
            measures.join(", "),
            self.portfolio,
            self.len()
        )
    }
}
