//! Nested portfolios of instruments.
//!
//! This module provides:
//! - `instrument`: [`Instrument`] with resolution tracking
//! - `path`: [`PortfolioPath`] positional addresses
//! - `frame`: Flattening portfolios to frames and back
//!
//! A [`Portfolio`] is an ordered list of [`Priceable`]s, each an instrument
//! or a nested portfolio. The order is the order of the result tree built
//! by [`Portfolio::calc`].

pub mod frame;
pub mod instrument;
pub mod path;

use std::collections::VecDeque;
use std::fmt;
use std::ops::Add;

use indexmap::IndexMap;
use pricer_core::types::RiskMeasure;

pub use instrument::{Instrument, PropertyValue};
pub use path::PortfolioPath;

use crate::context::PricingContext;
use crate::error::RiskError;
use crate::future::MultipleRiskMeasureFuture;
use crate::results::{PortfolioRiskResult, ResultNode};

/// An entry of a portfolio.
#[derive(Clone, Debug, PartialEq)]
pub enum Priceable {
    /// A single instrument.
    Instrument(Instrument),
    /// A nested portfolio.
    Portfolio(Portfolio),
}

impl Priceable {
    /// The entry's name.
    pub fn name(&self) -> Option<&str> {
        match self {
            Priceable::Instrument(i) => i.name(),
            Priceable::Portfolio(p) => p.name(),
        }
    }

    /// The instrument, if this entry is one.
    pub fn as_instrument(&self) -> Option<&Instrument> {
        match self {
            Priceable::Instrument(i) => Some(i),
            Priceable::Portfolio(_) => None,
        }
    }

    /// The nested portfolio, if this entry is one.
    pub fn as_portfolio(&self) -> Option<&Portfolio> {
        match self {
            Priceable::Instrument(_) => None,
            Priceable::Portfolio(p) => Some(p),
        }
    }
}

impl From<Instrument> for Priceable {
    fn from(i: Instrument) -> Self {
        Priceable::Instrument(i)
    }
}

impl From<Portfolio> for Priceable {
    fn from(p: Portfolio) -> Self {
        Priceable::Portfolio(p)
    }
}

/// Identifies entries of a portfolio.
#[derive(Clone, Debug, PartialEq)]
pub enum PriceableKey {
    /// Top-level position.
    Position(usize),
    /// Instrument or sub-portfolio name, at any depth.
    Name(String),
    /// Full path.
    Path(PortfolioPath),
    /// An instrument, matched directly or through the instrument it was
    /// resolved from.
    Instrument(Instrument),
}

impl From<usize> for PriceableKey {
    fn from(i: usize) -> Self {
        PriceableKey::Position(i)
    }
}

impl From<&str> for PriceableKey {
    fn from(s: &str) -> Self {
        PriceableKey::Name(s.to_string())
    }
}

impl From<String> for PriceableKey {
    fn from(s: String) -> Self {
        PriceableKey::Name(s)
    }
}

impl From<PortfolioPath> for PriceableKey {
    fn from(p: PortfolioPath) -> Self {
        PriceableKey::Path(p)
    }
}

impl From<Instrument> for PriceableKey {
    fn from(i: Instrument) -> Self {
        PriceableKey::Instrument(i)
    }
}

impl From<&Instrument> for PriceableKey {
    fn from(i: &Instrument) -> Self {
        PriceableKey::Instrument(i.clone())
    }
}

impl fmt::Display for PriceableKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PriceableKey::Position(i) => write!(f, "{}", i),
            PriceableKey::Name(n) => write!(f, "{}", n),
            PriceableKey::Path(p) => write!(f, "{}", p),
            PriceableKey::Instrument(i) => write!(f, "{}", i),
        }
    }
}

/// An ordered, possibly nested collection of instruments.
///
/// Equality ignores portfolio names.
///
/// # Examples
///
/// ```
/// use pricer_risk::portfolio::{Instrument, Portfolio, PortfolioPath, Priceable};
///
/// let rates = Portfolio::named("rates", [Instrument::new("IRSwap").with_name("5y")]);
/// let book = Portfolio::named(
///     "book",
///     vec![Priceable::from(Instrument::new("FXOption").with_name("eurusd")), rates.into()],
/// );
///
/// assert_eq!(book.len(), 2);
/// assert_eq!(book.paths(&"5y".into()), vec![PortfolioPath::from(vec![1, 0])]);
/// assert_eq!(book.all_instruments().len(), 2);
/// ```
#[derive(Clone, Debug, Default)]
pub struct Portfolio {
    name: Option<String>,
    priceables: Vec<Priceable>,
}

impl Portfolio {
    /// An unnamed portfolio.
    pub fn new<P>(priceables: impl IntoIterator<Item = P>) -> Self
    where
        P: Into<Priceable>,
    {
        Self {
            name: None,
            priceables: priceables.into_iter().map(Into::into).collect(),
        }
    }

    /// A named portfolio.
    pub fn named<P>(name: impl Into<String>, priceables: impl IntoIterator<Item = P>) -> Self
    where
        P: Into<Priceable>,
    {
        Self {
            name: Some(name.into()),
            ..Self::new(priceables)
        }
    }

    /// Name, if set.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Top-level entries.
    pub fn priceables(&self) -> &[Priceable] {
        &self.priceables
    }

    /// Number of top-level entries.
    pub fn len(&self) -> usize {
        self.priceables.len()
    }

    /// Whether there are no entries.
    pub fn is_empty(&self) -> bool {
        self.priceables.is_empty()
    }

    /// The entry at a path.
    pub fn get(&self, path: &PortfolioPath) -> Option<&Priceable> {
        let (first, rest) = path.indices().split_first()?;
        let mut entry = self.priceables.get(*first)?;
        for &index in rest {
            entry = entry.as_portfolio()?.priceables.get(index)?;
        }
        Some(entry)
    }

    /// Every path matching `key`.
    ///
    /// Names and instruments match at any depth: entries at this level come
    /// first, then matches inside nested portfolios in order.
    pub fn paths(&self, key: &PriceableKey) -> Vec<PortfolioPath> {
        match key {
            PriceableKey::Position(i) if *i < self.len() => vec![PortfolioPath::new(*i)],
            PriceableKey::Position(_) => Vec::new(),
            PriceableKey::Path(path) if self.get(path).is_some() => vec![path.clone()],
            PriceableKey::Path(_) => Vec::new(),
            PriceableKey::Name(name) => self.paths_where(&|p| p.name() == Some(name.as_str())),
            PriceableKey::Instrument(target) => {
                self.paths_where(&|p| p.as_instrument().map_or(false, |i| i.matches(target)))
            }
        }
    }

    fn paths_where(&self, matches: &dyn Fn(&Priceable) -> bool) -> Vec<PortfolioPath> {
        let mut paths: Vec<PortfolioPath> = self
            .priceables
            .iter()
            .enumerate()
            .filter(|(_, p)| matches(p))
            .map(|(i, _)| PortfolioPath::new(i))
            .collect();
        for (i, priceable) in self.priceables.iter().enumerate() {
            if let Priceable::Portfolio(sub) = priceable {
                let prefix = PortfolioPath::new(i);
                paths.extend(sub.paths_where(matches).iter().map(|p| prefix.concat(p)));
            }
        }
        paths
    }

    /// Paths of every instrument, breadth-first.
    pub fn all_paths(&self) -> Vec<PortfolioPath> {
        let mut paths = Vec::new();
        let mut queue: VecDeque<(PortfolioPath, &Portfolio)> = VecDeque::new();
        queue.push_back((PortfolioPath::root(), self));
        while let Some((prefix, portfolio)) = queue.pop_front() {
            for (i, priceable) in portfolio.priceables.iter().enumerate() {
                match priceable {
                    Priceable::Instrument(_) => paths.push(prefix.child(i)),
                    Priceable::Portfolio(sub) => queue.push_back((prefix.child(i), sub)),
                }
            }
        }
        paths
    }

    /// Every instrument, in [`all_paths`](Self::all_paths) order.
    pub fn all_instruments(&self) -> Vec<&Instrument> {
        self.all_paths()
            .iter()
            .filter_map(|p| self.get(p).and_then(Priceable::as_instrument))
            .collect()
    }

    /// A flat portfolio of the entries at `paths`, in the order given.
    ///
    /// # Errors
    ///
    /// [`RiskError::KeyNotFound`] for a path outside the portfolio.
    pub fn subset(&self, paths: &[PortfolioPath]) -> Result<Portfolio, RiskError> {
        let priceables = paths
            .iter()
            .map(|p| {
                self.get(p)
                    .cloned()
                    .ok_or_else(|| RiskError::KeyNotFound(p.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Portfolio {
            name: None,
            priceables,
        })
    }

    /// The entries of both portfolios, this one's first.
    pub fn concat(&self, other: &Portfolio) -> Portfolio {
        let mut priceables = self.priceables.clone();
        priceables.extend(other.priceables.iter().cloned());
        Portfolio {
            name: None,
            priceables,
        }
    }

    /// Requests `measures` for every instrument under `context`.
    ///
    /// The returned tree mirrors this portfolio: one plain leaf per
    /// instrument for a single measure, one per-measure leaf otherwise.
    /// All requests go out as one batch.
    ///
    /// # Errors
    ///
    /// [`RiskError::InvalidOperand`] if `measures` is empty.
    pub fn calc(&self, measures: &[RiskMeasure], context: &PricingContext) -> Result<PortfolioRiskResult, RiskError> {
        if measures.is_empty() {
            return Err(RiskError::InvalidOperand("no risk measures requested".to_string()));
        }
        let tree = {
            let _guard = context.enter();
            self.calc_nodes(measures, context)
        };
        Ok(tree)
    }

    fn calc_nodes(&self, measures: &[RiskMeasure], context: &PricingContext) -> PortfolioRiskResult {
        let nodes = self
            .priceables
            .iter()
            .map(|priceable| match priceable {
                Priceable::Instrument(instrument) => match measures {
                    [measure] => ResultNode::Future(context.calc(instrument, measure)),
                    _ => {
                        let futures: IndexMap<_, _> = measures
                            .iter()
                            .map(|m| (m.clone(), context.calc(instrument, m)))
                            .collect();
                        ResultNode::Measures(MultipleRiskMeasureFuture::new(Some(instrument.clone()), futures))
                    }
                },
                Priceable::Portfolio(sub) => ResultNode::Portfolio(sub.calc_nodes(measures, context)),
            })
            .collect();
        PortfolioRiskResult::from_parts(self.clone(), measures.to_vec(), nodes, vec![context.id()])
    }
}

impl PartialEq for Portfolio {
    fn eq(&self, other: &Self) -> bool {
        self.priceables == other.priceables
    }
}

impl Add for &Portfolio {
    type Output = Portfolio;

    fn add(self, other: &Portfolio) -> Portfolio {
        self.concat(other)
    }
}

impl fmt::Display for Portfolio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name.as_deref().unwrap_or("Portfolio"))
    }
}
