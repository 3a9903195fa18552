//! Positional addresses within nested portfolios and result trees.

use std::fmt;
use std::ops::Add;
use std::time::Duration;

use crate::error::RiskError;
use crate::future::{PricingFuture, RiskResult};
use crate::results::{Indexed, PortfolioRiskResult, ResultNode};

/// An ordered sequence of child positions.
///
/// Paths compare and hash by their indices only.
///
/// # Examples
///
/// ```
/// use pricer_risk::portfolio::PortfolioPath;
///
/// let path = PortfolioPath::new(1) + PortfolioPath::new(0);
/// assert_eq!(path.indices(), &[1, 0]);
/// assert_eq!(path.to_string(), "(1, 0)");
/// assert_eq!(path.parent(), Some(PortfolioPath::new(1)));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PortfolioPath(Vec<usize>);

impl PortfolioPath {
    /// A path to a top-level entry.
    pub fn new(index: usize) -> Self {
        PortfolioPath(vec![index])
    }

    /// The empty path, addressing the root.
    pub fn root() -> Self {
        PortfolioPath(Vec::new())
    }

    /// The indices, outermost first.
    pub fn indices(&self) -> &[usize] {
        &self.0
    }

    /// Depth of the addressed node.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether this is the root path.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Position within the immediate parent.
    pub fn last(&self) -> Option<usize> {
        self.0.last().copied()
    }

    /// The path of the enclosing portfolio.
    pub fn parent(&self) -> Option<PortfolioPath> {
        self.0
            .split_last()
            .map(|(_, parent)| PortfolioPath(parent.to_vec()))
    }

    /// This path followed by `other`.
    pub fn concat(&self, other: &PortfolioPath) -> PortfolioPath {
        let mut indices = self.0.clone();
        indices.extend_from_slice(&other.0);
        PortfolioPath(indices)
    }

    /// This path extended by one child position.
    pub fn child(&self, index: usize) -> PortfolioPath {
        let mut indices = self.0.clone();
        indices.push(index);
        PortfolioPath(indices)
    }

    /// The node at this path.
    ///
    /// Descends through sub-portfolio nodes. A composite future met before
    /// the end of the path is resolved, waiting up to `timeout`, and the
    /// walk continues into its ordered results.
    ///
    /// # Errors
    ///
    /// [`RiskError::KeyNotFound`] if the path leaves the tree, or any error
    /// from resolving an intermediate future.
    pub fn node(&self, tree: &PortfolioRiskResult, timeout: Option<Duration>) -> Result<ResultNode, RiskError> {
        let not_found = || RiskError::KeyNotFound(self.to_string());
        let mut node = ResultNode::Portfolio(tree.clone());
        for &index in &self.0 {
            node = match node {
                ResultNode::Portfolio(sub) => sub.nodes().get(index).cloned().ok_or_else(not_found)?,
                ResultNode::Future(future) => match future.result(timeout)? {
                    RiskResult::Sequence(items) => {
                        ResultNode::Future(PricingFuture::resolved(items.get(index).cloned().ok_or_else(not_found)?))
                    }
                    _ => return Err(not_found()),
                },
                ResultNode::Measures(_) => return Err(not_found()),
            };
        }
        Ok(node)
    }

    /// The value or sub-tree at this path, resolving leaves.
    pub fn resolve(&self, tree: &PortfolioRiskResult, timeout: Option<Duration>) -> Result<Indexed, RiskError> {
        match self.node(tree, timeout)? {
            ResultNode::Portfolio(sub) => Ok(Indexed::Portfolio(sub)),
            ResultNode::Future(future) => Ok(Indexed::Result(future.result(timeout)?)),
            ResultNode::Measures(measures) => Ok(Indexed::Result(RiskResult::Measures(measures.result(timeout)?))),
        }
    }
}

impl From<Vec<usize>> for PortfolioPath {
    fn from(indices: Vec<usize>) -> Self {
        PortfolioPath(indices)
    }
}

impl From<&[usize]> for PortfolioPath {
    fn from(indices: &[usize]) -> Self {
        PortfolioPath(indices.to_vec())
    }
}

impl Add for PortfolioPath {
    type Output = PortfolioPath;

    fn add(self, other: PortfolioPath) -> PortfolioPath {
        self.concat(&other)
    }
}

impl Add<&PortfolioPath> for &PortfolioPath {
    type Output = PortfolioPath;

    fn add(self, other: &PortfolioPath) -> PortfolioPath {
        self.concat(other)
    }
}

impl fmt::Display for PortfolioPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, index) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", index)?;
        }
        write!(f, ")")
    }
}
