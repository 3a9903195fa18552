//! Risk measure identifiers.

use std::fmt;

/// Identity of an analytic quantity computed for an instrument
/// (e.g. `Price`, `IRDelta`).
///
/// # Examples
///
/// ```
/// use pricer_core::types::RiskMeasure;
///
/// let price = RiskMeasure::new("Price");
/// assert_eq!(price.name(), "Price");
/// assert_eq!(price, "Price".into());
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct RiskMeasure(String);

impl RiskMeasure {
    /// Creates a new risk measure identifier.
    #[inline]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the measure name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RiskMeasure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RiskMeasure {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for RiskMeasure {
    fn from(s: String) -> Self {
        Self(s)
    }
}
