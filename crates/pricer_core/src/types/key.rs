//! Provenance keys identifying the computation behind a result.
//!
//! A [`RiskKey`] records who computed a value (provider), for which
//! date(s), against which market, with which parameters and scenario, and
//! for which risk measure. Two values may only be composed when their keys
//! agree on everything except the measure and the date axis; that common
//! part is the [`KeyIdentity`].

use std::fmt;

use super::measure::RiskMeasure;
use super::time::Date;

/// The date component of a provenance key.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum KeyDates {
    /// A single pricing date.
    Single(Date),
    /// An ordered set of pricing dates (historical results).
    Range(Vec<Date>),
}

impl KeyDates {
    /// Builds key dates from an iterator, collapsing one date to `Single`.
    pub fn from_dates(dates: impl IntoIterator<Item = Date>) -> Self {
        let mut dates: Vec<Date> = dates.into_iter().collect();
        dates.sort();
        dates.dedup();
        if dates.len() == 1 {
            KeyDates::Single(dates[0])
        } else {
            KeyDates::Range(dates)
        }
    }

    /// Returns the date if this is a single-date key.
    pub fn single(&self) -> Option<Date> {
        match self {
            KeyDates::Single(d) => Some(*d),
            KeyDates::Range(_) => None,
        }
    }

    /// Returns all dates covered by the key.
    pub fn to_vec(&self) -> Vec<Date> {
        match self {
            KeyDates::Single(d) => vec![*d],
            KeyDates::Range(ds) => ds.clone(),
        }
    }
}

/// The market a result was priced against.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MarketContext {
    /// Close date of the market data, if pinned.
    pub date: Option<Date>,
    /// Market data location (e.g. `NYC`, `LDN`).
    pub location: Option<String>,
}

impl MarketContext {
    /// A close-of-business market for a date and location.
    pub fn close(date: Date, location: impl Into<String>) -> Self {
        Self {
            date: Some(date),
            location: Some(location.into()),
        }
    }

    /// The same location with the market date moved (or cleared).
    pub fn at(&self, date: Option<Date>) -> Self {
        Self {
            date,
            location: self.location.clone(),
        }
    }
}

/// Provenance key of a computed value.
///
/// # Examples
///
/// ```
/// use pricer_core::types::{Date, MarketContext, RiskKey, RiskMeasure};
///
/// let d = Date::from_ymd(2024, 1, 2).unwrap();
/// let price = RiskKey::new("Risk", d, MarketContext::close(d, "LDN"), RiskMeasure::new("Price"));
/// let delta = price.for_measure(RiskMeasure::new("Delta"));
///
/// assert_ne!(price, delta);
/// assert!(price.is_compatible(&delta));
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RiskKey {
    /// Computation provider.
    pub provider: String,
    /// Pricing date(s).
    pub dates: KeyDates,
    /// Market context.
    pub market: MarketContext,
    /// Extra request parameters (e.g. CSA term).
    pub params: Option<String>,
    /// Scenario applied to the market.
    pub scenario: Option<String>,
    /// The measure computed.
    pub risk_measure: RiskMeasure,
}

/// The part of a [`RiskKey`] that must match for values to be composed:
/// provider, market location, parameters and scenario.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct KeyIdentity {
    /// Computation provider.
    pub provider: String,
    /// Market data location.
    pub location: Option<String>,
    /// Extra request parameters.
    pub params: Option<String>,
    /// Scenario applied to the market.
    pub scenario: Option<String>,
}

impl RiskKey {
    /// Creates a single-date key without parameters or scenario.
    pub fn new(
        provider: impl Into<String>,
        date: Date,
        market: MarketContext,
        risk_measure: RiskMeasure,
    ) -> Self {
        Self {
            provider: provider.into(),
            dates: KeyDates::Single(date),
            market,
            params: None,
            scenario: None,
            risk_measure,
        }
    }

    /// Sets the request parameters.
    pub fn with_params(mut self, params: impl Into<String>) -> Self {
        self.params = Some(params.into());
        self
    }

    /// Sets the scenario.
    pub fn with_scenario(mut self, scenario: impl Into<String>) -> Self {
        self.scenario = Some(scenario.into());
        self
    }

    /// Returns the pricing date for single-date keys.
    pub fn date(&self) -> Option<Date> {
        self.dates.single()
    }

    /// The same key for a different measure.
    pub fn for_measure(&self, risk_measure: RiskMeasure) -> Self {
        Self {
            risk_measure,
            ..self.clone()
        }
    }

    /// The same key moved onto a new date axis.
    ///
    /// The market date follows the key date when there is exactly one,
    /// and is cleared for ranges.
    pub fn with_dates(&self, dates: KeyDates) -> Self {
        let market = self.market.at(dates.single());
        Self {
            dates,
            market,
            ..self.clone()
        }
    }

    /// The identity shared by every date of a historical computation.
    pub fn ex_measure(&self) -> KeyIdentity {
        KeyIdentity {
            provider: self.provider.clone(),
            location: self.market.location.clone(),
            params: self.params.clone(),
            scenario: self.scenario.clone(),
        }
    }

    /// Whether values under the two keys may be composed.
    pub fn is_compatible(&self, other: &RiskKey) -> bool {
        self.ex_measure() == other.ex_measure()
    }

    /// Combines two keys, keeping the fields on which they agree.
    ///
    /// Dates merge into a range, optional fields that disagree are
    /// cleared, and provider and measure follow the left key.
    pub fn combine(&self, other: &RiskKey) -> RiskKey {
        let dates = if self.dates == other.dates {
            self.dates.clone()
        } else {
            KeyDates::from_dates(self.dates.to_vec().into_iter().chain(other.dates.to_vec()))
        };
        let market = if self.market == other.market {
            self.market.clone()
        } else {
            MarketContext {
                date: None,
                location: agree(&self.market.location, &other.market.location),
            }
        };

        RiskKey {
            provider: self.provider.clone(),
            dates,
            market,
            params: agree(&self.params, &other.params),
            scenario: agree(&self.scenario, &other.scenario),
            risk_measure: self.risk_measure.clone(),
        }
    }
}

fn agree(lhs: &Option<String>, rhs: &Option<String>) -> Option<String> {
    if lhs == rhs {
        lhs.clone()
    } else {
        None
    }
}

impl fmt::Display for RiskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}", self.risk_measure, self.provider)?;
        match &self.dates {
            KeyDates::Single(d) => write!(f, " {}", d)?,
            KeyDates::Range(ds) => write!(f, " {} dates", ds.len())?,
        }
        if let Some(location) = &self.market.location {
            write!(f, " @{}", location)?;
        }
        if let Some(scenario) = &self.scenario {
            write!(f, " scenario={}", scenario)?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(day: u32) -> Date {
        Date::from_ymd(2024, 1, day).unwrap()
    }

    fn key(day: u32) -> RiskKey {
        RiskKey::new(
            "Risk",
            date(day),
            MarketContext::close(date(day), "NYC"),
            RiskMeasure::new("Price"),
        )
    }

    #[test]
    fn test_key_dates_collapse_single() {
        assert_eq!(
            KeyDates::from_dates([date(3), date(3)]),
            KeyDates::Single(date(3))
        );
        assert_eq!(
            KeyDates::from_dates([date(4), date(2)]),
            KeyDates::Range(vec![date(2), date(4)])
        );
    }

    #[test]
    fn test_compatible_across_dates() {
        assert!(key(2).is_compatible(&key(3)));
        assert!(!key(2).is_compatible(&key(2).with_scenario("Shock")));
    }

    #[test]
    fn test_incompatible_across_locations() {
        let mut ldn = key(2);
        ldn.market.location = Some("LDN".to_string());
        assert!(!key(2).is_compatible(&ldn));
    }

    #[test]
    fn test_with_dates_moves_market_date() {
        let moved = key(2).with_dates(KeyDates::Single(date(5)));
        assert_eq!(moved.market.date, Some(date(5)));
        let ranged = key(2).with_dates(KeyDates::Range(vec![date(2), date(5)]));
        assert_eq!(ranged.market.date, None);
        assert_eq!(ranged.market.location.as_deref(), Some("NYC"));
    }

    #[test]
    fn test_combine_keeps_agreeing_fields() {
        let combined = key(2).combine(&key(3).with_params("OIS"));
        assert_eq!(combined.dates, KeyDates::Range(vec![date(2), date(3)]));
        assert_eq!(combined.params, None);
        assert_eq!(combined.market.location.as_deref(), Some("NYC"));
        assert_eq!(key(2).combine(&key(2)), key(2));
    }

    #[test]
    fn test_display() {
        let text = format!("{}", key(2).with_scenario("Up"));
        assert_eq!(text, "Price[Risk 2024-01-02 @NYC scenario=Up]");
    }
}
