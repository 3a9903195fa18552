//! Instruments as seen by the result engine.
//!
//! Valuation is the pricing service's business; here an instrument is a
//! kind, an optional name and a bag of properties, plus a record of the
//! context it was resolved in.

use std::fmt;

use indexmap::IndexMap;

use crate::context::ContextId;

/// A property value.
#[derive(Clone, Debug, PartialEq)]
pub enum PropertyValue {
    /// Numeric property (notional, strike, ...).
    Number(f64),
    /// Text property (currency, tenor, ...).
    Text(String),
}

impl From<f64> for PropertyValue {
    fn from(v: f64) -> Self {
        PropertyValue::Number(v)
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        PropertyValue::Text(s.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        PropertyValue::Text(s)
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Number(v) => write!(f, "{}", v),
            PropertyValue::Text(s) => write!(f, "{}", s),
        }
    }
}

#[derive(Clone, Debug)]
struct Resolution {
    unresolved: Box<Instrument>,
    context: ContextId,
}

/// A priceable instrument.
///
/// Resolving an instrument under a pricing context yields a new instrument
/// that remembers its unresolved original and the context's token. The
/// two compare unequal but address the same position in a portfolio.
///
/// # Examples
///
/// ```
/// use indexmap::IndexMap;
/// use pricer_risk::portfolio::Instrument;
///
/// let swap = Instrument::new("IRSwap")
///     .with_name("5y")
///     .with_property("notional", 1e8)
///     .with_property("termination_date", "5y");
///
/// assert_eq!(swap.name(), Some("5y"));
/// assert!(!swap.is_resolved());
/// assert_eq!(swap.property("notional").map(|p| p.to_string()), Some("100000000".to_string()));
/// ```
#[derive(Clone, Debug)]
pub struct Instrument {
    kind: String,
    name: Option<String>,
    properties: IndexMap<String, PropertyValue>,
    resolution: Option<Resolution>,
}

impl Instrument {
    /// An unnamed instrument of a kind.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: None,
            properties: IndexMap::new(),
            resolution: None,
        }
    }

    /// Sets the name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets a property.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Instrument kind, e.g. `IRSwap`.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Name, if set.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// One property.
    pub fn property(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }

    /// All properties in insertion order.
    pub fn properties(&self) -> &IndexMap<String, PropertyValue> {
        &self.properties
    }

    /// Whether this instrument came from resolving another.
    pub fn is_resolved(&self) -> bool {
        self.resolution.is_some()
    }

    /// The instrument this one was resolved from.
    pub fn unresolved(&self) -> Option<&Instrument> {
        self.resolution.as_ref().map(|r| r.unresolved.as_ref())
    }

    /// The context this instrument was resolved in.
    pub fn resolution_context(&self) -> Option<ContextId> {
        self.resolution.as_ref().map(|r| r.context)
    }

    /// A copy resolved under `context`, with `properties` filled in.
    ///
    /// Resolving an already-resolved instrument keeps the original
    /// unresolved instrument.
    pub fn resolved_in(&self, context: ContextId, properties: IndexMap<String, PropertyValue>) -> Instrument {
        let unresolved = self.unresolved().unwrap_or(self).clone();
        let mut resolved = Instrument {
            resolution: Some(Resolution {
                unresolved: Box::new(unresolved),
                context,
            }),
            ..self.clone()
        };
        resolved.properties.extend(properties);
        resolved
    }

    /// Whether `key` is this instrument or the one it was resolved from.
    pub fn matches(&self, key: &Instrument) -> bool {
        self == key || self.unresolved() == Some(key)
    }

    /// The name, or `<kind>_<position>` when unnamed.
    pub fn display_name(&self, position: usize) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("{}_{}", self.kind, position),
        }
    }
}

impl PartialEq for Instrument {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.name == other.name
            && self.properties == other.properties
            && self.resolution_context() == other.resolution_context()
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{}", name),
            None => write!(f, "{}", self.kind),
        }
    }
}
