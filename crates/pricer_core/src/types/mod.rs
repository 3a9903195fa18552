//! Identity, time, and error types.
//!
//! This module provides:
//! - `time`: The `Date` type and tenor ordering
//! - `measure`: `RiskMeasure` identifiers
//! - `key`: Provenance keys (`RiskKey`, `KeyDates`, `MarketContext`, `KeyIdentity`)
//! - `error`: Structured error types for composition, dates and frames

pub mod error;
pub mod key;
pub mod measure;
pub mod time;

// Re-export commonly used types at module level
pub use error::{CompositionError, DateError, FrameError};
pub use key::{KeyDates, KeyIdentity, MarketContext, RiskKey};
pub use measure::RiskMeasure;
pub use time::{tenor_sort_key, Date};
