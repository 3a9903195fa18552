//! # pricer_core: Result Values and Composition Algebra
//!
//! ## Layer 1 (Foundation) Role
//!
//! pricer_core is the bottom layer of the risk result stack, providing:
//! - Time and identity types: `Date`, `RiskMeasure`, `RiskKey`, `MarketContext` (`types`)
//! - The computed value union `ResultValue` with scalar, series, table and error variants (`results`)
//! - The composition algebra `compose`, `compose_measures`, `combine_dated` (`results::compose`)
//! - Aggregation of homogeneous results (`results::aggregate`)
//! - A small tabular type with pivoting for flattened reports (`frame`)
//! - Error types: `CompositionError`, `DateError`, `FrameError` (`types::error`)
//!
//! ## Zero Dependency Principle
//!
//! Layer 1 has no dependencies on other pricer_* crates, with minimal external dependencies:
//! - chrono: Date arithmetic
//! - indexmap: Insertion-ordered maps for labels and per-measure results
//! - thiserror: Error derivation
//! - serde: Serialisation support (optional)
//!
//! ## Usage Examples
//!
//! ```rust
//! use pricer_core::results::{compose, ResultValue};
//! use pricer_core::types::{Date, MarketContext, RiskKey, RiskMeasure};
//!
//! let d1 = Date::from_ymd(2024, 1, 2).unwrap();
//! let d2 = Date::from_ymd(2024, 1, 3).unwrap();
//! let key = |d| RiskKey::new("Risk", d, MarketContext::close(d, "NYC"), RiskMeasure::new("Price"));
//!
//! let lhs = ResultValue::series(key(d1), [(d1, 1.0), (d2, 2.0)]);
//! let rhs = ResultValue::series(key(d2), [(d2, 5.0)]);
//!
//! // The right-hand operand wins on overlapping dates
//! let composed = compose(&lhs, &rhs).unwrap();
//! assert_eq!(composed.for_date(d2).unwrap().as_f64(), Some(5.0));
//! ```
//!
//! ## Feature Flags
//!
//! - `serde`: Enable serialisation for dates, keys, values and frames

#![warn(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]

pub mod frame;
pub mod results;
pub mod types;
