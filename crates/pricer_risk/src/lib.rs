//! # Pricer Risk (L4: Application)
//!
//! Asynchronous portfolio risk results.
//!
//! This crate provides:
//! - Single-assignment futures over in-flight calculations, composable
//!   before they resolve
//! - Composite futures for sequences, per-measure sets and historical
//!   date ranges
//! - Pricing contexts that batch requests and guard against waiting on
//!   their own results
//! - Portfolios of instruments with path addressing
//! - Result trees mirroring a portfolio, indexable by measure, date,
//!   instrument, name, position or path
//! - Tree arithmetic, aggregation and flattening into frames
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │            pricer_risk (L4)             │
//! ├─────────────────────────────────────────┤
//! │  context/   - PricingContext, batching,│
//! │               pricing services          │
//! │  future/    - PricingFuture, composite,│
//! │               multi-measure futures     │
//! │  portfolio/ - Instrument, Portfolio,   │
//! │               PortfolioPath             │
//! │  results/   - PortfolioRiskResult,     │
//! │               indexing, algebra, frames │
//! └─────────────────────────────────────────┘
//!          ↓
//! ┌─────────────────────────────────────────┐
//! │            pricer_core (L1)            │
//! │  ResultValue, composition, aggregation │
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## Concurrency
//!
//! - Futures resolve on whichever thread completes them; callbacks run
//!   on that thread
//! - Composite futures synthesise exactly once, when the last child
//!   resolves
//! - `ThreadPoolPricingService` prices requests on a Rayon pool
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use pricer_core::results::ResultValue;
//! use pricer_core::types::{Date, RiskMeasure};
//! use pricer_risk::context::{InlinePricingService, PricingContext};
//! use pricer_risk::portfolio::{Instrument, Portfolio, Priceable};
//!
//! let service = Arc::new(InlinePricingService::new(|req| {
//!     Ok(ResultValue::scalar(req.key.clone(), 100.0))
//! }));
//! let context = PricingContext::new(Date::from_ymd(2024, 1, 2).unwrap(), service);
//!
//! let book = Portfolio::named("book", vec![
//!     Priceable::from(Instrument::new("IRSwap").with_name("5y")),
//!     Portfolio::named("fx", [Instrument::new("FXForward").with_name("eurusd")]).into(),
//! ]);
//! let price = RiskMeasure::new("Price");
//! let tree = book.calc(&[price.clone()], &context).unwrap();
//!
//! assert_eq!(tree.index("eurusd").unwrap().as_f64(), Some(100.0));
//! assert_eq!(tree.aggregate(false).unwrap().as_f64(), Some(200.0));
//! ```

#![warn(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]

pub mod config;
pub mod context;
pub mod error;
pub mod future;
pub mod portfolio;
pub mod results;

// Re-export commonly used types
pub use config::{ConfigError, RiskConfig, DEFAULT_MISSING_MARKER};
pub use context::{ContextGuard, ContextId, InlinePricingService, PricingContext, PricingService, RiskRequest, ThreadPoolPricingService};
pub use error::RiskError;
pub use future::{composite, Aggregation, MultipleRiskMeasureFuture, MultipleRiskMeasureResult, PricingFuture, RiskResult};
pub use portfolio::{Instrument, Portfolio, PortfolioPath, Priceable, PriceableKey, PropertyValue};
pub use results::{FrameSpec, FrameView, Indexed, PortfolioRiskResult, ResultIndex, ResultNode};
