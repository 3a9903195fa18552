//! Futures over in-flight risk calculations.
//!
//! This module provides:
//! - `pricing_future`: The single-assignment [`PricingFuture`] handle
//! - `risk_result`: [`RiskResult`], what a future resolves to
//! - `composite`: Futures over a fixed set of children with an [`Aggregation`] strategy
//! - `multi_measure`: Per-measure futures and results for one instrument

pub mod composite;
pub mod multi_measure;
pub mod pricing_future;
pub mod risk_result;

pub use composite::{composite, Aggregation, Combiner};
pub(crate) use composite::owning_composite;
pub use multi_measure::{MultipleRiskMeasureFuture, MultipleRiskMeasureResult, RISK_MEASURE_COLUMN};
pub use pricing_future::{Operand, Outcome, PricingFuture};
pub use risk_result::RiskResult;
