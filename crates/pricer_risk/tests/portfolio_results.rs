//! Integration tests for portfolio result trees.
//!
//! These tests drive whole calculations through a pricing context: mock
//! pricers, nested portfolios, historical ranges, tree arithmetic and
//! flattening.

use std::sync::Arc;
use std::time::Duration;

use approx::assert_relative_eq;
use indexmap::IndexMap;
use pricer_core::results::ResultValue;
use pricer_core::types::{Date, RiskMeasure};
use pricer_risk::context::{
    InlinePricingService, PricingContext, PricingService, RiskRequest, ThreadPoolPricingService,
};
use pricer_risk::future::PricingFuture;
use pricer_risk::portfolio::{Instrument, Portfolio, PortfolioPath, Priceable, PriceableKey, PropertyValue};
use pricer_risk::results::{FrameSpec, PortfolioRiskResult};
use pricer_risk::{RiskConfig, RiskError, RiskResult};

fn date(day: u32) -> Date {
    Date::from_ymd(2024, 3, day).unwrap()
}

fn price() -> RiskMeasure {
    RiskMeasure::new("Price")
}

fn delta() -> RiskMeasure {
    RiskMeasure::new("Delta")
}

/// Prices an instrument at its `mock_price` property.
fn mock_pricer(request: &RiskRequest) -> Result<ResultValue, String> {
    let value = match request.instrument.property("mock_price") {
        Some(PropertyValue::Number(v)) => *v,
        _ => return Err(format!("no mock price for {}", request.instrument)),
    };
    let value = if request.key.risk_measure == delta() { value / 1e4 } else { value };
    Ok(ResultValue::scalar(request.key.clone(), value))
}

fn swap(name: &str, mock_price: f64) -> Instrument {
    Instrument::new("IRSwap")
        .with_name(name)
        .with_property("mock_price", mock_price)
}

fn swaps() -> Portfolio {
    Portfolio::named(
        "swaps",
        [
            swap("swap_5y", 6407332.0),
            swap("swap_7y", 5423405.0),
            swap("swap_10y", 4439478.0),
        ],
    )
}

fn context() -> PricingContext {
    PricingContext::new(date(4), Arc::new(InlinePricingService::new(mock_pricer))).with_location("NYC")
}

/// Hands out futures that only resolve if the test resolves them.
struct PendingService;

impl PricingService for PendingService {
    fn submit(&self, _request: RiskRequest) -> PricingFuture {
        PricingFuture::new()
    }
}

/// Fails outright on one date, prices at 1.0 otherwise.
struct BrokenOn(Date);

impl PricingService for BrokenOn {
    fn submit(&self, request: RiskRequest) -> PricingFuture {
        let future = PricingFuture::new();
        if request.key.date() == Some(self.0) {
            future.set_failure("transport closed").unwrap();
        } else {
            future.set_value(ResultValue::scalar(request.key, 1.0)).unwrap();
        }
        future
    }
}

// ============================================================================
// Lookup and aggregation
// ============================================================================

#[test]
fn test_aggregate_and_lookup_three_swaps() {
    let tree = swaps().calc(&[price()], &context()).unwrap();

    // 6407332 + 5423405 + 4439478 is exactly 16270215.
    let total = tree.aggregate(false).unwrap().as_f64().unwrap();
    assert_relative_eq!(total.round(), 16270215.0);

    assert_eq!(tree.index("swap_10y").unwrap().as_f64(), Some(4439478.0));
    assert_eq!(tree.index(0usize).unwrap().as_f64(), Some(6407332.0));
    assert_eq!(tree.index(PortfolioPath::new(1)).unwrap().as_f64(), Some(5423405.0));
    assert_eq!(tree.index(&swap("swap_7y", 5423405.0)).unwrap().as_f64(), Some(5423405.0));
}

#[test]
fn test_resolved_instrument_finds_its_entry() {
    let ctx = context();
    let five = swap("swap_5y", 6407332.0);
    let tree = swaps().calc(&[price()], &ctx).unwrap();

    let properties = IndexMap::from([("fixed_rate".to_string(), PropertyValue::from(0.01))]);
    let resolved = ctx.resolve(&five, properties.clone());
    assert_ne!(resolved, five);

    assert_eq!(tree.index(&resolved).unwrap().as_f64(), Some(6407332.0));
    assert_eq!(tree.index(&five).unwrap().as_f64(), Some(6407332.0));
    assert!(tree.contains_key(&PriceableKey::from(&resolved)));

    let elsewhere = context().resolve(&five, properties);
    assert!(matches!(tree.index(&elsewhere), Err(RiskError::StaleResolution(_))));
    assert!(!tree.contains_key(&PriceableKey::from(&elsewhere)));
}

#[test]
fn test_unknown_keys_are_rejected() {
    let tree = swaps().calc(&[price()], &context()).unwrap();
    assert!(matches!(tree.index("swap_30y"), Err(RiskError::KeyNotFound(_))));
    assert!(matches!(tree.index(7usize), Err(RiskError::KeyNotFound(_))));
}

#[test]
fn test_nested_lookup_and_aggregate() {
    let book = Portfolio::named(
        "book",
        vec![
            Priceable::from(swap("outer", 10.0)),
            Portfolio::named("rates", [swap("inner_a", 20.0), swap("inner_b", 30.0)]).into(),
        ],
    );
    let tree = book.calc(&[price()], &context()).unwrap();

    assert_eq!(tree.len(), 2);
    assert_eq!(tree.index("inner_b").unwrap().as_f64(), Some(30.0));
    assert_eq!(tree.index(PortfolioPath::from(vec![1, 0])).unwrap().as_f64(), Some(20.0));

    let rates = tree.index("rates").unwrap();
    let rates = rates.as_portfolio().unwrap();
    assert_eq!(rates.aggregate(false).unwrap().as_f64(), Some(50.0));
    assert_eq!(tree.aggregate(false).unwrap().as_f64(), Some(60.0));
}

#[test]
fn test_failed_pricing_surfaces_as_error_value() {
    let book = Portfolio::new([swap("priced", 1.0), Instrument::new("IRSwap").with_name("unpriced")]);
    let tree = book.calc(&[price()], &context()).unwrap();

    let unpriced = tree.index("unpriced").unwrap().into_result().unwrap();
    assert!(unpriced.as_value().unwrap().is_error());
    assert!(matches!(tree.aggregate(false), Err(RiskError::Composition(_))));
}

// ============================================================================
// Historical results
// ============================================================================

#[test]
fn test_historical_error_leaf_resolves_to_error() {
    let service = Arc::new(InlinePricingService::new(|request: &RiskRequest| {
        if request.key.date() == Some(date(5)) {
            Err("market data missing".to_string())
        } else {
            Ok(ResultValue::scalar(request.key.clone(), 1.0))
        }
    }));
    let context = PricingContext::historical([date(4), date(5), date(6)], service).with_location("NYC");

    let future = context.calc(&swap("swap_5y", 1.0), &price());
    let result = future.result(Some(Duration::from_secs(5))).unwrap();
    let value = result.as_value().unwrap();
    assert!(value.is_error());
    assert_eq!(value.to_string(), "Error: market data missing");
}

#[test]
fn test_historical_outright_failure_is_stored() {
    let context = PricingContext::historical([date(4), date(5), date(6)], Arc::new(BrokenOn(date(5))))
        .with_location("NYC");
    let tree = swaps().calc(&[price()], &context).unwrap();

    let leaf = tree.index("swap_7y").unwrap().into_result().unwrap();
    let value = leaf.as_value().unwrap();
    assert!(value.is_error());
    assert!(value.to_string().contains("transport closed"));
    assert!(tree.result(Some(Duration::from_secs(5))).is_ok());
}

#[test]
fn test_historical_tree_indexes_by_date() {
    let context = PricingContext::historical([date(4), date(5), date(6)], Arc::new(InlinePricingService::new(mock_pricer)))
        .with_location("NYC");
    let tree = swaps().calc(&[price()], &context).unwrap();

    assert_eq!(tree.dates(None).unwrap(), vec![date(4), date(5), date(6)]);
    let on_fifth = tree.index(date(5)).unwrap();
    assert_eq!(on_fifth.index("swap_7y").unwrap().as_f64(), Some(5423405.0));

    let window = tree.index(vec![date(5), date(6)]).unwrap();
    let window = window.as_portfolio().unwrap();
    assert_eq!(window.dates(None).unwrap(), vec![date(5), date(6)]);
}

// ============================================================================
// Tree arithmetic
// ============================================================================

#[test]
fn test_disjoint_instruments_add_side_by_side() {
    let lhs_book = Portfolio::new([swap("a", 1.0), swap("b", 2.0)]);
    let rhs_book = Portfolio::new([swap("c", 3.0), swap("d", 4.0), swap("e", 5.0)]);
    let ctx = context();
    let lhs = lhs_book.calc(&[price()], &ctx).unwrap();
    let rhs = rhs_book.calc(&[price()], &ctx).unwrap();

    let sum = lhs.add(&rhs).unwrap();
    assert_eq!(sum.len(), lhs.len() + rhs.len());
    for (name, expected) in [("a", 1.0), ("b", 2.0), ("c", 3.0), ("d", 4.0), ("e", 5.0)] {
        assert_eq!(sum.index(name).unwrap().as_f64(), Some(expected), "{}", name);
    }
}

#[test]
fn test_disjoint_measures_merge_per_instrument() {
    let ctx = context();
    let prices = swaps().calc(&[price()], &ctx).unwrap();
    let deltas = swaps().calc(&[delta()], &ctx).unwrap();

    let both = prices.add(&deltas).unwrap();
    assert_eq!(both.len(), 3);
    assert_eq!(both.risk_measures(), &[price(), delta()]);

    let totals = both.aggregate(false).unwrap();
    let totals = totals.as_measures().unwrap();
    assert_relative_eq!(totals.get(&price()).unwrap().as_f64().unwrap(), 16270215.0, epsilon = 1e-6);
    assert_relative_eq!(totals.get(&delta()).unwrap().as_f64().unwrap(), 1627.0215, epsilon = 1e-6);

    let only_delta = both.index(delta()).unwrap();
    assert_relative_eq!(only_delta.index("swap_5y").unwrap().as_f64().unwrap(), 640.7332, epsilon = 1e-9);
}

#[test]
fn test_overlapping_trees_fail() {
    let ctx = context();
    let tree = swaps().calc(&[price()], &ctx).unwrap();
    let again = swaps().calc(&[price(), delta()], &ctx).unwrap();
    assert_eq!(tree.add(&again).unwrap_err(), RiskError::Overlap);
}

#[test]
fn test_number_broadcast_leaves_original() {
    let tree = swaps().calc(&[price()], &context()).unwrap();
    let scaled = &tree * 2.0;
    assert_eq!(scaled.index("swap_5y").unwrap().as_f64(), Some(12814664.0));
    assert_eq!(tree.index("swap_5y").unwrap().as_f64(), Some(6407332.0));
}

// ============================================================================
// Concurrency
// ============================================================================

#[test]
fn test_thread_pool_service_prices_large_book() {
    let config = RiskConfig {
        worker_threads: 4,
        ..RiskConfig::default()
    };
    let service = ThreadPoolPricingService::from_config(&config, mock_pricer).unwrap();
    let context = PricingContext::new(date(4), Arc::new(service)).with_location("NYC");
    let book = Portfolio::new((0..200).map(|i| swap(&format!("swap_{}", i), i as f64)));

    let tree = book.calc(&[price(), delta()], &context).unwrap();
    let resolved = tree.result(Some(Duration::from_secs(30))).unwrap();
    assert!(resolved.done());

    let totals = tree.aggregate_with(&config).unwrap();
    let expected: f64 = (0..200).map(f64::from).sum();
    assert_relative_eq!(totals.as_measures().unwrap().get(&price()).unwrap().as_f64().unwrap(), expected);
}

#[test]
fn test_cancel_spares_leaves_shared_with_another_tree() {
    let context = PricingContext::new(date(4), Arc::new(PendingService)).with_location("NYC");
    let tree = swaps().calc(&[price()], &context).unwrap();
    let sharing = PortfolioRiskResult::new(
        tree.portfolio().clone(),
        tree.risk_measures().to_vec(),
        tree.nodes().to_vec(),
    )
    .unwrap();
    let leaves: Vec<PricingFuture> = tree.nodes().iter().map(|n| n.future()).collect();

    assert!(tree.cancel());
    assert!(leaves.iter().all(|leaf| !leaf.done()));
    assert!(!sharing.done());

    assert!(sharing.cancel());
    assert!(leaves.iter().all(PricingFuture::is_cancelled));
}

#[test]
fn test_cancelling_a_sum_keeps_its_operands() {
    let a = PricingFuture::new();
    let b = PricingFuture::new();
    let sum = a.add(b.clone());

    assert!(sum.cancel());
    assert!(!a.is_cancelled());
    assert!(!b.is_cancelled());
}

#[test]
fn test_waiting_inside_own_context_is_rejected() {
    let context = context();
    let guard = context.enter();
    let future = context.calc(&swap("a", 1.0), &price());
    assert_eq!(future.result(None).unwrap_err(), RiskError::Reentrant);
    drop(guard);
    assert_eq!(future.result(None).unwrap().as_f64(), Some(1.0));
}

// ============================================================================
// Frames
// ============================================================================

#[test]
fn test_portfolio_frame_round_trip() {
    let book = Portfolio::named(
        "book",
        vec![
            Priceable::from(swap("outer", 10.0)),
            Portfolio::named("rates", [swap("inner_a", 20.0), Instrument::new("IRCap")]).into(),
        ],
    );
    let rebuilt = Portfolio::from_frame(&book.to_frame()).unwrap();
    let before: Vec<Instrument> = book.all_instruments().into_iter().cloned().collect();
    let after: Vec<Instrument> = rebuilt.all_instruments().into_iter().cloned().collect();
    assert_eq!(before, after);
}

#[test]
fn test_tree_frame_lists_every_value() {
    let tree = swaps().calc(&[price(), delta()], &context()).unwrap();
    let view = tree.to_frame(&FrameSpec::Raw).unwrap();
    let frame = view.as_raw().unwrap();
    assert_eq!(frame.len(), 6);
    assert_eq!(frame.columns()[..2], ["instrument_name".to_string(), "risk_measure".to_string()]);

    let leaf = tree.index("swap_5y").unwrap().into_result().unwrap();
    assert!(matches!(leaf, RiskResult::Measures(_)));
}
