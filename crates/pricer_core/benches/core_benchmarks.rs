//! Criterion benchmarks for the pricer_core result algebra.
//!
//! Measures series composition, historical concatenation and bucketed
//! risk aggregation across different sizes to characterise scaling.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use pricer_core::results::{aggregate_risk, combine_dated, compose, ResultValue, TableRow};
use pricer_core::types::{Date, KeyDates, MarketContext, RiskKey, RiskMeasure};

fn base() -> Date {
    Date::from_ymd(2020, 1, 1).unwrap()
}

fn key(measure: &str) -> RiskKey {
    RiskKey::new(
        "Risk",
        base(),
        MarketContext::close(base(), "NYC"),
        RiskMeasure::new(measure),
    )
}

/// Generate a daily series of `n` points starting `offset` days after base.
fn generate_series(n: usize, offset: i64) -> ResultValue {
    ResultValue::series(
        key("Price"),
        (0..n as i64).map(|i| (base().add_days(offset + i), (i as f64).sin())),
    )
}

/// Generate a bucketed delta ladder with `n` tenors.
fn generate_ladder(n: usize, scale: f64) -> ResultValue {
    ResultValue::table(
        key("IRDelta"),
        (1..=n)
            .map(|i| {
                TableRow::new(
                    [("mkt_type", "IR".to_string()), ("mkt_point", format!("{}m", i))],
                    scale * i as f64,
                )
            })
            .collect(),
    )
}

/// Benchmark overlapping series composition.
fn bench_series_compose(c: &mut Criterion) {
    let mut group = c.benchmark_group("series_compose");

    for size in [100, 1000, 10000] {
        let lhs = generate_series(size, 0);
        let rhs = generate_series(size, size as i64 / 2);
        group.bench_with_input(
            BenchmarkId::new("half_overlap", size),
            &(&lhs, &rhs),
            |b, (lhs, rhs)| {
                b.iter(|| compose(black_box(lhs), black_box(rhs)).unwrap());
            },
        );
    }

    group.finish();
}

/// Benchmark concatenating per-date scalars into a series.
fn bench_combine_dated(c: &mut Criterion) {
    let mut group = c.benchmark_group("combine_dated");

    for size in [10, 100, 500] {
        let scalars: Vec<ResultValue> = (0..size as i64)
            .map(|i| {
                let date = base().add_days(i);
                ResultValue::scalar(key("Price").with_dates(KeyDates::Single(date)), i as f64)
            })
            .collect();
        group.bench_with_input(BenchmarkId::new("scalars", size), &scalars, |b, scalars| {
            b.iter(|| combine_dated(black_box(scalars)).unwrap());
        });
    }

    group.finish();
}

/// Benchmark bucketed risk aggregation across many trades.
fn bench_aggregate_risk(c: &mut Criterion) {
    let mut group = c.benchmark_group("aggregate_risk");

    for trades in [10, 100, 1000] {
        let ladders: Vec<ResultValue> = (0..trades)
            .map(|t| generate_ladder(40, 1.0 + t as f64))
            .collect();
        group.bench_with_input(
            BenchmarkId::new("ladder_40", trades),
            &ladders,
            |b, ladders| {
                b.iter(|| aggregate_risk(black_box(ladders), Some(1e-6)).unwrap());
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_series_compose,
    bench_combine_dated,
    bench_aggregate_risk
);
criterion_main!(benches);
