//! Quoting Benchmarks - Per-Tick Domain Cost
//!
//! Benchmarks the pure functions every engine tick runs between its
//! exchange reads and writes: pricing, sizing, limiting, reconciling.
//!
//! Run with: cargo bench --bench quoting_bench

use std::time::Duration;

use chrono::{TimeDelta, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

use kalshi_mm_bot::domain::market::{Action, MarketSnapshot, Side};
use kalshi_mm_bot::domain::order::{InventoryState, Quote, RestingOrder};
use kalshi_mm_bot::domain::params::StrategyParameters;
use kalshi_mm_bot::domain::pricing::{AvellanedaStoikov, PricingModel};
use kalshi_mm_bot::domain::reconcile::OrderReconciler;
use kalshi_mm_bot::domain::risk::RiskLimiter;
use kalshi_mm_bot::domain::sizing::QuoteSizer;

fn snapshot() -> MarketSnapshot {
    MarketSnapshot {
        yes_bid: Some(0.40),
        yes_ask: Some(0.45),
        no_bid: Some(0.55),
        no_ask: Some(0.60),
    }
}

/// Benchmark Avellaneda-Stoikov reservation price + spread + snapping.
fn bench_avellaneda_price(c: &mut Criterion) {
    let model = AvellanedaStoikov::new(StrategyParameters::default()).unwrap();
    let book = snapshot();

    c.bench_function("avellaneda_price", |b| {
        b.iter(|| {
            let _prices = model.price(
                black_box(&book),
                black_box(InventoryState::new(25)),
                black_box(Duration::from_secs(600)),
            );
        });
    });
}

/// Benchmark sizing followed by the position limiter.
fn bench_size_and_bound(c: &mut Criterion) {
    let params = StrategyParameters {
        order_size: 5,
        ..Default::default()
    };
    let sizer = QuoteSizer::new(&params);
    let limiter = RiskLimiter::new(&params);
    let prices = AvellanedaStoikov::new(params)
        .unwrap()
        .price(&snapshot(), InventoryState::new(80), Duration::ZERO)
        .unwrap();

    c.bench_function("size_and_bound", |b| {
        b.iter(|| {
            let inventory = black_box(InventoryState::new(80));
            let desired = sizer.desired_quotes(&prices, inventory);
            let _bounded = limiter.bound(&desired, inventory);
        });
    });
}

/// Benchmark reconciling two quotes against a cluttered book.
fn bench_reconcile(c: &mut Criterion) {
    let reconciler = OrderReconciler::new(300);
    let now = Utc::now();
    let desired = [
        Quote::new(Side::Yes, Action::Buy, 0.41, 1),
        Quote::new(Side::Yes, Action::Sell, 0.44, 1),
    ];
    let resting: Vec<RestingOrder> = (0..8)
        .map(|i| RestingOrder {
            order_id: format!("o{i}"),
            side: Side::Yes,
            action: if i % 2 == 0 { Action::Buy } else { Action::Sell },
            price: 0.38 + f64::from(i) * 0.01,
            size: 1,
            created_at: Some(now - TimeDelta::seconds(i64::from(i) * 60)),
            expires_at: None,
        })
        .collect();

    c.bench_function("reconcile_8_resting", |b| {
        b.iter(|| {
            let _plan = reconciler.reconcile(black_box(&desired), black_box(&resting), now);
        });
    });
}

criterion_group!(
    benches,
    bench_avellaneda_price,
    bench_size_and_bound,
    bench_reconcile,
);
criterion_main!(benches);
