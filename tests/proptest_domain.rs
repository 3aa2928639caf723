//! Property-Based Tests - Domain Invariants
//!
//! Uses proptest to verify pricing, limiting and reconciliation
//! invariants hold across random parameter, book and inventory inputs.

use std::time::Duration;

use chrono::{TimeDelta, Utc};
use proptest::prelude::*;

use kalshi_mm_bot::domain::market::{Action, MAX_PRICE, MIN_PRICE, MarketSnapshot, Side, cents_to_price};
use kalshi_mm_bot::domain::order::{InventoryState, Quote, RestingOrder};
use kalshi_mm_bot::domain::params::StrategyParameters;
use kalshi_mm_bot::domain::pricing::{AvellanedaStoikov, PricingModelKind, build_model};
use kalshi_mm_bot::domain::reconcile::OrderReconciler;
use kalshi_mm_bot::domain::risk::RiskLimiter;
use kalshi_mm_bot::domain::sizing::QuoteSizer;

const EPS: f64 = 1e-9;

fn on_grid(price: f64) -> bool {
    ((price * 100.0).round() - price * 100.0).abs() < 1e-6
}

fn arb_params() -> impl Strategy<Value = StrategyParameters> {
    (
        0.01f64..5.0,
        0.1f64..100.0,
        0.0f64..2.0,
        1.0f64..10_000.0,
        10u32..500,
        0.0f64..0.2,
        0.0f64..0.5,
        0.0f64..0.05,
        1u32..20,
    )
        .prop_map(
            |(gamma, k, sigma, horizon_secs, max_position, min_spread, buffer, skew, order_size)| {
                StrategyParameters {
                    gamma,
                    k,
                    sigma,
                    horizon_secs,
                    max_position,
                    min_spread,
                    position_limit_buffer: buffer,
                    inventory_skew_factor: skew,
                    order_size,
                    ..Default::default()
                }
            },
        )
}

/// Two-sided YES book in whole cents with its NO complement.
fn arb_book() -> impl Strategy<Value = MarketSnapshot> {
    (1i64..99)
        .prop_flat_map(|bid| (Just(bid), (bid + 1)..=99))
        .prop_map(|(bid, ask)| {
            MarketSnapshot::from_cents(Some(bid), Some(ask), Some(100 - ask), Some(100 - bid))
        })
}

fn arb_kind() -> impl Strategy<Value = PricingModelKind> {
    prop_oneof![
        Just(PricingModelKind::Avellaneda),
        Just(PricingModelKind::FixedSpread),
        Just(PricingModelKind::PennyJump),
    ]
}

fn arb_quote(action: Action) -> impl Strategy<Value = Quote> {
    (1i64..=99, 1u32..5).prop_map(move |(cents, size)| {
        Quote::new(Side::Yes, action, cents_to_price(cents), size)
    })
}

fn arb_resting() -> impl Strategy<Value = Vec<RestingOrder>> {
    prop::collection::vec(
        (
            prop::bool::ANY,
            prop::bool::ANY,
            1i64..=99,
            1u32..5,
            0i64..600,
        ),
        0..5,
    )
    .prop_map(|rows| {
        let now = Utc::now();
        rows.into_iter()
            .enumerate()
            .map(|(i, (yes, buy, cents, size, age))| RestingOrder {
                order_id: format!("r{i}"),
                side: if yes { Side::Yes } else { Side::No },
                action: if buy { Action::Buy } else { Action::Sell },
                price: cents_to_price(cents),
                size,
                created_at: Some(now - TimeDelta::seconds(age)),
                expires_at: None,
            })
            .collect()
    })
}

// ── Pricing Invariants ──

proptest! {
    #[test]
    fn quotes_are_ordered_on_grid_and_in_range(
        params in arb_params(),
        book in arb_book(),
        kind in arb_kind(),
        position in -300i64..300,
        elapsed in 0u64..20_000,
    ) {
        let model = build_model(kind, params.clone()).unwrap();
        let Ok(prices) = model.price(
            &book,
            InventoryState::new(position),
            Duration::from_secs(elapsed),
        ) else {
            // PennyJump may decline a tight book.
            return Ok(());
        };

        prop_assert!(prices.bid <= prices.reservation_price + EPS);
        prop_assert!(prices.reservation_price <= prices.ask + EPS);
        prop_assert!(prices.bid < prices.ask);
        prop_assert!(prices.ask - prices.bid >= params.min_spread - EPS);
        prop_assert!(prices.bid >= MIN_PRICE - EPS && prices.ask <= MAX_PRICE + EPS);
        prop_assert!(on_grid(prices.bid) && on_grid(prices.ask));
    }

    #[test]
    fn spread_never_below_floor(params in arb_params(), elapsed in 0.0f64..20_000.0) {
        let model = AvellanedaStoikov::new(params.clone()).unwrap();
        let spread = model.optimal_spread(elapsed);
        prop_assert!(spread > 0.0);
        prop_assert!(spread >= params.min_spread);
    }

    #[test]
    fn reservation_price_falls_strictly_as_inventory_rises(
        params in arb_params(),
        sigma in 0.01f64..2.0,
        mid in 0.02f64..0.98,
        q in -200i64..200,
        extra in 1i64..100,
        elapsed_fraction in 0.0f64..0.99,
    ) {
        let params = StrategyParameters { sigma, ..params };
        let elapsed = params.horizon_secs * elapsed_fraction;
        let model = AvellanedaStoikov::new(params).unwrap();
        let lower = model.reservation_price(mid, q, elapsed);
        let higher = model.reservation_price(mid, q + extra, elapsed);
        prop_assert!(higher < lower);
    }

    #[test]
    fn flat_inventory_reserves_at_mid(params in arb_params(), mid in 0.02f64..0.98, elapsed in 0.0f64..5_000.0) {
        let model = AvellanedaStoikov::new(params).unwrap();
        prop_assert!((model.reservation_price(mid, 0, elapsed) - mid).abs() < EPS);
    }
}

// ── Sizing and Limits ──

proptest! {
    #[test]
    fn sizes_are_at_least_one_contract(params in arb_params(), position in -1_000i64..1_000) {
        let sizes = QuoteSizer::new(&params).sizes(InventoryState::new(position));
        prop_assert!(sizes.buy >= 1);
        prop_assert!(sizes.sell >= 1);
    }

    #[test]
    fn limiter_never_breaches_position_limit(
        params in arb_params(),
        position in -600i64..600,
        buy in arb_quote(Action::Buy),
        sell in arb_quote(Action::Sell),
    ) {
        let limiter = RiskLimiter::new(&params);
        let limit = limiter.limit();
        let inventory = InventoryState::new(position);
        let bounded = limiter.bound(&[buy, sell], inventory);

        for quote in &bounded {
            let original = if quote.action == Action::Buy { buy } else { sell };
            prop_assert!(quote.size >= 1);
            prop_assert!(quote.size <= original.size);
            prop_assert_eq!(quote.price, original.price);

            let after = match quote.action {
                Action::Buy => position + i64::from(quote.size),
                Action::Sell => position - i64::from(quote.size),
            };
            prop_assert!((after as f64).abs() <= limit + EPS || (after as f64).abs() < (position as f64).abs());
        }
        if position as f64 >= limit {
            prop_assert!(bounded.iter().all(|q| q.action != Action::Buy));
        }
        if position as f64 <= -limit {
            prop_assert!(bounded.iter().all(|q| q.action != Action::Sell));
        }
    }
}

// ── Reconciliation ──

proptest! {
    #[test]
    fn reconcile_is_idempotent(
        buy in arb_quote(Action::Buy),
        sell in arb_quote(Action::Sell),
        resting in arb_resting(),
        expiration in 1u64..600,
    ) {
        let reconciler = OrderReconciler::new(expiration);
        let now = Utc::now();
        let desired = [buy, sell];
        let plan = reconciler.reconcile(&desired, &resting, now);

        // Every resting order is either kept or cancelled, never both.
        prop_assert_eq!(plan.kept.len() + plan.cancels.len(), resting.len());
        prop_assert_eq!(plan.places.len() + plan.kept.len(), desired.len());

        let mut after: Vec<RestingOrder> = resting
            .iter()
            .filter(|o| plan.kept.contains(&o.order_id))
            .cloned()
            .collect();
        after.extend(plan.places.iter().enumerate().map(|(i, q)| RestingOrder {
            order_id: format!("new{i}"),
            side: q.side,
            action: q.action,
            price: q.price,
            size: q.size,
            created_at: Some(now),
            expires_at: None,
        }));

        let again = reconciler.reconcile(&desired, &after, now);
        prop_assert!(again.is_empty());
        prop_assert_eq!(again.kept.len(), desired.len());
    }
}
