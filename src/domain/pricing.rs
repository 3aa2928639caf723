//! Quote pricing models.
//!
//! `PricingModel` is the pluggable seam: the engine, risk limiter and
//! reconciler only see `QuotePrices`, so the closed-form
//! Avellaneda-Stoikov model and the simpler heuristics can be swapped
//! per strategy.
//!
//! Reference: Avellaneda & Stoikov (2008), "High-frequency trading in a
//! limit order book".
//!
//! ```text
//! r = mid − q·γ·σ²·(T − t)
//! δ = γ·σ²·(T − t) + (2/γ)·ln(1 + γ/k)
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::market::{MAX_PRICE, MIN_PRICE, MarketSnapshot, PRICE_TICK, ceil_to_tick, floor_to_tick};
use super::order::InventoryState;
use super::params::StrategyParameters;
use crate::error::{ConfigError, PricingError};

const EPSILON: f64 = 1e-9;

/// Output of a pricing model for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuotePrices {
    /// Inventory-adjusted fair price, clamped to the quotable range.
    pub reservation_price: f64,
    /// Model spread δ (total bid-to-ask distance before grid snapping).
    pub spread: f64,
    /// Theoretical bid after inventory lean, before snapping/clamping.
    pub raw_bid: f64,
    /// Theoretical ask after inventory lean, before snapping/clamping.
    pub raw_ask: f64,
    /// Quotable bid on the one-cent grid.
    pub bid: f64,
    /// Quotable ask on the one-cent grid.
    pub ask: f64,
}

/// A strategy that turns market + inventory state into bid/ask prices.
///
/// Parameters are bound at construction, so a model that exists has
/// already passed validation.
pub trait PricingModel: Send + Sync + std::fmt::Debug {
    /// Short identifier used in logs and metrics.
    fn name(&self) -> &'static str;

    /// Price the traded side.
    ///
    /// # Errors
    /// `NoQuoteAvailable` when the traded side's mid is undefined;
    /// `NoEdge` when the model declines to quote this book.
    fn price(
        &self,
        snapshot: &MarketSnapshot,
        inventory: InventoryState,
        elapsed: Duration,
    ) -> Result<QuotePrices, PricingError>;
}

/// Which model a strategy runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PricingModelKind {
    #[default]
    Avellaneda,
    FixedSpread,
    PennyJump,
}

/// Build the configured model.
pub fn build_model(
    kind: PricingModelKind,
    params: StrategyParameters,
) -> Result<Box<dyn PricingModel>, ConfigError> {
    Ok(match kind {
        PricingModelKind::Avellaneda => Box::new(AvellanedaStoikov::new(params)?),
        PricingModelKind::FixedSpread => Box::new(FixedSpread::new(params)?),
        PricingModelKind::PennyJump => Box::new(PennyJump::new(params)?),
    })
}

// ────────────────────────────────────────────
// Avellaneda-Stoikov
// ────────────────────────────────────────────

/// Closed-form inventory-aware market making model.
#[derive(Debug, Clone)]
pub struct AvellanedaStoikov {
    params: StrategyParameters,
}

impl AvellanedaStoikov {
    /// # Errors
    /// Rejects γ ≤ 0, k ≤ 0, T ≤ 0 and any other invalid parameter.
    pub fn new(params: StrategyParameters) -> Result<Self, ConfigError> {
        Ok(Self {
            params: params.validate()?,
        })
    }

    pub fn params(&self) -> &StrategyParameters {
        &self.params
    }

    /// `r = mid − q·γ·σ²·(T − t)`; past the horizon this is just `mid`.
    pub fn reservation_price(&self, mid: f64, position: i64, elapsed_secs: f64) -> f64 {
        let p = &self.params;
        let remaining = p.remaining_horizon(elapsed_secs);
        mid - position as f64 * p.gamma * p.sigma.powi(2) * remaining
    }

    /// `δ = γ·σ²·(T − t) + (2/γ)·ln(1 + γ/k)`, floored at `min_spread`.
    pub fn optimal_spread(&self, elapsed_secs: f64) -> f64 {
        let p = &self.params;
        let remaining = p.remaining_horizon(elapsed_secs);
        let inventory_term = p.gamma * p.sigma.powi(2) * remaining;
        let liquidity_term = (2.0 / p.gamma) * (1.0 + p.gamma / p.k).ln();
        (inventory_term + liquidity_term).max(p.min_spread)
    }
}

impl PricingModel for AvellanedaStoikov {
    fn name(&self) -> &'static str {
        "avellaneda"
    }

    fn price(
        &self,
        snapshot: &MarketSnapshot,
        inventory: InventoryState,
        elapsed: Duration,
    ) -> Result<QuotePrices, PricingError> {
        let mid = snapshot
            .mid(self.params.trade_side)
            .ok_or(PricingError::NoQuoteAvailable)?;
        let t = elapsed.as_secs_f64();
        let reservation = self.reservation_price(mid, inventory.position, t);
        let spread = self.optimal_spread(t);
        Ok(lean_and_snap(reservation, spread, inventory.position, &self.params))
    }
}

// ────────────────────────────────────────────
// Fixed spread
// ────────────────────────────────────────────

/// Constant-width quotes around an inventory-skewed mid:
/// `r = mid − skew·q`, `δ = min_spread`.
#[derive(Debug, Clone)]
pub struct FixedSpread {
    params: StrategyParameters,
}

impl FixedSpread {
    pub fn new(params: StrategyParameters) -> Result<Self, ConfigError> {
        Ok(Self {
            params: params.validate()?,
        })
    }
}

impl PricingModel for FixedSpread {
    fn name(&self) -> &'static str {
        "fixed_spread"
    }

    fn price(
        &self,
        snapshot: &MarketSnapshot,
        inventory: InventoryState,
        _elapsed: Duration,
    ) -> Result<QuotePrices, PricingError> {
        let mid = snapshot
            .mid(self.params.trade_side)
            .ok_or(PricingError::NoQuoteAvailable)?;
        let reservation = mid - self.params.inventory_skew_factor * inventory.position as f64;
        let spread = self.params.min_spread.max(PRICE_TICK);
        let half = spread / 2.0;
        Ok(snap_to_grid(
            reservation,
            spread,
            reservation - half,
            reservation + half,
            self.params.min_spread,
        ))
    }
}

// ────────────────────────────────────────────
// Penny jump
// ────────────────────────────────────────────

/// Step one cent inside the current best bid and ask when the book is
/// wide enough to still leave `min_spread` between them.
#[derive(Debug, Clone)]
pub struct PennyJump {
    params: StrategyParameters,
}

impl PennyJump {
    pub fn new(params: StrategyParameters) -> Result<Self, ConfigError> {
        Ok(Self {
            params: params.validate()?,
        })
    }
}

impl PricingModel for PennyJump {
    fn name(&self) -> &'static str {
        "penny_jump"
    }

    fn price(
        &self,
        snapshot: &MarketSnapshot,
        _inventory: InventoryState,
        _elapsed: Duration,
    ) -> Result<QuotePrices, PricingError> {
        let side = self.params.trade_side;
        let (Some(best_bid), Some(best_ask), Some(mid)) =
            (snapshot.best_bid(side), snapshot.best_ask(side), snapshot.mid(side))
        else {
            return Err(PricingError::NoQuoteAvailable);
        };

        let raw_bid = best_bid + PRICE_TICK;
        let raw_ask = best_ask - PRICE_TICK;
        let spread = raw_ask - raw_bid;
        if spread < self.params.min_spread.max(PRICE_TICK) - EPSILON {
            return Err(PricingError::NoEdge);
        }
        Ok(snap_to_grid(mid, spread, raw_bid, raw_ask, self.params.min_spread))
    }
}

// ────────────────────────────────────────────
// Shared finishing steps
// ────────────────────────────────────────────

/// Split the spread around the reservation price and lean both quotes
/// by `inventory_skew_factor · q`, capped at half the spread so the
/// reservation price stays inside the quotes.
fn lean_and_snap(
    reservation: f64,
    spread: f64,
    position: i64,
    params: &StrategyParameters,
) -> QuotePrices {
    let half = spread / 2.0;
    let lean = (params.inventory_skew_factor * position as f64).clamp(-half, half);
    snap_to_grid(
        reservation,
        spread,
        reservation - half - lean,
        reservation + half - lean,
        params.min_spread,
    )
}

/// Snap raw quotes outward onto the cent grid and into
/// `[MIN_PRICE, MAX_PRICE]`.
///
/// A pair squeezed below the spread floor is widened upward from the
/// bid, or downward from the ask when the ask already sits at the top.
fn snap_to_grid(
    reservation: f64,
    spread: f64,
    raw_bid: f64,
    raw_ask: f64,
    min_spread: f64,
) -> QuotePrices {
    let floor = min_spread.max(PRICE_TICK);
    let mut bid = floor_to_tick(raw_bid).clamp(MIN_PRICE, MAX_PRICE);
    let mut ask = ceil_to_tick(raw_ask).clamp(MIN_PRICE, MAX_PRICE);

    if ask - bid < floor - EPSILON {
        if ask >= MAX_PRICE {
            bid = floor_to_tick(MAX_PRICE - floor).max(MIN_PRICE).min(bid);
        } else {
            ask = ceil_to_tick(bid + floor).min(MAX_PRICE).max(ask);
            if ask - bid < floor - EPSILON {
                bid = floor_to_tick(ask - floor).max(MIN_PRICE);
            }
        }
    }

    QuotePrices {
        reservation_price: reservation.clamp(MIN_PRICE, MAX_PRICE),
        spread,
        raw_bid,
        raw_ask,
        bid,
        ask,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market::Side;

    fn snapshot(bid: f64, ask: f64) -> MarketSnapshot {
        MarketSnapshot {
            yes_bid: Some(bid),
            yes_ask: Some(ask),
            no_bid: Some(1.0 - ask),
            no_ask: Some(1.0 - bid),
        }
    }

    fn tight_params() -> StrategyParameters {
        StrategyParameters {
            gamma: 2.0,
            k: 200.0,
            sigma: 0.001,
            horizon_secs: 3600.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_reference_scenario_brackets_mid_symmetrically() {
        let model = AvellanedaStoikov::new(StrategyParameters::default()).unwrap();
        let quotes = model
            .price(&snapshot(0.40, 0.45), InventoryState::new(0), Duration::ZERO)
            .unwrap();

        assert!((quotes.reservation_price - 0.425).abs() < 1e-9);
        let expected = 0.1 * 0.25 * 3600.0 + (2.0 / 0.1) * (1.0 + 0.1 / 1.5_f64).ln();
        assert!((quotes.spread - expected).abs() < 1e-9);
        assert!(((quotes.raw_bid + quotes.raw_ask) / 2.0 - 0.425).abs() < 1e-9);
        assert!(quotes.bid <= 0.425 && quotes.ask >= 0.425);
        assert_eq!(quotes.bid, MIN_PRICE);
        assert_eq!(quotes.ask, MAX_PRICE);
    }

    #[test]
    fn test_long_inventory_lowers_reservation() {
        let model = AvellanedaStoikov::new(tight_params()).unwrap();
        let flat = model.reservation_price(0.50, 0, 0.0);
        let long = model.reservation_price(0.50, 10, 0.0);
        let short = model.reservation_price(0.50, -10, 0.0);
        assert!((flat - 0.50).abs() < 1e-12);
        assert!(long < flat);
        assert!(short > flat);
    }

    #[test]
    fn test_horizon_expiry_reverts_to_mid() {
        let model = AvellanedaStoikov::new(tight_params()).unwrap();
        let r = model.reservation_price(0.50, 25, 3600.0 + 10.0);
        assert!((r - 0.50).abs() < 1e-12);
        let liquidity_only = (2.0 / 2.0) * (1.0 + 2.0 / 200.0_f64).ln();
        assert!((model.optimal_spread(5000.0) - liquidity_only.max(0.01)).abs() < 1e-12);
    }

    #[test]
    fn test_spread_floor() {
        let params = StrategyParameters {
            min_spread: 0.05,
            ..tight_params()
        };
        let model = AvellanedaStoikov::new(params).unwrap();
        assert!(model.optimal_spread(0.0) >= 0.05);
    }

    #[test]
    fn test_quotes_on_grid_and_ordered() {
        let model = AvellanedaStoikov::new(tight_params()).unwrap();
        let q = model
            .price(&snapshot(0.47, 0.53), InventoryState::new(5), Duration::from_secs(60))
            .unwrap();
        assert!(q.bid <= q.reservation_price && q.reservation_price <= q.ask);
        assert_eq!(q.bid, floor_to_tick(q.bid));
        assert_eq!(q.ask, ceil_to_tick(q.ask));
        assert!(q.ask - q.bid >= 0.01 - 1e-9);
    }

    #[test]
    fn test_one_sided_book_has_no_quote() {
        let model = AvellanedaStoikov::new(StrategyParameters::default()).unwrap();
        let snap = MarketSnapshot {
            yes_bid: Some(0.40),
            yes_ask: None,
            ..Default::default()
        };
        assert_eq!(
            model.price(&snap, InventoryState::new(0), Duration::ZERO),
            Err(PricingError::NoQuoteAvailable)
        );
    }

    #[test]
    fn test_invalid_params_fail_at_construction() {
        let params = StrategyParameters {
            k: 0.0,
            ..Default::default()
        };
        assert!(AvellanedaStoikov::new(params.clone()).is_err());
        assert!(build_model(PricingModelKind::PennyJump, params).is_err());
    }

    #[test]
    fn test_no_side_prices_no_book() {
        let params = StrategyParameters {
            trade_side: Side::No,
            ..tight_params()
        };
        let model = AvellanedaStoikov::new(params).unwrap();
        let q = model
            .price(&snapshot(0.40, 0.45), InventoryState::new(0), Duration::ZERO)
            .unwrap();
        assert!((q.reservation_price - 0.575).abs() < 1e-9);
    }

    #[test]
    fn test_boundary_saturation_keeps_min_spread() {
        let params = StrategyParameters {
            min_spread: 0.04,
            ..tight_params()
        };
        let model = FixedSpread::new(params).unwrap();
        let q = model
            .price(&snapshot(0.98, 0.99), InventoryState::new(0), Duration::ZERO)
            .unwrap();
        assert_eq!(q.ask, MAX_PRICE);
        assert!(q.ask - q.bid >= 0.04 - 1e-9);
        assert!(q.bid <= q.reservation_price);
    }

    #[test]
    fn test_fixed_spread_skews_with_inventory() {
        let params = StrategyParameters {
            min_spread: 0.02,
            inventory_skew_factor: 0.001,
            ..Default::default()
        };
        let model = FixedSpread::new(params).unwrap();
        let q = model
            .price(&snapshot(0.49, 0.51), InventoryState::new(10), Duration::ZERO)
            .unwrap();
        assert!((q.reservation_price - 0.49).abs() < 1e-9);
        assert_eq!(q.bid, 0.48);
        assert_eq!(q.ask, 0.50);
    }

    #[test]
    fn test_penny_jump_steps_inside_book() {
        let model = PennyJump::new(StrategyParameters::default()).unwrap();
        let q = model
            .price(&snapshot(0.40, 0.46), InventoryState::new(0), Duration::ZERO)
            .unwrap();
        assert_eq!(q.bid, 0.41);
        assert_eq!(q.ask, 0.45);
    }

    #[test]
    fn test_penny_jump_declines_tight_book() {
        let model = PennyJump::new(StrategyParameters::default()).unwrap();
        let result = model.price(&snapshot(0.40, 0.42), InventoryState::new(0), Duration::ZERO);
        assert_eq!(result, Err(PricingError::NoEdge));
    }
}
