//! Market-side domain types: contract sides, order actions, the
//! normalized top-of-book snapshot, and the one-cent price grid.
//!
//! Prices are probability-like dollars in `(0, 1)`. Binary contracts
//! trade on a one-cent grid between 1¢ and 99¢, so every price that
//! leaves the engine is snapped to that grid.

use rust_decimal::Decimal;
use rust_decimal::prelude::*;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

// ────────────────────────────────────────────
// Price grid
// ────────────────────────────────────────────

/// Minimum price increment (one cent).
pub const PRICE_TICK: f64 = 0.01;

/// Lowest quotable price.
pub const MIN_PRICE: f64 = 0.01;

/// Highest quotable price.
pub const MAX_PRICE: f64 = 0.99;

/// Guards floor/ceil against `0.41 * 100.0 == 40.999...` style noise.
const GRID_EPSILON: f64 = 1e-9;

/// Round a price down to the one-cent grid.
pub fn floor_to_tick(price: f64) -> f64 {
    (price * 100.0 + GRID_EPSILON).floor() / 100.0
}

/// Round a price up to the one-cent grid.
pub fn ceil_to_tick(price: f64) -> f64 {
    (price * 100.0 - GRID_EPSILON).ceil() / 100.0
}

/// Convert a dollar price to integer cents (nearest cent).
///
/// Goes through `Decimal` so `0.29` becomes exactly `29`, not `28`.
pub fn price_to_cents(price: f64) -> Option<i64> {
    let dollars = Decimal::from_f64(price)?;
    (dollars * dec!(100)).round().to_i64()
}

/// Convert integer cents to a dollar price.
pub fn cents_to_price(cents: i64) -> f64 {
    Decimal::new(cents, 2).to_f64().unwrap_or(0.0)
}

// ────────────────────────────────────────────
// Sides and actions
// ────────────────────────────────────────────

/// Contract side of a binary market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Yes,
    No,
}

impl Side {
    /// The complementary contract.
    pub fn opposite(self) -> Self {
        match self {
            Self::Yes => Self::No,
            Self::No => Self::Yes,
        }
    }

    /// Change in net YES position when `size` contracts of this side
    /// are bought or sold.
    pub fn net_yes_delta(self, action: Action, size: u32) -> i64 {
        let size = i64::from(size);
        match (self, action) {
            (Self::Yes, Action::Buy) | (Self::No, Action::Sell) => size,
            (Self::Yes, Action::Sell) | (Self::No, Action::Buy) => -size,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Yes => "yes",
            Self::No => "no",
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Order action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Buy,
    Sell,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ────────────────────────────────────────────
// Snapshot
// ────────────────────────────────────────────

/// Normalized top of book for one binary market.
///
/// A missing side is `None`. Adapters produce this shape once at the
/// boundary; nothing downstream inspects raw exchange payloads.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub yes_bid: Option<f64>,
    pub yes_ask: Option<f64>,
    pub no_bid: Option<f64>,
    pub no_ask: Option<f64>,
}

impl MarketSnapshot {
    /// Build from exchange cents, where a `0` bid or a `100` ask means
    /// there is no order on that side.
    pub fn from_cents(
        yes_bid: Option<i64>,
        yes_ask: Option<i64>,
        no_bid: Option<i64>,
        no_ask: Option<i64>,
    ) -> Self {
        let bid = |c: Option<i64>| c.filter(|c| *c > 0 && *c < 100).map(cents_to_price);
        let ask = |c: Option<i64>| c.filter(|c| *c > 0 && *c < 100).map(cents_to_price);
        Self {
            yes_bid: bid(yes_bid),
            yes_ask: ask(yes_ask),
            no_bid: bid(no_bid),
            no_ask: ask(no_ask),
        }
    }

    pub fn best_bid(&self, side: Side) -> Option<f64> {
        match side {
            Side::Yes => self.yes_bid,
            Side::No => self.no_bid,
        }
    }

    pub fn best_ask(&self, side: Side) -> Option<f64> {
        match side {
            Side::Yes => self.yes_ask,
            Side::No => self.no_ask,
        }
    }

    /// Mid price of one side; undefined unless both quotes are present
    /// and uncrossed.
    pub fn mid(&self, side: Side) -> Option<f64> {
        match (self.best_bid(side), self.best_ask(side)) {
            (Some(bid), Some(ask)) if bid <= ask => Some((bid + ask) / 2.0),
            _ => None,
        }
    }

    pub fn yes_mid(&self) -> Option<f64> {
        self.mid(Side::Yes)
    }

    pub fn no_mid(&self) -> Option<f64> {
        self.mid(Side::No)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mid_requires_both_sides() {
        let snap = MarketSnapshot {
            yes_bid: Some(0.40),
            yes_ask: Some(0.45),
            no_bid: Some(0.55),
            no_ask: None,
        };
        assert!((snap.yes_mid().unwrap() - 0.425).abs() < 1e-12);
        assert_eq!(snap.no_mid(), None);
    }

    #[test]
    fn test_crossed_book_has_no_mid() {
        let snap = MarketSnapshot {
            yes_bid: Some(0.50),
            yes_ask: Some(0.45),
            ..Default::default()
        };
        assert_eq!(snap.yes_mid(), None);
    }

    #[test]
    fn test_from_cents_treats_edges_as_missing() {
        let snap = MarketSnapshot::from_cents(Some(0), Some(45), Some(55), Some(100));
        assert_eq!(snap.yes_bid, None);
        assert_eq!(snap.yes_ask, Some(0.45));
        assert_eq!(snap.no_bid, Some(0.55));
        assert_eq!(snap.no_ask, None);
    }

    #[test]
    fn test_tick_rounding() {
        assert_eq!(floor_to_tick(0.4137), 0.41);
        assert_eq!(ceil_to_tick(0.4137), 0.42);
        // Already on the grid: no drift in either direction.
        assert_eq!(floor_to_tick(0.41), 0.41);
        assert_eq!(ceil_to_tick(0.41), 0.41);
        assert_eq!(floor_to_tick(0.29), 0.29);
    }

    #[test]
    fn test_cents_conversion_is_exact() {
        assert_eq!(price_to_cents(0.29), Some(29));
        assert_eq!(price_to_cents(0.57), Some(57));
        assert_eq!(cents_to_price(29), 0.29);
        assert_eq!(price_to_cents(cents_to_price(7)), Some(7));
    }

    #[test]
    fn test_net_yes_delta() {
        assert_eq!(Side::Yes.net_yes_delta(Action::Buy, 3), 3);
        assert_eq!(Side::Yes.net_yes_delta(Action::Sell, 3), -3);
        assert_eq!(Side::No.net_yes_delta(Action::Buy, 2), -2);
        assert_eq!(Side::No.net_yes_delta(Action::Sell, 2), 2);
    }

    #[test]
    fn test_side_serde_lowercase() {
        let json = serde_json::to_string(&Side::No).unwrap();
        assert_eq!(json, "\"no\"");
        let action: Action = serde_json::from_str("\"sell\"").unwrap();
        assert_eq!(action, Action::Sell);
    }
}
