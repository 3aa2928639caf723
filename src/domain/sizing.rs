//! Inventory-aware quote sizing.
//!
//! Both sides start at `order_size`. As inventory approaches the
//! position limit the size that adds to it shrinks and the size that
//! works it off grows, so the book leans toward flat without ever
//! quoting zero.

use super::market::{Action, Side};
use super::order::{InventoryState, Quote};
use super::params::StrategyParameters;
use super::pricing::QuotePrices;

/// Buy and sell sizes for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuoteSizes {
    pub buy: u32,
    pub sell: u32,
}

#[derive(Debug, Clone)]
pub struct QuoteSizer {
    side: Side,
    base: f64,
    limit: f64,
}

impl QuoteSizer {
    pub fn new(params: &StrategyParameters) -> Self {
        Self {
            side: params.trade_side,
            base: f64::from(params.order_size),
            limit: params.position_limit(),
        }
    }

    /// Scale the base size linearly with inventory load: exactly
    /// `order_size` when flat, between one contract and twice
    /// `order_size` at the limit.
    pub fn sizes(&self, inventory: InventoryState) -> QuoteSizes {
        let load = (inventory.position as f64 / self.limit).clamp(-1.0, 1.0);
        QuoteSizes {
            buy: scaled(self.base * (1.0 - load)),
            sell: scaled(self.base * (1.0 + load)),
        }
    }

    /// The bid/ask pair the engine would like resting, before risk
    /// limits are applied.
    pub fn desired_quotes(&self, prices: &QuotePrices, inventory: InventoryState) -> Vec<Quote> {
        let sizes = self.sizes(inventory);
        vec![
            Quote::new(self.side, Action::Buy, prices.bid, sizes.buy),
            Quote::new(self.side, Action::Sell, prices.ask, sizes.sell),
        ]
    }
}

fn scaled(raw: f64) -> u32 {
    // Saturating float-to-int cast; sizes are tiny relative to u32.
    (raw.round() as u32).max(1)
}
