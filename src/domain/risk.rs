//! Pre-trade inventory limits.
//!
//! Pure and deterministic: given the same quotes and inventory the
//! limiter always returns the same subset. It can shrink or drop a
//! quote, never grow one.

use tracing::debug;

use super::market::Action;
use super::order::{InventoryState, Quote};
use super::params::StrategyParameters;

#[derive(Debug, Clone)]
pub struct RiskLimiter {
    /// Effective limit `L = max_position · (1 − buffer)`, both directions.
    limit: f64,
}

impl RiskLimiter {
    pub fn new(params: &StrategyParameters) -> Self {
        Self {
            limit: params.position_limit(),
        }
    }

    pub fn limit(&self) -> f64 {
        self.limit
    }

    /// Contracts that may still be bought (`L − q`) or sold (`L + q`)
    /// without a full fill breaching the limit.
    pub fn headroom(&self, action: Action, inventory: InventoryState) -> u32 {
        let q = inventory.position as f64;
        let room = match action {
            Action::Buy => self.limit - q,
            Action::Sell => self.limit + q,
        };
        if room < 1.0 {
            0
        } else {
            // room is finite and ≥ 1 here, the cast saturates above u32::MAX
            room.floor() as u32
        }
    }

    /// Cap each quote to its headroom and drop quotes with none left.
    pub fn bound(&self, desired: &[Quote], inventory: InventoryState) -> Vec<Quote> {
        desired
            .iter()
            .filter_map(|quote| {
                let room = self.headroom(quote.action, inventory);
                if room == 0 {
                    debug!(
                        side = %quote.side,
                        action = %quote.action,
                        position = inventory.position,
                        limit = self.limit,
                        "Quote suppressed by position limit"
                    );
                    return None;
                }
                Some(Quote {
                    size: quote.size.min(room),
                    ..*quote
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market::Side;

    fn limiter() -> RiskLimiter {
        // max_position 100, buffer 0.1 → L = 90
        RiskLimiter::new(&StrategyParameters::default())
    }

    fn pair(size: u32) -> Vec<Quote> {
        vec![
            Quote::new(Side::Yes, Action::Buy, 0.45, size),
            Quote::new(Side::Yes, Action::Sell, 0.55, size),
        ]
    }

    #[test]
    fn test_flat_inventory_passes_through() {
        let bounded = limiter().bound(&pair(5), InventoryState::new(0));
        assert_eq!(bounded, pair(5));
    }

    #[test]
    fn test_buy_capped_near_long_limit() {
        let bounded = limiter().bound(&pair(5), InventoryState::new(88));
        assert_eq!(bounded[0].action, Action::Buy);
        assert_eq!(bounded[0].size, 2);
        assert_eq!(bounded[1].size, 5);
    }

    #[test]
    fn test_at_max_position_no_buy() {
        let bounded = limiter().bound(&pair(1), InventoryState::new(100));
        assert_eq!(bounded.len(), 1);
        assert_eq!(bounded[0].action, Action::Sell);
    }

    #[test]
    fn test_short_limit_is_symmetric() {
        let bounded = limiter().bound(&pair(1), InventoryState::new(-90));
        assert_eq!(bounded.len(), 1);
        assert_eq!(bounded[0].action, Action::Buy);
    }

    #[test]
    fn test_never_increases_size() {
        let bounded = limiter().bound(&pair(3), InventoryState::new(-50));
        assert!(bounded.iter().all(|q| q.size <= 3));
    }
}
