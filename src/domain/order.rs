//! Order-side domain types: desired quotes, exchange-owned resting
//! orders, placement requests, and the inventory the engine quotes
//! against.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::market::{Action, Side};

/// Market ticker used at the ports boundary.
pub type MarketId = String;

/// Exchange-assigned order identifier.
pub type OrderId = String;

/// A price/size the engine wants resting on the book this tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    /// Contract side (always the engine's traded side).
    pub side: Side,
    /// Buy (bid) or sell (ask).
    pub action: Action,
    /// Price on the one-cent grid.
    pub price: f64,
    /// Positive contract count.
    pub size: u32,
}

impl Quote {
    pub fn new(side: Side, action: Action, price: f64, size: u32) -> Self {
        Self {
            side,
            action,
            price,
            size,
        }
    }

    /// Lane this quote competes in.
    pub fn lane(&self) -> (Side, Action) {
        (self.side, self.action)
    }
}

/// An order live on the exchange, as last observed.
///
/// Read-mostly truth: the engine never assumes its own placements
/// landed until they show up here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestingOrder {
    pub order_id: OrderId,
    pub side: Side,
    pub action: Action,
    pub price: f64,
    /// Remaining (unfilled) size.
    pub size: u32,
    /// Exchange-reported creation time.
    pub created_at: Option<DateTime<Utc>>,
    /// Exchange-reported expiration, if the order carries one.
    pub expires_at: Option<DateTime<Utc>>,
}

impl RestingOrder {
    pub fn lane(&self) -> (Side, Action) {
        (self.side, self.action)
    }

    /// Seconds since creation, if the exchange reported a timestamp.
    pub fn age_secs(&self, now: DateTime<Utc>) -> Option<i64> {
        self.created_at.map(|created| (now - created).num_seconds())
    }
}

/// Placement payload handed to the exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub market: MarketId,
    pub side: Side,
    pub action: Action,
    pub price: f64,
    pub size: u32,
    /// Absolute expiration time; `None` = good-till-cancelled.
    pub expiration: Option<DateTime<Utc>>,
}

impl OrderRequest {
    pub fn from_quote(market: &str, quote: &Quote, expiration: Option<DateTime<Utc>>) -> Self {
        Self {
            market: market.to_string(),
            side: quote.side,
            action: quote.action,
            price: quote.price,
            size: quote.size,
            expiration,
        }
    }
}

/// Signed inventory on the traded side (positive = net long).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InventoryState {
    pub position: i64,
}

impl InventoryState {
    pub fn new(position: i64) -> Self {
        Self { position }
    }

    /// Translate the exchange's net YES position into inventory on the
    /// traded side. Holding NO contracts is a negative YES position.
    pub fn from_net_yes(net_yes: i64, trade_side: Side) -> Self {
        match trade_side {
            Side::Yes => Self::new(net_yes),
            Side::No => Self::new(-net_yes),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_inventory_from_net_yes() {
        assert_eq!(InventoryState::from_net_yes(7, Side::Yes).position, 7);
        assert_eq!(InventoryState::from_net_yes(7, Side::No).position, -7);
        assert_eq!(InventoryState::from_net_yes(-3, Side::No).position, 3);
    }

    #[test]
    fn test_resting_order_age() {
        let now = Utc::now();
        let order = RestingOrder {
            order_id: "o1".into(),
            side: Side::Yes,
            action: Action::Buy,
            price: 0.41,
            size: 1,
            created_at: Some(now - Duration::seconds(301)),
            expires_at: None,
        };
        assert_eq!(order.age_secs(now), Some(301));

        let untimed = RestingOrder {
            created_at: None,
            ..order
        };
        assert_eq!(untimed.age_secs(now), None);
    }

    #[test]
    fn test_order_request_from_quote() {
        let quote = Quote::new(Side::No, Action::Sell, 0.62, 4);
        let req = OrderRequest::from_quote("KXTEST-25", &quote, None);
        assert_eq!(req.market, "KXTEST-25");
        assert_eq!(req.side, Side::No);
        assert_eq!(req.action, Action::Sell);
        assert_eq!(req.size, 4);
        assert!(req.expiration.is_none());
    }
}
