//! Kalshi API Request/Response Types
//!
//! Serialization types for the Kalshi trade REST API. Prices on the
//! wire are integer cents; conversion to domain prices happens in
//! `into_*` helpers so nothing above the adapter sees cents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::market::{Action, MarketSnapshot, Side, cents_to_price};
use crate::domain::order::RestingOrder;

/// `POST /login` body.
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

/// `POST /login` response.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    /// Bearer token for subsequent requests.
    pub token: String,
    #[serde(default)]
    pub member_id: Option<String>,
}

/// `GET /markets/{ticker}` response.
#[derive(Debug, Clone, Deserialize)]
pub struct MarketResponse {
    pub market: MarketData,
}

/// Top of book in cents. `0` bid or `100` ask means no order.
#[derive(Debug, Clone, Deserialize)]
pub struct MarketData {
    pub ticker: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub yes_bid: Option<i64>,
    #[serde(default)]
    pub yes_ask: Option<i64>,
    #[serde(default)]
    pub no_bid: Option<i64>,
    #[serde(default)]
    pub no_ask: Option<i64>,
}

impl MarketData {
    pub fn snapshot(&self) -> MarketSnapshot {
        MarketSnapshot::from_cents(self.yes_bid, self.yes_ask, self.no_bid, self.no_ask)
    }
}

/// `GET /portfolio/positions` response.
#[derive(Debug, Clone, Deserialize)]
pub struct PositionsResponse {
    #[serde(default)]
    pub market_positions: Vec<MarketPosition>,
}

/// Net YES contracts held on one market.
#[derive(Debug, Clone, Deserialize)]
pub struct MarketPosition {
    pub ticker: String,
    #[serde(default)]
    pub position: i64,
}

/// `GET /portfolio/orders` response page.
#[derive(Debug, Clone, Deserialize)]
pub struct OrdersResponse {
    #[serde(default)]
    pub orders: Vec<OrderData>,
    /// Opaque pagination cursor; empty or absent on the last page.
    #[serde(default)]
    pub cursor: Option<String>,
}

/// An order as reported by the exchange.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderData {
    pub order_id: String,
    pub side: Side,
    pub action: Action,
    #[serde(default)]
    pub yes_price: Option<i64>,
    #[serde(default)]
    pub no_price: Option<i64>,
    #[serde(default)]
    pub remaining_count: Option<u32>,
    #[serde(default)]
    pub count: Option<u32>,
    #[serde(default)]
    pub created_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expiration_time: Option<DateTime<Utc>>,
}

impl OrderData {
    /// Normalize into a domain order. `None` if the order has no
    /// price for its side or nothing left to fill.
    pub fn into_resting(self) -> Option<RestingOrder> {
        let cents = match self.side {
            Side::Yes => self.yes_price.or(self.no_price.map(|c| 100 - c)),
            Side::No => self.no_price.or(self.yes_price.map(|c| 100 - c)),
        }?;
        let size = self.remaining_count.or(self.count)?;
        if size == 0 || !(1..=99).contains(&cents) {
            return None;
        }
        Some(RestingOrder {
            order_id: self.order_id,
            side: self.side,
            action: self.action,
            price: cents_to_price(cents),
            size,
            created_at: self.created_time,
            expires_at: self.expiration_time,
        })
    }
}

/// `POST /portfolio/orders` body.
#[derive(Debug, Clone, Serialize)]
pub struct CreateOrderRequest {
    pub ticker: String,
    pub action: Action,
    pub side: Side,
    #[serde(rename = "type")]
    pub order_type: &'static str,
    pub count: u32,
    /// Idempotency key: a retried POST cannot create a second order.
    pub client_order_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub yes_price: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_price: Option<i64>,
    /// Unix seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration_ts: Option<i64>,
    pub post_only: bool,
}

/// `POST /portfolio/orders` response.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrderResponse {
    pub order: CreatedOrder,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatedOrder {
    pub order_id: String,
    #[serde(default)]
    pub status: Option<String>,
}

/// `DELETE /portfolio/orders/{id}` response.
#[derive(Debug, Clone, Deserialize)]
pub struct CancelOrderResponse {
    /// Contracts removed from the book; 0 if nothing was left.
    #[serde(default)]
    pub reduced_by: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_market_response_to_snapshot() {
        let json = r#"{"market":{"ticker":"KXTEST","status":"active","yes_bid":40,"yes_ask":45,"no_bid":55,"no_ask":60}}"#;
        let resp: MarketResponse = serde_json::from_str(json).unwrap();
        let snap = resp.market.snapshot();
        assert_eq!(snap.yes_bid, Some(0.40));
        assert_eq!(snap.no_ask, Some(0.60));
    }

    #[test]
    fn test_no_order_normalizes_with_its_own_price() {
        let json = r#"{"order_id":"abc","side":"no","action":"sell","yes_price":38,"no_price":62,"remaining_count":3,"created_time":"2024-05-01T12:00:00Z"}"#;
        let order: OrderData = serde_json::from_str(json).unwrap();
        let resting = order.into_resting().unwrap();
        assert_eq!(resting.side, Side::No);
        assert_eq!(resting.action, Action::Sell);
        assert_eq!(resting.price, 0.62);
        assert_eq!(resting.size, 3);
        assert!(resting.created_at.is_some());
    }

    #[test]
    fn test_filled_order_is_dropped() {
        let json = r#"{"order_id":"abc","side":"yes","action":"buy","yes_price":41,"remaining_count":0}"#;
        let order: OrderData = serde_json::from_str(json).unwrap();
        assert!(order.into_resting().is_none());
    }

    #[test]
    fn test_create_order_serializes_side_price_only() {
        let req = CreateOrderRequest {
            ticker: "KXTEST".into(),
            action: Action::Buy,
            side: Side::Yes,
            order_type: "limit",
            count: 1,
            client_order_id: "id".into(),
            yes_price: Some(41),
            no_price: None,
            expiration_ts: None,
            post_only: true,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["type"], "limit");
        assert_eq!(json["yes_price"], 41);
        assert!(json.get("no_price").is_none());
        assert!(json.get("expiration_ts").is_none());
    }
}
