//! Kalshi Exchange Adapter - implements the `Exchange` port
//!
//! Translates port calls into trade API requests and normalizes the
//! responses. Orders are always limit + post-only, carry a fresh
//! client order id, and are priced in integer cents on the side they
//! trade.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument};
use uuid::Uuid;

use super::client::KalshiClient;
use super::types::{
    CancelOrderResponse, CreateOrderRequest, CreateOrderResponse, MarketResponse, OrdersResponse,
    PositionsResponse,
};
use crate::domain::market::{MarketSnapshot, Side, price_to_cents};
use crate::domain::order::{OrderId, OrderRequest, RestingOrder};
use crate::error::ExchangeError;
use crate::ports::exchange::Exchange;

/// Upper bound on order pages fetched per call.
const MAX_ORDER_PAGES: usize = 20;

pub struct KalshiExchange {
    client: Arc<KalshiClient>,
}

impl KalshiExchange {
    pub fn new(client: Arc<KalshiClient>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Arc<KalshiClient> {
        &self.client
    }
}

/// Build the wire payload for a placement.
///
/// # Errors
/// `Placement` if the price is not a whole cent in `1..=99`.
pub fn create_order_request(request: &OrderRequest) -> Result<CreateOrderRequest, ExchangeError> {
    let cents = price_to_cents(request.price)
        .filter(|c| (1..=99).contains(c))
        .ok_or_else(|| ExchangeError::Placement {
            reason: format!("price {} is not a quotable cent", request.price),
        })?;
    let (yes_price, no_price) = match request.side {
        Side::Yes => (Some(cents), None),
        Side::No => (None, Some(cents)),
    };
    Ok(CreateOrderRequest {
        ticker: request.market.clone(),
        action: request.action,
        side: request.side,
        order_type: "limit",
        count: request.size,
        client_order_id: Uuid::new_v4().to_string(),
        yes_price,
        no_price,
        expiration_ts: request.expiration.map(|t| t.timestamp()),
        post_only: true,
    })
}

#[async_trait]
impl Exchange for KalshiExchange {
    #[instrument(skip(self))]
    async fn get_snapshot(&self, market: &str) -> Result<MarketSnapshot, ExchangeError> {
        let resp: MarketResponse = self.client.get(&format!("/markets/{market}"), &[]).await?;
        let snapshot = resp.market.snapshot();
        if snapshot == MarketSnapshot::default() {
            return Err(ExchangeError::QuoteUnavailable {
                market: market.to_string(),
            });
        }
        Ok(snapshot)
    }

    #[instrument(skip(self))]
    async fn get_resting_orders(&self, market: &str) -> Result<Vec<RestingOrder>, ExchangeError> {
        let mut orders = Vec::new();
        let mut cursor: Option<String> = None;

        for _ in 0..MAX_ORDER_PAGES {
            let mut query = vec![("ticker", market), ("status", "resting")];
            if let Some(c) = cursor.as_deref() {
                query.push(("cursor", c));
            }
            let page: OrdersResponse = self.client.get("/portfolio/orders", &query).await?;

            for order in page.orders {
                let id = order.order_id.clone();
                match order.into_resting() {
                    Some(resting) => orders.push(resting),
                    None => debug!(order_id = %id, "Skipping order without a usable price or size"),
                }
            }

            cursor = page.cursor.filter(|c| !c.is_empty());
            if cursor.is_none() {
                break;
            }
        }

        Ok(orders)
    }

    #[instrument(skip(self))]
    async fn get_position(&self, market: &str) -> Result<i64, ExchangeError> {
        let query = [("ticker", market), ("settlement_status", "unsettled")];
        let resp: PositionsResponse = self.client.get("/portfolio/positions", &query).await?;
        Ok(resp
            .market_positions
            .iter()
            .filter(|p| p.ticker == market)
            .map(|p| p.position)
            .sum())
    }

    #[instrument(skip(self, request), fields(market = %request.market, side = %request.side, action = %request.action, price = request.price, size = request.size))]
    async fn place_order(&self, request: &OrderRequest) -> Result<OrderId, ExchangeError> {
        let body = create_order_request(request)?;
        match self
            .client
            .post::<_, CreateOrderResponse>("/portfolio/orders", &body)
            .await
        {
            Ok(resp) => Ok(resp.order.order_id),
            Err(ExchangeError::Rejected { status, body }) => Err(ExchangeError::Placement {
                reason: format!("status {status}: {body}"),
            }),
            Err(ExchangeError::Decode(reason)) => Err(ExchangeError::Placement {
                reason: format!("unreadable response: {reason}"),
            }),
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self))]
    async fn cancel_order(&self, order_id: &str) -> Result<(), ExchangeError> {
        let path = format!("/portfolio/orders/{order_id}");
        match self.client.delete::<CancelOrderResponse>(&path).await {
            Ok(resp) => {
                if resp.reduced_by == 0 {
                    debug!(order_id, "Order had nothing left to cancel");
                }
                Ok(())
            }
            Err(ExchangeError::Rejected { status: 404, .. }) => {
                debug!(order_id, "Order already gone");
                Ok(())
            }
            Err(ExchangeError::Rejected { status, body }) => Err(ExchangeError::Cancel {
                order_id: order_id.to_string(),
                reason: format!("status {status}: {body}"),
            }),
            Err(ExchangeError::Decode(reason)) => Err(ExchangeError::Cancel {
                order_id: order_id.to_string(),
                reason,
            }),
            Err(e) => Err(e),
        }
    }
}
