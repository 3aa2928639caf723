//! Exchange Port - market data and order management interface
//!
//! The engine's only view of the outside world. Implementations return
//! normalized domain types; nothing above this boundary sees raw
//! exchange payloads.
//!
//! Key contracts:
//! - Positions are net YES contracts on unsettled markets
//! - Resting orders are the truth; placements are never assumed to land
//! - Shared across engines through `Arc`, so calls must be reentrant

use async_trait::async_trait;

use crate::domain::market::MarketSnapshot;
use crate::domain::order::{OrderId, OrderRequest, RestingOrder};
use crate::error::ExchangeError;

/// Trait for exchange providers (live REST or simulated).
#[async_trait]
pub trait Exchange: Send + Sync + 'static {
  /// Current top of book for a market.
  ///
  /// # Errors
  /// `QuoteUnavailable` when the market has no usable quote.
  async fn get_snapshot(&self, market: &str) -> Result<MarketSnapshot, ExchangeError>;

  /// Orders of ours currently resting on a market.
  async fn get_resting_orders(&self, market: &str) -> Result<Vec<RestingOrder>, ExchangeError>;

  /// Net YES position on a market (0 if flat or settled).
  async fn get_position(&self, market: &str) -> Result<i64, ExchangeError>;

  /// Submit a post-only limit order.
  ///
  /// # Errors
  /// `Placement` when the exchange refuses the order.
  async fn place_order(&self, request: &OrderRequest) -> Result<OrderId, ExchangeError>;

  /// Cancel a resting order. An order that is already gone counts as
  /// cancelled.
  ///
  /// # Errors
  /// `Cancel` when the order may still be resting.
  async fn cancel_order(&self, order_id: &str) -> Result<(), ExchangeError>;
}
