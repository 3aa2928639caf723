//! Paper Exchange - simulated `Exchange` for dry runs
//!
//! Each market's YES mid follows a bounded random walk that steps once
//! per snapshot. The book is `mid ± book_half_spread` snapped to the
//! cent grid, with the NO book as its complement. A resting order
//! fills completely the first time the book trades through its price;
//! expired orders disappear. Positions are tracked in net YES
//! contracts, like the live exchange reports them.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::PaperConfig;
use crate::domain::market::{
    Action, MAX_PRICE, MIN_PRICE, MarketSnapshot, ceil_to_tick, floor_to_tick,
};
use crate::domain::order::{OrderId, OrderRequest, RestingOrder};
use crate::error::ExchangeError;
use crate::ports::exchange::Exchange;

#[derive(Debug)]
struct PaperMarket {
    yes_mid: f64,
    /// Net YES contracts.
    position: i64,
    orders: Vec<RestingOrder>,
}

#[derive(Debug)]
struct PaperState {
    rng: StdRng,
    markets: HashMap<String, PaperMarket>,
}

/// In-memory exchange with a random-walk book.
#[derive(Debug)]
pub struct PaperExchange {
    config: PaperConfig,
    state: Mutex<PaperState>,
    next_order_id: AtomicU64,
}

impl PaperExchange {
    pub fn new(config: &PaperConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            config: config.clone(),
            state: Mutex::new(PaperState {
                rng,
                markets: HashMap::new(),
            }),
            next_order_id: AtomicU64::new(1),
        }
    }

    /// Start `market` at a specific YES mid instead of `initial_price`.
    pub async fn with_market(self, market: &str, yes_mid: f64) -> Self {
        {
            let mut state = self.state.lock().await;
            let entry = state
                .markets
                .entry(market.to_string())
                .or_insert_with(|| self.new_market());
            entry.yes_mid = self.clamp_mid(yes_mid);
        }
        self
    }

    /// Overwrite the net YES position of a market.
    pub async fn set_position(&self, market: &str, net_yes: i64) {
        let mut state = self.state.lock().await;
        state
            .markets
            .entry(market.to_string())
            .or_insert_with(|| self.new_market())
            .position = net_yes;
    }

    fn new_market(&self) -> PaperMarket {
        PaperMarket {
            yes_mid: self.clamp_mid(self.config.initial_price),
            position: 0,
            orders: Vec::new(),
        }
    }

    fn clamp_mid(&self, mid: f64) -> f64 {
        let half = self.config.book_half_spread;
        mid.clamp(MIN_PRICE + half, MAX_PRICE - half)
    }

    fn book(&self, yes_mid: f64) -> MarketSnapshot {
        let half = self.config.book_half_spread;
        let yes_bid = floor_to_tick(yes_mid - half).max(MIN_PRICE);
        let yes_ask = ceil_to_tick(yes_mid + half).min(MAX_PRICE);
        MarketSnapshot {
            yes_bid: Some(yes_bid),
            yes_ask: Some(yes_ask),
            no_bid: Some(floor_to_tick(1.0 - yes_ask)),
            no_ask: Some(ceil_to_tick(1.0 - yes_bid)),
        }
    }

    fn crosses(book: &MarketSnapshot, order: &RestingOrder) -> bool {
        match order.action {
            Action::Buy => book.best_ask(order.side).is_some_and(|ask| ask <= order.price),
            Action::Sell => book.best_bid(order.side).is_some_and(|bid| bid >= order.price),
        }
    }
}

/// Fill every crossing order and drop expired ones.
fn settle(market: &mut PaperMarket, book: &MarketSnapshot, name: &str) {
    let now = Utc::now();
    let mut position = market.position;
    market.orders.retain(|order| {
        if order.expires_at.is_some_and(|at| at <= now) {
            debug!(market = name, order_id = %order.order_id, "Paper order expired");
            return false;
        }
        if PaperExchange::crosses(book, order) {
            position += order.side.net_yes_delta(order.action, order.size);
            info!(
                market = name,
                order_id = %order.order_id,
                side = %order.side,
                action = %order.action,
                price = order.price,
                size = order.size,
                "Paper order filled"
            );
            return false;
        }
        true
    });
    market.position = position;
}

#[async_trait]
impl Exchange for PaperExchange {
    async fn get_snapshot(&self, market: &str) -> Result<MarketSnapshot, ExchangeError> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let vol = self.config.volatility;
        let step = if vol > 0.0 {
            state.rng.gen_range(-vol..=vol)
        } else {
            0.0
        };

        let entry = state
            .markets
            .entry(market.to_string())
            .or_insert_with(|| self.new_market());
        entry.yes_mid = self.clamp_mid(entry.yes_mid + step);
        let book = self.book(entry.yes_mid);
        settle(entry, &book, market);
        Ok(book)
    }

    async fn get_resting_orders(&self, market: &str) -> Result<Vec<RestingOrder>, ExchangeError> {
        let state = self.state.lock().await;
        let now = Utc::now();
        Ok(state
            .markets
            .get(market)
            .map(|m| {
                m.orders
                    .iter()
                    .filter(|o| !o.expires_at.is_some_and(|at| at <= now))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn get_position(&self, market: &str) -> Result<i64, ExchangeError> {
        let state = self.state.lock().await;
        Ok(state.markets.get(market).map_or(0, |m| m.position))
    }

    async fn place_order(&self, request: &OrderRequest) -> Result<OrderId, ExchangeError> {
        if !(MIN_PRICE - 1e-9..=MAX_PRICE + 1e-9).contains(&request.price) || request.size == 0 {
            return Err(ExchangeError::Placement {
                reason: format!("invalid order {} x {}", request.price, request.size),
            });
        }

        let mut state = self.state.lock().await;
        let entry = state
            .markets
            .entry(request.market.clone())
            .or_insert_with(|| self.new_market());

        let book = self.book(entry.yes_mid);
        let order_id = format!("paper-{}", self.next_order_id.fetch_add(1, Ordering::Relaxed));
        let order = RestingOrder {
            order_id: order_id.clone(),
            side: request.side,
            action: request.action,
            price: request.price,
            size: request.size,
            created_at: Some(Utc::now()),
            expires_at: request.expiration,
        };
        if Self::crosses(&book, &order) {
            return Err(ExchangeError::Placement {
                reason: "post-only order would cross the book".into(),
            });
        }

        entry.orders.push(order);
        Ok(order_id)
    }

    async fn cancel_order(&self, order_id: &str) -> Result<(), ExchangeError> {
        let mut state = self.state.lock().await;
        for market in state.markets.values_mut() {
            market.orders.retain(|o| o.order_id != order_id);
        }
        Ok(())
    }
}
