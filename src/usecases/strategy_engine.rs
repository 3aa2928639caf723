//! Strategy Engine - Per-Market Quoting Loop
//!
//! One engine owns one market. Every `dt` it:
//! 1. Fetches the snapshot, net position and resting orders
//! 2. Prices reservation/bid/ask with the configured model
//! 3. Sizes the quotes and bounds them by the position limit
//! 4. Reconciles against resting orders (cancels first, then places)
//!
//! Each action is independent: a failed call is logged and the next
//! tick's reconciliation retries it. Only auth or connection failures end a
//! tick early. On stop the engine cancels everything it has resting.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};

use crate::adapters::metrics::MetricsRegistry;
use crate::domain::market::{Action, Side};
use crate::domain::order::{InventoryState, MarketId, OrderId, OrderRequest};
use crate::domain::params::StrategyParameters;
use crate::domain::pricing::{PricingModel, PricingModelKind, QuotePrices, build_model};
use crate::domain::reconcile::{OrderReconciler, ReconcilePlan};
use crate::domain::risk::RiskLimiter;
use crate::domain::sizing::QuoteSizer;
use crate::error::{ConfigError, EngineError, ExchangeError, PricingError};
use crate::ports::exchange::Exchange;
use crate::shutdown::StopSignal;

/// Longest accepted tick interval.
pub const MAX_TICK_INTERVAL: Duration = Duration::from_secs(86_400);

/// Lifecycle of an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
  /// Waiting for the next tick.
  Idle,
  /// Inside a tick.
  Ticking,
  /// Stop observed; no further Exchange calls except cancel-all.
  Stopped,
}

/// Why a tick produced no actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
  /// The exchange had no usable quote for the market.
  QuoteUnavailable,
  /// The pricing model declined this snapshot.
  Pricing(PricingError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
  /// Reconciliation ran (possibly with zero actions).
  Quoted,
  /// Nothing was touched this tick.
  Skipped(SkipReason),
}

impl TickOutcome {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Quoted => "quoted",
      Self::Skipped(_) => "skipped",
    }
  }
}

/// What one tick did.
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
  pub outcome: TickOutcome,
  /// Traded-side inventory, when it was fetched.
  pub position: Option<i64>,
  pub prices: Option<QuotePrices>,
  /// Ids returned by successful placements.
  pub placed: Vec<OrderId>,
  /// Ids of successfully cancelled orders.
  pub cancelled: Vec<OrderId>,
  /// Resting orders left untouched.
  pub kept: usize,
  /// Contained Exchange call failures.
  pub failures: usize,
  /// Placements skipped because a same-lane cancel failed.
  pub deferred: usize,
}

impl TickReport {
  fn skipped(reason: SkipReason, position: Option<i64>) -> Self {
    Self {
      outcome: TickOutcome::Skipped(reason),
      position,
      prices: None,
      placed: Vec::new(),
      cancelled: Vec::new(),
      kept: 0,
      failures: 0,
      deferred: 0,
    }
  }

  fn quoted(position: i64, prices: QuotePrices, kept: usize) -> Self {
    Self {
      outcome: TickOutcome::Quoted,
      position: Some(position),
      prices: Some(prices),
      placed: Vec::new(),
      cancelled: Vec::new(),
      kept,
      failures: 0,
      deferred: 0,
    }
  }

  /// Whether the tick sent any cancel or place to the exchange.
  pub fn has_actions(&self) -> bool {
    !self.placed.is_empty() || !self.cancelled.is_empty() || self.failures > 0
  }
}

/// Quoting loop for a single market.
pub struct StrategyEngine<E: Exchange + ?Sized> {
  exchange: Arc<E>,
  market: MarketId,
  params: StrategyParameters,
  model: Box<dyn PricingModel>,
  sizer: QuoteSizer,
  limiter: RiskLimiter,
  reconciler: OrderReconciler,
  dt: Duration,
  metrics: Option<Arc<MetricsRegistry>>,
  stop: StopSignal,
  started_at: Instant,
  state: EngineState,
}

impl<E: Exchange + ?Sized> StrategyEngine<E> {
  /// Build an engine. Every parameter is validated here, so a running
  /// engine never sees a configuration error.
  pub fn new(
    exchange: Arc<E>,
    market: impl Into<MarketId>,
    kind: PricingModelKind,
    params: StrategyParameters,
    dt: Duration,
    stop: StopSignal,
  ) -> Result<Self, ConfigError> {
    let market = market.into();
    if market.trim().is_empty() {
      return Err(ConfigError::InvalidField {
        field: "market_ticker",
        reason: "must not be empty".into(),
      });
    }
    if dt.is_zero() {
      return Err(ConfigError::param("dt", 0.0, "must be positive"));
    }
    if dt > MAX_TICK_INTERVAL {
      return Err(ConfigError::param("dt", dt.as_secs_f64(), "must be at most one day"));
    }

    let params = params.validate()?;
    let model = build_model(kind, params.clone())?;

    Ok(Self {
      exchange,
      market,
      sizer: QuoteSizer::new(&params),
      limiter: RiskLimiter::new(&params),
      reconciler: OrderReconciler::new(params.order_expiration_secs),
      params,
      model,
      dt,
      metrics: None,
      stop,
      started_at: Instant::now(),
      state: EngineState::Idle,
    })
  }

  pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
    self.metrics = Some(metrics);
    self
  }

  pub fn market(&self) -> &str {
    &self.market
  }

  pub fn state(&self) -> EngineState {
    self.state
  }

  /// Tick every `dt` until stopped, then cancel all resting orders.
  ///
  /// A slow tick delays the next one instead of overlapping it.
  #[instrument(skip(self), fields(market = %self.market, model = self.model.name()))]
  pub async fn run(mut self) {
    let mut interval = tokio::time::interval(self.dt);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(
      side = %self.params.trade_side,
      dt_ms = self.dt.as_millis() as u64,
      "Strategy engine started"
    );

    loop {
      let stopped = tokio::select! {
        biased;
        () = self.stop.stopped() => true,
        _ = interval.tick() => false,
      };
      if stopped {
        break;
      }

      match self.tick().await {
        Ok(report) => debug!(
          outcome = report.outcome.as_str(),
          placed = report.placed.len(),
          cancelled = report.cancelled.len(),
          kept = report.kept,
          failures = report.failures,
          "Tick complete"
        ),
        Err(EngineError::Stopped) => break,
        Err(e) => warn!(error = %e, "Tick ended early"),
      }
    }

    self.state = EngineState::Stopped;
    info!("Stop requested, cancelling resting orders");
    self.cancel_all().await;
    info!("Strategy engine stopped");
  }

  /// Run one pricing → risk → reconcile → send cycle.
  ///
  /// # Errors
  /// `Stopped` if the stop signal fired mid-tick; `Exchange` for a read
  /// that failed or an unrecoverable write failure.
  pub async fn tick(&mut self) -> Result<TickReport, EngineError> {
    let started = Instant::now();
    self.state = EngineState::Ticking;

    let result = self.tick_inner().await;

    self.state = match result {
      Err(EngineError::Stopped) => EngineState::Stopped,
      _ => EngineState::Idle,
    };
    self.record_tick(&result, started.elapsed());
    result
  }

  async fn tick_inner(&mut self) -> Result<TickReport, EngineError> {
    self.ensure_running()?;
    let snapshot = match self.exchange.get_snapshot(&self.market).await {
      Ok(snapshot) => snapshot,
      Err(ExchangeError::QuoteUnavailable { .. }) => {
        debug!(market = %self.market, "No quote available, skipping tick");
        return Ok(TickReport::skipped(SkipReason::QuoteUnavailable, None));
      }
      Err(e) => return Err(self.read_failed("get_snapshot", e)),
    };

    self.ensure_running()?;
    let net_yes = self
      .exchange
      .get_position(&self.market)
      .await
      .map_err(|e| self.read_failed("get_position", e))?;
    let inventory = InventoryState::from_net_yes(net_yes, self.params.trade_side);

    self.ensure_running()?;
    let resting = self
      .exchange
      .get_resting_orders(&self.market)
      .await
      .map_err(|e| self.read_failed("get_resting_orders", e))?;

    let prices = match self.model.price(&snapshot, inventory, self.started_at.elapsed()) {
      Ok(prices) => prices,
      Err(e) => {
        debug!(
          market = %self.market,
          reason = %e,
          resting = resting.len(),
          "Model declined to quote, skipping tick"
        );
        return Ok(TickReport::skipped(SkipReason::Pricing(e), Some(inventory.position)));
      }
    };

    let desired = self.sizer.desired_quotes(&prices, inventory);
    let bounded = self.limiter.bound(&desired, inventory);
    let now = Utc::now();
    let plan = self.reconciler.reconcile(&bounded, &resting, now);

    debug!(
      market = %self.market,
      position = inventory.position,
      reservation = prices.reservation_price,
      spread = prices.spread,
      bid = prices.bid,
      ask = prices.ask,
      cancels = plan.cancels.len(),
      places = plan.places.len(),
      "Reconciled quotes"
    );

    let mut report = TickReport::quoted(inventory.position, prices, plan.kept.len());
    self.execute(plan, now, &mut report).await?;
    Ok(report)
  }

  /// Cancels first, then placements. A lane whose cancel failed gets no
  /// new order this tick so it can never hold two.
  async fn execute(
    &self,
    plan: ReconcilePlan,
    now: DateTime<Utc>,
    report: &mut TickReport,
  ) -> Result<(), EngineError> {
    let mut blocked: BTreeSet<(Side, Action)> = BTreeSet::new();

    for cancel in plan.cancels {
      self.ensure_running()?;
      let order = &cancel.order;
      match self.exchange.cancel_order(&order.order_id).await {
        Ok(()) => {
          info!(
            market = %self.market,
            order_id = %order.order_id,
            side = %order.side,
            action = %order.action,
            price = order.price,
            size = order.size,
            reason = cancel.reason.as_str(),
            "Order cancelled"
          );
          if let Some(metrics) = &self.metrics {
            metrics
              .orders_cancelled
              .with_label_values(&[self.market.as_str(), cancel.reason.as_str()])
              .inc();
          }
          report.cancelled.push(order.order_id.clone());
        }
        Err(e) => {
          warn!(
            market = %self.market,
            order_id = %order.order_id,
            side = %order.side,
            action = %order.action,
            price = order.price,
            size = order.size,
            error = %e,
            "Cancel failed"
          );
          self.count_failure("cancel_order");
          report.failures += 1;
          blocked.insert(order.lane());
          if e.is_unrecoverable() {
            return Err(e.into());
          }
        }
      }
    }

    let expiration = self.expiration(now);
    for quote in plan.places {
      if blocked.contains(&quote.lane()) {
        warn!(
          market = %self.market,
          side = %quote.side,
          action = %quote.action,
          price = quote.price,
          size = quote.size,
          "Placement deferred: cancel on the same lane failed"
        );
        if let Some(metrics) = &self.metrics {
          metrics
            .placements_deferred
            .with_label_values(&[self.market.as_str()])
            .inc();
        }
        report.deferred += 1;
        continue;
      }

      self.ensure_running()?;
      let request = OrderRequest::from_quote(&self.market, &quote, expiration);
      match self.exchange.place_order(&request).await {
        Ok(order_id) => {
          info!(
            market = %self.market,
            order_id = %order_id,
            side = %quote.side,
            action = %quote.action,
            price = quote.price,
            size = quote.size,
            "Order placed"
          );
          if let Some(metrics) = &self.metrics {
            metrics
              .orders_placed
              .with_label_values(&[self.market.as_str(), quote.side.as_str(), quote.action.as_str()])
              .inc();
          }
          report.placed.push(order_id);
        }
        Err(e) => {
          warn!(
            market = %self.market,
            side = %quote.side,
            action = %quote.action,
            price = quote.price,
            size = quote.size,
            error = %e,
            "Placement failed"
          );
          self.count_failure("place_order");
          report.failures += 1;
          if e.is_unrecoverable() {
            return Err(e.into());
          }
        }
      }
    }

    Ok(())
  }

  /// Best-effort cancel of every resting order on this market. Ignores
  /// the stop signal. Returns how many cancels succeeded.
  pub async fn cancel_all(&self) -> usize {
    let orders = match self.exchange.get_resting_orders(&self.market).await {
      Ok(orders) => orders,
      Err(e) => {
        warn!(market = %self.market, error = %e, "Cancel-all could not list resting orders");
        self.count_failure("get_resting_orders");
        return 0;
      }
    };

    let mut cancelled = 0;
    for order in &orders {
      match self.exchange.cancel_order(&order.order_id).await {
        Ok(()) => cancelled += 1,
        Err(e) => {
          warn!(
            market = %self.market,
            order_id = %order.order_id,
            side = %order.side,
            action = %order.action,
            price = order.price,
            size = order.size,
            error = %e,
            "Cancel-all: cancel failed"
          );
          self.count_failure("cancel_order");
        }
      }
    }

    info!(
      market = %self.market,
      cancelled,
      failed = orders.len() - cancelled,
      "Cancel-all complete"
    );
    cancelled
  }

  fn ensure_running(&self) -> Result<(), EngineError> {
    if self.stop.is_stopped() {
      Err(EngineError::Stopped)
    } else {
      Ok(())
    }
  }

  fn expiration(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let secs = i64::try_from(self.params.order_expiration_secs).ok()?;
    now.checked_add_signed(TimeDelta::try_seconds(secs)?)
  }

  fn read_failed(&self, operation: &'static str, e: ExchangeError) -> EngineError {
    warn!(market = %self.market, operation, error = %e, "Exchange read failed");
    self.count_failure(operation);
    EngineError::Exchange(e)
  }

  fn count_failure(&self, operation: &str) {
    if let Some(metrics) = &self.metrics {
      metrics
        .order_failures
        .with_label_values(&[self.market.as_str(), operation])
        .inc();
    }
  }

  fn record_tick(&self, result: &Result<TickReport, EngineError>, elapsed: Duration) {
    let Some(metrics) = &self.metrics else {
      return;
    };
    let market = self.market.as_str();
    let outcome = match result {
      Ok(report) => report.outcome.as_str(),
      Err(EngineError::Stopped) => "stopped",
      Err(_) => "failed",
    };
    metrics.ticks.with_label_values(&[market, outcome]).inc();
    metrics
      .tick_latency_ms
      .with_label_values(&[market])
      .observe(elapsed.as_secs_f64() * 1000.0);

    if let Ok(report) = result {
      if let Some(position) = report.position {
        metrics
          .position
          .with_label_values(&[market])
          .set(position as f64);
      }
      if let Some(prices) = &report.prices {
        metrics
          .reservation_price
          .with_label_values(&[market])
          .set(prices.reservation_price);
        metrics.spread.with_label_values(&[market]).set(prices.spread);
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::adapters::paper::PaperExchange;
  use crate::config::PaperConfig;
  use crate::shutdown::ShutdownController;

  fn paper() -> Arc<PaperExchange> {
    Arc::new(PaperExchange::new(&PaperConfig {
      seed: Some(7),
      ..Default::default()
    }))
  }

  #[test]
  fn test_rejects_empty_market_and_zero_dt() {
    let controller = ShutdownController::new();
    let empty = StrategyEngine::new(
      paper(),
      "  ",
      PricingModelKind::Avellaneda,
      StrategyParameters::default(),
      Duration::from_secs(1),
      controller.subscribe(),
    );
    assert!(matches!(empty, Err(ConfigError::InvalidField { .. })));

    let zero_dt = StrategyEngine::new(
      paper(),
      "KXTEST",
      PricingModelKind::Avellaneda,
      StrategyParameters::default(),
      Duration::ZERO,
      controller.subscribe(),
    );
    assert!(zero_dt.is_err());

    let too_slow = StrategyEngine::new(
      paper(),
      "KXTEST",
      PricingModelKind::Avellaneda,
      StrategyParameters::default(),
      MAX_TICK_INTERVAL + Duration::from_secs(1),
      controller.subscribe(),
    );
    assert!(matches!(too_slow, Err(ConfigError::InvalidParameter { name: "dt", .. })));
  }

  #[tokio::test]
  async fn test_tick_after_stop_returns_stopped() {
    let controller = ShutdownController::new();
    let mut engine = StrategyEngine::new(
      paper(),
      "KXTEST",
      PricingModelKind::Avellaneda,
      StrategyParameters::default(),
      Duration::from_secs(1),
      controller.subscribe(),
    )
    .unwrap();
    assert_eq!(engine.state(), EngineState::Idle);

    controller.trigger();
    assert_eq!(engine.tick().await, Err(EngineError::Stopped));
    assert_eq!(engine.state(), EngineState::Stopped);
  }

  #[tokio::test]
  async fn test_expiration_is_order_lifetime_ahead() {
    let controller = ShutdownController::new();
    let engine = StrategyEngine::new(
      paper(),
      "KXTEST",
      PricingModelKind::Avellaneda,
      StrategyParameters::default(),
      Duration::from_secs(1),
      controller.subscribe(),
    )
    .unwrap();
    let now = Utc::now();
    assert_eq!(engine.expiration(now), Some(now + TimeDelta::seconds(300)));
  }
}
