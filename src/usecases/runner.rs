//! Strategy Runner - One Engine per Configured Market
//!
//! Builds every engine up front so a bad strategy aborts startup before
//! anything touches the exchange, then runs each on its own task.
//! Engines share only the Exchange and own disjoint markets; a panic or
//! failure in one never reaches its siblings.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use futures_util::future::join_all;
use tokio::task::JoinHandle;
use tracing::{Instrument, error, info, info_span, warn};

use crate::adapters::metrics::{HealthState, MetricsRegistry};
use crate::config::StrategyConfig;
use crate::error::ConfigError;
use crate::ports::exchange::Exchange;
use crate::shutdown::StopSignal;

use super::strategy_engine::StrategyEngine;

/// Keeps the readiness count honest even if the engine task panics.
struct RunningGuard(Arc<HealthState>);

impl RunningGuard {
  fn new(health: Arc<HealthState>) -> Self {
    health.engine_started();
    Self(health)
  }
}

impl Drop for RunningGuard {
  fn drop(&mut self) {
    self.0.engine_stopped();
  }
}

/// Validated, not yet running, set of engines.
pub struct StrategyRunner {
  engines: Vec<(String, StrategyEngine<dyn Exchange>)>,
  health: Arc<HealthState>,
}

impl StrategyRunner {
  /// Build one engine per active strategy.
  ///
  /// # Errors
  /// The first strategy whose parameters fail validation, or that shares
  /// its market with an earlier active strategy, named.
  pub fn build(
    exchange: Arc<dyn Exchange>,
    strategies: &BTreeMap<String, StrategyConfig>,
    stop: &StopSignal,
    metrics: Option<Arc<MetricsRegistry>>,
    health: Arc<HealthState>,
  ) -> Result<Self> {
    let mut engines = Vec::new();
    let mut markets = BTreeSet::new();

    for (name, strategy) in strategies {
      if !strategy.active {
        info!(strategy = %name, "Strategy inactive, skipping");
        continue;
      }
      anyhow::ensure!(
        markets.insert(strategy.market_ticker.trim()),
        "Invalid strategy `{name}`: market {} already has an active strategy",
        strategy.market_ticker
      );

      let dt = Duration::try_from_secs_f64(strategy.dt)
        .map_err(|_| ConfigError::param("dt", strategy.dt, "must be a finite, non-negative number of seconds"))
        .with_context(|| format!("Invalid strategy `{name}`"))?;
      let mut engine = StrategyEngine::new(
        Arc::clone(&exchange),
        strategy.market_ticker.clone(),
        strategy.model,
        strategy.parameters(),
        dt,
        stop.clone(),
      )
      .with_context(|| format!("Invalid strategy `{name}`"))?;

      if let Some(metrics) = &metrics {
        engine = engine.with_metrics(Arc::clone(metrics));
      }
      engines.push((name.clone(), engine));
    }

    if engines.is_empty() {
      warn!("No active strategies configured");
    }

    Ok(Self { engines, health })
  }

  pub fn len(&self) -> usize {
    self.engines.len()
  }

  pub fn is_empty(&self) -> bool {
    self.engines.is_empty()
  }

  /// Spawn every engine inside a `strategy` span.
  pub fn spawn(self) -> RunningStrategies {
    let handles = self
      .engines
      .into_iter()
      .map(|(name, engine)| {
        let span = info_span!("strategy", name = %name, market = engine.market());
        let guard = RunningGuard::new(Arc::clone(&self.health));
        let handle = tokio::spawn(
          async move {
            let _guard = guard;
            engine.run().await;
          }
          .instrument(span),
        );
        (name, handle)
      })
      .collect::<Vec<_>>();

    info!(engines = handles.len(), "Strategies running");
    RunningStrategies { handles }
  }
}

/// Handles of spawned engines.
pub struct RunningStrategies {
  handles: Vec<(String, JoinHandle<()>)>,
}

impl RunningStrategies {
  /// Wait for every engine to finish. Returns how many ended abnormally.
  pub async fn wait(self) -> usize {
    let (names, handles): (Vec<_>, Vec<_>) = self.handles.into_iter().unzip();
    let results = join_all(handles).await;

    let mut failed = 0;
    for (name, result) in names.iter().zip(results) {
      if let Err(e) = result {
        failed += 1;
        error!(strategy = %name, error = %e, "Strategy task ended abnormally");
      }
    }
    failed
  }
}
