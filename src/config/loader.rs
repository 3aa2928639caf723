//! Configuration Loader - File Loading and Validation
//!
//! Handles loading `config.toml`, validating all parameters, and
//! providing clear error messages for misconfiguration. Strategy
//! parameters go through the same validation the engines use, so a
//! config that loads is a config every engine accepts.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use super::AppConfig;
use crate::usecases::strategy_engine::MAX_TICK_INTERVAL;

/// Load and validate configuration from a TOML file.
///
/// # Errors
/// Returns detailed error if:
/// - File doesn't exist or can't be read
/// - TOML parsing fails
/// - Validation rules are violated
pub fn load_config(path: impl AsRef<Path>) -> Result<AppConfig> {
  let path = path.as_ref();

  let content = std::fs::read_to_string(path)
    .with_context(|| format!("Failed to read config file: {}", path.display()))?;

  let config = parse_config(&content)
    .with_context(|| format!("Invalid config file: {}", path.display()))?;

  info!(
    strategies = config.strategies.len(),
    active = config.active_strategies().count(),
    mode = ?config.bot.mode,
    "Configuration loaded successfully"
  );

  Ok(config)
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<AppConfig> {
  let config: AppConfig = toml::from_str(content).context("Failed to parse TOML")?;
  validate_config(&config)?;
  Ok(config)
}

/// Validate all configuration parameters.
fn validate_config(config: &AppConfig) -> Result<()> {
  anyhow::ensure!(
    !config.bot.name.trim().is_empty(),
    "bot.name must not be empty"
  );

  // API validation
  anyhow::ensure!(
    !config.api.base_url.is_empty(),
    "api.base_url must not be empty"
  );
  anyhow::ensure!(config.api.timeout_ms > 0, "api.timeout_ms must be positive");
  anyhow::ensure!(
    config.api.max_concurrent > 0,
    "api.max_concurrent must be positive"
  );
  anyhow::ensure!(
    config.api.requests_per_second > 0,
    "api.requests_per_second must be positive"
  );

  // Paper exchange validation
  let paper = &config.paper;
  anyhow::ensure!(
    paper.volatility >= 0.0 && paper.volatility < 0.5,
    "paper.volatility must be in [0, 0.5), got {}",
    paper.volatility
  );
  anyhow::ensure!(
    paper.book_half_spread >= 0.01 && paper.book_half_spread <= 0.2,
    "paper.book_half_spread must be in [0.01, 0.2], got {}",
    paper.book_half_spread
  );
  anyhow::ensure!(
    paper.initial_price > 0.0 && paper.initial_price < 1.0,
    "paper.initial_price must be in (0, 1), got {}",
    paper.initial_price
  );

  // Strategy validation
  anyhow::ensure!(
    config.active_strategies().count() > 0,
    "At least one active strategy must be configured"
  );

  for (name, strategy) in &config.strategies {
    anyhow::ensure!(
      !strategy.market_ticker.trim().is_empty(),
      "Strategy `{name}` has empty market_ticker"
    );
    anyhow::ensure!(
      strategy.dt.is_finite() && strategy.dt > 0.0 && strategy.dt <= MAX_TICK_INTERVAL.as_secs_f64(),
      "Strategy `{name}`: dt must be in (0, {}] seconds, got {}",
      MAX_TICK_INTERVAL.as_secs(),
      strategy.dt
    );
    strategy
      .parameters()
      .validate()
      .with_context(|| format!("Strategy `{name}`"))?;
  }

  // Each engine treats every resting order on its market as its own.
  let mut owners: BTreeMap<&str, &str> = BTreeMap::new();
  for (name, strategy) in config.active_strategies() {
    if let Some(other) = owners.insert(strategy.market_ticker.trim(), name.as_str()) {
      anyhow::bail!(
        "Strategies `{other}` and `{name}` are both active on market {}",
        strategy.market_ticker
      );
    }
  }

  Ok(())
}
