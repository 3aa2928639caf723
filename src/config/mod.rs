//! Configuration Module - TOML-based Bot Configuration
//!
//! Loads and validates configuration from `config.toml`. Credentials
//! never live here: they come from the environment (optionally a
//! `.env` file). Every strategy is a named `[strategies.<name>]` table.

pub mod loader;

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::domain::market::Side;
use crate::domain::params::StrategyParameters;
use crate::domain::pricing::PricingModelKind;

/// Top-level bot configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
  /// Bot identity and run mode.
  pub bot: BotConfig,
  /// Exchange REST API settings.
  #[serde(default)]
  pub api: ApiConfig,
  /// Metrics and monitoring.
  #[serde(default)]
  pub metrics: MetricsConfig,
  /// Simulated exchange settings (paper mode only).
  #[serde(default)]
  pub paper: PaperConfig,
  /// Named strategies, one engine each.
  #[serde(default)]
  pub strategies: BTreeMap<String, StrategyConfig>,
}

impl AppConfig {
  pub fn active_strategies(&self) -> impl Iterator<Item = (&String, &StrategyConfig)> {
    self.strategies.iter().filter(|(_, s)| s.active)
  }
}

/// Where orders go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BotMode {
  /// Simulated exchange, no credentials needed.
  #[default]
  Paper,
  /// Real Kalshi orders.
  Live,
}

/// Bot identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
  /// Human-readable bot name.
  pub name: String,
  /// Log level (trace, debug, info, warn, error).
  #[serde(default = "default_log_level")]
  pub log_level: String,
  #[serde(default)]
  pub mode: BotMode,
  /// Also write daily-rolling JSON logs into this directory.
  #[serde(default)]
  pub log_dir: Option<String>,
}

/// Kalshi REST API configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  /// REST base URL, overridable by `KALSHI_BASE_URL`.
  #[serde(default = "default_base_url")]
  pub base_url: String,
  /// Per-request timeout in milliseconds.
  #[serde(default = "default_timeout_ms")]
  pub timeout_ms: u64,
  /// Maximum in-flight requests across all engines.
  #[serde(default = "default_max_concurrent")]
  pub max_concurrent: usize,
  /// Retries after the first attempt for 429/5xx/network failures.
  #[serde(default = "default_max_retries")]
  pub max_retries: u32,
  /// Base of the exponential backoff.
  #[serde(default = "default_retry_base_delay_ms")]
  pub retry_base_delay_ms: u64,
  /// Client-side request budget.
  #[serde(default = "default_requests_per_second")]
  pub requests_per_second: u32,
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      base_url: default_base_url(),
      timeout_ms: default_timeout_ms(),
      max_concurrent: default_max_concurrent(),
      max_retries: default_max_retries(),
      retry_base_delay_ms: default_retry_base_delay_ms(),
      requests_per_second: default_requests_per_second(),
    }
  }
}

/// Metrics and monitoring configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
  /// Enable Prometheus metrics export.
  #[serde(default = "default_true")]
  pub enabled: bool,
  /// Metrics server bind address.
  #[serde(default = "default_metrics_addr")]
  pub bind_address: String,
  /// Health check endpoint port.
  #[serde(default = "default_health_port")]
  pub health_port: u16,
}

impl Default for MetricsConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      bind_address: default_metrics_addr(),
      health_port: default_health_port(),
    }
  }
}

/// Simulated exchange configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PaperConfig {
  /// Starting YES mid for every market.
  #[serde(default = "default_initial_price")]
  pub initial_price: f64,
  /// Max absolute mid move per snapshot.
  #[serde(default = "default_volatility")]
  pub volatility: f64,
  /// Distance from mid to the simulated best bid/ask.
  #[serde(default = "default_book_half_spread")]
  pub book_half_spread: f64,
  /// Fixed RNG seed for reproducible runs.
  #[serde(default)]
  pub seed: Option<u64>,
}

impl Default for PaperConfig {
  fn default() -> Self {
    Self {
      initial_price: default_initial_price(),
      volatility: default_volatility(),
      book_half_spread: default_book_half_spread(),
      seed: None,
    }
  }
}

/// One quoting strategy bound to one market.
#[derive(Debug, Clone, Deserialize)]
pub struct StrategyConfig {
  pub market_ticker: String,
  #[serde(default = "default_trade_side")]
  pub trade_side: Side,
  /// Seconds between ticks.
  #[serde(default = "default_dt")]
  pub dt: f64,
  #[serde(default)]
  pub model: PricingModelKind,
  #[serde(default = "default_gamma")]
  pub gamma: f64,
  #[serde(default = "default_k")]
  pub k: f64,
  #[serde(default = "default_sigma")]
  pub sigma: f64,
  /// Horizon in seconds.
  #[serde(default = "default_horizon", alias = "T")]
  pub horizon_secs: f64,
  #[serde(default = "default_max_position")]
  pub max_position: u32,
  /// Resting order lifetime in seconds.
  #[serde(default = "default_order_expiration")]
  pub order_expiration: u64,
  #[serde(default = "default_min_spread")]
  pub min_spread: f64,
  #[serde(default = "default_position_limit_buffer")]
  pub position_limit_buffer: f64,
  #[serde(default = "default_inventory_skew_factor")]
  pub inventory_skew_factor: f64,
  #[serde(default = "default_order_size")]
  pub order_size: u32,
  #[serde(default = "default_true")]
  pub active: bool,
}

impl StrategyConfig {
  /// Model parameters, not yet validated.
  pub fn parameters(&self) -> StrategyParameters {
    StrategyParameters {
      gamma: self.gamma,
      k: self.k,
      sigma: self.sigma,
      horizon_secs: self.horizon_secs,
      max_position: self.max_position,
      order_expiration_secs: self.order_expiration,
      min_spread: self.min_spread,
      position_limit_buffer: self.position_limit_buffer,
      inventory_skew_factor: self.inventory_skew_factor,
      trade_side: self.trade_side,
      order_size: self.order_size,
    }
  }
}

// Default value functions for serde

fn default_log_level() -> String {
  "info".to_string()
}

fn default_true() -> bool {
  true
}

fn default_base_url() -> String {
  "https://api.elections.kalshi.com/trade-api/v2".to_string()
}

fn default_timeout_ms() -> u64 {
  10_000
}

fn default_max_concurrent() -> usize {
  8
}

fn default_max_retries() -> u32 {
  3
}

fn default_retry_base_delay_ms() -> u64 {
  200
}

fn default_requests_per_second() -> u32 {
  10
}

fn default_metrics_addr() -> String {
  "0.0.0.0:9090".to_string()
}

fn default_health_port() -> u16 {
  8080
}

fn default_initial_price() -> f64 {
  0.5
}

fn default_volatility() -> f64 {
  0.01
}

fn default_book_half_spread() -> f64 {
  0.02
}

fn default_trade_side() -> Side {
  Side::Yes
}

fn default_dt() -> f64 {
  1.0
}

fn default_gamma() -> f64 {
  0.1
}

fn default_k() -> f64 {
  1.5
}

fn default_sigma() -> f64 {
  0.5
}

fn default_horizon() -> f64 {
  3600.0
}

fn default_max_position() -> u32 {
  100
}

fn default_order_expiration() -> u64 {
  300
}

fn default_min_spread() -> f64 {
  0.01
}

fn default_position_limit_buffer() -> f64 {
  0.1
}

fn default_inventory_skew_factor() -> f64 {
  0.01
}

fn default_order_size() -> u32 {
  1
}
