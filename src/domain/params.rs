//! Strategy parameters.
//!
//! Immutable for the lifetime of one engine. `validate` is the single
//! gate: a model or limiter is never built from unvalidated values.

use serde::{Deserialize, Serialize};

use super::market::{MAX_PRICE, MIN_PRICE, Side};
use crate::error::ConfigError;

/// Parameters of one quoting strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyParameters {
    /// Risk aversion γ (> 0).
    pub gamma: f64,
    /// Order-arrival decay k (> 0).
    pub k: f64,
    /// Volatility estimate σ per √second (≥ 0).
    pub sigma: f64,
    /// Horizon T in seconds (> 0).
    pub horizon_secs: f64,
    /// Absolute inventory cap in contracts.
    pub max_position: u32,
    /// Resting order lifetime in seconds.
    pub order_expiration_secs: u64,
    /// Spread floor in dollars (≥ 0).
    pub min_spread: f64,
    /// Fraction of `max_position` held back as headroom, in [0, 1).
    pub position_limit_buffer: f64,
    /// Extra per-contract quote lean in dollars (≥ 0).
    pub inventory_skew_factor: f64,
    /// Contract side being traded.
    pub trade_side: Side,
    /// Contracts per quote before inventory scaling and limits.
    pub order_size: u32,
}

impl Default for StrategyParameters {
    fn default() -> Self {
        Self {
            gamma: 0.1,
            k: 1.5,
            sigma: 0.5,
            horizon_secs: 3600.0,
            max_position: 100,
            order_expiration_secs: 300,
            min_spread: 0.01,
            position_limit_buffer: 0.1,
            inventory_skew_factor: 0.01,
            trade_side: Side::Yes,
            order_size: 1,
        }
    }
}

impl StrategyParameters {
    /// Check every range constraint, returning the parameters unchanged
    /// when they are usable.
    pub fn validate(self) -> Result<Self, ConfigError> {
        if !(self.gamma.is_finite() && self.gamma > 0.0) {
            return Err(ConfigError::param("gamma", self.gamma, "must be positive"));
        }
        if !(self.k.is_finite() && self.k > 0.0) {
            return Err(ConfigError::param("k", self.k, "must be positive"));
        }
        if !(self.sigma.is_finite() && self.sigma >= 0.0) {
            return Err(ConfigError::param("sigma", self.sigma, "must be non-negative"));
        }
        if !(self.horizon_secs.is_finite() && self.horizon_secs > 0.0) {
            return Err(ConfigError::param("T", self.horizon_secs, "must be positive"));
        }
        if self.max_position == 0 {
            return Err(ConfigError::param("max_position", 0.0, "must be positive"));
        }
        if self.order_expiration_secs == 0 {
            return Err(ConfigError::param("order_expiration", 0.0, "must be positive"));
        }
        if !(self.min_spread.is_finite() && (0.0..=MAX_PRICE - MIN_PRICE).contains(&self.min_spread)) {
            return Err(ConfigError::param(
                "min_spread",
                self.min_spread,
                "must be in [0, 0.98]",
            ));
        }
        if !(0.0..1.0).contains(&self.position_limit_buffer) {
            return Err(ConfigError::param(
                "position_limit_buffer",
                self.position_limit_buffer,
                "must be in [0, 1)",
            ));
        }
        if self.position_limit() < 1.0 {
            return Err(ConfigError::param(
                "position_limit_buffer",
                self.position_limit_buffer,
                "leaves less than one contract of headroom",
            ));
        }
        if !(self.inventory_skew_factor.is_finite() && self.inventory_skew_factor >= 0.0) {
            return Err(ConfigError::param(
                "inventory_skew_factor",
                self.inventory_skew_factor,
                "must be non-negative",
            ));
        }
        if self.order_size == 0 {
            return Err(ConfigError::param("order_size", 0.0, "must be positive"));
        }
        Ok(self)
    }

    /// Effective inventory limit `max_position · (1 − buffer)`, applied
    /// to both the long and the short direction.
    pub fn position_limit(&self) -> f64 {
        f64::from(self.max_position) * (1.0 - self.position_limit_buffer)
    }

    /// Remaining horizon `T − t` in seconds, never negative.
    pub fn remaining_horizon(&self, elapsed_secs: f64) -> f64 {
        (self.horizon_secs - elapsed_secs).max(0.0)
    }
}
