//! Error taxonomy shared by the domain, ports and usecases layers.
//!
//! - `ConfigError`: invalid strategy parameters, fatal at construction
//! - `PricingError`: no quotable price this tick (tick is skipped)
//! - `ExchangeError`: a single Exchange call failed
//! - `EngineError`: why a tick ended early
//!
//! Application wiring (`main`, config loading) wraps these in `anyhow`.

use thiserror::Error;

/// Invalid strategy configuration. Raised once at engine construction,
/// never while ticking.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
  /// A numeric parameter is outside its allowed range.
  #[error("invalid parameter `{name}` = {value}: {reason}")]
  InvalidParameter {
    name: &'static str,
    value: f64,
    reason: &'static str,
  },

  /// A required identifier is empty or malformed.
  #[error("invalid {field}: {reason}")]
  InvalidField { field: &'static str, reason: String },
}

impl ConfigError {
  pub(crate) fn param(name: &'static str, value: f64, reason: &'static str) -> Self {
    Self::InvalidParameter { name, value, reason }
  }
}

/// The pricing model could not produce quotes for this snapshot.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PricingError {
  /// One-sided or empty book on the traded side: mid is undefined.
  #[error("no two-sided quote available on the traded side")]
  NoQuoteAvailable,

  /// Book is too tight for the model to quote inside it.
  #[error("book too tight to quote profitably")]
  NoEdge,
}

/// Failure of a single Exchange call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExchangeError {
  /// The market has no usable quote right now.
  #[error("no quote available for {market}")]
  QuoteUnavailable { market: String },

  /// The exchange refused or could not confirm an order placement.
  #[error("order placement failed: {reason}")]
  Placement { reason: String },

  /// Cancellation failed; the order may still be resting.
  #[error("cancel of order {order_id} failed: {reason}")]
  Cancel { order_id: String, reason: String },

  /// Non-retryable HTTP status on a read request.
  #[error("request rejected with status {status}: {body}")]
  Rejected { status: u16, body: String },

  /// Session is invalid and could not be re-established.
  #[error("authentication failed: {0}")]
  Auth(String),

  /// Rate limit or server error that survived all retries. Local to the
  /// one call; the exchange itself is still reachable.
  #[error("exchange unavailable (status {status})")]
  Unavailable { status: u16 },

  /// Connection-level failure that survived all retries.
  #[error("transport failure: {0}")]
  Transport(String),

  /// Response body did not have the expected shape.
  #[error("malformed response: {0}")]
  Decode(String),
}

impl ExchangeError {
  /// Whether this failure should end the current tick instead of being
  /// contained to the one call that produced it.
  pub fn is_unrecoverable(&self) -> bool {
    matches!(self, Self::Auth(_) | Self::Transport(_))
  }
}

/// Reason a tick (or the engine) stopped early.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
  #[error(transparent)]
  Configuration(#[from] ConfigError),

  #[error("exchange call failed: {0}")]
  Exchange(#[from] ExchangeError),

  /// The stop signal fired between two suspension points.
  #[error("engine stopped")]
  Stopped,
}
