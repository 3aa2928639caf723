//! Kalshi Trade API Adapter
//!
//! Implements the `Exchange` port over the Kalshi REST API.
//!
//! Sub-modules:
//! - `auth`: API-key request signing, with login as a fallback
//! - `client`: HTTP client with auth, rate limiting and retries
//! - `exchange`: the `Exchange` implementation
//! - `types`: API request/response type definitions

pub mod auth;
pub mod client;
pub mod exchange;
pub mod types;

pub use self::auth::{ApiKeySigner, KalshiCredentials};
pub use self::client::{KalshiClient, KalshiClientConfig};
pub use self::exchange::KalshiExchange;
