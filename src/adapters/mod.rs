//! Adapters Layer - Hexagonal Architecture Outer Ring
//!
//! Implements the port traits defined in `crate::ports` with concrete
//! external dependencies (HTTP clients, in-memory simulation) and
//! hosts the observability servers.
//!
//! Adapter categories:
//! - `kalshi`: Kalshi trade REST API client and `Exchange` impl
//! - `paper`: simulated `Exchange` for dry runs
//! - `metrics`: Prometheus metrics export and health checks

pub mod kalshi;
pub mod metrics;
pub mod paper;
