//! Use Cases Layer - Application Business Logic
//!
//! Orchestrates domain logic with the Exchange port.
//!
//! Use cases:
//! - `StrategyEngine`: per-market pricing, risk and reconcile loop
//! - `StrategyRunner`: builds and supervises one engine per strategy

pub mod runner;
pub mod strategy_engine;

pub use runner::{RunningStrategies, StrategyRunner};
pub use strategy_engine::{EngineState, SkipReason, StrategyEngine, TickOutcome, TickReport};
