//! Ports Layer - Hexagonal Architecture Boundaries
//!
//! Defines the interfaces (traits) that the usecases layer requires
//! from the outside world. Adapters implement these traits.
//!
//! Port categories:
//! - `Exchange`: market snapshots, positions, and order management

pub mod exchange;

pub use exchange::Exchange;
