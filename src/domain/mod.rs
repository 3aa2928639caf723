//! Domain layer - quoting math and order bookkeeping.
//!
//! Pure, synchronous and deterministic: nothing here touches the network
//! or the clock. Every type is testable in isolation.

pub mod market;
pub mod order;
pub mod params;
pub mod pricing;
pub mod reconcile;
pub mod risk;
pub mod sizing;

pub use market::{Action, MarketSnapshot, Side};
pub use order::{InventoryState, MarketId, OrderId, OrderRequest, Quote, RestingOrder};
pub use params::StrategyParameters;
pub use pricing::{
    AvellanedaStoikov, FixedSpread, PennyJump, PricingModel, PricingModelKind, QuotePrices,
    build_model,
};
pub use reconcile::{CancelAction, CancelReason, OrderReconciler, ReconcilePlan};
pub use risk::RiskLimiter;
pub use sizing::{QuoteSizer, QuoteSizes};
