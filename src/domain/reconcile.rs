//! Diff desired quotes against what is actually resting.
//!
//! A resting order satisfies a quote when side and action match, the
//! price is within half a cent, and the size is equal. Each quote is
//! satisfied by at most one order; extra matches are cancelled as
//! duplicates. Orders past their lifetime are cancelled regardless of
//! price so the book refreshes.

use chrono::{DateTime, Utc};

use super::order::{OrderId, Quote, RestingOrder};

/// Half a cent: anything closer is the same grid price.
pub const PRICE_TOLERANCE: f64 = 0.005;

/// Why a resting order is being cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// Older than the configured order lifetime.
    Expired,
    /// No desired quote matches it any more.
    Stale,
    /// Another resting order already satisfies the same quote.
    Duplicate,
}

impl CancelReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Expired => "expired",
            Self::Stale => "stale",
            Self::Duplicate => "duplicate",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CancelAction {
    pub order: RestingOrder,
    pub reason: CancelReason,
}

/// Actions for one tick. Cancels are issued before placements.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcilePlan {
    pub cancels: Vec<CancelAction>,
    pub places: Vec<Quote>,
    /// Resting orders left untouched.
    pub kept: Vec<OrderId>,
}

impl ReconcilePlan {
    pub fn is_empty(&self) -> bool {
        self.cancels.is_empty() && self.places.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct OrderReconciler {
    order_expiration_secs: i64,
}

impl OrderReconciler {
    pub fn new(order_expiration_secs: u64) -> Self {
        Self {
            order_expiration_secs: i64::try_from(order_expiration_secs).unwrap_or(i64::MAX),
        }
    }

    pub fn reconcile(
        &self,
        desired: &[Quote],
        resting: &[RestingOrder],
        now: DateTime<Utc>,
    ) -> ReconcilePlan {
        let mut satisfied = vec![false; desired.len()];
        let mut plan = ReconcilePlan::default();

        for order in resting {
            if self.is_expired(order, now) {
                plan.cancels.push(CancelAction {
                    order: order.clone(),
                    reason: CancelReason::Expired,
                });
                continue;
            }

            let free = desired
                .iter()
                .enumerate()
                .position(|(i, quote)| !satisfied[i] && matches(quote, order));
            match free {
                Some(i) => {
                    satisfied[i] = true;
                    plan.kept.push(order.order_id.clone());
                }
                None => {
                    let reason = if desired.iter().any(|quote| matches(quote, order)) {
                        CancelReason::Duplicate
                    } else {
                        CancelReason::Stale
                    };
                    plan.cancels.push(CancelAction {
                        order: order.clone(),
                        reason,
                    });
                }
            }
        }

        plan.places = desired
            .iter()
            .zip(&satisfied)
            .filter(|(_, done)| !**done)
            .map(|(quote, _)| *quote)
            .collect();
        plan
    }

    fn is_expired(&self, order: &RestingOrder, now: DateTime<Utc>) -> bool {
        order.expires_at.is_some_and(|at| at <= now)
            || order
                .age_secs(now)
                .is_some_and(|age| age > self.order_expiration_secs)
    }
}

fn matches(quote: &Quote, order: &RestingOrder) -> bool {
    quote.side == order.side
        && quote.action == order.action
        && quote.size == order.size
        && (quote.price - order.price).abs() < PRICE_TOLERANCE
}
