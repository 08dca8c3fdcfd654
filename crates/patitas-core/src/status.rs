//! # Sale State Machine
//!
//! Status transitions as a closed table, queried once per change request.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Transition Table                                   │
//! │                                                                         │
//! │   Pending ──approve──► Effective          (no stock effect)            │
//! │   Pending ──reject───► Cancelled          (reverse, skippable)         │
//! │   Effective ─────────► Cancelled          (reverse all lines)          │
//! │   Effective ─────────► Returned           (reverse all lines)          │
//! │                                                                         │
//! │   Terminal: Cancelled, Returned — nothing leaves them.                 │
//! │   Anything else → InvalidStatus, no write reaches the database.        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `PartiallyReturned`, and `Returned` reached through partial returns,
//! are written only by the return processor together with the matching
//! per-line stock deltas. They are not in this table: requesting them
//! directly would flip the status without moving any stock.
//!
//! Stock is decremented at creation regardless of initial status, so
//! `Pending → Effective` touches no stock and every path into
//! `Cancelled`/`Returned` reverses it exactly once. The skippable
//! reversal on `Pending → Cancelled` exists for callers that already
//! reversed stock elsewhere; skipping is an explicit, audited request,
//! never the default.

use crate::error::{CoreError, CoreResult};
use crate::types::SaleStatus;

/// Stock side effect a status transition carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockSideEffect {
    /// No stock movement for this transition.
    None,
    /// Increment stock for every product line of the sale, in the same
    /// transaction as the status write. When `skippable` is true the
    /// caller may opt out via the `skip_stock_return` flag.
    ReverseAll { skippable: bool },
}

/// Looks up `from → to` in the transition table.
///
/// Returns the stock side effect to apply, or `InvalidStatus` when the
/// transition is not in the table. Transitions driven by the return
/// processor (into `PartiallyReturned`, and `PartiallyReturned` into
/// `Returned`) are deliberately absent: the processor writes those
/// statuses itself, paired with per-line stock deltas.
pub fn plan_transition(from: SaleStatus, to: SaleStatus) -> CoreResult<StockSideEffect> {
    use SaleStatus::*;

    match (from, to) {
        (Pending, Effective) => Ok(StockSideEffect::None),
        (Pending, Cancelled) => Ok(StockSideEffect::ReverseAll { skippable: true }),
        (Effective, Cancelled) => Ok(StockSideEffect::ReverseAll { skippable: false }),
        (Effective, Returned) => Ok(StockSideEffect::ReverseAll { skippable: false }),
        _ => Err(CoreError::InvalidStatus { from, to }),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
