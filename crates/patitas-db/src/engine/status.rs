//! # Status Changes
//!
//! Drives the state machine table and applies its stock side effect in
//! the same transaction as the status write.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::{info, warn};

use crate::engine::{commit_or_rollback, SaleEngine};
use crate::error::{EngineError, EngineResult};
use crate::repository::SaleRepository;
use crate::stock::{StockDirection, StockLedger};
use patitas_core::{
    plan_transition, SaleAggregate, SaleKind, SaleStatus, StockSideEffect, ValidationError,
};

impl SaleEngine {
    /// Moves a sale to a new status.
    ///
    /// Only ordinary sales accept status requests; compensating
    /// returns and exchanges are immutable once written.
    ///
    /// `skip_stock_return` is an explicit, audited escape hatch for
    /// callers that already reversed stock elsewhere; it is honored
    /// only on transitions the table marks skippable and is never the
    /// default.
    pub async fn change_status(
        &self,
        sale_id: &str,
        new_status: SaleStatus,
        skip_stock_return: bool,
    ) -> EngineResult<SaleAggregate> {
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;
        let result = change_status_in_tx(&mut tx, sale_id, new_status, skip_stock_return, now).await;
        let previous = commit_or_rollback(tx, result).await?;

        info!(sale_id = %sale_id, from = ?previous, to = ?new_status, "Sale status changed");

        if let Err(err) = self
            .notifier
            .sale_status_changed(sale_id, previous, new_status)
            .await
        {
            warn!(sale_id = %sale_id, error = %err, "Post-commit notification failed");
        }

        self.get_sale(sale_id).await
    }
}

async fn change_status_in_tx(
    conn: &mut SqliteConnection,
    sale_id: &str,
    new_status: SaleStatus,
    skip_stock_return: bool,
    now: DateTime<Utc>,
) -> EngineResult<SaleStatus> {
    let sale = SaleRepository::fetch_header_in_tx(conn, sale_id)
        .await?
        .ok_or_else(|| EngineError::not_found("Sale", sale_id))?;

    // Compensating sales carry per-line stock deltas (negative returned
    // lines, positive exchange lines) that a blanket reversal cannot
    // unwind, and cancelling one would silently reopen quantities the
    // origin's return accounting already counted.
    if sale.kind != SaleKind::Sale {
        return Err(ValidationError::NotAllowed {
            field: "kind".to_string(),
            allowed: vec!["sale".to_string()],
        }
        .into());
    }

    let side_effect = plan_transition(sale.status, new_status)?;

    match side_effect {
        StockSideEffect::None => {}
        StockSideEffect::ReverseAll { skippable } => {
            if skippable && skip_stock_return {
                info!(sale_id = %sale_id, "Stock reversal skipped on explicit request");
            } else {
                reverse_all_lines(conn, sale_id).await?;
            }
        }
    }

    SaleRepository::set_status_in_tx(conn, sale_id, new_status, now).await?;

    Ok(sale.status)
}

/// Increments stock for every product line of the sale, undoing the
/// decrement applied at composition.
async fn reverse_all_lines(conn: &mut SqliteConnection, sale_id: &str) -> EngineResult<()> {
    let lines = SaleRepository::fetch_product_lines_in_tx(conn, sale_id).await?;

    for line in &lines {
        if line.quantity > 0 {
            StockLedger::adjust(conn, &line.product_id, line.quantity, StockDirection::Increment)
                .await?;
        }
    }

    Ok(())
}
