//! # Return/Exchange Processor
//!
//! Creates a brand-new compensating sale linked to the original,
//! applies inverse stock deltas for returned items and forward deltas
//! for exchanged items, and reclassifies the original sale. History is
//! never mutated in place; the origin-sale link preserves the audit
//! chain.
//!
//! Stock moves line by line here, so the original sale's status is
//! written directly instead of routing through the state machine's
//! reverse-all side effect (which would double-apply the increments).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::request::{ProcessReturnRequest, ValidatedReturn};
use crate::engine::{commit_or_rollback, SaleEngine};
use crate::error::{EngineError, EngineResult};
use crate::repository::{ProductRepository, SaleRepository};
use crate::stock::{StockDirection, StockLedger};
use patitas_core::{
    price_product_line, CoreError, Money, ProductLine, Sale, SaleAggregate, SaleKind,
    SaleStatus, ValidationError,
};

impl SaleEngine {
    /// Processes a return/exchange against an existing sale.
    ///
    /// Returns the compensating sale's aggregate. The original sale is
    /// reclassified in the same transaction: `Returned` when every
    /// original unit has come back, `PartiallyReturned` when only some
    /// have, unchanged for a pure product swap.
    pub async fn process_return(
        &self,
        request: ProcessReturnRequest,
    ) -> EngineResult<SaleAggregate> {
        let now = Utc::now();
        let validated = request.validate()?;

        let mut tx = self.pool.begin().await?;
        let result = process_return_in_tx(&mut tx, &validated, now).await;
        let new_sale_id = commit_or_rollback(tx, result).await?;

        info!(
            origin_sale_id = %validated.origin_sale_id,
            sale_id = %new_sale_id,
            "Return processed"
        );

        let aggregate = self.sales().get_aggregate(&new_sale_id).await?;

        if let Err(err) = self
            .notifier
            .return_processed(&validated.origin_sale_id, &aggregate)
            .await
        {
            warn!(sale_id = %new_sale_id, error = %err, "Post-commit notification failed");
        }

        Ok(aggregate)
    }
}

async fn process_return_in_tx(
    conn: &mut SqliteConnection,
    validated: &ValidatedReturn,
    now: DateTime<Utc>,
) -> EngineResult<String> {
    let origin = SaleRepository::fetch_header_in_tx(conn, &validated.origin_sale_id)
        .await?
        .ok_or_else(|| EngineError::not_found("Sale", &validated.origin_sale_id))?;

    // Only settled merchandise can come back.
    if !matches!(
        origin.status,
        SaleStatus::Effective | SaleStatus::PartiallyReturned
    ) {
        return Err(CoreError::InvalidStatus {
            from: origin.status,
            to: SaleStatus::Returned,
        }
        .into());
    }

    let origin_lines = SaleRepository::fetch_product_lines_in_tx(conn, &origin.id).await?;

    // Original quantities and price snapshots, keyed by product.
    let mut originals: HashMap<&str, &ProductLine> = HashMap::new();
    for line in origin_lines.iter().filter(|l| l.quantity > 0) {
        originals.insert(line.product_id.as_str(), line);
    }

    // Quantities already returned by earlier compensating sales.
    let mut already_returned: HashMap<String, i64> = HashMap::new();
    for row in SaleRepository::returned_quantities_in_tx(conn, &origin.id).await? {
        already_returned.insert(row.product_id, row.quantity);
    }

    for line in &validated.returned_lines {
        let original = originals
            .get(line.product_id.as_str())
            .ok_or_else(|| EngineError::not_found("Origin sale line", &line.product_id))?;

        let prior = already_returned
            .get(&line.product_id)
            .copied()
            .unwrap_or(0);
        let remaining = original.quantity - prior;

        if line.quantity > remaining {
            return Err(ValidationError::OutOfRange {
                field: "quantity".to_string(),
                min: 1,
                max: remaining.max(0),
            }
            .into());
        }
    }

    let kind = if validated.exchange_lines.is_empty() {
        SaleKind::Return
    } else {
        SaleKind::Exchange
    };

    let sale_id = Uuid::new_v4().to_string();
    let mut sale = Sale {
        id: sale_id.clone(),
        customer_id: origin.customer_id.clone(),
        user_id: validated.user_id.clone(),
        status: SaleStatus::Effective,
        kind,
        subtotal_cents: 0,
        tax_cents: 0,
        total_cents: 0,
        payment_method: origin.payment_method,
        tendered_cents: None,
        change_cents: None,
        payment_reference: None,
        origin_sale_id: Some(origin.id.clone()),
        notes: None,
        receipt_attachment: None,
        sold_at: now,
        created_at: now,
        updated_at: now,
    };
    SaleRepository::insert_header_in_tx(conn, &sale).await?;

    let mut subtotal = Money::zero();
    let mut tax = Money::zero();

    // Returned lines: negative quantity, priced from the origin's
    // snapshot, stock comes back in.
    for line in &validated.returned_lines {
        let original = originals
            .get(line.product_id.as_str())
            .copied()
            .ok_or_else(|| EngineError::not_found("Origin sale line", &line.product_id))?;

        let quantity = -line.quantity;
        let line_subtotal = Money::from_cents(original.unit_price_cents).multiply_quantity(quantity);
        let line_tax = Money::from_cents(original.unit_tax_cents).multiply_quantity(quantity);

        let product_line = ProductLine {
            id: Uuid::new_v4().to_string(),
            sale_id: sale_id.clone(),
            product_id: line.product_id.clone(),
            quantity,
            unit_price_cents: original.unit_price_cents,
            subtotal_cents: line_subtotal.cents(),
            unit_tax_cents: original.unit_tax_cents,
            total_with_tax_cents: (line_subtotal + line_tax).cents(),
            created_at: now,
        };
        SaleRepository::insert_product_line_in_tx(conn, &product_line).await?;

        StockLedger::adjust(conn, &line.product_id, line.quantity, StockDirection::Increment)
            .await?;

        subtotal += line_subtotal;
        tax += line_tax;
    }

    // Exchange lines: replacement merchandise leaving stock, priced
    // like an ordinary sale line.
    for line in &validated.exchange_lines {
        let product = ProductRepository::fetch_in_tx(conn, &line.product_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Product", &line.product_id))?;

        let pricing = price_product_line(
            line.unit_price,
            line.quantity,
            product.tax_applicable,
            product.tax_rate(),
        );

        let product_line = ProductLine {
            id: Uuid::new_v4().to_string(),
            sale_id: sale_id.clone(),
            product_id: line.product_id.clone(),
            quantity: line.quantity,
            unit_price_cents: line.unit_price.cents(),
            subtotal_cents: pricing.subtotal.cents(),
            unit_tax_cents: pricing.unit_tax.cents(),
            total_with_tax_cents: pricing.total_with_tax.cents(),
            created_at: now,
        };
        SaleRepository::insert_product_line_in_tx(conn, &product_line).await?;

        StockLedger::adjust(conn, &line.product_id, line.quantity, StockDirection::Decrement)
            .await?;

        subtotal += pricing.subtotal;
        tax += pricing.unit_tax.multiply_quantity(line.quantity);
    }

    sale.subtotal_cents = subtotal.cents();
    sale.tax_cents = tax.cents();
    sale.total_cents = (subtotal + tax).cents();
    sale.notes = Some(build_audit_note(&origin, validated, subtotal + tax));
    SaleRepository::update_header_in_tx(conn, &sale).await?;

    // Reclassify the original from the post-return picture.
    if let Some(new_status) = classify_origin(&origin, &originals, &already_returned, validated) {
        SaleRepository::set_status_in_tx(conn, &origin.id, new_status, now).await?;
    }

    Ok(sale_id)
}

/// Decides the original sale's new status after this return.
///
/// Returns `None` when the status should stay as it is (pure exchange
/// with nothing ever returned, or no change from the current status).
fn classify_origin(
    origin: &Sale,
    originals: &HashMap<&str, &ProductLine>,
    already_returned: &HashMap<String, i64>,
    validated: &ValidatedReturn,
) -> Option<SaleStatus> {
    let mut total_original = 0i64;
    let mut total_returned = 0i64;

    for (product_id, line) in originals {
        let prior = already_returned.get(*product_id).copied().unwrap_or(0);
        let this_request: i64 = validated
            .returned_lines
            .iter()
            .filter(|l| l.product_id == **product_id)
            .map(|l| l.quantity)
            .sum();

        total_original += line.quantity;
        total_returned += (prior + this_request).min(line.quantity);
    }

    let new_status = if total_returned == 0 {
        return None;
    } else if total_returned >= total_original {
        SaleStatus::Returned
    } else {
        SaleStatus::PartiallyReturned
    };

    (new_status != origin.status).then_some(new_status)
}

/// Generated audit note summarizing the compensating sale.
fn build_audit_note(origin: &Sale, validated: &ValidatedReturn, total: Money) -> String {
    let mut note = format!(
        "Return against sale {} of {}. Operator: {}.",
        origin.id,
        origin.sold_at.format("%Y-%m-%d"),
        validated.user_id,
    );

    if let Some(reason) = &validated.reason {
        note.push_str(&format!(" Reason: {reason}."));
    }

    if !validated.returned_lines.is_empty() {
        let items: Vec<String> = validated
            .returned_lines
            .iter()
            .map(|l| format!("{} x{}", l.product_id, l.quantity))
            .collect();
        note.push_str(&format!(" Returned: {}.", items.join(", ")));
    }

    if !validated.exchange_lines.is_empty() {
        let items: Vec<String> = validated
            .exchange_lines
            .iter()
            .map(|l| format!("{} x{}", l.product_id, l.quantity))
            .collect();
        note.push_str(&format!(" Exchanged: {}.", items.join(", ")));
    }

    if let Some(balance) = validated.prior_balance {
        note.push_str(&format!(" Prior balance: {balance}."));
    }

    note.push_str(&format!(" Balance: {total}."));
    note
}
