//! # Sale Mutator
//!
//! Full-replace update of an existing sale. Providing line arrays
//! reverses the current stock effects, destroys every line and re-runs
//! the composer's insertion logic with the new set; header scalars use
//! "update if provided, else keep". One transaction covers the whole
//! thing, so a validation failure on the new lines also rolls back the
//! stock reversal and leaves the original state untouched.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::info;

use crate::engine::compose::{resolve_customer, settle_header, write_lines, LineTotals};
use crate::engine::request::{MutateSaleRequest, ValidatedMutate};
use crate::engine::{commit_or_rollback, SaleEngine};
use crate::error::{EngineError, EngineResult};
use crate::repository::{CustomerRepository, SaleRepository};
use crate::stock::{StockDirection, StockLedger};
use patitas_core::{
    CoreError, Customer, Money, SaleAggregate, SaleKind, SaleStatus, ValidationError,
};

impl SaleEngine {
    /// Mutates an existing sale.
    ///
    /// Only ordinary sales in `Pending` or `Effective` status accept
    /// mutation. Compensating records and cancelled/returned sales are
    /// history, and a partially returned sale's lines anchor the
    /// accounting of its compensating sales.
    pub async fn mutate_sale(
        &self,
        sale_id: &str,
        request: MutateSaleRequest,
    ) -> EngineResult<SaleAggregate> {
        let now = Utc::now();
        let validated = request.validate(now)?;

        let mut tx = self.pool.begin().await?;
        let result = mutate_in_tx(&mut tx, sale_id, &validated, now).await;
        commit_or_rollback(tx, result).await?;

        info!(sale_id = %sale_id, "Sale mutated");
        self.mutated_aggregate(sale_id).await
    }
}

async fn mutate_in_tx(
    conn: &mut SqliteConnection,
    sale_id: &str,
    validated: &ValidatedMutate,
    now: DateTime<Utc>,
) -> EngineResult<()> {
    let mut sale = SaleRepository::fetch_header_in_tx(conn, sale_id)
        .await?
        .ok_or_else(|| EngineError::not_found("Sale", sale_id))?;

    // A partially returned sale's positive lines are the baseline the
    // return processor measures remaining quantities against; reversing
    // or rewriting them would double-count stock units the compensating
    // sales already restored.
    if sale.status.is_terminal() || sale.status == SaleStatus::PartiallyReturned {
        return Err(ValidationError::NotAllowed {
            field: "status".to_string(),
            allowed: vec!["pending".to_string(), "effective".to_string()],
        }
        .into());
    }

    if sale.kind != SaleKind::Sale {
        return Err(ValidationError::NotAllowed {
            field: "kind".to_string(),
            allowed: vec!["sale".to_string()],
        }
        .into());
    }

    // Header scalars: update if provided, else keep.
    if let Some(method) = validated.payment_method {
        sale.payment_method = method;
    }
    if let Some(reference) = &validated.payment_reference {
        sale.payment_reference = Some(reference.clone());
    }
    if let Some(notes) = &validated.notes {
        sale.notes = Some(notes.clone());
    }
    if let Some(attachment) = &validated.receipt_attachment {
        sale.receipt_attachment = Some(attachment.clone());
    }
    if let Some(sold_at) = validated.sold_at {
        sale.sold_at = sold_at;
    }

    let customer = resolve_customer(
        conn,
        validated.customer_id
            .as_deref()
            .or(Some(sale.customer_id.as_str())),
    )
    .await?;
    let customer_changed = customer.id != sale.customer_id;
    sale.customer_id = customer.id.clone();

    let totals = match &validated.lines {
        Some((product_lines, service_lines)) => {
            // Reverse the current stock effects, then rebuild the full
            // line-item set from scratch.
            let existing = SaleRepository::fetch_product_lines_in_tx(conn, sale_id).await?;
            for line in &existing {
                if line.quantity > 0 {
                    StockLedger::adjust(
                        conn,
                        &line.product_id,
                        line.quantity,
                        StockDirection::Increment,
                    )
                    .await?;
                }
            }

            SaleRepository::delete_lines_in_tx(conn, sale_id).await?;

            write_lines(conn, sale_id, &customer, product_lines, service_lines, now).await?
        }
        None => {
            // Header-only customer change: the surviving service lines
            // must still reference pets of the new customer.
            if customer_changed {
                verify_service_line_pets(conn, sale_id, &customer).await?;
            }

            LineTotals {
                subtotal: Money::from_cents(sale.subtotal_cents),
                tax: Money::from_cents(sale.tax_cents),
            }
        }
    };

    let tendered = validated
        .tendered
        .or_else(|| sale.tendered_cents.map(Money::from_cents));

    settle_header(conn, sale, totals, tendered, now).await
}

/// Checks every persisted service line's pet against the given
/// customer. The generic pet belongs to the walk-in customer, so
/// moving a walk-in sale onto a registered customer (or the reverse)
/// fails here the same way a foreign pet does.
async fn verify_service_line_pets(
    conn: &mut SqliteConnection,
    sale_id: &str,
    customer: &Customer,
) -> EngineResult<()> {
    let lines = SaleRepository::fetch_service_lines_in_tx(conn, sale_id).await?;

    for line in &lines {
        let pet = CustomerRepository::fetch_pet_in_tx(conn, &line.pet_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Pet", &line.pet_id))?;

        if pet.customer_id != customer.id {
            return Err(CoreError::PetOwnershipMismatch {
                pet_id: pet.id,
                customer_id: customer.id.clone(),
            }
            .into());
        }
    }

    Ok(())
}
