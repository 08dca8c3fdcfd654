//! # Sale Composer
//!
//! Creates a sale header plus its product/service lines inside one
//! atomic unit of work, decrementing stock per product line. Either
//! every line is persisted and stock consistently decremented, or
//! nothing is persisted and stock is unchanged.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::info;
use uuid::Uuid;

use crate::engine::pets::resolve_pet;
use crate::engine::request::{
    ComposeSaleRequest, ProductLineSpec, ServiceLineSpec, ValidatedCompose,
};
use crate::engine::{commit_or_rollback, SaleEngine};
use crate::error::{EngineError, EngineResult};
use crate::repository::{CustomerRepository, ProductRepository, SaleRepository, ServiceRepository};
use crate::stock::{StockDirection, StockLedger};
use patitas_core::{
    price_product_line, price_service_line, CoreError, Customer, Money, PaymentMethod,
    ProductLine, Sale, SaleAggregate, SaleKind, ServiceLine, WALK_IN_CUSTOMER_ID,
};

/// Accumulated totals of a sale's freshly written lines.
#[derive(Debug, Clone, Copy)]
pub(super) struct LineTotals {
    pub subtotal: Money,
    pub tax: Money,
}

impl LineTotals {
    pub fn total(&self) -> Money {
        self.subtotal + self.tax
    }
}

impl SaleEngine {
    /// Composes a new sale.
    ///
    /// Validates the request before opening a transaction, then writes
    /// header, lines and stock deltas atomically. The aggregate is read
    /// back after commit so callers see exactly what was persisted.
    pub async fn compose_sale(&self, request: ComposeSaleRequest) -> EngineResult<SaleAggregate> {
        let now = Utc::now();
        let validated = request.validate(now)?;

        let mut tx = self.pool.begin().await?;
        let result = compose_in_tx(&mut tx, &validated, now).await;
        let sale_id = commit_or_rollback(tx, result).await?;

        info!(sale_id = %sale_id, "Sale composed");
        self.composed_aggregate(&sale_id).await
    }
}

async fn compose_in_tx(
    conn: &mut SqliteConnection,
    validated: &ValidatedCompose,
    now: DateTime<Utc>,
) -> EngineResult<String> {
    let customer = resolve_customer(conn, validated.customer_id.as_deref()).await?;

    let sale_id = Uuid::new_v4().to_string();
    let sale = Sale {
        id: sale_id.clone(),
        customer_id: customer.id.clone(),
        user_id: validated.user_id.clone(),
        status: validated.status,
        kind: SaleKind::Sale,
        subtotal_cents: 0,
        tax_cents: 0,
        total_cents: 0,
        payment_method: validated.payment_method,
        tendered_cents: None,
        change_cents: None,
        payment_reference: validated.payment_reference.clone(),
        origin_sale_id: None,
        notes: validated.notes.clone(),
        receipt_attachment: validated.receipt_attachment.clone(),
        sold_at: validated.sold_at,
        created_at: now,
        updated_at: now,
    };
    SaleRepository::insert_header_in_tx(conn, &sale).await?;

    let totals = write_lines(
        conn,
        &sale_id,
        &customer,
        &validated.product_lines,
        &validated.service_lines,
        now,
    )
    .await?;

    settle_header(conn, sale, totals, validated.tendered, now).await?;

    Ok(sale_id)
}

/// Resolves the sale's customer, falling back to the walk-in sentinel
/// when none is supplied.
pub(super) async fn resolve_customer(
    conn: &mut SqliteConnection,
    customer_id: Option<&str>,
) -> EngineResult<Customer> {
    let id = customer_id.unwrap_or(WALK_IN_CUSTOMER_ID);

    CustomerRepository::fetch_in_tx(conn, id)
        .await?
        .ok_or_else(|| EngineError::not_found("Customer", id))
}

/// Writes the full line-item set of a sale: prices each line, persists
/// it, and decrements stock per product line. Returns the accumulated
/// totals so the caller can settle the header.
pub(super) async fn write_lines(
    conn: &mut SqliteConnection,
    sale_id: &str,
    customer: &Customer,
    product_lines: &[ProductLineSpec],
    service_lines: &[ServiceLineSpec],
    now: DateTime<Utc>,
) -> EngineResult<LineTotals> {
    let mut subtotal = Money::zero();
    let mut tax = Money::zero();

    for line in product_lines {
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
            sale_id: sale_id.to_string(),
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

    for line in service_lines {
        ServiceRepository::fetch_in_tx(conn, &line.service_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Service", &line.service_id))?;

        let resolved = resolve_pet(conn, customer, line).await?;
        let line_subtotal = price_service_line(line.unit_price, line.quantity);

        let service_line = ServiceLine {
            id: Uuid::new_v4().to_string(),
            sale_id: sale_id.to_string(),
            service_id: line.service_id.clone(),
            pet_id: resolved.pet_id,
            temp_pet_name: resolved.temp_name,
            temp_pet_species: resolved.temp_species,
            quantity: line.quantity,
            unit_price_cents: line.unit_price.cents(),
            subtotal_cents: line_subtotal.cents(),
            created_at: now,
        };
        SaleRepository::insert_service_line_in_tx(conn, &service_line).await?;

        subtotal += line_subtotal;
    }

    Ok(LineTotals { subtotal, tax })
}

/// Recomputes header totals from the written lines, settles the cash
/// payment (tendered must cover the total; change floored at zero) and
/// persists the final header.
pub(super) async fn settle_header(
    conn: &mut SqliteConnection,
    mut sale: Sale,
    totals: LineTotals,
    tendered: Option<Money>,
    now: DateTime<Utc>,
) -> EngineResult<()> {
    let total = totals.total();

    sale.subtotal_cents = totals.subtotal.cents();
    sale.tax_cents = totals.tax.cents();
    sale.total_cents = total.cents();
    sale.updated_at = now;

    match (sale.payment_method, tendered) {
        (PaymentMethod::Cash, Some(amount)) => {
            if amount < total {
                return Err(CoreError::InvalidPaymentAmount {
                    reason: format!("tendered {amount} is below total {total}"),
                }
                .into());
            }
            sale.tendered_cents = Some(amount.cents());
            sale.change_cents = Some((amount - total).max(Money::zero()).cents());
        }
        (PaymentMethod::Cash, None) => {
            return Err(CoreError::InvalidPaymentAmount {
                reason: "cash sales require a tendered amount".to_string(),
            }
            .into());
        }
        (_, amount) => {
            sale.tendered_cents = amount.map(|m| m.cents());
            sale.change_cents = None;
        }
    }

    SaleRepository::update_header_in_tx(conn, &sale).await?;
    Ok(())
}
