//! # Sale Repository
//!
//! Database operations for sale headers and their lines.
//!
//! Reads that back a single API response go through the pool; every
//! write belongs to an engine-owned transaction and therefore takes a
//! `&mut SqliteConnection`. Lines are replaced wholesale on update,
//! never diffed.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use patitas_core::{ProductLine, Sale, SaleAggregate, SaleStatus, ServiceLine};

/// Repository for sale database operations.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

const SALE_COLUMNS: &str = r#"
    id, customer_id, user_id, status, kind,
    subtotal_cents, tax_cents, total_cents,
    payment_method, tendered_cents, change_cents, payment_reference,
    origin_sale_id, notes, receipt_attachment,
    sold_at, created_at, updated_at
"#;

const PRODUCT_LINE_COLUMNS: &str = r#"
    id, sale_id, product_id, quantity,
    unit_price_cents, subtotal_cents, unit_tax_cents, total_with_tax_cents,
    created_at
"#;

const SERVICE_LINE_COLUMNS: &str = r#"
    id, sale_id, service_id, pet_id, temp_pet_name, temp_pet_species,
    quantity, unit_price_cents, subtotal_cents, created_at
"#;

/// Per-product quantity already returned against an origin sale.
#[derive(Debug, sqlx::FromRow)]
pub struct ReturnedQuantity {
    pub product_id: String,
    pub quantity: i64,
}

impl SaleRepository {
    /// Creates a new SaleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Gets a sale header by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Sale>> {
        let sale = sqlx::query_as::<_, Sale>(&format!(
            "SELECT {SALE_COLUMNS} FROM sales WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(sale)
    }

    /// Gets a sale with all of its lines.
    pub async fn get_aggregate(&self, id: &str) -> DbResult<SaleAggregate> {
        let sale = self
            .get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Sale", id))?;

        let product_lines = sqlx::query_as::<_, ProductLine>(&format!(
            "SELECT {PRODUCT_LINE_COLUMNS} FROM sale_product_lines WHERE sale_id = ?1 ORDER BY id"
        ))
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        let service_lines = sqlx::query_as::<_, ServiceLine>(&format!(
            "SELECT {SERVICE_LINE_COLUMNS} FROM sale_service_lines WHERE sale_id = ?1 ORDER BY id"
        ))
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(SaleAggregate {
            sale,
            product_lines,
            service_lines,
        })
    }

    /// Lists a customer's sale headers, most recent first.
    pub async fn list_by_customer(&self, customer_id: &str, limit: u32) -> DbResult<Vec<Sale>> {
        let sales = sqlx::query_as::<_, Sale>(&format!(
            "SELECT {SALE_COLUMNS} FROM sales
             WHERE customer_id = ?1
             ORDER BY sold_at DESC, id DESC
             LIMIT ?2"
        ))
        .bind(customer_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(sales)
    }

    /// Lists compensating sales (returns/exchanges) linked to a sale.
    pub async fn list_compensations(&self, origin_sale_id: &str) -> DbResult<Vec<Sale>> {
        let sales = sqlx::query_as::<_, Sale>(&format!(
            "SELECT {SALE_COLUMNS} FROM sales
             WHERE origin_sale_id = ?1
             ORDER BY created_at"
        ))
        .bind(origin_sale_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(sales)
    }

    // =========================================================================
    // In-transaction operations
    // =========================================================================

    /// Fetches a sale header on an open transaction connection.
    pub async fn fetch_header_in_tx(
        conn: &mut SqliteConnection,
        id: &str,
    ) -> DbResult<Option<Sale>> {
        let sale = sqlx::query_as::<_, Sale>(&format!(
            "SELECT {SALE_COLUMNS} FROM sales WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(sale)
    }

    /// Fetches a sale's product lines on an open transaction connection.
    pub async fn fetch_product_lines_in_tx(
        conn: &mut SqliteConnection,
        sale_id: &str,
    ) -> DbResult<Vec<ProductLine>> {
        let lines = sqlx::query_as::<_, ProductLine>(&format!(
            "SELECT {PRODUCT_LINE_COLUMNS} FROM sale_product_lines WHERE sale_id = ?1 ORDER BY id"
        ))
        .bind(sale_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(lines)
    }

    /// Fetches a sale's service lines on an open transaction connection.
    pub async fn fetch_service_lines_in_tx(
        conn: &mut SqliteConnection,
        sale_id: &str,
    ) -> DbResult<Vec<ServiceLine>> {
        let lines = sqlx::query_as::<_, ServiceLine>(&format!(
            "SELECT {SERVICE_LINE_COLUMNS} FROM sale_service_lines WHERE sale_id = ?1 ORDER BY id"
        ))
        .bind(sale_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(lines)
    }

    /// Inserts a sale header.
    pub async fn insert_header_in_tx(conn: &mut SqliteConnection, sale: &Sale) -> DbResult<()> {
        debug!(id = %sale.id, customer_id = %sale.customer_id, "Inserting sale header");

        sqlx::query(
            r#"
            INSERT INTO sales (
                id, customer_id, user_id, status, kind,
                subtotal_cents, tax_cents, total_cents,
                payment_method, tendered_cents, change_cents, payment_reference,
                origin_sale_id, notes, receipt_attachment,
                sold_at, created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5,
                ?6, ?7, ?8,
                ?9, ?10, ?11, ?12,
                ?13, ?14, ?15,
                ?16, ?17, ?18
            )
            "#,
        )
        .bind(&sale.id)
        .bind(&sale.customer_id)
        .bind(&sale.user_id)
        .bind(sale.status)
        .bind(sale.kind)
        .bind(sale.subtotal_cents)
        .bind(sale.tax_cents)
        .bind(sale.total_cents)
        .bind(sale.payment_method)
        .bind(sale.tendered_cents)
        .bind(sale.change_cents)
        .bind(&sale.payment_reference)
        .bind(&sale.origin_sale_id)
        .bind(&sale.notes)
        .bind(&sale.receipt_attachment)
        .bind(sale.sold_at)
        .bind(sale.created_at)
        .bind(sale.updated_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Inserts a product line.
    pub async fn insert_product_line_in_tx(
        conn: &mut SqliteConnection,
        line: &ProductLine,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO sale_product_lines (
                id, sale_id, product_id, quantity,
                unit_price_cents, subtotal_cents, unit_tax_cents, total_with_tax_cents,
                created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&line.id)
        .bind(&line.sale_id)
        .bind(&line.product_id)
        .bind(line.quantity)
        .bind(line.unit_price_cents)
        .bind(line.subtotal_cents)
        .bind(line.unit_tax_cents)
        .bind(line.total_with_tax_cents)
        .bind(line.created_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Inserts a service line.
    pub async fn insert_service_line_in_tx(
        conn: &mut SqliteConnection,
        line: &ServiceLine,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO sale_service_lines (
                id, sale_id, service_id, pet_id, temp_pet_name, temp_pet_species,
                quantity, unit_price_cents, subtotal_cents, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&line.id)
        .bind(&line.sale_id)
        .bind(&line.service_id)
        .bind(&line.pet_id)
        .bind(&line.temp_pet_name)
        .bind(&line.temp_pet_species)
        .bind(line.quantity)
        .bind(line.unit_price_cents)
        .bind(line.subtotal_cents)
        .bind(line.created_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Deletes all lines (product and service) attached to a sale.
    pub async fn delete_lines_in_tx(conn: &mut SqliteConnection, sale_id: &str) -> DbResult<()> {
        sqlx::query("DELETE FROM sale_product_lines WHERE sale_id = ?1")
            .bind(sale_id)
            .execute(&mut *conn)
            .await?;

        sqlx::query("DELETE FROM sale_service_lines WHERE sale_id = ?1")
            .bind(sale_id)
            .execute(&mut *conn)
            .await?;

        Ok(())
    }

    /// Rewrites the header's totals, payment fields and metadata.
    ///
    /// Status, kind and lineage are intentionally out of scope here;
    /// use [`Self::set_status_in_tx`] for status changes.
    pub async fn update_header_in_tx(conn: &mut SqliteConnection, sale: &Sale) -> DbResult<()> {
        debug!(id = %sale.id, "Updating sale header");

        let result = sqlx::query(
            r#"
            UPDATE sales SET
                customer_id = ?2,
                subtotal_cents = ?3,
                tax_cents = ?4,
                total_cents = ?5,
                payment_method = ?6,
                tendered_cents = ?7,
                change_cents = ?8,
                payment_reference = ?9,
                notes = ?10,
                receipt_attachment = ?11,
                sold_at = ?12,
                updated_at = ?13
            WHERE id = ?1
            "#,
        )
        .bind(&sale.id)
        .bind(&sale.customer_id)
        .bind(sale.subtotal_cents)
        .bind(sale.tax_cents)
        .bind(sale.total_cents)
        .bind(sale.payment_method)
        .bind(sale.tendered_cents)
        .bind(sale.change_cents)
        .bind(&sale.payment_reference)
        .bind(&sale.notes)
        .bind(&sale.receipt_attachment)
        .bind(sale.sold_at)
        .bind(sale.updated_at)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Sale", &sale.id));
        }

        Ok(())
    }

    /// Sets a sale's status.
    pub async fn set_status_in_tx(
        conn: &mut SqliteConnection,
        sale_id: &str,
        status: SaleStatus,
        updated_at: chrono::DateTime<chrono::Utc>,
    ) -> DbResult<()> {
        debug!(id = %sale_id, ?status, "Setting sale status");

        let result = sqlx::query("UPDATE sales SET status = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(sale_id)
            .bind(status)
            .bind(updated_at)
            .execute(&mut *conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Sale", sale_id));
        }

        Ok(())
    }

    /// Sums the quantity already returned per product across every
    /// compensating sale linked to the origin.
    ///
    /// Returned lines are stored with negative quantity, hence the
    /// negation and the `quantity < 0` filter (positive lines on an
    /// exchange are replacement merchandise, not returns).
    pub async fn returned_quantities_in_tx(
        conn: &mut SqliteConnection,
        origin_sale_id: &str,
    ) -> DbResult<Vec<ReturnedQuantity>> {
        let rows = sqlx::query_as::<_, ReturnedQuantity>(
            r#"
            SELECT l.product_id AS product_id, SUM(-l.quantity) AS quantity
            FROM sale_product_lines l
            JOIN sales s ON s.id = l.sale_id
            WHERE s.origin_sale_id = ?1
              AND s.status != 'cancelled'
              AND l.quantity < 0
            GROUP BY l.product_id
            "#,
        )
        .bind(origin_sale_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(rows)
    }
}
