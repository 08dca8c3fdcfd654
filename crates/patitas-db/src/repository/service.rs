//! # Service Repository
//!
//! Database operations for the service catalog (grooming, vet visits,
//! boarding). Services carry no stock and no tax.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use patitas_core::ServiceItem;

/// Repository for service catalog operations.
#[derive(Debug, Clone)]
pub struct ServiceRepository {
    pool: SqlitePool,
}

const SERVICE_COLUMNS: &str = "id, name, price_cents, is_active, created_at";

impl ServiceRepository {
    /// Creates a new ServiceRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ServiceRepository { pool }
    }

    /// Gets a service by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<ServiceItem>> {
        let service = sqlx::query_as::<_, ServiceItem>(&format!(
            "SELECT {SERVICE_COLUMNS} FROM services WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(service)
    }

    /// Lists active services sorted by name.
    pub async fn list_active(&self) -> DbResult<Vec<ServiceItem>> {
        let services = sqlx::query_as::<_, ServiceItem>(&format!(
            "SELECT {SERVICE_COLUMNS} FROM services WHERE is_active = 1 ORDER BY name"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(services)
    }

    /// Inserts a new service.
    pub async fn insert(&self, service: &ServiceItem) -> DbResult<()> {
        debug!(id = %service.id, name = %service.name, "Inserting service");

        sqlx::query(
            r#"
            INSERT INTO services (id, name, price_cents, is_active, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&service.id)
        .bind(&service.name)
        .bind(service.price_cents)
        .bind(service.is_active)
        .bind(service.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Soft-deletes a service by setting is_active = false.
    pub async fn soft_delete(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Soft-deleting service");

        let result = sqlx::query("UPDATE services SET is_active = 0 WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Service", id));
        }

        Ok(())
    }

    /// Fetches a service on an open transaction connection.
    pub async fn fetch_in_tx(
        conn: &mut SqliteConnection,
        id: &str,
    ) -> DbResult<Option<ServiceItem>> {
        let service = sqlx::query_as::<_, ServiceItem>(&format!(
            "SELECT {SERVICE_COLUMNS} FROM services WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(service)
    }
}
