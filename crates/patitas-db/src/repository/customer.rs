//! # Customer Repository
//!
//! Database operations for customers and their pets.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use patitas_core::{Customer, Pet, WALK_IN_CUSTOMER_ID};

/// Repository for customer and pet database operations.
#[derive(Debug, Clone)]
pub struct CustomerRepository {
    pool: SqlitePool,
}

const CUSTOMER_COLUMNS: &str = "id, name, document_number, created_at";

const PET_COLUMNS: &str = "id, customer_id, name, species, active, created_at";

impl CustomerRepository {
    /// Creates a new CustomerRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CustomerRepository { pool }
    }

    /// Gets a customer by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Customer>> {
        let customer = sqlx::query_as::<_, Customer>(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(customer)
    }

    /// Gets a customer by document number (unique per customer).
    pub async fn get_by_document(&self, document_number: &str) -> DbResult<Option<Customer>> {
        let customer = sqlx::query_as::<_, Customer>(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customers WHERE document_number = ?1"
        ))
        .bind(document_number)
        .fetch_optional(&self.pool)
        .await?;

        Ok(customer)
    }

    /// Returns the walk-in customer seeded by the initial migration.
    pub async fn walk_in(&self) -> DbResult<Customer> {
        self.get_by_id(WALK_IN_CUSTOMER_ID)
            .await?
            .ok_or_else(|| DbError::not_found("Customer", WALK_IN_CUSTOMER_ID))
    }

    /// Inserts a new customer.
    pub async fn insert(&self, customer: &Customer) -> DbResult<()> {
        debug!(id = %customer.id, name = %customer.name, "Inserting customer");

        sqlx::query(
            r#"
            INSERT INTO customers (id, name, document_number, created_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(&customer.id)
        .bind(&customer.name)
        .bind(&customer.document_number)
        .bind(customer.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Lists a customer's active pets sorted by ID.
    pub async fn list_pets(&self, customer_id: &str) -> DbResult<Vec<Pet>> {
        let pets = sqlx::query_as::<_, Pet>(&format!(
            "SELECT {PET_COLUMNS} FROM pets WHERE customer_id = ?1 AND active = 1 ORDER BY id"
        ))
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(pets)
    }

    /// Inserts a new pet for a customer.
    pub async fn insert_pet(&self, pet: &Pet) -> DbResult<()> {
        debug!(id = %pet.id, customer_id = %pet.customer_id, "Inserting pet");

        sqlx::query(
            r#"
            INSERT INTO pets (id, customer_id, name, species, active, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&pet.id)
        .bind(&pet.customer_id)
        .bind(&pet.name)
        .bind(&pet.species)
        .bind(pet.active)
        .bind(pet.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Fetches a pet by ID on an open transaction connection.
    pub async fn fetch_pet_in_tx(
        conn: &mut SqliteConnection,
        pet_id: &str,
    ) -> DbResult<Option<Pet>> {
        let pet = sqlx::query_as::<_, Pet>(&format!(
            "SELECT {PET_COLUMNS} FROM pets WHERE id = ?1"
        ))
        .bind(pet_id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(pet)
    }

    /// Returns the customer's first active pet (lowest ID), if any.
    ///
    /// This is the deterministic default used when a service line
    /// names no pet explicitly.
    pub async fn first_active_pet_in_tx(
        conn: &mut SqliteConnection,
        customer_id: &str,
    ) -> DbResult<Option<Pet>> {
        let pet = sqlx::query_as::<_, Pet>(&format!(
            "SELECT {PET_COLUMNS} FROM pets
             WHERE customer_id = ?1 AND active = 1
             ORDER BY id LIMIT 1"
        ))
        .bind(customer_id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(pet)
    }

    /// Fetches a customer on an open transaction connection.
    pub async fn fetch_in_tx(
        conn: &mut SqliteConnection,
        id: &str,
    ) -> DbResult<Option<Customer>> {
        let customer = sqlx::query_as::<_, Customer>(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(customer)
    }
}
