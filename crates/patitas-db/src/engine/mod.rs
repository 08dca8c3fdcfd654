//! # Sale Transaction Engine
//!
//! The four composite operations over sales:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          SaleEngine                                     │
//! │                                                                         │
//! │  compose_sale    ─┐                                                     │
//! │  mutate_sale      │   validate (no tx) → begin tx → write header,      │
//! │  change_status    ├─► lines, stock deltas → commit | rollback →        │
//! │  process_return  ─┘   post-commit notify (non-fatal) → aggregate       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! One transaction per operation is the sole concurrency-control
//! mechanism: every read and write of a sale's lines and of any touched
//! product's stock happens inside it, and any error after `begin`
//! triggers an explicit rollback before surfacing. There is no partial
//! commit path.

mod compose;
mod mutate;
mod pets;
mod request;
mod returns;
mod status;

pub use request::{
    ComposeSaleRequest, MutateSaleRequest, ProcessReturnRequest, ProductLineRequest,
    ReturnLineRequest, ServiceLineRequest,
};

use std::sync::Arc;

use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::{error, warn};

use crate::error::EngineResult;
use crate::notify::{LogNotifier, Notifier};
use crate::repository::SaleRepository;
use patitas_core::{Sale, SaleAggregate};

/// The sale transaction engine.
///
/// Cheap to clone; all state lives in the pool and the notifier.
#[derive(Clone)]
pub struct SaleEngine {
    pool: SqlitePool,
    notifier: Arc<dyn Notifier>,
}

impl SaleEngine {
    /// Creates an engine with the default log-only notifier.
    pub fn new(pool: SqlitePool) -> Self {
        SaleEngine {
            pool,
            notifier: Arc::new(LogNotifier),
        }
    }

    /// Creates an engine with a caller-supplied notifier.
    pub fn with_notifier(pool: SqlitePool, notifier: Arc<dyn Notifier>) -> Self {
        SaleEngine { pool, notifier }
    }

    /// Reads back a sale with all of its lines.
    pub async fn get_sale(&self, sale_id: &str) -> EngineResult<SaleAggregate> {
        Ok(self.sales().get_aggregate(sale_id).await?)
    }

    /// Lists a customer's sale headers, most recent first.
    pub async fn list_by_customer(
        &self,
        customer_id: &str,
        limit: u32,
    ) -> EngineResult<Vec<Sale>> {
        Ok(self.sales().list_by_customer(customer_id, limit).await?)
    }

    /// Lists the compensating sales (returns and exchanges) recorded
    /// against an origin sale, oldest first.
    pub async fn list_compensations(&self, origin_sale_id: &str) -> EngineResult<Vec<Sale>> {
        Ok(self.sales().list_compensations(origin_sale_id).await?)
    }

    fn sales(&self) -> SaleRepository {
        SaleRepository::new(self.pool.clone())
    }

    /// Reads the committed aggregate and fires the composition hook.
    /// Notifier failures are logged, never escalated.
    async fn composed_aggregate(&self, sale_id: &str) -> EngineResult<SaleAggregate> {
        let aggregate = self.sales().get_aggregate(sale_id).await?;

        if let Err(err) = self.notifier.sale_composed(&aggregate).await {
            warn!(sale_id = %sale_id, error = %err, "Post-commit notification failed");
        }

        Ok(aggregate)
    }

    /// Reads the committed aggregate and fires the mutation hook.
    async fn mutated_aggregate(&self, sale_id: &str) -> EngineResult<SaleAggregate> {
        let aggregate = self.sales().get_aggregate(sale_id).await?;

        if let Err(err) = self.notifier.sale_mutated(&aggregate).await {
            warn!(sale_id = %sale_id, error = %err, "Post-commit notification failed");
        }

        Ok(aggregate)
    }
}

/// Commits on success, rolls back on failure.
///
/// Every engine operation funnels through here so no code path can
/// leave a transaction dangling or half-applied.
async fn commit_or_rollback<T>(
    tx: Transaction<'_, Sqlite>,
    result: EngineResult<T>,
) -> EngineResult<T> {
    match result {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                error!(error = %rollback_err, "Rollback failed after engine error");
            }
            Err(err)
        }
    }
}
