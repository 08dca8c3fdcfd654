//! # Engine Notifications
//!
//! Hook for downstream listeners (receipt printing, dashboards, sync).
//! The engine fires notifications after commit; a failing notifier is
//! logged and never rolls back the transaction it describes.

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use patitas_core::{SaleAggregate, SaleStatus};

/// Errors a notifier may surface. Always non-fatal to the engine.
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Notification channel unavailable: {0}")]
    ChannelUnavailable(String),

    #[error("Notification rejected: {0}")]
    Rejected(String),
}

/// Receives engine lifecycle events after they are durably committed.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// A new sale (or compensating sale) was composed.
    async fn sale_composed(&self, aggregate: &SaleAggregate) -> Result<(), NotifyError>;

    /// An existing sale's header or lines were rewritten.
    async fn sale_mutated(&self, aggregate: &SaleAggregate) -> Result<(), NotifyError>;

    /// A sale moved between statuses.
    async fn sale_status_changed(
        &self,
        sale_id: &str,
        from: SaleStatus,
        to: SaleStatus,
    ) -> Result<(), NotifyError>;

    /// A return/exchange was processed against an origin sale.
    async fn return_processed(
        &self,
        origin_sale_id: &str,
        compensating: &SaleAggregate,
    ) -> Result<(), NotifyError>;
}

/// Default notifier: structured log lines, nothing else.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn sale_composed(&self, aggregate: &SaleAggregate) -> Result<(), NotifyError> {
        info!(
            sale_id = %aggregate.sale.id,
            total_cents = aggregate.sale.total_cents,
            product_lines = aggregate.product_lines.len(),
            service_lines = aggregate.service_lines.len(),
            "Sale composed"
        );
        Ok(())
    }

    async fn sale_mutated(&self, aggregate: &SaleAggregate) -> Result<(), NotifyError> {
        info!(
            sale_id = %aggregate.sale.id,
            total_cents = aggregate.sale.total_cents,
            product_lines = aggregate.product_lines.len(),
            service_lines = aggregate.service_lines.len(),
            "Sale mutated"
        );
        Ok(())
    }

    async fn sale_status_changed(
        &self,
        sale_id: &str,
        from: SaleStatus,
        to: SaleStatus,
    ) -> Result<(), NotifyError> {
        info!(sale_id = %sale_id, ?from, ?to, "Sale status changed");
        Ok(())
    }

    async fn return_processed(
        &self,
        origin_sale_id: &str,
        compensating: &SaleAggregate,
    ) -> Result<(), NotifyError> {
        info!(
            origin_sale_id = %origin_sale_id,
            compensating_sale_id = %compensating.sale.id,
            ?compensating.sale.kind,
            "Return processed"
        );
        Ok(())
    }
}
