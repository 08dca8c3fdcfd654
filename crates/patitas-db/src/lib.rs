//! # patitas-db: Persistence and Sale Engine for Patitas
//!
//! SQLite-backed layer: connection pool, migrations, repositories and
//! the transactional sale engine.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         patitas-db                                      │
//! │                                                                         │
//! │  ┌───────────────┐      ┌──────────────────────────────────────────┐   │
//! │  │    Database   │      │               SaleEngine                 │   │
//! │  │  pool + repos │◄─────│  compose / mutate / change_status /      │   │
//! │  │  + migrations │      │  process_return — one tx per operation   │   │
//! │  └───────┬───────┘      └───────┬──────────────────┬───────────────┘   │
//! │          │                      │                  │                    │
//! │  ┌───────▼───────┐      ┌───────▼───────┐  ┌───────▼───────┐          │
//! │  │ repositories  │      │  StockLedger  │  │   Notifier    │          │
//! │  │ sale/product/ │      │  guarded +/-  │  │  post-commit  │          │
//! │  │ customer/svc  │      │  on stock     │  │  (non-fatal)  │          │
//! │  └───────────────┘      └───────────────┘  └───────────────┘          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Business rules live in `patitas-core`; this crate wires them to
//! SQLite and owns every transaction boundary.
//!
//! ## Usage
//! ```rust,ignore
//! use patitas_db::{Database, DbConfig, SaleEngine};
//!
//! let db = Database::new(DbConfig::new("patitas.db")).await?;
//! let engine = SaleEngine::new(db.pool().clone());
//! let aggregate = engine.compose_sale(request).await?;
//! ```

pub mod engine;
pub mod error;
pub mod migrations;
pub mod notify;
pub mod pool;
pub mod repository;
pub mod stock;

pub use engine::{
    ComposeSaleRequest, MutateSaleRequest, ProcessReturnRequest, ProductLineRequest,
    ReturnLineRequest, SaleEngine, ServiceLineRequest,
};
pub use error::{DbError, DbResult, EngineError, EngineResult};
pub use notify::{LogNotifier, Notifier, NotifyError};
pub use pool::{Database, DbConfig};
pub use stock::{StockDirection, StockLedger};
