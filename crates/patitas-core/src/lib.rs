//! # patitas-core: Pure Business Logic for the Patitas Sale Engine
//!
//! This crate is the **heart** of the sale transaction engine. It
//! contains all business logic as pure functions with zero I/O
//! dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Patitas Architecture                               │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              Request Handlers (out of scope)                    │   │
//! │  │    compose_sale, mutate_sale, change_status, process_return    │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ patitas-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │  pricing  │  │  status   │  │   │
//! │  │   │ Sale/Line │  │   Money   │  │ line calc │  │ sm table  │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 patitas-db (Database Layer)                     │   │
//! │  │        SQLite repositories, transactions, sale engine           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Sale, ProductLine, Product, Pet, ...)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`pricing`] - Line pricing calculator
//! - [`status`] - Sale status transition table
//! - [`error`] - Domain error types
//! - [`validation`] - Business rule validation
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: Every function is deterministic
//! 2. **No I/O**: Database, network, file system access is FORBIDDEN here
//! 3. **Integer Money**: All monetary values are cents (i64)
//! 4. **Explicit Errors**: All errors are typed, never strings or panics

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod money;
pub mod pricing;
pub mod status;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::{Money, TaxRate};
pub use pricing::{price_product_line, price_service_line, ProductLinePricing};
pub use status::{plan_transition, StockSideEffect};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Reserved id for the generic walk-in customer.
///
/// Seeded by the initial migration. Sales with no customer fall back to
/// this record; its service lines resolve to the generic pet.
pub const WALK_IN_CUSTOMER_ID: &str = "00000000-0000-0000-0000-000000000001";

/// Reserved id for the generic pet owned by the walk-in customer.
///
/// Every service line ends up with a pet reference, which downstream
/// reporting assumes; walk-in sales resolve here.
pub const GENERIC_PET_ID: &str = "00000000-0000-0000-0000-000000000002";

/// Sentinel document number designating the walk-in/generic consumer.
pub const WALK_IN_DOCUMENT: &str = "9999999999";

/// Maximum quantity for a single sale line.
///
/// Prevents accidental over-ordering (e.g. typing 1000 instead of 10).
pub const MAX_LINE_QUANTITY: i64 = 9999;
