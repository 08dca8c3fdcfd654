//! # Domain Types
//!
//! Core domain types for the Patitas sale engine.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌──────────────────┐   ┌──────────────────┐     │
//! │  │      Sale       │   │   ProductLine    │   │   ServiceLine    │     │
//! │  │  ─────────────  │──►│  ─────────────   │   │  ─────────────   │     │
//! │  │  id (UUID)      │   │  product_id      │   │  service_id      │     │
//! │  │  status / kind  │   │  qty, unit price │   │  pet_id          │     │
//! │  │  totals (cents) │   │  subtotal + tax  │   │  subtotal (no    │     │
//! │  │  origin_sale_id │   │                  │   │  tax, ever)      │     │
//! │  └─────────────────┘   └──────────────────┘   └──────────────────┘     │
//! │                                                                         │
//! │  Product (stock!)    Customer (walk-in sentinel)    Pet / ServiceItem  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Invariants Carried Here
//! - `Sale`: `total_cents == subtotal_cents + tax_cents` after any mutation
//! - `ProductLine`: `subtotal == unit_price * quantity`,
//!   `total_with_tax == subtotal + unit_tax * quantity`
//! - `ServiceLine`: never carries tax
//! - `Product.stock` never goes negative through sale-driven decrements

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::money::{Money, TaxRate};

// =============================================================================
// Sale Status
// =============================================================================

/// The status of a sale. Transitions are governed by [`crate::status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    /// Awaiting confirmation (async payment methods such as bank transfer).
    Pending,
    /// Confirmed sale.
    Effective,
    /// Cancelled; stock reversed unless explicitly skipped. Terminal.
    Cancelled,
    /// Fully returned. Terminal.
    Returned,
    /// Part of the quantity was returned; remainder still effective.
    PartiallyReturned,
}

impl SaleStatus {
    /// A terminal status admits no further transitions.
    pub const fn is_terminal(&self) -> bool {
        matches!(self, SaleStatus::Cancelled | SaleStatus::Returned)
    }

    /// Parses the wire name used in request bodies.
    pub fn from_wire(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(SaleStatus::Pending),
            "effective" => Some(SaleStatus::Effective),
            "cancelled" => Some(SaleStatus::Cancelled),
            "returned" => Some(SaleStatus::Returned),
            "partially_returned" => Some(SaleStatus::PartiallyReturned),
            _ => None,
        }
    }

    /// Wire name, matching the serde/database representation.
    pub const fn as_wire(&self) -> &'static str {
        match self {
            SaleStatus::Pending => "pending",
            SaleStatus::Effective => "effective",
            SaleStatus::Cancelled => "cancelled",
            SaleStatus::Returned => "returned",
            SaleStatus::PartiallyReturned => "partially_returned",
        }
    }
}

// =============================================================================
// Sale Kind
// =============================================================================

/// Classifies a sale row: the original transaction, or a compensating
/// record produced by the return/exchange processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum SaleKind {
    Sale,
    Return,
    Exchange,
}

// =============================================================================
// Payment Method
// =============================================================================

/// Closed set of accepted payment methods.
///
/// Cash and card settle immediately (`Effective` on creation);
/// bank transfers start `Pending` until approved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    Transfer,
}

impl PaymentMethod {
    /// Parses the wire name used in request bodies.
    pub fn from_wire(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "cash" => Some(PaymentMethod::Cash),
            "card" => Some(PaymentMethod::Card),
            "transfer" => Some(PaymentMethod::Transfer),
            _ => None,
        }
    }

    /// Initial sale status implied by this method when the caller does
    /// not supply one.
    pub const fn default_status(&self) -> SaleStatus {
        match self {
            PaymentMethod::Cash | PaymentMethod::Card => SaleStatus::Effective,
            PaymentMethod::Transfer => SaleStatus::Pending,
        }
    }
}

// =============================================================================
// Sale
// =============================================================================

/// Sale header: totals, payment metadata, status and lineage.
///
/// A `Return`/`Exchange` sale links back to the sale it compensates via
/// `origin_sale_id`, preserving an auditable chain — history is never
/// mutated in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Sale {
    pub id: String,
    pub customer_id: String,
    /// Operator who registered the sale.
    pub user_id: String,
    pub status: SaleStatus,
    pub kind: SaleKind,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
    pub payment_method: PaymentMethod,
    /// For cash: amount the customer handed over.
    pub tendered_cents: Option<i64>,
    /// For cash: change returned, floored at zero.
    pub change_cents: Option<i64>,
    /// External payment reference (transfer id, QR code payload).
    pub payment_reference: Option<String>,
    /// Original sale for returns/exchanges.
    pub origin_sale_id: Option<String>,
    pub notes: Option<String>,
    /// Stored receipt attachment reference, if one was uploaded.
    pub receipt_attachment: Option<String>,
    /// Business date of the sale (caller-supplied, never in the future).
    pub sold_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Sale {
    /// Returns the header subtotal as Money.
    #[inline]
    pub fn subtotal(&self) -> Money {
        Money::from_cents(self.subtotal_cents)
    }

    /// Returns the header grand total as Money.
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }
}

// =============================================================================
// Product Line
// =============================================================================

/// A product entry attached to a sale header.
///
/// Prices are snapshotted at sale time; the product row may change later.
/// Quantities are positive on ordinary sales and negative on the returned
/// lines of a compensating sale, so totals always recompute from lines.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ProductLine {
    pub id: String,
    pub sale_id: String,
    pub product_id: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    /// `unit_price * quantity`
    pub subtotal_cents: i64,
    /// Tax per unit; zero when the product is not tax-applicable.
    pub unit_tax_cents: i64,
    /// `subtotal + unit_tax * quantity`
    pub total_with_tax_cents: i64,
    pub created_at: DateTime<Utc>,
}

impl ProductLine {
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    #[inline]
    pub fn subtotal(&self) -> Money {
        Money::from_cents(self.subtotal_cents)
    }
}

// =============================================================================
// Service Line
// =============================================================================

/// A service entry attached to a sale header. Services never carry tax.
///
/// After pet resolution every service line references a concrete pet;
/// for walk-in sales that is the reserved generic pet, optionally
/// decorated with a caller-supplied temporary name/species for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ServiceLine {
    pub id: String,
    pub sale_id: String,
    pub service_id: String,
    pub pet_id: String,
    /// Display-only descriptor for walk-in customers.
    pub temp_pet_name: Option<String>,
    pub temp_pet_species: Option<String>,
    pub quantity: i64,
    pub unit_price_cents: i64,
    /// `unit_price * quantity`; no tax fields exist for services.
    pub subtotal_cents: i64,
    pub created_at: DateTime<Utc>,
}

impl ServiceLine {
    #[inline]
    pub fn subtotal(&self) -> Money {
        Money::from_cents(self.subtotal_cents)
    }
}

// =============================================================================
// Product
// =============================================================================

/// A stocked product. `stock` is the single cross-sale shared mutable
/// resource; it is only ever written through the stock ledger operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    pub id: String,
    pub name: String,
    pub category: Option<String>,
    /// On-hand quantity. Never negative.
    pub stock: i64,
    pub tax_applicable: bool,
    /// Tax rate in basis points (1900 = 19%).
    pub tax_rate_bps: u32,
    pub price_cents: i64,
    /// Soft-delete flag.
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    #[inline]
    pub fn tax_rate(&self) -> TaxRate {
        TaxRate::from_bps(self.tax_rate_bps)
    }
}

// =============================================================================
// Customer
// =============================================================================

/// A registered customer, or the reserved walk-in sentinel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub document_number: String,
    pub created_at: DateTime<Utc>,
}

impl Customer {
    /// The sentinel document number designates the generic walk-in
    /// consumer; service lines on their sales resolve to the reserved
    /// generic pet instead of requiring a registered one.
    pub fn is_walk_in(&self) -> bool {
        self.document_number == crate::WALK_IN_DOCUMENT
    }
}

// =============================================================================
// Pet
// =============================================================================

/// A customer's pet, target of service lines.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Pet {
    pub id: String,
    pub customer_id: String,
    pub name: String,
    pub species: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Service Item
// =============================================================================

/// A bookable service from the catalog (bath, grooming, consultation).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ServiceItem {
    pub id: String,
    pub name: String,
    pub price_cents: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl ServiceItem {
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }
}

// =============================================================================
// Sale Aggregate
// =============================================================================

/// The fully-populated result shape returned by every engine operation.
///
/// Reading a sale back immediately after composition reproduces the same
/// header totals and the same set of lines (order-independent equality).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleAggregate {
    pub sale: Sale,
    pub product_lines: Vec<ProductLine>,
    pub service_lines: Vec<ServiceLine>,
}

// =============================================================================
// Unit Tests
// =============================================================================
