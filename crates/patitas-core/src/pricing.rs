//! # Line Pricing Calculator
//!
//! Pure per-line pricing, no I/O.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Product line                         Service line                      │
//! │                                                                         │
//! │  subtotal   = price × qty             subtotal = price × qty            │
//! │  unit_tax   = applicable ?            (services never carry tax)        │
//! │               tax(price, rate) : 0                                      │
//! │  with_tax   = subtotal + unit_tax×qty                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Header totals are always recomputed from the sum of persisted lines,
//! so `sale.total == sale.subtotal + sale.tax` holds after any mutation.

use serde::{Deserialize, Serialize};

use crate::money::{Money, TaxRate};

/// Priced product line: subtotal, per-unit tax, line total with tax.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductLinePricing {
    pub subtotal: Money,
    pub unit_tax: Money,
    pub total_with_tax: Money,
}

/// Prices a product line.
///
/// `unit_tax` is zero when the product is not tax-applicable; quantity
/// may be negative for the returned lines of a compensating sale, in
/// which case subtotal and total flip sign with it.
pub fn price_product_line(
    unit_price: Money,
    quantity: i64,
    tax_applicable: bool,
    rate: TaxRate,
) -> ProductLinePricing {
    let subtotal = unit_price.multiply_quantity(quantity);
    let unit_tax = if tax_applicable {
        unit_price.calculate_tax(rate)
    } else {
        Money::zero()
    };

    ProductLinePricing {
        subtotal,
        unit_tax,
        total_with_tax: subtotal + unit_tax.multiply_quantity(quantity),
    }
}

/// Prices a service line. Services never carry tax, so the line total
/// is just `price × qty`.
pub fn price_service_line(unit_price: Money, quantity: i64) -> Money {
    unit_price.multiply_quantity(quantity)
}

// =============================================================================
// Unit Tests
// =============================================================================
