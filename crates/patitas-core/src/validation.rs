//! # Validation Module
//!
//! Upfront validation helpers for sale requests. The engine performs a
//! single decode-and-validate pass that produces fully-typed values
//! before any domain logic runs; these are the building blocks.
//!
//! Validation failures never open a transaction.

use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, Utc};

use crate::error::ValidationError;
use crate::money::Money;
use crate::MAX_LINE_QUANTITY;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validates a line quantity: positive and within the sanity cap.
pub fn validate_quantity(field: &str, qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }

    if qty > MAX_LINE_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 1,
            max: MAX_LINE_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a unit price: strictly positive.
///
/// Malformed locale strings parse to zero upstream, so this is also
/// where unparseable amounts get rejected with a field reference.
pub fn validate_unit_price(field: &str, price: Money) -> ValidationResult<()> {
    if !price.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }

    Ok(())
}

/// Validates a non-empty id field.
pub fn validate_id(field: &str, id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    Ok(())
}

/// Rejects duplicate product ids within the same sale.
pub fn validate_no_duplicate_products<'a, I>(product_ids: I) -> ValidationResult<()>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = HashSet::new();
    for id in product_ids {
        if !seen.insert(id) {
            return Err(ValidationError::Duplicate {
                field: "product_id".to_string(),
                value: id.to_string(),
            });
        }
    }

    Ok(())
}

/// Parses a caller-supplied sale date and rejects future dates.
///
/// Accepts RFC 3339 timestamps and plain `YYYY-MM-DD` dates; a date-only
/// value is read as midnight UTC.
pub fn validate_sale_date(raw: &str, now: DateTime<Utc>) -> ValidationResult<DateTime<Utc>> {
    let raw = raw.trim();

    let parsed = DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d").map(|d| {
                DateTime::from_naive_utc_and_offset(d.and_time(chrono::NaiveTime::MIN), Utc)
            })
        })
        .map_err(|e| ValidationError::InvalidFormat {
            field: "sold_at".to_string(),
            reason: e.to_string(),
        })?;

    if parsed > now {
        return Err(ValidationError::FutureDate {
            value: raw.to_string(),
        });
    }

    Ok(parsed)
}

// =============================================================================
// Unit Tests
// =============================================================================
