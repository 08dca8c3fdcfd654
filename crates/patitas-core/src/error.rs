//! # Error Types
//!
//! Domain-specific error types for patitas-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  patitas-core errors (this file)                                       │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  patitas-db errors (separate crate)                                    │
//! │  ├── DbError          - Database operation failures                    │
//! │  └── EngineError      - What engine callers see                        │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → EngineError → caller              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (product id, quantities, etc.)
//! 3. Errors are enum variants, never String
//! 4. Validation errors reference the offending field by name

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// These represent business rule violations. They are raised inside the
/// engine's transactional scope and always trigger a full rollback.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Insufficient stock to complete a sale-driven decrement.
    ///
    /// Reported with current-vs-requested quantities so the caller can
    /// show "only N left". Stock is left unchanged after the failure.
    #[error("Insufficient stock for product {product_id}: available {available}, requested {requested}")]
    InsufficientStock {
        product_id: String,
        available: i64,
        requested: i64,
    },

    /// The referenced pet does not belong to the sale's customer.
    #[error("Pet {pet_id} does not belong to customer {customer_id}")]
    PetOwnershipMismatch { pet_id: String, customer_id: String },

    /// A registered customer has no active pet to resolve a service
    /// line against.
    #[error("Customer {customer_id} has no registered active pet")]
    NoRegisteredPet { customer_id: String },

    /// The requested status change is not in the transition table.
    /// Nothing reaches the database.
    #[error("Invalid status transition: {from:?} -> {to:?}")]
    InvalidStatus {
        from: crate::types::SaleStatus,
        to: crate::types::SaleStatus,
    },

    /// Payment amount problems (e.g. cash tendered below total).
    #[error("Invalid payment amount: {reason}")]
    InvalidPaymentAmount { reason: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised by the upfront decode-and-validate pass, before any
/// transaction is opened — these never touch the database.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Invalid format (unparseable date, bad id, etc.).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in the allowed set (e.g. payment method).
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },

    /// Duplicate value (e.g. same product twice in one sale).
    #[error("{field} '{value}' appears more than once")]
    Duplicate { field: String, value: String },

    /// A sale needs at least one product or service line.
    #[error("sale must contain at least one product or service line")]
    EmptySale,

    /// Sale date must not be in the future.
    #[error("sale date {value} is in the future")]
    FutureDate { value: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SaleStatus;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InsufficientStock {
            product_id: "p-1".to_string(),
            available: 3,
            requested: 5,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for product p-1: available 3, requested 5"
        );
    }

    #[test]
    fn test_invalid_status_message() {
        let err = CoreError::InvalidStatus {
            from: SaleStatus::Cancelled,
            to: SaleStatus::Effective,
        };
        assert!(err.to_string().contains("Cancelled"));
        assert!(err.to_string().contains("Effective"));
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "customer_id".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
