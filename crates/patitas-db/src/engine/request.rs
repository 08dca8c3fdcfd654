//! # Engine Request Types
//!
//! Canonical request shapes for the four engine operations, plus the
//! validated forms produced by the single upfront decode pass.
//!
//! Callers hand over loosely-typed material (payment method and status
//! as wire strings, amounts as possibly locale-formatted decimal
//! strings); validation converts everything into typed values before
//! any domain logic runs, so the engine never checks fields defensively
//! deep inside a transaction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use patitas_core::{
    validation::{
        validate_id, validate_no_duplicate_products, validate_quantity, validate_sale_date,
        validate_unit_price,
    },
    Money, PaymentMethod, SaleStatus, ValidationError,
};

// =============================================================================
// Raw requests
// =============================================================================

/// A product line as supplied by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductLineRequest {
    pub product_id: String,
    pub quantity: i64,
    /// Decimal string; locale-formatted variants are accepted.
    pub unit_price: String,
}

/// A service line as supplied by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceLineRequest {
    pub service_id: String,
    /// Explicit pet reference; resolution falls back per the pet rules
    /// when absent.
    pub pet_id: Option<String>,
    /// Display-only descriptor, honored for walk-in customers.
    pub temp_pet_name: Option<String>,
    pub temp_pet_species: Option<String>,
    pub quantity: i64,
    pub unit_price: String,
}

/// Request shape for composing a new sale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComposeSaleRequest {
    /// Absent means the walk-in customer.
    pub customer_id: Option<String>,
    /// Operator registering the sale.
    pub user_id: String,
    /// Wire name: `cash` | `card` | `transfer`.
    pub payment_method: String,
    /// Initial status override; defaults from the payment method.
    pub status: Option<String>,
    /// Cash only: amount handed over, as a decimal string.
    pub tendered: Option<String>,
    pub payment_reference: Option<String>,
    pub notes: Option<String>,
    pub receipt_attachment: Option<String>,
    /// RFC 3339 or `YYYY-MM-DD`; defaults to now.
    pub sold_at: Option<String>,
    pub product_lines: Vec<ProductLineRequest>,
    pub service_lines: Vec<ServiceLineRequest>,
}

/// Request shape for mutating an existing sale.
///
/// Header scalars follow "update if provided, else keep". Providing
/// either line array replaces the sale's full line-item set (an absent
/// companion array means "no lines of that kind").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MutateSaleRequest {
    pub customer_id: Option<String>,
    pub payment_method: Option<String>,
    pub tendered: Option<String>,
    pub payment_reference: Option<String>,
    pub notes: Option<String>,
    pub receipt_attachment: Option<String>,
    pub sold_at: Option<String>,
    pub product_lines: Option<Vec<ProductLineRequest>>,
    pub service_lines: Option<Vec<ServiceLineRequest>>,
}

/// A returned line: quantity comes back into stock, priced from the
/// origin sale's snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnLineRequest {
    pub product_id: String,
    pub quantity: i64,
}

/// Request shape for processing a return/exchange against a sale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessReturnRequest {
    pub origin_sale_id: String,
    /// Operator processing the return.
    pub user_id: String,
    pub reason: Option<String>,
    /// Outstanding balance carried into the exchange, decimal string.
    pub prior_balance: Option<String>,
    pub returned_lines: Vec<ReturnLineRequest>,
    /// Replacement merchandise leaving stock.
    pub exchange_lines: Vec<ProductLineRequest>,
}

// =============================================================================
// Validated forms
// =============================================================================

#[derive(Debug, Clone)]
pub(crate) struct ProductLineSpec {
    pub product_id: String,
    pub quantity: i64,
    pub unit_price: Money,
}

#[derive(Debug, Clone)]
pub(crate) struct ServiceLineSpec {
    pub service_id: String,
    pub pet_id: Option<String>,
    pub temp_pet_name: Option<String>,
    pub temp_pet_species: Option<String>,
    pub quantity: i64,
    pub unit_price: Money,
}

#[derive(Debug, Clone)]
pub(crate) struct ValidatedCompose {
    pub customer_id: Option<String>,
    pub user_id: String,
    pub payment_method: PaymentMethod,
    pub status: SaleStatus,
    pub tendered: Option<Money>,
    pub payment_reference: Option<String>,
    pub notes: Option<String>,
    pub receipt_attachment: Option<String>,
    pub sold_at: DateTime<Utc>,
    pub product_lines: Vec<ProductLineSpec>,
    pub service_lines: Vec<ServiceLineSpec>,
}

#[derive(Debug, Clone)]
pub(crate) struct ValidatedMutate {
    pub customer_id: Option<String>,
    pub payment_method: Option<PaymentMethod>,
    pub tendered: Option<Money>,
    pub payment_reference: Option<String>,
    pub notes: Option<String>,
    pub receipt_attachment: Option<String>,
    pub sold_at: Option<DateTime<Utc>>,
    /// `Some` means "replace the full line-item set with these".
    pub lines: Option<(Vec<ProductLineSpec>, Vec<ServiceLineSpec>)>,
}

#[derive(Debug, Clone)]
pub(crate) struct ValidatedReturn {
    pub origin_sale_id: String,
    pub user_id: String,
    pub reason: Option<String>,
    pub prior_balance: Option<Money>,
    pub returned_lines: Vec<ReturnLineRequest>,
    pub exchange_lines: Vec<ProductLineSpec>,
}

// =============================================================================
// Validation
// =============================================================================

fn validate_product_lines(
    lines: &[ProductLineRequest],
) -> Result<Vec<ProductLineSpec>, ValidationError> {
    validate_no_duplicate_products(lines.iter().map(|l| l.product_id.as_str()))?;

    let mut specs = Vec::with_capacity(lines.len());
    for line in lines {
        validate_id("product_id", &line.product_id)?;
        validate_quantity("quantity", line.quantity)?;

        let unit_price = Money::parse(&line.unit_price);
        validate_unit_price("unit_price", unit_price)?;

        specs.push(ProductLineSpec {
            product_id: line.product_id.clone(),
            quantity: line.quantity,
            unit_price,
        });
    }

    Ok(specs)
}

fn validate_service_lines(
    lines: &[ServiceLineRequest],
) -> Result<Vec<ServiceLineSpec>, ValidationError> {
    let mut specs = Vec::with_capacity(lines.len());
    for line in lines {
        validate_id("service_id", &line.service_id)?;
        validate_quantity("quantity", line.quantity)?;

        let unit_price = Money::parse(&line.unit_price);
        validate_unit_price("unit_price", unit_price)?;

        specs.push(ServiceLineSpec {
            service_id: line.service_id.clone(),
            pet_id: line.pet_id.clone(),
            temp_pet_name: line.temp_pet_name.clone(),
            temp_pet_species: line.temp_pet_species.clone(),
            quantity: line.quantity,
            unit_price,
        });
    }

    Ok(specs)
}

fn validate_payment_method(raw: &str) -> Result<PaymentMethod, ValidationError> {
    PaymentMethod::from_wire(raw).ok_or_else(|| ValidationError::NotAllowed {
        field: "payment_method".to_string(),
        allowed: vec!["cash".to_string(), "card".to_string(), "transfer".to_string()],
    })
}

impl ComposeSaleRequest {
    pub(crate) fn validate(&self, now: DateTime<Utc>) -> Result<ValidatedCompose, ValidationError> {
        validate_id("user_id", &self.user_id)?;

        let payment_method = validate_payment_method(&self.payment_method)?;

        // Only pre-settlement statuses make sense at creation time.
        let status = match &self.status {
            None => payment_method.default_status(),
            Some(raw) => match SaleStatus::from_wire(raw) {
                Some(s @ (SaleStatus::Pending | SaleStatus::Effective)) => s,
                _ => {
                    return Err(ValidationError::NotAllowed {
                        field: "status".to_string(),
                        allowed: vec!["pending".to_string(), "effective".to_string()],
                    })
                }
            },
        };

        if self.product_lines.is_empty() && self.service_lines.is_empty() {
            return Err(ValidationError::EmptySale);
        }

        let product_lines = validate_product_lines(&self.product_lines)?;
        let service_lines = validate_service_lines(&self.service_lines)?;

        let sold_at = match &self.sold_at {
            Some(raw) => validate_sale_date(raw, now)?,
            None => now,
        };

        let tendered = match &self.tendered {
            Some(raw) => {
                let amount = Money::parse(raw);
                validate_unit_price("tendered", amount)?;
                Some(amount)
            }
            None => None,
        };

        if payment_method == PaymentMethod::Cash && tendered.is_none() {
            return Err(ValidationError::Required {
                field: "tendered".to_string(),
            });
        }

        Ok(ValidatedCompose {
            customer_id: self.customer_id.clone(),
            user_id: self.user_id.clone(),
            payment_method,
            status,
            tendered,
            payment_reference: self.payment_reference.clone(),
            notes: self.notes.clone(),
            receipt_attachment: self.receipt_attachment.clone(),
            sold_at,
            product_lines,
            service_lines,
        })
    }
}

impl MutateSaleRequest {
    pub(crate) fn validate(&self, now: DateTime<Utc>) -> Result<ValidatedMutate, ValidationError> {
        let payment_method = match &self.payment_method {
            Some(raw) => Some(validate_payment_method(raw)?),
            None => None,
        };

        let sold_at = match &self.sold_at {
            Some(raw) => Some(validate_sale_date(raw, now)?),
            None => None,
        };

        let tendered = match &self.tendered {
            Some(raw) => {
                let amount = Money::parse(raw);
                validate_unit_price("tendered", amount)?;
                Some(amount)
            }
            None => None,
        };

        let lines = if self.product_lines.is_some() || self.service_lines.is_some() {
            let products = validate_product_lines(self.product_lines.as_deref().unwrap_or(&[]))?;
            let services = validate_service_lines(self.service_lines.as_deref().unwrap_or(&[]))?;

            if products.is_empty() && services.is_empty() {
                return Err(ValidationError::EmptySale);
            }

            Some((products, services))
        } else {
            None
        };

        Ok(ValidatedMutate {
            customer_id: self.customer_id.clone(),
            payment_method,
            tendered,
            payment_reference: self.payment_reference.clone(),
            notes: self.notes.clone(),
            receipt_attachment: self.receipt_attachment.clone(),
            sold_at,
            lines,
        })
    }
}

impl ProcessReturnRequest {
    pub(crate) fn validate(&self) -> Result<ValidatedReturn, ValidationError> {
        validate_id("origin_sale_id", &self.origin_sale_id)?;
        validate_id("user_id", &self.user_id)?;

        if self.returned_lines.is_empty() && self.exchange_lines.is_empty() {
            return Err(ValidationError::EmptySale);
        }

        validate_no_duplicate_products(self.returned_lines.iter().map(|l| l.product_id.as_str()))?;
        for line in &self.returned_lines {
            validate_id("product_id", &line.product_id)?;
            validate_quantity("quantity", line.quantity)?;
        }

        let exchange_lines = validate_product_lines(&self.exchange_lines)?;

        let prior_balance = self.prior_balance.as_ref().map(|raw| Money::parse(raw));

        Ok(ValidatedReturn {
            origin_sale_id: self.origin_sale_id.clone(),
            user_id: self.user_id.clone(),
            reason: self.reason.clone(),
            prior_balance,
            returned_lines: self.returned_lines.clone(),
            exchange_lines,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn base_compose() -> ComposeSaleRequest {
        ComposeSaleRequest {
            customer_id: Some("c-1".to_string()),
            user_id: "u-1".to_string(),
            payment_method: "cash".to_string(),
            status: None,
            tendered: Some("20.00".to_string()),
            payment_reference: None,
            notes: None,
            receipt_attachment: None,
            sold_at: None,
            product_lines: vec![ProductLineRequest {
                product_id: "p-1".to_string(),
                quantity: 2,
                unit_price: "10.00".to_string(),
            }],
            service_lines: vec![],
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_compose_happy_path() {
        let validated = base_compose().validate(now()).unwrap();
        assert_eq!(validated.payment_method, PaymentMethod::Cash);
        assert_eq!(validated.status, SaleStatus::Effective);
        assert_eq!(validated.tendered, Some(Money::from_cents(2000)));
        assert_eq!(validated.product_lines[0].unit_price.cents(), 1000);
    }

    #[test]
    fn test_transfer_defaults_to_pending() {
        let mut request = base_compose();
        request.payment_method = "transfer".to_string();
        request.tendered = None;

        let validated = request.validate(now()).unwrap();
        assert_eq!(validated.status, SaleStatus::Pending);
    }

    #[test]
    fn test_unknown_payment_method_rejected() {
        let mut request = base_compose();
        request.payment_method = "bitcoin".to_string();

        assert!(matches!(
            request.validate(now()),
            Err(ValidationError::NotAllowed { .. })
        ));
    }

    #[test]
    fn test_empty_sale_rejected() {
        let mut request = base_compose();
        request.product_lines.clear();

        assert!(matches!(
            request.validate(now()),
            Err(ValidationError::EmptySale)
        ));
    }

    #[test]
    fn test_cash_without_tendered_rejected() {
        let mut request = base_compose();
        request.tendered = None;

        assert!(matches!(
            request.validate(now()),
            Err(ValidationError::Required { .. })
        ));
    }

    #[test]
    fn test_terminal_creation_status_rejected() {
        let mut request = base_compose();
        request.status = Some("cancelled".to_string());

        assert!(matches!(
            request.validate(now()),
            Err(ValidationError::NotAllowed { .. })
        ));
    }

    #[test]
    fn test_duplicate_products_rejected() {
        let mut request = base_compose();
        request.product_lines.push(ProductLineRequest {
            product_id: "p-1".to_string(),
            quantity: 1,
            unit_price: "5.00".to_string(),
        });

        assert!(matches!(
            request.validate(now()),
            Err(ValidationError::Duplicate { .. })
        ));
    }

    #[test]
    fn test_mutate_lines_replace_requires_content() {
        let request = MutateSaleRequest {
            product_lines: Some(vec![]),
            ..Default::default()
        };

        assert!(matches!(
            request.validate(now()),
            Err(ValidationError::EmptySale)
        ));
    }

    #[test]
    fn test_mutate_header_only_keeps_lines_untouched() {
        let request = MutateSaleRequest {
            notes: Some("updated".to_string()),
            ..Default::default()
        };

        let validated = request.validate(now()).unwrap();
        assert!(validated.lines.is_none());
    }

    #[test]
    fn test_return_requires_some_line() {
        let request = ProcessReturnRequest {
            origin_sale_id: "s-1".to_string(),
            user_id: "u-1".to_string(),
            reason: None,
            prior_balance: None,
            returned_lines: vec![],
            exchange_lines: vec![],
        };

        assert!(matches!(
            request.validate(),
            Err(ValidationError::EmptySale)
        ));
    }
}
