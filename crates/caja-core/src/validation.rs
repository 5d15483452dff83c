//! # Validation Module
//!
//! Input checks for the register screens, run before anything touches
//! storage.
//!
//! ## Usage
//! ```rust
//! use caja_core::money::Money;
//! use caja_core::validation::{expense_reason, validate_expense_amount};
//!
//! validate_expense_amount(Money::from_cents(12_000)).unwrap();
//! let reason = expense_reason("Compra de hielo", Some("001-001-01-00000123")).unwrap();
//! assert_eq!(reason, "Compra de hielo | Factura: 001-001-01-00000123");
//! ```

use crate::error::ValidationError;
use crate::money::Money;
use crate::types::PaymentType;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

pub const MAX_REASON_LEN: usize = 500;
pub const MAX_IDENTITY_LEN: usize = 100;

// =============================================================================
// Identity
// =============================================================================

/// Cashier ids, register names and similar keys must be non-empty.
pub fn validate_identity(field: &str, value: &str) -> ValidationResult<()> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::required(field));
    }
    if value.len() > MAX_IDENTITY_LEN {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_IDENTITY_LEN,
        });
    }
    Ok(())
}

// =============================================================================
// Expenses
// =============================================================================

/// Expenses must be strictly positive.
pub fn validate_expense_amount(amount: Money) -> ValidationResult<()> {
    if !amount.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: "monto".to_string(),
        });
    }
    Ok(())
}

/// Builds the stored expense reason, appending the supplier invoice
/// reference when one is given.
pub fn expense_reason(reason: &str, invoice_ref: Option<&str>) -> ValidationResult<String> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(ValidationError::required("motivo"));
    }

    let full = match invoice_ref.map(str::trim).filter(|r| !r.is_empty()) {
        Some(reference) => format!("{} | Factura: {}", reason, reference),
        None => reason.to_string(),
    };

    if full.len() > MAX_REASON_LEN {
        return Err(ValidationError::TooLong {
            field: "motivo".to_string(),
            max: MAX_REASON_LEN,
        });
    }
    Ok(full)
}

// =============================================================================
// Payments
// =============================================================================

/// A tender line must be positive; dollar tenders also need the dollar
/// amount received.
pub fn validate_payment(payment_type: PaymentType, amount: Money, usd_amount: Option<Money>) -> ValidationResult<()> {
    if !amount.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: "monto".to_string(),
        });
    }
    if payment_type == PaymentType::Usd {
        match usd_amount {
            Some(usd) if usd.is_positive() => {}
            Some(_) => {
                return Err(ValidationError::MustBePositive {
                    field: "usd_monto".to_string(),
                })
            }
            None => return Err(ValidationError::required("usd_monto")),
        }
    }
    Ok(())
}

// =============================================================================
// Authorization
// =============================================================================

/// The clearance code is compared verbatim, so only emptiness is checked.
pub fn validate_authorization_code(code: &str) -> ValidationResult<()> {
    if code.is_empty() {
        return Err(ValidationError::required("clave"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity() {
        assert!(validate_identity("cajero_id", "c1").is_ok());
        assert_eq!(
            validate_identity("caja", "   "),
            Err(ValidationError::required("caja"))
        );
        assert!(validate_identity("caja", &"x".repeat(101)).is_err());
    }

    #[test]
    fn test_expense_amount_must_be_positive() {
        assert!(validate_expense_amount(Money::from_cents(1)).is_ok());
        assert!(validate_expense_amount(Money::zero()).is_err());
        assert!(validate_expense_amount(Money::from_cents(-100)).is_err());
    }

    #[test]
    fn test_expense_reason() {
        assert_eq!(expense_reason("  Hielo ", None).unwrap(), "Hielo");
        assert_eq!(expense_reason("Hielo", Some("  ")).unwrap(), "Hielo");
        assert_eq!(
            expense_reason("Hielo", Some("A-77")).unwrap(),
            "Hielo | Factura: A-77"
        );
        assert_eq!(
            expense_reason("", Some("A-77")),
            Err(ValidationError::required("motivo"))
        );
    }

    #[test]
    fn test_payment_rules() {
        assert!(validate_payment(PaymentType::Cash, Money::from_cents(100), None).is_ok());
        assert!(validate_payment(PaymentType::Card, Money::zero(), None).is_err());
        assert_eq!(
            validate_payment(PaymentType::Usd, Money::from_cents(2475), None),
            Err(ValidationError::required("usd_monto"))
        );
        assert!(validate_payment(PaymentType::Usd, Money::from_cents(2475), Some(Money::from_cents(100))).is_ok());
    }

    #[test]
    fn test_authorization_code_kept_verbatim() {
        assert!(validate_authorization_code(" 1234 ").is_ok());
        assert!(validate_authorization_code("").is_err());
    }
}
