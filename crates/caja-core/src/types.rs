//! # Domain Types
//!
//! Records and identities shared by the register and invoicing flows.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │ CashierContext  │   │ CaiAuthorization│   │  PaymentRecord  │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  cashier_id     │   │  cashier_id     │   │  invoice        │       │
//! │  │  cashier_name   │   │  cai            │   │  payment_type   │       │
//! │  │  register       │   │  range (start,  │   │  amount         │       │
//! │  └─────────────────┘   │         end)    │   │  usd_amount     │       │
//! │                        │  register       │   │  recorded_at    │       │
//! │  ┌─────────────────┐   └─────────────────┘   └─────────────────┘       │
//! │  │  ExpenseRecord  │                                                    │
//! │  │  amount, reason │   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │  recorded_at    │   │  InvoiceRange   │   │  PaymentType    │       │
//! │  └─────────────────┘   │  start ≤ end    │   │  efectivo ...   │       │
//! │                        └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Timestamps are business-timezone wall clock (`NaiveDateTime`), the same
//! representation the `cierres`, `pagos` and `gastos` tables persist.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;

// =============================================================================
// Cashier Context
// =============================================================================

/// Who is operating which register.
///
/// Passed explicitly into every register and invoicing operation; nothing
/// in the workspace caches the current cashier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CashierContext {
    pub cashier_id: String,
    pub cashier_name: String,
    pub register: String,
}

impl CashierContext {
    pub fn new(
        cashier_id: impl Into<String>,
        cashier_name: impl Into<String>,
        register: impl Into<String>,
    ) -> Self {
        CashierContext {
            cashier_id: cashier_id.into(),
            cashier_name: cashier_name.into(),
            register: register.into(),
        }
    }
}

// =============================================================================
// Payment Type
// =============================================================================

/// Payment channel as stored in `pagos.tipo`.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum PaymentType {
    #[cfg_attr(feature = "sqlx", sqlx(rename = "efectivo"))]
    #[serde(rename = "efectivo")]
    Cash,
    #[cfg_attr(feature = "sqlx", sqlx(rename = "tarjeta"))]
    #[serde(rename = "tarjeta")]
    Card,
    #[cfg_attr(feature = "sqlx", sqlx(rename = "transferencia"))]
    #[serde(rename = "transferencia")]
    Transfer,
    #[cfg_attr(feature = "sqlx", sqlx(rename = "dolares"))]
    #[serde(rename = "dolares")]
    Usd,
}

impl PaymentType {
    pub const ALL: [PaymentType; 4] = [
        PaymentType::Cash,
        PaymentType::Card,
        PaymentType::Transfer,
        PaymentType::Usd,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            PaymentType::Cash => "efectivo",
            PaymentType::Card => "tarjeta",
            PaymentType::Transfer => "transferencia",
            PaymentType::Usd => "dolares",
        }
    }
}

impl fmt::Display for PaymentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "efectivo" => Ok(PaymentType::Cash),
            "tarjeta" => Ok(PaymentType::Card),
            "transferencia" => Ok(PaymentType::Transfer),
            "dolares" => Ok(PaymentType::Usd),
            other => Err(ValidationError::invalid_format(
                "tipo",
                format!("unknown payment type '{}'", other),
            )),
        }
    }
}

// =============================================================================
// Payment Record
// =============================================================================

/// One tender line of a finalized sale.
///
/// For `Usd` payments `amount` is the lempira equivalent charged and
/// `usd_amount` the dollars actually received; reconciliation counts the
/// dollars.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PaymentRecord {
    pub invoice: InvoiceNumber,
    pub payment_type: PaymentType,
    pub amount: Money,
    pub usd_amount: Option<Money>,
    pub cashier_id: String,
    pub register: String,
    #[ts(as = "String")]
    pub recorded_at: NaiveDateTime,
}

// =============================================================================
// Expense Record
// =============================================================================

/// Cash taken out of the drawer ("gasto").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ExpenseRecord {
    pub amount: Money,
    pub reason: String,
    pub cashier_id: String,
    pub register: String,
    #[ts(as = "String")]
    pub date: NaiveDate,
    #[ts(as = "String")]
    pub recorded_at: NaiveDateTime,
}

// =============================================================================
// Invoice Numbers
// =============================================================================

/// A fiscal invoice number within a CAI range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct InvoiceNumber(i64);

impl InvoiceNumber {
    #[inline]
    pub const fn new(value: i64) -> Self {
        InvoiceNumber(value)
    }

    #[inline]
    pub const fn value(&self) -> i64 {
        self.0
    }

    #[inline]
    pub const fn next(&self) -> Self {
        InvoiceNumber(self.0 + 1)
    }
}

impl fmt::Display for InvoiceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Inclusive range of invoice numbers authorized by a CAI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct InvoiceRange {
    start: i64,
    end: i64,
}

impl InvoiceRange {
    /// Builds a range; `start` must be at least 1 and not past `end`.
    pub fn new(start: i64, end: i64) -> CoreResult<Self> {
        if start < 1 || start > end {
            return Err(CoreError::InvalidRange { start, end });
        }
        Ok(InvoiceRange { start, end })
    }

    #[inline]
    pub const fn start(&self) -> i64 {
        self.start
    }

    #[inline]
    pub const fn end(&self) -> i64 {
        self.end
    }

    #[inline]
    pub const fn contains(&self, number: InvoiceNumber) -> bool {
        number.0 >= self.start && number.0 <= self.end
    }

    /// Total numbers the authorization covers.
    #[inline]
    pub const fn capacity(&self) -> i64 {
        self.end - self.start + 1
    }
}

/// Fiscal authorization row from `cai_facturas`.
///
/// The `register` it names is where the cashier is assigned to sell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CaiAuthorization {
    pub cashier_id: String,
    pub cai: String,
    pub range: InvoiceRange,
    pub register: String,
}

/// A finalized sale's invoice header (`facturas`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct IssuedInvoice {
    pub number: InvoiceNumber,
    pub cai: String,
    pub cashier_id: String,
    pub cashier_name: String,
    pub register: String,
    pub customer: String,
    pub total: Money,
    #[ts(as = "String")]
    pub issued_at: NaiveDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_type_round_trip_names() {
        for payment_type in PaymentType::ALL {
            assert_eq!(payment_type.as_str().parse::<PaymentType>().unwrap(), payment_type);
        }
        assert!("cheque".parse::<PaymentType>().is_err());
    }

    #[test]
    fn test_payment_type_serde_uses_table_names() {
        let json = serde_json::to_string(&PaymentType::Transfer).unwrap();
        assert_eq!(json, "\"transferencia\"");
    }

    #[test]
    fn test_invoice_range_validation() {
        assert!(InvoiceRange::new(1, 100).is_ok());
        assert!(InvoiceRange::new(7, 7).is_ok());
        assert!(matches!(
            InvoiceRange::new(0, 100),
            Err(CoreError::InvalidRange { start: 0, end: 100 })
        ));
        assert!(InvoiceRange::new(101, 100).is_err());
    }

    #[test]
    fn test_invoice_range_contains() {
        let range = InvoiceRange::new(1001, 1500).unwrap();
        assert!(range.contains(InvoiceNumber::new(1001)));
        assert!(range.contains(InvoiceNumber::new(1500)));
        assert!(!range.contains(InvoiceNumber::new(1000)));
        assert!(!range.contains(InvoiceNumber::new(1501)));
        assert_eq!(range.capacity(), 500);
    }
}
