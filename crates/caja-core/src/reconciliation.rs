//! # Reconciliation
//!
//! Compares what the cashier counted against what the system recorded for
//! one register session.
//!
//! ## Close Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Register Close (cierre)                           │
//! │                                                                         │
//! │  Cashier input ──► CountedTotalsInput::validate() ──► CountedTotals     │
//! │                          │ efectivo, tarjeta,                           │
//! │                          │ transferencia required                       │
//! │                          ▼                                              │
//! │  pagos + gastos in [opened_at, day end]                                 │
//! │        └──► SystemTotals::tally() ──► SystemTotals                      │
//! │                                                                         │
//! │  reconcile(counted, system, precio_dolar)                               │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  Variance per channel = counted − system                                │
//! │  USD variance × rate → lempiras                                         │
//! │  total == 0 ? "cuadrado" : "sin aclarar"                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Cash on the system side is net of expenses: money paid out of the drawer
//! is not expected back in the count.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::{ExchangeRate, Money};
use crate::session::ResolutionStatus;
use crate::types::{ExpenseRecord, PaymentRecord, PaymentType};

/// Fixed fund ("fondo fijo") declared at open. The business keeps it at zero.
pub const FIXED_FUND: Money = Money::zero();

// =============================================================================
// Counted Totals
// =============================================================================

/// Raw counts as submitted from the close form.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CountedTotalsInput {
    pub cash: Option<Money>,
    pub card: Option<Money>,
    pub transfer: Option<Money>,
    pub usd: Option<Money>,
}

impl CountedTotalsInput {
    /// Parses the four text fields of the close form; blank means absent.
    pub fn from_text(cash: &str, card: &str, transfer: &str, usd: &str) -> Result<Self, ValidationError> {
        fn field(name: &str, text: &str) -> Result<Option<Money>, ValidationError> {
            if text.trim().is_empty() {
                Ok(None)
            } else {
                Money::parse_decimal(name, text).map(Some)
            }
        }

        Ok(CountedTotalsInput {
            cash: field("efectivo", cash)?,
            card: field("tarjeta", card)?,
            transfer: field("transferencias", transfer)?,
            usd: field("dolares", usd)?,
        })
    }

    /// Cash, card and transfer must be present; USD defaults to zero.
    /// No count may be negative.
    pub fn validate(&self) -> Result<CountedTotals, ValidationError> {
        let cash = self.cash.ok_or_else(|| ValidationError::required("efectivo"))?;
        let card = self.card.ok_or_else(|| ValidationError::required("tarjeta"))?;
        let transfer = self
            .transfer
            .ok_or_else(|| ValidationError::required("transferencias"))?;
        let usd = self.usd.unwrap_or_default();

        for (field, amount) in [
            ("efectivo", cash),
            ("tarjeta", card),
            ("transferencias", transfer),
            ("dolares", usd),
        ] {
            if amount.is_negative() {
                return Err(ValidationError::MustNotBeNegative {
                    field: field.to_string(),
                });
            }
        }

        Ok(CountedTotals {
            cash,
            card,
            transfer,
            usd,
        })
    }
}

/// Validated counts. `usd` is in dollars.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CountedTotals {
    pub cash: Money,
    pub card: Money,
    pub transfer: Money,
    pub usd: Money,
}

// =============================================================================
// System Totals
// =============================================================================

/// The stretch of time a session's sales are attributed to.
///
/// Starts at the exact open stamp, not midnight, so a shift that crossed
/// midnight only sees its own payments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SessionWindow {
    #[ts(as = "String")]
    pub start: NaiveDateTime,
    #[ts(as = "String")]
    pub end: NaiveDateTime,
}

impl SessionWindow {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        SessionWindow { start, end }
    }

    pub fn contains(&self, at: NaiveDateTime) -> bool {
        at >= self.start && at <= self.end
    }
}

/// What the system recorded for a session window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SystemTotals {
    /// Cash payments before expenses.
    pub cash_gross: Money,
    pub expenses: Money,
    /// `cash_gross - expenses`; may go negative when expenses exceed sales.
    pub cash_net: Money,
    pub card: Money,
    pub transfer: Money,
    /// Dollars received.
    pub usd: Money,
}

impl SystemTotals {
    /// Totals for a close with no open session: no window, nothing owed.
    pub fn zero() -> Self {
        SystemTotals::default()
    }

    /// Sums payments by channel and expenses, keeping only records inside
    /// `window`.
    ///
    /// ## Example
    /// ```rust
    /// use caja_core::reconciliation::{SessionWindow, SystemTotals};
    /// use caja_core::day_range::parse_local;
    ///
    /// let window = SessionWindow::new(
    ///     parse_local("2025-10-31 08:00:00").unwrap(),
    ///     parse_local("2025-10-31 23:59:59").unwrap(),
    /// );
    /// let totals = SystemTotals::tally(&window, &[], &[]);
    /// assert!(totals.cash_net.is_zero());
    /// ```
    pub fn tally(window: &SessionWindow, payments: &[PaymentRecord], expenses: &[ExpenseRecord]) -> Self {
        let mut totals = SystemTotals::zero();

        for payment in payments.iter().filter(|p| window.contains(p.recorded_at)) {
            match payment.payment_type {
                PaymentType::Cash => totals.cash_gross += payment.amount,
                PaymentType::Card => totals.card += payment.amount,
                PaymentType::Transfer => totals.transfer += payment.amount,
                PaymentType::Usd => totals.usd += payment.usd_amount.unwrap_or_default(),
            }
        }

        totals.expenses = expenses
            .iter()
            .filter(|e| window.contains(e.recorded_at))
            .map(|e| e.amount)
            .sum();
        totals.cash_net = totals.cash_gross - totals.expenses;

        totals
    }
}

// =============================================================================
// Variance
// =============================================================================

/// Signed `counted - system` per channel, in lempiras.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Variance {
    pub fixed_fund: Money,
    pub cash: Money,
    pub card: Money,
    pub transfer: Money,
    /// Dollar difference before conversion.
    pub usd: Money,
    /// `usd` converted at the close-time rate.
    pub usd_local: Money,
    pub total: Money,
}

/// Outcome of one close.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Reconciliation {
    pub counted: CountedTotals,
    pub system: SystemTotals,
    pub exchange_rate: ExchangeRate,
    pub variance: Variance,
    pub status: ResolutionStatus,
}

impl Reconciliation {
    /// Cash the drawer should hold: fixed fund plus net cash sales.
    pub fn expected_cash(&self) -> Money {
        FIXED_FUND + self.system.cash_net
    }
}

/// Computes per-channel and aggregate variance and the initial status.
///
/// The fixed fund contributes `0 - FIXED_FUND`, which is zero under the
/// current rule.
pub fn reconcile(counted: &CountedTotals, system: &SystemTotals, rate: ExchangeRate) -> Reconciliation {
    let usd = counted.usd - system.usd;
    let variance = {
        let fixed_fund = Money::zero() - FIXED_FUND;
        let cash = counted.cash - system.cash_net;
        let card = counted.card - system.card;
        let transfer = counted.transfer - system.transfer;
        let usd_local = rate.convert(usd);
        Variance {
            fixed_fund,
            cash,
            card,
            transfer,
            usd,
            usd_local,
            total: fixed_fund + cash + card + transfer + usd_local,
        }
    };

    Reconciliation {
        counted: *counted,
        system: *system,
        exchange_rate: rate,
        variance,
        status: ResolutionStatus::from_variance(variance.total),
    }
}
