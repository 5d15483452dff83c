//! # Register Session
//!
//! Open (apertura) → close (cierre) lifecycle of one cashier's register.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   NoSession ──open()──► Open (APERTURA)                                 │
//! │       │                    │                                            │
//! │       │                    │ close(reconciliation)                      │
//! │       │                    ▼                                            │
//! │       │              Closed (CIERRE)                                    │
//! │       │              ├── Balanced    "cuadrado"                         │
//! │       │              ├── Unresolved  "sin aclarar" ──clear()──┐         │
//! │       │              └── Cleared     "aclarado"  ◄────────────┘         │
//! │       │                    ▲                                            │
//! │       └── closed_without_opening() (legacy close, no apertura row)      │
//! │                                                                         │
//! │   Balanced / Cleared permit a new apertura next shift.                  │
//! │   Unresolved sends the cashier to variance review.                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;
use uuid::Uuid;

use crate::day_range::DayRange;
use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::{ExchangeRate, Money};
use crate::reconciliation::{CountedTotals, Reconciliation, SessionWindow, SystemTotals, FIXED_FUND};
use crate::types::CashierContext;

// =============================================================================
// Session State
// =============================================================================

/// `cierres.estado`.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum SessionState {
    #[cfg_attr(feature = "sqlx", sqlx(rename = "APERTURA"))]
    #[serde(rename = "APERTURA")]
    Open,
    #[cfg_attr(feature = "sqlx", sqlx(rename = "CIERRE"))]
    #[serde(rename = "CIERRE")]
    Closed,
}

impl SessionState {
    pub const fn as_str(&self) -> &'static str {
        match self {
            SessionState::Open => "APERTURA",
            SessionState::Closed => "CIERRE",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionState {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "APERTURA" => Ok(SessionState::Open),
            "CIERRE" => Ok(SessionState::Closed),
            other => Err(ValidationError::invalid_format(
                "estado",
                format!("unknown session state '{}'", other),
            )),
        }
    }
}

// =============================================================================
// Resolution Status
// =============================================================================

/// `cierres.observacion`.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum ResolutionStatus {
    /// Variance is exactly zero.
    #[cfg_attr(feature = "sqlx", sqlx(rename = "cuadrado"))]
    #[serde(rename = "cuadrado")]
    Balanced,
    /// Non-zero variance nobody has signed off yet.
    #[cfg_attr(feature = "sqlx", sqlx(rename = "sin aclarar"))]
    #[serde(rename = "sin aclarar")]
    Unresolved,
    /// Non-zero variance cleared with the supervisor code.
    #[cfg_attr(feature = "sqlx", sqlx(rename = "aclarado"))]
    #[serde(rename = "aclarado")]
    Cleared,
}

impl ResolutionStatus {
    pub fn from_variance(total: Money) -> Self {
        if total.is_zero() {
            ResolutionStatus::Balanced
        } else {
            ResolutionStatus::Unresolved
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            ResolutionStatus::Balanced => "cuadrado",
            ResolutionStatus::Unresolved => "sin aclarar",
            ResolutionStatus::Cleared => "aclarado",
        }
    }

    /// Whether a cashier with this close may go straight to sales.
    pub const fn permits_sales(&self) -> bool {
        !matches!(self, ResolutionStatus::Unresolved)
    }
}

impl fmt::Display for ResolutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResolutionStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cuadrado" => Ok(ResolutionStatus::Balanced),
            "sin aclarar" => Ok(ResolutionStatus::Unresolved),
            "aclarado" => Ok(ResolutionStatus::Cleared),
            other => Err(ValidationError::invalid_format(
                "observacion",
                format!("unknown resolution '{}'", other),
            )),
        }
    }
}

/// Where a (cashier, register) stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "phase", content = "resolution", rename_all = "snake_case")]
pub enum SessionPhase {
    NoSession,
    Open,
    Closed(ResolutionStatus),
}

// =============================================================================
// Register Session
// =============================================================================

/// One `cierres` row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RegisterSession {
    pub id: String,
    pub cashier_id: String,
    pub cashier_name: String,
    pub register: String,
    pub state: SessionState,
    /// Apertura stamp; for a legacy close it is the close stamp.
    #[ts(as = "String")]
    pub opened_at: NaiveDateTime,
    #[ts(as = "Option<String>")]
    pub closed_at: Option<NaiveDateTime>,
    pub fixed_fund_declared: Money,
    pub counted: Option<CountedTotals>,
    pub system: Option<SystemTotals>,
    pub exchange_rate: Option<ExchangeRate>,
    pub variance: Option<Money>,
    pub resolution: Option<ResolutionStatus>,
}

impl RegisterSession {
    /// A fresh apertura for `ctx` stamped at `opened_at`.
    pub fn open(ctx: &CashierContext, opened_at: NaiveDateTime) -> Self {
        RegisterSession {
            id: Uuid::new_v4().to_string(),
            cashier_id: ctx.cashier_id.clone(),
            cashier_name: ctx.cashier_name.clone(),
            register: ctx.register.clone(),
            state: SessionState::Open,
            opened_at,
            closed_at: None,
            fixed_fund_declared: FIXED_FUND,
            counted: None,
            system: None,
            exchange_rate: None,
            variance: None,
            resolution: None,
        }
    }

    /// A close recorded with no apertura row behind it.
    pub fn closed_without_opening(
        ctx: &CashierContext,
        closed_at: NaiveDateTime,
        reconciliation: &Reconciliation,
    ) -> Self {
        let mut session = RegisterSession::open(ctx, closed_at);
        session.apply_close(closed_at, reconciliation);
        session
    }

    pub fn is_open(&self) -> bool {
        self.state == SessionState::Open
    }

    /// Sales window for this shift: from the open stamp to the end of the
    /// business day the close happens on.
    pub fn window(&self, close_day: &DayRange) -> SessionWindow {
        SessionWindow::new(self.opened_at, close_day.end)
    }

    /// APERTURA → CIERRE. Allowed exactly once.
    pub fn close(&mut self, closed_at: NaiveDateTime, reconciliation: &Reconciliation) -> CoreResult<()> {
        if self.state != SessionState::Open {
            return Err(self.invalid_state("close"));
        }
        self.apply_close(closed_at, reconciliation);
        Ok(())
    }

    /// Supervisor sign-off: "sin aclarar" → "aclarado". The numeric
    /// variance is left as recorded. Clearing a cleared session is a no-op.
    pub fn clear(&mut self) -> CoreResult<()> {
        match self.phase() {
            SessionPhase::Closed(ResolutionStatus::Unresolved) => {
                self.resolution = Some(ResolutionStatus::Cleared);
                Ok(())
            }
            SessionPhase::Closed(ResolutionStatus::Cleared) => Ok(()),
            _ => Err(self.invalid_state("clear")),
        }
    }

    /// A close still "sin aclarar" keeps the register shut: no new
    /// apertura until a supervisor clears it.
    pub fn blocks_reopen(&self) -> bool {
        self.phase() == SessionPhase::Closed(ResolutionStatus::Unresolved)
    }

    pub fn phase(&self) -> SessionPhase {
        match self.state {
            SessionState::Open => SessionPhase::Open,
            SessionState::Closed => SessionPhase::Closed(self.resolution.unwrap_or_else(|| {
                ResolutionStatus::from_variance(self.variance.unwrap_or_default())
            })),
        }
    }

    fn apply_close(&mut self, closed_at: NaiveDateTime, reconciliation: &Reconciliation) {
        self.state = SessionState::Closed;
        self.closed_at = Some(closed_at);
        self.counted = Some(reconciliation.counted);
        self.system = Some(reconciliation.system);
        self.exchange_rate = Some(reconciliation.exchange_rate);
        self.variance = Some(reconciliation.variance.total);
        self.resolution = Some(reconciliation.status);
    }

    fn invalid_state(&self, operation: &str) -> CoreError {
        let current = match self.phase() {
            SessionPhase::Closed(status) => format!("{} ({})", self.state, status),
            _ => self.state.to_string(),
        };
        CoreError::InvalidSessionState {
            session_id: self.id.clone(),
            current,
            operation: operation.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::day_range::parse_local;
    use crate::reconciliation::reconcile;

    fn ctx() -> CashierContext {
        CashierContext::new("c1", "Ana", "1")
    }

    fn closing(cash_counted: i64, cash_system: i64) -> Reconciliation {
        let counted = CountedTotals {
            cash: Money::from_cents(cash_counted),
            ..CountedTotals::default()
        };
        let system = SystemTotals {
            cash_gross: Money::from_cents(cash_system),
            cash_net: Money::from_cents(cash_system),
            ..SystemTotals::default()
        };
        reconcile(&counted, &system, ExchangeRate::zero())
    }

    #[test]
    fn test_open_then_close_once() {
        let opened = parse_local("2025-10-31 08:00:00").unwrap();
        let closed = parse_local("2025-10-31 21:00:00").unwrap();

        let mut session = RegisterSession::open(&ctx(), opened);
        assert_eq!(session.phase(), SessionPhase::Open);
        assert!(session.fixed_fund_declared.is_zero());

        session.close(closed, &closing(100, 100)).unwrap();
        assert_eq!(session.phase(), SessionPhase::Closed(ResolutionStatus::Balanced));
        assert_eq!(session.closed_at, Some(closed));

        let err = session.close(closed, &closing(100, 100)).unwrap_err();
        assert!(matches!(err, CoreError::InvalidSessionState { .. }));
    }

    #[test]
    fn test_only_unresolved_close_blocks_reopen() {
        let at = parse_local("2025-10-31 21:00:00").unwrap();

        assert!(!RegisterSession::open(&ctx(), at).blocks_reopen());
        assert!(!RegisterSession::closed_without_opening(&ctx(), at, &closing(100, 100)).blocks_reopen());

        let mut short = RegisterSession::closed_without_opening(&ctx(), at, &closing(50, 100));
        assert!(short.blocks_reopen());
        short.clear().unwrap();
        assert!(!short.blocks_reopen());
    }

    #[test]
    fn test_clear_only_unresolved() {
        let at = parse_local("2025-10-31 21:00:00").unwrap();

        let mut unresolved = RegisterSession::closed_without_opening(&ctx(), at, &closing(150, 100));
        assert_eq!(unresolved.phase(), SessionPhase::Closed(ResolutionStatus::Unresolved));
        unresolved.clear().unwrap();
        assert_eq!(unresolved.phase(), SessionPhase::Closed(ResolutionStatus::Cleared));
        assert_eq!(unresolved.variance, Some(Money::from_cents(50)));
        unresolved.clear().unwrap();

        let mut balanced = RegisterSession::closed_without_opening(&ctx(), at, &closing(100, 100));
        assert!(balanced.clear().is_err());

        let mut open = RegisterSession::open(&ctx(), at);
        assert!(open.clear().is_err());
    }

    #[test]
    fn test_window_runs_from_open_to_close_day_end() {
        let opened = parse_local("2025-10-30 22:00:00").unwrap();
        let session = RegisterSession::open(&ctx(), opened);
        let close_day = DayRange::for_local_date(parse_local("2025-10-31 00:00:00").unwrap().date());

        let window = session.window(&close_day);
        assert_eq!(window.start, opened);
        assert_eq!(window.end, parse_local("2025-10-31 23:59:59").unwrap());
    }

    #[test]
    fn test_phase_falls_back_to_variance_when_unlabelled() {
        let at = parse_local("2025-10-31 21:00:00").unwrap();
        let mut session = RegisterSession::closed_without_opening(&ctx(), at, &closing(150, 100));
        session.resolution = None;
        assert_eq!(session.phase(), SessionPhase::Closed(ResolutionStatus::Unresolved));
    }

    #[test]
    fn test_status_strings() {
        assert_eq!("sin aclarar".parse::<ResolutionStatus>().unwrap(), ResolutionStatus::Unresolved);
        assert_eq!(ResolutionStatus::Cleared.to_string(), "aclarado");
        assert_eq!("CIERRE".parse::<SessionState>().unwrap(), SessionState::Closed);
        assert!("cerrado".parse::<SessionState>().is_err());
    }
}
