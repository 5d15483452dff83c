//! # Access Gate
//!
//! Decides where a cashier lands after login or after a close.
//!
//! ```text
//! session today            route            reason
//! ──────────────────────   ──────────────   ──────────
//! none                     Sales            NoSession
//! APERTURA                 Sales            Open
//! CIERRE / cuadrado        Sales            Balanced
//! CIERRE / aclarado        Sales            Cleared
//! CIERRE / sin aclarar     VarianceReview   Unresolved
//! ```
//!
//! Pure and uncached: callers re-query the session and call [`route`] on
//! every login and after every close.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::session::{RegisterSession, ResolutionStatus, SessionPhase};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    Sales,
    VarianceReview,
}

/// Why the gate chose its route. `Balanced` and `Cleared` also tell the
/// sales screen that today's register was already operated and closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum GateReason {
    NoSession,
    Open,
    Balanced,
    Cleared,
    Unresolved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct GateDecision {
    pub route: Route,
    pub reason: GateReason,
}

impl GateDecision {
    /// True when the cashier already closed the register today.
    pub fn register_already_closed(&self) -> bool {
        matches!(
            self.reason,
            GateReason::Balanced | GateReason::Cleared | GateReason::Unresolved
        )
    }
}

/// Routes on the session's current phase.
pub fn route(session: Option<&RegisterSession>) -> GateDecision {
    let phase = session.map_or(SessionPhase::NoSession, RegisterSession::phase);
    let reason = match phase {
        SessionPhase::NoSession => GateReason::NoSession,
        SessionPhase::Open => GateReason::Open,
        SessionPhase::Closed(ResolutionStatus::Balanced) => GateReason::Balanced,
        SessionPhase::Closed(ResolutionStatus::Cleared) => GateReason::Cleared,
        SessionPhase::Closed(ResolutionStatus::Unresolved) => GateReason::Unresolved,
    };
    let route = match reason {
        GateReason::Unresolved => Route::VarianceReview,
        _ => Route::Sales,
    };
    GateDecision { route, reason }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::day_range::parse_local;
    use crate::money::{ExchangeRate, Money};
    use crate::reconciliation::{reconcile, CountedTotals, SystemTotals};
    use crate::types::CashierContext;

    fn closed_with_variance(cents: i64) -> RegisterSession {
        let counted = CountedTotals {
            cash: Money::from_cents(cents),
            ..CountedTotals::default()
        };
        let recon = reconcile(&counted, &SystemTotals::zero(), ExchangeRate::zero());
        RegisterSession::closed_without_opening(
            &CashierContext::new("c1", "Ana", "1"),
            parse_local("2025-10-31 21:00:00").unwrap(),
            &recon,
        )
    }

    #[test]
    fn test_no_session_goes_to_sales() {
        let decision = route(None);
        assert_eq!(decision.route, Route::Sales);
        assert_eq!(decision.reason, GateReason::NoSession);
        assert!(!decision.register_already_closed());
    }

    #[test]
    fn test_open_session_goes_to_sales() {
        let session = RegisterSession::open(
            &CashierContext::new("c1", "Ana", "1"),
            parse_local("2025-10-31 08:00:00").unwrap(),
        );
        assert_eq!(route(Some(&session)).reason, GateReason::Open);
    }

    #[test]
    fn test_unresolved_goes_to_review_until_cleared() {
        let mut session = closed_with_variance(5000);
        let decision = route(Some(&session));
        assert_eq!(decision.route, Route::VarianceReview);
        assert_eq!(decision.reason, GateReason::Unresolved);

        session.clear().unwrap();
        let decision = route(Some(&session));
        assert_eq!(decision.route, Route::Sales);
        assert_eq!(decision.reason, GateReason::Cleared);
        assert!(decision.register_already_closed());
    }

    #[test]
    fn test_balanced_goes_to_sales() {
        let session = closed_with_variance(0);
        assert_eq!(route(Some(&session)).route, Route::Sales);
        assert_eq!(route(Some(&session)).reason, GateReason::Balanced);
    }

    #[test]
    fn test_route_is_idempotent() {
        for session in [closed_with_variance(0), closed_with_variance(-100)] {
            assert_eq!(route(Some(&session)), route(Some(&session)));
        }
        assert_eq!(route(None), route(None));
    }
}
