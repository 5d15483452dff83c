//! # Register Service
//!
//! Shift lifecycle for one (cashier, register): open, expenses, close with
//! reconciliation, supervisor clearance, and the access gate.
//!
//! ## Close Sequence
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  CountedTotalsInput ──validate──► CountedTotals                         │
//! │        (missing field: ValidationError, nothing is read or written)     │
//! │                                                                         │
//! │  open session? ──yes──► window = [opened_at, end of today]              │
//! │       │                  pagos + gastos in window ──► SystemTotals      │
//! │       │                                                                 │
//! │       └──no───► legacy close, SystemTotals all zero                     │
//! │                                                                         │
//! │  precio_dolar ──► reconcile() ──► APERTURA → CIERRE (one UPDATE)        │
//! │                                                                         │
//! │  NotifierHandle::notify()  (fire-and-forget)                            │
//! │  route() ──► GateDecision returned with the report                      │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every store access goes through [`Backend`], so a failed or slow store
//! surfaces as `BackendUnavailable` and the session is left as it was.

use caja_core::day_range::{BusinessTimezone, DayRange};
use caja_core::validation::{
    expense_reason, validate_authorization_code, validate_expense_amount, validate_identity,
};
use caja_core::{
    reconcile, route, CashierContext, CountedTotalsInput, ExchangeRate, ExpenseRecord, GateDecision, Money,
    Reconciliation, RegisterSession, ResolutionStatus, SystemTotals, ValidationError,
};
use caja_db::DbError;
use chrono::{Duration, NaiveDateTime};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::backend::Backend;
use crate::clock::Clock;
use crate::error::{ServiceError, ServiceResult};
use crate::notifier::{CloseNotification, NotifierHandle};

// =============================================================================
// Close Report
// =============================================================================

/// What the close screen shows after a successful close.
#[derive(Debug, Clone, Serialize)]
pub struct CloseReport {
    pub session_id: String,
    pub cashier_id: String,
    pub register: String,
    pub closed_at: NaiveDateTime,
    /// No apertura existed; system totals are all zero.
    pub legacy: bool,
    pub reconciliation: Reconciliation,
    /// Fixed fund plus net cash sales.
    pub expected_cash: Money,
    pub status: ResolutionStatus,
    /// Where the cashier goes next.
    pub gate: GateDecision,
}

// =============================================================================
// Register Service
// =============================================================================

#[derive(Debug, Clone)]
pub struct RegisterService {
    backend: Backend,
    tz: BusinessTimezone,
    clock: Clock,
    notifier: NotifierHandle,
    admin_email: String,
}

impl RegisterService {
    pub fn new(
        backend: Backend,
        tz: BusinessTimezone,
        clock: Clock,
        notifier: NotifierHandle,
        admin_email: impl Into<String>,
    ) -> Self {
        RegisterService {
            backend,
            tz,
            clock,
            notifier,
            admin_email: admin_email.into(),
        }
    }

    /// Current business-local wall clock and today's range.
    fn today(&self) -> (NaiveDateTime, DayRange) {
        let now = self.clock.now();
        (self.tz.localize(&now), DayRange::compute(Some(now), &self.tz))
    }

    // =========================================================================
    // Opening
    // =========================================================================

    /// Records an APERTURA with a zero fixed fund.
    ///
    /// ## Errors
    /// - `SessionAlreadyOpen`: an apertura is still open for this register
    /// - `VarianceUnresolved`: the last close is "sin aclarar"
    pub async fn open_shift(&self, ctx: &CashierContext) -> ServiceResult<RegisterSession> {
        check_context(ctx)?;
        let sessions = self.backend.db().sessions();

        let existing = self
            .backend
            .call("open_shift", sessions.latest_open(&ctx.cashier_id, &ctx.register))
            .await?;
        if existing.is_some() {
            return Err(already_open(ctx));
        }

        let last_close = self
            .backend
            .call("open_shift", sessions.latest_closed(&ctx.cashier_id, &ctx.register))
            .await?;
        if let Some(last) = last_close.filter(RegisterSession::blocks_reopen) {
            warn!(
                session_id = %last.id,
                cashier_id = %ctx.cashier_id,
                register = %ctx.register,
                "Refusing to open over an uncleared close"
            );
            return Err(ServiceError::VarianceUnresolved { session_id: last.id });
        }

        let (now, _) = self.today();
        let session = RegisterSession::open(ctx, now);

        match self.backend.try_call("open_shift", sessions.insert(&session)).await? {
            Ok(()) => {}
            // Another terminal opened first
            Err(e) if e.is_unique_violation() => return Err(already_open(ctx)),
            Err(e) => return Err(ServiceError::backend("open_shift", e)),
        }

        info!(
            session_id = %session.id,
            cashier_id = %ctx.cashier_id,
            register = %ctx.register,
            "Register opened"
        );
        Ok(session)
    }

    /// The open session for this register, if any.
    pub async fn current_session(&self, ctx: &CashierContext) -> ServiceResult<Option<RegisterSession>> {
        check_context(ctx)?;
        let sessions = self.backend.db().sessions();
        self.backend
            .call("current_session", sessions.latest_open(&ctx.cashier_id, &ctx.register))
            .await
    }

    /// System totals for the open shift so far; zeros when none is open.
    pub async fn preview_totals(&self, ctx: &CashierContext) -> ServiceResult<SystemTotals> {
        let Some(session) = self.current_session(ctx).await? else {
            return Ok(SystemTotals::zero());
        };
        let (_, today) = self.today();
        self.system_totals(&session, &today).await
    }

    async fn system_totals(&self, session: &RegisterSession, today: &DayRange) -> ServiceResult<SystemTotals> {
        let window = session.window(today);
        let db = self.backend.db();

        let payments = self
            .backend
            .call(
                "load_payments",
                db.payments().list_in_window(&session.cashier_id, &session.register, &window),
            )
            .await?;
        let expenses = self
            .backend
            .call(
                "load_expenses",
                db.expenses().list_in_window(&session.cashier_id, &session.register, &window),
            )
            .await?;

        debug!(
            session_id = %session.id,
            payments = payments.len(),
            expenses = expenses.len(),
            "Tallying system totals"
        );
        Ok(SystemTotals::tally(&window, &payments, &expenses))
    }

    // =========================================================================
    // Expenses
    // =========================================================================

    /// Records cash taken out of the drawer.
    pub async fn record_expense(
        &self,
        ctx: &CashierContext,
        amount: Money,
        reason: &str,
        invoice_ref: Option<&str>,
    ) -> ServiceResult<ExpenseRecord> {
        check_context(ctx)?;
        validate_expense_amount(amount)?;
        let reason = expense_reason(reason, invoice_ref)?;

        let (now, _) = self.today();
        let expense = ExpenseRecord {
            amount,
            reason,
            cashier_id: ctx.cashier_id.clone(),
            register: ctx.register.clone(),
            date: now.date(),
            recorded_at: now,
        };

        let expenses = self.backend.db().expenses();
        let id = self.backend.call("record_expense", expenses.insert(&expense)).await?;
        info!(expense_id = %id, amount = %amount, register = %ctx.register, "Expense recorded");
        Ok(expense)
    }

    // =========================================================================
    // Closing
    // =========================================================================

    /// Closes the shift with the cashier's counts.
    ///
    /// `session_id` is the id returned by [`open_shift`](Self::open_shift);
    /// without it the latest open session is used. With no open session at
    /// all the close is recorded on its own (legacy close).
    ///
    /// ## Errors
    /// - `Validation`: a required count is missing or negative
    /// - `SessionNotFound`: `session_id` is unknown or not this cashier's
    /// - `InvalidState`: the session is already closed
    /// - `BackendUnavailable`: any store failure; the session stays open
    pub async fn close_shift(
        &self,
        ctx: &CashierContext,
        session_id: Option<&str>,
        input: CountedTotalsInput,
    ) -> ServiceResult<CloseReport> {
        check_context(ctx)?;
        let counted = input.validate()?;

        let (now, today) = self.today();
        let sessions = self.backend.db().sessions();

        let open = match session_id {
            Some(id) => {
                let session = self.owned_session(ctx, id).await?;
                if !session.is_open() {
                    return Err(ServiceError::InvalidState(format!(
                        "Register session {} is already closed",
                        session.id
                    )));
                }
                Some(session)
            }
            None => {
                self.backend
                    .call("close_shift", sessions.latest_open(&ctx.cashier_id, &ctx.register))
                    .await?
            }
        };

        let rate = self.exchange_rate().await?;

        let (session, reconciliation, legacy) = match open {
            Some(mut session) => {
                let system = self.system_totals(&session, &today).await?;
                let reconciliation = reconcile(&counted, &system, rate);
                session.close(now, &reconciliation)?;

                match self.backend.try_call("close_shift", sessions.mark_closed(&session)).await? {
                    Ok(()) => {}
                    Err(DbError::NotFound { .. }) => {
                        return Err(ServiceError::InvalidState(format!(
                            "Register session {} was closed by another terminal",
                            session.id
                        )));
                    }
                    Err(e) => return Err(ServiceError::backend("close_shift", e)),
                }
                (session, reconciliation, false)
            }
            None => {
                warn!(
                    cashier_id = %ctx.cashier_id,
                    register = %ctx.register,
                    "No open session, recording close without opening"
                );
                let reconciliation = reconcile(&counted, &SystemTotals::zero(), rate);
                let session = RegisterSession::closed_without_opening(ctx, now, &reconciliation);
                self.backend.call("close_shift", sessions.insert(&session)).await?;
                (session, reconciliation, true)
            }
        };

        info!(
            session_id = %session.id,
            register = %session.register,
            variance = %reconciliation.variance.total,
            status = %reconciliation.status,
            legacy,
            "Register closed"
        );

        self.notifier.notify(CloseNotification::from_close(
            now,
            &ctx.cashier_name,
            &self.admin_email,
            &reconciliation,
            self.clock.now().timestamp_millis(),
        ));

        Ok(CloseReport {
            session_id: session.id.clone(),
            cashier_id: session.cashier_id.clone(),
            register: session.register.clone(),
            closed_at: now,
            legacy,
            expected_cash: reconciliation.expected_cash(),
            status: reconciliation.status,
            gate: route(Some(&session)),
            reconciliation,
        })
    }

    /// Rate for USD conversion at close time. Unset reads as zero.
    async fn exchange_rate(&self) -> ServiceResult<ExchangeRate> {
        let settings = self.backend.db().settings();
        let rate = self.backend.call("exchange_rate", settings.exchange_rate()).await?;
        Ok(rate.unwrap_or_else(|| {
            warn!("No exchange rate configured, dollars convert at zero");
            ExchangeRate::zero()
        }))
    }

    async fn owned_session(&self, ctx: &CashierContext, id: &str) -> ServiceResult<RegisterSession> {
        let sessions = self.backend.db().sessions();
        let session = self
            .backend
            .call("load_session", sessions.get(id))
            .await?
            .filter(|s| s.cashier_id == ctx.cashier_id && s.register == ctx.register);
        session.ok_or_else(|| ServiceError::SessionNotFound(id.to_string()))
    }

    // =========================================================================
    // Access Gate & Clearance
    // =========================================================================

    /// Where the cashier should land after login.
    pub async fn route(&self, ctx: &CashierContext) -> ServiceResult<GateDecision> {
        check_context(ctx)?;
        let (_, today) = self.today();
        let sessions = self.backend.db().sessions();
        let latest = self
            .backend
            .call(
                "route",
                sessions.latest_for_day(&ctx.cashier_id, &ctx.register, &today),
            )
            .await?;
        Ok(route(latest.as_ref()))
    }

    /// Supervisor sign-off of an unresolved close.
    ///
    /// Without `session_id` today's latest session is cleared. Returns the
    /// gate decision re-read from the store.
    pub async fn clear_variance(
        &self,
        ctx: &CashierContext,
        session_id: Option<&str>,
        code: &str,
    ) -> ServiceResult<GateDecision> {
        check_context(ctx)?;
        validate_authorization_code(code)?;

        let settings = self.backend.db().settings();
        let stored = self
            .backend
            .call("clear_variance", settings.authorization_code())
            .await?
            .ok_or(ServiceError::AuthorizationUnavailable)?;
        if stored != code {
            warn!(cashier_id = %ctx.cashier_id, "Rejected supervisor authorization code");
            return Err(ServiceError::InvalidAuthorization);
        }

        let mut session = match session_id {
            Some(id) => self.owned_session(ctx, id).await?,
            None => {
                let (_, today) = self.today();
                let sessions = self.backend.db().sessions();
                self.backend
                    .call(
                        "clear_variance",
                        sessions.latest_for_day(&ctx.cashier_id, &ctx.register, &today),
                    )
                    .await?
                    .ok_or_else(|| ServiceError::SessionNotFound(format!("{} / {} today", ctx.cashier_id, ctx.register)))?
            }
        };

        session.clear()?;
        let sessions = self.backend.db().sessions();
        let changed = self.backend.call("clear_variance", sessions.clear(&session.id)).await?;
        info!(session_id = %session.id, changed, "Variance cleared by supervisor");

        self.route(ctx).await
    }

    /// Closes of the last 24 hours for the cashier, newest first.
    pub async fn recent_closes(&self, ctx: &CashierContext) -> ServiceResult<Vec<RegisterSession>> {
        check_context(ctx)?;
        let (now, _) = self.today();
        let sessions = self.backend.db().sessions();
        self.backend
            .call(
                "recent_closes",
                sessions.closed_since(&ctx.cashier_id, now - Duration::hours(24)),
            )
            .await
    }

    // =========================================================================
    // Settings
    // =========================================================================

    pub async fn set_exchange_rate(&self, rate: ExchangeRate) -> ServiceResult<()> {
        if rate.ten_thousandths() < 0 {
            return Err(ValidationError::MustNotBeNegative {
                field: "precio_dolar".to_string(),
            }
            .into());
        }
        let (now, _) = self.today();
        let settings = self.backend.db().settings();
        self.backend
            .call("set_exchange_rate", settings.set_exchange_rate(rate, now))
            .await
    }

    pub async fn set_authorization_code(&self, code: &str) -> ServiceResult<()> {
        validate_authorization_code(code)?;
        let settings = self.backend.db().settings();
        self.backend
            .call("set_authorization_code", settings.set_authorization_code(code))
            .await
    }
}

fn check_context(ctx: &CashierContext) -> ServiceResult<()> {
    validate_identity("cajero_id", &ctx.cashier_id)?;
    validate_identity("caja", &ctx.register)?;
    Ok(())
}

fn already_open(ctx: &CashierContext) -> ServiceError {
    ServiceError::SessionAlreadyOpen {
        cashier_id: ctx.cashier_id.clone(),
        register: ctx.register.clone(),
    }
}
