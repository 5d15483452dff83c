//! # Invoice Service
//!
//! Hands out fiscal invoice numbers inside the cashier's CAI range and
//! writes finished sales.
//!
//! ## Allocation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  candidate = max(issued ∪ reserved) + 1   (or range start)              │
//! │                                                                         │
//! │  loop  InvoiceSequencer::probe()                                        │
//! │   ├── LimitReached ────────────► AllocationExhausted (no query made)    │
//! │   ├── RetryExceeded ───────────► AllocationRetryExceeded                │
//! │   └── Check(n)                                                          │
//! │         ├── taken in facturas/pagos ─────────► reject(), next n         │
//! │         ├── INSERT factura_reservas conflicts ─► reject(), next n       │
//! │         └── reserved ───────────────────────► return n                  │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The reservation row is the atomic step: the UNIQUE key on
//! (cajero_id, caja, factura) lets exactly one terminal win a number, so
//! two terminals never walk away with the same one.

use caja_core::day_range::{BusinessTimezone, DayRange};
use caja_core::sequencer::candidate_start;
use caja_core::validation::{validate_identity, validate_payment};
use caja_core::{
    CaiAuthorization, CashierContext, InvoiceNumber, InvoiceSequencer, IssuedInvoice, Money, PaymentRecord,
    PaymentType, SequencerStep, ValidationError,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::backend::Backend;
use crate::clock::Clock;
use crate::connectivity::Connectivity;
use crate::error::{ServiceError, ServiceResult};

/// Customer name printed when the cashier leaves it blank.
pub const DEFAULT_CUSTOMER: &str = "Consumidor Final";

/// What the sales screen shows as the next invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "number", rename_all = "snake_case")]
pub enum InvoiceStatus {
    Next(InvoiceNumber),
    LimitReached,
    NotAssigned,
}

/// One tender line of a sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalePayment {
    pub payment_type: PaymentType,
    /// Lempira value of the tender.
    pub amount: Money,
    /// Dollars received, for `dolares` tenders.
    pub usd_amount: Option<Money>,
}

/// A confirmed sale ready to be written under `number`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleRequest {
    pub number: InvoiceNumber,
    pub customer: String,
    pub total: Money,
    pub payments: Vec<SalePayment>,
}

/// Issued invoices between two business dates, as the "Facturas Emitidas"
/// screen lists them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssuedInvoices {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub count: usize,
    /// Newest first.
    pub invoices: Vec<IssuedInvoice>,
}

#[derive(Debug, Clone)]
pub struct InvoiceService {
    backend: Backend,
    tz: BusinessTimezone,
    clock: Clock,
    connectivity: Connectivity,
    max_attempts: u32,
}

impl InvoiceService {
    pub fn new(
        backend: Backend,
        tz: BusinessTimezone,
        clock: Clock,
        connectivity: Connectivity,
        max_attempts: u32,
    ) -> Self {
        InvoiceService {
            backend,
            tz,
            clock,
            connectivity,
            max_attempts,
        }
    }

    /// The cashier's CAI authorization.
    pub async fn authorization(&self, ctx: &CashierContext) -> ServiceResult<CaiAuthorization> {
        validate_identity("cajero_id", &ctx.cashier_id)?;
        let settings = self.backend.db().settings();
        self.backend
            .call("load_cai", settings.cai_for_cashier(&ctx.cashier_id))
            .await?
            .ok_or_else(|| ServiceError::NotAssigned {
                cashier_id: ctx.cashier_id.clone(),
            })
    }

    async fn next_candidate(&self, ctx: &CashierContext, cai: &CaiAuthorization) -> ServiceResult<InvoiceNumber> {
        let invoices = self.backend.db().invoices();
        let last = self
            .backend
            .call("last_invoice", invoices.last_issued(&ctx.cashier_id, &ctx.register))
            .await?;
        Ok(candidate_start(cai.range, last))
    }

    /// Next number for display. Nothing is reserved.
    pub async fn current_invoice(&self, ctx: &CashierContext) -> ServiceResult<InvoiceStatus> {
        let cai = match self.authorization(ctx).await {
            Ok(cai) => cai,
            Err(ServiceError::NotAssigned { .. }) => return Ok(InvoiceStatus::NotAssigned),
            Err(e) => return Err(e),
        };

        let candidate = self.next_candidate(ctx, &cai).await?;
        if cai.range.contains(candidate) {
            Ok(InvoiceStatus::Next(candidate))
        } else {
            Ok(InvoiceStatus::LimitReached)
        }
    }

    /// Reserves the next free number for this (cashier, register).
    pub async fn allocate_next(&self, ctx: &CashierContext) -> ServiceResult<InvoiceNumber> {
        validate_identity("caja", &ctx.register)?;
        let cai = self.authorization(ctx).await?;
        let candidate = self.next_candidate(ctx, &cai).await?;
        self.allocate_from(ctx, &cai, candidate).await
    }

    /// Walks upward from `candidate` until a number is reserved.
    ///
    /// ## Errors
    /// - `AllocationExhausted` when the walk passes the end of the range;
    ///   a candidate already past the end fails before any store access
    /// - `AllocationRetryExceeded` after `max_attempts` taken numbers
    /// - `BackendUnavailable` on any store failure; nothing is reserved
    pub async fn allocate_from(
        &self,
        ctx: &CashierContext,
        cai: &CaiAuthorization,
        candidate: InvoiceNumber,
    ) -> ServiceResult<InvoiceNumber> {
        let mut sequencer = InvoiceSequencer::new(cai.range, candidate, self.max_attempts);
        let invoices = self.backend.db().invoices();

        loop {
            match sequencer.probe() {
                SequencerStep::Check(number) => {
                    let taken = self
                        .backend
                        .call(
                            "allocate_invoice",
                            invoices.is_taken(&ctx.cashier_id, &ctx.register, number),
                        )
                        .await?;

                    if !taken {
                        let at = self.tz.localize(&self.clock.now());
                        let reserved = self
                            .backend
                            .call(
                                "allocate_invoice",
                                invoices.try_reserve(&ctx.cashier_id, &ctx.register, number, at),
                            )
                            .await?;
                        if reserved {
                            info!(
                                number = number.value(),
                                cashier_id = %ctx.cashier_id,
                                register = %ctx.register,
                                attempts = sequencer.attempts(),
                                "Invoice number allocated"
                            );
                            return Ok(number);
                        }
                        debug!(number = number.value(), "Number reserved by another terminal");
                    }

                    sequencer.reject();
                }
                SequencerStep::LimitReached => {
                    warn!(
                        cashier_id = %ctx.cashier_id,
                        range_end = cai.range.end(),
                        "Invoice range exhausted"
                    );
                    return Err(ServiceError::AllocationExhausted {
                        range_end: cai.range.end(),
                    });
                }
                SequencerStep::RetryExceeded { attempts } => {
                    warn!(cashier_id = %ctx.cashier_id, attempts, "Invoice allocation gave up");
                    return Err(ServiceError::AllocationRetryExceeded { attempts });
                }
            }
        }
    }

    /// Sale confirmation: refuses while offline, otherwise allocates.
    pub async fn confirm_order(&self, ctx: &CashierContext) -> ServiceResult<InvoiceNumber> {
        self.connectivity.ensure_online()?;
        self.allocate_next(ctx).await
    }

    /// Writes the invoice and its payments in one transaction.
    pub async fn finalize_sale(&self, ctx: &CashierContext, sale: SaleRequest) -> ServiceResult<IssuedInvoice> {
        self.connectivity.ensure_online()?;
        validate_identity("caja", &ctx.register)?;

        if sale.payments.is_empty() {
            return Err(ValidationError::required("pagos").into());
        }
        for payment in &sale.payments {
            validate_payment(payment.payment_type, payment.amount, payment.usd_amount)?;
        }
        if !sale.total.is_positive() {
            return Err(ValidationError::MustBePositive {
                field: "total".to_string(),
            }
            .into());
        }

        let cai = self.authorization(ctx).await?;
        if !cai.range.contains(sale.number) {
            return Err(ValidationError::OutOfRange {
                field: "factura".to_string(),
                min: cai.range.start(),
                max: cai.range.end(),
            }
            .into());
        }

        let now = self.tz.localize(&self.clock.now());
        let customer = match sale.customer.trim() {
            "" => DEFAULT_CUSTOMER.to_string(),
            name => name.to_string(),
        };

        let invoice = IssuedInvoice {
            number: sale.number,
            cai: cai.cai.clone(),
            cashier_id: ctx.cashier_id.clone(),
            cashier_name: ctx.cashier_name.clone(),
            register: ctx.register.clone(),
            customer,
            total: sale.total,
            issued_at: now,
        };
        let payments: Vec<PaymentRecord> = sale
            .payments
            .iter()
            .map(|p| PaymentRecord {
                invoice: sale.number,
                payment_type: p.payment_type,
                amount: p.amount,
                usd_amount: p.usd_amount.filter(|_| p.payment_type == PaymentType::Usd),
                cashier_id: ctx.cashier_id.clone(),
                register: ctx.register.clone(),
                recorded_at: now,
            })
            .collect();

        let invoices = self.backend.db().invoices();
        match self
            .backend
            .try_call("finalize_sale", invoices.finalize(&invoice, &payments))
            .await?
        {
            Ok(()) => Ok(invoice),
            Err(e) if e.is_unique_violation() => Err(ServiceError::InvoiceAlreadyIssued {
                number: sale.number.value(),
            }),
            Err(e) => Err(ServiceError::backend("finalize_sale", e)),
        }
    }

    /// Invoices of all registers issued from the start of `from` to the end
    /// of `to`, both business dates inclusive.
    pub async fn issued_between(&self, from: NaiveDate, to: NaiveDate) -> ServiceResult<IssuedInvoices> {
        if from > to {
            return Err(ValidationError::invalid_format("hasta", format!("{} is before {}", to, from)).into());
        }

        let start = DayRange::for_local_date(from).start;
        let end = DayRange::for_local_date(to).end;
        let repo = self.backend.db().invoices();
        let invoices = self
            .backend
            .call("issued_invoices", repo.list_between(start, end))
            .await?;

        debug!(%from, %to, count = invoices.len(), "Loaded issued invoices");
        Ok(IssuedInvoices {
            from,
            to,
            count: invoices.len(),
            invoices,
        })
    }
}
