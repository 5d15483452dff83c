//! # Repository Module
//!
//! One repository per table contract the register and invoicing flows
//! depend on.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  RegisterService / InvoiceService (caja-service)                        │
//! │       │                                                                 │
//! │       │  db.sessions().latest_open("c1", "1")                           │
//! │       ▼                                                                 │
//! │  SessionRepository     cierres                                          │
//! │  PaymentRepository     pagos                                            │
//! │  ExpenseRepository     gastos                                           │
//! │  InvoiceRepository     facturas, factura_reservas                       │
//! │  SettingsRepository    cai_facturas, precio_dolar, claves_autorizacion  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite                                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Timestamps cross this boundary as `NaiveDateTime` in the business
//! timezone and are stored as `YYYY-MM-DD HH:MM:SS` text, so range filters
//! are plain string comparisons.

pub mod expense;
pub mod invoice;
pub mod payment;
pub mod session;
pub mod settings;

use caja_core::day_range::parse_local;
use chrono::NaiveDateTime;

use crate::error::{DbError, DbResult};

/// Parses a stored timestamp column, naming the table on failure.
pub(crate) fn stamp(table: &str, value: &str) -> DbResult<NaiveDateTime> {
    parse_local(value).map_err(|e| DbError::corrupt(table, e))
}
