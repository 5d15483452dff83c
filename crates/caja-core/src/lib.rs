//! # caja-core: Pure Business Logic for Caja POS
//!
//! Register reconciliation and fiscal invoice numbering, as pure functions
//! with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Caja POS Architecture                            │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │   Register screens: login, ventas, cierre, resultados caja      │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │          caja-service (Terminal, deadlines, notifier)           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ caja-core (THIS CRATE) ★                        │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐ ┌───────────┐ ┌──────────────┐ ┌───────────┐   │   │
//! │  │   │ day_range │ │ sequencer │ │reconciliation│ │   gate    │   │   │
//! │  │   │ DayRange  │ │ Invoice   │ │ SystemTotals │ │  route()  │   │   │
//! │  │   │ format_*  │ │ Sequencer │ │ reconcile()  │ │           │   │   │
//! │  │   └───────────┘ └───────────┘ └──────────────┘ └───────────┘   │   │
//! │  │   ┌───────────┐ ┌───────────┐ ┌──────────────┐                 │   │
//! │  │   │  session  │ │   money   │ │  validation  │                 │   │
//! │  │   └───────────┘ └───────────┘ └──────────────┘                 │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    caja-db (Database Layer)                     │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`day_range`] - Business-timezone day boundaries and stamp formatting
//! - [`sequencer`] - Next free invoice number inside a CAI range
//! - [`session`] - Apertura/cierre lifecycle and resolution status
//! - [`reconciliation`] - System totals, variance, status
//! - [`gate`] - Sales vs variance review routing
//! - [`money`] - Integer money and exchange rate
//! - [`types`] - Payments, expenses, CAI, cashier context
//! - [`validation`] - Input rules
//! - [`error`] - Domain error types

pub mod day_range;
pub mod error;
pub mod gate;
pub mod money;
pub mod reconciliation;
pub mod sequencer;
pub mod session;
pub mod types;
pub mod validation;

pub use day_range::{BusinessTimezone, DayRange};
pub use error::{CoreError, CoreResult, ValidationError};
pub use gate::{route, GateDecision, GateReason, Route};
pub use money::{ExchangeRate, Money};
pub use reconciliation::{reconcile, CountedTotals, CountedTotalsInput, Reconciliation, SystemTotals, Variance};
pub use sequencer::{InvoiceSequencer, SequencerStep, DEFAULT_MAX_ATTEMPTS};
pub use session::{RegisterSession, ResolutionStatus, SessionPhase, SessionState};
pub use types::*;
