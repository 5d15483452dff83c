//! # caja-service: Register & Invoicing Services
//!
//! Wires the pure rules of `caja-core` to the SQLite store of `caja-db` for
//! one cashier terminal.
//!
//! ## Module Organization
//! ```text
//! caja_service/
//! ├── lib.rs           ◄─── You are here (Terminal facade)
//! ├── config.rs        ◄─── CajaConfig (TOML + CAJA_* env)
//! ├── error.rs         ◄─── ServiceError, codes for the screens
//! ├── backend.rs       ◄─── Deadline wrapper for every store call
//! ├── clock.rs         ◄─── System or manual time source
//! ├── connectivity.rs  ◄─── Online/offline flag
//! ├── notifier.rs      ◄─── Background close-summary GET
//! ├── register.rs      ◄─── Open, expenses, close, gate, clearance
//! ├── invoicing.rs     ◄─── Invoice numbers and sale finalization
//! └── telemetry.rs     ◄─── tracing-subscriber setup
//! ```
//!
//! ## Startup Sequence
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. CajaConfig::load()       file + environment, validated              │
//! │  2. Database::new()          SQLite pool, WAL, migrations               │
//! │  3. Notifier::new()          only when [notify].endpoint is set         │
//! │  4. RegisterService / InvoiceService share one Backend and Clock        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust,ignore
//! use caja_service::{CajaConfig, Terminal};
//!
//! caja_service::telemetry::init_tracing();
//! let terminal = Terminal::start(CajaConfig::load(None)?).await?;
//!
//! let ctx = terminal.context_for("c1", "Ana").await?;
//! let gate = terminal.register().route(&ctx).await?;
//! ```

pub mod backend;
pub mod clock;
pub mod config;
pub mod connectivity;
pub mod error;
pub mod invoicing;
pub mod notifier;
pub mod register;
pub mod telemetry;

pub use backend::Backend;
pub use clock::Clock;
pub use config::CajaConfig;
pub use connectivity::Connectivity;
pub use error::{ErrorPayload, ServiceError, ServiceResult};
pub use invoicing::{InvoiceService, InvoiceStatus, IssuedInvoices, SaleRequest, SalePayment};
pub use notifier::{CloseNotification, Notifier, NotifierHandle};
pub use register::{CloseReport, RegisterService};

use caja_core::CashierContext;
use caja_db::{Database, DbConfig};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Everything one cashier terminal needs, built from a [`CajaConfig`].
pub struct Terminal {
    db: Database,
    register: RegisterService,
    invoices: InvoiceService,
    connectivity: Connectivity,
    notifier: NotifierHandle,
    notifier_task: Option<JoinHandle<()>>,
}

impl Terminal {
    /// Opens the configured database and starts the services.
    pub async fn start(config: CajaConfig) -> ServiceResult<Self> {
        config.validate()?;

        let db_config = DbConfig::new(&config.database.path)
            .max_connections(config.database.max_connections)
            .connect_timeout(config.backend_timeout());
        let db = Database::new(db_config)
            .await
            .map_err(|e| ServiceError::backend("connect", e))?;

        info!(path = ?config.database.path, "Terminal database ready");
        Self::with_database(db, &config, Clock::System)
    }

    /// Builds the services over an existing database. Must run inside a
    /// Tokio runtime when a notification endpoint is configured.
    pub fn with_database(db: Database, config: &CajaConfig, clock: Clock) -> ServiceResult<Self> {
        let tz = config.business_timezone()?;
        let backend = Backend::new(db.clone(), config.backend_timeout());
        let connectivity = Connectivity::default();

        let (notifier, notifier_task) = match config.notify_endpoint()? {
            Some(endpoint) => {
                let (worker, handle) =
                    Notifier::new(endpoint, config.notify_timeout(), config.notify.queue_capacity)?;
                (handle, Some(tokio::spawn(worker.run())))
            }
            None => {
                info!("No notification endpoint configured, close summaries stay local");
                (NotifierHandle::disabled(), None)
            }
        };

        let register = RegisterService::new(
            backend.clone(),
            tz.clone(),
            clock.clone(),
            notifier.clone(),
            config.notify.admin_email.clone(),
        );
        let invoices = InvoiceService::new(
            backend,
            tz,
            clock,
            connectivity.clone(),
            config.invoicing.max_attempts,
        );

        Ok(Terminal {
            db,
            register,
            invoices,
            connectivity,
            notifier,
            notifier_task,
        })
    }

    pub fn register(&self) -> &RegisterService {
        &self.register
    }

    pub fn invoices(&self) -> &InvoiceService {
        &self.invoices
    }

    pub fn connectivity(&self) -> &Connectivity {
        &self.connectivity
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Session context for a logged-in cashier. The register is the one
    /// their CAI authorization assigns.
    pub async fn context_for(&self, cashier_id: &str, cashier_name: &str) -> ServiceResult<CashierContext> {
        let probe = CashierContext::new(cashier_id, cashier_name, "");
        let cai = self.invoices.authorization(&probe).await?;
        Ok(CashierContext::new(cashier_id, cashier_name, cai.register))
    }

    /// Stops the notifier and closes the pool.
    pub async fn shutdown(self) {
        if let Err(e) = self.notifier.shutdown().await {
            warn!(error = %e, "Notifier did not acknowledge shutdown");
        }
        if let Some(task) = self.notifier_task {
            if let Err(e) = task.await {
                warn!(error = %e, "Notifier task ended abnormally");
            }
        }
        self.db.close().await;
        info!("Terminal shut down");
    }
}
