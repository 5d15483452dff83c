//! # Close Notifier
//!
//! Sends each register close to the administrator's endpoint as a GET with
//! the summary in the query string. Best effort: failures are logged and
//! dropped, never retried, and never reach the cashier.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  RegisterService::close_shift                                           │
//! │       │                                                                 │
//! │       │  NotifierHandle::notify()   (try_send, never waits)             │
//! │       ▼                                                                 │
//! │  ┌──────────────────┐                                                   │
//! │  │ bounded mpsc     │── full ──► warn!, notification dropped            │
//! │  └────────┬─────────┘                                                   │
//! │           ▼                                                             │
//! │  Notifier::run (background task)                                        │
//! │       │                                                                 │
//! │       │  GET {endpoint}?fecha=..&hora=..&cajero=..&_ts=..               │
//! │       ▼                                                                 │
//! │  ok ──► debug!        error / timeout / non-2xx ──► warn!               │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use caja_core::{ExchangeRate, Money, Reconciliation};
use chrono::NaiveDateTime;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{ServiceError, ServiceResult};

// =============================================================================
// Payload
// =============================================================================

/// One close summary as sent to the endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseNotification {
    /// Business date, `YYYY-MM-DD`.
    pub fecha: String,
    /// Close time, `HH:MM:SS`.
    pub hora: String,
    pub cajero: String,
    pub admin: String,
    pub counted_cash: Money,
    pub counted_card: Money,
    pub counted_transfer: Money,
    pub counted_usd: Money,
    /// Net of expenses.
    pub system_cash: Money,
    pub system_card: Money,
    pub system_transfer: Money,
    pub system_usd: Money,
    pub exchange_rate: ExchangeRate,
    pub expenses: Money,
    /// Cache-busting stamp, epoch milliseconds.
    pub ts_millis: i64,
}

impl CloseNotification {
    pub fn from_close(
        closed_at: NaiveDateTime,
        cashier_name: &str,
        admin: &str,
        reconciliation: &Reconciliation,
        ts_millis: i64,
    ) -> Self {
        let counted = &reconciliation.counted;
        let system = &reconciliation.system;
        CloseNotification {
            fecha: closed_at.format("%Y-%m-%d").to_string(),
            hora: closed_at.format("%H:%M:%S").to_string(),
            cajero: cashier_name.to_string(),
            admin: admin.to_string(),
            counted_cash: counted.cash,
            counted_card: counted.card,
            counted_transfer: counted.transfer,
            counted_usd: counted.usd,
            system_cash: system.cash_net,
            system_card: system.card,
            system_transfer: system.transfer,
            system_usd: system.usd,
            exchange_rate: reconciliation.exchange_rate,
            expenses: system.expenses,
            ts_millis,
        }
    }
}

/// The endpoint with the summary appended as query parameters.
pub fn build_url(endpoint: &Url, n: &CloseNotification) -> Url {
    let mut url = endpoint.clone();
    url.query_pairs_mut()
        .append_pair("fecha", &n.fecha)
        .append_pair("hora", &n.hora)
        .append_pair("cajero", &n.cajero)
        .append_pair("admin", &n.admin)
        .append_pair("efectivo_reg", &n.counted_cash.to_decimal_string())
        .append_pair("tarjeta_reg", &n.counted_card.to_decimal_string())
        .append_pair("transf_reg", &n.counted_transfer.to_decimal_string())
        .append_pair("dolares_reg", &n.counted_usd.to_decimal_string())
        .append_pair("efectivo_ventas", &n.system_cash.to_decimal_string())
        .append_pair("tarjeta_ventas", &n.system_card.to_decimal_string())
        .append_pair("transf_ventas", &n.system_transfer.to_decimal_string())
        .append_pair("dolares_ventas", &n.system_usd.to_decimal_string())
        .append_pair("precio_dolar", &n.exchange_rate.to_string())
        .append_pair("gasto", &n.expenses.to_decimal_string())
        .append_pair("_ts", &n.ts_millis.to_string());
    url
}

// =============================================================================
// Worker
// =============================================================================

/// Background task that delivers queued notifications.
pub struct Notifier {
    client: reqwest::Client,
    endpoint: Url,
    rx: mpsc::Receiver<CloseNotification>,
    shutdown_rx: mpsc::Receiver<()>,
}

/// Handle used by the services to enqueue notifications.
#[derive(Debug, Clone)]
pub struct NotifierHandle {
    tx: Option<mpsc::Sender<CloseNotification>>,
    shutdown_tx: Option<mpsc::Sender<()>>,
}

impl NotifierHandle {
    /// A handle that discards everything; used when no endpoint is set.
    pub fn disabled() -> Self {
        NotifierHandle {
            tx: None,
            shutdown_tx: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.tx.is_some()
    }

    /// Queues a notification without waiting.
    pub fn notify(&self, notification: CloseNotification) {
        let Some(tx) = &self.tx else {
            debug!("Notifications disabled, skipping close summary");
            return;
        };

        if let Err(e) = tx.try_send(notification) {
            match e {
                mpsc::error::TrySendError::Full(_) => warn!("Notification queue full, close summary dropped"),
                mpsc::error::TrySendError::Closed(_) => warn!("Notifier stopped, close summary dropped"),
            }
        }
    }

    /// Stops the worker after its current delivery.
    pub async fn shutdown(&self) -> ServiceResult<()> {
        match &self.shutdown_tx {
            Some(tx) => tx
                .send(())
                .await
                .map_err(|_| ServiceError::InvalidState("Notifier already stopped".into())),
            None => Ok(()),
        }
    }
}

impl Notifier {
    /// Creates the worker and its handle. Spawn [`Notifier::run`].
    pub fn new(endpoint: Url, timeout: Duration, capacity: usize) -> ServiceResult<(Self, NotifierHandle)> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::Config(format!("Failed to build HTTP client: {}", e)))?;

        let (tx, rx) = mpsc::channel(capacity.max(1));
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let notifier = Notifier {
            client,
            endpoint,
            rx,
            shutdown_rx,
        };
        let handle = NotifierHandle {
            tx: Some(tx),
            shutdown_tx: Some(shutdown_tx),
        };

        Ok((notifier, handle))
    }

    pub async fn run(mut self) {
        info!(endpoint = %self.endpoint, "Close notifier starting");

        loop {
            tokio::select! {
                maybe = self.rx.recv() => {
                    match maybe {
                        Some(notification) => self.deliver(&notification).await,
                        None => break,
                    }
                }

                _ = self.shutdown_rx.recv() => {
                    info!("Close notifier shutting down");
                    break;
                }
            }
        }

        info!("Close notifier stopped");
    }

    async fn deliver(&self, notification: &CloseNotification) {
        let url = build_url(&self.endpoint, notification);
        match self.client.get(url).send().await {
            Ok(response) if response.status().is_success() => {
                debug!(cajero = %notification.cajero, fecha = %notification.fecha, "Close summary delivered");
            }
            Ok(response) => {
                warn!(status = %response.status(), "Close summary rejected by endpoint");
            }
            Err(e) => {
                warn!(error = %e, "Close summary delivery failed");
            }
        }
    }
}
