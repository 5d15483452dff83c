//! # Service Error Types
//!
//! What the register and sales screens see when an operation fails.
//!
//! ## Error Categories
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Service Error Categories                           │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐  │
//! │  │  Input          │  │  Invoicing      │  │  Infrastructure         │  │
//! │  │                 │  │                 │  │                         │  │
//! │  │  Validation     │  │  Allocation-    │  │  BackendUnavailable     │  │
//! │  │  InvalidAuth-   │  │   Exhausted     │  │  NetworkOffline         │  │
//! │  │   orization     │  │  AllocationRe-  │  │  Config                 │  │
//! │  │                 │  │   tryExceeded   │  │                         │  │
//! │  │                 │  │  NotAssigned    │  │                         │  │
//! │  │                 │  │  InvoiceAlready-│  │                         │  │
//! │  │                 │  │   Issued        │  │                         │  │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘  │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐    │
//! │  │  Register sessions                                              │    │
//! │  │  SessionNotFound • SessionAlreadyOpen • InvalidState            │    │
//! │  │  VarianceUnresolved • AuthorizationUnavailable                  │    │
//! │  └─────────────────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Notification failures never appear here; the notifier logs and drops
//! them.

use caja_core::{CoreError, ValidationError};
use caja_db::DbError;
use serde::Serialize;
use thiserror::Error;

/// Result type alias for service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Debug, Error)]
pub enum ServiceError {
    // =========================================================================
    // Input Errors
    // =========================================================================
    /// Bad or missing input. Nothing was written.
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// The supervisor code did not match.
    #[error("Authorization code does not match")]
    InvalidAuthorization,

    // =========================================================================
    // Invoicing Errors
    // =========================================================================
    /// No number left in the cashier's CAI range.
    ///
    /// ## When This Occurs
    /// - Every number up to the end of the range is issued or reserved
    ///
    /// Blocks further sales until the range is renewed.
    #[error("Invoice range exhausted at {range_end}; the CAI range must be renewed")]
    AllocationExhausted { range_end: i64 },

    /// The sequencer gave up after too many taken numbers. Retryable.
    #[error("Could not allocate an invoice number after {attempts} attempts")]
    AllocationRetryExceeded { attempts: u32 },

    /// The cashier has no CAI row and cannot invoice.
    #[error("Cashier {cashier_id} has no invoice authorization assigned")]
    NotAssigned { cashier_id: String },

    #[error("Invoice {number} was already issued")]
    InvoiceAlreadyIssued { number: i64 },

    // =========================================================================
    // Register Session Errors
    // =========================================================================
    #[error("Register session not found: {0}")]
    SessionNotFound(String),

    #[error("Register {register} already has an open session for {cashier_id}")]
    SessionAlreadyOpen { cashier_id: String, register: String },

    /// The last close still has an uncleared variance.
    ///
    /// ## When This Occurs
    /// - Opening a shift while the previous close is "sin aclarar"
    ///
    /// Blocks the register until a supervisor clears that close.
    #[error("Register session {session_id} has an uncleared variance; a supervisor must clear it first")]
    VarianceUnresolved { session_id: String },

    /// The session is not in a state that allows the operation.
    #[error("{0}")]
    InvalidState(String),

    /// No clearance code has been configured.
    #[error("No supervisor authorization code is configured")]
    AuthorizationUnavailable,

    // =========================================================================
    // Infrastructure Errors
    // =========================================================================
    /// A read or write against the store failed or missed its deadline.
    /// No user-visible state was advanced.
    #[error("Backend unavailable during {operation}: {reason}")]
    BackendUnavailable { operation: String, reason: String },

    /// The terminal is offline; nothing was attempted.
    #[error("Network is offline")]
    NetworkOffline,

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ServiceError {
    pub fn backend(operation: impl Into<String>, reason: impl ToString) -> Self {
        ServiceError::BackendUnavailable {
            operation: operation.into(),
            reason: reason.to_string(),
        }
    }

    /// Machine-readable code for the screens.
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::Validation(_) => "VALIDATION_ERROR",
            ServiceError::InvalidAuthorization => "INVALID_AUTHORIZATION",
            ServiceError::AllocationExhausted { .. } => "ALLOCATION_EXHAUSTED",
            ServiceError::AllocationRetryExceeded { .. } => "ALLOCATION_RETRY_EXCEEDED",
            ServiceError::NotAssigned { .. } => "NOT_ASSIGNED",
            ServiceError::InvoiceAlreadyIssued { .. } => "INVOICE_ALREADY_ISSUED",
            ServiceError::SessionNotFound(_) => "SESSION_NOT_FOUND",
            ServiceError::SessionAlreadyOpen { .. } => "SESSION_ALREADY_OPEN",
            ServiceError::VarianceUnresolved { .. } => "VARIANCE_UNRESOLVED",
            ServiceError::InvalidState(_) => "INVALID_STATE",
            ServiceError::AuthorizationUnavailable => "AUTHORIZATION_UNAVAILABLE",
            ServiceError::BackendUnavailable { .. } => "BACKEND_UNAVAILABLE",
            ServiceError::NetworkOffline => "NETWORK_OFFLINE",
            ServiceError::Config(_) => "CONFIG_ERROR",
        }
    }

    /// The user may simply try the same action again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ServiceError::AllocationRetryExceeded { .. } | ServiceError::BackendUnavailable { .. }
        )
    }

    /// Shown as a modal that stops the sale flow.
    pub fn is_blocking(&self) -> bool {
        matches!(
            self,
            ServiceError::AllocationExhausted { .. }
                | ServiceError::NetworkOffline
                | ServiceError::NotAssigned { .. }
                | ServiceError::VarianceUnresolved { .. }
        )
    }

    pub fn is_config_error(&self) -> bool {
        matches!(self, ServiceError::Config(_))
    }

    /// Serializable `{ code, message }` pair.
    pub fn to_payload(&self) -> ErrorPayload {
        ErrorPayload {
            code: self.code(),
            message: self.to_string(),
        }
    }
}

/// Wire shape of an error for the screens.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorPayload {
    pub code: &'static str,
    pub message: String,
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<CoreError> for ServiceError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::AllocationExhausted { range_end } => ServiceError::AllocationExhausted { range_end },
            CoreError::AllocationRetryExceeded { attempts } => ServiceError::AllocationRetryExceeded { attempts },
            CoreError::Validation(e) => ServiceError::Validation(e),
            other @ (CoreError::InvalidSessionState { .. } | CoreError::InvalidRange { .. }) => {
                ServiceError::InvalidState(other.to_string())
            }
        }
    }
}

/// Any store failure is `BackendUnavailable`; callers that expect a
/// specific `DbError` (duplicate open, duplicate invoice) match it first.
impl From<DbError> for ServiceError {
    fn from(err: DbError) -> Self {
        tracing::error!(error = %err, "Backend operation failed");
        ServiceError::backend("database", err)
    }
}

impl From<std::io::Error> for ServiceError {
    fn from(err: std::io::Error) -> Self {
        ServiceError::Config(err.to_string())
    }
}

impl From<toml::de::Error> for ServiceError {
    fn from(err: toml::de::Error) -> Self {
        ServiceError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for ServiceError {
    fn from(err: toml::ser::Error) -> Self {
        ServiceError::Config(err.to_string())
    }
}

impl From<url::ParseError> for ServiceError {
    fn from(err: url::ParseError) -> Self {
        ServiceError::Config(format!("invalid notification endpoint: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(ServiceError::AllocationRetryExceeded { attempts: 1000 }.is_retryable());
        assert!(ServiceError::backend("close_shift", "deadline elapsed").is_retryable());

        assert!(!ServiceError::AllocationExhausted { range_end: 500 }.is_retryable());
        assert!(!ServiceError::NetworkOffline.is_retryable());
        assert!(!ServiceError::Validation(ValidationError::required("efectivo")).is_retryable());
    }

    #[test]
    fn test_blocking_errors() {
        assert!(ServiceError::AllocationExhausted { range_end: 500 }.is_blocking());
        assert!(ServiceError::NetworkOffline.is_blocking());
        assert!(ServiceError::VarianceUnresolved { session_id: "s1".into() }.is_blocking());
        assert!(!ServiceError::InvalidAuthorization.is_blocking());
    }

    #[test]
    fn test_core_conversion() {
        let err: ServiceError = CoreError::AllocationExhausted { range_end: 42 }.into();
        assert_eq!(err.code(), "ALLOCATION_EXHAUSTED");

        let err: ServiceError = CoreError::Validation(ValidationError::required("tarjeta")).into();
        assert_eq!(err.code(), "VALIDATION_ERROR");
        assert_eq!(err.to_string(), "tarjeta is required");
    }

    #[test]
    fn test_db_errors_become_backend_unavailable() {
        let err: ServiceError = DbError::PoolExhausted.into();
        assert_eq!(err.code(), "BACKEND_UNAVAILABLE");

        let payload = err.to_payload();
        assert_eq!(payload.code, "BACKEND_UNAVAILABLE");
        assert!(payload.message.contains("pool exhausted"));
    }

    #[test]
    fn test_payload_json() {
        let json = serde_json::to_value(ServiceError::NetworkOffline.to_payload()).unwrap();
        assert_eq!(json["code"], "NETWORK_OFFLINE");
        assert_eq!(json["message"], "Network is offline");
    }
}
