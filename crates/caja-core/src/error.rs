//! # Error Types
//!
//! Domain-specific error types for caja-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  caja-core errors (this file)                                          │
//! │  ├── CoreError        - Sequencing and session rule violations         │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  caja-db errors (separate crate)                                       │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  caja-service errors                                                   │
//! │  └── ServiceError     - What the register screens see                  │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → ServiceError → Frontend           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// No free invoice number remains in the authorized range.
    ///
    /// ## When This Occurs
    /// - The next candidate is already past `range_end`
    /// - Every number up to `range_end` is issued or reserved
    ///
    /// Terminal until the fiscal range (CAI) is renewed.
    #[error("Invoice range exhausted: no number available up to {range_end}")]
    AllocationExhausted { range_end: i64 },

    /// The sequencer hit its attempt cap before finding a free number.
    ///
    /// ## When This Occurs
    /// - The backing store reports every probed number as taken, which
    ///   usually means it is inconsistent or under heavy contention
    ///
    /// The caller may retry the whole action.
    #[error("Could not allocate an invoice number after {attempts} attempts")]
    AllocationRetryExceeded { attempts: u32 },

    /// Session is not in a state that allows the requested operation.
    ///
    /// ## When This Occurs
    /// - Closing a session that is already closed
    /// - Clearing a session that has no unresolved variance
    #[error("Register session {session_id} is {current}, cannot {operation}")]
    InvalidSessionState {
        session_id: String,
        current: String,
        operation: String,
    },

    /// Authorized invoice range is malformed.
    #[error("Invalid invoice range {start}..={end}")]
    InvalidRange { start: i64, end: i64 },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when user input doesn't meet requirements.
/// Used for early validation before business logic runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Invalid format (e.g., malformed amount, malformed timestamp).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

impl ValidationError {
    pub fn required(field: impl Into<String>) -> Self {
        ValidationError::Required {
            field: field.into(),
        }
    }

    pub fn invalid_format(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::InvalidFormat {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::AllocationExhausted { range_end: 500 };
        assert_eq!(
            err.to_string(),
            "Invoice range exhausted: no number available up to 500"
        );

        let err = CoreError::AllocationRetryExceeded { attempts: 1000 };
        assert_eq!(
            err.to_string(),
            "Could not allocate an invoice number after 1000 attempts"
        );
    }

    #[test]
    fn test_validation_error_messages() {
        assert_eq!(
            ValidationError::required("efectivo").to_string(),
            "efectivo is required"
        );
        assert_eq!(
            ValidationError::MustNotBeNegative {
                field: "tarjeta".into()
            }
            .to_string(),
            "tarjeta must not be negative"
        );
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let core_err: CoreError = ValidationError::required("motivo").into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
