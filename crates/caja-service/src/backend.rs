//! # Backend Calls With Deadlines
//!
//! Every read or write the services make against the shared store goes
//! through [`Backend`], which bounds it with `tokio::time::timeout`.
//!
//! ```text
//! service op ──► Backend::call("op", repo.fut()) ──► Ok(value)
//!                        │
//!                        ├── DbError ─────────► BackendUnavailable
//!                        └── deadline elapsed ─► BackendUnavailable
//! ```
//!
//! [`Backend::try_call`] only applies the deadline and hands the `DbError`
//! back, for callers that treat specific store errors (unique violations)
//! as domain outcomes.

use caja_db::{Database, DbResult};
use std::future::Future;
use std::time::Duration;
use tracing::error;

use crate::error::{ServiceError, ServiceResult};

#[derive(Debug, Clone)]
pub struct Backend {
    db: Database,
    timeout: Duration,
}

impl Backend {
    pub fn new(db: Database, timeout: Duration) -> Self {
        Backend { db, timeout }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Runs `fut` under the deadline; any failure is `BackendUnavailable`.
    pub async fn call<T, F>(&self, operation: &str, fut: F) -> ServiceResult<T>
    where
        F: Future<Output = DbResult<T>>,
    {
        match self.try_call(operation, fut).await? {
            Ok(value) => Ok(value),
            Err(e) => {
                error!(operation, error = %e, "Backend call failed");
                Err(ServiceError::backend(operation, e))
            }
        }
    }

    /// Runs `fut` under the deadline and returns the store's own result.
    pub async fn try_call<T, F>(&self, operation: &str, fut: F) -> ServiceResult<DbResult<T>>
    where
        F: Future<Output = DbResult<T>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => Ok(result),
            Err(_) => {
                error!(operation, timeout_ms = self.timeout.as_millis() as u64, "Backend deadline elapsed");
                Err(ServiceError::backend(
                    operation,
                    format!("no response within {} ms", self.timeout.as_millis()),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use caja_db::{DbConfig, DbError};

    async fn backend(timeout: Duration) -> Backend {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        Backend::new(db, timeout)
    }

    #[tokio::test]
    async fn test_call_passes_values_through() {
        let backend = backend(Duration::from_secs(1)).await;
        let value = backend.call("read", async { Ok::<_, DbError>(7) }).await.unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_store_error_is_backend_unavailable() {
        let backend = backend(Duration::from_secs(1)).await;
        let err = backend
            .call("read", async { Err::<(), _>(DbError::PoolExhausted) })
            .await
            .unwrap_err();
        assert_eq!(err.code(), "BACKEND_UNAVAILABLE");
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_try_call_keeps_store_error() {
        let backend = backend(Duration::from_secs(1)).await;
        let inner = backend
            .try_call("insert", async { Err::<(), _>(DbError::duplicate("numero", "12")) })
            .await
            .unwrap();
        assert!(matches!(inner, Err(DbError::UniqueViolation { .. })));
    }

    #[tokio::test]
    async fn test_deadline_elapsed() {
        let backend = backend(Duration::from_millis(20)).await;
        let err = backend
            .call("slow_read", async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<_, DbError>(())
            })
            .await
            .unwrap_err();

        match err {
            ServiceError::BackendUnavailable { operation, .. } => assert_eq!(operation, "slow_read"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
