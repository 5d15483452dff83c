//! # Expense Repository
//!
//! Cash paid out of the drawer (`gastos`). Reconciliation subtracts these
//! from the session's cash sales.

use caja_core::day_range::{format_naive, parse_local_date, LOCAL_DATE_FORMAT};
use caja_core::reconciliation::SessionWindow;
use caja_core::{ExpenseRecord, Money};
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use super::stamp;
use crate::error::{DbError, DbResult};

#[derive(Debug, sqlx::FromRow)]
struct ExpenseRow {
    fecha: String,
    fecha_hora: String,
    monto: i64,
    motivo: String,
    cajero_id: String,
    caja: String,
}

impl ExpenseRow {
    fn into_record(self) -> DbResult<ExpenseRecord> {
        Ok(ExpenseRecord {
            amount: Money::from_cents(self.monto),
            reason: self.motivo,
            cashier_id: self.cajero_id,
            register: self.caja,
            date: parse_local_date(&self.fecha).map_err(|e| DbError::corrupt("gastos", e))?,
            recorded_at: stamp("gastos", &self.fecha_hora)?,
        })
    }
}

/// Repository for `gastos`.
#[derive(Debug, Clone)]
pub struct ExpenseRepository {
    pool: SqlitePool,
}

impl ExpenseRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ExpenseRepository { pool }
    }

    /// Inserts an expense and returns its row id.
    pub async fn insert(&self, expense: &ExpenseRecord) -> DbResult<String> {
        let id = Uuid::new_v4().to_string();
        debug!(id = %id, amount = %expense.amount, register = %expense.register, "Recording expense");

        sqlx::query(
            r#"
            INSERT INTO gastos (id, fecha, fecha_hora, monto, motivo, cajero_id, caja)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&id)
        .bind(expense.date.format(LOCAL_DATE_FORMAT).to_string())
        .bind(format_naive(&expense.recorded_at))
        .bind(expense.amount.cents())
        .bind(&expense.reason)
        .bind(&expense.cashier_id)
        .bind(&expense.register)
        .execute(&self.pool)
        .await?;

        Ok(id)
    }

    /// Expenses of (cashier, register) stamped inside `window`.
    pub async fn list_in_window(
        &self,
        cashier_id: &str,
        register: &str,
        window: &SessionWindow,
    ) -> DbResult<Vec<ExpenseRecord>> {
        let rows: Vec<ExpenseRow> = sqlx::query_as(
            r#"
            SELECT fecha, fecha_hora, monto, motivo, cajero_id, caja
            FROM gastos
            WHERE cajero_id = ?1 AND caja = ?2 AND fecha_hora BETWEEN ?3 AND ?4
            ORDER BY fecha_hora, rowid
            "#,
        )
        .bind(cashier_id)
        .bind(register)
        .bind(format_naive(&window.start))
        .bind(format_naive(&window.end))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ExpenseRow::into_record).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use caja_core::day_range::parse_local;

    fn expense(amount: i64, at: &str) -> ExpenseRecord {
        let recorded_at = parse_local(at).unwrap();
        ExpenseRecord {
            amount: Money::from_cents(amount),
            reason: "Hielo | Factura: 001-22".into(),
            cashier_id: "c1".into(),
            register: "1".into(),
            date: recorded_at.date(),
            recorded_at,
        }
    }

    #[tokio::test]
    async fn test_insert_and_list() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.expenses();

        let morning = expense(12_000, "2025-10-31 09:00:00");
        let night = expense(3_000, "2025-10-31 22:00:00");
        repo.insert(&morning).await.unwrap();
        repo.insert(&night).await.unwrap();

        let window = SessionWindow::new(
            parse_local("2025-10-31 14:00:00").unwrap(),
            parse_local("2025-10-31 23:59:59").unwrap(),
        );
        assert_eq!(repo.list_in_window("c1", "1", &window).await.unwrap(), vec![night]);
    }

    #[tokio::test]
    async fn test_non_positive_amount_rejected_by_schema() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let err = db
            .expenses()
            .insert(&expense(0, "2025-10-31 09:00:00"))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::ConstraintViolation(_)));
    }
}
