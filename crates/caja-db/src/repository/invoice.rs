//! # Invoice Repository
//!
//! Issued invoices (`facturas`) and number reservations
//! (`factura_reservas`).
//!
//! ## Allocation Storage
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  last_issued()   MAX(factura) over facturas ∪ factura_reservas          │
//! │                         │                                               │
//! │                         ▼  candidate = last + 1                         │
//! │  is_taken(n)     facturas ∪ pagos hold n?  ──yes──► next candidate      │
//! │                         │ no                                            │
//! │                         ▼                                               │
//! │  try_reserve(n)  INSERT (cashier, register, n)                          │
//! │                  ├── inserted         → n belongs to this terminal      │
//! │                  └── UNIQUE violation → another terminal won; next      │
//! │                                                                         │
//! │  finalize()      facturas + pagos in one transaction                    │
//! │  list_between()  issued invoices by fecha_hora, newest first            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The primary key on `factura_reservas` is what makes two terminals unable
//! to walk away with the same number. Reservations are never deleted, so a
//! number handed out for an abandoned sale is not reused.

use caja_core::day_range::format_naive;
use caja_core::{InvoiceNumber, IssuedInvoice, Money, PaymentRecord};
use chrono::NaiveDateTime;
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use super::payment::insert_payment;
use super::stamp;
use crate::error::{DbError, DbResult};

const SELECT_INVOICE: &str = r#"
    SELECT factura, cai, cajero_id, cajero, caja, cliente, total, fecha_hora
    FROM facturas
"#;

#[derive(Debug, sqlx::FromRow)]
struct InvoiceRow {
    factura: i64,
    cai: String,
    cajero_id: String,
    cajero: String,
    caja: String,
    cliente: String,
    total: i64,
    fecha_hora: String,
}

impl InvoiceRow {
    fn into_invoice(self) -> DbResult<IssuedInvoice> {
        Ok(IssuedInvoice {
            number: InvoiceNumber::new(self.factura),
            cai: self.cai,
            cashier_id: self.cajero_id,
            cashier_name: self.cajero,
            register: self.caja,
            customer: self.cliente,
            total: Money::from_cents(self.total),
            issued_at: stamp("facturas", &self.fecha_hora)?,
        })
    }
}

/// Repository for `facturas` and `factura_reservas`.
#[derive(Debug, Clone)]
pub struct InvoiceRepository {
    pool: SqlitePool,
}

impl InvoiceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        InvoiceRepository { pool }
    }

    /// Highest number issued or reserved for (cashier, register).
    pub async fn last_issued(&self, cashier_id: &str, register: &str) -> DbResult<Option<InvoiceNumber>> {
        let last: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT MAX(factura) FROM (
                SELECT factura FROM facturas WHERE cajero_id = ?1 AND caja = ?2
                UNION ALL
                SELECT factura FROM factura_reservas WHERE cajero_id = ?1 AND caja = ?2
            )
            "#,
        )
        .bind(cashier_id)
        .bind(register)
        .fetch_one(&self.pool)
        .await?;

        Ok(last.map(InvoiceNumber::new))
    }

    /// Whether `number` is already on a finalized invoice or on a payment
    /// of a sale still being finalized.
    pub async fn is_taken(&self, cashier_id: &str, register: &str, number: InvoiceNumber) -> DbResult<bool> {
        let taken: i64 = sqlx::query_scalar(
            r#"
            SELECT
                EXISTS (SELECT 1 FROM facturas WHERE cajero_id = ?1 AND caja = ?2 AND factura = ?3)
                OR EXISTS (SELECT 1 FROM pagos WHERE cajero_id = ?1 AND caja = ?2 AND factura = ?3)
            "#,
        )
        .bind(cashier_id)
        .bind(register)
        .bind(number.value())
        .fetch_one(&self.pool)
        .await?;

        Ok(taken != 0)
    }

    /// Claims `number` for this terminal. `Ok(false)` means somebody else
    /// already holds it.
    pub async fn try_reserve(
        &self,
        cashier_id: &str,
        register: &str,
        number: InvoiceNumber,
        at: NaiveDateTime,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO factura_reservas (cajero_id, caja, factura, reservada_en)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(cashier_id)
        .bind(register)
        .bind(number.value())
        .bind(format_naive(&at))
        .execute(&self.pool)
        .await
        .map_err(DbError::from);

        match result {
            Ok(_) => {
                debug!(cashier_id, register, number = number.value(), "Reserved invoice number");
                Ok(true)
            }
            Err(err) if err.is_unique_violation() => {
                debug!(cashier_id, register, number = number.value(), "Invoice number already reserved");
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }

    pub async fn is_reserved(&self, cashier_id: &str, register: &str, number: InvoiceNumber) -> DbResult<bool> {
        let found: i64 = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM factura_reservas WHERE cajero_id = ?1 AND caja = ?2 AND factura = ?3
            )
            "#,
        )
        .bind(cashier_id)
        .bind(register)
        .bind(number.value())
        .fetch_one(&self.pool)
        .await?;

        Ok(found != 0)
    }

    /// Writes the invoice header and its payment lines atomically.
    ///
    /// ## Errors
    /// `DbError::UniqueViolation` if the number was already issued for
    /// this (cashier, register); nothing is written in that case.
    pub async fn finalize(&self, invoice: &IssuedInvoice, payments: &[PaymentRecord]) -> DbResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO facturas (id, factura, cai, cajero_id, cajero, caja, cliente, total, fecha_hora)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(invoice.number.value())
        .bind(&invoice.cai)
        .bind(&invoice.cashier_id)
        .bind(&invoice.cashier_name)
        .bind(&invoice.register)
        .bind(&invoice.customer)
        .bind(invoice.total.cents())
        .bind(format_naive(&invoice.issued_at))
        .execute(&mut *tx)
        .await?;

        // Numbers issued without going through try_reserve stay spent too
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO factura_reservas (cajero_id, caja, factura, reservada_en)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(&invoice.cashier_id)
        .bind(&invoice.register)
        .bind(invoice.number.value())
        .bind(format_naive(&invoice.issued_at))
        .execute(&mut *tx)
        .await?;

        for payment in payments {
            insert_payment(&mut *tx, payment, &invoice.cashier_name).await?;
        }

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        info!(
            number = invoice.number.value(),
            register = %invoice.register,
            total = %invoice.total,
            payments = payments.len(),
            "Invoice finalized"
        );

        Ok(())
    }

    pub async fn get(&self, cashier_id: &str, register: &str, number: InvoiceNumber) -> DbResult<Option<IssuedInvoice>> {
        let row: Option<InvoiceRow> = sqlx::query_as(&format!(
            "{SELECT_INVOICE} WHERE cajero_id = ?1 AND caja = ?2 AND factura = ?3"
        ))
        .bind(cashier_id)
        .bind(register)
        .bind(number.value())
        .fetch_optional(&self.pool)
        .await?;

        row.map(InvoiceRow::into_invoice).transpose()
    }

    /// Invoices of every register issued in `[from, to]` (business-local,
    /// inclusive), newest first.
    pub async fn list_between(&self, from: NaiveDateTime, to: NaiveDateTime) -> DbResult<Vec<IssuedInvoice>> {
        debug!(from = %from, to = %to, "Listing issued invoices");

        let rows: Vec<InvoiceRow> = sqlx::query_as(&format!(
            "{SELECT_INVOICE}
             WHERE fecha_hora BETWEEN ?1 AND ?2
             ORDER BY fecha_hora DESC, rowid DESC"
        ))
        .bind(format_naive(&from))
        .bind(format_naive(&to))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(InvoiceRow::into_invoice).collect()
    }
}
