//! # Payment Repository
//!
//! Tender lines (`pagos`). Rows are written together with their invoice
//! by [`InvoiceRepository::finalize`](super::invoice::InvoiceRepository::finalize);
//! this repository reads them back for reconciliation and answers whether
//! an invoice number already has payments in flight.

use caja_core::day_range::format_naive;
use caja_core::reconciliation::SessionWindow;
use caja_core::{InvoiceNumber, Money, PaymentRecord, PaymentType};
use sqlx::{Sqlite, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use super::stamp;
use crate::error::DbResult;

#[derive(Debug, sqlx::FromRow)]
struct PaymentRow {
    factura: i64,
    tipo: PaymentType,
    monto: i64,
    usd_monto: Option<i64>,
    cajero_id: String,
    caja: String,
    fecha_hora: String,
}

impl PaymentRow {
    fn into_record(self) -> DbResult<PaymentRecord> {
        Ok(PaymentRecord {
            invoice: InvoiceNumber::new(self.factura),
            payment_type: self.tipo,
            amount: Money::from_cents(self.monto),
            usd_amount: self.usd_monto.map(Money::from_cents),
            cashier_id: self.cajero_id,
            register: self.caja,
            recorded_at: stamp("pagos", &self.fecha_hora)?,
        })
    }
}

/// Inserts one payment line through any executor, so the invoice
/// transaction can reuse it.
pub(crate) async fn insert_payment<'e, E>(executor: E, payment: &PaymentRecord, cashier_name: &str) -> DbResult<()>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO pagos (id, factura, cajero_id, cajero, caja, tipo, monto, usd_monto, fecha_hora)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(payment.invoice.value())
    .bind(&payment.cashier_id)
    .bind(cashier_name)
    .bind(&payment.register)
    .bind(payment.payment_type)
    .bind(payment.amount.cents())
    .bind(payment.usd_amount.map(|usd| usd.cents()))
    .bind(format_naive(&payment.recorded_at))
    .execute(executor)
    .await?;

    Ok(())
}

/// Repository for `pagos`.
#[derive(Debug, Clone)]
pub struct PaymentRepository {
    pool: SqlitePool,
}

impl PaymentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        PaymentRepository { pool }
    }

    /// Records a single payment outside an invoice transaction.
    pub async fn insert(&self, payment: &PaymentRecord, cashier_name: &str) -> DbResult<()> {
        debug!(
            invoice = %payment.invoice,
            payment_type = %payment.payment_type,
            amount = %payment.amount,
            "Recording payment"
        );
        insert_payment(&self.pool, payment, cashier_name).await
    }

    /// Payments of (cashier, register) stamped inside `window`.
    pub async fn list_in_window(
        &self,
        cashier_id: &str,
        register: &str,
        window: &SessionWindow,
    ) -> DbResult<Vec<PaymentRecord>> {
        let rows: Vec<PaymentRow> = sqlx::query_as(
            r#"
            SELECT factura, tipo, monto, usd_monto, cajero_id, caja, fecha_hora
            FROM pagos
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

        debug!(cashier_id, register, count = rows.len(), "Loaded session payments");

        rows.into_iter().map(PaymentRow::into_record).collect()
    }

    /// Whether any payment references `number` for (cashier, register).
    pub async fn exists_for_invoice(&self, cashier_id: &str, register: &str, number: InvoiceNumber) -> DbResult<bool> {
        let found: i64 = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM pagos WHERE cajero_id = ?1 AND caja = ?2 AND factura = ?3
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
}
