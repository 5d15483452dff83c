//! # Session Repository
//!
//! Register sessions (`cierres`).
//!
//! ## Row Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  insert(open)          estado = APERTURA, fecha = open stamp            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  mark_closed(session)  estado = CIERRE, fecha_cierre, totals,           │
//! │       │                diferencia, observacion                          │
//! │       ▼                                                                 │
//! │  clear(id)             observacion: sin aclarar → aclarado              │
//! │                                                                         │
//! │  Legacy close: insert(closed) writes a CIERRE row directly.             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A partial unique index keeps at most one APERTURA per (cashier,
//! register); a second open surfaces as `DbError::UniqueViolation`.

use caja_core::day_range::{format_naive, DayRange};
use caja_core::{
    CountedTotals, ExchangeRate, Money, RegisterSession, ResolutionStatus, SessionState, SystemTotals,
};
use chrono::NaiveDateTime;
use sqlx::SqlitePool;
use tracing::debug;

use super::stamp;
use crate::error::{DbError, DbResult};

const SELECT_SESSION: &str = r#"
    SELECT
        id, cajero_id, cajero, caja, estado, fecha, fecha_cierre,
        fondo_fijo_registrado,
        efectivo_registrado, efectivo_bruto_dia, gastos_dia, efectivo_dia,
        monto_tarjeta_registrado, monto_tarjeta_dia,
        transferencias_registradas, transferencias_dia,
        dolares_registrado, dolares_dia,
        precio_dolar, diferencia, observacion
    FROM cierres
"#;

#[derive(Debug, sqlx::FromRow)]
struct SessionRow {
    id: String,
    cajero_id: String,
    cajero: String,
    caja: String,
    estado: SessionState,
    fecha: String,
    fecha_cierre: Option<String>,
    fondo_fijo_registrado: i64,
    efectivo_registrado: Option<i64>,
    efectivo_bruto_dia: Option<i64>,
    gastos_dia: Option<i64>,
    efectivo_dia: Option<i64>,
    monto_tarjeta_registrado: Option<i64>,
    monto_tarjeta_dia: Option<i64>,
    transferencias_registradas: Option<i64>,
    transferencias_dia: Option<i64>,
    dolares_registrado: Option<i64>,
    dolares_dia: Option<i64>,
    precio_dolar: Option<i64>,
    diferencia: Option<i64>,
    observacion: Option<ResolutionStatus>,
}

impl TryFrom<SessionRow> for RegisterSession {
    type Error = DbError;

    fn try_from(row: SessionRow) -> DbResult<Self> {
        let opened_at = stamp("cierres", &row.fecha)?;
        let closed_at = row
            .fecha_cierre
            .as_deref()
            .map(|value| stamp("cierres", value))
            .transpose()?;

        let counted = match (
            row.efectivo_registrado,
            row.monto_tarjeta_registrado,
            row.transferencias_registradas,
        ) {
            (Some(cash), Some(card), Some(transfer)) => Some(CountedTotals {
                cash: Money::from_cents(cash),
                card: Money::from_cents(card),
                transfer: Money::from_cents(transfer),
                usd: Money::from_cents(row.dolares_registrado.unwrap_or(0)),
            }),
            _ => None,
        };

        let system = row.efectivo_dia.map(|cash_net| SystemTotals {
            cash_gross: Money::from_cents(row.efectivo_bruto_dia.unwrap_or(cash_net)),
            expenses: Money::from_cents(row.gastos_dia.unwrap_or(0)),
            cash_net: Money::from_cents(cash_net),
            card: Money::from_cents(row.monto_tarjeta_dia.unwrap_or(0)),
            transfer: Money::from_cents(row.transferencias_dia.unwrap_or(0)),
            usd: Money::from_cents(row.dolares_dia.unwrap_or(0)),
        });

        Ok(RegisterSession {
            id: row.id,
            cashier_id: row.cajero_id,
            cashier_name: row.cajero,
            register: row.caja,
            state: row.estado,
            opened_at,
            closed_at,
            fixed_fund_declared: Money::from_cents(row.fondo_fijo_registrado),
            counted,
            system,
            exchange_rate: row.precio_dolar.map(ExchangeRate::from_ten_thousandths),
            variance: row.diferencia.map(Money::from_cents),
            resolution: row.observacion,
        })
    }
}

fn into_sessions(rows: Vec<SessionRow>) -> DbResult<Vec<RegisterSession>> {
    rows.into_iter().map(RegisterSession::try_from).collect()
}

/// Repository for `cierres`.
#[derive(Debug, Clone)]
pub struct SessionRepository {
    pool: SqlitePool,
}

impl SessionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SessionRepository { pool }
    }

    /// Writes a new row in whatever state `session` is in: APERTURA for an
    /// open, CIERRE for a legacy close.
    pub async fn insert(&self, session: &RegisterSession) -> DbResult<()> {
        debug!(
            id = %session.id,
            cashier_id = %session.cashier_id,
            register = %session.register,
            state = %session.state,
            "Inserting register session"
        );

        let counted = session.counted;
        let system = session.system;

        sqlx::query(
            r#"
            INSERT INTO cierres (
                id, cajero_id, cajero, caja, estado, fecha, fecha_cierre,
                fondo_fijo_registrado, fondo_fijo,
                efectivo_registrado, efectivo_bruto_dia, gastos_dia, efectivo_dia,
                monto_tarjeta_registrado, monto_tarjeta_dia,
                transferencias_registradas, transferencias_dia,
                dolares_registrado, dolares_dia,
                precio_dolar, diferencia, observacion
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7,
                ?8, ?8,
                ?9, ?10, ?11, ?12,
                ?13, ?14,
                ?15, ?16,
                ?17, ?18,
                ?19, ?20, ?21
            )
            "#,
        )
        .bind(&session.id)
        .bind(&session.cashier_id)
        .bind(&session.cashier_name)
        .bind(&session.register)
        .bind(session.state)
        .bind(format_naive(&session.opened_at))
        .bind(session.closed_at.as_ref().map(format_naive))
        .bind(session.fixed_fund_declared.cents())
        .bind(counted.map(|c| c.cash.cents()))
        .bind(system.map(|s| s.cash_gross.cents()))
        .bind(system.map(|s| s.expenses.cents()))
        .bind(system.map(|s| s.cash_net.cents()))
        .bind(counted.map(|c| c.card.cents()))
        .bind(system.map(|s| s.card.cents()))
        .bind(counted.map(|c| c.transfer.cents()))
        .bind(system.map(|s| s.transfer.cents()))
        .bind(counted.map(|c| c.usd.cents()))
        .bind(system.map(|s| s.usd.cents()))
        .bind(session.exchange_rate.map(|r| r.ten_thousandths()))
        .bind(session.variance.map(|v| v.cents()))
        .bind(session.resolution)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Gets a session by id.
    pub async fn get(&self, id: &str) -> DbResult<Option<RegisterSession>> {
        let row: Option<SessionRow> = sqlx::query_as(&format!("{SELECT_SESSION} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(RegisterSession::try_from).transpose()
    }

    /// Most recent APERTURA for (cashier, register), whatever its date.
    /// A shift that crossed midnight is still found.
    pub async fn latest_open(&self, cashier_id: &str, register: &str) -> DbResult<Option<RegisterSession>> {
        let row: Option<SessionRow> = sqlx::query_as(&format!(
            "{SELECT_SESSION}
             WHERE cajero_id = ?1 AND caja = ?2 AND estado = 'APERTURA'
             ORDER BY fecha DESC, rowid DESC
             LIMIT 1"
        ))
        .bind(cashier_id)
        .bind(register)
        .fetch_optional(&self.pool)
        .await?;

        row.map(RegisterSession::try_from).transpose()
    }

    /// Most recent CIERRE for (cashier, register), whatever its date.
    pub async fn latest_closed(&self, cashier_id: &str, register: &str) -> DbResult<Option<RegisterSession>> {
        let row: Option<SessionRow> = sqlx::query_as(&format!(
            "{SELECT_SESSION}
             WHERE cajero_id = ?1 AND caja = ?2 AND estado = 'CIERRE'
             ORDER BY fecha_cierre DESC, rowid DESC
             LIMIT 1"
        ))
        .bind(cashier_id)
        .bind(register)
        .fetch_optional(&self.pool)
        .await?;

        row.map(RegisterSession::try_from).transpose()
    }

    /// The session that last changed during `day`: opened or closed inside
    /// the range, latest event first.
    pub async fn latest_for_day(
        &self,
        cashier_id: &str,
        register: &str,
        day: &DayRange,
    ) -> DbResult<Option<RegisterSession>> {
        debug!(cashier_id, register, day = %day.day_str(), "Looking up today's session");

        let row: Option<SessionRow> = sqlx::query_as(&format!(
            "{SELECT_SESSION}
             WHERE cajero_id = ?1 AND caja = ?2
               AND ((fecha BETWEEN ?3 AND ?4) OR (fecha_cierre BETWEEN ?3 AND ?4))
             ORDER BY COALESCE(fecha_cierre, fecha) DESC, rowid DESC
             LIMIT 1"
        ))
        .bind(cashier_id)
        .bind(register)
        .bind(day.start_str())
        .bind(day.end_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(RegisterSession::try_from).transpose()
    }

    /// Persists a close onto the APERTURA row it came from.
    ///
    /// ## Errors
    /// `DbError::NotFound` when the row is gone or no longer APERTURA, so a
    /// session is never closed twice.
    pub async fn mark_closed(&self, session: &RegisterSession) -> DbResult<()> {
        debug!(id = %session.id, "Closing register session");

        let counted = session.counted.unwrap_or_default();
        let system = session.system.unwrap_or_default();

        let result = sqlx::query(
            r#"
            UPDATE cierres SET
                estado = 'CIERRE',
                fecha_cierre = ?2,
                efectivo_registrado = ?3,
                efectivo_bruto_dia = ?4,
                gastos_dia = ?5,
                efectivo_dia = ?6,
                monto_tarjeta_registrado = ?7,
                monto_tarjeta_dia = ?8,
                transferencias_registradas = ?9,
                transferencias_dia = ?10,
                dolares_registrado = ?11,
                dolares_dia = ?12,
                precio_dolar = ?13,
                diferencia = ?14,
                observacion = ?15
            WHERE id = ?1 AND estado = 'APERTURA'
            "#,
        )
        .bind(&session.id)
        .bind(session.closed_at.as_ref().map(format_naive))
        .bind(counted.cash.cents())
        .bind(system.cash_gross.cents())
        .bind(system.expenses.cents())
        .bind(system.cash_net.cents())
        .bind(counted.card.cents())
        .bind(system.card.cents())
        .bind(counted.transfer.cents())
        .bind(system.transfer.cents())
        .bind(counted.usd.cents())
        .bind(system.usd.cents())
        .bind(session.exchange_rate.map(|r| r.ten_thousandths()))
        .bind(session.variance.map(|v| v.cents()))
        .bind(session.resolution)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Open register session", session.id.as_str()));
        }

        Ok(())
    }

    /// Flips "sin aclarar" to "aclarado". Returns `false` when the row was
    /// not an unresolved close; the recorded variance is left untouched.
    pub async fn clear(&self, id: &str) -> DbResult<bool> {
        debug!(id, "Clearing register variance");

        let result = sqlx::query(
            r#"
            UPDATE cierres SET observacion = 'aclarado'
            WHERE id = ?1 AND estado = 'CIERRE' AND observacion = 'sin aclarar'
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Closes recorded by a cashier at or after `since`, newest first.
    pub async fn closed_since(&self, cashier_id: &str, since: NaiveDateTime) -> DbResult<Vec<RegisterSession>> {
        let rows: Vec<SessionRow> = sqlx::query_as(&format!(
            "{SELECT_SESSION}
             WHERE cajero_id = ?1 AND estado = 'CIERRE' AND fecha_cierre >= ?2
             ORDER BY fecha_cierre DESC, rowid DESC"
        ))
        .bind(cashier_id)
        .bind(format_naive(&since))
        .fetch_all(&self.pool)
        .await?;

        into_sessions(rows)
    }
}
