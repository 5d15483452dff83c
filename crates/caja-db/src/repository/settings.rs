//! # Settings Repository
//!
//! Fiscal authorization per cashier (`cai_facturas`) and the two
//! singletons: the dollar exchange rate (`precio_dolar`) and the supervisor
//! clearance code (`claves_autorizacion`).

use caja_core::day_range::format_naive;
use caja_core::{CaiAuthorization, ExchangeRate, InvoiceRange};
use chrono::NaiveDateTime;
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};

#[derive(Debug, sqlx::FromRow)]
struct CaiRow {
    cajero_id: String,
    cai: String,
    rango_desde: i64,
    rango_hasta: i64,
    caja_asignada: String,
}

impl TryFrom<CaiRow> for CaiAuthorization {
    type Error = DbError;

    fn try_from(row: CaiRow) -> DbResult<Self> {
        let range = InvoiceRange::new(row.rango_desde, row.rango_hasta)
            .map_err(|e| DbError::corrupt("cai_facturas", e))?;
        Ok(CaiAuthorization {
            cashier_id: row.cajero_id,
            cai: row.cai,
            range,
            register: row.caja_asignada,
        })
    }
}

/// Repository for CAI rows and singleton settings.
#[derive(Debug, Clone)]
pub struct SettingsRepository {
    pool: SqlitePool,
}

impl SettingsRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SettingsRepository { pool }
    }

    /// The cashier's fiscal authorization, if one was assigned.
    pub async fn cai_for_cashier(&self, cashier_id: &str) -> DbResult<Option<CaiAuthorization>> {
        debug!(cashier_id, "Loading CAI authorization");

        let row: Option<CaiRow> = sqlx::query_as(
            r#"
            SELECT cajero_id, cai, rango_desde, rango_hasta, caja_asignada
            FROM cai_facturas
            WHERE cajero_id = ?1
            "#,
        )
        .bind(cashier_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(CaiAuthorization::try_from).transpose()
    }

    /// Assigns or renews a cashier's authorization.
    pub async fn upsert_cai(&self, cai: &CaiAuthorization) -> DbResult<()> {
        info!(
            cashier_id = %cai.cashier_id,
            register = %cai.register,
            start = cai.range.start(),
            end = cai.range.end(),
            "Saving CAI authorization"
        );

        sqlx::query(
            r#"
            INSERT INTO cai_facturas (cajero_id, cai, rango_desde, rango_hasta, caja_asignada)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT (cajero_id) DO UPDATE SET
                cai = excluded.cai,
                rango_desde = excluded.rango_desde,
                rango_hasta = excluded.rango_hasta,
                caja_asignada = excluded.caja_asignada
            "#,
        )
        .bind(&cai.cashier_id)
        .bind(&cai.cai)
        .bind(cai.range.start())
        .bind(cai.range.end())
        .bind(&cai.register)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Current lempiras-per-dollar rate, if one was ever set.
    pub async fn exchange_rate(&self) -> DbResult<Option<ExchangeRate>> {
        let value: Option<i64> = sqlx::query_scalar("SELECT valor FROM precio_dolar WHERE id = 1")
            .fetch_optional(&self.pool)
            .await?;

        Ok(value.map(ExchangeRate::from_ten_thousandths))
    }

    pub async fn set_exchange_rate(&self, rate: ExchangeRate, at: NaiveDateTime) -> DbResult<()> {
        info!(rate = %rate, "Updating exchange rate");

        sqlx::query(
            r#"
            INSERT INTO precio_dolar (id, valor, actualizado_en) VALUES (1, ?1, ?2)
            ON CONFLICT (id) DO UPDATE SET
                valor = excluded.valor,
                actualizado_en = excluded.actualizado_en
            "#,
        )
        .bind(rate.ten_thousandths())
        .bind(format_naive(&at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// The stored supervisor clearance code.
    pub async fn authorization_code(&self) -> DbResult<Option<String>> {
        let code: Option<String> = sqlx::query_scalar("SELECT clave FROM claves_autorizacion WHERE id = 1")
            .fetch_optional(&self.pool)
            .await?;

        Ok(code)
    }

    pub async fn set_authorization_code(&self, code: &str) -> DbResult<()> {
        info!("Updating supervisor authorization code");

        sqlx::query(
            r#"
            INSERT INTO claves_autorizacion (id, clave) VALUES (1, ?1)
            ON CONFLICT (id) DO UPDATE SET clave = excluded.clave
            "#,
        )
        .bind(code)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
