//! End-to-end register flows: open, sell, close, gate, clearance.

use caja_core::day_range::parse_local;
use caja_core::{
    CaiAuthorization, CashierContext, CountedTotalsInput, ExchangeRate, GateReason, InvoiceRange, Money,
    PaymentType, ResolutionStatus, Route,
};
use caja_db::{Database, DbConfig};
use caja_service::{CajaConfig, Clock, SalePayment, SaleRequest, ServiceError, Terminal};
use chrono::{Duration, TimeZone, Utc};

/// 2025-10-31 08:00 in Tegucigalpa.
fn morning() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 10, 31, 14, 0, 0).unwrap()
}

async fn seed_cai(db: &Database) {
    db.settings()
        .upsert_cai(&CaiAuthorization {
            cashier_id: "c1".into(),
            cai: "35A1B2-C3D4E5-F6A7B8-C9D0E1-F2A3B4-C5".into(),
            range: InvoiceRange::new(1, 5000).unwrap(),
            register: "1".into(),
        })
        .await
        .unwrap();
}

async fn terminal(clock: &Clock) -> (Terminal, Database) {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    seed_cai(&db).await;

    let terminal = Terminal::with_database(db.clone(), &CajaConfig::default(), clock.clone()).unwrap();
    terminal
        .register()
        .set_exchange_rate(ExchangeRate::from_ten_thousandths(247_500))
        .await
        .unwrap();
    terminal.register().set_authorization_code("1234").await.unwrap();
    (terminal, db)
}

async fn sell(terminal: &Terminal, ctx: &CashierContext, payment_type: PaymentType, lempiras: i64, usd: Option<i64>) {
    let number = terminal.invoices().confirm_order(ctx).await.unwrap();
    let amount = Money::from_major_minor(lempiras, 0);
    terminal
        .invoices()
        .finalize_sale(
            ctx,
            SaleRequest {
                number,
                customer: "Cliente".into(),
                total: amount,
                payments: vec![SalePayment {
                    payment_type,
                    amount,
                    usd_amount: usd.map(|d| Money::from_major_minor(d, 0)),
                }],
            },
        )
        .await
        .unwrap();
}

fn counts(cash: &str, card: &str, transfer: &str, usd: &str) -> CountedTotalsInput {
    CountedTotalsInput::from_text(cash, card, transfer, usd).unwrap()
}

#[tokio::test]
async fn test_overage_goes_to_review_until_cleared() {
    let clock = Clock::manual(morning());
    let (terminal, _db) = terminal(&clock).await;
    let register = terminal.register();

    let ctx = terminal.context_for("c1", "Ana").await.unwrap();
    assert_eq!(ctx.register, "1");

    let gate = register.route(&ctx).await.unwrap();
    assert_eq!((gate.route, gate.reason), (Route::Sales, GateReason::NoSession));

    let session = register.open_shift(&ctx).await.unwrap();
    assert_eq!(register.route(&ctx).await.unwrap().reason, GateReason::Open);

    clock.advance(Duration::hours(1));
    sell(&terminal, &ctx, PaymentType::Cash, 1150, None).await;
    sell(&terminal, &ctx, PaymentType::Card, 280, None).await;
    sell(&terminal, &ctx, PaymentType::Transfer, 40, None).await;

    let preview = register.preview_totals(&ctx).await.unwrap();
    assert_eq!(preview.cash_net, Money::from_major_minor(1150, 0));

    clock.advance(Duration::hours(8));
    let report = register
        .close_shift(&ctx, Some(&session.id), counts("1200", "280", "40", ""))
        .await
        .unwrap();

    assert!(!report.legacy);
    assert_eq!(report.session_id, session.id);
    assert_eq!(report.reconciliation.variance.total, Money::from_major_minor(50, 0));
    assert_eq!(report.status, ResolutionStatus::Unresolved);
    assert_eq!(report.gate.route, Route::VarianceReview);

    let first = register.route(&ctx).await.unwrap();
    let second = register.route(&ctx).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first.route, Route::VarianceReview);

    let decision = register
        .clear_variance(&ctx, Some(&report.session_id), "1234")
        .await
        .unwrap();
    assert_eq!(decision.route, Route::Sales);

    let after = register.route(&ctx).await.unwrap();
    assert_eq!((after.route, after.reason), (Route::Sales, GateReason::Cleared));
    assert!(after.register_already_closed());
}

#[tokio::test]
async fn test_exact_counts_balance() {
    let clock = Clock::manual(morning());
    let (terminal, _db) = terminal(&clock).await;
    let ctx = terminal.context_for("c1", "Ana").await.unwrap();

    terminal.register().open_shift(&ctx).await.unwrap();
    sell(&terminal, &ctx, PaymentType::Cash, 1150, None).await;
    sell(&terminal, &ctx, PaymentType::Card, 280, None).await;
    sell(&terminal, &ctx, PaymentType::Transfer, 40, None).await;

    let report = terminal
        .register()
        .close_shift(&ctx, None, counts("1150", "280", "40", "0"))
        .await
        .unwrap();
    assert!(report.reconciliation.variance.total.is_zero());
    assert_eq!(report.status, ResolutionStatus::Balanced);
    assert_eq!(report.gate.reason, GateReason::Balanced);
    assert_eq!(report.expected_cash, Money::from_major_minor(1150, 0));
}

#[tokio::test]
async fn test_missing_dollars_convert_at_close_rate() {
    let clock = Clock::manual(morning());
    let (terminal, _db) = terminal(&clock).await;
    let ctx = terminal.context_for("c1", "Ana").await.unwrap();

    terminal.register().open_shift(&ctx).await.unwrap();
    sell(&terminal, &ctx, PaymentType::Usd, 247, Some(10)).await;

    let report = terminal
        .register()
        .close_shift(&ctx, None, counts("0", "0", "0", ""))
        .await
        .unwrap();
    let variance = report.reconciliation.variance;
    assert_eq!(variance.usd, Money::from_major_minor(-10, 0));
    assert_eq!(variance.usd_local, Money::from_major_minor(-247, 50));
    assert_eq!(variance.total, Money::from_major_minor(-247, 50));
    assert_eq!(report.reconciliation.system.usd, Money::from_major_minor(10, 0));
}

#[tokio::test]
async fn test_shift_across_midnight_only_counts_its_own_sales() {
    // 2025-10-31 18:00 local: an earlier shift sells and closes
    let clock = Clock::manual(Utc.with_ymd_and_hms(2025, 11, 1, 0, 0, 0).unwrap());
    let (terminal, _db) = terminal(&clock).await;
    let ctx = terminal.context_for("c1", "Ana").await.unwrap();
    let register = terminal.register();

    register.open_shift(&ctx).await.unwrap();
    sell(&terminal, &ctx, PaymentType::Cash, 500, None).await;
    register.close_shift(&ctx, None, counts("500", "0", "0", "")).await.unwrap();

    // 23:30 local: night shift opens, sells at 23:45, closes at 00:30
    clock.set(Utc.with_ymd_and_hms(2025, 11, 1, 5, 30, 0).unwrap());
    let night = register.open_shift(&ctx).await.unwrap();
    assert_eq!(night.opened_at, parse_local("2025-10-31 23:30:00").unwrap());

    clock.advance(Duration::minutes(15));
    sell(&terminal, &ctx, PaymentType::Cash, 300, None).await;

    clock.advance(Duration::minutes(45));
    let report = register
        .close_shift(&ctx, Some(&night.id), counts("300", "0", "0", ""))
        .await
        .unwrap();
    assert_eq!(report.reconciliation.system.cash_gross, Money::from_major_minor(300, 0));
    assert_eq!(report.status, ResolutionStatus::Balanced);
    assert_eq!(report.closed_at, parse_local("2025-11-01 00:30:00").unwrap());

    let gate = register.route(&ctx).await.unwrap();
    assert_eq!(gate.reason, GateReason::Balanced);
}

#[tokio::test]
async fn test_store_failure_leaves_session_open() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("caja.db");
    let clock = Clock::manual(morning());

    let db = Database::new(DbConfig::new(&path)).await.unwrap();
    seed_cai(&db).await;
    let terminal = Terminal::with_database(db.clone(), &CajaConfig::default(), clock.clone()).unwrap();
    let ctx = terminal.context_for("c1", "Ana").await.unwrap();
    let session = terminal.register().open_shift(&ctx).await.unwrap();

    // Store drops out mid-close
    db.close().await;
    let err = terminal
        .register()
        .close_shift(&ctx, Some(&session.id), counts("0", "0", "0", ""))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::BackendUnavailable { .. }));
    assert!(err.is_retryable());
    assert_eq!(terminal.register().route(&ctx).await.unwrap_err().code(), "BACKEND_UNAVAILABLE");

    // Store comes back: the apertura is untouched and the close can be retried
    let db = Database::new(DbConfig::new(&path)).await.unwrap();
    let terminal = Terminal::with_database(db, &CajaConfig::default(), clock).unwrap();
    let current = terminal.register().current_session(&ctx).await.unwrap().unwrap();
    assert_eq!(current.id, session.id);
    assert!(current.is_open());

    let report = terminal
        .register()
        .close_shift(&ctx, Some(&session.id), counts("0", "0", "0", ""))
        .await
        .unwrap();
    assert_eq!(report.status, ResolutionStatus::Balanced);
}

#[tokio::test]
async fn test_uncleared_close_keeps_register_shut() {
    let clock = Clock::manual(morning());
    let (terminal, _db) = terminal(&clock).await;
    let register = terminal.register();
    let ctx = terminal.context_for("c1", "Ana").await.unwrap();

    register.open_shift(&ctx).await.unwrap();
    let report = register
        .close_shift(&ctx, None, counts("50", "0", "0", ""))
        .await
        .unwrap();
    assert_eq!(register.route(&ctx).await.unwrap().route, Route::VarianceReview);

    clock.advance(Duration::minutes(5));
    let err = register.open_shift(&ctx).await.unwrap_err();
    assert!(matches!(err, ServiceError::VarianceUnresolved { ref session_id } if *session_id == report.session_id));
    assert!(err.is_blocking());

    // The refused open wrote nothing, so the gate still holds
    let gate = register.route(&ctx).await.unwrap();
    assert_eq!((gate.route, gate.reason), (Route::VarianceReview, GateReason::Unresolved));
    assert!(register.current_session(&ctx).await.unwrap().is_none());

    register.clear_variance(&ctx, None, "1234").await.unwrap();
    register.open_shift(&ctx).await.unwrap();
    let gate = register.route(&ctx).await.unwrap();
    assert_eq!((gate.route, gate.reason), (Route::Sales, GateReason::Open));
}

#[tokio::test]
async fn test_terminal_start_from_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = CajaConfig::default();
    config.database.path = dir.path().join("caja.db");
    config.backend.timeout_ms = 3000;

    let terminal = Terminal::start(config).await.unwrap();
    assert!(terminal.database().health_check().await);

    let err = terminal.context_for("c1", "Ana").await.unwrap_err();
    assert!(matches!(err, ServiceError::NotAssigned { .. }));

    terminal.shutdown().await;
}
