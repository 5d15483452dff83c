//! Invoice allocation across terminals and under failure.

use caja_core::{CaiAuthorization, CashierContext, InvoiceNumber, InvoiceRange};
use caja_db::{Database, DbConfig};
use caja_service::{Backend, Clock, Connectivity, InvoiceService, ServiceError};
use caja_core::day_range::BusinessTimezone;
use std::collections::HashSet;
use std::time::Duration;

fn cai(start: i64, end: i64) -> CaiAuthorization {
    CaiAuthorization {
        cashier_id: "c1".into(),
        cai: "35A1B2-C3D4E5-F6A7B8-C9D0E1-F2A3B4-C5".into(),
        range: InvoiceRange::new(start, end).unwrap(),
        register: "1".into(),
    }
}

fn service(db: &Database, connectivity: Connectivity) -> InvoiceService {
    InvoiceService::new(
        Backend::new(db.clone(), Duration::from_secs(5)),
        BusinessTimezone::honduras(),
        Clock::System,
        connectivity,
        1000,
    )
}

fn ctx() -> CashierContext {
    CashierContext::new("c1", "Ana", "1")
}

#[tokio::test]
async fn test_two_terminals_never_share_a_number() {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    db.settings().upsert_cai(&cai(1, 100)).await.unwrap();

    let a = service(&db, Connectivity::default());
    let b = service(&db, Connectivity::default());

    let run = |svc: InvoiceService| async move {
        let mut got = Vec::new();
        for _ in 0..10 {
            got.push(svc.allocate_next(&ctx()).await.unwrap().value());
        }
        got
    };
    let (from_a, from_b) = tokio::join!(run(a), run(b));

    let all: HashSet<i64> = from_a.iter().chain(from_b.iter()).copied().collect();
    assert_eq!(all.len(), 20);
    assert!(all.iter().all(|n| (1..=100).contains(n)));
}

#[tokio::test]
async fn test_candidate_past_range_end_needs_no_store() {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    let svc = service(&db, Connectivity::default());
    db.close().await;

    let err = svc
        .allocate_from(&ctx(), &cai(1, 500), InvoiceNumber::new(501))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::AllocationExhausted { range_end: 500 }));
    assert!(err.is_blocking());
}

#[tokio::test]
async fn test_store_failure_allocates_nothing() {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    let svc = service(&db, Connectivity::default());
    db.close().await;

    let err = svc
        .allocate_from(&ctx(), &cai(1, 500), InvoiceNumber::new(1))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::BackendUnavailable { .. }));
}

#[tokio::test]
async fn test_offline_confirmation_is_refused() {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    db.settings().upsert_cai(&cai(1, 100)).await.unwrap();

    let connectivity = Connectivity::new(false);
    let svc = service(&db, connectivity.clone());

    let err = svc.confirm_order(&ctx()).await.unwrap_err();
    assert_eq!(err.code(), "NETWORK_OFFLINE");
    assert_eq!(db.invoices().last_issued("c1", "1").await.unwrap(), None);

    connectivity.set_online(true);
    assert_eq!(svc.confirm_order(&ctx()).await.unwrap(), InvoiceNumber::new(1));
}
