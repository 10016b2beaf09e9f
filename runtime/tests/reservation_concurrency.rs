//! Concurrency tests for the reservation façade.
//!
//! These drive many tasks against one SKU through the full stack
//! (optimistic engine, lock fallback, mirror dispatch) and assert the
//! invariant the subsystem exists for: committed stock never oversells,
//! no matter how writes interleave.

#![allow(clippy::unwrap_used)] // Test code unwraps for clear failure messages

use futures::future::join_all;
use holdfast_core::environment::SystemClock;
use holdfast_core::error::InventoryError;
use holdfast_core::sku::{HolderId, SkuId};
use holdfast_core::stock::StockRecord;
use holdfast_runtime::InventoryService;
use holdfast_testing::mocks::InstantSleeper;
use holdfast_testing::stores::{InMemoryLeaseStore, InMemoryStockStore, RecordingProjection};
use std::sync::Arc;

fn service_with(record: StockRecord) -> (Arc<InventoryService>, Arc<RecordingProjection>) {
    // RUST_LOG=holdfast_runtime=debug surfaces retry/fallback decisions.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let stock = Arc::new(InMemoryStockStore::new());
    stock.seed(record);
    let projection = Arc::new(RecordingProjection::new());
    let service = Arc::new(InventoryService::new(
        stock,
        Arc::new(InMemoryLeaseStore::new()),
        projection.clone(),
        Arc::new(SystemClock),
        Arc::new(InstantSleeper::default()),
    ));
    (service, projection)
}

#[tokio::test(flavor = "multi_thread")]
async fn ten_concurrent_reserves_never_oversell_five_units() {
    let sku = SkuId::new("SKU-RACE");
    let (service, projection) = service_with(StockRecord::new(sku.clone(), 5, 0));

    let tasks = (0..10).map(|i| {
        let service = service.clone();
        let sku = sku.clone();
        tokio::spawn(async move {
            service
                .reserve_stock(&sku, 1, &HolderId::new(format!("order-{i}")))
                .await
        })
    });
    let outcomes: Vec<_> = join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    let successes = outcomes.iter().filter(|outcome| outcome.is_ok()).count();
    assert_eq!(successes, 5);
    for outcome in &outcomes {
        if let Err(err) = outcome {
            assert!(matches!(err, InventoryError::InsufficientStock { .. }));
        }
    }

    let record = service.get_inventory(&sku).await.unwrap();
    assert_eq!(record.reserved_stock, 5);
    assert_eq!(record.available_stock(), 0);
    assert_eq!(record.current_stock, 5);
    // Five committed writes, five version bumps.
    assert_eq!(record.version.value(), 5);

    // Every commit was mirrored; the freshest snapshot shows the pool empty.
    let snapshots = projection.wait_for(5).await;
    let freshest = snapshots
        .iter()
        .max_by_key(|snapshot| snapshot.version)
        .unwrap();
    assert_eq!(freshest.available_stock, 0);
    assert_eq!(freshest.version.value(), 5);
}

#[tokio::test(flavor = "multi_thread")]
async fn racing_reserves_for_the_last_unit_admit_exactly_one() {
    let sku = SkuId::new("SKU-LAST");
    let (service, _projection) = service_with(StockRecord::new(sku.clone(), 1, 0));

    let a = {
        let service = service.clone();
        let sku = sku.clone();
        tokio::spawn(async move { service.reserve_stock(&sku, 1, &HolderId::new("order-a")).await })
    };
    let b = {
        let service = service.clone();
        let sku = sku.clone();
        tokio::spawn(async move { service.reserve_stock(&sku, 1, &HolderId::new("order-b")).await })
    };

    let (a, b) = (a.await.unwrap(), b.await.unwrap());
    assert_eq!(u32::from(a.is_ok()) + u32::from(b.is_ok()), 1);
    let loser = if a.is_err() { a } else { b };
    assert!(matches!(
        loser.unwrap_err(),
        InventoryError::InsufficientStock {
            requested: 1,
            available: 0,
            ..
        }
    ));

    let record = service.get_inventory(&sku).await.unwrap();
    assert_eq!(record.available_stock(), 0);
    assert_eq!(record.reserved_stock, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn mixed_operation_classes_all_commit_under_contention() {
    let sku = SkuId::new("SKU-MIX");
    let (service, _projection) = service_with(StockRecord::new(sku.clone(), 50, 5));

    let mut tasks = Vec::new();
    for i in 0..5 {
        let service = service.clone();
        let sku = sku.clone();
        tasks.push(tokio::spawn(async move {
            service
                .reserve_stock(&sku, 2, &HolderId::new(format!("order-{i}")))
                .await
        }));
    }
    for i in 0..3 {
        let service = service.clone();
        let sku = sku.clone();
        tasks.push(tokio::spawn(async move {
            service
                .increase_stock(&sku, 10, &HolderId::new(format!("po-{i}")))
                .await
        }));
    }
    for i in 0..2 {
        let service = service.clone();
        let sku = sku.clone();
        tasks.push(tokio::spawn(async move {
            service
                .decrease_stock(&sku, 1, &HolderId::new(format!("adj-{i}")))
                .await
        }));
    }

    for joined in join_all(tasks).await {
        joined.unwrap().unwrap();
    }

    let record = service.get_inventory(&sku).await.unwrap();
    assert_eq!(record.current_stock, 50 + 30 - 2);
    assert_eq!(record.reserved_stock, 10);
    assert_eq!(record.inbound_total, 50 + 30);
    assert_eq!(record.outbound_total, 2);
    assert_eq!(record.version.value(), 10);
}

#[tokio::test(flavor = "multi_thread")]
async fn full_reservation_lifecycle_under_interleaving() {
    let sku = SkuId::new("SKU-LIFE");
    let (service, _projection) = service_with(StockRecord::new(sku.clone(), 20, 2));

    // Ten orders each reserve 2; half confirm, half cancel, concurrently.
    let reserves = (0..10).map(|i| {
        let service = service.clone();
        let sku = sku.clone();
        tokio::spawn(async move {
            service
                .reserve_stock(&sku, 2, &HolderId::new(format!("order-{i}")))
                .await
        })
    });
    for joined in join_all(reserves).await {
        joined.unwrap().unwrap();
    }

    let settlements = (0..10).map(|i| {
        let service = service.clone();
        let sku = sku.clone();
        tokio::spawn(async move {
            let op = HolderId::new(format!("order-{i}"));
            if i % 2 == 0 {
                service.confirm_reserve(&sku, 2, &op).await
            } else {
                service.cancel_reserve(&sku, 2, &op).await
            }
        })
    });
    for joined in join_all(settlements).await {
        joined.unwrap().unwrap();
    }

    let record = service.get_inventory(&sku).await.unwrap();
    assert_eq!(record.reserved_stock, 0);
    assert_eq!(record.current_stock, 10);
    assert_eq!(record.outbound_total, 10);
    assert_eq!(record.available_stock(), 10);
}
