//! Racing actors against one database file.
//!
//! Each test spawns several tasks that hit the same order or wallet at once
//! and checks who wins and that the ledger still adds up.

mod common;

use fulfil_core::{Money, OrderStatus, TransactionKind};
use fulfil_engine::{FulfilmentError, Session};
use tokio::task::JoinSet;

use common::{packed_order, place_standard, seed_balance, FileDb};

const RACERS: usize = 8;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_picker_claims_have_one_winner() {
    let file = FileDb::new();
    let engine = file.engine().await;
    let placed = place_standard(&engine, &Session::customer("customer-1")).await;

    let mut tasks = JoinSet::new();
    for n in 0..RACERS {
        let engine = engine.clone();
        let order_id = placed.order.id.clone();
        tasks.spawn(async move {
            let picker = Session::picker(format!("picker-{n}"));
            engine.claim_for_picking(&picker, &order_id).await
        });
    }

    let mut winners = Vec::new();
    let mut conflicts = 0;
    while let Some(joined) = tasks.join_next().await {
        match joined.unwrap() {
            Ok(order) => winners.push(order),
            Err(FulfilmentError::ClaimConflict { .. }) => conflicts += 1,
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    assert_eq!(winners.len(), 1);
    assert_eq!(conflicts, RACERS - 1);

    let stored = engine
        .get_order(&Session::admin("admin-1"), &placed.order.id)
        .await
        .unwrap();
    assert_eq!(stored.order.status, OrderStatus::Gathering);
    assert_eq!(stored.order.picker_id, winners[0].picker_id);

    engine.close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_driver_claims_have_one_winner() {
    let file = FileDb::new();
    let engine = file.engine().await;
    let placed = packed_order(
        &engine,
        &Session::customer("customer-1"),
        &Session::picker("picker-1"),
    )
    .await;

    let mut tasks = JoinSet::new();
    for n in 0..RACERS {
        let engine = engine.clone();
        let order_id = placed.order.id.clone();
        tasks.spawn(async move {
            let driver = Session::driver(format!("driver-{n}"));
            engine.claim_for_delivery(&driver, &order_id).await
        });
    }

    let mut wins = 0;
    let mut conflicts = 0;
    while let Some(joined) = tasks.join_next().await {
        match joined.unwrap() {
            Ok(_) => wins += 1,
            Err(FulfilmentError::ClaimConflict { .. }) => conflicts += 1,
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    assert_eq!(wins, 1);
    assert_eq!(conflicts, RACERS - 1);

    engine.close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_missing_marks_refund_once() {
    let file = FileDb::new();
    let engine = file.engine().await;
    let picker = Session::picker("picker-1");
    let placed = place_standard(&engine, &Session::customer("customer-1")).await;
    engine.claim_for_picking(&picker, &placed.order.id).await.unwrap();

    let item_id = placed.items[0].id.clone();
    let mut tasks = JoinSet::new();
    for _ in 0..RACERS {
        let engine = engine.clone();
        let picker = picker.clone();
        let item_id = item_id.clone();
        tasks.spawn(async move { engine.mark_item_missing(&picker, &item_id).await });
    }

    let mut wins = 0;
    let mut duplicates = 0;
    while let Some(joined) = tasks.join_next().await {
        match joined.unwrap() {
            Ok(_) => wins += 1,
            Err(FulfilmentError::DuplicateResolution { .. }) => duplicates += 1,
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }
    assert_eq!(wins, 1);
    assert_eq!(duplicates, RACERS - 1);

    let refunds = engine
        .database()
        .wallet()
        .transactions_for_order(&placed.order.id)
        .await
        .unwrap()
        .into_iter()
        .filter(|t| t.kind == TransactionKind::Refund)
        .count();
    assert_eq!(refunds, 1);
    assert_eq!(
        engine.database().wallet().balance("customer-1").await.unwrap(),
        Money::from_cents(10_000)
    );

    engine.close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_withdrawals_debit_once() {
    let file = FileDb::new();
    let engine = file.engine().await;
    seed_balance(&engine, "driver-1", 5_000).await;

    let mut tasks = JoinSet::new();
    for n in 0..RACERS {
        let engine = engine.clone();
        tasks.spawn(async move {
            let driver = Session::driver("driver-1").with_idempotency_key(format!("tap-{n}"));
            engine.request_withdrawal(&driver).await
        });
    }

    let mut created = 0;
    let mut refused = 0;
    while let Some(joined) = tasks.join_next().await {
        match joined.unwrap() {
            Ok(request) => {
                assert_eq!(request.amount(), Money::from_cents(5_000));
                created += 1;
            }
            Err(FulfilmentError::InsufficientBalance { .. }) => refused += 1,
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }
    assert_eq!(created, 1);
    assert_eq!(refused, RACERS - 1);

    let audit = engine.audit_wallets(&Session::admin("admin-1")).await.unwrap();
    assert!(audit.iter().all(|c| c.is_consistent()));
    assert_eq!(
        engine.database().wallet().balance("driver-1").await.unwrap(),
        Money::zero()
    );

    engine.close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_same_key_from_many_tasks_yields_one_request() {
    let file = FileDb::new();
    let engine = file.engine().await;
    seed_balance(&engine, "driver-1", 5_000).await;

    let mut tasks = JoinSet::new();
    for _ in 0..RACERS {
        let engine = engine.clone();
        tasks.spawn(async move {
            let driver = Session::driver("driver-1").with_idempotency_key("double-tap");
            engine.request_withdrawal(&driver).await
        });
    }

    let mut ids = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        ids.push(joined.unwrap().unwrap().id);
    }
    ids.dedup();
    assert_eq!(ids.len(), 1);

    let all = engine
        .list_withdrawals(&Session::admin("admin-1"), None)
        .await
        .unwrap();
    assert_eq!(all.len(), 1);

    engine.close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_orders_get_distinct_codes() {
    let file = FileDb::new();
    let engine = file.engine().await;

    let mut tasks = JoinSet::new();
    for n in 0..RACERS {
        let engine = engine.clone();
        tasks.spawn(async move {
            let customer = Session::customer(format!("customer-{n}"));
            place_standard(&engine, &customer).await
        });
    }

    let mut codes = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        let detail = joined.unwrap();
        assert!(detail.order.totals_balance());
        codes.push(detail.order.order_code);
    }
    codes.sort();
    codes.dedup();
    assert_eq!(codes.len(), RACERS);

    let report = engine
        .get_report(&Session::admin("admin-1"))
        .await
        .unwrap();
    assert_eq!(report.active_consignments, RACERS as i64);

    engine.close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_refunds_and_withdrawal_on_one_wallet_keep_the_ledger() {
    let file = FileDb::new();
    let engine = file.engine().await;
    let customer = Session::customer("customer-1");
    let picker = Session::picker("picker-1");
    seed_balance(&engine, "customer-1", 5_000).await;

    let mut bread_items = Vec::new();
    for _ in 0..4 {
        let placed = place_standard(&engine, &customer).await;
        engine.claim_for_picking(&picker, &placed.order.id).await.unwrap();
        bread_items.push(placed.items[0].id.clone());
    }

    let mut refunds = JoinSet::new();
    for item_id in bread_items {
        let engine = engine.clone();
        let picker = picker.clone();
        refunds.spawn(async move { engine.mark_item_missing(&picker, &item_id).await });
    }
    let withdrawal = {
        let engine = engine.clone();
        let customer = customer.clone();
        tokio::spawn(async move { engine.request_withdrawal(&customer).await })
    };

    while let Some(joined) = refunds.join_next().await {
        joined.unwrap().unwrap();
    }
    let withdrawal = withdrawal.await.unwrap().unwrap();

    // 5 000 seeded + 4 × 10 000 refunded, minus whatever the withdrawal swept
    let wallet = engine.database().wallet();
    let balance = wallet.balance("customer-1").await.unwrap();
    assert_eq!(balance, Money::from_cents(45_000) - withdrawal.amount());
    assert_eq!(balance, wallet.ledger_balance("customer-1").await.unwrap());

    let refund_count = wallet
        .transactions("customer-1", 100)
        .await
        .unwrap()
        .into_iter()
        .filter(|t| t.kind == TransactionKind::Refund)
        .count();
    assert_eq!(refund_count, 4);

    let audit = engine.audit_wallets(&Session::admin("admin-1")).await.unwrap();
    assert!(audit.iter().all(|c| c.is_consistent()));

    engine.close().await;
}
