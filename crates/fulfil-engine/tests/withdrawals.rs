//! Withdrawal requests and their settlement.

mod common;

use fulfil_core::{Money, TransactionKind, WithdrawalStatus};
use fulfil_engine::{FulfilmentError, Session};

use common::{engine, seed_balance};

#[tokio::test]
async fn test_withdrawal_of_fifty_rand() {
    let engine = engine().await;
    let driver = Session::driver("driver-1");
    let admin = Session::admin("admin-1");
    seed_balance(&engine, "driver-1", 5_000).await;

    let request = engine.request_withdrawal(&driver).await.unwrap();
    assert_eq!(request.amount(), Money::from_cents(5_000));
    assert_eq!(request.fee(), Money::from_cents(150));
    assert_eq!(request.net_payout(), Money::from_cents(4_850));
    assert_eq!(request.status, WithdrawalStatus::Pending);

    let overview = engine.wallet_overview(&driver, "driver-1").await.unwrap();
    assert_eq!(overview.account.balance(), Money::zero());
    assert_eq!(overview.withdrawals.len(), 1);
    assert_eq!(overview.transactions[0].kind, TransactionKind::WithdrawalDebit);
    assert_eq!(overview.transactions[0].amount(), Money::from_cents(-5_000));

    let pending = engine
        .list_withdrawals(&admin, Some(WithdrawalStatus::Pending))
        .await
        .unwrap();
    assert_eq!(pending.len(), 1);

    // The whole balance went out; a second request has nothing to draw on
    assert!(matches!(
        engine.request_withdrawal(&driver).await,
        Err(FulfilmentError::InsufficientBalance { .. })
    ));
}

#[tokio::test]
async fn test_below_minimum_creates_nothing() {
    let engine = engine().await;
    let driver = Session::driver("driver-1");
    let admin = Session::admin("admin-1");
    seed_balance(&engine, "driver-1", 1_500).await;

    let err = engine.request_withdrawal(&driver).await.unwrap_err();
    match err {
        FulfilmentError::InsufficientBalance { balance, minimum } => {
            assert_eq!(balance, Money::from_cents(1_500));
            assert_eq!(minimum, Money::from_cents(1_501));
        }
        other => panic!("expected InsufficientBalance, got {other:?}"),
    }

    assert!(engine.list_withdrawals(&admin, None).await.unwrap().is_empty());
    assert_eq!(
        engine.database().wallet().balance("driver-1").await.unwrap(),
        Money::from_cents(1_500)
    );
}

#[tokio::test]
async fn test_minimum_is_inclusive() {
    let engine = engine().await;
    let driver = Session::driver("driver-1");
    seed_balance(&engine, "driver-1", 1_501).await;

    let request = engine.request_withdrawal(&driver).await.unwrap();
    // 3% of R15.01 = 45.03c → 45c
    assert_eq!(request.fee(), Money::from_cents(45));
    assert_eq!(request.net_payout(), Money::from_cents(1_456));
}

#[tokio::test]
async fn test_idempotency_key_returns_original() {
    let engine = engine().await;
    let driver = Session::driver("driver-1").with_idempotency_key("payout-2024-06");
    seed_balance(&engine, "driver-1", 8_000).await;

    let first = engine.request_withdrawal(&driver).await.unwrap();

    // Money arrives after the first request; a retry must not sweep it
    seed_balance(&engine, "driver-1", 3_000).await;
    let retried = engine.request_withdrawal(&driver).await.unwrap();

    assert_eq!(first.id, retried.id);
    assert_eq!(retried.amount(), Money::from_cents(8_000));
    assert_eq!(
        engine.database().wallet().balance("driver-1").await.unwrap(),
        Money::from_cents(3_000)
    );

    let debits = engine
        .wallet_overview(&driver, "driver-1")
        .await
        .unwrap()
        .transactions
        .into_iter()
        .filter(|t| t.kind == TransactionKind::WithdrawalDebit)
        .count();
    assert_eq!(debits, 1);
}

#[tokio::test]
async fn test_approve_marks_paid_and_feeds_report() {
    let engine = engine().await;
    let driver = Session::driver("driver-1");
    let admin = Session::admin("admin-1");
    seed_balance(&engine, "driver-1", 5_000).await;

    let request = engine.request_withdrawal(&driver).await.unwrap();

    assert!(matches!(
        engine.approve_withdrawal(&driver, &request.id).await,
        Err(FulfilmentError::Forbidden { .. })
    ));

    let paid = engine.approve_withdrawal(&admin, &request.id).await.unwrap();
    assert_eq!(paid.status, WithdrawalStatus::Paid);
    assert_eq!(paid.processed_by.as_deref(), Some("admin-1"));
    assert!(paid.processed_at.is_some());
    // Frozen amounts
    assert_eq!(paid.fee(), Money::from_cents(150));

    let report = engine.get_report(&admin).await.unwrap();
    assert_eq!(report.admin_fees, Money::from_cents(150));

    assert!(matches!(
        engine.approve_withdrawal(&admin, &request.id).await,
        Err(FulfilmentError::InvalidWithdrawalTransition {
            from: WithdrawalStatus::Paid,
            ..
        })
    ));
    assert!(matches!(
        engine.reject_withdrawal(&admin, &request.id).await,
        Err(FulfilmentError::InvalidWithdrawalTransition { .. })
    ));
}

#[tokio::test]
async fn test_reject_restores_balance() {
    let engine = engine().await;
    let driver = Session::driver("driver-1");
    let admin = Session::admin("admin-1");
    seed_balance(&engine, "driver-1", 5_000).await;

    let request = engine.request_withdrawal(&driver).await.unwrap();
    let rejected = engine.reject_withdrawal(&admin, &request.id).await.unwrap();
    assert_eq!(rejected.status, WithdrawalStatus::Rejected);

    let overview = engine.wallet_overview(&driver, "driver-1").await.unwrap();
    assert_eq!(overview.account.balance(), Money::from_cents(5_000));
    assert_eq!(overview.transactions[0].kind, TransactionKind::Reversal);

    // Rejected fees are not revenue
    let report = engine.get_report(&admin).await.unwrap();
    assert_eq!(report.admin_fees, Money::zero());

    assert!(matches!(
        engine.reject_withdrawal(&admin, &request.id).await,
        Err(FulfilmentError::InvalidWithdrawalTransition { .. })
    ));

    let audit = engine.audit_wallets(&admin).await.unwrap();
    assert!(audit.iter().all(|c| c.is_consistent()));

    // The restored balance can be withdrawn again
    let again = engine.request_withdrawal(&driver).await.unwrap();
    assert_ne!(again.id, request.id);
}

#[tokio::test]
async fn test_unknown_withdrawal() {
    let engine = engine().await;
    let admin = Session::admin("admin-1");

    assert!(matches!(
        engine.approve_withdrawal(&admin, "no-such-id").await,
        Err(FulfilmentError::NotFound { .. })
    ));
}

#[tokio::test]
async fn test_wallet_privacy() {
    let engine = engine().await;
    let driver = Session::driver("driver-1");
    let admin = Session::admin("admin-1");
    seed_balance(&engine, "driver-1", 2_000).await;
    seed_balance(&engine, "driver-2", 9_000).await;

    assert!(matches!(
        engine.wallet_overview(&driver, "driver-2").await,
        Err(FulfilmentError::Forbidden { .. })
    ));
    assert!(matches!(
        engine.list_wallets(&driver).await,
        Err(FulfilmentError::Forbidden { .. })
    ));

    let wallets = engine.list_wallets(&admin).await.unwrap();
    assert_eq!(wallets.len(), 2);
    assert_eq!(wallets[0].user_id, "driver-2");
}
