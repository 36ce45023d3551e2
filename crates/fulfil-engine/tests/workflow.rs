//! End-to-end order lifecycle through the public engine API.

mod common;

use std::sync::Arc;

use fulfil_core::{
    Coordinates, ItemStatus, Money, OrderStatus, PaymentMethod, TransactionKind,
};
use fulfil_engine::{FulfilmentError, PlaceOrderRequest, Session};

use common::{engine, engine_with, packed_order, place_standard, standard_request};
use common::{FakeGateway, FakeLocation};

#[tokio::test]
async fn test_full_lifecycle_money_adds_up() {
    let engine = engine().await;
    let customer = Session::customer("customer-1");
    let picker = Session::picker("picker-1");
    let driver = Session::driver("driver-1");
    let admin = Session::admin("admin-1");

    let placed = place_standard(&engine, &customer).await;
    let order = &placed.order;

    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.subtotal(), Money::from_cents(20_000));
    assert_eq!(order.vat(), Money::from_cents(3_000));
    assert_eq!(order.travel_fee(), Money::from_cents(13_270));
    assert_eq!(order.total(), Money::from_cents(36_270));
    assert!(order.totals_balance());
    assert_eq!(order.distance_tenths, 161);
    assert!(order.order_code.starts_with("RSA-"));
    assert_eq!(order.waybill.len(), 14);
    assert_eq!(order.payment_reference.as_deref(), Some("AUTH-1-36270"));

    let claimed = engine.claim_for_picking(&picker, &order.id).await.unwrap();
    assert_eq!(claimed.status, OrderStatus::Gathering);
    assert_eq!(claimed.picker_id.as_deref(), Some("picker-1"));

    // Bread (4 × R25.00) is out of stock
    let bread = &placed.items[0];
    let missing = engine.mark_item_missing(&picker, &bread.id).await.unwrap();
    assert_eq!(missing.item.status, ItemStatus::Missing);
    let refund = missing.refund.expect("refund credited");
    assert_eq!(refund.amount(), Money::from_cents(10_000));
    assert_eq!(refund.user_id, "customer-1");

    let found = engine
        .mark_item_found(&picker, &placed.items[1].id)
        .await
        .unwrap();
    assert!(found.refund.is_none());

    let packed = engine.pack_order(&picker, &order.id).await.unwrap();
    assert_eq!(packed.status, OrderStatus::Packed);
    assert!(packed.packed_at.is_some());

    let in_transit = engine.claim_for_delivery(&driver, &order.id).await.unwrap();
    assert_eq!(in_transit.driver_id.as_deref(), Some("driver-1"));

    let done = engine.complete_delivery(&driver, &order.id).await.unwrap();
    assert_eq!(done.order.status, OrderStatus::Delivered);
    assert!(done.order.delivered_at.is_some());
    assert_eq!(done.earning.amount(), Money::from_cents(9_289));

    // Frozen totals never moved
    assert_eq!(done.order.total(), Money::from_cents(36_270));

    let customer_wallet = engine.wallet_overview(&customer, "customer-1").await.unwrap();
    assert_eq!(customer_wallet.account.balance(), Money::from_cents(10_000));

    let driver_wallet = engine.wallet_overview(&driver, "driver-1").await.unwrap();
    assert_eq!(driver_wallet.account.balance(), Money::from_cents(9_289));
    assert_eq!(driver_wallet.transactions[0].kind, TransactionKind::Earning);

    let report = engine.get_report(&admin).await.unwrap();
    assert_eq!(report.lifetime_platform_revenue, Money::from_cents(3_981));
    assert_eq!(report.today_platform_revenue, Money::from_cents(3_981));
    assert_eq!(report.lifetime_travel_fees, Money::from_cents(13_270));
    assert_eq!(report.delivered_orders, 1);
    assert_eq!(report.active_consignments, 0);

    let earnings = engine.recent_deliveries(&admin, 10).await.unwrap();
    assert_eq!(earnings.len(), 1);
    assert_eq!(earnings[0].driver_earning + earnings[0].platform_share, earnings[0].travel_fee);

    let audit = engine.audit_wallets(&admin).await.unwrap();
    assert_eq!(audit.len(), 2);
    assert!(audit.iter().all(|c| c.is_consistent()));
}

#[tokio::test]
async fn test_statuses_cannot_be_skipped() {
    let engine = engine().await;
    let customer = Session::customer("customer-1");
    let picker = Session::picker("picker-1");
    let driver = Session::driver("driver-1");

    let placed = place_standard(&engine, &customer).await;
    let id = &placed.order.id;

    assert!(matches!(
        engine.pack_order(&picker, id).await,
        Err(FulfilmentError::InvalidTransition {
            from: OrderStatus::Pending,
            to: OrderStatus::Packed
        })
    ));
    assert!(matches!(
        engine.claim_for_delivery(&driver, id).await,
        Err(FulfilmentError::InvalidTransition { .. })
    ));
    assert!(matches!(
        engine.complete_delivery(&driver, id).await,
        Err(FulfilmentError::InvalidTransition { .. })
    ));

    // Nothing moved
    let detail = engine.get_order(&customer, id).await.unwrap();
    assert_eq!(detail.order.status, OrderStatus::Pending);
}

#[tokio::test]
async fn test_pack_requires_every_item_resolved() {
    let engine = engine().await;
    let customer = Session::customer("customer-1");
    let picker = Session::picker("picker-1");

    let placed = place_standard(&engine, &customer).await;
    engine.claim_for_picking(&picker, &placed.order.id).await.unwrap();
    engine
        .mark_item_found(&picker, &placed.items[0].id)
        .await
        .unwrap();

    let err = engine.pack_order(&picker, &placed.order.id).await.unwrap_err();
    assert!(matches!(err, FulfilmentError::UnresolvedItems { pending: 1, .. }));
}

#[tokio::test]
async fn test_marking_missing_twice_refunds_once() {
    let engine = engine().await;
    let customer = Session::customer("customer-1");
    let picker = Session::picker("picker-1");

    let placed = place_standard(&engine, &customer).await;
    engine.claim_for_picking(&picker, &placed.order.id).await.unwrap();

    let milk = &placed.items[1];
    engine.mark_item_missing(&picker, &milk.id).await.unwrap();

    let again = engine.mark_item_missing(&picker, &milk.id).await;
    assert!(matches!(
        again,
        Err(FulfilmentError::DuplicateResolution {
            status: ItemStatus::Missing,
            ..
        })
    ));
    let flipped = engine.mark_item_found(&picker, &milk.id).await;
    assert!(matches!(flipped, Err(FulfilmentError::DuplicateResolution { .. })));

    let refunds: Vec<_> = engine
        .database()
        .wallet()
        .transactions_for_order(&placed.order.id)
        .await
        .unwrap()
        .into_iter()
        .filter(|t| t.kind == TransactionKind::Refund)
        .collect();
    assert_eq!(refunds.len(), 1);
    assert_eq!(refunds[0].amount(), Money::from_cents(10_000));

    let balance = engine.database().wallet().balance("customer-1").await.unwrap();
    assert_eq!(balance, Money::from_cents(10_000));
}

#[tokio::test]
async fn test_items_locked_outside_gathering() {
    let engine = engine().await;
    let customer = Session::customer("customer-1");
    let picker = Session::picker("picker-1");

    let placed = place_standard(&engine, &customer).await;

    let err = engine
        .mark_item_missing(&picker, &placed.items[0].id)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        FulfilmentError::ItemLocked {
            order_status: OrderStatus::Pending,
            ..
        }
    ));
    assert_eq!(
        engine.database().wallet().balance("customer-1").await.unwrap(),
        Money::zero()
    );
}

#[tokio::test]
async fn test_other_picker_is_kept_out() {
    let engine = engine().await;
    let customer = Session::customer("customer-1");
    let alice = Session::picker("picker-alice");
    let bob = Session::picker("picker-bob");

    let placed = place_standard(&engine, &customer).await;
    engine.claim_for_picking(&alice, &placed.order.id).await.unwrap();

    assert!(matches!(
        engine.claim_for_picking(&bob, &placed.order.id).await,
        Err(FulfilmentError::ClaimConflict { .. })
    ));
    assert!(matches!(
        engine.mark_item_found(&bob, &placed.items[0].id).await,
        Err(FulfilmentError::Forbidden { .. })
    ));

    // Repeating one's own claim is harmless
    let again = engine.claim_for_picking(&alice, &placed.order.id).await.unwrap();
    assert_eq!(again.picker_id.as_deref(), Some("picker-alice"));

    // Admins may step in on any order
    let admin = Session::admin("admin-1");
    for item in &placed.items {
        engine.mark_item_found(&admin, &item.id).await.unwrap();
    }
    assert!(matches!(
        engine.pack_order(&bob, &placed.order.id).await,
        Err(FulfilmentError::Forbidden { .. })
    ));
    engine.pack_order(&admin, &placed.order.id).await.unwrap();
}

#[tokio::test]
async fn test_roles_are_enforced() {
    let engine = engine().await;
    let customer = Session::customer("customer-1");
    let driver = Session::driver("driver-1");
    let picker = Session::picker("picker-1");

    assert!(matches!(
        engine.place_order(&picker, standard_request()).await,
        Err(FulfilmentError::Forbidden { .. })
    ));

    let placed = place_standard(&engine, &customer).await;
    assert!(matches!(
        engine.claim_for_picking(&driver, &placed.order.id).await,
        Err(FulfilmentError::Forbidden { .. })
    ));
    assert!(matches!(
        engine.claim_for_delivery(&picker, &placed.order.id).await,
        Err(FulfilmentError::Forbidden { .. })
    ));
    assert!(matches!(
        engine.get_report(&customer).await,
        Err(FulfilmentError::Forbidden { .. })
    ));
    assert!(matches!(
        engine.picking_queue(&customer).await,
        Err(FulfilmentError::Forbidden { .. })
    ));
}

#[tokio::test]
async fn test_cancel_rules() {
    let engine = engine().await;
    let customer = Session::customer("customer-1");
    let stranger = Session::customer("customer-2");
    let picker = Session::picker("picker-1");

    let placed = place_standard(&engine, &customer).await;
    assert!(matches!(
        engine.cancel_order(&stranger, &placed.order.id).await,
        Err(FulfilmentError::Forbidden { .. })
    ));

    let cancelled = engine.cancel_order(&customer, &placed.order.id).await.unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert!(cancelled.cancelled_at.is_some());

    assert!(matches!(
        engine.cancel_order(&customer, &placed.order.id).await,
        Err(FulfilmentError::InvalidTransition { .. })
    ));
    assert!(matches!(
        engine.claim_for_picking(&picker, &placed.order.id).await,
        Err(FulfilmentError::InvalidTransition { .. })
    ));

    // Admin cancels a gathering order; packed orders can no longer be cancelled
    let admin = Session::admin("admin-1");
    let second = place_standard(&engine, &customer).await;
    engine.claim_for_picking(&picker, &second.order.id).await.unwrap();
    engine.cancel_order(&admin, &second.order.id).await.unwrap();

    let third = packed_order(&engine, &customer, &picker).await;
    assert!(matches!(
        engine.cancel_order(&admin, &third.order.id).await,
        Err(FulfilmentError::InvalidTransition {
            from: OrderStatus::Packed,
            to: OrderStatus::Cancelled
        })
    ));
}

#[tokio::test]
async fn test_declined_payment_leaves_no_order() {
    let gateway = Arc::new(FakeGateway::declining());
    let engine = engine_with(Arc::new(FakeLocation(None)), gateway.clone()).await;
    let customer = Session::customer("customer-1");

    let err = engine
        .place_order(&customer, standard_request())
        .await
        .unwrap_err();
    assert!(matches!(err, FulfilmentError::PaymentDeclined(_)));
    assert_eq!(gateway.calls.load(std::sync::atomic::Ordering::SeqCst), 1);

    let history = engine.get_order_history(&customer, "customer-1").await.unwrap();
    assert!(history.is_empty());
    assert!(gateway.voided.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_unstored_order_voids_its_authorization() {
    let gateway = Arc::new(FakeGateway::default());
    let engine = engine_with(Arc::new(FakeLocation(None)), gateway.clone()).await;
    let customer = Session::customer("customer-1");

    // Authorization succeeds, the insert cannot
    engine.close().await;
    let err = engine
        .place_order(&customer, standard_request())
        .await
        .unwrap_err();
    assert!(matches!(err, FulfilmentError::Database(_)));

    assert_eq!(gateway.calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    assert_eq!(*gateway.voided.lock().unwrap(), vec!["AUTH-1-36270".to_string()]);
}

#[tokio::test]
async fn test_location_fallbacks() {
    let customer = Session::customer("customer-1");

    // No provider fix and no fallback
    let engine = engine().await;
    let request = PlaceOrderRequest {
        fallback_distance_km: None,
        ..standard_request()
    };
    assert!(matches!(
        engine.place_order(&customer, request).await,
        Err(FulfilmentError::LocationUnavailable(_))
    ));

    // Provider fix wins over the fallback
    let east = Coordinates::new(-25.1530, 29.2090);
    let engine = engine_with(
        Arc::new(FakeLocation(Some(east))),
        Arc::new(FakeGateway::default()),
    )
    .await;
    let placed = engine.place_order(&customer, standard_request()).await.unwrap();
    let quote = engine.quote_fee(east);
    assert_eq!(placed.order.distance_tenths, quote.distance.tenths());
    assert_eq!(placed.order.travel_fee(), quote.travel_fee);
    assert_eq!(placed.order.delivery_lat, Some(east.lat));

    // Explicit coordinates skip the provider entirely
    let request = standard_request().with_coordinates(Coordinates::new(-25.1530, 29.0500));
    let at_hub = engine.place_order(&customer, request).await.unwrap();
    assert_eq!(at_hub.order.distance_tenths, 0);
    assert_eq!(at_hub.order.travel_fee(), Money::from_cents(2_000));
}

#[tokio::test]
async fn test_invalid_checkout_is_rejected() {
    let engine = engine().await;
    let customer = Session::customer("customer-1");

    let empty = PlaceOrderRequest::new(Vec::new(), "12 Main Rd", PaymentMethod::Eft)
        .with_fallback_distance(5.0);
    assert!(matches!(
        engine.place_order(&customer, empty).await,
        Err(FulfilmentError::Validation(_))
    ));

    let no_address = PlaceOrderRequest {
        delivery_address: "   ".into(),
        ..standard_request()
    };
    assert!(matches!(
        engine.place_order(&customer, no_address).await,
        Err(FulfilmentError::Validation(_))
    ));
}

#[tokio::test]
async fn test_order_history_visibility() {
    let engine = engine().await;
    let customer = Session::customer("customer-1");
    let other = Session::customer("customer-2");
    let admin = Session::admin("admin-1");

    let first = place_standard(&engine, &customer).await;
    let second = place_standard(&engine, &customer).await;

    let history = engine.get_order_history(&customer, "customer-1").await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].order.id, second.order.id);
    assert_eq!(history[1].order.id, first.order.id);
    assert_eq!(history[0].items.len(), 2);

    assert!(matches!(
        engine.get_order_history(&other, "customer-1").await,
        Err(FulfilmentError::Forbidden { .. })
    ));
    assert!(matches!(
        engine.get_order(&other, &first.order.id).await,
        Err(FulfilmentError::NotFound { .. })
    ));
    assert_eq!(
        engine
            .get_order_history(&admin, "customer-1")
            .await
            .unwrap()
            .len(),
        2
    );
}

#[tokio::test]
async fn test_queues_follow_the_lifecycle() {
    let engine = engine().await;
    let customer = Session::customer("customer-1");
    let picker = Session::picker("picker-1");
    let driver = Session::driver("driver-1");

    let waiting = place_standard(&engine, &customer).await;
    let packed = packed_order(&engine, &customer, &picker).await;

    let queue = engine.picking_queue(&picker).await.unwrap();
    assert_eq!(queue.len(), 1);
    assert_eq!(queue[0].order.id, waiting.order.id);

    let deliveries = engine.delivery_queue(&driver).await.unwrap();
    assert_eq!(deliveries.len(), 1);
    assert_eq!(deliveries[0].order.id, packed.order.id);

    engine.claim_for_delivery(&driver, &packed.order.id).await.unwrap();
    assert!(engine.delivery_queue(&driver).await.unwrap().is_empty());

    let route = engine.active_route(&driver).await.unwrap();
    assert_eq!(route.len(), 1);
    assert!(engine
        .active_route(&Session::driver("driver-2"))
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_completing_twice_pays_once() {
    let engine = engine().await;
    let customer = Session::customer("customer-1");
    let picker = Session::picker("picker-1");
    let driver = Session::driver("driver-1");
    let rival = Session::driver("driver-2");

    let placed = packed_order(&engine, &customer, &picker).await;
    engine.claim_for_delivery(&driver, &placed.order.id).await.unwrap();

    assert!(matches!(
        engine.claim_for_delivery(&rival, &placed.order.id).await,
        Err(FulfilmentError::ClaimConflict { .. })
    ));
    assert!(matches!(
        engine.complete_delivery(&rival, &placed.order.id).await,
        Err(FulfilmentError::Forbidden { .. })
    ));

    let first = engine.complete_delivery(&driver, &placed.order.id).await.unwrap();
    let second = engine.complete_delivery(&driver, &placed.order.id).await.unwrap();
    assert_eq!(first.earning.id, second.earning.id);

    let balance = engine.database().wallet().balance("driver-1").await.unwrap();
    assert_eq!(balance, Money::from_cents(9_289));
}
