//! # Fulfil Demo
//!
//! Walks one order through the whole lifecycle against an in-memory
//! database (or the configured one) and prints the resulting wallets and
//! accounting report.
//!
//! ```text
//! cargo run --bin fulfil-demo                  # defaults, in-memory
//! cargo run --bin fulfil-demo -- engine.toml   # custom config
//! RUST_LOG=fulfil_engine=debug cargo run --bin fulfil-demo
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;
use tracing_subscriber::EnvFilter;

use fulfil_core::{CartLine, Coordinates, Money, PaymentMethod};
use fulfil_engine::config::MEMORY_DATABASE;
use fulfil_engine::{
    CollaboratorError, EngineConfig, FulfilmentEngine, LocationProvider, PaymentAuthorization,
    PaymentGateway, PlaceOrderRequest, Session,
};

/// Every address resolves to the same point, 16 km east of the hub.
struct FixedLocation(Coordinates);

#[async_trait]
impl LocationProvider for FixedLocation {
    async fn resolve_coordinates(&self, _address: &str) -> Result<Coordinates, CollaboratorError> {
        Ok(self.0)
    }
}

/// Approves everything with a sequential reference.
struct ApproveAll;

#[async_trait]
impl PaymentGateway for ApproveAll {
    async fn authorize(
        &self,
        amount: Money,
        method: PaymentMethod,
    ) -> Result<PaymentAuthorization, CollaboratorError> {
        Ok(PaymentAuthorization {
            reference: format!("DEMO-{}-{}", method.as_str().to_uppercase(), amount.cents()),
        })
    }

    async fn void(&self, authorization: &PaymentAuthorization) -> Result<(), CollaboratorError> {
        info!(reference = %authorization.reference, "Authorization voided");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    let mut config = EngineConfig::load(std::env::args().nth(1).map(PathBuf::from))?;
    if config.database.path.is_none() {
        config.database.path = Some(PathBuf::from(MEMORY_DATABASE));
    }

    let engine = FulfilmentEngine::open(
        &config,
        Arc::new(FixedLocation(Coordinates::new(-25.1530, 29.2090))),
        Arc::new(ApproveAll),
    )
    .await?;

    let customer = Session::customer("customer-1");
    let picker = Session::picker("picker-1");
    let driver = Session::driver("driver-1");
    let admin = Session::admin("admin-1");

    let request = PlaceOrderRequest::new(
        vec![
            CartLine::new("p-bread", "White bread 700g", "store-1", 4, Money::from_cents(2_500)),
            CartLine::new("p-milk", "Full cream milk 2L", "store-1", 2, Money::from_cents(5_000)),
        ],
        "12 Voortrekker St, Mokopane",
        PaymentMethod::Card,
    )
    .with_recipient("Thandi", "0821234567");

    let placed = engine.place_order(&customer, request).await?;
    let order_id = placed.order.id.clone();
    info!(
        order_code = %placed.order.order_code,
        total = %placed.order.total(),
        "Placed"
    );

    engine.claim_for_picking(&picker, &order_id).await?;
    let (first, rest) = placed
        .items
        .split_first()
        .ok_or("order has no items")?;
    engine.mark_item_missing(&picker, &first.id).await?;
    for item in rest {
        engine.mark_item_found(&picker, &item.id).await?;
    }
    engine.pack_order(&picker, &order_id).await?;

    engine.claim_for_delivery(&driver, &order_id).await?;
    engine.complete_delivery(&driver, &order_id).await?;

    let withdrawal = engine
        .request_withdrawal(&driver.clone().with_idempotency_key("demo-payout-1"))
        .await?;
    engine.approve_withdrawal(&admin, &withdrawal.id).await?;

    for user in [customer.user_id(), driver.user_id()] {
        let overview = engine.wallet_overview(&admin, user).await?;
        println!("{}: balance {}", user, overview.account.balance());
        for txn in &overview.transactions {
            println!("  {:>10}  {}", txn.amount().to_string(), txn.description);
        }
    }

    let report = engine.get_report(&admin).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    engine.close().await;
    Ok(())
}
