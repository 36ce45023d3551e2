//! Shared fixtures for the engine integration tests.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;

use fulfil_core::codes::new_entity_id;
use fulfil_core::{CartLine, Coordinates, Money, OrderDetail, PaymentMethod, TransactionKind};
use fulfil_db::LedgerEntry;
use fulfil_engine::config::MEMORY_DATABASE;
use fulfil_engine::{
    CollaboratorError, EngineConfig, FulfilmentEngine, LocationProvider, PaymentAuthorization,
    PaymentGateway, PlaceOrderRequest, Session,
};

// =============================================================================
// Fake Collaborators
// =============================================================================

/// Resolves every address to `Some(coordinates)`, or fails when `None`.
pub struct FakeLocation(pub Option<Coordinates>);

#[async_trait]
impl LocationProvider for FakeLocation {
    async fn resolve_coordinates(&self, _address: &str) -> Result<Coordinates, CollaboratorError> {
        self.0
            .ok_or_else(|| CollaboratorError::Unavailable("no GPS fix".into()))
    }
}

/// Approves (or declines) every authorization, counts the calls and records
/// voided references.
#[derive(Default)]
pub struct FakeGateway {
    pub decline: bool,
    pub calls: AtomicU32,
    pub voided: Mutex<Vec<String>>,
}

impl FakeGateway {
    pub fn declining() -> Self {
        FakeGateway {
            decline: true,
            ..FakeGateway::default()
        }
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn authorize(
        &self,
        amount: Money,
        _method: PaymentMethod,
    ) -> Result<PaymentAuthorization, CollaboratorError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.decline {
            Err(CollaboratorError::Declined("insufficient funds".into()))
        } else {
            Ok(PaymentAuthorization {
                reference: format!("AUTH-{}-{}", n, amount.cents()),
            })
        }
    }

    async fn void(&self, authorization: &PaymentAuthorization) -> Result<(), CollaboratorError> {
        self.voided
            .lock()
            .unwrap()
            .push(authorization.reference.clone());
        Ok(())
    }
}

// =============================================================================
// Engine Builders
// =============================================================================

fn memory_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.database.path = Some(PathBuf::from(MEMORY_DATABASE));
    config
}

/// Engine over a fresh in-memory database; the location provider always fails.
pub async fn engine() -> FulfilmentEngine {
    engine_with(Arc::new(FakeLocation(None)), Arc::new(FakeGateway::default())).await
}

pub async fn engine_with(
    location: Arc<dyn LocationProvider>,
    payments: Arc<dyn PaymentGateway>,
) -> FulfilmentEngine {
    FulfilmentEngine::open(&memory_config(), location, payments)
        .await
        .expect("engine opens")
}

/// A database file shared by several pooled connections.
pub struct FileDb {
    pub path: PathBuf,
}

impl FileDb {
    pub fn new() -> Self {
        FileDb {
            path: std::env::temp_dir().join(format!("fulfil-test-{}.db", new_entity_id())),
        }
    }

    pub async fn engine(&self) -> FulfilmentEngine {
        let mut config = EngineConfig::default();
        config.database.path = Some(self.path.clone());
        config.database.max_connections = 8;
        config.retry.initial_backoff_ms = 5;
        config.retry.max_backoff_ms = 50;
        config.retry.max_attempts = 10;

        FulfilmentEngine::open(
            &config,
            Arc::new(FakeLocation(None)),
            Arc::new(FakeGateway::default()),
        )
        .await
        .expect("engine opens")
    }
}

impl Drop for FileDb {
    fn drop(&mut self) {
        for suffix in ["", "-wal", "-shm"] {
            let mut file = self.path.clone().into_os_string();
            file.push(suffix);
            let _ = std::fs::remove_file(file);
        }
    }
}

// =============================================================================
// Orders
// =============================================================================

/// 4 × R25.00 bread + 2 × R50.00 milk = R200.00, delivered 16.1 km away.
pub fn standard_request() -> PlaceOrderRequest {
    PlaceOrderRequest::new(
        vec![
            CartLine::new("p-bread", "White bread", "store-1", 4, Money::from_cents(2_500)),
            CartLine::new("p-milk", "Milk 2L", "store-1", 2, Money::from_cents(5_000)),
        ],
        "12 Voortrekker St, Mokopane",
        PaymentMethod::Card,
    )
    .with_fallback_distance(16.1)
    .with_recipient("Thandi", "0821234567")
}

pub async fn place_standard(engine: &FulfilmentEngine, customer: &Session) -> OrderDetail {
    engine
        .place_order(customer, standard_request())
        .await
        .expect("order placed")
}

/// Places an order and takes it all the way to `packed`.
pub async fn packed_order(
    engine: &FulfilmentEngine,
    customer: &Session,
    picker: &Session,
) -> OrderDetail {
    let placed = place_standard(engine, customer).await;
    engine
        .claim_for_picking(picker, &placed.order.id)
        .await
        .expect("claimed");
    for item in &placed.items {
        engine
            .mark_item_found(picker, &item.id)
            .await
            .expect("found");
    }
    engine
        .pack_order(picker, &placed.order.id)
        .await
        .expect("packed");
    placed
}

/// Credits `cents` straight into a wallet.
pub async fn seed_balance(engine: &FulfilmentEngine, user_id: &str, cents: i64) {
    let entry = LedgerEntry::new(
        user_id,
        TransactionKind::Earning,
        Money::from_cents(cents),
        "Opening balance",
        Utc::now(),
    );
    engine
        .database()
        .wallet()
        .credit(&entry)
        .await
        .expect("seeded");
}
