//! # fulfil-engine: Fulfilment Operations
//!
//! The operations customers, pickers, drivers and admins perform, each taking
//! an explicit [`Session`]. Rules come from `fulfil-core`; every state change
//! is a single guarded write or transaction in `fulfil-db`.
//!
//! ## Order Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  place_order ──► pending ──► gathering ──► packed ──► in_transit ──► delivered
//! │   (customer)        │   claim_for   │  pack_order  claim_for   complete_
//! │                     │   _picking    │   (picker)   _delivery   delivery │
//! │                     │   (picker)    │              (driver)    (driver) │
//! │                     │               │                              │    │
//! │                     └──► cancelled ◄┘                   driver earning  │
//! │                       cancel_order                       credited       │
//! │                   (customer / admin)                                    │
//! │                                                                         │
//! │  While gathering: mark_item_found / mark_item_missing                  │
//! │                   (missing → refund credited to the customer)          │
//! │                                                                         │
//! │  Wallet: request_withdrawal ──► pending ──► paid      (approve)        │
//! │                                        └──► rejected  (reject, reversal)│
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`ordering`] - place, cancel, view orders
//! - [`picking`] - claim, resolve items, pack
//! - [`delivery`] - claim, deliver, driver views
//! - [`wallet`] - balances, ledger, audit
//! - [`withdrawal`] - request and settle withdrawals
//! - [`reporting`] - accounting report, recent earnings
//!
//! ## Usage
//! ```rust,ignore
//! let engine = FulfilmentEngine::open(&EngineConfig::load(None)?, location, payments).await?;
//! let order = engine.place_order(&Session::customer("c-1"), request).await?;
//! engine.claim_for_picking(&Session::picker("p-1"), &order.order.id).await?;
//! ```

pub mod collaborators;
pub mod config;
pub mod delivery;
pub mod error;
pub mod ordering;
pub mod picking;
pub mod reporting;
pub mod retry;
pub mod session;
pub mod wallet;
pub mod withdrawal;

use std::sync::Arc;

use fulfil_core::{Coordinates, FeeQuote, FeeSchedule, Rate, WalletPolicy};
use fulfil_db::Database;
use tracing::info;

pub use collaborators::{
    CollaboratorError, LocationProvider, NoGeocoding, PaymentAuthorization, PaymentGateway,
};
pub use config::EngineConfig;
pub use error::{EngineResult, ErrorBody, ErrorCode, FulfilmentError};
pub use ordering::PlaceOrderRequest;
pub use retry::RetryPolicy;
pub use session::Session;
pub use wallet::WalletOverview;

// Result types callers receive from the storage layer
pub use fulfil_db::{BalanceCheck, DeliveryCompletion, ItemResolution};

/// Page size for queue and history views.
pub const DEFAULT_LIST_LIMIT: u32 = 100;

/// Entry point for every fulfilment operation.
///
/// Cheap to clone; clones share the pool and collaborators.
#[derive(Clone)]
pub struct FulfilmentEngine {
    db: Database,
    fees: FeeSchedule,
    vat_rate: Rate,
    policy: WalletPolicy,
    retry: RetryPolicy,
    location: Arc<dyn LocationProvider>,
    payments: Arc<dyn PaymentGateway>,
}

impl FulfilmentEngine {
    /// Builds an engine over an already-open database.
    pub fn new(
        db: Database,
        config: &EngineConfig,
        location: Arc<dyn LocationProvider>,
        payments: Arc<dyn PaymentGateway>,
    ) -> Self {
        FulfilmentEngine {
            db,
            fees: config.fee_schedule(),
            vat_rate: config.vat_rate(),
            policy: config.wallet_policy(),
            retry: config.retry_policy(),
            location,
            payments,
        }
    }

    /// Validates `config`, opens the database (running migrations) and builds
    /// the engine.
    pub async fn open(
        config: &EngineConfig,
        location: Arc<dyn LocationProvider>,
        payments: Arc<dyn PaymentGateway>,
    ) -> EngineResult<Self> {
        config.validate()?;
        let db = Database::new(config.db_config()).await?;
        info!(
            base_fee = %config.fee_schedule().base_fee,
            per_km_fee = %config.fee_schedule().per_km_fee,
            "Fulfilment engine ready"
        );
        Ok(Self::new(db, config, location, payments))
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn fee_schedule(&self) -> &FeeSchedule {
        &self.fees
    }

    pub fn wallet_policy(&self) -> &WalletPolicy {
        &self.policy
    }

    /// Travel fee from the hub to `destination`, as a checkout would show it.
    pub fn quote_fee(&self, destination: Coordinates) -> FeeQuote {
        self.fees.quote(destination)
    }

    pub async fn close(&self) {
        self.db.close().await;
    }
}

impl std::fmt::Debug for FulfilmentEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FulfilmentEngine")
            .field("fees", &self.fees)
            .field("vat_rate", &self.vat_rate)
            .field("policy", &self.policy)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}
