//! # fulfil-core: Pure Business Logic for Grocery Fulfilment
//!
//! This crate holds the rules of the fulfilment workflow as pure functions
//! with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Fulfil Architecture                               │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 Surrounding application                         │   │
//! │  │   shopper app ─ picker app ─ driver app ─ admin console         │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ Session + operation                    │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 fulfil-engine (orchestration)                   │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ fulfil-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │  ┌─────────┐ ┌─────────┐ ┌───────────┐ ┌──────────┐ ┌────────┐ │   │
//! │  │  │  money  │ │  fees   │ │ lifecycle │ │settlement│ │ report │ │   │
//! │  │  │ Money   │ │haversine│ │ OrderAct. │ │ driver % │ │ revenue│ │   │
//! │  │  │ Rate    │ │ quote   │ │ roles     │ │ withdraw │ │ admin  │ │   │
//! │  │  └─────────┘ └─────────┘ └───────────┘ └──────────┘ └────────┘ │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                  fulfil-db (Database Layer)                     │   │
//! │  │        SQLite, migrations, conditional writes, ledger           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Order, OrderItem, WalletTransaction, ...)
//! - [`money`] - Money and Rate with integer arithmetic
//! - [`fees`] - Haversine distance and travel fee
//! - [`checkout`] - Cart lines to frozen order totals
//! - [`lifecycle`] - Order transition table and role guards
//! - [`settlement`] - Driver share and withdrawal fee math
//! - [`report`] - Accounting report aggregation
//! - [`codes`] - Order codes, waybills, entity ids
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//!
//! ## Example Usage
//!
//! ```rust
//! use fulfil_core::fees::{DistanceKm, FeeSchedule};
//! use fulfil_core::settlement::WalletPolicy;
//!
//! let quote = FeeSchedule::default().quote_for_distance(DistanceKm::from_km(16.1));
//! assert_eq!(quote.travel_fee.to_string(), "R132.70");
//!
//! let split = WalletPolicy::default().split_delivery(quote.travel_fee);
//! assert_eq!(split.driver_earning.to_string(), "R92.89");
//! assert_eq!(split.platform_share.to_string(), "R39.81");
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod checkout;
pub mod codes;
pub mod error;
pub mod fees;
pub mod lifecycle;
pub mod money;
pub mod report;
pub mod settlement;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use checkout::{CartLine, OrderTotals};
pub use error::{CoreError, CoreResult, ValidationError};
pub use fees::{DistanceKm, FeeQuote, FeeSchedule};
pub use lifecycle::OrderAction;
pub use money::{Money, Rate};
pub use report::{AccountingReport, DeliveredFee, DeliveryEarning, DeliveryTotals};
pub use settlement::{DeliverySplit, WalletPolicy, WithdrawalQuote};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// South African VAT: 15%.
pub const DEFAULT_VAT_BPS: u32 = 1_500;

/// Driver share of the travel fee: 70%.
pub const DRIVER_SHARE_BPS: u32 = 7_000;

/// Withdrawal processing fee: 3%.
pub const WITHDRAWAL_FEE_BPS: u32 = 300;

/// Minimum withdrawable balance: R15.01.
pub const MIN_WITHDRAWAL_CENTS: i64 = 1_501;

/// Maximum lines in a single order
///
/// ## Business Reason
/// One picker gathers the whole order in one trip.
pub const MAX_ORDER_ITEMS: usize = 100;

/// Maximum quantity of a single line
///
/// ## Business Reason
/// Prevents accidental over-ordering (e.g., typing 1000 instead of 10)
pub const MAX_ITEM_QUANTITY: i64 = 999;
