//! # fulfil-db: Database Layer for Fulfil
//!
//! Durable storage for orders, items, wallets and withdrawals, on SQLite via
//! sqlx. Every state change the engine makes is one of the guarded writes or
//! atomic units of work in this crate.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Fulfil Data Flow                                 │
//! │                                                                         │
//! │  fulfil-engine (claim_for_picking, mark_item_missing, ...)             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     fulfil-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │               │    │  (embedded)  │  │   │
//! │  │   │               │    │ OrderRepo     │    │ 001_initial_ │  │   │
//! │  │   │ SqlitePool    │◄───│ WalletRepo    │    │   schema.sql │  │   │
//! │  │   │ busy_timeout  │    │ WithdrawalRepo│    │              │  │   │
//! │  │   │ WAL           │    │ ReportRepo    │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database                             │   │
//! │  │   <data dir>/fulfil.db   (or :memory: in tests)                │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use fulfil_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/fulfil.db")).await?;
//! let queue = db.orders().picking_queue(Some("picker-1"), 20).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::order::{DeliveryCompletion, ItemResolution, OrderRepository, StatusChange};
pub use repository::report::ReportRepository;
pub use repository::wallet::{BalanceCheck, LedgerEntry, WalletRepository};
pub use repository::withdrawal::{CreateOutcome, WithdrawalRepository};
