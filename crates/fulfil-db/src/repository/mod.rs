//! # Repository Module
//!
//! Database repository implementations for the fulfilment store.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  fulfil-engine operation                                               │
//! │       │                                                                 │
//! │       │  db.orders().conditional_update_status(id, &change)            │
//! │       ▼                                                                 │
//! │  OrderRepository ─── WalletRepository ─── WithdrawalRepository         │
//! │       │                  ▲    (apply_entry shared inside                │
//! │       │                  │     order/withdrawal transactions)           │
//! │       ▼                  │                                              │
//! │  SQLite Database ◄───────┘                                              │
//! │                                                                         │
//! │  ReportRepository: read-only aggregates                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`order::OrderRepository`] - Orders, items, guarded transitions
//! - [`wallet::WalletRepository`] - Accounts and the append-only ledger
//! - [`withdrawal::WithdrawalRepository`] - Payout requests
//! - [`report::ReportRepository`] - Accounting aggregates

pub mod order;
pub mod report;
pub mod wallet;
pub mod withdrawal;
