//! # Error Types
//!
//! Domain-specific error types for fulfil-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  fulfil-core errors (this file)                                        │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  fulfil-db errors (separate crate)                                     │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  fulfil-engine errors                                                  │
//! │  └── FulfilmentError  - What callers see (typed + serializable code)   │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → FulfilmentError → Caller          │
//! │                          DbError   ──┘                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use crate::money::Money;
use crate::types::{ItemStatus, OrderStatus, Role, WithdrawalStatus};

// =============================================================================
// Core Error
// =============================================================================

/// Core business rule violations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The lifecycle table does not allow this order transition.
    ///
    /// ## When This Occurs
    /// - Packing an order that is still `pending`
    /// - Cancelling an order that is already `packed`
    /// - Any attempt to move a `delivered` or `cancelled` order
    #[error("Order cannot move from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// Withdrawal status change not allowed (e.g. rejecting a paid request).
    #[error("Withdrawal cannot move from {from} to {to}")]
    InvalidWithdrawalTransition {
        from: WithdrawalStatus,
        to: WithdrawalStatus,
    },

    /// The actor's role (or ownership) does not permit the action.
    #[error("{role} may not {action}")]
    Forbidden { role: Role, action: String },

    /// The item has already been found or marked missing.
    #[error("Item {item_id} is already {status}")]
    DuplicateResolution { item_id: String, status: ItemStatus },

    /// Packing while some items are still pending.
    #[error("Order {order_id} has {pending} unresolved item(s)")]
    UnresolvedItems { order_id: String, pending: usize },

    /// Balance is below the minimum withdrawal.
    ///
    /// ## User Workflow
    /// ```text
    /// Request withdrawal (balance R12.00)
    ///      │
    ///      ▼
    /// Check minimum: R15.01
    ///      │
    ///      ▼
    /// InsufficientBalance { balance: R12.00, minimum: R15.01 }
    ///      │
    ///      ▼
    /// No request created, balance untouched
    /// ```
    #[error("Balance {balance} is below the minimum withdrawal of {minimum}")]
    InsufficientBalance { balance: Money, minimum: Money },

    /// Cart has no lines.
    #[error("Cart is empty")]
    EmptyCart,

    /// Cart has exceeded maximum allowed lines.
    #[error("Cart cannot have more than {max} items")]
    CartTooLarge { max: usize },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors, raised before any business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    Negative { field: String },

    /// Invalid format (e.g., non-finite coordinate).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
