//! # Engine Error Type
//!
//! The one error every engine operation returns.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in Fulfil                                 │
//! │                                                                         │
//! │  CoreError (rules)  ───────┐                                            │
//! │    InvalidTransition       │                                            │
//! │    InsufficientBalance     │                                            │
//! │    Validation              ├──► FulfilmentError ──► ErrorBody           │
//! │                            │      (this file)        { code, message,  │
//! │  DbError (storage)  ───────┘                           retryable }     │
//! │    Busy ──────────────────────► PersistenceConflict (retried)          │
//! │    NotFound ──────────────────► NotFound                               │
//! │    anything else ─────────────► Database                               │
//! │                                                                         │
//! │  Guard misses on conditional writes are classified by the engine      │
//! │  (ClaimConflict, DuplicateResolution, Forbidden, ...).                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A failed operation never leaves partial state behind: every write is one
//! transaction or one conditional statement.

use serde::Serialize;
use thiserror::Error;

use fulfil_core::{
    CoreError, ItemStatus, Money, OrderStatus, Role, ValidationError, WithdrawalStatus,
};
use fulfil_db::DbError;

/// Result alias for engine operations.
pub type EngineResult<T> = Result<T, FulfilmentError>;

#[derive(Debug, Error)]
pub enum FulfilmentError {
    // =========================================================================
    // Lifecycle
    // =========================================================================
    /// The order is not in a status the action can start from.
    #[error("Order cannot move from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// The withdrawal has already been settled another way.
    #[error("Withdrawal cannot move from {from} to {to}")]
    InvalidWithdrawalTransition {
        from: WithdrawalStatus,
        to: WithdrawalStatus,
    },

    /// Items can only change while their order is being gathered.
    #[error("Item {item_id} cannot change while its order is {order_status}")]
    ItemLocked {
        item_id: String,
        order_status: OrderStatus,
    },

    /// Another picker or driver got there first.
    ///
    /// ## When This Occurs
    /// - Two pickers press "claim" on the same pending order
    /// - A driver claims a packed order another driver already took
    #[error("Order {order_id} has already been claimed")]
    ClaimConflict { order_id: String },

    #[error("Item {item_id} is already {status}")]
    DuplicateResolution { item_id: String, status: ItemStatus },

    #[error("Order {order_id} has {pending} unresolved item(s)")]
    UnresolvedItems { order_id: String, pending: usize },

    // =========================================================================
    // Money
    // =========================================================================
    #[error("Balance {balance} is below the minimum withdrawal of {minimum}")]
    InsufficientBalance { balance: Money, minimum: Money },

    #[error("Payment declined: {0}")]
    PaymentDeclined(String),

    // =========================================================================
    // Access & Input
    // =========================================================================
    #[error("{role} may not {action}")]
    Forbidden { role: Role, action: String },

    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// No coordinates could be resolved and no fallback distance was given.
    #[error("Delivery location unavailable: {0}")]
    LocationUnavailable(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    // =========================================================================
    // Storage
    // =========================================================================
    /// A concurrent writer won; the operation changed nothing and may be
    /// retried.
    #[error("Concurrent update conflict: {0}")]
    PersistenceConflict(String),

    #[error("Database error: {0}")]
    Database(#[source] DbError),
}

impl FulfilmentError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        FulfilmentError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn forbidden(role: Role, action: impl Into<String>) -> Self {
        FulfilmentError::Forbidden {
            role,
            action: action.into(),
        }
    }

    /// Whether running the same operation again may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FulfilmentError::PersistenceConflict(_))
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            FulfilmentError::InvalidTransition { .. }
            | FulfilmentError::InvalidWithdrawalTransition { .. }
            | FulfilmentError::ItemLocked { .. } => ErrorCode::InvalidTransition,
            FulfilmentError::ClaimConflict { .. } => ErrorCode::ClaimConflict,
            FulfilmentError::DuplicateResolution { .. } => ErrorCode::DuplicateResolution,
            FulfilmentError::UnresolvedItems { .. } => ErrorCode::UnresolvedItems,
            FulfilmentError::InsufficientBalance { .. } => ErrorCode::InsufficientBalance,
            FulfilmentError::PaymentDeclined(_) => ErrorCode::PaymentDeclined,
            FulfilmentError::Forbidden { .. } => ErrorCode::Forbidden,
            FulfilmentError::NotFound { .. } => ErrorCode::NotFound,
            FulfilmentError::LocationUnavailable(_) => ErrorCode::LocationUnavailable,
            FulfilmentError::Validation(_) => ErrorCode::ValidationError,
            FulfilmentError::Config(_) => ErrorCode::ConfigError,
            FulfilmentError::PersistenceConflict(_) => ErrorCode::PersistenceConflict,
            FulfilmentError::Database(_) => ErrorCode::DatabaseError,
        }
    }

    /// Serializable form for callers.
    pub fn to_body(&self) -> ErrorBody {
        let message = match self {
            // Storage details stay in the logs
            FulfilmentError::Database(err) => {
                tracing::error!(error = %err, "Database operation failed");
                "Database operation failed".to_string()
            }
            other => other.to_string(),
        };

        ErrorBody {
            code: self.code(),
            message,
            retryable: self.is_retryable(),
        }
    }
}

// =============================================================================
// Serializable Error Body
// =============================================================================

/// What a caller receives when an operation fails.
///
/// ```json
/// {
///   "code": "CLAIM_CONFLICT",
///   "message": "Order 3f2a... has already been claimed",
///   "retryable": false
/// }
/// ```
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub code: ErrorCode,
    pub message: String,
    pub retryable: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    NotFound,
    InvalidTransition,
    ClaimConflict,
    DuplicateResolution,
    UnresolvedItems,
    InsufficientBalance,
    PaymentDeclined,
    Forbidden,
    LocationUnavailable,
    ValidationError,
    ConfigError,
    PersistenceConflict,
    DatabaseError,
}

// =============================================================================
// Conversions
// =============================================================================

impl From<CoreError> for FulfilmentError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidTransition { from, to } => {
                FulfilmentError::InvalidTransition { from, to }
            }
            CoreError::InvalidWithdrawalTransition { from, to } => {
                FulfilmentError::InvalidWithdrawalTransition { from, to }
            }
            CoreError::Forbidden { role, action } => FulfilmentError::Forbidden { role, action },
            CoreError::DuplicateResolution { item_id, status } => {
                FulfilmentError::DuplicateResolution { item_id, status }
            }
            CoreError::UnresolvedItems { order_id, pending } => {
                FulfilmentError::UnresolvedItems { order_id, pending }
            }
            CoreError::InsufficientBalance { balance, minimum } => {
                FulfilmentError::InsufficientBalance { balance, minimum }
            }
            other @ (CoreError::EmptyCart
            | CoreError::CartTooLarge { .. }
            | CoreError::Validation(_)) => FulfilmentError::Validation(other.to_string()),
        }
    }
}

impl From<ValidationError> for FulfilmentError {
    fn from(err: ValidationError) -> Self {
        FulfilmentError::Validation(err.to_string())
    }
}

impl From<DbError> for FulfilmentError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => FulfilmentError::NotFound { entity, id },
            err if err.is_transient() => FulfilmentError::PersistenceConflict(err.to_string()),
            err => FulfilmentError::Database(err),
        }
    }
}

impl From<std::io::Error> for FulfilmentError {
    fn from(err: std::io::Error) -> Self {
        FulfilmentError::Config(err.to_string())
    }
}

impl From<toml::de::Error> for FulfilmentError {
    fn from(err: toml::de::Error) -> Self {
        FulfilmentError::Config(err.to_string())
    }
}
