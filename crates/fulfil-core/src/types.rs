//! # Domain Types
//!
//! Core domain types used throughout the fulfilment workflow.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │     Order       │   │   OrderItem     │   │ WalletAccount   │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │◄──│  order_id (FK)  │   │  user_id (PK)   │       │
//! │  │  order_code     │   │  name_snapshot  │   │  balance_cents  │       │
//! │  │  status         │   │  unit_price     │   │  version (CAS)  │       │
//! │  │  total_cents    │   │  status         │   └────────┬────────┘       │
//! │  └─────────────────┘   └─────────────────┘            │                │
//! │                                                        ▼                │
//! │  ┌─────────────────┐   ┌─────────────────────────────────────┐         │
//! │  │WithdrawalRequest│   │        WalletTransaction            │         │
//! │  │  amount / fee   │──►│  kind, signed amount (append-only)  │         │
//! │  │  net_payout     │   │  Σ amount == account balance        │         │
//! │  └─────────────────┘   └─────────────────────────────────────┘         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Orders carry a UUID `id` for relations and a human-readable `order_code`
//! (`RSA-12345`) plus a `waybill` for the printed label.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Roles & Actors
// =============================================================================

/// The role an actor plays in the workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Shopper placing orders ("citizen").
    Customer,
    /// Staff gathering items in store.
    Picker,
    /// Staff delivering packed orders.
    Driver,
    /// Operator reconciling money.
    Admin,
}

impl Role {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Role::Customer => "customer",
            Role::Picker => "picker",
            Role::Driver => "driver",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who is performing an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Actor {
    pub user_id: String,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Actor {
            user_id: user_id.into(),
            role,
        }
    }

    #[inline]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

// =============================================================================
// Order Status
// =============================================================================

/// Lifecycle status of an order. See [`crate::lifecycle`] for the transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Placed and paid, waiting for a picker.
    Pending,
    /// A picker has claimed it and is gathering items.
    Gathering,
    /// All items resolved, waiting for a driver.
    Packed,
    /// A driver has claimed it and is on route.
    InTransit,
    /// Handed to the customer.
    Delivered,
    /// Cancelled before packing.
    Cancelled,
}

impl OrderStatus {
    /// Statuses that count as an active consignment.
    pub const ACTIVE: [OrderStatus; 4] = [
        OrderStatus::Pending,
        OrderStatus::Gathering,
        OrderStatus::Packed,
        OrderStatus::InTransit,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Gathering => "gathering",
            OrderStatus::Packed => "packed",
            OrderStatus::InTransit => "in_transit",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// True for statuses no transition leaves.
    pub const fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    pub const fn is_active(&self) -> bool {
        !self.is_terminal()
    }
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::Pending
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Item Status
// =============================================================================

/// Pick status of a single order line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Pending,
    Found,
    Missing,
}

impl ItemStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Pending => "pending",
            ItemStatus::Found => "found",
            ItemStatus::Missing => "missing",
        }
    }

    /// An item resolves exactly once: `pending → found | missing`.
    pub const fn can_resolve_to(&self, next: ItemStatus) -> bool {
        matches!(
            (self, next),
            (ItemStatus::Pending, ItemStatus::Found) | (ItemStatus::Pending, ItemStatus::Missing)
        )
    }
}

impl Default for ItemStatus {
    fn default() -> Self {
        ItemStatus::Pending
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Payment Method
// =============================================================================

#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Card payment through the gateway.
    Card,
    /// Electronic funds transfer.
    Eft,
}

impl PaymentMethod {
    pub const fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Card => "card",
            PaymentMethod::Eft => "eft",
        }
    }
}

// =============================================================================
// Coordinates
// =============================================================================

/// A WGS84 position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Coordinates { lat, lng }
    }
}

// =============================================================================
// Order
// =============================================================================

/// A customer order. Totals are frozen at creation.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Order {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Human-readable code, `RSA-` + 5 digits.
    pub order_code: String,

    /// 14-character tracking code printed on the packed order.
    pub waybill: String,

    pub customer_id: String,
    pub status: OrderStatus,

    pub subtotal_cents: i64,
    pub vat_cents: i64,
    pub travel_fee_cents: i64,
    /// Always `subtotal + vat + travel_fee`.
    pub total_cents: i64,

    pub delivery_address: String,
    pub delivery_lat: Option<f64>,
    pub delivery_lng: Option<f64>,
    /// Delivery distance in tenths of a kilometre (161 = 16.1 km).
    pub distance_tenths: i64,

    /// Recipient contact snapshot.
    pub recipient_name: Option<String>,
    pub recipient_phone: Option<String>,

    pub payment_method: PaymentMethod,
    /// Authorization reference returned by the payment gateway.
    pub payment_reference: Option<String>,

    pub picker_id: Option<String>,
    pub driver_id: Option<String>,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub packed_at: Option<DateTime<Utc>>,
    #[ts(as = "Option<String>")]
    pub delivered_at: Option<DateTime<Utc>>,
    #[ts(as = "Option<String>")]
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Order {
    #[inline]
    pub fn subtotal(&self) -> Money {
        Money::from_cents(self.subtotal_cents)
    }

    #[inline]
    pub fn vat(&self) -> Money {
        Money::from_cents(self.vat_cents)
    }

    #[inline]
    pub fn travel_fee(&self) -> Money {
        Money::from_cents(self.travel_fee_cents)
    }

    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    /// Checks the frozen-totals invariant.
    pub fn totals_balance(&self) -> bool {
        self.subtotal() + self.vat() + self.travel_fee() == self.total()
    }
}

// =============================================================================
// Order Item
// =============================================================================

/// A line in an order.
/// Uses snapshot pattern to freeze product data at time of ordering.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct OrderItem {
    pub id: String,
    pub order_id: String,
    pub product_id: String,
    /// Product name at time of ordering (frozen).
    pub name_snapshot: String,
    pub store_id: String,
    pub quantity: i64,
    /// Unit price in cents at time of ordering (frozen).
    pub unit_price_cents: i64,
    pub status: ItemStatus,
    /// Picker who resolved the line.
    pub resolved_by: Option<String>,
    #[ts(as = "Option<String>")]
    pub resolved_at: Option<DateTime<Utc>>,
}

impl OrderItem {
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    /// `unit_price × quantity`; also the refund amount when missing.
    #[inline]
    pub fn line_total(&self) -> Money {
        self.unit_price().multiply_quantity(self.quantity)
    }
}

/// An order together with its lines.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderDetail {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

impl OrderDetail {
    /// Lines still waiting to be found or marked missing.
    pub fn pending_items(&self) -> usize {
        self.items
            .iter()
            .filter(|i| i.status == ItemStatus::Pending)
            .count()
    }
}

// =============================================================================
// Wallet
// =============================================================================

/// Kind of a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// Credit to a customer for a missing item.
    Refund,
    /// Credit to a driver for a completed delivery.
    Earning,
    /// Debit of the whole balance into a withdrawal request.
    WithdrawalDebit,
    /// Platform-imposed charge against a wallet.
    Fee,
    /// Re-credit of a rejected withdrawal.
    Reversal,
}

impl TransactionKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Refund => "refund",
            TransactionKind::Earning => "earning",
            TransactionKind::WithdrawalDebit => "withdrawal_debit",
            TransactionKind::Fee => "fee",
            TransactionKind::Reversal => "reversal",
        }
    }

    /// Whether entries of this kind add to the balance.
    pub const fn is_credit(&self) -> bool {
        matches!(
            self,
            TransactionKind::Refund | TransactionKind::Earning | TransactionKind::Reversal
        )
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cached balance row for one user.
///
/// `balance_cents` is a read cache of Σ transactions; `version` increments on
/// every change and backs compare-and-swap debits.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct WalletAccount {
    pub user_id: String,
    pub balance_cents: i64,
    pub version: i64,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl WalletAccount {
    /// An account that has never been credited.
    pub fn empty(user_id: impl Into<String>) -> Self {
        WalletAccount {
            user_id: user_id.into(),
            balance_cents: 0,
            version: 0,
            updated_at: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    #[inline]
    pub fn balance(&self) -> Money {
        Money::from_cents(self.balance_cents)
    }
}

/// Immutable ledger entry. Never updated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct WalletTransaction {
    pub id: String,
    pub user_id: String,
    pub order_id: Option<String>,
    pub withdrawal_id: Option<String>,
    pub kind: TransactionKind,
    /// Signed: credits positive, debits negative.
    pub amount_cents: i64,
    pub description: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl WalletTransaction {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }
}

// =============================================================================
// Withdrawals
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum WithdrawalStatus {
    Pending,
    Approved,
    Rejected,
    Paid,
}

impl WithdrawalStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            WithdrawalStatus::Pending => "pending",
            WithdrawalStatus::Approved => "approved",
            WithdrawalStatus::Rejected => "rejected",
            WithdrawalStatus::Paid => "paid",
        }
    }

    /// Admin-driven transitions. `approved` is an optional intermediate step
    /// before `paid`; rejection is possible until the payout happens.
    pub const fn can_transition_to(&self, next: WithdrawalStatus) -> bool {
        use WithdrawalStatus::*;
        matches!(
            (self, next),
            (Pending, Approved)
                | (Pending, Paid)
                | (Pending, Rejected)
                | (Approved, Paid)
                | (Approved, Rejected)
        )
    }

    pub const fn is_settled(&self) -> bool {
        matches!(self, WithdrawalStatus::Rejected | WithdrawalStatus::Paid)
    }
}

impl fmt::Display for WithdrawalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A payout request. Amounts are frozen once created.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct WithdrawalRequest {
    pub id: String,
    pub user_id: String,
    /// Gross amount: the whole balance at request time.
    pub amount_cents: i64,
    /// Processing fee withheld from the gross amount.
    pub fee_cents: i64,
    /// `amount - fee`, paid out to the user.
    pub net_payout_cents: i64,
    pub status: WithdrawalStatus,
    /// Caller-supplied key making retried requests idempotent.
    pub idempotency_key: Option<String>,
    /// Account version that was debited.
    pub account_version: i64,
    #[ts(as = "String")]
    pub requested_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub processed_at: Option<DateTime<Utc>>,
    pub processed_by: Option<String>,
}

impl WithdrawalRequest {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }

    #[inline]
    pub fn fee(&self) -> Money {
        Money::from_cents(self.fee_cents)
    }

    #[inline]
    pub fn net_payout(&self) -> Money {
        Money::from_cents(self.net_payout_cents)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
