//! # Wallet Repository
//!
//! Per-user wallet accounts and the append-only transaction ledger.
//!
//! ## Atomic Increment Contract
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  One unit of work, one SQLite transaction:                             │
//! │                                                                         │
//! │   1. INSERT wallet_accounts ... ON CONFLICT DO UPDATE                  │
//! │        SET balance_cents = balance_cents + delta,                      │
//! │            version       = version + 1                                 │
//! │   2. INSERT wallet_transactions (kind, delta, ...)                     │
//! │                                                                         │
//! │  The balance is never read by the caller and written back, so two      │
//! │  concurrent credits to one account both land:                          │
//! │     driver credit +9289  ─┐                                            │
//! │     refund        +6500  ─┴──► balance += each, serialized by SQLite   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The same `apply_entry` helper runs inside the order and withdrawal units of
//! work (refunds, earnings, reversals) so the ledger and the cached balance
//! always move together.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use fulfil_core::codes::new_entity_id;
use fulfil_core::{Money, TransactionKind, WalletAccount, WalletTransaction};

pub(crate) const TRANSACTION_COLUMNS: &str = "id, user_id, order_id, withdrawal_id, kind, \
     amount_cents, description, created_at";

/// A ledger entry about to be written.
#[derive(Debug, Clone)]
pub struct LedgerEntry<'a> {
    pub user_id: &'a str,
    pub kind: TransactionKind,
    /// Signed: positive credits, negative debits.
    pub amount: Money,
    pub order_id: Option<&'a str>,
    pub withdrawal_id: Option<&'a str>,
    pub description: String,
    pub at: DateTime<Utc>,
}

impl<'a> LedgerEntry<'a> {
    pub fn new(
        user_id: &'a str,
        kind: TransactionKind,
        amount: Money,
        description: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Self {
        LedgerEntry {
            user_id,
            kind,
            amount,
            order_id: None,
            withdrawal_id: None,
            description: description.into(),
            at,
        }
    }

    pub fn for_order(mut self, order_id: &'a str) -> Self {
        self.order_id = Some(order_id);
        self
    }

    pub fn for_withdrawal(mut self, withdrawal_id: &'a str) -> Self {
        self.withdrawal_id = Some(withdrawal_id);
        self
    }
}

/// Cached balance next to the ledger sum for one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct BalanceCheck {
    pub user_id: String,
    pub cached_cents: i64,
    pub ledger_cents: i64,
}

impl BalanceCheck {
    pub fn is_consistent(&self) -> bool {
        self.cached_cents == self.ledger_cents
    }
}

// =============================================================================
// Unit-of-work helpers (shared with the order and withdrawal repositories)
// =============================================================================

/// Applies `entry.amount` to the cached balance and appends the ledger row.
///
/// Must run inside the caller's transaction.
pub(crate) async fn apply_entry(
    conn: &mut SqliteConnection,
    entry: &LedgerEntry<'_>,
) -> DbResult<WalletTransaction> {
    sqlx::query(
        r#"
        INSERT INTO wallet_accounts (user_id, balance_cents, version, updated_at)
        VALUES (?1, ?2, 1, ?3)
        ON CONFLICT (user_id) DO UPDATE SET
            balance_cents = balance_cents + excluded.balance_cents,
            version = version + 1,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(entry.user_id)
    .bind(entry.amount.cents())
    .bind(entry.at)
    .execute(&mut *conn)
    .await?;

    insert_transaction(conn, entry).await
}

/// Appends a ledger row without touching the cached balance.
///
/// Only for callers that already moved the balance in the same transaction
/// (the compare-and-swap withdrawal debit).
pub(crate) async fn insert_transaction(
    conn: &mut SqliteConnection,
    entry: &LedgerEntry<'_>,
) -> DbResult<WalletTransaction> {
    let txn = WalletTransaction {
        id: new_entity_id(),
        user_id: entry.user_id.to_string(),
        order_id: entry.order_id.map(str::to_string),
        withdrawal_id: entry.withdrawal_id.map(str::to_string),
        kind: entry.kind,
        amount_cents: entry.amount.cents(),
        description: entry.description.clone(),
        created_at: entry.at,
    };

    sqlx::query(
        r#"
        INSERT INTO wallet_transactions (
            id, user_id, order_id, withdrawal_id, kind,
            amount_cents, description, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(&txn.id)
    .bind(&txn.user_id)
    .bind(&txn.order_id)
    .bind(&txn.withdrawal_id)
    .bind(txn.kind)
    .bind(txn.amount_cents)
    .bind(&txn.description)
    .bind(txn.created_at)
    .execute(&mut *conn)
    .await?;

    debug!(
        user_id = %txn.user_id,
        kind = %txn.kind,
        amount_cents = txn.amount_cents,
        "Ledger entry appended"
    );

    Ok(txn)
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for wallet accounts and ledger entries.
#[derive(Debug, Clone)]
pub struct WalletRepository {
    pool: SqlitePool,
}

impl WalletRepository {
    pub fn new(pool: SqlitePool) -> Self {
        WalletRepository { pool }
    }

    /// Credits `entry.amount` (must be positive) to the account.
    pub async fn credit(&self, entry: &LedgerEntry<'_>) -> DbResult<WalletTransaction> {
        debug!(user_id = %entry.user_id, amount = %entry.amount, "Crediting wallet");

        let mut tx = self.pool.begin().await?;
        let txn = apply_entry(&mut tx, entry).await?;
        tx.commit().await?;

        Ok(txn)
    }

    /// Debits `amount` (positive) from the account if the balance covers it.
    ///
    /// The general `debitWallet` persistence operation, the counterpart of
    /// [`credit`](Self::credit). No engine operation uses it today:
    /// withdrawals sweep the whole balance and go through
    /// [`WithdrawalRepository::create`](crate::WithdrawalRepository::create),
    /// which guards on the account version instead of the balance.
    ///
    /// ## Returns
    /// * `Ok(Some(txn))` - Balance decremented and ledger row appended
    /// * `Ok(None)` - Balance too low (or no account); nothing written
    pub async fn debit(&self, entry: &LedgerEntry<'_>) -> DbResult<Option<WalletTransaction>> {
        let amount = entry.amount.abs();
        debug!(user_id = %entry.user_id, amount = %amount, "Debiting wallet");

        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE wallet_accounts
            SET balance_cents = balance_cents - ?2,
                version = version + 1,
                updated_at = ?3
            WHERE user_id = ?1 AND balance_cents >= ?2
            "#,
        )
        .bind(entry.user_id)
        .bind(amount.cents())
        .bind(entry.at)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        let debit = LedgerEntry {
            amount: -amount,
            ..entry.clone()
        };
        let txn = insert_transaction(&mut tx, &debit).await?;
        tx.commit().await?;

        Ok(Some(txn))
    }

    /// Gets the account row, or an empty account if the user has none yet.
    pub async fn account(&self, user_id: &str) -> DbResult<WalletAccount> {
        let account: Option<WalletAccount> = sqlx::query_as(
            r#"
            SELECT user_id, balance_cents, version, updated_at
            FROM wallet_accounts
            WHERE user_id = ?1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(account.unwrap_or_else(|| WalletAccount::empty(user_id)))
    }

    /// Cached balance.
    pub async fn balance(&self, user_id: &str) -> DbResult<Money> {
        Ok(self.account(user_id).await?.balance())
    }

    /// Balance recomputed from the ledger.
    pub async fn ledger_balance(&self, user_id: &str) -> DbResult<Money> {
        let cents: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(amount_cents), 0) FROM wallet_transactions WHERE user_id = ?1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(Money::from_cents(cents))
    }

    /// Ledger entries, newest first.
    pub async fn transactions(&self, user_id: &str, limit: u32) -> DbResult<Vec<WalletTransaction>> {
        let sql = format!(
            "SELECT {TRANSACTION_COLUMNS} FROM wallet_transactions \
             WHERE user_id = ?1 ORDER BY created_at DESC, rowid DESC LIMIT ?2"
        );

        let rows = sqlx::query_as(&sql)
            .bind(user_id)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }

    /// Entries attached to one order (refunds and the driver earning).
    pub async fn transactions_for_order(&self, order_id: &str) -> DbResult<Vec<WalletTransaction>> {
        let sql = format!(
            "SELECT {TRANSACTION_COLUMNS} FROM wallet_transactions \
             WHERE order_id = ?1 ORDER BY created_at, rowid"
        );

        let rows = sqlx::query_as(&sql)
            .bind(order_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }

    /// Accounts by balance, largest first.
    pub async fn list_accounts(&self, limit: u32) -> DbResult<Vec<WalletAccount>> {
        let rows = sqlx::query_as(
            r#"
            SELECT user_id, balance_cents, version, updated_at
            FROM wallet_accounts
            ORDER BY balance_cents DESC, user_id
            LIMIT ?1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Cached balance against ledger sum for every account.
    pub async fn audit(&self) -> DbResult<Vec<BalanceCheck>> {
        let rows = sqlx::query_as(
            r#"
            SELECT
                a.user_id AS user_id,
                a.balance_cents AS cached_cents,
                COALESCE((
                    SELECT SUM(t.amount_cents)
                    FROM wallet_transactions t
                    WHERE t.user_id = a.user_id
                ), 0) AS ledger_cents
            FROM wallet_accounts a
            ORDER BY a.user_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
