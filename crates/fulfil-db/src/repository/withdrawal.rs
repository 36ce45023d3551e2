//! # Withdrawal Repository
//!
//! Withdrawal requests and the ledger movements tied to them.
//!
//! ## Request Unit of Work
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  BEGIN                                                                  │
//! │   1. UPDATE wallet_accounts SET balance = 0, version = version + 1     │
//! │      WHERE user_id = ? AND version = <read> AND balance = <read>        │
//! │        └── 0 rows: the account moved since it was read → Stale         │
//! │   2. INSERT withdrawal_requests (amount, fee, net, key, version)       │
//! │        └── UNIQUE (user_id, idempotency_key) catches replays           │
//! │   3. INSERT wallet_transactions (withdrawal_debit, -amount)            │
//! │  COMMIT                                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Rejection re-credits the gross amount through a `reversal` entry in the
//! same transaction as the status change.

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use crate::repository::wallet::{apply_entry, insert_transaction, LedgerEntry};
use fulfil_core::codes::new_entity_id;
use fulfil_core::{TransactionKind, WithdrawalQuote, WithdrawalRequest, WithdrawalStatus};

const WITHDRAWAL_COLUMNS: &str = "id, user_id, amount_cents, fee_cents, net_payout_cents, status, \
     idempotency_key, account_version, requested_at, processed_at, processed_by";

/// Outcome of [`WithdrawalRepository::create`].
#[derive(Debug, Clone)]
pub enum CreateOutcome {
    /// Request inserted and balance zeroed.
    Created(WithdrawalRequest),
    /// The account changed after it was read; nothing written.
    Stale,
}

/// Repository for withdrawal requests.
#[derive(Debug, Clone)]
pub struct WithdrawalRepository {
    pool: SqlitePool,
}

impl WithdrawalRepository {
    pub fn new(pool: SqlitePool) -> Self {
        WithdrawalRepository { pool }
    }

    /// Creates a pending request for the whole balance and zeroes the account.
    ///
    /// `expected_version` and `quote.amount` must come from the same account
    /// read; if either changed the outcome is [`CreateOutcome::Stale`].
    pub async fn create(
        &self,
        user_id: &str,
        quote: &WithdrawalQuote,
        expected_version: i64,
        idempotency_key: Option<&str>,
        at: DateTime<Utc>,
    ) -> DbResult<CreateOutcome> {
        debug!(user_id = %user_id, amount = %quote.amount, version = expected_version, "Creating withdrawal");

        let mut tx = self.pool.begin().await?;

        let zeroed = sqlx::query(
            r#"
            UPDATE wallet_accounts
            SET balance_cents = 0, version = version + 1, updated_at = ?4
            WHERE user_id = ?1 AND version = ?2 AND balance_cents = ?3
            "#,
        )
        .bind(user_id)
        .bind(expected_version)
        .bind(quote.amount.cents())
        .bind(at)
        .execute(&mut *tx)
        .await?;

        if zeroed.rows_affected() == 0 {
            tx.rollback().await?;
            debug!(user_id = %user_id, "Withdrawal lost compare-and-swap");
            return Ok(CreateOutcome::Stale);
        }

        let request = WithdrawalRequest {
            id: new_entity_id(),
            user_id: user_id.to_string(),
            amount_cents: quote.amount.cents(),
            fee_cents: quote.fee.cents(),
            net_payout_cents: quote.net_payout.cents(),
            status: WithdrawalStatus::Pending,
            idempotency_key: idempotency_key.map(str::to_string),
            account_version: expected_version,
            requested_at: at,
            processed_at: None,
            processed_by: None,
        };

        sqlx::query(
            r#"
            INSERT INTO withdrawal_requests (
                id, user_id, amount_cents, fee_cents, net_payout_cents, status,
                idempotency_key, account_version, requested_at, processed_at, processed_by
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&request.id)
        .bind(&request.user_id)
        .bind(request.amount_cents)
        .bind(request.fee_cents)
        .bind(request.net_payout_cents)
        .bind(request.status)
        .bind(&request.idempotency_key)
        .bind(request.account_version)
        .bind(request.requested_at)
        .bind(request.processed_at)
        .bind(&request.processed_by)
        .execute(&mut *tx)
        .await?;

        let debit = LedgerEntry::new(
            user_id,
            TransactionKind::WithdrawalDebit,
            -quote.amount,
            format!("Withdrawal requested (fee {}, payout {})", quote.fee, quote.net_payout),
            at,
        )
        .for_withdrawal(&request.id);
        insert_transaction(&mut tx, &debit).await?;

        tx.commit().await?;
        Ok(CreateOutcome::Created(request))
    }

    /// Moves a request to `next` if the current status allows it.
    ///
    /// Moving to `rejected` appends a `reversal` credit of the gross amount in
    /// the same transaction.
    ///
    /// ## Returns
    /// * `Ok(Some(request))` - The updated request
    /// * `Ok(None)` - Unknown id or the status no longer allows `next`
    pub async fn update_status(
        &self,
        id: &str,
        next: WithdrawalStatus,
        processed_by: &str,
        at: DateTime<Utc>,
    ) -> DbResult<Option<WithdrawalRequest>> {
        let from: Vec<WithdrawalStatus> = [
            WithdrawalStatus::Pending,
            WithdrawalStatus::Approved,
            WithdrawalStatus::Rejected,
            WithdrawalStatus::Paid,
        ]
        .into_iter()
        .filter(|s| s.can_transition_to(next))
        .collect();

        if from.is_empty() {
            return Ok(None);
        }

        let mut tx = self.pool.begin().await?;

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE withdrawal_requests SET status = ");
        qb.push_bind(next);
        qb.push(", processed_at = ");
        qb.push_bind(at);
        qb.push(", processed_by = ");
        qb.push_bind(processed_by.to_string());
        qb.push(" WHERE id = ");
        qb.push_bind(id.to_string());
        qb.push(" AND status IN (");
        let mut list = qb.separated(", ");
        for status in from {
            list.push_bind(status);
        }
        qb.push(format!(") RETURNING {WITHDRAWAL_COLUMNS}"));

        let updated: Option<WithdrawalRequest> =
            qb.build_query_as().fetch_optional(&mut *tx).await?;

        let Some(request) = updated else {
            tx.rollback().await?;
            return Ok(None);
        };

        if next == WithdrawalStatus::Rejected {
            let reversal = LedgerEntry::new(
                &request.user_id,
                TransactionKind::Reversal,
                request.amount(),
                "Withdrawal rejected: balance restored",
                at,
            )
            .for_withdrawal(&request.id);
            apply_entry(&mut tx, &reversal).await?;
        }

        tx.commit().await?;
        debug!(id = %request.id, status = %request.status, "Withdrawal status updated");
        Ok(Some(request))
    }

    /// Gets a request by ID.
    pub async fn get(&self, id: &str) -> DbResult<Option<WithdrawalRequest>> {
        let sql = format!("SELECT {WITHDRAWAL_COLUMNS} FROM withdrawal_requests WHERE id = ?1");
        let request = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(request)
    }

    /// Finds the request a user created with this idempotency key.
    pub async fn find_by_key(&self, user_id: &str, key: &str) -> DbResult<Option<WithdrawalRequest>> {
        let sql = format!(
            "SELECT {WITHDRAWAL_COLUMNS} FROM withdrawal_requests \
             WHERE user_id = ?1 AND idempotency_key = ?2"
        );
        let request = sqlx::query_as(&sql)
            .bind(user_id)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(request)
    }

    /// Requests, newest first, optionally filtered by status.
    pub async fn list(&self, status: Option<WithdrawalStatus>, limit: u32) -> DbResult<Vec<WithdrawalRequest>> {
        let sql = format!(
            "SELECT {WITHDRAWAL_COLUMNS} FROM withdrawal_requests \
             WHERE (?1 IS NULL OR status = ?1) \
             ORDER BY requested_at DESC, rowid DESC LIMIT ?2"
        );
        let rows = sqlx::query_as(&sql)
            .bind(status)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// A user's requests, newest first.
    pub async fn list_for_user(&self, user_id: &str, limit: u32) -> DbResult<Vec<WithdrawalRequest>> {
        let sql = format!(
            "SELECT {WITHDRAWAL_COLUMNS} FROM withdrawal_requests \
             WHERE user_id = ?1 ORDER BY requested_at DESC, rowid DESC LIMIT ?2"
        );
        let rows = sqlx::query_as(&sql)
            .bind(user_id)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
