//! # Withdrawals
//!
//! Turning a wallet balance into a payout.
//!
//! ## Request Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  request_withdrawal(session)                                           │
//! │                                                                         │
//! │  read account (balance, version)                                       │
//! │          │                                                              │
//! │          ▼                                                              │
//! │  idempotency key seen before? ──yes──► return the original request     │
//! │          │ no                                                          │
//! │          ▼                                                              │
//! │  quote: balance ≥ minimum? fee = 3%, net = balance − fee               │
//! │          │ (failure: same key committed meanwhile? return it)          │
//! │          ▼                                                              │
//! │  ┌───────────────── one transaction ─────────────────┐                 │
//! │  │ zero balance WHERE version = read version (CAS)  │──stale──► retry  │
//! │  │ insert pending request                            │                 │
//! │  │ append withdrawal_debit (−balance)                │                 │
//! │  └───────────────────────────────────────────────────┘                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Admins then approve (`pending → paid`) or reject (`pending → rejected`,
//! balance restored by a `reversal` entry).

use chrono::Utc;
use tracing::{debug, info, instrument};

use fulfil_core::lifecycle::authorize_admin;
use fulfil_core::validation::validate_required;
use fulfil_core::{WithdrawalRequest, WithdrawalStatus};
use fulfil_db::CreateOutcome;

use crate::error::{EngineResult, FulfilmentError};
use crate::session::Session;
use crate::{FulfilmentEngine, DEFAULT_LIST_LIMIT};

impl FulfilmentEngine {
    /// Requests a withdrawal of the caller's whole balance.
    ///
    /// With an idempotency key on the session, repeating the request returns
    /// the original and debits nothing further.
    ///
    /// ## Errors
    /// * `InsufficientBalance` - Balance below the minimum; nothing is written
    #[instrument(skip(self, session), fields(user = %session.user_id()))]
    pub async fn request_withdrawal(&self, session: &Session) -> EngineResult<WithdrawalRequest> {
        let key = session.idempotency_key.as_deref();
        if let Some(key) = key {
            validate_required("idempotency_key", key)?;
        }

        self.retry
            .run("request_withdrawal", move || {
                self.request_withdrawal_once(session.user_id(), key)
            })
            .await
    }

    /// Approves a pending withdrawal; it is marked paid.
    #[instrument(skip(self, session), fields(admin = %session.user_id()))]
    pub async fn approve_withdrawal(
        &self,
        session: &Session,
        withdrawal_id: &str,
    ) -> EngineResult<WithdrawalRequest> {
        self.settle_withdrawal(session, withdrawal_id, WithdrawalStatus::Paid)
            .await
    }

    /// Rejects a pending withdrawal and restores the gross amount to the
    /// user's wallet.
    #[instrument(skip(self, session), fields(admin = %session.user_id()))]
    pub async fn reject_withdrawal(
        &self,
        session: &Session,
        withdrawal_id: &str,
    ) -> EngineResult<WithdrawalRequest> {
        self.settle_withdrawal(session, withdrawal_id, WithdrawalStatus::Rejected)
            .await
    }

    /// Withdrawals newest first, optionally of one status.
    pub async fn list_withdrawals(
        &self,
        session: &Session,
        status: Option<WithdrawalStatus>,
    ) -> EngineResult<Vec<WithdrawalRequest>> {
        authorize_admin(session.role(), "list withdrawals")?;
        Ok(self
            .db
            .withdrawals()
            .list(status, DEFAULT_LIST_LIMIT)
            .await?)
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    async fn request_withdrawal_once(
        &self,
        user_id: &str,
        key: Option<&str>,
    ) -> EngineResult<WithdrawalRequest> {
        // Account before key: a same-key request committing after this read
        // bumps the version, so the create below comes back stale.
        let account = self.db.wallet().account(user_id).await?;
        if let Some(existing) = self.withdrawal_for_key(user_id, key).await? {
            debug!(withdrawal_id = %existing.id, "Withdrawal already requested with this key");
            return Ok(existing);
        }

        let quote = match self.policy.quote_withdrawal(account.balance()) {
            Ok(quote) => quote,
            Err(e) => return self.keyed_withdrawal_or(user_id, key, e.into()).await,
        };

        match self
            .db
            .withdrawals()
            .create(user_id, &quote, account.version, key, Utc::now())
            .await
        {
            Ok(CreateOutcome::Created(request)) => {
                info!(
                    withdrawal_id = %request.id,
                    amount = %quote.amount,
                    fee = %quote.fee,
                    net_payout = %quote.net_payout,
                    "Withdrawal requested"
                );
                Ok(request)
            }
            Ok(CreateOutcome::Stale) => Err(FulfilmentError::PersistenceConflict(format!(
                "wallet of {} changed during withdrawal",
                user_id
            ))),
            // A concurrent request with the same key won
            Err(e) if key.is_some() && e.is_unique_violation_on("idempotency_key") => {
                let conflict = FulfilmentError::PersistenceConflict(e.to_string());
                self.keyed_withdrawal_or(user_id, key, conflict).await
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn withdrawal_for_key(
        &self,
        user_id: &str,
        key: Option<&str>,
    ) -> EngineResult<Option<WithdrawalRequest>> {
        match key {
            Some(key) => Ok(self.db.withdrawals().find_by_key(user_id, key).await?),
            None => Ok(None),
        }
    }

    /// The request already made under `key`, else `err`.
    ///
    /// A same-key request may commit between the key lookup and a failing
    /// step; its request is the answer, not the failure.
    async fn keyed_withdrawal_or(
        &self,
        user_id: &str,
        key: Option<&str>,
        err: FulfilmentError,
    ) -> EngineResult<WithdrawalRequest> {
        match self.withdrawal_for_key(user_id, key).await? {
            Some(existing) => {
                debug!(withdrawal_id = %existing.id, error = %err, "Same-key withdrawal won the race");
                Ok(existing)
            }
            None => Err(err),
        }
    }

    async fn settle_withdrawal(
        &self,
        session: &Session,
        withdrawal_id: &str,
        next: WithdrawalStatus,
    ) -> EngineResult<WithdrawalRequest> {
        authorize_admin(session.role(), "settle withdrawals")?;
        let now = Utc::now();

        self.retry
            .run("settle_withdrawal", move || async move {
                let updated = self
                    .db
                    .withdrawals()
                    .update_status(withdrawal_id, next, session.user_id(), now)
                    .await?;

                if let Some(request) = updated {
                    info!(
                        withdrawal_id,
                        status = %request.status,
                        net_payout = %request.net_payout(),
                        "Withdrawal settled"
                    );
                    return Ok(request);
                }

                let current = self
                    .db
                    .withdrawals()
                    .get(withdrawal_id)
                    .await?
                    .ok_or_else(|| FulfilmentError::not_found("Withdrawal", withdrawal_id))?;

                if current.status.can_transition_to(next) {
                    Err(FulfilmentError::PersistenceConflict(format!(
                        "withdrawal {} changed while settling",
                        withdrawal_id
                    )))
                } else {
                    Err(FulfilmentError::InvalidWithdrawalTransition {
                        from: current.status,
                        to: next,
                    })
                }
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use fulfil_core::{Money, PaymentMethod, TransactionKind};
    use fulfil_db::LedgerEntry;

    use super::*;
    use crate::collaborators::{CollaboratorError, NoGeocoding, PaymentAuthorization};
    use crate::config::EngineConfig;
    use crate::PaymentGateway;

    struct NoPayments;

    #[async_trait]
    impl PaymentGateway for NoPayments {
        async fn authorize(
            &self,
            _amount: Money,
            _method: PaymentMethod,
        ) -> Result<PaymentAuthorization, CollaboratorError> {
            Err(CollaboratorError::Unavailable("no payments in wallet tests".into()))
        }

        async fn void(
            &self,
            _authorization: &PaymentAuthorization,
        ) -> Result<(), CollaboratorError> {
            Ok(())
        }
    }

    async fn engine_with_balance(user_id: &str, cents: i64) -> FulfilmentEngine {
        let engine = FulfilmentEngine::open(
            &EngineConfig::in_memory(),
            Arc::new(NoGeocoding),
            Arc::new(NoPayments),
        )
        .await
        .unwrap();
        let entry = LedgerEntry::new(
            user_id,
            TransactionKind::Earning,
            Money::from_cents(cents),
            "Opening balance",
            Utc::now(),
        );
        engine.db.wallet().credit(&entry).await.unwrap();
        engine
    }

    #[tokio::test]
    async fn test_same_key_commit_after_lookup_returns_original() {
        let engine = engine_with_balance("driver-1", 5_000).await;

        // Another request with key "k" commits after this one looked the key
        // up, leaving the balance below the minimum
        let original = engine
            .request_withdrawal(&Session::driver("driver-1").with_idempotency_key("k"))
            .await
            .unwrap();
        let quote_err = || -> FulfilmentError {
            engine.policy.quote_withdrawal(Money::zero()).unwrap_err().into()
        };

        let answer = engine
            .keyed_withdrawal_or("driver-1", Some("k"), quote_err())
            .await
            .unwrap();
        assert_eq!(answer.id, original.id);

        // Another key, or none, still gets the failure
        assert!(matches!(
            engine.keyed_withdrawal_or("driver-1", Some("other"), quote_err()).await,
            Err(FulfilmentError::InsufficientBalance { .. })
        ));
        assert!(matches!(
            engine.keyed_withdrawal_or("driver-1", None, quote_err()).await,
            Err(FulfilmentError::InsufficientBalance { .. })
        ));
    }

    #[tokio::test]
    async fn test_account_read_before_same_key_commit_goes_stale() {
        let engine = engine_with_balance("driver-1", 5_000).await;
        let snapshot = engine.db.wallet().account("driver-1").await.unwrap();
        let quote = engine.policy.quote_withdrawal(snapshot.balance()).unwrap();

        engine
            .request_withdrawal(&Session::driver("driver-1").with_idempotency_key("k"))
            .await
            .unwrap();

        let outcome = engine
            .db
            .withdrawals()
            .create("driver-1", &quote, snapshot.version, Some("k"), Utc::now())
            .await
            .unwrap();
        assert!(matches!(outcome, CreateOutcome::Stale));

        // The retry sees the committed request
        let retried = engine.request_withdrawal_once("driver-1", Some("k")).await.unwrap();
        assert_eq!(retried.amount(), Money::from_cents(5_000));
        assert_eq!(engine.db.wallet().balance("driver-1").await.unwrap(), Money::zero());
    }
}
