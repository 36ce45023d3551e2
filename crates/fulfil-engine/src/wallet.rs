//! # Wallet Views
//!
//! Read side of the ledger. Balances only ever change through refunds,
//! delivery earnings and withdrawals; nothing here writes.

use serde::Serialize;
use tracing::warn;

use fulfil_core::lifecycle::authorize_admin;
use fulfil_core::{WalletAccount, WalletTransaction, WithdrawalRequest};
use fulfil_db::BalanceCheck;

use crate::error::{EngineResult, FulfilmentError};
use crate::session::Session;
use crate::{FulfilmentEngine, DEFAULT_LIST_LIMIT};

/// Balance, recent ledger entries and withdrawals for one user.
#[derive(Debug, Clone, Serialize)]
pub struct WalletOverview {
    pub account: WalletAccount,
    /// Newest first.
    pub transactions: Vec<WalletTransaction>,
    /// Newest first.
    pub withdrawals: Vec<WithdrawalRequest>,
}

impl FulfilmentEngine {
    /// The caller's wallet, or any user's for an admin.
    pub async fn wallet_overview(
        &self,
        session: &Session,
        user_id: &str,
    ) -> EngineResult<WalletOverview> {
        if user_id != session.user_id() && !session.is_admin() {
            return Err(FulfilmentError::forbidden(
                session.role(),
                "view another user's wallet",
            ));
        }

        let wallet = self.db.wallet();
        Ok(WalletOverview {
            account: wallet.account(user_id).await?,
            transactions: wallet.transactions(user_id, DEFAULT_LIST_LIMIT).await?,
            withdrawals: self
                .db
                .withdrawals()
                .list_for_user(user_id, DEFAULT_LIST_LIMIT)
                .await?,
        })
    }

    /// Wallet accounts by balance, largest first.
    pub async fn list_wallets(&self, session: &Session) -> EngineResult<Vec<WalletAccount>> {
        authorize_admin(session.role(), "list wallets")?;
        Ok(self.db.wallet().list_accounts(DEFAULT_LIST_LIMIT).await?)
    }

    /// Compares every cached balance with the sum of its ledger.
    ///
    /// Mismatches are logged; a consistent store returns all rows with
    /// [`BalanceCheck::is_consistent`] true.
    pub async fn audit_wallets(&self, session: &Session) -> EngineResult<Vec<BalanceCheck>> {
        authorize_admin(session.role(), "audit wallets")?;

        let checks = self.db.wallet().audit().await?;
        for check in checks.iter().filter(|c| !c.is_consistent()) {
            warn!(
                user_id = %check.user_id,
                cached = check.cached_cents,
                ledger = check.ledger_cents,
                "Wallet balance does not match ledger"
            );
        }
        Ok(checks)
    }
}
