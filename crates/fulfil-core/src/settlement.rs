//! # Settlement
//!
//! Wallet money rules: what a driver earns per delivery, what the platform
//! keeps, and how a withdrawal splits into fee and payout.
//!
//! ## Money Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  travel fee R132.70                                                     │
//! │     ├── 70% ──► driver wallet (earning)        R92.89                  │
//! │     └── rest ─► platform revenue (reported)    R39.81                  │
//! │                                                                         │
//! │  wallet balance R50.00 ──► withdrawal request                          │
//! │     ├── 3% ───► admin fee (reported once paid)  R1.50                  │
//! │     └── rest ─► net payout                     R48.50                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::{Money, Rate};
use crate::{DRIVER_SHARE_BPS, MIN_WITHDRAWAL_CENTS, WITHDRAWAL_FEE_BPS};

/// Rates and thresholds for wallet settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletPolicy {
    /// Fraction of the travel fee paid to the driver.
    pub driver_share: Rate,
    /// Fraction of a withdrawal withheld as a processing fee.
    pub withdrawal_fee: Rate,
    /// Smallest balance that may be withdrawn.
    pub min_withdrawal: Money,
}

impl Default for WalletPolicy {
    fn default() -> Self {
        WalletPolicy {
            driver_share: Rate::from_bps(DRIVER_SHARE_BPS),
            withdrawal_fee: Rate::from_bps(WITHDRAWAL_FEE_BPS),
            min_withdrawal: Money::from_cents(MIN_WITHDRAWAL_CENTS),
        }
    }
}

/// How a delivered order's travel fee is divided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DeliverySplit {
    pub driver_earning: Money,
    pub platform_share: Money,
}

/// Frozen amounts of a withdrawal request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct WithdrawalQuote {
    pub amount: Money,
    pub fee: Money,
    pub net_payout: Money,
}

impl WalletPolicy {
    /// Splits a travel fee between driver and platform.
    ///
    /// The two parts always add back up to the fee.
    pub fn split_delivery(&self, travel_fee: Money) -> DeliverySplit {
        let (driver_earning, platform_share) = travel_fee.split(self.driver_share);
        DeliverySplit {
            driver_earning,
            platform_share,
        }
    }

    /// Quotes a withdrawal of the whole `balance`.
    ///
    /// ## Example
    /// ```rust
    /// use fulfil_core::money::Money;
    /// use fulfil_core::settlement::WalletPolicy;
    ///
    /// let quote = WalletPolicy::default().quote_withdrawal(Money::from_cents(5_000)).unwrap();
    /// assert_eq!(quote.fee.cents(), 150);
    /// assert_eq!(quote.net_payout.cents(), 4_850);
    /// ```
    pub fn quote_withdrawal(&self, balance: Money) -> CoreResult<WithdrawalQuote> {
        if balance < self.min_withdrawal {
            return Err(CoreError::InsufficientBalance {
                balance,
                minimum: self.min_withdrawal,
            });
        }

        let (fee, net_payout) = balance.split(self.withdrawal_fee);
        Ok(WithdrawalQuote {
            amount: balance,
            fee,
            net_payout,
        })
    }
}
