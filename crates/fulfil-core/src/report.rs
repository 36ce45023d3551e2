//! # Accounting Report
//!
//! Read-side aggregation over durable order and withdrawal records. There are
//! no counters to keep in sync: every figure is recomputed from rows.
//!
//! ```text
//!   delivered orders ──► per order: travel_fee − driver_earning ──┬─► lifetime revenue
//!                        (summed by the database)                  └─► today's revenue
//!   paid withdrawals ──► Σ frozen fee ─────────────────────────────► admin fees
//!   orders in pending | gathering | packed | in_transit ───────────► active consignments
//! ```

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::settlement::WalletPolicy;

/// The minimum a delivered order contributes to the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct DeliveredFee {
    pub order_code: String,
    pub travel_fee_cents: i64,
    pub delivered_at: DateTime<Utc>,
}

/// Delivered-order sums, aggregated where the rows live.
///
/// The platform share is summed per order with the same half-up rounding
/// used when the driver was credited, so revenue plus earnings equals fees
/// exactly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct DeliveryTotals {
    pub delivered_orders: i64,
    pub travel_fee_cents: i64,
    pub platform_revenue_cents: i64,
    /// Platform share of orders delivered between the start of the UTC day
    /// and the report time.
    pub today_platform_revenue_cents: i64,
}

/// One row of the recent-earnings view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DeliveryEarning {
    pub order_code: String,
    pub travel_fee: Money,
    pub driver_earning: Money,
    pub platform_share: Money,
    #[ts(as = "String")]
    pub delivered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AccountingReport {
    /// Platform share of travel fees delivered on the UTC day of `generated_at`.
    pub today_platform_revenue: Money,
    pub lifetime_platform_revenue: Money,
    /// Σ travel fees over all delivered orders.
    pub lifetime_travel_fees: Money,
    /// Σ fees withheld from paid withdrawals.
    pub admin_fees: Money,
    pub delivered_orders: i64,
    pub active_consignments: i64,
    #[ts(as = "String")]
    pub generated_at: DateTime<Utc>,
}

/// Start of the UTC calendar day containing `now`.
pub fn start_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive().and_time(NaiveTime::MIN).and_utc()
}

impl DeliveryEarning {
    pub fn from_delivered(row: &DeliveredFee, policy: &WalletPolicy) -> Self {
        let travel_fee = Money::from_cents(row.travel_fee_cents);
        let split = policy.split_delivery(travel_fee);
        DeliveryEarning {
            order_code: row.order_code.clone(),
            travel_fee,
            driver_earning: split.driver_earning,
            platform_share: split.platform_share,
            delivered_at: row.delivered_at,
        }
    }
}

impl AccountingReport {
    pub fn build(
        delivered: &DeliveryTotals,
        paid_withdrawal_fees: Money,
        active_consignments: i64,
        now: DateTime<Utc>,
    ) -> Self {
        AccountingReport {
            today_platform_revenue: Money::from_cents(delivered.today_platform_revenue_cents),
            lifetime_platform_revenue: Money::from_cents(delivered.platform_revenue_cents),
            lifetime_travel_fees: Money::from_cents(delivered.travel_fee_cents),
            admin_fees: paid_withdrawal_fees,
            delivered_orders: delivered.delivered_orders,
            active_consignments,
            generated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn delivered(code: &str, cents: i64, at: DateTime<Utc>) -> DeliveredFee {
        DeliveredFee {
            order_code: code.to_string(),
            travel_fee_cents: cents,
            delivered_at: at,
        }
    }

    #[test]
    fn test_report_from_totals() {
        let now = Utc.with_ymd_and_hms(2024, 3, 14, 15, 0, 0).unwrap();
        let totals = DeliveryTotals {
            delivered_orders: 2,
            travel_fee_cents: 15_270,
            platform_revenue_cents: 3_981 + 600,
            today_platform_revenue_cents: 3_981,
        };
        let report = AccountingReport::build(&totals, Money::from_cents(150), 4, now);

        assert_eq!(report.today_platform_revenue, Money::from_cents(3_981));
        assert_eq!(report.lifetime_platform_revenue, Money::from_cents(4_581));
        assert_eq!(report.lifetime_travel_fees, Money::from_cents(15_270));
        assert_eq!(report.admin_fees, Money::from_cents(150));
        assert_eq!(report.delivered_orders, 2);
        assert_eq!(report.active_consignments, 4);
        assert_eq!(report.generated_at, now);
    }

    #[test]
    fn test_start_of_day() {
        let now = Utc.with_ymd_and_hms(2024, 3, 14, 0, 30, 0).unwrap();
        assert_eq!(start_of_day(now), Utc.with_ymd_and_hms(2024, 3, 14, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_empty_report() {
        let report = AccountingReport::build(&DeliveryTotals::default(), Money::zero(), 0, Utc::now());
        assert!(report.lifetime_platform_revenue.is_zero());
        assert_eq!(report.delivered_orders, 0);
    }

    #[test]
    fn test_earning_row() {
        let now = Utc::now();
        let row = DeliveryEarning::from_delivered(
            &delivered("RSA-55555", 13_270, now),
            &WalletPolicy::default(),
        );
        assert_eq!(row.driver_earning + row.platform_share, row.travel_fee);
    }
}
