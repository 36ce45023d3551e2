//! # Report Repository
//!
//! Read-only queries feeding [`fulfil_core::report::AccountingReport`].
//! Nothing here writes; every figure comes from durable order and withdrawal
//! rows, summed by SQLite rather than loaded.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::error::DbResult;
use crate::repository::order::OrderRepository;
use fulfil_core::{DeliveredFee, DeliveryTotals, Money, OrderStatus, Rate};

#[derive(Debug, Clone)]
pub struct ReportRepository {
    pool: SqlitePool,
}

impl ReportRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ReportRepository { pool }
    }

    /// Sums over delivered orders.
    ///
    /// Each order's driver earning is `fee × share` rounded half-up, the same
    /// as [`Money::apply_rate`]; travel fees are never negative (schema
    /// CHECK), so integer division plus half the divisor is exact. Orders
    /// delivered in `day_start..=now` also count toward today's revenue.
    pub async fn delivery_totals(
        &self,
        driver_share: Rate,
        day_start: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> DbResult<DeliveryTotals> {
        let totals = sqlx::query_as(
            r#"
            SELECT
                COUNT(*) AS delivered_orders,
                COALESCE(SUM(travel_fee_cents), 0) AS travel_fee_cents,
                COALESCE(SUM(travel_fee_cents - (travel_fee_cents * ?1 + 5000) / 10000), 0)
                    AS platform_revenue_cents,
                COALESCE(SUM(CASE WHEN delivered_at >= ?2 AND delivered_at <= ?3
                    THEN travel_fee_cents - (travel_fee_cents * ?1 + 5000) / 10000
                    ELSE 0 END), 0) AS today_platform_revenue_cents
            FROM orders
            WHERE status = 'delivered' AND delivered_at IS NOT NULL
            "#,
        )
        .bind(driver_share.bps() as i64)
        .bind(day_start)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(totals)
    }

    /// Most recent deliveries first.
    pub async fn recent_deliveries(&self, limit: u32) -> DbResult<Vec<DeliveredFee>> {
        let rows = sqlx::query_as(
            r#"
            SELECT order_code, travel_fee_cents, delivered_at
            FROM orders
            WHERE status = 'delivered' AND delivered_at IS NOT NULL
            ORDER BY delivered_at DESC, rowid DESC
            LIMIT ?1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Σ frozen fee over `paid` withdrawals.
    pub async fn paid_withdrawal_fees(&self) -> DbResult<Money> {
        let cents: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(fee_cents), 0) FROM withdrawal_requests WHERE status = 'paid'",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(Money::from_cents(cents))
    }

    /// Orders in any non-terminal status.
    pub async fn active_consignments(&self) -> DbResult<i64> {
        OrderRepository::new(self.pool.clone())
            .count_by_status(&OrderStatus::ACTIVE)
            .await
    }
}
