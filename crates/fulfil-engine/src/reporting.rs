//! # Reporting
//!
//! Admin accounting figures, summed by the database from delivered orders
//! and paid withdrawals on every call. Nothing is cached or materialized.

use chrono::{DateTime, Utc};
use tracing::debug;

use fulfil_core::lifecycle::authorize_admin;
use fulfil_core::report::start_of_day;
use fulfil_core::{AccountingReport, DeliveryEarning};

use crate::error::EngineResult;
use crate::session::Session;
use crate::FulfilmentEngine;

impl FulfilmentEngine {
    /// The accounting report as of now.
    pub async fn get_report(&self, session: &Session) -> EngineResult<AccountingReport> {
        self.get_report_at(session, Utc::now()).await
    }

    /// The accounting report with "today" being the UTC day of `now`.
    pub async fn get_report_at(
        &self,
        session: &Session,
        now: DateTime<Utc>,
    ) -> EngineResult<AccountingReport> {
        authorize_admin(session.role(), "view the accounting report")?;

        let reports = self.db.reports();
        let delivered = reports
            .delivery_totals(self.policy.driver_share, start_of_day(now), now)
            .await?;
        let admin_fees = reports.paid_withdrawal_fees().await?;
        let active = reports.active_consignments().await?;

        let report = AccountingReport::build(&delivered, admin_fees, active, now);
        debug!(
            delivered = report.delivered_orders,
            lifetime_revenue = %report.lifetime_platform_revenue,
            "Accounting report built"
        );
        Ok(report)
    }

    /// Most recent deliveries with their driver/platform split.
    pub async fn recent_deliveries(
        &self,
        session: &Session,
        limit: u32,
    ) -> EngineResult<Vec<DeliveryEarning>> {
        authorize_admin(session.role(), "view delivery earnings")?;

        let rows = self.db.reports().recent_deliveries(limit).await?;
        Ok(rows
            .iter()
            .map(|row| DeliveryEarning::from_delivered(row, &self.policy))
            .collect())
    }
}
