//! # Delivery
//!
//! Drivers claim packed orders and complete them. Completion credits the
//! driver's share of the travel fee in the same transaction as the status
//! change, so an order is never delivered without its earning (or paid
//! twice: the ledger allows one earning per order).

use chrono::Utc;
use tracing::{debug, info, instrument};

use fulfil_core::lifecycle::require_role;
use fulfil_core::{Order, OrderAction, OrderDetail, OrderStatus, Role, TransactionKind};
use fulfil_db::{DeliveryCompletion, StatusChange};

use crate::error::{EngineResult, FulfilmentError};
use crate::session::Session;
use crate::{FulfilmentEngine, DEFAULT_LIST_LIMIT};

impl FulfilmentEngine {
    /// Claims a `packed` order for the session's driver (`→ in_transit`).
    ///
    /// ## Errors
    /// * `ClaimConflict` - Another driver holds the order
    /// * `InvalidTransition` - The order is not packed
    #[instrument(skip(self, session), fields(driver = %session.user_id()))]
    pub async fn claim_for_delivery(&self, session: &Session, order_id: &str) -> EngineResult<Order> {
        OrderAction::ClaimForDelivery.authorize(session.role())?;

        let mut change = StatusChange::new(OrderStatus::Packed, OrderStatus::InTransit, Utc::now());
        change.assign_driver = Some(session.user_id());
        let change = &change;

        self.retry
            .run("claim_for_delivery", move || async move {
                match self.db.orders().conditional_update_status(order_id, change).await? {
                    Some(order) => {
                        info!(order_id, waybill = %order.waybill, "Order out for delivery");
                        Ok(order)
                    }
                    None => {
                        self.explain_claim_miss(order_id, session.user_id(), OrderAction::ClaimForDelivery)
                            .await
                    }
                }
            })
            .await
    }

    /// Marks an `in_transit` order delivered and credits the driver.
    ///
    /// Repeating the call for an order the caller already delivered returns
    /// the original completion.
    #[instrument(skip(self, session), fields(driver = %session.user_id()))]
    pub async fn complete_delivery(
        &self,
        session: &Session,
        order_id: &str,
    ) -> EngineResult<DeliveryCompletion> {
        OrderAction::CompleteDelivery.authorize(session.role())?;

        self.retry
            .run("complete_delivery", move || self.complete_delivery_once(session, order_id))
            .await
    }

    /// `packed` orders waiting for a driver, oldest first.
    pub async fn delivery_queue(&self, session: &Session) -> EngineResult<Vec<OrderDetail>> {
        require_role(session.role(), &[Role::Driver, Role::Admin], "view the delivery queue")?;

        let orders = self
            .db
            .orders()
            .list_by_status(&[OrderStatus::Packed], DEFAULT_LIST_LIMIT)
            .await?;
        Ok(self.db.orders().with_items(orders).await?)
    }

    /// Orders the driver is currently delivering. Admins see every
    /// `in_transit` order.
    pub async fn active_route(&self, session: &Session) -> EngineResult<Vec<OrderDetail>> {
        require_role(session.role(), &[Role::Driver, Role::Admin], "view active deliveries")?;

        let orders = match session.owner_guard() {
            Some(driver_id) => {
                self.db
                    .orders()
                    .list_for_driver(driver_id, OrderStatus::InTransit, DEFAULT_LIST_LIMIT)
                    .await?
            }
            None => {
                self.db
                    .orders()
                    .list_by_status(&[OrderStatus::InTransit], DEFAULT_LIST_LIMIT)
                    .await?
            }
        };
        Ok(self.db.orders().with_items(orders).await?)
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    async fn complete_delivery_once(
        &self,
        session: &Session,
        order_id: &str,
    ) -> EngineResult<DeliveryCompletion> {
        let order = self
            .db
            .orders()
            .get(order_id)
            .await?
            .ok_or_else(|| FulfilmentError::not_found("Order", order_id))?;

        // The fee is frozen, so reading it before the write is safe
        let split = self.policy.split_delivery(order.travel_fee());

        let completed = self
            .db
            .orders()
            .complete_delivery(order_id, session.owner_guard(), split.driver_earning, Utc::now())
            .await?;

        if let Some(done) = completed {
            info!(
                order_id,
                earning = %done.earning.amount(),
                platform_share = %split.platform_share,
                "Order delivered"
            );
            return Ok(done);
        }

        self.explain_delivery_miss(session, order_id).await
    }

    async fn explain_delivery_miss(
        &self,
        session: &Session,
        order_id: &str,
    ) -> EngineResult<DeliveryCompletion> {
        let order = self
            .db
            .orders()
            .get(order_id)
            .await?
            .ok_or_else(|| FulfilmentError::not_found("Order", order_id))?;

        let owns = session.is_admin() || order.driver_id.as_deref() == Some(session.user_id());

        if order.status == OrderStatus::Delivered && owns {
            let earning = self
                .db
                .wallet()
                .transactions_for_order(order_id)
                .await?
                .into_iter()
                .find(|t| t.kind == TransactionKind::Earning);

            if let Some(earning) = earning {
                debug!(order_id, "Delivery already completed");
                return Ok(DeliveryCompletion { order, earning });
            }
        }

        OrderAction::CompleteDelivery.apply(order.status)?;

        if !owns {
            return Err(FulfilmentError::forbidden(
                session.role(),
                "complete a delivery assigned to another driver",
            ));
        }

        Err(FulfilmentError::PersistenceConflict(format!(
            "order {} changed while completing delivery",
            order_id
        )))
    }
}
