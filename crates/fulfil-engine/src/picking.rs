//! # Picking
//!
//! Claiming orders, resolving items and packing.
//!
//! ## Claim Race
//! ```text
//! Picker A ──┐                                   ┌──► 1 row  → Ok(order)
//!            ├──► UPDATE orders SET status =     │
//! Picker B ──┘      'gathering', picker_id = ?   ├──► 0 rows → re-read:
//!                   WHERE id = ? AND status =    │      picker_id = A → ClaimConflict
//!                   'pending' AND picker_id      │      picker_id = B → Ok (repeat)
//!                   IS NULL                      │      cancelled     → InvalidTransition
//! ```
//!
//! The write decides the winner; the re-read only explains why a write
//! missed.

use chrono::Utc;
use tracing::{debug, info, instrument};

use fulfil_core::lifecycle::{authorize_item_resolution, require_role};
use fulfil_core::{ItemStatus, Order, OrderAction, OrderDetail, OrderStatus, Role};
use fulfil_db::{ItemResolution, StatusChange};

use crate::error::{EngineResult, FulfilmentError};
use crate::session::Session;
use crate::{FulfilmentEngine, DEFAULT_LIST_LIMIT};

impl FulfilmentEngine {
    /// Claims a `pending` order for the session's picker (`→ gathering`).
    ///
    /// Claiming an order the caller already holds returns it unchanged.
    ///
    /// ## Errors
    /// * `ClaimConflict` - Another picker holds the order
    /// * `InvalidTransition` - The order is past `pending` or cancelled
    #[instrument(skip(self, session), fields(picker = %session.user_id()))]
    pub async fn claim_for_picking(&self, session: &Session, order_id: &str) -> EngineResult<Order> {
        OrderAction::ClaimForPicking.authorize(session.role())?;

        let mut change = StatusChange::new(OrderStatus::Pending, OrderStatus::Gathering, Utc::now());
        change.assign_picker = Some(session.user_id());
        let change = &change;

        self.retry
            .run("claim_for_picking", move || async move {
                match self.db.orders().conditional_update_status(order_id, change).await? {
                    Some(order) => {
                        info!(order_id, order_code = %order.order_code, "Order claimed for picking");
                        Ok(order)
                    }
                    None => {
                        self.explain_claim_miss(order_id, session.user_id(), OrderAction::ClaimForPicking)
                            .await
                    }
                }
            })
            .await
    }

    /// Marks a pending item as found.
    pub async fn mark_item_found(
        &self,
        session: &Session,
        item_id: &str,
    ) -> EngineResult<ItemResolution> {
        self.resolve_item(session, item_id, ItemStatus::Found).await
    }

    /// Marks a pending item as missing and refunds its line total to the
    /// customer's wallet, atomically.
    ///
    /// ## Errors
    /// * `DuplicateResolution` - The item was already found or missing; no
    ///   second refund is made
    /// * `ItemLocked` - The order is not being gathered
    /// * `Forbidden` - The order belongs to another picker
    pub async fn mark_item_missing(
        &self,
        session: &Session,
        item_id: &str,
    ) -> EngineResult<ItemResolution> {
        self.resolve_item(session, item_id, ItemStatus::Missing).await
    }

    /// Packs a fully resolved `gathering` order (`→ packed`).
    ///
    /// ## Errors
    /// * `UnresolvedItems` - Some items are still pending
    /// * `Forbidden` - The order belongs to another picker
    #[instrument(skip(self, session), fields(picker = %session.user_id()))]
    pub async fn pack_order(&self, session: &Session, order_id: &str) -> EngineResult<Order> {
        OrderAction::Pack.authorize(session.role())?;

        let mut change = StatusChange::new(OrderStatus::Gathering, OrderStatus::Packed, Utc::now());
        change.picker_is = session.owner_guard();
        change.all_items_resolved = true;
        let change = &change;

        self.retry
            .run("pack_order", move || async move {
                match self.db.orders().conditional_update_status(order_id, change).await? {
                    Some(order) => {
                        info!(order_id, waybill = %order.waybill, "Order packed");
                        Ok(order)
                    }
                    None => self.explain_pack_miss(session, order_id).await,
                }
            })
            .await
    }

    /// Unclaimed `pending` orders plus the caller's own `gathering` orders,
    /// oldest first. Admins see every `gathering` order.
    pub async fn picking_queue(&self, session: &Session) -> EngineResult<Vec<OrderDetail>> {
        require_role(session.role(), &[Role::Picker, Role::Admin], "view the picking queue")?;

        let orders = self
            .db
            .orders()
            .picking_queue(session.owner_guard(), DEFAULT_LIST_LIMIT)
            .await?;
        Ok(self.db.orders().with_items(orders).await?)
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    async fn resolve_item(
        &self,
        session: &Session,
        item_id: &str,
        next: ItemStatus,
    ) -> EngineResult<ItemResolution> {
        authorize_item_resolution(session.role())?;
        let now = Utc::now();

        self.retry
            .run("resolve_item", move || async move {
                let resolved = self
                    .db
                    .orders()
                    .resolve_item(item_id, next, session.owner_guard(), session.user_id(), now)
                    .await?;

                match resolved {
                    Some(resolution) => {
                        info!(
                            item_id,
                            status = %next,
                            refund = ?resolution.refund.as_ref().map(|t| t.amount()),
                            "Item resolved"
                        );
                        Ok(resolution)
                    }
                    None => self.explain_item_miss(session, item_id).await,
                }
            })
            .await
    }

    /// Explains why a claim write touched no rows.
    pub(crate) async fn explain_claim_miss(
        &self,
        order_id: &str,
        actor_id: &str,
        action: OrderAction,
    ) -> EngineResult<Order> {
        let order = self
            .db
            .orders()
            .get(order_id)
            .await?
            .ok_or_else(|| FulfilmentError::not_found("Order", order_id))?;

        let target = action.target();
        let holder = match action {
            OrderAction::ClaimForDelivery => order.driver_id.as_deref(),
            _ => order.picker_id.as_deref(),
        };

        if order.status == target && holder == Some(actor_id) {
            debug!(order_id, "Claim repeated by current holder");
            return Ok(order);
        }
        if order.status.is_terminal() {
            return Err(FulfilmentError::InvalidTransition {
                from: order.status,
                to: target,
            });
        }

        match holder {
            Some(other) if other != actor_id => Err(FulfilmentError::ClaimConflict {
                order_id: order_id.to_string(),
            }),
            _ if action.from_statuses().contains(&order.status) => {
                Err(FulfilmentError::PersistenceConflict(format!(
                    "order {} changed during claim",
                    order_id
                )))
            }
            _ => Err(FulfilmentError::InvalidTransition {
                from: order.status,
                to: target,
            }),
        }
    }

    async fn explain_item_miss(
        &self,
        session: &Session,
        item_id: &str,
    ) -> EngineResult<ItemResolution> {
        let item = self
            .db
            .orders()
            .get_item(item_id)
            .await?
            .ok_or_else(|| FulfilmentError::not_found("Item", item_id))?;

        if item.status != ItemStatus::Pending {
            return Err(FulfilmentError::DuplicateResolution {
                item_id: item_id.to_string(),
                status: item.status,
            });
        }

        let order = self
            .db
            .orders()
            .get(&item.order_id)
            .await?
            .ok_or_else(|| FulfilmentError::not_found("Order", &item.order_id))?;

        if order.status != OrderStatus::Gathering {
            return Err(FulfilmentError::ItemLocked {
                item_id: item_id.to_string(),
                order_status: order.status,
            });
        }
        if let Some(me) = session.owner_guard() {
            if order.picker_id.as_deref() != Some(me) {
                return Err(FulfilmentError::forbidden(
                    session.role(),
                    "resolve items on an order claimed by another picker",
                ));
            }
        }

        Err(FulfilmentError::PersistenceConflict(format!(
            "item {} changed while resolving",
            item_id
        )))
    }

    async fn explain_pack_miss(&self, session: &Session, order_id: &str) -> EngineResult<Order> {
        let detail = self
            .db
            .orders()
            .get_detail(order_id)
            .await?
            .ok_or_else(|| FulfilmentError::not_found("Order", order_id))?;

        OrderAction::Pack.apply(detail.order.status)?;

        if let Some(me) = session.owner_guard() {
            if detail.order.picker_id.as_deref() != Some(me) {
                return Err(FulfilmentError::forbidden(
                    session.role(),
                    "pack an order claimed by another picker",
                ));
            }
        }

        let pending = detail.pending_items();
        if pending > 0 {
            return Err(FulfilmentError::UnresolvedItems {
                order_id: order_id.to_string(),
                pending,
            });
        }

        Err(FulfilmentError::PersistenceConflict(format!(
            "order {} changed while packing",
            order_id
        )))
    }
}
