//! # Order Repository
//!
//! Orders, their items, and every conditional write that moves them through
//! the lifecycle.
//!
//! ## Conditional Writes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Every transition is ONE statement guarded by the expected state:      │
//! │                                                                         │
//! │   UPDATE orders SET status = 'gathering', picker_id = ?                │
//! │   WHERE id = ? AND status = 'pending' AND picker_id IS NULL            │
//! │   RETURNING ...                                                         │
//! │                                                                         │
//! │   row returned  ──► this caller won the claim                          │
//! │   no row        ──► someone else moved it first (caller classifies:    │
//! │                     NotFound / ClaimConflict / InvalidTransition)       │
//! │                                                                         │
//! │  Money side effects share the transaction with the guarded write:      │
//! │   • item → missing      + refund credit to the customer                │
//! │   • in_transit → delivered + earning credit to the driver              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use crate::repository::wallet::{apply_entry, LedgerEntry};
use fulfil_core::{
    ItemStatus, Money, Order, OrderDetail, OrderItem, OrderStatus, TransactionKind,
    WalletTransaction,
};

const ORDER_COLUMNS: &str = "id, order_code, waybill, customer_id, status, \
     subtotal_cents, vat_cents, travel_fee_cents, total_cents, \
     delivery_address, delivery_lat, delivery_lng, distance_tenths, \
     recipient_name, recipient_phone, payment_method, payment_reference, \
     picker_id, driver_id, created_at, updated_at, packed_at, delivered_at, cancelled_at";

const ITEM_COLUMNS: &str = "id, order_id, product_id, name_snapshot, store_id, quantity, \
     unit_price_cents, status, resolved_by, resolved_at";

// =============================================================================
// Transition Parameters
// =============================================================================

/// Guards and assignments for a conditional status update.
///
/// `None` guards are not checked; an admin acting on an order passes `None`
/// for ownership.
#[derive(Debug, Clone, Copy)]
pub struct StatusChange<'a> {
    pub expected: OrderStatus,
    pub next: OrderStatus,
    /// Set `picker_id`; requires it to be unset.
    pub assign_picker: Option<&'a str>,
    /// Set `driver_id`; requires it to be unset.
    pub assign_driver: Option<&'a str>,
    /// Require `picker_id` to equal this.
    pub picker_is: Option<&'a str>,
    /// Require `driver_id` to equal this.
    pub driver_is: Option<&'a str>,
    /// Require `customer_id` to equal this.
    pub customer_is: Option<&'a str>,
    /// Require every item to be found or missing.
    pub all_items_resolved: bool,
    pub at: DateTime<Utc>,
}

impl<'a> StatusChange<'a> {
    pub fn new(expected: OrderStatus, next: OrderStatus, at: DateTime<Utc>) -> Self {
        StatusChange {
            expected,
            next,
            assign_picker: None,
            assign_driver: None,
            picker_is: None,
            driver_is: None,
            customer_is: None,
            all_items_resolved: false,
            at,
        }
    }

    /// Column stamped with `at` when landing on `next`.
    fn timestamp_column(&self) -> Option<&'static str> {
        match self.next {
            OrderStatus::Packed => Some("packed_at"),
            OrderStatus::Delivered => Some("delivered_at"),
            OrderStatus::Cancelled => Some("cancelled_at"),
            _ => None,
        }
    }
}

/// Result of resolving one item.
#[derive(Debug, Clone)]
pub struct ItemResolution {
    pub item: OrderItem,
    /// The refund credited when the item was marked missing.
    pub refund: Option<WalletTransaction>,
}

/// Result of completing a delivery.
#[derive(Debug, Clone)]
pub struct DeliveryCompletion {
    pub order: Order,
    pub earning: WalletTransaction,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for order database operations.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    /// Creates a new OrderRepository.
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    // -------------------------------------------------------------------------
    // Creation
    // -------------------------------------------------------------------------

    /// Inserts an order and all of its items atomically.
    ///
    /// ## Errors
    /// `DbError::UniqueViolation` on an order code or waybill collision; nothing
    /// is written and the caller may regenerate the codes and retry.
    pub async fn insert(&self, order: &Order, items: &[OrderItem]) -> DbResult<()> {
        debug!(id = %order.id, order_code = %order.order_code, items = items.len(), "Inserting order");

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO orders (
                id, order_code, waybill, customer_id, status,
                subtotal_cents, vat_cents, travel_fee_cents, total_cents,
                delivery_address, delivery_lat, delivery_lng, distance_tenths,
                recipient_name, recipient_phone, payment_method, payment_reference,
                picker_id, driver_id, created_at, updated_at,
                packed_at, delivered_at, cancelled_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5,
                ?6, ?7, ?8, ?9,
                ?10, ?11, ?12, ?13,
                ?14, ?15, ?16, ?17,
                ?18, ?19, ?20, ?21,
                ?22, ?23, ?24
            )
            "#,
        )
        .bind(&order.id)
        .bind(&order.order_code)
        .bind(&order.waybill)
        .bind(&order.customer_id)
        .bind(order.status)
        .bind(order.subtotal_cents)
        .bind(order.vat_cents)
        .bind(order.travel_fee_cents)
        .bind(order.total_cents)
        .bind(&order.delivery_address)
        .bind(order.delivery_lat)
        .bind(order.delivery_lng)
        .bind(order.distance_tenths)
        .bind(&order.recipient_name)
        .bind(&order.recipient_phone)
        .bind(order.payment_method)
        .bind(&order.payment_reference)
        .bind(&order.picker_id)
        .bind(&order.driver_id)
        .bind(order.created_at)
        .bind(order.updated_at)
        .bind(order.packed_at)
        .bind(order.delivered_at)
        .bind(order.cancelled_at)
        .execute(&mut *tx)
        .await?;

        for item in items {
            insert_item(&mut tx, item).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------------

    /// Gets an order by ID.
    pub async fn get(&self, id: &str) -> DbResult<Option<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?1");
        let order = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(order)
    }

    /// Gets an order by its human-readable code.
    pub async fn get_by_code(&self, order_code: &str) -> DbResult<Option<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE order_code = ?1");
        let order = sqlx::query_as(&sql)
            .bind(order_code)
            .fetch_optional(&self.pool)
            .await?;
        Ok(order)
    }

    /// Items of an order in insertion order.
    pub async fn items(&self, order_id: &str) -> DbResult<Vec<OrderItem>> {
        let sql = format!("SELECT {ITEM_COLUMNS} FROM order_items WHERE order_id = ?1 ORDER BY rowid");
        let items = sqlx::query_as(&sql)
            .bind(order_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(items)
    }

    /// Gets one item by ID.
    pub async fn get_item(&self, item_id: &str) -> DbResult<Option<OrderItem>> {
        let sql = format!("SELECT {ITEM_COLUMNS} FROM order_items WHERE id = ?1");
        let item = sqlx::query_as(&sql)
            .bind(item_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(item)
    }

    /// Order with its items.
    pub async fn get_detail(&self, id: &str) -> DbResult<Option<OrderDetail>> {
        let Some(order) = self.get(id).await? else {
            return Ok(None);
        };
        let items = self.items(id).await?;
        Ok(Some(OrderDetail { order, items }))
    }

    /// Attaches items to each order.
    pub async fn with_items(&self, orders: Vec<Order>) -> DbResult<Vec<OrderDetail>> {
        let mut details = Vec::with_capacity(orders.len());
        for order in orders {
            let items = self.items(&order.id).await?;
            details.push(OrderDetail { order, items });
        }
        Ok(details)
    }

    /// A customer's orders, newest first.
    pub async fn list_for_customer(&self, customer_id: &str, limit: u32) -> DbResult<Vec<Order>> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE customer_id = ?1 \
             ORDER BY created_at DESC, rowid DESC LIMIT ?2"
        );
        let orders = sqlx::query_as(&sql)
            .bind(customer_id)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;
        Ok(orders)
    }

    /// Orders in any of `statuses`, oldest first (queue order).
    pub async fn list_by_status(&self, statuses: &[OrderStatus], limit: u32) -> DbResult<Vec<Order>> {
        if statuses.is_empty() {
            return Ok(Vec::new());
        }

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE status IN ("
        ));
        let mut list = qb.separated(", ");
        for status in statuses {
            list.push_bind(*status);
        }
        qb.push(") ORDER BY created_at, rowid LIMIT ");
        qb.push_bind(limit as i64);

        let orders = qb.build_query_as().fetch_all(&self.pool).await?;
        Ok(orders)
    }

    /// Work visible to a picker: unclaimed `pending` orders plus the
    /// `gathering` orders they own (all of them when `picker_id` is `None`).
    pub async fn picking_queue(&self, picker_id: Option<&str>, limit: u32) -> DbResult<Vec<Order>> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders \
             WHERE status = 'pending' \
                OR (status = 'gathering' AND (?1 IS NULL OR picker_id = ?1)) \
             ORDER BY created_at, rowid LIMIT ?2"
        );
        let orders = sqlx::query_as(&sql)
            .bind(picker_id)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;
        Ok(orders)
    }

    /// Orders assigned to a driver in the given status.
    pub async fn list_for_driver(
        &self,
        driver_id: &str,
        status: OrderStatus,
        limit: u32,
    ) -> DbResult<Vec<Order>> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE driver_id = ?1 AND status = ?2 \
             ORDER BY updated_at DESC, rowid DESC LIMIT ?3"
        );
        let orders = sqlx::query_as(&sql)
            .bind(driver_id)
            .bind(status)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;
        Ok(orders)
    }

    // -------------------------------------------------------------------------
    // Conditional transitions
    // -------------------------------------------------------------------------

    /// Moves an order from `change.expected` to `change.next` if every guard
    /// holds, in a single statement.
    ///
    /// ## Returns
    /// * `Ok(Some(order))` - The updated order
    /// * `Ok(None)` - A guard failed; nothing changed
    pub async fn conditional_update_status(
        &self,
        order_id: &str,
        change: &StatusChange<'_>,
    ) -> DbResult<Option<Order>> {
        let mut conn = self.pool.acquire().await?;
        conditional_update(&mut conn, order_id, change).await
    }

    /// Resolves a `pending` item to `found` or `missing`.
    ///
    /// The item update only applies while the order is `gathering` (and owned
    /// by `picker_id`, when given). Marking missing credits the customer
    /// `unit_price × quantity` in the same transaction.
    ///
    /// ## Returns
    /// * `Ok(Some(resolution))` - Item resolved (plus refund when missing)
    /// * `Ok(None)` - Item already resolved, or the order is not gathering
    ///   under this picker; nothing changed
    pub async fn resolve_item(
        &self,
        item_id: &str,
        next: ItemStatus,
        picker_id: Option<&str>,
        resolved_by: &str,
        at: DateTime<Utc>,
    ) -> DbResult<Option<ItemResolution>> {
        debug!(item_id = %item_id, status = %next, "Resolving item");

        let mut tx = self.pool.begin().await?;

        let sql = format!(
            r#"
            UPDATE order_items
            SET status = ?2, resolved_by = ?3, resolved_at = ?4
            WHERE id = ?1
              AND status = 'pending'
              AND EXISTS (
                  SELECT 1 FROM orders o
                  WHERE o.id = order_items.order_id
                    AND o.status = 'gathering'
                    AND (?5 IS NULL OR o.picker_id = ?5)
              )
            RETURNING {ITEM_COLUMNS}
            "#
        );

        let item: Option<OrderItem> = sqlx::query_as(&sql)
            .bind(item_id)
            .bind(next)
            .bind(resolved_by)
            .bind(at)
            .bind(picker_id)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(item) = item else {
            tx.rollback().await?;
            return Ok(None);
        };

        let refund = if next == ItemStatus::Missing {
            let customer_id: String =
                sqlx::query_scalar("SELECT customer_id FROM orders WHERE id = ?1")
                    .bind(&item.order_id)
                    .fetch_one(&mut *tx)
                    .await?;

            let entry = LedgerEntry::new(
                &customer_id,
                TransactionKind::Refund,
                item.line_total(),
                format!("Refund: {} x{} unavailable", item.name_snapshot, item.quantity),
                at,
            )
            .for_order(&item.order_id);

            Some(apply_entry(&mut tx, &entry).await?)
        } else {
            None
        };

        tx.commit().await?;
        Ok(Some(ItemResolution { item, refund }))
    }

    /// Moves `in_transit → delivered` and credits the driver's earning in the
    /// same transaction.
    ///
    /// `driver_id` is the ownership guard (`None` for an admin); the earning
    /// always goes to the order's assigned driver.
    pub async fn complete_delivery(
        &self,
        order_id: &str,
        driver_id: Option<&str>,
        earning: Money,
        at: DateTime<Utc>,
    ) -> DbResult<Option<DeliveryCompletion>> {
        debug!(order_id = %order_id, earning = %earning, "Completing delivery");

        let mut tx = self.pool.begin().await?;

        let mut change = StatusChange::new(OrderStatus::InTransit, OrderStatus::Delivered, at);
        change.driver_is = driver_id;

        let Some(order) = conditional_update(&mut tx, order_id, &change).await? else {
            tx.rollback().await?;
            return Ok(None);
        };

        // Guaranteed by the schema CHECK on in_transit/delivered rows
        let assigned = order.driver_id.clone().unwrap_or_default();

        let entry = LedgerEntry::new(
            &assigned,
            TransactionKind::Earning,
            earning,
            format!("Delivery earning: {}", order.order_code),
            at,
        )
        .for_order(&order.id);
        let earning = apply_entry(&mut tx, &entry).await?;

        tx.commit().await?;
        Ok(Some(DeliveryCompletion { order, earning }))
    }

    /// Counts orders in any of `statuses`.
    pub async fn count_by_status(&self, statuses: &[OrderStatus]) -> DbResult<i64> {
        if statuses.is_empty() {
            return Ok(0);
        }

        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT COUNT(*) FROM orders WHERE status IN (");
        let mut list = qb.separated(", ");
        for status in statuses {
            list.push_bind(*status);
        }
        qb.push(")");

        let count: i64 = qb.build_query_scalar().fetch_one(&self.pool).await?;
        Ok(count)
    }
}

// =============================================================================
// Statement helpers
// =============================================================================

async fn insert_item(conn: &mut SqliteConnection, item: &OrderItem) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO order_items (
            id, order_id, product_id, name_snapshot, store_id,
            quantity, unit_price_cents, status, resolved_by, resolved_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
    )
    .bind(&item.id)
    .bind(&item.order_id)
    .bind(&item.product_id)
    .bind(&item.name_snapshot)
    .bind(&item.store_id)
    .bind(item.quantity)
    .bind(item.unit_price_cents)
    .bind(item.status)
    .bind(&item.resolved_by)
    .bind(item.resolved_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Builds and runs the guarded `UPDATE ... RETURNING`.
async fn conditional_update(
    conn: &mut SqliteConnection,
    order_id: &str,
    change: &StatusChange<'_>,
) -> DbResult<Option<Order>> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE orders SET status = ");
    qb.push_bind(change.next);
    qb.push(", updated_at = ");
    qb.push_bind(change.at);

    if let Some(column) = change.timestamp_column() {
        qb.push(format!(", {column} = "));
        qb.push_bind(change.at);
    }
    if let Some(picker) = change.assign_picker {
        qb.push(", picker_id = ");
        qb.push_bind(picker.to_string());
    }
    if let Some(driver) = change.assign_driver {
        qb.push(", driver_id = ");
        qb.push_bind(driver.to_string());
    }

    qb.push(" WHERE id = ");
    qb.push_bind(order_id.to_string());
    qb.push(" AND status = ");
    qb.push_bind(change.expected);

    if change.assign_picker.is_some() {
        qb.push(" AND picker_id IS NULL");
    }
    if change.assign_driver.is_some() {
        qb.push(" AND driver_id IS NULL");
    }
    if let Some(picker) = change.picker_is {
        qb.push(" AND picker_id = ");
        qb.push_bind(picker.to_string());
    }
    if let Some(driver) = change.driver_is {
        qb.push(" AND driver_id = ");
        qb.push_bind(driver.to_string());
    }
    if let Some(customer) = change.customer_is {
        qb.push(" AND customer_id = ");
        qb.push_bind(customer.to_string());
    }
    if change.all_items_resolved {
        qb.push(
            " AND NOT EXISTS (SELECT 1 FROM order_items i \
             WHERE i.order_id = orders.id AND i.status = 'pending')",
        );
    }

    qb.push(format!(" RETURNING {ORDER_COLUMNS}"));

    let order: Option<Order> = qb.build_query_as().fetch_optional(&mut *conn).await?;

    match &order {
        Some(o) => debug!(
            order_id = %o.id,
            from = %change.expected,
            to = %o.status,
            "Order transitioned"
        ),
        None => debug!(
            order_id = %order_id,
            from = %change.expected,
            to = %change.next,
            "Conditional update matched no row"
        ),
    }

    Ok(order)
}

// =============================================================================
// Unit Tests
// =============================================================================
