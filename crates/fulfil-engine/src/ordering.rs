//! # Ordering
//!
//! Placing, cancelling and viewing orders.
//!
//! ## Placing an Order
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. Validate cart, address and contact             (no I/O)            │
//! │  2. Resolve coordinates → distance → travel fee    (LocationProvider)  │
//! │  3. Compute subtotal, VAT, total                   (no I/O)            │
//! │  4. Authorize the total                            (PaymentGateway)    │
//! │  5. Generate order code + waybill                                      │
//! │  6. INSERT order + items in one transaction                            │
//! │        └─ code collision? back to 5 (bounded)                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Nothing is written until step 6, so a declined payment or an unknown
//! location leaves no trace.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use fulfil_core::checkout::validate_cart;
use fulfil_core::codes::{generate_order_code, generate_waybill, new_entity_id};
use fulfil_core::lifecycle::require_role;
use fulfil_core::validation::{
    validate_contact, validate_coordinates, validate_delivery_address, validate_distance_km,
};
use fulfil_core::{
    CartLine, Coordinates, DistanceKm, FeeQuote, ItemStatus, Order, OrderAction, OrderDetail,
    OrderItem, OrderStatus, OrderTotals, PaymentMethod, Role,
};
use fulfil_db::StatusChange;

use crate::collaborators::PaymentAuthorization;
use crate::error::{EngineResult, FulfilmentError};
use crate::session::Session;
use crate::{FulfilmentEngine, DEFAULT_LIST_LIMIT};

/// Attempts at finding an unused order code and waybill.
const MAX_CODE_ATTEMPTS: u32 = 5;

/// Everything a customer submits at checkout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceOrderRequest {
    pub lines: Vec<CartLine>,
    pub delivery_address: String,

    /// Known delivery position; when absent the location provider is asked.
    #[serde(default)]
    pub coordinates: Option<Coordinates>,

    /// Distance to use when no coordinates can be resolved.
    #[serde(default)]
    pub fallback_distance_km: Option<f64>,

    #[serde(default)]
    pub recipient_name: Option<String>,

    #[serde(default)]
    pub recipient_phone: Option<String>,

    pub payment_method: PaymentMethod,
}

impl PlaceOrderRequest {
    pub fn new(
        lines: Vec<CartLine>,
        delivery_address: impl Into<String>,
        payment_method: PaymentMethod,
    ) -> Self {
        PlaceOrderRequest {
            lines,
            delivery_address: delivery_address.into(),
            coordinates: None,
            fallback_distance_km: None,
            recipient_name: None,
            recipient_phone: None,
            payment_method,
        }
    }

    pub fn with_coordinates(mut self, coordinates: Coordinates) -> Self {
        self.coordinates = Some(coordinates);
        self
    }

    pub fn with_fallback_distance(mut self, km: f64) -> Self {
        self.fallback_distance_km = Some(km);
        self
    }

    pub fn with_recipient(mut self, name: impl Into<String>, phone: impl Into<String>) -> Self {
        self.recipient_name = Some(name.into());
        self.recipient_phone = Some(phone.into());
        self
    }
}

impl FulfilmentEngine {
    /// Places an order for the session's customer.
    ///
    /// ## Errors
    /// * `Validation` - Empty cart, bad line, address or contact
    /// * `LocationUnavailable` - No coordinates and no fallback distance
    /// * `PaymentDeclined` - The gateway refused the total
    #[instrument(skip(self, session, request), fields(customer = %session.user_id()))]
    pub async fn place_order(
        &self,
        session: &Session,
        request: PlaceOrderRequest,
    ) -> EngineResult<OrderDetail> {
        require_role(session.role(), &[Role::Customer], "place an order")?;

        validate_cart(&request.lines)?;
        let address = validate_delivery_address(&request.delivery_address)?;
        let recipient_name = validate_contact("recipient_name", request.recipient_name.as_deref())?;
        let recipient_phone =
            validate_contact("recipient_phone", request.recipient_phone.as_deref())?;

        let (coordinates, quote) = self
            .resolve_delivery(&address, request.coordinates, request.fallback_distance_km)
            .await?;
        let totals = OrderTotals::compute(&request.lines, self.vat_rate, quote.travel_fee)?;

        let authorization = self
            .payments
            .authorize(totals.total, request.payment_method)
            .await
            .map_err(|e| {
                warn!(total = %totals.total, error = %e, "Payment not authorized");
                FulfilmentError::PaymentDeclined(e.to_string())
            })?;

        let now = Utc::now();
        let order_id = new_entity_id();

        let items: Vec<OrderItem> = request
            .lines
            .iter()
            .map(|line| OrderItem {
                id: new_entity_id(),
                order_id: order_id.clone(),
                product_id: line.product_id.clone(),
                name_snapshot: line.name.clone(),
                store_id: line.store_id.clone(),
                quantity: line.quantity,
                unit_price_cents: line.unit_price_cents,
                status: ItemStatus::Pending,
                resolved_by: None,
                resolved_at: None,
            })
            .collect();

        let mut order = Order {
            id: order_id,
            order_code: String::new(),
            waybill: String::new(),
            customer_id: session.user_id().to_string(),
            status: OrderStatus::Pending,
            subtotal_cents: totals.subtotal.cents(),
            vat_cents: totals.vat.cents(),
            travel_fee_cents: totals.travel_fee.cents(),
            total_cents: totals.total.cents(),
            delivery_address: address,
            delivery_lat: coordinates.map(|c| c.lat),
            delivery_lng: coordinates.map(|c| c.lng),
            distance_tenths: quote.distance.tenths(),
            recipient_name,
            recipient_phone,
            payment_method: request.payment_method,
            payment_reference: Some(authorization.reference.clone()),
            picker_id: None,
            driver_id: None,
            created_at: now,
            updated_at: now,
            packed_at: None,
            delivered_at: None,
            cancelled_at: None,
        };

        if let Err(e) = self.insert_with_fresh_codes(&mut order, &items).await {
            self.release_authorization(&authorization, &e).await;
            return Err(e);
        }

        info!(
            order_id = %order.id,
            order_code = %order.order_code,
            total = %totals.total,
            distance = %quote.distance,
            "Order placed"
        );

        Ok(OrderDetail { order, items })
    }

    /// Cancels a `pending` or `gathering` order. Customers may only cancel
    /// their own; admins any.
    #[instrument(skip(self, session), fields(actor = %session.user_id()))]
    pub async fn cancel_order(&self, session: &Session, order_id: &str) -> EngineResult<Order> {
        OrderAction::Cancel.authorize(session.role())?;
        self.retry
            .run("cancel_order", move || self.cancel_once(session, order_id))
            .await
    }

    /// One order with its items. Customers only see their own.
    pub async fn get_order(&self, session: &Session, order_id: &str) -> EngineResult<OrderDetail> {
        let detail = self
            .db
            .orders()
            .get_detail(order_id)
            .await?
            .ok_or_else(|| FulfilmentError::not_found("Order", order_id))?;

        if session.role() == Role::Customer && detail.order.customer_id != session.user_id() {
            return Err(FulfilmentError::not_found("Order", order_id));
        }
        Ok(detail)
    }

    /// A customer's orders, newest first.
    ///
    /// Customers may only read their own history; admins anyone's.
    pub async fn get_order_history(
        &self,
        session: &Session,
        customer_id: &str,
    ) -> EngineResult<Vec<OrderDetail>> {
        let own = session.role() == Role::Customer && session.user_id() == customer_id;
        if !own && !session.is_admin() {
            return Err(FulfilmentError::forbidden(
                session.role(),
                "read another customer's order history",
            ));
        }

        let orders = self
            .db
            .orders()
            .list_for_customer(customer_id, DEFAULT_LIST_LIMIT)
            .await?;
        debug!(customer_id, count = orders.len(), "Loaded order history");
        Ok(self.db.orders().with_items(orders).await?)
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    /// Distance and fee for the delivery, with the coordinates they came from.
    async fn resolve_delivery(
        &self,
        address: &str,
        coordinates: Option<Coordinates>,
        fallback_km: Option<f64>,
    ) -> EngineResult<(Option<Coordinates>, FeeQuote)> {
        let resolved = match coordinates {
            Some(coordinates) => Some(coordinates),
            None => match self.location.resolve_coordinates(address).await {
                Ok(coordinates) => Some(coordinates),
                Err(e) => {
                    warn!(error = %e, "Could not resolve delivery coordinates");
                    None
                }
            },
        };

        if let Some(coordinates) = resolved {
            validate_coordinates(coordinates)?;
            return Ok((Some(coordinates), self.fees.quote(coordinates)));
        }

        match fallback_km {
            Some(km) => {
                validate_distance_km(km)?;
                Ok((None, self.fees.quote_for_distance(DistanceKm::from_km(km))))
            }
            None => Err(FulfilmentError::LocationUnavailable(format!(
                "no coordinates for '{}' and no fallback distance",
                address
            ))),
        }
    }

    /// Voids the authorization of an order that could not be stored. A failed
    /// void leaves the reference in the log for manual reconciliation.
    async fn release_authorization(
        &self,
        authorization: &PaymentAuthorization,
        cause: &FulfilmentError,
    ) {
        warn!(
            payment_reference = %authorization.reference,
            error = %cause,
            "Order not stored, voiding payment authorization"
        );
        if let Err(e) = self.payments.void(authorization).await {
            warn!(
                payment_reference = %authorization.reference,
                error = %e,
                "Could not void authorization, reconcile manually"
            );
        }
    }

    /// Inserts the order, drawing a new code and waybill after each collision.
    async fn insert_with_fresh_codes(
        &self,
        order: &mut Order,
        items: &[OrderItem],
    ) -> EngineResult<()> {
        for attempt in 1..=MAX_CODE_ATTEMPTS {
            {
                let mut rng = rand::thread_rng();
                order.order_code = generate_order_code(&mut rng);
                order.waybill = generate_waybill(&mut rng);
            }

            let pending: &Order = order;
            let result = self
                .retry
                .run("insert_order", move || async move {
                    Ok(self.db.orders().insert(pending, items).await?)
                })
                .await;

            match result {
                Err(FulfilmentError::Database(e))
                    if e.is_unique_violation_on("order_code") || e.is_unique_violation_on("waybill") =>
                {
                    warn!(attempt, order_code = %order.order_code, "Order code collision, regenerating");
                }
                other => return other,
            }
        }

        Err(FulfilmentError::PersistenceConflict(format!(
            "no unused order code after {} attempts",
            MAX_CODE_ATTEMPTS
        )))
    }

    async fn cancel_once(&self, session: &Session, order_id: &str) -> EngineResult<Order> {
        let order = self
            .db
            .orders()
            .get(order_id)
            .await?
            .ok_or_else(|| FulfilmentError::not_found("Order", order_id))?;

        if session.role() == Role::Customer && order.customer_id != session.user_id() {
            return Err(FulfilmentError::forbidden(
                session.role(),
                "cancel another customer's order",
            ));
        }

        let target = OrderAction::Cancel.apply(order.status)?;
        let mut change = StatusChange::new(order.status, target, Utc::now());
        if !session.is_admin() {
            change.customer_is = Some(session.user_id());
        }

        match self.db.orders().conditional_update_status(order_id, &change).await? {
            Some(cancelled) => {
                info!(order_id, from = %order.status, "Order cancelled");
                Ok(cancelled)
            }
            None => Err(FulfilmentError::PersistenceConflict(format!(
                "order {} changed while cancelling",
                order_id
            ))),
        }
    }
}
