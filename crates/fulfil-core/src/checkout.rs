//! # Checkout
//!
//! Turns cart lines into frozen order totals.
//!
//! ```text
//!   Σ unit_price × qty  ──► subtotal ──► VAT (15%, half-up) ─┐
//!                                                            ├──► total
//!   FeeSchedule quote   ──────────────► travel fee ──────────┘
//! ```
//!
//! Totals are computed once, before the order is written, and never again.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::{Money, Rate};
use crate::validation::{validate_cart_size, validate_price_cents, validate_quantity, validate_required};

/// One cart line as submitted by the customer.
///
/// Name and price are the catalog values at checkout; they are copied into the
/// order item and never re-read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CartLine {
    pub product_id: String,
    pub name: String,
    pub store_id: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
}

impl CartLine {
    pub fn new(
        product_id: impl Into<String>,
        name: impl Into<String>,
        store_id: impl Into<String>,
        quantity: i64,
        unit_price: Money,
    ) -> Self {
        CartLine {
            product_id: product_id.into(),
            name: name.into(),
            store_id: store_id.into(),
            quantity,
            unit_price_cents: unit_price.cents(),
        }
    }

    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.unit_price_cents).multiply_quantity(self.quantity)
    }
}

/// The four frozen money fields of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderTotals {
    pub subtotal: Money,
    pub vat: Money,
    pub travel_fee: Money,
    pub total: Money,
}

impl OrderTotals {
    /// Validates the cart and computes totals.
    ///
    /// ## Example
    /// ```rust
    /// use fulfil_core::checkout::{CartLine, OrderTotals};
    /// use fulfil_core::money::{Money, Rate};
    ///
    /// let cart = vec![CartLine::new("p1", "Maize meal 5kg", "s1", 2, Money::from_cents(10_000))];
    /// let totals = OrderTotals::compute(&cart, Rate::from_bps(1500), Money::from_cents(13_270)).unwrap();
    /// assert_eq!(totals.total.cents(), 36_270); // R362.70
    /// ```
    pub fn compute(lines: &[CartLine], vat_rate: Rate, travel_fee: Money) -> CoreResult<Self> {
        validate_cart(lines)?;

        let subtotal: Money = lines.iter().map(CartLine::line_total).sum();
        let vat = subtotal.apply_rate(vat_rate);

        Ok(OrderTotals {
            subtotal,
            vat,
            travel_fee,
            total: subtotal + vat + travel_fee,
        })
    }
}

/// Checks every line before any money is computed.
pub fn validate_cart(lines: &[CartLine]) -> CoreResult<()> {
    if lines.is_empty() {
        return Err(CoreError::EmptyCart);
    }
    if validate_cart_size(lines.len()).is_err() {
        return Err(CoreError::CartTooLarge {
            max: crate::MAX_ORDER_ITEMS,
        });
    }
    for line in lines {
        validate_required("product_id", &line.product_id)?;
        validate_required("name", &line.name)?;
        validate_required("store_id", &line.store_id)?;
        validate_quantity(line.quantity)?;
        validate_price_cents(line.unit_price_cents)?;
    }
    Ok(())
}
