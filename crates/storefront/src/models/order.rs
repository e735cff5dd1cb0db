//! Order domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use copper_kettle_core::{AddressId, CustomerId, OrderId, OrderItemId, OrderStatus, ProductId};

/// An order.
///
/// While `complete` is false the order doubles as the persisted cart of an
/// authenticated customer. At most one incomplete order exists per customer.
/// Payment confirmation flips `complete` exactly once and assigns the
/// transaction id.
#[derive(Debug, Clone, Serialize)]
pub struct Order {
    /// Unique order ID.
    pub id: OrderId,
    /// Owning customer; null if the customer row was deleted.
    pub customer_id: Option<CustomerId>,
    /// Whether the order has been finalized.
    pub complete: bool,
    /// Lifecycle status.
    pub status: OrderStatus,
    /// Unique transaction identifier, assigned at finalization.
    pub transaction_id: Option<Uuid>,
    /// External payment reference from the gateway.
    pub payment_reference: Option<String>,
    /// Buyer-submitted total captured at checkout, validated at finalization.
    pub claimed_total: Option<Decimal>,
    /// When the order was created.
    pub created_at: DateTime<Utc>,
}

/// A line item: the (product, quantity) pairing within an order.
///
/// `unit_price` is snapshotted when the line is first created so historical
/// totals do not drift when the product's price changes later.
#[derive(Debug, Clone, Serialize)]
pub struct OrderItem {
    /// Unique line item ID.
    pub id: OrderItemId,
    /// Owning order.
    pub order_id: OrderId,
    /// Referenced product.
    pub product_id: ProductId,
    /// Units of the product; a line at 0 is deleted.
    pub quantity: i32,
    /// Unit price at the time the line was created.
    pub unit_price: i64,
    /// When the line was first added.
    pub date_added: DateTime<Utc>,
}

impl OrderItem {
    /// Line total from the snapshotted unit price.
    #[must_use]
    pub const fn total(&self) -> i64 {
        self.unit_price * self.quantity as i64
    }
}

/// Buyer-supplied shipping fields, captured at checkout and materialized as a
/// [`ShippingAddress`] at finalization when the order needs shipping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShippingFields {
    pub address: String,
    pub city: String,
    pub state: String,
    pub zipcode: String,
}

/// A shipping address attached to a finalized order.
#[derive(Debug, Clone, Serialize)]
pub struct ShippingAddress {
    /// Unique address ID.
    pub id: AddressId,
    /// Customer the address belongs to.
    pub customer_id: Option<CustomerId>,
    /// Order the address was captured for.
    pub order_id: Option<OrderId>,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zipcode: String,
    /// When the address was created.
    pub date_added: DateTime<Utc>,
}

/// Aggregate totals of an order's line items.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct OrderTotals {
    /// Sum of line totals (smallest currency unit).
    pub total: i64,
    /// Sum of line quantities.
    pub item_count: i64,
    /// True when at least one line references a non-digital product.
    pub requires_shipping: bool,
}
