//! Checkout: session creation and order finalization.
//!
//! `begin_*` captures the buyer's submission on the incomplete order and
//! opens a hosted checkout session with the gateway. `finalize` runs once the
//! gateway confirms payment: it claims the order with an atomic conditional
//! update, validates the charged amount against the computed total, applies
//! the stock decrements and shipping record in the same transaction, and
//! fires the confirmation email after commit.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use sqlx::PgPool;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use copper_kettle_core::{Email, OrderId, StockPolicy};

use crate::db::customers::CustomerRepository;
use crate::db::orders::OrderRepository;
use crate::db::products::ProductRepository;
use crate::db::RepositoryError;
use crate::models::cart::CartCookie;
use crate::models::order::{Order, OrderTotals, ShippingFields};
use crate::models::user::User;
use crate::notify::Notifier;
use crate::payments::{CheckoutSessionRequest, GatewayClient, PaymentError};
use crate::services::cart::{CartError, CartService};

/// Absolute tolerance when comparing a charged amount against the computed
/// cart total, in hundredths of a currency unit.
pub const TOTAL_TOLERANCE_HUNDREDTHS: i64 = 1;

/// Errors that can occur during checkout operations.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Order doesn't exist.
    #[error("order not found")]
    OrderNotFound,

    /// Checkout attempted on an empty cart.
    #[error("cart is empty")]
    EmptyCart,

    /// The charged amount doesn't match the computed cart total.
    #[error("price mismatch detected (charged {charged}, expected {computed}); please refresh and try again")]
    PriceMismatch {
        /// Amount the gateway charged.
        charged: Decimal,
        /// Total computed from the order's line items.
        computed: Decimal,
    },

    /// Strict stock policy: a line would drive stock below zero.
    #[error("insufficient stock for product {product_id}")]
    InsufficientStock {
        /// The product that ran out.
        product_id: i32,
    },

    /// A physical cart was submitted without shipping fields.
    #[error("shipping address is required for this order")]
    MissingShipping,

    /// Guest checkout without name/email.
    #[error("name and email are required for guest checkout")]
    MissingGuestInfo,

    /// Submitted or webhook total is not a valid decimal amount.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// Invalid guest email.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] copper_kettle_core::EmailError),

    /// Payment gateway failure (critical path: blocks checkout).
    #[error("payment gateway error: {0}")]
    Gateway(#[from] PaymentError),

    /// Cart-side failure while materializing a guest order.
    #[error(transparent)]
    Cart(#[from] CartError),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Result of a finalization call.
#[derive(Debug)]
pub enum FinalizeOutcome {
    /// This call performed the finalization.
    Finalized(Order),
    /// The order was already complete; the call was a no-op.
    AlreadyComplete(Order),
}

impl FinalizeOutcome {
    /// The order in its post-call state.
    #[must_use]
    pub const fn order(&self) -> &Order {
        match self {
            Self::Finalized(order) | Self::AlreadyComplete(order) => order,
        }
    }
}

/// Guest identity submitted at checkout.
#[derive(Debug, Clone)]
pub struct GuestInfo {
    pub name: String,
    pub email: String,
}

/// Checkout service.
pub struct CheckoutService<'a> {
    pool: &'a PgPool,
    gateway: &'a GatewayClient,
    notifier: &'a Notifier,
    stock_policy: StockPolicy,
    currency: &'a str,
    base_url: &'a str,
}

impl<'a> CheckoutService<'a> {
    /// Create a new checkout service.
    #[must_use]
    pub const fn new(
        pool: &'a PgPool,
        gateway: &'a GatewayClient,
        notifier: &'a Notifier,
        stock_policy: StockPolicy,
        currency: &'a str,
        base_url: &'a str,
    ) -> Self {
        Self {
            pool,
            gateway,
            notifier,
            stock_policy,
            currency,
            base_url,
        }
    }

    /// Begin checkout for an authenticated user.
    ///
    /// Captures the claimed total and shipping fields on the user's
    /// incomplete order and returns the gateway redirect URL.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::EmptyCart` for an empty order,
    /// `CheckoutError::MissingShipping` when a physical cart has no address,
    /// and `CheckoutError::Gateway` when the session cannot be created.
    pub async fn begin_for_user(
        &self,
        user: &User,
        claimed_total: Decimal,
        shipping: Option<ShippingFields>,
    ) -> Result<String, CheckoutError> {
        let carts = CartService::new(self.pool);
        let (_, order) = carts.current_order_for_user(user).await?;

        self.begin(order.id, claimed_total, shipping).await
    }

    /// Begin checkout for an anonymous visitor.
    ///
    /// Creates (or refreshes) the guest customer keyed by email and
    /// materializes the cookie cart into a server-side order: cookie lines
    /// referencing vanished products are dropped, and unit prices are
    /// snapshotted at this moment.
    ///
    /// # Errors
    ///
    /// Same as [`Self::begin_for_user`], plus `CheckoutError::MissingGuestInfo`
    /// and `CheckoutError::InvalidEmail` for bad guest data.
    pub async fn begin_for_guest(
        &self,
        cookie: &CartCookie,
        guest: &GuestInfo,
        claimed_total: Decimal,
        shipping: Option<ShippingFields>,
    ) -> Result<String, CheckoutError> {
        if guest.name.trim().is_empty() || guest.email.trim().is_empty() {
            return Err(CheckoutError::MissingGuestInfo);
        }
        let email = Email::parse(guest.email.trim())?;

        if cookie.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let customers = CustomerRepository::new(self.pool);
        let orders = OrderRepository::new(self.pool);
        let products = ProductRepository::new(self.pool);

        let customer = customers
            .get_or_create_guest(&email, guest.name.trim())
            .await?;
        let order = orders.create_incomplete(customer.id).await?;

        // Replace any stale lines from an earlier abandoned attempt
        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;
        sqlx::query("DELETE FROM store.order_items WHERE order_id = $1")
            .bind(order.id.as_i32())
            .execute(&mut *tx)
            .await
            .map_err(RepositoryError::from)?;

        for (&product_id, &quantity) in &cookie.items {
            let Some(product) = products.get(copper_kettle_core::ProductId::new(product_id)).await?
            else {
                continue;
            };
            let item =
                OrderRepository::get_or_create_item(&mut tx, order.id, product.id, product.price)
                    .await?;
            let quantity = i32::try_from(quantity).unwrap_or(i32::MAX);
            OrderRepository::set_item_quantity(&mut tx, item.id, quantity).await?;
        }
        tx.commit().await.map_err(RepositoryError::from)?;

        self.begin(order.id, claimed_total, shipping).await
    }

    async fn begin(
        &self,
        order_id: OrderId,
        claimed_total: Decimal,
        shipping: Option<ShippingFields>,
    ) -> Result<String, CheckoutError> {
        let orders = OrderRepository::new(self.pool);

        let totals = orders.totals(order_id).await?;
        if totals.item_count == 0 {
            return Err(CheckoutError::EmptyCart);
        }
        if totals.requires_shipping && shipping.is_none() {
            return Err(CheckoutError::MissingShipping);
        }

        orders
            .set_checkout_details(order_id, claimed_total, shipping.as_ref())
            .await?;

        let amount_minor = (claimed_total * Decimal::from(100))
            .round()
            .to_i64()
            .ok_or_else(|| CheckoutError::InvalidAmount(claimed_total.to_string()))?;

        let session = self
            .gateway
            .create_checkout_session(&CheckoutSessionRequest {
                amount_minor,
                currency: self.currency.to_owned(),
                order_reference: order_id.to_string(),
                success_url: format!("{}/payments/success?order={order_id}", self.base_url),
                cancel_url: format!("{}/payments/cancelled", self.base_url),
            })
            .await?;

        Ok(session.url)
    }

    /// Finalize an order after the gateway confirmed payment.
    ///
    /// All effects are atomic: the completion flip, stock decrements, and
    /// shipping address creation either all commit or the order stays
    /// incomplete. The flip itself is a conditional update on
    /// `complete = FALSE`, so a duplicate confirmation observes zero affected
    /// rows and returns [`FinalizeOutcome::AlreadyComplete`] without
    /// re-applying any effect. The confirmation email goes out after commit
    /// and never rolls the order back.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::OrderNotFound` for unknown orders,
    /// `CheckoutError::PriceMismatch` when the charged amount is off by more
    /// than 0.01 currency units, and `CheckoutError::InsufficientStock` under
    /// the strict stock policy.
    pub async fn finalize(
        &self,
        order_id: OrderId,
        payment_reference: &str,
        charged_total: Decimal,
    ) -> Result<FinalizeOutcome, CheckoutError> {
        let orders = OrderRepository::new(self.pool);

        let order = orders.get(order_id).await?.ok_or(CheckoutError::OrderNotFound)?;

        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;

        let transaction_id = Uuid::new_v4();
        let claimed =
            OrderRepository::mark_complete(&mut tx, order_id, transaction_id, payment_reference)
                .await?;

        if !claimed {
            // Someone else finalized first (or this is a replayed webhook)
            drop(tx);
            let current = orders
                .get(order_id)
                .await?
                .ok_or(CheckoutError::OrderNotFound)?;
            return Ok(FinalizeOutcome::AlreadyComplete(current));
        }

        let totals = OrderRepository::totals_on(&mut *tx, order_id).await?;
        let computed = Decimal::from(totals.total);
        if !within_tolerance(charged_total, computed) {
            return Err(CheckoutError::PriceMismatch {
                charged: charged_total,
                computed,
            });
        }

        let items = OrderRepository::items_in(&mut tx, order_id).await?;
        for item in &items {
            match self.stock_policy {
                StockPolicy::Strict => {
                    let ok = ProductRepository::decrement_stock_guarded(
                        &mut tx,
                        item.product_id,
                        item.quantity,
                    )
                    .await?;
                    if !ok {
                        return Err(CheckoutError::InsufficientStock {
                            product_id: item.product_id.as_i32(),
                        });
                    }
                }
                StockPolicy::AllowBackorder => {
                    let remaining =
                        ProductRepository::decrement_stock(&mut tx, item.product_id, item.quantity)
                            .await?;
                    if remaining < 0 {
                        warn!(
                            product_id = item.product_id.as_i32(),
                            remaining, "stock went negative at finalization (backorder)"
                        );
                    }
                }
            }
        }

        if totals.requires_shipping {
            match OrderRepository::checkout_shipping(&mut tx, order_id).await? {
                Some(fields) => {
                    OrderRepository::create_shipping_address(
                        &mut tx,
                        order.customer_id,
                        order_id,
                        &fields,
                    )
                    .await?;
                }
                None => {
                    // Physical order finalized without captured fields; the
                    // admin has to chase the address down manually.
                    warn!(
                        order_id = order_id.as_i32(),
                        "finalizing physical order without shipping fields"
                    );
                }
            }
        }

        tx.commit().await.map_err(RepositoryError::from)?;

        let finalized = orders
            .get(order_id)
            .await?
            .ok_or(CheckoutError::OrderNotFound)?;

        self.send_confirmation(&finalized, &totals).await;

        Ok(FinalizeOutcome::Finalized(finalized))
    }

    /// Best-effort confirmation email; failure is logged, never propagated.
    async fn send_confirmation(&self, order: &Order, totals: &OrderTotals) {
        let Some(customer_id) = order.customer_id else {
            return;
        };

        let customer = match CustomerRepository::new(self.pool).get(customer_id).await {
            Ok(Some(customer)) => customer,
            Ok(None) => return,
            Err(e) => {
                warn!(error = %e, "failed to load customer for confirmation email");
                return;
            }
        };

        let Some(email) = customer.email else {
            return;
        };

        if let Err(e) = self
            .notifier
            .send_order_confirmation(&email, order, totals)
            .await
        {
            warn!(error = %e, order_id = order.id.as_i32(), "order confirmation email failed");
        }
    }
}

/// Whether two amounts agree within the 0.01 currency-unit tolerance.
#[must_use]
pub fn within_tolerance(charged: Decimal, computed: Decimal) -> bool {
    (charged - computed).abs() <= Decimal::new(TOTAL_TOLERANCE_HUNDREDTHS, 2)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_exact_match_within_tolerance() {
        assert!(within_tolerance(Decimal::from(15000), Decimal::from(15000)));
    }

    #[test]
    fn test_one_cent_within_tolerance() {
        let charged = Decimal::from_str("15000.01").unwrap();
        assert!(within_tolerance(charged, Decimal::from(15000)));
    }

    #[test]
    fn test_two_cents_rejected() {
        let charged = Decimal::from_str("15000.02").unwrap();
        assert!(!within_tolerance(charged, Decimal::from(15000)));
    }

    #[test]
    fn test_tolerance_is_symmetric() {
        let charged = Decimal::from_str("14999.98").unwrap();
        assert!(!within_tolerance(charged, Decimal::from(15000)));
        let charged = Decimal::from_str("14999.99").unwrap();
        assert!(within_tolerance(charged, Decimal::from(15000)));
    }
}
