//! Cart resolution and mutation.
//!
//! Authenticated carts are backed by the customer's unique incomplete order;
//! anonymous carts live in the signed client-side cookie. The product row
//! lock in [`CartService::update_item`] is the one real mutual-exclusion
//! discipline in the system: two concurrent adds against the same product
//! must not over-commit against its stock count.

use sqlx::PgPool;
use thiserror::Error;
use tracing::warn;

use copper_kettle_core::ProductId;

use crate::db::customers::CustomerRepository;
use crate::db::orders::OrderRepository;
use crate::db::products::ProductRepository;
use crate::db::RepositoryError;
use crate::models::cart::{CartAction, CartCookie, CartLineView, CartMutation, CartView};
use crate::models::customer::Customer;
use crate::models::order::Order;
use crate::models::user::User;

/// Errors that can occur during cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// Referenced product doesn't exist.
    #[error("product not found")]
    ProductNotFound,

    /// The mutation would exceed the product's current stock.
    #[error("insufficient stock: only {available} available")]
    OutOfStock {
        /// Units currently in stock.
        available: i32,
    },

    /// Server-side cart mutation requires an authenticated identity.
    #[error("not authenticated")]
    NotAuthenticated,

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Cart service.
pub struct CartService<'a> {
    pool: &'a PgPool,
}

impl<'a> CartService<'a> {
    /// Create a new cart service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Look up (or lazily create) the authenticated user's customer and
    /// current incomplete order.
    ///
    /// If multiple incomplete orders exist for the customer, the most
    /// recently created one is treated as authoritative; the rest are left
    /// orphaned for later cleanup and logged. This is a known weak point, not
    /// a guaranteed-exclusive selection.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if a query fails.
    pub async fn current_order_for_user(
        &self,
        user: &User,
    ) -> Result<(Customer, Order), CartError> {
        let customers = CustomerRepository::new(self.pool);
        let orders = OrderRepository::new(self.pool);

        let customer = customers
            .get_or_create_for_user(user.id, &user.username, &user.email)
            .await?;

        let mut incomplete = orders.incomplete_for_customer(customer.id).await?;

        let order = if incomplete.is_empty() {
            orders.create_incomplete(customer.id).await?
        } else {
            if incomplete.len() > 1 {
                let orphaned: Vec<i32> = incomplete
                    .iter()
                    .skip(1)
                    .map(|o| o.id.as_i32())
                    .collect();
                warn!(
                    customer_id = customer.id.as_i32(),
                    ?orphaned,
                    "multiple incomplete orders for customer; most recent wins"
                );
            }
            incomplete.remove(0)
        };

        Ok((customer, order))
    }

    /// Resolve the current cart for an authenticated user.
    ///
    /// May create the customer and an empty order as a side effect.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if a query fails.
    pub async fn resolve_for_user(&self, user: &User) -> Result<CartView, CartError> {
        let (_, order) = self.current_order_for_user(user).await?;

        let items = OrderRepository::new(self.pool)
            .items_with_products(order.id)
            .await?;

        let lines = items
            .into_iter()
            .map(|(item, product)| CartLineView {
                line_total: item.total(),
                quantity: item.quantity,
                product,
            })
            .collect();

        Ok(CartView::from_lines(lines))
    }

    /// Resolve the current cart for an anonymous visitor.
    ///
    /// Entries referencing products that no longer exist are silently
    /// dropped. Anonymous lines have no snapshot, so current prices apply.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if a query fails.
    pub async fn resolve_anonymous(&self, cookie: &CartCookie) -> Result<CartView, CartError> {
        let products = ProductRepository::new(self.pool);

        let mut lines = Vec::with_capacity(cookie.items.len());
        for (&product_id, &quantity) in &cookie.items {
            let Some(product) = products.get(ProductId::new(product_id)).await? else {
                continue;
            };
            let quantity = i32::try_from(quantity).unwrap_or(i32::MAX);
            lines.push(CartLineView {
                line_total: product.price * i64::from(quantity),
                quantity,
                product,
            });
        }

        Ok(CartView::from_lines(lines))
    }

    /// Apply a single add/remove mutation to the authenticated user's cart.
    ///
    /// Runs in a transaction holding a `FOR UPDATE` lock on the product row,
    /// so concurrent adds against the same product serialize and cannot
    /// jointly exceed stock. Stock is only checked here, not reserved; the
    /// decrement happens at finalization.
    ///
    /// # Errors
    ///
    /// Returns `CartError::ProductNotFound` for unknown products and
    /// `CartError::OutOfStock` when an add would exceed current stock.
    pub async fn update_item(
        &self,
        user: &User,
        product_id: ProductId,
        action: CartAction,
    ) -> Result<CartMutation, CartError> {
        let (_, order) = self.current_order_for_user(user).await?;

        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;

        let product = ProductRepository::lock_for_update(&mut tx, product_id)
            .await?
            .ok_or(CartError::ProductNotFound)?;

        let item =
            OrderRepository::get_or_create_item(&mut tx, order.id, product.id, product.price)
                .await?;

        let mutation = match action {
            CartAction::Add => {
                let quantity = item.quantity + 1;
                if quantity > product.stock {
                    // Roll back the line creation if this was a fresh item
                    return Err(CartError::OutOfStock {
                        available: product.stock,
                    });
                }
                OrderRepository::set_item_quantity(&mut tx, item.id, quantity).await?;
                CartMutation {
                    quantity,
                    removed: false,
                }
            }
            CartAction::Remove => {
                let quantity = (item.quantity - 1).max(0);
                if quantity == 0 {
                    OrderRepository::delete_item(&mut tx, item.id).await?;
                    CartMutation {
                        quantity: 0,
                        removed: true,
                    }
                } else {
                    OrderRepository::set_item_quantity(&mut tx, item.id, quantity).await?;
                    CartMutation {
                        quantity,
                        removed: false,
                    }
                }
            }
        };

        tx.commit().await.map_err(RepositoryError::from)?;

        Ok(mutation)
    }
}
