//! Order repository.
//!
//! The incomplete order doubles as the authenticated customer's cart, so this
//! repository carries both the cart-side operations (get-or-create, line item
//! upserts) and the finalization primitives (conditional completion update,
//! shipping address creation).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use copper_kettle_core::{AddressId, CustomerId, OrderId, OrderItemId, OrderStatus, ProductId};

use super::RepositoryError;
use crate::models::order::{Order, OrderItem, OrderTotals, ShippingAddress, ShippingFields};
use crate::models::product::Product;

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: i32,
    customer_id: Option<i32>,
    complete: bool,
    status: String,
    transaction_id: Option<Uuid>,
    payment_reference: Option<String>,
    claimed_total: Option<Decimal>,
    created_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = RepositoryError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let status: OrderStatus = row.status.parse().map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid order status in database: {e}"))
        })?;

        Ok(Self {
            id: OrderId::new(row.id),
            customer_id: row.customer_id.map(CustomerId::new),
            complete: row.complete,
            status,
            transaction_id: row.transaction_id,
            payment_reference: row.payment_reference,
            claimed_total: row.claimed_total,
            created_at: row.created_at,
        })
    }
}

const ORDER_COLUMNS: &str = "id, customer_id, complete, status, transaction_id, \
                             payment_reference, claimed_total, created_at";

#[derive(Debug, sqlx::FromRow)]
struct OrderItemRow {
    id: i32,
    order_id: i32,
    product_id: i32,
    quantity: i32,
    unit_price: i64,
    date_added: DateTime<Utc>,
}

impl From<OrderItemRow> for OrderItem {
    fn from(row: OrderItemRow) -> Self {
        Self {
            id: OrderItemId::new(row.id),
            order_id: OrderId::new(row.order_id),
            product_id: ProductId::new(row.product_id),
            quantity: row.quantity,
            unit_price: row.unit_price,
            date_added: row.date_added,
        }
    }
}

/// A line item joined with its product.
#[derive(Debug, sqlx::FromRow)]
struct ItemWithProductRow {
    item_id: i32,
    order_id: i32,
    quantity: i32,
    unit_price: i64,
    date_added: DateTime<Utc>,
    product_id: i32,
    name: String,
    price: i64,
    digital: bool,
    description: Option<String>,
    stock: i32,
    category: Option<String>,
    views: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ItemWithProductRow> for (OrderItem, Product) {
    fn from(row: ItemWithProductRow) -> Self {
        (
            OrderItem {
                id: OrderItemId::new(row.item_id),
                order_id: OrderId::new(row.order_id),
                product_id: ProductId::new(row.product_id),
                quantity: row.quantity,
                unit_price: row.unit_price,
                date_added: row.date_added,
            },
            Product {
                id: ProductId::new(row.product_id),
                name: row.name,
                price: row.price,
                digital: row.digital,
                description: row.description,
                stock: row.stock,
                category: row.category,
                views: row.views,
                created_at: row.created_at,
                updated_at: row.updated_at,
            },
        )
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for order database operations.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get an order by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row: Option<OrderRow> =
            sqlx::query_as(&format!("SELECT {ORDER_COLUMNS} FROM store.orders WHERE id = $1"))
                .bind(id.as_i32())
                .fetch_optional(self.pool)
                .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// All incomplete orders for a customer, most recent first.
    ///
    /// The partial unique index makes more than one a should-not-happen, but
    /// rows predating the index (or racing its deployment) may exist; the
    /// caller treats the first entry as authoritative.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn incomplete_for_customer(
        &self,
        customer_id: CustomerId,
    ) -> Result<Vec<Order>, RepositoryError> {
        let rows: Vec<OrderRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM store.orders \
             WHERE customer_id = $1 AND complete = FALSE \
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(customer_id.as_i32())
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Create a fresh incomplete order for a customer.
    ///
    /// On a unique-violation race (another request created the incomplete
    /// order first) the winner's row is returned instead.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn create_incomplete(
        &self,
        customer_id: CustomerId,
    ) -> Result<Order, RepositoryError> {
        let inserted: Result<OrderRow, sqlx::Error> = sqlx::query_as(&format!(
            "INSERT INTO store.orders (customer_id) VALUES ($1) RETURNING {ORDER_COLUMNS}"
        ))
        .bind(customer_id.as_i32())
        .fetch_one(self.pool)
        .await;

        match inserted {
            Ok(row) => row.try_into(),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => self
                .incomplete_for_customer(customer_id)
                .await?
                .into_iter()
                .next()
                .ok_or(RepositoryError::NotFound),
            Err(e) => Err(RepositoryError::Database(e)),
        }
    }

    /// Line items of an order joined with their products, oldest line first.
    ///
    /// Lines whose product has been deleted are omitted.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn items_with_products(
        &self,
        order_id: OrderId,
    ) -> Result<Vec<(OrderItem, Product)>, RepositoryError> {
        let rows: Vec<ItemWithProductRow> = sqlx::query_as(
            "SELECT i.id AS item_id, i.order_id, i.quantity, i.unit_price, i.date_added, \
                    p.id AS product_id, p.name, p.price, p.digital, p.description, \
                    p.stock, p.category, p.views, p.created_at, p.updated_at \
             FROM store.order_items i \
             JOIN store.products p ON p.id = i.product_id \
             WHERE i.order_id = $1 \
             ORDER BY i.date_added ASC, i.id ASC",
        )
        .bind(order_id.as_i32())
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Line items inside an open transaction (finalization path).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn items_in(
        tx: &mut Transaction<'_, Postgres>,
        order_id: OrderId,
    ) -> Result<Vec<OrderItem>, RepositoryError> {
        let rows: Vec<OrderItemRow> = sqlx::query_as(
            "SELECT id, order_id, product_id, quantity, unit_price, date_added \
             FROM store.order_items WHERE order_id = $1 ORDER BY id ASC",
        )
        .bind(order_id.as_i32())
        .fetch_all(&mut **tx)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Get or create the line item for (order, product).
    ///
    /// A freshly created line starts at quantity 0 with the unit price
    /// snapshotted from the product at this moment; the caller then applies
    /// the mutation.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get_or_create_item(
        tx: &mut Transaction<'_, Postgres>,
        order_id: OrderId,
        product_id: ProductId,
        unit_price: i64,
    ) -> Result<OrderItem, RepositoryError> {
        let existing: Option<OrderItemRow> = sqlx::query_as(
            "SELECT id, order_id, product_id, quantity, unit_price, date_added \
             FROM store.order_items WHERE order_id = $1 AND product_id = $2",
        )
        .bind(order_id.as_i32())
        .bind(product_id.as_i32())
        .fetch_optional(&mut **tx)
        .await?;

        if let Some(row) = existing {
            return Ok(row.into());
        }

        let row: OrderItemRow = sqlx::query_as(
            "INSERT INTO store.order_items (order_id, product_id, quantity, unit_price) \
             VALUES ($1, $2, 0, $3) \
             RETURNING id, order_id, product_id, quantity, unit_price, date_added",
        )
        .bind(order_id.as_i32())
        .bind(product_id.as_i32())
        .bind(unit_price)
        .fetch_one(&mut **tx)
        .await?;

        Ok(row.into())
    }

    /// Set a line item's quantity.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the line doesn't exist.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn set_item_quantity(
        tx: &mut Transaction<'_, Postgres>,
        item_id: OrderItemId,
        quantity: i32,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE store.order_items SET quantity = $2 WHERE id = $1")
            .bind(item_id.as_i32())
            .bind(quantity)
            .execute(&mut **tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    /// Delete a line item (quantity reached 0).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn delete_item(
        tx: &mut Transaction<'_, Postgres>,
        item_id: OrderItemId,
    ) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM store.order_items WHERE id = $1")
            .bind(item_id.as_i32())
            .execute(&mut **tx)
            .await?;

        Ok(())
    }

    /// Aggregate totals for an order, from the snapshotted unit prices.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn totals(&self, order_id: OrderId) -> Result<OrderTotals, RepositoryError> {
        Self::totals_on(self.pool, order_id).await
    }

    /// [`Self::totals`] against an arbitrary executor (pool or transaction).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn totals_on<'e, E>(
        executor: E,
        order_id: OrderId,
    ) -> Result<OrderTotals, RepositoryError>
    where
        E: sqlx::Executor<'e, Database = Postgres>,
    {
        let row: (Option<i64>, Option<i64>, Option<bool>) = sqlx::query_as(
            "SELECT SUM(i.quantity::bigint * i.unit_price)::bigint, \
                    SUM(i.quantity)::bigint, \
                    BOOL_OR(NOT p.digital) \
             FROM store.order_items i \
             JOIN store.products p ON p.id = i.product_id \
             WHERE i.order_id = $1",
        )
        .bind(order_id.as_i32())
        .fetch_one(executor)
        .await?;

        Ok(OrderTotals {
            total: row.0.unwrap_or(0),
            item_count: row.1.unwrap_or(0),
            requires_shipping: row.2.unwrap_or(false),
        })
    }

    /// Record the buyer's checkout submission on the order: the claimed total
    /// and, when present, the shipping fields to materialize at finalization.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order doesn't exist.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn set_checkout_details(
        &self,
        order_id: OrderId,
        claimed_total: Decimal,
        shipping: Option<&ShippingFields>,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE store.orders \
             SET claimed_total = $2, ship_address = $3, ship_city = $4, \
                 ship_state = $5, ship_zipcode = $6 \
             WHERE id = $1 AND complete = FALSE",
        )
        .bind(order_id.as_i32())
        .bind(claimed_total)
        .bind(shipping.map(|s| s.address.as_str()))
        .bind(shipping.map(|s| s.city.as_str()))
        .bind(shipping.map(|s| s.state.as_str()))
        .bind(shipping.map(|s| s.zipcode.as_str()))
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    /// Shipping fields captured at checkout, if any were submitted.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn checkout_shipping(
        tx: &mut Transaction<'_, Postgres>,
        order_id: OrderId,
    ) -> Result<Option<ShippingFields>, RepositoryError> {
        let row: Option<(Option<String>, Option<String>, Option<String>, Option<String>)> =
            sqlx::query_as(
                "SELECT ship_address, ship_city, ship_state, ship_zipcode \
                 FROM store.orders WHERE id = $1",
            )
            .bind(order_id.as_i32())
            .fetch_optional(&mut **tx)
            .await?;

        Ok(row.and_then(|(address, city, state, zipcode)| {
            Some(ShippingFields {
                address: address?,
                city: city?,
                state: state?,
                zipcode: zipcode?,
            })
        }))
    }

    /// Atomically flip an incomplete order to complete/processing.
    ///
    /// The `complete = FALSE` predicate is the duplicate-finalization guard:
    /// exactly one caller observes an affected row; every later call gets
    /// `false` and must treat the order as already finalized.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn mark_complete(
        tx: &mut Transaction<'_, Postgres>,
        order_id: OrderId,
        transaction_id: Uuid,
        payment_reference: &str,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE store.orders \
             SET complete = TRUE, status = 'processing', \
                 transaction_id = $2, payment_reference = $3 \
             WHERE id = $1 AND complete = FALSE",
        )
        .bind(order_id.as_i32())
        .bind(transaction_id)
        .bind(payment_reference)
        .execute(&mut **tx)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Create the shipping address row for a finalized physical order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create_shipping_address(
        tx: &mut Transaction<'_, Postgres>,
        customer_id: Option<CustomerId>,
        order_id: OrderId,
        fields: &ShippingFields,
    ) -> Result<ShippingAddress, RepositoryError> {
        let row: (i32, DateTime<Utc>) = sqlx::query_as(
            "INSERT INTO store.shipping_addresses \
                 (customer_id, order_id, address, city, state, zipcode) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING id, date_added",
        )
        .bind(customer_id.map(|c| c.as_i32()))
        .bind(order_id.as_i32())
        .bind(&fields.address)
        .bind(&fields.city)
        .bind(&fields.state)
        .bind(&fields.zipcode)
        .fetch_one(&mut **tx)
        .await?;

        Ok(ShippingAddress {
            id: AddressId::new(row.0),
            customer_id,
            order_id: Some(order_id),
            address: fields.address.clone(),
            city: fields.city.clone(),
            state: fields.state.clone(),
            zipcode: fields.zipcode.clone(),
            date_added: row.1,
        })
    }

    /// Completed orders for a customer, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn history(&self, customer_id: CustomerId) -> Result<Vec<Order>, RepositoryError> {
        let rows: Vec<OrderRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM store.orders \
             WHERE customer_id = $1 AND complete = TRUE \
             ORDER BY created_at DESC"
        ))
        .bind(customer_id.as_i32())
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }
}
