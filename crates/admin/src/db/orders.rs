//! Admin order repository: listings, status transitions, dashboard stats.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use copper_kettle_core::{OrderId, OrderStatus};

use super::RepositoryError;

/// An order as listed in the back office.
#[derive(Debug, Clone, Serialize)]
pub struct AdminOrder {
    pub id: i32,
    pub customer_id: Option<i32>,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub complete: bool,
    pub status: OrderStatus,
    pub transaction_id: Option<Uuid>,
    pub payment_reference: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct AdminOrderRow {
    id: i32,
    customer_id: Option<i32>,
    customer_name: Option<String>,
    customer_email: Option<String>,
    complete: bool,
    status: String,
    transaction_id: Option<Uuid>,
    payment_reference: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<AdminOrderRow> for AdminOrder {
    type Error = RepositoryError;

    fn try_from(row: AdminOrderRow) -> Result<Self, Self::Error> {
        let status: OrderStatus = row.status.parse().map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid order status in database: {e}"))
        })?;

        Ok(Self {
            id: row.id,
            customer_id: row.customer_id,
            customer_name: row.customer_name,
            customer_email: row.customer_email,
            complete: row.complete,
            status,
            transaction_id: row.transaction_id,
            payment_reference: row.payment_reference,
            created_at: row.created_at,
        })
    }
}

/// A line of an order, as shown on the detail page.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AdminOrderLine {
    pub product_id: i32,
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: i64,
}

/// Dashboard aggregates.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardStats {
    /// Completed order counts keyed by status.
    pub orders_by_status: Vec<(String, i64)>,
    /// Revenue over completed orders (smallest currency unit).
    pub revenue: i64,
    /// Total completed orders.
    pub completed_orders: i64,
}

const ORDER_SELECT: &str = "SELECT o.id, o.customer_id, c.name AS customer_name, \
                                   c.email AS customer_email, o.complete, o.status, \
                                   o.transaction_id, o.payment_reference, o.created_at \
                            FROM store.orders o \
                            LEFT JOIN store.customers c ON c.id = o.customer_id";

/// Repository for admin order operations.
pub struct AdminOrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AdminOrderRepository<'a> {
    /// Create a new admin order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List orders, newest first, optionally filtered by status and
    /// completeness.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        status: Option<OrderStatus>,
        complete: Option<bool>,
    ) -> Result<Vec<AdminOrder>, RepositoryError> {
        let rows: Vec<AdminOrderRow> = sqlx::query_as(&format!(
            "{ORDER_SELECT} \
             WHERE ($1::text IS NULL OR o.status = $1) \
               AND ($2::boolean IS NULL OR o.complete = $2) \
             ORDER BY o.created_at DESC \
             LIMIT 200"
        ))
        .bind(status.map(|s| s.to_string()))
        .bind(complete)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Get one order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: OrderId) -> Result<Option<AdminOrder>, RepositoryError> {
        let row: Option<AdminOrderRow> =
            sqlx::query_as(&format!("{ORDER_SELECT} WHERE o.id = $1"))
                .bind(id.as_i32())
                .fetch_optional(self.pool)
                .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Lines of an order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn lines(&self, id: OrderId) -> Result<Vec<AdminOrderLine>, RepositoryError> {
        let rows: Vec<AdminOrderLine> = sqlx::query_as(
            "SELECT i.product_id, p.name AS product_name, i.quantity, i.unit_price \
             FROM store.order_items i \
             JOIN store.products p ON p.id = i.product_id \
             WHERE i.order_id = $1 \
             ORDER BY i.id ASC",
        )
        .bind(id.as_i32())
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    /// Set the status of a completed order.
    ///
    /// Only complete orders can transition; the allowed target statuses are
    /// validated by the route layer.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` when the order doesn't exist or
    /// isn't complete. Returns `RepositoryError::Database` for other errors.
    pub async fn set_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<(), RepositoryError> {
        let result =
            sqlx::query("UPDATE store.orders SET status = $2 WHERE id = $1 AND complete = TRUE")
                .bind(id.as_i32())
                .bind(status.to_string())
                .execute(self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    /// Dashboard aggregates over completed orders.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn dashboard_stats(&self) -> Result<DashboardStats, RepositoryError> {
        let by_status: Vec<(String, i64)> = sqlx::query_as(
            "SELECT status, COUNT(*) FROM store.orders \
             WHERE complete = TRUE GROUP BY status ORDER BY status",
        )
        .fetch_all(self.pool)
        .await?;

        let (revenue, completed_orders): (Option<i64>, i64) = sqlx::query_as(
            "SELECT SUM(line_totals.total)::bigint, COUNT(DISTINCT line_totals.order_id) \
             FROM ( \
                 SELECT i.order_id, SUM(i.quantity::bigint * i.unit_price)::bigint AS total \
                 FROM store.order_items i \
                 JOIN store.orders o ON o.id = i.order_id \
                 WHERE o.complete = TRUE \
                 GROUP BY i.order_id \
             ) AS line_totals",
        )
        .fetch_one(self.pool)
        .await?;

        Ok(DashboardStats {
            orders_by_status: by_status,
            revenue: revenue.unwrap_or(0),
            completed_orders,
        })
    }
}
