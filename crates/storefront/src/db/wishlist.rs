//! Wishlist repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use copper_kettle_core::{ProductId, UserId};

use super::RepositoryError;
use crate::models::product::Product;

/// A wishlist entry joined with its product.
#[derive(Debug, Clone, serde::Serialize)]
pub struct WishlistEntry {
    pub product: Product,
    pub added_at: DateTime<Utc>,
}

/// Repository for wishlist operations.
pub struct WishlistRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> WishlistRepository<'a> {
    /// Create a new wishlist repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Toggle a product on the user's wishlist.
    ///
    /// Returns `true` when the product was added, `false` when it was removed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn toggle(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<bool, RepositoryError> {
        let removed = sqlx::query(
            "DELETE FROM store.wishlist_items WHERE user_id = $1 AND product_id = $2",
        )
        .bind(user_id.as_i32())
        .bind(product_id.as_i32())
        .execute(self.pool)
        .await?;

        if removed.rows_affected() > 0 {
            return Ok(false);
        }

        sqlx::query(
            "INSERT INTO store.wishlist_items (user_id, product_id) VALUES ($1, $2) \
             ON CONFLICT (user_id, product_id) DO NOTHING",
        )
        .bind(user_id.as_i32())
        .bind(product_id.as_i32())
        .execute(self.pool)
        .await?;

        Ok(true)
    }

    /// The user's wishlist, newest first, with products joined.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, user_id: UserId) -> Result<Vec<WishlistEntry>, RepositoryError> {
        #[derive(sqlx::FromRow)]
        struct Row {
            added_at: DateTime<Utc>,
            id: i32,
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

        let rows: Vec<Row> = sqlx::query_as(
            "SELECT w.added_at, p.id, p.name, p.price, p.digital, p.description, \
                    p.stock, p.category, p.views, p.created_at, p.updated_at \
             FROM store.wishlist_items w \
             JOIN store.products p ON p.id = w.product_id \
             WHERE w.user_id = $1 \
             ORDER BY w.added_at DESC",
        )
        .bind(user_id.as_i32())
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| WishlistEntry {
                added_at: r.added_at,
                product: Product {
                    id: ProductId::new(r.id),
                    name: r.name,
                    price: r.price,
                    digital: r.digital,
                    description: r.description,
                    stock: r.stock,
                    category: r.category,
                    views: r.views,
                    created_at: r.created_at,
                    updated_at: r.updated_at,
                },
            })
            .collect())
    }
}
