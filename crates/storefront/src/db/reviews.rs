//! Product review repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use copper_kettle_core::{ProductId, ReviewId, UserId};

use super::RepositoryError;

/// A product review.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Review {
    pub id: ReviewId,
    pub product_id: ProductId,
    pub user_id: UserId,
    /// 1-5 stars.
    pub rating: i32,
    pub comment: String,
    /// True when the reviewer has a completed order containing the product.
    pub verified_purchase: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct ReviewRow {
    id: i32,
    product_id: i32,
    user_id: i32,
    rating: i32,
    comment: String,
    verified_purchase: bool,
    created_at: DateTime<Utc>,
}

impl From<ReviewRow> for Review {
    fn from(row: ReviewRow) -> Self {
        Self {
            id: ReviewId::new(row.id),
            product_id: ProductId::new(row.product_id),
            user_id: UserId::new(row.user_id),
            rating: row.rating,
            comment: row.comment,
            verified_purchase: row.verified_purchase,
            created_at: row.created_at,
        }
    }
}

/// Repository for product reviews.
pub struct ReviewRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ReviewRepository<'a> {
    /// Create a new review repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// True when the user has a completed order containing the product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn has_purchased(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<bool, RepositoryError> {
        let (exists,): (bool,) = sqlx::query_as(
            "SELECT EXISTS ( \
                 SELECT 1 FROM store.order_items i \
                 JOIN store.orders o ON o.id = i.order_id \
                 JOIN store.customers c ON c.id = o.customer_id \
                 WHERE c.user_id = $1 AND i.product_id = $2 AND o.complete = TRUE \
             )",
        )
        .bind(user_id.as_i32())
        .bind(product_id.as_i32())
        .fetch_one(self.pool)
        .await?;

        Ok(exists)
    }

    /// Create or replace the user's review of a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the upsert fails.
    pub async fn upsert(
        &self,
        user_id: UserId,
        product_id: ProductId,
        rating: i32,
        comment: &str,
        verified_purchase: bool,
    ) -> Result<Review, RepositoryError> {
        let row: ReviewRow = sqlx::query_as(
            "INSERT INTO store.product_reviews \
                 (product_id, user_id, rating, comment, verified_purchase) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (product_id, user_id) DO UPDATE \
                 SET rating = EXCLUDED.rating, comment = EXCLUDED.comment, \
                     verified_purchase = EXCLUDED.verified_purchase, updated_at = NOW() \
             RETURNING id, product_id, user_id, rating, comment, verified_purchase, created_at",
        )
        .bind(product_id.as_i32())
        .bind(user_id.as_i32())
        .bind(rating)
        .bind(comment)
        .bind(verified_purchase)
        .fetch_one(self.pool)
        .await?;

        Ok(row.into())
    }

    /// Reviews of a product, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn for_product(&self, product_id: ProductId) -> Result<Vec<Review>, RepositoryError> {
        let rows: Vec<ReviewRow> = sqlx::query_as(
            "SELECT id, product_id, user_id, rating, comment, verified_purchase, created_at \
             FROM store.product_reviews WHERE product_id = $1 ORDER BY created_at DESC",
        )
        .bind(product_id.as_i32())
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}
