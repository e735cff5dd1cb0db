//! Product repository for catalog and stock operations.
//!
//! The product row is the only contended shared resource in the system:
//! concurrent cart-adds serialize on it via `SELECT ... FOR UPDATE`, and
//! stock decrements at finalization run inside the finalizing transaction.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};

use copper_kettle_core::ProductId;

use super::RepositoryError;
use crate::models::product::{CatalogSort, Product};

/// Products shown per catalog page.
pub const PAGE_SIZE: i64 = 12;

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
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

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: ProductId::new(row.id),
            name: row.name,
            price: row.price,
            digital: row.digital,
            description: row.description,
            stock: row.stock,
            category: row.category,
            views: row.views,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const PRODUCT_COLUMNS: &str =
    "id, name, price, digital, description, stock, category, views, created_at, updated_at";

// =============================================================================
// Catalog Query
// =============================================================================

/// Parameters for a catalog listing query.
#[derive(Debug, Clone, Default)]
pub struct CatalogQuery {
    /// Sanitized free-text search over name and description.
    pub search: Option<String>,
    /// Exact category filter.
    pub category: Option<String>,
    /// Sort order.
    pub sort: CatalogSort,
    /// 1-based page number.
    pub page: i64,
}

/// One page of catalog results.
#[derive(Debug, Clone)]
pub struct CatalogPage {
    pub products: Vec<Product>,
    pub total: i64,
    pub page: i64,
    pub page_count: i64,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for product database operations.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List catalog products with search, category filter, sort and paging.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list(&self, query: &CatalogQuery) -> Result<CatalogPage, RepositoryError> {
        let order_by = match query.sort {
            CatalogSort::Newest => "created_at DESC",
            CatalogSort::PriceLow => "price ASC",
            CatalogSort::PriceHigh => "price DESC",
            CatalogSort::Popular => "views DESC",
        };

        let pattern = query.search.as_ref().map(|s| format!("%{s}%"));
        let page = query.page.max(1);
        let offset = (page - 1) * PAGE_SIZE;

        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM store.products \
             WHERE ($1::text IS NULL OR name ILIKE $1 OR description ILIKE $1) \
               AND ($2::text IS NULL OR category = $2) \
             ORDER BY {order_by} \
             LIMIT $3 OFFSET $4"
        );

        let rows: Vec<ProductRow> = sqlx::query_as(&sql)
            .bind(pattern.as_deref())
            .bind(query.category.as_deref())
            .bind(PAGE_SIZE)
            .bind(offset)
            .fetch_all(self.pool)
            .await?;

        let (total,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM store.products \
             WHERE ($1::text IS NULL OR name ILIKE $1 OR description ILIKE $1) \
               AND ($2::text IS NULL OR category = $2)",
        )
        .bind(pattern.as_deref())
        .bind(query.category.as_deref())
        .fetch_one(self.pool)
        .await?;

        Ok(CatalogPage {
            products: rows.into_iter().map(Product::from).collect(),
            total,
            page,
            page_count: i64::try_from((total.max(0) as u64).div_ceil(PAGE_SIZE as u64))
                .unwrap_or(i64::MAX)
                .max(1),
        })
    }

    /// Distinct category labels, for the catalog filter bar.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn categories(&self) -> Result<Vec<String>, RepositoryError> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT DISTINCT category FROM store.products \
             WHERE category IS NOT NULL ORDER BY category",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(|(c,)| c).collect())
    }

    /// Get a product by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row: Option<ProductRow> =
            sqlx::query_as(&format!("SELECT {PRODUCT_COLUMNS} FROM store.products WHERE id = $1"))
                .bind(id.as_i32())
                .fetch_optional(self.pool)
                .await?;

        Ok(row.map(Product::from))
    }

    /// Up to `limit` other products from the same category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn related(
        &self,
        category: Option<&str>,
        exclude: ProductId,
        limit: i64,
    ) -> Result<Vec<Product>, RepositoryError> {
        let rows: Vec<ProductRow> = sqlx::query_as(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM store.products \
             WHERE category IS NOT DISTINCT FROM $1 AND id <> $2 \
             ORDER BY views DESC LIMIT $3"
        ))
        .bind(category)
        .bind(exclude.as_i32())
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Product::from).collect())
    }

    /// Bump the detail-page view counter.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn increment_views(&self, id: ProductId) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE store.products SET views = views + 1 WHERE id = $1")
            .bind(id.as_i32())
            .execute(self.pool)
            .await?;

        Ok(())
    }

    /// Lock a product row for the duration of the transaction and return it.
    ///
    /// Concurrent cart-adds against the same product serialize here.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn lock_for_update(
        tx: &mut Transaction<'_, Postgres>,
        id: ProductId,
    ) -> Result<Option<Product>, RepositoryError> {
        let row: Option<ProductRow> = sqlx::query_as(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM store.products WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.as_i32())
        .fetch_optional(&mut **tx)
        .await?;

        Ok(row.map(Product::from))
    }

    /// Decrement stock only if enough is available.
    ///
    /// Returns `false` (no rows affected) when stock is insufficient; the
    /// caller decides whether that fails the surrounding transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn decrement_stock_guarded(
        tx: &mut Transaction<'_, Postgres>,
        id: ProductId,
        quantity: i32,
    ) -> Result<bool, RepositoryError> {
        let result =
            sqlx::query("UPDATE store.products SET stock = stock - $2 WHERE id = $1 AND stock >= $2")
                .bind(id.as_i32())
                .bind(quantity)
                .execute(&mut **tx)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Decrement stock unconditionally, returning the resulting level.
    ///
    /// Used by the backorder policy; a negative result is the caller's
    /// anomaly to log.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product doesn't exist.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn decrement_stock(
        tx: &mut Transaction<'_, Postgres>,
        id: ProductId,
        quantity: i32,
    ) -> Result<i32, RepositoryError> {
        let row: Option<(i32,)> = sqlx::query_as(
            "UPDATE store.products SET stock = stock - $2 WHERE id = $1 RETURNING stock",
        )
        .bind(id.as_i32())
        .bind(quantity)
        .fetch_optional(&mut **tx)
        .await?;

        row.map(|(stock,)| stock).ok_or(RepositoryError::NotFound)
    }
}
