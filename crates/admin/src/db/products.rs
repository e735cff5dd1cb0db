//! Admin product repository: catalog CRUD and stock reporting.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;

use copper_kettle_core::ProductId;

use super::RepositoryError;

/// A product as managed from the back office.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AdminProduct {
    pub id: i32,
    pub name: String,
    pub price: i64,
    pub digital: bool,
    pub description: Option<String>,
    pub stock: i32,
    pub category: Option<String>,
    pub views: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields accepted when creating or updating a product.
#[derive(Debug, Clone)]
pub struct ProductInput {
    pub name: String,
    pub price: i64,
    pub digital: bool,
    pub description: Option<String>,
    pub stock: i32,
    pub category: Option<String>,
}

const COLUMNS: &str =
    "id, name, price, digital, description, stock, category, views, created_at, updated_at";

/// Repository for admin product operations.
pub struct AdminProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AdminProductRepository<'a> {
    /// Create a new admin product repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// All products, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<AdminProduct>, RepositoryError> {
        let rows: Vec<AdminProduct> = sqlx::query_as(&format!(
            "SELECT {COLUMNS} FROM store.products ORDER BY created_at DESC"
        ))
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    /// Get a product by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: ProductId) -> Result<Option<AdminProduct>, RepositoryError> {
        let row: Option<AdminProduct> =
            sqlx::query_as(&format!("SELECT {COLUMNS} FROM store.products WHERE id = $1"))
                .bind(id.as_i32())
                .fetch_optional(self.pool)
                .await?;

        Ok(row)
    }

    /// Create a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(&self, input: &ProductInput) -> Result<AdminProduct, RepositoryError> {
        let row: AdminProduct = sqlx::query_as(&format!(
            "INSERT INTO store.products (name, price, digital, description, stock, category) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {COLUMNS}"
        ))
        .bind(&input.name)
        .bind(input.price)
        .bind(input.digital)
        .bind(input.description.as_deref())
        .bind(input.stock)
        .bind(input.category.as_deref())
        .fetch_one(self.pool)
        .await?;

        Ok(row)
    }

    /// Update a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product doesn't exist.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn update(
        &self,
        id: ProductId,
        input: &ProductInput,
    ) -> Result<AdminProduct, RepositoryError> {
        let row: Option<AdminProduct> = sqlx::query_as(&format!(
            "UPDATE store.products \
             SET name = $2, price = $3, digital = $4, description = $5, \
                 stock = $6, category = $7, updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        ))
        .bind(id.as_i32())
        .bind(&input.name)
        .bind(input.price)
        .bind(input.digital)
        .bind(input.description.as_deref())
        .bind(input.stock)
        .bind(input.category.as_deref())
        .fetch_optional(self.pool)
        .await?;

        row.ok_or(RepositoryError::NotFound)
    }

    /// Delete a product.
    ///
    /// Returns `true` if a row was deleted. Line items referencing the
    /// product are cascaded away, including in historical orders.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn delete(&self, id: ProductId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM store.products WHERE id = $1")
            .bind(id.as_i32())
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Products at or below a stock threshold, most depleted first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn low_stock(&self, threshold: i32) -> Result<Vec<AdminProduct>, RepositoryError> {
        let rows: Vec<AdminProduct> = sqlx::query_as(&format!(
            "SELECT {COLUMNS} FROM store.products WHERE stock <= $1 ORDER BY stock ASC"
        ))
        .bind(threshold)
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }
}
