//! Customer repository.
//!
//! Customers are created lazily, so both lookups here are get-or-create.
//! The insert races are absorbed with `ON CONFLICT DO NOTHING` plus a
//! re-select rather than relying on a lucky get-then-insert ordering.

use sqlx::PgPool;

use copper_kettle_core::{CustomerId, Email, UserId};

use super::RepositoryError;
use crate::models::customer::Customer;

#[derive(Debug, sqlx::FromRow)]
struct CustomerRow {
    id: i32,
    user_id: Option<i32>,
    name: Option<String>,
    email: Option<String>,
}

impl TryFrom<CustomerRow> for Customer {
    type Error = RepositoryError;

    fn try_from(row: CustomerRow) -> Result<Self, Self::Error> {
        let email = row
            .email
            .as_deref()
            .map(Email::parse)
            .transpose()
            .map_err(|e| {
                RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
            })?;

        Ok(Self {
            id: CustomerId::new(row.id),
            user_id: row.user_id.map(UserId::new),
            name: row.name,
            email,
        })
    }
}

/// Repository for customer database operations.
pub struct CustomerRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CustomerRepository<'a> {
    /// Create a new customer repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a customer by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: CustomerId) -> Result<Option<Customer>, RepositoryError> {
        let row: Option<CustomerRow> =
            sqlx::query_as("SELECT id, user_id, name, email FROM store.customers WHERE id = $1")
                .bind(id.as_i32())
                .fetch_optional(self.pool)
                .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Get or lazily create the customer linked to a user account.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    /// Returns `RepositoryError::DataCorruption` on invalid stored data.
    pub async fn get_or_create_for_user(
        &self,
        user_id: UserId,
        name: &str,
        email: &Email,
    ) -> Result<Customer, RepositoryError> {
        if let Some(existing) = self.get_by_user(user_id).await? {
            return Ok(existing);
        }

        let inserted: Option<CustomerRow> = sqlx::query_as(
            "INSERT INTO store.customers (user_id, name, email) VALUES ($1, $2, $3) \
             ON CONFLICT (user_id) DO NOTHING \
             RETURNING id, user_id, name, email",
        )
        .bind(user_id.as_i32())
        .bind(name)
        .bind(email.as_str())
        .fetch_optional(self.pool)
        .await?;

        match inserted {
            Some(row) => row.try_into(),
            // Lost the insert race; the row exists now
            None => self
                .get_by_user(user_id)
                .await?
                .ok_or(RepositoryError::NotFound),
        }
    }

    /// Get or create a guest customer keyed by email.
    ///
    /// An existing guest's display name is refreshed from the latest
    /// checkout submission.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get_or_create_guest(
        &self,
        email: &Email,
        name: &str,
    ) -> Result<Customer, RepositoryError> {
        let existing: Option<CustomerRow> = sqlx::query_as(
            "UPDATE store.customers SET name = $2 \
             WHERE email = $1 AND user_id IS NULL \
             RETURNING id, user_id, name, email",
        )
        .bind(email.as_str())
        .bind(name)
        .fetch_optional(self.pool)
        .await?;

        if let Some(row) = existing {
            return row.try_into();
        }

        let row: CustomerRow = sqlx::query_as(
            "INSERT INTO store.customers (user_id, name, email) VALUES (NULL, $2, $1) \
             RETURNING id, user_id, name, email",
        )
        .bind(email.as_str())
        .bind(name)
        .fetch_one(self.pool)
        .await?;

        row.try_into()
    }

    async fn get_by_user(&self, user_id: UserId) -> Result<Option<Customer>, RepositoryError> {
        let row: Option<CustomerRow> = sqlx::query_as(
            "SELECT id, user_id, name, email FROM store.customers WHERE user_id = $1",
        )
        .bind(user_id.as_i32())
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }
}
