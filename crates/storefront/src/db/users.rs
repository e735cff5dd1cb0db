//! User and phone-link repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use copper_kettle_core::{Email, PhoneNumber, UserId};

use super::RepositoryError;
use crate::models::user::{User, UserPhone};

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: i32,
    username: String,
    email: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(Self {
            id: UserId::new(row.id),
            username: row.username,
            email,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct UserPhoneRow {
    user_id: i32,
    phone_number: String,
    verified: bool,
    created_at: DateTime<Utc>,
}

impl From<UserPhoneRow> for UserPhone {
    fn from(row: UserPhoneRow) -> Self {
        Self {
            user_id: UserId::new(row.user_id),
            phone_number: PhoneNumber::from_canonical(row.phone_number),
            verified: row.verified,
            created_at: row.created_at,
        }
    }
}

/// Repository for user database operations.
pub struct UserRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a user by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, username, email, created_at FROM store.users WHERE id = $1",
        )
        .bind(id.as_i32())
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Get a user by username.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>, RepositoryError> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, username, email, created_at FROM store.users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Create a user together with their phone link, in one transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the username or phone number is
    /// already taken. Returns `RepositoryError::Database` for other errors.
    pub async fn create_with_phone(
        &self,
        username: &str,
        email: &Email,
        password_hash: &str,
        phone: &PhoneNumber,
    ) -> Result<User, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row: UserRow = sqlx::query_as(
            "INSERT INTO store.users (username, email, password_hash) \
             VALUES ($1, $2, $3) \
             RETURNING id, username, email, created_at",
        )
        .bind(username)
        .bind(email.as_str())
        .bind(password_hash)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return RepositoryError::Conflict("username already exists".to_owned());
            }
            RepositoryError::Database(e)
        })?;

        sqlx::query(
            "INSERT INTO store.user_phones (user_id, phone_number, verified) \
             VALUES ($1, $2, FALSE)",
        )
        .bind(row.id)
        .bind(phone.as_str())
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return RepositoryError::Conflict("phone number already registered".to_owned());
            }
            RepositoryError::Database(e)
        })?;

        tx.commit().await?;

        row.try_into()
    }

    /// Get a user's password hash by username.
    ///
    /// Returns `None` if the user doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_password_hash(
        &self,
        username: &str,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        let row: Option<(i32, String, String, DateTime<Utc>, String)> = sqlx::query_as(
            "SELECT id, username, email, created_at, password_hash \
             FROM store.users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(self.pool)
        .await?;

        let Some((id, username, email, created_at, password_hash)) = row else {
            return Ok(None);
        };

        let user = UserRow {
            id,
            username,
            email,
            created_at,
        }
        .try_into()?;

        Ok(Some((user, password_hash)))
    }

    /// Find the phone link for a normalized phone number.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn phone_by_number(
        &self,
        phone: &PhoneNumber,
    ) -> Result<Option<UserPhone>, RepositoryError> {
        let row: Option<UserPhoneRow> = sqlx::query_as(
            "SELECT user_id, phone_number, verified, created_at \
             FROM store.user_phones WHERE phone_number = $1",
        )
        .bind(phone.as_str())
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Get the phone link for a user, if any.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn phone_by_user(
        &self,
        user_id: UserId,
    ) -> Result<Option<UserPhone>, RepositoryError> {
        let row: Option<UserPhoneRow> = sqlx::query_as(
            "SELECT user_id, phone_number, verified, created_at \
             FROM store.user_phones WHERE user_id = $1",
        )
        .bind(user_id.as_i32())
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Mark a user's phone number as verified.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user has no phone link.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn mark_phone_verified(&self, user_id: UserId) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE store.user_phones SET verified = TRUE WHERE user_id = $1")
            .bind(user_id.as_i32())
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }
}
