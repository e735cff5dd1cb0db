//! OTP repository.
//!
//! Issuance is delete-then-insert: any prior codes for the phone are removed
//! before a fresh row is created, so at most one live code exists per number.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use copper_kettle_core::{OtpId, OtpPurpose, PhoneNumber};

use super::RepositoryError;
use crate::models::otp::Otp;

#[derive(Debug, sqlx::FromRow)]
struct OtpRow {
    id: i32,
    phone_number: String,
    code: String,
    purpose: String,
    verified: bool,
    attempts: i32,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl TryFrom<OtpRow> for Otp {
    type Error = RepositoryError;

    fn try_from(row: OtpRow) -> Result<Self, Self::Error> {
        let purpose: OtpPurpose = row.purpose.parse().map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid otp purpose in database: {e}"))
        })?;

        Ok(Self {
            id: OtpId::new(row.id),
            phone_number: PhoneNumber::from_canonical(row.phone_number),
            code: row.code,
            purpose,
            verified: row.verified,
            attempts: row.attempts,
            created_at: row.created_at,
            expires_at: row.expires_at,
        })
    }
}

const OTP_COLUMNS: &str = "id, phone_number, code, purpose, verified, attempts, \
                           created_at, expires_at";

/// Repository for OTP database operations.
pub struct OtpRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OtpRepository<'a> {
    /// Create a new OTP repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Delete all OTP rows for a phone number, returning how many went.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn delete_for_phone(&self, phone: &PhoneNumber) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM store.otps WHERE phone_number = $1")
            .bind(phone.as_str())
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Insert a freshly issued code.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(
        &self,
        phone: &PhoneNumber,
        code: &str,
        purpose: OtpPurpose,
        expires_at: DateTime<Utc>,
    ) -> Result<Otp, RepositoryError> {
        let row: OtpRow = sqlx::query_as(&format!(
            "INSERT INTO store.otps (phone_number, code, purpose, expires_at) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {OTP_COLUMNS}"
        ))
        .bind(phone.as_str())
        .bind(code)
        .bind(purpose.to_string())
        .bind(expires_at)
        .fetch_one(self.pool)
        .await?;

        row.try_into()
    }

    /// Get an OTP by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: OtpId) -> Result<Option<Otp>, RepositoryError> {
        let row: Option<OtpRow> =
            sqlx::query_as(&format!("SELECT {OTP_COLUMNS} FROM store.otps WHERE id = $1"))
                .bind(id.as_i32())
                .fetch_optional(self.pool)
                .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Persist the mutable outcome of a verification attempt.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the row no longer exists.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn persist_attempt(&self, otp: &Otp) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE store.otps SET attempts = $2, verified = $3 WHERE id = $1")
            .bind(otp.id.as_i32())
            .bind(otp.attempts)
            .bind(otp.verified)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }
}
