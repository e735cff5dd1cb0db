//! OTP issuance and verification.
//!
//! Issuance is delete-then-create: at most one live code exists per phone
//! number. Verification delegates to the pure state machine on
//! [`crate::models::otp::Otp`] and persists its outcome; the attempt counter
//! reaches the database only on the invalid-code and success paths, matching
//! the terminal nature of the other outcomes.

use chrono::Utc;
use rand::Rng;
use sqlx::PgPool;
use thiserror::Error;

use copper_kettle_core::{OtpId, OtpPurpose, PhoneNumber, UserId};

use crate::db::otps::OtpRepository;
use crate::db::users::UserRepository;
use crate::db::RepositoryError;
use crate::models::otp::{Otp, VerifyOutcome};
use crate::notify::{Notifier, NotifyError};

/// Errors that can occur during OTP operations.
#[derive(Debug, Error)]
pub enum OtpError {
    /// Invalid phone number.
    #[error("invalid phone number: {0}")]
    InvalidPhone(#[from] copper_kettle_core::PhoneNumberError),

    /// Login OTPs require a registered phone number.
    #[error("phone number not registered; please sign up first")]
    PhoneNotRegistered,

    /// No OTP with that id (stale session).
    #[error("otp not found")]
    NotFound,

    /// Attempt budget exhausted.
    #[error("too many attempts; please request a new OTP")]
    TooManyAttempts,

    /// Past the validity window.
    #[error("OTP has expired; please request a new OTP")]
    Expired,

    /// Already used successfully.
    #[error("OTP already used")]
    AlreadyUsed,

    /// Wrong code.
    #[error("invalid OTP; {remaining} attempts remaining")]
    InvalidCode {
        /// Attempts left before exhaustion.
        remaining: i32,
    },

    /// The code row was persisted but SMS delivery failed; the caller may
    /// retry delivery without reissuing.
    #[error("failed to send OTP: {0}")]
    DeliveryFailed(#[from] NotifyError),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// A freshly issued OTP, as reported to the route layer.
#[derive(Debug, Clone)]
pub struct IssuedOtp {
    pub id: OtpId,
    pub phone_number: PhoneNumber,
}

/// Result of a successful verification.
#[derive(Debug, Clone)]
pub struct VerifiedOtp {
    /// The user that owns the phone number, for login-purpose codes.
    pub user_id: Option<UserId>,
    pub phone_number: PhoneNumber,
}

/// OTP service.
pub struct OtpService<'a> {
    otps: OtpRepository<'a>,
    users: UserRepository<'a>,
    notifier: &'a Notifier,
    default_country_code: &'a str,
}

impl<'a> OtpService<'a> {
    /// Create a new OTP service.
    #[must_use]
    pub const fn new(
        pool: &'a PgPool,
        notifier: &'a Notifier,
        default_country_code: &'a str,
    ) -> Self {
        Self {
            otps: OtpRepository::new(pool),
            users: UserRepository::new(pool),
            notifier,
            default_country_code,
        }
    }

    /// Issue a login OTP for a raw phone number.
    ///
    /// The number must belong to a registered account. Prior codes for the
    /// number are deleted first.
    ///
    /// # Errors
    ///
    /// Returns `OtpError::PhoneNotRegistered` for unknown numbers and
    /// `OtpError::DeliveryFailed` when the row persisted but SMS delivery
    /// failed.
    pub async fn request_login(&self, raw_phone: &str) -> Result<IssuedOtp, OtpError> {
        let phone = PhoneNumber::normalize(raw_phone, self.default_country_code)?;

        if self.users.phone_by_number(&phone).await?.is_none() {
            return Err(OtpError::PhoneNotRegistered);
        }

        self.issue(&phone, OtpPurpose::Login).await
    }

    /// Issue (or reissue) a code for an already-normalized number.
    ///
    /// Used for resends, where the number comes from the verified session
    /// rather than fresh user input.
    ///
    /// # Errors
    ///
    /// Returns `OtpError::DeliveryFailed` when the row persisted but SMS
    /// delivery failed.
    pub async fn issue(
        &self,
        phone: &PhoneNumber,
        purpose: OtpPurpose,
    ) -> Result<IssuedOtp, OtpError> {
        self.otps.delete_for_phone(phone).await?;

        let code = generate_code();
        let now = Utc::now();
        let otp = self
            .otps
            .create(phone, &code, purpose, Otp::expiry_for(now))
            .await?;

        let issued = IssuedOtp {
            id: otp.id,
            phone_number: otp.phone_number,
        };

        // The row stays even when delivery fails, so a retry can resend
        // without invalidating the code.
        self.notifier.send_otp_sms(phone, &code).await?;

        Ok(issued)
    }

    /// Run one verification attempt.
    ///
    /// On success for a login-purpose code the owning user is resolved for
    /// session login; verification-purpose codes mark the phone link
    /// verified.
    ///
    /// # Errors
    ///
    /// Each non-success outcome of the state machine maps to its own error
    /// variant; see [`crate::models::otp::Otp::verify`] for the check order.
    pub async fn verify(&self, otp_id: OtpId, submitted: &str) -> Result<VerifiedOtp, OtpError> {
        let mut otp = self.otps.get(otp_id).await?.ok_or(OtpError::NotFound)?;

        let outcome = otp.verify(submitted.trim(), Utc::now());

        // The terminal rejections leave the row untouched; only live attempts
        // reach the database.
        if matches!(
            &outcome,
            VerifyOutcome::Verified | VerifyOutcome::InvalidCode { .. }
        ) {
            self.otps.persist_attempt(&otp).await?;
        }

        match outcome {
            VerifyOutcome::Verified => {
                let user_id = match self.users.phone_by_number(&otp.phone_number).await? {
                    Some(link) => {
                        if otp.purpose == OtpPurpose::Verification && !link.verified {
                            self.users.mark_phone_verified(link.user_id).await?;
                        }
                        Some(link.user_id)
                    }
                    None => None,
                };

                Ok(VerifiedOtp {
                    user_id,
                    phone_number: otp.phone_number,
                })
            }
            VerifyOutcome::TooManyAttempts => Err(OtpError::TooManyAttempts),
            VerifyOutcome::Expired => Err(OtpError::Expired),
            VerifyOutcome::AlreadyUsed => Err(OtpError::AlreadyUsed),
            VerifyOutcome::InvalidCode { remaining } => Err(OtpError::InvalidCode { remaining }),
        }
    }
}

/// A uniform random 6-digit code; leading zeros allowed.
fn generate_code() -> String {
    let n: u32 = rand::rng().random_range(0..1_000_000);
    format!("{n:06}")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_code_is_six_digits() {
        for _ in 0..100 {
            let code = generate_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }
}
