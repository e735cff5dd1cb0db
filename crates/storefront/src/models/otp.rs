//! OTP domain type and its verification state machine.

use chrono::{DateTime, Duration, Utc};

use copper_kettle_core::{OtpId, OtpPurpose, PhoneNumber};

/// Maximum verification attempts per issued code.
pub const MAX_ATTEMPTS: i32 = 5;

/// How long an issued code stays valid.
pub const VALIDITY_MINUTES: i64 = 10;

/// A one-time passcode issued to a phone number.
///
/// A fresh row is created for each issuance; prior unverified rows for the
/// same phone are deleted first. The row is mutated only by verification
/// attempts and never after it is marked verified.
#[derive(Debug, Clone)]
pub struct Otp {
    /// Unique OTP ID.
    pub id: OtpId,
    /// Phone number the code was issued to (normalized).
    pub phone_number: PhoneNumber,
    /// The 6-digit code. Leading zeros allowed.
    pub code: String,
    /// What the code is for.
    pub purpose: OtpPurpose,
    /// Terminal success flag.
    pub verified: bool,
    /// Verification attempts consumed so far.
    pub attempts: i32,
    /// When the code was issued.
    pub created_at: DateTime<Utc>,
    /// `created_at` + 10 minutes.
    pub expires_at: DateTime<Utc>,
}

/// Outcome of a single verification attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyOutcome {
    /// Code matched; the OTP is now in its terminal verified state.
    Verified,
    /// The attempt budget is exhausted.
    TooManyAttempts,
    /// The code is past its validity window.
    Expired,
    /// The code was already used successfully.
    AlreadyUsed,
    /// Wrong code; `remaining` attempts left.
    InvalidCode {
        /// Attempts remaining before exhaustion.
        remaining: i32,
    },
}

impl VerifyOutcome {
    /// Whether the attempt succeeded.
    #[must_use]
    pub const fn is_verified(&self) -> bool {
        matches!(self, Self::Verified)
    }
}

impl Otp {
    /// Expiry timestamp for a code issued at `created_at`.
    #[must_use]
    pub fn expiry_for(created_at: DateTime<Utc>) -> DateTime<Utc> {
        created_at + Duration::minutes(VALIDITY_MINUTES)
    }

    /// Run one verification attempt against this code.
    ///
    /// The checks run in a fixed order, and the attempt counter is bumped
    /// before any of them: an attempt is consumed even when the code turns
    /// out to be expired or already used. That keeps the policy fail-closed
    /// against guessing races. The caller must persist the mutated row
    /// whatever the outcome.
    pub fn verify(&mut self, submitted: &str, now: DateTime<Utc>) -> VerifyOutcome {
        self.attempts += 1;

        if self.attempts > MAX_ATTEMPTS {
            return VerifyOutcome::TooManyAttempts;
        }

        if now > self.expires_at {
            return VerifyOutcome::Expired;
        }

        if self.verified {
            return VerifyOutcome::AlreadyUsed;
        }

        if self.code == submitted {
            self.verified = true;
            return VerifyOutcome::Verified;
        }

        VerifyOutcome::InvalidCode {
            remaining: MAX_ATTEMPTS - self.attempts,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn otp_issued_at(created_at: DateTime<Utc>, code: &str) -> Otp {
        Otp {
            id: OtpId::new(1),
            phone_number: PhoneNumber::normalize("9876543210", "91").unwrap(),
            code: code.to_owned(),
            purpose: OtpPurpose::Login,
            verified: false,
            attempts: 0,
            created_at,
            expires_at: Otp::expiry_for(created_at),
        }
    }

    #[test]
    fn test_correct_code_verifies_once() {
        let issued = Utc::now();
        let mut otp = otp_issued_at(issued, "482913");

        let first = otp.verify("482913", issued + Duration::minutes(2));
        assert_eq!(first, VerifyOutcome::Verified);
        assert!(otp.verified);

        // Any subsequent call with the same row fails as already used.
        let second = otp.verify("482913", issued + Duration::minutes(3));
        assert_eq!(second, VerifyOutcome::AlreadyUsed);
    }

    #[test]
    fn test_wrong_code_reports_remaining_attempts() {
        let issued = Utc::now();
        let mut otp = otp_issued_at(issued, "482913");

        let outcome = otp.verify("000000", issued + Duration::minutes(1));
        assert_eq!(outcome, VerifyOutcome::InvalidCode { remaining: 4 });
        assert_eq!(otp.attempts, 1);

        let outcome = otp.verify("482913", issued + Duration::minutes(2));
        assert_eq!(outcome, VerifyOutcome::Verified);
    }

    #[test]
    fn test_sixth_attempt_rejected_even_with_correct_code() {
        let issued = Utc::now();
        let mut otp = otp_issued_at(issued, "482913");

        for _ in 0..5 {
            let outcome = otp.verify("000000", issued + Duration::minutes(1));
            assert!(matches!(outcome, VerifyOutcome::InvalidCode { .. }));
        }
        assert_eq!(otp.attempts, 5);

        let sixth = otp.verify("482913", issued + Duration::minutes(1));
        assert_eq!(sixth, VerifyOutcome::TooManyAttempts);
        assert!(!otp.verified);
    }

    #[test]
    fn test_expired_code_rejected_and_costs_an_attempt() {
        let issued = Utc::now();
        let mut otp = otp_issued_at(issued, "482913");

        let outcome = otp.verify("482913", issued + Duration::minutes(11));
        assert_eq!(outcome, VerifyOutcome::Expired);
        assert_eq!(otp.attempts, 1);
        assert!(!otp.verified);
    }

    #[test]
    fn test_expiry_checked_before_verified_flag() {
        let issued = Utc::now();
        let mut otp = otp_issued_at(issued, "482913");
        otp.verified = true;

        // Past expiry, an already-used code still reports Expired: the
        // expiry check runs first.
        let outcome = otp.verify("482913", issued + Duration::minutes(11));
        assert_eq!(outcome, VerifyOutcome::Expired);
    }

    #[test]
    fn test_attempts_exhaustion_checked_before_expiry() {
        let issued = Utc::now();
        let mut otp = otp_issued_at(issued, "482913");
        otp.attempts = MAX_ATTEMPTS;

        let outcome = otp.verify("482913", issued + Duration::minutes(11));
        assert_eq!(outcome, VerifyOutcome::TooManyAttempts);
    }

    #[test]
    fn test_boundary_still_valid_at_exact_expiry() {
        let issued = Utc::now();
        let mut otp = otp_issued_at(issued, "000042");

        // now == expires_at is not yet past the window
        let outcome = otp.verify("000042", otp.expires_at);
        assert_eq!(outcome, VerifyOutcome::Verified);
    }
}
