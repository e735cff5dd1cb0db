//! Authentication service.
//!
//! Password registration and login. OTP login lives in the `otp` service; the
//! two share the user/phone repository.

mod error;

pub use error::AuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use sqlx::PgPool;

use copper_kettle_core::{Email, PhoneNumber, UserId};

use crate::db::customers::CustomerRepository;
use crate::db::users::UserRepository;
use crate::db::RepositoryError;
use crate::models::user::User;

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 8;

/// Authentication service.
///
/// Handles user registration and password login.
pub struct AuthService<'a> {
    users: UserRepository<'a>,
    customers: CustomerRepository<'a>,
    default_country_code: &'a str,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(pool: &'a PgPool, default_country_code: &'a str) -> Self {
        Self {
            users: UserRepository::new(pool),
            customers: CustomerRepository::new(pool),
            default_country_code,
        }
    }

    /// Register a new user with username, email, password and phone number.
    ///
    /// The customer row is created eagerly so the first cart interaction
    /// doesn't have to.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` / `AuthError::InvalidPhone` on bad
    /// input, `AuthError::WeakPassword` if the password doesn't meet
    /// requirements, and `AuthError::UsernameTaken` / `AuthError::PhoneTaken`
    /// on conflicts.
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
        phone: &str,
    ) -> Result<User, AuthError> {
        let email = Email::parse(email)?;
        let phone = PhoneNumber::normalize(phone, self.default_country_code)?;
        validate_password(password)?;

        // Early duplicate check for a friendlier error; the unique index
        // still backs this up under races.
        if self.users.phone_by_number(&phone).await?.is_some() {
            return Err(AuthError::PhoneTaken);
        }

        let password_hash = hash_password(password)?;

        let user = self
            .users
            .create_with_phone(username, &email, &password_hash, &phone)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(msg) if msg.contains("phone") => AuthError::PhoneTaken,
                RepositoryError::Conflict(_) => AuthError::UsernameTaken,
                other => AuthError::Repository(other),
            })?;

        self.customers
            .get_or_create_for_user(user.id, &user.username, &user.email)
            .await?;

        Ok(user)
    }

    /// Login with username and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the username/password is wrong.
    pub async fn login(&self, username: &str, password: &str) -> Result<User, AuthError> {
        let (user, password_hash) = self
            .users
            .get_password_hash(username)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &password_hash)?;

        Ok(user)
    }

    /// Get a user by ID.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserNotFound` if the user doesn't exist.
    pub async fn get_user(&self, user_id: UserId) -> Result<User, AuthError> {
        self.users
            .get_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }
}

/// Validate password meets requirements.
fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }

    Ok(())
}

/// Hash a password using Argon2id.
fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_password_too_short() {
        assert!(matches!(
            validate_password("short"),
            Err(AuthError::WeakPassword(_))
        ));
    }

    #[test]
    fn test_validate_password_ok() {
        assert!(validate_password("long enough password").is_ok());
    }

    #[test]
    fn test_hash_and_verify_roundtrip() {
        let hash = hash_password("correct horse battery").unwrap();
        assert!(verify_password("correct horse battery", &hash).is_ok());
        assert!(matches!(
            verify_password("wrong password", &hash),
            Err(AuthError::InvalidCredentials)
        ));
    }
}
