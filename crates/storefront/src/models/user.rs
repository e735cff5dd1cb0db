//! User account domain types.

use chrono::{DateTime, Utc};

use copper_kettle_core::{Email, PhoneNumber, UserId};

/// A storefront user account (domain type).
///
/// Users authenticate with username/password or with a phone OTP.
#[derive(Debug, Clone)]
pub struct User {
    /// Unique user ID.
    pub id: UserId,
    /// Login name, unique.
    pub username: String,
    /// Contact email.
    pub email: Email,
    /// When the account was created.
    pub created_at: DateTime<Utc>,
}

/// The one-to-one link between a user and their phone number.
#[derive(Debug, Clone)]
pub struct UserPhone {
    /// Owning user.
    pub user_id: UserId,
    /// Normalized phone number, unique across users.
    pub phone_number: PhoneNumber,
    /// Whether ownership of the number has been verified.
    pub verified: bool,
    /// When the link was created.
    pub created_at: DateTime<Utc>,
}
