//! Domain models for the storefront.
//!
//! These types represent validated domain objects separate from database row
//! types. Conversions from rows live in the `db` module.

pub mod cart;
pub mod customer;
pub mod order;
pub mod otp;
pub mod product;
pub mod user;

/// Keys under which storefront data is stored in the session.
pub mod session_keys {
    /// Logged-in user id (`i32`).
    pub const USER_ID: &str = "user_id";
    /// OTP row id carried between the request and verify steps (`i32`).
    pub const OTP_ID: &str = "otp_id";
    /// Normalized phone number carried between the request and verify steps.
    pub const OTP_PHONE: &str = "otp_phone";
}
