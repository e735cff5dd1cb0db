//! Database operations for the storefront `PostgreSQL`.
//!
//! # Schema: `store`
//!
//! - `products` - Catalog products with stock and view counters
//! - `customers` - Buyers (lazily created, optionally linked to a user)
//! - `orders` - Orders; an incomplete order is an authenticated cart
//! - `order_items` - Line items with snapshotted unit prices
//! - `shipping_addresses` - Created at finalization for physical orders
//! - `users` / `user_phones` - Accounts and their phone links
//! - `otps` - One-time passcodes
//! - `product_reviews` / `wishlist_items` / `newsletter_subscribers`
//!
//! All queries use sqlx's runtime-bound API; rows are mapped through
//! `sqlx::FromRow` structs and `TryFrom` conversions into domain models.
//!
//! # Migrations
//!
//! Migrations live in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p copper-kettle-cli -- migrate run
//! ```

pub mod customers;
pub mod newsletter;
pub mod orders;
pub mod otps;
pub mod products;
pub mod reviews;
pub mod users;
pub mod wishlist;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use customers::CustomerRepository;
pub use newsletter::NewsletterRepository;
pub use orders::OrderRepository;
pub use otps::OtpRepository;
pub use products::ProductRepository;
pub use reviews::ReviewRepository;
pub use users::UserRepository;
pub use wishlist::WishlistRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique phone number).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
