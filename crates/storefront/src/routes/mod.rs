//! HTTP route handlers for the storefront.
//!
//! All surfaces are JSON. Route structure:
//!
//! ```text
//! GET  /health                  - Liveness check
//! GET  /health/ready            - Readiness check (database ping)
//!
//! # Catalog
//! GET  /catalog                 - Product listing (q, category, sort, page)
//! GET  /catalog/{id}            - Product detail (+ view counter, related)
//!
//! # Cart
//! GET  /cart                    - Current cart (session order or signed cookie)
//! POST /cart/items              - Add/remove one unit of a product
//!
//! # Checkout & payments
//! POST /checkout                - Begin checkout, returns gateway redirect URL
//! POST /payments/webhook        - Signed gateway callback (confirm/fail)
//! GET  /payments/success        - Buyer lands here after paying
//! GET  /payments/cancelled      - Buyer lands here after cancelling
//!
//! # Orders
//! GET  /orders                  - Order history (requires auth)
//!
//! # Auth (rate limited)
//! POST /auth/register           - Create account (username/password/phone)
//! POST /auth/login              - Password login
//! POST /auth/logout             - Logout
//! POST /auth/otp/request       - Issue a login OTP
//! POST /auth/otp/verify        - Verify the OTP and log in
//! POST /auth/otp/resend        - Reissue and resend the OTP
//!
//! # Side APIs
//! POST /api/reviews             - Upsert a product review (requires auth)
//! GET  /api/products/{id}/reviews - List reviews of a product
//! POST /api/wishlist/toggle     - Toggle wishlist membership (requires auth)
//! GET  /api/wishlist            - List the wishlist (requires auth)
//! POST /api/newsletter          - Subscribe an email (idempotent)
//! ```

pub mod api;
pub mod auth;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod orders;

use axum::{
    Router,
    routing::{get, post},
};

use crate::middleware;
use crate::state::AppState;

/// Create the catalog routes router.
pub fn catalog_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(catalog::index))
        .route("/{id}", get(catalog::show))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/items", post(cart::update_item))
}

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/otp/request", post(auth::otp_request))
        .route("/otp/verify", post(auth::otp_verify))
        .route("/otp/resend", post(auth::otp_resend))
}

/// Create the side-API routes router.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/reviews", post(api::add_review))
        .route("/products/{id}/reviews", get(api::list_reviews))
        .route("/wishlist/toggle", post(api::toggle_wishlist))
        .route("/wishlist", get(api::get_wishlist))
        .route("/newsletter", post(api::subscribe_newsletter))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        // Catalog
        .nest("/catalog", catalog_routes())
        // Cart
        .nest("/cart", cart_routes())
        // Checkout & payment callbacks
        .route("/checkout", post(checkout::begin))
        .route("/payments/webhook", post(checkout::webhook))
        .route("/payments/success", get(checkout::success))
        .route("/payments/cancelled", get(checkout::cancelled))
        // Order history
        .route("/orders", get(orders::history))
        // Auth (throttled)
        .nest("/auth", auth_routes().layer(middleware::auth_rate_limiter()))
        // Side APIs
        .nest("/api", api_routes())
}
