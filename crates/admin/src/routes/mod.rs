//! Admin HTTP routes.
//!
//! Every route requires the `ADMIN_API_TOKEN` bearer token.
//!
//! ```text
//! GET    /dashboard            - Order/stock/revenue aggregates
//! GET    /products             - List products
//! POST   /products             - Create product
//! GET    /products/{id}        - Product detail
//! PUT    /products/{id}        - Update product
//! DELETE /products/{id}        - Delete product
//! GET    /orders               - List orders (?status=&complete=)
//! GET    /orders/{id}          - Order detail with lines
//! POST   /orders/{id}/status   - Admin-driven status transition
//! ```

pub mod dashboard;
pub mod orders;
pub mod products;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};

use crate::middleware::require_token;
use crate::state::AppState;

/// Create all admin routes, wrapped in the token guard.
pub fn routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(dashboard::show))
        .route("/products", get(products::list).post(products::create))
        .route(
            "/products/{id}",
            get(products::show)
                .put(products::update)
                .delete(products::delete),
        )
        .route("/orders", get(orders::list))
        .route("/orders/{id}", get(orders::show))
        .route("/orders/{id}/status", post(orders::set_status))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            require_token,
        ))
}
