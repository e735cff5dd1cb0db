//! JSON side APIs: reviews, wishlist, newsletter.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Deserialize;
use serde_json::{Value, json};
use tower_sessions::Session;
use tracing::instrument;

use copper_kettle_core::{Email, ProductId};

use crate::db::reviews::Review;
use crate::db::wishlist::WishlistEntry;
use crate::db::{NewsletterRepository, ProductRepository, ReviewRepository, WishlistRepository};
use crate::error::{AppError, Result};
use crate::middleware::require_user;
use crate::state::AppState;

/// Review submission body.
#[derive(Debug, Deserialize)]
pub struct AddReviewRequest {
    pub product_id: i32,
    /// 1-5 stars.
    pub rating: i32,
    #[serde(default)]
    pub comment: String,
}

/// Wishlist toggle body.
#[derive(Debug, Deserialize)]
pub struct ToggleWishlistRequest {
    pub product_id: i32,
}

/// Newsletter subscription body.
#[derive(Debug, Deserialize)]
pub struct NewsletterRequest {
    pub email: String,
}

/// Create or replace the user's review of a product.
///
/// A review counts as a verified purchase when the user has a completed
/// order containing the product.
#[instrument(skip(state, session, request))]
pub async fn add_review(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<AddReviewRequest>,
) -> Result<Json<Value>> {
    let user = require_user(&state, &session).await?;

    if !(1..=5).contains(&request.rating) {
        return Err(AppError::BadRequest(
            "rating must be between 1 and 5".to_owned(),
        ));
    }

    let product_id = ProductId::new(request.product_id);
    if ProductRepository::new(state.pool())
        .get(product_id)
        .await?
        .is_none()
    {
        return Err(AppError::NotFound(format!("product {product_id}")));
    }

    let reviews = ReviewRepository::new(state.pool());
    let verified = reviews.has_purchased(user.id, product_id).await?;

    reviews
        .upsert(
            user.id,
            product_id,
            request.rating,
            request.comment.trim(),
            verified,
        )
        .await?;

    Ok(Json(json!({
        "message": "Review added successfully",
        "verified": verified,
    })))
}

/// Reviews of a product, newest first.
#[instrument(skip(state))]
pub async fn list_reviews(
    State(state): State<AppState>,
    Path(product_id): Path<i32>,
) -> Result<Json<Vec<Review>>> {
    let reviews = ReviewRepository::new(state.pool())
        .for_product(ProductId::new(product_id))
        .await?;

    Ok(Json(reviews))
}

/// Toggle a product on the user's wishlist.
#[instrument(skip(state, session, request))]
pub async fn toggle_wishlist(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<ToggleWishlistRequest>,
) -> Result<Json<Value>> {
    let user = require_user(&state, &session).await?;

    let product_id = ProductId::new(request.product_id);
    if ProductRepository::new(state.pool())
        .get(product_id)
        .await?
        .is_none()
    {
        return Err(AppError::NotFound(format!("product {product_id}")));
    }

    let added = WishlistRepository::new(state.pool())
        .toggle(user.id, product_id)
        .await?;

    Ok(Json(json!({
        "action": if added { "added" } else { "removed" },
    })))
}

/// The user's wishlist.
#[instrument(skip(state, session))]
pub async fn get_wishlist(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<Vec<WishlistEntry>>> {
    let user = require_user(&state, &session).await?;

    let entries = WishlistRepository::new(state.pool()).list(user.id).await?;

    Ok(Json(entries))
}

/// Subscribe an email to the newsletter, idempotently.
#[instrument(skip(state, request))]
pub async fn subscribe_newsletter(
    State(state): State<AppState>,
    Json(request): Json<NewsletterRequest>,
) -> Result<Json<Value>> {
    let email = Email::parse(request.email.trim())
        .map_err(|e| AppError::BadRequest(format!("invalid email: {e}")))?;

    let created = NewsletterRepository::new(state.pool())
        .subscribe(&email)
        .await?;

    let message = if created {
        "Subscribed successfully"
    } else {
        "Already subscribed"
    };

    Ok(Json(json!({ "message": message })))
}
