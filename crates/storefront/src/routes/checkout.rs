//! Checkout and payment-callback route handlers.

use std::str::FromStr;

use axum::{
    Json,
    body::Bytes,
    extract::{Query, State},
    http::HeaderMap,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tower_sessions::Session;
use tracing::instrument;

use copper_kettle_core::OrderId;

use crate::error::{AppError, Result};
use crate::middleware::current_user;
use crate::models::order::ShippingFields;
use crate::payments::{self, SIGNATURE_HEADER};
use crate::routes::cart::read_cart_cookie;
use crate::services::CheckoutService;
use crate::services::checkout::{CheckoutError, FinalizeOutcome, GuestInfo};
use crate::state::AppState;

/// Checkout submission body.
#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    /// The total the buyer believes they are paying, as a decimal string.
    pub total: String,
    /// Guest identity; required when not logged in.
    pub guest: Option<GuestForm>,
    /// Shipping fields; required when the cart has physical items.
    pub shipping: Option<ShippingFields>,
}

/// Guest identity fields.
#[derive(Debug, Deserialize)]
pub struct GuestForm {
    pub name: String,
    pub email: String,
}

/// Successful checkout response.
#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    /// Hosted checkout URL to redirect the buyer to.
    pub redirect_url: String,
}

fn checkout_service(state: &AppState) -> CheckoutService<'_> {
    CheckoutService::new(
        state.pool(),
        state.gateway(),
        state.notifier(),
        state.config().stock_policy,
        &state.config().payment.currency,
        &state.config().base_url,
    )
}

/// Begin checkout: capture the submission and open a gateway session.
#[instrument(skip(state, session, headers, request))]
pub async fn begin(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    Json(request): Json<CheckoutRequest>,
) -> Result<Json<CheckoutResponse>> {
    let claimed_total = Decimal::from_str(request.total.trim())
        .map_err(|_| AppError::Checkout(CheckoutError::InvalidAmount(request.total.clone())))?;

    let service = checkout_service(&state);

    let redirect_url = match current_user(&state, &session).await? {
        Some(user) => {
            service
                .begin_for_user(&user, claimed_total, request.shipping)
                .await?
        }
        None => {
            let guest = request
                .guest
                .ok_or(AppError::Checkout(CheckoutError::MissingGuestInfo))?;
            let cookie = read_cart_cookie(&headers, state.signing_secret());
            service
                .begin_for_guest(
                    &cookie,
                    &GuestInfo {
                        name: guest.name,
                        email: guest.email,
                    },
                    claimed_total,
                    request.shipping,
                )
                .await?
        }
    };

    Ok(Json(CheckoutResponse { redirect_url }))
}

/// Signed payment gateway webhook.
///
/// Confirmations finalize the order (idempotently); failures leave the order
/// incomplete and are only logged.
#[instrument(skip(state, headers, body))]
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::BadRequest("missing webhook signature".to_owned()))?;

    let event = payments::parse_webhook(&state.config().payment.webhook_secret, &body, signature)?;

    let order_id = event
        .order_reference
        .parse::<i32>()
        .map(OrderId::new)
        .map_err(|_| {
            AppError::BadRequest(format!("invalid order reference: {}", event.order_reference))
        })?;

    if !event.is_confirmed() {
        tracing::info!(
            order_id = order_id.as_i32(),
            event = %event.event,
            "payment not confirmed; order stays incomplete"
        );
        return Ok(Json(json!({ "status": "ignored" })));
    }

    let payment_id = event
        .payment_id
        .as_deref()
        .ok_or_else(|| AppError::BadRequest("confirmation without payment id".to_owned()))?;

    let charged_total = event
        .amount
        .as_deref()
        .and_then(|a| Decimal::from_str(a).ok())
        .ok_or_else(|| AppError::BadRequest("confirmation without a valid amount".to_owned()))?;

    let outcome = checkout_service(&state)
        .finalize(order_id, payment_id, charged_total)
        .await?;

    let status = match outcome {
        FinalizeOutcome::Finalized(_) => "finalized",
        FinalizeOutcome::AlreadyComplete(_) => "already_complete",
    };

    Ok(Json(json!({
        "status": status,
        "transaction_id": outcome.order().transaction_id,
    })))
}

/// Query parameters on the success landing page.
#[derive(Debug, Deserialize)]
pub struct SuccessParams {
    pub order: Option<i32>,
}

/// Buyer lands here after paying; the webhook does the real work.
#[instrument]
pub async fn success(Query(params): Query<SuccessParams>) -> Json<Value> {
    Json(json!({
        "message": "Payment received. Your order is being processed.",
        "order": params.order,
    }))
}

/// Buyer lands here after cancelling at the gateway.
#[instrument]
pub async fn cancelled() -> Json<Value> {
    Json(json!({
        "message": "Payment cancelled. Your cart has been kept.",
    }))
}
