//! Cart route handlers.
//!
//! Authenticated carts live server-side as the customer's incomplete order.
//! Anonymous carts travel in a signed cookie: the server is the only party
//! able to mint a valid signature, so mutation happens here and the client
//! just stores the result.

use axum::{
    Json,
    extract::State,
    http::{HeaderMap, header},
    response::{AppendHeaders, IntoResponse, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use copper_kettle_core::ProductId;

use crate::db::ProductRepository;
use crate::error::{AppError, Result};
use crate::middleware::current_user;
use crate::models::cart::{CART_COOKIE_NAME, CartAction, CartCookie, CartMutation};
use crate::services::CartService;
use crate::services::cart::CartError;
use crate::state::AppState;

/// Cart mutation request body.
#[derive(Debug, Deserialize)]
pub struct UpdateItemRequest {
    pub product_id: i32,
    pub action: CartAction,
}

// =============================================================================
// Cookie Helpers
// =============================================================================

/// Read and authenticate the anonymous cart cookie; any invalid value is
/// treated as an empty cart.
pub fn read_cart_cookie(headers: &HeaderMap, secret: &[u8]) -> CartCookie {
    let Some(value) = cart_cookie_value(headers) else {
        return CartCookie::empty();
    };

    CartCookie::decode(&value, secret).unwrap_or_else(|e| {
        tracing::debug!(error = %e, "discarding invalid cart cookie");
        CartCookie::empty()
    })
}

fn cart_cookie_value(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::COOKIE)?
        .to_str()
        .ok()?
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == CART_COOKIE_NAME)
        .map(|(_, value)| value.to_owned())
}

/// Build the `Set-Cookie` value for a cart cookie.
fn set_cookie_value(state: &AppState, cart: &CartCookie) -> String {
    let encoded = cart.encode(state.signing_secret());
    let secure = if state.config().base_url.starts_with("https://") {
        "; Secure"
    } else {
        ""
    };
    format!("{CART_COOKIE_NAME}={encoded}; Path=/; SameSite=Lax; HttpOnly{secure}")
}

// =============================================================================
// Handlers
// =============================================================================

/// Current cart for either identity kind.
#[instrument(skip(state, session, headers))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
) -> Result<Response> {
    let carts = CartService::new(state.pool());

    let view = match current_user(&state, &session).await? {
        Some(user) => carts.resolve_for_user(&user).await?,
        None => {
            let cookie = read_cart_cookie(&headers, state.signing_secret());
            carts.resolve_anonymous(&cookie).await?
        }
    };

    Ok(Json(view).into_response())
}

/// Add or remove one unit of a product.
///
/// Authenticated requests mutate the persisted order under the product row
/// lock; anonymous requests mutate the signed cookie (stock is checked, not
/// reserved, in both cases).
#[instrument(skip(state, session, headers))]
pub async fn update_item(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    Json(request): Json<UpdateItemRequest>,
) -> Result<Response> {
    let product_id = ProductId::new(request.product_id);
    let carts = CartService::new(state.pool());

    if let Some(user) = current_user(&state, &session).await? {
        let mutation = carts.update_item(&user, product_id, request.action).await?;
        return Ok(Json(mutation).into_response());
    }

    // Anonymous path: validate against the product, then re-sign the cookie
    let mut cookie = read_cart_cookie(&headers, state.signing_secret());
    let mutation = apply_anonymous(&state, &mut cookie, product_id, request.action).await?;

    Ok((
        AppendHeaders([(header::SET_COOKIE, set_cookie_value(&state, &cookie))]),
        Json(mutation),
    )
        .into_response())
}

async fn apply_anonymous(
    state: &AppState,
    cookie: &mut CartCookie,
    product_id: ProductId,
    action: CartAction,
) -> Result<CartMutation> {
    let product = ProductRepository::new(state.pool())
        .get(product_id)
        .await?
        .ok_or(AppError::Cart(CartError::ProductNotFound))?;

    if action == CartAction::Add {
        let next = cookie.quantity(product_id) + 1;
        let stock = u32::try_from(product.stock).unwrap_or(0);
        if next > stock {
            return Err(CartError::OutOfStock {
                available: product.stock,
            }
            .into());
        }
    }

    Ok(cookie.apply(product_id, action))
}
