//! Order history route handlers.

use axum::{Json, extract::State};
use serde::Serialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::db::OrderRepository;
use crate::error::Result;
use crate::middleware::require_user;
use crate::models::order::Order;
use crate::services::CartService;
use crate::state::AppState;

/// One line of a historical order.
#[derive(Debug, Serialize)]
pub struct HistoryLine {
    pub product_id: i32,
    pub product_name: String,
    pub quantity: i32,
    /// Unit price snapshotted at order time.
    pub unit_price: i64,
    pub line_total: i64,
}

/// A historical order with its lines.
#[derive(Debug, Serialize)]
pub struct HistoryEntry {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<HistoryLine>,
    pub total: i64,
}

/// Completed orders for the logged-in user, newest first.
#[instrument(skip(state, session))]
pub async fn history(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<Vec<HistoryEntry>>> {
    let user = require_user(&state, &session).await?;

    let (customer, _) = CartService::new(state.pool())
        .current_order_for_user(&user)
        .await?;

    let orders = OrderRepository::new(state.pool());
    let completed = orders.history(customer.id).await?;

    let mut entries = Vec::with_capacity(completed.len());
    for order in completed {
        let items: Vec<HistoryLine> = orders
            .items_with_products(order.id)
            .await?
            .into_iter()
            .map(|(item, product)| HistoryLine {
                product_id: product.id.as_i32(),
                product_name: product.name,
                quantity: item.quantity,
                unit_price: item.unit_price,
                line_total: item.total(),
            })
            .collect();

        let total = items.iter().map(|l| l.line_total).sum();
        entries.push(HistoryEntry {
            order,
            items,
            total,
        });
    }

    Ok(Json(entries))
}
