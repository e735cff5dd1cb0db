//! Admin order handlers: listings and status transitions.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use copper_kettle_core::{OrderId, OrderStatus};

use crate::db::AdminOrderRepository;
use crate::db::orders::{AdminOrder, AdminOrderLine};
use crate::error::{AppError, Result};
use crate::state::AppState;

/// Listing filters.
#[derive(Debug, Deserialize, Default)]
pub struct ListParams {
    pub status: Option<String>,
    pub complete: Option<bool>,
}

/// Order detail response.
#[derive(Debug, Serialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: AdminOrder,
    pub lines: Vec<AdminOrderLine>,
    pub total: i64,
}

/// Status transition body.
#[derive(Debug, Deserialize)]
pub struct SetStatusRequest {
    pub status: String,
}

/// List orders with optional filters.
#[instrument(skip(state))]
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<AdminOrder>>> {
    let status = params
        .status
        .as_deref()
        .map(str::parse::<OrderStatus>)
        .transpose()
        .map_err(AppError::BadRequest)?;

    let orders = AdminOrderRepository::new(state.pool())
        .list(status, params.complete)
        .await?;

    Ok(Json(orders))
}

/// Order detail with lines and the snapshot total.
#[instrument(skip(state))]
pub async fn show(State(state): State<AppState>, Path(id): Path<i32>) -> Result<Json<OrderDetail>> {
    let repo = AdminOrderRepository::new(state.pool());
    let id = OrderId::new(id);

    let order = repo
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("order {id}")))?;
    let lines = repo.lines(id).await?;
    let total = lines
        .iter()
        .map(|l| l.unit_price * i64::from(l.quantity))
        .sum();

    Ok(Json(OrderDetail {
        order,
        lines,
        total,
    }))
}

/// Admin-driven status transition.
///
/// Transitions are not enforced as a strict sequence, but only completed
/// orders may move, and never back to `pending`.
#[instrument(skip(state, request))]
pub async fn set_status(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(request): Json<SetStatusRequest>,
) -> Result<Json<AdminOrder>> {
    let status: OrderStatus = request.status.parse().map_err(AppError::BadRequest)?;

    if !OrderStatus::ADMIN_SETTABLE.contains(&status) {
        return Err(AppError::Conflict(format!(
            "orders cannot be moved to '{status}'"
        )));
    }

    let repo = AdminOrderRepository::new(state.pool());
    let id = OrderId::new(id);

    let order = repo
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("order {id}")))?;
    if !order.complete {
        return Err(AppError::Conflict(
            "only completed orders can change status".to_owned(),
        ));
    }

    repo.set_status(id, status).await?;

    let updated = repo
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("order {id}")))?;

    Ok(Json(updated))
}
