//! Dashboard route handler.

use axum::{Json, extract::State};
use serde::Serialize;
use tracing::instrument;

use crate::db::orders::DashboardStats;
use crate::db::products::AdminProduct;
use crate::db::{AdminOrderRepository, AdminProductRepository};
use crate::error::Result;
use crate::state::AppState;

/// Stock level at which a product shows up on the dashboard.
const LOW_STOCK_THRESHOLD: i32 = 10;

/// Dashboard response.
#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    #[serde(flatten)]
    pub stats: DashboardStats,
    pub low_stock: Vec<AdminProduct>,
}

/// Order/stock/revenue aggregates for the back office landing page.
#[instrument(skip(state))]
pub async fn show(State(state): State<AppState>) -> Result<Json<DashboardResponse>> {
    let stats = AdminOrderRepository::new(state.pool())
        .dashboard_stats()
        .await?;
    let low_stock = AdminProductRepository::new(state.pool())
        .low_stock(LOW_STOCK_THRESHOLD)
        .await?;

    Ok(Json(DashboardResponse { stats, low_stock }))
}
