//! Catalog route handlers: listing, search and product detail.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use copper_kettle_core::ProductId;

use crate::db::ProductRepository;
use crate::db::products::CatalogQuery;
use crate::error::{AppError, Result};
use crate::models::product::{CatalogSort, Product, sanitize_search_query};
use crate::state::AppState;

/// Query parameters for the catalog listing.
#[derive(Debug, Deserialize, Default)]
pub struct CatalogParams {
    /// Free-text search.
    pub q: Option<String>,
    /// Category filter.
    pub category: Option<String>,
    /// Sort key: `newest` (default), `price_low`, `price_high`, `popular`.
    pub sort: Option<String>,
    /// 1-based page.
    pub page: Option<i64>,
}

/// Catalog listing response.
#[derive(Debug, Serialize)]
pub struct CatalogResponse {
    pub products: Vec<Product>,
    pub categories: Vec<String>,
    pub total: i64,
    pub page: i64,
    pub page_count: i64,
}

/// Product detail response.
#[derive(Debug, Serialize)]
pub struct ProductDetailResponse {
    pub product: Product,
    pub related_products: Vec<Product>,
}

/// List catalog products.
#[instrument(skip(state))]
pub async fn index(
    State(state): State<AppState>,
    Query(params): Query<CatalogParams>,
) -> Result<Json<CatalogResponse>> {
    let search = params
        .q
        .as_deref()
        .map(sanitize_search_query)
        .filter(|q| !q.is_empty());

    let query = CatalogQuery {
        search,
        category: params.category.filter(|c| !c.is_empty()),
        sort: params
            .sort
            .as_deref()
            .map(CatalogSort::from_param)
            .unwrap_or_default(),
        page: params.page.unwrap_or(1),
    };

    let page = ProductRepository::new(state.pool()).list(&query).await?;
    let categories = state.categories().await?;

    Ok(Json(CatalogResponse {
        products: page.products,
        categories: categories.as_ref().clone(),
        total: page.total,
        page: page.page,
        page_count: page.page_count,
    }))
}

/// Product detail with related products; bumps the view counter.
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<ProductDetailResponse>> {
    let products = ProductRepository::new(state.pool());
    let id = ProductId::new(id);

    let product = products
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {id}")))?;

    products.increment_views(id).await?;

    let related_products = products.related(product.category.as_deref(), id, 4).await?;

    Ok(Json(ProductDetailResponse {
        product,
        related_products,
    }))
}
