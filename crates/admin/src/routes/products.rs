//! Admin product CRUD handlers.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use tracing::instrument;

use copper_kettle_core::ProductId;

use crate::db::AdminProductRepository;
use crate::db::products::{AdminProduct, ProductInput};
use crate::error::{AppError, Result};
use crate::state::AppState;

/// Product create/update body.
#[derive(Debug, Deserialize)]
pub struct ProductBody {
    pub name: String,
    pub price: i64,
    #[serde(default)]
    pub digital: bool,
    pub description: Option<String>,
    #[serde(default = "default_stock")]
    pub stock: i32,
    pub category: Option<String>,
}

const fn default_stock() -> i32 {
    100
}

impl ProductBody {
    fn validate(self) -> Result<ProductInput> {
        if self.name.trim().is_empty() {
            return Err(AppError::BadRequest("name is required".to_owned()));
        }
        if self.price < 0 {
            return Err(AppError::BadRequest("price cannot be negative".to_owned()));
        }
        if self.stock < 0 {
            return Err(AppError::BadRequest("stock cannot be negative".to_owned()));
        }

        Ok(ProductInput {
            name: self.name.trim().to_owned(),
            price: self.price,
            digital: self.digital,
            description: self.description,
            stock: self.stock,
            category: self.category.filter(|c| !c.trim().is_empty()),
        })
    }
}

/// List all products.
#[instrument(skip(state))]
pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<AdminProduct>>> {
    let products = AdminProductRepository::new(state.pool()).list().await?;
    Ok(Json(products))
}

/// Product detail.
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<AdminProduct>> {
    let product = AdminProductRepository::new(state.pool())
        .get(ProductId::new(id))
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {id}")))?;

    Ok(Json(product))
}

/// Create a product.
#[instrument(skip(state, body))]
pub async fn create(
    State(state): State<AppState>,
    Json(body): Json<ProductBody>,
) -> Result<(StatusCode, Json<AdminProduct>)> {
    let input = body.validate()?;
    let product = AdminProductRepository::new(state.pool())
        .create(&input)
        .await?;

    Ok((StatusCode::CREATED, Json(product)))
}

/// Update a product.
#[instrument(skip(state, body))]
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(body): Json<ProductBody>,
) -> Result<Json<AdminProduct>> {
    let input = body.validate()?;
    let product = AdminProductRepository::new(state.pool())
        .update(ProductId::new(id), &input)
        .await
        .map_err(|e| match e {
            crate::db::RepositoryError::NotFound => {
                AppError::NotFound(format!("product {id}"))
            }
            other => other.into(),
        })?;

    Ok(Json(product))
}

/// Delete a product.
#[instrument(skip(state))]
pub async fn delete(State(state): State<AppState>, Path(id): Path<i32>) -> Result<StatusCode> {
    let deleted = AdminProductRepository::new(state.pool())
        .delete(ProductId::new(id))
        .await?;

    if !deleted {
        return Err(AppError::NotFound(format!("product {id}")));
    }

    Ok(StatusCode::NO_CONTENT)
}
