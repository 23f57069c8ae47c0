//! Product catalog route handlers.

use axum::{
    Json,
    extract::{Path, State, rejection::PathRejection},
};

use shopfront_core::ProductId;

use crate::error::{AppError, Result};
use crate::models::Product;
use crate::state::AppState;

/// `GET /products` - the whole catalog.
pub async fn index(State(state): State<AppState>) -> Result<Json<Vec<Product>>> {
    Ok(Json(state.catalog().list().await?))
}

/// `GET /products/{id}` - one product.
pub async fn show(
    State(state): State<AppState>,
    id: std::result::Result<Path<ProductId>, PathRejection>,
) -> Result<Json<Product>> {
    let Path(id) = id?;
    state
        .catalog()
        .get(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))
}
