//! Catalog route handlers.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Serialize;

use kharnak_core::ProductId;

use crate::error::{AppError, Result};
use crate::models::Product;
use crate::routes::{ApiResponse, ok};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ProductList {
    pub products: Vec<Product>,
}

#[derive(Debug, Serialize)]
pub struct ProductDetail {
    pub product: Product,
}

/// All products, newest first.
///
/// GET /api/product/list
///
/// # Errors
///
/// Returns `AppError::Database` if the catalog cannot be loaded.
pub async fn list(State(state): State<AppState>) -> Result<Json<ApiResponse<ProductList>>> {
    let snapshot = state.catalog().snapshot().await?;
    Ok(ok(ProductList {
        products: snapshot.products().to_vec(),
    }))
}

/// One product.
///
/// GET /api/product/{id}
///
/// # Errors
///
/// Returns `AppError::NotFound` for an unknown id.
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<Json<ApiResponse<ProductDetail>>> {
    let snapshot = state.catalog().snapshot().await?;
    let product = snapshot
        .get(id)
        .cloned()
        .ok_or_else(|| AppError::NotFound("Product".to_owned()))?;
    Ok(ok(ProductDetail { product }))
}
