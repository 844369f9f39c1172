//! Product management.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use kharnak_core::ProductId;

use super::IdRequest;
use crate::error::Result;
use crate::middleware::RequireAdmin;
use crate::models::{Product, ProductInput};
use crate::routes::{ApiResponse, Message, ok};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct UpdateProduct {
    pub id: ProductId,
    #[serde(flatten)]
    pub product: ProductInput,
}

#[derive(Debug, Serialize)]
pub struct ProductBody {
    pub product: Product,
}

/// Add a product. Image URLs come from the caller.
///
/// POST /api/admin/product/add
///
/// # Errors
///
/// Returns `AppError::Validation` for a bad payload and
/// `AppError::Database(Conflict)` for a duplicate name.
#[instrument(skip(state, admin, input), fields(name = %input.name))]
pub async fn add(
    State(state): State<AppState>,
    admin: RequireAdmin,
    Json(input): Json<ProductInput>,
) -> Result<Json<ApiResponse<ProductBody>>> {
    let product = state.catalog().create(&input.validate()?).await?;
    info!(admin_id = %admin.0.id, product_id = %product.id, "product added");
    Ok(ok(ProductBody { product }))
}

/// Replace a product's fields.
///
/// POST /api/admin/product/update
///
/// # Errors
///
/// Returns `AppError::Database(NotFound)` for an unknown id.
#[instrument(skip(state, _admin, req), fields(product_id = %req.id))]
pub async fn update(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Json(req): Json<UpdateProduct>,
) -> Result<Json<ApiResponse<ProductBody>>> {
    let product = state
        .catalog()
        .update(req.id, &req.product.validate()?)
        .await?;
    Ok(ok(ProductBody { product }))
}

/// Remove a product. Carts holding it drop the line on their next read.
///
/// POST /api/admin/product/remove
///
/// # Errors
///
/// Returns `AppError::Database(NotFound)` for an unknown id.
#[instrument(skip(state, _admin, req), fields(product_id = %req.id))]
pub async fn remove(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Json(req): Json<IdRequest<ProductId>>,
) -> Result<Json<ApiResponse<Message>>> {
    state.catalog().remove(req.id).await?;
    Ok(ok(Message {
        message: "Product Removed",
    }))
}
