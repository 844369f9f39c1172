//! Cart route handlers.
//!
//! The same endpoints serve guests and signed-in users: with a `token`
//! header the account cart is used, otherwise the session's guest cart.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use kharnak_core::ProductId;

use crate::error::Result;
use crate::middleware::OptionalUser;
use crate::routes::{ApiResponse, ok};
use crate::services::cart::{CartOwner, CartView};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToCart {
    pub item_id: ProductId,
    #[serde(default)]
    pub size: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCart {
    pub item_id: ProductId,
    #[serde(default)]
    pub size: String,
    pub quantity: i64,
}

#[derive(Debug, Serialize)]
pub struct CartBody {
    #[serde(flatten)]
    pub cart: CartView,
    pub message: &'static str,
}

fn owner(user: OptionalUser, session: Session) -> CartOwner {
    match user.0 {
        Some(user) => CartOwner::User(user.id),
        None => CartOwner::Guest(session),
    }
}

/// Add one unit of a product in a size.
///
/// POST /api/cart/add
///
/// # Errors
///
/// Returns `AppError::Cart` with "Select Product Size" when no size is
/// given, or "Maximum available quantity reached" at the stock limit.
#[instrument(skip(state, user, session))]
pub async fn add(
    State(state): State<AppState>,
    user: OptionalUser,
    session: Session,
    Json(req): Json<AddToCart>,
) -> Result<Json<ApiResponse<CartBody>>> {
    let cart = state
        .carts()
        .add_item(&owner(user, session), req.item_id, &req.size)
        .await?;
    Ok(ok(CartBody {
        cart,
        message: "Added To Cart",
    }))
}

/// Overwrite a line's quantity. Zero removes the line.
///
/// POST /api/cart/update
///
/// # Errors
///
/// Returns `AppError::Cart` if the quantity exceeds stock.
#[instrument(skip(state, user, session))]
pub async fn update(
    State(state): State<AppState>,
    user: OptionalUser,
    session: Session,
    Json(req): Json<UpdateCart>,
) -> Result<Json<ApiResponse<CartBody>>> {
    let cart = state
        .carts()
        .update_quantity(&owner(user, session), req.item_id, &req.size, req.quantity)
        .await?;
    Ok(ok(CartBody {
        cart,
        message: "Cart Updated",
    }))
}

/// The cart with its item count and amount.
///
/// POST /api/cart/get
///
/// # Errors
///
/// Returns `AppError::Cart` if the cart cannot be loaded.
pub async fn get(
    State(state): State<AppState>,
    user: OptionalUser,
    session: Session,
) -> Result<Json<ApiResponse<CartView>>> {
    let cart = state.carts().get(&owner(user, session)).await?;
    Ok(ok(cart))
}
