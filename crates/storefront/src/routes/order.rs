//! Order route handlers.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use kharnak_core::{OrderId, PaymentMethod};

use crate::db::OrderRepository;
use crate::error::{Result, add_breadcrumb};
use crate::middleware::RequireUser;
use crate::models::{Address, Order};
use crate::routes::{ApiResponse, ok};
use crate::services::checkout::PlacedOrder;
use crate::services::razorpay::PaymentConfirmation;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrder {
    pub address: Address,
    pub payment_method: PaymentMethod,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyOrder {
    pub order_id: OrderId,
    #[serde(flatten)]
    pub confirmation: PaymentConfirmation,
}

#[derive(Debug, Serialize)]
pub struct OrderBody {
    pub order: Order,
}

#[derive(Debug, Serialize)]
pub struct OrderList {
    pub orders: Vec<Order>,
}

/// Check out the account cart.
///
/// POST /api/order/place
///
/// For `razorpay` the response carries the gateway order the checkout
/// widget opens.
///
/// # Errors
///
/// Returns `AppError::Checkout` for an empty cart, short stock ("Only N left
/// in stock"), a bad address, or an unavailable payment method.
#[instrument(skip(state, req), fields(method = %req.payment_method))]
pub async fn place(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Json(req): Json<PlaceOrder>,
) -> Result<Json<ApiResponse<PlacedOrder>>> {
    let placed = state
        .checkout()
        .place_order(user.id, req.address, req.payment_method)
        .await?;
    add_breadcrumb("checkout", "Order placed", None);
    Ok(ok(placed))
}

/// Reconcile a payment reported by the checkout widget.
///
/// POST /api/order/verify
///
/// # Errors
///
/// Returns `AppError::Checkout(Payment(SignatureMismatch))` after marking
/// the order failed, `AppError::Checkout(NotPaidOnline)` for cash orders,
/// or `AppError::Checkout(OrderNotFound)`.
#[instrument(skip(state, req), fields(order_id = %req.order_id))]
pub async fn verify(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Json(req): Json<VerifyOrder>,
) -> Result<Json<ApiResponse<OrderBody>>> {
    let order = state
        .checkout()
        .verify_payment(user.id, req.order_id, &req.confirmation)
        .await?;
    Ok(ok(OrderBody { order }))
}

/// The caller's orders, newest first.
///
/// POST /api/order/userorders
///
/// # Errors
///
/// Returns `AppError::Database` if the query fails.
pub async fn user_orders(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<ApiResponse<OrderList>>> {
    let orders = OrderRepository::new(state.pool())
        .list_for_user(user.id)
        .await?;
    Ok(ok(OrderList { orders }))
}
