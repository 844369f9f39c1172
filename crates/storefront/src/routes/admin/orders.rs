//! Order management.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use kharnak_core::{OrderId, OrderStatus};

use crate::db::OrderRepository;
use crate::error::Result;
use crate::middleware::RequireAdmin;
use crate::models::Order;
use crate::routes::{ApiResponse, ok};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct OrderList {
    pub orders: Vec<Order>,
}

#[derive(Debug, Serialize)]
pub struct OrderBody {
    pub order: Order,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOrderStatus {
    pub order_id: OrderId,
    pub status: OrderStatus,
}

/// Every order, newest first.
///
/// GET /api/admin/order/list
///
/// # Errors
///
/// Returns `AppError::Database` if the query fails.
pub async fn list(
    State(state): State<AppState>,
    _admin: RequireAdmin,
) -> Result<Json<ApiResponse<OrderList>>> {
    let orders = OrderRepository::new(state.pool()).list_all().await?;
    Ok(ok(OrderList { orders }))
}

/// Move an order along its fulfilment states.
///
/// POST /api/admin/order/status
///
/// # Errors
///
/// Returns `AppError::Checkout(OrderClosed)` for cancelled or failed orders.
#[instrument(skip(state, _admin, req), fields(order_id = %req.order_id, status = %req.status))]
pub async fn status(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Json(req): Json<UpdateOrderStatus>,
) -> Result<Json<ApiResponse<OrderBody>>> {
    let order = state
        .checkout()
        .update_status(req.order_id, req.status)
        .await?;
    Ok(ok(OrderBody { order }))
}
