//! Back-office API. Every handler takes [`RequireAdmin`].
//!
//! ```text
//! GET  /api/admin/dashboard
//! POST /api/admin/product/add | update | remove
//! GET  /api/admin/order/list
//! POST /api/admin/order/status
//! POST /api/admin/tour/add | update | remove
//! POST /api/admin/stay/add | remove
//! GET  /api/admin/booking/list
//! POST /api/admin/booking/status
//! GET  /api/admin/contact/list
//! POST /api/admin/contact/remove
//! POST /api/admin/story/add | remove
//! ```
//!
//! [`RequireAdmin`]: crate::middleware::RequireAdmin

pub mod bookings;
pub mod catalog;
pub mod content;
pub mod orders;

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use serde::Deserialize;

use crate::db::{DashboardRepository, DashboardStats};
use crate::error::Result;
use crate::middleware::RequireAdmin;
use crate::routes::{ApiResponse, ok};
use crate::state::AppState;

/// Body for endpoints that act on one record.
#[derive(Debug, Deserialize)]
pub struct IdRequest<T> {
    pub id: T,
}

/// Create the back-office routes router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(dashboard))
        .route("/product/add", post(catalog::add))
        .route("/product/update", post(catalog::update))
        .route("/product/remove", post(catalog::remove))
        .route("/order/list", get(orders::list))
        .route("/order/status", post(orders::status))
        .route("/tour/add", post(bookings::add_tour))
        .route("/tour/update", post(bookings::update_tour))
        .route("/tour/remove", post(bookings::remove_tour))
        .route("/stay/add", post(bookings::add_stay))
        .route("/stay/remove", post(bookings::remove_stay))
        .route("/booking/list", get(bookings::list))
        .route("/booking/status", post(bookings::status))
        .route("/contact/list", get(content::messages))
        .route("/contact/remove", post(content::remove_message))
        .route("/story/add", post(content::add_story))
        .route("/story/remove", post(content::remove_story))
}

/// Headline numbers.
///
/// GET /api/admin/dashboard
///
/// # Errors
///
/// Returns `AppError::Database` if an aggregate query fails.
pub async fn dashboard(
    State(state): State<AppState>,
    _admin: RequireAdmin,
) -> Result<Json<ApiResponse<DashboardStats>>> {
    let stats = DashboardRepository::new(state.pool()).stats().await?;
    Ok(ok(stats))
}
