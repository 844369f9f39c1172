//! HTTP route handlers for the storefront API.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                      - Liveness
//! GET  /health/ready                - Readiness (database)
//!
//! # Accounts (strict rate limit)
//! POST /api/user/register           - Create account, returns token
//! POST /api/user/login              - Sign in, merges guest cart, returns token
//! POST /api/user/logout             - Drop guest cart from the session
//! GET  /api/user/profile            - Current account (token)
//!
//! # Catalog
//! GET  /api/product/list            - All products
//! GET  /api/product/{id}            - One product
//!
//! # Cart (token or guest session)
//! POST /api/cart/add                - Add one unit of (product, size)
//! POST /api/cart/update             - Set a line's quantity
//! POST /api/cart/get                - Cart with count and amount
//!
//! # Orders (token)
//! POST /api/order/place             - Checkout the account cart
//! POST /api/order/verify            - Reconcile a gateway payment
//! POST /api/order/userorders        - Own orders
//!
//! # Tours, stays, bookings
//! GET  /api/tour/list
//! GET  /api/stay/list
//! POST /api/booking/create          - (token)
//! POST /api/booking/verify          - (token)
//! POST /api/booking/user            - (token)
//! POST /api/booking/cancel          - (token)
//!
//! # Content
//! POST /api/contact                 - Contact form
//! GET  /api/story/list
//! GET  /api/story/{slug}
//!
//! # Back-office (admin token)
//! /api/admin/...                    - See [`admin`]
//! ```
//!
//! Every success body has `"success": true`; failures are rendered by
//! [`AppError`](crate::error::AppError) with `"success": false`.

pub mod admin;
pub mod booking;
pub mod cart;
pub mod content;
pub mod health;
pub mod order;
pub mod product;
pub mod user;

use axum::{
    Json, Router,
    routing::{get, post},
};
use serde::Serialize;

use crate::middleware::{api_rate_limiter, auth_rate_limiter};
use crate::state::AppState;

/// Success envelope: `{"success": true, ...fields of T}`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(flatten)]
    pub body: T,
}

/// Wrap a body in the success envelope.
pub const fn ok<T: Serialize>(body: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        success: true,
        body,
    })
}

/// Success body with nothing but a message.
#[derive(Debug, Serialize)]
pub struct Message {
    pub message: &'static str,
}

/// Create the account routes router.
pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(user::register))
        .route("/login", post(user::login))
        .route("/logout", post(user::logout))
        .route("/profile", get(user::profile))
}

/// Create the shop routes router (catalog, cart, orders).
pub fn shop_routes() -> Router<AppState> {
    Router::new()
        .route("/product/list", get(product::list))
        .route("/product/{id}", get(product::show))
        .route("/cart/add", post(cart::add))
        .route("/cart/update", post(cart::update))
        .route("/cart/get", post(cart::get))
        .route("/order/place", post(order::place))
        .route("/order/verify", post(order::verify))
        .route("/order/userorders", post(order::user_orders))
}

/// Create the tour, stay, and booking routes router.
pub fn booking_routes() -> Router<AppState> {
    Router::new()
        .route("/tour/list", get(booking::tours))
        .route("/stay/list", get(booking::stays))
        .route("/booking/create", post(booking::create))
        .route("/booking/verify", post(booking::verify))
        .route("/booking/user", post(booking::user_bookings))
        .route("/booking/cancel", post(booking::cancel))
}

/// Create the contact and story routes router.
pub fn content_routes() -> Router<AppState> {
    Router::new()
        .route("/contact", post(content::contact))
        .route("/story/list", get(content::stories))
        .route("/story/{slug}", get(content::story))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    let api = Router::new()
        .merge(shop_routes())
        .merge(booking_routes())
        .merge(content_routes())
        .nest("/admin", admin::routes())
        .layer(api_rate_limiter());

    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .nest("/api/user", user_routes().layer(auth_rate_limiter()))
        .nest("/api", api)
}
