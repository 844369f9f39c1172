//! Unified error handling with Sentry integration.
//!
//! Every handler returns `Result<T, AppError>`. The response body is always
//! `{"success": false, "message": "..."}` with a message safe to show in a
//! toast; server-side failures are captured to Sentry first and answered
//! with a generic message.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::models::ValidationError;
use crate::services::auth::AuthError;
use crate::services::booking::BookingError;
use crate::services::cart::CartServiceError;
use crate::services::checkout::CheckoutError;
use crate::services::razorpay::PaymentError;
use crate::services::token::TokenError;

const INTERNAL_MESSAGE: &str = "Internal server error";

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Token missing, malformed, or expired.
    #[error("Token error: {0}")]
    Token(#[from] TokenError),

    /// Cart operation rejected.
    #[error("Cart error: {0}")]
    Cart(#[from] CartServiceError),

    /// Order placement or payment reconciliation failed.
    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    /// Booking operation rejected.
    #[error("Booking error: {0}")]
    Booking(#[from] BookingError),

    /// Payment gateway failure outside checkout.
    #[error("Payment error: {0}")]
    Payment(#[from] PaymentError),

    /// Request payload failed validation.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Session store failure.
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// User is authenticated but not allowed.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Rate limited.
    #[error("Rate limited")]
    RateLimited,

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status and client-facing message.
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            Self::Database(err) => repository(err),
            Self::Auth(err) => auth(err),
            Self::Token(_) => (
                StatusCode::UNAUTHORIZED,
                "Not Authorized Login Again".to_owned(),
            ),
            Self::Cart(err) => cart(err),
            Self::Checkout(err) => checkout(err),
            Self::Booking(err) => booking(err),
            Self::Payment(err) => payment(err),
            Self::Validation(err) => (StatusCode::BAD_REQUEST, err.0.clone()),
            Self::Session(_) | Self::Internal(_) => internal(),
            Self::NotFound(what) => (StatusCode::NOT_FOUND, format!("{what} not found")),
            Self::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            Self::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                "Too many requests, please slow down".to_owned(),
            ),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Request rejected");
        }

        (status, Json(json!({ "success": false, "message": message }))).into_response()
    }
}

fn internal() -> (StatusCode, String) {
    (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_MESSAGE.to_owned())
}

fn repository(err: &RepositoryError) -> (StatusCode, String) {
    match err {
        RepositoryError::NotFound => (StatusCode::NOT_FOUND, "Not found".to_owned()),
        RepositoryError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
        RepositoryError::Database(_) | RepositoryError::DataCorruption(_) => internal(),
    }
}

fn auth(err: &AuthError) -> (StatusCode, String) {
    match err {
        AuthError::InvalidEmail(_) => (
            StatusCode::BAD_REQUEST,
            "Please enter a valid email".to_owned(),
        ),
        AuthError::MissingName => (StatusCode::BAD_REQUEST, "Name is required".to_owned()),
        AuthError::InvalidCredentials | AuthError::UserNotFound => {
            (StatusCode::UNAUTHORIZED, "Invalid credentials".to_owned())
        }
        AuthError::UserAlreadyExists => (StatusCode::CONFLICT, "User already exists".to_owned()),
        AuthError::WeakPassword(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
        AuthError::Repository(err) => repository(err),
        AuthError::PasswordHash => internal(),
    }
}

fn cart(err: &CartServiceError) -> (StatusCode, String) {
    match err {
        CartServiceError::Cart(err) => (StatusCode::BAD_REQUEST, err.to_string()),
        CartServiceError::ProductNotFound(_) => {
            (StatusCode::NOT_FOUND, "Product not found".to_owned())
        }
        CartServiceError::InvalidSize { size, .. } => (
            StatusCode::BAD_REQUEST,
            format!("Size {size} is not available for this product"),
        ),
        CartServiceError::Conflict => (
            StatusCode::CONFLICT,
            "Your cart was updated elsewhere, please try again".to_owned(),
        ),
        CartServiceError::Session(_) => internal(),
        CartServiceError::Repository(err) => repository(err),
    }
}

fn checkout(err: &CheckoutError) -> (StatusCode, String) {
    match err {
        CheckoutError::Validation(err) => (StatusCode::BAD_REQUEST, err.0.clone()),
        CheckoutError::EmptyCart => (StatusCode::BAD_REQUEST, "Your cart is empty".to_owned()),
        CheckoutError::InsufficientStock { product, available } => (
            StatusCode::CONFLICT,
            format!("Only {available} left in stock for {product}"),
        ),
        CheckoutError::ProductNotFound(_) => (
            StatusCode::CONFLICT,
            "A product in your cart is no longer available".to_owned(),
        ),
        CheckoutError::CartChanged => (
            StatusCode::CONFLICT,
            "Your cart changed during checkout, please review it".to_owned(),
        ),
        CheckoutError::OrderNotFound => (StatusCode::NOT_FOUND, "Order not found".to_owned()),
        CheckoutError::OrderClosed(status) => {
            (StatusCode::CONFLICT, format!("Order is already {status}"))
        }
        CheckoutError::NotPaidOnline => (
            StatusCode::BAD_REQUEST,
            "This order is not paid online".to_owned(),
        ),
        CheckoutError::Payment(err) => payment(err),
        CheckoutError::Repository(err) => repository(err),
    }
}

fn booking(err: &BookingError) -> (StatusCode, String) {
    match err {
        BookingError::Validation(err) => (StatusCode::BAD_REQUEST, err.0.clone()),
        BookingError::TourNotFound => (StatusCode::NOT_FOUND, "Tour not found".to_owned()),
        BookingError::StayNotFound => (StatusCode::NOT_FOUND, "Stay not found".to_owned()),
        BookingError::BookingNotFound => (StatusCode::NOT_FOUND, "Booking not found".to_owned()),
        BookingError::TourStarted => (
            StatusCode::BAD_REQUEST,
            "This tour has already started".to_owned(),
        ),
        BookingError::NotEnoughSeats { .. } => (
            StatusCode::CONFLICT,
            "Not enough seats available".to_owned(),
        ),
        BookingError::TooManyGuests { capacity } => (
            StatusCode::BAD_REQUEST,
            format!("This stay sleeps at most {capacity} guests"),
        ),
        BookingError::NoRoomsAvailable => (
            StatusCode::CONFLICT,
            "No rooms available for these dates".to_owned(),
        ),
        BookingError::AlreadyCancelled => (
            StatusCode::CONFLICT,
            "Booking is already cancelled".to_owned(),
        ),
        BookingError::InvalidTransition { from, to } => (
            StatusCode::CONFLICT,
            format!("Booking cannot move from {from} to {to}"),
        ),
        BookingError::Payment(err) => payment(err),
        BookingError::Repository(err) => repository(err),
    }
}

fn payment(err: &PaymentError) -> (StatusCode, String) {
    match err {
        PaymentError::NotConfigured => (
            StatusCode::BAD_REQUEST,
            "Online payments are not available".to_owned(),
        ),
        PaymentError::InvalidAmount(_) => {
            (StatusCode::BAD_REQUEST, "Invalid payment amount".to_owned())
        }
        PaymentError::SignatureMismatch => (
            StatusCode::BAD_REQUEST,
            "Payment verification failed".to_owned(),
        ),
        PaymentError::Http(_) | PaymentError::Api { .. } | PaymentError::Parse(_) => (
            StatusCode::BAD_GATEWAY,
            "Payment gateway error, please try again".to_owned(),
        ),
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Added item", Some(&[("product_id", "12")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use kharnak_core::{CartError, OrderStatus, ProductId};

    use super::*;

    fn status_and_message(err: impl Into<AppError>) -> (StatusCode, String) {
        err.into().status_and_message()
    }

    #[test]
    fn test_cart_messages() {
        assert_eq!(
            status_and_message(CartServiceError::Cart(CartError::MissingSize)),
            (StatusCode::BAD_REQUEST, "Select Product Size".to_owned())
        );
        let exceeded = CartServiceError::Cart(CartError::StockExceeded {
            product: ProductId::new(1),
            size: "M".into(),
            available: 3,
        });
        assert_eq!(
            status_and_message(exceeded).1,
            "Maximum available quantity reached"
        );
        assert_eq!(
            status_and_message(CartServiceError::ProductNotFound(ProductId::new(9))).0,
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_stock_and_seat_messages() {
        let (status, message) = status_and_message(CheckoutError::InsufficientStock {
            product: "Apricot Jam".into(),
            available: 2,
        });
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(message, "Only 2 left in stock for Apricot Jam");

        let (status, message) =
            status_and_message(BookingError::NotEnoughSeats { available: 1 });
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(message, "Not enough seats available");
    }

    #[test]
    fn test_order_verify_messages() {
        assert_eq!(
            status_and_message(CheckoutError::NotPaidOnline),
            (
                StatusCode::BAD_REQUEST,
                "This order is not paid online".to_owned()
            )
        );
        let (status, message) =
            status_and_message(CheckoutError::OrderClosed(OrderStatus::Delivered));
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(message, "Order is already Delivered");
    }

    #[test]
    fn test_internal_details_hidden() {
        let err = RepositoryError::DataCorruption("bad status column".into());
        assert_eq!(
            status_and_message(err),
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                INTERNAL_MESSAGE.to_owned()
            )
        );

        let err = PaymentError::Api {
            status: 401,
            message: "key_secret rejected".into(),
        };
        let (status, message) = status_and_message(CheckoutError::Payment(err));
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(!message.contains("key_secret"));
    }

    #[test]
    fn test_app_error_status_codes() {
        fn get_status(err: AppError) -> StatusCode {
            err.into_response().status()
        }

        assert_eq!(
            get_status(AppError::NotFound("Story".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Token(TokenError::Expired)),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::Forbidden("admins only".to_string())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            get_status(AppError::RateLimited),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            get_status(AppError::Payment(PaymentError::NotConfigured)),
            StatusCode::BAD_REQUEST
        );
    }
}
