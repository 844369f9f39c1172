//! Domain models for the storefront.
//!
//! These are validated domain types, separate from the database row types
//! in [`crate::db`]. Request payloads that create or edit a model live next
//! to it (`*Input` types) together with their validation.

pub mod booking;
pub mod content;
pub mod order;
pub mod product;
pub mod session;
pub mod user;

pub use booking::{
    Booking, BookingContact, BookingRequest, Stay, StayDates, StayInput, Tour, TourInput,
};
pub use content::{ContactForm, ContactMessage, NewContactMessage, Story, StoryInput, slugify};
pub use order::{Address, Order, OrderItem};
pub use product::{Product, ProductInput};
pub use session::{CurrentUser, keys as session_keys};
pub use user::User;

/// Validation failure for a request payload.
///
/// The message is shown to the client as-is.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ValidationError(pub String);

impl ValidationError {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Trim a required text field, rejecting blank values.
pub(crate) fn require_text(value: &str, field: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::new(format!("{field} is required")));
    }
    Ok(trimmed.to_owned())
}

/// Trim an optional text field, turning blank values into `None`.
pub(crate) fn optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}
