//! Identity carried by the `token` header, and keys for guest session data.

use serde::{Deserialize, Serialize};

use kharnak_core::{UserId, UserRole};

/// The authenticated caller, decoded from a verified token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    /// User's database ID.
    pub id: UserId,
    /// Role at the time the token was issued.
    pub role: UserRole,
}

impl CurrentUser {
    /// Whether the caller may use the back-office API.
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        matches!(self.role, UserRole::Admin)
    }
}

/// Session keys for guest visitors.
pub mod keys {
    /// Key for the guest cart (same nested shape as the account cart).
    pub const CART_ITEMS: &str = "cart_items";
}
