//! User domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use kharnak_core::{Email, UserId, UserRole};

/// A storefront account.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Unique user ID.
    pub id: UserId,
    /// Display name.
    pub name: String,
    /// Login email (normalized).
    pub email: Email,
    /// Customer or admin.
    pub role: UserRole,
    /// When the user was created.
    pub created_at: DateTime<Utc>,
    /// When the user was last updated.
    pub updated_at: DateTime<Utc>,
}
