//! Database operations for the Kharnak `PostgreSQL` database.
//!
//! # Schema: `kharnak`
//!
//! ## Tables
//!
//! - `user`, `user_password` - Accounts and their argon2 hashes
//! - `product` - Shop catalog, `quantity` is the stock counter
//! - `cart` - Account carts (JSONB) with a version stamp
//! - `shop_order` - Placed orders with priced line items
//! - `tour`, `stay`, `booking` - Tourism inventory and reservations
//! - `contact_message`, `story` - Contact form inbox and publications
//!
//! Guest sessions live in `tower_sessions.session`.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p kharnak-cli -- migrate
//! ```
//!
//! All queries are runtime-checked (`sqlx::query_as` with `FromRow` row
//! types), so building the crate does not need a live database.

pub mod bookings;
pub mod carts;
pub mod content;
pub mod dashboard;
pub mod orders;
pub mod products;
pub mod users;

use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use bookings::{BookingRepository, StayRepository, TourRepository};
pub use carts::CartRepository;
pub use content::{ContactRepository, StoryRepository};
pub use dashboard::{DashboardRepository, DashboardStats};
pub use orders::{NewOrder, OrderRepository};
pub use products::ProductRepository;
pub use users::UserRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

impl RepositoryError {
    /// Map a unique violation to [`RepositoryError::Conflict`], anything else
    /// to [`RepositoryError::Database`].
    pub(crate) fn from_unique(e: sqlx::Error, what: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = e
            && db_err.is_unique_violation()
        {
            return Self::Conflict(format!("{what} already exists"));
        }
        Self::Database(e)
    }
}

/// Parse a TEXT column into a typed value, flagging bad values as corruption.
pub(crate) fn parse_column<T>(column: &str, value: &str) -> Result<T, RepositoryError>
where
    T: FromStr,
    T::Err: Display,
{
    value
        .parse()
        .map_err(|e| RepositoryError::DataCorruption(format!("invalid {column}: {e}")))
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use kharnak_core::OrderStatus;

    #[test]
    fn test_parse_column() {
        let status: OrderStatus = parse_column("status", "Out for delivery").unwrap_or_else(|e| {
            panic!("unexpected error: {e}");
        });
        assert_eq!(status, OrderStatus::OutForDelivery);

        let err = parse_column::<OrderStatus>("status", "Lost").unwrap_err();
        assert!(matches!(err, RepositoryError::DataCorruption(msg) if msg.starts_with("invalid status")));
    }
}
