//! Account cart storage with version stamps.
//!
//! Each row carries a `version` that is bumped on every write. Writers pass
//! the version they loaded and the update only applies if it still matches,
//! so two devices editing the same cart never overwrite each other blindly.

use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};

use kharnak_core::{Cart, UserId};

use super::RepositoryError;

/// Version reported for an account that has never saved a cart.
pub const UNSAVED_VERSION: i64 = 0;

#[derive(Debug, sqlx::FromRow)]
struct CartRow {
    cart_data: Json<Cart>,
    version: i64,
}

/// Repository for account carts.
pub struct CartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CartRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Load a user's cart and its version.
    ///
    /// A user without a stored cart gets an empty cart at [`UNSAVED_VERSION`].
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails or the stored
    /// document cannot be decoded.
    pub async fn load(&self, user: UserId) -> Result<(Cart, i64), RepositoryError> {
        let row = sqlx::query_as::<_, CartRow>(
            "SELECT cart_data, version FROM kharnak.cart WHERE user_id = $1",
        )
        .bind(user)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map_or_else(
            || (Cart::new(), UNSAVED_VERSION),
            |row| (row.cart_data.0, row.version),
        ))
    }

    /// Save a cart if its version is still `expected`.
    ///
    /// Returns the new version, or `None` when another writer got there first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn save(
        &self,
        user: UserId,
        cart: &Cart,
        expected: i64,
    ) -> Result<Option<i64>, RepositoryError> {
        let version = if expected == UNSAVED_VERSION {
            sqlx::query_scalar::<_, i64>(
                r"
                INSERT INTO kharnak.cart (user_id, cart_data, version)
                VALUES ($1, $2, 1)
                ON CONFLICT (user_id) DO NOTHING
                RETURNING version
                ",
            )
            .bind(user)
            .bind(Json(cart))
            .fetch_optional(self.pool)
            .await?
        } else {
            sqlx::query_scalar::<_, i64>(
                r"
                UPDATE kharnak.cart
                SET cart_data = $2, version = version + 1, updated_at = NOW()
                WHERE user_id = $1 AND version = $3
                RETURNING version
                ",
            )
            .bind(user)
            .bind(Json(cart))
            .bind(expected)
            .fetch_optional(self.pool)
            .await?
        };

        Ok(version)
    }
}

/// Empty a user's cart inside the caller's transaction, provided it is
/// still at `expected`. Returns `false` if the cart changed since it was read.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn clear_at_version(
    conn: &mut PgConnection,
    user: UserId,
    expected: i64,
) -> Result<bool, RepositoryError> {
    let result = sqlx::query(
        r"
        UPDATE kharnak.cart
        SET cart_data = '{}', version = version + 1, updated_at = NOW()
        WHERE user_id = $1 AND version = $2
        ",
    )
    .bind(user)
    .bind(expected)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected() == 1)
}
