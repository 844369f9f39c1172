//! Database migrations.
//!
//! Migration files live in `crates/storefront/migrations/` and are embedded
//! at compile time. The server never runs them on its own.

use super::{CommandError, connect};

/// Apply pending migrations.
///
/// # Errors
///
/// Returns `CommandError` if the database is unreachable or a migration
/// fails.
pub async fn run() -> Result<(), CommandError> {
    let pool = connect().await?;

    tracing::info!("Running migrations...");
    sqlx::migrate!("../storefront/migrations").run(&pool).await?;

    tracing::info!("Migrations complete!");
    Ok(())
}
