//! Admin account management.
//!
//! Accounts register through the API like any customer; this command is
//! the only way to grant the admin role.

use kharnak_core::{Email, UserRole};
use kharnak_storefront::db::{RepositoryError, UserRepository};

use super::{CommandError, connect};

/// Give an existing account the admin role.
///
/// Admin routes read the role from the database, so the change applies to
/// tokens the user already holds.
///
/// # Errors
///
/// Returns `CommandError::UserNotFound` if no account uses `email`.
pub async fn promote(email: &str) -> Result<(), CommandError> {
    let email = Email::parse(email)?;
    let pool = connect().await?;

    let user = UserRepository::new(&pool)
        .set_role(&email, UserRole::Admin)
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound => CommandError::UserNotFound(email.to_string()),
            other => other.into(),
        })?;

    tracing::info!(user_id = %user.id, email = %user.email, "Account promoted to admin");
    Ok(())
}
