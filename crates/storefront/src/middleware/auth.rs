//! Authentication extractors.
//!
//! Callers authenticate with a signed token in the `token` request header
//! (not `Authorization`). The extractors verify it against the
//! [`TokenSigner`](crate::services::token::TokenSigner) in application state.
//!
//! # Example
//!
//! ```rust,ignore
//! async fn profile(RequireUser(user): RequireUser) -> impl IntoResponse {
//!     format!("Hello, {}!", user.id)
//! }
//! ```

use axum::{extract::FromRequestParts, http::request::Parts};
use tracing::Span;

use kharnak_core::UserRole;

use crate::db::UserRepository;
use crate::error::{AppError, set_sentry_user};
use crate::models::{CurrentUser, User};
use crate::state::AppState;

/// Request header carrying the auth token.
pub const TOKEN_HEADER: &str = "token";

const LOGIN_AGAIN: &str = "Not Authorized Login Again";

const ADMIN_REQUIRED: &str = "Admin access required";

/// Extractor that requires a valid token.
pub struct RequireUser(pub CurrentUser);

/// Extractor for routes that work with or without an account.
///
/// A missing header yields `None`. A header that is present but invalid or
/// expired is still rejected, so the client learns to sign in again instead
/// of silently falling back to a guest cart.
pub struct OptionalUser(pub Option<CurrentUser>);

/// Extractor that requires a valid token for an account that is an admin
/// right now.
///
/// The role is read from the database on every request rather than trusted
/// from the token, so promotion and demotion take effect immediately.
pub struct RequireAdmin(pub CurrentUser);

/// Decode the `token` header, if any.
fn authenticate(parts: &Parts, state: &AppState) -> Result<Option<CurrentUser>, AppError> {
    let Some(raw) = parts.headers.get(TOKEN_HEADER) else {
        return Ok(None);
    };
    let raw = raw
        .to_str()
        .map_err(|_| AppError::Unauthorized(LOGIN_AGAIN.to_owned()))?;
    if raw.trim().is_empty() {
        return Ok(None);
    }

    let user = state.tokens().verify(raw)?.current_user();

    Span::current().record("user_id", user.id.as_i32());
    set_sentry_user(&user.id, None);
    Ok(Some(user))
}

impl FromRequestParts<AppState> for RequireUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        authenticate(parts, state)?
            .map(Self)
            .ok_or_else(|| AppError::Unauthorized(LOGIN_AGAIN.to_owned()))
    }
}

impl FromRequestParts<AppState> for OptionalUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(Self(authenticate(parts, state)?))
    }
}

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let claimed = authenticate(parts, state)?
            .ok_or_else(|| AppError::Unauthorized(LOGIN_AGAIN.to_owned()))?;
        let account = UserRepository::new(state.pool())
            .get_by_id(claimed.id)
            .await?;
        current_admin(claimed, account.as_ref()).map(Self)
    }
}

/// Decide admin access from the stored account, not the token claim.
fn current_admin(claimed: CurrentUser, account: Option<&User>) -> Result<CurrentUser, AppError> {
    let account = account.ok_or_else(|| AppError::Unauthorized(LOGIN_AGAIN.to_owned()))?;
    if account.role != UserRole::Admin {
        return Err(AppError::Forbidden(ADMIN_REQUIRED.to_owned()));
    }
    Ok(CurrentUser {
        id: claimed.id,
        role: account.role,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;

    use kharnak_core::{Email, UserId};

    use super::*;

    fn account(role: UserRole) -> User {
        User {
            id: UserId::new(3),
            name: "Dorje".into(),
            email: Email::parse("dorje@example.com").unwrap(),
            role,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn claim(role: UserRole) -> CurrentUser {
        CurrentUser {
            id: UserId::new(3),
            role,
        }
    }

    #[test]
    fn test_demoted_admin_is_refused_despite_token() {
        let result = current_admin(claim(UserRole::Admin), Some(&account(UserRole::Customer)));
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[test]
    fn test_deleted_account_must_log_in_again() {
        let result = current_admin(claim(UserRole::Admin), None);
        assert!(matches!(result, Err(AppError::Unauthorized(m)) if m == LOGIN_AGAIN));
    }

    #[test]
    fn test_promoted_account_is_admin_immediately() {
        let user = current_admin(claim(UserRole::Customer), Some(&account(UserRole::Admin)))
            .map_err(|e| e.to_string());
        assert_eq!(user.map(|u| u.role), Ok(UserRole::Admin));
    }
}
