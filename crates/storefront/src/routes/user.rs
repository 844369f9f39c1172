//! Account route handlers.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::{instrument, warn};

use crate::error::{Result, add_breadcrumb, clear_sentry_user, set_sentry_user};
use crate::middleware::RequireUser;
use crate::models::{CurrentUser, User};
use crate::routes::{ApiResponse, Message, ok};
use crate::services::auth::AuthService;
use crate::services::cart::CartView;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Token plus the account cart after the guest cart was folded in.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedIn {
    pub token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cart: Option<CartView>,
    /// Cart lines cut down to the available stock during the merge.
    pub clamped_lines: usize,
}

#[derive(Debug, Serialize)]
pub struct Profile {
    pub user: User,
}

/// Create an account.
///
/// POST /api/user/register
///
/// # Errors
///
/// Returns `AppError::Auth` for a blank name, bad email, weak password, or
/// an email that is already registered.
#[instrument(skip(state, session, req), fields(email = %req.email))]
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<ApiResponse<SignedIn>>> {
    let user = AuthService::new(state.pool())
        .register_with_password(&req.name, &req.email, &req.password)
        .await?;

    Ok(ok(sign_in(&state, &session, &user).await))
}

/// Sign in with email and password.
///
/// POST /api/user/login
///
/// # Errors
///
/// Returns `AppError::Auth(InvalidCredentials)` for an unknown email or
/// wrong password.
#[instrument(skip(state, session, req), fields(email = %req.email))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(req): Json<LoginRequest>,
) -> Result<Json<ApiResponse<SignedIn>>> {
    let user = AuthService::new(state.pool())
        .login_with_password(&req.email, &req.password)
        .await?;

    Ok(ok(sign_in(&state, &session, &user).await))
}

/// Issue a token and move the guest cart into the account.
///
/// A failed merge leaves the guest cart in the session for the next login
/// rather than failing the sign-in.
async fn sign_in(state: &AppState, session: &Session, user: &User) -> SignedIn {
    let current = CurrentUser {
        id: user.id,
        role: user.role,
    };
    let token = state.tokens().issue(current);
    set_sentry_user(&user.id, Some(user.email.as_str()));
    add_breadcrumb("auth", "Signed in", None);

    match state.carts().merge_guest_into_user(session, user.id).await {
        Ok(outcome) => SignedIn {
            token,
            cart: Some(outcome.cart),
            clamped_lines: outcome.clamped_lines,
        },
        Err(e) => {
            warn!(user_id = %user.id, error = %e, "guest cart merge failed");
            SignedIn {
                token,
                cart: None,
                clamped_lines: 0,
            }
        }
    }
}

/// Forget the guest cart held by this session.
///
/// POST /api/user/logout
///
/// Tokens are stateless; the client discards its own copy.
///
/// # Errors
///
/// Returns `AppError::Cart` if the session store fails.
pub async fn logout(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<ApiResponse<Message>>> {
    state.carts().forget_guest(&session).await?;
    clear_sentry_user();
    Ok(ok(Message {
        message: "Logged out",
    }))
}

/// Current account.
///
/// GET /api/user/profile
///
/// # Errors
///
/// Returns `AppError::Auth(UserNotFound)` if the account was deleted after
/// the token was issued.
pub async fn profile(
    State(state): State<AppState>,
    RequireUser(current): RequireUser,
) -> Result<Json<ApiResponse<Profile>>> {
    let user = AuthService::new(state.pool()).get_user(current.id).await?;
    Ok(ok(Profile { user }))
}
