//! Signed bearer tokens carried in the `token` request header.
//!
//! Format: `base64url(json claims) "." base64url(HMAC-SHA256(payload))`,
//! unpadded. Claims hold the user id, role, and an expiry in Unix seconds.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use kharnak_core::{UserId, UserRole};

use super::signing::{constant_time_compare, hmac_sha256};
use crate::config::AuthTokenConfig;
use crate::models::CurrentUser;

/// Reasons a token is refused.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,
    #[error("token signature mismatch")]
    BadSignature,
    #[error("token expired")]
    Expired,
}

/// Token payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: UserId,
    pub role: UserRole,
    /// Expiry, Unix seconds.
    pub exp: i64,
}

impl Claims {
    #[must_use]
    pub const fn current_user(&self) -> CurrentUser {
        CurrentUser {
            id: self.sub,
            role: self.role,
        }
    }
}

/// Issues and verifies tokens with one secret.
#[derive(Clone)]
pub struct TokenSigner {
    secret: SecretString,
    ttl: Duration,
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner")
            .field("secret", &"[REDACTED]")
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl TokenSigner {
    #[must_use]
    pub fn new(config: &AuthTokenConfig) -> Self {
        Self {
            secret: config.secret.clone(),
            ttl: config.ttl,
        }
    }

    /// Issue a token for `user`, valid for the configured lifetime.
    #[must_use]
    pub fn issue(&self, user: CurrentUser) -> String {
        let ttl = i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX);
        let claims = Claims {
            sub: user.id,
            role: user.role,
            exp: Utc::now().timestamp().saturating_add(ttl),
        };
        self.encode(&claims)
    }

    fn encode(&self, claims: &Claims) -> String {
        // Serializing a struct of integers and a unit enum cannot fail.
        let json = serde_json::to_vec(claims).unwrap_or_default();
        let payload = URL_SAFE_NO_PAD.encode(json);
        let signature = URL_SAFE_NO_PAD.encode(self.sign(&payload));
        format!("{payload}.{signature}")
    }

    fn sign(&self, payload: &str) -> [u8; 32] {
        hmac_sha256(self.secret.expose_secret().as_bytes(), payload.as_bytes())
    }

    /// Verify a token and return its claims.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Malformed` for anything that isn't a token,
    /// `TokenError::BadSignature` if it was not signed with this secret, and
    /// `TokenError::Expired` once `exp` has passed.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let (payload, signature) = token.trim().split_once('.').ok_or(TokenError::Malformed)?;

        let expected = URL_SAFE_NO_PAD.encode(self.sign(payload));
        if !constant_time_compare(&expected, signature) {
            return Err(TokenError::BadSignature);
        }

        let json = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| TokenError::Malformed)?;
        let claims: Claims = serde_json::from_slice(&json).map_err(|_| TokenError::Malformed)?;

        if claims.exp <= Utc::now().timestamp() {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }
}
