//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `STOREFRONT_BASE_URL` - Public URL of the API
//! - `STOREFRONT_SESSION_SECRET` - Session signing secret (min 32 chars, high entropy)
//! - `STOREFRONT_TOKEN_SECRET` - Key for signing `token` header values (min 32 chars, high entropy)
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 4000)
//! - `STOREFRONT_ALLOWED_ORIGINS` - Comma-separated CORS origins for the shop and admin frontends
//! - `STOREFRONT_TOKEN_TTL_HOURS` - Token lifetime (default: 168)
//! - `STOREFRONT_DELIVERY_FEE` - Flat delivery fee added to orders (default: 50)
//! - `STOREFRONT_CURRENCY` - ISO 4217 currency (default: INR)
//! - `RAZORPAY_KEY_ID` / `RAZORPAY_KEY_SECRET` - Enable online payments (both or neither)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment tag
//! - `SENTRY_TRACES_SAMPLE_RATE` - Fraction of requests traced (default: 0.0)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use kharnak_core::CurrencyCode;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

const MIN_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL of the API
    pub base_url: String,
    /// Origins allowed to call the API from a browser
    pub allowed_origins: Vec<String>,
    /// Session signing secret
    pub session_secret: SecretString,
    /// Auth token settings
    pub auth: AuthTokenConfig,
    /// Pricing settings
    pub commerce: CommerceConfig,
    /// Razorpay credentials, if online payments are enabled
    pub razorpay: Option<RazorpayConfig>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment tag
    pub sentry_environment: Option<String>,
    /// Fraction of transactions sent to Sentry
    pub sentry_traces_sample_rate: f32,
}

/// Settings for the `token` header.
#[derive(Clone)]
pub struct AuthTokenConfig {
    /// HMAC key for signing tokens
    pub secret: SecretString,
    /// How long an issued token stays valid
    pub ttl: Duration,
}

impl std::fmt::Debug for AuthTokenConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthTokenConfig")
            .field("secret", &"[REDACTED]")
            .field("ttl", &self.ttl)
            .finish()
    }
}

/// Pricing settings applied at checkout.
#[derive(Debug, Clone, Copy)]
pub struct CommerceConfig {
    /// Currency for every price in the catalog
    pub currency: CurrencyCode,
    /// Flat fee added to each product order
    pub delivery_fee: Decimal,
}

impl Default for CommerceConfig {
    fn default() -> Self {
        Self {
            currency: CurrencyCode::INR,
            delivery_fee: Decimal::new(50, 0),
        }
    }
}

/// Razorpay API credentials.
///
/// Implements `Debug` manually to redact the key secret.
#[derive(Clone)]
pub struct RazorpayConfig {
    /// Public key id (also handed to the checkout widget)
    pub key_id: String,
    /// API key secret (server-side only, also the signature key)
    pub key_secret: SecretString,
}

impl std::fmt::Debug for RazorpayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RazorpayConfig")
            .field("key_id", &self.key_id)
            .field("key_secret", &"[REDACTED]")
            .finish()
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("STOREFRONT_DATABASE_URL")?;
        let host = parse_env("STOREFRONT_HOST", "127.0.0.1")?;
        let port = parse_env("STOREFRONT_PORT", "4000")?;

        let base_url = get_required_env("STOREFRONT_BASE_URL")?;
        Url::parse(&base_url).map_err(|e| {
            ConfigError::InvalidEnvVar("STOREFRONT_BASE_URL".to_string(), e.to_string())
        })?;

        let allowed_origins =
            parse_origins(&get_optional_env("STOREFRONT_ALLOWED_ORIGINS").unwrap_or_default())?;

        let session_secret = get_validated_secret("STOREFRONT_SESSION_SECRET")?;
        validate_secret_length(&session_secret, "STOREFRONT_SESSION_SECRET")?;

        let auth = AuthTokenConfig::from_env()?;
        let commerce = CommerceConfig::from_env()?;
        let razorpay = RazorpayConfig::from_env()?;

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            allowed_origins,
            session_secret,
            auth,
            commerce,
            razorpay,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sentry_traces_sample_rate: parse_env("SENTRY_TRACES_SAMPLE_RATE", "0.0")?,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether cookies should carry the `Secure` flag.
    #[must_use]
    pub fn is_https(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

impl AuthTokenConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let secret = get_validated_secret("STOREFRONT_TOKEN_SECRET")?;
        validate_secret_length(&secret, "STOREFRONT_TOKEN_SECRET")?;
        let hours: u64 = parse_env("STOREFRONT_TOKEN_TTL_HOURS", "168")?;
        if hours == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "STOREFRONT_TOKEN_TTL_HOURS".to_string(),
                "must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            secret,
            ttl: Duration::from_secs(hours * 60 * 60),
        })
    }
}

impl CommerceConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let currency = get_env_or_default("STOREFRONT_CURRENCY", "INR")
            .parse::<CurrencyCode>()
            .map_err(|e| ConfigError::InvalidEnvVar("STOREFRONT_CURRENCY".to_string(), e))?;
        let delivery_fee: Decimal = parse_env("STOREFRONT_DELIVERY_FEE", "50")?;
        if delivery_fee.is_sign_negative() {
            return Err(ConfigError::InvalidEnvVar(
                "STOREFRONT_DELIVERY_FEE".to_string(),
                "must not be negative".to_string(),
            ));
        }
        Ok(Self {
            currency,
            delivery_fee,
        })
    }
}

impl RazorpayConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        match (
            get_optional_env("RAZORPAY_KEY_ID"),
            get_optional_env("RAZORPAY_KEY_SECRET"),
        ) {
            (None, None) => Ok(None),
            (Some(key_id), Some(_)) => Ok(Some(Self {
                key_id,
                key_secret: get_validated_secret("RAZORPAY_KEY_SECRET")?,
            })),
            (None, Some(_)) => Err(ConfigError::MissingEnvVar("RAZORPAY_KEY_ID".to_string())),
            (Some(_), None) => Err(ConfigError::MissingEnvVar(
                "RAZORPAY_KEY_SECRET".to_string(),
            )),
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable. Empty values count as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Parse an environment variable, falling back to `default` when unset.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Parse a comma-separated list of origins, dropping trailing slashes.
fn parse_origins(raw: &str) -> Result<Vec<String>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|origin| {
            Url::parse(origin).map_err(|e| {
                ConfigError::InvalidEnvVar(
                    "STOREFRONT_ALLOWED_ORIGINS".to_string(),
                    format!("{origin}: {e}"),
                )
            })?;
            Ok(origin.trim_end_matches('/').to_string())
        })
        .collect()
}

/// Validate that a signing secret meets minimum length requirements.
fn validate_secret_length(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn test_config() -> StorefrontConfig {
        StorefrontConfig {
            database_url: SecretString::from("postgres://localhost/kharnak_test"),
            host: "127.0.0.1".parse().unwrap(),
            port: 4000,
            base_url: "http://localhost:4000".to_string(),
            allowed_origins: vec!["http://localhost:5173".to_string()],
            session_secret: SecretString::from("x".repeat(32)),
            auth: AuthTokenConfig {
                secret: SecretString::from("super_secret_token_key"),
                ttl: Duration::from_secs(3600),
            },
            commerce: CommerceConfig::default(),
            razorpay: Some(RazorpayConfig {
                key_id: "rzp_test_key".to_string(),
                key_secret: SecretString::from("super_secret_rzp_value"),
            }),
            sentry_dsn: None,
            sentry_environment: None,
            sentry_traces_sample_rate: 0.0,
        }
    }

    #[test]
    fn test_shannon_entropy() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
        assert!((shannon_entropy("aaaaaaa") - 0.0).abs() < f64::EPSILON);
        assert!((shannon_entropy("ab") - 1.0).abs() < 0.01);
        assert!(shannon_entropy("aB3$xY9!mK2@nL5#") > 3.3);
    }

    #[test]
    fn test_validate_secret_strength_rejects_placeholders() {
        let err = validate_secret_strength("your-api-key-here", "TEST_VAR").unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(_, _)));
        assert!(validate_secret_strength("changeme123", "TEST_VAR").is_err());
    }

    #[test]
    fn test_validate_secret_strength_rejects_low_entropy() {
        let result = validate_secret_strength(&"a".repeat(40), "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_accepts_random() {
        assert!(validate_secret_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "TEST_VAR").is_ok());
    }

    #[test]
    fn test_validate_secret_length() {
        assert!(validate_secret_length(&SecretString::from("short"), "TEST").is_err());
        assert!(validate_secret_length(&SecretString::from("a".repeat(32)), "TEST").is_ok());
    }

    #[test]
    fn test_parse_origins() {
        let origins =
            parse_origins(" https://kharnak.in/ ,https://admin.kharnak.in,, ").unwrap();
        assert_eq!(origins, vec!["https://kharnak.in", "https://admin.kharnak.in"]);
        assert!(parse_origins("not a url").is_err());
        assert!(parse_origins("").unwrap().is_empty());
    }

    #[test]
    fn test_socket_addr_and_https() {
        let mut config = test_config();
        let addr = config.socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 4000);
        assert!(!config.is_https());

        config.base_url = "https://api.kharnak.in".to_string();
        assert!(config.is_https());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let debug_output = format!("{:?}", test_config());

        assert!(debug_output.contains("rzp_test_key"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_secret_token_key"));
        assert!(!debug_output.contains("super_secret_rzp_value"));
    }

    #[test]
    fn test_commerce_defaults() {
        let commerce = CommerceConfig::default();
        assert_eq!(commerce.currency, CurrencyCode::INR);
        assert_eq!(commerce.delivery_fee, Decimal::new(50, 0));
    }
}
