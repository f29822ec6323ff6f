//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `MARKET_API_URL` - Base URL of the marketplace REST service
//!
//! ## Optional
//! - `MARKET_STORAGE_DIR` - Directory for persisted state (default: .market)
//! - `MARKET_USER_ID` - Signed-in user's ID (requires `MARKET_AUTH_TOKEN`)
//! - `MARKET_AUTH_TOKEN` - Bearer token for the signed-in user (requires `MARKET_USER_ID`)
//! - `MARKET_RETURN_URL` - Page the payment provider sends the buyer back to
//! - `MARKET_SESSION_PARAM` - Query parameter carrying the provider session (default: `session_id`)
//! - `MARKET_SECTION` - Marketplace section for checkout (default: food)
//! - `MARKET_SHARED_CART` - Keep one cart for all users of this storage (default: false)
//! - `MARKET_HTTP_TIMEOUT_SECS` - Request timeout (default: 15)
//! - `MARKET_CATALOG_TTL_SECS` - Catalog item cache TTL (default: 300)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

use campus_market_core::{Section, UserId};

use crate::cart::CartScope;
use crate::session::UserSession;

/// Whole values that are placeholders, not tokens (case-insensitive)
const PLACEHOLDER_VALUES: &[&str] = &[
    "changeme",
    "placeholder",
    "example",
    "token",
    "secret",
    "todo",
    "fixme",
];

/// Prefixes of sample values such as `your-token-here` (case-insensitive)
const PLACEHOLDER_PREFIXES: &[&str] = &[
    "your-",
    "your_",
    "put-your",
    "add-your",
    "insert-",
    "replace-",
    "<",
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

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// REST service settings
    pub api: ApiConfig,
    /// Directory holding persisted client state
    pub storage_dir: PathBuf,
    /// Signed-in user, if any
    pub session: Option<UserSession>,
    /// Query parameter carrying the provider session reference
    pub session_param: String,
    /// Marketplace section checkouts belong to
    pub section: Section,
    /// How the cart is keyed in storage
    pub cart_scope: CartScope,
    /// How long single catalog lookups stay cached
    pub catalog_ttl: Duration,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// Marketplace REST service settings.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Base URL; always ends with `/` so endpoints join beneath it
    pub base_url: Url,
    /// Per-request timeout
    pub timeout: Duration,
    /// Page the payment provider returns the buyer to; sent with every
    /// payment session request
    pub return_url: Option<Url>,
}

impl ClientConfig {
    /// Default query parameter name for the provider session reference.
    pub const DEFAULT_SESSION_PARAM: &'static str = "session_id";

    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid, or
    /// if the auth token looks like a placeholder.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Same as [`Self::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let vars = Vars(&lookup);

        let return_url = vars
            .optional("MARKET_RETURN_URL")
            .map(|raw| {
                Url::parse(&raw).map_err(|e| {
                    ConfigError::InvalidEnvVar("MARKET_RETURN_URL".to_string(), e.to_string())
                })
            })
            .transpose()?;

        let api = ApiConfig {
            base_url: normalize_base_url(&vars.required("MARKET_API_URL")?)
                .map_err(|e| ConfigError::InvalidEnvVar("MARKET_API_URL".to_string(), e))?,
            timeout: Duration::from_secs(vars.parsed("MARKET_HTTP_TIMEOUT_SECS", 15)?),
            return_url,
        };

        let session = match (
            vars.optional("MARKET_USER_ID"),
            vars.optional("MARKET_AUTH_TOKEN"),
        ) {
            (Some(user_id), Some(token)) => {
                validate_secret_strength(&token, "MARKET_AUTH_TOKEN")?;
                Some(UserSession::new(
                    UserId::new(user_id),
                    SecretString::from(token),
                ))
            }
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::MissingEnvVar("MARKET_AUTH_TOKEN".to_string())),
            (None, Some(_)) => return Err(ConfigError::MissingEnvVar("MARKET_USER_ID".to_string())),
        };

        let section = vars
            .env_or_default("MARKET_SECTION", Section::default().as_str())
            .parse::<Section>()
            .map_err(|e| ConfigError::InvalidEnvVar("MARKET_SECTION".to_string(), e))?;

        let cart_scope = if vars.parsed("MARKET_SHARED_CART", false)? {
            CartScope::Shared
        } else {
            CartScope::PerUser
        };

        Ok(Self {
            api,
            storage_dir: PathBuf::from(vars.env_or_default("MARKET_STORAGE_DIR", ".market")),
            session,
            session_param: vars.env_or_default("MARKET_SESSION_PARAM", Self::DEFAULT_SESSION_PARAM),
            section,
            cart_scope,
            catalog_ttl: Duration::from_secs(vars.parsed("MARKET_CATALOG_TTL_SECS", 300)?),
            sentry_dsn: vars.optional("SENTRY_DSN"),
            sentry_environment: vars.optional("SENTRY_ENVIRONMENT"),
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Variable source with the usual required/optional/default accessors.
struct Vars<'a>(&'a dyn Fn(&str) -> Option<String>);

impl Vars<'_> {
    /// Get a required variable.
    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.optional(key)
            .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
    }

    /// Get an optional variable; empty values count as unset.
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    /// Get a variable with a default value.
    fn env_or_default(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    /// Parse a variable, falling back to `default` when unset.
    fn parsed<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        self.optional(key).map_or(Ok(default), |raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
        })
    }
}

/// Parse a base URL and make sure its path ends with `/`.
fn normalize_base_url(raw: &str) -> Result<Url, String> {
    let mut url = Url::parse(raw).map_err(|e| e.to_string())?;
    if url.cannot_be_a_base() {
        return Err("must be an absolute http(s) URL".to_string());
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// Reject tokens that are obviously placeholders copied from sample files.
///
/// Tokens are issued by the auth service and may contain any substring, so
/// only the whole value is matched.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.trim().to_lowercase();

    if PLACEHOLDER_VALUES.contains(&lower.as_str()) || lower.chars().all(|c| c == 'x') {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            "appears to be a placeholder".to_string(),
        ));
    }

    if let Some(prefix) = PLACEHOLDER_PREFIXES.iter().find(|p| lower.starts_with(**p)) {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!("appears to be a placeholder (starts with '{prefix}')"),
        ));
    }

    Ok(())
}

impl ApiConfig {
    /// Host of the base URL, for log lines.
    #[must_use]
    pub fn host(&self) -> &str {
        self.base_url.host_str().unwrap_or("")
    }
}
