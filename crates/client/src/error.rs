//! Unified error handling with Sentry integration.
//!
//! Checkout and reconciliation report their outcomes as values, not errors.
//! `ClientError` covers the remaining fallible setup and command paths
//! (configuration, storage, service calls) so callers can use `?` throughout.

use thiserror::Error;

use campus_market_core::UserId;

use crate::api::ApiError;
use crate::config::ConfigError;
use crate::favorites::FavoritesError;
use crate::storage::StorageError;

/// Client-level error type.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Local storage could not be opened.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Marketplace service call failed.
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Favorites operation refused.
    #[error("Favorites error: {0}")]
    Favorites(#[from] FavoritesError),

    /// Invalid input from the user.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl ClientError {
    /// Capture unexpected failures to Sentry.
    ///
    /// User mistakes and service rejections are expected and only logged.
    pub fn report(&self) {
        if matches!(
            self,
            Self::Storage(_) | Self::Api(ApiError::Malformed(_) | ApiError::Unreachable(_))
        ) {
            let event_id = sentry::capture_error(self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Client error"
            );
        } else {
            tracing::warn!(error = %self, "Client error");
        }
    }

    /// Message suitable for showing to the user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Config(_) | Self::Storage(_) => "The app is not set up correctly.".to_string(),
            Self::Api(ApiError::Unreachable(_)) => {
                "Could not reach the marketplace. Check your connection and try again.".to_string()
            }
            Self::Api(err) => err
                .server_message()
                .map_or_else(|| "The marketplace could not complete the request.".to_string(), String::from),
            Self::Favorites(err) => err.user_message().to_string(),
            Self::BadRequest(msg) => msg.clone(),
        }
    }
}

/// Result type alias for `ClientError`.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Set the Sentry user context from a user ID.
///
/// Call this once a signed-in session is known to associate errors with users.
pub fn set_sentry_user(user_id: &UserId) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on sign-out to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("checkout", "Checkout started", Some(&[("method", "COD")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}
