//! Signed-in user identity.
//!
//! Sessions are issued by the marketplace's auth service; the client only
//! carries the user's ID and bearer token.

use secrecy::{ExposeSecret, SecretString};

use campus_market_core::UserId;

/// The signed-in user and the credential sent with authenticated requests.
///
/// Implements `Debug` manually to redact the token.
#[derive(Clone)]
pub struct UserSession {
    /// User's ID on the marketplace.
    pub user_id: UserId,
    token: SecretString,
}

impl UserSession {
    /// Create a session from a user ID and bearer token.
    #[must_use]
    pub fn new(user_id: UserId, token: SecretString) -> Self {
        Self { user_id, token }
    }

    /// `Authorization` header value for this session.
    #[must_use]
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.token.expose_secret())
    }
}

impl std::fmt::Debug for UserSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserSession")
            .field("user_id", &self.user_id)
            .field("token", &"[REDACTED]")
            .finish()
    }
}
