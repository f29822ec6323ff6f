//! Per-attempt idempotency keys.

use core::fmt;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::id::UserId;

/// Number of random base-36 characters appended to every key.
const TOKEN_LENGTH: usize = 9;

/// Token identifying one checkout attempt.
///
/// Format: `{userId}-{unixMillis}-{token}`. A key is minted fresh for every
/// attempt, never derived from cart contents, so two attempts with identical
/// carts still carry different keys. The backend uses it to collapse network
/// retries of the same attempt into one order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    /// Generate a new key for `user` using the thread-local RNG.
    #[must_use]
    pub fn generate(user: &UserId, now: DateTime<Utc>) -> Self {
        Self::generate_with(user, now, &mut rand::rng())
    }

    /// Generate a new key drawing the random token from `rng`.
    #[must_use]
    pub fn generate_with<R: Rng>(user: &UserId, now: DateTime<Utc>, rng: &mut R) -> Self {
        let token: String = (0..TOKEN_LENGTH)
            .filter_map(|_| char::from_digit(rng.random_range(0..36), 36))
            .collect();
        Self(format!("{user}-{}-{token}", now.timestamp_millis()))
    }

    /// Wrap an existing key (e.g. one read back from storage).
    #[must_use]
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is the empty placeholder key.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
