//! Durable local key-value storage.
//!
//! The client keeps its cart, favorites, saved delivery addresses and the
//! pending order payload in a small per-origin key-value store, the analogue
//! of a browser's `localStorage`. Everything here is synchronous and never
//! touches the network.
//!
//! # Layers
//!
//! - [`KeyValueBackend`] - raw string storage (`FileBackend`, `MemoryBackend`)
//! - [`PersistedStore`] - typed JSON adapter that fails soft: callers never
//!   see a storage error, they see "nothing stored" and a log line instead

mod file;
pub mod keys;
mod memory;

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, warn};

pub use file::FileBackend;
pub use memory::MemoryBackend;

/// Errors raised by storage backends.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The write would exceed the backend's capacity.
    #[error("quota exceeded writing {key} ({needed} bytes, {available} available)")]
    QuotaExceeded {
        key: String,
        needed: usize,
        available: usize,
    },

    /// Value could not be encoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Raw string storage keyed by name.
///
/// Implementations must leave the previous value in place when a write fails.
pub trait KeyValueBackend: Send + Sync {
    /// Fetch the raw value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn get_raw(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be stored.
    fn set_raw(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete `key`. Deleting a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be modified.
    fn remove_raw(&self, key: &str) -> Result<(), StorageError>;
}

/// Typed, fail-soft JSON adapter over a [`KeyValueBackend`].
///
/// Cheaply cloneable; every clone shares the same backend. Access is
/// last-writer-wins with no locking across keys.
#[derive(Clone)]
pub struct PersistedStore {
    backend: Arc<dyn KeyValueBackend>,
}

impl fmt::Debug for PersistedStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistedStore").finish_non_exhaustive()
    }
}

impl PersistedStore {
    /// Wrap a backend.
    #[must_use]
    pub fn new(backend: impl KeyValueBackend + 'static) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }

    /// Store backed by a fresh in-memory map.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(MemoryBackend::new())
    }

    /// Read and decode the value under `key`.
    ///
    /// Returns `None` when nothing is stored, when the backend fails, or when
    /// the stored text is not valid JSON for `T`.
    #[must_use]
    pub fn read<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.backend.get_raw(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(key, error = %e, "Failed to read persisted value");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, error = %e, "Discarding unparseable persisted value");
                None
            }
        }
    }

    /// Encode and store `value` under `key`.
    ///
    /// On failure the previous value is left untouched and the error is
    /// logged. Returns whether the value was stored.
    pub fn write<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> bool {
        match self.try_write(key, value) {
            Ok(()) => {
                debug!(key, "Persisted value");
                true
            }
            Err(e) => {
                warn!(key, error = %e, "Failed to persist value");
                false
            }
        }
    }

    /// Delete the value under `key`, logging any failure.
    pub fn remove(&self, key: &str) {
        if let Err(e) = self.backend.remove_raw(key) {
            warn!(key, error = %e, "Failed to remove persisted value");
        }
    }

    fn try_write<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        let raw = serde_json::to_string(value)?;
        self.backend.set_raw(key, &raw)
    }
}
