//! In-memory storage backend.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use super::{KeyValueBackend, StorageError};

/// `HashMap`-backed storage with an optional byte quota.
///
/// Used by tests and by short-lived sessions that must not touch disk. The
/// quota counts stored value bytes and mimics the browser's
/// quota-exceeded failure.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<String, String>>,
    quota: Option<usize>,
}

impl MemoryBackend {
    /// Unbounded in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// In-memory backend that rejects writes once `bytes` of values are stored.
    #[must_use]
    pub fn with_quota(bytes: usize) -> Self {
        Self {
            entries: Mutex::default(),
            quota: Some(bytes),
        }
    }
}

impl KeyValueBackend for MemoryBackend {
    fn get_raw(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn set_raw(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(quota) = self.quota {
            let used: usize = entries
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(_, v)| v.len())
                .sum();
            let available = quota.saturating_sub(used);
            if value.len() > available {
                return Err(StorageError::QuotaExceeded {
                    key: key.to_owned(),
                    needed: value.len(),
                    available,
                });
            }
        }

        entries.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove_raw(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.remove(key);
        Ok(())
    }
}
