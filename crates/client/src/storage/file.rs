//! Filesystem storage backend.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use url::form_urlencoded;

use super::{KeyValueBackend, StorageError};

/// Stores each key as one JSON document in a directory.
///
/// Survives process restarts the way browser storage survives page reloads.
/// Writes go to a temporary file that is renamed over the old one, so a
/// failed write never leaves a half-written value behind.
#[derive(Debug, Clone)]
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    /// Use `dir` as the storage directory, creating it if necessary.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Directory holding the stored documents.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        // Percent-encoding keeps distinct keys distinct (`favorites:u1`
        // becomes `favorites%3Au1.json`).
        let name: String = form_urlencoded::byte_serialize(key.as_bytes()).collect();
        self.dir.join(format!("{name}.json"))
    }
}

impl KeyValueBackend for FileBackend {
    fn get_raw(&self, key: &str) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set_raw(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        if let Err(e) = fs::rename(&tmp, &path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }

    fn remove_raw(&self, key: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.path_for(key)) {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "campus-market-{name}-{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_round_trip_and_remove() {
        let backend = FileBackend::open(temp_dir("roundtrip")).unwrap();

        assert_eq!(backend.get_raw("cart").unwrap(), None);
        backend.set_raw("cart", r#"{"a":1}"#).unwrap();
        assert_eq!(backend.get_raw("cart").unwrap().as_deref(), Some(r#"{"a":1}"#));

        backend.remove_raw("cart").unwrap();
        backend.remove_raw("cart").unwrap();
        assert_eq!(backend.get_raw("cart").unwrap(), None);

        let _ = fs::remove_dir_all(backend.dir());
    }

    #[test]
    fn test_scoped_keys_map_to_distinct_files() {
        let backend = FileBackend::open(temp_dir("scoped")).unwrap();
        backend.set_raw("favorites:u1", "[1]").unwrap();
        backend.set_raw("favorites_u1", "[2]").unwrap();

        assert_eq!(backend.get_raw("favorites:u1").unwrap().as_deref(), Some("[1]"));
        assert_eq!(backend.get_raw("favorites_u1").unwrap().as_deref(), Some("[2]"));

        let _ = fs::remove_dir_all(backend.dir());
    }

    #[test]
    fn test_survives_reopen() {
        let dir = temp_dir("reopen");
        FileBackend::open(&dir).unwrap().set_raw("k", "v").unwrap();
        let reopened = FileBackend::open(&dir).unwrap();
        assert_eq!(reopened.get_raw("k").unwrap().as_deref(), Some("v"));

        let _ = fs::remove_dir_all(dir);
    }
}
