//! Local durable cache
//!
//! String key-value storage on the client, the same shape as browser local
//! storage. The sync engine keeps its replica here so content can be shown
//! before the remote store answers.

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Errors persisting cache entries
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Underlying file I/O failed
    #[error("cache I/O failed for {path}: {source}")]
    Io {
        /// Backing file
        path: PathBuf,
        /// Cause
        #[source]
        source: io::Error,
    },

    /// Backing file is not a JSON string map
    #[error("cache file {path} is corrupt: {source}")]
    Corrupt {
        /// Backing file
        path: PathBuf,
        /// Cause
        #[source]
        source: serde_json::Error,
    },
}

/// Client-side key-value store
///
/// Reads never fail: an unreadable entry is simply absent.
pub trait LocalCache: Send + Sync {
    /// Get stored value
    fn get_item(&self, key: &str) -> Option<String>;

    /// Store value
    ///
    /// # Errors
    /// Returns error if the value could not be persisted
    fn set_item(&self, key: &str, value: &str) -> Result<(), CacheError>;

    /// Remove value (absent keys are not an error)
    ///
    /// # Errors
    /// Returns error if the removal could not be persisted
    fn remove_item(&self, key: &str) -> Result<(), CacheError>;
}

/// In-process cache, lost on restart
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryCache {
    /// Create empty cache
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Check if cache is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl LocalCache for MemoryCache {
    fn get_item(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), CacheError> {
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), CacheError> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

/// Cache persisted as a JSON object in a single file
///
/// Every mutation rewrites the file through a sibling temp file and rename,
/// so a crash leaves either the old or the new contents.
#[derive(Debug)]
pub struct FileCache {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileCache {
    /// Open cache at `path`, starting empty if the file does not exist
    ///
    /// # Errors
    /// Returns error if the file exists but cannot be read or parsed
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CacheError> {
        let path = path.as_ref().to_path_buf();
        let entries = match fs::read(&path) {
            Ok(bytes) if bytes.is_empty() => BTreeMap::new(),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|source| CacheError::Corrupt {
                path: path.clone(),
                source,
            })?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(source) => return Err(CacheError::Io { path, source }),
        };

        tracing::debug!(path = %path.display(), entries = entries.len(), "opened file cache");
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    /// Backing file
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Copy of all entries
    #[must_use]
    pub fn entries(&self) -> BTreeMap<String, String> {
        self.entries.lock().clone()
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> Result<(), CacheError> {
        let io_err = |source| CacheError::Io {
            path: self.path.clone(),
            source,
        };

        let bytes = serde_json::to_vec_pretty(entries).map_err(|source| CacheError::Corrupt {
            path: self.path.clone(),
            source,
        })?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, bytes).map_err(io_err)?;
        fs::rename(&tmp, &self.path).map_err(io_err)
    }
}

impl LocalCache for FileCache {
    fn get_item(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), CacheError> {
        let mut entries = self.entries.lock();
        entries.insert(key.to_string(), value.to_string());
        self.persist(&entries)
    }

    fn remove_item(&self, key: &str) -> Result<(), CacheError> {
        let mut entries = self.entries.lock();
        if entries.remove(key).is_some() {
            self.persist(&entries)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn memory_cache_roundtrip() {
        let cache = MemoryCache::new();
        assert_eq!(cache.get_item("viewer_session"), None);

        cache.set_item("viewer_session", "active").unwrap();
        assert_eq!(cache.get_item("viewer_session").as_deref(), Some("active"));

        cache.remove_item("viewer_session").unwrap();
        assert!(cache.is_empty());

        // Removing an absent key is fine
        cache.remove_item("viewer_session").unwrap();
    }

    #[test]
    fn file_cache_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("replica.json");

        {
            let cache = FileCache::open(&path).unwrap();
            cache.set_item("editable_bio", "\"hello\"").unwrap();
            cache.set_item("scratch", "x").unwrap();
            cache.remove_item("scratch").unwrap();
        }

        let reopened = FileCache::open(&path).unwrap();
        assert_eq!(reopened.get_item("editable_bio").as_deref(), Some("\"hello\""));
        assert_eq!(reopened.get_item("scratch"), None);
        assert_eq!(reopened.entries().len(), 1);
    }

    #[test]
    fn file_cache_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::open(dir.path().join("absent.json")).unwrap();
        assert!(cache.entries().is_empty());
    }

    #[test]
    fn file_cache_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, b"[1, 2, 3]").unwrap();
        assert!(matches!(
            FileCache::open(&path),
            Err(CacheError::Corrupt { .. })
        ));
    }

    #[test]
    fn file_cache_reports_unwritable_location() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::open(dir.path().join("missing-dir").join("c.json")).unwrap();
        assert!(matches!(
            cache.set_item("k", "v"),
            Err(CacheError::Io { .. })
        ));
        // In-memory view still updated
        assert_eq!(cache.get_item("k").as_deref(), Some("v"));
    }
}
