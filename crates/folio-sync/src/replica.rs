//! Local replica of the content document
//!
//! One cache entry per content key, holding the JSON-encoded value, plus a
//! manifest entry listing the keys (the cache cannot enumerate) and an entry
//! for the last known revision.

use folio_content::{ContentDocument, FieldMap, Revision};
use folio_store::{CacheError, LocalCache};
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Cache key of the replicated-key manifest
pub const MANIFEST_KEY: &str = "folio_replica_keys";

/// Cache key of the last known revision
pub const REVISION_KEY: &str = "folio_replica_revision";

/// Engine-owned view of the local cache
#[derive(Clone)]
pub struct LocalReplica {
    cache: Arc<dyn LocalCache>,
}

impl LocalReplica {
    /// Replica stored in `cache`
    #[inline]
    #[must_use]
    pub fn new(cache: Arc<dyn LocalCache>) -> Self {
        Self { cache }
    }

    /// Keys currently replicated
    #[must_use]
    pub fn keys(&self) -> BTreeSet<String> {
        self.cache
            .get_item(MANIFEST_KEY)
            .and_then(|raw| match serde_json::from_str(&raw) {
                Ok(keys) => Some(keys),
                Err(e) => {
                    tracing::warn!(error = %e, "replica manifest unreadable, starting empty");
                    None
                }
            })
            .unwrap_or_default()
    }

    /// Read the whole replica
    ///
    /// Entries that are not valid JSON come back as plain strings; keys
    /// listed in the manifest but missing from the cache are skipped.
    #[must_use]
    pub fn load(&self) -> ContentDocument {
        let mut fields = FieldMap::new();
        for key in self.keys() {
            if let Some(raw) = self.cache.get_item(&key) {
                let value = serde_json::from_str(&raw).unwrap_or(Value::String(raw));
                fields.insert(key, value);
            }
        }

        let mut doc = ContentDocument::from_fields(fields);
        let revision = self
            .cache
            .get_item(REVISION_KEY)
            .and_then(|raw| Revision::from_value(&Value::String(raw)));
        doc.observe_revision(revision);
        doc
    }

    /// Persist one field
    ///
    /// # Errors
    /// Returns error if the cache could not persist the entry or manifest
    pub fn store(&self, key: &str, value: &Value) -> Result<(), CacheError> {
        self.cache.set_item(key, &value.to_string())?;

        let mut keys = self.keys();
        if keys.insert(key.to_string()) {
            self.write_manifest(&keys)?;
        }
        Ok(())
    }

    /// Persist several fields with a single manifest update
    ///
    /// # Errors
    /// Returns the first cache failure; earlier entries stay written
    pub fn store_all<'a>(
        &self,
        entries: impl IntoIterator<Item = (&'a String, &'a Value)>,
    ) -> Result<(), CacheError> {
        let mut keys = self.keys();
        let before = keys.len();
        for (key, value) in entries {
            self.cache.set_item(key, &value.to_string())?;
            keys.insert(key.clone());
        }
        if keys.len() != before {
            self.write_manifest(&keys)?;
        }
        Ok(())
    }

    /// Persist the last known revision
    ///
    /// # Errors
    /// Returns error if the cache could not persist it
    pub fn store_revision(&self, revision: Revision) -> Result<(), CacheError> {
        self.cache.set_item(REVISION_KEY, &revision.to_string())
    }

    /// Remove every replicated entry
    ///
    /// Returns the number of content keys removed.
    ///
    /// # Errors
    /// Returns the first cache failure
    pub fn clear(&self) -> Result<usize, CacheError> {
        let keys = self.keys();
        for key in &keys {
            self.cache.remove_item(key)?;
        }
        self.cache.remove_item(MANIFEST_KEY)?;
        self.cache.remove_item(REVISION_KEY)?;
        Ok(keys.len())
    }

    fn write_manifest(&self, keys: &BTreeSet<String>) -> Result<(), CacheError> {
        let encoded = serde_json::to_string(keys).unwrap_or_else(|_| "[]".to_string());
        self.cache.set_item(MANIFEST_KEY, &encoded)
    }
}

impl std::fmt::Debug for LocalReplica {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalReplica")
            .field("keys", &self.keys())
            .finish()
    }
}
