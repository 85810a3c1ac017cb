//! Remote content store adapter
//!
//! The contract the sync engine needs from a document database: read one
//! document, merge a partial write into it, and receive the full document on
//! every change.

use crate::subscription::{ListenerSet, Subscription};
use async_trait::async_trait;
use folio_content::{DocumentPath, FieldMap};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Document as returned by the store
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoteDocument {
    /// Raw wire fields (including `lastUpdated` when present)
    pub fields: FieldMap,
    /// Whether the document exists at all
    pub exists: bool,
}

impl RemoteDocument {
    /// Existing document with the given fields
    #[inline]
    #[must_use]
    pub fn existing(fields: FieldMap) -> Self {
        Self {
            fields,
            exists: true,
        }
    }

    /// Placeholder for a document that does not exist
    #[inline]
    #[must_use]
    pub fn missing() -> Self {
        Self::default()
    }
}

/// Live push callback
pub type DocumentListener = Arc<dyn Fn(&RemoteDocument) + Send + Sync>;

type ListenerFn = dyn Fn(&RemoteDocument) + Send + Sync;

/// Remote store failures
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// Network or backend unavailable
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Security rules refused the operation
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Store rejected the payload
    #[error("write rejected: {0}")]
    Rejected(String),
}

impl StoreError {
    /// Check if a later attempt could succeed
    #[inline]
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Document-oriented remote store
#[async_trait]
pub trait RemoteContentStore: Send + Sync {
    /// Read a document once
    ///
    /// # Errors
    /// Returns error if the store cannot be reached
    async fn get_document(&self, path: &DocumentPath) -> Result<RemoteDocument, StoreError>;

    /// Merge `fields` into the document, creating it if needed
    ///
    /// Keys not present in `fields` are left untouched.
    ///
    /// # Errors
    /// Returns error if the write was not applied
    async fn merge_document(&self, path: &DocumentPath, fields: FieldMap)
        -> Result<(), StoreError>;

    /// Receive the full document on every change
    ///
    /// Implementations deliver the current state once right after
    /// registration, then again after each change.
    ///
    /// # Errors
    /// Returns error if the listener could not be registered
    fn subscribe_document(
        &self,
        path: &DocumentPath,
        listener: DocumentListener,
    ) -> Result<Subscription, StoreError>;
}

/// In-process document store
///
/// Pushes are delivered synchronously from the mutating call, after the
/// internal lock is released.
#[derive(Debug, Default)]
pub struct MemoryContentStore {
    documents: Mutex<HashMap<DocumentPath, FieldMap>>,
    listeners: Mutex<HashMap<DocumentPath, ListenerSet<ListenerFn>>>,
    fail_writes: AtomicBool,
    merges: AtomicUsize,
}

impl MemoryContentStore {
    /// Create empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent merges fail with [`StoreError::Unavailable`]
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of merges applied
    #[must_use]
    pub fn merge_count(&self) -> usize {
        self.merges.load(Ordering::SeqCst)
    }

    /// Stored fields of a document
    #[must_use]
    pub fn document(&self, path: &DocumentPath) -> Option<FieldMap> {
        self.documents.lock().get(path).cloned()
    }

    /// Replace a document wholesale and push it, as another client would
    pub fn replace_document(&self, path: &DocumentPath, fields: FieldMap) {
        self.documents.lock().insert(path.clone(), fields.clone());
        self.notify(path, &RemoteDocument::existing(fields));
    }

    /// Number of live listeners on a document
    #[must_use]
    pub fn listener_count(&self, path: &DocumentPath) -> usize {
        self.listeners.lock().get(path).map_or(0, ListenerSet::len)
    }

    fn current(&self, path: &DocumentPath) -> RemoteDocument {
        self.documents
            .lock()
            .get(path)
            .cloned()
            .map_or_else(RemoteDocument::missing, RemoteDocument::existing)
    }

    fn notify(&self, path: &DocumentPath, doc: &RemoteDocument) {
        let listeners = self
            .listeners
            .lock()
            .get(path)
            .map(ListenerSet::snapshot)
            .unwrap_or_default();

        tracing::trace!(%path, listeners = listeners.len(), "pushing document");
        for listener in listeners {
            listener(doc);
        }
    }
}

#[async_trait]
impl RemoteContentStore for MemoryContentStore {
    async fn get_document(&self, path: &DocumentPath) -> Result<RemoteDocument, StoreError> {
        Ok(self.current(path))
    }

    async fn merge_document(
        &self,
        path: &DocumentPath,
        fields: FieldMap,
    ) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(format!("merge into {path} refused")));
        }

        let merged = {
            let mut docs = self.documents.lock();
            let doc = docs.entry(path.clone()).or_default();
            doc.extend(fields);
            doc.clone()
        };
        self.merges.fetch_add(1, Ordering::SeqCst);

        self.notify(path, &RemoteDocument::existing(merged));
        Ok(())
    }

    fn subscribe_document(
        &self,
        path: &DocumentPath,
        listener: DocumentListener,
    ) -> Result<Subscription, StoreError> {
        let subscription = self
            .listeners
            .lock()
            .entry(path.clone())
            .or_default()
            .add(Arc::clone(&listener));

        listener(&self.current(path));
        Ok(subscription)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn path() -> DocumentPath {
        "portfolio/content".parse().unwrap()
    }

    fn fields(pairs: &[(&str, serde_json::Value)]) -> FieldMap {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[tokio::test]
    async fn merge_keeps_unspecified_keys() {
        let store = MemoryContentStore::new();
        store
            .merge_document(&path(), fields(&[("a", json!(1)), ("b", json!(2))]))
            .await
            .unwrap();
        store
            .merge_document(&path(), fields(&[("b", json!(3))]))
            .await
            .unwrap();

        let doc = store.get_document(&path()).await.unwrap();
        assert!(doc.exists);
        assert_eq!(doc.fields, fields(&[("a", json!(1)), ("b", json!(3))]));
        assert_eq!(store.merge_count(), 2);
    }

    #[tokio::test]
    async fn missing_document_reports_not_exists() {
        let store = MemoryContentStore::new();
        let doc = store.get_document(&path()).await.unwrap();
        assert_eq!(doc, RemoteDocument::missing());
    }

    #[tokio::test]
    async fn subscribe_delivers_initial_and_changes() {
        let store = MemoryContentStore::new();
        let seen: Arc<Mutex<Vec<RemoteDocument>>> = Arc::default();
        let sink = Arc::clone(&seen);

        let sub = store
            .subscribe_document(&path(), Arc::new(move |doc| sink.lock().push(doc.clone())))
            .unwrap();
        store
            .merge_document(&path(), fields(&[("x", json!("v"))]))
            .await
            .unwrap();

        {
            let seen = seen.lock();
            assert_eq!(seen.len(), 2);
            assert!(!seen[0].exists);
            assert_eq!(seen[1].fields, fields(&[("x", json!("v"))]));
        }

        drop(sub);
        assert_eq!(store.listener_count(&path()), 0);
        store.replace_document(&path(), FieldMap::new());
        assert_eq!(seen.lock().len(), 2);
    }

    #[tokio::test]
    async fn failing_writes_leave_document_untouched() {
        let store = MemoryContentStore::new();
        store.set_fail_writes(true);
        let err = store
            .merge_document(&path(), fields(&[("x", json!(1))]))
            .await
            .unwrap_err();
        assert!(err.is_transient());
        assert_eq!(store.document(&path()), None);
        assert_eq!(store.merge_count(), 0);
    }
}
