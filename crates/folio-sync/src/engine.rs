//! Content synchronization engine
//!
//! Mediates every read and write of editable content:
//!
//! - [`ContentSyncEngine::read`] returns the reconciled snapshot and never
//!   waits on the network
//! - [`ContentSyncEngine::write`] is owner-only; it updates the snapshot and
//!   local replica first, then merges into the remote document
//! - remote pushes are merged unconditionally and gated for notification by
//!   the [`Reconciler`]
//!
//! Subscriber callbacks always run with no engine lock held.

use crate::error::SyncError;
use crate::logging::redact;
use crate::reconcile::{PushDecision, Reconciler};
use crate::replica::LocalReplica;
use chrono::Utc;
use folio_auth::RoleState;
use folio_content::{
    ContentDocument, ContentValidator, DocumentPath, FieldMap, Revision, ValidationError,
    LAST_UPDATED_FIELD,
};
use folio_store::{
    CacheError, DocumentListener, ListenerSet, LocalCache, RemoteContentStore, RemoteDocument,
    StoreError, Subscription,
};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::watch;

/// Callback receiving the full reconciled document
pub type ContentListener = Arc<dyn Fn(&ContentDocument) + Send + Sync>;

type ListenerFn = dyn Fn(&ContentDocument) + Send + Sync;

/// Result of a write request
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome {
    /// Applied locally and sent to the remote store
    Accepted {
        /// Revision stamped on the write
        revision: Revision,
        /// Whether the remote merge succeeded
        synced: bool,
    },
    /// Caller is not the owner; nothing changed
    Ignored,
    /// Value failed validation; nothing changed
    Rejected(ValidationError),
}

impl WriteOutcome {
    /// Check if the write changed local state
    #[inline]
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }
}

#[derive(Debug, Default)]
struct EngineState {
    snapshot: ContentDocument,
    reconciler: Reconciler,
}

/// Ownership-aware sync engine for one remote document
pub struct ContentSyncEngine {
    path: DocumentPath,
    store: Arc<dyn RemoteContentStore>,
    replica: LocalReplica,
    validator: ContentValidator,
    role: watch::Receiver<RoleState>,
    state: Mutex<EngineState>,
    listeners: ListenerSet<ListenerFn>,
    remote: Mutex<Option<Subscription>>,
}

impl ContentSyncEngine {
    /// Create engine; the snapshot starts from the local replica
    #[must_use]
    pub fn new(
        path: DocumentPath,
        store: Arc<dyn RemoteContentStore>,
        cache: Arc<dyn LocalCache>,
        role: watch::Receiver<RoleState>,
    ) -> Self {
        let replica = LocalReplica::new(cache);
        let snapshot = replica.load();
        tracing::debug!(%path, cached_fields = snapshot.len(), "content engine created");

        Self {
            path,
            store,
            replica,
            validator: ContentValidator::default(),
            role,
            state: Mutex::new(EngineState {
                snapshot,
                reconciler: Reconciler::new(),
            }),
            listeners: ListenerSet::new(),
            remote: Mutex::new(None),
        }
    }

    /// With custom validator
    #[must_use]
    pub fn with_validator(mut self, validator: ContentValidator) -> Self {
        self.validator = validator;
        self
    }

    /// Remote document this engine syncs
    #[inline]
    #[must_use]
    pub fn path(&self) -> &DocumentPath {
        &self.path
    }

    /// Latest reconciled snapshot
    #[must_use]
    pub fn read(&self) -> ContentDocument {
        self.state.lock().snapshot.clone()
    }

    /// Check if the remote subscription is live
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.remote.lock().is_some()
    }

    /// Check if the initialization push has arrived
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.state.lock().reconciler.is_initialized()
    }

    /// Subscribe to reconciled documents
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&ContentDocument) + Send + Sync + 'static,
    {
        let listener: ContentListener = Arc::new(callback);
        self.listeners.add(listener)
    }

    /// Number of live content subscribers
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.listeners.len()
    }

    /// Write one field
    ///
    /// Non-owners get [`WriteOutcome::Ignored`] and nothing changes. For the
    /// owner the snapshot and replica are updated before the first await,
    /// so `read()` reflects the value even while the merge is in flight. A
    /// failed merge is logged and the local update kept.
    pub async fn write(&self, key: &str, value: Value) -> WriteOutcome {
        let capability = self.role.borrow().capability();
        if capability.is_none() {
            tracing::debug!(key, "write ignored: caller is not the owner");
            return WriteOutcome::Ignored;
        }

        if let Err(e) = self.validator.validate(key, &value) {
            tracing::info!(key, error = %e, "write rejected");
            return WriteOutcome::Rejected(e);
        }

        let revision = {
            let mut state = self.state.lock();
            let revision = Revision::next_after(state.snapshot.last_updated(), Utc::now());
            state.snapshot.set(key, value.clone());
            state.snapshot.set_last_updated(revision);
            revision
        };

        if let Err(e) = self
            .replica
            .store(key, &value)
            .and_then(|()| self.replica.store_revision(revision))
        {
            log_cache_error(&e);
        }

        let mut fields = FieldMap::new();
        fields.insert(key.to_string(), value);
        fields.insert(LAST_UPDATED_FIELD.to_string(), revision.to_value());

        let synced = match self.store.merge_document(&self.path, fields).await {
            Ok(()) => true,
            Err(e) => {
                log_store_error("remote write failed, keeping local update", &e);
                false
            }
        };

        tracing::debug!(key, %revision, synced, "write accepted");
        WriteOutcome::Accepted { revision, synced }
    }

    /// Reconcile one remote push
    ///
    /// Called by the remote subscription; public so pushes can be replayed.
    pub fn apply_push(&self, doc: &RemoteDocument) -> PushDecision {
        let revision = doc
            .fields
            .get(LAST_UPDATED_FIELD)
            .and_then(Revision::from_value);

        let (decision, notify, last_updated) = {
            let mut state = self.state.lock();
            state.snapshot.merge_fields(&doc.fields);
            state.snapshot.observe_revision(revision);
            let decision = state.reconciler.observe(revision);
            let notify = decision.should_notify().then(|| state.snapshot.clone());
            (decision, notify, state.snapshot.last_updated())
        };

        let persisted = self
            .replica
            .store_all(doc.fields.iter().filter(|(k, _)| *k != LAST_UPDATED_FIELD))
            .and_then(|()| last_updated.map_or(Ok(()), |rev| self.replica.store_revision(rev)));
        if let Err(e) = persisted {
            log_cache_error(&e);
        }

        tracing::debug!(
            path = %self.path,
            exists = doc.exists,
            revision = ?revision.map(|r| r.to_string()),
            ?decision,
            "remote push reconciled"
        );

        if let Some(snapshot) = notify {
            for listener in self.listeners.snapshot() {
                listener(&snapshot);
            }
        }

        decision
    }

    /// Subscribe to the remote document
    ///
    /// The store's first delivery is the initialization push. Calling this
    /// while already running is a no-op.
    ///
    /// # Errors
    /// Returns error if the store refuses the subscription
    pub fn start(self: &Arc<Self>) -> Result<(), StoreError> {
        if self.is_running() {
            return Ok(());
        }

        self.state.lock().reconciler.reset();

        let weak = Arc::downgrade(self);
        let listener: DocumentListener = Arc::new(move |doc: &RemoteDocument| {
            if let Some(engine) = weak.upgrade() {
                engine.apply_push(doc);
            }
        });
        let subscription = self.store.subscribe_document(&self.path, listener)?;

        let mut slot = self.remote.lock();
        if slot.is_none() {
            *slot = Some(subscription);
            tracing::info!(path = %self.path, "content sync started");
        }
        Ok(())
    }

    /// Tear down the remote subscription
    pub fn stop(&self) {
        let subscription = self.remote.lock().take();
        if let Some(subscription) = subscription {
            subscription.unsubscribe();
            tracing::info!(path = %self.path, "content sync stopped");
        }
    }

    /// Create the remote document from defaults if it does not exist
    ///
    /// Returns whether the document was seeded.
    ///
    /// # Errors
    /// Returns error if the caller is not the owner, a default is invalid,
    /// or the store fails
    pub async fn seed_if_missing(&self, defaults: FieldMap) -> Result<bool, SyncError> {
        let capability = self.role.borrow().capability();
        if capability.is_none() {
            return Err(SyncError::NotOwner);
        }

        let current = self.store.get_document(&self.path).await?;
        if current.exists {
            return Ok(false);
        }

        let mut fields = defaults;
        fields.remove(LAST_UPDATED_FIELD);
        for (key, value) in &fields {
            self.validator.validate(key, value)?;
        }

        let revision = Revision::next_after(self.state.lock().snapshot.last_updated(), Utc::now());
        let count = fields.len();
        fields.insert(LAST_UPDATED_FIELD.to_string(), revision.to_value());
        self.store.merge_document(&self.path, fields).await?;

        tracing::info!(path = %self.path, fields = count, "seeded missing content document");
        Ok(true)
    }

    /// Remove the local replica from the cache
    ///
    /// The in-memory snapshot is left as is.
    ///
    /// # Errors
    /// Returns error if the cache could not be updated
    pub fn clear_replica(&self) -> Result<usize, CacheError> {
        let removed = self.replica.clear()?;
        tracing::info!(removed, "local replica cleared");
        Ok(removed)
    }
}

impl std::fmt::Debug for ContentSyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentSyncEngine")
            .field("path", &self.path)
            .field("running", &self.is_running())
            .field("subscribers", &self.listeners.len())
            .finish_non_exhaustive()
    }
}

fn log_store_error(context: &str, error: &StoreError) {
    let message = error.to_string();
    tracing::warn!(
        error = %redact(&message),
        transient = error.is_transient(),
        "{context}"
    );
}

fn log_cache_error(error: &CacheError) {
    let message = error.to_string();
    tracing::warn!(error = %redact(&message), "local replica not persisted");
}
