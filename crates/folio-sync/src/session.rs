//! Portfolio session service object
//!
//! Owns the auth session, the content engine and the edit session for one
//! client, with an explicit `init()`/`dispose()` lifecycle. The presentation
//! layer reaches role, content and edit state only through this object.

use crate::config::SyncConfig;
use crate::edit::EditSession;
use crate::engine::{ContentSyncEngine, WriteOutcome};
use crate::error::SyncError;
use folio_auth::{
    AssertionListener, AuthSession, ClaimsVerifier, HttpClaimsVerifier, IdentityAssertion,
    IdentityProvider, RoleState,
};
use folio_content::{ContentDocument, FieldMap};
use folio_store::{LocalCache, RemoteContentStore, Subscription};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

struct Running {
    assertions: Subscription,
    pump: JoinHandle<()>,
}

/// One client's view of the portfolio
pub struct PortfolioSession {
    config: SyncConfig,
    provider: Arc<dyn IdentityProvider>,
    auth: Arc<AuthSession>,
    engine: Arc<ContentSyncEngine>,
    edit: EditSession,
    running: Mutex<Option<Running>>,
}

impl PortfolioSession {
    /// Assemble a session from validated configuration
    ///
    /// A backend URL in the configuration enables HTTP sign-in
    /// verification.
    ///
    /// # Errors
    /// Returns error if the verification endpoint cannot be built
    pub fn new(
        config: SyncConfig,
        provider: Arc<dyn IdentityProvider>,
        store: Arc<dyn RemoteContentStore>,
        cache: Arc<dyn LocalCache>,
    ) -> Result<Self, SyncError> {
        let verifier = match &config.backend_url {
            Some(url) => {
                let verifier: Arc<dyn ClaimsVerifier> = Arc::new(HttpClaimsVerifier::new(url)?);
                Some(verifier)
            }
            None => None,
        };
        Ok(Self::assemble(config, provider, store, cache, verifier))
    }

    /// Assemble a session with an explicit sign-in verifier
    #[must_use]
    pub fn with_verifier(
        config: SyncConfig,
        provider: Arc<dyn IdentityProvider>,
        store: Arc<dyn RemoteContentStore>,
        cache: Arc<dyn LocalCache>,
        verifier: Arc<dyn ClaimsVerifier>,
    ) -> Self {
        Self::assemble(config, provider, store, cache, Some(verifier))
    }

    fn assemble(
        config: SyncConfig,
        provider: Arc<dyn IdentityProvider>,
        store: Arc<dyn RemoteContentStore>,
        cache: Arc<dyn LocalCache>,
        verifier: Option<Arc<dyn ClaimsVerifier>>,
    ) -> Self {
        let mut auth = AuthSession::new(provider.clone(), config.resolver(), cache.clone());
        if let Some(verifier) = verifier {
            auth = auth.with_verifier(verifier);
        }

        let engine = ContentSyncEngine::new(
            config.document_path.clone(),
            store,
            cache,
            auth.watch(),
        )
        .with_validator(config.validator());

        Self {
            config,
            provider,
            auth: Arc::new(auth),
            engine: Arc::new(engine),
            edit: EditSession::new(),
            running: Mutex::new(None),
        }
    }

    /// Start content sync and session tracking
    ///
    /// Must be called inside a tokio runtime. Calling it again while running
    /// is a no-op.
    ///
    /// # Errors
    /// Returns error if the remote subscription cannot be established
    pub fn init(&self) -> Result<(), SyncError> {
        if self.is_running() {
            return Ok(());
        }

        self.engine.start()?;

        let (tx, mut rx) = mpsc::unbounded_channel::<Option<IdentityAssertion>>();
        let auth = Arc::clone(&self.auth);
        let pump = tokio::spawn(async move {
            while let Some(assertion) = rx.recv().await {
                auth.handle_assertion_change(assertion).await;
            }
            tracing::debug!("assertion pump finished");
        });

        let listener: AssertionListener = Arc::new(move |assertion| {
            if tx.send(assertion).is_err() {
                tracing::debug!("assertion change after session disposed");
            }
        });
        let assertions = self.provider.on_assertion_change(listener);

        let previous = self.running.lock().replace(Running { assertions, pump });
        if let Some(previous) = previous {
            previous.pump.abort();
        }

        tracing::info!(path = %self.config.document_path, "portfolio session started");
        Ok(())
    }

    /// Tear down every subscription and stop the session task
    pub fn dispose(&self) {
        let running = self.running.lock().take();
        if let Some(Running { assertions, pump }) = running {
            assertions.unsubscribe();
            pump.abort();
            tracing::info!("portfolio session disposed");
        }
        self.engine.stop();
    }

    /// Check if `init()` has run without a matching `dispose()`
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.lock().is_some()
    }

    /// Validated configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Current role
    #[inline]
    #[must_use]
    pub fn role(&self) -> RoleState {
        self.auth.role()
    }

    /// Observe role changes
    #[inline]
    #[must_use]
    pub fn watch_role(&self) -> watch::Receiver<RoleState> {
        self.auth.watch()
    }

    /// Auth session, for sign-in, sign-out and viewer mode
    #[inline]
    #[must_use]
    pub fn auth(&self) -> &AuthSession {
        &self.auth
    }

    /// Content engine
    #[inline]
    #[must_use]
    pub fn engine(&self) -> &Arc<ContentSyncEngine> {
        &self.engine
    }

    /// Edit session
    #[inline]
    #[must_use]
    pub fn edit(&self) -> &EditSession {
        &self.edit
    }

    /// Reconciled content snapshot
    #[inline]
    #[must_use]
    pub fn read(&self) -> ContentDocument {
        self.engine.read()
    }

    /// Write one field; accepted writes mark the edit session unsaved
    pub async fn write(&self, key: &str, value: Value) -> WriteOutcome {
        let outcome = self.engine.write(key, value).await;
        if outcome.is_accepted() {
            self.edit.mark_unsaved();
        }
        outcome
    }

    /// Subscribe to reconciled content
    pub fn subscribe_content<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&ContentDocument) + Send + Sync + 'static,
    {
        self.engine.subscribe(callback)
    }

    /// Create the content document from defaults if it is missing
    ///
    /// # Errors
    /// Returns error if the caller is not the owner or the store fails
    pub async fn seed_defaults(&self, defaults: FieldMap) -> Result<bool, SyncError> {
        self.engine.seed_if_missing(defaults).await
    }

    /// Interactive sign-in
    ///
    /// # Errors
    /// Returns error if sign-in fails or is refused
    pub async fn sign_in(&self) -> Result<RoleState, SyncError> {
        Ok(self.auth.sign_in().await?)
    }

    /// Sign out
    ///
    /// # Errors
    /// Returns error if the provider sign-out fails
    pub async fn sign_out(&self) -> Result<(), SyncError> {
        Ok(self.auth.sign_out().await?)
    }
}

impl Drop for PortfolioSession {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for PortfolioSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortfolioSession")
            .field("document", &self.config.document_path)
            .field("role", &self.role())
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}
