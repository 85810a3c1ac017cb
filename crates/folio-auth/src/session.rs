//! Auth session: drives the identity provider and publishes [`RoleState`]
//!
//! Every path that cannot establish fresh claims publishes a signed-out,
//! non-owner state before reporting the failure.

use crate::assertion::IdentityAssertion;
use crate::error::AuthError;
use crate::provider::IdentityProvider;
use crate::resolver::AuthorizationResolver;
use crate::role::{AuthState, RoleState, WriteCapability};
use crate::verifier::{ClaimsVerifier, Verification};
use chrono::Utc;
use folio_store::LocalCache;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;

/// Local cache key of the viewer UX flag
pub const VIEWER_SESSION_KEY: &str = "viewer_session";

const VIEWER_SESSION_ACTIVE: &str = "active";

/// Owner/viewer session state machine
pub struct AuthSession {
    provider: Arc<dyn IdentityProvider>,
    resolver: AuthorizationResolver,
    cache: Arc<dyn LocalCache>,
    verifier: Option<Arc<dyn ClaimsVerifier>>,
    current: Mutex<Option<IdentityAssertion>>,
    state: watch::Sender<RoleState>,
}

impl AuthSession {
    /// Create session in the loading state
    #[must_use]
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        resolver: AuthorizationResolver,
        cache: Arc<dyn LocalCache>,
    ) -> Self {
        let (state, _) = watch::channel(RoleState::loading());
        Self {
            provider,
            resolver,
            cache,
            verifier: None,
            current: Mutex::new(None),
            state,
        }
    }

    /// Gate sign-in on a backend verifier
    #[must_use]
    pub fn with_verifier(mut self, verifier: Arc<dyn ClaimsVerifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    /// Current role state
    #[inline]
    #[must_use]
    pub fn role(&self) -> RoleState {
        *self.state.borrow()
    }

    /// Observe role changes
    #[inline]
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<RoleState> {
        self.state.subscribe()
    }

    /// Write capability for the current state
    #[inline]
    #[must_use]
    pub fn capability(&self) -> Option<WriteCapability> {
        self.role().capability()
    }

    /// Check whether the viewer UX flag is set
    #[must_use]
    pub fn viewer_flag(&self) -> bool {
        self.cache.get_item(VIEWER_SESSION_KEY).as_deref() == Some(VIEWER_SESSION_ACTIVE)
    }

    /// Resolver in use
    #[inline]
    #[must_use]
    pub fn resolver(&self) -> &AuthorizationResolver {
        &self.resolver
    }

    /// React to a provider session change
    ///
    /// A present assertion is never trusted as delivered: claims are
    /// force-refreshed (and backend-verified when a verifier is set) first.
    /// Any failure fails closed; a backend refusal also ends the provider
    /// session.
    pub async fn handle_assertion_change(
        &self,
        assertion: Option<IdentityAssertion>,
    ) -> RoleState {
        let auth = match assertion {
            Some(assertion) => match self.establish(&assertion).await {
                Ok(auth) => auth,
                Err(e) => {
                    tracing::warn!(error = %e, "could not establish session, continuing signed out");
                    if e.is_denial() {
                        self.end_provider_session().await;
                    }
                    AuthState::signed_out()
                }
            },
            None => {
                let had_assertion = self.current.lock().take().is_some();
                if had_assertion {
                    self.clear_viewer_flag();
                }
                self.resolver
                    .resolve_with_viewer(None, self.viewer_flag(), Utc::now())
            }
        };

        self.publish(auth)
    }

    /// Re-check the current assertion against the recency window
    ///
    /// Call periodically: a session whose claims have aged out is refreshed,
    /// and drops to signed out if the refresh fails.
    pub async fn revalidate(&self) -> RoleState {
        let current = self.current.lock().clone();
        match current {
            Some(assertion) if !self.resolver.is_fresh(&assertion, Utc::now()) => {
                self.handle_assertion_change(Some(assertion)).await
            }
            Some(assertion) => {
                let auth = self.resolver.resolve_role(Some(&assertion), Utc::now());
                self.publish(auth)
            }
            None => {
                let auth = self
                    .resolver
                    .resolve_with_viewer(None, self.viewer_flag(), Utc::now());
                self.publish(auth)
            }
        }
    }

    /// Interactive sign-in
    ///
    /// # Errors
    /// Returns error if the provider fails, claims cannot be refreshed, or
    /// the backend refuses the identity. The published state is signed out
    /// in every error case, and the provider session is ended.
    pub async fn sign_in(&self) -> Result<RoleState, AuthError> {
        let assertion = match self.provider.sign_in().await {
            Ok(assertion) => assertion,
            Err(e) => {
                tracing::info!(error = %e, "sign-in did not complete");
                self.publish(AuthState::signed_out());
                return Err(e.into());
            }
        };

        match self.establish(&assertion).await {
            Ok(auth) => Ok(self.publish(auth)),
            Err(e) => {
                tracing::warn!(error = %e, "sign-in refused");
                self.end_provider_session().await;
                self.publish(AuthState::signed_out());
                Err(e)
            }
        }
    }

    /// Refresh, verify and resolve; records the fresh assertion on success
    async fn establish(&self, assertion: &IdentityAssertion) -> Result<AuthState, AuthError> {
        self.clear_viewer_flag();
        *self.current.lock() = None;

        let fresh = self.provider.refresh_claims(true).await?;
        if fresh.subject_id != assertion.subject_id {
            tracing::warn!("refreshed claims name a different subject");
        }

        if let Some(verifier) = &self.verifier {
            match verifier.verify(&fresh).await? {
                Verification::Accepted => {}
                Verification::Denied(reason) => return Err(AuthError::AccessDenied(reason)),
            }
        }

        let auth = self.resolver.resolve_role(Some(&fresh), Utc::now());
        *self.current.lock() = Some(fresh);
        Ok(auth)
    }

    async fn end_provider_session(&self) {
        *self.current.lock() = None;
        if let Err(e) = self.provider.sign_out().await {
            tracing::warn!(error = %e, "provider sign-out after refusal failed");
        }
    }

    /// Sign out and drop viewer mode
    ///
    /// # Errors
    /// Returns error if the provider sign-out fails; local state is signed
    /// out regardless.
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        self.clear_viewer_flag();
        *self.current.lock() = None;
        self.publish(AuthState::signed_out());
        self.provider.sign_out().await?;
        Ok(())
    }

    /// Browse as a viewer without an identity
    ///
    /// Has no effect on role: an active assertion still decides it.
    pub fn enter_viewer_mode(&self) -> RoleState {
        if let Err(e) = self.cache.set_item(VIEWER_SESSION_KEY, VIEWER_SESSION_ACTIVE) {
            tracing::warn!(error = %e, "could not persist viewer flag");
        }
        let current = self.current.lock().clone();
        let auth = self
            .resolver
            .resolve_with_viewer(current.as_ref(), true, Utc::now());
        self.publish(auth)
    }

    fn clear_viewer_flag(&self) {
        if let Err(e) = self.cache.remove_item(VIEWER_SESSION_KEY) {
            tracing::warn!(error = %e, "could not clear viewer flag");
        }
    }

    fn publish(&self, auth: AuthState) -> RoleState {
        let state = RoleState::settled(auth);
        let previous = self.state.send_replace(state);
        if previous.role != state.role || previous.authenticated != state.authenticated {
            tracing::info!(role = ?state.role, authenticated = state.authenticated, "role changed");
        }
        state
    }
}

impl std::fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSession")
            .field("state", &self.role())
            .field("verifier", &self.verifier.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IdentityError;
    use crate::provider::MockIdentityProvider;
    use crate::resolver::AllowList;
    use crate::role::Role;
    use crate::verifier::MockClaimsVerifier;
    use folio_store::MemoryCache;
    use mockall::predicate::eq;

    const OWNER: &str = "U1-owner-subject";

    fn resolver() -> AuthorizationResolver {
        AuthorizationResolver::new(AllowList::new(OWNER).with_email("owner@example.com"))
            .with_viewer_authenticated(true)
    }

    fn session(provider: MockIdentityProvider) -> (AuthSession, Arc<MemoryCache>) {
        let cache = Arc::new(MemoryCache::new());
        let session = AuthSession::new(Arc::new(provider), resolver(), cache.clone());
        (session, cache)
    }

    #[tokio::test]
    async fn owner_assertion_resolves_after_forced_refresh() {
        let mut provider = MockIdentityProvider::new();
        provider
            .expect_refresh_claims()
            .with(eq(true))
            .times(1)
            .returning(|_| Ok(IdentityAssertion::new(OWNER)));

        let (session, _) = session(provider);
        assert!(session.role().loading);

        let state = session
            .handle_assertion_change(Some(IdentityAssertion::new(OWNER)))
            .await;
        assert_eq!(state.role, Role::Owner);
        assert!(state.authenticated);
        assert!(!state.loading);
        assert!(session.capability().is_some());
    }

    #[tokio::test]
    async fn refresh_failure_fails_closed() {
        let mut provider = MockIdentityProvider::new();
        provider
            .expect_refresh_claims()
            .returning(|_| Err(IdentityError::Network("offline".into())));

        let (session, _) = session(provider);
        let state = session
            .handle_assertion_change(Some(IdentityAssertion::new(OWNER)))
            .await;
        assert_eq!(state, RoleState::settled(AuthState::signed_out()));
        assert!(session.capability().is_none());
    }

    #[tokio::test]
    async fn viewer_flag_never_elevates() {
        let (session, _) = session(MockIdentityProvider::new());
        let state = session.enter_viewer_mode();
        assert_eq!(state.role, Role::NonOwner);
        assert!(state.authenticated);
        assert!(session.viewer_flag());
    }

    #[tokio::test]
    async fn persisted_viewer_flag_survives_initial_signed_out_event() {
        let (session, cache) = session(MockIdentityProvider::new());
        cache.set_item(VIEWER_SESSION_KEY, "active").unwrap();

        let state = session.handle_assertion_change(None).await;
        assert!(state.authenticated);
        assert_eq!(state.role, Role::NonOwner);
        assert!(session.viewer_flag());
    }

    #[tokio::test]
    async fn real_assertion_clears_viewer_flag() {
        let mut provider = MockIdentityProvider::new();
        provider
            .expect_refresh_claims()
            .returning(|_| Ok(IdentityAssertion::new("someone-else")));

        let (session, _) = session(provider);
        session.enter_viewer_mode();
        session
            .handle_assertion_change(Some(IdentityAssertion::new("someone-else")))
            .await;
        assert!(!session.viewer_flag());
    }

    #[tokio::test]
    async fn losing_assertion_clears_viewer_flag() {
        let mut provider = MockIdentityProvider::new();
        provider
            .expect_refresh_claims()
            .returning(|_| Ok(IdentityAssertion::new(OWNER)));

        let (session, cache) = session(provider);
        session
            .handle_assertion_change(Some(IdentityAssertion::new(OWNER)))
            .await;
        cache.set_item(VIEWER_SESSION_KEY, "active").unwrap();

        let state = session.handle_assertion_change(None).await;
        assert_eq!(state, RoleState::settled(AuthState::signed_out()));
        assert!(!session.viewer_flag());
    }

    #[tokio::test]
    async fn denied_verification_signs_provider_out() {
        let mut provider = MockIdentityProvider::new();
        provider
            .expect_sign_in()
            .returning(|| Ok(IdentityAssertion::new(OWNER)));
        provider.expect_sign_out().times(1).returning(|| Ok(()));
        provider
            .expect_refresh_claims()
            .returning(|_| Ok(IdentityAssertion::new(OWNER)));

        let mut verifier = MockClaimsVerifier::new();
        verifier
            .expect_verify()
            .returning(|_| Ok(Verification::Denied("not allowed".into())));

        let (session, _) = session(provider);
        let session = session.with_verifier(Arc::new(verifier));

        let err = session.sign_in().await.unwrap_err();
        assert!(err.is_denial());
        assert_eq!(session.role().role, Role::NonOwner);
        assert!(!session.role().authenticated);
    }

    #[tokio::test]
    async fn restored_session_is_verified_before_owner() {
        let mut provider = MockIdentityProvider::new();
        provider
            .expect_refresh_claims()
            .returning(|_| Ok(IdentityAssertion::new(OWNER)));
        provider.expect_sign_out().times(1).returning(|| Ok(()));

        let mut verifier = MockClaimsVerifier::new();
        verifier
            .expect_verify()
            .times(1)
            .returning(|_| Ok(Verification::Denied("revoked".into())));

        let (session, _) = session(provider);
        let session = session.with_verifier(Arc::new(verifier));
        let state = session
            .handle_assertion_change(Some(IdentityAssertion::new(OWNER)))
            .await;
        assert_eq!(state, RoleState::settled(AuthState::signed_out()));
    }

    #[tokio::test]
    async fn accepted_sign_in_resolves_owner() {
        let mut provider = MockIdentityProvider::new();
        provider
            .expect_sign_in()
            .returning(|| Ok(IdentityAssertion::new(OWNER)));
        provider
            .expect_refresh_claims()
            .returning(|_| Ok(IdentityAssertion::new(OWNER)));

        let mut verifier = MockClaimsVerifier::new();
        verifier
            .expect_verify()
            .returning(|_| Ok(Verification::Accepted));

        let (session, _) = session(provider);
        let session = session.with_verifier(Arc::new(verifier));
        let state = session.sign_in().await.unwrap();
        assert_eq!(state.role, Role::Owner);
    }

    #[tokio::test]
    async fn cancelled_sign_in_reports_error() {
        let mut provider = MockIdentityProvider::new();
        provider
            .expect_sign_in()
            .returning(|| Err(IdentityError::Cancelled));

        let (session, _) = session(provider);
        let err = session.sign_in().await.unwrap_err();
        assert!(matches!(err, AuthError::Identity(IdentityError::Cancelled)));
        assert!(!session.role().loading);
    }

    #[tokio::test]
    async fn sign_out_clears_everything_even_on_provider_error() {
        let mut provider = MockIdentityProvider::new();
        provider
            .expect_refresh_claims()
            .returning(|_| Ok(IdentityAssertion::new(OWNER)));
        provider
            .expect_sign_out()
            .returning(|| Err(IdentityError::Network("offline".into())));

        let (session, _) = session(provider);
        session
            .handle_assertion_change(Some(IdentityAssertion::new(OWNER)))
            .await;
        session.enter_viewer_mode();

        assert!(session.sign_out().await.is_err());
        assert_eq!(session.role(), RoleState::settled(AuthState::signed_out()));
        assert!(!session.viewer_flag());
    }

    #[tokio::test]
    async fn revalidate_refreshes_stale_claims() {
        let mut provider = MockIdentityProvider::new();
        let mut calls = 0;
        provider.expect_refresh_claims().returning(move |_| {
            calls += 1;
            if calls == 1 {
                Ok(IdentityAssertion::new(OWNER)
                    .issued_at(Utc::now() - chrono::Duration::seconds(3600)))
            } else {
                Err(IdentityError::NoSession)
            }
        });

        let (session, _) = session(provider);
        // Stale on arrival: resolver treats it as absent
        let first = session
            .handle_assertion_change(Some(IdentityAssertion::new(OWNER)))
            .await;
        assert_eq!(first.role, Role::NonOwner);

        let second = session.revalidate().await;
        assert_eq!(second, RoleState::settled(AuthState::signed_out()));
    }

    #[tokio::test]
    async fn watchers_see_updates() {
        let mut provider = MockIdentityProvider::new();
        provider
            .expect_refresh_claims()
            .returning(|_| Ok(IdentityAssertion::new(OWNER)));

        let (session, _) = session(provider);
        let mut rx = session.watch();
        session
            .handle_assertion_change(Some(IdentityAssertion::new(OWNER)))
            .await;
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().role, Role::Owner);
    }
}
