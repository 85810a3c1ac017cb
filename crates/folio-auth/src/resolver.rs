//! Authorization resolver
//!
//! The single owner rule: the assertion must be fresh, and its subject id
//! must equal the allow-listed owner id, or its email must be verified and
//! equal the allow-listed email. Everything else is [`Role::NonOwner`].

use crate::assertion::IdentityAssertion;
use crate::role::{AuthState, Role};
use chrono::{DateTime, Duration, Utc};

/// Default recency window for trusting claims
pub const DEFAULT_CLAIMS_MAX_AGE: std::time::Duration = std::time::Duration::from_secs(300);

/// Static allow-list naming the one owner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowList {
    owner_subject_id: String,
    owner_email: Option<String>,
}

impl AllowList {
    /// Allow-list with an owner subject id
    #[inline]
    #[must_use]
    pub fn new(owner_subject_id: impl Into<String>) -> Self {
        Self {
            owner_subject_id: owner_subject_id.into(),
            owner_email: None,
        }
    }

    /// Also admit a verified email
    #[inline]
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.owner_email = Some(email.into().trim().to_string());
        self
    }

    /// Owner subject id
    #[inline]
    #[must_use]
    pub fn owner_subject_id(&self) -> &str {
        &self.owner_subject_id
    }

    /// Allow-listed email, if any
    #[inline]
    #[must_use]
    pub fn owner_email(&self) -> Option<&str> {
        self.owner_email.as_deref()
    }

    /// Check whether the assertion names the owner
    ///
    /// Subject id must match exactly; email matches ASCII case-insensitively
    /// and only when the provider verified it.
    #[must_use]
    pub fn admits(&self, assertion: &IdentityAssertion) -> bool {
        if !self.owner_subject_id.is_empty() && assertion.subject_id == self.owner_subject_id {
            return true;
        }

        match (&self.owner_email, &assertion.email) {
            (Some(allowed), Some(email)) if assertion.email_verified => {
                !allowed.is_empty() && email.trim().eq_ignore_ascii_case(allowed)
            }
            _ => false,
        }
    }
}

/// Derives [`AuthState`] from an assertion
#[derive(Debug, Clone)]
pub struct AuthorizationResolver {
    allow_list: AllowList,
    claims_max_age: Duration,
    viewer_is_authenticated: bool,
}

impl AuthorizationResolver {
    /// Resolver with default recency window and viewer flag off
    #[must_use]
    pub fn new(allow_list: AllowList) -> Self {
        Self {
            allow_list,
            claims_max_age: Duration::zero(),
            viewer_is_authenticated: false,
        }
        .with_claims_max_age(DEFAULT_CLAIMS_MAX_AGE)
    }

    /// With recency window
    #[must_use]
    pub fn with_claims_max_age(mut self, max_age: std::time::Duration) -> Self {
        self.claims_max_age = Duration::from_std(max_age).unwrap_or(Duration::MAX);
        self
    }

    /// With the UX constant reported as `authenticated` in viewer mode
    #[inline]
    #[must_use]
    pub fn with_viewer_authenticated(mut self, authenticated: bool) -> Self {
        self.viewer_is_authenticated = authenticated;
        self
    }

    /// Configured allow-list
    #[inline]
    #[must_use]
    pub fn allow_list(&self) -> &AllowList {
        &self.allow_list
    }

    /// Check whether claims are inside the recency window
    #[inline]
    #[must_use]
    pub fn is_fresh(&self, assertion: &IdentityAssertion, now: DateTime<Utc>) -> bool {
        assertion.age(now) <= self.claims_max_age
    }

    /// Resolve role for an assertion (or its absence)
    ///
    /// Stale claims count as absent. Absent always yields a signed-out,
    /// non-owner state.
    #[must_use]
    pub fn resolve_role(
        &self,
        assertion: Option<&IdentityAssertion>,
        now: DateTime<Utc>,
    ) -> AuthState {
        let Some(assertion) = assertion else {
            return AuthState::signed_out();
        };

        if !self.is_fresh(assertion, now) {
            tracing::debug!(
                age_secs = assertion.age(now).num_seconds(),
                "claims outside recency window, treating as signed out"
            );
            return AuthState::signed_out();
        }

        let role = if self.allow_list.admits(assertion) {
            Role::Owner
        } else {
            Role::NonOwner
        };

        AuthState {
            role,
            authenticated: true,
        }
    }

    /// Resolve role, honouring the viewer UX flag when no assertion exists
    ///
    /// The flag only ever affects `authenticated`; the role stays
    /// [`Role::NonOwner`].
    #[must_use]
    pub fn resolve_with_viewer(
        &self,
        assertion: Option<&IdentityAssertion>,
        viewer_flag: bool,
        now: DateTime<Utc>,
    ) -> AuthState {
        match assertion {
            Some(_) => self.resolve_role(assertion, now),
            None if viewer_flag => AuthState {
                role: Role::NonOwner,
                authenticated: self.viewer_is_authenticated,
            },
            None => AuthState::signed_out(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const OWNER: &str = "U1-owner-subject";

    fn resolver() -> AuthorizationResolver {
        AuthorizationResolver::new(AllowList::new(OWNER).with_email("owner@example.com"))
            .with_viewer_authenticated(true)
    }

    #[test]
    fn subject_match_is_owner() {
        let a = IdentityAssertion::new(OWNER).with_email("whatever@example.com", true);
        let state = resolver().resolve_role(Some(&a), Utc::now());
        assert_eq!(
            state,
            AuthState {
                role: Role::Owner,
                authenticated: true
            }
        );
    }

    #[test]
    fn unverified_email_match_is_not_owner() {
        let a = IdentityAssertion::new("U2").with_email("owner@example.com", false);
        let state = resolver().resolve_role(Some(&a), Utc::now());
        assert_eq!(state.role, Role::NonOwner);
        assert!(state.authenticated);
    }

    #[test]
    fn verified_email_match_is_owner_case_insensitive() {
        let a = IdentityAssertion::new("U2").with_email("Owner@Example.com", true);
        assert_eq!(resolver().resolve_role(Some(&a), Utc::now()).role, Role::Owner);
    }

    #[test]
    fn absent_assertion_is_signed_out_regardless_of_viewer_flag() {
        let r = resolver();
        assert_eq!(r.resolve_role(None, Utc::now()), AuthState::signed_out());

        let viewer = r.resolve_with_viewer(None, true, Utc::now());
        assert_eq!(viewer.role, Role::NonOwner);
        assert!(viewer.authenticated);

        assert_eq!(
            r.resolve_with_viewer(None, false, Utc::now()),
            AuthState::signed_out()
        );
    }

    #[test]
    fn viewer_flag_ignored_with_real_assertion() {
        let a = IdentityAssertion::new("stranger");
        let state = resolver().resolve_with_viewer(Some(&a), true, Utc::now());
        assert_eq!(state.role, Role::NonOwner);
        assert!(state.authenticated);
    }

    #[test]
    fn stale_claims_fail_closed() {
        let now = Utc::now();
        let a = IdentityAssertion::new(OWNER).issued_at(now - Duration::seconds(301));
        assert_eq!(resolver().resolve_role(Some(&a), now), AuthState::signed_out());

        let short = resolver().with_claims_max_age(std::time::Duration::from_secs(10));
        let a = IdentityAssertion::new(OWNER).issued_at(now - Duration::seconds(5));
        assert_eq!(short.resolve_role(Some(&a), now).role, Role::Owner);
    }

    #[test]
    fn empty_allow_list_entries_never_match() {
        let r = AuthorizationResolver::new(AllowList::new("").with_email(""));
        let a = IdentityAssertion::new("").with_email("", true);
        assert_eq!(r.resolve_role(Some(&a), Utc::now()).role, Role::NonOwner);
    }

    proptest! {
        #[test]
        fn non_matching_identities_are_never_owner(
            subject in "[a-zA-Z0-9]{1,24}",
            local in "[a-z]{1,12}",
            verified in any::<bool>(),
            viewer_flag in any::<bool>(),
        ) {
            prop_assume!(subject != OWNER);
            prop_assume!(local != "owner");
            let a = IdentityAssertion::new(subject).with_email(format!("{local}@example.com"), verified);
            let state = resolver().resolve_with_viewer(Some(&a), viewer_flag, Utc::now());
            prop_assert_eq!(state.role, Role::NonOwner);
        }
    }
}
