//! Identity provider adapter
//!
//! Wraps an external federated sign-in service. The core only needs the
//! assertion it yields and a way to hear about session changes.

use crate::assertion::IdentityAssertion;
use crate::error::IdentityError;
use async_trait::async_trait;
use folio_store::Subscription;
use std::sync::Arc;

/// Callback for session changes (`None` when signed out)
pub type AssertionListener = Arc<dyn Fn(Option<IdentityAssertion>) + Send + Sync>;

/// External identity provider
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Run the interactive sign-in flow
    ///
    /// # Errors
    /// Returns error if the user cancels or the provider fails
    async fn sign_in(&self) -> Result<IdentityAssertion, IdentityError>;

    /// Re-fetch claims for the current session
    ///
    /// With `force`, bypasses any provider-side token cache.
    ///
    /// # Errors
    /// Returns error if there is no session or the refresh fails
    async fn refresh_claims(&self, force: bool) -> Result<IdentityAssertion, IdentityError>;

    /// End the provider session
    ///
    /// # Errors
    /// Returns error if the provider could not be reached
    async fn sign_out(&self) -> Result<(), IdentityError>;

    /// Observe session changes, including restores after reload
    fn on_assertion_change(&self, listener: AssertionListener) -> Subscription;
}
