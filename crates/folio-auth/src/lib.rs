//! Folio Authorization
//!
//! Decides who may edit. There are exactly two roles: the single allow-listed
//! [`Role::Owner`] and everyone else. The decision is made in one place,
//! [`AuthorizationResolver`], and everything downstream consults its output
//! (or the [`WriteCapability`] derived from it) instead of re-deriving
//! ownership.
//!
//! # Example
//!
//! ```rust,ignore
//! use folio_auth::{AllowList, AuthorizationResolver, IdentityAssertion};
//!
//! let resolver = AuthorizationResolver::new(AllowList::new("owner-uid-0001"));
//! let assertion = IdentityAssertion::new("owner-uid-0001");
//! let state = resolver.resolve_role(Some(&assertion), chrono::Utc::now());
//! assert!(state.role.is_owner());
//! ```

#![warn(unreachable_pub)]

mod assertion;
mod error;
mod provider;
mod resolver;
mod role;
mod session;
mod verifier;

pub use assertion::{Credential, IdentityAssertion};
pub use error::{AuthError, IdentityError};
pub use provider::{AssertionListener, IdentityProvider};
pub use resolver::{AllowList, AuthorizationResolver, DEFAULT_CLAIMS_MAX_AGE};
pub use role::{AuthState, Role, RoleState, WriteCapability};
pub use session::{AuthSession, VIEWER_SESSION_KEY};
pub use verifier::{ClaimsVerifier, HttpClaimsVerifier, Verification, VERIFY_PATH};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
