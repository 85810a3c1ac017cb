//! Error types for folio sync
//!
//! Startup problems are [`ConfigError`] and are fatal. Everything that can
//! go wrong once a session is running is folded into [`SyncError`] and is
//! recovered from by failing closed.

use folio_auth::AuthError;
use folio_content::{PathError, ValidationError};
use folio_store::{CacheError, StoreError};

/// Invalid or missing configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Required variable not set
    #[error("{0} is not set")]
    Missing(&'static str),

    /// Owner id still holds a template value
    #[error("{0} still holds a placeholder value")]
    Placeholder(&'static str),

    /// Value present but unusable
    #[error("{var} is invalid: {reason}")]
    Invalid {
        /// Variable name
        var: &'static str,
        /// What is wrong with it
        reason: String,
    },

    /// Document path is malformed
    #[error("FOLIO_DOCUMENT_PATH is invalid: {0}")]
    DocumentPath(#[from] PathError),

    /// Production build pointed at a plain-HTTP backend
    #[error("FOLIO_BACKEND_URL must use HTTPS in production")]
    InsecureBackend,
}

impl ConfigError {
    /// Variable the error is about
    #[must_use]
    pub fn variable(&self) -> &'static str {
        match self {
            Self::Missing(var) | Self::Placeholder(var) | Self::Invalid { var, .. } => var,
            Self::DocumentPath(_) => "FOLIO_DOCUMENT_PATH",
            Self::InsecureBackend => "FOLIO_BACKEND_URL",
        }
    }
}

/// Runtime sync failures
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Configuration rejected
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Identity or verification failure
    #[error("auth error: {0}")]
    Auth(#[from] AuthError),

    /// Remote store failure
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Content rejected before leaving the client
    #[error("invalid content: {0}")]
    Validation(#[from] ValidationError),

    /// Local replica could not be persisted
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    /// Operation needs the owner role
    #[error("operation requires the owner role")]
    NotOwner,

    /// Session used before `init()` or after `dispose()`
    #[error("session is not running")]
    NotRunning,
}

impl SyncError {
    /// Check if a later attempt could succeed
    #[inline]
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Store(e) if e.is_transient())
    }

    /// Check if the caller lacked the owner role
    #[inline]
    #[must_use]
    pub fn is_denial(&self) -> bool {
        match self {
            Self::NotOwner => true,
            Self::Auth(e) => e.is_denial(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        assert!(SyncError::from(StoreError::Unavailable("offline".into())).is_transient());
        assert!(!SyncError::from(StoreError::PermissionDenied("rules".into())).is_transient());
        assert!(SyncError::NotOwner.is_denial());
        assert!(SyncError::from(AuthError::AccessDenied("nope".into())).is_denial());
        assert!(!SyncError::NotRunning.is_denial());
    }

    #[test]
    fn config_error_names_variable() {
        assert_eq!(ConfigError::Missing("FOLIO_OWNER_UID").variable(), "FOLIO_OWNER_UID");
        assert_eq!(ConfigError::InsecureBackend.variable(), "FOLIO_BACKEND_URL");
        assert_eq!(
            ConfigError::InsecureBackend.to_string(),
            "FOLIO_BACKEND_URL must use HTTPS in production"
        );
    }
}
