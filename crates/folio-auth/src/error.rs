//! Error types for folio authorization

/// Identity provider failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    /// User dismissed the sign-in flow
    #[error("sign-in cancelled")]
    Cancelled,

    /// No signed-in session to refresh or sign out
    #[error("no active session")]
    NoSession,

    /// Provider could not be reached
    #[error("network error: {0}")]
    Network(String),

    /// Provider returned an error
    #[error("provider error: {0}")]
    Provider(String),
}

/// Authorization flow errors
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Identity provider failed
    #[error("identity provider error: {0}")]
    Identity(#[from] IdentityError),

    /// Backend verification refused this identity
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// Backend verification could not be completed
    #[error("claims verification failed: {0}")]
    Verification(String),

    /// Verification endpoint is unusable
    #[error("invalid verification endpoint: {0}")]
    InvalidEndpoint(String),
}

impl AuthError {
    /// Check if the user was refused rather than the flow failing
    #[inline]
    #[must_use]
    pub fn is_denial(&self) -> bool {
        matches!(self, Self::AccessDenied(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_error_converts() {
        let err: AuthError = IdentityError::Cancelled.into();
        assert!(err.to_string().contains("sign-in cancelled"));
        assert!(!err.is_denial());
        assert!(AuthError::AccessDenied("not allow-listed".into()).is_denial());
    }
}
