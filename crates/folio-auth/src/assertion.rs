//! Identity assertions produced by the identity provider

use chrono::{DateTime, Duration, Utc};
use std::fmt;

/// Opaque signed credential (ID token)
///
/// Never printed: `Debug` is redacted so assertions can be logged safely.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Credential(String);

impl Credential {
    /// Wrap raw token text
    #[inline]
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Raw token text, for sending to a verifier
    #[inline]
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Check if no credential was supplied
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential([REDACTED])")
    }
}

/// Signed identity claims for the current session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityAssertion {
    /// Stable provider subject id
    pub subject_id: String,
    /// Email claim, if the provider supplied one
    pub email: Option<String>,
    /// Whether the provider verified the email
    pub email_verified: bool,
    /// Signed credential backing the claims
    pub raw_credential: Credential,
    /// When the claims were obtained or last refreshed
    pub issued_at: DateTime<Utc>,
}

impl IdentityAssertion {
    /// Assertion for `subject_id` issued now, without email
    #[must_use]
    pub fn new(subject_id: impl Into<String>) -> Self {
        Self {
            subject_id: subject_id.into(),
            email: None,
            email_verified: false,
            raw_credential: Credential::default(),
            issued_at: Utc::now(),
        }
    }

    /// With email claim
    #[inline]
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>, verified: bool) -> Self {
        self.email = Some(email.into());
        self.email_verified = verified;
        self
    }

    /// With signed credential
    #[inline]
    #[must_use]
    pub fn with_credential(mut self, credential: Credential) -> Self {
        self.raw_credential = credential;
        self
    }

    /// With explicit issue time
    #[inline]
    #[must_use]
    pub fn issued_at(mut self, at: DateTime<Utc>) -> Self {
        self.issued_at = at;
        self
    }

    /// Age of the claims at `now`
    #[inline]
    #[must_use]
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now.signed_duration_since(self.issued_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_is_redacted_in_debug() {
        let assertion = IdentityAssertion::new("uid-1234567890")
            .with_credential(Credential::new("eyJhbGciOi.secret.sig"));
        let printed = format!("{assertion:?}");
        assert!(!printed.contains("secret"));
        assert!(printed.contains("[REDACTED]"));
        assert_eq!(assertion.raw_credential.expose(), "eyJhbGciOi.secret.sig");
    }

    #[test]
    fn age_measures_from_issue() {
        let issued = Utc::now() - Duration::seconds(90);
        let assertion = IdentityAssertion::new("uid").issued_at(issued);
        let age = assertion.age(issued + Duration::seconds(90));
        assert_eq!(age, Duration::seconds(90));
    }
}
