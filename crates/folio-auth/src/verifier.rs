//! Backend claims verification
//!
//! An optional sign-in gate: after the provider signs someone in, the ID
//! token is posted to a backend that decides whether this identity may use
//! the application at all. It never grants [`crate::Role::Owner`]; that is
//! the resolver's decision alone.

use crate::assertion::IdentityAssertion;
use crate::error::AuthError;
use async_trait::async_trait;
use reqwest::Url;
use serde::{Deserialize, Serialize};

/// Verification path relative to the backend base URL
pub const VERIFY_PATH: &str = "api/auth/verify";

/// Backend decision
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    /// Identity may proceed
    Accepted,
    /// Identity refused, with the backend's reason
    Denied(String),
}

/// Verifies a freshly signed-in identity
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ClaimsVerifier: Send + Sync {
    /// Ask the backend about this assertion
    ///
    /// # Errors
    /// Returns error if the backend could not give an answer
    async fn verify(&self, assertion: &IdentityAssertion) -> Result<Verification, AuthError>;
}

#[derive(Serialize)]
struct VerifyRequest<'a> {
    #[serde(rename = "idToken")]
    id_token: &'a str,
}

#[derive(Debug, Deserialize)]
struct VerifyResponse {
    success: bool,
    #[serde(default)]
    error: Option<String>,
}

impl From<VerifyResponse> for Verification {
    fn from(resp: VerifyResponse) -> Self {
        if resp.success {
            Verification::Accepted
        } else {
            Verification::Denied(resp.error.unwrap_or_else(|| {
                "access restricted to authorized users".to_string()
            }))
        }
    }
}

/// HTTP verifier posting `{"idToken": ...}` to `<base>/api/auth/verify`
#[derive(Debug, Clone)]
pub struct HttpClaimsVerifier {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpClaimsVerifier {
    /// Create verifier for a backend base URL
    ///
    /// # Errors
    /// Returns error if the endpoint URL cannot be formed
    pub fn new(base: &Url) -> Result<Self, AuthError> {
        let mut base = base.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let endpoint = base
            .join(VERIFY_PATH)
            .map_err(|e| AuthError::InvalidEndpoint(e.to_string()))?;

        Ok(Self {
            client: reqwest::Client::new(),
            endpoint,
        })
    }

    /// Full verification URL
    #[inline]
    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl ClaimsVerifier for HttpClaimsVerifier {
    async fn verify(&self, assertion: &IdentityAssertion) -> Result<Verification, AuthError> {
        let body = VerifyRequest {
            id_token: assertion.raw_credential.expose(),
        };

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&body)
            .send()
            .await
            .map_err(|e| AuthError::Verification(e.without_url().to_string()))?;

        let status = response.status();
        let decoded: VerifyResponse = response
            .json()
            .await
            .map_err(|e| AuthError::Verification(format!("status {status}: {}", e.without_url())))?;

        tracing::debug!(%status, success = decoded.success, "backend verification answered");
        Ok(decoded.into())
    }
}
