//! Session configuration
//!
//! Loaded once at startup from `FOLIO_*` environment variables and validated
//! fail-fast. A [`SyncConfig`] that exists has passed [`SyncConfig::validate`].

use crate::error::ConfigError;
use crate::logging::mask;
use folio_auth::{AllowList, AuthorizationResolver};
use folio_content::{ContentValidator, DocumentPath, ValidationLimits};
use reqwest::Url;
use std::time::Duration;

/// Owner subject id variable
pub const ENV_OWNER_UID: &str = "FOLIO_OWNER_UID";
/// Allow-listed email variable
pub const ENV_ALLOWED_EMAIL: &str = "FOLIO_ALLOWED_EMAIL";
/// Remote document path variable
pub const ENV_DOCUMENT_PATH: &str = "FOLIO_DOCUMENT_PATH";
/// Backend base URL variable
pub const ENV_BACKEND_URL: &str = "FOLIO_BACKEND_URL";
/// Production switch variable
pub const ENV_PRODUCTION: &str = "FOLIO_PRODUCTION";
/// Viewer UX constant variable
pub const ENV_VIEWER_IS_AUTHENTICATED: &str = "FOLIO_VIEWER_IS_AUTHENTICATED";
/// Claims recency window variable
pub const ENV_CLAIMS_MAX_AGE_SECS: &str = "FOLIO_CLAIMS_MAX_AGE_SECS";
/// Text length limit variable
pub const ENV_MAX_TEXT_LEN: &str = "FOLIO_MAX_TEXT_LEN";

const OWNER_UID_PLACEHOLDERS: [&str; 2] = ["YOUR_OWNER_UID_HERE", "YOUR_FIREBASE_USER_UID_HERE"];
const MIN_OWNER_UID_LEN: usize = 10;

/// Validated sync configuration
#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfig {
    /// Allow-listed owner subject id
    pub owner_subject_id: String,
    /// Allow-listed owner email (owner only when verified)
    pub allowed_email: Option<String>,
    /// Remote content document
    pub document_path: DocumentPath,
    /// Backend base URL for sign-in verification
    pub backend_url: Option<Url>,
    /// Production deployment
    pub production: bool,
    /// `authenticated` reported for viewer mode
    pub viewer_is_authenticated: bool,
    /// Recency window for trusting claims
    pub claims_max_age: Duration,
    /// Longest accepted string value, in characters
    pub max_text_len: usize,
}

impl SyncConfig {
    /// Minimal configuration for an owner and document
    ///
    /// # Errors
    /// Returns error if the owner id or path is rejected
    pub fn new(
        owner_subject_id: impl Into<String>,
        document_path: DocumentPath,
    ) -> Result<Self, ConfigError> {
        let config = Self {
            owner_subject_id: owner_subject_id.into(),
            allowed_email: None,
            document_path,
            backend_url: None,
            production: false,
            viewer_is_authenticated: false,
            claims_max_age: folio_auth::DEFAULT_CLAIMS_MAX_AGE,
            max_text_len: ValidationLimits::default().max_text_len,
        };
        config.validate()?;
        Ok(config)
    }

    /// Load from the process environment
    ///
    /// # Errors
    /// Returns the first problem found
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load using an arbitrary variable lookup
    ///
    /// # Errors
    /// Returns the first problem found
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| {
            lookup(var)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let owner_subject_id = get(ENV_OWNER_UID).ok_or(ConfigError::Missing(ENV_OWNER_UID))?;
        let document_path = get(ENV_DOCUMENT_PATH)
            .ok_or(ConfigError::Missing(ENV_DOCUMENT_PATH))?
            .parse::<DocumentPath>()?;

        let backend_url = get(ENV_BACKEND_URL)
            .map(|raw| {
                Url::parse(&raw).map_err(|e| ConfigError::Invalid {
                    var: ENV_BACKEND_URL,
                    reason: e.to_string(),
                })
            })
            .transpose()?;

        let config = Self {
            owner_subject_id,
            allowed_email: get(ENV_ALLOWED_EMAIL),
            document_path,
            backend_url,
            production: parse_bool(ENV_PRODUCTION, get(ENV_PRODUCTION))?,
            viewer_is_authenticated: parse_bool(
                ENV_VIEWER_IS_AUTHENTICATED,
                get(ENV_VIEWER_IS_AUTHENTICATED),
            )?,
            claims_max_age: get(ENV_CLAIMS_MAX_AGE_SECS)
                .map(|raw| parse_number(ENV_CLAIMS_MAX_AGE_SECS, &raw).map(Duration::from_secs))
                .transpose()?
                .unwrap_or(folio_auth::DEFAULT_CLAIMS_MAX_AGE),
            max_text_len: get(ENV_MAX_TEXT_LEN)
                .map(|raw| parse_number(ENV_MAX_TEXT_LEN, &raw).and_then(usize_from))
                .transpose()?
                .unwrap_or(ValidationLimits::default().max_text_len),
        };

        config.validate()?;
        Ok(config)
    }

    /// Check every field
    ///
    /// # Errors
    /// Returns the first problem found
    pub fn validate(&self) -> Result<(), ConfigError> {
        let uid = self.owner_subject_id.trim();
        if uid.is_empty() {
            return Err(ConfigError::Missing(ENV_OWNER_UID));
        }
        if OWNER_UID_PLACEHOLDERS.contains(&uid) {
            return Err(ConfigError::Placeholder(ENV_OWNER_UID));
        }
        if uid.chars().count() < MIN_OWNER_UID_LEN {
            return Err(ConfigError::Invalid {
                var: ENV_OWNER_UID,
                reason: format!("must be at least {MIN_OWNER_UID_LEN} characters"),
            });
        }

        if let Some(email) = &self.allowed_email {
            if !email.contains('@') {
                return Err(ConfigError::Invalid {
                    var: ENV_ALLOWED_EMAIL,
                    reason: "not an email address".to_string(),
                });
            }
        }

        if let Some(url) = &self.backend_url {
            match url.scheme() {
                "https" => {}
                "http" if !self.production => {}
                "http" => return Err(ConfigError::InsecureBackend),
                other => {
                    return Err(ConfigError::Invalid {
                        var: ENV_BACKEND_URL,
                        reason: format!("unsupported scheme {other}"),
                    })
                }
            }
        }

        if self.claims_max_age.is_zero() {
            return Err(ConfigError::Invalid {
                var: ENV_CLAIMS_MAX_AGE_SECS,
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.max_text_len == 0 {
            return Err(ConfigError::Invalid {
                var: ENV_MAX_TEXT_LEN,
                reason: "must be greater than zero".to_string(),
            });
        }

        Ok(())
    }

    /// With allow-listed email
    #[inline]
    #[must_use]
    pub fn with_allowed_email(mut self, email: impl Into<String>) -> Self {
        self.allowed_email = Some(email.into());
        self
    }

    /// With viewer UX constant
    #[inline]
    #[must_use]
    pub fn with_viewer_authenticated(mut self, authenticated: bool) -> Self {
        self.viewer_is_authenticated = authenticated;
        self
    }

    /// With claims recency window
    #[inline]
    #[must_use]
    pub fn with_claims_max_age(mut self, max_age: Duration) -> Self {
        self.claims_max_age = max_age;
        self
    }

    /// Resolver implementing this configuration's owner rule
    #[must_use]
    pub fn resolver(&self) -> AuthorizationResolver {
        let mut allow_list = AllowList::new(self.owner_subject_id.trim());
        if let Some(email) = &self.allowed_email {
            allow_list = allow_list.with_email(email.as_str());
        }
        AuthorizationResolver::new(allow_list)
            .with_claims_max_age(self.claims_max_age)
            .with_viewer_authenticated(self.viewer_is_authenticated)
    }

    /// Content validator with this configuration's limits
    #[must_use]
    pub fn validator(&self) -> ContentValidator {
        ContentValidator::new(ValidationLimits {
            max_text_len: self.max_text_len,
            ..ValidationLimits::default()
        })
    }

    /// Printable summary with identifiers masked
    #[must_use]
    pub fn redacted_summary(&self) -> Vec<(&'static str, String)> {
        vec![
            (ENV_OWNER_UID, mask(&self.owner_subject_id)),
            (
                ENV_ALLOWED_EMAIL,
                self.allowed_email
                    .as_deref()
                    .map_or_else(|| "(unset)".to_string(), mask),
            ),
            (ENV_DOCUMENT_PATH, self.document_path.to_string()),
            (
                ENV_BACKEND_URL,
                self.backend_url
                    .as_ref()
                    .map_or_else(|| "(unset)".to_string(), Url::to_string),
            ),
            (ENV_PRODUCTION, self.production.to_string()),
            (
                ENV_VIEWER_IS_AUTHENTICATED,
                self.viewer_is_authenticated.to_string(),
            ),
            (
                ENV_CLAIMS_MAX_AGE_SECS,
                self.claims_max_age.as_secs().to_string(),
            ),
            (ENV_MAX_TEXT_LEN, self.max_text_len.to_string()),
        ]
    }
}

fn parse_bool(var: &'static str, raw: Option<String>) -> Result<bool, ConfigError> {
    match raw.as_deref().map(str::to_ascii_lowercase).as_deref() {
        None => Ok(false),
        Some("1" | "true" | "yes" | "on") => Ok(true),
        Some("0" | "false" | "no" | "off") => Ok(false),
        Some(other) => Err(ConfigError::Invalid {
            var,
            reason: format!("expected a boolean, got {other:?}"),
        }),
    }
}

fn parse_number(var: &'static str, raw: &str) -> Result<u64, ConfigError> {
    raw.parse().map_err(|_| ConfigError::Invalid {
        var,
        reason: format!("expected a non-negative integer, got {raw:?}"),
    })
}

fn usize_from(n: u64) -> Result<usize, ConfigError> {
    usize::try_from(n).map_err(|_| ConfigError::Invalid {
        var: ENV_MAX_TEXT_LEN,
        reason: "value too large".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<SyncConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        SyncConfig::from_lookup(|var| map.get(var).cloned())
    }

    const BASE: [(&str, &str); 2] = [
        (ENV_OWNER_UID, "owner-uid-0001"),
        (ENV_DOCUMENT_PATH, "portfolio/content"),
    ];

    #[test]
    fn minimal_config_uses_defaults() {
        let config = load(&BASE).unwrap();
        assert_eq!(config.owner_subject_id, "owner-uid-0001");
        assert_eq!(config.document_path.to_string(), "portfolio/content");
        assert!(!config.production);
        assert!(!config.viewer_is_authenticated);
        assert_eq!(config.claims_max_age, Duration::from_secs(300));
        assert_eq!(config.max_text_len, 5000);
    }

    #[test]
    fn owner_uid_is_required_and_checked() {
        assert!(matches!(
            load(&[(ENV_DOCUMENT_PATH, "portfolio/content")]),
            Err(ConfigError::Missing(ENV_OWNER_UID))
        ));
        assert!(matches!(
            load(&[
                (ENV_OWNER_UID, "YOUR_OWNER_UID_HERE"),
                (ENV_DOCUMENT_PATH, "portfolio/content")
            ]),
            Err(ConfigError::Placeholder(_))
        ));
        assert!(matches!(
            load(&[(ENV_OWNER_UID, "short"), (ENV_DOCUMENT_PATH, "portfolio/content")]),
            Err(ConfigError::Invalid { var: ENV_OWNER_UID, .. })
        ));
    }

    #[test]
    fn document_path_must_name_a_document() {
        let err = load(&[(ENV_OWNER_UID, "owner-uid-0001"), (ENV_DOCUMENT_PATH, "portfolio")])
            .unwrap_err();
        assert!(matches!(err, ConfigError::DocumentPath(_)));
    }

    #[test]
    fn production_requires_https_backend() {
        let mut vars = BASE.to_vec();
        vars.push((ENV_BACKEND_URL, "http://localhost:8080"));
        assert!(load(&vars).is_ok());

        vars.push((ENV_PRODUCTION, "true"));
        assert!(matches!(load(&vars), Err(ConfigError::InsecureBackend)));

        let mut vars = BASE.to_vec();
        vars.push((ENV_BACKEND_URL, "https://api.example.com"));
        vars.push((ENV_PRODUCTION, "true"));
        assert!(load(&vars).unwrap().production);
    }

    #[test]
    fn malformed_values_are_rejected() {
        let mut vars = BASE.to_vec();
        vars.push((ENV_BACKEND_URL, "not a url"));
        assert!(matches!(load(&vars), Err(ConfigError::Invalid { var: ENV_BACKEND_URL, .. })));

        let mut vars = BASE.to_vec();
        vars.push((ENV_PRODUCTION, "maybe"));
        assert!(matches!(load(&vars), Err(ConfigError::Invalid { var: ENV_PRODUCTION, .. })));

        let mut vars = BASE.to_vec();
        vars.push((ENV_ALLOWED_EMAIL, "owner.example.com"));
        assert!(matches!(load(&vars), Err(ConfigError::Invalid { var: ENV_ALLOWED_EMAIL, .. })));

        let mut vars = BASE.to_vec();
        vars.push((ENV_CLAIMS_MAX_AGE_SECS, "0"));
        assert!(load(&vars).is_err());
    }

    #[test]
    fn resolver_follows_config() {
        let config = load(&BASE)
            .unwrap()
            .with_allowed_email("owner@example.com")
            .with_viewer_authenticated(true);
        let resolver = config.resolver();
        assert_eq!(resolver.allow_list().owner_subject_id(), "owner-uid-0001");
        assert_eq!(resolver.allow_list().owner_email(), Some("owner@example.com"));
    }

    #[test]
    fn summary_masks_identifiers() {
        let config = load(&BASE).unwrap().with_allowed_email("owner@example.com");
        let summary = config.redacted_summary();
        let uid = &summary.iter().find(|(k, _)| *k == ENV_OWNER_UID).unwrap().1;
        assert_eq!(uid, "owne***");
        let email = &summary.iter().find(|(k, _)| *k == ENV_ALLOWED_EMAIL).unwrap().1;
        assert!(!email.contains("example.com"));
    }
}
