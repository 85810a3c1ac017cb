//! Content shape validation
//!
//! Every proposed field value passes through [`ContentValidator`] before it
//! touches local or remote state. A rejection carries a message suitable for
//! showing inline at the edited field.

use crate::document::LAST_UPDATED_FIELD;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static SCRIPT_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<\s*script").expect("valid script-tag pattern"));

static SCRIPT_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*javascript\s*:").expect("valid script-url pattern"));

static HTTP_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^https?://\S*$").expect("valid http-url pattern"));

/// Object keys whose string values must be links
const LINK_KEYS: &[&str] = &["link", "github", "url"];

/// Top-level key suffixes whose string values must be links
const LINK_SUFFIXES: &[&str] = &["_link", "_github", "_url"];

/// Size limits for field keys and values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationLimits {
    /// Maximum key length in bytes
    pub max_key_len: usize,
    /// Maximum length of any string value in characters
    pub max_text_len: usize,
    /// Maximum nesting of arrays/objects
    pub max_depth: usize,
}

impl Default for ValidationLimits {
    fn default() -> Self {
        Self {
            max_key_len: 256,
            max_text_len: 5000,
            max_depth: 16,
        }
    }
}

/// Validation failure for a proposed field write
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Key is empty
    #[error("field key cannot be empty")]
    EmptyKey,

    /// Key exceeds the byte limit
    #[error("field key too long (max {max} bytes)")]
    KeyTooLong { max: usize },

    /// Key is reserved for the revision clock
    #[error("field key `{0}` is reserved")]
    ReservedKey(String),

    /// Top-level text is blank
    #[error("content cannot be empty")]
    EmptyContent,

    /// Some string exceeds the length limit
    #[error("content too long at {location} (max {max} characters)")]
    TooLong { location: String, max: usize },

    /// Script markup or script URL
    #[error("script content is not allowed at {location}")]
    ForbiddenMarkup { location: String },

    /// Link position holding a non-HTTP(S) value
    #[error("only HTTP/HTTPS URLs are allowed at {location}")]
    InvalidUrl { location: String },

    /// Value nests deeper than allowed
    #[error("content nested too deeply (max depth {max})")]
    TooDeep { max: usize },
}

impl ValidationError {
    /// Path within the value where the problem was found, if specific
    #[must_use]
    pub fn location(&self) -> Option<&str> {
        match self {
            Self::TooLong { location, .. }
            | Self::ForbiddenMarkup { location }
            | Self::InvalidUrl { location } => Some(location),
            _ => None,
        }
    }
}

/// Field value validator
#[derive(Debug, Clone, Default)]
pub struct ContentValidator {
    limits: ValidationLimits,
}

impl ContentValidator {
    /// Create validator with custom limits
    #[inline]
    #[must_use]
    pub fn new(limits: ValidationLimits) -> Self {
        Self { limits }
    }

    /// Configured limits
    #[inline]
    #[must_use]
    pub fn limits(&self) -> &ValidationLimits {
        &self.limits
    }

    /// Validate a proposed write of `value` at `key`
    ///
    /// # Errors
    /// Returns the first violation found, scanning depth-first.
    pub fn validate(&self, key: &str, value: &Value) -> Result<(), ValidationError> {
        self.validate_key(key)?;

        if let Value::String(s) = value {
            if s.trim().is_empty() {
                return Err(ValidationError::EmptyContent);
            }
        }

        let top_is_link = LINK_SUFFIXES.iter().any(|suffix| key.ends_with(suffix));
        self.validate_value(value, key, top_is_link, 0)
    }

    fn validate_key(&self, key: &str) -> Result<(), ValidationError> {
        if key.trim().is_empty() {
            return Err(ValidationError::EmptyKey);
        }
        if key.len() > self.limits.max_key_len {
            return Err(ValidationError::KeyTooLong {
                max: self.limits.max_key_len,
            });
        }
        if key == LAST_UPDATED_FIELD {
            return Err(ValidationError::ReservedKey(key.to_string()));
        }
        Ok(())
    }

    fn validate_value(
        &self,
        value: &Value,
        location: &str,
        is_link: bool,
        depth: usize,
    ) -> Result<(), ValidationError> {
        if depth > self.limits.max_depth {
            return Err(ValidationError::TooDeep {
                max: self.limits.max_depth,
            });
        }

        match value {
            Value::String(s) => self.validate_text(s, location, is_link),
            Value::Array(items) => items.iter().enumerate().try_for_each(|(i, item)| {
                self.validate_value(item, &format!("{location}[{i}]"), false, depth + 1)
            }),
            Value::Object(map) => map.iter().try_for_each(|(k, v)| {
                let link = LINK_KEYS.contains(&k.as_str());
                self.validate_value(v, &format!("{location}.{k}"), link, depth + 1)
            }),
            Value::Null | Value::Bool(_) | Value::Number(_) => Ok(()),
        }
    }

    fn validate_text(&self, s: &str, location: &str, is_link: bool) -> Result<(), ValidationError> {
        if s.chars().count() > self.limits.max_text_len {
            return Err(ValidationError::TooLong {
                location: location.to_string(),
                max: self.limits.max_text_len,
            });
        }
        if SCRIPT_TAG.is_match(s) || SCRIPT_URL.is_match(s) {
            return Err(ValidationError::ForbiddenMarkup {
                location: location.to_string(),
            });
        }
        if is_link && !HTTP_URL.is_match(s.trim()) {
            return Err(ValidationError::InvalidUrl {
                location: location.to_string(),
            });
        }
        Ok(())
    }
}
