//! Log redaction
//!
//! Remote and provider error messages can echo request details back. Run
//! them through [`redact`] before they reach a log line.

use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;

static BEARER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bbearer\s+[A-Za-z0-9\-._~+/]+=*").expect("bearer pattern is valid")
});

static JWT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\beyJ[A-Za-z0-9_-]+\.[A-Za-z0-9_-]+\.[A-Za-z0-9_-]*").expect("jwt pattern is valid")
});

static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").expect("email pattern is valid")
});

static SSN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").expect("ssn pattern is valid"));

/// Scrub credentials and personal data from free text
///
/// Borrows the input when nothing matched.
#[must_use]
pub fn redact(text: &str) -> Cow<'_, str> {
    let mut out = Cow::Borrowed(text);
    for (pattern, replacement) in [
        (&*BEARER, "Bearer [REDACTED]"),
        (&*JWT, "[REDACTED_TOKEN]"),
        (&*EMAIL, "[REDACTED_EMAIL]"),
        (&*SSN, "[REDACTED]"),
    ] {
        if let Cow::Owned(replaced) = pattern.replace_all(&out, replacement) {
            out = Cow::Owned(replaced);
        }
    }
    out
}

/// Show only the first few characters of an identifier
#[must_use]
pub fn mask(value: &str) -> String {
    let visible: String = value.chars().take(4).collect();
    if visible.len() == value.len() {
        "*".repeat(value.chars().count())
    } else {
        format!("{visible}***")
    }
}
