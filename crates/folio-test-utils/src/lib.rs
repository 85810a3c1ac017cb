//! Testing utilities for the folio workspace
//!
//! Shared fakes and fixtures.

#![allow(missing_docs)]

use async_trait::async_trait;
use chrono::Utc;
use folio_auth::{AssertionListener, IdentityAssertion, IdentityError, IdentityProvider};
use folio_content::{DocumentPath, FieldMap, LAST_UPDATED_FIELD};
use folio_store::{ListenerSet, RemoteDocument, Subscription};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

type AssertionFn = dyn Fn(Option<IdentityAssertion>) + Send + Sync;

/// Scriptable identity provider
///
/// Like hosted providers, it reports the current session to every new
/// listener immediately.
#[derive(Default)]
pub struct FakeIdentityProvider {
    current: Mutex<Option<IdentityAssertion>>,
    next_sign_in: Mutex<Option<IdentityAssertion>>,
    fail_refresh: AtomicBool,
    refreshes: AtomicUsize,
    listeners: ListenerSet<AssertionFn>,
}

impl FakeIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provider with a restored session for `subject_id`
    pub fn signed_in(subject_id: &str) -> Self {
        let provider = Self::new();
        *provider.current.lock() = Some(IdentityAssertion::new(subject_id));
        provider
    }

    /// Identity returned by the next `sign_in()`; `None` cancels it
    pub fn script_sign_in(&self, assertion: Option<IdentityAssertion>) {
        *self.next_sign_in.lock() = assertion;
    }

    pub fn set_fail_refresh(&self, fail: bool) {
        self.fail_refresh.store(fail, Ordering::SeqCst);
    }

    /// Replace the session and notify, as a token restore would
    pub fn restore(&self, assertion: Option<IdentityAssertion>) {
        *self.current.lock() = assertion.clone();
        self.emit(assertion);
    }

    pub fn current(&self) -> Option<IdentityAssertion> {
        self.current.lock().clone()
    }

    pub fn refresh_count(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    fn emit(&self, assertion: Option<IdentityAssertion>) {
        for listener in self.listeners.snapshot() {
            listener(assertion.clone());
        }
    }
}

#[async_trait]
impl IdentityProvider for FakeIdentityProvider {
    async fn sign_in(&self) -> Result<IdentityAssertion, IdentityError> {
        let assertion = self
            .next_sign_in
            .lock()
            .take()
            .ok_or(IdentityError::Cancelled)?;
        self.restore(Some(assertion.clone()));
        Ok(assertion)
    }

    async fn refresh_claims(&self, _force: bool) -> Result<IdentityAssertion, IdentityError> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        if self.fail_refresh.load(Ordering::SeqCst) {
            return Err(IdentityError::Network("refresh failed".to_string()));
        }

        let mut current = self.current.lock();
        let assertion = current.as_mut().ok_or(IdentityError::NoSession)?;
        assertion.issued_at = Utc::now();
        Ok(assertion.clone())
    }

    async fn sign_out(&self) -> Result<(), IdentityError> {
        let had_session = self.current.lock().take().is_some();
        if had_session {
            self.emit(None);
        }
        Ok(())
    }

    fn on_assertion_change(&self, listener: AssertionListener) -> Subscription {
        let subscription = self.listeners.add(Arc::clone(&listener));
        listener(self.current());
        subscription
    }
}

pub fn document_path() -> DocumentPath {
    DocumentPath::new("portfolio", "content").expect("fixture path is valid")
}

/// Wire timestamp `seconds` past a fixed epoch
pub fn timestamp(seconds: u32) -> String {
    format!("2024-01-01T00:{:02}:{:02}.000Z", seconds / 60, seconds % 60)
}

/// Push carrying `fields` stamped at `timestamp(seconds)`
pub fn push_at(seconds: u32, fields: Value) -> RemoteDocument {
    let mut map: FieldMap = serde_json::from_value(fields).unwrap_or_default();
    map.insert(LAST_UPDATED_FIELD.to_string(), json!(timestamp(seconds)));
    RemoteDocument::existing(map)
}

/// Default content shaped like a small portfolio
pub fn sample_content() -> FieldMap {
    let value = json!({
        "editable_hero_title": "Systems engineer",
        "editable_hero_subtitle": "Storage, networking and developer tools",
        "editable_about_bio": "I build reliable infrastructure.",
        "projects": [
            {"title": "folio", "description": "Portfolio sync", "github": "https://github.com/example/folio"}
        ],
        "contact_email_link": "https://example.com/contact"
    });
    serde_json::from_value(value).unwrap_or_default()
}
