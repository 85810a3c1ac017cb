//! Content document and revision clock
//!
//! The remote record is a flat JSON object: every content key sits next to
//! the reserved `lastUpdated` key. [`ContentDocument`] keeps the two apart so
//! the revision can never be clobbered by a content merge.

use chrono::{DateTime, Duration, SecondsFormat, SubsecRound, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

/// Wire name of the revision field
pub const LAST_UPDATED_FIELD: &str = "lastUpdated";

/// Raw field map as exchanged with the remote store
pub type FieldMap = BTreeMap<String, Value>;

/// Logical clock value stamped on every accepted write
///
/// Millisecond precision so that a revision survives a round trip through
/// its RFC 3339 wire form unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Revision(DateTime<Utc>);

impl Revision {
    /// Create revision at the given instant
    #[inline]
    #[must_use]
    pub fn new(at: DateTime<Utc>) -> Self {
        Self(at.trunc_subsecs(3))
    }

    /// Revision for the current wall-clock time
    #[inline]
    #[must_use]
    pub fn now() -> Self {
        Self::new(Utc::now())
    }

    /// Next revision strictly after `previous`
    ///
    /// Uses `now` unless the clock has not advanced past `previous`, in which
    /// case the previous revision is bumped by one millisecond.
    #[must_use]
    pub fn next_after(previous: Option<Revision>, now: DateTime<Utc>) -> Self {
        let candidate = Self::new(now);
        match previous {
            Some(prev) if prev >= candidate => Self(prev.0 + Duration::milliseconds(1)),
            _ => candidate,
        }
    }

    /// Underlying timestamp
    #[inline]
    #[must_use]
    pub fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }

    /// Wire representation (RFC 3339, millisecond precision)
    #[inline]
    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::String(self.to_string())
    }

    /// Parse a wire value
    ///
    /// Accepts RFC 3339 strings and integer epoch milliseconds (older
    /// clients stamped documents with a numeric clock).
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| Self::new(dt.with_timezone(&Utc))),
            Value::Number(n) => n
                .as_i64()
                .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
                .map(Self::new),
            _ => None,
        }
    }
}

impl Display for Revision {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.to_rfc3339_opts(SecondsFormat::Millis, true))
    }
}

/// Replica of the remote content record
///
/// Serializes to (and from) the flat wire object, with `lastUpdated` as a
/// sibling of the content keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "FieldMap", into = "FieldMap")]
pub struct ContentDocument {
    fields: FieldMap,
    last_updated: Option<Revision>,
}

impl ContentDocument {
    /// Empty document with no revision
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a raw wire object
    ///
    /// An unparsable `lastUpdated` is dropped rather than kept as content.
    #[must_use]
    pub fn from_fields(mut fields: FieldMap) -> Self {
        let last_updated = fields
            .remove(LAST_UPDATED_FIELD)
            .as_ref()
            .and_then(Revision::from_value);
        Self {
            fields,
            last_updated,
        }
    }

    /// Convert into the raw wire object
    #[must_use]
    pub fn into_fields(self) -> FieldMap {
        let mut fields = self.fields;
        if let Some(rev) = self.last_updated {
            fields.insert(LAST_UPDATED_FIELD.to_string(), rev.to_value());
        }
        fields
    }

    /// Get field value
    #[inline]
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// All content fields (revision excluded)
    #[inline]
    #[must_use]
    pub fn fields(&self) -> &FieldMap {
        &self.fields
    }

    /// Content keys in sorted order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Number of content fields
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check if document has no content fields
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Current revision, if any write has been observed
    #[inline]
    #[must_use]
    pub fn last_updated(&self) -> Option<Revision> {
        self.last_updated
    }

    /// Set a content field
    ///
    /// The reserved revision key is ignored; use [`Self::set_last_updated`].
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        if key != LAST_UPDATED_FIELD {
            self.fields.insert(key, value);
        }
    }

    /// Remove a content field
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.fields.remove(key)
    }

    /// Set revision
    #[inline]
    pub fn set_last_updated(&mut self, revision: Revision) {
        self.last_updated = Some(revision);
    }

    /// Advance revision, never moving it backwards
    pub fn observe_revision(&mut self, revision: Option<Revision>) {
        if revision > self.last_updated {
            self.last_updated = revision;
        }
    }

    /// Merge content fields from a raw wire object
    ///
    /// Unspecified keys are untouched and `lastUpdated` is skipped.
    /// Returns the keys whose value actually changed.
    pub fn merge_fields(&mut self, incoming: &FieldMap) -> Vec<String> {
        let mut changed = Vec::new();
        for (key, value) in incoming {
            if key == LAST_UPDATED_FIELD {
                continue;
            }
            if self.fields.get(key) != Some(value) {
                self.fields.insert(key.clone(), value.clone());
                changed.push(key.clone());
            }
        }
        changed
    }
}

impl From<FieldMap> for ContentDocument {
    fn from(fields: FieldMap) -> Self {
        Self::from_fields(fields)
    }
}

impl From<ContentDocument> for FieldMap {
    fn from(doc: ContentDocument) -> Self {
        doc.into_fields()
    }
}
