//! Folio Content Model
//!
//! The editable portfolio content as a single keyed document.
//!
//! # Core Concepts
//!
//! - [`ContentDocument`]: Field-key to JSON value mapping plus a `lastUpdated` revision
//! - [`Revision`]: Sortable logical clock carried by every accepted write
//! - [`DocumentPath`]: `collection/document` address of the remote record
//! - [`ContentValidator`]: Shape checks applied before a write leaves the client
//!
//! # Example
//!
//! ```rust,ignore
//! use folio_content::{ContentDocument, ContentValidator, Revision};
//! use serde_json::json;
//!
//! let validator = ContentValidator::default();
//! validator.validate("editable_hero_title", &json!("Systems engineer"))?;
//!
//! let mut doc = ContentDocument::new();
//! doc.set("editable_hero_title", json!("Systems engineer"));
//! doc.set_last_updated(Revision::now());
//! ```

#![warn(unreachable_pub)]

mod document;
mod path;
mod validation;

pub use document::{ContentDocument, FieldMap, Revision, LAST_UPDATED_FIELD};
pub use path::{DocumentPath, PathError};
pub use validation::{ContentValidator, ValidationError, ValidationLimits};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
