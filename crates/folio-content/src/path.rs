//! Remote document addressing
//!
//! Provides [`DocumentPath`] for naming the single content record in the
//! remote store (e.g. `portfolio/content`).

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Path of a document in the remote store
///
/// Alternating collection/document segments, so a valid path always has an
/// even, non-zero number of segments.
///
/// # Examples
/// - `portfolio/content` → collection `portfolio`, document `content`
/// - `sites/main/pages/home` → nested document
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocumentPath(Vec<String>);

impl DocumentPath {
    /// Create path from collection and document id
    ///
    /// # Errors
    /// Returns error if either segment is empty or contains `/`
    pub fn new(collection: &str, document: &str) -> Result<Self, PathError> {
        format!("{collection}/{document}").parse()
    }

    /// Get path segments
    #[inline]
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Collection containing the document
    #[inline]
    #[must_use]
    pub fn collection(&self) -> &str {
        &self.0[self.0.len() - 2]
    }

    /// Document id (last segment)
    #[inline]
    #[must_use]
    pub fn document_id(&self) -> &str {
        &self.0[self.0.len() - 1]
    }
}

impl Display for DocumentPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("/"))
    }
}

impl FromStr for DocumentPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_matches('/');
        if trimmed.is_empty() {
            return Err(PathError::Empty);
        }

        let segments: Vec<String> = trimmed.split('/').map(str::to_string).collect();
        if segments.iter().any(|seg| seg.trim().is_empty()) {
            return Err(PathError::EmptySegment(s.to_string()));
        }
        if segments.len() % 2 != 0 {
            return Err(PathError::NotADocument(s.to_string()));
        }

        Ok(Self(segments))
    }
}

impl TryFrom<String> for DocumentPath {
    type Error = PathError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DocumentPath> for String {
    fn from(path: DocumentPath) -> Self {
        path.to_string()
    }
}

/// Document path parse errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    /// No segments at all
    #[error("document path is empty")]
    Empty,

    /// `a//b` style path
    #[error("document path has an empty segment: {0}")]
    EmptySegment(String),

    /// Odd segment count points at a collection
    #[error("path names a collection, not a document: {0}")]
    NotADocument(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_collection_document() {
        let path: DocumentPath = "portfolio/content".parse().unwrap();
        assert_eq!(path.collection(), "portfolio");
        assert_eq!(path.document_id(), "content");
        assert_eq!(path.to_string(), "portfolio/content");
    }

    #[test]
    fn tolerates_surrounding_slashes() {
        let path: DocumentPath = "/portfolio/content/".parse().unwrap();
        assert_eq!(path.segments().len(), 2);
    }

    #[test]
    fn nested_document() {
        let path: DocumentPath = "sites/main/pages/home".parse().unwrap();
        assert_eq!(path.collection(), "pages");
        assert_eq!(path.document_id(), "home");
    }

    #[test]
    fn rejects_bad_paths() {
        assert_eq!("".parse::<DocumentPath>(), Err(PathError::Empty));
        assert!(matches!(
            "portfolio".parse::<DocumentPath>(),
            Err(PathError::NotADocument(_))
        ));
        assert!(matches!(
            "portfolio//content".parse::<DocumentPath>(),
            Err(PathError::EmptySegment(_))
        ));
    }

    #[test]
    fn new_joins_segments() {
        let path = DocumentPath::new("portfolio", "content").unwrap();
        assert_eq!(path, "portfolio/content".parse().unwrap());
        assert!(DocumentPath::new("a/b", "c").is_err());
    }

    #[test]
    fn serde_as_string() {
        let path: DocumentPath = "portfolio/content".parse().unwrap();
        let json = serde_json::to_string(&path).unwrap();
        assert_eq!(json, "\"portfolio/content\"");
        let back: DocumentPath = serde_json::from_str(&json).unwrap();
        assert_eq!(back, path);
    }
}
