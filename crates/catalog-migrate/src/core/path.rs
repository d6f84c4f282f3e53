//! Catalog path type.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordered sequence of name segments addressing a catalog entity.
///
/// Equality and prefix tests are segment-wise and case-sensitive.
/// Serialized as a plain JSON array of strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CatalogPath(Vec<String>);

impl CatalogPath {
    /// Create a path from its segments.
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    /// Split a dot-joined path (`a.b.c`). No quoting rules apply.
    pub fn from_dotted(dotted: &str) -> Self {
        Self::new(dotted.split('.'))
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Last segment, used as the display name of spaces and folders.
    pub fn name(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    /// All but the last segment. `None` for an empty path.
    pub fn parent(&self) -> Option<CatalogPath> {
        self.0.split_last().map(|(_, rest)| Self(rest.to_vec()))
    }

    /// Whether `prefix` matches the leading segments of this path.
    pub fn starts_with(&self, prefix: &CatalogPath) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// Segments beyond the first `n`.
    pub fn suffix_after(&self, n: usize) -> &[String] {
        self.0.get(n..).unwrap_or(&[])
    }

    /// First `n` segments (the whole path when it is shorter).
    pub fn truncated(&self, n: usize) -> CatalogPath {
        Self(self.0.iter().take(n).cloned().collect())
    }

    /// This path followed by `suffix`.
    pub fn concat(&self, suffix: &[String]) -> CatalogPath {
        let mut segments = self.0.clone();
        segments.extend_from_slice(suffix);
        Self(segments)
    }

    /// Segments joined with `.`, the form used in SQL text and logs.
    pub fn dotted(&self) -> String {
        self.0.join(".")
    }

    /// Segments joined with `/`, the form used by dependency records.
    pub fn slashed(&self) -> String {
        self.0.join("/")
    }

    /// Expand a single dot-joined segment (`["a.b"]`) into `["a", "b"]`.
    ///
    /// Rule files commonly spell paths that way; multi-segment paths are kept.
    pub fn expand_dotted(self) -> CatalogPath {
        match self.0.as_slice() {
            [single] if single.contains('.') => Self::from_dotted(single),
            _ => self,
        }
    }
}

impl fmt::Display for CatalogPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.dotted())
    }
}

impl<S: Into<String>> FromIterator<S> for CatalogPath {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self::new(iter)
    }
}

impl From<Vec<String>> for CatalogPath {
    fn from(segments: Vec<String>) -> Self {
        Self(segments)
    }
}

impl From<&[&str]> for CatalogPath {
    fn from(segments: &[&str]) -> Self {
        Self::new(segments.iter().copied())
    }
}
