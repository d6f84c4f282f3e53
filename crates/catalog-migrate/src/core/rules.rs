//! Rename rules and path rebuilding.
//!
//! A [`MigrationRule`] moves every path under `srcPath` to `dstPath`,
//! keeping the unmatched suffix. Rules are evaluated in the order given;
//! for one path evaluation the first matching rule wins. Callers are
//! expected to supply rules whose source paths do not overlap: with
//! overlapping sources the outcome depends on rule order.

use super::path::CatalogPath;
use serde::{Deserialize, Serialize};

/// A declared rename from a source path prefix to a destination prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationRule {
    pub src_path: CatalogPath,
    pub dst_path: CatalogPath,
}

impl MigrationRule {
    pub fn new(src_path: impl Into<CatalogPath>, dst_path: impl Into<CatalogPath>) -> Self {
        Self {
            src_path: src_path.into(),
            dst_path: dst_path.into(),
        }
    }

    /// True iff `srcPath` is a segment-wise prefix of `path`.
    pub fn matches(&self, path: &CatalogPath) -> bool {
        path.starts_with(&self.src_path)
    }

    /// True iff either path is a prefix of the other.
    ///
    /// Used for query-context scopes, which may be shorter than the source
    /// path they live under.
    pub fn matches_bounded(&self, path: &CatalogPath) -> bool {
        path.starts_with(&self.src_path) || self.src_path.starts_with(path)
    }

    /// `dstPath` followed by the part of `path` beyond `srcPath`.
    pub fn rebuild(&self, path: &CatalogPath) -> CatalogPath {
        self.dst_path.concat(path.suffix_after(self.src_path.len()))
    }

    /// Like [`rebuild`](Self::rebuild), but a path no longer than `srcPath`
    /// maps to the first `len(path)` segments of `dstPath`.
    pub fn rebuild_bounded(&self, path: &CatalogPath) -> CatalogPath {
        if self.src_path.len() >= path.len() {
            self.dst_path.truncated(path.len())
        } else {
            self.rebuild(path)
        }
    }

    /// Rewrite a slash-joined dependency string whose head matches the
    /// slash-joined `srcPath`, ignoring case. The match is textual: no
    /// segment boundary is required after the prefix.
    pub fn rebuild_slashed(&self, text: &str) -> Option<String> {
        let src = self.src_path.slashed();
        let rest = strip_prefix_ignore_case(text, &src)?;
        Some(format!("{}{}", self.dst_path.slashed(), rest))
    }
}

fn strip_prefix_ignore_case<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let head = text.get(..prefix.len())?;
    if head.to_lowercase() == prefix.to_lowercase() {
        text.get(prefix.len()..)
    } else {
        None
    }
}

/// Ordered list of rename rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MigrationRuleSet(Vec<MigrationRule>);

impl MigrationRuleSet {
    pub fn new(rules: Vec<MigrationRule>) -> Self {
        Self(rules)
    }

    pub fn rules(&self) -> &[MigrationRule] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MigrationRule> {
        self.0.iter()
    }

    /// First rule matching `path` and the rebuilt path.
    pub fn apply(&self, path: &CatalogPath) -> Option<(&MigrationRule, CatalogPath)> {
        self.0
            .iter()
            .find(|rule| rule.matches(path))
            .map(|rule| (rule, rule.rebuild(path)))
    }

    /// First rule matching `path` under bounded matching and the rebuilt path.
    pub fn apply_bounded(&self, path: &CatalogPath) -> Option<(&MigrationRule, CatalogPath)> {
        self.0
            .iter()
            .find(|rule| rule.matches_bounded(path))
            .map(|rule| (rule, rule.rebuild_bounded(path)))
    }

    /// First rule whose slash-joined source prefixes `text`, and the rewrite.
    pub fn apply_slashed(&self, text: &str) -> Option<(&MigrationRule, String)> {
        self.0
            .iter()
            .find_map(|rule| rule.rebuild_slashed(text).map(|rebuilt| (rule, rebuilt)))
    }

    /// Pairs of rule indexes whose source paths overlap (one is a prefix of
    /// the other). Such sets still run; the result then depends on order.
    pub fn overlapping_sources(&self) -> Vec<(usize, usize)> {
        let mut pairs = Vec::new();
        for (i, a) in self.0.iter().enumerate() {
            for (j, b) in self.0.iter().enumerate().skip(i + 1) {
                if a.src_path.starts_with(&b.src_path) || b.src_path.starts_with(&a.src_path) {
                    pairs.push((i, j));
                }
            }
        }
        pairs
    }

    /// Expand single dot-joined segments on both sides of every rule.
    pub fn expand_dotted(self) -> Self {
        Self(
            self.0
                .into_iter()
                .map(|rule| MigrationRule {
                    src_path: rule.src_path.expand_dotted(),
                    dst_path: rule.dst_path.expand_dotted(),
                })
                .collect(),
        )
    }
}

impl From<Vec<MigrationRule>> for MigrationRuleSet {
    fn from(rules: Vec<MigrationRule>) -> Self {
        Self(rules)
    }
}

impl<'a> IntoIterator for &'a MigrationRuleSet {
    type Item = &'a MigrationRule;
    type IntoIter = std::slice::Iter<'a, MigrationRule>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
