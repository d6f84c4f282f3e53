//! In-place rewriting of migrated paths inside SQL text.
//!
//! The query is never parsed or regenerated: each rule's source path is
//! matched as literal text (case-insensitive) and replaced by its destination
//! path, so whitespace, line terminators and comments outside the matched
//! spans are kept byte for byte.
//!
//! Each source segment matches either bare (`OLD.SALES`) or double-quoted
//! (`"OLD"."SALES"`); when any segment of a match was quoted, the replacement
//! quotes every destination segment.
//!
//! Rules run one after another over the progressively rewritten text, so a
//! later rule can match text an earlier rule produced. Rule sets are expected
//! not to overlap. A bare source path that is a textual prefix of a longer
//! identifier (`OLD.SALES` inside `OLD.SALES_ARCHIVE`) is matched as well;
//! a partly quoted one (`"OLD".SALES_ARCHIVE`) is left alone.

use crate::core::{CatalogPath, MigrationRuleSet};
use crate::error::{MigrateError, Result};
use regex::{Regex, RegexBuilder};
use serde::Serialize;

/// Occurrences replaced for one rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Replacement {
    pub src: String,
    pub dst: String,
    pub count: usize,
}

/// Rewritten text and per-rule provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteOutcome {
    pub sql: String,
    pub replacements: Vec<Replacement>,
}

impl RewriteOutcome {
    pub fn is_unchanged(&self) -> bool {
        self.replacements.is_empty()
    }
}

struct CompiledRule {
    pattern: Regex,
    src: String,
    dst_bare: String,
    dst_quoted: String,
}

/// Compiled form of a rule set, reusable across every SQL body of a run.
pub struct SqlTextRewriter {
    rules: Vec<CompiledRule>,
}

fn quote_segment(segment: &str) -> String {
    format!("\"{}\"", segment.replace('"', "\"\""))
}

fn segment_pattern(segment: &str) -> String {
    format!(
        "(?:{}|{})",
        regex::escape(&quote_segment(segment)),
        regex::escape(segment)
    )
}

fn quoted_path(path: &CatalogPath) -> String {
    path.segments()
        .iter()
        .map(|segment| quote_segment(segment))
        .collect::<Vec<_>>()
        .join(".")
}

/// A match ending in a bare segment that the following text continues, as
/// `"OLD".SALES` inside `"OLD".SALES_EU`. Quoting the replacement would leave
/// the rest of the identifier outside the closing quote.
fn splits_identifier(matched: &str, rest: &str) -> bool {
    !matched.ends_with('"')
        && rest
            .chars()
            .next()
            .is_some_and(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

impl SqlTextRewriter {
    /// Compile one pattern per rule. Rules with an empty source are skipped.
    ///
    /// # Errors
    ///
    /// Returns `MigrateError::Config` when a pattern cannot be compiled.
    pub fn new(rules: &MigrationRuleSet) -> Result<Self> {
        let mut compiled = Vec::with_capacity(rules.len());
        for rule in rules {
            if rule.src_path.is_empty() {
                continue;
            }
            let source = rule
                .src_path
                .segments()
                .iter()
                .map(|segment| segment_pattern(segment))
                .collect::<Vec<_>>()
                .join(r"\.");
            let pattern = RegexBuilder::new(&source)
                .case_insensitive(true)
                .build()
                .map_err(|e| {
                    MigrateError::Config(format!(
                        "cannot build SQL pattern for {}: {}",
                        rule.src_path.dotted(),
                        e
                    ))
                })?;
            compiled.push(CompiledRule {
                pattern,
                src: rule.src_path.dotted(),
                dst_bare: rule.dst_path.dotted(),
                dst_quoted: quoted_path(&rule.dst_path),
            });
        }
        Ok(Self { rules: compiled })
    }

    /// Apply every rule in order. Empty text is returned as is.
    pub fn rewrite(&self, sql: &str) -> RewriteOutcome {
        let mut text = sql.to_string();
        let mut replacements = Vec::new();
        if text.is_empty() {
            return RewriteOutcome {
                sql: text,
                replacements,
            };
        }

        for rule in &self.rules {
            let mut count = 0;
            let mut replaced = String::with_capacity(text.len());
            let mut last = 0;
            for found in rule.pattern.find_iter(&text) {
                let matched = found.as_str();
                let quoted = matched.contains('"');
                if quoted && splits_identifier(matched, &text[found.end()..]) {
                    continue;
                }
                replaced.push_str(&text[last..found.start()]);
                replaced.push_str(if quoted { &rule.dst_quoted } else { &rule.dst_bare });
                last = found.end();
                count += 1;
            }
            if count > 0 {
                replaced.push_str(&text[last..]);
                text = replaced;
                replacements.push(Replacement {
                    src: rule.src.clone(),
                    dst: rule.dst_bare.clone(),
                    count,
                });
            }
        }

        RewriteOutcome {
            sql: text,
            replacements,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::MigrationRule;
    use crate::sql::normalize_comments;

    fn rules(pairs: &[(&str, &str)]) -> MigrationRuleSet {
        MigrationRuleSet::new(
            pairs
                .iter()
                .map(|(src, dst)| {
                    MigrationRule::new(CatalogPath::from_dotted(src), CatalogPath::from_dotted(dst))
                })
                .collect(),
        )
    }

    #[test]
    fn test_empty_rule_set_is_identity() {
        let rewriter = SqlTextRewriter::new(&MigrationRuleSet::default()).unwrap();
        let sql = "select *\r\n  from a.b -- note\n";
        let outcome = rewriter.rewrite(sql);
        assert_eq!(outcome.sql, sql);
        assert!(outcome.is_unchanged());
    }

    #[test]
    fn test_bare_path_case_insensitive() {
        let rewriter = SqlTextRewriter::new(&rules(&[("OLD.SALES", "NEW.SALES2")])).unwrap();
        let outcome = rewriter.rewrite("select * from old.sales.orders join Old.Sales.items");
        assert_eq!(
            outcome.sql,
            "select * from NEW.SALES2.orders join NEW.SALES2.items"
        );
        assert_eq!(
            outcome.replacements,
            vec![Replacement {
                src: "OLD.SALES".into(),
                dst: "NEW.SALES2".into(),
                count: 2,
            }]
        );
    }

    #[test]
    fn test_quoted_path_keeps_quoting() {
        let rewriter = SqlTextRewriter::new(&rules(&[("OLD.SALES", "NEW.SALES2")])).unwrap();
        let outcome = rewriter.rewrite(r#"select * from "OLD"."SALES"."orders" o"#);
        assert_eq!(outcome.sql, r#"select * from "NEW"."SALES2"."orders" o"#);
    }

    #[test]
    fn test_quoted_segment_must_close() {
        let rewriter = SqlTextRewriter::new(&rules(&[("OLD.SALES", "NEW.SALES2")])).unwrap();
        let sql = r#"select * from "OLD"."SALES_EU".t"#;
        assert_eq!(rewriter.rewrite(sql).sql, sql);
    }

    #[test]
    fn test_quoted_match_does_not_split_identifier() {
        let rewriter = SqlTextRewriter::new(&rules(&[("OLD.SALES", "NEW.SALES2")])).unwrap();
        let sql = r#"select * from "OLD".SALES_EU.t"#;
        let outcome = rewriter.rewrite(sql);
        assert_eq!(outcome.sql, sql);
        assert!(outcome.is_unchanged());

        assert_eq!(
            rewriter.rewrite(r#"select * from "OLD".SALES.t, "OLD".SALES_EU.t"#).sql,
            r#"select * from "NEW"."SALES2".t, "OLD".SALES_EU.t"#
        );
    }

    #[test]
    fn test_formatting_outside_matches_untouched() {
        let rewriter = SqlTextRewriter::new(&rules(&[("src.db", "dst.lake")])).unwrap();
        let sql = "/* keep */\r\nSELECT  x\r\n\tFROM src.db.t -- src\r\n";
        let outcome = rewriter.rewrite(sql);
        assert_eq!(outcome.sql, "/* keep */\r\nSELECT  x\r\n\tFROM dst.lake.t -- src\r\n");
    }

    #[test]
    fn test_rules_apply_sequentially() {
        let rewriter =
            SqlTextRewriter::new(&rules(&[("a.b", "c.d"), ("c.d", "e.f")])).unwrap();
        let outcome = rewriter.rewrite("select * from a.b.t");
        assert_eq!(outcome.sql, "select * from e.f.t");
        assert_eq!(outcome.replacements.len(), 2);
    }

    #[test]
    fn test_metacharacters_are_literal() {
        let rewriter = SqlTextRewriter::new(&rules(&[("s3.bucket+1", "s3.bucket2")])).unwrap();
        assert_eq!(
            rewriter.rewrite("from s3.bucket+1.f, s3.bucketX1.f").sql,
            "from s3.bucket2.f, s3.bucketX1.f"
        );
    }

    #[test]
    fn test_empty_text_is_noop() {
        let rewriter = SqlTextRewriter::new(&rules(&[("a", "b")])).unwrap();
        assert_eq!(rewriter.rewrite("").sql, "");
    }

    #[test]
    fn test_normalize_then_rewrite_keeps_lines() {
        let rewriter = SqlTextRewriter::new(&rules(&[("OLD.SALES", "NEW.SALES2")])).unwrap();
        let sql = "select * from \"OLD\".\"SALES\".\"orders\" o // comment\n";
        let outcome = rewriter.rewrite(&normalize_comments(sql));
        assert_eq!(
            outcome.sql,
            "select * from \"NEW\".\"SALES2\".\"orders\" o -- comment\n"
        );
        assert_eq!(outcome.sql.lines().count(), sql.lines().count());
        assert!(outcome.sql.ends_with('\n'));
    }
}
