//! Table reference extraction for dependency discovery.
//!
//! Two strategies, tried in order:
//!
//! 1. [`parse_table_references`] parses the query with the PostgreSQL
//!    grammar (after [`normalize_comments`]) and walks the whole tree,
//!    collecting every relation name. Subqueries, joins and CTEs are covered
//!    because the walk visits every node.
//! 2. [`scan_table_references`] is a tolerant token scan used when parsing
//!    fails: it takes the token after each `FROM`/`JOIN` keyword. It is a
//!    heuristic; queries whose syntax it cannot follow yield fewer references.
//!
//! Both return slash-joined paths (`space/folder/table`) in discovery order,
//! duplicates included.

use super::comments::normalize_comments;
use crate::error::{MigrateError, Result};
use regex::Regex;
use serde::Serialize;
use sqlparser::ast::{visit_relations, ObjectName, ObjectNamePart};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use std::ops::ControlFlow;
use std::sync::OnceLock;
use tracing::debug;

static BLOCK_COMMENT_RE: OnceLock<Regex> = OnceLock::new();
static TRIM_CALL_RE: OnceLock<Regex> = OnceLock::new();
static TOKEN_RE: OnceLock<Regex> = OnceLock::new();

fn block_comment_re() -> &'static Regex {
    BLOCK_COMMENT_RE.get_or_init(|| {
        Regex::new(r"/\*[^*]*\*+(?:[^*/][^*]*\*+)*/").expect("valid block comment regex")
    })
}

fn trim_call_re() -> &'static Regex {
    TRIM_CALL_RE.get_or_init(|| {
        Regex::new(r"(?is)\b(?:ltrim|rtrim|trim|right|left)\(.*?\)").expect("valid trim regex")
    })
}

fn token_re() -> &'static Regex {
    TOKEN_RE.get_or_init(|| Regex::new(r"[^\s(),;]+").expect("valid token regex"))
}

/// Which strategy produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionTier {
    Parsed,
    Scanned,
}

/// Why the structured parse gave up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseFailure {
    pub reason: String,
}

/// References found in one query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableReferences {
    pub tier: ExtractionTier,
    pub references: Vec<String>,
    /// Parser message when the scan tier was used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_failure: Option<String>,
}

/// Extract references, falling back to the token scan when parsing fails.
///
/// # Errors
///
/// Returns `MigrateError::Extraction` when the text has no tokens at all,
/// so neither strategy has anything to work with.
pub fn extract_table_references(sql: &str) -> Result<TableReferences> {
    match parse_table_references(sql) {
        Ok(references) => Ok(TableReferences {
            tier: ExtractionTier::Parsed,
            references,
            parse_failure: None,
        }),
        Err(failure) => {
            debug!("Structured parse failed, scanning tokens: {}", failure.reason);
            let references = scan_table_references(sql).ok_or_else(|| {
                MigrateError::Extraction(format!(
                    "query has no tokens (parser: {})",
                    failure.reason
                ))
            })?;
            Ok(TableReferences {
                tier: ExtractionTier::Scanned,
                references,
                parse_failure: Some(failure.reason),
            })
        }
    }
}

fn render_object_name(name: &ObjectName) -> String {
    name.0
        .iter()
        .map(|part| match part {
            ObjectNamePart::Identifier(ident) => ident.value.clone(),
            #[allow(unreachable_patterns)]
            other => other.to_string().replace('"', ""),
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Tier one: full parse and tree walk.
pub fn parse_table_references(sql: &str) -> std::result::Result<Vec<String>, ParseFailure> {
    let normalized = normalize_comments(sql);
    let statements = Parser::parse_sql(&PostgreSqlDialect {}, &normalized).map_err(|e| {
        ParseFailure {
            reason: e.to_string(),
        }
    })?;
    if statements.is_empty() {
        return Err(ParseFailure {
            reason: "no statements".to_string(),
        });
    }

    let mut references = Vec::new();
    let _ = visit_relations(&statements, |relation: &ObjectName| {
        references.push(render_object_name(relation));
        ControlFlow::<()>::Continue(())
    });
    Ok(references)
}

/// Remove comments and neutralize trim-like calls whose literal arguments
/// could contain the keywords the scan looks for.
fn clean_for_scan(sql: &str) -> String {
    let without_blocks = block_comment_re().replace_all(sql, "");
    let without_trims = trim_call_re().replace_all(&without_blocks, "trim()");

    without_trims
        .lines()
        .filter(|line| {
            let start = line.trim_start();
            !(start.starts_with("--") || start.starts_with('#'))
        })
        .map(|line| {
            let cut = [line.find("--"), line.find('#')]
                .into_iter()
                .flatten()
                .min()
                .unwrap_or(line.len());
            &line[..cut]
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// End offset of a dotted identifier chain starting at `start`, where
/// segments may be double-quoted and contain separators.
fn identifier_chain_end(text: &str, start: usize) -> usize {
    let bytes = text.as_bytes();
    let mut pos = start;

    loop {
        if bytes.get(pos) == Some(&b'"') {
            pos += 1;
            loop {
                match bytes.get(pos) {
                    None => return pos,
                    Some(b'"') if bytes.get(pos + 1) == Some(&b'"') => pos += 2,
                    Some(b'"') => {
                        pos += 1;
                        break;
                    }
                    Some(_) => pos += 1,
                }
            }
        } else {
            while let Some(&b) = bytes.get(pos) {
                if b.is_ascii_whitespace() || matches!(b, b'(' | b')' | b',' | b';' | b'.' | b'"') {
                    break;
                }
                pos += 1;
            }
        }

        if bytes.get(pos) == Some(&b'.') {
            pos += 1;
        } else {
            return pos;
        }
    }
}

/// `S3."my bucket"."file.csv"` becomes `S3/my bucket/file.csv`.
pub fn normalize_path(token: &str) -> String {
    let mut segments: Vec<String> = Vec::new();
    let mut bare = String::new();
    let mut chars = token.chars();

    while let Some(c) = chars.next() {
        match c {
            '"' | '\'' => {
                if !bare.is_empty() {
                    segments.push(std::mem::take(&mut bare));
                }
                let quoted: String = chars.by_ref().take_while(|&q| q != c).collect();
                if !quoted.is_empty() {
                    segments.push(quoted);
                }
            }
            '.' => {
                if !bare.is_empty() {
                    segments.push(std::mem::take(&mut bare));
                }
            }
            _ => bare.push(c),
        }
    }
    if !bare.is_empty() {
        segments.push(bare);
    }

    segments.join("/")
}

/// Tier two: tolerant token scan. `None` when the text has no tokens.
pub fn scan_table_references(sql: &str) -> Option<Vec<String>> {
    let cleaned = clean_for_scan(sql);
    let tokens: Vec<(usize, &str)> = token_re()
        .find_iter(&cleaned)
        .map(|m| (m.start(), m.as_str()))
        .collect();
    if tokens.is_empty() {
        return None;
    }

    let mut references = Vec::new();
    let mut take_next = false;
    let mut skip_until = 0;

    for (start, token) in tokens {
        if start < skip_until {
            continue;
        }
        let lower = token.to_lowercase();
        if take_next && lower != "select" {
            // An odd quote count means a quoted segment was split at whitespace.
            if token.matches('"').count() % 2 == 1 {
                let end = identifier_chain_end(&cleaned, start);
                references.push(normalize_path(&cleaned[start..end]));
                skip_until = end;
            } else {
                references.push(normalize_path(token));
            }
        }
        take_next = lower == "from" || lower == "join";
    }

    Some(references)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_joins_and_subqueries() {
        let sql = r#"select o.id
            from "Sales"."EU".orders o
            join crm.customers c on o.cid = c.id
            where o.id in (select id from audit.flags)"#;
        let refs = parse_table_references(sql).unwrap();
        assert_eq!(refs, vec!["Sales/EU/orders", "crm/customers", "audit/flags"]);
    }

    #[test]
    fn test_parse_cte_and_foreign_comments() {
        let sql = "// recent rows\nwith recent as (select * from lake.raw.events)\nselect * from recent /* all */";
        let refs = parse_table_references(sql).unwrap();
        assert!(refs.contains(&"lake/raw/events".to_string()));
        assert!(refs.contains(&"recent".to_string()));
    }

    #[test]
    fn test_parse_keeps_duplicates() {
        let refs = parse_table_references("select * from a.t union all select * from a.t").unwrap();
        assert_eq!(refs, vec!["a/t", "a/t"]);
    }

    #[test]
    fn test_extract_uses_parser_first() {
        let result = extract_table_references("select * from space.folder.vds").unwrap();
        assert_eq!(result.tier, ExtractionTier::Parsed);
        assert_eq!(result.references, vec!["space/folder/vds"]);
        assert!(result.parse_failure.is_none());
    }

    #[test]
    fn test_extract_falls_back_on_parse_failure() {
        let result = extract_table_references("select * from space.tbl t where ((a = 1").unwrap();
        assert_eq!(result.tier, ExtractionTier::Scanned);
        assert_eq!(result.references, vec!["space/tbl"]);
        assert!(result.parse_failure.is_some());
    }

    #[test]
    fn test_misspelled_keyword_finds_nothing() {
        let result = extract_table_references("SELECT * FORM tbl").unwrap();
        assert!(result.references.is_empty());
    }

    #[test]
    fn test_blank_query_exhausts_both_tiers() {
        let err = extract_table_references("  \n -- only a comment\n").unwrap_err();
        assert!(matches!(err, MigrateError::Extraction(_)));
    }

    #[test]
    fn test_scan_recovers_quoted_names_with_spaces() {
        let refs =
            scan_table_references(r#"select * from "My Space"."sub folder".tbl, other.t"#).unwrap();
        assert_eq!(refs, vec!["My Space/sub folder/tbl"]);
    }

    #[test]
    fn test_scan_recovers_quoted_segment_after_bare_one() {
        let refs = scan_table_references(r#"select * from space."my folder".t"#).unwrap();
        assert_eq!(refs, vec!["space/my folder/t"]);

        let refs = scan_table_references(r#"select * from a."b c"."d e" x join y.z"#).unwrap();
        assert_eq!(refs, vec!["a/b c/d e", "y/z"]);
    }

    #[test]
    fn test_scan_ignores_keywords_inside_quoted_names() {
        let refs = scan_table_references(r#"select * from "data from x".t join y.z"#).unwrap();
        assert_eq!(refs, vec!["data from x/t", "y/z"]);
    }

    #[test]
    fn test_scan_neutralizes_trim_arguments() {
        let refs = scan_table_references("select trim(' from x') as a from s.t").unwrap();
        assert_eq!(refs, vec!["s/t"]);
    }

    #[test]
    fn test_scan_strips_comments() {
        let sql = "select *\n-- from commented.out\nfrom a.b # from trailing.one\n/* join c.d */ join e.f";
        let refs = scan_table_references(sql).unwrap();
        assert_eq!(refs, vec!["a/b", "e/f"]);
    }

    #[test]
    fn test_scan_skips_subquery_select() {
        let refs = scan_table_references("select * from (select * from inner.t) x join outer.u").unwrap();
        assert_eq!(refs, vec!["inner/t", "outer/u"]);
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path(r#"S3."asd"."ss.txt""#), "S3/asd/ss.txt");
        assert_eq!(normalize_path("a.b.c"), "a/b/c");
        assert_eq!(normalize_path("'x'.y"), "x/y");
        assert_eq!(normalize_path("tbl"), "tbl");
    }
}
