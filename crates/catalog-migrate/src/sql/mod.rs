//! SQL text handling.
//!
//! - [`comments`]: converts `//` and `/* */` comments into `-- ` comments
//! - [`rewrite`]: replaces migrated paths inside query text, keeping formatting
//! - [`extract`]: finds the tables a query reads, for dependency discovery
//!
//! Rewriting never goes through a parser; extraction parses when it can.

pub mod comments;
pub mod extract;
pub mod rewrite;

pub use comments::normalize_comments;
pub use extract::{
    extract_table_references, parse_table_references, scan_table_references, ExtractionTier,
    ParseFailure, TableReferences,
};
pub use rewrite::{Replacement, RewriteOutcome, SqlTextRewriter};
