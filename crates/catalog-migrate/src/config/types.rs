//! Configuration type definitions.

use crate::core::MigrationRuleSet;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the directory error artifacts are written to.
pub const ERRORS_DIR: &str = "errors";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Exported catalog to read.
    #[serde(default)]
    pub source_file: PathBuf,

    /// Where to write the migrated catalog. The source file is overwritten
    /// when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_file: Option<PathBuf>,

    /// Rules for physical sources: SQL bodies, query contexts, dependency
    /// records and physical datasets.
    #[serde(default)]
    pub source_migrations: MigrationRuleSet,

    /// Rules for the space/folder tree: spaces, folders, virtual dataset
    /// paths, child references, dependency records and physical datasets.
    #[serde(default)]
    pub space_folder_migrations: MigrationRuleSet,

    /// Convert `//` and `/* */` comments in SQL bodies to `-- ` before
    /// rewriting (default: false).
    #[serde(default)]
    pub normalize_comments: bool,

    /// Recompute dependency records from the migrated SQL (default: false).
    #[serde(default)]
    pub discover_dependencies: bool,
}

impl Config {
    /// File the migrated catalog is written to.
    pub fn output_file(&self) -> &Path {
        self.destination_file.as_deref().unwrap_or(&self.source_file)
    }

    /// `errors` directory next to the destination, or in the working
    /// directory when no destination is configured.
    pub fn errors_dir(&self) -> PathBuf {
        match &self.destination_file {
            Some(dest) => dest
                .parent()
                .map(|dir| dir.join(ERRORS_DIR))
                .unwrap_or_else(|| PathBuf::from(ERRORS_DIR)),
            None => PathBuf::from(ERRORS_DIR),
        }
    }
}
