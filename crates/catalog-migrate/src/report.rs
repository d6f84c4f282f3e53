//! Run summary and per-entity error artifacts.

use crate::core::Dataset;
use crate::error::Result;
use crate::repair::RepairReport;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Counts for one entity class.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EntityCounts {
    /// Entities examined.
    pub total: usize,

    /// Entities a rule changed.
    pub migrated: usize,

    /// Entities whose migration failed (kept unmodified).
    pub failed: usize,

    /// Entities removed from the output.
    pub dropped: usize,
}

/// One entity that could not be migrated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityFailure {
    /// Entity class, e.g. `vds`.
    pub entity: String,

    /// Dot-joined path of the entity.
    pub path: String,

    /// Error message.
    pub message: String,

    /// Error artifact written for this failure, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<PathBuf>,
}

/// Result of a migration run.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationReport {
    /// Unique run identifier.
    pub run_id: String,

    /// When the migration started.
    pub started_at: DateTime<Utc>,

    /// When the migration completed.
    pub completed_at: DateTime<Utc>,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    /// Tree repair before renaming.
    pub repair: RepairReport,

    /// Tree repair after renaming.
    pub post_repair: RepairReport,

    pub spaces: EntityCounts,
    pub folders: EntityCounts,
    pub child_references: EntityCounts,
    pub vds_paths: EntityCounts,
    pub vds_sql: EntityCounts,
    pub sql_contexts: EntityCounts,
    pub dependency_records: EntityCounts,
    pub pds: EntityCounts,

    /// Records recomputed from SQL when discovery is enabled.
    pub dependency_discovery: EntityCounts,

    /// Per-entity failures, in the order they happened.
    pub failures: Vec<EntityFailure>,

    /// Virtual datasets no container lists as a child.
    pub unreferenced_datasets: Vec<String>,
}

impl MigrationReport {
    pub(crate) fn start() -> Self {
        let now = Utc::now();
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            started_at: now,
            completed_at: now,
            duration_seconds: 0.0,
            repair: RepairReport::default(),
            post_repair: RepairReport::default(),
            spaces: EntityCounts::default(),
            folders: EntityCounts::default(),
            child_references: EntityCounts::default(),
            vds_paths: EntityCounts::default(),
            vds_sql: EntityCounts::default(),
            sql_contexts: EntityCounts::default(),
            dependency_records: EntityCounts::default(),
            pds: EntityCounts::default(),
            dependency_discovery: EntityCounts::default(),
            failures: Vec::new(),
            unreferenced_datasets: Vec::new(),
        }
    }

    pub(crate) fn finish(&mut self) {
        self.completed_at = Utc::now();
        self.duration_seconds =
            (self.completed_at - self.started_at).num_milliseconds() as f64 / 1000.0;
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Serialize the report to JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Writes `error_<n>.txt` files describing datasets that failed to migrate.
#[derive(Debug)]
pub struct ErrorArtifactWriter {
    dir: PathBuf,
    next_index: usize,
}

impl ErrorArtifactWriter {
    /// Writer targeting `dir`; the directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            next_index: 0,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write one artifact and return its path. Indexes start at 0 and grow
    /// with every call.
    pub fn write(&mut self, dataset: &Dataset, message: &str) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(format!("error_{}.txt", self.next_index));
        self.next_index += 1;

        let mut content = format!(
            "VDS Path: {}\nError: {}\n\nOriginal SQL:\n{}\n",
            dataset.path.dotted(),
            message,
            dataset.sql.as_deref().unwrap_or("N/A")
        );
        if let Some(parsed) = dataset.parsed_sql() {
            content.push_str(&format!(
                "\nParsed SQL Object:\n{}\n",
                serde_json::to_string_pretty(parsed)?
            ));
        }

        std::fs::write(&path, content)?;
        Ok(path)
    }
}
