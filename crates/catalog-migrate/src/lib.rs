//! # catalog-migrate
//!
//! Offline migration of exported data-catalog snapshots.
//!
//! A snapshot holds the spaces, folders, virtual datasets (saved SQL
//! queries), physical datasets and dependency records of a catalog. This
//! library renames the physical sources and the space/folder tree a snapshot
//! refers to, following two ordered lists of path rewrite rules:
//!
//! - **Tree repair** attaches orphaned folders, creating missing parents
//! - **Path renames** for spaces, folders, datasets and child references
//! - **SQL rewriting** that changes only the matched path text
//! - **Dependency records** rewritten, or recomputed from the migrated SQL
//! - **Comment normalization** of foreign comment styles to `--`
//!
//! ## Example
//!
//! ```rust,no_run
//! use catalog_migrate::{Catalog, Config, Orchestrator};
//!
//! fn main() -> catalog_migrate::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let mut catalog = Catalog::load(&config.source_file)?;
//!     let mut orchestrator = Orchestrator::new(config)?;
//!     let report = orchestrator.run(&mut catalog)?;
//!     println!("Migrated {} SQL bodies", report.vds_sql.migrated);
//!     catalog.save(orchestrator.config().output_file())?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod orchestrator;
pub mod repair;
pub mod report;
pub mod snapshot;
pub mod sql;

// Re-exports for convenient access
pub use config::Config;
pub use core::{
    Catalog, CatalogPath, Dataset, DependencyRecord, Folder, MigrationRule, MigrationRuleSet,
    Space,
};
pub use error::{MigrateError, Result};
pub use orchestrator::Orchestrator;
pub use repair::{repair, RepairReport};
pub use report::{EntityCounts, EntityFailure, ErrorArtifactWriter, MigrationReport};
pub use sql::{extract_table_references, normalize_comments, SqlTextRewriter, TableReferences};
