//! Migration orchestrator - main workflow coordinator.
//!
//! A run applies both rule sets to an in-memory catalog in a fixed order:
//! tree repair, space/folder renames, SQL bodies, query contexts, dependency
//! records, physical datasets, optional dependency discovery, and a second
//! tree repair. Per-dataset SQL failures are recorded and the run continues;
//! anything else aborts it.

use crate::config::Config;
use crate::core::{
    Catalog, CatalogPath, ChildRef, Dataset, DependencyRecord, Extra, MigrationRuleSet, Space,
};
use crate::error::{MigrateError, Result};
use crate::repair::repair;
use crate::report::{EntityCounts, EntityFailure, ErrorArtifactWriter, MigrationReport};
use crate::sql::{extract_table_references, normalize_comments, SqlTextRewriter};
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Migration orchestrator.
pub struct Orchestrator {
    config: Config,
    rewriter: SqlTextRewriter,
    artifacts: Option<ErrorArtifactWriter>,
}

/// What happened to one SQL body.
#[derive(Debug, Default)]
struct SqlOutcome {
    sql: Option<String>,
    changed: bool,
    references: Option<Vec<String>>,
}

impl Orchestrator {
    /// Create a new orchestrator. The SQL patterns of every source rule are
    /// compiled once here.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let rewriter = SqlTextRewriter::new(&config.source_migrations)?;
        Ok(Self {
            config,
            rewriter,
            artifacts: None,
        })
    }

    /// Write an error artifact for every dataset that fails to migrate.
    pub fn with_error_artifacts(mut self, dir: impl Into<PathBuf>) -> Self {
        self.artifacts = Some(ErrorArtifactWriter::new(dir));
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Load the configured source file, migrate it and save the result to
    /// the output file. Nothing is written when `dry_run` is set.
    pub fn run_files(&mut self, dry_run: bool) -> Result<MigrationReport> {
        info!("Loading catalog from: {}", self.config.source_file.display());
        let mut catalog = Catalog::load(&self.config.source_file)?;

        let report = self.run(&mut catalog)?;

        let output = self.config.output_file().to_path_buf();
        if dry_run {
            info!("Dry run - not writing {}", output.display());
        } else {
            catalog.save(&output)?;
            info!("Saved migrated data to: {}", output.display());
        }
        Ok(report)
    }

    /// Run the migration on `catalog` in place.
    ///
    /// # Errors
    ///
    /// Fails when tree repair cannot place a folder. SQL failures of single
    /// datasets are reported in [`MigrationReport::failures`] instead.
    pub fn run(&mut self, catalog: &mut Catalog) -> Result<MigrationReport> {
        let mut report = MigrationReport::start();
        info!("Starting migration run: {}", report.run_id);

        info!("Phase 1: Repairing folder tree");
        report.repair = repair(catalog)?;

        info!("Phase 2: Migrating spaces and folders");
        self.migrate_containers(catalog, &mut report);

        info!("Phase 3: Migrating VDS SQL using string replacement (preserves formatting)");
        let discovered = self.migrate_sql(catalog, &mut report)?;

        info!("Phase 4: Migrating SQL contexts");
        self.migrate_sql_contexts(catalog, &mut report);

        info!("Phase 5: Migrating dependency records");
        self.migrate_dependency_records(catalog, &mut report);

        info!("Phase 6: Migrating physical datasets");
        self.migrate_physical_datasets(catalog, &mut report);

        if self.config.discover_dependencies {
            info!("Phase 7: Applying discovered dependencies");
            apply_discovered(catalog, discovered, &mut report.dependency_discovery);
        }

        info!("Phase 8: Repairing folder tree after renames");
        report.post_repair = repair(catalog)?;

        report.unreferenced_datasets = catalog
            .unreferenced_datasets()
            .into_iter()
            .map(|vds| vds.path.dotted())
            .collect();
        for path in &report.unreferenced_datasets {
            warn!("VDS {} is not referenced by any space or folder", path);
        }

        catalog.sources.clear();
        catalog.homes.clear();

        report.finish();
        info!(
            "Migration finished: {} spaces, {} folders, {} VDS paths, {} VDS SQL ({} failed), {} PDS kept in {:.1}s",
            report.spaces.migrated,
            report.folders.migrated,
            report.vds_paths.migrated,
            report.vds_sql.migrated,
            report.vds_sql.failed,
            report.pds.migrated,
            report.duration_seconds
        );

        Ok(report)
    }

    fn migrate_containers(&self, catalog: &mut Catalog, report: &mut MigrationReport) {
        let rules = &self.config.space_folder_migrations;

        for space in &mut catalog.spaces {
            migrate_space(rules, space, &mut report.spaces);
            for child in &mut space.children {
                migrate_child(rules, child, "Space child", &mut report.child_references);
            }
        }

        for folder in &mut catalog.folders {
            migrate_path(rules, &mut folder.path, "Folder path", &mut report.folders);
            for child in &mut folder.children {
                migrate_child(rules, child, "Folder child", &mut report.child_references);
            }
        }

        for vds in &mut catalog.vds {
            migrate_path(rules, &mut vds.path, "VDS path", &mut report.vds_paths);
        }
    }

    /// Rewrite every SQL body. Returns the references found per dataset when
    /// discovery is enabled.
    fn migrate_sql(
        &mut self,
        catalog: &mut Catalog,
        report: &mut MigrationReport,
    ) -> Result<Vec<(CatalogPath, Vec<String>)>> {
        let mut discovered = Vec::new();

        for vds in &mut catalog.vds {
            report.vds_sql.total += 1;
            match self.migrate_dataset_sql(vds) {
                Ok(outcome) => {
                    if outcome.changed {
                        report.vds_sql.migrated += 1;
                    }
                    if let Some(sql) = outcome.sql {
                        vds.sql = Some(sql);
                    }
                    if let Some(references) = outcome.references {
                        discovered.push((vds.path.clone(), references));
                    }
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    report.vds_sql.failed += 1;
                    let failure = self.record_failure(vds, &e);
                    report.failures.push(failure);
                }
            }
        }

        Ok(discovered)
    }

    fn migrate_dataset_sql(&self, vds: &Dataset) -> Result<SqlOutcome> {
        let path = vds.path.dotted();
        let Some(original) = vds.sql.as_deref().filter(|sql| !sql.is_empty()) else {
            info!("NO SQL to migrate for: {}", path);
            return Ok(SqlOutcome::default());
        };

        let text = if self.config.normalize_comments {
            normalize_comments(original)
        } else {
            original.to_string()
        };

        let outcome = self.rewriter.rewrite(&text);
        for replacement in &outcome.replacements {
            info!(
                "String Replacement - VDS ({}): {} -> {} ({} occurrences)",
                path, replacement.src, replacement.dst, replacement.count
            );
        }

        let references = if self.config.discover_dependencies {
            let found = extract_table_references(&outcome.sql)
                .map_err(|e| MigrateError::sql_rewrite(&path, e.to_string()))?;
            debug!(
                "Found {} references in {} ({:?})",
                found.references.len(),
                path,
                found.tier
            );
            Some(found.references)
        } else {
            None
        };

        let changed = outcome.sql != original;
        if changed {
            info!("MIGRATED SQL (preserved formatting) for: {}", path);
        }

        Ok(SqlOutcome {
            sql: Some(outcome.sql),
            changed,
            references,
        })
    }

    fn record_failure(&mut self, vds: &Dataset, error: &MigrateError) -> EntityFailure {
        let path = vds.path.dotted();
        let message = error.to_string();
        warn!("ERROR: Unable to migrate SQL for: {}: {}", path, message);

        let artifact = match self.artifacts.as_mut() {
            Some(writer) => match writer.write(vds, &message) {
                Ok(file) => {
                    info!("Saved error details to: {}", file.display());
                    Some(file)
                }
                Err(e) => {
                    warn!("Could not write error artifact for {}: {}", path, e);
                    None
                }
            },
            None => None,
        };

        EntityFailure {
            entity: "vds".to_string(),
            path,
            message,
            artifact,
        }
    }

    fn migrate_sql_contexts(&self, catalog: &mut Catalog, report: &mut MigrationReport) {
        let rules = &self.config.source_migrations;

        for vds in &mut catalog.vds {
            let Some(context) = vds.sql_context.as_mut() else {
                continue;
            };
            report.sql_contexts.total += 1;
            if let Some((_, migrated)) = rules.apply_bounded(context) {
                info!(
                    "Source Migration - Matching VDS SQL Context ({}): {} -> {}",
                    vds.path, context, migrated
                );
                *context = migrated;
                report.sql_contexts.migrated += 1;
            }
        }
    }

    fn migrate_dependency_records(&self, catalog: &mut Catalog, report: &mut MigrationReport) {
        let sources = &self.config.source_migrations;
        let containers = &self.config.space_folder_migrations;

        for record in &mut catalog.vds_parents {
            report.dependency_records.total += 1;
            let mut changed = false;

            if let Some((_, migrated)) = containers.apply(&record.path) {
                info!(
                    "Space/Folder Migration - vds_parent path: {} -> {}",
                    record.path, migrated
                );
                record.path = migrated;
                changed = true;
            }

            let owner = record.path.dotted();
            for parent in &mut record.parents {
                for rules in [sources, containers] {
                    if let Some((_, migrated)) = rules.apply_slashed(parent) {
                        info!(
                            "Matching vds_parent: {} - changed dependency: {} -> {}",
                            owner, parent, migrated
                        );
                        *parent = migrated;
                        changed = true;
                    }
                }
            }

            if changed {
                report.dependency_records.migrated += 1;
            }
        }
    }

    /// Keep only physical datasets some rule covers, renamed. Space/folder
    /// rules win over source rules.
    fn migrate_physical_datasets(&self, catalog: &mut Catalog, report: &mut MigrationReport) {
        let sources = &self.config.source_migrations;
        let containers = &self.config.space_folder_migrations;
        let counts = &mut report.pds;

        for mut pds in std::mem::take(&mut *catalog.pds) {
            counts.total += 1;
            if pds.path.is_empty() {
                debug!("Dropping PDS without a path");
                counts.dropped += 1;
                continue;
            }

            if let Some((_, migrated)) = containers.apply(&pds.path) {
                info!("Space/Folder Migration - Moved PDS: {} -> {}", pds.path, migrated);
                pds.path = migrated;
            } else if let Some((_, migrated)) = sources.apply(&pds.path) {
                info!("Source Migration - Moved PDS: {} -> {}", pds.path, migrated);
                pds.path = migrated;
            } else {
                debug!("Dropping PDS not covered by any rule: {}", pds.path);
                counts.dropped += 1;
                continue;
            }

            counts.migrated += 1;
            catalog.pds.push(pds);
        }
    }
}

fn migrate_path(
    rules: &MigrationRuleSet,
    path: &mut CatalogPath,
    label: &str,
    counts: &mut EntityCounts,
) {
    counts.total += 1;
    if let Some((_, migrated)) = rules.apply(path) {
        info!("Space/Folder Migration - {}: {} -> {}", label, path, migrated);
        *path = migrated;
        counts.migrated += 1;
    }
}

fn migrate_child(
    rules: &MigrationRuleSet,
    child: &mut ChildRef,
    label: &str,
    counts: &mut EntityCounts,
) {
    if let Some(path) = child.path.as_mut() {
        migrate_path(rules, path, label, counts);
    }
}

/// Spaces with a path migrate like folders; the name follows the new last
/// segment. Name-only spaces match single-segment rules by name.
fn migrate_space(rules: &MigrationRuleSet, space: &mut Space, counts: &mut EntityCounts) {
    counts.total += 1;

    if let Some(path) = space.path.as_mut() {
        if let Some((_, migrated)) = rules.apply(path) {
            info!("Space/Folder Migration - Space path: {} -> {}", path, migrated);
            if space.name.is_some() {
                space.name = migrated.name().map(str::to_string);
            }
            *path = migrated;
            counts.migrated += 1;
        }
        return;
    }

    let Some(name) = space.name.clone() else {
        return;
    };
    let renamed = rules.iter().find_map(|rule| match rule.src_path.segments() {
        [src] if *src == name => rule.dst_path.segments().first().cloned(),
        _ => None,
    });
    if let Some(renamed) = renamed {
        info!("Space/Folder Migration - Space name: {} -> {}", name, renamed);
        space.path = Some(CatalogPath::new([renamed.as_str()]));
        space.name = Some(renamed);
        counts.migrated += 1;
    }
}

/// Replace each analyzed dataset's dependency record with the references
/// found in its migrated SQL, creating records that do not exist yet.
fn apply_discovered(
    catalog: &mut Catalog,
    discovered: Vec<(CatalogPath, Vec<String>)>,
    counts: &mut EntityCounts,
) {
    for (path, parents) in discovered {
        counts.total += 1;
        match catalog.vds_parents.iter_mut().find(|record| record.path == path) {
            Some(record) => {
                if record.parents != parents {
                    info!(
                        "Dependency Discovery - vds_parent ({}): {:?} -> {:?}",
                        path, record.parents, parents
                    );
                    record.parents = parents;
                    counts.migrated += 1;
                }
            }
            None => {
                info!("Dependency Discovery - new vds_parent ({}): {:?}", path, parents);
                catalog.vds_parents.push(DependencyRecord {
                    path,
                    parents,
                    extra: Extra::new(),
                });
                counts.migrated += 1;
            }
        }
    }
}
