//! Configuration validation.

use super::Config;
use crate::core::MigrationRuleSet;
use crate::error::{MigrateError, Result};
use tracing::warn;

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    if config.source_file.as_os_str().is_empty() {
        return Err(MigrateError::Config("sourceFile is required".into()));
    }

    validate_rules("sourceMigrations", &config.source_migrations)?;
    validate_rules("spaceFolderMigrations", &config.space_folder_migrations)?;

    Ok(())
}

fn validate_rules(field: &str, rules: &MigrationRuleSet) -> Result<()> {
    for (idx, rule) in rules.iter().enumerate() {
        if rule.src_path.is_empty() || rule.dst_path.is_empty() {
            return Err(MigrateError::Config(format!(
                "{field}[{idx}]: srcPath and dstPath must not be empty"
            )));
        }
        let has_empty_segment = rule
            .src_path
            .segments()
            .iter()
            .chain(rule.dst_path.segments())
            .any(|segment| segment.is_empty());
        if has_empty_segment {
            return Err(MigrateError::Config(format!(
                "{field}[{idx}]: path segments must not be empty ({} -> {})",
                rule.src_path, rule.dst_path
            )));
        }
    }

    // Not an error: the outcome then depends on rule order.
    for (a, b) in rules.overlapping_sources() {
        warn!(
            "{field}[{a}] and {field}[{b}] have overlapping source paths; earlier rule wins"
        );
    }

    Ok(())
}
