//! Error types for the catalog migration library.

use thiserror::Error;

/// Main error type for migration operations.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Configuration error (invalid file, bad rules, missing root space, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Tree repair could not attach a container
    #[error("Repair failed for {path}: {message}")]
    Repair { path: String, message: String },

    /// SQL body of a single dataset could not be rewritten
    #[error("SQL rewrite failed for dataset {dataset}: {message}")]
    SqlRewrite { dataset: String, message: String },

    /// Both extraction tiers gave up on a SQL body
    #[error("Table reference extraction failed: {0}")]
    Extraction(String),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MigrateError {
    /// Create a Repair error
    pub fn repair(path: impl Into<String>, message: impl Into<String>) -> Self {
        MigrateError::Repair {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a SqlRewrite error
    pub fn sql_rewrite(dataset: impl Into<String>, message: impl Into<String>) -> Self {
        MigrateError::SqlRewrite {
            dataset: dataset.into(),
            message: message.into(),
        }
    }

    /// Whether the error aborts the whole run rather than a single entity.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            MigrateError::SqlRewrite { .. } | MigrateError::Extraction(_)
        )
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            MigrateError::Config(_) | MigrateError::Repair { .. } | MigrateError::Yaml(_) => 2,
            _ => 1,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_per_entity_errors_are_not_fatal() {
        assert!(!MigrateError::sql_rewrite("a.b", "bad").is_fatal());
        assert!(!MigrateError::Extraction("empty".into()).is_fatal());
        assert!(MigrateError::repair("a.b", "no space").is_fatal());
        assert!(MigrateError::Config("x".into()).is_fatal());
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(MigrateError::Config("x".into()).exit_code(), 2);
        assert_eq!(MigrateError::repair("a", "b").exit_code(), 2);
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        assert_eq!(MigrateError::from(io).exit_code(), 1);
    }

    #[test]
    fn test_format_detailed_contains_message() {
        let err = MigrateError::sql_rewrite("space.view", "pattern too large");
        let detailed = err.format_detailed();
        assert!(detailed.starts_with("Error: SQL rewrite failed for dataset space.view"));
        assert!(detailed.contains("pattern too large"));
    }
}
