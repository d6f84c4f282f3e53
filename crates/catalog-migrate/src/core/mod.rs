//! Core data model for catalog migration.
//!
//! - [`path`]: the segment-wise [`CatalogPath`]
//! - [`rules`]: rename rules, prefix matching and path rebuilding
//! - [`entity`]: spaces, folders, datasets and dependency records
//!
//! Everything here is pure data plus functions over it; no I/O.

pub mod entity;
pub mod path;
pub mod rules;

pub use entity::{
    Catalog, ChildRef, Dataset, DependencyRecord, EntityList, Extra, Folder, Space,
};
pub use path::CatalogPath;
pub use rules::{MigrationRule, MigrationRuleSet};
