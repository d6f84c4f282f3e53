//! Tree consistency repair.
//!
//! Every folder must be declared as a child of some space or folder, or it
//! cannot be walked when the catalog is recreated. Upstream removals (a
//! dropped space or folder) leave gaps; [`repair`] closes them by attaching
//! orphaned folders to their parent, creating missing intermediate folders
//! as needed, until no orphan is left.
//!
//! Each pass runs in two phases: first every missing parent folder is
//! synthesized, then every orphan is attached. Attachment looks parents up
//! by path, so the result does not depend on folder order.

use crate::core::{Catalog, CatalogPath, ChildRef, Folder};
use crate::error::{MigrateError, Result};
use serde::Serialize;
use std::collections::HashSet;
use tracing::info;

/// What a repair run changed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RepairReport {
    /// Passes that found at least one orphan.
    pub passes: usize,

    /// Folders created to fill gaps, in creation order.
    pub synthesized: Vec<CatalogPath>,

    /// `(child, parent)` pairs of attached child references.
    pub attached: Vec<(CatalogPath, CatalogPath)>,
}

impl RepairReport {
    pub fn is_empty(&self) -> bool {
        self.synthesized.is_empty() && self.attached.is_empty()
    }
}

/// Paths of folders not referenced as a child by any space or folder.
pub fn find_unreferenced_folders(catalog: &Catalog) -> Vec<CatalogPath> {
    let referenced = catalog.child_paths();
    catalog
        .folders
        .iter()
        .filter(|folder| !referenced.contains(&folder.path))
        .map(|folder| folder.path.clone())
        .collect()
}

/// Attach orphaned folders until every folder is reachable.
///
/// # Errors
///
/// Returns `MigrateError::Config` when an orphan sits directly under a space
/// that does not exist; the run must stop, since there is nowhere to put it.
pub fn repair(catalog: &mut Catalog) -> Result<RepairReport> {
    let mut report = RepairReport::default();

    loop {
        let orphans = find_unreferenced_folders(catalog);
        if orphans.is_empty() {
            break;
        }
        if report.passes == 0 {
            info!("Detected {} unreferenced folders - fixing ...", orphans.len());
        }
        report.passes += 1;

        let created = synthesize_missing_parents(catalog, &orphans)?;
        report.synthesized.extend(created);

        for orphan in &orphans {
            let parent = attach(catalog, orphan)?;
            report.attached.push((orphan.clone(), parent));
        }
    }

    Ok(report)
}

fn parent_of(orphan: &CatalogPath) -> Result<CatalogPath> {
    match orphan.parent() {
        Some(parent) if !parent.is_empty() => Ok(parent),
        _ => Err(MigrateError::repair(
            orphan.dotted(),
            "folder path has no parent container",
        )),
    }
}

/// Phase one: make sure every orphan's parent exists.
fn synthesize_missing_parents(
    catalog: &mut Catalog,
    orphans: &[CatalogPath],
) -> Result<Vec<CatalogPath>> {
    let existing: HashSet<&CatalogPath> = catalog.folders.iter().map(|f| &f.path).collect();
    let mut missing: Vec<CatalogPath> = Vec::new();

    for orphan in orphans {
        let parent = parent_of(orphan)?;
        if parent.len() == 1 {
            let space_exists = catalog
                .spaces
                .iter()
                .any(|space| space.display_name() == parent.name());
            if !space_exists {
                return Err(MigrateError::Config(format!(
                    "Space not found: {} (required by folder {})",
                    parent.dotted(),
                    orphan.dotted()
                )));
            }
        } else if !existing.contains(&parent) && !missing.contains(&parent) {
            missing.push(parent);
        }
    }

    // Shallow folders first so the saved catalog can be recreated top-down.
    missing.sort_by_key(CatalogPath::len);
    for path in &missing {
        info!("Repair - Created missing parent folder: {}", path.dotted());
    }
    let folders = missing.iter().cloned().map(Folder::synthesized);
    catalog.folders.splice(0..0, folders);

    Ok(missing)
}

/// Phase two: append a child reference for `orphan` to its parent.
fn attach(catalog: &mut Catalog, orphan: &CatalogPath) -> Result<CatalogPath> {
    let parent = parent_of(orphan)?;
    let id = catalog
        .folders
        .iter()
        .find(|folder| &folder.path == orphan)
        .and_then(|folder| folder.id.clone());
    let child = ChildRef::folder(id, orphan.clone());

    if parent.len() == 1 {
        let space = catalog
            .spaces
            .iter_mut()
            .find(|space| space.display_name() == parent.name())
            .ok_or_else(|| {
                MigrateError::Config(format!("Space not found: {}", parent.dotted()))
            })?;
        space.children.push(child);
        info!(
            "Repair - Attached folder to space: {} -> {}",
            orphan.dotted(),
            parent.dotted()
        );
    } else {
        let folder = catalog
            .folders
            .iter_mut()
            .find(|folder| folder.path == parent)
            .ok_or_else(|| MigrateError::repair(orphan.dotted(), "parent folder missing"))?;
        folder.children.push(child);
        info!(
            "Repair - Attached folder to folder: {} -> {}",
            orphan.dotted(),
            parent.dotted()
        );
    }

    Ok(parent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{EntityList, Extra, Space};

    fn p(segments: &[&str]) -> CatalogPath {
        CatalogPath::from(segments)
    }

    fn space(name: &str) -> Space {
        Space {
            id: Some(format!("id-{name}")),
            name: Some(name.to_string()),
            path: Some(p(&[name])),
            children: EntityList::default(),
            extra: Extra::new(),
        }
    }

    fn folder(path: &[&str]) -> Folder {
        Folder {
            id: Some(format!("id-{}", path.join("."))),
            path: p(path),
            children: EntityList::default(),
            extra: Extra::new(),
        }
    }

    #[test]
    fn test_find_unreferenced_folders() {
        let mut catalog = Catalog {
            spaces: vec![space("a")].into(),
            folders: vec![folder(&["a", "x"]), folder(&["a", "y"])].into(),
            ..Default::default()
        };
        catalog.spaces[0]
            .children
            .push(ChildRef::folder(None, p(&["a", "x"])));

        assert_eq!(find_unreferenced_folders(&catalog), vec![p(&["a", "y"])]);
    }

    #[test]
    fn test_repair_synthesizes_missing_intermediate_folder() {
        let mut catalog = Catalog {
            spaces: vec![space("a")].into(),
            folders: vec![folder(&["a", "b", "c"])].into(),
            ..Default::default()
        };
        assert_eq!(catalog.child_paths().len(), 0);

        let report = repair(&mut catalog).unwrap();

        assert_eq!(report.passes, 2);
        assert_eq!(report.synthesized, vec![p(&["a", "b"])]);
        assert_eq!(catalog.folders.len(), 2);
        assert_eq!(catalog.folders[0].path, p(&["a", "b"]));
        assert_eq!(
            catalog.folders[0].children[0].path.as_ref(),
            Some(&p(&["a", "b", "c"]))
        );
        assert_eq!(
            catalog.folders[0].children[0].id.as_deref(),
            Some("id-a.b.c")
        );
        assert_eq!(
            catalog.spaces[0].children[0].path.as_ref(),
            Some(&p(&["a", "b"]))
        );
        assert_eq!(catalog.child_paths().len(), 2);
        assert!(find_unreferenced_folders(&catalog).is_empty());
    }

    #[test]
    fn test_repair_reuses_existing_parent_folder() {
        let mut catalog = Catalog {
            spaces: vec![space("a")].into(),
            folders: vec![folder(&["a", "b"]), folder(&["a", "b", "c"])].into(),
            ..Default::default()
        };
        catalog.spaces[0]
            .children
            .push(ChildRef::folder(None, p(&["a", "b"])));

        let report = repair(&mut catalog).unwrap();
        assert!(report.synthesized.is_empty());
        assert_eq!(report.attached, vec![(p(&["a", "b", "c"]), p(&["a", "b"]))]);
        assert_eq!(catalog.folders[0].children.len(), 1);
    }

    #[test]
    fn test_repair_multi_level_gap() {
        let mut catalog = Catalog {
            spaces: vec![space("a")].into(),
            folders: vec![folder(&["a", "b", "c", "d"])].into(),
            ..Default::default()
        };
        let report = repair(&mut catalog).unwrap();
        assert_eq!(report.passes, 3);
        assert_eq!(catalog.folders.len(), 3);
        assert_eq!(catalog.folders[0].path, p(&["a", "b"]));
        assert!(find_unreferenced_folders(&catalog).is_empty());
    }

    #[test]
    fn test_repair_is_idempotent() {
        let mut catalog = Catalog {
            spaces: vec![space("a")].into(),
            folders: vec![folder(&["a", "b", "c"]), folder(&["a", "z"])].into(),
            ..Default::default()
        };
        let first = repair(&mut catalog).unwrap();
        assert!(!first.is_empty());

        let snapshot = catalog.clone();
        let second = repair(&mut catalog).unwrap();
        assert!(second.is_empty());
        assert_eq!(second.passes, 0);
        assert_eq!(catalog, snapshot);
    }

    #[test]
    fn test_repair_fails_without_root_space() {
        let mut catalog = Catalog {
            spaces: vec![space("other")].into(),
            folders: vec![folder(&["missing", "f"])].into(),
            ..Default::default()
        };
        let err = repair(&mut catalog).unwrap_err();
        assert!(matches!(err, MigrateError::Config(_)));
        assert!(err.to_string().contains("Space not found: missing"));
        assert!(catalog.spaces[0].children.is_empty());
    }

    #[test]
    fn test_repair_rejects_single_segment_folder() {
        let mut catalog = Catalog {
            folders: vec![folder(&["lonely"])].into(),
            ..Default::default()
        };
        let err = repair(&mut catalog).unwrap_err();
        assert!(matches!(err, MigrateError::Repair { .. }));
    }
}
