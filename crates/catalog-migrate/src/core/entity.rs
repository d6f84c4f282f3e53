//! Catalog entity types.
//!
//! Only the fields migration reads or writes are typed. Every other field of
//! an exported entity is kept in `extra` and written back unchanged.

use super::path::CatalogPath;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::ops::{Deref, DerefMut};

/// Untyped entity fields carried through migration verbatim.
pub type Extra = Map<String, Value>;

/// List field of an exported entity. Remembers whether the export carried
/// it, so a list that was absent and stayed empty is left out on save.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityList<T> {
    items: Vec<T>,
    present: bool,
}

impl<T> EntityList<T> {
    /// True when the list was not in the input and nothing was added.
    pub fn is_absent(&self) -> bool {
        !self.present && self.items.is_empty()
    }
}

impl<T> Default for EntityList<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            present: false,
        }
    }
}

impl<T> From<Vec<T>> for EntityList<T> {
    fn from(items: Vec<T>) -> Self {
        Self {
            items,
            present: true,
        }
    }
}

impl<T> Deref for EntityList<T> {
    type Target = Vec<T>;

    fn deref(&self) -> &Vec<T> {
        &self.items
    }
}

impl<T> DerefMut for EntityList<T> {
    fn deref_mut(&mut self) -> &mut Vec<T> {
        &mut self.items
    }
}

impl<'a, T> IntoIterator for &'a EntityList<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl<'a, T> IntoIterator for &'a mut EntityList<T> {
    type Item = &'a mut T;
    type IntoIter = std::slice::IterMut<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter_mut()
    }
}

impl<T: Serialize> Serialize for EntityList<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.items.serialize(serializer)
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for EntityList<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Vec::deserialize(deserializer).map(Self::from)
    }
}

pub const CONTAINER_TYPE_FOLDER: &str = "FOLDER";
pub const CHILD_TYPE_CONTAINER: &str = "CONTAINER";

/// Child reference held by a space or folder. Points at another entity by
/// path; it does not own it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<CatalogPath>,

    #[serde(
        rename = "containerType",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub container_type: Option<String>,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    #[serde(flatten)]
    pub extra: Extra,
}

impl ChildRef {
    /// Reference to a folder container.
    pub fn folder(id: Option<String>, path: CatalogPath) -> Self {
        Self {
            id,
            path: Some(path),
            container_type: Some(CONTAINER_TYPE_FOLDER.to_string()),
            kind: Some(CHILD_TYPE_CONTAINER.to_string()),
            extra: Extra::new(),
        }
    }
}

/// Top-level container. Older exports carry only `name`, without `path`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Space {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<CatalogPath>,

    #[serde(default, skip_serializing_if = "EntityList::is_absent")]
    pub children: EntityList<ChildRef>,

    #[serde(flatten)]
    pub extra: Extra,
}

impl Space {
    /// Name used to resolve single-segment parent paths: the explicit `name`,
    /// else the last path segment.
    pub fn display_name(&self) -> Option<&str> {
        self.name
            .as_deref()
            .or_else(|| self.path.as_ref().and_then(CatalogPath::name))
    }
}

/// Nested container under a space or another folder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Folder {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub path: CatalogPath,

    #[serde(default, skip_serializing_if = "EntityList::is_absent")]
    pub children: EntityList<ChildRef>,

    #[serde(flatten)]
    pub extra: Extra,
}

impl Folder {
    /// Folder created during repair to close a gap in the tree.
    pub fn synthesized(path: CatalogPath) -> Self {
        let mut extra = Extra::new();
        extra.insert(
            "accessControlList".to_string(),
            serde_json::json!({ "roles": [] }),
        );
        extra.insert("entityType".to_string(), Value::from("folder"));
        Self {
            id: Some(uuid::Uuid::new_v4().to_string()),
            path,
            children: EntityList::from(Vec::new()),
            extra,
        }
    }
}

/// Virtual or physical dataset. Physical datasets have no `sql`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default)]
    pub path: CatalogPath,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,

    #[serde(rename = "sqlContext", default, skip_serializing_if = "Option::is_none")]
    pub sql_context: Option<CatalogPath>,

    #[serde(flatten)]
    pub extra: Extra,
}

impl Dataset {
    /// Previously parsed representation of the query, if the export has one.
    pub fn parsed_sql(&self) -> Option<&Value> {
        self.extra.get("parsedSql")
    }
}

/// Which datasets a virtual dataset's query depends on. `parents` are
/// slash-joined free text and are not checked against real entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyRecord {
    #[serde(default)]
    pub path: CatalogPath,

    #[serde(default)]
    pub parents: Vec<String>,

    #[serde(flatten)]
    pub extra: Extra,
}

/// In-memory catalog snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default, skip_serializing_if = "EntityList::is_absent")]
    pub spaces: EntityList<Space>,

    #[serde(default, skip_serializing_if = "EntityList::is_absent")]
    pub folders: EntityList<Folder>,

    #[serde(
        default,
        rename = "vds_list",
        alias = "vds",
        skip_serializing_if = "EntityList::is_absent"
    )]
    pub vds: EntityList<Dataset>,

    #[serde(
        default,
        rename = "pds_list",
        alias = "pds",
        skip_serializing_if = "EntityList::is_absent"
    )]
    pub pds: EntityList<Dataset>,

    #[serde(default, skip_serializing_if = "EntityList::is_absent")]
    pub vds_parents: EntityList<DependencyRecord>,

    #[serde(default, skip_serializing_if = "EntityList::is_absent")]
    pub sources: EntityList<Value>,

    #[serde(default, skip_serializing_if = "EntityList::is_absent")]
    pub homes: EntityList<Value>,

    #[serde(flatten)]
    pub extra: Extra,
}

impl Catalog {
    /// Every path declared as a child of some space or folder.
    pub fn child_paths(&self) -> HashSet<&CatalogPath> {
        self.spaces
            .iter()
            .flat_map(|space| space.children.iter())
            .chain(self.folders.iter().flat_map(|folder| folder.children.iter()))
            .filter_map(|child| child.path.as_ref())
            .collect()
    }

    /// Virtual datasets not declared as a child of any container. They still
    /// exist but cannot be browsed to.
    pub fn unreferenced_datasets(&self) -> Vec<&Dataset> {
        let referenced = self.child_paths();
        self.vds
            .iter()
            .filter(|vds| !referenced.contains(&vds.path))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_fields_survive() {
        let json = r#"{
            "id": "f1",
            "path": ["space", "folder"],
            "entityType": "folder",
            "tag": "abc",
            "children": [{"id": "c1", "path": ["space", "folder", "v"], "type": "DATASET", "datasetType": "VIRTUAL"}]
        }"#;
        let folder: Folder = serde_json::from_str(json).unwrap();
        assert_eq!(folder.extra.get("tag"), Some(&Value::from("abc")));
        assert_eq!(folder.children[0].kind.as_deref(), Some("DATASET"));

        let back = serde_json::to_value(&folder).unwrap();
        let original: Value = serde_json::from_str(json).unwrap();
        assert_eq!(back, original);
    }

    #[test]
    fn test_space_display_name_falls_back_to_path() {
        let space: Space = serde_json::from_str(r#"{"path": ["Sales"]}"#).unwrap();
        assert_eq!(space.display_name(), Some("Sales"));
        let space: Space = serde_json::from_str(r#"{"name": "Ops"}"#).unwrap();
        assert_eq!(space.display_name(), Some("Ops"));
    }

    #[test]
    fn test_synthesized_folder_shape() {
        let folder = Folder::synthesized(CatalogPath::new(["a", "b"]));
        assert!(folder.id.is_some());
        assert!(folder.children.is_empty());
        assert_eq!(folder.extra.get("entityType"), Some(&Value::from("folder")));
    }

    #[test]
    fn test_untouched_entities_serialize_as_read() {
        let json = r#"{"spaces":[{"name":"S","zeta":1,"alpha":2}],"vds_list":[{"path":["S","v"],"sql":"select 1","zz":0,"aa":0}],"dremio_version":"24"}"#;
        let catalog: Catalog = serde_json::from_str(json).unwrap();
        assert_eq!(serde_json::to_string(&catalog).unwrap(), json);
    }

    #[test]
    fn test_present_empty_lists_are_kept() {
        let json = r#"{"spaces":[],"folders":[{"path":["s","f"],"children":[]}],"pds_list":[],"sources":[]}"#;
        let mut catalog: Catalog = serde_json::from_str(json).unwrap();
        catalog.sources.clear();
        assert_eq!(serde_json::to_string(&catalog).unwrap(), json);
    }

    #[test]
    fn test_absent_list_appears_once_filled() {
        let mut space: Space = serde_json::from_str(r#"{"name":"S"}"#).unwrap();
        assert!(space.children.is_absent());
        space
            .children
            .push(ChildRef::folder(None, CatalogPath::new(["S", "f"])));
        let json = serde_json::to_value(&space).unwrap();
        assert_eq!(json["children"][0]["path"], serde_json::json!(["S", "f"]));

        let folder = Folder::synthesized(CatalogPath::new(["S", "f"]));
        let json = serde_json::to_value(&folder).unwrap();
        assert_eq!(json["children"], serde_json::json!([]));
    }

    #[test]
    fn test_catalog_accepts_list_aliases() {
        let json = r#"{"vds": [{"path": ["s", "v"], "sql": "select 1"}], "pds": []}"#;
        let catalog: Catalog = serde_json::from_str(json).unwrap();
        assert_eq!(catalog.vds.len(), 1);
        assert_eq!(catalog.unreferenced_datasets().len(), 1);
    }
}
