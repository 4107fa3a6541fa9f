//! Node descriptor types

use serde::{Deserialize, Serialize};

/// Permission bits rendered two ways
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionMode {
    /// Symbolic form, e.g. `rw-r--r--`
    pub label: String,
    /// Octal digits read as a decimal number, e.g. `644`
    #[serde(rename = "value")]
    pub numeric: u32,
}

/// Hypermedia links attached to every node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeLinks {
    #[serde(rename = "self")]
    pub self_link: String,
    pub download: String,
    /// Always `None` until deletion exists
    pub delete: Option<String>,
}

/// Metadata about one filesystem entry.
///
/// Directory descriptors carry one level of children in `child_files` and
/// `child_directories`; the children themselves never do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDescriptor {
    #[serde(rename = "_links")]
    pub links: NodeLinks,
    #[serde(rename = "is_dir")]
    pub is_directory: bool,
    #[serde(rename = "node_id")]
    pub identifier: String,
    #[serde(rename = "full_name")]
    pub full_path: String,
    #[serde(rename = "short_name")]
    pub display_name: String,
    #[serde(rename = "atime")]
    pub access_time: f64,
    #[serde(rename = "mtime")]
    pub modify_time: f64,
    #[serde(rename = "ctime")]
    pub change_time: f64,
    #[serde(rename = "size")]
    pub size_bytes: u64,
    #[serde(rename = "mode")]
    pub permission_mode: PermissionMode,
    #[serde(rename = "owner")]
    pub owner_name: String,
    #[serde(rename = "group")]
    pub group_name: String,
    pub mime_type: String,
    pub mime_group: String,
    #[serde(rename = "files", default, skip_serializing_if = "Option::is_none")]
    pub child_files: Option<Vec<NodeDescriptor>>,
    #[serde(rename = "dirs", default, skip_serializing_if = "Option::is_none")]
    pub child_directories: Option<Vec<NodeDescriptor>>,
}

impl NodeDescriptor {
    /// Children of a directory node, files first. Empty for file nodes.
    pub fn children(&self) -> impl Iterator<Item = &NodeDescriptor> {
        self.child_files
            .iter()
            .flatten()
            .chain(self.child_directories.iter().flatten())
    }
}
