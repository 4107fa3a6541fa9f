//! Filesystem node inspection
//!
//! Turns one path into a [`NodeDescriptor`]. Directories get their immediate
//! children described as well; nothing deeper is visited.

use crate::codec;
use crate::error::{RfsError, Result};
use nix::unistd::{Gid, Group, Uid, User};
use rfs_types::{routes, NodeDescriptor, NodeLinks, PermissionMode};
use std::fs::{self, Metadata};
use std::io;
use std::os::unix::fs::MetadataExt;
use std::path::Path;
use tracing::debug;

/// Display name used for the filesystem root
pub const ROOT_NAME: &str = "ROOT";

/// Builds node descriptors from filesystem metadata
#[derive(Debug, Clone, Copy, Default)]
pub struct NodeInspector;

impl NodeInspector {
    pub fn new() -> Self {
        Self
    }

    /// Describe `path`, listing one level of children if it is a directory.
    pub fn describe(&self, path: &Path) -> Result<NodeDescriptor> {
        let metadata = fs::metadata(path).map_err(|e| RfsError::from_io(path, e))?;
        let mut node = self.describe_entry(path, display_name(path), &metadata);

        if metadata.is_dir() {
            let (files, dirs) = self.list_children(path)?;
            node.child_files = Some(files);
            node.child_directories = Some(dirs);
        }

        Ok(node)
    }

    fn list_children(&self, dir: &Path) -> Result<(Vec<NodeDescriptor>, Vec<NodeDescriptor>)> {
        let mut files = Vec::new();
        let mut dirs = Vec::new();

        for entry in fs::read_dir(dir).map_err(|e| RfsError::from_io(dir, e))? {
            let entry = entry.map_err(|e| RfsError::from_io(dir, e))?;
            let child = entry.path();
            let metadata = child_metadata(&child)?;
            let name = entry.file_name().to_string_lossy().into_owned();

            let node = self.describe_entry(&child, name, &metadata);
            if metadata.is_dir() {
                dirs.push(node);
            } else {
                files.push(node);
            }
        }

        files.sort_by(|a, b| a.display_name.cmp(&b.display_name));
        dirs.sort_by(|a, b| a.display_name.cmp(&b.display_name));
        debug!(
            "Listed {}: {} files, {} dirs",
            dir.display(),
            files.len(),
            dirs.len()
        );
        Ok((files, dirs))
    }

    /// Describe a single entry without looking at its children.
    pub fn describe_entry(
        &self,
        path: &Path,
        display_name: String,
        metadata: &Metadata,
    ) -> NodeDescriptor {
        let identifier = codec::encode(path);
        let is_directory = metadata.is_dir();

        let download = if is_directory {
            format!("{}{}", routes::ARCHIVE, identifier)
        } else {
            format!("{}{}", routes::CONTENT, identifier)
        };

        let mime_type = guess_mime(path);
        let mime_group = mime_type
            .split('/')
            .next()
            .unwrap_or_default()
            .to_string();

        NodeDescriptor {
            links: NodeLinks {
                self_link: format!("{}{}", routes::NODE, identifier),
                download,
                delete: None,
            },
            is_directory,
            identifier,
            full_path: path.to_string_lossy().into_owned(),
            display_name,
            access_time: seconds(metadata.atime(), metadata.atime_nsec()),
            modify_time: seconds(metadata.mtime(), metadata.mtime_nsec()),
            change_time: seconds(metadata.ctime(), metadata.ctime_nsec()),
            size_bytes: metadata.size(),
            permission_mode: PermissionMode {
                label: mode_label(metadata.mode()),
                numeric: mode_numeric(metadata.mode()),
            },
            owner_name: owner_name(metadata.uid()),
            group_name: group_name(metadata.gid()),
            mime_type,
            mime_group,
            child_files: None,
            child_directories: None,
        }
    }
}

/// Final path component, or [`ROOT_NAME`] for the root.
pub fn display_name(path: &Path) -> String {
    match path.file_name() {
        Some(name) => name.to_string_lossy().into_owned(),
        None if path.parent().is_none() && path.has_root() => ROOT_NAME.to_string(),
        None => path.to_string_lossy().into_owned(),
    }
}

/// Guess a MIME type from the path's extension.
pub fn guess_mime(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

/// Render the permission bits as `rwxrwxrwx`.
pub fn mode_label(mode: u32) -> String {
    [(mode >> 6) & 0o7, (mode >> 3) & 0o7, mode & 0o7]
        .into_iter()
        .flat_map(|triad| {
            [
                if triad & 0b100 != 0 { 'r' } else { '-' },
                if triad & 0b010 != 0 { 'w' } else { '-' },
                if triad & 0b001 != 0 { 'x' } else { '-' },
            ]
        })
        .collect()
}

/// Permission bits as their octal digits read in decimal (`0o640` -> `640`).
pub fn mode_numeric(mode: u32) -> u32 {
    ((mode >> 6) & 0o7) * 100 + ((mode >> 3) & 0o7) * 10 + (mode & 0o7)
}

fn child_metadata(path: &Path) -> Result<Metadata> {
    match fs::metadata(path) {
        Ok(metadata) => Ok(metadata),
        // Dangling symlink: describe the link itself.
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            fs::symlink_metadata(path).map_err(|e| RfsError::from_io(path, e))
        }
        Err(e) => Err(RfsError::from_io(path, e)),
    }
}

fn seconds(secs: i64, nsecs: i64) -> f64 {
    secs as f64 + nsecs as f64 / 1_000_000_000.0
}

fn owner_name(uid: u32) -> String {
    match User::from_uid(Uid::from_raw(uid)) {
        Ok(Some(user)) => user.name,
        Ok(None) => {
            debug!("No user entry for uid {}", uid);
            uid.to_string()
        }
        Err(e) => {
            debug!("User lookup for uid {} failed: {}", uid, e);
            uid.to_string()
        }
    }
}

fn group_name(gid: u32) -> String {
    match Group::from_gid(Gid::from_raw(gid)) {
        Ok(Some(group)) => group.name,
        Ok(None) => {
            debug!("No group entry for gid {}", gid);
            gid.to_string()
        }
        Err(e) => {
            debug!("Group lookup for gid {} failed: {}", gid, e);
            gid.to_string()
        }
    }
}
