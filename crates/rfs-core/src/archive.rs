//! Scratch archive creation
//!
//! Directories are packed into a gzip-compressed tar file in a scratch
//! directory. The resulting artifact deletes that file once streaming ends.

use crate::artifact::{StreamOutcome, StreamableArtifact};
use crate::error::{RfsError, Result};
use crate::inspector::display_name;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs;
use std::io::Write;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Suffix of scratch archives and of suggested download names
pub const ARCHIVE_SUFFIX: &str = ".tgz";

const SCRATCH_PREFIX: &str = "rfs-";

/// Builds `.tgz` archives of filesystem subtrees
#[derive(Debug, Clone)]
pub struct ArchiveBuilder {
    scratch_dir: PathBuf,
}

impl Default for ArchiveBuilder {
    fn default() -> Self {
        Self::new(std::env::temp_dir())
    }
}

impl ArchiveBuilder {
    pub fn new(scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            scratch_dir: scratch_dir.into(),
        }
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    /// Archive `path` into a fresh scratch file.
    ///
    /// Entries are rooted at the final component of `path`. On error no
    /// scratch file is left behind. This does blocking IO.
    pub fn build(&self, path: &Path) -> Result<StreamableArtifact> {
        let metadata = fs::metadata(path).map_err(|e| RfsError::from_io(path, e))?;
        let root_name = display_name(path);

        // NamedTempFile removes itself on drop, covering every early return.
        let scratch = tempfile::Builder::new()
            .prefix(SCRATCH_PREFIX)
            .suffix(ARCHIVE_SUFFIX)
            .tempfile_in(&self.scratch_dir)?;
        debug!(
            "Archiving {} into {}",
            path.display(),
            scratch.path().display()
        );

        // The scratch directory may sit inside the tree being archived.
        let skip = FileId::of(&scratch.as_file().metadata()?);

        let encoder = GzEncoder::new(scratch.as_file(), Compression::default());
        let mut archive = tar::Builder::new(encoder);
        archive.follow_symlinks(false);
        if metadata.is_dir() {
            append_tree(&mut archive, Path::new(&root_name), path, skip)?;
        } else {
            append_entry(&mut archive, Path::new(&root_name), path, &metadata)?;
        }
        let mut encoder = archive.into_inner()?;
        encoder.flush()?;
        encoder.finish()?;
        scratch.as_file().sync_all()?;

        let scratch_path = scratch.into_temp_path();
        info!(
            "Built archive of {} at {}",
            path.display(),
            scratch_path.display()
        );

        let filename = format!("{}{}", root_name, ARCHIVE_SUFFIX);
        Ok(
            StreamableArtifact::new(scratch_path.to_path_buf(), filename).with_cleanup(
                move |outcome: StreamOutcome| {
                    let location = scratch_path.to_path_buf();
                    match scratch_path.close() {
                        Ok(()) => debug!(
                            "Removed scratch archive {} ({:?})",
                            location.display(),
                            outcome
                        ),
                        Err(e) => warn!(
                            "Failed to remove scratch archive {}: {}",
                            location.display(),
                            e
                        ),
                    }
                },
            ),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileId {
    dev: u64,
    ino: u64,
}

impl FileId {
    fn of(metadata: &fs::Metadata) -> Self {
        Self {
            dev: metadata.dev(),
            ino: metadata.ino(),
        }
    }
}

/// Append a regular file or symlink. FIFOs, sockets and devices are left out.
fn append_entry<W: Write>(
    archive: &mut tar::Builder<W>,
    name: &Path,
    path: &Path,
    metadata: &fs::Metadata,
) -> Result<()> {
    let file_type = metadata.file_type();
    if file_type.is_file() || file_type.is_symlink() {
        archive.append_path_with_name(path, name)?;
    } else {
        debug!("Skipping special file {}", path.display());
    }
    Ok(())
}

/// Recursively append `dir` under `name`, leaving out the file `skip`.
/// Symlinks are stored as links.
fn append_tree<W: Write>(
    archive: &mut tar::Builder<W>,
    name: &Path,
    dir: &Path,
    skip: FileId,
) -> Result<()> {
    let mut pending = vec![(name.to_path_buf(), dir.to_path_buf())];

    while let Some((name, dir)) = pending.pop() {
        archive.append_dir(&name, &dir)?;

        let mut entries = fs::read_dir(&dir)
            .map_err(|e| RfsError::from_io(&dir, e))?
            .collect::<std::io::Result<Vec<_>>>()
            .map_err(|e| RfsError::from_io(&dir, e))?;
        entries.sort_by_key(|entry| entry.file_name());

        for entry in entries {
            let path = entry.path();
            let entry_name = name.join(entry.file_name());
            let metadata = fs::symlink_metadata(&path).map_err(|e| RfsError::from_io(&path, e))?;

            if FileId::of(&metadata) == skip {
                debug!("Skipping scratch archive {}", path.display());
            } else if metadata.is_dir() {
                pending.push((entry_name, path));
            } else {
                append_entry(archive, &entry_name, &path, &metadata)?;
            }
        }
    }

    Ok(())
}
