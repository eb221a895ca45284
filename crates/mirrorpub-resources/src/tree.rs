//! Read-only listings of resource trees
//!
//! A [`ResourceTree`] yields the relative web paths (forward slashes) of
//! every file below a base path. Two storage forms exist: a loose
//! directory hierarchy and the entries of a zip archive.

use mirrorpub_core::error::{PublishError, Result};
use std::fs::File;
use std::io;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;
use zip::ZipArchive;

/// A listable tree of resources below a base path.
///
/// Listing is restartable: every call walks the storage again.
pub trait ResourceTree: Send + Sync {
    /// Lists the paths of all files, relative to the base, `/`-separated.
    fn list(&self) -> Result<Vec<String>>;
}

/// Resources stored as regular files below a directory.
#[derive(Debug, Clone)]
pub struct DirectoryTree {
    root: PathBuf,
}

impl DirectoryTree {
    /// Creates a tree rooted at `root`, which must be an existing directory.
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(PublishError::not_found(root.display().to_string()));
        }
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ResourceTree for DirectoryTree {
    fn list(&self) -> Result<Vec<String>> {
        let mut resources = Vec::new();

        for entry in WalkDir::new(&self.root).follow_links(true).sort_by_file_name() {
            let entry = entry.map_err(io::Error::from)?;
            if !entry.file_type().is_file() {
                continue;
            }

            let rel_path = entry.path().strip_prefix(&self.root).map_err(|_| {
                PublishError::precondition(format!(
                    "{} is not below {}",
                    entry.path().display(),
                    self.root.display()
                ))
            })?;

            resources.push(to_web_path(rel_path));
        }

        tracing::trace!(
            root = %self.root.display(),
            count = resources.len(),
            "Listed directory tree"
        );

        Ok(resources)
    }
}

/// Resources stored as entries of a zip archive below a name prefix.
#[derive(Debug, Clone)]
pub struct ArchiveTree {
    archive: PathBuf,
    prefix: String,
}

impl ArchiveTree {
    /// Creates a tree over the entries of `archive` starting with `prefix`.
    ///
    /// `prefix` is a normalized base path (ending in `/`, or empty for the
    /// whole archive).
    pub fn new<P: AsRef<Path>>(archive: P, prefix: impl Into<String>) -> Self {
        Self {
            archive: archive.as_ref().to_path_buf(),
            prefix: prefix.into(),
        }
    }

    pub fn archive(&self) -> &Path {
        &self.archive
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

impl ResourceTree for ArchiveTree {
    fn list(&self) -> Result<Vec<String>> {
        let mut archive = open_archive(&self.archive)?;
        let mut resources = Vec::new();

        for i in 0..archive.len() {
            let entry = archive.by_index_raw(i).map_err(zip_error)?;
            if entry.is_dir() {
                continue;
            }

            let name = entry.name().replace('\\', "/");
            if let Some(relative) = name.strip_prefix(&self.prefix) {
                if !relative.is_empty() {
                    resources.push(relative.to_string());
                }
            }
        }

        tracing::trace!(
            archive = %self.archive.display(),
            prefix = %self.prefix,
            count = resources.len(),
            "Listed archive tree"
        );

        Ok(resources)
    }
}

/// Opens a zip archive from disk.
pub(crate) fn open_archive(path: &Path) -> Result<ZipArchive<File>> {
    let file = File::open(path)?;
    ZipArchive::new(file).map_err(zip_error)
}

pub(crate) fn zip_error(err: zip::result::ZipError) -> PublishError {
    PublishError::Io(io::Error::new(io::ErrorKind::InvalidData, err))
}

/// Joins the normal components of a relative path with `/`.
fn to_web_path(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
