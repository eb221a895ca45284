//! The active resource-loading mechanism
//!
//! A [`ResourceSource`] is an ordered list of roots, each a directory or a
//! zip archive. A path resolves against the first root that contains it,
//! so the rest of the system never needs to know which storage form is
//! in use.

use crate::tree::{open_archive, zip_error, ArchiveTree, DirectoryTree, ResourceTree};
use mirrorpub_core::config::{ResourceRootConfig, RootKind};
use mirrorpub_core::error::{PublishError, Result};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A single location resources are loaded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceRoot {
    /// Loose files below a directory
    Directory(PathBuf),
    /// Entries of a zip archive
    Archive(PathBuf),
}

impl From<&ResourceRootConfig> for ResourceRoot {
    fn from(config: &ResourceRootConfig) -> Self {
        match config.kind {
            RootKind::Directory => ResourceRoot::Directory(config.path.clone()),
            RootKind::Archive => ResourceRoot::Archive(config.path.clone()),
        }
    }
}

/// Ordered set of resource roots.
#[derive(Debug, Clone, Default)]
pub struct ResourceSource {
    roots: Vec<ResourceRoot>,
}

impl ResourceSource {
    /// Creates a source over the given roots, searched in order.
    pub fn new(roots: Vec<ResourceRoot>) -> Self {
        Self { roots }
    }

    /// Creates a source from the `package.roots` configuration.
    pub fn from_config(roots: &[ResourceRootConfig]) -> Self {
        Self::new(roots.iter().map(ResourceRoot::from).collect())
    }

    /// Creates a source with a single directory root.
    pub fn directory<P: AsRef<Path>>(path: P) -> Self {
        Self::new(vec![ResourceRoot::Directory(path.as_ref().to_path_buf())])
    }

    /// Creates a source with a single archive root.
    pub fn archive<P: AsRef<Path>>(path: P) -> Self {
        Self::new(vec![ResourceRoot::Archive(path.as_ref().to_path_buf())])
    }

    pub fn roots(&self) -> &[ResourceRoot] {
        &self.roots
    }

    /// Resolves `base_path` to the tree of the first root containing it.
    ///
    /// Fails with NotFound if no root holds the base path.
    pub fn tree(&self, base_path: &str) -> Result<Box<dyn ResourceTree>> {
        let prefix = normalize_base_path(base_path)?;

        for root in &self.roots {
            match root {
                ResourceRoot::Directory(dir) => {
                    let candidate = dir.join(prefix.trim_end_matches('/'));
                    if candidate.is_dir() {
                        debug!(base = %prefix, root = %dir.display(), "Resolved package to directory");
                        return Ok(Box::new(DirectoryTree::new(candidate)?));
                    }
                }
                ResourceRoot::Archive(path) => match archive_contains_prefix(path, &prefix) {
                    Ok(true) => {
                        debug!(base = %prefix, archive = %path.display(), "Resolved package to archive");
                        return Ok(Box::new(ArchiveTree::new(path, prefix)));
                    }
                    Ok(false) => {}
                    Err(e) => {
                        warn!(archive = %path.display(), error = %e, "Skipping unreadable archive root");
                    }
                },
            }
        }

        Err(PublishError::not_found(base_path))
    }

    /// Lists every file below `base_path`, relative to it.
    pub fn list(&self, base_path: &str) -> Result<Vec<String>> {
        self.tree(base_path)?.list()
    }

    /// Reads the full content of the resource at `path`.
    pub fn read(&self, path: &str) -> Result<Vec<u8>> {
        let path = normalize_resource_path(path)?;

        for root in &self.roots {
            match root {
                ResourceRoot::Directory(dir) => {
                    let candidate = dir.join(&path);
                    if candidate.is_file() {
                        return Ok(std::fs::read(candidate)?);
                    }
                }
                ResourceRoot::Archive(archive_path) => {
                    let mut archive = match open_archive(archive_path) {
                        Ok(archive) => archive,
                        Err(e) => {
                            warn!(archive = %archive_path.display(), error = %e, "Skipping unreadable archive root");
                            continue;
                        }
                    };
                    let mut entry = match archive.by_name(&path) {
                        Ok(entry) => entry,
                        Err(zip::result::ZipError::FileNotFound) => continue,
                        Err(e) => return Err(zip_error(e)),
                    };
                    if entry.is_dir() {
                        continue;
                    }
                    let mut buffer = Vec::with_capacity(preallocation(entry.size()));
                    entry.read_to_end(&mut buffer)?;
                    return Ok(buffer);
                }
            }
        }

        Err(PublishError::not_found(path))
    }
}

/// Upper bound on the buffer reserved from an archive entry's declared size.
const MAX_PREALLOCATION: u64 = 1024 * 1024;

/// Buffer capacity for an entry declaring `size` bytes; the header is not
/// trusted beyond [`MAX_PREALLOCATION`].
fn preallocation(size: u64) -> usize {
    size.min(MAX_PREALLOCATION) as usize
}

fn archive_contains_prefix(path: &Path, prefix: &str) -> Result<bool> {
    let archive = open_archive(path)?;
    let found = archive
        .file_names()
        .any(|name| name.replace('\\', "/").starts_with(prefix));
    Ok(found)
}

/// Normalizes a package base path: no leading `/`, exactly one trailing
/// `/`, no `..` components.
pub fn normalize_base_path(base_path: &str) -> Result<String> {
    let trimmed = normalize_resource_path(base_path)?;
    let trimmed = trimmed.trim_end_matches('/');
    if trimmed.is_empty() {
        return Ok(String::new());
    }
    Ok(format!("{}/", trimmed))
}

/// Normalizes a resource path: `/` separators, no leading `/`, no `..`.
pub fn normalize_resource_path(path: &str) -> Result<String> {
    let path = path.replace('\\', "/");
    if path.split('/').any(|part| part == "..") {
        return Err(PublishError::precondition(format!(
            "resource path '{}' must not contain '..'",
            path
        )));
    }
    Ok(path.trim_start_matches('/').to_string())
}
