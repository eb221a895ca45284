//! Resource access for mirror publishing
//!
//! This crate provides the virtual read-only file listing the publisher
//! uploads from, and the template renderer for dynamic pages:
//! - [`ResourceTree`]: relative web paths of all files below a base path,
//!   backed by a loose directory ([`DirectoryTree`]) or a zip archive
//!   ([`ArchiveTree`])
//! - [`ResourceSource`]: ordered resource roots; resolves base paths and
//!   reads resource bytes regardless of storage form
//! - [`TemplateRenderer`]: literal placeholder substitution

pub mod source;
pub mod template;
pub mod tree;

pub use source::{normalize_base_path, normalize_resource_path, ResourceRoot, ResourceSource};
pub use template::{substitute, TemplateRenderer};
pub use tree::{ArchiveTree, DirectoryTree, ResourceTree};
