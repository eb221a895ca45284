//! # mirrorpub upload
//!
//! The static resource upload protocol and the per-mirror uploader.
//!
//! - [`protocol`]: upload endpoint identity and URL construction
//! - [`transport`]: the [`UploadTransport`] seam and its HTTP implementation
//! - [`body`]: upload bodies from memory, files and the resource source
//! - [`uploader`]: [`ResourceUploader`], single uploads and package batches

pub mod body;
pub mod protocol;
pub mod transport;
pub mod uploader;

#[cfg(any(test, feature = "test-util"))]
pub mod mock;

pub use body::{ByteSource, FileBody, MemoryBody, ResourceBody};
pub use protocol::{UploadEndpoint, UploadEndpointBuilder, UploadRequest};
pub use transport::{HttpTransport, UploadTransport};
pub use uploader::ResourceUploader;
