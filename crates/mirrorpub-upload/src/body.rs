//! Upload bodies
//!
//! A [`ByteSource`] is read to the end just before its upload is sent, so
//! the caller keeps ownership of the underlying file or resource until
//! then.

use async_trait::async_trait;
use bytes::Bytes;
use mirrorpub_core::error::{PublishError, Result};
use mirrorpub_resources::ResourceSource;
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

/// Anything that can produce the full body of one upload.
#[async_trait]
pub trait ByteSource: Send + Sync + fmt::Debug {
    async fn read_all(&self) -> Result<Bytes>;
}

/// In-memory body.
#[derive(Debug, Clone)]
pub struct MemoryBody(Bytes);

impl MemoryBody {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }
}

#[async_trait]
impl ByteSource for MemoryBody {
    async fn read_all(&self) -> Result<Bytes> {
        Ok(self.0.clone())
    }
}

/// Body read from a local file.
#[derive(Debug, Clone)]
pub struct FileBody {
    path: PathBuf,
}

impl FileBody {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ByteSource for FileBody {
    async fn read_all(&self) -> Result<Bytes> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(Bytes::from(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(PublishError::not_found(self.path.display().to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Body read from the active resource source.
#[derive(Debug, Clone)]
pub struct ResourceBody {
    resources: Arc<ResourceSource>,
    path: String,
}

impl ResourceBody {
    pub fn new(resources: Arc<ResourceSource>, path: impl Into<String>) -> Self {
        Self {
            resources,
            path: path.into(),
        }
    }
}

#[async_trait]
impl ByteSource for ResourceBody {
    async fn read_all(&self) -> Result<Bytes> {
        let resources = Arc::clone(&self.resources);
        let path = self.path.clone();
        let bytes = blocking(move || resources.read(&path)).await?;
        Ok(Bytes::from(bytes))
    }
}

/// Runs blocking resource access off the async workers.
pub(crate) async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| PublishError::Io(io::Error::new(io::ErrorKind::Other, e)))?
}
