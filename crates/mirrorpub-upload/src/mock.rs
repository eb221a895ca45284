//! Recording transport for tests

use crate::transport::UploadTransport;
use async_trait::async_trait;
use bytes::Bytes;
use mirrorpub_core::error::{PublishError, Result};
use parking_lot::Mutex;
use std::collections::HashSet;
use url::Url;

/// One upload seen by a [`RecordingTransport`].
#[derive(Debug, Clone)]
pub struct RecordedUpload {
    pub url: Url,
    pub body: Bytes,
}

impl RecordedUpload {
    /// Decoded value of a query parameter.
    pub fn param(&self, name: &str) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    }

    pub fn file_path(&self) -> String {
        self.param("filePath").unwrap_or_default()
    }

    pub fn is_main_page(&self) -> bool {
        self.param("mainPage").as_deref() == Some("true")
    }

    pub fn is_icon(&self) -> bool {
        self.param("icon").as_deref() == Some("true")
    }

    pub fn host(&self) -> String {
        self.url.host_str().unwrap_or_default().to_string()
    }
}

/// Transport that records every upload and answers with
/// `/<appId>/<filePath>`.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    uploads: Mutex<Vec<RecordedUpload>>,
    failing_hosts: Mutex<HashSet<String>>,
    fail_at: Mutex<Option<usize>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every upload to `host` fail with TransferFailed.
    pub fn fail_host(&self, host: impl Into<String>) {
        self.failing_hosts.lock().insert(host.into());
    }

    pub fn recover_host(&self, host: &str) {
        self.failing_hosts.lock().remove(host);
    }

    /// Fails every upload attempted once `succeeded` uploads went through.
    pub fn fail_after(&self, succeeded: usize) {
        *self.fail_at.lock() = Some(succeeded);
    }

    pub fn uploads(&self) -> Vec<RecordedUpload> {
        self.uploads.lock().clone()
    }

    /// Uploads that reached `host`.
    pub fn uploads_to(&self, host: &str) -> Vec<RecordedUpload> {
        self.uploads
            .lock()
            .iter()
            .filter(|upload| upload.host() == host)
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.uploads.lock().clear();
    }
}

#[async_trait]
impl UploadTransport for RecordingTransport {
    async fn post(&self, url: &Url, body: Bytes) -> Result<String> {
        let upload = RecordedUpload {
            url: url.clone(),
            body,
        };

        if self.failing_hosts.lock().contains(&upload.host()) {
            return Err(PublishError::transfer_failed(url.as_str(), "connection refused"));
        }

        let mut uploads = self.uploads.lock();
        if *self.fail_at.lock() == Some(uploads.len()) {
            return Err(PublishError::transfer_failed(url.as_str(), "connection reset"));
        }

        let served = format!(
            "/{}/{}",
            upload.param("appId").unwrap_or_default(),
            upload.file_path()
        );
        uploads.push(upload);
        Ok(served)
    }
}
