//! Transport seam for upload exchanges

use crate::protocol::UPLOAD_CONTENT_TYPE;
use async_trait::async_trait;
use bytes::Bytes;
use mirrorpub_core::config::UploadConfig;
use mirrorpub_core::error::{PublishError, Result};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use std::time::Duration;
use url::Url;

/// Carries one upload to a mirror.
///
/// Implementations return the first line of the response body, which is
/// the path the mirror serves the resource under.
#[async_trait]
pub trait UploadTransport: Send + Sync {
    async fn post(&self, url: &Url, body: Bytes) -> Result<String>;
}

/// HTTP transport backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Creates a transport with request and connect timeouts.
    pub fn new(timeout: Duration, connect_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| PublishError::invalid_configuration(format!("HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    pub fn from_config(config: &UploadConfig) -> Result<Self> {
        Self::new(config.timeout(), config.connect_timeout())
    }

    /// Wraps an existing client.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl UploadTransport for HttpTransport {
    async fn post(&self, url: &Url, body: Bytes) -> Result<String> {
        let failed = |e: reqwest::Error| PublishError::transfer_failed(url.as_str(), e.to_string());

        let response = self
            .client
            .post(url.clone())
            .header(CONTENT_TYPE, UPLOAD_CONTENT_TYPE)
            .body(body)
            .send()
            .await
            .map_err(failed)?
            .error_for_status()
            .map_err(failed)?;

        let text = response.text().await.map_err(failed)?;

        first_line(&text)
            .map(str::to_string)
            .ok_or_else(|| PublishError::transfer_failed(url.as_str(), "mirror returned an empty response"))
    }
}

fn first_line(text: &str) -> Option<&str> {
    text.lines().next()
}
