//! Per-mirror resource uploader
//!
//! One [`ResourceUploader`] exists for every mirror with a known API URL.
//! Uploads through the same uploader never overlap; uploaders of
//! different mirrors run independently.

use crate::body::{blocking, ByteSource, FileBody, MemoryBody, ResourceBody};
use crate::protocol::{UploadEndpoint, UploadRequest};
use crate::transport::UploadTransport;
use bytes::Bytes;
use mirrorpub_core::error::{require_non_empty, PublishError, Result};
use mirrorpub_core::types::ResourceRegistrationConfig;
use mirrorpub_resources::{normalize_base_path, ResourceSource};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Uploads resources to a single mirror.
pub struct ResourceUploader {
    endpoint: UploadEndpoint,
    transport: Arc<dyn UploadTransport>,
    resources: Arc<ResourceSource>,
    in_flight: Mutex<()>,
}

impl fmt::Debug for ResourceUploader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceUploader")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl ResourceUploader {
    pub fn new(
        endpoint: UploadEndpoint,
        transport: Arc<dyn UploadTransport>,
        resources: Arc<ResourceSource>,
    ) -> Self {
        Self {
            endpoint,
            transport,
            resources,
            in_flight: Mutex::new(()),
        }
    }

    pub fn endpoint(&self) -> &UploadEndpoint {
        &self.endpoint
    }

    /// Uploads an in-memory body.
    pub async fn upload_bytes(
        &self,
        bytes: impl Into<Bytes>,
        target_path: &str,
        registration: Option<&ResourceRegistrationConfig>,
    ) -> Result<String> {
        self.upload_stream(&MemoryBody::new(bytes), target_path, registration)
            .await
    }

    /// Uploads the content of a local file.
    pub async fn upload_file(
        &self,
        path: impl AsRef<Path>,
        target_path: &str,
        registration: Option<&ResourceRegistrationConfig>,
    ) -> Result<String> {
        self.upload_stream(&FileBody::new(path.as_ref()), target_path, registration)
            .await
    }

    /// Uploads a resource read through the active resource source.
    pub async fn upload_resource(
        &self,
        resource_path: &str,
        target_path: &str,
        registration: Option<&ResourceRegistrationConfig>,
    ) -> Result<String> {
        require_non_empty("resourcePath", resource_path)?;
        let body = ResourceBody::new(Arc::clone(&self.resources), resource_path);
        self.upload_stream(&body, target_path, registration).await
    }

    /// Uploads the body produced by `source` under `target_path`.
    ///
    /// Without a registration the resource is published unregistered.
    /// Returns the path the mirror serves the resource under.
    pub async fn upload_stream(
        &self,
        source: &dyn ByteSource,
        target_path: &str,
        registration: Option<&ResourceRegistrationConfig>,
    ) -> Result<String> {
        let request = UploadRequest::new(target_path, registration)?;
        let url = self.endpoint.upload_url(&request)?;

        let _guard = self.in_flight.lock().await;

        let body = source.read_all().await.map_err(|e| match e {
            PublishError::Io(io) => PublishError::transfer_failed(url.as_str(), io.to_string()),
            other => other,
        })?;

        debug!(
            mirror = %self.endpoint.api_url(),
            target = %request.file_path(),
            view = request.view_id().unwrap_or(""),
            main_page = request.is_main_page(),
            icon = request.is_icon(),
            size = body.len(),
            "Uploading resource"
        );

        self.transport.post(&url, body).await
    }

    /// Uploads every resource below `base_path` to the same relative path
    /// on the mirror.
    ///
    /// See [`upload_package_to`](Self::upload_package_to).
    pub async fn upload_package(
        &self,
        base_path: &str,
        main_pages: &HashMap<String, String>,
        icons: &HashMap<String, String>,
    ) -> Result<HashMap<String, String>> {
        self.upload_package_to(base_path, "", main_pages, icons)
            .await
    }

    /// Uploads every resource below `base_path`, prefixing each target
    /// path with `url_base_path`.
    ///
    /// Resources named in `icons` are registered as icons of their view.
    /// Resources named in `main_pages` are uploaded a second time after all
    /// other resources of the batch, registered as the main page of their
    /// view. The batch stops at the first failing upload; resources
    /// already sent stay on the mirror.
    ///
    /// Returns the served path of every resource, keyed by resource path.
    pub async fn upload_package_to(
        &self,
        base_path: &str,
        url_base_path: &str,
        main_pages: &HashMap<String, String>,
        icons: &HashMap<String, String>,
    ) -> Result<HashMap<String, String>> {
        require_non_empty("basePath", base_path)?;
        let base = normalize_base_path(base_path)?;
        let url_base = normalize_base_path(url_base_path)?;

        let listed = {
            let resources = Arc::clone(&self.resources);
            let base = base.clone();
            blocking(move || resources.list(&base)).await?
        };

        let mut served_paths = HashMap::with_capacity(listed.len());
        let mut deferred = Vec::new();

        for relative in &listed {
            let resource_path = format!("{}{}", base, relative);
            let target_path = format!("{}{}", url_base, relative);

            let registration = icons
                .get(&resource_path)
                .map(|view_id| ResourceRegistrationConfig::icon(view_id.as_str()))
                .transpose()?;

            let served = self
                .upload_resource(&resource_path, &target_path, registration.as_ref())
                .await?;

            if let Some(view_id) = main_pages.get(&resource_path) {
                deferred.push((
                    resource_path.clone(),
                    target_path,
                    ResourceRegistrationConfig::main_page(view_id.as_str())?,
                ));
            }
            served_paths.insert(resource_path, served);
        }

        let main_page_count = deferred.len();
        for (resource_path, target_path, registration) in deferred {
            let served = self
                .upload_resource(&resource_path, &target_path, Some(&registration))
                .await?;
            served_paths.insert(resource_path, served);
        }

        info!(
            mirror = %self.endpoint.api_url(),
            base = %base,
            resources = listed.len(),
            main_pages = main_page_count,
            "Uploaded resource package"
        );

        Ok(served_paths)
    }

    /// Uploads a package holding a single view.
    pub async fn upload_view_package(
        &self,
        base_path: &str,
        view_id: &str,
        main_page: Option<&str>,
        icon: Option<&str>,
    ) -> Result<HashMap<String, String>> {
        require_non_empty("viewId", view_id)?;
        let single = |resource: Option<&str>| -> HashMap<String, String> {
            resource
                .map(|path| (path.to_string(), view_id.to_string()))
                .into_iter()
                .collect()
        };

        self.upload_package(base_path, &single(main_page), &single(icon))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::RecordingTransport;
    use tempfile::TempDir;

    const PACKAGE: &[(&str, &str)] = &[
        ("views/quote.html", "<html>quote</html>"),
        ("views/quote.png", "png"),
        ("views/style.css", "body {}"),
    ];

    fn setup(files: &[(&str, &str)]) -> (TempDir, Arc<RecordingTransport>, ResourceUploader) {
        let temp = TempDir::new().unwrap();
        for (name, content) in files {
            let path = temp.path().join(name);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, content).unwrap();
        }

        let endpoint = UploadEndpoint::builder()
            .mirror_api_url("http://10.0.0.5:2534/api")
            .app_id("app1")
            .user_id("u1")
            .build()
            .unwrap();
        let transport = Arc::new(RecordingTransport::new());
        let uploader = ResourceUploader::new(
            endpoint,
            transport.clone(),
            Arc::new(ResourceSource::directory(temp.path())),
        );
        (temp, transport, uploader)
    }

    fn quote_view() -> (HashMap<String, String>, HashMap<String, String>) {
        let main_pages = HashMap::from([("views/quote.html".to_string(), "QuoteView".to_string())]);
        let icons = HashMap::from([("views/quote.png".to_string(), "QuoteView".to_string())]);
        (main_pages, icons)
    }

    #[tokio::test]
    async fn test_upload_bytes_without_registration() {
        let (_temp, transport, uploader) = setup(&[]);

        let served = uploader
            .upload_bytes("hello", "greeting.txt", None)
            .await
            .unwrap();

        assert_eq!(served, "/app1/greeting.txt");
        let uploads = transport.uploads();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].body, "hello");
        assert_eq!(uploads[0].param("appViewId").as_deref(), Some(""));
        assert!(!uploads[0].is_main_page());
        assert!(!uploads[0].is_icon());
    }

    #[tokio::test]
    async fn test_upload_file() {
        let (temp, transport, uploader) = setup(&[("local/page.html", "<p/>")]);
        let registration = ResourceRegistrationConfig::main_page("PageView").unwrap();

        uploader
            .upload_file(temp.path().join("local/page.html"), "page.html", Some(&registration))
            .await
            .unwrap();

        let uploads = transport.uploads();
        assert_eq!(uploads[0].body, "<p/>");
        assert_eq!(uploads[0].param("appViewId").as_deref(), Some("PageView"));
        assert!(uploads[0].is_main_page());
    }

    #[tokio::test]
    async fn test_upload_missing_resource() {
        let (_temp, transport, uploader) = setup(PACKAGE);

        let result = uploader.upload_resource("views/none.html", "none.html", None).await;
        assert!(result.unwrap_err().is_not_found());
        assert!(transport.uploads().is_empty());
    }

    #[tokio::test]
    async fn test_package_uploads_main_pages_last() {
        let (_temp, transport, uploader) = setup(PACKAGE);
        let (main_pages, icons) = quote_view();

        let served = uploader
            .upload_package("views/", &main_pages, &icons)
            .await
            .unwrap();

        let uploads = transport.uploads();
        let order: Vec<(String, bool, bool)> = uploads
            .iter()
            .map(|u| (u.file_path(), u.is_main_page(), u.is_icon()))
            .collect();
        assert_eq!(
            order,
            vec![
                ("quote.html".to_string(), false, false),
                ("quote.png".to_string(), false, true),
                ("style.css".to_string(), false, false),
                ("quote.html".to_string(), true, false),
            ]
        );
        assert_eq!(uploads[1].param("appViewId").as_deref(), Some("QuoteView"));
        assert_eq!(uploads[3].param("appViewId").as_deref(), Some("QuoteView"));
        assert_eq!(uploads[3].body, "<html>quote</html>");

        assert_eq!(served.len(), 3);
        assert_eq!(served["views/quote.html"], "/app1/quote.html");
        assert_eq!(served["views/style.css"], "/app1/style.css");
    }

    #[tokio::test]
    async fn test_package_issues_n_plus_m_uploads() {
        let files = [
            ("site/a.html", "a"),
            ("site/b.html", "b"),
            ("site/img/logo.png", "logo"),
            ("site/js/app.js", "js"),
            ("site/c.css", "css"),
        ];
        let (_temp, transport, uploader) = setup(&files);
        let main_pages = HashMap::from([
            ("site/a.html".to_string(), "A".to_string()),
            ("site/b.html".to_string(), "B".to_string()),
        ]);

        uploader
            .upload_package("site", &main_pages, &HashMap::new())
            .await
            .unwrap();

        let uploads = transport.uploads();
        assert_eq!(uploads.len(), files.len() + main_pages.len());

        let first_main = uploads.iter().position(|u| u.is_main_page()).unwrap();
        assert!(uploads[first_main..].iter().all(|u| u.is_main_page()));
        assert!(uploads[..first_main].iter().all(|u| !u.is_main_page()));
    }

    #[tokio::test]
    async fn test_package_with_url_base_path() {
        let (_temp, transport, uploader) = setup(PACKAGE);

        let served = uploader
            .upload_package_to("views", "quotes", &HashMap::new(), &HashMap::new())
            .await
            .unwrap();

        let targets: Vec<String> = transport.uploads().iter().map(|u| u.file_path()).collect();
        assert_eq!(targets, vec!["quotes/quote.html", "quotes/quote.png", "quotes/style.css"]);
        assert_eq!(served["views/style.css"], "/app1/quotes/style.css");
    }

    #[tokio::test]
    async fn test_package_aborts_on_first_failure() {
        let (_temp, transport, uploader) = setup(PACKAGE);
        let (main_pages, icons) = quote_view();
        transport.fail_after(2);

        let result = uploader.upload_package("views/", &main_pages, &icons).await;

        assert!(result.unwrap_err().is_transfer_failure());
        let uploads = transport.uploads();
        assert_eq!(uploads.len(), 2);
        assert!(uploads.iter().all(|u| !u.is_main_page()));
    }

    #[tokio::test]
    async fn test_package_missing_base_path() {
        let (_temp, transport, uploader) = setup(PACKAGE);

        let result = uploader
            .upload_package("html/", &HashMap::new(), &HashMap::new())
            .await;
        assert!(result.unwrap_err().is_not_found());
        assert!(transport.uploads().is_empty());
    }

    #[tokio::test]
    async fn test_view_package() {
        let (_temp, transport, uploader) = setup(PACKAGE);

        uploader
            .upload_view_package("views/", "QuoteView", Some("views/quote.html"), None)
            .await
            .unwrap();

        let uploads = transport.uploads();
        assert_eq!(uploads.len(), 4);
        assert!(uploads[3].is_main_page());
        assert!(uploads.iter().all(|u| !u.is_icon()));
    }

    #[tokio::test]
    async fn test_concurrent_uploads_complete() {
        let (_temp, transport, uploader) = setup(&[]);
        let uploader = Arc::new(uploader);

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let uploader = Arc::clone(&uploader);
                tokio::spawn(async move {
                    uploader
                        .upload_bytes(format!("body {}", i), &format!("file{}.txt", i), None)
                        .await
                })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(transport.uploads().len(), 8);
    }
}
