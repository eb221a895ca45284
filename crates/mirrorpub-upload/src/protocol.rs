//! Static resource upload protocol
//!
//! Every upload is a single `POST` of the raw resource bytes to
//! `<mirror_api_url>/staticResourceUpload` with the identity and the view
//! registration carried in the query string:
//!
//! ```text
//! POST {api}/staticResourceUpload?appId=..&appViewId=..&userId=..&filePath=..&mainPage=..&icon=..
//! Content-Type: text/plain
//! ```
//!
//! The first line of the response body is the path under which the
//! mirror now serves the resource.

use mirrorpub_core::error::{require_non_empty, PublishError, Result};
use mirrorpub_core::types::ResourceRegistrationConfig;
use url::form_urlencoded;
use url::Url;

/// Upload operation appended to the mirror API URL.
pub const UPLOAD_OPERATION: &str = "staticResourceUpload";

/// Content type announced for every upload body, whatever the resource.
pub const UPLOAD_CONTENT_TYPE: &str = "text/plain";

/// Identity of this application on one mirror.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadEndpoint {
    api_url: String,
    app_id: String,
    user_id: String,
}

impl UploadEndpoint {
    pub fn builder() -> UploadEndpointBuilder {
        UploadEndpointBuilder::default()
    }

    /// Mirror API URL without trailing `/`.
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Builds the upload URL for one request.
    pub fn upload_url(&self, request: &UploadRequest) -> Result<Url> {
        let raw = format!(
            "{}/{}?appId={}&appViewId={}&userId={}&filePath={}&mainPage={}&icon={}",
            self.api_url,
            UPLOAD_OPERATION,
            encode(&self.app_id),
            encode(request.view_id().unwrap_or("")),
            encode(&self.user_id),
            encode(request.file_path()),
            request.is_main_page(),
            request.is_icon(),
        );

        Url::parse(&raw).map_err(|e| {
            PublishError::invalid_configuration(format!("invalid upload URL '{}': {}", raw, e))
        })
    }
}

/// Builder for [`UploadEndpoint`].
#[derive(Debug, Default, Clone)]
pub struct UploadEndpointBuilder {
    mirror_api_url: Option<String>,
    app_id: Option<String>,
    user_id: Option<String>,
}

impl UploadEndpointBuilder {
    pub fn mirror_api_url(mut self, url: impl Into<String>) -> Self {
        self.mirror_api_url = Some(url.into());
        self
    }

    pub fn app_id(mut self, app_id: impl Into<String>) -> Self {
        self.app_id = Some(app_id.into());
        self
    }

    pub fn user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Validates the identity and the mirror URL.
    ///
    /// Fails with InvalidConfiguration when a value is missing or empty, or
    /// when the URL is not an absolute http(s) URL.
    pub fn build(self) -> Result<UploadEndpoint> {
        let api_url = required("mirror API URL", self.mirror_api_url)?;
        let app_id = required("appId", self.app_id)?;
        let user_id = required("userId", self.user_id)?;

        let parsed = Url::parse(&api_url).map_err(|e| {
            PublishError::invalid_configuration(format!("invalid mirror API URL '{}': {}", api_url, e))
        })?;
        if parsed.cannot_be_a_base() || !matches!(parsed.scheme(), "http" | "https") {
            return Err(PublishError::invalid_configuration(format!(
                "mirror API URL '{}' is not an http(s) URL",
                api_url
            )));
        }

        Ok(UploadEndpoint {
            api_url: api_url.trim_end_matches('/').to_string(),
            app_id,
            user_id,
        })
    }
}

fn required(name: &str, value: Option<String>) -> Result<String> {
    match value {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(PublishError::invalid_configuration(format!(
            "{} is required",
            name
        ))),
    }
}

/// Parameters of a single upload, built fresh for every call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    file_path: String,
    view_id: Option<String>,
    main_page: bool,
    icon: bool,
}

impl UploadRequest {
    /// Creates a request publishing under `file_path`, optionally
    /// registered with a view.
    pub fn new(
        file_path: impl Into<String>,
        registration: Option<&ResourceRegistrationConfig>,
    ) -> Result<Self> {
        let file_path = file_path.into();
        require_non_empty("filePath", &file_path)?;

        Ok(match registration {
            Some(registration) => Self {
                file_path,
                view_id: Some(registration.view_id().to_string()),
                main_page: registration.is_main_page(),
                icon: registration.is_icon(),
            },
            None => Self {
                file_path,
                view_id: None,
                main_page: false,
                icon: false,
            },
        })
    }

    pub fn file_path(&self) -> &str {
        &self.file_path
    }

    pub fn view_id(&self) -> Option<&str> {
        self.view_id.as_deref()
    }

    pub fn is_main_page(&self) -> bool {
        self.main_page
    }

    pub fn is_icon(&self) -> bool {
        self.icon
    }
}

/// `application/x-www-form-urlencoded` encoding of a query value.
fn encode(value: &str) -> String {
    form_urlencoded::byte_serialize(value.as_bytes()).collect()
}
