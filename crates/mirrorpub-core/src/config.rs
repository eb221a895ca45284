//! Configuration management for the mirror publisher.
//!
//! The configuration is loaded from a YAML file, optionally layered with
//! environment variable overrides (`MIRRORPUB__<SECTION>__<KEY>`), and
//! validated before any mirror is contacted.

use crate::discovery_config::DiscoveryConfig;
use crate::error::{ConfigError, Result};
use crate::types::{ResourcePackageConfig, TemplateConfig};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::Level;

/// Main application configuration.
///
/// # Examples
///
/// ```no_run
/// use mirrorpub_core::config::AppConfig;
///
/// let config = AppConfig::from_file("config/config.yaml").unwrap();
/// config.validate().unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application and user identity sent with every upload
    #[serde(default)]
    pub app: IdentityConfig,

    /// Static resource package published to every mirror
    #[serde(default)]
    pub package: PackageConfig,

    /// Dynamic pages rendered from templates
    #[serde(default)]
    pub templates: Vec<TemplateDef>,

    /// Periodic refresh of dynamic content
    #[serde(default)]
    pub refresh: RefreshConfig,

    /// HTTP upload settings
    #[serde(default)]
    pub upload: UploadConfig,

    /// Mirror discovery settings
    #[serde(default)]
    pub discovery: DiscoveryConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Loads configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::LoadFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        Self::from_yaml(&contents)
    }

    /// Loads configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| {
            ConfigError::InvalidFormat {
                reason: e.to_string(),
            }
            .into()
        })
    }

    /// Loads configuration from a file and merges environment overrides
    /// (`MIRRORPUB__APP__USER_ID=...`).
    pub fn from_config_builder<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let config = config::Config::builder()
            .add_source(config::File::from(path).required(true))
            .add_source(
                config::Environment::with_prefix("MIRRORPUB")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| ConfigError::LoadFailed {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;

        config.try_deserialize().map_err(|e| {
            ConfigError::InvalidFormat {
                reason: e.to_string(),
            }
            .into()
        })
    }

    /// Validates the configuration.
    ///
    /// Checks that identities are set, at least one resource root exists,
    /// every view has an id and every template a source and target.
    pub fn validate(&self) -> Result<()> {
        if self.app.app_id.is_empty() {
            return Err(ConfigError::MissingField {
                field: "app.app_id".to_string(),
            }
            .into());
        }

        if self.app.user_id.is_empty() {
            return Err(ConfigError::MissingField {
                field: "app.user_id".to_string(),
            }
            .into());
        }

        self.package.validate()?;

        for (i, template) in self.templates.iter().enumerate() {
            if template.resource_path.is_empty() || template.target_path.is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: format!("templates[{}]", i),
                    reason: "resource_path and target_path are required".to_string(),
                }
                .into());
            }
        }

        self.refresh.validate()?;
        self.upload.validate()?;

        self.discovery.validate().map_err(|reason| ConfigError::InvalidValue {
            field: "discovery".to_string(),
            reason,
        })?;

        self.logging.parse_level()?;

        Ok(())
    }

    /// Builds the resource package description from the `package` section.
    pub fn package_config(&self) -> Result<ResourcePackageConfig> {
        let mut package = ResourcePackageConfig::new(self.package.base_path.clone())?;
        for view in &self.package.views {
            package.add_view(&view.view_id, view.main_page.as_deref(), view.icon.as_deref())?;
        }
        Ok(package)
    }

    /// Builds the statically configured dynamic pages.
    pub fn template_configs(&self) -> Result<Vec<TemplateConfig>> {
        self.templates.iter().map(TemplateDef::to_template_config).collect()
    }
}

/// Application and user identity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Application identifier
    #[serde(default)]
    pub app_id: String,

    /// User identifier of the current session
    #[serde(default)]
    pub user_id: String,
}

/// Location and view layout of the static resource package.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageConfig {
    /// Resource roots searched in order
    #[serde(default)]
    pub roots: Vec<ResourceRootConfig>,

    /// Package base path inside the roots
    #[serde(default = "default_base_path")]
    pub base_path: String,

    /// Prefix for target paths on the mirror webserver
    #[serde(default)]
    pub url_base_path: String,

    /// Views registered by main page and icon resources
    #[serde(default)]
    pub views: Vec<ViewDef>,
}

impl Default for PackageConfig {
    fn default() -> Self {
        Self {
            roots: Vec::new(),
            base_path: default_base_path(),
            url_base_path: String::new(),
            views: Vec::new(),
        }
    }
}

impl PackageConfig {
    fn validate(&self) -> Result<()> {
        if self.roots.is_empty() {
            return Err(ConfigError::MissingField {
                field: "package.roots".to_string(),
            }
            .into());
        }

        if self.base_path.is_empty() {
            return Err(ConfigError::MissingField {
                field: "package.base_path".to_string(),
            }
            .into());
        }

        for (i, view) in self.views.iter().enumerate() {
            if view.view_id.is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: format!("package.views[{}].view_id", i),
                    reason: "view id cannot be empty".to_string(),
                }
                .into());
            }
        }

        Ok(())
    }
}

/// Storage form of a resource root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RootKind {
    /// Loose directory tree
    Directory,
    /// Zip archive containing the resources
    Archive,
}

/// A resource root: a directory or an archive file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRootConfig {
    /// Storage form
    #[serde(rename = "type")]
    pub kind: RootKind,

    /// Filesystem location of the directory or archive
    pub path: PathBuf,
}

/// A view of the package.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewDef {
    /// View identifier
    pub view_id: String,

    /// Resource path of the entry page
    #[serde(default)]
    pub main_page: Option<String>,

    /// Resource path of the representing icon
    #[serde(default)]
    pub icon: Option<String>,
}

/// A dynamic page definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateDef {
    /// Template resource path
    pub resource_path: String,

    /// Target path on the mirror webserver
    pub target_path: String,

    /// View registered with this page as main page
    #[serde(default)]
    pub view_id: Option<String>,

    /// Placeholder -> replacement pairs
    #[serde(default)]
    pub replacements: HashMap<String, String>,
}

impl TemplateDef {
    /// Converts the definition into a template config.
    pub fn to_template_config(&self) -> Result<TemplateConfig> {
        let mut config = TemplateConfig::new(self.resource_path.clone(), self.target_path.clone())?;
        if let Some(view_id) = &self.view_id {
            config = config.with_view_id(view_id.clone());
        }
        for (placeholder, replacement) in &self.replacements {
            config.put_replacement(placeholder.clone(), replacement.clone())?;
        }
        Ok(config)
    }
}

/// Periodic dynamic content refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshConfig {
    /// Refresh interval (seconds)
    #[serde(default = "default_refresh_interval")]
    pub interval_secs: u64,

    /// Quote of the day page
    #[serde(default)]
    pub quotes: Option<QuotesConfig>,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_refresh_interval(),
            quotes: None,
        }
    }
}

impl RefreshConfig {
    /// Returns the refresh interval as a Duration
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    fn validate(&self) -> Result<()> {
        if self.interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "refresh.interval_secs".to_string(),
                reason: "interval cannot be 0".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

/// Quote of the day page rendered from a quotes file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotesConfig {
    /// File with one `author;quote` entry per line
    pub file: PathBuf,

    /// Template resource path containing `{QUOTE}` and `{AUTHOR}`
    pub template: String,

    /// Target path on the mirror webserver
    pub target_path: String,

    /// View registered with the page as main page
    #[serde(default)]
    pub view_id: Option<String>,
}

/// HTTP upload settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Whole-request timeout (seconds)
    #[serde(default = "default_upload_timeout")]
    pub timeout_secs: u64,

    /// Connect timeout (seconds)
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_upload_timeout(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

impl UploadConfig {
    /// Returns the request timeout as a Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Returns the connect timeout as a Duration
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "upload.timeout_secs".to_string(),
                reason: "timeout cannot be 0".to_string(),
            }
            .into());
        }
        if self.connect_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "upload.connect_timeout_secs".to_string(),
                reason: "timeout cannot be 0".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: "text" or "json"
    #[serde(default = "default_log_format")]
    pub format: LogFormat,

    /// Whether to include file/line info
    #[serde(default)]
    pub file_line: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file_line: false,
        }
    }
}

impl LoggingConfig {
    /// Parses the log level string to a tracing Level.
    pub fn parse_level(&self) -> Result<Level> {
        self.level.parse().map_err(|_| {
            ConfigError::InvalidValue {
                field: "logging.level".to_string(),
                reason: format!("Invalid log level: {}", self.level),
            }
            .into()
        })
    }
}

/// Log format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text format
    Text,
    /// JSON format for structured logging
    Json,
}

fn default_base_path() -> String {
    "views/".to_string()
}

fn default_refresh_interval() -> u64 {
    60
}

fn default_upload_timeout() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> LogFormat {
    LogFormat::Text
}
