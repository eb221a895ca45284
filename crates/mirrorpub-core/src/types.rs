//! Core types shared by the publishing crates.
//!
//! Devices and mirrors, the static resource package description, dynamic
//! template definitions and per-upload view registration flags.

use crate::error::{require_non_empty, PublishError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Profile tag carried by mirror-class devices.
pub const MIRROR_PROFILE: &str = "mirror";

/// Identifier of a discovered device.
///
/// For mDNS discovered devices this is the full service instance name,
/// for statically configured mirrors the configured id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    /// Creates a device identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for DeviceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A device reported by the discovery collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    /// Stable device identifier
    pub id: DeviceId,

    /// Human readable name used in log output
    pub name: String,

    /// Profile/type tag used to recognize mirrors among all devices
    pub profile: String,

    /// Current API base URL; `None` means the device is not controllable
    pub api_url: Option<String>,
}

impl Device {
    /// Creates a device without an API URL.
    pub fn new(id: impl Into<DeviceId>, name: impl Into<String>, profile: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            profile: profile.into(),
            api_url: None,
        }
    }

    /// Creates a mirror-class device with a known API URL.
    pub fn mirror(id: impl Into<DeviceId>, name: impl Into<String>, api_url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            profile: MIRROR_PROFILE.to_string(),
            api_url: Some(api_url.into()),
        }
    }

    /// Sets the API URL.
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = Some(api_url.into());
        self
    }

    /// Returns true if the device carries the given profile tag.
    pub fn has_profile(&self, profile: &str) -> bool {
        self.profile == profile
    }
}

/// Publishing state of a single mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MirrorState {
    /// No usable API URL, no uploader
    Unknown,
    /// A syntactically valid API URL is known, content not (yet) published
    AddressKnown,
    /// Package and every registered template uploaded at least once
    Published,
}

impl fmt::Display for MirrorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MirrorState::Unknown => write!(f, "unknown"),
            MirrorState::AddressKnown => write!(f, "address-known"),
            MirrorState::Published => write!(f, "published"),
        }
    }
}

/// Static resources of a package and the views they register.
///
/// Keys of both maps are package-relative resource paths (including the
/// base path), values are view identifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourcePackageConfig {
    base_path: String,
    main_pages: HashMap<String, String>,
    icons: HashMap<String, String>,
}

impl ResourcePackageConfig {
    /// Defines a resource package rooted at `base_path`.
    pub fn new(base_path: impl Into<String>) -> Result<Self> {
        let base_path = base_path.into();
        require_non_empty("resourcePackage", &base_path)?;
        Ok(Self {
            base_path,
            main_pages: HashMap::new(),
            icons: HashMap::new(),
        })
    }

    /// Registers a view by its main page and/or icon resource.
    pub fn add_view(
        &mut self,
        view_id: &str,
        main_page: Option<&str>,
        icon: Option<&str>,
    ) -> Result<()> {
        require_non_empty("viewId", view_id)?;
        if let Some(main_page) = main_page {
            self.main_pages
                .insert(main_page.to_string(), view_id.to_string());
        }
        if let Some(icon) = icon {
            self.icons.insert(icon.to_string(), view_id.to_string());
        }
        Ok(())
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    pub fn main_pages(&self) -> &HashMap<String, String> {
        &self.main_pages
    }

    pub fn icons(&self) -> &HashMap<String, String> {
        &self.icons
    }
}

/// A dynamic page rendered from a template resource.
///
/// Two configs are equal when their target paths are equal: the target
/// path is the identity of the published page.
#[derive(Debug, Clone)]
pub struct TemplateConfig {
    resource_path: String,
    target_path: String,
    view_id: Option<String>,
    replacements: HashMap<String, String>,
}

impl TemplateConfig {
    /// Creates a template config without view registration.
    pub fn new(resource_path: impl Into<String>, target_path: impl Into<String>) -> Result<Self> {
        let resource_path = resource_path.into();
        let target_path = target_path.into();
        require_non_empty("templateResourcePath", &resource_path)?;
        require_non_empty("targetFilePath", &target_path)?;
        Ok(Self {
            resource_path,
            target_path,
            view_id: None,
            replacements: HashMap::new(),
        })
    }

    /// Registers the rendered page as main page of `view_id`.
    pub fn with_view_id(mut self, view_id: impl Into<String>) -> Self {
        self.view_id = Some(view_id.into());
        self
    }

    /// Adds or overwrites a placeholder replacement.
    pub fn put_replacement(
        &mut self,
        placeholder: impl Into<String>,
        replacement: impl Into<String>,
    ) -> Result<()> {
        let placeholder = placeholder.into();
        require_non_empty("placeholder", &placeholder)?;
        self.replacements.insert(placeholder, replacement.into());
        Ok(())
    }

    pub fn resource_path(&self) -> &str {
        &self.resource_path
    }

    pub fn target_path(&self) -> &str {
        &self.target_path
    }

    pub fn view_id(&self) -> Option<&str> {
        self.view_id.as_deref()
    }

    pub fn replacements(&self) -> &HashMap<String, String> {
        &self.replacements
    }
}

impl PartialEq for TemplateConfig {
    fn eq(&self, other: &Self) -> bool {
        self.target_path == other.target_path
    }
}

impl Eq for TemplateConfig {}

impl Hash for TemplateConfig {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.target_path.hash(state);
    }
}

/// View registration flags sent along with a single upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRegistrationConfig {
    view_id: String,
    main_page: bool,
    icon: bool,
}

impl ResourceRegistrationConfig {
    /// Creates registration flags for `view_id`.
    ///
    /// A resource is registered as main page or as icon, never both.
    pub fn new(view_id: impl Into<String>, main_page: bool, icon: bool) -> Result<Self> {
        let view_id = view_id.into();
        require_non_empty("appViewId", &view_id)?;
        if main_page && icon {
            return Err(PublishError::precondition(
                "a resource cannot be registered as main page and icon in one upload",
            ));
        }
        Ok(Self {
            view_id,
            main_page,
            icon,
        })
    }

    /// Registration as the entry page of a view.
    pub fn main_page(view_id: impl Into<String>) -> Result<Self> {
        Self::new(view_id, true, false)
    }

    /// Registration as the icon of a view.
    pub fn icon(view_id: impl Into<String>) -> Result<Self> {
        Self::new(view_id, false, true)
    }

    pub fn view_id(&self) -> &str {
        &self.view_id
    }

    pub fn is_main_page(&self) -> bool {
        self.main_page
    }

    pub fn is_icon(&self) -> bool {
        self.icon
    }
}
