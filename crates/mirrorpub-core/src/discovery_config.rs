//! Configuration types for mirror discovery

use crate::types::MIRROR_PROFILE;
use serde::{Deserialize, Serialize};

/// Configuration for locating mirrors on the network
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Enable mDNS browsing for mirrors
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// mDNS service type advertised by mirrors
    #[serde(default = "default_service_type")]
    pub service_type: String,

    /// Profile tag identifying mirror-class devices
    #[serde(default = "default_mirror_profile")]
    pub mirror_profile: String,

    /// Path appended to host:port when a mirror does not announce `api_url`
    #[serde(default = "default_api_path")]
    pub api_path: String,

    /// Mirrors reachable at fixed addresses, announced once at startup
    #[serde(default)]
    pub static_mirrors: Vec<StaticMirror>,

    /// Capacity of the device event channel
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            service_type: default_service_type(),
            mirror_profile: default_mirror_profile(),
            api_path: default_api_path(),
            static_mirrors: Vec::new(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl DiscoveryConfig {
    /// Returns the service type in fully qualified form (`<type>.local.`)
    pub fn qualified_service_type(&self) -> String {
        if self.service_type.ends_with('.') {
            self.service_type.clone()
        } else if self.service_type.ends_with(".local") {
            format!("{}.", self.service_type)
        } else {
            format!("{}.local.", self.service_type)
        }
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.enabled && !self.service_type.starts_with('_') {
            return Err(format!(
                "service_type '{}' must start with '_'",
                self.service_type
            ));
        }

        if self.mirror_profile.is_empty() {
            return Err("mirror_profile cannot be empty".to_string());
        }

        if !self.api_path.is_empty() && !self.api_path.starts_with('/') {
            return Err(format!("api_path '{}' must start with '/'", self.api_path));
        }

        if self.channel_capacity == 0 {
            return Err("channel_capacity cannot be 0".to_string());
        }

        for mirror in &self.static_mirrors {
            if mirror.id.is_empty() {
                return Err("static mirror id cannot be empty".to_string());
            }
        }

        Ok(())
    }
}

/// A mirror at a fixed, configured address
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticMirror {
    /// Device identifier
    pub id: String,

    /// Display name (defaults to the id)
    #[serde(default)]
    pub name: Option<String>,

    /// API base URL of the mirror
    pub api_url: String,
}

impl StaticMirror {
    /// Returns the display name, falling back to the id
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

// Default configuration values
fn default_enabled() -> bool {
    true
}

fn default_service_type() -> String {
    "_mirror-api._tcp.local.".to_string()
}

fn default_mirror_profile() -> String {
    MIRROR_PROFILE.to_string()
}

fn default_api_path() -> String {
    "/api".to_string()
}

fn default_channel_capacity() -> usize {
    256
}
