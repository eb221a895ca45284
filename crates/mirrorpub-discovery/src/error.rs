//! Error types for mirror discovery

use thiserror::Error;

/// Result type alias for discovery operations
pub type Result<T> = std::result::Result<T, DiscoveryError>;

/// Errors that can occur while locating mirrors
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// mDNS service daemon failed to initialize
    #[error("Failed to initialize mDNS daemon: {0}")]
    MdnsInitFailed(String),

    /// Failed to browse for the mirror service type
    #[error("Failed to browse for service type '{service_type}': {reason}")]
    BrowseFailed { service_type: String, reason: String },

    /// Invalid discovery configuration
    #[error("Invalid discovery configuration: {0}")]
    InvalidConfig(String),

    /// Discovery already started
    #[error("Mirror discovery is already running")]
    AlreadyStarted,

    /// The device event channel has no receiver left
    #[error("Device event channel closed")]
    ChannelClosed,

    /// Internal error
    #[error("Internal discovery error: {0}")]
    Internal(String),
}
