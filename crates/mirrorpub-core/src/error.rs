//! Error types for mirror publishing.
//!
//! Every library crate in the workspace reports failures through
//! [`PublishError`]. The variants follow the failure classes a caller has
//! to tell apart: a mirror that must not be registered, a resource that
//! does not exist, a transfer that broke, or an API used with missing
//! arguments.

use std::io;
use thiserror::Error;

/// Result type alias using PublishError as the error type.
pub type Result<T> = std::result::Result<T, PublishError>;

/// Top-level error type for all publishing operations.
#[derive(Debug, Error)]
pub enum PublishError {
    /// A required identity or URL parameter is missing or malformed.
    ///
    /// Raised while building the upload endpoint; the affected mirror is
    /// not registered, the process keeps running.
    #[error("Invalid configuration: {reason}")]
    InvalidConfiguration { reason: String },

    /// A resource, template or package path does not exist in the active
    /// resource source.
    #[error("Resource not found: {path}")]
    NotFound { path: String },

    /// An I/O fault while connecting, writing the body or reading the
    /// response of an upload.
    #[error("Transfer to {url} failed: {reason}")]
    TransferFailed { url: String, reason: String },

    /// A required argument was absent or empty at a public API boundary.
    #[error("Precondition violated: {0}")]
    PreconditionViolation(String),

    /// A template resource could not be decoded as UTF-8 text.
    #[error("Invalid template '{path}': {reason}")]
    InvalidTemplate { path: String, reason: String },

    /// Configuration loading or validation failed.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Local I/O errors (resource roots, archives, files).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl PublishError {
    /// Creates an invalid configuration error.
    pub fn invalid_configuration(reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            reason: reason.into(),
        }
    }

    /// Creates a not found error for the given resource path.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound { path: path.into() }
    }

    /// Creates a transfer failure for the given upload URL.
    pub fn transfer_failed(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::TransferFailed {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Creates a precondition violation.
    pub fn precondition(message: impl Into<String>) -> Self {
        Self::PreconditionViolation(message.into())
    }

    /// Returns true if the error means the mirror must not be registered.
    pub fn is_invalid_configuration(&self) -> bool {
        matches!(self, Self::InvalidConfiguration { .. })
    }

    /// Returns true for I/O faults of a single upload exchange.
    pub fn is_transfer_failure(&self) -> bool {
        matches!(self, Self::TransferFailed { .. })
    }

    /// Returns true if the requested resource does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Ensures a string argument is present and non-empty.
///
/// Returns a [`PublishError::PreconditionViolation`] naming the argument
/// otherwise.
pub fn require_non_empty(name: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(PublishError::precondition(format!(
            "'{}' must not be empty",
            name
        )));
    }
    Ok(())
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {reason}")]
    LoadFailed { path: String, reason: String },

    /// Invalid configuration format
    #[error("Invalid configuration format: {reason}")]
    InvalidFormat { reason: String },

    /// Missing required configuration field
    #[error("Missing required configuration field: {field}")]
    MissingField { field: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(PublishError::invalid_configuration("no url").is_invalid_configuration());
        assert!(PublishError::transfer_failed("http://m/api", "reset").is_transfer_failure());
        assert!(PublishError::not_found("views/x.html").is_not_found());
        assert!(!PublishError::precondition("x").is_not_found());
    }

    #[test]
    fn test_error_display() {
        let err = PublishError::transfer_failed("http://10.0.0.5/api", "connection refused");
        assert_eq!(
            err.to_string(),
            "Transfer to http://10.0.0.5/api failed: connection refused"
        );

        let err: PublishError = ConfigError::MissingField {
            field: "app.app_id".to_string(),
        }
        .into();
        assert!(err.to_string().contains("app.app_id"));
    }

    #[test]
    fn test_require_non_empty() {
        assert!(require_non_empty("appId", "app1").is_ok());
        let err = require_non_empty("appId", "").unwrap_err();
        assert!(matches!(err, PublishError::PreconditionViolation(_)));
        assert!(err.to_string().contains("appId"));
    }
}
