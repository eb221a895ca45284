//! # mirrorpub core
//!
//! Core types, error handling, and configuration for publishing content to
//! mirror display devices.
//!
//! - **Types**: devices and mirror states, the static resource package
//!   description, dynamic template pages and per-upload view registration.
//! - **Errors**: one `thiserror` taxonomy for configuration, lookup and
//!   transfer failures.
//! - **Configuration**: YAML files with environment overrides and
//!   validation.
//!
//! ## Example
//!
//! ```
//! use mirrorpub_core::types::{ResourcePackageConfig, TemplateConfig};
//!
//! let mut package = ResourcePackageConfig::new("views/").unwrap();
//! package
//!     .add_view("QuoteView", Some("views/quote.html"), Some("views/quote.png"))
//!     .unwrap();
//!
//! let mut page = TemplateConfig::new("views/quote.template", "quote.html")
//!     .unwrap()
//!     .with_view_id("QuoteView");
//! page.put_replacement("{QUOTE}", "Simplicity is prerequisite for reliability.")
//!     .unwrap();
//! assert_eq!(page.target_path(), "quote.html");
//! ```

pub mod config;
pub mod discovery_config;
pub mod error;
pub mod types;

pub use config::AppConfig;
pub use error::{PublishError, Result};
pub use types::{
    Device, DeviceId, MirrorState, ResourcePackageConfig, ResourceRegistrationConfig,
    TemplateConfig, MIRROR_PROFILE,
};
