//! # mirrorpub publisher
//!
//! Orchestrates publishing to every mirror on the network:
//! - [`PublishingRegistry`] reacts to device lifecycle events, uploads the
//!   static resource package to each reachable mirror and fans template
//!   page updates out to all of them
//! - [`spawn_refresh`] re-renders dynamic pages on a fixed interval
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use mirrorpub_core::types::{Device, ResourcePackageConfig};
//! use mirrorpub_publisher::{spawn_refresh, PublishingRegistry, RegistrySettings, StaticTemplates};
//! use mirrorpub_resources::ResourceSource;
//! use mirrorpub_upload::HttpTransport;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let package = ResourcePackageConfig::new("views/")?;
//!     let transport = HttpTransport::new(Duration::from_secs(30), Duration::from_secs(10))?;
//!     let registry = Arc::new(PublishingRegistry::new(
//!         RegistrySettings::new("app1", "u1", package),
//!         Arc::new(ResourceSource::directory("web")),
//!         Arc::new(transport),
//!     ));
//!
//!     registry
//!         .device_added(Device::mirror("hall", "Hallway", "http://10.0.0.5:2534/api"))
//!         .await?;
//!
//!     let refresh = spawn_refresh(
//!         Arc::clone(&registry),
//!         Arc::new(StaticTemplates::default()),
//!         Duration::from_secs(60),
//!     );
//!     refresh.stop().await;
//!     Ok(())
//! }
//! ```

pub mod refresh;
pub mod registry;

pub use refresh::{refresh_once, spawn_refresh, RefreshHandle, StaticTemplates, TemplateProvider};
pub use registry::{FanOut, PublishingRegistry, RegistrySettings};
