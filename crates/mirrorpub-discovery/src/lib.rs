//! Mirror discovery
//!
//! Locates mirror devices and reports their lifecycle as [`DeviceEvent`]s:
//! - Browse the local network via mDNS (RFC 6762/6763) for the mirror API
//!   service type
//! - Announce mirrors configured at fixed addresses
//!
//! Both sources feed the same bounded `async_channel`, which the
//! publishing registry consumes.
//!
//! # Example
//!
//! ```no_run
//! use mirrorpub_core::discovery_config::DiscoveryConfig;
//! use mirrorpub_discovery::MdnsDeviceDiscovery;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let discovery = MdnsDeviceDiscovery::new(DiscoveryConfig::default())?;
//!     discovery.start()?;
//!
//!     let events = discovery.events().expect("discovery owns its channel");
//!     while let Ok(event) = events.recv().await {
//!         println!("{:?}", event);
//!     }
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod events;
pub mod service;
pub mod static_source;

pub use error::{DiscoveryError, Result};
pub use events::{event_channel, DeviceEvent};
pub use service::{Announcement, MdnsDeviceDiscovery, MirrorTracker};
pub use static_source::StaticDeviceSource;
