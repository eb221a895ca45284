//! mDNS mirror discovery

use crate::error::{DiscoveryError, Result};
use crate::events::{event_channel, DeviceEvent};
use async_channel::{Receiver, Sender};
use dashmap::DashMap;
use mdns_sd::{ServiceDaemon, ServiceEvent as MdnsEvent, ServiceInfo};
use mirrorpub_core::discovery_config::DiscoveryConfig;
use mirrorpub_core::types::{Device, DeviceId};
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// TXT key carrying a complete API URL
pub const TXT_API_URL: &str = "api_url";

/// TXT key carrying the device profile tag
pub const TXT_PROFILE: &str = "profile";

/// TXT key carrying a stable device identifier
pub const TXT_DEVICE_ID: &str = "id";

/// TXT key carrying a display name
pub const TXT_NAME: &str = "name";

/// A resolved mDNS service, reduced to what mirror detection needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announcement {
    /// Full mDNS instance name
    pub fullname: String,
    pub hostname: String,
    pub addresses: Vec<IpAddr>,
    pub port: u16,
    pub properties: HashMap<String, String>,
}

impl Announcement {
    fn from_service_info(info: &ServiceInfo) -> Self {
        let properties = info
            .get_properties()
            .iter()
            .map(|property| (property.key().to_string(), property.val_str().to_string()))
            .collect();

        Self {
            fullname: info.get_fullname().to_string(),
            hostname: info.get_hostname().to_string(),
            addresses: info.get_addresses().iter().copied().collect(),
            port: info.get_port(),
            properties,
        }
    }

    /// Derives the mirror API URL.
    ///
    /// An announced `api_url` wins; otherwise the URL is built from the
    /// preferred address, the port and `api_path`.
    pub fn api_url(&self, api_path: &str) -> Option<String> {
        if let Some(url) = self.properties.get(TXT_API_URL).filter(|url| !url.is_empty()) {
            return Some(url.clone());
        }

        let host = match preferred_address(&self.addresses) {
            Some(IpAddr::V4(v4)) => v4.to_string(),
            Some(IpAddr::V6(v6)) => format!("[{}]", v6),
            None => return None,
        };
        Some(format!("http://{}:{}{}", host, self.port, api_path))
    }

    /// Converts the announcement into a device.
    pub fn to_device(&self, config: &DiscoveryConfig) -> Device {
        let id = self
            .properties
            .get(TXT_DEVICE_ID)
            .filter(|id| !id.is_empty())
            .cloned()
            .unwrap_or_else(|| self.fullname.clone());
        let name = self
            .properties
            .get(TXT_NAME)
            .cloned()
            .unwrap_or_else(|| instance_label(&self.fullname).to_string());
        let profile = self
            .properties
            .get(TXT_PROFILE)
            .cloned()
            .unwrap_or_else(|| config.mirror_profile.clone());

        Device {
            id: DeviceId::new(id),
            name,
            profile,
            api_url: self.api_url(&config.api_path),
        }
    }
}

/// IPv4 first, lowest address first.
fn preferred_address(addresses: &[IpAddr]) -> Option<IpAddr> {
    let mut sorted = addresses.to_vec();
    sorted.sort_by_key(|addr| (addr.is_ipv6(), *addr));
    sorted.into_iter().next()
}

fn instance_label(fullname: &str) -> &str {
    fullname.split('.').next().unwrap_or(fullname)
}

#[derive(Debug, Clone)]
struct Tracked {
    device_id: DeviceId,
    api_url: Option<String>,
}

/// Turns mDNS resolve/remove notifications into device events.
///
/// Keyed by the mDNS full name: first sight yields `DeviceAdded`, a changed
/// API URL yields `AddressChanged`, a removal yields `DeviceRemoved`.
#[derive(Debug, Default)]
pub struct MirrorTracker {
    known: DashMap<String, Tracked>,
}

impl MirrorTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_resolved(
        &self,
        announcement: &Announcement,
        config: &DiscoveryConfig,
    ) -> Option<DeviceEvent> {
        let device = announcement.to_device(config);

        if let Some(mut tracked) = self.known.get_mut(&announcement.fullname) {
            if tracked.api_url == device.api_url {
                return None;
            }
            tracked.api_url = device.api_url.clone();
            return Some(DeviceEvent::AddressChanged {
                device_id: tracked.device_id.clone(),
                api_url: device.api_url,
            });
        }

        self.known.insert(
            announcement.fullname.clone(),
            Tracked {
                device_id: device.id.clone(),
                api_url: device.api_url.clone(),
            },
        );
        Some(DeviceEvent::DeviceAdded(device))
    }

    pub fn on_removed(&self, fullname: &str) -> Option<DeviceEvent> {
        self.known
            .remove(fullname)
            .map(|(_, tracked)| DeviceEvent::DeviceRemoved(tracked.device_id))
    }

    /// Number of services currently tracked
    pub fn len(&self) -> usize {
        self.known.len()
    }

    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }
}

/// Where discovered events go. The receiver is kept only when the channel
/// was created by the discovery service itself.
#[derive(Debug)]
struct EventOutlet {
    tx: Sender<DeviceEvent>,
    rx: Option<Receiver<DeviceEvent>>,
}

impl EventOutlet {
    fn owned(capacity: usize) -> Self {
        let (tx, rx) = event_channel(capacity);
        Self { tx, rx: Some(rx) }
    }

    fn external(tx: Sender<DeviceEvent>) -> Self {
        Self { tx, rx: None }
    }
}

/// Browses the network for mirrors and publishes device events.
pub struct MdnsDeviceDiscovery {
    config: DiscoveryConfig,
    mdns: Arc<ServiceDaemon>,
    tracker: Arc<MirrorTracker>,
    events: EventOutlet,
    running: Arc<AtomicBool>,
    tasks: DashMap<String, JoinHandle<()>>,
}

impl MdnsDeviceDiscovery {
    /// Creates the discovery service with its own event channel, read
    /// through [`events`](Self::events).
    pub fn new(config: DiscoveryConfig) -> Result<Self> {
        let events = EventOutlet::owned(config.channel_capacity);
        Self::with_outlet(config, events)
    }

    /// Creates the discovery service publishing into an existing channel
    /// whose receiver stays with the caller.
    pub fn with_sender(config: DiscoveryConfig, event_tx: Sender<DeviceEvent>) -> Result<Self> {
        Self::with_outlet(config, EventOutlet::external(event_tx))
    }

    fn with_outlet(config: DiscoveryConfig, events: EventOutlet) -> Result<Self> {
        config.validate().map_err(DiscoveryError::InvalidConfig)?;

        let mdns = ServiceDaemon::new().map_err(|e| {
            DiscoveryError::MdnsInitFailed(format!("Failed to create mDNS daemon: {}", e))
        })?;

        info!(
            service_type = %config.qualified_service_type(),
            profile = %config.mirror_profile,
            "Mirror discovery created"
        );

        Ok(Self {
            config,
            mdns: Arc::new(mdns),
            tracker: Arc::new(MirrorTracker::new()),
            events,
            running: Arc::new(AtomicBool::new(false)),
            tasks: DashMap::new(),
        })
    }

    /// Starts browsing for the configured service type.
    pub fn start(&self) -> Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(DiscoveryError::AlreadyStarted);
        }

        let service_type = self.config.qualified_service_type();
        let receiver = self.mdns.browse(&service_type).map_err(|e| {
            self.running.store(false, Ordering::SeqCst);
            DiscoveryError::BrowseFailed {
                service_type: service_type.clone(),
                reason: e.to_string(),
            }
        })?;

        info!(service_type = %service_type, "Browsing for mirrors");

        let config = self.config.clone();
        let tracker = Arc::clone(&self.tracker);
        let event_tx = self.events.tx.clone();
        let running = Arc::clone(&self.running);

        let task = tokio::spawn(async move {
            while running.load(Ordering::SeqCst) {
                let event = match receiver.recv_async().await {
                    Ok(event) => event,
                    Err(e) => {
                        error!(error = %e, "Error receiving mDNS event");
                        break;
                    }
                };

                let device_event = match event {
                    MdnsEvent::ServiceResolved(info) => {
                        let announcement = Announcement::from_service_info(&info);
                        debug!(
                            service = %announcement.fullname,
                            hostname = %announcement.hostname,
                            port = announcement.port,
                            "Service resolved"
                        );
                        tracker.on_resolved(&announcement, &config)
                    }
                    MdnsEvent::ServiceRemoved(_, fullname) => {
                        debug!(service = %fullname, "Service removed");
                        tracker.on_removed(&fullname)
                    }
                    _ => None,
                };

                if let Some(device_event) = device_event {
                    if event_tx.send(device_event).await.is_err() {
                        warn!("Device event channel closed, stopping browser");
                        break;
                    }
                }
            }
            debug!(service_type = %service_type, "Browser task stopped");
        });

        self.tasks.insert(format!("browser_{}", self.config.qualified_service_type()), task);
        Ok(())
    }

    /// Stops browsing and shuts the mDNS daemon down.
    pub fn stop(&self) -> Result<()> {
        if !self.running.swap(false, Ordering::SeqCst) {
            return Ok(());
        }

        self.abort_tasks();
        self.mdns.shutdown().map_err(|e| {
            DiscoveryError::Internal(format!("Failed to shutdown mDNS daemon: {}", e))
        })?;

        info!("Mirror discovery stopped");
        Ok(())
    }

    fn abort_tasks(&self) {
        let names: Vec<String> = self.tasks.iter().map(|entry| entry.key().clone()).collect();
        for name in names {
            if let Some((_, handle)) = self.tasks.remove(&name) {
                handle.abort();
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Receiver for device events; `None` when events go to a channel
    /// passed to [`with_sender`](Self::with_sender).
    pub fn events(&self) -> Option<Receiver<DeviceEvent>> {
        self.events.rx.clone()
    }
}

impl Drop for MdnsDeviceDiscovery {
    fn drop(&mut self) {
        if self.running.load(Ordering::SeqCst) {
            warn!("Mirror discovery dropped while still running");
            self.abort_tasks();
            let _ = self.mdns.shutdown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};

    fn announcement(properties: &[(&str, &str)], addresses: Vec<IpAddr>) -> Announcement {
        Announcement {
            fullname: "hallway._mirror-api._tcp.local.".to_string(),
            hostname: "hallway.local.".to_string(),
            addresses,
            port: 2534,
            properties: properties
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn test_api_url_prefers_ipv4() {
        let a = announcement(
            &[],
            vec![
                IpAddr::V6(Ipv6Addr::LOCALHOST),
                IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5)),
            ],
        );
        assert_eq!(a.api_url("/api").as_deref(), Some("http://10.0.0.5:2534/api"));

        let v6_only = announcement(&[], vec![IpAddr::V6(Ipv6Addr::LOCALHOST)]);
        assert_eq!(v6_only.api_url("/api").as_deref(), Some("http://[::1]:2534/api"));

        assert_eq!(announcement(&[], vec![]).api_url("/api"), None);
    }

    #[test]
    fn test_announced_api_url_wins() {
        let a = announcement(
            &[(TXT_API_URL, "https://mirror.local/v2")],
            vec![IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5))],
        );
        assert_eq!(a.api_url("/api").as_deref(), Some("https://mirror.local/v2"));
    }

    #[test]
    fn test_to_device() {
        let config = DiscoveryConfig::default();
        let a = announcement(
            &[(TXT_DEVICE_ID, "m-42"), (TXT_PROFILE, "speaker")],
            vec![IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5))],
        );
        let device = a.to_device(&config);

        assert_eq!(device.id.as_str(), "m-42");
        assert_eq!(device.name, "hallway");
        assert_eq!(device.profile, "speaker");

        let plain = announcement(&[], vec![]).to_device(&config);
        assert_eq!(plain.id.as_str(), "hallway._mirror-api._tcp.local.");
        assert_eq!(plain.profile, config.mirror_profile);
        assert_eq!(plain.api_url, None);
    }

    #[test]
    fn test_tracker_lifecycle() {
        let config = DiscoveryConfig::default();
        let tracker = MirrorTracker::new();
        let first = announcement(&[], vec![IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5))]);

        assert!(matches!(
            tracker.on_resolved(&first, &config),
            Some(DeviceEvent::DeviceAdded(_))
        ));
        assert_eq!(tracker.on_resolved(&first, &config), None);

        let moved = announcement(&[], vec![IpAddr::V4(Ipv4Addr::new(10, 0, 0, 9))]);
        assert_eq!(
            tracker.on_resolved(&moved, &config),
            Some(DeviceEvent::AddressChanged {
                device_id: DeviceId::new("hallway._mirror-api._tcp.local."),
                api_url: Some("http://10.0.0.9:2534/api".to_string()),
            })
        );

        assert!(matches!(
            tracker.on_removed(&first.fullname),
            Some(DeviceEvent::DeviceRemoved(_))
        ));
        assert_eq!(tracker.on_removed(&first.fullname), None);
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_external_outlet_leaves_caller_sole_receiver() {
        let (tx, rx) = event_channel(4);
        let outlet = EventOutlet::external(tx);

        assert!(outlet.rx.is_none());
        assert_eq!(outlet.tx.receiver_count(), 1);

        outlet
            .tx
            .try_send(DeviceEvent::DeviceRemoved(DeviceId::new("m1")))
            .unwrap();
        assert_eq!(rx.try_recv().unwrap(), DeviceEvent::DeviceRemoved(DeviceId::new("m1")));
    }

    #[test]
    fn test_owned_outlet_exposes_receiver() {
        let outlet = EventOutlet::owned(4);
        let rx = outlet.rx.clone().unwrap();

        outlet
            .tx
            .try_send(DeviceEvent::DeviceRemoved(DeviceId::new("m1")))
            .unwrap();
        assert_eq!(rx.try_recv().unwrap().device_id(), &DeviceId::new("m1"));
    }
}
