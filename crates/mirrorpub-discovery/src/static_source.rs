//! Mirrors at fixed, configured addresses

use crate::error::{DiscoveryError, Result};
use crate::events::DeviceEvent;
use async_channel::Sender;
use mirrorpub_core::discovery_config::StaticMirror;
use mirrorpub_core::types::{Device, DeviceId};
use tracing::info;

/// Announces the configured static mirrors as added devices.
#[derive(Debug, Clone)]
pub struct StaticDeviceSource {
    mirrors: Vec<StaticMirror>,
    profile: String,
}

impl StaticDeviceSource {
    pub fn new(mirrors: Vec<StaticMirror>, profile: impl Into<String>) -> Self {
        Self {
            mirrors,
            profile: profile.into(),
        }
    }

    /// Devices for every configured mirror
    pub fn devices(&self) -> Vec<Device> {
        self.mirrors
            .iter()
            .map(|mirror| Device {
                id: DeviceId::new(mirror.id.as_str()),
                name: mirror.display_name().to_string(),
                profile: self.profile.clone(),
                api_url: Some(mirror.api_url.clone()),
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.mirrors.is_empty()
    }

    /// Sends a `DeviceAdded` event per mirror and returns how many were sent.
    pub async fn announce(&self, events: &Sender<DeviceEvent>) -> Result<usize> {
        let devices = self.devices();
        let count = devices.len();

        for device in devices {
            info!(mirror = %device.id, url = ?device.api_url, "Announcing static mirror");
            events
                .send(DeviceEvent::DeviceAdded(device))
                .await
                .map_err(|_| DiscoveryError::ChannelClosed)?;
        }

        Ok(count)
    }
}
