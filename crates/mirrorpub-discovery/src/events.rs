//! Device lifecycle events

use async_channel::{Receiver, Sender};
use mirrorpub_core::types::{Device, DeviceId};

/// Lifecycle notification about a device on the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    /// A device appeared, possibly already with an API URL
    DeviceAdded(Device),

    /// A device disappeared
    DeviceRemoved(DeviceId),

    /// The API URL of a known device changed; `None` when it became
    /// unreachable
    AddressChanged {
        device_id: DeviceId,
        api_url: Option<String>,
    },
}

impl DeviceEvent {
    /// Identifier of the device the event is about
    pub fn device_id(&self) -> &DeviceId {
        match self {
            DeviceEvent::DeviceAdded(device) => &device.id,
            DeviceEvent::DeviceRemoved(id) => id,
            DeviceEvent::AddressChanged { device_id, .. } => device_id,
        }
    }
}

/// Creates the bounded channel device events flow through
pub fn event_channel(capacity: usize) -> (Sender<DeviceEvent>, Receiver<DeviceEvent>) {
    async_channel::bounded(capacity.max(1))
}
