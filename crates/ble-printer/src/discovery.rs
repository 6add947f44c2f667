//! Writable-channel discovery across non-standard printer firmware.
//!
//! Known service identifiers are tried in table order first; if none of them
//! exposes a writable characteristic, every service and characteristic the
//! device reports is enumerated and the first writable one wins.

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::gatt::{
    CharacteristicInfo, DeviceRequest, EndpointDescriptor, GattDevice, GattHost, uuid_from_u16,
};
use crate::signal::until_disconnected;
use crate::{PrinterError, Result};

/// Nordic UART Service, used by many BLE-to-serial printer bridges.
pub const NORDIC_UART_SERVICE: Uuid = Uuid::from_u128(0x6e40_0001_b5a3_f393_e0a9_e50e_24dc_ca9e);

/// Service identifiers probed in order before falling back to enumeration.
pub const KNOWN_SERVICES: [Uuid; 4] = [
    NORDIC_UART_SERVICE,
    // Vendor serial services common on East-Asian receipt printers
    uuid_from_u16(0xffe0),
    uuid_from_u16(0xffe5),
    // ESC/POS bridge service
    uuid_from_u16(0x18f0),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryState {
    Idle,
    Scanning,
    Connected,
    ServiceProbe,
    CharacteristicProbe,
    Ready,
    Failed,
    Disconnected,
}

/// A connected device with its selected endpoint.
pub struct Link<D> {
    pub device: D,
    pub endpoint: EndpointDescriptor,
    /// Cancelled by the host when the connection drops.
    pub disconnected: CancellationToken,
}

/// Locates one writable characteristic on a remote printer.
pub struct ChannelDiscovery<'a> {
    known_services: &'a [Uuid],
    state: DiscoveryState,
}

impl<'a> ChannelDiscovery<'a> {
    pub fn new(known_services: &'a [Uuid]) -> Self {
        Self {
            known_services,
            state: DiscoveryState::Idle,
        }
    }

    pub fn state(&self) -> DiscoveryState {
        self.state
    }

    /// Select, connect, and find a writable channel.
    ///
    /// On failure after connecting, the device is disconnected again.
    pub async fn run<H: GattHost>(
        &mut self,
        host: &H,
        request: &DeviceRequest,
    ) -> Result<Link<H::Device>> {
        self.transition(DiscoveryState::Scanning);
        let device = host.request_device(request).await.inspect_err(|_| {
            self.state = DiscoveryState::Failed;
        })?;
        info!(id = %device.id(), name = %device.name(), "Device selected");

        let disconnected = match device.connect().await {
            Ok(token) => token,
            Err(err) => {
                // A half-open link keeps the printer from advertising again
                self.transition(DiscoveryState::Failed);
                release(&device).await;
                return Err(err);
            }
        };
        self.transition(DiscoveryState::Connected);

        match self.find_endpoint(&device, &disconnected).await {
            Ok(endpoint) => {
                self.transition(DiscoveryState::Ready);
                info!(
                    service = %endpoint.service,
                    characteristic = %endpoint.characteristic,
                    ack = endpoint.capabilities.supports_ack,
                    unacked = endpoint.capabilities.supports_unacked,
                    "Write channel ready"
                );
                Ok(Link {
                    device,
                    endpoint,
                    disconnected,
                })
            }
            Err(err) => {
                self.transition(DiscoveryState::Failed);
                if !disconnected.is_cancelled() {
                    disconnected.cancel();
                    release(&device).await;
                }
                Err(err)
            }
        }
    }

    async fn find_endpoint<D: GattDevice>(
        &mut self,
        device: &D,
        link: &CancellationToken,
    ) -> Result<EndpointDescriptor> {
        let found = match self.probe_known_services(device, link).await? {
            Some(found) => Some(found),
            None => {
                info!("No known service exposes a writable characteristic, enumerating all");
                self.probe_all_services(device, link).await?
            }
        };

        let characteristic = found.ok_or_else(|| PrinterError::ChannelNotFound {
            device: display_name(device),
        })?;

        Ok(EndpointDescriptor {
            device_id: device.id(),
            service: characteristic.service,
            characteristic: characteristic.uuid,
            capabilities: characteristic.capabilities,
        })
    }

    async fn probe_known_services<D: GattDevice>(
        &mut self,
        device: &D,
        link: &CancellationToken,
    ) -> Result<Option<CharacteristicInfo>> {
        for &uuid in self.known_services {
            self.transition(DiscoveryState::ServiceProbe);
            let service = match until_disconnected(link, device.primary_service(uuid)).await {
                Ok(Some(service)) => service,
                Ok(None) => {
                    debug!(service = %uuid, "Known service not present");
                    continue;
                }
                Err(err) if err.is_disconnect() => return Err(err),
                Err(err) => {
                    warn!(service = %uuid, error = %err, "Service lookup failed, skipping");
                    continue;
                }
            };

            self.transition(DiscoveryState::CharacteristicProbe);
            match until_disconnected(link, device.characteristics(&service)).await {
                Ok(characteristics) => {
                    if let Some(found) = first_writable(characteristics) {
                        return Ok(Some(found));
                    }
                    debug!(service = %uuid, "Known service has no writable characteristic");
                }
                Err(err) if err.is_disconnect() => return Err(err),
                Err(err) => {
                    warn!(service = %uuid, error = %err, "Characteristic lookup failed, skipping");
                }
            }
        }
        Ok(None)
    }

    async fn probe_all_services<D: GattDevice>(
        &mut self,
        device: &D,
        link: &CancellationToken,
    ) -> Result<Option<CharacteristicInfo>> {
        self.transition(DiscoveryState::ServiceProbe);
        let services = until_disconnected(link, device.primary_services()).await?;
        debug!(count = services.len(), "Enumerated services");

        for service in services {
            self.transition(DiscoveryState::CharacteristicProbe);
            let characteristics =
                until_disconnected(link, device.characteristics(&service)).await?;
            if let Some(found) = first_writable(characteristics) {
                return Ok(Some(found));
            }
        }
        Ok(None)
    }

    fn transition(&mut self, next: DiscoveryState) {
        if self.state != next {
            debug!(from = ?self.state, to = ?next, "Discovery state");
            self.state = next;
        }
    }
}

async fn release<D: GattDevice>(device: &D) {
    if let Err(e) = device.disconnect().await {
        warn!(error = %e, "Failed to disconnect after discovery error");
    }
}

fn first_writable(characteristics: Vec<CharacteristicInfo>) -> Option<CharacteristicInfo> {
    characteristics
        .into_iter()
        .find(|c| c.capabilities.is_writable())
}

fn display_name<D: GattDevice>(device: &D) -> String {
    let name = device.name();
    if name.is_empty() {
        device.id()
    } else {
        format!("{name} ({})", device.id())
    }
}
