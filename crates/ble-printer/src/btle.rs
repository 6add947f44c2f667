//! btleplug-backed GATT host.
//!
//! Device selection scans for advertisements, connection discovers the
//! services, and a watcher task turns the adapter's disconnect event into
//! the link's cancellation token.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use btleplug::api::{
    BDAddr, Central, CentralEvent, CharPropFlags, Characteristic, Manager as _, Peripheral as _,
    ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::gatt::{
    Capabilities, CharacteristicInfo, DeviceRequest, EndpointDescriptor, GattDevice, GattHost,
    ServiceInfo, WriteMode,
};
use crate::{PrinterError, Result};

/// Adapter bring-up attempts while the platform stack is still starting.
const ADAPTER_ATTEMPTS: usize = 6;
const ADAPTER_RETRY_DELAY: Duration = Duration::from_millis(500);

fn ble_err(err: btleplug::Error) -> PrinterError {
    PrinterError::Ble(err.to_string())
}

/// Whether an adapter error means the Bluetooth stack has not settled yet.
///
/// CoreBluetooth reports an unknown manager state (`have=0`) for a moment
/// after launch; BlueZ answers "not ready" until the controller is powered.
fn adapter_is_starting(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    (message.contains("invalid state") && message.contains("have=0"))
        || message.contains("not ready")
}

/// Discovered BLE device information.
#[derive(Debug, Clone)]
pub struct DiscoveredDevice {
    /// Device display name (may be empty if not advertised).
    pub name: String,
    /// Platform-specific device identifier (address on Linux, UUID on macOS).
    pub id: String,
    /// Hardware address when the platform exposes it.
    pub address: String,
    /// Advertised service UUIDs.
    pub services: Vec<Uuid>,
    /// The underlying btleplug peripheral handle.
    pub peripheral: Peripheral,
}

/// The platform BLE adapter acting as device-selection service.
pub struct BtleHost {
    adapter: Adapter,
}

impl BtleHost {
    /// Initialize the first available BLE adapter.
    ///
    /// Retries while the platform stack is still starting; any other failure
    /// is reported as [`PrinterError::AdapterUnavailable`].
    pub async fn new() -> Result<Self> {
        for attempt in 1..=ADAPTER_ATTEMPTS {
            let message = match Self::open_adapter().await {
                Ok(Some(adapter)) => return Ok(Self { adapter }),
                Ok(None) => {
                    return Err(PrinterError::AdapterUnavailable("no adapter found".into()));
                }
                Err(btleplug::Error::PermissionDenied) => {
                    return Err(PrinterError::AdapterUnavailable("permission denied".into()));
                }
                Err(err) => err.to_string(),
            };
            if attempt == ADAPTER_ATTEMPTS || !adapter_is_starting(&message) {
                return Err(PrinterError::AdapterUnavailable(message));
            }
            debug!(attempt, error = %message, "Bluetooth stack still starting, retrying");
            tokio::time::sleep(ADAPTER_RETRY_DELAY).await;
        }
        Err(PrinterError::AdapterUnavailable("adapter never became ready".into()))
    }

    async fn open_adapter() -> std::result::Result<Option<Adapter>, btleplug::Error> {
        let manager = Manager::new().await?;
        Ok(manager.adapters().await?.into_iter().next())
    }

    /// Scan for every advertising device within `timeout`.
    pub async fn scan_devices(&self, timeout: Duration) -> Result<Vec<DiscoveredDevice>> {
        self.scan(timeout, |_| true, |_| false).await
    }

    /// Scan until `timeout` or until `done` accepts a kept device.
    async fn scan(
        &self,
        timeout: Duration,
        keep: impl Fn(&DiscoveredDevice) -> bool,
        done: impl Fn(&DiscoveredDevice) -> bool,
    ) -> Result<Vec<DiscoveredDevice>> {
        info!("Starting BLE scan ({}s timeout)", timeout.as_secs());

        // Listen before scanning so no advertisement is missed
        let mut events = self.adapter.events().await.map_err(ble_err)?;
        self.adapter
            .start_scan(ScanFilter::default())
            .await
            .map_err(ble_err)?;

        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);

        let mut found = Vec::new();
        let mut seen_ids = HashSet::new();

        loop {
            tokio::select! {
                _ = &mut deadline => break,
                event = events.next() => {
                    let id = match event {
                        Some(CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id)) => id,
                        Some(_) => continue,
                        None => break,
                    };
                    let id_str = id.to_string();
                    if seen_ids.contains(&id_str) {
                        continue;
                    }
                    let Ok(peripheral) = self.adapter.peripheral(&id).await else {
                        continue;
                    };
                    let Ok(Some(props)) = peripheral.properties().await else {
                        continue;
                    };
                    let address = if props.address == BDAddr::default() {
                        String::new()
                    } else {
                        props.address.to_string()
                    };
                    let device = DiscoveredDevice {
                        name: props.local_name.unwrap_or_default(),
                        id: id_str.clone(),
                        address,
                        services: props.services,
                        peripheral,
                    };
                    if !keep(&device) {
                        continue;
                    }
                    debug!(name = %device.name, id = %device.id, "Found device");
                    seen_ids.insert(id_str);
                    let finished = done(&device);
                    found.push(device);
                    if finished {
                        break;
                    }
                }
            }
        }

        self.adapter.stop_scan().await.map_err(ble_err)?;

        info!(count = found.len(), "BLE scan complete");
        Ok(found)
    }
}

#[async_trait]
impl GattHost for BtleHost {
    type Device = BtleDevice;

    async fn request_device(&self, request: &DeviceRequest) -> Result<BtleDevice> {
        let matches = |d: &DiscoveredDevice| request.matches(&d.id, &d.address, &d.name);
        // A specific target ends the scan as soon as it shows up.
        let specific = !request.accepts_any();
        let candidates = self
            .scan(request.scan_timeout, matches, |_| specific)
            .await?;

        let chosen = select_candidate(candidates, request).ok_or_else(|| {
            PrinterError::DeviceSelectionCancelled("no matching device found during scan".into())
        })?;

        Ok(BtleDevice {
            adapter: self.adapter.clone(),
            peripheral: chosen.peripheral,
            id: chosen.id,
            name: chosen.name,
        })
    }
}

/// Prefer a device advertising a wanted service, else the first one seen.
fn select_candidate(
    candidates: Vec<DiscoveredDevice>,
    request: &DeviceRequest,
) -> Option<DiscoveredDevice> {
    let preferred = candidates
        .iter()
        .position(|d| request.advertises_wanted_service(&d.services))
        .unwrap_or(0);
    candidates.into_iter().nth(preferred)
}

/// A selected btleplug peripheral.
pub struct BtleDevice {
    adapter: Adapter,
    peripheral: Peripheral,
    id: String,
    name: String,
}

impl BtleDevice {
    fn find_characteristic(&self, endpoint: &EndpointDescriptor) -> Result<Characteristic> {
        self.peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == endpoint.characteristic && c.service_uuid == endpoint.service)
            .ok_or_else(|| {
                PrinterError::Ble(format!(
                    "characteristic {} is no longer available",
                    endpoint.characteristic
                ))
            })
    }
}

fn characteristic_info(c: &Characteristic) -> CharacteristicInfo {
    CharacteristicInfo {
        uuid: c.uuid,
        service: c.service_uuid,
        capabilities: Capabilities {
            supports_ack: c.properties.contains(CharPropFlags::WRITE),
            supports_unacked: c.properties.contains(CharPropFlags::WRITE_WITHOUT_RESPONSE),
        },
    }
}

#[async_trait]
impl GattDevice for BtleDevice {
    fn id(&self) -> String {
        self.id.clone()
    }

    fn name(&self) -> String {
        self.name.clone()
    }

    async fn connect(&self) -> Result<CancellationToken> {
        info!(id = %self.id, name = %self.name, "Connecting to device");

        let mut events = self.adapter.events().await.map_err(ble_err)?;
        self.peripheral.connect().await.map_err(ble_err)?;
        if let Err(err) = self.peripheral.discover_services().await {
            // Printers stop advertising while held, so never leave one connected
            warn!(error = %err, "Service discovery failed, releasing device");
            if let Err(e) = self.peripheral.disconnect().await {
                warn!(error = %e, "Failed to release device");
            }
            return Err(ble_err(err));
        }

        let token = CancellationToken::new();
        let watch = token.clone();
        let target = self.peripheral.id();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = watch.cancelled() => break,
                    event = events.next() => match event {
                        Some(CentralEvent::DeviceDisconnected(id)) if id == target => {
                            info!("Peripheral reported disconnect");
                            watch.cancel();
                            break;
                        }
                        Some(_) => {}
                        None => {
                            warn!("Adapter event stream closed");
                            watch.cancel();
                            break;
                        }
                    },
                }
            }
        });

        Ok(token)
    }

    async fn disconnect(&self) -> Result<()> {
        if self.peripheral.is_connected().await.map_err(ble_err)? {
            self.peripheral.disconnect().await.map_err(ble_err)?;
        }
        Ok(())
    }

    async fn primary_service(&self, uuid: Uuid) -> Result<Option<ServiceInfo>> {
        Ok(self
            .peripheral
            .services()
            .into_iter()
            .find(|s| s.primary && s.uuid == uuid)
            .map(|s| ServiceInfo { uuid: s.uuid }))
    }

    async fn primary_services(&self) -> Result<Vec<ServiceInfo>> {
        Ok(self
            .peripheral
            .services()
            .into_iter()
            .filter(|s| s.primary)
            .map(|s| ServiceInfo { uuid: s.uuid })
            .collect())
    }

    async fn characteristics(&self, service: &ServiceInfo) -> Result<Vec<CharacteristicInfo>> {
        Ok(self
            .peripheral
            .services()
            .into_iter()
            .find(|s| s.uuid == service.uuid)
            .map(|s| s.characteristics.iter().map(characteristic_info).collect())
            .unwrap_or_default())
    }

    async fn write(
        &self,
        endpoint: &EndpointDescriptor,
        data: &[u8],
        mode: WriteMode,
    ) -> Result<()> {
        let characteristic = self.find_characteristic(endpoint)?;
        let write_type = match mode {
            WriteMode::Acknowledged => WriteType::WithResponse,
            WriteMode::Unacknowledged => WriteType::WithoutResponse,
        };
        self.peripheral
            .write(&characteristic, data, write_type)
            .await
            .map_err(ble_err)
    }
}
