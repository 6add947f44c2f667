//! Host-platform GATT surface used by discovery and transport.
//!
//! [`GattHost`] selects a device; [`GattDevice`] exposes connection, service
//! and characteristic enumeration, and the two write primitives. The btleplug
//! implementation lives in [`crate::btle`].

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::Result;

/// Bluetooth base UUID (`0000xxxx-0000-1000-8000-00805f9b34fb`).
const BLUETOOTH_BASE_UUID: u128 = 0x0000_0000_0000_1000_8000_0080_5f9b_34fb;

/// Default device-selection scan window.
pub const DEFAULT_SCAN_TIMEOUT: Duration = Duration::from_secs(10);

/// Expand a 16-bit assigned number into a full 128-bit UUID.
pub const fn uuid_from_u16(id: u16) -> Uuid {
    Uuid::from_u128(BLUETOOTH_BASE_UUID | ((id as u128) << 96))
}

/// Parse a service identifier: 16-bit hex (`ffe0`, `0xFFE0`) or a full UUID.
pub fn parse_service_id(raw: &str) -> Option<Uuid> {
    let raw = raw.trim();
    let short = raw
        .strip_prefix("0x")
        .or_else(|| raw.strip_prefix("0X"))
        .unwrap_or(raw);
    if short.len() == 4 {
        return u16::from_str_radix(short, 16).ok().map(uuid_from_u16);
    }
    Uuid::parse_str(raw).ok()
}

/// Write primitives a characteristic may accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Write request, waits for the remote acknowledgment.
    Acknowledged,
    /// Write command, no round trip.
    Unacknowledged,
}

/// Write capability flags, computed once at discovery time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub supports_ack: bool,
    pub supports_unacked: bool,
}

impl Capabilities {
    pub fn is_writable(&self) -> bool {
        self.supports_ack || self.supports_unacked
    }

    /// Unacknowledged writes when advertised, acknowledged otherwise.
    pub fn preferred_mode(&self) -> WriteMode {
        if self.supports_unacked {
            WriteMode::Unacknowledged
        } else {
            WriteMode::Acknowledged
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceInfo {
    pub uuid: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacteristicInfo {
    pub uuid: Uuid,
    pub service: Uuid,
    pub capabilities: Capabilities,
}

/// A writable remote channel, valid only while its connection is alive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointDescriptor {
    pub device_id: String,
    pub service: Uuid,
    pub characteristic: Uuid,
    pub capabilities: Capabilities,
}

/// Criteria for choosing a remote device.
///
/// With neither `name` nor `address` set, any device is accepted.
#[derive(Debug, Clone)]
pub struct DeviceRequest {
    pub name: Option<String>,
    pub address: Option<String>,
    /// Services the caller intends to use; devices advertising one are preferred.
    pub optional_services: Vec<Uuid>,
    pub scan_timeout: Duration,
}

impl Default for DeviceRequest {
    fn default() -> Self {
        Self {
            name: None,
            address: None,
            optional_services: Vec::new(),
            scan_timeout: DEFAULT_SCAN_TIMEOUT,
        }
    }
}

impl DeviceRequest {
    pub fn accepts_any(&self) -> bool {
        self.name.is_none() && self.address.is_none()
    }

    /// Whether a discovered device satisfies the filters.
    pub fn matches(&self, device_id: &str, address: &str, device_name: &str) -> bool {
        let name_ok = self
            .name
            .as_deref()
            .is_none_or(|name| !device_name.is_empty() && device_name == name);
        let address_ok = self.address.as_deref().is_none_or(|target| {
            id_matches_target(device_id, target) || id_matches_target(address, target)
        });
        name_ok && address_ok
    }

    /// Whether the advertised services include one the caller asked for.
    pub fn advertises_wanted_service(&self, advertised: &[Uuid]) -> bool {
        advertised
            .iter()
            .any(|uuid| self.optional_services.contains(uuid))
    }
}

/// Strip separators and lowercase a MAC address or platform UUID.
pub fn normalize_device_id(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

fn id_matches_target(device_id: &str, target: &str) -> bool {
    !device_id.is_empty()
        && (device_id.eq_ignore_ascii_case(target)
            || normalize_device_id(device_id) == normalize_device_id(target))
}

/// Device-selection service of the host platform.
#[async_trait]
pub trait GattHost: Send + Sync {
    type Device: GattDevice;

    /// Select a device matching `request`.
    ///
    /// Fails with `DeviceSelectionCancelled` when nothing is chosen.
    async fn request_device(&self, request: &DeviceRequest) -> Result<Self::Device>;
}

/// A remote GATT server.
#[async_trait]
pub trait GattDevice: Send + Sync {
    /// Platform identifier (address on Linux, UUID on macOS).
    fn id(&self) -> String;

    /// Advertised name, empty when unknown.
    fn name(&self) -> String;

    /// Establish the connection.
    ///
    /// The returned token is cancelled by the host when the link drops.
    async fn connect(&self) -> Result<CancellationToken>;

    async fn disconnect(&self) -> Result<()>;

    /// Look up one primary service; `None` when the device does not expose it.
    async fn primary_service(&self, uuid: Uuid) -> Result<Option<ServiceInfo>>;

    /// All primary services in host enumeration order.
    async fn primary_services(&self) -> Result<Vec<ServiceInfo>>;

    /// Characteristics of `service` in host enumeration order.
    async fn characteristics(&self, service: &ServiceInfo) -> Result<Vec<CharacteristicInfo>>;

    async fn write(&self, endpoint: &EndpointDescriptor, data: &[u8], mode: WriteMode)
    -> Result<()>;
}
