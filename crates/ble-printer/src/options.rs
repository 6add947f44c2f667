//! Printer session configuration.
//!
//! Controls device selection, the canvas a photo is normalized to, and how
//! the framed job is paced over the link.

use std::time::Duration;

use image::DynamicImage;
use image_processor::TargetSize;
use uuid::Uuid;

use crate::discovery::KNOWN_SERVICES;
use crate::gatt::{DEFAULT_SCAN_TIMEOUT, DeviceRequest};

/// Default maximum bytes per write (typical link MTU minus ATT header).
pub const DEFAULT_FRAME_SIZE: usize = 180;

/// Pause after each frame so slow printers can drain their buffer.
pub const DEFAULT_INTER_FRAME_DELAY: Duration = Duration::from_millis(10);

/// Wait before retrying a failed frame.
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(30);

/// Configuration options for a printer session.
#[derive(Debug, Clone)]
pub struct PrinterOptions {
    /// Exact advertised name to select; `None` accepts any device.
    pub name: Option<String>,

    /// MAC address or platform UUID to select.
    pub address: Option<String>,

    /// Service identifiers probed in order before full enumeration.
    pub known_services: Vec<Uuid>,

    /// How long device selection scans.
    pub scan_timeout: Duration,

    /// Canvas the photo is cover-cropped to.
    pub target: TargetSize,

    /// Optional image stacked above the photo.
    pub header: Option<DynamicImage>,

    /// Send `ESC @` before the image.
    pub initialize: bool,

    /// Line feeds after the image.
    pub feed_lines: u16,

    /// Maximum bytes per write.
    pub frame_size: usize,

    pub inter_frame_delay: Duration,

    pub retry_backoff: Duration,
}

impl Default for PrinterOptions {
    fn default() -> Self {
        Self {
            name: None,
            address: None,
            known_services: KNOWN_SERVICES.to_vec(),
            scan_timeout: DEFAULT_SCAN_TIMEOUT,
            target: TargetSize::default(),
            header: None,
            initialize: true,
            feed_lines: 2,
            frame_size: DEFAULT_FRAME_SIZE,
            inter_frame_delay: DEFAULT_INTER_FRAME_DELAY,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
        }
    }
}

impl PrinterOptions {
    /// Create options with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: select devices by advertised name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Builder: select a device by address.
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    /// Builder: append service identifiers after the built-in table.
    pub fn with_extra_services(mut self, services: impl IntoIterator<Item = Uuid>) -> Self {
        for uuid in services {
            if !self.known_services.contains(&uuid) {
                self.known_services.push(uuid);
            }
        }
        self
    }

    /// Builder: set the scan window.
    pub fn with_scan_timeout(mut self, timeout: Duration) -> Self {
        self.scan_timeout = timeout;
        self
    }

    /// Builder: set the canvas size.
    pub fn with_target(mut self, target: TargetSize) -> Self {
        self.target = target;
        self
    }

    /// Builder: set the header image.
    pub fn with_header(mut self, header: DynamicImage) -> Self {
        self.header = Some(header);
        self
    }

    /// Builder: toggle the initialize command.
    pub fn with_initialize(mut self, val: bool) -> Self {
        self.initialize = val;
        self
    }

    /// Builder: set trailing line feeds.
    pub fn with_feed_lines(mut self, lines: u16) -> Self {
        self.feed_lines = lines;
        self
    }

    /// Builder: set the maximum frame size.
    ///
    /// # Panics
    /// Panics if `size` is zero.
    pub fn with_frame_size(mut self, size: usize) -> Self {
        assert!(size > 0, "Frame size must be at least 1 byte, got {size}");
        self.frame_size = size;
        self
    }

    /// Builder: set the pacing delay between frames.
    pub fn with_inter_frame_delay(mut self, delay: Duration) -> Self {
        self.inter_frame_delay = delay;
        self
    }

    /// Builder: set the backoff before a retry.
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Device-selection criteria derived from these options.
    pub fn device_request(&self) -> DeviceRequest {
        DeviceRequest {
            name: self.name.clone(),
            address: self.address.clone(),
            optional_services: self.known_services.clone(),
            scan_timeout: self.scan_timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gatt::uuid_from_u16;

    #[test]
    fn test_default_options() {
        let opts = PrinterOptions::default();
        assert!(opts.name.is_none());
        assert_eq!(opts.known_services, KNOWN_SERVICES.to_vec());
        assert_eq!(opts.frame_size, 180);
        assert_eq!(opts.inter_frame_delay, Duration::from_millis(10));
        assert_eq!(opts.target, TargetSize::default());
        assert!(opts.initialize);
        assert!(opts.device_request().accepts_any());
    }

    #[test]
    fn test_builder_chain() {
        let opts = PrinterOptions::new()
            .with_name("BlueTooth Printer")
            .with_frame_size(20)
            .with_feed_lines(0)
            .with_initialize(false)
            .with_retry_backoff(Duration::ZERO);

        assert_eq!(opts.name.as_deref(), Some("BlueTooth Printer"));
        assert_eq!(opts.frame_size, 20);
        assert_eq!(opts.feed_lines, 0);
        assert!(!opts.initialize);
        assert!(!opts.device_request().accepts_any());
    }

    #[test]
    fn extra_services_extend_table_without_duplicates() {
        let opts = PrinterOptions::new()
            .with_extra_services([uuid_from_u16(0xffe0), uuid_from_u16(0xae30)]);
        assert_eq!(opts.known_services.len(), KNOWN_SERVICES.len() + 1);
        assert_eq!(opts.known_services.last(), Some(&uuid_from_u16(0xae30)));
    }

    #[test]
    #[should_panic(expected = "Frame size must be at least 1 byte")]
    fn test_invalid_frame_size() {
        PrinterOptions::new().with_frame_size(0);
    }
}
