//! Bluetooth LE delivery of photos to ESC/POS thermal receipt printers.
//!
//! Finds a writable GATT characteristic on printers with non-standard
//! firmware, frames dithered bitmaps as raster commands, and streams them
//! in small ordered writes.

pub mod btle;
pub mod discovery;
pub mod gatt;
pub mod options;
pub mod protocol;
pub mod session;
mod signal;
pub mod transport;

#[cfg(test)]
mod tests;

// Re-exports for convenience
pub use btle::BtleHost;
pub use discovery::{ChannelDiscovery, DiscoveryState, KNOWN_SERVICES};
pub use gatt::{Capabilities, DeviceRequest, EndpointDescriptor, GattDevice, GattHost, WriteMode};
pub use options::PrinterOptions;
pub use protocol::{EscPosProtocol, PrinterCommand, PrinterProtocol};
pub use session::PrinterSession;
pub use transport::{ChunkedTransport, TransportReport, TransportSession};

/// Errors that can occur during printer operations.
#[derive(Debug, thiserror::Error)]
pub enum PrinterError {
    #[error("Device selection cancelled: {0}")]
    DeviceSelectionCancelled(String),

    #[error(
        "No writable characteristic found on {device} (it may only support Bluetooth Classic)"
    )]
    ChannelNotFound { device: String },

    #[error("Transport failure on frame {frame}/{total}: {cause}")]
    TransportFailure {
        frame: usize,
        total: usize,
        cause: String,
    },

    #[error("Printer disconnected during the operation")]
    DisconnectedMidOperation,

    #[error("Not connected to any device")]
    NotConnected,

    #[error("Bluetooth adapter unavailable: {0}")]
    AdapterUnavailable(String),

    #[error("BLE error: {0}")]
    Ble(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error(transparent)]
    Image(#[from] image_processor::ProcessError),
}

impl PrinterError {
    /// Whether this error reports loss of the link.
    pub fn is_disconnect(&self) -> bool {
        matches!(self, Self::DisconnectedMidOperation)
    }
}

/// Result type alias for printer operations.
pub type Result<T> = std::result::Result<T, PrinterError>;
