//! One printer connection and the print pipeline on top of it.

use image::DynamicImage;
use image_processor::{RasterBitmap, prepare_frame};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::discovery::{ChannelDiscovery, DiscoveryState, Link};
use crate::gatt::{EndpointDescriptor, GattDevice, GattHost};
use crate::options::PrinterOptions;
use crate::protocol::{EscPosProtocol, PrinterCommand, PrinterProtocol};
use crate::transport::{ChunkedTransport, TransportReport, TransportSession};
use crate::{PrinterError, Result};

struct ActiveLink<D> {
    device: D,
    transport: TransportSession,
    disconnected: CancellationToken,
}

/// Owns at most one live connection to a printer.
///
/// Callers serialize their own requests; `&mut self` on every operation keeps
/// one print in flight per session.
pub struct PrinterSession<H: GattHost> {
    host: H,
    options: PrinterOptions,
    protocol: EscPosProtocol,
    transport: ChunkedTransport,
    link: Option<ActiveLink<H::Device>>,
    state: DiscoveryState,
}

impl<H: GattHost> PrinterSession<H> {
    pub fn new(host: H, options: PrinterOptions) -> Self {
        let transport = ChunkedTransport::new(options.inter_frame_delay, options.retry_backoff);
        Self {
            host,
            options,
            protocol: EscPosProtocol::new(),
            transport,
            link: None,
            state: DiscoveryState::Idle,
        }
    }

    pub fn options(&self) -> &PrinterOptions {
        &self.options
    }

    /// Current state, accounting for disconnects reported by the host.
    pub fn state(&mut self) -> DiscoveryState {
        self.reap_dropped_link();
        self.state
    }

    pub fn is_connected(&mut self) -> bool {
        self.reap_dropped_link();
        self.link.is_some()
    }

    /// The live write channel; `None` once the host reported a drop.
    pub fn endpoint(&self) -> Option<&EndpointDescriptor> {
        self.link
            .as_ref()
            .filter(|l| !l.disconnected.is_cancelled())
            .map(|l| l.transport.endpoint())
    }

    /// Select a device and discover its write channel.
    ///
    /// An existing link is torn down first.
    pub async fn connect(&mut self) -> Result<&EndpointDescriptor> {
        if let Err(e) = self.disconnect().await {
            warn!(error = %e, "Failed to release previous link");
        }

        let request = self.options.device_request();
        let mut discovery = ChannelDiscovery::new(&self.options.known_services);
        let result = discovery.run(&self.host, &request).await;
        self.state = discovery.state();

        let Link {
            device,
            endpoint,
            disconnected,
        } = result?;
        let transport = TransportSession::new(endpoint, self.options.frame_size);
        let link = self.link.insert(ActiveLink {
            device,
            transport,
            disconnected,
        });
        Ok(link.transport.endpoint())
    }

    /// Encode `image` and deliver it, connecting first if needed.
    ///
    /// Encoding completes before discovery or any frame is sent.
    pub async fn print(&mut self, image: &DynamicImage) -> Result<TransportReport> {
        let command = self.encode(image)?;

        self.reap_dropped_link();
        if self.link.is_none() {
            self.connect().await?;
        }
        self.send(&command).await
    }

    /// Run preprocessing and encoding only.
    pub fn encode(&self, image: &DynamicImage) -> Result<PrinterCommand> {
        let gray = prepare_frame(image, self.options.target, self.options.header.as_ref());
        let bitmap = RasterBitmap::encode(&gray);
        info!(
            width = bitmap.width(),
            height = bitmap.height(),
            protocol = self.protocol.name(),
            "Encoded raster image"
        );
        self.protocol
            .build_print_job(&bitmap, self.options.initialize, self.options.feed_lines)
    }

    /// Deliver an already framed command over the current link.
    pub async fn send(&mut self, command: &PrinterCommand) -> Result<TransportReport> {
        self.reap_dropped_link();
        let link = self.link.as_ref().ok_or(PrinterError::NotConnected)?;

        let result = self
            .transport
            .send(
                &link.device,
                &link.transport,
                command.as_bytes(),
                &link.disconnected,
            )
            .await;

        if let Err(err) = &result {
            if err.is_disconnect() {
                self.mark_disconnected();
            }
        }
        result
    }

    /// Tear down the link. Calling it while disconnected is a no-op.
    pub async fn disconnect(&mut self) -> Result<()> {
        let Some(link) = self.link.take() else {
            return Ok(());
        };
        self.state = DiscoveryState::Disconnected;

        if link.disconnected.is_cancelled() {
            return Ok(());
        }
        link.disconnected.cancel();
        info!(id = %link.device.id(), "Disconnecting printer");
        link.device.disconnect().await
    }

    fn reap_dropped_link(&mut self) {
        if self
            .link
            .as_ref()
            .is_some_and(|l| l.disconnected.is_cancelled())
        {
            self.mark_disconnected();
        }
    }

    fn mark_disconnected(&mut self) {
        if let Some(link) = self.link.take() {
            warn!(id = %link.device.id(), "Printer disconnected");
            self.state = DiscoveryState::Disconnected;
        }
    }
}
