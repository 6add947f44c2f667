//! Ordered, chunked delivery of command bytes over a write characteristic.
//!
//! Frames go out strictly one at a time. A failed frame is retried once in
//! acknowledged mode after a short backoff; a second failure aborts the job
//! and the remaining frames are never sent.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::gatt::{EndpointDescriptor, GattDevice, WriteMode};
use crate::options::{DEFAULT_INTER_FRAME_DELAY, DEFAULT_RETRY_BACKOFF};
use crate::signal::{sleep_or_cancel, until_disconnected};
use crate::{PrinterError, Result};

/// Write state bound to one live connection.
#[derive(Debug, Clone)]
pub struct TransportSession {
    endpoint: EndpointDescriptor,
    frame_size: usize,
    preferred_mode: WriteMode,
}

impl TransportSession {
    pub fn new(endpoint: EndpointDescriptor, frame_size: usize) -> Self {
        let preferred_mode = endpoint.capabilities.preferred_mode();
        Self {
            endpoint,
            frame_size: frame_size.max(1),
            preferred_mode,
        }
    }

    pub fn endpoint(&self) -> &EndpointDescriptor {
        &self.endpoint
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    pub fn preferred_mode(&self) -> WriteMode {
        self.preferred_mode
    }
}

/// Outcome of a completed transmission.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransportReport {
    pub frames: usize,
    pub bytes: usize,
    pub retries: usize,
}

/// Streams payloads through a [`TransportSession`].
#[derive(Debug, Clone)]
pub struct ChunkedTransport {
    inter_frame_delay: Duration,
    retry_backoff: Duration,
}

impl Default for ChunkedTransport {
    fn default() -> Self {
        Self::new(DEFAULT_INTER_FRAME_DELAY, DEFAULT_RETRY_BACKOFF)
    }
}

impl ChunkedTransport {
    pub fn new(inter_frame_delay: Duration, retry_backoff: Duration) -> Self {
        Self {
            inter_frame_delay,
            retry_backoff,
        }
    }

    /// Send `payload` in order, at most `frame_size` bytes per write.
    ///
    /// Fails fast with `DisconnectedMidOperation` once `link` is cancelled.
    pub async fn send<D: GattDevice>(
        &self,
        device: &D,
        session: &TransportSession,
        payload: &[u8],
        link: &CancellationToken,
    ) -> Result<TransportReport> {
        let frames: Vec<&[u8]> = payload.chunks(session.frame_size).collect();
        let total = frames.len();
        debug!(
            frame_count = total,
            frame_size = session.frame_size,
            total_bytes = payload.len(),
            mode = ?session.preferred_mode,
            "Writing payload in frames"
        );

        let mut retries = 0;
        for (i, frame) in frames.iter().enumerate() {
            let number = i + 1;
            if link.is_cancelled() {
                warn!(sent = i, total, "Link lost, dropping remaining frames");
                return Err(PrinterError::DisconnectedMidOperation);
            }

            let first = until_disconnected(
                link,
                device.write(&session.endpoint, frame, session.preferred_mode),
            )
            .await;
            if let Err(err) = first {
                if err.is_disconnect() {
                    return Err(err);
                }
                warn!(frame = number, total, error = %err, "Frame write failed, retrying acknowledged");
                retries += 1;

                if sleep_or_cancel(link, self.retry_backoff).await {
                    return Err(PrinterError::DisconnectedMidOperation);
                }
                until_disconnected(
                    link,
                    device.write(&session.endpoint, frame, WriteMode::Acknowledged),
                )
                .await
                .map_err(|e| {
                    if e.is_disconnect() {
                        e
                    } else {
                        PrinterError::TransportFailure {
                            frame: number,
                            total,
                            cause: e.to_string(),
                        }
                    }
                })?;
            }

            if number < total && sleep_or_cancel(link, self.inter_frame_delay).await {
                warn!(sent = number, total, "Link lost, dropping remaining frames");
                return Err(PrinterError::DisconnectedMidOperation);
            }
        }

        info!(frames = total, bytes = payload.len(), retries, "Payload delivered");
        Ok(TransportReport {
            frames: total,
            bytes: payload.len(),
            retries,
        })
    }
}
