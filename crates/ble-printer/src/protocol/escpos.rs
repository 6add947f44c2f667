//! ESC/POS raster image framing.
//!
//! Initialize: `ESC @` (0x1B 0x40)
//! Raster image: `GS v 0 m xL xH yL yH d1..dk` followed by LF, where
//! `x` is the row length in bytes and `y` the height in dots, both
//! little-endian, and `m = 0` selects normal density.

use image_processor::RasterBitmap;
use tracing::debug;

use super::{PrinterCommand, PrinterProtocol};
use crate::{PrinterError, Result};

const ESC: u8 = 0x1b;
const GS: u8 = 0x1d;
const LF: u8 = 0x0a;

/// `GS v 0` opcode bytes.
const RASTER_OPCODE: [u8; 3] = [GS, b'v', b'0'];

/// Normal density (no horizontal or vertical doubling).
const DENSITY_NORMAL: u8 = 0x00;

/// Bytes the raster command adds around the bitmap data.
pub const RASTER_ENVELOPE_LEN: usize = RASTER_OPCODE.len() + 1 + 4 + 1;

#[derive(Debug, Clone, Copy, Default)]
pub struct EscPosProtocol;

impl EscPosProtocol {
    pub fn new() -> Self {
        Self
    }
}

impl PrinterProtocol for EscPosProtocol {
    fn name(&self) -> &str {
        "ESC/POS"
    }

    fn build_init_sequence(&self) -> Vec<PrinterCommand> {
        vec![PrinterCommand::new(vec![ESC, b'@'])]
    }

    fn build_raster_command(&self, bitmap: &RasterBitmap) -> Result<PrinterCommand> {
        if bitmap.is_empty() {
            return Err(PrinterError::Protocol(format!(
                "cannot print an empty {}x{} bitmap",
                bitmap.width(),
                bitmap.height()
            )));
        }
        let x = u16::try_from(bitmap.bytes_per_row()).map_err(|_| {
            PrinterError::Protocol(format!("bitmap width {} too large", bitmap.width()))
        })?;
        let y = u16::try_from(bitmap.height()).map_err(|_| {
            PrinterError::Protocol(format!("bitmap height {} too large", bitmap.height()))
        })?;

        let mut buf = Vec::with_capacity(RASTER_ENVELOPE_LEN + bitmap.data().len());
        buf.extend_from_slice(&RASTER_OPCODE);
        buf.push(DENSITY_NORMAL);
        buf.extend_from_slice(&x.to_le_bytes());
        buf.extend_from_slice(&y.to_le_bytes());
        buf.extend_from_slice(bitmap.data());
        buf.push(LF);

        debug!(
            width = bitmap.width(),
            height = bitmap.height(),
            bytes = buf.len(),
            "Built raster command"
        );
        Ok(PrinterCommand::new(buf))
    }

    fn build_feed_command(&self, lines: u16) -> PrinterCommand {
        PrinterCommand::new(vec![LF; usize::from(lines)])
    }
}
