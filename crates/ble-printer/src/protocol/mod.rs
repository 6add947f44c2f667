//! Printer command framing.
//!
//! Only the ESC/POS dialect is implemented: initialize, print raster image,
//! line feed.

pub mod escpos;

use image_processor::RasterBitmap;

use crate::Result;

pub use escpos::EscPosProtocol;

/// An immutable, ordered byte sequence sent to the printer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrinterCommand(Vec<u8>);

impl PrinterCommand {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Concatenate commands in order.
    pub fn concat(commands: impl IntoIterator<Item = PrinterCommand>) -> Self {
        Self(commands.into_iter().flat_map(|c| c.0).collect())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<[u8]> for PrinterCommand {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Trait defining the interface for printer command sets.
pub trait PrinterProtocol: Send + Sync {
    /// Human-readable protocol name (e.g. "ESC/POS").
    fn name(&self) -> &str;

    /// Commands sent once before the image.
    fn build_init_sequence(&self) -> Vec<PrinterCommand>;

    /// Frame a packed bitmap as a single print-image instruction.
    fn build_raster_command(&self, bitmap: &RasterBitmap) -> Result<PrinterCommand>;

    /// Advance the paper by `lines` lines.
    fn build_feed_command(&self, lines: u16) -> PrinterCommand;

    /// Build the complete byte stream for one print request.
    fn build_print_job(
        &self,
        bitmap: &RasterBitmap,
        initialize: bool,
        feed_lines: u16,
    ) -> Result<PrinterCommand> {
        let mut commands = if initialize {
            self.build_init_sequence()
        } else {
            Vec::new()
        };
        commands.push(self.build_raster_command(bitmap)?);
        if feed_lines > 0 {
            commands.push(self.build_feed_command(feed_lines));
        }
        Ok(PrinterCommand::concat(commands))
    }
}
