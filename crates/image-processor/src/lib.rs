//! Image processing for thermal receipt printing.
//!
//! Turns an arbitrary captured frame into a packed 1-bit raster: cover-crop
//! to the printer canvas, luma conversion, Atkinson dithering, and MSB-first
//! packing.

pub mod compose;
pub mod dither;
pub mod preprocess;
pub mod raster;

use std::path::Path;

use image::DynamicImage;

// Re-exports for convenience
pub use dither::atkinson_dither;
pub use preprocess::{TargetSize, fit_cover, prepare_frame, to_grayscale};
pub use raster::RasterBitmap;

/// Standard thermal printer paper width in pixels.
pub const PAPER_WIDTH: u32 = 384;

/// Default canvas height for a captured photo.
pub const CANVAS_HEIGHT: u32 = 256;

/// 8-bit intensity image, one byte per pixel, row-major.
pub type GrayscaleImage = image::GrayImage;

/// Errors raised while preparing an image for printing.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("Invalid target canvas {width}x{height}")]
    InvalidTarget { width: u32, height: u32 },

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

/// Result type alias for image processing operations.
pub type Result<T> = std::result::Result<T, ProcessError>;

/// Decode a still frame from disk.
pub fn load_image(path: impl AsRef<Path>) -> Result<DynamicImage> {
    let path = path.as_ref();
    let img = image::open(path)?;
    tracing::debug!(
        path = %path.display(),
        width = img.width(),
        height = img.height(),
        "Loaded image"
    );
    Ok(img)
}
