//! Packed 1-bit raster bitmaps.

use image::GrayImage;
use image::imageops;
use tracing::debug;

use crate::dither::atkinson_dither;

/// 1 bit per pixel, MSB = leftmost pixel, 1 = dark dot.
///
/// Width and height are always multiples of 8; rows pack into whole bytes
/// and the printer receives whole 8-dot bands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterBitmap {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl RasterBitmap {
    /// Dither and pack a grayscale image.
    ///
    /// Both edges are truncated down to a multiple of 8 before dithering.
    pub fn encode(gray: &GrayImage) -> Self {
        let (width, height) = gray.dimensions();
        let (packed_width, packed_height) = (width / 8 * 8, height / 8 * 8);

        let dithered = if (packed_width, packed_height) == (width, height) {
            atkinson_dither(gray)
        } else {
            debug!(
                width,
                height,
                packed_width,
                packed_height,
                "Truncating to a multiple of 8"
            );
            let cropped = imageops::crop_imm(gray, 0, 0, packed_width, packed_height).to_image();
            atkinson_dither(&cropped)
        };

        Self::pack(&dithered)
    }

    /// Pack an already bilevel image (0 = dark), truncating trailing columns
    /// and rows.
    pub fn pack(bilevel: &GrayImage) -> Self {
        let (width, height) = bilevel.dimensions();
        let (width, height) = (width / 8 * 8, height / 8 * 8);
        let bytes_per_row = (width / 8) as usize;

        let mut data = Vec::with_capacity(bytes_per_row * height as usize);
        for y in 0..height {
            for byte_idx in 0..bytes_per_row {
                let mut byte = 0u8;
                for bit in 0..8u32 {
                    let x = byte_idx as u32 * 8 + bit;
                    if bilevel.get_pixel(x, y).0[0] < 128 {
                        byte |= 1 << (7 - bit);
                    }
                }
                data.push(byte);
            }
        }

        debug!(width, height, bytes = data.len(), "Packed raster bitmap");
        Self {
            width,
            height,
            data,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn bytes_per_row(&self) -> usize {
        (self.width / 8) as usize
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whether the dot at `(x, y)` is dark. Out-of-range reads are white.
    pub fn is_dark(&self, x: u32, y: u32) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        let idx = y as usize * self.bytes_per_row() + (x / 8) as usize;
        self.data[idx] & (0x80 >> (x % 8)) != 0
    }

    /// Unpack into a 0/255 image for previews.
    pub fn to_gray_image(&self) -> GrayImage {
        GrayImage::from_fn(self.width, self.height, |x, y| {
            image::Luma([if self.is_dark(x, y) { 0 } else { 255 }])
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn packed_length_matches_truncated_size() {
        for (w, h) in [(384, 256), (385, 3), (391, 17), (8, 8), (13, 2), (7, 5), (0, 4)] {
            let gray = GrayImage::from_pixel(w, h, Luma([90]));
            let bitmap = RasterBitmap::encode(&gray);
            let (tw, th) = (w / 8 * 8, h / 8 * 8);
            assert_eq!((bitmap.width(), bitmap.height()), (tw, th));
            assert_eq!(bitmap.data().len(), (tw / 8 * th) as usize);
        }
    }

    #[test]
    fn height_is_truncated_to_whole_bands() {
        let bitmap = RasterBitmap::encode(&GrayImage::from_pixel(16, 13, Luma([255])));
        assert_eq!(bitmap.height(), 8);
        assert_eq!(bitmap.data().len(), 2 * 8);

        // Dark pixels only in the dropped trailing rows.
        let gray = GrayImage::from_fn(8, 12, |_, y| Luma([if y >= 8 { 0 } else { 255 }]));
        assert_eq!(RasterBitmap::encode(&gray).data(), &[0x00; 8]);
    }

    #[test]
    fn msb_is_leftmost_pixel() {
        let mut img = GrayImage::from_pixel(8, 1, Luma([255]));
        img.put_pixel(0, 0, Luma([0]));
        assert_eq!(RasterBitmap::pack(&img).data(), &[0x80]);

        let mut img = GrayImage::from_pixel(8, 1, Luma([255]));
        img.put_pixel(7, 0, Luma([0]));
        assert_eq!(RasterBitmap::pack(&img).data(), &[0x01]);
    }

    #[test]
    fn all_white_packs_to_zero_bytes() {
        let gray = GrayImage::from_pixel(384, 256, Luma([255]));
        let bitmap = RasterBitmap::encode(&gray);
        assert_eq!(bitmap.data().len(), 48 * 256);
        assert!(bitmap.data().iter().all(|&b| b == 0));
    }

    #[test]
    fn header_pipeline_yields_whole_bands() {
        use crate::preprocess::{TargetSize, prepare_frame};
        use image::{DynamicImage, RgbImage};

        let photo =
            DynamicImage::ImageRgb8(RgbImage::from_pixel(640, 480, image::Rgb([200, 90, 40])));
        let logo = DynamicImage::ImageLuma8(GrayImage::from_pixel(100, 37, Luma([0])));

        let gray = prepare_frame(&photo, TargetSize::default(), Some(&logo));
        assert_eq!(gray.height(), 256 + 37);

        let bitmap = RasterBitmap::encode(&gray);
        assert_eq!((bitmap.width(), bitmap.height()), (384, 288));
        assert_eq!(bitmap.height() % 8, 0);
        assert_eq!(bitmap.data().len(), 48 * 288);
    }

    #[test]
    fn all_black_packs_to_full_bytes() {
        let gray = GrayImage::from_pixel(16, 8, Luma([0]));
        assert_eq!(RasterBitmap::encode(&gray).data(), &[0xff; 16]);
    }

    #[test]
    fn threshold_gray_packs_to_known_bytes() {
        let gray = GrayImage::from_pixel(16, 8, Luma([128]));
        let bitmap = RasterBitmap::encode(&gray);
        let band: [u8; 8] = [0x66, 0x66, 0x99, 0x99, 0x99, 0x99, 0x66, 0x66];
        assert_eq!(bitmap.data(), [band, band].concat());
    }

    #[test]
    fn truncated_columns_do_not_reach_output() {
        // Dark pixels only in the dropped trailing columns.
        let gray = GrayImage::from_fn(12, 8, |x, _| Luma([if x >= 8 { 0 } else { 255 }]));
        let bitmap = RasterBitmap::encode(&gray);
        assert_eq!(bitmap.data(), &[0x00; 8]);
    }

    #[test]
    fn encoding_is_deterministic() {
        let gray = GrayImage::from_fn(64, 32, |x, y| Luma([((x * 4 + y * 3) % 256) as u8]));
        assert_eq!(RasterBitmap::encode(&gray), RasterBitmap::encode(&gray));
    }

    #[test]
    fn unpack_round_trips_dots() {
        let gray = GrayImage::from_fn(16, 8, |x, y| Luma([if (x + y) % 3 == 0 { 0 } else { 255 }]));
        let bitmap = RasterBitmap::pack(&gray);
        let preview = bitmap.to_gray_image();
        assert_eq!(preview.as_raw(), gray.as_raw());
        assert!(bitmap.is_dark(0, 0));
        assert!(!bitmap.is_dark(1, 0));
        assert!(!bitmap.is_dark(100, 100));
    }
}
