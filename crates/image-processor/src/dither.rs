//! Atkinson error-diffusion dithering for grayscale to black-and-white.
//!
//! Each pixel is compared against a fixed threshold and 1/8 of the
//! quantization error is pushed to six not-yet-visited neighbours:
//!
//! ```text
//!         *   1   1
//!     1   1   1
//!         1
//! ```
//!
//! The remaining 2/8 is dropped, which keeps highlights clean on thermal paper.

use image::GrayImage;
use tracing::debug;

/// Binarization threshold; values at or above it print white.
pub const THRESHOLD: u8 = 128;

/// Neighbour offsets `(dx, dy)` that each receive 1/8 of the error.
const ATKINSON_NEIGHBORS: [(i64, i64); 6] = [(1, 0), (2, 0), (-1, 1), (0, 1), (1, 1), (0, 2)];

/// Apply Atkinson dithering to a grayscale image.
///
/// Output pixels are either 0 (dark) or 255 (white). Out-of-bounds
/// neighbours are dropped, never wrapped.
pub fn atkinson_dither(img: &GrayImage) -> GrayImage {
    let (width, height) = img.dimensions();
    debug!(width, height, "Applying Atkinson dithering");

    // i16 working buffer so accumulated error can leave the 0..=255 range
    let mut buffer: Vec<i16> = img.as_raw().iter().map(|&v| i16::from(v)).collect();
    let (w, h) = (i64::from(width), i64::from(height));

    for y in 0..h {
        for x in 0..w {
            let idx = (y * w + x) as usize;
            let old_pixel = buffer[idx];
            let new_pixel: i16 = if old_pixel >= i16::from(THRESHOLD) {
                255
            } else {
                0
            };
            buffer[idx] = new_pixel;

            let share = (old_pixel - new_pixel) / 8;
            if share == 0 {
                continue;
            }
            for (dx, dy) in ATKINSON_NEIGHBORS {
                let (nx, ny) = (x + dx, y + dy);
                if nx < 0 || nx >= w || ny >= h {
                    continue;
                }
                buffer[(ny * w + nx) as usize] += share;
            }
        }
    }

    let pixels = buffer.into_iter().map(|v| v.clamp(0, 255) as u8).collect();
    GrayImage::from_raw(width, height, pixels).unwrap_or_else(|| GrayImage::new(width, height))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_gradient_image(width: u32, height: u32) -> GrayImage {
        GrayImage::from_fn(width, height, |x, y| {
            image::Luma([((x + y) * 255 / (width + height - 2)) as u8])
        })
    }

    fn dark_count(img: &GrayImage) -> usize {
        img.pixels().filter(|p| p.0[0] == 0).count()
    }

    #[test]
    fn output_is_binary() {
        let result = atkinson_dither(&create_gradient_image(32, 16));
        for (x, y, p) in result.enumerate_pixels() {
            let val = p.0[0];
            assert!(val == 0 || val == 255, "Pixel ({x}, {y}) = {val}");
        }
    }

    #[test]
    fn preserves_dimensions() {
        let result = atkinson_dither(&create_gradient_image(10, 5));
        assert_eq!(result.dimensions(), (10, 5));
    }

    #[test]
    fn all_white_stays_white() {
        let img = GrayImage::from_pixel(16, 16, image::Luma([255]));
        assert_eq!(dark_count(&atkinson_dither(&img)), 0);
    }

    #[test]
    fn all_black_stays_black() {
        let img = GrayImage::from_pixel(16, 16, image::Luma([0]));
        assert_eq!(dark_count(&atkinson_dither(&img)), 16 * 16);
    }

    #[test]
    fn threshold_gray_settles_into_fixed_pattern() {
        let img = GrayImage::from_pixel(16, 12, image::Luma([THRESHOLD]));
        let result = atkinson_dither(&img);

        // Period-4 pattern in both axes, exactly half the pixels dark.
        let rows = [".##..##..##..##.", "#..##..##..##..#", "#..##..##..##..#", ".##..##..##..##."];
        for y in 0..12 {
            let expected = rows[(y % 4) as usize];
            let actual: String = (0..16)
                .map(|x| if result.get_pixel(x, y).0[0] == 0 { '#' } else { '.' })
                .collect();
            assert_eq!(actual, expected, "row {y}");
        }
        assert_eq!(dark_count(&result), 16 * 12 / 2);
    }

    #[test]
    fn light_gray_prints_no_dots() {
        // Accumulated error from 220 never pushes a pixel below threshold.
        let img = GrayImage::from_pixel(8, 8, image::Luma([220]));
        assert_eq!(dark_count(&atkinson_dither(&img)), 0);
    }

    #[test]
    fn dithering_is_deterministic() {
        let img = create_gradient_image(64, 48);
        assert_eq!(atkinson_dither(&img).as_raw(), atkinson_dither(&img).as_raw());
    }

    #[test]
    fn error_does_not_wrap_across_rows() {
        // A dark last column must not influence the first column of the next row.
        let mut img = GrayImage::from_pixel(8, 2, image::Luma([255]));
        img.put_pixel(7, 0, image::Luma([100]));
        let result = atkinson_dither(&img);
        assert_eq!(result.get_pixel(0, 1).0[0], 255);
    }
}
