//! Frame normalization to the printer canvas.
//!
//! The source is scaled uniformly so it covers the whole canvas, the overflow
//! is cropped evenly from both sides of the longer axis, and the result is
//! reduced to 8-bit luma.

use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, Luma, Rgba, RgbaImage};
use tracing::{debug, warn};

use crate::compose;
use crate::{CANVAS_HEIGHT, PAPER_WIDTH, ProcessError, Result};

/// Fixed canvas resolution a frame is normalized to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetSize {
    pub width: u32,
    pub height: u32,
}

impl TargetSize {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(ProcessError::InvalidTarget { width, height });
        }
        Ok(Self { width, height })
    }
}

impl Default for TargetSize {
    fn default() -> Self {
        Self {
            width: PAPER_WIDTH,
            height: CANVAS_HEIGHT,
        }
    }
}

/// Run the full preprocessing step: cover-crop, optional header, grayscale.
pub fn prepare_frame(
    source: &DynamicImage,
    target: TargetSize,
    header: Option<&DynamicImage>,
) -> GrayImage {
    let canvas = fit_cover(source, target);
    let canvas = match header {
        Some(header) => compose::with_header(header, &canvas),
        None => canvas,
    };
    to_grayscale(&canvas)
}

/// Scale `source` to cover `target` and center-crop the overflow.
///
/// A source without dimensions yields a blank white canvas.
pub fn fit_cover(source: &DynamicImage, target: TargetSize) -> DynamicImage {
    let (sw, sh) = (source.width(), source.height());
    let (tw, th) = (target.width, target.height);

    if sw == 0 || sh == 0 {
        warn!(sw, sh, "Source has no dimensions, using a blank canvas");
        let blank = RgbaImage::from_pixel(tw, th, Rgba([255, 255, 255, 255]));
        return DynamicImage::ImageRgba8(blank);
    }

    let scale = f64::max(
        f64::from(tw) / f64::from(sw),
        f64::from(th) / f64::from(sh),
    );
    let crop_w = ((f64::from(tw) / scale).round() as u32).clamp(1, sw);
    let crop_h = ((f64::from(th) / scale).round() as u32).clamp(1, sh);
    let x = (sw - crop_w) / 2;
    let y = (sh - crop_h) / 2;

    debug!(
        sw,
        sh,
        tw,
        th,
        scale,
        crop_x = x,
        crop_y = y,
        crop_w,
        crop_h,
        "Cover-cropping frame"
    );

    let cropped = source.crop_imm(x, y, crop_w, crop_h);
    if (crop_w, crop_h) == (tw, th) {
        return cropped;
    }
    cropped.resize_exact(tw, th, FilterType::Triangle)
}

/// Convert to 8-bit luma with `round(0.299R + 0.587G + 0.114B)`.
///
/// Transparent pixels are composited over white paper first.
pub fn to_grayscale(img: &DynamicImage) -> GrayImage {
    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();

    let mut out = GrayImage::new(width, height);
    for (x, y, pixel) in rgba.enumerate_pixels() {
        out.put_pixel(x, y, Luma([luma(flatten_on_white(*pixel))]));
    }
    out
}

fn flatten_on_white(pixel: Rgba<u8>) -> [u8; 3] {
    let [r, g, b, a] = pixel.0;
    if a == 255 {
        return [r, g, b];
    }
    let alpha = u32::from(a);
    let mix = |c: u8| ((u32::from(c) * alpha + 255 * (255 - alpha) + 127) / 255) as u8;
    [mix(r), mix(g), mix(b)]
}

fn luma([r, g, b]: [u8; 3]) -> u8 {
    let lum = 0.299 * f64::from(r) + 0.587 * f64::from(g) + 0.114 * f64::from(b);
    lum.round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, Rgb};

    /// 600x200 source: black bands at x < `left` and x >= `right`, white between.
    fn banded_source(left: u32, right: u32) -> DynamicImage {
        let img = image::RgbImage::from_fn(600, 200, |x, _| {
            if x < left || x >= right {
                Rgb([0, 0, 0])
            } else {
                Rgb([255, 255, 255])
            }
        });
        DynamicImage::ImageRgb8(img)
    }

    fn px(img: &GrayImage, x: u32, y: u32) -> u8 {
        img.get_pixel(x, y).0[0]
    }

    #[test]
    fn target_size_rejects_zero() {
        assert!(TargetSize::new(0, 256).is_err());
        assert!(TargetSize::new(384, 0).is_err());
        assert_eq!(TargetSize::new(384, 256).unwrap(), TargetSize::default());
    }

    #[test]
    fn fit_cover_produces_target_dimensions() {
        for (w, h) in [(1920, 1080), (480, 640), (1, 1), (384, 256), (7, 3000)] {
            let src = DynamicImage::new_rgb8(w, h);
            let out = fit_cover(&src, TargetSize::default());
            assert_eq!(out.dimensions(), (384, 256), "source {w}x{h}");
        }
    }

    #[test]
    fn wide_source_crops_sides_evenly() {
        // Scale is 1.28, so the crop window is source x in 150..450.
        let out = prepare_frame(&banded_source(150, 450), TargetSize::default(), None);
        for (x, y) in [(0, 0), (383, 0), (0, 255), (383, 255)] {
            assert_eq!(px(&out, x, y), 255, "corner ({x}, {y}) should be white");
        }
    }

    #[test]
    fn wide_source_overflow_is_symmetric() {
        // Bands reach 10 source pixels into the crop window on each side.
        let out = prepare_frame(&banded_source(160, 440), TargetSize::default(), None);
        assert_eq!(px(&out, 5, 128), 0);
        assert_eq!(px(&out, 378, 128), 0);
        assert_eq!(px(&out, 20, 128), 255);
        assert_eq!(px(&out, 363, 128), 255);
        assert_eq!(px(&out, 192, 128), 255);
    }

    #[test]
    fn tall_source_crops_top_and_bottom_evenly() {
        // 200x600 into 384x256: scale 1.92, crop window y in 233..366.
        let src = image::RgbImage::from_fn(200, 600, |_, y| {
            if (233..366).contains(&y) {
                Rgb([255, 255, 255])
            } else {
                Rgb([0, 0, 0])
            }
        });
        let out = prepare_frame(&DynamicImage::ImageRgb8(src), TargetSize::default(), None);
        for (x, y) in [(0, 2), (383, 2), (0, 253), (383, 253)] {
            assert_eq!(px(&out, x, y), 255, "pixel ({x}, {y}) should be white");
        }
    }

    #[test]
    fn empty_source_degrades_without_panic() {
        let src = DynamicImage::new_rgb8(0, 0);
        let out = prepare_frame(&src, TargetSize::default(), None);
        assert_eq!(out.dimensions(), (384, 256));
        assert!(out.pixels().all(|p| p.0[0] == 255));

        // One zero edge is enough to fall back to white
        let src = DynamicImage::ImageRgb8(image::RgbImage::new(0, 40));
        let out = fit_cover(&src, TargetSize::new(16, 8).unwrap()).to_luma8();
        assert_eq!(out.dimensions(), (16, 8));
        assert!(out.pixels().all(|p| p.0[0] == 255));
    }

    #[test]
    fn luma_uses_rec601_weights() {
        assert_eq!(luma([255, 0, 0]), 76);
        assert_eq!(luma([0, 255, 0]), 150);
        assert_eq!(luma([0, 0, 255]), 29);
        assert_eq!(luma([255, 255, 255]), 255);
        assert_eq!(luma([0, 0, 0]), 0);
    }

    #[test]
    fn transparent_pixels_become_white() {
        let img = RgbaImage::from_pixel(2, 2, Rgba([0, 0, 0, 0]));
        let gray = to_grayscale(&DynamicImage::ImageRgba8(img));
        assert!(gray.pixels().all(|p| p.0[0] == 255));
    }

    #[test]
    fn preprocessing_is_deterministic() {
        let src = image::RgbImage::from_fn(640, 480, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
        });
        let src = DynamicImage::ImageRgb8(src);
        let a = prepare_frame(&src, TargetSize::default(), None);
        let b = prepare_frame(&src, TargetSize::default(), None);
        assert_eq!(a.as_raw(), b.as_raw());
    }
}
