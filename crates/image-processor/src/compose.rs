//! Image composition: stacking a header image above the captured photo.

use image::imageops::FilterType;
use image::{DynamicImage, Rgba, RgbaImage};
use tracing::debug;

/// Stack `header` above `body`, left aligned, on white paper.
///
/// A header wider than the body is scaled down to the body width first.
pub fn with_header(header: &DynamicImage, body: &DynamicImage) -> DynamicImage {
    let header = if header.width() > body.width() && body.width() > 0 {
        resize_to_width(header, body.width())
    } else {
        header.clone()
    };
    concat_vertical(&[header, body.clone()])
}

/// Concatenate images vertically (top to bottom).
///
/// All images are left-aligned. The output width equals the maximum width;
/// uncovered and transparent areas are white.
pub fn concat_vertical(images: &[DynamicImage]) -> DynamicImage {
    let max_width = images.iter().map(|i| i.width()).max().unwrap_or(0);
    let total_height: u32 = images.iter().map(|i| i.height()).sum();

    let mut result = RgbaImage::from_pixel(max_width, total_height, Rgba([255, 255, 255, 255]));

    let mut y_offset = 0u32;
    for img in images {
        overlay(&mut result, img, 0, y_offset);
        y_offset += img.height();
    }

    DynamicImage::ImageRgba8(result)
}

/// Overlay `top` image onto `base` at the given position.
///
/// The `top` image is alpha-composited over the base.
pub fn overlay(base: &mut RgbaImage, top: &DynamicImage, x: u32, y: u32) {
    let top_rgba = top.to_rgba8();
    for (dx, dy, pixel) in top_rgba.enumerate_pixels() {
        let target_x = x + dx;
        let target_y = y + dy;
        if target_x < base.width() && target_y < base.height() {
            let alpha = pixel[3] as f32 / 255.0;
            if alpha > 0.99 {
                base.put_pixel(target_x, target_y, *pixel);
            } else if alpha > 0.01 {
                let bg = base.get_pixel(target_x, target_y);
                let blended = blend_pixel(bg, pixel, alpha);
                base.put_pixel(target_x, target_y, blended);
            }
        }
    }
}

fn resize_to_width(img: &DynamicImage, width: u32) -> DynamicImage {
    let (orig_w, orig_h) = (img.width(), img.height());
    let ratio = f64::from(width) / f64::from(orig_w);
    let new_height = ((f64::from(orig_h) * ratio).round() as u32).max(1);

    debug!(
        orig_w,
        orig_h,
        new_width = width,
        new_height,
        "Resizing header to canvas width"
    );

    img.resize_exact(width, new_height, FilterType::Lanczos3)
}

fn blend_pixel(bg: &Rgba<u8>, fg: &Rgba<u8>, alpha: f32) -> Rgba<u8> {
    let inv = 1.0 - alpha;
    Rgba([
        (fg[0] as f32 * alpha + bg[0] as f32 * inv) as u8,
        (fg[1] as f32 * alpha + bg[1] as f32 * inv) as u8,
        (fg[2] as f32 * alpha + bg[2] as f32 * inv) as u8,
        255,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32, value: u8) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            width,
            height,
            Rgba([value, value, value, 255]),
        ))
    }

    #[test]
    fn concat_vertical_sums_heights() {
        let result = concat_vertical(&[solid(100, 50, 0), solid(100, 30, 0)]);
        assert_eq!(result.width(), 100);
        assert_eq!(result.height(), 80);
    }

    #[test]
    fn concat_vertical_uses_max_width_and_white_fill() {
        let result = concat_vertical(&[solid(200, 50, 0), solid(100, 30, 0)]).to_rgba8();
        assert_eq!(result.width(), 200);
        // Right of the narrower second image stays white.
        assert_eq!(result.get_pixel(150, 60).0, [255, 255, 255, 255]);
        assert_eq!(result.get_pixel(50, 60).0, [0, 0, 0, 255]);
    }

    #[test]
    fn header_sits_above_body() {
        let result = with_header(&solid(64, 16, 0), &solid(384, 256, 255)).to_rgba8();
        assert_eq!(result.dimensions(), (384, 272));
        assert_eq!(result.get_pixel(0, 0).0[0], 0);
        assert_eq!(result.get_pixel(100, 0).0[0], 255);
        assert_eq!(result.get_pixel(0, 16).0[0], 255);
    }

    #[test]
    fn wide_header_is_scaled_to_body_width() {
        let result = with_header(&solid(768, 100, 0), &solid(384, 256, 255));
        assert_eq!(result.width(), 384);
        assert_eq!(result.height(), 50 + 256);
    }

    #[test]
    fn transparent_header_pixels_show_paper() {
        let clear = DynamicImage::ImageRgba8(RgbaImage::from_pixel(8, 8, Rgba([0, 0, 0, 0])));
        let result = with_header(&clear, &solid(8, 8, 255)).to_rgba8();
        assert!(result.pixels().all(|p| p.0 == [255, 255, 255, 255]));
    }

    #[test]
    fn overlay_does_not_panic_on_out_of_bounds() {
        let mut base = RgbaImage::new(100, 100);
        overlay(&mut base, &solid(50, 50, 0), 80, 80);
    }
}
